//! Per-type parameter resolution
//!
//! Every node type has exactly one resolver. A resolver checks the node's
//! upstream arity, parses its settings into a typed struct, and produces the
//! named slots its template is rendered with. Built-in types dispatch through
//! an exhaustive `match`; additional types are added by registering a new
//! resolver, never by touching the existing ones.

use std::collections::BTreeMap;
use std::sync::Arc;

use flowdbt_core::{ConfigurationError, FlowResult, ValidationError};
use flowdbt_graph::{BuiltinType, NodeSpec, NodeType, TypeCatalog};

/// Template slot name -> value
pub type TemplateParams = BTreeMap<String, String>;

pub trait TypeResolver: Send + Sync {
    /// Registry key, also the template name
    fn type_name(&self) -> &str;

    /// Number of upstream inputs the type consumes
    fn arity(&self) -> usize;

    fn resolve(&self, node: &NodeSpec) -> Result<TemplateParams, ValidationError>;
}

/// Fails unless `node` has exactly `expected` upstream references
pub fn check_arity(node: &NodeSpec, expected: usize) -> Result<(), ValidationError> {
    if node.upstream.len() == expected {
        Ok(())
    } else {
        Err(ValidationError::ArityMismatch {
            node: node.name.clone(),
            node_type: node.node_type.to_string(),
            expected,
            actual: node.upstream.len(),
        })
    }
}

/// Structural access to a node's string settings
pub struct SettingsReader<'a> {
    node: &'a NodeSpec,
}

impl<'a> SettingsReader<'a> {
    /// Reject any key not in `allowed`
    pub fn new(node: &'a NodeSpec, allowed: &[&str]) -> Result<Self, ValidationError> {
        if let Some(key) = node.settings.keys().find(|k| !allowed.contains(&k.as_str())) {
            return Err(ValidationError::UnknownSetting {
                node: node.name.clone(),
                setting: key.clone(),
            });
        }

        Ok(Self { node })
    }

    /// A present, non-blank value; there is no default
    pub fn required(&self, key: &str) -> Result<String, ValidationError> {
        match self.node.settings.get(key) {
            Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
            _ => Err(ValidationError::MissingSetting {
                node: self.node.name.clone(),
                setting: key.to_string(),
            }),
        }
    }

    /// Absent means `None`; present but blank is invalid
    pub fn optional(&self, key: &str) -> Result<Option<String>, ValidationError> {
        match self.node.settings.get(key) {
            None => Ok(None),
            Some(value) if value.trim().is_empty() => Err(ValidationError::InvalidSetting {
                node: self.node.name.clone(),
                setting: key.to_string(),
                reason: "value must not be blank".to_string(),
            }),
            Some(value) => Ok(Some(value.trim().to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectSettings {
    pub columns: String,
}

impl SelectSettings {
    pub const DEFAULT_COLUMNS: &'static str = "*";

    pub fn parse(node: &NodeSpec) -> Result<Self, ValidationError> {
        let reader = SettingsReader::new(node, &["columns"])?;
        let columns = reader
            .optional("columns")?
            .unwrap_or_else(|| Self::DEFAULT_COLUMNS.to_string());
        Ok(Self { columns })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterSettings {
    pub predicate: String,
}

impl FilterSettings {
    pub fn parse(node: &NodeSpec) -> Result<Self, ValidationError> {
        let reader = SettingsReader::new(node, &["predicate"])?;
        Ok(Self {
            predicate: reader.required("predicate")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSettings {
    pub merge_key: String,
}

impl MergeSettings {
    pub fn parse(node: &NodeSpec) -> Result<Self, ValidationError> {
        let reader = SettingsReader::new(node, &["merge_key"])?;
        Ok(Self {
            merge_key: reader.required("merge_key")?,
        })
    }
}

/// Append takes no settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendSettings;

impl AppendSettings {
    pub fn parse(node: &NodeSpec) -> Result<Self, ValidationError> {
        SettingsReader::new(node, &[])?;
        Ok(Self)
    }
}

fn params<const N: usize>(pairs: [(&str, String); N]) -> TemplateParams {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

pub struct SelectResolver;

impl TypeResolver for SelectResolver {
    fn type_name(&self) -> &str {
        BuiltinType::Select.as_str()
    }

    fn arity(&self) -> usize {
        1
    }

    fn resolve(&self, node: &NodeSpec) -> Result<TemplateParams, ValidationError> {
        check_arity(node, self.arity())?;
        let settings = SelectSettings::parse(node)?;
        Ok(params([
            ("source", node.upstream[0].clone()),
            ("columns", settings.columns),
        ]))
    }
}

pub struct FilterResolver;

impl TypeResolver for FilterResolver {
    fn type_name(&self) -> &str {
        BuiltinType::Filter.as_str()
    }

    fn arity(&self) -> usize {
        1
    }

    fn resolve(&self, node: &NodeSpec) -> Result<TemplateParams, ValidationError> {
        check_arity(node, self.arity())?;
        let settings = FilterSettings::parse(node)?;
        Ok(params([
            ("source", node.upstream[0].clone()),
            ("predicate", settings.predicate),
        ]))
    }
}

pub struct MergeResolver;

impl TypeResolver for MergeResolver {
    fn type_name(&self) -> &str {
        BuiltinType::Merge.as_str()
    }

    fn arity(&self) -> usize {
        2
    }

    fn resolve(&self, node: &NodeSpec) -> Result<TemplateParams, ValidationError> {
        check_arity(node, self.arity())?;
        let settings = MergeSettings::parse(node)?;
        Ok(params([
            ("left", node.upstream[0].clone()),
            ("right", node.upstream[1].clone()),
            ("merge_key", settings.merge_key),
        ]))
    }
}

pub struct AppendResolver;

impl TypeResolver for AppendResolver {
    fn type_name(&self) -> &str {
        BuiltinType::Append.as_str()
    }

    fn arity(&self) -> usize {
        2
    }

    fn resolve(&self, node: &NodeSpec) -> Result<TemplateParams, ValidationError> {
        check_arity(node, self.arity())?;
        AppendSettings::parse(node)?;
        Ok(params([
            ("left", node.upstream[0].clone()),
            ("right", node.upstream[1].clone()),
        ]))
    }
}

/// The one resolver for each built-in type
pub fn builtin_resolver(node_type: BuiltinType) -> &'static dyn TypeResolver {
    match node_type {
        BuiltinType::Select => &SelectResolver,
        BuiltinType::Filter => &FilterResolver,
        BuiltinType::Merge => &MergeResolver,
        BuiltinType::Append => &AppendResolver,
    }
}

/// Built-in resolvers plus any registered at runtime
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    custom: BTreeMap<String, Arc<dyn TypeResolver>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver for a new type name
    pub fn register<R: TypeResolver + 'static>(&mut self, resolver: R) -> Result<(), ConfigurationError> {
        let name = resolver.type_name().to_string();

        if BuiltinType::from_name(&name).is_some() || self.custom.contains_key(&name) {
            return Err(ConfigurationError::DuplicateType(name));
        }

        tracing::debug!(node_type = %name, arity = resolver.arity(), "registered resolver");
        self.custom.insert(name, Arc::new(resolver));
        Ok(())
    }

    pub fn get(&self, node_type: &NodeType) -> Option<&dyn TypeResolver> {
        match node_type {
            NodeType::Builtin(t) => Some(builtin_resolver(*t)),
            NodeType::Custom(name) => self.custom.get(name).map(|r| r.as_ref()),
        }
    }

    /// Resolve a node's template parameters
    pub fn resolve(&self, node: &NodeSpec) -> FlowResult<TemplateParams> {
        let resolver = self.get(&node.node_type).ok_or_else(|| ConfigurationError::UnknownType {
            node: node.name.clone(),
            node_type: node.node_type.to_string(),
        })?;

        check_arity(node, resolver.arity())?;
        Ok(resolver.resolve(node)?)
    }

    /// All registered type names, built-ins first
    pub fn type_names(&self) -> Vec<&str> {
        BuiltinType::ALL
            .iter()
            .map(|t| t.as_str())
            .chain(self.custom.keys().map(String::as_str))
            .collect()
    }
}

impl TypeCatalog for ResolverRegistry {
    fn is_registered(&self, node_type: &NodeType) -> bool {
        self.get(node_type).is_some()
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("types", &self.type_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowdbt_core::FlowError;
    use pretty_assertions::assert_eq;

    fn resolve(node: &NodeSpec) -> Result<TemplateParams, ValidationError> {
        match ResolverRegistry::new().resolve(node) {
            Ok(params) => Ok(params),
            Err(FlowError::Validation(e)) => Err(e),
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn select_defaults_columns_to_star() {
        let node = NodeSpec::new("s", BuiltinType::Select).with_upstream(["data"]);
        let params = resolve(&node).unwrap();

        assert_eq!(
            params,
            TemplateParams::from([
                ("columns".to_string(), "*".to_string()),
                ("source".to_string(), "data".to_string()),
            ])
        );
    }

    #[test]
    fn select_with_explicit_columns() {
        let node = NodeSpec::new("s", BuiltinType::Select)
            .with_upstream(["data"])
            .with_setting("columns", "id, name");
        assert_eq!(resolve(&node).unwrap()["columns"], "id, name");
    }

    #[test]
    fn filter_requires_predicate() {
        let node = NodeSpec::new("f", BuiltinType::Filter).with_upstream(["data"]);
        assert_eq!(
            resolve(&node).unwrap_err(),
            ValidationError::MissingSetting {
                node: "f".into(),
                setting: "predicate".into()
            }
        );

        let blank = node.clone().with_setting("predicate", "   ");
        assert!(matches!(resolve(&blank), Err(ValidationError::MissingSetting { .. })));

        let ok = node.with_setting("predicate", "amount > 10");
        let params = resolve(&ok).unwrap();
        assert_eq!(params["source"], "data");
        assert_eq!(params["predicate"], "amount > 10");
    }

    #[test]
    fn merge_keeps_upstream_positions() {
        let node = NodeSpec::new("m", BuiltinType::Merge)
            .with_upstream(["orders", "customers"])
            .with_setting("merge_key", "customer_id");
        let params = resolve(&node).unwrap();

        assert_eq!(params["left"], "orders");
        assert_eq!(params["right"], "customers");
        assert_eq!(params["merge_key"], "customer_id");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn merge_requires_key() {
        let node = NodeSpec::new("m", BuiltinType::Merge).with_upstream(["a", "b"]);
        assert!(matches!(
            resolve(&node),
            Err(ValidationError::MissingSetting { ref setting, .. }) if setting == "merge_key"
        ));
    }

    #[test]
    fn arity_is_enforced_for_every_builtin() {
        for t in BuiltinType::ALL {
            let resolver = builtin_resolver(t);
            let node = NodeSpec::new("n", t).with_upstream(vec!["x"; resolver.arity() + 1]);
            assert!(matches!(
                resolve(&node),
                Err(ValidationError::ArityMismatch { expected, actual, .. })
                    if expected == resolver.arity() && actual == resolver.arity() + 1
            ));
        }
    }

    #[test]
    fn unknown_settings_are_rejected() {
        let node = NodeSpec::new("a", BuiltinType::Append)
            .with_upstream(["x", "y"])
            .with_setting("where_clause", "1");
        assert_eq!(
            resolve(&node).unwrap_err(),
            ValidationError::UnknownSetting {
                node: "a".into(),
                setting: "where_clause".into()
            }
        );
    }

    struct DedupeResolver;

    impl TypeResolver for DedupeResolver {
        fn type_name(&self) -> &str {
            "dedupe"
        }

        fn arity(&self) -> usize {
            1
        }

        fn resolve(&self, node: &NodeSpec) -> Result<TemplateParams, ValidationError> {
            check_arity(node, 1)?;
            let reader = SettingsReader::new(node, &["key"])?;
            Ok(params([
                ("source", node.upstream[0].clone()),
                ("key", reader.required("key")?),
            ]))
        }
    }

    #[test]
    fn custom_types_are_registered_not_built_in() {
        let mut registry = ResolverRegistry::new();
        let node = NodeSpec::new("d", "dedupe")
            .with_upstream(["raw"])
            .with_setting("key", "id");

        assert!(!registry.is_registered(&node.node_type));
        assert!(matches!(
            registry.resolve(&node),
            Err(FlowError::Configuration(ConfigurationError::UnknownType { .. }))
        ));

        registry.register(DedupeResolver).unwrap();
        assert!(registry.is_registered(&node.node_type));
        assert_eq!(registry.resolve(&node).unwrap()["key"], "id");
        assert_eq!(registry.type_names(), vec!["select", "filter", "merge", "append", "dedupe"]);

        assert_eq!(
            registry.register(DedupeResolver).unwrap_err(),
            ConfigurationError::DuplicateType("dedupe".into())
        );
    }

    /// Indexes both inputs without checking them itself
    struct PairResolver;

    impl TypeResolver for PairResolver {
        fn type_name(&self) -> &str {
            "pair"
        }

        fn arity(&self) -> usize {
            2
        }

        fn resolve(&self, node: &NodeSpec) -> Result<TemplateParams, ValidationError> {
            Ok(params([
                ("left", node.upstream[0].clone()),
                ("right", node.upstream[1].clone()),
            ]))
        }
    }

    #[test]
    fn registry_enforces_custom_arity() {
        let mut registry = ResolverRegistry::new();
        registry.register(PairResolver).unwrap();

        let short = NodeSpec::new("p", "pair").with_upstream(["only_one"]);
        assert!(matches!(
            registry.resolve(&short),
            Err(FlowError::Validation(ValidationError::ArityMismatch { expected: 2, actual: 1, .. }))
        ));

        let ok = NodeSpec::new("p", "pair").with_upstream(["a", "b"]);
        assert_eq!(registry.resolve(&ok).unwrap()["right"], "b");
    }

    struct ShadowSelect;

    impl TypeResolver for ShadowSelect {
        fn type_name(&self) -> &str {
            "Select"
        }

        fn arity(&self) -> usize {
            0
        }

        fn resolve(&self, _node: &NodeSpec) -> Result<TemplateParams, ValidationError> {
            Ok(TemplateParams::new())
        }
    }

    #[test]
    fn builtins_cannot_be_replaced() {
        let mut registry = ResolverRegistry::new();
        assert_eq!(
            registry.register(ShadowSelect).unwrap_err(),
            ConfigurationError::DuplicateType("Select".into())
        );
    }
}
