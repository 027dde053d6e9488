//! Node declarations
//!
//! A `NodeSpec` is what the graph editor hands us: a name, a type, an ordered
//! list of upstream references and a flat map of string settings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

/// Flat per-node settings as declared by the user
pub type Settings = BTreeMap<String, String>;

/// Node types shipped with flowdbt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuiltinType {
    Select,
    Filter,
    Merge,
    Append,
}

impl BuiltinType {
    pub const ALL: [BuiltinType; 4] = [Self::Select, Self::Filter, Self::Merge, Self::Append];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Filter => "filter",
            Self::Merge => "merge",
            Self::Append => "append",
        }
    }

    /// Case-insensitive lookup of a built-in type name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

impl std::fmt::Display for BuiltinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The type of a node: a built-in variant or a name registered at runtime
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeType {
    Builtin(BuiltinType),
    Custom(String),
}

impl NodeType {
    pub fn name(&self) -> &str {
        match self {
            Self::Builtin(t) => t.as_str(),
            Self::Custom(name) => name,
        }
    }

    pub fn builtin(&self) -> Option<BuiltinType> {
        match self {
            Self::Builtin(t) => Some(*t),
            Self::Custom(_) => None,
        }
    }
}

impl From<&str> for NodeType {
    fn from(name: &str) -> Self {
        match BuiltinType::from_name(name) {
            Some(t) => Self::Builtin(t),
            None => Self::Custom(name.trim().to_string()),
        }
    }
}

impl From<String> for NodeType {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<BuiltinType> for NodeType {
    fn from(t: BuiltinType) -> Self {
        Self::Builtin(t)
    }
}

impl From<NodeType> for String {
    fn from(t: NodeType) -> Self {
        t.name().to_string()
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable declaration of one transformation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    /// Unique key within a project; also the output relation name
    pub name: String,

    #[serde(rename = "type")]
    pub node_type: NodeType,

    /// Upstream references; position is significant
    #[serde(default)]
    pub upstream: Vec<String>,

    #[serde(default)]
    pub settings: Settings,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>, node_type: impl Into<NodeType>) -> Self {
        Self {
            name: name.into(),
            node_type: node_type.into(),
            upstream: Vec::new(),
            settings: Settings::new(),
        }
    }

    pub fn with_upstream<I, S>(mut self, upstream: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.upstream = upstream.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Load node declarations from a `.json` or `.toml` file
    pub fn load_all(path: &Path) -> Result<Vec<NodeSpec>, NodeFileError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| NodeFileError::IoError(path.display().to_string(), e.to_string()))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&contents),
            _ => Self::from_json(&contents),
        }
    }

    /// Parse either a bare JSON array or `{"nodes": [...]}`
    pub fn from_json(json: &str) -> Result<Vec<NodeSpec>, NodeFileError> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum JsonNodes {
            Bare(Vec<NodeSpec>),
            Wrapped { nodes: Vec<NodeSpec> },
        }

        let parsed: JsonNodes = serde_json::from_str(json)
            .map_err(|e| NodeFileError::ParseError(e.to_string()))?;

        Ok(match parsed {
            JsonNodes::Bare(nodes) | JsonNodes::Wrapped { nodes } => nodes,
        })
    }

    /// Parse `[[nodes]]` tables
    pub fn from_toml(toml: &str) -> Result<Vec<NodeSpec>, NodeFileError> {
        #[derive(Deserialize)]
        struct TomlNodes {
            #[serde(default)]
            nodes: Vec<NodeSpec>,
        }

        let parsed: TomlNodes = toml::from_str(toml)
            .map_err(|e| NodeFileError::ParseError(e.to_string()))?;

        Ok(parsed.nodes)
    }
}

/// Whether `name` can be used as a node identity (file stem and relation name)
pub fn is_valid_identifier(name: &str) -> bool {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| regex::Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static pattern"))
        .is_match(name)
}

/// Node file loading errors
#[derive(Debug, thiserror::Error)]
pub enum NodeFileError {
    #[error("Failed to read node file {0}: {1}")]
    IoError(String, String),

    #[error("Failed to parse node declarations: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builtin_types_are_case_insensitive() {
        assert_eq!(NodeType::from("Select"), NodeType::Builtin(BuiltinType::Select));
        assert_eq!(NodeType::from("MERGE"), NodeType::Builtin(BuiltinType::Merge));
        assert_eq!(NodeType::from("pivot"), NodeType::Custom("pivot".to_string()));
    }

    #[test]
    fn parse_json_array() {
        let nodes = NodeSpec::from_json(
            r#"[
                {"name": "customers", "type": "select", "upstream": ["data"]},
                {"name": "active", "type": "filter", "upstream": ["customers"],
                 "settings": {"predicate": "active = true"}}
            ]"#,
        )
        .unwrap();

        assert_eq!(nodes.len(), 2);
        assert_eq!(
            nodes[1],
            NodeSpec::new("active", BuiltinType::Filter)
                .with_upstream(["customers"])
                .with_setting("predicate", "active = true")
        );
        assert!(nodes[0].settings.is_empty());
    }

    #[test]
    fn parse_wrapped_json_and_toml() {
        let json = NodeSpec::from_json(r#"{"nodes": [{"name": "a", "type": "append", "upstream": ["x", "y"]}]}"#)
            .unwrap();
        let toml = NodeSpec::from_toml(
            r#"
            [[nodes]]
            name = "a"
            type = "append"
            upstream = ["x", "y"]
            "#,
        )
        .unwrap();

        assert_eq!(json, toml);
    }

    #[test]
    fn node_type_serializes_as_string() {
        let node = NodeSpec::new("p", "pivot");
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains(r#""type":"pivot""#));
    }

    #[test]
    fn identifier_validation() {
        assert!(is_valid_identifier("idbt_select_table"));
        assert!(is_valid_identifier("_tmp1"));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("drop table; --"));
        assert!(!is_valid_identifier(""));
    }
}
