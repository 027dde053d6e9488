//! Structural validation of a declared node set
//!
//! Runs before anything is resolved or compiled. One bad node rejects the
//! whole set; nothing is silently dropped.

use crate::node::{is_valid_identifier, NodeSpec, NodeType};
use flowdbt_core::ConfigurationError;
use std::collections::HashSet;

/// Answers whether a node type has a registered resolver
pub trait TypeCatalog {
    fn is_registered(&self, node_type: &NodeType) -> bool;
}

pub struct GraphValidator<'a, C: TypeCatalog + ?Sized> {
    types: &'a C,
}

impl<'a, C: TypeCatalog + ?Sized> GraphValidator<'a, C> {
    pub fn new(types: &'a C) -> Self {
        Self { types }
    }

    /// Validate and return the node list unchanged
    pub fn validate(&self, nodes: Vec<NodeSpec>) -> Result<Vec<NodeSpec>, ConfigurationError> {
        let registered = nodes
            .iter()
            .filter(|n| self.types.is_registered(&n.node_type))
            .count();

        if registered == 0 {
            return Err(ConfigurationError::EmptyGraph);
        }

        if let Some(node) = nodes.iter().find(|n| !self.types.is_registered(&n.node_type)) {
            return Err(ConfigurationError::UnknownType {
                node: node.name.clone(),
                node_type: node.node_type.to_string(),
            });
        }

        let mut seen = HashSet::with_capacity(nodes.len());
        for node in &nodes {
            if node.name.is_empty() {
                return Err(ConfigurationError::EmptyName);
            }
            if !is_valid_identifier(&node.name) {
                return Err(ConfigurationError::InvalidName(node.name.clone()));
            }
            if !seen.insert(node.name.as_str()) {
                return Err(ConfigurationError::DuplicateName(node.name.clone()));
            }
        }

        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::BuiltinType;

    struct BuiltinsOnly;

    impl TypeCatalog for BuiltinsOnly {
        fn is_registered(&self, node_type: &NodeType) -> bool {
            node_type.builtin().is_some()
        }
    }

    fn validate(nodes: Vec<NodeSpec>) -> Result<Vec<NodeSpec>, ConfigurationError> {
        GraphValidator::new(&BuiltinsOnly).validate(nodes)
    }

    #[test]
    fn accepts_and_returns_nodes_unchanged() {
        let nodes = vec![
            NodeSpec::new("a", BuiltinType::Select).with_upstream(["data"]),
            NodeSpec::new("b", BuiltinType::Filter).with_upstream(["a"]),
        ];
        assert_eq!(validate(nodes.clone()).unwrap(), nodes);
    }

    #[test]
    fn empty_input_is_empty_graph() {
        assert_eq!(validate(Vec::new()).unwrap_err(), ConfigurationError::EmptyGraph);
    }

    #[test]
    fn only_unknown_types_is_empty_graph() {
        let err = validate(vec![NodeSpec::new("p", "pivot")]).unwrap_err();
        assert_eq!(err, ConfigurationError::EmptyGraph);
    }

    #[test]
    fn one_unknown_type_rejects_everything() {
        let err = validate(vec![
            NodeSpec::new("a", BuiltinType::Select).with_upstream(["data"]),
            NodeSpec::new("p", "pivot").with_upstream(["a"]),
        ])
        .unwrap_err();

        assert_eq!(
            err,
            ConfigurationError::UnknownType {
                node: "p".into(),
                node_type: "pivot".into()
            }
        );
    }

    #[test]
    fn duplicate_and_invalid_names() {
        let dup = validate(vec![
            NodeSpec::new("a", BuiltinType::Select),
            NodeSpec::new("a", BuiltinType::Select),
        ])
        .unwrap_err();
        assert_eq!(dup, ConfigurationError::DuplicateName("a".into()));

        let empty = validate(vec![NodeSpec::new("", BuiltinType::Select)]).unwrap_err();
        assert_eq!(empty, ConfigurationError::EmptyName);

        let invalid = validate(vec![NodeSpec::new("my model", BuiltinType::Select)]).unwrap_err();
        assert_eq!(invalid, ConfigurationError::InvalidName("my model".into()));
    }
}
