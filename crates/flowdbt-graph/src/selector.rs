//! Node selectors for partial execution
//!
//! Syntax follows the engine's graph operators: `+x` pulls in every ancestor
//! of `x`, `x+` every descendant, `+x+` both.

use std::collections::HashSet;
use std::str::FromStr;

use flowdbt_core::ConfigurationError;

use crate::dag::{DependencyGraph, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Just the node
    Node,
    /// The node and its ancestors
    Ancestors,
    /// The node and its descendants
    Descendants,
    /// Ancestors, the node, and descendants
    Inclusive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub node: NodeId,
    pub mode: SelectionMode,
}

impl Selector {
    pub fn new(node: impl Into<NodeId>, mode: SelectionMode) -> Self {
        Self {
            node: node.into(),
            mode,
        }
    }

    pub fn inclusive(node: impl Into<NodeId>) -> Self {
        Self::new(node, SelectionMode::Inclusive)
    }

    pub fn ancestors(node: impl Into<NodeId>) -> Self {
        Self::new(node, SelectionMode::Ancestors)
    }

    /// Transitive closure of the selection, in topological order
    pub fn expand(&self, graph: &DependencyGraph) -> Result<Vec<NodeId>, ConfigurationError> {
        if !graph.contains(&self.node) {
            return Err(ConfigurationError::UnknownNode(self.node.clone()));
        }

        let mut selected: HashSet<NodeId> = HashSet::new();
        selected.insert(self.node.clone());

        if matches!(self.mode, SelectionMode::Ancestors | SelectionMode::Inclusive) {
            selected.extend(graph.upstream(&self.node));
        }
        if matches!(self.mode, SelectionMode::Descendants | SelectionMode::Inclusive) {
            selected.extend(graph.downstream(&self.node));
        }

        Ok(graph.in_topological_order(&selected))
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.mode {
            SelectionMode::Node => write!(f, "{}", self.node),
            SelectionMode::Ancestors => write!(f, "+{}", self.node),
            SelectionMode::Descendants => write!(f, "{}+", self.node),
            SelectionMode::Inclusive => write!(f, "+{}+", self.node),
        }
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (ancestors, rest) = match s.strip_prefix('+') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let (descendants, node) = match rest.strip_suffix('+') {
            Some(node) => (true, node),
            None => (false, rest),
        };

        if node.is_empty() || node.contains('+') {
            return Err(SelectorError(s.to_string()));
        }

        let mode = match (ancestors, descendants) {
            (false, false) => SelectionMode::Node,
            (true, false) => SelectionMode::Ancestors,
            (false, true) => SelectionMode::Descendants,
            (true, true) => SelectionMode::Inclusive,
        };

        Ok(Self::new(node, mode))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid selector '{0}', expected [+]<node>[+]")]
pub struct SelectorError(pub String);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataSourceCatalog;
    use crate::node::{BuiltinType, NodeSpec};
    use pretty_assertions::assert_eq;

    fn graph() -> DependencyGraph {
        let nodes = vec![
            NodeSpec::new("B", BuiltinType::Select).with_upstream(["A"]),
            NodeSpec::new("C", BuiltinType::Select).with_upstream(["B"]),
            NodeSpec::new("E", BuiltinType::Select).with_upstream(["D"]),
        ];
        DependencyGraph::build(&nodes, &DataSourceCatalog::from_names(["A", "D"])).unwrap()
    }

    #[test]
    fn inclusive_selection_of_middle_node() {
        let selected = Selector::inclusive("B").expand(&graph()).unwrap();
        assert_eq!(selected, vec!["A", "B", "C"]);
    }

    #[test]
    fn one_sided_selections() {
        let g = graph();
        assert_eq!(Selector::ancestors("C").expand(&g).unwrap(), vec!["A", "B", "C"]);
        assert_eq!(
            Selector::new("A", SelectionMode::Descendants).expand(&g).unwrap(),
            vec!["A", "B", "C"]
        );
        assert_eq!(Selector::new("E", SelectionMode::Node).expand(&g).unwrap(), vec!["E"]);
    }

    #[test]
    fn unknown_node_is_rejected() {
        let err = Selector::inclusive("nope").expand(&graph()).unwrap_err();
        assert_eq!(err, ConfigurationError::UnknownNode("nope".into()));
    }

    #[test]
    fn parse_and_display() {
        for text in ["b", "+b", "b+", "+b+"] {
            let selector: Selector = text.parse().unwrap();
            assert_eq!(selector.node, "b");
            assert_eq!(selector.to_string(), text);
        }

        assert_eq!("+b+".parse::<Selector>().unwrap().mode, SelectionMode::Inclusive);
        assert!("++".parse::<Selector>().is_err());
        assert!("+a+b".parse::<Selector>().is_err());
    }
}
