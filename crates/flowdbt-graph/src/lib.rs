//! Node graph declaration, validation and ordering
//!
//! This crate handles:
//! - Node declarations (`NodeSpec`) and their types
//! - The data-source catalog of leaf inputs
//! - Structural validation before compilation
//! - Building the dependency graph (DAG), cycle detection, topological order
//! - Selector expansion for partial execution

pub mod node;
pub mod catalog;
pub mod validator;
pub mod dag;
pub mod selector;

pub use node::{is_valid_identifier, BuiltinType, NodeFileError, NodeSpec, NodeType, Settings};
pub use catalog::{CatalogError, DataSourceCatalog};
pub use validator::{GraphValidator, TypeCatalog};
pub use dag::{DependencyGraph, NodeId, VertexKind};
pub use selector::{SelectionMode, Selector, SelectorError};
