//! Model compilation for flowdbt
//!
//! This crate handles:
//! - Resolving a node's settings into template parameters, one resolver per type
//! - Storing template bodies (built-in and directory overrides)
//! - Rendering templates into compiled models with MiniJinja
//! - Writing artifacts atomically along with a dependency manifest

pub mod resolver;
pub mod templates;
pub mod compiler;
pub mod manifest;
pub mod writer;

pub use resolver::{
    builtin_resolver, check_arity, AppendSettings, FilterSettings, MergeSettings, ResolverRegistry,
    SelectSettings, SettingsReader, TemplateParams, TypeResolver,
};
pub use templates::{TemplateStore, TemplateStoreError};
pub use compiler::{CompiledModel, ModelCompiler};
pub use manifest::{DependencyManifest, ManifestEntry};
pub use writer::{ArtifactWriter, WriteSummary};
