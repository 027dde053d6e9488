//! flowdbt project - pipeline orchestration
//!
//! This crate ties the pieces together:
//! - Compile pass: validate, build the graph, compile every model
//! - Project plan: execution order, lookup and selector expansion
//! - Build cycle: seed, compile, write and run, each stage gating the next

pub mod error;
pub mod plan;
pub mod project;

pub use error::{ProjectError, ProjectResult};
pub use plan::{ProjectPlan, Selection};
pub use project::Project;
