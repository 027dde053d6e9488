//! External engine boundary
//!
//! The core hands compiled artifacts to an external transformation engine
//! through the [`EngineAdapter`] trait. Adapters:
//!
//! - [`DbtCliAdapter`]: drives the `dbt` command line
//! - [`MockEngine`]: records calls, for tests
//!
//! [`EngineSession`] bounds every call with a timeout and a cancellation
//! token. [`DuckDbInspector`] reads materialized results back.

pub mod adapter;
pub mod dbt;
pub mod inspect;
pub mod mock;
pub mod session;

pub use adapter::{EngineAdapter, EngineOperation, EngineOutcome};
pub use dbt::{DbtCliAdapter, DBT_PROJECT_FILE};
pub use inspect::{DuckDbInspector, InspectError, ResultInspector, ResultMode, ResultSet};
pub use mock::{EngineCall, MockEngine};
pub use session::EngineSession;
