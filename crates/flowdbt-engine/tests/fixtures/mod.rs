//! Test fixtures for engine adapter integration tests
//!
//! Builds a minimal dbt project backed by DuckDB in a temporary directory.

use std::path::Path;

pub const DBT_PROJECT_YML: &str = "\
name: flowdbt_fixture
version: '1.0'
profile: flowdbt_fixture
model-paths: ['models']
seed-paths: ['seeds']
";

pub const PROFILES_YML: &str = "\
flowdbt_fixture:
  target: dev
  outputs:
    dev:
      type: duckdb
      path: \"{{ var('db_path') }}\"
";

pub const ORDERS_CSV: &str = "\
id,customer_id,amount
1,10,25.0
2,11,150.0
3,10,310.5
";

/// Write the project skeleton under `root`
pub fn write_dbt_project(root: &Path) {
    std::fs::create_dir_all(root.join("models")).unwrap();
    std::fs::create_dir_all(root.join("seeds")).unwrap();
    std::fs::write(root.join("dbt_project.yml"), DBT_PROJECT_YML).unwrap();
    std::fs::write(root.join("profiles.yml"), PROFILES_YML).unwrap();
    std::fs::write(root.join("seeds/orders.csv"), ORDERS_CSV).unwrap();
}

/// A model over the fixture seed
pub fn write_model(root: &Path, name: &str, sql: &str) {
    std::fs::write(root.join("models").join(format!("{name}.sql")), sql).unwrap();
}
