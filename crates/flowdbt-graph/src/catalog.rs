//! Data-source catalog
//!
//! Names usable as leaf upstream references that are not nodes themselves:
//! the explicitly configured list plus every seed file the engine will load.

use flowdbt_core::Config;
use std::collections::BTreeSet;
use std::path::Path;
use walkdir::WalkDir;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSourceCatalog {
    names: BTreeSet<String>,
}

impl DataSourceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Build the catalog from configuration, scanning the seeds directory if set
    pub fn from_config(config: &Config) -> Result<Self, CatalogError> {
        let mut catalog = Self::from_names(config.sources.names.iter().cloned());

        if let Some(seeds_dir) = config.seeds_path() {
            catalog.add_seeds_dir(&seeds_dir)?;
        }

        Ok(catalog)
    }

    /// Register every file stem in `dir` (non-recursive) as a source
    pub fn add_seeds_dir(&mut self, dir: &Path) -> Result<(), CatalogError> {
        if !dir.is_dir() {
            return Err(CatalogError::MissingSeedsDir(dir.display().to_string()));
        }

        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| CatalogError::IoError(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }

            if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    self.names.insert(stem.to_string());
                }
            }
        }

        Ok(())
    }

    pub fn insert(&mut self, name: impl Into<String>) -> bool {
        self.names.insert(name.into())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Seeds directory not found: {0}")]
    MissingSeedsDir(String),

    #[error("Failed to scan seeds directory: {0}")]
    IoError(String),
}
