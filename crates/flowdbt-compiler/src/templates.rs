//! Template bodies, one per node type
//!
//! Placeholder names in a body must match the keys the type's resolver
//! produces. Rendering is strict, so a mismatch fails instead of emitting an
//! empty slot.

use std::collections::BTreeMap;
use std::path::Path;

use flowdbt_graph::BuiltinType;
use walkdir::WalkDir;

const TEMPLATE_EXTENSION: &str = "sql";

#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    bodies: BTreeMap<String, String>,
}

impl TemplateStore {
    /// An empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Bodies for every built-in type
    pub fn builtin() -> Self {
        let mut store = Self::new();
        for t in BuiltinType::ALL {
            store.insert(t.as_str(), builtin_body(t));
        }
        store
    }

    /// Built-ins overlaid with `<type>.sql` files from `dir`
    pub fn with_dir(dir: &Path) -> Result<Self, TemplateStoreError> {
        let mut store = Self::builtin();
        store.load_dir(dir)?;
        Ok(store)
    }

    /// Read `<type>.sql` files from `dir`, replacing bodies of the same name
    pub fn load_dir(&mut self, dir: &Path) -> Result<usize, TemplateStoreError> {
        if !dir.is_dir() {
            return Err(TemplateStoreError::MissingDir(dir.display().to_string()));
        }

        let mut loaded = 0;
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| TemplateStoreError::IoError(dir.display().to_string(), e.to_string()))?;
            let path = entry.path();

            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some(TEMPLATE_EXTENSION)
            {
                continue;
            }

            let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let body = std::fs::read_to_string(path)
                .map_err(|e| TemplateStoreError::IoError(path.display().to_string(), e.to_string()))?;

            tracing::debug!(template = name, path = %path.display(), "loaded template override");
            self.insert(name, body);
            loaded += 1;
        }

        Ok(loaded)
    }

    pub fn insert(&mut self, node_type: impl Into<String>, body: impl Into<String>) {
        self.bodies.insert(node_type.into(), body.into());
    }

    /// The body addressed by a type name
    pub fn get(&self, node_type: &str) -> Option<&str> {
        self.bodies.get(node_type).map(String::as_str)
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.bodies.contains_key(node_type)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.bodies.keys().map(String::as_str)
    }
}

fn builtin_body(node_type: BuiltinType) -> &'static str {
    match node_type {
        BuiltinType::Select => include_str!("../templates/select.sql"),
        BuiltinType::Filter => include_str!("../templates/filter.sql"),
        BuiltinType::Merge => include_str!("../templates/merge.sql"),
        BuiltinType::Append => include_str!("../templates/append.sql"),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateStoreError {
    #[error("Templates directory not found: {0}")]
    MissingDir(String),

    #[error("Failed to read template {0}: {1}")]
    IoError(String, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_store_covers_every_builtin_type() {
        let store = TemplateStore::builtin();
        for t in BuiltinType::ALL {
            assert!(store.contains(t.as_str()), "missing template for {t}");
        }
        assert!(store.get("select").unwrap().contains("{{ columns }}"));
    }

    #[test]
    fn directory_overrides_and_extends() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("select.sql"), "select {{ columns }} from {{ source }} limit 10\n").unwrap();
        std::fs::write(dir.path().join("dedupe.sql"), "select distinct * from {{ source }}\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "not a template").unwrap();

        let store = TemplateStore::with_dir(dir.path()).unwrap();

        assert!(store.get("select").unwrap().ends_with("limit 10\n"));
        assert!(store.contains("dedupe"));
        assert!(store.contains("merge"));
        assert!(!store.contains("README"));
    }

    #[test]
    fn missing_directory() {
        let err = TemplateStore::with_dir(Path::new("/no/such/templates")).unwrap_err();
        assert!(matches!(err, TemplateStoreError::MissingDir(_)));
    }
}
