//! Catalog configuration, loaded from JSON.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::namespace::NamespaceManager;
use crate::vocab::{BASE_DATA_NS, BASE_NU_SCHEMA_NS, BASE_SCHEMA_NS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Snapshot file backing the graph store.
    pub store_path: PathBuf,
    /// Context commands read from and write to.
    pub default_context: String,
    /// Prefix → namespace bindings for abbreviated identifiers.
    pub prefixes: IndexMap<String, String>,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        let mut prefixes = IndexMap::new();
        prefixes.insert("sciunit".to_string(), BASE_SCHEMA_NS.to_string());
        prefixes.insert("neuronunit".to_string(), BASE_NU_SCHEMA_NS.to_string());
        Self {
            store_path: PathBuf::from("./catalog.scpd"),
            default_context: format!("{BASE_DATA_NS}default"),
            prefixes,
            log_filter: "warn".to_string(),
        }
    }
}

impl CatalogConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Defaults when `path` does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn namespaces(&self) -> NamespaceManager {
        NamespaceManager::from_bindings(&self.prefixes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scicat.json");
        std::fs::write(&path, r#"{ "default_context": "urn:ctx1" }"#).unwrap();

        let config = CatalogConfig::load_or_default(&path).unwrap();
        assert_eq!(config.default_context, "urn:ctx1");
        assert_eq!(config.store_path, PathBuf::from("./catalog.scpd"));
        assert_eq!(config.log_filter, "warn");
        assert_eq!(
            config.namespaces().abbreviate(&format!("{BASE_SCHEMA_NS}Model")),
            "sciunit:Model"
        );
    }

    #[test]
    fn missing_file_gives_defaults_and_bad_json_fails() {
        let dir = tempdir().unwrap();
        assert_eq!(
            CatalogConfig::load_or_default(&dir.path().join("absent.json")).unwrap(),
            CatalogConfig::default()
        );

        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ not json").unwrap();
        assert!(CatalogConfig::load_or_default(&bad).is_err());
    }
}
