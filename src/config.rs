//! Trie configuration

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for a [`VerkleTrie`](crate::VerkleTrie)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrieConfig {
    /// Recompute the commitment of every node fetched from the store and
    /// reject it if it differs from the placeholder it replaces
    pub verify_resolved_nodes: bool,
    /// Maximum number of nodes held by the read-resolution cache (0 disables it)
    pub resolution_cache_limit: usize,
}

impl Default for TrieConfig {
    fn default() -> Self {
        TrieConfig {
            verify_resolved_nodes: true,
            resolution_cache_limit: 4096,
        }
    }
}

impl TrieConfig {
    /// Load a config from a JSON file, falling back to defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the config as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = TrieConfig::load(&dir.path().join("trie.json")).unwrap();
        assert_eq!(config, TrieConfig::default());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trie.json");
        let config = TrieConfig {
            verify_resolved_nodes: false,
            resolution_cache_limit: 16,
        };
        config.save(&path).unwrap();
        assert_eq!(TrieConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trie.json");
        std::fs::write(&path, r#"{ "resolution_cache_limit": 0 }"#).unwrap();

        let config = TrieConfig::load(&path).unwrap();
        assert!(config.verify_resolved_nodes);
        assert_eq!(config.resolution_cache_limit, 0);
    }
}
