use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, Result};
use crate::storage::wal::SyncMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub index_root: PathBuf,

    // Delta indexing
    pub indexer_batch_size: usize,              // queued commands before an automatic flush
    pub cascade_fanout_threshold: usize,        // secondary parents before the parent is cascaded instead
    pub max_atomic_transformation_cost: u64,    // transformer cost ceiling during atomic passes
    pub writer_lock_timeout_ms: u64,            // wait for the per-store main index writer

    // Full-text backlog
    pub fts_batch_size: usize,                  // nodes per scheduled drain
    pub fts_write_ceiling: usize,               // documents per backlog delta

    pub journal_sync: SyncMode,

    // Generation
    pub always_indexed_container_types: Vec<String>,
    pub exclude_from_index_property: String,
    pub locale_property: String,
    pub default_locale: String,
    pub child_cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            index_root: PathBuf::from("./data/index"),

            indexer_batch_size: 1000,
            cascade_fanout_threshold: 5,
            max_atomic_transformation_cost: 20,
            writer_lock_timeout_ms: 10_000,

            fts_batch_size: 1000,
            fts_write_ceiling: 1000,

            journal_sync: SyncMode::Immediate,

            always_indexed_container_types: vec![
                "{cm}folder".to_string(),
                "{cm}category".to_string(),
                "{sys}store_root".to_string(),
            ],
            exclude_from_index_property: "{sys}excludeFromIndex".to_string(),
            locale_property: "{sys}locale".to_string(),
            default_locale: "en".to_string(),
            child_cache_capacity: 4096,
        }
    }
}

impl Config {
    pub fn with_index_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.index_root = root.into();
        self
    }

    /// Loads a JSON configuration file; missing keys take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.indexer_batch_size == 0 {
            return Err(Error::invalid_argument("indexer_batch_size must be positive"));
        }
        if self.fts_write_ceiling == 0 || self.fts_batch_size == 0 {
            return Err(Error::invalid_argument("backlog batch sizes must be positive"));
        }
        if self.child_cache_capacity == 0 {
            return Err(Error::invalid_argument("child_cache_capacity must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"cascade_fanout_threshold": 2, "journal_sync": "None"}}"#).unwrap();

        let config = Config::from_json_file(file.path()).unwrap();
        assert_eq!(config.cascade_fanout_threshold, 2);
        assert_eq!(config.journal_sync, SyncMode::None);
        assert_eq!(config.indexer_batch_size, 1000);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = Config { indexer_batch_size: 0, ..Config::default() };
        assert!(config.validate().is_err());
    }
}
