//! `goatfish.toml`: store location, codec and collection declarations.

use crate::core::codec::CodecKind;
use crate::core::collection::{Collection, DEFAULT_BATCH_SIZE, ModelConfig};
use crate::core::db::Store;
use crate::core::error::{GoatfishError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "goatfish.toml";
pub const DB_PATH_ENV: &str = "GOATFISH_DB";
pub const DEFAULT_DB_PATH: &str = "goatfish.db";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub codec: CodecKind,
    pub batch_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_PATH),
            codec: CodecKind::default(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub name: String,
    #[serde(default)]
    pub indexes: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoatfishConfig {
    pub store: StoreConfig,
    pub collections: Vec<CollectionConfig>,
}

impl GoatfishConfig {
    pub fn parse(content: &str) -> Result<Self> {
        let config: GoatfishConfig =
            toml::from_str(content).map_err(|e| GoatfishError::ConfigError(e.to_string()))?;
        if config.store.batch_size == 0 {
            return Err(GoatfishError::ConfigError(
                "store.batch_size must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// Reads `path`; a missing file yields the defaults (no collections).
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(GoatfishError::IoError)?;
        Self::parse(&content)
    }

    /// Database path after applying the `GOATFISH_DB` override.
    pub fn db_path(&self) -> PathBuf {
        match std::env::var_os(DB_PATH_ENV) {
            Some(p) if !p.is_empty() => PathBuf::from(p),
            _ => self.store.path.clone(),
        }
    }

    pub fn collection_config(&self, name: &str) -> Option<&CollectionConfig> {
        self.collections.iter().find(|c| c.name == name)
    }

    /// Builds a declared collection bound to `store`.
    pub fn collection(&self, name: &str, store: &Store) -> Result<Collection> {
        let declared = self.collection_config(name).ok_or_else(|| {
            GoatfishError::NotFound(format!("collection '{}' is not declared", name))
        })?;
        let mut model = ModelConfig::new(&declared.name)
            .with_store(store.clone())
            .with_codec(self.store.codec.build())
            .with_batch_size(self.store.batch_size);
        for index in &declared.indexes {
            model = model.index(index.iter().cloned());
        }
        Collection::new(model)
    }

    pub fn all_collections(&self, store: &Store) -> Result<Vec<Collection>> {
        self.collections
            .iter()
            .map(|c| self.collection(&c.name, store))
            .collect()
    }
}
