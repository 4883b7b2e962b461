//! Kernel configuration.
//!
//! Read from TOML. Every field has a default, so an empty file (or no file
//! at all) gives a persistent setup under the XDG data directory:
//!
//! ```toml
//! public_base_url = "https://files.example.com/"
//! max_upload_bytes = 20000000
//! operation_timeout_secs = 30
//!
//! [storage]
//! backend = "local"
//! root = "/var/lib/keyfold/objects"
//!
//! [metadata]
//! backend = "sqlite"
//! path = "/var/lib/keyfold/metadata.db"
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::metadata::{MemoryMetadataStore, MetadataStore, SqliteMetadataStore};
use crate::paths;
use crate::storage::{LIST_PAGE_SIZE, LocalBackend, MemoryBackend, ObjectBackend, ObjectStorage};

/// Uploads above this many bytes are refused.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20_000_000;

pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case", deny_unknown_fields)]
pub enum StorageConfig {
    Memory,
    /// One flat file per object inside `root`.
    Local { root: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case", deny_unknown_fields)]
pub enum MetadataConfig {
    Memory,
    Sqlite { path: PathBuf },
}

/// Configuration for a [`Vfs`](crate::Vfs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KernelConfig {
    pub storage: StorageConfig,
    pub metadata: MetadataConfig,
    /// Prefix for the locators handed out for stored objects. When unset the
    /// backend's own scheme is used (`memory://`, `file://`).
    pub public_base_url: Option<String>,
    pub list_page_size: usize,
    pub max_upload_bytes: u64,
    /// Whole seconds; 0 disables the deadline.
    pub operation_timeout_secs: u64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::persistent()
    }
}

impl KernelConfig {
    /// Everything in memory. Nothing survives the process.
    pub fn transient() -> Self {
        Self {
            storage: StorageConfig::Memory,
            metadata: MetadataConfig::Memory,
            ..Self::persistent()
        }
    }

    /// Local objects and SQLite metadata under the XDG data directory.
    pub fn persistent() -> Self {
        Self {
            storage: StorageConfig::Local {
                root: paths::objects_dir(),
            },
            metadata: MetadataConfig::Sqlite {
                path: paths::metadata_db(),
            },
            public_base_url: None,
            list_page_size: LIST_PAGE_SIZE,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
        }
    }

    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        toml::from_str(source).context("parsing keyfold config")
    }

    /// Load `path`, or the default config file when `path` is `None`.
    ///
    /// A missing default file is not an error; a missing explicit one is.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (paths::config_file(), false),
        };

        match std::fs::read_to_string(&path) {
            Ok(source) => Self::from_toml_str(&source)
                .with_context(|| format!("in config file {}", path.display())),
            Err(e) if !explicit && e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => {
                Err(e).with_context(|| format!("reading config file {}", path.display()))
            }
        }
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        (self.operation_timeout_secs > 0).then(|| Duration::from_secs(self.operation_timeout_secs))
    }

    /// Storage adapter over the configured backend.
    pub fn object_storage(&self) -> ObjectStorage {
        let backend: Arc<dyn ObjectBackend> = match &self.storage {
            StorageConfig::Memory => {
                let backend = MemoryBackend::new();
                match &self.public_base_url {
                    Some(url) => Arc::new(backend.with_base_url(url.clone())),
                    None => Arc::new(backend),
                }
            }
            StorageConfig::Local { root } => {
                let backend = LocalBackend::new(root.clone());
                match &self.public_base_url {
                    Some(url) => Arc::new(backend.with_base_url(url.clone())),
                    None => Arc::new(backend),
                }
            }
        };
        ObjectStorage::new(backend).with_page_size(self.list_page_size)
    }

    pub fn metadata_store(&self) -> anyhow::Result<Arc<dyn MetadataStore>> {
        Ok(match &self.metadata {
            MetadataConfig::Memory => Arc::new(MemoryMetadataStore::new()),
            MetadataConfig::Sqlite { path } => Arc::new(SqliteMetadataStore::open(path)?),
        })
    }
}
