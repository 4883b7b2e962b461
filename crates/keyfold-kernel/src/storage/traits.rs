//! Object backend seam and shared types.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::io;

/// Metadata for one object as the backend reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// One page of a prefix listing.
///
/// With a delimiter, keys that contain it after the prefix are rolled up into
/// `common_prefixes` (each ending in the delimiter) instead of `objects`.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub objects: Vec<ObjectMeta>,
    pub common_prefixes: Vec<String>,
    /// Pass back as `continuation` to fetch the next page. `None` on the last.
    pub next_token: Option<String>,
}

/// Parameters of a single list call.
#[derive(Debug, Clone)]
pub struct ListRequest<'a> {
    pub prefix: &'a str,
    pub delimiter: Option<char>,
    pub continuation: Option<&'a str>,
    pub max_keys: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("directory not empty: {0}")]
    NotEmpty(String),

    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("{op} {key}: {source}")]
    Io {
        op: &'static str,
        key: String,
        #[source]
        source: io::Error,
    },

    #[error("backend: {0}")]
    Backend(String),
}

/// A flat key-value object store with prefix listing.
///
/// Keys are opaque UTF-8 strings; the backend knows nothing about folders.
/// Implementations may page listings however they like as long as
/// `next_token` resumes strictly after the last returned entry.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Store an object, replacing any previous object under the same key.
    async fn put_object(&self, key: &str, data: Bytes) -> Result<ObjectMeta, StorageError>;

    /// Metadata for `key`, or `None` if no such object exists.
    async fn head_object(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError>;

    /// Delete `key`. Deleting a missing key is not an error.
    async fn delete_object(&self, key: &str) -> Result<(), StorageError>;

    /// List one page of keys starting with `request.prefix`, in key order.
    async fn list_objects(&self, request: ListRequest<'_>) -> Result<ListPage, StorageError>;

    /// Locator handed to clients for a stored object (e.g. a URL).
    fn locator(&self, key: &str) -> String;
}
