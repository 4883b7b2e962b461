//! In-memory object backend.
//!
//! Used for tests and ephemeral runs. All data is lost when dropped.

use std::collections::BTreeMap;
use std::ops::Bound;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use tokio::sync::RwLock;

use super::page::build_page;
use super::traits::{ListPage, ListRequest, ObjectBackend, ObjectMeta, StorageError};

/// Default number of entries per list page, matching S3's `MaxKeys`.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    meta: ObjectMeta,
}

/// Flat, sorted, in-memory object store.
///
/// Thread-safe via internal `RwLock`. `page_size` caps every list call so
/// callers are forced through continuation tokens the way a real store
/// would force them.
#[derive(Debug)]
pub struct MemoryBackend {
    objects: RwLock<BTreeMap<String, StoredObject>>,
    page_size: usize,
    base_url: String,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Backend that never returns more than `page_size` entries per list call.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            page_size: page_size.max(1),
            base_url: "memory://".to_string(),
        }
    }

    /// Prefix used by [`ObjectBackend::locator`].
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Raw object contents, for inspection.
    pub async fn get(&self, key: &str) -> Option<Bytes> {
        self.objects.read().await.get(key).map(|o| o.data.clone())
    }

    /// Every key currently stored, in order.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl ObjectBackend for MemoryBackend {
    #[tracing::instrument(level = "trace", skip(self, data), fields(size = data.len()))]
    async fn put_object(&self, key: &str, data: Bytes) -> Result<ObjectMeta, StorageError> {
        let meta = ObjectMeta {
            key: key.to_string(),
            size: data.len() as u64,
            last_modified: Utc::now(),
        };
        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                data,
                meta: meta.clone(),
            },
        );
        Ok(meta)
    }

    async fn head_object(&self, key: &str) -> Result<Option<ObjectMeta>, StorageError> {
        Ok(self.objects.read().await.get(key).map(|o| o.meta.clone()))
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn delete_object(&self, key: &str) -> Result<(), StorageError> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn list_objects(&self, request: ListRequest<'_>) -> Result<ListPage, StorageError> {
        let objects = self.objects.read().await;
        let candidates: Vec<ObjectMeta> = objects
            .range::<str, _>((Bound::Included(request.prefix), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(request.prefix))
            .map(|(_, object)| object.meta.clone())
            .collect();
        drop(objects);

        let request = ListRequest {
            max_keys: request.max_keys.min(self.page_size),
            ..request
        };
        Ok(build_page(candidates, &request))
    }

    fn locator(&self, key: &str) -> String {
        format!("{}{}", self.base_url, key)
    }
}
