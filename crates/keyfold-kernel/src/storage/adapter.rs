//! Folder semantics on top of a flat [`ObjectBackend`].
//!
//! A directory exists when either of two independent predicates holds:
//!
//! - a folder marker (zero-byte object whose key is the directory key) exists;
//! - at least one object lives under the directory key.
//!
//! Neither is ever stored as a flag. Every listing here drains all pages
//! before returning.

use std::sync::Arc;

use bytes::Bytes;

use super::traits::{ListRequest, ObjectBackend, ObjectMeta, StorageError};
use crate::path::{SEPARATOR, StorageKey};

/// Page size requested from the backend when the adapter drains a listing.
pub const LIST_PAGE_SIZE: usize = 1000;

/// Result of a successful put.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: StorageKey,
    pub locator: String,
    pub size: u64,
}

/// A key that could not be removed during a subtree sweep.
#[derive(Debug)]
pub struct FailedDelete {
    pub key: String,
    pub error: StorageError,
}

/// Outcome of [`ObjectStorage::delete_subtree`].
#[derive(Debug, Default)]
pub struct SubtreeDeletion {
    /// Keys that are gone, in the order they were deleted.
    pub deleted: Vec<String>,
    /// Keys that are still there.
    pub failed: Vec<FailedDelete>,
}

impl SubtreeDeletion {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The object storage adapter.
#[derive(Clone)]
pub struct ObjectStorage {
    backend: Arc<dyn ObjectBackend>,
    page_size: usize,
}

impl ObjectStorage {
    pub fn new(backend: Arc<dyn ObjectBackend>) -> Self {
        Self {
            backend,
            page_size: LIST_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn backend(&self) -> &Arc<dyn ObjectBackend> {
        &self.backend
    }

    /// Write a file object. Overwrites silently.
    pub async fn put(&self, key: &StorageKey, data: Bytes) -> Result<StoredObject, StorageError> {
        if key.is_directory() {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
                reason: "file keys may not end in the separator",
            });
        }
        let meta = self.backend.put_object(key.as_str(), data).await?;
        tracing::debug!(key = %key, size = meta.size, "stored object");
        Ok(StoredObject {
            key: key.clone(),
            locator: self.backend.locator(key.as_str()),
            size: meta.size,
        })
    }

    /// File keys directly under `prefix`.
    ///
    /// The directory's own marker is not a child. An empty result does not
    /// say whether the directory exists.
    pub async fn list_children(&self, prefix: &StorageKey) -> Result<Vec<String>, StorageError> {
        Self::require_directory(prefix)?;
        let (objects, _) = self.drain(prefix.as_str(), Some(SEPARATOR)).await?;
        Ok(objects
            .into_iter()
            .map(|meta| meta.key)
            .filter(|key| key != prefix.as_str())
            .collect())
    }

    /// Names of the directories directly under `prefix`.
    ///
    /// `NotFound` when there is neither a marker nor anything else under it.
    pub async fn list_folder_names(&self, prefix: &StorageKey) -> Result<Vec<String>, StorageError> {
        Self::require_directory(prefix)?;
        let (objects, common_prefixes) = self.drain(prefix.as_str(), Some(SEPARATOR)).await?;
        if objects.is_empty() && common_prefixes.is_empty() {
            return Err(StorageError::NotFound(prefix.to_string()));
        }

        Ok(common_prefixes
            .iter()
            .filter_map(|common| {
                common
                    .strip_prefix(prefix.as_str())
                    .and_then(|rest| rest.strip_suffix(SEPARATOR))
                    .map(str::to_string)
            })
            .collect())
    }

    /// Write a folder marker for `name` under `prefix`.
    pub async fn create_folder(
        &self,
        prefix: &StorageKey,
        name: &str,
    ) -> Result<StorageKey, StorageError> {
        Self::require_directory(prefix)?;
        let folder = prefix.child_folder(name);
        if self.directory_exists(&folder).await? {
            return Err(StorageError::AlreadyExists(folder.to_string()));
        }
        self.backend.put_object(folder.as_str(), Bytes::new()).await?;
        tracing::debug!(key = %folder, "created folder marker");
        Ok(folder)
    }

    /// Delete one file object, or one folder marker with nothing under it.
    pub async fn delete_leaf(&self, key: &StorageKey) -> Result<(), StorageError> {
        if key.is_directory() {
            if self.has_descendants(key).await? {
                return Err(StorageError::NotEmpty(key.to_string()));
            }
            if !self.has_marker(key).await? {
                return Err(StorageError::NotFound(key.to_string()));
            }
        } else if self.backend.head_object(key.as_str()).await?.is_none() {
            return Err(StorageError::NotFound(key.to_string()));
        }

        self.backend.delete_object(key.as_str()).await?;
        tracing::debug!(key = %key, "deleted leaf");
        Ok(())
    }

    /// Delete every key under `prefix`, marker included.
    ///
    /// The full key list is collected before the first delete. Individual
    /// delete failures are recorded and the sweep carries on.
    pub async fn delete_subtree(&self, prefix: &StorageKey) -> Result<SubtreeDeletion, StorageError> {
        Self::require_directory(prefix)?;
        let keys = self.list_keys(prefix).await?;
        if keys.is_empty() {
            return Err(StorageError::NotFound(prefix.to_string()));
        }

        let mut outcome = SubtreeDeletion::default();
        for key in keys {
            match self.backend.delete_object(&key).await {
                Ok(()) => outcome.deleted.push(key),
                Err(error) => {
                    tracing::warn!(key = %key, error = %error, "subtree sweep left a key behind");
                    outcome.failed.push(FailedDelete { key, error });
                }
            }
        }
        tracing::debug!(
            prefix = %prefix,
            deleted = outcome.deleted.len(),
            failed = outcome.failed.len(),
            "swept subtree"
        );
        Ok(outcome)
    }

    /// Every key under `prefix`, recursively, in key order.
    pub async fn list_keys(&self, prefix: &StorageKey) -> Result<Vec<String>, StorageError> {
        let (objects, _) = self.drain(prefix.as_str(), None).await?;
        Ok(objects.into_iter().map(|meta| meta.key).collect())
    }

    /// Marker present, or anything at all stored under the directory key.
    pub async fn directory_exists(&self, key: &StorageKey) -> Result<bool, StorageError> {
        Ok(self.has_marker(key).await? || self.has_descendants(key).await?)
    }

    async fn has_marker(&self, key: &StorageKey) -> Result<bool, StorageError> {
        Ok(self.backend.head_object(key.as_str()).await?.is_some())
    }

    async fn has_descendants(&self, key: &StorageKey) -> Result<bool, StorageError> {
        // The marker sorts first, so two entries are normally enough; keep
        // paging only if the backend hands back fewer.
        let mut token: Option<String> = None;
        loop {
            let page = self
                .backend
                .list_objects(ListRequest {
                    prefix: key.as_str(),
                    delimiter: None,
                    continuation: token.as_deref(),
                    max_keys: 2,
                })
                .await?;
            if page.objects.iter().any(|meta| meta.key != key.as_str()) {
                return Ok(true);
            }
            match page.next_token {
                Some(next) if token.as_deref() != Some(next.as_str()) => token = Some(next),
                _ => return Ok(false),
            }
        }
    }

    async fn drain(
        &self,
        prefix: &str,
        delimiter: Option<char>,
    ) -> Result<(Vec<ObjectMeta>, Vec<String>), StorageError> {
        let mut objects = Vec::new();
        let mut common_prefixes = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let page = self
                .backend
                .list_objects(ListRequest {
                    prefix,
                    delimiter,
                    continuation: token.as_deref(),
                    max_keys: self.page_size,
                })
                .await?;
            objects.extend(page.objects);
            common_prefixes.extend(page.common_prefixes);

            match page.next_token {
                Some(next) if token.as_deref() != Some(next.as_str()) => token = Some(next),
                Some(next) => {
                    return Err(StorageError::Backend(format!(
                        "listing {prefix} stalled at continuation token {next}"
                    )));
                }
                None => break,
            }
        }

        Ok((objects, common_prefixes))
    }

    fn require_directory(prefix: &StorageKey) -> Result<(), StorageError> {
        if prefix.is_directory() {
            Ok(())
        } else {
            Err(StorageError::InvalidKey {
                key: prefix.to_string(),
                reason: "directory keys must end in the separator",
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;
    use keyfold_types::OwnerId;

    fn storage(page_size: usize) -> (Arc<MemoryBackend>, ObjectStorage) {
        let backend = Arc::new(MemoryBackend::with_page_size(page_size));
        (backend.clone(), ObjectStorage::new(backend))
    }

    fn owner() -> OwnerId {
        OwnerId::new("u1").unwrap()
    }

    async fn put(storage: &ObjectStorage, dir: &str, name: &str) {
        storage
            .put(&StorageKey::file(&owner(), dir, name), Bytes::from_static(b"x"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_put_rejects_directory_keys() {
        let (_, storage) = storage(10);
        let err = storage
            .put(&StorageKey::directory(&owner(), "docs/"), Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey { .. }));
    }

    #[tokio::test]
    async fn test_list_children_is_not_recursive_and_skips_marker() {
        let (_, storage) = storage(10);
        let root = StorageKey::scope(&owner());
        storage.create_folder(&root, "docs").await.unwrap();
        put(&storage, "docs/", "a.txt").await;
        put(&storage, "docs/sub/", "deep.txt").await;

        let children = storage
            .list_children(&StorageKey::directory(&owner(), "docs/"))
            .await
            .unwrap();
        assert_eq!(children, vec!["u1/docs/a.txt"]);
    }

    #[tokio::test]
    async fn test_list_folder_names_drains_small_pages() {
        let (_, storage) = storage(2);
        let root = StorageKey::scope(&owner());
        for name in ["a", "b", "c", "d", "e"] {
            storage.create_folder(&root, name).await.unwrap();
        }
        put(&storage, "", "top.txt").await;

        let names = storage.list_folder_names(&root).await.unwrap();
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_list_folder_names_not_found() {
        let (_, storage) = storage(10);
        let err = storage
            .list_folder_names(&StorageKey::directory(&owner(), "missing/"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_folder_exists_through_descendants_without_marker() {
        let (_, storage) = storage(10);
        put(&storage, "implied/", "file.txt").await;

        let implied = StorageKey::directory(&owner(), "implied/");
        assert!(storage.directory_exists(&implied).await.unwrap());
        assert!(storage.list_folder_names(&implied).await.unwrap().is_empty());

        let err = storage
            .create_folder(&StorageKey::scope(&owner()), "implied")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_delete_leaf_refuses_non_empty_directory() {
        let (backend, storage) = storage(10);
        let root = StorageKey::scope(&owner());
        let docs = storage.create_folder(&root, "docs").await.unwrap();
        put(&storage, "docs/", "a.txt").await;

        let err = storage.delete_leaf(&docs).await.unwrap_err();
        assert!(matches!(err, StorageError::NotEmpty(_)));
        assert_eq!(backend.keys().await, vec!["u1/docs/", "u1/docs/a.txt"]);
    }

    #[tokio::test]
    async fn test_delete_leaf_missing_file() {
        let (_, storage) = storage(10);
        let err = storage
            .delete_leaf(&StorageKey::file(&owner(), "", "ghost.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_subtree_collects_every_page() {
        let (backend, storage) = storage(3);
        let root = StorageKey::scope(&owner());
        storage.create_folder(&root, "docs").await.unwrap();
        for i in 0..7 {
            put(&storage, "docs/nested/", &format!("f{i}")).await;
        }
        put(&storage, "keep/", "k.txt").await;

        let outcome = storage
            .delete_subtree(&StorageKey::directory(&owner(), "docs/"))
            .await
            .unwrap();
        assert!(outcome.is_complete());
        assert_eq!(outcome.deleted.len(), 8);
        assert_eq!(backend.keys().await, vec!["u1/keep/k.txt"]);
    }

    #[tokio::test]
    async fn test_delete_subtree_not_found() {
        let (_, storage) = storage(10);
        let err = storage
            .delete_subtree(&StorageKey::directory(&owner(), "nothing/"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
