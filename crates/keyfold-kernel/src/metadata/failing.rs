//! Metadata store wrapper that injects failures.
//!
//! Drives the paths where the object is already gone but its record cannot
//! be removed.

use std::sync::Mutex;

use async_trait::async_trait;
use keyfold_types::{FileRecord, ListOptions, NewFileRecord, OwnerId};

use super::traits::{MetadataError, MetadataStore};

/// Fails `delete_one` for filenames containing any of the needles.
pub struct FailingMetadataStore<M: MetadataStore> {
    inner: M,
    failing_deletes: Mutex<Vec<String>>,
}

impl<M: MetadataStore> FailingMetadataStore<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            failing_deletes: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }

    pub fn fail_deletes_matching(&self, needles: Vec<String>) {
        match self.failing_deletes.lock() {
            Ok(mut guard) => *guard = needles,
            Err(poisoned) => *poisoned.into_inner() = needles,
        }
    }

    fn delete_fails(&self, filename: &str) -> bool {
        let needles = match self.failing_deletes.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        needles.iter().any(|n| filename.contains(n.as_str()))
    }
}

#[async_trait]
impl<M: MetadataStore> MetadataStore for FailingMetadataStore<M> {
    async fn insert(&self, record: NewFileRecord) -> Result<FileRecord, MetadataError> {
        self.inner.insert(record).await
    }

    async fn find_one(
        &self,
        owner: &OwnerId,
        directory: &str,
        filename: &str,
    ) -> Result<FileRecord, MetadataError> {
        self.inner.find_one(owner, directory, filename).await
    }

    async fn delete_one(
        &self,
        owner: &OwnerId,
        directory: &str,
        filename: &str,
    ) -> Result<FileRecord, MetadataError> {
        if self.delete_fails(filename) {
            return Err(MetadataError::Corrupt {
                id: 0,
                reason: format!("injected delete failure for {owner}/{directory}{filename}"),
            });
        }
        self.inner.delete_one(owner, directory, filename).await
    }

    async fn list_by_owner(
        &self,
        owner: &OwnerId,
        options: &ListOptions,
    ) -> Result<Vec<FileRecord>, MetadataError> {
        self.inner.list_by_owner(owner, options).await
    }

    async fn delete_all_by_owner(&self, owner: &OwnerId) -> Result<u64, MetadataError> {
        self.inner.delete_all_by_owner(owner).await
    }
}
