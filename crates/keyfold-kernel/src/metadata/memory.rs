//! In-memory metadata mirror.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use keyfold_types::{FileRecord, ListOptions, NewFileRecord, OwnerId};
use tokio::sync::RwLock;

use super::traits::{MetadataError, MetadataStore, compare_records};

type RecordKey = (OwnerId, String, String);

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    records: BTreeMap<RecordKey, FileRecord>,
}

/// Metadata mirror held in a map. All data is lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    inner: RwLock<Inner>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.records.is_empty()
    }
}

fn key(owner: &OwnerId, directory: &str, filename: &str) -> RecordKey {
    (owner.clone(), directory.to_string(), filename.to_string())
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn insert(&self, record: NewFileRecord) -> Result<FileRecord, MetadataError> {
        let mut inner = self.inner.write().await;
        let k = key(&record.owner, &record.directory, &record.filename);
        if inner.records.contains_key(&k) {
            return Err(MetadataError::Duplicate {
                owner: record.owner,
                directory: record.directory,
                filename: record.filename,
            });
        }

        inner.next_id += 1;
        let stored = record.into_record(inner.next_id, Utc::now());
        inner.records.insert(k, stored.clone());
        Ok(stored)
    }

    async fn find_one(
        &self,
        owner: &OwnerId,
        directory: &str,
        filename: &str,
    ) -> Result<FileRecord, MetadataError> {
        self.inner
            .read()
            .await
            .records
            .get(&key(owner, directory, filename))
            .cloned()
            .ok_or_else(|| MetadataError::not_found(owner, directory, filename))
    }

    async fn delete_one(
        &self,
        owner: &OwnerId,
        directory: &str,
        filename: &str,
    ) -> Result<FileRecord, MetadataError> {
        self.inner
            .write()
            .await
            .records
            .remove(&key(owner, directory, filename))
            .ok_or_else(|| MetadataError::not_found(owner, directory, filename))
    }

    async fn list_by_owner(
        &self,
        owner: &OwnerId,
        options: &ListOptions,
    ) -> Result<Vec<FileRecord>, MetadataError> {
        let inner = self.inner.read().await;
        let mut records: Vec<FileRecord> = inner
            .records
            .values()
            .filter(|r| r.is_owned_by(owner))
            .cloned()
            .collect();
        drop(inner);

        records.sort_by(|a, b| compare_records(a, b, options.sort));
        let page = records.into_iter().skip(options.skip);
        Ok(match options.effective_limit() {
            Some(limit) => page.take(limit).collect(),
            None => page.collect(),
        })
    }

    async fn delete_all_by_owner(&self, owner: &OwnerId) -> Result<u64, MetadataError> {
        let mut inner = self.inner.write().await;
        let before = inner.records.len();
        inner.records.retain(|(o, _, _), _| o != owner);
        Ok((before - inner.records.len()) as u64)
    }
}
