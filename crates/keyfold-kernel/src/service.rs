//! The virtual filesystem service.
//!
//! Composes the path codec, the object storage adapter, and the metadata
//! mirror into the per-owner operations. Every mutation goes to the object
//! store first and the metadata mirror second; nothing spans both stores
//! transactionally, so a failure in the second step is surfaced as an
//! [`Orphan`] instead of being rolled back.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use keyfold_types::{FileRecord, ListOptions, NewFileRecord, OwnerId};
use serde::Serialize;

use crate::config::{DEFAULT_MAX_UPLOAD_BYTES, KernelConfig};
use crate::error::{Orphan, Result, VfsError};
use crate::metadata::{MemoryMetadataStore, MetadataStore};
use crate::path::{
    EntryName, StorageKey, normalize_directory, owner_relative, split_relative, validate_name,
};
use crate::storage::{MemoryBackend, ObjectStorage};

/// What [`Vfs::delete_entry`] removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeletedEntry {
    /// A file; carries the record that described it.
    File { record: FileRecord },
    /// An empty folder, as an owner-relative path ending in the separator.
    Folder { path: String },
}

/// What happened to the record of one swept key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CleanupOutcome {
    Removed { record_id: i64 },
    /// There was no record to remove.
    Missing,
    /// Folder markers never have records.
    Marker,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordCleanup {
    pub key: String,
    pub directory: String,
    pub filename: String,
    pub outcome: CleanupOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedKey {
    pub key: String,
    pub error: String,
}

/// Per-key account of an [`Vfs::empty_directory`] sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub directory: String,
    /// Objects that are gone.
    pub deleted_keys: Vec<String>,
    /// Objects the backend refused to delete. Their records are untouched.
    pub failed_keys: Vec<FailedKey>,
    /// One entry per deleted key, in key order.
    pub records: Vec<RecordCleanup>,
}

impl SweepReport {
    /// Every object deleted and every record cleanup succeeded.
    pub fn is_clean(&self) -> bool {
        self.failed_keys.is_empty()
            && !self
                .records
                .iter()
                .any(|r| matches!(r.outcome, CleanupOutcome::Failed { .. }))
    }

    pub fn removed_records(&self) -> usize {
        self.records
            .iter()
            .filter(|r| matches!(r.outcome, CleanupOutcome::Removed { .. }))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerRemoval {
    /// `None` when the owner had no objects at all.
    pub sweep: Option<SweepReport>,
    pub records_removed: u64,
}

/// Per-owner hierarchical file storage over an object store and a metadata
/// mirror.
///
/// Cheap to share behind an `Arc`; holds no per-request state.
pub struct Vfs {
    storage: ObjectStorage,
    metadata: Arc<dyn MetadataStore>,
    max_upload_bytes: u64,
    timeout: Option<Duration>,
}

impl Vfs {
    pub fn new(storage: ObjectStorage, metadata: Arc<dyn MetadataStore>) -> Self {
        Self {
            storage,
            metadata,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            timeout: None,
        }
    }

    /// Build both stores from `config`.
    pub fn open(config: &KernelConfig) -> anyhow::Result<Self> {
        let vfs = Self::new(config.object_storage(), config.metadata_store()?)
            .with_max_upload_bytes(config.max_upload_bytes)
            .with_timeout(config.operation_timeout());
        tracing::debug!(storage = ?config.storage, metadata = ?config.metadata, "opened vfs");
        Ok(vfs)
    }

    /// In-memory stores, no deadline.
    pub fn transient() -> Self {
        Self::new(
            ObjectStorage::new(Arc::new(MemoryBackend::new())),
            Arc::new(MemoryMetadataStore::new()),
        )
    }

    pub fn with_max_upload_bytes(mut self, limit: u64) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    /// Deadline applied to each operation; `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    async fn deadline<T>(&self, op: &'static str, work: impl Future<Output = Result<T>>) -> Result<T> {
        let Some(limit) = self.timeout else {
            return work.await;
        };
        match tokio::time::timeout(limit, work).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(op, ?limit, "operation timed out");
                Err(VfsError::Timeout(limit))
            }
        }
    }

    /// Store `data` as `directory/filename` and record it.
    ///
    /// An existing object at the same path is overwritten. If the object is
    /// stored but the record cannot be written (including because one
    /// already exists) the result is [`Orphan::ObjectWithoutRecord`].
    #[tracing::instrument(level = "debug", skip(self, owner, data), fields(owner = %owner, size = data.len()))]
    pub async fn upload(
        &self,
        owner: &OwnerId,
        directory: &str,
        filename: &str,
        data: Bytes,
    ) -> Result<FileRecord> {
        self.deadline("upload", async {
            let directory = normalize_directory(directory)?;
            let filename = validate_name(filename)?;
            if data.len() as u64 > self.max_upload_bytes {
                return Err(VfsError::Invalid(format!(
                    "upload of {} bytes exceeds the {} byte limit",
                    data.len(),
                    self.max_upload_bytes
                )));
            }

            let key = StorageKey::file(owner, &directory, &filename);
            let stored = self.storage.put(&key, data).await?;

            let record = NewFileRecord {
                owner: owner.clone(),
                directory: directory.clone(),
                filename: filename.clone(),
                url: stored.locator,
                size: stored.size,
            };
            match self.metadata.insert(record).await {
                Ok(record) => Ok(record),
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "object stored without a record");
                    Err(VfsError::Orphan {
                        orphan: Orphan::ObjectWithoutRecord {
                            owner: owner.clone(),
                            directory,
                            filename,
                            key: key.into_string(),
                        },
                        reason: err.to_string(),
                    })
                }
            }
        })
        .await
    }

    /// Names of the files directly in `directory`.
    ///
    /// An empty root is an empty list; any other empty directory is NotFound.
    #[tracing::instrument(level = "debug", skip(self, owner), fields(owner = %owner))]
    pub async fn list_files(&self, owner: &OwnerId, directory: &str) -> Result<Vec<String>> {
        self.deadline("list_files", async {
            let directory = normalize_directory(directory)?;
            let prefix = StorageKey::directory(owner, &directory);
            let names: Vec<String> = self
                .storage
                .list_children(&prefix)
                .await?
                .into_iter()
                .filter_map(|key| key.strip_prefix(prefix.as_str()).map(str::to_string))
                .collect();

            if names.is_empty() && !directory.is_empty() {
                return Err(VfsError::NotFound(format!("no files in {directory}")));
            }
            Ok(names)
        })
        .await
    }

    /// Names of the folders directly in `directory`.
    #[tracing::instrument(level = "debug", skip(self, owner), fields(owner = %owner))]
    pub async fn list_folders(&self, owner: &OwnerId, directory: &str) -> Result<Vec<String>> {
        self.deadline("list_folders", async {
            let directory = normalize_directory(directory)?;
            let prefix = StorageKey::directory(owner, &directory);
            Ok(self.storage.list_folder_names(&prefix).await?)
        })
        .await
    }

    /// Create the empty folder `name` in `directory`. Returns its path.
    #[tracing::instrument(level = "debug", skip(self, owner), fields(owner = %owner))]
    pub async fn create_folder(&self, owner: &OwnerId, directory: &str, name: &str) -> Result<String> {
        self.deadline("create_folder", async {
            let directory = normalize_directory(directory)?;
            let name = validate_name(name)?;
            let prefix = StorageKey::directory(owner, &directory);
            self.storage.create_folder(&prefix, &name).await?;
            Ok(format!("{directory}{name}/"))
        })
        .await
    }

    /// Delete one file, or one empty folder when `entry` ends in `/`.
    ///
    /// Folders touch no metadata. For files the object goes first; if it
    /// cannot be deleted the record is left alone.
    #[tracing::instrument(level = "debug", skip(self, owner), fields(owner = %owner))]
    pub async fn delete_entry(
        &self,
        owner: &OwnerId,
        directory: &str,
        entry: &str,
    ) -> Result<DeletedEntry> {
        self.deadline("delete_entry", async {
            let directory = normalize_directory(directory)?;
            match EntryName::parse(entry)? {
                EntryName::Folder(name) => {
                    let key = StorageKey::folder(owner, &directory, &name);
                    self.storage.delete_leaf(&key).await?;
                    Ok(DeletedEntry::Folder {
                        path: format!("{directory}{name}/"),
                    })
                }
                EntryName::File(name) => {
                    let key = StorageKey::file(owner, &directory, &name);
                    self.storage.delete_leaf(&key).await?;
                    match self.metadata.delete_one(owner, &directory, &name).await {
                        Ok(record) => Ok(DeletedEntry::File { record }),
                        Err(err) if err.is_not_found() => {
                            tracing::warn!(key = %key, "deleted an object that had no record");
                            Err(err.into())
                        }
                        Err(err) => {
                            tracing::warn!(key = %key, error = %err, "record left without its object");
                            Err(VfsError::Orphan {
                                orphan: Orphan::RecordWithoutObject {
                                    owner: owner.clone(),
                                    directory,
                                    filename: name,
                                    record_id: None,
                                },
                                reason: err.to_string(),
                            })
                        }
                    }
                }
            }
        })
        .await
    }

    /// Delete `directory` and everything under it, then clear the records
    /// of every object that went.
    ///
    /// The root directory sweeps the owner's whole scope.
    #[tracing::instrument(level = "debug", skip(self, owner), fields(owner = %owner))]
    pub async fn empty_directory(&self, owner: &OwnerId, directory: &str) -> Result<SweepReport> {
        self.deadline("empty_directory", self.sweep(owner, directory))
            .await
    }

    async fn sweep(&self, owner: &OwnerId, directory: &str) -> Result<SweepReport> {
        let directory = normalize_directory(directory)?;
        let prefix = StorageKey::directory(owner, &directory);
        let deletion = self.storage.delete_subtree(&prefix).await?;

        let records = join_all(
            deletion
                .deleted
                .iter()
                .map(|key| self.clear_record(owner, key)),
        )
        .await;

        let report = SweepReport {
            directory,
            deleted_keys: deletion.deleted,
            failed_keys: deletion
                .failed
                .into_iter()
                .map(|f| FailedKey {
                    key: f.key,
                    error: f.error.to_string(),
                })
                .collect(),
            records,
        };
        if !report.is_clean() {
            tracing::warn!(
                directory = %report.directory,
                failed_keys = report.failed_keys.len(),
                "sweep finished with failures"
            );
        }
        Ok(report)
    }

    async fn clear_record(&self, owner: &OwnerId, key: &str) -> RecordCleanup {
        let Some(relative) = owner_relative(key, owner) else {
            return RecordCleanup {
                key: key.to_string(),
                directory: String::new(),
                filename: String::new(),
                outcome: CleanupOutcome::Failed {
                    error: "key is outside the owner's scope".into(),
                },
            };
        };
        let (directory, filename) = split_relative(relative);

        let outcome = if filename.is_empty() {
            CleanupOutcome::Marker
        } else {
            match self.metadata.delete_one(owner, directory, filename).await {
                Ok(record) => CleanupOutcome::Removed {
                    record_id: record.id,
                },
                Err(err) if err.is_not_found() => CleanupOutcome::Missing,
                Err(err) => {
                    tracing::warn!(key, error = %err, "record cleanup failed");
                    CleanupOutcome::Failed {
                        error: err.to_string(),
                    }
                }
            }
        };

        RecordCleanup {
            key: key.to_string(),
            directory: directory.to_string(),
            filename: filename.to_string(),
            outcome,
        }
    }

    /// Locator of a recorded file.
    #[tracing::instrument(level = "debug", skip(self, owner), fields(owner = %owner))]
    pub async fn file_link(&self, owner: &OwnerId, directory: &str, filename: &str) -> Result<String> {
        self.deadline("file_link", async {
            let directory = normalize_directory(directory)?;
            let filename = validate_name(filename)?;
            let record = self.metadata.find_one(owner, &directory, &filename).await?;
            Ok(record.url)
        })
        .await
    }

    /// Every record of `owner`, sorted and paginated.
    #[tracing::instrument(level = "debug", skip(self, owner), fields(owner = %owner))]
    pub async fn list_owner_files(
        &self,
        owner: &OwnerId,
        options: &ListOptions,
    ) -> Result<Vec<FileRecord>> {
        self.deadline("list_owner_files", async {
            Ok(self.metadata.list_by_owner(owner, options).await?)
        })
        .await
    }

    /// Delete all of an owner's objects, then all of their records.
    #[tracing::instrument(level = "debug", skip(self, owner), fields(owner = %owner))]
    pub async fn remove_owner(&self, owner: &OwnerId) -> Result<OwnerRemoval> {
        self.deadline("remove_owner", async {
            let sweep = match self.sweep(owner, "").await {
                Ok(report) => Some(report),
                Err(VfsError::NotFound(_)) => None,
                Err(err) => return Err(err),
            };
            let records_removed = self.metadata.delete_all_by_owner(owner).await?;
            tracing::debug!(records_removed, "removed owner");
            Ok(OwnerRemoval {
                sweep,
                records_removed,
            })
        })
        .await
    }

    /// Compare the owner's objects with their records. Changes nothing.
    #[tracing::instrument(level = "debug", skip(self, owner), fields(owner = %owner))]
    pub async fn find_orphans(&self, owner: &OwnerId) -> Result<Vec<Orphan>> {
        self.deadline("find_orphans", async {
            let keys = self.storage.list_keys(&StorageKey::scope(owner)).await?;
            let records = self
                .metadata
                .list_by_owner(owner, &ListOptions::default())
                .await?;

            let mut unmatched: HashMap<(String, String), i64> = records
                .into_iter()
                .map(|r| ((r.directory, r.filename), r.id))
                .collect();

            let mut orphans = Vec::new();
            for key in keys {
                let Some(relative) = owner_relative(&key, owner) else {
                    continue;
                };
                let (directory, filename) = split_relative(relative);
                if filename.is_empty() {
                    continue;
                }
                let path = (directory.to_string(), filename.to_string());
                if unmatched.remove(&path).is_none() {
                    orphans.push(Orphan::ObjectWithoutRecord {
                        owner: owner.clone(),
                        directory: path.0,
                        filename: path.1,
                        key,
                    });
                }
            }

            let mut missing: Vec<_> = unmatched.into_iter().collect();
            missing.sort_by_key(|(_, id)| *id);
            orphans.extend(missing.into_iter().map(|((directory, filename), id)| {
                Orphan::RecordWithoutObject {
                    owner: owner.clone(),
                    directory,
                    filename,
                    record_id: Some(id),
                }
            }));
            Ok(orphans)
        })
        .await
    }
}
