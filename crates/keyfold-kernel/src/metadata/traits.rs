//! Metadata mirror seam.

use std::cmp::Ordering;

use async_trait::async_trait;
use keyfold_types::{FileRecord, ListOptions, NewFileRecord, OwnerId, SortField, SortOrder, SortSpec};

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("record already exists: {owner}/{directory}{filename}")]
    Duplicate {
        owner: OwnerId,
        directory: String,
        filename: String,
    },

    #[error("no record for {owner}/{directory}{filename}")]
    NotFound {
        owner: OwnerId,
        directory: String,
        filename: String,
    },

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: i64, reason: String },

    #[error("metadata store lock poisoned")]
    Poisoned,
}

impl MetadataError {
    pub(crate) fn not_found(owner: &OwnerId, directory: &str, filename: &str) -> Self {
        MetadataError::NotFound {
            owner: owner.clone(),
            directory: directory.to_string(),
            filename: filename.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, MetadataError::NotFound { .. })
    }
}

/// Owner-scoped record store, unique on `(owner, directory, filename)`.
///
/// Every method takes the owner explicitly; no method can reach another
/// owner's records.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Add a record. Fails with `Duplicate` rather than overwriting.
    async fn insert(&self, record: NewFileRecord) -> Result<FileRecord, MetadataError>;

    async fn find_one(
        &self,
        owner: &OwnerId,
        directory: &str,
        filename: &str,
    ) -> Result<FileRecord, MetadataError>;

    /// Remove a record and hand it back.
    async fn delete_one(
        &self,
        owner: &OwnerId,
        directory: &str,
        filename: &str,
    ) -> Result<FileRecord, MetadataError>;

    /// An owner's records, sorted and offset-paginated.
    async fn list_by_owner(
        &self,
        owner: &OwnerId,
        options: &ListOptions,
    ) -> Result<Vec<FileRecord>, MetadataError>;

    /// Remove every record of an owner. Returns how many went.
    async fn delete_all_by_owner(&self, owner: &OwnerId) -> Result<u64, MetadataError>;
}

/// Listing order shared by every backend: the sort key, then the record id,
/// both in the requested direction. No sort means insertion order.
pub(crate) fn compare_records(a: &FileRecord, b: &FileRecord, sort: Option<SortSpec>) -> Ordering {
    let Some(sort) = sort else {
        return a.id.cmp(&b.id);
    };
    let ord = match sort.field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortField::Filename => a.filename.cmp(&b.filename),
    }
    .then(a.id.cmp(&b.id));

    match sort.order {
        SortOrder::Asc => ord,
        SortOrder::Desc => ord.reverse(),
    }
}
