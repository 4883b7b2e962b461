//! Error taxonomy for the virtual filesystem service.

use std::fmt;
use std::time::Duration;

use keyfold_types::OwnerId;
use serde::Serialize;

use crate::metadata::MetadataError;
use crate::storage::StorageError;

/// A disagreement between the object store and the metadata mirror.
///
/// Orphans are reported, never healed in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Orphan {
    /// The object was stored but no record describes it.
    ObjectWithoutRecord {
        owner: OwnerId,
        directory: String,
        filename: String,
        key: String,
    },
    /// A record points at an object that is gone.
    RecordWithoutObject {
        owner: OwnerId,
        directory: String,
        filename: String,
        /// Unknown when the record could not be read back.
        record_id: Option<i64>,
    },
}

impl fmt::Display for Orphan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orphan::ObjectWithoutRecord { key, .. } => {
                write!(f, "object {key} has no metadata record")
            }
            Orphan::RecordWithoutObject {
                owner,
                directory,
                filename,
                record_id: Some(id),
            } => write!(f, "record {id} ({owner}/{directory}{filename}) has no object"),
            Orphan::RecordWithoutObject {
                owner,
                directory,
                filename,
                record_id: None,
            } => write!(f, "record for {owner}/{directory}{filename} has no object"),
        }
    }
}

/// Flat classification for callers that map failures onto status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Invalid,
    NotFound,
    AlreadyExists,
    NotEmpty,
    Storage,
    Orphan,
    Timeout,
}

/// Every failure the service can return.
#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    /// Malformed or missing path, name, or payload. Caller error.
    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("directory not empty: {0}")]
    NotEmpty(String),

    #[error("object store failure")]
    ObjectStore(#[source] StorageError),

    #[error("metadata store failure")]
    Metadata(#[source] MetadataError),

    /// The stores now disagree; the operation half-applied.
    #[error("{orphan}: {reason}")]
    Orphan { orphan: Orphan, reason: String },

    #[error("operation exceeded its {0:?} deadline")]
    Timeout(Duration),
}

impl VfsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VfsError::Invalid(_) => ErrorKind::Invalid,
            VfsError::NotFound(_) => ErrorKind::NotFound,
            VfsError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            VfsError::NotEmpty(_) => ErrorKind::NotEmpty,
            VfsError::ObjectStore(_) | VfsError::Metadata(_) => ErrorKind::Storage,
            VfsError::Orphan { .. } => ErrorKind::Orphan,
            VfsError::Timeout(_) => ErrorKind::Timeout,
        }
    }
}

impl From<StorageError> for VfsError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => VfsError::NotFound(what),
            StorageError::AlreadyExists(what) => VfsError::AlreadyExists(what),
            StorageError::NotEmpty(what) => VfsError::NotEmpty(what),
            StorageError::InvalidKey { key, reason } => {
                VfsError::Invalid(format!("{key:?}: {reason}"))
            }
            other => VfsError::ObjectStore(other),
        }
    }
}

impl From<MetadataError> for VfsError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::NotFound { .. } => VfsError::NotFound(err.to_string()),
            other => VfsError::Metadata(other),
        }
    }
}

pub type Result<T, E = VfsError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_map_to_caller_kinds() {
        let err: VfsError = StorageError::NotEmpty("u1/docs/".into()).into();
        assert_eq!(err.kind(), ErrorKind::NotEmpty);

        let err: VfsError = StorageError::Backend("disk on fire".into()).into();
        assert_eq!(err.kind(), ErrorKind::Storage);
    }

    #[test]
    fn orphan_message_names_the_key() {
        let err = VfsError::Orphan {
            orphan: Orphan::ObjectWithoutRecord {
                owner: OwnerId::new("u1").unwrap(),
                directory: "docs/".into(),
                filename: "a.txt".into(),
                key: "u1/docs/a.txt".into(),
            },
            reason: "duplicate record".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Orphan);
        assert_eq!(
            err.to_string(),
            "object u1/docs/a.txt has no metadata record: duplicate record"
        );
    }
}
