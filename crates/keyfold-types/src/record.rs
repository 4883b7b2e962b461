//! File records mirrored next to the object store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::OwnerId;

/// Metadata for one uploaded file.
///
/// Unique per `(owner, directory, filename)`. The `url` is whatever locator
/// the object backend handed back for the stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: i64,
    pub owner: OwnerId,
    /// Owner-relative directory, empty for root, otherwise ending in `/`.
    pub directory: String,
    pub filename: String,
    pub url: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FileRecord {
    /// Owner-relative path: `directory` followed by `filename`.
    pub fn path(&self) -> String {
        format!("{}{}", self.directory, self.filename)
    }

    pub fn is_owned_by(&self, owner: &OwnerId) -> bool {
        &self.owner == owner
    }
}

/// A record before the metadata store assigns an id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFileRecord {
    pub owner: OwnerId,
    pub directory: String,
    pub filename: String,
    pub url: String,
    pub size: u64,
}

impl NewFileRecord {
    /// Stamp the record with an id and a creation time.
    pub fn into_record(self, id: i64, now: DateTime<Utc>) -> FileRecord {
        FileRecord {
            id,
            owner: self.owner,
            directory: self.directory,
            filename: self.filename,
            url: self.url,
            size: self.size,
            created_at: now,
            updated_at: now,
        }
    }
}
