//! SQLite-backed metadata mirror.
//!
//! Stored at `$XDG_DATA_HOME/keyfold/metadata.db` unless configured otherwise.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use keyfold_types::{FileRecord, ListOptions, NewFileRecord, OwnerId, SortField, SortOrder};
use rusqlite::{Connection, ErrorCode, OpenFlags, OptionalExtension, Row, params};

use super::traits::{MetadataError, MetadataStore};

/// Schema SQL embedded from schema/metadata.sql.
const SCHEMA_SQL: &str = include_str!("../../schema/metadata.sql");

const COLUMNS: &str = "id, owner, directory, filename, url, size, created_at, updated_at";

/// Metadata mirror in a SQLite database.
///
/// Uniqueness of `(owner, directory, filename)` is a table constraint, so
/// concurrent inserts of the same path cannot both succeed.
/// Wrapped in a Mutex because rusqlite `Connection` is not Sync.
///
/// Statements run inline on the calling task while it holds the lock, so
/// concurrent callers (the sweep's record cleanup fan-out included) take
/// turns. Each statement is a single-row lookup on the unique index.
pub struct SqliteMetadataStore {
    conn: Mutex<Connection>,
}

impl SqliteMetadataStore {
    /// Open or create a database at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        use anyhow::Context;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating metadata directory: {}", parent.display()))?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("opening metadata database: {}", path.display()))?;

        Self::with_connection(conn).context("initializing metadata schema")
    }

    /// A throwaway database, for tests and ephemeral runs.
    pub fn in_memory() -> Result<Self, MetadataError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, MetadataError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, MetadataError> {
        self.conn.lock().map_err(|_| MetadataError::Poisoned)
    }
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Row as SQLite hands it over, before validation.
struct RawRecord {
    id: i64,
    owner: String,
    directory: String,
    filename: String,
    url: String,
    size: i64,
    created_at: String,
    updated_at: String,
}

impl RawRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner: row.get(1)?,
            directory: row.get(2)?,
            filename: row.get(3)?,
            url: row.get(4)?,
            size: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn into_record(self) -> Result<FileRecord, MetadataError> {
        let id = self.id;
        let corrupt = |reason: String| MetadataError::Corrupt { id, reason };
        let parse_ts = |raw: &str| {
            DateTime::parse_from_rfc3339(raw)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|e| corrupt(format!("timestamp {raw:?}: {e}")))
        };

        Ok(FileRecord {
            id,
            owner: OwnerId::new(self.owner).map_err(|e| corrupt(e.to_string()))?,
            directory: self.directory,
            filename: self.filename,
            url: self.url,
            size: u64::try_from(self.size).map_err(|_| corrupt(format!("size {}", self.size)))?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
        })
    }
}

fn order_by(options: &ListOptions) -> &'static str {
    let Some(sort) = options.sort else {
        return "id ASC";
    };
    match (sort.field, sort.order) {
        (SortField::CreatedAt, SortOrder::Asc) => "created_at ASC, id ASC",
        (SortField::CreatedAt, SortOrder::Desc) => "created_at DESC, id DESC",
        (SortField::UpdatedAt, SortOrder::Asc) => "updated_at ASC, id ASC",
        (SortField::UpdatedAt, SortOrder::Desc) => "updated_at DESC, id DESC",
        (SortField::Filename, SortOrder::Asc) => "filename ASC, id ASC",
        (SortField::Filename, SortOrder::Desc) => "filename DESC, id DESC",
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn insert(&self, record: NewFileRecord) -> Result<FileRecord, MetadataError> {
        let now = Utc::now();
        let stamp = format_ts(&now);
        let size = i64::try_from(record.size).unwrap_or(i64::MAX);
        let conn = self.conn()?;

        let inserted = conn.execute(
            "INSERT INTO files (owner, directory, filename, url, size, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            params![
                record.owner.as_str(),
                record.directory,
                record.filename,
                record.url,
                size,
                stamp
            ],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(MetadataError::Duplicate {
                    owner: record.owner,
                    directory: record.directory,
                    filename: record.filename,
                });
            }
            Err(e) => return Err(e.into()),
        }

        let id = conn.last_insert_rowid();
        // Re-read through the same parsing path so both stores agree on precision.
        let raw = conn.query_row(
            &format!("SELECT {COLUMNS} FROM files WHERE id = ?1"),
            params![id],
            RawRecord::from_row,
        )?;
        raw.into_record()
    }

    async fn find_one(
        &self,
        owner: &OwnerId,
        directory: &str,
        filename: &str,
    ) -> Result<FileRecord, MetadataError> {
        let conn = self.conn()?;
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM files WHERE owner = ?1 AND directory = ?2 AND filename = ?3"
                ),
                params![owner.as_str(), directory, filename],
                RawRecord::from_row,
            )
            .optional()?;
        match raw {
            Some(raw) => raw.into_record(),
            None => Err(MetadataError::not_found(owner, directory, filename)),
        }
    }

    async fn delete_one(
        &self,
        owner: &OwnerId,
        directory: &str,
        filename: &str,
    ) -> Result<FileRecord, MetadataError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let raw = tx
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM files WHERE owner = ?1 AND directory = ?2 AND filename = ?3"
                ),
                params![owner.as_str(), directory, filename],
                RawRecord::from_row,
            )
            .optional()?;
        let Some(raw) = raw else {
            return Err(MetadataError::not_found(owner, directory, filename));
        };
        tx.execute("DELETE FROM files WHERE id = ?1", params![raw.id])?;
        tx.commit()?;
        raw.into_record()
    }

    async fn list_by_owner(
        &self,
        owner: &OwnerId,
        options: &ListOptions,
    ) -> Result<Vec<FileRecord>, MetadataError> {
        // SQLite reads a negative LIMIT as "no limit".
        let limit = options
            .effective_limit()
            .map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));
        let offset = i64::try_from(options.skip).unwrap_or(i64::MAX);

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM files WHERE owner = ?1 ORDER BY {} LIMIT ?2 OFFSET ?3",
            order_by(options)
        ))?;
        let raws = stmt
            .query_map(params![owner.as_str(), limit, offset], RawRecord::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);
        drop(conn);

        raws.into_iter().map(RawRecord::into_record).collect()
    }

    async fn delete_all_by_owner(&self, owner: &OwnerId) -> Result<u64, MetadataError> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM files WHERE owner = ?1", params![owner.as_str()])?;
        Ok(removed as u64)
    }
}
