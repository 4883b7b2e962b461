//! keyfold-kernel: per-owner hierarchical file storage on a flat object store.
//!
//! This crate provides:
//!
//! - **path**: transport codec (`%` for `/`), directory normalization, and
//!   owner-scoped storage keys
//! - **storage**: the `ObjectBackend` seam (memory, local directory) and the
//!   `ObjectStorage` adapter that emulates folders with prefixes and markers
//! - **metadata**: the `MetadataStore` mirror (memory, SQLite), one record
//!   per stored file
//! - **service**: [`Vfs`], the operations callers use
//! - **config** / **paths**: TOML configuration and XDG locations
//!
//! ```text
//!            Vfs
//!          ┌──┴───────────┐
//!   ObjectStorage    dyn MetadataStore
//!          │
//!   dyn ObjectBackend
//! ```

pub mod config;
pub mod error;
pub mod metadata;
pub mod path;
pub mod paths;
pub mod service;
pub mod storage;

pub use config::KernelConfig;
pub use error::{ErrorKind, Orphan, Result, VfsError};
pub use service::{
    CleanupOutcome, DeletedEntry, FailedKey, OwnerRemoval, RecordCleanup, SweepReport, Vfs,
};

pub use keyfold_types::{FileRecord, ListOptions, OwnerId, SortField, SortOrder, SortSpec};
