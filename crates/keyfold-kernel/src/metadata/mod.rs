//! Metadata mirror: one record per stored file.
//!
//! - **MemoryMetadataStore**: map-backed, for tests and ephemeral runs
//! - **SqliteMetadataStore**: durable, unique constraint enforced by SQLite
//!
//! Both order listings the same way: sort key, then record id.

#[cfg(test)]
mod failing;
mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryMetadataStore;
pub use sqlite::SqliteMetadataStore;
pub use traits::{MetadataError, MetadataStore};

#[cfg(test)]
pub(crate) use failing::FailingMetadataStore;
