//! Object storage for keyfold.
//!
//! Two layers:
//!
//! - **ObjectBackend**: a flat key-value store with paged prefix listing
//!   (`MemoryBackend`, `LocalBackend`, or anything S3-shaped).
//! - **ObjectStorage**: the adapter that turns prefix listings and zero-byte
//!   markers into folders.
//!
//! ```text
//! ObjectStorage ── list_children / list_folder_names / create_folder
//!      │           delete_leaf / delete_subtree
//!      ▼
//! dyn ObjectBackend ── put_object / head_object / delete_object / list_objects
//! ```

mod adapter;
#[cfg(test)]
mod failing;
mod local;
mod memory;
mod page;
mod traits;

pub use adapter::{FailedDelete, LIST_PAGE_SIZE, ObjectStorage, StoredObject, SubtreeDeletion};
#[cfg(test)]
pub(crate) use failing::{FailingBackend, FailurePolicy};
pub use local::LocalBackend;
pub use memory::{DEFAULT_PAGE_SIZE, MemoryBackend};
pub use traits::{ListPage, ListRequest, ObjectBackend, ObjectMeta, StorageError};
