//! keyfold-types: pure data types shared by the keyfold kernel and its callers.
//!
//! Nothing in here touches storage. The kernel builds on these types; routing
//! layers and the CLI use them to talk to the kernel.

mod listing;
mod owner;
mod record;

pub use listing::{ListOptions, ParseSortError, SortField, SortOrder, SortSpec};
pub use owner::{InvalidOwnerId, OwnerId};
pub use record::{FileRecord, NewFileRecord};

/// Canonical path separator inside storage keys.
pub const SEPARATOR: char = '/';

/// Stand-in for [`SEPARATOR`] when a path travels in a query string.
pub const SENTINEL: char = '%';
