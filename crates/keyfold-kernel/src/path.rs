//! Path codec and storage keys.
//!
//! Query strings cannot reliably carry `/`, so directories travel with every
//! separator replaced by [`SENTINEL`]. [`decode`] turns a transport string back
//! into the canonical form; [`normalize_directory`] and [`validate_name`] then
//! check it before anything is turned into a [`StorageKey`].
//!
//! A storage key is `<owner>/<dir segments each ending in />[<filename>]`:
//!
//! ```text
//! u1/                 owner scope (root directory)
//! u1/docs/            directory, or the folder marker for it
//! u1/docs/a.txt       file object
//! ```

use std::fmt;

use keyfold_types::OwnerId;
pub use keyfold_types::{SENTINEL, SEPARATOR};

use crate::error::VfsError;

/// Replace every separator with the transport sentinel.
pub fn encode(path: &str) -> String {
    path.chars()
        .map(|c| if c == SEPARATOR { SENTINEL } else { c })
        .collect()
}

/// Replace every transport sentinel with the separator.
///
/// A segment name that itself contained the sentinel cannot be told apart
/// from a separator after encoding; such names come back split.
pub fn decode(transport: &str) -> String {
    transport
        .chars()
        .map(|c| if c == SENTINEL { SEPARATOR } else { c })
        .collect()
}

/// Canonicalize an owner-relative directory.
///
/// Trims surrounding whitespace. The empty string is the root. Anything else
/// gets a trailing separator and must be made of non-empty segments that are
/// neither `.` nor `..`.
pub fn normalize_directory(raw: &str) -> Result<String, VfsError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    if trimmed.chars().any(char::is_control) {
        return Err(VfsError::Invalid(format!(
            "directory {raw:?} contains control characters"
        )));
    }

    let body = trimmed.strip_suffix(SEPARATOR).unwrap_or(trimmed);
    let mut normalized = String::with_capacity(body.len() + 1);
    for segment in body.split(SEPARATOR) {
        check_segment(segment).map_err(|reason| {
            VfsError::Invalid(format!("directory {raw:?}: {reason}"))
        })?;
        normalized.push_str(segment);
        normalized.push(SEPARATOR);
    }
    Ok(normalized)
}

/// Validate a single file or folder name, returning it trimmed.
pub fn validate_name(raw: &str) -> Result<String, VfsError> {
    let name = raw.trim();
    if name.chars().any(char::is_control) {
        return Err(VfsError::Invalid(format!(
            "name {raw:?} contains control characters"
        )));
    }
    check_segment(name).map_err(|reason| VfsError::Invalid(format!("name {raw:?}: {reason}")))?;
    if name.contains(SEPARATOR) {
        return Err(VfsError::Invalid(format!(
            "name {raw:?} contains the path separator"
        )));
    }
    Ok(name.to_string())
}

fn check_segment(segment: &str) -> Result<(), &'static str> {
    match segment {
        "" => Err("empty path segment"),
        "." | ".." => Err("relative segments are not allowed"),
        _ => Ok(()),
    }
}

/// What a delete request names inside a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryName {
    File(String),
    /// Written with a trailing separator: `sub/`.
    Folder(String),
}

impl EntryName {
    pub fn parse(raw: &str) -> Result<Self, VfsError> {
        let trimmed = raw.trim();
        match trimmed.strip_suffix(SEPARATOR) {
            Some(folder) => Ok(EntryName::Folder(validate_name(folder)?)),
            None => Ok(EntryName::File(validate_name(trimmed)?)),
        }
    }
}

/// Fully-qualified key in the object store, always under an owner's scope.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    /// `owner/`: the owner's root directory.
    pub fn scope(owner: &OwnerId) -> Self {
        Self(format!("{}{}", owner.as_str(), SEPARATOR))
    }

    /// `owner/` followed by a normalized directory.
    pub fn directory(owner: &OwnerId, directory: &str) -> Self {
        let mut key = Self::scope(owner);
        key.0.push_str(directory);
        key
    }

    pub fn file(owner: &OwnerId, directory: &str, filename: &str) -> Self {
        let mut key = Self::directory(owner, directory);
        key.0.push_str(filename);
        key
    }

    /// Key of the folder `name` inside `directory`, with trailing separator.
    pub fn folder(owner: &OwnerId, directory: &str, name: &str) -> Self {
        let mut key = Self::file(owner, directory, name);
        key.0.push(SEPARATOR);
        key
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Directory keys and folder markers end in the separator.
    pub fn is_directory(&self) -> bool {
        self.0.ends_with(SEPARATOR)
    }

    /// Key of the folder `name` directly under this directory key.
    pub fn child_folder(&self, name: &str) -> Self {
        debug_assert!(self.is_directory());
        Self(format!("{}{}{}", self.0, name, SEPARATOR))
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Strip the owner's scope from a raw key. `None` if the key belongs elsewhere.
pub fn owner_relative<'a>(key: &'a str, owner: &OwnerId) -> Option<&'a str> {
    key.strip_prefix(owner.as_str())?.strip_prefix(SEPARATOR)
}

/// Split an owner-relative key on its last separator.
///
/// `docs/sub/a.txt` gives `("docs/sub/", "a.txt")`; a folder marker such as
/// `docs/sub/` gives `("docs/sub/", "")`; a root file gives `("", "a.txt")`.
pub fn split_relative(relative: &str) -> (&str, &str) {
    match relative.rfind(SEPARATOR) {
        Some(idx) => relative.split_at(idx + SEPARATOR.len_utf8()),
        None => ("", relative),
    }
}
