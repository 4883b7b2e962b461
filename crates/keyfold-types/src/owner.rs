//! Owner identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{SENTINEL, SEPARATOR};

/// Identifier of the user that owns a subtree of keys and records.
///
/// The id becomes the first segment of every storage key the owner can
/// reach, so it may never contain the separator or the transport sentinel.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OwnerId(String);

/// Rejected owner id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid owner id {id:?}: {reason}")]
pub struct InvalidOwnerId {
    pub id: String,
    pub reason: &'static str,
}

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Result<Self, InvalidOwnerId> {
        let id = id.into();
        let reason = if id.is_empty() {
            Some("empty")
        } else if id.contains(SEPARATOR) {
            Some("contains the path separator")
        } else if id.contains(SENTINEL) {
            Some("contains the transport sentinel")
        } else if id.chars().any(|c| c.is_whitespace() || c.is_control()) {
            Some("contains whitespace or control characters")
        } else if id == "." || id == ".." {
            Some("reserved name")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(InvalidOwnerId { id, reason }),
            None => Ok(Self(id)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for OwnerId {
    type Error = InvalidOwnerId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<OwnerId> for String {
    fn from(id: OwnerId) -> Self {
        id.0
    }
}

impl AsRef<str> for OwnerId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
