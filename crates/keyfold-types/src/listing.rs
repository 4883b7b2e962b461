//! Sorting and pagination for owner-wide record listings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Record attribute a listing can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    CreatedAt,
    UpdatedAt,
    Filename,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "createdAt",
            SortField::UpdatedAt => "updatedAt",
            SortField::Filename => "filename",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// A sort key plus direction, written `field:order` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

impl SortSpec {
    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            order: SortOrder::Desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sort field {0:?} (expected createdAt, updatedAt or filename)")]
pub struct ParseSortError(pub String);

impl FromStr for SortSpec {
    type Err = ParseSortError;

    /// Parses `createdAt:desc`. Anything other than `desc` after the colon,
    /// or no colon at all, sorts ascending.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, order) = match s.split_once(':') {
            Some((field, order)) => (field, order),
            None => (s, ""),
        };
        let field = match field.trim() {
            "createdAt" => SortField::CreatedAt,
            "updatedAt" => SortField::UpdatedAt,
            "filename" => SortField::Filename,
            other => return Err(ParseSortError(other.to_string())),
        };
        let order = if order.trim() == "desc" {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        };
        Ok(Self { field, order })
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order = match self.order {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        };
        write!(f, "{}:{}", self.field.as_str(), order)
    }
}

/// Offset pagination over an owner's records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOptions {
    /// `None` keeps insertion order.
    pub sort: Option<SortSpec>,
    /// `None` or `Some(0)` means unbounded.
    pub limit: Option<usize>,
    pub skip: usize,
}

impl ListOptions {
    pub fn sorted(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn page(mut self, limit: usize, skip: usize) -> Self {
        self.limit = Some(limit);
        self.skip = skip;
        self
    }

    pub fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|&n| n > 0)
    }
}
