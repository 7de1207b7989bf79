//! Canonical cache identity for a requested page.

use std::fmt;

/// Rendered form of the first-page key in logs and metrics.
pub const FIRST_PAGE: &str = "FIRST";

/// Identity of one page of the upstream listing.
///
/// An absent or empty cursor always maps to [`CursorKey::First`], so
/// `from_cursor(None)` and `from_cursor(Some(""))` are the same key for both
/// the page cache and the in-flight registry. Any other cursor is kept
/// verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum CursorKey {
    /// The first page (no cursor sent upstream).
    #[default]
    First,
    /// A page addressed by an upstream continuation cursor.
    Cursor(String),
}

impl CursorKey {
    /// Canonicalize a caller-supplied cursor.
    pub fn from_cursor(cursor: Option<&str>) -> Self {
        match cursor {
            Some(c) if !c.is_empty() => Self::Cursor(c.to_string()),
            _ => Self::First,
        }
    }

    pub fn first_page() -> Self {
        Self::First
    }

    pub fn is_first_page(&self) -> bool {
        matches!(self, Self::First)
    }

    /// The cursor to send upstream, if any.
    pub fn cursor(&self) -> Option<&str> {
        match self {
            Self::First => None,
            Self::Cursor(c) => Some(c.as_str()),
        }
    }
}

impl From<Option<&str>> for CursorKey {
    fn from(cursor: Option<&str>) -> Self {
        Self::from_cursor(cursor)
    }
}

impl From<&str> for CursorKey {
    fn from(cursor: &str) -> Self {
        Self::from_cursor(Some(cursor))
    }
}

impl fmt::Display for CursorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::First => f.write_str(FIRST_PAGE),
            Self::Cursor(c) => f.write_str(c),
        }
    }
}
