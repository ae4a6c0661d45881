use std::error::Error;
use std::fmt;

use crate::cursor::SortKey;

/// A row that can be positioned in the keyset order.
pub trait Keyed {
    fn sort_key(&self) -> SortKey;
}

/// Failure reported by a backing store.
#[derive(Debug)]
pub struct StoreError(Box<dyn Error + Send + Sync>);

impl StoreError {
    pub fn new(err: impl Into<Box<dyn Error + Send + Sync>>) -> Self {
        Self(err.into())
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.0.source()
    }
}

/// The boundary query the planner drives.
///
/// Implementations are called from a blocking thread, so they may block on
/// I/O. A store shared between callers must tolerate concurrent calls.
pub trait RowStore: Send + Sync + 'static {
    type Row: Keyed + Send + 'static;

    /// Returns at most `limit` rows whose key is strictly greater than
    /// `after` (all rows when `after` is `None`), ascending by key.
    ///
    /// The comparison is lexicographic over `(created_at, id)`. Comparing the
    /// timestamp alone skips or repeats rows that share a timestamp with the
    /// boundary row.
    fn rows_after(&self, after: Option<&SortKey>, limit: usize) -> Result<Vec<Self::Row>, StoreError>;
}
