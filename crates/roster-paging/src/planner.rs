use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cursor::{self, Cursor};
use crate::error::PageError;
use crate::store::{Keyed, RowStore, StoreError};

/// Page size used when the client does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page a client may ask for.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Upper bound on a single boundary query.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

/// A validated page size, `1..=MAX_PAGE_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize(NonZeroU32);

impl PageSize {
    pub fn new(size: u32) -> Result<Self, PageError> {
        if size > MAX_PAGE_SIZE {
            return Err(PageError::InvalidPageSize(format!(
                "{size} exceeds the maximum of {MAX_PAGE_SIZE}"
            )));
        }
        NonZeroU32::new(size)
            .map(Self)
            .ok_or_else(|| PageError::InvalidPageSize("must be positive".into()))
    }

    /// Parses an untrusted page size. Absent or blank input selects
    /// [`DEFAULT_PAGE_SIZE`].
    pub fn parse(raw: Option<&str>) -> Result<Self, PageError> {
        let raw = match raw.map(str::trim) {
            None | Some("") => return Ok(Self::default()),
            Some(raw) => raw,
        };
        let size: i64 = raw
            .parse()
            .map_err(|_| PageError::InvalidPageSize(format!("`{raw}` is not a number")))?;
        if size <= 0 {
            return Err(PageError::InvalidPageSize("must be positive".into()));
        }
        let size = u32::try_from(size).unwrap_or(u32::MAX);
        Self::new(size)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self(NonZeroU32::new(DEFAULT_PAGE_SIZE).unwrap_or(NonZeroU32::MIN))
    }
}

/// One page of rows in ascending key order.
#[derive(Debug)]
pub struct Page<R> {
    pub items: Vec<R>,
    /// Cursor for the last row in `items`. Stays valid indefinitely, so a
    /// client that reached the end can use it later to pick up new rows.
    pub resume_cursor: String,
    /// Whether at least one more row existed past this page when it was read.
    pub has_more: bool,
}

impl<R> Page<R> {
    /// The cursor to send next, present only while more rows may exist.
    pub fn next_cursor(&self) -> Option<&str> {
        self.has_more.then_some(self.resume_cursor.as_str())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Resolves cursors into pages against an injected row store.
///
/// Holds no state between calls; clones share the store handle.
pub struct Planner<S> {
    store: Arc<S>,
    timeout: Duration,
}

impl<S> Clone for Planner<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            timeout: self.timeout,
        }
    }
}

impl<S: RowStore> Planner<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Fetches the page after `token`, which is either a cursor returned by
    /// an earlier call or [`cursor::FIRST_PAGE_TOKEN`].
    pub async fn page(&self, token: &str, page_size: PageSize) -> Result<Page<S::Row>, PageError> {
        let cursor = Cursor::parse(token)?;
        self.page_after(cursor, page_size).await
    }

    pub async fn page_after(
        &self,
        cursor: Cursor,
        page_size: PageSize,
    ) -> Result<Page<S::Row>, PageError> {
        let limit = page_size.get() as usize;
        let lower = cursor.into_lower_bound();
        let store = self.store.clone();

        // One extra row tells us whether another page exists.
        let query = tokio::task::spawn_blocking(move || store.rows_after(lower.as_ref(), limit + 1));

        // The blocking query is not interrupted on timeout; the store's own
        // busy timeout bounds how long it lingers.
        let mut rows = match tokio::time::timeout(self.timeout, query).await {
            Err(_) => {
                warn!("Row store did not answer within {:?}", self.timeout);
                return Err(PageError::StoreTimeout(self.timeout));
            }
            Ok(Err(join)) => {
                warn!("Row store query aborted: {}", join);
                return Err(StoreError::new(join).into());
            }
            Ok(Ok(rows)) => rows?,
        };

        debug_assert!(
            rows.windows(2).all(|w| w[0].sort_key() < w[1].sort_key()),
            "row store returned rows out of key order"
        );

        let has_more = rows.len() > limit;
        rows.truncate(limit);

        let Some(last) = rows.last() else {
            debug!("Pagination reached the end of the collection");
            return Err(PageError::NoMoreResults);
        };
        // A key with no token form would strand the client on this page.
        let resume_cursor = cursor::encode(&last.sort_key()).map_err(|e| {
            warn!("Row store returned a row with no cursor: {}", e);
            PageError::StoreUnavailable(StoreError::new(e))
        })?;

        debug!("Produced page of {} rows (has_more={})", rows.len(), has_more);
        Ok(Page {
            items: rows,
            resume_cursor,
            has_more,
        })
    }
}
