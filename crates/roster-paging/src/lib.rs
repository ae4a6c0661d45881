//! Roster keyset pagination.
//!
//! Pages are addressed by an opaque cursor that encodes the `(created_at, id)`
//! key of the last row a client has seen. Resuming strictly after that key
//! keeps pages stable while new rows are appended concurrently, which offset
//! pagination cannot do.
//!
//! - `cursor`: token codec and the `first` sentinel
//! - `store`: the ordered boundary query a backing store must provide
//! - `planner`: turns a token and a page size into one page

pub mod cursor;
pub mod error;
pub mod planner;
pub mod store;

pub use cursor::{
    Cursor, FIRST_PAGE_TOKEN, KeyError, SortKey, decode, encode, format_timestamp, parse_timestamp,
    timestamp_in_range,
};
pub use error::PageError;
pub use planner::{DEFAULT_PAGE_SIZE, DEFAULT_STORE_TIMEOUT, MAX_PAGE_SIZE, Page, PageSize, Planner};
pub use store::{Keyed, RowStore, StoreError};
