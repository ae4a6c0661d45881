use std::time::Duration;

use thiserror::Error;

use crate::store::StoreError;

/// Everything a pagination call can return instead of a page.
///
/// None of these are fatal. `NoMoreResults` is the normal end of a walk;
/// the store variants are infrastructure failures and must not be read as
/// "end of collection".
#[derive(Debug, Error)]
pub enum PageError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(&'static str),

    #[error("invalid page size: {0}")]
    InvalidPageSize(String),

    #[error("no more results")]
    NoMoreResults,

    #[error("row store did not answer within {0:?}")]
    StoreTimeout(Duration),

    #[error("row store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}
