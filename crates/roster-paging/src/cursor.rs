use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use chrono::{DateTime, Datelike, SecondsFormat, Utc};
use thiserror::Error;

use crate::error::PageError;

/// Token a client sends to ask for the first page.
pub const FIRST_PAGE_TOKEN: &str = "first";

/// Separates the timestamp from the identifier inside a token. Never appears
/// in an RFC 3339 timestamp or a hyphenated UUID.
const DELIMITER: char = ',';

/// Years with a four-digit rendering. Outside this range chrono adds a sign
/// and extra digits, which breaks both fixed width and parsing.
const MIN_YEAR: i32 = 0;
const MAX_YEAR: i32 = 9999;

/// A key that has no token form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("timestamp {0} is outside years 0000-9999")]
    TimestampOutOfRange(DateTime<Utc>),

    #[error("identifier `{0}` contains the cursor delimiter")]
    DelimiterInId(String),
}

/// Position of a row in the keyset order.
///
/// Field order matters: the derived `Ord` compares `created_at` first and
/// breaks ties on `id`, which is the order rows are paged in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey {
    pub created_at: DateTime<Utc>,
    pub id: String,
}

impl SortKey {
    pub fn new(created_at: DateTime<Utc>, id: impl Into<String>) -> Self {
        Self {
            created_at,
            id: id.into(),
        }
    }
}

/// Where a page starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// Start of the collection, no lower bound.
    Initial,
    /// Strictly after the given key.
    After(SortKey),
}

impl Cursor {
    /// Resolves a client token. `first` selects the initial page and is
    /// never handed to the codec.
    pub fn parse(token: &str) -> Result<Self, PageError> {
        if token == FIRST_PAGE_TOKEN {
            return Ok(Self::Initial);
        }
        decode(token).map(Self::After)
    }

    pub fn lower_bound(&self) -> Option<&SortKey> {
        match self {
            Self::Initial => None,
            Self::After(key) => Some(key),
        }
    }

    pub fn into_lower_bound(self) -> Option<SortKey> {
        match self {
            Self::Initial => None,
            Self::After(key) => Some(key),
        }
    }
}

/// Fixed-width RFC 3339 rendering with nanoseconds and a `Z` suffix.
///
/// Two renderings compare as text in the same order as the instants they
/// describe, so stores can compare them without parsing. Only holds for
/// timestamps accepted by [`timestamp_in_range`].
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn timestamp_in_range(ts: &DateTime<Utc>) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&ts.year())
}

/// Inverse of [`format_timestamp`]. Anything not in exactly that shape,
/// including other offsets or fewer fractional digits, is rejected.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let ts = DateTime::parse_from_rfc3339(raw).ok()?.with_timezone(&Utc);
    (format_timestamp(&ts) == raw).then_some(ts)
}

/// Encodes a key as an opaque, URL-path-safe token.
///
/// Fails for keys [`decode`] could not give back: timestamps outside
/// [`timestamp_in_range`] and identifiers containing the delimiter.
pub fn encode(key: &SortKey) -> Result<String, KeyError> {
    if !timestamp_in_range(&key.created_at) {
        return Err(KeyError::TimestampOutOfRange(key.created_at));
    }
    if key.id.contains(DELIMITER) {
        return Err(KeyError::DelimiterInId(key.id.clone()));
    }
    let raw = format!("{}{}{}", format_timestamp(&key.created_at), DELIMITER, key.id);
    Ok(B64.encode(raw))
}

/// Decodes a token produced by [`encode`]. Either both fields come back or
/// the call fails with [`PageError::InvalidCursor`].
pub fn decode(token: &str) -> Result<SortKey, PageError> {
    let bytes = B64
        .decode(token)
        .map_err(|_| PageError::InvalidCursor("not base64"))?;
    let raw = String::from_utf8(bytes).map_err(|_| PageError::InvalidCursor("not utf-8"))?;

    let mut fields = raw.split(DELIMITER);
    let (Some(ts), Some(id), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(PageError::InvalidCursor("expected a timestamp and an identifier"));
    };
    if id.is_empty() {
        return Err(PageError::InvalidCursor("empty identifier"));
    }
    let created_at = parse_timestamp(ts).ok_or(PageError::InvalidCursor("malformed timestamp"))?;

    Ok(SortKey::new(created_at, id))
}
