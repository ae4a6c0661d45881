//! Database row types. These map directly to SQLite rows and stay
//! independent of the API's wire types.

use chrono::{DateTime, Utc};
use roster_paging::{Keyed, SortKey};

#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeRow {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Argon2 PHC string.
    pub password: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Keyed for EmployeeRow {
    fn sort_key(&self) -> SortKey {
        SortKey::new(self.created_at, self.id.clone())
    }
}

/// Mutable profile fields. The password and `created_at` are not in here.
#[derive(Debug, Clone)]
pub struct EmployeeChanges {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub active: bool,
}

/// An employee about to be inserted. The store stamps the timestamps.
#[derive(Debug, Clone)]
pub struct NewEmployee {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub active: bool,
}
