use crate::Database;
use crate::models::{EmployeeChanges, EmployeeRow, NewEmployee};
use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use roster_paging::{
    RowStore, SortKey, StoreError, format_timestamp, parse_timestamp, timestamp_in_range,
};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension};

const EMPLOYEE_COLUMNS: &str =
    "id, email, first_name, last_name, password, active, created_at, updated_at";

impl Database {
    // -- Employees --

    /// Inserts an employee, stamping `created_at` under the writer lock.
    ///
    /// Stamps strictly increase in commit order, even if the clock stalls or
    /// steps back, so a row can never land behind a cursor already handed
    /// out for an earlier row.
    pub fn insert_employee(&self, employee: NewEmployee) -> Result<EmployeeRow> {
        self.with_conn_mut(|conn| {
            let created_at = next_created_at(conn)?;
            let row = EmployeeRow {
                id: employee.id,
                email: employee.email,
                first_name: employee.first_name,
                last_name: employee.last_name,
                password: employee.password,
                active: employee.active,
                created_at,
                updated_at: created_at,
            };
            insert_row(conn, &row)?;
            Ok(row)
        })
    }

    pub fn get_employee(&self, id: &str) -> Result<Option<EmployeeRow>> {
        self.with_conn(|conn| query_employee(conn, "id", id))
    }

    pub fn get_employee_by_email(&self, email: &str) -> Result<Option<EmployeeRow>> {
        self.with_conn(|conn| query_employee(conn, "email", email))
    }

    /// Returns `false` when no employee has this id.
    pub fn update_employee(
        &self,
        id: &str,
        changes: &EmployeeChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE employees
                 SET email = ?1, first_name = ?2, last_name = ?3, active = ?4, updated_at = ?5
                 WHERE id = ?6",
                rusqlite::params![
                    changes.email,
                    changes.first_name,
                    changes.last_name,
                    changes.active,
                    stored_timestamp(&updated_at)?,
                    id,
                ],
            )?;
            Ok(n > 0)
        })
    }

    pub fn set_password(&self, id: &str, password_hash: &str, updated_at: DateTime<Utc>) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "UPDATE employees SET password = ?1, updated_at = ?2 WHERE id = ?3",
                rusqlite::params![password_hash, stored_timestamp(&updated_at)?, id],
            )?;
            Ok(n > 0)
        })
    }

    pub fn delete_employee(&self, id: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM employees WHERE id = ?1", [id])?;
            Ok(n > 0)
        })
    }

    // -- Listing --

    /// Keyset boundary query: up to `limit` employees strictly after `after`
    /// in `(created_at, id)` order.
    pub fn employees_after(&self, after: Option<&SortKey>, limit: usize) -> Result<Vec<EmployeeRow>> {
        self.with_conn(|conn| query_employees_after(conn, after, limit))
    }
}

impl RowStore for Database {
    type Row = EmployeeRow;

    fn rows_after(&self, after: Option<&SortKey>, limit: usize) -> Result<Vec<EmployeeRow>, StoreError> {
        self.employees_after(after, limit).map_err(StoreError::new)
    }
}

/// True when `err` came from a UNIQUE constraint, e.g. a duplicate email.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn next_created_at(conn: &Connection) -> Result<DateTime<Utc>> {
    let now = Utc::now();
    let latest: Option<String> =
        conn.query_row("SELECT MAX(created_at) FROM employees", [], |row| row.get(0))?;

    Ok(match latest.as_deref().and_then(parse_timestamp) {
        Some(latest) if latest >= now => latest + TimeDelta::nanoseconds(1),
        _ => now,
    })
}

/// Timestamps outside the cursor range would sort out of order as text and
/// could never be paged past, so they are refused at write time.
fn stored_timestamp(ts: &DateTime<Utc>) -> Result<String> {
    anyhow::ensure!(timestamp_in_range(ts), "timestamp {} is out of range", ts);
    Ok(format_timestamp(ts))
}

fn insert_row(conn: &Connection, employee: &EmployeeRow) -> Result<()> {
    conn.execute(
        "INSERT INTO employees (id, email, first_name, last_name, password, active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            employee.id,
            employee.email,
            employee.first_name,
            employee.last_name,
            employee.password,
            employee.active,
            stored_timestamp(&employee.created_at)?,
            stored_timestamp(&employee.updated_at)?,
        ],
    )?;
    Ok(())
}

fn query_employee(conn: &Connection, column: &str, value: &str) -> Result<Option<EmployeeRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE {column} = ?1"
    ))?;

    let row = stmt.query_row([value], employee_from_row).optional()?;

    Ok(row)
}

fn query_employees_after(
    conn: &Connection,
    after: Option<&SortKey>,
    limit: usize,
) -> Result<Vec<EmployeeRow>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    // Row-value comparison keeps rows that share the boundary timestamp but
    // sort after the boundary id. Timestamps are fixed-width text, so text
    // order is time order and the (created_at, id) index serves the scan.
    let rows = match after {
        Some(key) => {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {EMPLOYEE_COLUMNS} FROM employees
                 WHERE (created_at, id) > (?1, ?2)
                 ORDER BY created_at ASC, id ASC
                 LIMIT ?3"
            ))?;
            stmt.query_map(
                rusqlite::params![format_timestamp(&key.created_at), key.id, limit],
                employee_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {EMPLOYEE_COLUMNS} FROM employees
                 ORDER BY created_at ASC, id ASC
                 LIMIT ?1"
            ))?;
            stmt.query_map([limit], employee_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok(rows)
}

fn employee_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EmployeeRow> {
    Ok(EmployeeRow {
        id: row.get(0)?,
        email: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        password: row.get(4)?,
        active: row.get(5)?,
        created_at: timestamp_column(row, 6)?,
        updated_at: timestamp_column(row, 7)?,
    })
}

fn timestamp_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_timestamp(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("malformed timestamp '{}'", raw).into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use roster_paging::{FIRST_PAGE_TOKEN, PageError, PageSize, Planner};
    use std::sync::Arc;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn employee(id: &str, email: &str, created_at: DateTime<Utc>) -> EmployeeRow {
        EmployeeRow {
            id: id.to_string(),
            email: email.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            password: "$argon2id$stub".to_string(),
            active: true,
            created_at,
            updated_at: created_at,
        }
    }

    /// Inserts with explicit timestamps so tests can force collisions.
    fn put(db: &Database, row: &EmployeeRow) -> Result<()> {
        db.with_conn_mut(|conn| insert_row(conn, row))
    }

    fn new_employee(id: &str, email: &str) -> NewEmployee {
        NewEmployee {
            id: id.to_string(),
            email: email.to_string(),
            first_name: String::new(),
            last_name: String::new(),
            password: "$argon2id$stub".to_string(),
            active: true,
        }
    }

    fn ids(rows: &[EmployeeRow]) -> Vec<&str> {
        rows.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn create_and_fetch() {
        let db = Database::open_in_memory().unwrap();
        let id = uuid::Uuid::new_v4().to_string();
        let created = Utc.timestamp_opt(1_717_304_436, 357_147_123).unwrap();
        let row = employee(&id, "ada@example.com", created);
        put(&db, &row).unwrap();

        assert_eq!(db.get_employee(&id).unwrap(), Some(row.clone()));
        // Emails match case-insensitively.
        assert_eq!(db.get_employee_by_email("ADA@example.com").unwrap(), Some(row));
        assert_eq!(db.get_employee("missing").unwrap(), None);
    }

    #[test]
    fn duplicate_email_is_a_unique_violation() {
        let db = Database::open_in_memory().unwrap();
        put(&db, &employee("a", "dup@example.com", at(1))).unwrap();

        let err = db
            .insert_employee(new_employee("b", "Dup@Example.com"))
            .unwrap_err();
        assert!(is_unique_violation(&err));

        let other = anyhow::anyhow!("something else");
        assert!(!is_unique_violation(&other));
    }

    #[test]
    fn timestamps_past_year_9999_are_refused() {
        let db = Database::open_in_memory().unwrap();
        let last = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap();
        put(&db, &employee("edge", "edge@example.com", last)).unwrap();

        let beyond = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        assert!(put(&db, &employee("far", "far@example.com", beyond)).is_err());
        assert!(db.get_employee("far").unwrap().is_none());

        let changes = EmployeeChanges {
            email: "edge@example.com".to_string(),
            first_name: String::new(),
            last_name: String::new(),
            active: true,
        };
        assert!(db.update_employee("edge", &changes, beyond).is_err());
        assert!(db.set_password("edge", "$argon2id$other", beyond).is_err());
    }

    #[test]
    fn insert_stamps_strictly_increasing_keys() {
        let db = Database::open_in_memory().unwrap();
        // A row stamped far in the future stands in for a clock that stepped back.
        let future = Utc::now() + TimeDelta::days(1);
        put(&db, &employee("zzz", "future@example.com", future)).unwrap();

        let first = db.insert_employee(new_employee("b", "b@example.com")).unwrap();
        let second = db.insert_employee(new_employee("a", "a@example.com")).unwrap();
        assert!(first.created_at > future);
        assert!(second.created_at > first.created_at);
        assert_eq!(first.updated_at, first.created_at);

        assert_eq!(db.get_employee("b").unwrap(), Some(first));
        assert_eq!(ids(&db.employees_after(None, 10).unwrap()), ["zzz", "b", "a"]);
    }

    #[test]
    fn update_keeps_password_and_created_at() {
        let db = Database::open_in_memory().unwrap();
        put(&db, &employee("a", "a@example.com", at(10))).unwrap();

        let changes = EmployeeChanges {
            email: "new@example.com".to_string(),
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            active: false,
        };
        assert!(db.update_employee("a", &changes, at(20)).unwrap());
        assert!(!db.update_employee("missing", &changes, at(20)).unwrap());

        let row = db.get_employee("a").unwrap().unwrap();
        assert_eq!(row.email, "new@example.com");
        assert_eq!(row.first_name, "Grace");
        assert!(!row.active);
        assert_eq!(row.password, "$argon2id$stub");
        assert_eq!(row.created_at, at(10));
        assert_eq!(row.updated_at, at(20));
    }

    #[test]
    fn password_reset_and_delete() {
        let db = Database::open_in_memory().unwrap();
        put(&db, &employee("a", "a@example.com", at(10))).unwrap();

        assert!(db.set_password("a", "$argon2id$other", at(11)).unwrap());
        assert_eq!(db.get_employee("a").unwrap().unwrap().password, "$argon2id$other");

        assert!(db.delete_employee("a").unwrap());
        assert!(!db.delete_employee("a").unwrap());
        assert_eq!(db.get_employee("a").unwrap(), None);
    }

    #[test]
    fn boundary_query_breaks_timestamp_ties_on_id() {
        let db = Database::open_in_memory().unwrap();
        put(&db, &employee("u3", "c@example.com", at(2000))).unwrap();
        put(&db, &employee("u2", "b@example.com", at(1000))).unwrap();
        put(&db, &employee("u1", "a@example.com", at(1000))).unwrap();
        put(&db, &employee("u0", "z@example.com", at(500))).unwrap();

        assert_eq!(ids(&db.employees_after(None, 10).unwrap()), ["u0", "u1", "u2", "u3"]);
        assert_eq!(ids(&db.employees_after(None, 2).unwrap()), ["u0", "u1"]);

        // A timestamp-only predicate would drop u2 here.
        let after_u1 = SortKey::new(at(1000), "u1");
        assert_eq!(ids(&db.employees_after(Some(&after_u1), 10).unwrap()), ["u2", "u3"]);

        let after_u2 = SortKey::new(at(1000), "u2");
        assert_eq!(ids(&db.employees_after(Some(&after_u2), 10).unwrap()), ["u3"]);

        let after_last = SortKey::new(at(2000), "u3");
        assert!(db.employees_after(Some(&after_last), 10).unwrap().is_empty());
    }

    #[test]
    fn boundary_query_respects_sub_second_order() {
        let db = Database::open_in_memory().unwrap();
        let early = Utc.timestamp_opt(100, 5).unwrap();
        let late = Utc.timestamp_opt(100, 40_000_000).unwrap();
        put(&db, &employee("b", "late@example.com", late)).unwrap();
        put(&db, &employee("z", "early@example.com", early)).unwrap();

        assert_eq!(ids(&db.employees_after(None, 10).unwrap()), ["z", "b"]);
        let after_early = SortKey::new(early, "z");
        assert_eq!(ids(&db.employees_after(Some(&after_early), 10).unwrap()), ["b"]);
    }

    #[tokio::test]
    async fn planner_walks_the_table() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        for i in 0..7 {
            let id = format!("id-{i}");
            put(&db, &employee(&id, &format!("e{i}@example.com"), at(i / 2)))
                .unwrap();
        }
        let planner = Planner::new(db.clone());
        let size = PageSize::new(3).unwrap();

        let mut seen = Vec::new();
        let mut token = FIRST_PAGE_TOKEN.to_string();
        loop {
            let page = planner.page(&token, size).await.unwrap();
            seen.extend(page.items.iter().map(|r| r.id.clone()));
            match page.next_cursor().map(str::to_string) {
                Some(next) => token = next,
                None => {
                    token = page.resume_cursor;
                    break;
                }
            }
        }
        assert_eq!(seen, (0..7).map(|i| format!("id-{i}")).collect::<Vec<_>>());
        assert!(matches!(planner.page(&token, size).await, Err(PageError::NoMoreResults)));
    }

    #[test]
    fn file_backed_readers_see_committed_rows() {
        let path = std::env::temp_dir().join(format!("roster_db_test_{}.db", uuid::Uuid::new_v4()));
        let db = Database::open(&path, std::time::Duration::from_secs(3)).unwrap();

        put(&db, &employee("a", "a@example.com", at(1))).unwrap();
        // Every reader in the pool sees the write.
        for _ in 0..8 {
            assert_eq!(ids(&db.employees_after(None, 10).unwrap()), ["a"]);
        }

        drop(db);
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }
}
