use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use tracing::{info, warn};
use uuid::Uuid;

use roster_db::Database;
use roster_db::models::NewEmployee;
use roster_paging::Planner;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub planner: Planner<Database>,
    /// Employee allowed to manage every other employee.
    pub admin_email: String,
    pub hasher: Argon2<'static>,
    dummy_hash: OnceLock<String>,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, admin_email: impl Into<String>) -> Self {
        Self {
            planner: Planner::new(db.clone()),
            db,
            admin_email: admin_email.into(),
            hasher: Argon2::default(),
            dummy_hash: OnceLock::new(),
        }
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.planner = self.planner.with_timeout(timeout);
        self
    }

    /// Replaces the Argon2id cost parameters used for new hashes. Existing
    /// hashes carry their own parameters and keep verifying.
    pub fn with_hasher(mut self, hasher: Argon2<'static>) -> Self {
        self.hasher = hasher;
        self.dummy_hash = OnceLock::new();
        self
    }

    pub fn is_admin(&self, email: &str) -> bool {
        email.eq_ignore_ascii_case(&self.admin_email)
    }

    /// Hash verified against when the email is unknown, so a miss costs the
    /// same as a wrong password.
    pub(crate) fn dummy_hash(&self) -> &str {
        self.dummy_hash.get_or_init(|| {
            hash_password(&self.hasher, "no such employee").unwrap_or_else(|e| {
                warn!("Could not build the dummy password hash: {}", e);
                String::new()
            })
        })
    }
}

/// The employee a request was authenticated as.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub is_admin: bool,
}

impl AuthUser {
    pub fn can_manage(&self, employee_id: Uuid) -> bool {
        self.is_admin || self.id == employee_id
    }
}

/// Hash a password with Argon2id and a fresh salt.
pub fn hash_password(hasher: &Argon2<'_>, password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = hasher
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("Password hashing failed: {}", e))?;
    Ok(hash.to_string())
}

/// False for a wrong password and for a stored hash that does not parse.
pub fn verify_password(hasher: &Argon2<'_>, password_hash: &str, password: &str) -> bool {
    PasswordHash::new(password_hash)
        .map(|parsed| hasher.verify_password(password.as_bytes(), &parsed).is_ok())
        .unwrap_or(false)
}

/// Creates the admin account unless an employee with that email exists.
/// Returns whether an account was created. Blocking.
pub fn ensure_admin(state: &AppStateInner, password: &str) -> anyhow::Result<bool> {
    if state.db.get_employee_by_email(&state.admin_email)?.is_some() {
        return Ok(false);
    }

    let password = hash_password(&state.hasher, password)?;
    let admin = state.db.insert_employee(NewEmployee {
        id: Uuid::new_v4().to_string(),
        email: state.admin_email.clone(),
        first_name: String::new(),
        last_name: String::new(),
        password,
        active: true,
    })?;

    info!("Created admin account {} ({})", admin.email, admin.id);
    Ok(true)
}
