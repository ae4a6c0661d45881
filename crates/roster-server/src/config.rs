use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

use roster_paging::DEFAULT_STORE_TIMEOUT;

/// Server settings, read from `ROSTER_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    /// Bound on each listing query and on SQLite lock waits.
    pub db_timeout: Duration,
    pub admin_email: String,
    /// When set, the admin account is created at startup if missing.
    pub admin_password: Option<String>,
    /// Optional append-mode log file, in addition to stdout.
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = var("ROSTER_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("ROSTER_PORT")
            .unwrap_or_else(|| "8080".into())
            .parse()
            .context("ROSTER_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("ROSTER_HOST must be an IP address")?;

        let db_timeout = match var("ROSTER_DB_TIMEOUT_MS") {
            Some(ms) => Duration::from_millis(
                ms.parse()
                    .context("ROSTER_DB_TIMEOUT_MS must be a number of milliseconds")?,
            ),
            None => DEFAULT_STORE_TIMEOUT,
        };

        Ok(Self {
            addr,
            db_path: var("ROSTER_DB_PATH")
                .unwrap_or_else(|| "roster.db".into())
                .into(),
            db_timeout,
            admin_email: var("ROSTER_ADMIN_EMAIL").unwrap_or_else(|| "admin@example.com".into()),
            admin_password: var("ROSTER_ADMIN_PASSWORD").filter(|p| !p.is_empty()),
            log_file: var("ROSTER_LOG_FILE").filter(|p| !p.is_empty()).map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(cfg.db_path, PathBuf::from("roster.db"));
        assert_eq!(cfg.db_timeout, Duration::from_secs(3));
        assert_eq!(cfg.admin_email, "admin@example.com");
        assert!(cfg.admin_password.is_none());
        assert!(cfg.log_file.is_none());
    }

    #[test]
    fn overrides() {
        let cfg = config(&[
            ("ROSTER_HOST", "127.0.0.1"),
            ("ROSTER_PORT", "9000"),
            ("ROSTER_DB_TIMEOUT_MS", "250"),
            ("ROSTER_ADMIN_PASSWORD", "s3cret-admin"),
            ("ROSTER_LOG_FILE", "roster.log"),
        ])
        .unwrap();
        assert_eq!(cfg.addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(cfg.db_timeout, Duration::from_millis(250));
        assert_eq!(cfg.admin_password.as_deref(), Some("s3cret-admin"));
        assert_eq!(cfg.log_file, Some(PathBuf::from("roster.log")));
    }

    #[test]
    fn bad_numbers_are_startup_errors() {
        assert!(config(&[("ROSTER_PORT", "eighty")]).is_err());
        assert!(config(&[("ROSTER_DB_TIMEOUT_MS", "3s")]).is_err());
        assert!(config(&[("ROSTER_HOST", "not a host")]).is_err());
    }
}
