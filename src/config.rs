// ⚙️ Runtime configuration
// Read from the environment (a `.env` file is loaded first when present).

use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;

use crate::logging::LogFormat;

pub const DEFAULT_DB_PATH: &str = "medical.db";
pub const DEFAULT_AUDIT_USER_ID: i64 = 1;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// SQLite database file (MEDICAL_DB_PATH)
    pub db_path: PathBuf,

    /// compact | json (MEDICAL_LOG_FORMAT)
    pub log_format: LogFormat,

    /// Audit id stamped on writes made from the CLI (MEDICAL_AUDIT_USER_ID)
    pub audit_user_id: i64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            log_format: LogFormat::Compact,
            audit_user_id: DEFAULT_AUDIT_USER_ID,
        }
    }
}

impl Config {
    /// Load `.env` (if any) then read the process environment
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup (used by tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(path) = lookup("MEDICAL_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }

        if let Some(format) = lookup("MEDICAL_LOG_FORMAT") {
            config.log_format = LogFormat::parse(&format)
                .ok_or_else(|| anyhow!("MEDICAL_LOG_FORMAT must be compact or json, got {format:?}"))?;
        }

        if let Some(id) = lookup("MEDICAL_AUDIT_USER_ID") {
            config.audit_user_id = id
                .trim()
                .parse()
                .with_context(|| format!("MEDICAL_AUDIT_USER_ID is not an integer: {id:?}"))?;
        }

        Ok(config)
    }
}
