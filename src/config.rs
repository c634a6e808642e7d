//! Configuration types.

use std::path::PathBuf;

use crate::error::ConfigError;

const DEFAULT_DB_PATH: &str = "./data/lead-intake.db";
const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Runtime configuration for the intake service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeConfig {
    /// libSQL database file.
    pub db_path: PathBuf,
    /// Directory uploads are staged in before processing.
    pub staging_dir: PathBuf,
    /// Maximum number of attempts processed at once.
    pub max_concurrent: usize,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            staging_dir: std::env::temp_dir().join("lead-intake"),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

impl IntakeConfig {
    /// Read `LEAD_INTAKE_*` environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let db_path = lookup("LEAD_INTAKE_DB_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let staging_dir = lookup("LEAD_INTAKE_STAGING_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.staging_dir);

        let max_concurrent = match lookup("LEAD_INTAKE_MAX_CONCURRENT") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "LEAD_INTAKE_MAX_CONCURRENT".to_string(),
                        message: format!("expected a positive integer, got '{raw}'"),
                    });
                }
            },
            None => defaults.max_concurrent,
        };

        Ok(Self {
            db_path,
            staging_dir,
            max_concurrent,
        })
    }

    /// Create the staging directory if it doesn't exist.
    pub fn ensure_staging_dir(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.staging_dir)?;
        Ok(())
    }
}
