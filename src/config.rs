use crate::metadata::{DEFAULT_TIMEOUT_SECS, DEFAULT_TOKEN_TTL_SECS, METADATA_ROOT};
use crate::types::ConfigError;
use crate::validity::{DEFAULT_REFRESH_BUFFER_SECS, ValidityPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CACHE_FILE: &str = ".sts_cache.json";

/// Session token lifetimes accepted by the metadata service
pub const TOKEN_TTL_RANGE_SECS: std::ops::RangeInclusive<u64> = 1..=DEFAULT_TOKEN_TTL_SECS;

/// Manager configuration. Every field has a default, so a config file only
/// lists what it overrides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub cache_file: PathBuf,
    pub endpoint: String,
    pub token_ttl_secs: u64,
    pub timeout_secs: u64,
    pub refresh_buffer_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
            endpoint: METADATA_ROOT.to_string(),
            token_ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            refresh_buffer_secs: DEFAULT_REFRESH_BUFFER_SECS,
        }
    }
}

impl Config {
    /// Load from a `.json`, `.yaml` or `.yml` file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let content = fs::read_to_string(path)?;

        let config = match extension.as_str() {
            "json" => serde_json::from_str(&content)?,
            "yaml" | "yml" => serde_yml::from_str(&content)?,
            other => return Err(ConfigError::UnsupportedFormat(other.to_string())),
        };
        Self::validate(&config)?;
        Ok(config)
    }

    /// Reject values the metadata service or the validity check cannot use
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !TOKEN_TTL_RANGE_SECS.contains(&self.token_ttl_secs) {
            return Err(ConfigError::Invalid {
                field: "token_ttl_secs",
                reason: format!(
                    "{} is outside {}..={}",
                    self.token_ttl_secs,
                    TOKEN_TTL_RANGE_SECS.start(),
                    TOKEN_TTL_RANGE_SECS.end()
                ),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        self.validity_policy()?;
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }

    pub fn refresh_buffer(&self) -> Duration {
        Duration::from_secs(self.refresh_buffer_secs)
    }

    pub fn validity_policy(&self) -> Result<ValidityPolicy, ConfigError> {
        ValidityPolicy::new(self.refresh_buffer()).ok_or_else(|| ConfigError::Invalid {
            field: "refresh_buffer_secs",
            reason: format!("{} is too large", self.refresh_buffer_secs),
        })
    }
}
