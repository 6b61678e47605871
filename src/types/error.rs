use crate::metadata::HandshakeStep;
use thiserror::Error;

/// Failures talking to the instance metadata service
#[derive(Error, Debug)]
pub enum MetadataError {
    /// Network error, timeout or non-success status. Status failures come
    /// from `error_for_status`, so `source.status()` carries the code.
    #[error("metadata service unavailable while {step}: {source}")]
    MetadataUnavailable {
        step: HandshakeStep,
        #[source]
        source: reqwest::Error,
    },

    /// The role listing was empty
    #[error("no IAM role is attached to this instance")]
    NoRoleAttached,

    /// The credentials document is not JSON or lacks a required key
    #[error("malformed credentials response: {source}")]
    MalformedCredentials {
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to build metadata HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

impl MetadataError {
    /// The handshake step that failed, `None` if no request was attempted
    pub fn step(&self) -> Option<HandshakeStep> {
        match self {
            MetadataError::MetadataUnavailable { step, .. } => Some(*step),
            MetadataError::NoRoleAttached => Some(HandshakeStep::DiscoverRole),
            MetadataError::MalformedCredentials { .. } => Some(HandshakeStep::FetchCredentials),
            MetadataError::ClientBuild(_) => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, MetadataError::MetadataUnavailable { source, .. } if source.is_timeout())
    }
}

/// Returned by the credential manager when no valid record is held and a
/// fresh one could not be fetched
#[derive(Error, Debug)]
#[error("failed to fetch credentials from instance metadata")]
pub struct CredentialFetchError {
    #[from]
    source: MetadataError,
}

impl CredentialFetchError {
    /// The underlying metadata failure
    pub fn cause(&self) -> &MetadataError {
        &self.source
    }

    pub fn into_cause(self) -> MetadataError {
        self.source
    }
}

/// Cache file failures. Logged by the cache store, never surfaced to the
/// manager's callers.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache file is not a valid credential record: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration file failures
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid YAML config: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("unsupported config file extension '{0}' (expected json, yaml or yml)")]
    UnsupportedFormat(String),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Failures constructing a credential manager
#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] MetadataError),
}
