//! Client for the IMDSv2 instance metadata service.
//!
//! Credentials are retrieved with three ordered requests that share one
//! session token: token, role listing, role credentials. Each step takes the
//! typed output of the previous one, so a caller cannot skip ahead.

mod client;

pub use client::MetadataClient;

use std::fmt;

/// Link-local address of the metadata service
pub const METADATA_ROOT: &str = "http://169.254.169.254";

pub(crate) const TOKEN_PATH: &str = "/latest/api/token";
pub(crate) const CREDENTIALS_PATH: &str = "/latest/meta-data/iam/security-credentials/";

pub const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";
pub const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";

/// Requested lifetime of a session token (6 hours)
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 21600;

/// Per-request timeout, short so non-cloud hosts fail fast
pub const DEFAULT_TIMEOUT_SECS: u64 = 2;

/// The three requests of a handshake, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStep {
    AcquireToken,
    DiscoverRole,
    FetchCredentials,
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HandshakeStep::AcquireToken => "requesting session token",
            HandshakeStep::DiscoverRole => "discovering role",
            HandshakeStep::FetchCredentials => "fetching role credentials",
        };
        f.write_str(s)
    }
}

/// Authorizes requests to the metadata service itself. Not to be confused
/// with the session token inside the returned credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken([redacted])")
    }
}

/// Name of the IAM role attached to the instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleName(String);

impl RoleName {
    /// Picks the first non-blank line of a role listing
    pub(crate) fn from_listing(listing: &str) -> Option<Self> {
        listing
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(|line| RoleName(line.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
