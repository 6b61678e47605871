use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};
use std::collections::BTreeMap;
use std::fmt;

/// Format of the `Expiration` field, always UTC with second precision
pub const EXPIRATION_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";

/// Environment variables handed to a consumer process
pub type EnvironmentMapping = BTreeMap<&'static str, String>;

/// Temporary credentials issued for the instance role
///
/// The serialized form uses the metadata service's key names, so the same
/// type parses the service response and the on-disk cache. Extra keys sent
/// by the service (`Code`, `LastUpdated`, `Type`) are ignored.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    #[serde(rename = "AccessKeyId", deserialize_with = "non_empty")]
    pub access_key_id: String,
    #[serde(rename = "SecretAccessKey", deserialize_with = "non_empty")]
    pub secret_access_key: String,
    #[serde(rename = "Token", deserialize_with = "non_empty")]
    pub session_token: String,
    /// Kept verbatim; an unparseable value makes the record invalid
    #[serde(rename = "Expiration", deserialize_with = "non_empty")]
    pub expiration: String,
}

/// A blank field is as good as a missing one
fn non_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let value = String::deserialize(deserializer)?;
    if value.trim().is_empty() {
        return Err(de::Error::invalid_value(
            de::Unexpected::Str(&value),
            &"a non-empty string",
        ));
    }
    Ok(value)
}

impl CredentialRecord {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
        expiration: DateTime<Utc>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: session_token.into(),
            expiration: expiration.format(EXPIRATION_FORMAT).to_string(),
        }
    }

    /// Parse the expiration timestamp as UTC
    pub fn expires_at(&self) -> Result<DateTime<Utc>, chrono::ParseError> {
        NaiveDateTime::parse_from_str(&self.expiration, EXPIRATION_FORMAT).map(|dt| dt.and_utc())
    }

    /// The three variables a downstream process needs, without the expiration
    pub fn environment(&self) -> EnvironmentMapping {
        BTreeMap::from([
            (ENV_ACCESS_KEY_ID, self.access_key_id.clone()),
            (ENV_SECRET_ACCESS_KEY, self.secret_access_key.clone()),
            (ENV_SESSION_TOKEN, self.session_token.clone()),
        ])
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[redacted]")
            .field("session_token", &"[redacted]")
            .field("expiration", &self.expiration)
            .finish()
    }
}
