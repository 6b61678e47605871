use crate::types::CredentialRecord;
use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

/// Refresh this long before the actual expiration (15 minutes)
pub const DEFAULT_REFRESH_BUFFER_SECS: u64 = 900;

/// Decides whether a held record can still be handed out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityPolicy {
    buffer: TimeDelta,
}

impl Default for ValidityPolicy {
    fn default() -> Self {
        Self {
            buffer: TimeDelta::seconds(DEFAULT_REFRESH_BUFFER_SECS as i64),
        }
    }
}

impl ValidityPolicy {
    /// `None` if the buffer does not fit in a `TimeDelta`
    pub fn new(buffer: Duration) -> Option<Self> {
        TimeDelta::from_std(buffer).ok().map(|buffer| Self { buffer })
    }

    pub fn buffer(&self) -> TimeDelta {
        self.buffer
    }

    pub fn is_valid(&self, record: Option<&CredentialRecord>) -> bool {
        self.is_valid_at(record, Utc::now())
    }

    /// Valid only if `now + buffer` is strictly before the expiration.
    /// A missing record, an unparseable expiration or a deadline past the
    /// representable range is invalid.
    pub fn is_valid_at(&self, record: Option<&CredentialRecord>, now: DateTime<Utc>) -> bool {
        let Some(record) = record else {
            return false;
        };

        match record.expires_at() {
            Ok(expiration) => now
                .checked_add_signed(self.buffer)
                .is_some_and(|deadline| deadline < expiration),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse credential expiration '{}': {}",
                    record.expiration,
                    e
                );
                false
            }
        }
    }
}
