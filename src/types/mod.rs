pub mod error;
pub mod models;

pub use error::{BuildError, CacheError, ConfigError, CredentialFetchError, MetadataError};
pub use models::{CredentialRecord, EnvironmentMapping};
