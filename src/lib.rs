// Library exports for integration tests
pub mod cache;
pub mod config;
pub mod manager;
pub mod metadata;
pub mod types;
pub mod validity;

// Re-export commonly used types
pub use cache::CacheStore;
pub use config::Config;
pub use manager::CredentialManager;
pub use metadata::{HandshakeStep, MetadataClient, RoleName, SessionToken};
pub use types::{
    BuildError, CacheError, ConfigError, CredentialFetchError, CredentialRecord, EnvironmentMapping,
    MetadataError,
};
pub use validity::ValidityPolicy;
