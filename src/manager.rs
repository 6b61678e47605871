use crate::cache::CacheStore;
use crate::config::Config;
use crate::metadata::MetadataClient;
use crate::types::{BuildError, CredentialFetchError, CredentialRecord, EnvironmentMapping};
use crate::validity::ValidityPolicy;

/// Serves credentials from memory while they are valid and refreshes them
/// from the metadata service otherwise.
///
/// The manager owns the in-memory record exclusively. It is seeded from the
/// cache file at construction and replaced as a whole on every refresh.
#[derive(Debug)]
pub struct CredentialManager {
    cache: CacheStore,
    client: MetadataClient,
    policy: ValidityPolicy,
    current: Option<CredentialRecord>,
}

impl CredentialManager {
    /// Fails if `config` does not validate or the HTTP client cannot be built
    pub fn new(config: &Config) -> Result<Self, BuildError> {
        config.validate()?;
        let policy = config.validity_policy()?;
        let client = MetadataClient::new(&config.endpoint, config.timeout(), config.token_ttl())?;
        let cache = CacheStore::new(&config.cache_file);

        Ok(Self::from_parts(cache, client, policy))
    }

    /// Build from prepared components, loading the cached record
    pub fn from_parts(cache: CacheStore, client: MetadataClient, policy: ValidityPolicy) -> Self {
        let current = cache.load();
        if current.is_some() {
            tracing::debug!("Seeded credentials from {}", cache.path().display());
        }

        Self {
            cache,
            client,
            policy,
            current,
        }
    }

    /// The held record, without checking or refreshing it
    pub fn current(&self) -> Option<&CredentialRecord> {
        self.current.as_ref()
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Return valid credentials, running a metadata handshake if the held
    /// record is missing or about to expire.
    ///
    /// On failure the in-memory record and the cache file are left as they
    /// were; a stale record is never returned.
    pub async fn get_credentials(&mut self) -> Result<CredentialRecord, CredentialFetchError> {
        if let Some(record) = self.current.as_ref().filter(|r| self.policy.is_valid(Some(*r))) {
            tracing::info!("Using cached credentials");
            return Ok(record.clone());
        }

        tracing::info!("Fetching new credentials from {}", self.client.endpoint());
        let record = self.client.handshake().await.map_err(|e| {
            tracing::error!("Failed to get new credentials: {}", e);
            CredentialFetchError::from(e)
        })?;

        self.cache.save(&record);
        tracing::info!(
            access_key_id = %record.access_key_id,
            expiration = %record.expiration,
            "Refreshed credentials"
        );
        self.current = Some(record.clone());
        Ok(record)
    }

    /// `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and `AWS_SESSION_TOKEN`
    /// from a validated record. Applying them is up to the caller.
    pub async fn get_environment_mapping(
        &mut self,
    ) -> Result<EnvironmentMapping, CredentialFetchError> {
        Ok(self.get_credentials().await?.environment())
    }
}
