use super::{
    CREDENTIALS_PATH, HandshakeStep, RoleName, SessionToken, TOKEN_HEADER, TOKEN_PATH,
    TOKEN_TTL_HEADER,
};
use crate::types::{CredentialRecord, MetadataError};
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;

/// HTTP client for the instance metadata service
#[derive(Clone, Debug)]
pub struct MetadataClient {
    endpoint: String,
    inner: Client,
    token_ttl: Duration,
}

impl MetadataClient {
    /// Every request made through this client is bounded by `timeout`
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Duration,
        token_ttl: Duration,
    ) -> Result<Self, MetadataError> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let inner = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(MetadataError::ClientBuild)?;

        Ok(Self {
            endpoint,
            inner,
            token_ttl,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run the full handshake with a fresh session token
    pub async fn handshake(&self) -> Result<CredentialRecord, MetadataError> {
        let token = self.acquire_session_token().await?;
        let role = self.discover_role(&token).await?;
        tracing::debug!(role = %role, "discovered instance role");
        self.fetch_credentials(&token, &role).await
    }

    /// PUT /latest/api/token
    pub async fn acquire_session_token(&self) -> Result<SessionToken, MetadataError> {
        let request = self
            .inner
            .put(self.url(TOKEN_PATH))
            .header(TOKEN_TTL_HEADER, self.token_ttl.as_secs().to_string());

        let body = Self::send(request, HandshakeStep::AcquireToken).await?;
        Ok(SessionToken(body))
    }

    /// GET /latest/meta-data/iam/security-credentials/
    ///
    /// Only the first listed role is used.
    pub async fn discover_role(&self, token: &SessionToken) -> Result<RoleName, MetadataError> {
        let request = self.authorized_get(CREDENTIALS_PATH, token);
        let listing = Self::send(request, HandshakeStep::DiscoverRole).await?;

        RoleName::from_listing(&listing).ok_or_else(|| {
            tracing::error!("Role listing returned by metadata service is empty");
            MetadataError::NoRoleAttached
        })
    }

    /// GET /latest/meta-data/iam/security-credentials/{role}
    pub async fn fetch_credentials(
        &self,
        token: &SessionToken,
        role: &RoleName,
    ) -> Result<CredentialRecord, MetadataError> {
        let path = format!("{}{}", CREDENTIALS_PATH, role.as_str());
        let request = self.authorized_get(&path, token);
        let body = Self::send(request, HandshakeStep::FetchCredentials).await?;

        serde_json::from_str(&body).map_err(|source| {
            tracing::error!(role = %role, "Malformed credentials document: {}", source);
            MetadataError::MalformedCredentials { source }
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    fn authorized_get(&self, path: &str, token: &SessionToken) -> RequestBuilder {
        self.inner
            .get(self.url(path))
            .header(TOKEN_HEADER, token.as_str())
    }

    /// Send a request and read the body as text. Transport errors, timeouts
    /// and non-success statuses all map to `MetadataUnavailable`.
    async fn send(request: RequestBuilder, step: HandshakeStep) -> Result<String, MetadataError> {
        let result = match request.send().await.and_then(Response::error_for_status) {
            Ok(response) => response.text().await,
            Err(e) => Err(e),
        };

        result.map_err(|source| {
            tracing::error!("Metadata request failed while {}: {}", step, source);
            MetadataError::MetadataUnavailable { step, source }
        })
    }
}
