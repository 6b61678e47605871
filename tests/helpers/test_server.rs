use axum::{
    Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
};
use imdscache::{CredentialRecord, metadata};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Scripted answers of the mock metadata service
#[derive(Debug, Clone)]
pub struct Behavior {
    pub token_delay: Duration,
    pub token_status: StatusCode,
    pub role_listing: String,
    pub credentials_status: StatusCode,
    pub credentials_body: String,
}

impl Behavior {
    /// Healthy service handing out `record` for the test role
    pub fn serving(record: &CredentialRecord) -> Self {
        Self {
            token_delay: Duration::ZERO,
            token_status: StatusCode::OK,
            role_listing: format!("{}\n", super::TEST_ROLE),
            credentials_status: StatusCode::OK,
            credentials_body: credentials_document(record),
        }
    }
}

/// Credentials document the way the metadata service renders it
pub fn credentials_document(record: &CredentialRecord) -> String {
    serde_json::json!({
        "Code": "Success",
        "LastUpdated": "2025-01-01T00:00:00Z",
        "Type": "AWS-HMAC",
        "AccessKeyId": record.access_key_id,
        "SecretAccessKey": record.secret_access_key,
        "Token": record.session_token,
        "Expiration": record.expiration,
    })
    .to_string()
}

/// What the mock saw
#[derive(Default)]
pub struct Recorded {
    pub token_requests: AtomicUsize,
    pub role_requests: AtomicUsize,
    pub credential_requests: AtomicUsize,
    pub ttl_headers: Mutex<Vec<Option<String>>>,
    pub issued_tokens: Mutex<Vec<String>>,
    /// Session token presented on each role or credentials request
    pub presented_tokens: Mutex<Vec<Option<String>>>,
    pub requested_roles: Mutex<Vec<String>>,
}

#[derive(Clone)]
struct MockState {
    behavior: Arc<Mutex<Behavior>>,
    recorded: Arc<Recorded>,
}

/// Mock metadata service handle that automatically shuts down on drop
///
/// This starts a real HTTP server on a random port serving the token, role
/// listing and credentials paths, so the production client is exercised
/// over the wire.
pub struct MockMetadataServer {
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
    #[allow(dead_code)] // Keep handle alive to prevent task abort
    handle: JoinHandle<()>,
    behavior: Arc<Mutex<Behavior>>,
    pub recorded: Arc<Recorded>,
    pub endpoint: String,
}

impl MockMetadataServer {
    pub async fn start(behavior: Behavior) -> Self {
        let state = MockState {
            behavior: Arc::new(Mutex::new(behavior)),
            recorded: Arc::new(Recorded::default()),
        };

        let credentials_path = format!("{}{{role}}", CREDENTIALS_PATH);
        let app = Router::new()
            .route(TOKEN_PATH, put(issue_token))
            .route(CREDENTIALS_PATH, get(list_roles))
            .route(&credentials_path, get(role_credentials))
            .with_state(state.clone());

        // Bind to a random available port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        // Spawn server task
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        // Give the server a moment to start
        tokio::time::sleep(Duration::from_millis(100)).await;

        MockMetadataServer {
            shutdown_tx: Some(shutdown_tx),
            handle,
            behavior: state.behavior,
            recorded: state.recorded,
            endpoint: format!("http://{}", addr),
        }
    }

    /// Change the scripted answers for subsequent requests
    pub fn set_behavior(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn token_requests(&self) -> usize {
        self.recorded.token_requests.load(Ordering::SeqCst)
    }

    pub fn role_requests(&self) -> usize {
        self.recorded.role_requests.load(Ordering::SeqCst)
    }

    pub fn credential_requests(&self) -> usize {
        self.recorded.credential_requests.load(Ordering::SeqCst)
    }

    pub fn total_requests(&self) -> usize {
        self.token_requests() + self.role_requests() + self.credential_requests()
    }
}

impl Drop for MockMetadataServer {
    fn drop(&mut self) {
        // Signal shutdown (ignore errors if already shut down)
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

const TOKEN_PATH: &str = "/latest/api/token";
const CREDENTIALS_PATH: &str = "/latest/meta-data/iam/security-credentials/";

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Only the most recently issued token is accepted
fn authorized(state: &MockState, headers: &HeaderMap) -> bool {
    let presented = header(headers, metadata::TOKEN_HEADER);
    state.recorded.presented_tokens.lock().unwrap().push(presented.clone());

    let issued = state.recorded.issued_tokens.lock().unwrap();
    presented.is_some() && issued.last() == presented.as_ref()
}

async fn issue_token(State(state): State<MockState>, headers: HeaderMap) -> Response {
    let n = state.recorded.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
    state
        .recorded
        .ttl_headers
        .lock()
        .unwrap()
        .push(header(&headers, metadata::TOKEN_TTL_HEADER));

    let (delay, status) = {
        let behavior = state.behavior.lock().unwrap();
        (behavior.token_delay, behavior.token_status)
    };
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    if !status.is_success() {
        return status.into_response();
    }

    let token = format!("mock-session-token-{}", n);
    state
        .recorded
        .issued_tokens
        .lock()
        .unwrap()
        .push(token.clone());
    (StatusCode::OK, token).into_response()
}

async fn list_roles(State(state): State<MockState>, headers: HeaderMap) -> Response {
    state.recorded.role_requests.fetch_add(1, Ordering::SeqCst);
    if !authorized(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let listing = state.behavior.lock().unwrap().role_listing.clone();
    (StatusCode::OK, listing).into_response()
}

async fn role_credentials(
    Path(role): Path<String>,
    State(state): State<MockState>,
    headers: HeaderMap,
) -> Response {
    state
        .recorded
        .credential_requests
        .fetch_add(1, Ordering::SeqCst);
    state.recorded.requested_roles.lock().unwrap().push(role);
    if !authorized(&state, &headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let (status, body) = {
        let behavior = state.behavior.lock().unwrap();
        (behavior.credentials_status, behavior.credentials_body.clone())
    };
    if !status.is_success() {
        return status.into_response();
    }
    (StatusCode::OK, body).into_response()
}
