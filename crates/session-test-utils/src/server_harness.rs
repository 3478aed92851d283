//! Test server harness for E2E testing
//!
//! Provides `TestSessionServer` for spawning real session service instances
//! in tests. The server uses the in-memory renewal store and a mock clock, so
//! tests can move time forward without sleeping.

use crate::test_ids::{TEST_BCRYPT_COST, TEST_JWT_SECRET};
use common::types::UserId;
use reqwest::header::{HeaderMap, SET_COOKIE};
use session_service::clock::MockClock;
use session_service::codec::TokenCodec;
use session_service::config::Config;
use session_service::handlers::cookies::REFRESH_COOKIE_NAME;
use session_service::observability::metrics::init_metrics_recorder;
use session_service::routes::{self, AppState};
use session_service::services::{InMemoryUserDirectory, TokenPair, TokenService};
use session_service::store::InMemoryRenewalStore;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Test harness for spawning the session service in E2E tests
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_login_flow() -> Result<(), anyhow::Error> {
///     let server = TestSessionServer::spawn().await?;
///     let client = reqwest::Client::new();
///
///     let response = client
///         .post(format!("{}/auth/login", server.url()))
///         .json(&login_request)
///         .send()
///         .await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestSessionServer {
    addr: SocketAddr,
    config: Config,
    clock: Arc<MockClock>,
    store: Arc<InMemoryRenewalStore>,
    tokens: Arc<TokenService>,
    _handle: JoinHandle<()>,
}

impl TestSessionServer {
    /// Spawn a server with default test configuration.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with_vars(&[]).await
    }

    /// Spawn a server, overriding configuration variables.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Sign with [`TEST_JWT_SECRET`] and hash with [`TEST_BCRYPT_COST`]
    /// - Start the HTTP server in the background
    pub async fn spawn_with_vars(overrides: &[(&str, &str)]) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::new();
        vars.insert("JWT_SECRET".to_string(), TEST_JWT_SECRET.to_string());
        vars.insert("STORE_BACKEND".to_string(), "memory".to_string());
        vars.insert("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string());
        vars.insert("BCRYPT_COST".to_string(), TEST_BCRYPT_COST.to_string());
        for (key, value) in overrides {
            vars.insert((*key).to_string(), (*value).to_string());
        }

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Invalid test configuration: {}", e))?;

        let clock = Arc::new(MockClock::starting_now());
        let store = Arc::new(InMemoryRenewalStore::new(clock.clone()));
        let codec = TokenCodec::new(&config.jwt_secret, clock.clone(), config.jwt_clock_skew);
        let tokens = Arc::new(TokenService::new(
            codec,
            store.clone(),
            config.access_token_ttl,
            config.refresh_token_ttl,
        ));
        let identity = Arc::new(
            InMemoryUserDirectory::new(config.bcrypt_cost)
                .map_err(|e| anyhow::anyhow!("Failed to create user directory: {}", e))?,
        );

        let state = Arc::new(AppState::new(&config, tokens.clone(), identity));

        // The global recorder can only be installed once per process. Later
        // servers get a standalone recorder.
        let metrics_handle = match init_metrics_recorder() {
            Ok(handle) => handle,
            Err(_) => {
                use metrics_exporter_prometheus::PrometheusBuilder;
                PrometheusBuilder::new().build_recorder().handle()
            }
        };

        let app = routes::build_routes(state, metrics_handle);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            config,
            clock,
            store,
            tokens,
            _handle: handle,
        })
    }

    /// Get the base URL of the test server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Clock shared by the codec and the renewal store.
    pub fn clock(&self) -> &MockClock {
        &self.clock
    }

    pub fn store(&self) -> &InMemoryRenewalStore {
        &self.store
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Issue a pair directly through the token service, skipping
    /// registration.
    pub async fn issue_tokens_for(&self, user_id: UserId) -> Result<TokenPair, anyhow::Error> {
        self.tokens
            .issue_token_pair(user_id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to issue token pair: {}", e))
    }
}

impl Drop for TestSessionServer {
    fn drop(&mut self) {
        self._handle.abort();
    }
}

/// Value of the refresh cookie set by a response, if any.
///
/// Returns `Some("")` for a cleared cookie.
pub fn refresh_cookie_from(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|cookie| cookie.split(';').next())
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == REFRESH_COOKIE_NAME)
        .map(|(_, value)| value.to_string())
}

/// The raw `Set-Cookie` header for the refresh cookie, attributes included.
pub fn refresh_set_cookie_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|cookie| cookie.starts_with(&format!("{REFRESH_COOKIE_NAME}=")))
        .map(str::to_string)
}
