//! HTTP routes for the session service.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_session, AuthState};
use crate::services::{IdentityVerifier, TokenService};
use axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::warn;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService>,

    pub identity: Arc<dyn IdentityVerifier>,

    /// Mark the refresh cookie `Secure`.
    pub secure_cookies: bool,

    /// Origin allowed by CORS, with credentials.
    pub frontend_url: String,

    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        config: &Config,
        tokens: Arc<TokenService>,
        identity: Arc<dyn IdentityVerifier>,
    ) -> Self {
        Self {
            tokens,
            identity,
            secure_cookies: config.app_env.secure_cookies(),
            frontend_url: config.frontend_url.clone(),
            request_timeout: config.request_timeout,
        }
    }
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness probe - public
/// - `/ready` - Readiness probe (pings the renewal store) - public
/// - `/metrics` - Prometheus metrics - public
/// - `/auth/register`, `/auth/login`, `/auth/refresh`, `/auth/logout` - public
/// - `/me` - Current user - requires a bearer access token
/// - TraceLayer, request timeout, CORS and HTTP metrics middleware
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        tokens: state.tokens.clone(),
    });
    let request_timeout = state.request_timeout;
    let cors = cors_layer(&state.frontend_url);

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/refresh", post(handlers::refresh))
        .route("/auth/logout", post(handlers::logout))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    let protected_routes = Router::new()
        .route("/me", get(handlers::get_me))
        .route_layer(middleware::from_fn_with_state(auth_state, require_session))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer (innermost)
    // 2. TraceLayer
    // 3. CorsLayer, answers preflight before tracing and timeout
    // 4. http_metrics_middleware (outermost), sees every response
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn(http_metrics_middleware))
}

/// CORS for the browser frontend. Credentials are allowed so the refresh
/// cookie is sent cross-origin.
fn cors_layer(frontend_url: &str) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-csrf-token"),
        ])
        .allow_credentials(true)
        .max_age(Duration::from_secs(300));

    match HeaderValue::from_str(frontend_url) {
        Ok(origin) => cors.allow_origin(origin),
        Err(_) => {
            warn!(target: "session.routes", "FRONTEND_URL is not a valid origin; cross-origin requests disabled");
            cors
        }
    }
}
