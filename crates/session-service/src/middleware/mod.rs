//! HTTP middleware for the session service.
//!
//! - `auth` - request authentication gate for protected routes
//! - `http_metrics` - HTTP request metrics for every response

pub mod auth;
pub mod http_metrics;

pub use auth::{authenticate, extract_bearer_token, require_session, AuthState, AuthenticatedUser};
pub use http_metrics::http_metrics_middleware;
