//! Session Service Library
//!
//! Issues short-lived access tokens and single-use refresh tokens, verifies
//! access tokens on protected routes and rotates refresh tokens through an
//! atomic consume in the renewal store.
//!
//! # Modules
//!
//! - `clock` - Time source used for token timestamps
//! - `codec` - HS256 token encoding and verification
//! - `config` - Service configuration
//! - `errors` - Error types
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication gate and HTTP metrics
//! - `models` - Request and response bodies
//! - `observability` - Metrics
//! - `routes` - Router and application state
//! - `services` - Token service and identity directory
//! - `store` - Renewal store (Redis and in-memory)

pub mod clock;
pub mod codec;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
pub mod store;
