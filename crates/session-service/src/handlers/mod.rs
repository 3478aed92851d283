pub mod auth_handler;
pub mod cookies;
pub mod health;
pub mod me;
pub mod metrics;

pub use auth_handler::{login, logout, refresh, register};
pub use health::{health_check, readiness_check};
pub use me::get_me;
pub use metrics::metrics_handler;
