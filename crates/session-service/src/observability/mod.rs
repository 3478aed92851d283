//! Observability for the session service.
//!
//! All instrumentation uses `#[instrument(skip_all)]` and explicit field
//! allow-listing:
//! - **SAFE**: user ids, outcomes, operation names, durations
//! - **NEVER**: tokens, rotation ids, passwords, the signing secret, Redis URLs

pub mod metrics;
