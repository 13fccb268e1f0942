//! # Middleware Stack
//!
//! Tower middleware for the API layer:
//! - [`tracing_layer`]: request/response tracing with `TraceLayer`.
//! - [`metrics`]: Prometheus request metrics.
//! - [`registration`]: blocks `/auth/register/` unless registration is enabled.
//! - [`rate_limit`]: per-caller rate limiting.

pub mod metrics;
pub mod rate_limit;
pub mod registration;
pub mod tracing_layer;
