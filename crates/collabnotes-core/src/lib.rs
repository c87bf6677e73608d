#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

//! Application state, configuration, and ambient HTTP middleware.
//!
//! - [`config`] reads every key enumerated in spec §6.4 from the
//!   environment.
//! - [`state`] is the `AppState`/`Builder` pair, mirroring
//!   `server/src/lib.rs`'s own `AppState`/`Builder`.
//! - [`middleware`] is request-id tagging and per-IP rate limiting.
//! - [`health`] is the `GET /health` report shape.

pub mod config;
pub mod health;
pub mod middleware;
pub mod state;

pub use config::Config;
pub use health::HealthReport;
pub use middleware::{rate_limit_middleware, request_id_middleware, IpRateLimiter, RateLimitConfig};
pub use state::{App, AppState, Builder};

// vim: ts=4
