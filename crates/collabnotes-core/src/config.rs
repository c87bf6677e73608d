//! Startup configuration, read from the environment the way
//! `basic-server/src/main.rs` reads `DB_DIR` — generalized to the full
//! key set of §6.4.

use std::env;
use std::time::Duration;

use collabnotes_crdt::{ClientConfig, RegistryConfig, SessionConfig};
use collabnotes_types::prelude::*;

use crate::middleware::RateLimitConfig;

/// Every configuration key enumerated in §6.4, typed and defaulted.
#[derive(Debug, Clone)]
pub struct Config {
	pub persist_debounce_ms: u64,
	pub persist_retry_max: u32,
	pub persist_retry_backoff_ms: u64,
	pub awareness_ttl_ms: u64,
	pub session_handshake_timeout_ms: u64,
	pub transport_pong_timeout_ms: u64,
	pub transport_ping_interval_ms: u64,
	pub transport_outbound_buffer_frames: usize,
	pub http_body_limit_bytes: usize,
	pub http_rate_limit_rpm: u32,
	pub cors_allowed_origins: Vec<Box<str>>,
	pub store_dsn: Box<str>,
	pub listen: Box<str>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			persist_debounce_ms: 1000,
			persist_retry_max: 3,
			persist_retry_backoff_ms: 250,
			awareness_ttl_ms: 30_000,
			session_handshake_timeout_ms: 10_000,
			transport_pong_timeout_ms: 30_000,
			transport_ping_interval_ms: 15_000,
			transport_outbound_buffer_frames: 256,
			http_body_limit_bytes: 1024 * 1024,
			http_rate_limit_rpm: 600,
			cors_allowed_origins: Vec::new(),
			store_dsn: "sqlite://./data/collabnotes.db".into(),
			listen: "127.0.0.1:8080".into(),
		}
	}
}

impl Config {
	/// Read every key from the environment, falling back to
	/// [`Config::default`] for anything absent or unparseable.
	pub fn from_env() -> ClResult<Self> {
		let defaults = Self::default();
		Ok(Self {
			persist_debounce_ms: env_u64("PERSIST_DEBOUNCE_MS", defaults.persist_debounce_ms)?,
			persist_retry_max: env_u32("PERSIST_RETRY_MAX", defaults.persist_retry_max)?,
			persist_retry_backoff_ms: env_u64(
				"PERSIST_RETRY_BACKOFF_MS",
				defaults.persist_retry_backoff_ms,
			)?,
			awareness_ttl_ms: env_u64("AWARENESS_TTL_MS", defaults.awareness_ttl_ms)?,
			session_handshake_timeout_ms: env_u64(
				"SESSION_HANDSHAKE_TIMEOUT_MS",
				defaults.session_handshake_timeout_ms,
			)?,
			transport_pong_timeout_ms: env_u64(
				"TRANSPORT_PONG_TIMEOUT_MS",
				defaults.transport_pong_timeout_ms,
			)?,
			transport_ping_interval_ms: env_u64(
				"TRANSPORT_PING_INTERVAL_MS",
				defaults.transport_ping_interval_ms,
			)?,
			transport_outbound_buffer_frames: env_usize(
				"TRANSPORT_OUTBOUND_BUFFER_FRAMES",
				defaults.transport_outbound_buffer_frames,
			)?,
			http_body_limit_bytes: env_usize(
				"HTTP_BODY_LIMIT_BYTES",
				defaults.http_body_limit_bytes,
			)?,
			http_rate_limit_rpm: env_u32("HTTP_RATE_LIMIT_RPM", defaults.http_rate_limit_rpm)?,
			cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
				.ok()
				.map(|v| v.split(',').map(|s| s.trim().into()).collect())
				.unwrap_or(defaults.cors_allowed_origins),
			store_dsn: env::var("STORE_DSN").map(Into::into).unwrap_or(defaults.store_dsn),
			listen: env::var("LISTEN").map(Into::into).unwrap_or(defaults.listen),
		})
	}

	pub fn session_config(&self) -> SessionConfig {
		SessionConfig {
			debounce: Duration::from_millis(self.persist_debounce_ms),
			retry_max: self.persist_retry_max,
			retry_backoff: Duration::from_millis(self.persist_retry_backoff_ms),
			awareness_ttl: Duration::from_millis(self.awareness_ttl_ms),
			awareness_sweep: Duration::from_millis(self.awareness_ttl_ms / 3).max(
				Duration::from_secs(1),
			),
		}
	}

	pub fn registry_config(&self) -> RegistryConfig {
		RegistryConfig { session: self.session_config(), shutdown_deadline: Duration::from_secs(5) }
	}

	pub fn rate_limit_config(&self) -> RateLimitConfig {
		RateLimitConfig { requests_per_minute: self.http_rate_limit_rpm }
	}

	pub fn client_config(&self) -> ClientConfig {
		ClientConfig {
			outbound_buffer: self.transport_outbound_buffer_frames,
			ping_interval: Duration::from_millis(self.transport_ping_interval_ms),
			pong_timeout: Duration::from_millis(self.transport_pong_timeout_ms),
			handshake_timeout: Duration::from_millis(self.session_handshake_timeout_ms),
		}
	}
}

fn env_u64(key: &str, default: u64) -> ClResult<u64> {
	parse_env(key, default, |v| {
		v.parse().map_err(|_| Error::Validation(format!("{key} must be an integer")))
	})
}

fn env_u32(key: &str, default: u32) -> ClResult<u32> {
	parse_env(key, default, |v| {
		v.parse().map_err(|_| Error::Validation(format!("{key} must be an integer")))
	})
}

fn env_usize(key: &str, default: usize) -> ClResult<usize> {
	parse_env(key, default, |v| {
		v.parse().map_err(|_| Error::Validation(format!("{key} must be an integer")))
	})
}

fn parse_env<T>(key: &str, default: T, parse: impl FnOnce(&str) -> ClResult<T>) -> ClResult<T> {
	match env::var(key) {
		Ok(v) => parse(&v),
		Err(env::VarError::NotPresent) => Ok(default),
		Err(env::VarError::NotUnicode(_)) => {
			Err(Error::Fatal(format!("{key} is not valid unicode")))
		}
	}
}

// vim: ts=4
