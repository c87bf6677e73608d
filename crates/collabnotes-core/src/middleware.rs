//! Ambient axum middleware: request id tagging and per-IP rate
//! limiting. Grounded in the pack's `request_id_middleware` idiom
//! (stamp a header on the way in, echo it on the way out) and in the
//! teacher's own `governor` dependency (already in `server/Cargo.toml`,
//! unused by the modules we ground the CRDT core on — reused here).

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use governor::clock::DefaultClock;
use governor::state::keyed::DashMapStateStore;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use uuid::Uuid;

use collabnotes_types::prelude::*;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Stamp every request and response with a fresh request id, and emit
/// a start/end log pair carrying it — mirrors the pack's
/// `request_id_middleware`/`logging_middleware` pair.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
	let request_id = Uuid::new_v4().to_string();
	if let Ok(value) = HeaderValue::from_str(&request_id) {
		req.headers_mut().insert(REQUEST_ID_HEADER, value.clone());
		let method = req.method().clone();
		let uri = req.uri().clone();
		debug!(request_id = %request_id, %method, %uri, "request started");
		let mut response = next.run(req).await;
		response.headers_mut().insert(REQUEST_ID_HEADER, value);
		debug!(request_id = %request_id, status = response.status().as_u16(), "request completed");
		response
	} else {
		next.run(req).await
	}
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
	pub requests_per_minute: u32,
}

/// Per-IP GCRA limiter keyed by `IpAddr`, built on `governor` the way
/// `cloudillo-core`'s own rate limiter does (`RateLimiter` over a keyed
/// state store), trimmed to the single per-IP tier this spec needs.
pub struct IpRateLimiter {
	limiter: RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>,
}

impl std::fmt::Debug for IpRateLimiter {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("IpRateLimiter").finish_non_exhaustive()
	}
}

impl IpRateLimiter {
	pub fn new(config: RateLimitConfig) -> Arc<Self> {
		let per_minute =
			NonZeroU32::new(config.requests_per_minute.max(1)).unwrap_or(NonZeroU32::MIN);
		let quota = Quota::per_minute(per_minute);
		Arc::new(Self { limiter: RateLimiter::keyed(quota) })
	}

	fn check(&self, addr: IpAddr) -> bool {
		self.limiter.check_key(&addr).is_ok()
	}
}

/// `axum::middleware::from_fn_with_state` handler enforcing the per-IP
/// quota. Requests without a resolvable peer address (e.g. behind a
/// misconfigured proxy) are allowed through rather than blocked.
pub async fn rate_limit_middleware(
	State(limiter): State<Arc<IpRateLimiter>>,
	ConnectInfo(addr): ConnectInfo<SocketAddr>,
	req: Request,
	next: Next,
) -> Result<Response, Error> {
	if !limiter.check(addr.ip()) {
		warn!(ip = %addr.ip(), "rate limit exceeded");
		return Err(Error::RateLimited);
	}
	Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn limiter_admits_then_rejects_burst() {
		let limiter = IpRateLimiter::new(RateLimitConfig { requests_per_minute: 1 });
		let addr: IpAddr = "127.0.0.1".parse().unwrap();
		assert!(limiter.check(addr));
		assert!(!limiter.check(addr));
	}
}

// vim: ts=4
