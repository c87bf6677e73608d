//! `GET /health` response body (§6.1). Lives alongside `AppState`
//! rather than in `collabnotes-http` since it reports on state this
//! crate owns.

use serde::Serialize;

use crate::state::App;

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
	pub database: bool,
	/// This design has no cache layer; always `true` to satisfy the
	/// `services` shape §6.1 specifies.
	pub cache: bool,
	pub realtime: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
	pub status: &'static str,
	pub services: ServiceStatus,
}

impl HealthReport {
	pub async fn collect(state: &App) -> Self {
		let database = state.store.list(1, 0).await.is_ok();
		let realtime = state.registry.is_responsive();
		let status = if database && realtime { "healthy" } else { "degraded" };
		Self { status, services: ServiceStatus { database, cache: true, realtime } }
	}

	pub fn is_healthy(&self) -> bool {
		self.status == "healthy"
	}
}

// vim: ts=4
