//! `AppState`/`Builder`: the same chained-setter builder shape as
//! `server/src/lib.rs`'s `Builder`/`AppState`, trimmed to the single
//! `Store` adapter this workspace needs instead of cloudillo's
//! auth/meta adapter pair.

use std::sync::Arc;
use std::time::Duration;

use collabnotes_crdt::{DocRegistry, RegistryConfig};
use collabnotes_types::prelude::*;
use collabnotes_types::Store;

use crate::config::Config;
use crate::middleware::IpRateLimiter;

#[derive(Debug)]
pub struct AppState {
	pub config: Config,
	pub store: Arc<dyn Store>,
	pub registry: Arc<DocRegistry>,
	pub rate_limiter: Arc<IpRateLimiter>,
}

pub type App = Arc<AppState>;

pub struct Builder {
	config: Config,
	store: Option<Arc<dyn Store>>,
}

impl Builder {
	pub fn new(config: Config) -> Self {
		Self { config, store: None }
	}

	pub fn store(&mut self, store: Arc<dyn Store>) -> &mut Self {
		self.store = Some(store);
		self
	}

	/// Assemble the `AppState` and initialize logging. Panics (the
	/// teacher's `.expect` idiom for required builder fields) if no
	/// store was configured — a missing adapter is a startup-time
	/// programming error, not a runtime condition callers can recover
	/// from.
	pub fn build(self) -> App {
		tracing_subscriber::fmt()
			.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
			.with_target(false)
			.init();

		let store = self.store.expect("FATAL: no store adapter configured");
		let registry = DocRegistry::new(store.clone(), self.config.registry_config());
		let rate_limiter = IpRateLimiter::new(self.config.rate_limit_config());

		Arc::new(AppState { config: self.config, store, registry, rate_limiter })
	}
}

impl AppState {
	/// Readiness check per §4.6: Store connectivity and the registry
	/// lock must both be obtainable without blocking.
	pub async fn is_ready(&self) -> bool {
		self.registry.is_responsive() && self.store.list(1, 0).await.is_ok()
	}

	/// Drain in the documented order (§4.6): the caller stops accepting
	/// new transport sessions before calling this; this then flushes
	/// every dirty session within `deadline`. The `Store` itself has no
	/// explicit close step in this design — connections are dropped
	/// with the process.
	pub async fn shutdown(&self, deadline: Duration) {
		info!("draining live sessions before shutdown");
		let _ = tokio::time::timeout(deadline, self.registry.drain()).await;
		info!("shutdown drain complete");
	}
}

// vim: ts=4
