#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

//! Top-level entry point wiring `collabnotes-core` + `collabnotes-crdt`
//! + `collabnotes-http` into one axum server, mirroring
//! `server/src/lib.rs`'s `Builder::run`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use collabnotes_core::Config;
use collabnotes_types::prelude::*;
use collabnotes_types::Store;

/// Adapters the caller must supply before `run` can start the server.
/// Named the same way as the teacher's own `Adapters`/builder-arg
/// struct, trimmed to the one adapter this workspace needs.
pub struct CollabNotesOpts {
	pub store: Arc<dyn Store>,
}

pub async fn run(config: Config, opts: CollabNotesOpts) -> ClResult<()> {
	let listen = config.listen.clone();

	let mut builder = collabnotes_core::Builder::new(config);
	builder.store(opts.store);
	let app = builder.build();

	let router = collabnotes_http::init(app.clone());
	let listener = tokio::net::TcpListener::bind(listen.as_ref()).await?;
	info!("listening on {listen}");

	let make_service = router.into_make_service_with_connect_info::<SocketAddr>();

	axum::serve(listener, make_service).with_graceful_shutdown(shutdown_signal()).await?;

	// §4.6: stop accepting new transport sessions (the graceful-shutdown
	// future above has already returned) → broadcast "server going away"
	// and flush dirty sessions, both inside `AppState::shutdown` → close
	// Store happens implicitly when `app` is dropped.
	app.shutdown(Duration::from_secs(10)).await;

	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		let _ = tokio::signal::ctrl_c().await;
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut sig) => {
				sig.recv().await;
			}
			Err(err) => {
				error!(%err, "failed to install SIGTERM handler");
				std::future::pending::<()>().await;
			}
		}
	};
	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {}
		_ = terminate => {}
	}
	info!("shutdown signal received");
}

// vim: ts=4
