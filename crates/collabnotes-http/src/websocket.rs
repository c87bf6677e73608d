//! `GET /ws/:documentId` (§6.2): upgrades to the binary frame
//! transport and hands the connection to `collabnotes_crdt::Client`,
//! grounded in the teacher's own `server/src/crdt/websocket.rs` upgrade
//! handler.

use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use serde::Deserialize;
use uuid::Uuid;

use collabnotes_core::App;
use collabnotes_crdt::Client;
use collabnotes_types::prelude::*;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
	#[serde(rename = "userId")]
	pub user_id: Option<Box<str>>,
}

/// There is no authentication layer in this design (out of scope,
/// §1); the connecting peer supplies its own display identity via
/// `?userId=`, falling back to a server-generated anonymous id.
pub async fn upgrade(
	State(app): State<App>,
	Path(doc_id): Path<String>,
	Query(query): Query<ConnectQuery>,
	ws: WebSocketUpgrade,
) -> Response {
	let user_id = query.user_id.unwrap_or_else(|| format!("anon-{}", Uuid::new_v4()).into());
	let client_id = NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed);
	let session = app.registry.attach(&doc_id);
	let client_config = app.config.client_config();

	info!(%doc_id, client_id, "websocket upgrade");
	ws.on_upgrade(move |socket| Client::run(socket, client_id, user_id, session, client_config))
}

// vim: ts=4
