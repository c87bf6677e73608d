//! `DocSession`: the per-document actor. One dedicated task per live
//! document is the serial lane described in the design notes — the only
//! place the document's CRDT replica is mutated. Everything else
//! (clients, the HTTP API, the registry) talks to it through
//! [`SessionHandle`], whose commands queue on an `mpsc` channel.
//!
//! Queueing on that channel is what gives us the load-before-apply
//! invariant for free: the very first thing the spawned task does is
//! load from the `Store`, and only after that completes does it start
//! draining commands — so a client frame that arrived before load
//! finished simply waits in the channel buffer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use collabnotes_types::prelude::*;
use collabnotes_types::{DocEvent, DocumentPatch, Store};

use crate::awareness::{AwarenessEntry, AwarenessTable};
use crate::protocol::{ClientState, Frame};
use crate::replica::CrdtReplica;

pub type ClientId = u64;

#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
	pub debounce: Duration,
	pub retry_max: u32,
	pub retry_backoff: Duration,
	pub awareness_ttl: Duration,
	pub awareness_sweep: Duration,
}

impl Default for SessionConfig {
	fn default() -> Self {
		Self {
			debounce: Duration::from_millis(1000),
			retry_max: 3,
			retry_backoff: Duration::from_millis(250),
			awareness_ttl: Duration::from_secs(30),
			awareness_sweep: Duration::from_secs(10),
		}
	}
}

enum SessionCommand {
	Attach {
		client_id: ClientId,
		user_id: Box<str>,
		outbound: mpsc::Sender<Frame>,
		reply: oneshot::Sender<ClResult<()>>,
	},
	Frame {
		client_id: ClientId,
		frame: Frame,
	},
	AwarenessHeartbeat {
		client_id: ClientId,
	},
	Detach {
		client_id: ClientId,
	},
	ApplyHttpPatch {
		patch: DocumentPatch,
		reply: oneshot::Sender<ClResult<()>>,
	},
	Notify(DocEvent),
	Drain {
		deadline: Duration,
		reply: oneshot::Sender<()>,
	},
	PersistDone {
		digest: [u8; 32],
		outcome: Result<(), String>,
	},
}

/// A cheap, cloneable reference to a live session's command queue.
#[derive(Clone, Debug)]
pub struct SessionHandle {
	doc_id: Box<str>,
	tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
	pub fn doc_id(&self) -> &str {
		&self.doc_id
	}

	/// Register a new client. The session answers with `SyncStep1` on
	/// `outbound` once attached; `outbound`'s capacity is the client's
	/// `M_outbound` backpressure cap.
	pub async fn attach(
		&self,
		client_id: ClientId,
		user_id: impl Into<Box<str>>,
		outbound: mpsc::Sender<Frame>,
	) -> ClResult<()> {
		let (reply_tx, reply_rx) = oneshot::channel();
		self.tx
			.send(SessionCommand::Attach { client_id, user_id: user_id.into(), outbound, reply: reply_tx })
			.await
			.map_err(|_| Error::Internal("session lane closed".into()))?;
		reply_rx.await.map_err(|_| Error::Internal("session dropped reply".into()))?
	}

	pub async fn inbound(&self, client_id: ClientId, frame: Frame) {
		let _ = self.tx.send(SessionCommand::Frame { client_id, frame }).await;
	}

	pub async fn heartbeat(&self, client_id: ClientId) {
		let _ = self.tx.send(SessionCommand::AwarenessHeartbeat { client_id }).await;
	}

	pub async fn detach(&self, client_id: ClientId) {
		let _ = self.tx.send(SessionCommand::Detach { client_id }).await;
	}

	/// Route an `HttpApi` write through the live session so the replica,
	/// projections, and snapshot stay coherent (design notes §9(i)).
	pub async fn apply_http_patch(&self, patch: DocumentPatch) -> ClResult<()> {
		let (reply_tx, reply_rx) = oneshot::channel();
		self.tx
			.send(SessionCommand::ApplyHttpPatch { patch, reply: reply_tx })
			.await
			.map_err(|_| Error::Internal("session lane closed".into()))?;
		reply_rx.await.map_err(|_| Error::Internal("session dropped reply".into()))?
	}

	pub async fn notify(&self, event: DocEvent) {
		let _ = self.tx.send(SessionCommand::Notify(event)).await;
	}

	pub async fn drain(&self, deadline: Duration) {
		let (reply_tx, reply_rx) = oneshot::channel();
		if self.tx.send(SessionCommand::Drain { deadline, reply: reply_tx }).await.is_ok() {
			let _ = reply_rx.await;
		}
	}
}

struct AttachedClient {
	user_id: Box<str>,
	state: ClientState,
	outbound: mpsc::Sender<Frame>,
}

/// Spawn the session's task and return a handle to it. `on_idle` is
/// notified (with the document id) once the session has torn itself
/// down, so the registry can drop its map entry.
pub fn spawn(
	doc_id: impl Into<Box<str>>,
	store: Arc<dyn Store>,
	config: SessionConfig,
	on_idle: mpsc::UnboundedSender<Box<str>>,
) -> SessionHandle {
	let doc_id: Box<str> = doc_id.into();
	let (tx, rx) = mpsc::channel(256);
	let handle = SessionHandle { doc_id: doc_id.clone(), tx: tx.clone() };
	tokio::spawn(run(doc_id, store, config, rx, tx, on_idle));
	handle
}

async fn load_replica(store: &dyn Store, doc_id: &str) -> ClResult<(CrdtReplica, bool)> {
	match store.get(doc_id).await {
		Ok(doc) => {
			if !doc.crdt_snapshot.is_empty() {
				Ok((CrdtReplica::from_snapshot(&doc.crdt_snapshot)?, false))
			} else if !doc.text_projection.is_empty() {
				let replica = CrdtReplica::new();
				replica.seed_from_text(&doc.text_projection);
				Ok((replica, true))
			} else {
				Ok((CrdtReplica::new(), true))
			}
		}
		Err(Error::NotFound) => Ok((CrdtReplica::new(), true)),
		Err(err) => Err(err),
	}
}

async fn run(
	doc_id: Box<str>,
	store: Arc<dyn Store>,
	config: SessionConfig,
	mut cmd_rx: mpsc::Receiver<SessionCommand>,
	self_tx: mpsc::Sender<SessionCommand>,
	on_idle: mpsc::UnboundedSender<Box<str>>,
) {
	let _span = info_span!("doc_session", %doc_id).entered();

	let (replica, dirty) = match load_replica(store.as_ref(), &doc_id).await {
		Ok(pair) => pair,
		Err(err) => {
			error!(%err, "failed to load document for session");
			let message = err.to_string();
			drop(_span);
			drain_with_error(&mut cmd_rx, message).await;
			let _ = on_idle.send(doc_id);
			return;
		}
	};
	info!("session started");

	let mut session = Session {
		doc_id,
		store,
		config,
		replica,
		dirty,
		clients: HashMap::new(),
		awareness: AwarenessTable::new(),
		last_persisted_digest: None,
		persist_in_flight: false,
		persist_failures: 0,
		self_tx,
	};
	session.run(cmd_rx).await;
	let _ = on_idle.send(session.doc_id);
}

/// Answer every already-queued command that expects a reply with a
/// fatal error, so callers waiting on `attach`/`apply_http_patch` don't
/// hang forever when the session never came up.
async fn drain_with_error(cmd_rx: &mut mpsc::Receiver<SessionCommand>, message: String) {
	while let Ok(cmd) = cmd_rx.try_recv() {
		match cmd {
			SessionCommand::Attach { reply, .. } => {
				let _ = reply.send(Err(Error::Fatal(message.clone())));
			}
			SessionCommand::ApplyHttpPatch { reply, .. } => {
				let _ = reply.send(Err(Error::Fatal(message.clone())));
			}
			SessionCommand::Drain { reply, .. } => {
				let _ = reply.send(());
			}
			_ => {}
		}
	}
}

struct Session {
	doc_id: Box<str>,
	store: Arc<dyn Store>,
	config: SessionConfig,
	replica: CrdtReplica,
	dirty: bool,
	clients: HashMap<ClientId, AttachedClient>,
	awareness: AwarenessTable,
	last_persisted_digest: Option<[u8; 32]>,
	persist_in_flight: bool,
	persist_failures: u32,
	self_tx: mpsc::Sender<SessionCommand>,
}

impl Session {
	async fn run(&mut self, mut cmd_rx: mpsc::Receiver<SessionCommand>) {
		let mut debounce_deadline: Option<Instant> = None;
		let mut awareness_sweep = tokio::time::interval(self.config.awareness_sweep);

		loop {
			let sleep_until_debounce = async {
				match debounce_deadline {
					Some(deadline) => tokio::time::sleep_until(deadline).await,
					None => std::future::pending().await,
				}
			};

			tokio::select! {
				cmd = cmd_rx.recv() => {
					let Some(cmd) = cmd else { break };
					if let Command::Shutdown = self.handle(cmd, &mut debounce_deadline).await {
						break;
					}
				}
				_ = sleep_until_debounce, if debounce_deadline.is_some() => {
					debounce_deadline = None;
					self.maybe_persist(false).await;
				}
				_ = awareness_sweep.tick() => {
					self.sweep_awareness().await;
				}
			}

			if self.clients.is_empty() && !self.dirty && !self.persist_in_flight {
				break;
			}
		}

		info!("session idle, tearing down");
	}

	async fn handle(&mut self, cmd: SessionCommand, debounce_deadline: &mut Option<Instant>) -> Command {
		match cmd {
			SessionCommand::Attach { client_id, user_id, outbound, reply } => {
				let initial = Frame::SyncStep1 { state_vector: self.replica.state_vector() };
				if outbound.send(initial).await.is_err() {
					let _ = reply.send(Err(Error::Internal("client outbound closed".into())));
					return Command::Continue;
				}
				self.clients
					.insert(client_id, AttachedClient { user_id, state: ClientState::Handshaking, outbound });
				let _ = reply.send(Ok(()));
				info!(client_id, attached = self.clients.len(), "client attached");
				Command::Continue
			}
			SessionCommand::Frame { client_id, frame } => {
				self.on_frame(client_id, frame, debounce_deadline).await;
				Command::Continue
			}
			SessionCommand::AwarenessHeartbeat { client_id } => {
				if let Some(client) = self.clients.get(&client_id) {
					self.awareness.heartbeat(&client.user_id);
				}
				Command::Continue
			}
			SessionCommand::Detach { client_id } => {
				self.detach_client(client_id, debounce_deadline).await;
				Command::Continue
			}
			SessionCommand::ApplyHttpPatch { patch, reply } => {
				let outcome = self.apply_http_patch(patch, debounce_deadline).await;
				let _ = reply.send(outcome);
				Command::Continue
			}
			SessionCommand::Notify(DocEvent::Deleted) => {
				for client in self.clients.values() {
					let _ = client.outbound.send(Frame::closing("deleted")).await;
				}
				self.clients.clear();
				self.dirty = false;
				Command::Shutdown
			}
			SessionCommand::Drain { deadline, reply } => {
				self.drain_now(deadline).await;
				let _ = reply.send(());
				Command::Shutdown
			}
			SessionCommand::PersistDone { digest, outcome } => {
				self.on_persist_done(digest, outcome, debounce_deadline).await;
				Command::Continue
			}
		}
	}

	async fn on_frame(&mut self, client_id: ClientId, frame: Frame, debounce_deadline: &mut Option<Instant>) {
		let Some(state) = self.clients.get(&client_id).map(|c| c.state) else { return };

		match frame {
			Frame::SyncStep1 { state_vector } => {
				let Ok(diff) = self.replica.compute_diff_against_vector(&state_vector) else {
					self.close_client(client_id, "malformed state vector").await;
					return;
				};
				self.send_to(client_id, Frame::SyncStep2 { update: diff }).await;
			}
			Frame::SyncStep2 { update } | Frame::Update { update } => {
				let before = self.replica.comments_digest();
				if let Err(err) = self.replica.apply_update(&update) {
					warn!(%err, client_id, "rejecting malformed update");
					self.close_client(client_id, "malformed update").await;
					return;
				}
				self.replica.rebase_comment_anchors(self.replica.text().chars().count());
				self.replica.enforce_comment_schema();
				let comments_touched = before != self.replica.comments_digest();

				if matches!(state, ClientState::Handshaking) {
					self.set_client_state(client_id, ClientState::Ready);
				}

				self.broadcast_except(client_id, Frame::Update { update }).await;
				self.dirty = true;
				*debounce_deadline = Some(Instant::now() + self.config.debounce);

				if comments_touched || self.clients.len() <= 1 {
					self.maybe_persist(true).await;
				}
			}
			Frame::AwarenessUpdate { payload } => {
				// Best-effort JSON decode for the structured presence table;
				// the payload is fanned out opaquely regardless, since peers
				// decode it themselves.
				if let Ok(entry) = serde_json::from_slice::<AwarenessEntry>(&payload) {
					if let Some(client) = self.clients.get(&client_id) {
						self.awareness.set(client.user_id.clone(), entry);
					}
				}
				self.broadcast_except(client_id, Frame::AwarenessUpdate { payload }).await;
			}
			Frame::Auth { .. } | Frame::Closing { .. } => {
				// Auth is a pluggable hook evaluated by the caller before the
				// frame ever reaches the lane; Closing is server-to-client only.
			}
		}
	}

	fn set_client_state(&mut self, client_id: ClientId, state: ClientState) {
		if let Some(client) = self.clients.get_mut(&client_id) {
			client.state = state;
		}
	}

	async fn send_to(&mut self, client_id: ClientId, frame: Frame) {
		let mut drop_client = false;
		if let Some(client) = self.clients.get(&client_id) {
			if client.outbound.try_send(frame).is_err() {
				drop_client = true;
			}
		}
		if drop_client {
			warn!(client_id, "outbound buffer full, dropping client");
			self.clients.remove(&client_id);
		}
	}

	async fn broadcast(&mut self, frame: Frame) {
		let targets: Vec<ClientId> = self.clients.keys().copied().collect();
		for client_id in targets {
			self.send_to(client_id, frame.clone()).await;
		}
	}

	async fn broadcast_except(&mut self, except: ClientId, frame: Frame) {
		let targets: Vec<ClientId> = self.clients.keys().copied().filter(|id| *id != except).collect();
		for client_id in targets {
			self.send_to(client_id, frame.clone()).await;
		}
	}

	async fn close_client(&mut self, client_id: ClientId, reason: &str) {
		if let Some(client) = self.clients.remove(&client_id) {
			let _ = client.outbound.send(Frame::closing(reason)).await;
		}
	}

	async fn detach_client(&mut self, client_id: ClientId, debounce_deadline: &mut Option<Instant>) {
		self.clients.remove(&client_id);
		info!(client_id, remaining = self.clients.len(), "client detached");
		if self.clients.is_empty() && self.dirty {
			*debounce_deadline = None;
			self.maybe_persist(true).await;
		}
	}

	async fn apply_http_patch(
		&mut self,
		patch: DocumentPatch,
		debounce_deadline: &mut Option<Instant>,
	) -> ClResult<()> {
		if patch.is_empty() {
			return Ok(());
		}
		if let Patch::Value(text) = &patch.text_projection {
			self.replica.replace_text(text);
			self.dirty = true;
			let update = Frame::Update { update: self.replica.encode_state() };
			self.broadcast(update).await;
		}
		self.dirty = true;
		*debounce_deadline = Some(Instant::now() + self.config.debounce);
		self.store.patch(&self.doc_id, patch).await?;
		Ok(())
	}

	async fn sweep_awareness(&mut self) {
		let evicted = self.awareness.evict_stale(self.config.awareness_ttl);
		if evicted.is_empty() {
			return;
		}
		for user_id in evicted {
			debug!(%user_id, "awareness entry evicted");
		}
	}

	/// Snapshot, diff against the last-persisted digest, and either skip
	/// or spawn the actual `Store` call off-lane. `force` is set by the
	/// immediate-persist triggers of §4.3.2.
	async fn maybe_persist(&mut self, force: bool) {
		if self.persist_in_flight {
			return;
		}
		if !self.dirty && !force {
			return;
		}

		let snapshot = self.replica.encode_state();
		let digest: [u8; 32] = Sha256::digest(&snapshot).into();
		if Some(digest) == self.last_persisted_digest {
			self.dirty = false;
			return;
		}

		let text_projection = self.replica.text();
		self.persist_in_flight = true;

		let store = self.store.clone();
		let doc_id = self.doc_id.clone();
		let reply_tx = self.self_tx.clone();
		let retry_max = self.config.retry_max;
		let retry_backoff = self.config.retry_backoff;

		tokio::spawn(async move {
			let mut attempt = 0;
			let outcome = loop {
				match store
					.upsert_snapshot(&doc_id, &snapshot, &text_projection, None, None, None)
					.await
				{
					Ok(()) => break Ok(()),
					Err(err) if attempt < retry_max => {
						attempt += 1;
						warn!(%doc_id, attempt, %err, "persist attempt failed, retrying");
						tokio::time::sleep(retry_backoff * attempt).await;
					}
					Err(err) => break Err(err.to_string()),
				}
			};
			let _ = reply_tx.send(SessionCommand::PersistDone { digest, outcome }).await;
		});
	}

	async fn on_persist_done(
		&mut self,
		digest: [u8; 32],
		outcome: Result<(), String>,
		debounce_deadline: &mut Option<Instant>,
	) {
		self.persist_in_flight = false;
		match outcome {
			Ok(()) => {
				self.dirty = false;
				self.persist_failures = 0;
				self.last_persisted_digest = Some(digest);
				debug!("persist succeeded");
			}
			Err(message) => {
				self.persist_failures += 1;
				error!(failures = self.persist_failures, %message, "persist failed, leaving dirty");
				*debounce_deadline =
					Some(Instant::now() + self.config.retry_backoff * self.persist_failures.max(1));
			}
		}
	}

	async fn drain_now(&mut self, deadline: Duration) {
		let going_away = Frame::closing("server going away");
		for client in self.clients.values() {
			let _ = client.outbound.send(going_away.clone()).await;
		}
		self.clients.clear();
		if self.dirty {
			let snapshot = self.replica.encode_state();
			let text_projection = self.replica.text();
			let result = tokio::time::timeout(
				deadline,
				self.store.upsert_snapshot(&self.doc_id, &snapshot, &text_projection, None, None, None),
			)
			.await;
			match result {
				Ok(Ok(())) => {
					self.dirty = false;
					info!("final flush succeeded");
				}
				Ok(Err(err)) => error!(%err, "final flush failed"),
				Err(_) => error!("final flush timed out"),
			}
		}
	}
}

/// Internal control-flow signal from `handle` back to the select loop.
enum Command {
	Continue,
	Shutdown,
}


// vim: ts=4
