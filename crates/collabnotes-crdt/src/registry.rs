//! `DocRegistry`: the single process-wide index of live sessions.
//! Horizontal scale-out is out of scope (design notes §9), so the map is
//! an in-process `HashMap` behind a `parking_lot::Mutex` — the teacher's
//! idiom for comparable coarse locks — rather than a sharded or
//! distributed structure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use collabnotes_types::prelude::*;
use collabnotes_types::{DocEvent, Store};

use crate::session::{self, SessionConfig, SessionHandle};

#[derive(Clone, Copy, Debug)]
pub struct RegistryConfig {
	pub session: SessionConfig,
	pub shutdown_deadline: Duration,
}

impl Default for RegistryConfig {
	fn default() -> Self {
		Self { session: SessionConfig::default(), shutdown_deadline: Duration::from_secs(5) }
	}
}

#[derive(Debug)]
struct Inner {
	sessions: HashMap<Box<str>, SessionHandle>,
}

/// Process-wide index mapping document id to live session. At most one
/// `SessionHandle` exists per id at any instant (invariant 6).
#[derive(Debug)]
pub struct DocRegistry {
	inner: Mutex<Inner>,
	store: Arc<dyn Store>,
	config: RegistryConfig,
	idle_tx: mpsc::UnboundedSender<Box<str>>,
}

impl DocRegistry {
	/// `store` backs every session this registry creates. The returned
	/// registry spawns a background task that reaps idle sessions as
	/// they report themselves via the internal `on_idle` channel — callers
	/// never need to drive that loop themselves.
	pub fn new(store: Arc<dyn Store>, config: RegistryConfig) -> Arc<Self> {
		let (idle_tx, mut idle_rx) = mpsc::unbounded_channel();
		let registry = Arc::new(Self {
			inner: Mutex::new(Inner { sessions: HashMap::new() }),
			store,
			config,
			idle_tx,
		});

		let weak = Arc::downgrade(&registry);
		tokio::spawn(async move {
			while let Some(doc_id) = idle_rx.recv().await {
				let Some(registry) = weak.upgrade() else { break };
				registry.reap(&doc_id);
			}
		});

		registry
	}

	fn reap(&self, doc_id: &str) {
		let mut inner = self.inner.lock();
		if inner.sessions.remove(doc_id).is_some() {
			debug!(doc_id, "reaped idle session");
		}
	}

	/// Idempotently create-or-fetch the session for `doc_id`. The lock is
	/// held only long enough to insert-or-clone the handle; the session's
	/// own load from `Store` happens entirely outside it.
	pub fn attach(&self, doc_id: &str) -> SessionHandle {
		let mut inner = self.inner.lock();
		if let Some(handle) = inner.sessions.get(doc_id) {
			return handle.clone();
		}
		let handle =
			session::spawn(doc_id, self.store.clone(), self.config.session, self.idle_tx.clone());
		inner.sessions.insert(doc_id.into(), handle.clone());
		handle
	}

	/// Look up a live session without creating one.
	pub fn lookup(&self, doc_id: &str) -> Option<SessionHandle> {
		self.inner.lock().sessions.get(doc_id).cloned()
	}

	/// Deliver an out-of-band event to a live session, if one exists.
	pub async fn notify(&self, doc_id: &str, event: DocEvent) {
		let handle = self.lookup(doc_id);
		if let Some(handle) = handle {
			handle.notify(event).await;
		}
	}

	pub fn live_count(&self) -> usize {
		self.inner.lock().sessions.len()
	}

	/// Readiness check: the lock must be obtainable without blocking.
	pub fn is_responsive(&self) -> bool {
		self.inner.try_lock().is_some()
	}

	/// Flush every dirty session and close its clients. Called once at
	/// shutdown, after new transport sessions have stopped being accepted.
	pub async fn drain(&self) {
		let handles: Vec<SessionHandle> = {
			let inner = self.inner.lock();
			inner.sessions.values().cloned().collect()
		};
		for handle in handles {
			handle.drain(self.config.shutdown_deadline).await;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use collabnotes_types::{Document, DocumentPatch, DocumentSummary, RenderMode, VersionSnapshot};

	#[derive(Debug, Default)]
	struct EmptyStore;

	#[async_trait]
	impl Store for EmptyStore {
		async fn create(
			&self,
			id: &str,
			title: &str,
			text_projection: &str,
			html_projection: Option<&str>,
			render_mode: RenderMode,
		) -> ClResult<Document> {
			Ok(Document {
				id: id.into(),
				title: title.into(),
				text_projection: text_projection.into(),
				html_projection: html_projection.map(Into::into),
				render_mode,
				crdt_snapshot: Vec::new(),
				created_at: Timestamp::now(),
				updated_at: Timestamp::now(),
				views: 0,
				active_editors: 0,
			})
		}
		async fn get(&self, _id: &str) -> ClResult<Document> {
			Err(Error::NotFound)
		}
		async fn list(&self, _limit: u32, _offset: u32) -> ClResult<Vec<DocumentSummary>> {
			Ok(Vec::new())
		}
		async fn upsert_snapshot(
			&self,
			_id: &str,
			_crdt_snapshot: &[u8],
			_text_projection: &str,
			_html_projection: Option<&str>,
			_title: Option<&str>,
			_render_mode: Option<RenderMode>,
		) -> ClResult<()> {
			Ok(())
		}
		async fn patch(&self, _id: &str, _patch: DocumentPatch) -> ClResult<()> {
			Ok(())
		}
		async fn delete(&self, _id: &str) -> ClResult<()> {
			Ok(())
		}
		async fn append_version(
			&self,
			id: &str,
			snapshot: &[u8],
			author: Option<&str>,
			message: Option<&str>,
		) -> ClResult<VersionSnapshot> {
			Ok(VersionSnapshot {
				id: 1,
				document_id: id.into(),
				version: 1,
				snapshot: snapshot.to_vec(),
				created_at: Timestamp::now(),
				author: author.map(Into::into),
				message: message.map(Into::into),
			})
		}
	}

	#[tokio::test]
	async fn attach_is_idempotent_per_id() {
		let registry = DocRegistry::new(Arc::new(EmptyStore), RegistryConfig::default());
		let a = registry.attach("doc-1");
		let b = registry.attach("doc-1");
		assert_eq!(a.doc_id(), b.doc_id());
		assert_eq!(registry.live_count(), 1);
	}

	#[tokio::test]
	async fn lookup_misses_unattached_id() {
		let registry = DocRegistry::new(Arc::new(EmptyStore), RegistryConfig::default());
		assert!(registry.lookup("never-attached").is_none());
	}
}

// vim: ts=4
