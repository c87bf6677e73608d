//! The `Store` trait: durable home of documents and version snapshots.
//! Mirrors the teacher's `CrdtAdapter`/`MetaAdapter` trait shape — an
//! `async_trait`, `Debug + Send + Sync`, one `impl` per backend crate
//! under `adapters/`.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::error::ClResult;
use crate::types::{Document, DocumentSummary, Patch, RenderMode, VersionSnapshot};

/// Partial update used by `HttpApi` for non-realtime edits (`PATCH
/// /notes/:id`). Each field distinguishes "leave unchanged" from
/// "clear" from "set to this value" via `Patch<T>`.
#[derive(Debug, Default)]
pub struct DocumentPatch {
	pub title: Patch<Box<str>>,
	pub text_projection: Patch<Box<str>>,
	pub html_projection: Patch<Box<str>>,
}

#[async_trait]
pub trait Store: Debug + Send + Sync {
	/// Insert a new row. Fails with `Error::AlreadyExists` if `id` is taken.
	async fn create(
		&self,
		id: &str,
		title: &str,
		text_projection: &str,
		html_projection: Option<&str>,
		render_mode: RenderMode,
	) -> ClResult<Document>;

	/// Fetch a document, or `Error::NotFound`.
	async fn get(&self, id: &str) -> ClResult<Document>;

	/// A page of summary rows ordered by `updated_at` descending.
	async fn list(&self, limit: u32, offset: u32) -> ClResult<Vec<DocumentSummary>>;

	/// Atomically update the CRDT snapshot and projection(s), bumping
	/// `updated_at`. Creates the row (with supplied fields and defaults)
	/// if it doesn't exist yet.
	async fn upsert_snapshot(
		&self,
		id: &str,
		crdt_snapshot: &[u8],
		text_projection: &str,
		html_projection: Option<&str>,
		title: Option<&str>,
		render_mode: Option<RenderMode>,
	) -> ClResult<()>;

	/// Partial update used by non-realtime HTTP callers.
	async fn patch(&self, id: &str, patch: DocumentPatch) -> ClResult<()>;

	/// Delete the row; cascades to `versions`.
	async fn delete(&self, id: &str) -> ClResult<()>;

	/// Allocate the next strictly increasing, gap-free version for
	/// `id` and append a version snapshot row. Retries internally on
	/// the `(document_id, version)` uniqueness conflict.
	async fn append_version(
		&self,
		id: &str,
		snapshot: &[u8],
		author: Option<&str>,
		message: Option<&str>,
	) -> ClResult<VersionSnapshot>;
}

impl DocumentPatch {
	pub fn is_empty(&self) -> bool {
		self.title.is_undefined()
			&& self.text_projection.is_undefined()
			&& self.html_projection.is_undefined()
	}
}

// vim: ts=4
