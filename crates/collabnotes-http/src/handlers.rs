//! Handlers for the `/api` sharing surface (§6.1), grounded in the
//! teacher's per-feature `handler.rs` modules (`State<App>` extraction,
//! a thin `ClResult<Json<...>>` return type, `?` for error propagation
//! into the shared `IntoResponse` mapping).

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use collabnotes_core::{App, HealthReport};
use collabnotes_types::prelude::*;
use collabnotes_types::{DocEvent, Document, DocumentPatch, DocumentSummary};

use crate::sanitize::sanitize_html;

#[derive(Debug, Serialize)]
pub struct Permissions {
	pub read: bool,
	pub write: bool,
}

impl Permissions {
	/// This design has no auth/sharing-token model (out of scope, §1);
	/// anyone holding a document id has full read/write permissions.
	fn full() -> Self {
		Self { read: true, write: true }
	}
}

#[derive(Debug, Serialize)]
pub struct NoteView {
	pub id: Box<str>,
	#[serde(rename = "shareId")]
	pub share_id: Box<str>,
	pub title: Box<str>,
	pub content: Box<str>,
	#[serde(rename = "htmlContent", skip_serializing_if = "Option::is_none")]
	pub html_content: Option<Box<str>>,
	#[serde(rename = "renderMode")]
	pub render_mode: RenderMode,
	#[serde(rename = "createdAt")]
	pub created_at: Timestamp,
	#[serde(rename = "updatedAt")]
	pub updated_at: Timestamp,
	pub permissions: Permissions,
}

impl From<Document> for NoteView {
	fn from(doc: Document) -> Self {
		Self {
			share_id: doc.id.clone(),
			id: doc.id,
			title: doc.title,
			content: doc.text_projection,
			html_content: doc.html_projection,
			render_mode: doc.render_mode,
			created_at: doc.created_at,
			updated_at: doc.updated_at,
			permissions: Permissions::full(),
		}
	}
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
	pub success: bool,
}

const fn success() -> SuccessResponse {
	SuccessResponse { success: true }
}

pub async fn health(State(app): State<App>) -> (axum::http::StatusCode, Json<HealthReport>) {
	let report = HealthReport::collect(&app).await;
	let status = if report.is_healthy() {
		axum::http::StatusCode::OK
	} else {
		axum::http::StatusCode::SERVICE_UNAVAILABLE
	};
	(status, Json(report))
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
	pub title: Option<Box<str>>,
	pub content: Box<str>,
	#[serde(rename = "htmlContent")]
	pub html_content: Option<Box<str>>,
	#[serde(rename = "shareId")]
	pub share_id: Option<Box<str>>,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
	#[serde(rename = "shareId")]
	pub share_id: Box<str>,
	pub title: Box<str>,
	#[serde(rename = "editUrl")]
	pub edit_url: Box<str>,
	#[serde(rename = "viewUrl")]
	pub view_url: Box<str>,
	#[serde(rename = "collaborativeUrl")]
	pub collaborative_url: Box<str>,
}

fn share_urls(id: &str) -> (Box<str>, Box<str>, Box<str>) {
	(
		format!("/notes/{id}/edit").into(),
		format!("/notes/{id}").into(),
		format!("/ws/{id}").into(),
	)
}

pub async fn share_note(
	State(app): State<App>,
	Json(req): Json<ShareRequest>,
) -> ClResult<(axum::http::StatusCode, Json<ShareResponse>)> {
	if req.content.trim().is_empty() {
		return Err(Error::Validation("content must not be empty".into()));
	}

	let title = req.title.filter(|t| !t.trim().is_empty()).unwrap_or_else(|| Document::DEFAULT_TITLE.into());
	let share_id: Box<str> = req.share_id.unwrap_or_else(|| Uuid::new_v4().to_string().into());
	let html_content = req.html_content.as_deref().map(sanitize_html);
	let render_mode = if html_content.is_some() { RenderMode::Html } else { RenderMode::Markdown };

	let doc = app
		.store
		.create(&share_id, &title, &req.content, html_content.as_deref(), render_mode)
		.await?;

	let (edit_url, view_url, collaborative_url) = share_urls(&doc.id);
	let response =
		ShareResponse { share_id: doc.id, title: doc.title, edit_url, view_url, collaborative_url };
	Ok((axum::http::StatusCode::CREATED, Json(response)))
}

pub async fn get_note(State(app): State<App>, Path(id): Path<String>) -> ClResult<Json<NoteView>> {
	let doc = app.store.get(&id).await?;
	Ok(Json(doc.into()))
}

pub async fn list_notes(
	State(app): State<App>,
	Query(query): Query<ListQuery>,
) -> ClResult<Json<Vec<DocumentSummary>>> {
	let limit = query.limit.unwrap_or(20).min(200);
	let offset = query.offset.unwrap_or(0);
	let rows = app.store.list(limit, offset).await?;
	Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
	pub limit: Option<u32>,
	pub offset: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PutRequest {
	pub content: Box<str>,
}

pub async fn put_note(
	State(app): State<App>,
	Path(id): Path<String>,
	Json(req): Json<PutRequest>,
) -> ClResult<Json<SuccessResponse>> {
	if req.content.trim().is_empty() {
		return Err(Error::Validation("content must not be empty".into()));
	}
	let patch = DocumentPatch { text_projection: Patch::Value(req.content), ..Default::default() };
	apply_patch(&app, &id, patch).await?;
	Ok(Json(success()))
}

#[derive(Debug, Deserialize, Default)]
pub struct PatchRequest {
	#[serde(default)]
	pub title: Patch<Box<str>>,
	#[serde(default, rename = "content")]
	pub content: Patch<Box<str>>,
	#[serde(default, rename = "htmlContent")]
	pub html_content: Patch<Box<str>>,
}

pub async fn patch_note(
	State(app): State<App>,
	Path(id): Path<String>,
	Json(req): Json<PatchRequest>,
) -> ClResult<Json<SuccessResponse>> {
	if let Patch::Value(title) = &req.title {
		if title.trim().is_empty() {
			return Err(Error::Validation("title must not be empty".into()));
		}
	}
	if let Patch::Value(content) = &req.content {
		if content.trim().is_empty() {
			return Err(Error::Validation("content must not be empty".into()));
		}
	}

	let html_projection = match req.html_content {
		Patch::Value(html) => Patch::Value(sanitize_html(&html)),
		Patch::Null => Patch::Null,
		Patch::Undefined => Patch::Undefined,
	};

	let patch = DocumentPatch { title: req.title, text_projection: req.content, html_projection };
	if patch.is_empty() {
		return Ok(Json(success()));
	}
	apply_patch(&app, &id, patch).await?;
	Ok(Json(success()))
}

pub async fn delete_note(
	State(app): State<App>,
	Path(id): Path<String>,
) -> ClResult<Json<SuccessResponse>> {
	app.registry.notify(&id, DocEvent::Deleted).await;
	app.store.delete(&id).await?;
	Ok(Json(success()))
}

/// Coherence routing (§4.5): a document with a live session is written
/// through that session so the replica, projections, and snapshot all
/// update together; otherwise the write lands directly on `Store`.
async fn apply_patch(app: &App, id: &str, patch: DocumentPatch) -> ClResult<()> {
	match app.registry.lookup(id) {
		Some(handle) => handle.apply_http_patch(patch).await,
		None => app.store.patch(id, patch).await,
	}
}

// vim: ts=4
