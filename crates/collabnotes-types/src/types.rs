//! Data model shared between the Store, the CRDT session, and the HTTP API.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

// Timestamp //
//***********//

/// Unix-epoch seconds. Kept as a distinct type (rather than a bare `i64`)
/// so the wire representation and comparisons stay centralized, the way
/// the teacher's `Timestamp` does.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(pub i64);

impl Timestamp {
	pub fn now() -> Timestamp {
		let dur = SystemTime::now()
			.duration_since(SystemTime::UNIX_EPOCH)
			.unwrap_or_default();
		Timestamp(dur.as_secs() as i64)
	}
}

impl std::fmt::Display for Timestamp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl Serialize for Timestamp {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.serialize_i64(self.0)
	}
}

impl<'de> Deserialize<'de> for Timestamp {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		Ok(Timestamp(i64::deserialize(deserializer)?))
	}
}

// Patch<T> - PATCH semantics //
//****************************//

/// A field in a PATCH request with three states, distinguishing "not
/// present" from "present and null" from "present with a value".
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum Patch<T> {
	#[default]
	Undefined,
	Null,
	Value(T),
}

impl<T> Patch<T> {
	pub fn is_undefined(&self) -> bool {
		matches!(self, Patch::Undefined)
	}
}

impl<'de, T> Deserialize<'de> for Patch<T>
where
	T: Deserialize<'de>,
{
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		Option::<T>::deserialize(deserializer).map(|opt| match opt {
			Some(v) => Patch::Value(v),
			None => Patch::Null,
		})
	}
}

// RenderMode //
//************//

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
	Markdown,
	Html,
}

impl Default for RenderMode {
	fn default() -> Self {
		RenderMode::Markdown
	}
}

// Document //
//**********//

#[derive(Clone, Debug, Serialize)]
pub struct Document {
	pub id: Box<str>,
	pub title: Box<str>,
	#[serde(rename = "content")]
	pub text_projection: Box<str>,
	#[serde(rename = "htmlContent", skip_serializing_if = "Option::is_none")]
	pub html_projection: Option<Box<str>>,
	#[serde(rename = "renderMode")]
	pub render_mode: RenderMode,
	#[serde(skip)]
	pub crdt_snapshot: Vec<u8>,
	#[serde(rename = "createdAt")]
	pub created_at: Timestamp,
	#[serde(rename = "updatedAt")]
	pub updated_at: Timestamp,
	#[serde(skip)]
	pub views: u32,
	#[serde(rename = "activeEditors")]
	pub active_editors: u32,
}

impl Document {
	pub const DEFAULT_TITLE: &'static str = "Untitled Document";
}

/// Summary view used by `GET /notes` — never carries CRDT bytes.
#[derive(Clone, Debug, Serialize)]
pub struct DocumentSummary {
	pub id: Box<str>,
	pub title: Box<str>,
	#[serde(rename = "createdAt")]
	pub created_at: Timestamp,
	#[serde(rename = "updatedAt")]
	pub updated_at: Timestamp,
}

// VersionSnapshot //
//*****************//

#[derive(Clone, Debug, Serialize)]
pub struct VersionSnapshot {
	pub id: u64,
	#[serde(rename = "documentId")]
	pub document_id: Box<str>,
	pub version: u64,
	#[serde(skip)]
	pub snapshot: Vec<u8>,
	#[serde(rename = "createdAt")]
	pub created_at: Timestamp,
	#[serde(rename = "createdBy", skip_serializing_if = "Option::is_none")]
	pub author: Option<Box<str>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub message: Option<Box<str>>,
}

// Comment //
//*********//

/// A comment anchor: a half-open character range into the text
/// projection at the time the comment was created. Rebased by the CRDT
/// as surrounding text mutates; `None` once the anchor is orphaned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentPosition {
	pub start: u32,
	pub end: u32,
}

/// The fixed record shape stored inside the CRDT's `comments` map.
/// Unknown keys are rejected on write (see `collabnotes-crdt::comments`)
/// so the durable form stays schema-stable even though the underlying
/// CRDT map type is dynamically typed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comment {
	pub id: Box<str>,
	#[serde(rename = "threadId", skip_serializing_if = "Option::is_none")]
	pub thread_id: Option<Box<str>>,
	pub author: Box<str>,
	pub content: Box<str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub position: Option<CommentPosition>,
	pub resolved: bool,
	#[serde(rename = "createdAt")]
	pub created_at: Timestamp,
}

// vim: ts=4
