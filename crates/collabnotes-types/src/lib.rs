#![forbid(unsafe_code)]

//! Shared types for the collabnotes collaboration core: the document and
//! comment data model, the error taxonomy, and the `Store` trait that
//! persistence adapters implement.

pub mod error;
pub mod events;
pub mod prelude;
pub mod store;
pub mod types;

pub use error::{ClResult, Error};
pub use events::DocEvent;
pub use store::{DocumentPatch, Store};
pub use types::{
	Comment, CommentPosition, Document, DocumentSummary, Patch, RenderMode, Timestamp,
	VersionSnapshot,
};

// vim: ts=4
