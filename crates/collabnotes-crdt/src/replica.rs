//! A thin wrapper around `yrs::Doc` realizing the black-box CRDT contract
//! from the design notes: `encode_state`, `apply_update`,
//! `compute_diff_against_vector`, plus the text and comment-map views the
//! rest of the crate operates on.

use collabnotes_types::{ClResult, Error};
use yrs::types::ToJson;
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{Doc, GetString, Map, MapRef, ReadTxn, StateVector, Text, TextRef, Transact, Update};

const TEXT_NAME: &str = "content";
const COMMENTS_NAME: &str = "comments";

/// The live, merge-correct representation of a document's content and
/// comment map. Owned exclusively by the `DocSession`'s serial lane.
pub struct CrdtReplica {
	doc: Doc,
	text: TextRef,
	comments: MapRef,
}

impl CrdtReplica {
	/// A fresh, empty replica. The comment map is touched immediately so a
	/// freshly-created replica agrees with a loaded one about whether the
	/// map exists (see the design notes on the single-user persistence bug).
	pub fn new() -> Self {
		let doc = Doc::new();
		let text = doc.get_or_insert_text(TEXT_NAME);
		let comments = doc.get_or_insert_map(COMMENTS_NAME);
		Self { doc, text, comments }
	}

	/// Decode a previously persisted snapshot into a fresh replica.
	pub fn from_snapshot(bytes: &[u8]) -> ClResult<Self> {
		let replica = Self::new();
		replica.apply_update(bytes)?;
		Ok(replica)
	}

	/// Seed a fresh replica's text from a non-realtime text projection
	/// (the `textProjection`-only load branch). Only legal on an
	/// otherwise-empty replica.
	pub fn seed_from_text(&self, text: &str) {
		let mut txn = self.doc.transact_mut();
		self.text.insert(&mut txn, 0, text);
	}

	/// Replace the entire text contents with `text`, for non-realtime
	/// `HttpApi` writes against a replica that may already hold content.
	/// Unlike [`Self::seed_from_text`] this clears the existing range
	/// first, so it never duplicates or prepends.
	pub fn replace_text(&self, text: &str) {
		let mut txn = self.doc.transact_mut();
		let len = self.text.len(&txn);
		if len > 0 {
			self.text.remove_range(&mut txn, 0, len);
		}
		self.text.insert(&mut txn, 0, text);
	}

	pub fn text(&self) -> String {
		let txn = self.doc.transact();
		self.text.get_string(&txn)
	}

	/// Full binary snapshot of the replica's current state.
	pub fn encode_state(&self) -> Vec<u8> {
		let txn = self.doc.transact();
		txn.encode_state_as_update_v1(&StateVector::default())
	}

	/// The replica's current state vector, exchanged during `SyncStep1`.
	pub fn state_vector(&self) -> Vec<u8> {
		let txn = self.doc.transact();
		txn.state_vector().encode_v1()
	}

	/// The update a peer holding `remote_state_vector` is missing.
	pub fn compute_diff_against_vector(&self, remote_state_vector: &[u8]) -> ClResult<Vec<u8>> {
		let remote_sv = StateVector::decode_v1(remote_state_vector)
			.map_err(|e| Error::ProtocolError(format!("malformed state vector: {e}")))?;
		let txn = self.doc.transact();
		Ok(txn.encode_diff_v1(&remote_sv))
	}

	/// Merge an incoming update (a `SyncStep2` or `Update` payload) into
	/// the replica. Commutative and idempotent per the CRDT's merge rule.
	pub fn apply_update(&self, update: &[u8]) -> ClResult<()> {
		let update = Update::decode_v1(update)
			.map_err(|e| Error::ProtocolError(format!("malformed update: {e}")))?;
		let mut txn = self.doc.transact_mut();
		txn.apply_update(update)
			.map_err(|e| Error::ProtocolError(format!("update rejected: {e}")))?;
		Ok(())
	}

	pub(crate) fn comments_map(&self) -> &MapRef {
		&self.comments
	}

	pub(crate) fn doc(&self) -> &Doc {
		&self.doc
	}

	/// Rough JSON dump, used only for debug logging.
	#[allow(dead_code)]
	fn comments_debug_json(&self) -> serde_json::Value {
		let txn = self.doc.transact();
		let any = self.comments.to_json(&txn);
		serde_json::to_value(format!("{any:?}")).unwrap_or(serde_json::Value::Null)
	}
}

impl Default for CrdtReplica {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for CrdtReplica {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CrdtReplica").field("text_len", &self.text().len()).finish()
	}
}


// vim: ts=4
