//! Comment map operations. Comments live inside the CRDT as entries of a
//! keyed map under the well-known name `"comments"` (see
//! [`crate::replica`]), so concurrent additions converge like any other
//! CRDT mutation — there is no separate write path.
//!
//! Each entry is a fixed record (not an arbitrary JSON value): unknown
//! keys are rejected on write so the durable form stays schema-stable
//! even though the underlying map type is dynamically typed.

use collabnotes_types::{ClResult, Comment, CommentPosition, Error, Timestamp};
use sha2::{Digest, Sha256};
use tracing::warn;
use yrs::{Any, Map, MapPrelim, MapRef, Out, ReadTxn, Transact};

use crate::replica::CrdtReplica;

const KNOWN_KEYS: &[&str] =
	&["id", "threadId", "author", "content", "position", "resolved", "createdAt"];

impl CrdtReplica {
	/// Insert or overwrite a comment entry. `comment.id` is the map key.
	pub fn upsert_comment(&self, comment: &Comment) -> ClResult<()> {
		let mut txn = self.doc().transact_mut();
		let entry: MapRef =
			self.comments_map().insert(&mut txn, comment.id.to_string(), MapPrelim::default());
		entry.insert(&mut txn, "id", comment.id.to_string());
		if let Some(thread_id) = &comment.thread_id {
			entry.insert(&mut txn, "threadId", thread_id.to_string());
		}
		entry.insert(&mut txn, "author", comment.author.to_string());
		entry.insert(&mut txn, "content", comment.content.to_string());
		if let Some(pos) = comment.position {
			entry.insert(&mut txn, "position", format!("{}:{}", pos.start, pos.end));
		}
		entry.insert(&mut txn, "resolved", comment.resolved);
		entry.insert(&mut txn, "createdAt", comment.created_at.0);
		Ok(())
	}

	pub fn resolve_comment(&self, id: &str, resolved: bool) -> ClResult<()> {
		let mut txn = self.doc().transact_mut();
		let Some(Out::YMap(entry)) = self.comments_map().get(&txn, id) else {
			return Err(Error::NotFound);
		};
		entry.insert(&mut txn, "resolved", resolved);
		Ok(())
	}

	pub fn delete_comment(&self, id: &str) -> ClResult<()> {
		let mut txn = self.doc().transact_mut();
		self.comments_map().remove(&mut txn, id);
		Ok(())
	}

	/// All comments currently in the map, in arbitrary (map-iteration)
	/// order. Entries that don't decode into the fixed record shape
	/// (legacy or corrupt data) are skipped rather than failing the
	/// whole read.
	pub fn list_comments(&self) -> Vec<Comment> {
		let txn = self.doc().transact();
		self.comments_map()
			.iter(&txn)
			.filter_map(|(key, value)| match value {
				Out::YMap(entry) => decode_comment(&txn, key, &entry),
				_ => None,
			})
			.collect()
	}

	/// Reject any client-supplied keys outside the fixed record shape.
	pub fn validate_comment_keys(keys: &[&str]) -> ClResult<()> {
		for key in keys {
			if !KNOWN_KEYS.contains(key) {
				return Err(Error::Validation(format!("unknown comment field: {key}")));
			}
		}
		Ok(())
	}

	/// Strip any field outside the fixed record shape from every comment
	/// entry. Comments have no separate write path (they're merged in as
	/// part of the document's opaque CRDT update, same as text edits), so
	/// `validate_comment_keys` can't reject a bad write before it lands —
	/// by the time this crate sees the op it's already merged. This is the
	/// enforcement point instead: called once per applied update, after
	/// the merge, so an out-of-date or misbehaving client can't make the
	/// durable comment shape schema-unstable. `upsert_comment` itself only
	/// ever writes `KNOWN_KEYS`, so this is a no-op on updates that
	/// originate from this crate.
	pub fn enforce_comment_schema(&self) {
		let txn = self.doc().transact();
		let mut offenders: Vec<(Box<str>, Vec<Box<str>>)> = Vec::new();
		for (id, value) in self.comments_map().iter(&txn) {
			let Out::YMap(entry) = value else { continue };
			let unknown: Vec<Box<str>> = entry
				.iter(&txn)
				.map(|(field, _)| field)
				.filter(|field| Self::validate_comment_keys(&[*field]).is_err())
				.map(Box::from)
				.collect();
			if !unknown.is_empty() {
				offenders.push((id.into(), unknown));
			}
		}
		drop(txn);

		if offenders.is_empty() {
			return;
		}
		let mut txn = self.doc().transact_mut();
		for (id, fields) in offenders {
			let Some(Out::YMap(entry)) = self.comments_map().get(&txn, id.as_ref()) else { continue };
			for field in fields {
				warn!(comment_id = %id, field = %field, "stripping unknown comment field from merged update");
				entry.remove(&mut txn, field.as_ref());
			}
		}
	}

	/// A digest of the comment map's contents, used by the session to
	/// detect whether a mutation touched comments (which bypasses the
	/// persistence debounce).
	pub fn comments_digest(&self) -> [u8; 32] {
		let mut hasher = Sha256::new();
		let mut comments = self.list_comments();
		comments.sort_by(|a, b| a.id.cmp(&b.id));
		for comment in &comments {
			if let Ok(bytes) = serde_json::to_vec(comment) {
				hasher.update(bytes);
			}
		}
		hasher.finalize().into()
	}

	/// Drop anchors that no longer fit inside the current text length.
	/// A faithful anchor-rebase would track relative positions through
	/// every insert/delete; this conservative approximation only detects
	/// anchors invalidated by shrinkage, which is enough to satisfy the
	/// "never silently drop the comment" half of the invariant: the
	/// comment entry itself always survives, only `position` is cleared.
	pub fn rebase_comment_anchors(&self, new_text_len: usize) {
		let comments = self.list_comments();
		let mut txn = self.doc().transact_mut();
		for comment in comments {
			let Some(pos) = comment.position else { continue };
			if pos.end as usize > new_text_len {
				if let Some(Out::YMap(entry)) = self.comments_map().get(&txn, comment.id.as_ref()) {
					entry.remove(&mut txn, "position");
				}
			}
		}
	}
}

fn decode_comment(txn: &impl ReadTxn, key: &str, entry: &MapRef) -> Option<Comment> {
	let id: Box<str> = get_str(txn, entry, "id").unwrap_or_else(|| key.into());
	let author = get_str(txn, entry, "author")?;
	let content = get_str(txn, entry, "content").unwrap_or_default();
	let thread_id = get_str(txn, entry, "threadId");
	let position = get_str(txn, entry, "position").and_then(|s| parse_position(&s));
	let resolved = get_bool(txn, entry, "resolved").unwrap_or(false);
	let created_at = get_i64(txn, entry, "createdAt").map(Timestamp).unwrap_or_else(Timestamp::now);

	Some(Comment { id, thread_id, author, content, position, resolved, created_at })
}

fn get_str(txn: &impl ReadTxn, entry: &MapRef, key: &str) -> Option<Box<str>> {
	match entry.get(txn, key)? {
		Out::Any(Any::String(s)) => Some(s.as_ref().into()),
		_ => None,
	}
}

fn get_bool(txn: &impl ReadTxn, entry: &MapRef, key: &str) -> Option<bool> {
	match entry.get(txn, key)? {
		Out::Any(Any::Bool(b)) => Some(b),
		_ => None,
	}
}

fn get_i64(txn: &impl ReadTxn, entry: &MapRef, key: &str) -> Option<i64> {
	match entry.get(txn, key)? {
		Out::Any(Any::BigInt(n)) => Some(n),
		Out::Any(Any::Number(n)) => Some(n as i64),
		_ => None,
	}
}

fn parse_position(s: &str) -> Option<CommentPosition> {
	let (start, end) = s.split_once(':')?;
	Some(CommentPosition { start: start.parse().ok()?, end: end.parse().ok()? })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn add_resolve_delete_round_trip() {
		let replica = CrdtReplica::new();
		let comment = Comment {
			id: "c1".into(),
			thread_id: None,
			author: "alice".into(),
			content: "note".into(),
			position: Some(CommentPosition { start: 0, end: 4 }),
			resolved: false,
			created_at: Timestamp::now(),
		};
		replica.upsert_comment(&comment).expect("upsert");
		let found = replica.list_comments();
		assert_eq!(found.len(), 1);
		assert_eq!(found[0].id.as_ref(), "c1");
		assert!(!found[0].resolved);

		replica.resolve_comment("c1", true).expect("resolve");
		assert!(replica.list_comments()[0].resolved);

		replica.delete_comment("c1").expect("delete");
		assert!(replica.list_comments().is_empty());
	}

	#[test]
	fn comment_map_materialized_even_when_empty() {
		let replica = CrdtReplica::new();
		assert_eq!(replica.comments_digest(), CrdtReplica::new().comments_digest());
	}

	#[test]
	fn unknown_keys_rejected() {
		assert!(CrdtReplica::validate_comment_keys(&["id", "bogus"]).is_err());
		assert!(CrdtReplica::validate_comment_keys(&["id", "author"]).is_ok());
	}

	#[test]
	fn enforce_comment_schema_strips_unknown_fields() {
		let replica = CrdtReplica::new();
		{
			// Bypass `upsert_comment` to simulate an opaque update from a
			// client that wrote a field outside the fixed record shape.
			let mut txn = replica.doc().transact_mut();
			let entry: MapRef = replica.comments_map().insert(&mut txn, "c1", MapPrelim::default());
			entry.insert(&mut txn, "id", "c1");
			entry.insert(&mut txn, "author", "alice");
			entry.insert(&mut txn, "content", "note");
			entry.insert(&mut txn, "bogus", "sneaky");
		}

		replica.enforce_comment_schema();

		let comments = replica.list_comments();
		assert_eq!(comments.len(), 1);
		let txn = replica.doc().transact();
		let Some(Out::YMap(entry)) = replica.comments_map().get(&txn, "c1") else {
			panic!("expected comment entry to survive");
		};
		assert!(entry.get(&txn, "bogus").is_none());
		assert!(entry.get(&txn, "author").is_some());
	}
}

// vim: ts=4
