//! Awareness: ephemeral per-user presence (cursor, selection, display
//! name, color). Never persisted; broadcast to all other attached
//! clients on change and on a heartbeat interval, evicted on staleness.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AwarenessEntry {
	#[serde(rename = "displayName")]
	pub display_name: Box<str>,
	pub color: Box<str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub cursor: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub selection: Option<(u32, u32)>,
	#[serde(skip)]
	pub last_heartbeat: Option<Instant>,
}

/// `userId -> AwarenessEntry`. Owned by the `DocSession`; mutated only
/// on the serial lane.
#[derive(Debug, Default)]
pub struct AwarenessTable {
	entries: HashMap<Box<str>, AwarenessEntry>,
}

impl AwarenessTable {
	pub fn new() -> Self {
		Self::default()
	}

	/// Last-writer-wins per `userId` by arrival order within the session.
	pub fn set(&mut self, user_id: impl Into<Box<str>>, mut entry: AwarenessEntry) {
		entry.last_heartbeat = Some(Instant::now());
		self.entries.insert(user_id.into(), entry);
	}

	pub fn heartbeat(&mut self, user_id: &str) {
		if let Some(entry) = self.entries.get_mut(user_id) {
			entry.last_heartbeat = Some(Instant::now());
		}
	}

	pub fn remove(&mut self, user_id: &str) -> Option<AwarenessEntry> {
		self.entries.remove(user_id)
	}

	pub fn evict_stale(&mut self, ttl: Duration) -> Vec<Box<str>> {
		let now = Instant::now();
		let stale: Vec<Box<str>> = self
			.entries
			.iter()
			.filter(|(_, entry)| {
				entry.last_heartbeat.map(|t| now.duration_since(t) > ttl).unwrap_or(false)
			})
			.map(|(user_id, _)| user_id.clone())
			.collect();
		for user_id in &stale {
			self.entries.remove(user_id.as_ref());
		}
		stale
	}

	pub fn snapshot(&self) -> HashMap<Box<str>, AwarenessEntry> {
		self.entries.clone()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::thread::sleep;

	#[test]
	fn eviction_respects_ttl() {
		let mut table = AwarenessTable::new();
		table.set(
			"alice",
			AwarenessEntry {
				display_name: "Alice".into(),
				color: "#fff".into(),
				cursor: None,
				selection: None,
				last_heartbeat: None,
			},
		);
		assert!(table.evict_stale(Duration::from_secs(60)).is_empty());
		sleep(Duration::from_millis(5));
		let evicted = table.evict_stale(Duration::from_millis(1));
		assert_eq!(evicted.len(), 1);
		assert!(table.is_empty());
	}
}

// vim: ts=4
