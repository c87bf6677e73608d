//! The binary frame format exchanged over the realtime transport.
//! Every frame is tagged by a leading kind byte, as the teacher's CRDT
//! websocket handler documents for its own (simpler) sync protocol.

use collabnotes_types::{ClResult, Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum FrameKind {
	SyncStep1 = 0,
	SyncStep2 = 1,
	Update = 2,
	AwarenessUpdate = 3,
	Auth = 4,
	/// Server-initiated terminal notice (deletion, shutdown) sent just
	/// before the transport closes.
	Closing = 5,
}

impl FrameKind {
	fn from_u8(b: u8) -> Option<Self> {
		Some(match b {
			0 => Self::SyncStep1,
			1 => Self::SyncStep2,
			2 => Self::Update,
			3 => Self::AwarenessUpdate,
			4 => Self::Auth,
			5 => Self::Closing,
			_ => return None,
		})
	}
}

/// A parsed protocol frame (§4.3.1).
#[derive(Debug, Clone)]
pub enum Frame {
	SyncStep1 { state_vector: Vec<u8> },
	SyncStep2 { update: Vec<u8> },
	Update { update: Vec<u8> },
	AwarenessUpdate { payload: Vec<u8> },
	Auth { payload: Vec<u8> },
	Closing { reason: Box<str> },
}

impl Frame {
	pub fn decode(bytes: &[u8]) -> ClResult<Self> {
		let (&kind_byte, payload) =
			bytes.split_first().ok_or_else(|| Error::ProtocolError("empty frame".into()))?;
		let kind = FrameKind::from_u8(kind_byte)
			.ok_or_else(|| Error::ProtocolError(format!("unknown frame kind {kind_byte}")))?;
		Ok(match kind {
			FrameKind::SyncStep1 => Frame::SyncStep1 { state_vector: payload.to_vec() },
			FrameKind::SyncStep2 => Frame::SyncStep2 { update: payload.to_vec() },
			FrameKind::Update => Frame::Update { update: payload.to_vec() },
			FrameKind::AwarenessUpdate => Frame::AwarenessUpdate { payload: payload.to_vec() },
			FrameKind::Auth => Frame::Auth { payload: payload.to_vec() },
			FrameKind::Closing => Frame::Closing {
				reason: String::from_utf8_lossy(payload).into_owned().into(),
			},
		})
	}

	pub fn encode(&self) -> Vec<u8> {
		let (kind, payload): (FrameKind, &[u8]) = match self {
			Frame::SyncStep1 { state_vector } => (FrameKind::SyncStep1, state_vector),
			Frame::SyncStep2 { update } => (FrameKind::SyncStep2, update),
			Frame::Update { update } => (FrameKind::Update, update),
			Frame::AwarenessUpdate { payload } => (FrameKind::AwarenessUpdate, payload),
			Frame::Auth { payload } => (FrameKind::Auth, payload),
			Frame::Closing { reason } => {
				let mut out = vec![FrameKind::Closing as u8];
				out.extend_from_slice(reason.as_bytes());
				return out;
			}
		};
		let mut out = Vec::with_capacity(1 + payload.len());
		out.push(kind as u8);
		out.extend_from_slice(payload);
		out
	}

	pub fn closing(reason: impl Into<Box<str>>) -> Self {
		Frame::Closing { reason: reason.into() }
	}
}

/// Per-client protocol state (§4.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
	Handshaking,
	Ready,
	Closed,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn round_trips_every_kind() {
		let frames = vec![
			Frame::SyncStep1 { state_vector: vec![1, 2, 3] },
			Frame::SyncStep2 { update: vec![4, 5] },
			Frame::Update { update: vec![6] },
			Frame::AwarenessUpdate { payload: vec![7, 8] },
			Frame::Auth { payload: vec![] },
			Frame::closing("deleted"),
		];
		for frame in frames {
			let encoded = frame.encode();
			let decoded = Frame::decode(&encoded).unwrap();
			assert_eq!(frame.encode(), decoded.encode());
		}
	}

	#[test]
	fn rejects_empty_and_unknown_kind() {
		assert!(Frame::decode(&[]).is_err());
		assert!(Frame::decode(&[99, 1, 2]).is_err());
	}
}

// vim: ts=4
