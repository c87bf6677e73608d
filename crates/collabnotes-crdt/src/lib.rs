#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

//! The live collaboration core: a CRDT replica per document, fanned out
//! to attached clients and debounce-persisted to a `Store`.
//!
//! - [`replica`] wraps `yrs` behind the three-operation contract spec'd
//!   for the CRDT black box: `encode_state`, `apply_update`,
//!   `compute_diff_against_vector`.
//! - [`comments`] is the comment map living inside the replica.
//! - [`awareness`] is ephemeral presence state, never persisted.
//! - [`protocol`] is the binary frame format exchanged over the transport.
//! - [`session`] is the per-document actor (`DocSession`) serializing all
//!   mutation through one lane.
//! - [`registry`] is the process-wide `DocRegistry`.
//! - [`client`] owns one transport connection (`Client`).

pub mod awareness;
pub mod client;
pub mod comments;
pub mod protocol;
pub mod registry;
pub mod replica;
pub mod session;

pub use awareness::{AwarenessEntry, AwarenessTable};
pub use client::{Client, ClientConfig};
pub use protocol::Frame;
pub use registry::{DocRegistry, RegistryConfig};
pub use session::{ClientId, SessionConfig, SessionHandle};

// vim: ts=4
