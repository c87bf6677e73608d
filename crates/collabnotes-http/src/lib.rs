#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

//! The HTTP sharing API (§6.1) and the `/ws/:documentId` upgrade
//! (§6.2). [`routes::init`] assembles the full `Router`, the way
//! `server/src/routes.rs` assembles cloudillo's.

pub mod handlers;
pub mod routes;
pub mod sanitize;
pub mod websocket;

pub use routes::init;

// vim: ts=4
