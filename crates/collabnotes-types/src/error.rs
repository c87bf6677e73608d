//! Error handling subsystem: a single `Error` enum covering the whole
//! taxonomy of §7, with an `IntoResponse` impl for the HTTP surface.
//! Realtime callers match on the taxonomy themselves to pick a close code.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

pub type ClResult<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
	NotFound,
	AlreadyExists,
	Validation(String),
	PayloadTooLarge,
	RateLimited,
	ProtocolError(String),
	HandshakeTimeout,
	PongTimeout,
	BackpressureExceeded,
	Transient(String),
	Fatal(String),
	DbError,
	Internal(String),
	Io(std::io::Error),
}

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:?}", self)
	}
}

impl std::error::Error for Error {}

#[derive(Serialize)]
struct ErrorBody {
	error: String,
}

impl IntoResponse for Error {
	fn into_response(self) -> axum::response::Response {
		let (status, message) = match self {
			Error::NotFound => (StatusCode::NOT_FOUND, "Resource not found".to_string()),
			Error::AlreadyExists => (StatusCode::CONFLICT, "Resource already exists".to_string()),
			Error::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
			Error::PayloadTooLarge => {
				(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large".to_string())
			}
			Error::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded".to_string()),
			Error::Transient(msg) => {
				tracing::warn!("transient error surfaced to caller: {msg}");
				(StatusCode::SERVICE_UNAVAILABLE, "Service temporarily unavailable".to_string())
			}
			Error::Fatal(msg) => {
				tracing::error!("fatal error: {msg}");
				(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
			}
			Error::DbError => {
				(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
			}
			Error::Internal(msg) => {
				tracing::warn!("internal error: {msg}");
				(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
			}
			Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string()),
			// Transport-layer errors never reach an HTTP response in practice
			// (they close the websocket instead) but still need a mapping
			// for code paths shared with the HTTP surface.
			Error::ProtocolError(msg) => (StatusCode::BAD_REQUEST, msg),
			Error::HandshakeTimeout => {
				(StatusCode::REQUEST_TIMEOUT, "Handshake timed out".to_string())
			}
			Error::PongTimeout => (StatusCode::REQUEST_TIMEOUT, "Connection idle".to_string()),
			Error::BackpressureExceeded => {
				(StatusCode::SERVICE_UNAVAILABLE, "Client too slow".to_string())
			}
		};

		(status, Json(ErrorBody { error: message })).into_response()
	}
}

impl From<std::io::Error> for Error {
	fn from(err: std::io::Error) -> Self {
		tracing::warn!("io error: {err}");
		Self::Io(err)
	}
}

impl From<serde_json::Error> for Error {
	fn from(err: serde_json::Error) -> Self {
		tracing::warn!("json error: {err}");
		Error::Validation("malformed JSON".into())
	}
}

// vim: ts=4
