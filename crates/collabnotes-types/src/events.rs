//! Out-of-band events the `DocRegistry` delivers to a live `DocSession`.

/// Event delivered to a live session by `HttpApi` when it mutates a
/// document outside the session's own serial lane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocEvent {
	/// The document was deleted via the HTTP sharing API. The session
	/// must inform attached clients with a terminal frame and tear down.
	Deleted,
}

// vim: ts=4
