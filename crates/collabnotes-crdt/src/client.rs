//! `Client`: owns one transport connection end to end. Decodes inbound
//! frames and hands them to the session, writes outbound fan-out frames
//! back to the transport, and enforces the connection-level timeouts
//! (handshake deadline, ping/pong heartbeat) that the session itself has
//! no visibility into.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;

use collabnotes_types::prelude::*;

use crate::protocol::Frame;
use crate::session::{ClientId, SessionHandle};

#[derive(Clone, Copy, Debug)]
pub struct ClientConfig {
	pub outbound_buffer: usize,
	pub ping_interval: Duration,
	pub pong_timeout: Duration,
	pub handshake_timeout: Duration,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			outbound_buffer: 256,
			ping_interval: Duration::from_secs(15),
			pong_timeout: Duration::from_secs(30),
			handshake_timeout: Duration::from_secs(10),
		}
	}
}

pub struct Client;

impl Client {
	/// Drive one connection until the transport closes, the peer goes
	/// quiet, or the session tears down. Always detaches from `session`
	/// before returning, even on error paths.
	pub async fn run(
		ws: WebSocket,
		client_id: ClientId,
		user_id: impl Into<Box<str>>,
		session: SessionHandle,
		config: ClientConfig,
	) {
		let user_id = user_id.into();
		let (mut ws_tx, mut ws_rx) = ws.split();
		let (out_tx, mut out_rx) = mpsc::channel::<Frame>(config.outbound_buffer);

		if let Err(err) = session.attach(client_id, user_id, out_tx).await {
			warn!(%err, client_id, "attach rejected");
			let _ = ws_tx.send(Message::Close(None)).await;
			return;
		}

		let mut ping_timer = tokio::time::interval(config.ping_interval);
		ping_timer.tick().await; // first tick fires immediately; skip it
		let mut pong_deadline: Option<Instant> = None;
		let mut handshake_deadline = Some(Instant::now() + config.handshake_timeout);

		loop {
			let await_pong = async {
				match pong_deadline {
					Some(deadline) => tokio::time::sleep_until(deadline).await,
					None => std::future::pending().await,
				}
			};
			let await_handshake = async {
				match handshake_deadline {
					Some(deadline) => tokio::time::sleep_until(deadline).await,
					None => std::future::pending().await,
				}
			};

			tokio::select! {
				msg = ws_rx.next() => {
					let Some(msg) = msg else { break };
					match msg {
						Ok(Message::Binary(data)) => match Frame::decode(&data) {
							Ok(frame) => {
								handshake_deadline = None;
								session.inbound(client_id, frame).await;
							}
							Err(err) => {
								warn!(%err, client_id, "malformed frame, closing");
								let _ = ws_tx.send(Message::Close(None)).await;
								break;
							}
						},
						Ok(Message::Ping(payload)) => {
							let _ = ws_tx.send(Message::Pong(payload)).await;
						}
						Ok(Message::Pong(_)) => {
							pong_deadline = None;
							session.heartbeat(client_id).await;
						}
						Ok(Message::Close(_)) => break,
						Ok(Message::Text(_)) => {
							warn!(client_id, "text frame rejected, closing");
							let _ = ws_tx.send(Message::Close(None)).await;
							break;
						}
						Err(err) => {
							debug!(%err, client_id, "transport error");
							break;
						}
					}
				}
				frame = out_rx.recv() => {
					let Some(frame) = frame else { break };
					let terminal = matches!(frame, Frame::Closing { .. });
					if ws_tx.send(Message::Binary(frame.encode().into())).await.is_err() {
						break;
					}
					if terminal {
						let _ = ws_tx.send(Message::Close(None)).await;
						break;
					}
				}
				_ = ping_timer.tick() => {
					if pong_deadline.is_some() {
						// a ping is already outstanding; the pong-timeout
						// branch below will close the connection.
						continue;
					}
					if ws_tx.send(Message::Ping(Vec::new().into())).await.is_err() {
						break;
					}
					pong_deadline = Some(Instant::now() + config.pong_timeout);
				}
				_ = await_pong, if pong_deadline.is_some() => {
					warn!(client_id, "pong timeout, closing");
					break;
				}
				_ = await_handshake, if handshake_deadline.is_some() => {
					warn!(client_id, "handshake timeout, closing");
					break;
				}
			}
		}

		session.detach(client_id).await;
		let _ = ws_tx.close().await;
		debug!(client_id, "client connection closed");
	}
}

// vim: ts=4
