//! One logical `Player` per accepted connection.
//!
//! The write side is a dedicated task owning the socket's sink, fed by an
//! unbounded channel so `Player::send` never blocks the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use protocol::{Envelope, ErrorPayload};
use serde::Serialize;
use tokio::sync::mpsc;

pub type PlayerId = String;

/// Generates a short opaque player id: the first 8 hex characters of a v4
/// UUID.
pub fn new_player_id() -> PlayerId {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Error yielded by [`SessionReader::read_message`].
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("connection closed normally")]
    ClosedNormally,
    #[error("connection closed abnormally: {0}")]
    ClosedAbnormally(String),
}

/// The receive half: decodes the next `Envelope` off the wire.
pub struct SessionReader {
    stream: SplitStream<WebSocket>,
}

impl SessionReader {
    pub fn new(stream: SplitStream<WebSocket>) -> Self {
        SessionReader { stream }
    }

    /// Returns the next decoded envelope, or a [`ReadError`] once the
    /// connection is gone. Non-text/binary frames (ping/pong/close handled
    /// by axum) are skipped transparently.
    pub async fn read_message(&mut self) -> Result<Envelope, ReadError> {
        loop {
            match self.stream.next().await {
                None => return Err(ReadError::ClosedNormally),
                Some(Err(err)) => return Err(ReadError::ClosedAbnormally(err.to_string())),
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(&text)
                        .map_err(|e| ReadError::ClosedAbnormally(format!("malformed envelope: {e}")));
                }
                Some(Ok(Message::Close(_))) => return Err(ReadError::ClosedNormally),
                Some(Ok(_)) => continue,
            }
        }
    }
}

/// Spawns the dedicated writer task for a connection. Returns a channel the
/// rest of the system uses to enqueue outgoing envelopes.
fn spawn_writer(mut sink: SplitSink<WebSocket, Message>) -> mpsc::UnboundedSender<Envelope> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Envelope>();
    tokio::spawn(async move {
        while let Some(envelope) = rx.recv().await {
            let text = match serde_json::to_string(&envelope) {
                Ok(t) => t,
                Err(err) => {
                    tracing::error!(?err, "failed to encode outgoing envelope");
                    continue;
                }
            };
            if let Err(err) = sink.send(Message::Text(text.into())).await {
                tracing::debug!(?err, "write side closed");
                break;
            }
        }
        let _ = sink.close().await;
    });
    tx
}

/// A connected player. Exclusive to the session layer; the lobby/lobby
/// manager hold it behind an `Arc` in a read-mostly table and reference it
/// only by id otherwise.
pub struct Player {
    pub id: PlayerId,
    name: Mutex<String>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Envelope>>>,
    ready: AtomicBool,
    slot: Mutex<Option<u8>>,
    alive: AtomicBool,
}

impl Player {
    pub fn new(id: PlayerId, name: String, sink: SplitSink<WebSocket, Message>) -> Self {
        let outbound = spawn_writer(sink);
        Player {
            id,
            name: Mutex::new(name),
            outbound: Mutex::new(Some(outbound)),
            ready: AtomicBool::new(false),
            slot: Mutex::new(None),
            alive: AtomicBool::new(true),
        }
    }

    pub fn name(&self) -> String {
        self.name.lock().unwrap().clone()
    }

    pub fn set_name(&self, name: String) {
        *self.name.lock().unwrap() = name;
    }

    pub fn ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Relaxed);
    }

    pub fn slot(&self) -> Option<u8> {
        *self.slot.lock().unwrap()
    }

    pub fn set_slot(&self, slot: Option<u8>) {
        *self.slot.lock().unwrap() = slot;
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    /// Enqueues an envelope for the writer task. Best-effort, ordered per
    /// player; silently dropped if the connection is already closed.
    pub fn send(&self, envelope: Envelope) {
        let guard = self.outbound.lock().unwrap();
        if let Some(tx) = guard.as_ref() {
            if tx.send(envelope).is_err() {
                tracing::debug!(player_id = %self.id, "dropped message, writer already gone");
            }
        }
    }

    pub fn send_payload(&self, kind: &str, payload: &impl Serialize) {
        match Envelope::new(kind, payload) {
            Ok(envelope) => self.send(envelope),
            Err(err) => tracing::error!(?err, kind, "failed to build outgoing envelope"),
        }
    }

    pub fn send_error(&self, text: impl Into<String>) {
        self.send_payload(protocol::server_tags::ERROR, &ErrorPayload { message: text.into() });
    }

    /// Releases the connection. Idempotent: a second call is a no-op.
    pub fn close(&self) {
        self.alive.store(false, Ordering::Relaxed);
        self.outbound.lock().unwrap().take();
    }

    /// A player with no real socket behind it, for exercising lobby/session
    /// logic without standing up a WebSocket. Sent envelopes are enqueued
    /// into the void; nothing reads the receiving half.
    #[cfg(test)]
    pub fn new_detached(id: PlayerId, name: String) -> Self {
        let (tx, _rx) = mpsc::unbounded_channel::<Envelope>();
        Player {
            id,
            name: Mutex::new(name),
            outbound: Mutex::new(Some(tx)),
            ready: AtomicBool::new(false),
            slot: Mutex::new(None),
            alive: AtomicBool::new(true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_player_id_is_eight_hex_chars() {
        let id = new_player_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
