//! Duplex session capability consumed by the probe tasks.
//!
//! Implementations own framing and encoding; the probe only needs to open a
//! session, send one text payload, read one decoded message and close.

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::error::SessionError;

/// WebSocket close code for a normal closure.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close code and reason sent when a task releases its session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseStatus {
	pub code: u16,
	pub reason: String,
}

impl CloseStatus {
	/// Normal closure (1000) with the given reason.
	pub fn normal(reason: impl Into<String>) -> Self {
		Self {
			code: NORMAL_CLOSURE,
			reason: reason.into(),
		}
	}
}

/// Opens duplex sessions. Shared by both probe tasks for the whole run.
#[async_trait]
pub trait Connector: Send + Sync {
	async fn connect(&self, url: &Url) -> Result<Box<dyn DuplexSession>, SessionError>;
}

/// One open duplex session, owned by the task that opened it.
#[async_trait]
pub trait DuplexSession: Send {
	/// Sends `text` as a single text message.
	async fn send_text(&mut self, text: &str) -> Result<(), SessionError>;

	/// Reads the next data message and decodes it as JSON.
	///
	/// Control messages are skipped. A close from the peer yields
	/// [`SessionError::Closed`].
	async fn recv_json(&mut self) -> Result<Value, SessionError>;

	/// Runs the closing handshake. Consumes the session so it cannot be used afterwards.
	async fn close(self: Box<Self>, status: CloseStatus) -> Result<(), SessionError>;
}
