//! Status events emitted by the probe tasks.
//!
//! Every transition of the primary and secondary tasks produces one
//! [`ProbeEvent`]. Events are logged through `tracing` and handed to a
//! [`Reporter`], which renders them for humans (or collects them in tests).

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::endpoint::SessionRole;

/// What released the primary task from its wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseCause {
	/// The secondary task fired the completion signal.
	Signal,
	/// The wait timeout elapsed first.
	Timeout,
}

/// A single task transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProbeEvent {
	Connected { role: SessionRole, url: String },
	ConnectFailed { role: SessionRole, url: String, error: String },
	Sent { role: SessionRole, payload: String },
	SendFailed { role: SessionRole, error: String },
	Received { role: SessionRole, response: Value },
	ReceiveFailed { role: SessionRole, error: String },
	Awaiting { role: SessionRole, timeout_ms: u64 },
	Released { role: SessionRole, cause: ReleaseCause },
	Closed { role: SessionRole },
	CloseFailed { role: SessionRole, error: String },
}

impl ProbeEvent {
	pub fn role(&self) -> SessionRole {
		match self {
			ProbeEvent::Connected { role, .. }
			| ProbeEvent::ConnectFailed { role, .. }
			| ProbeEvent::Sent { role, .. }
			| ProbeEvent::SendFailed { role, .. }
			| ProbeEvent::Received { role, .. }
			| ProbeEvent::ReceiveFailed { role, .. }
			| ProbeEvent::Awaiting { role, .. }
			| ProbeEvent::Released { role, .. }
			| ProbeEvent::Closed { role }
			| ProbeEvent::CloseFailed { role, .. } => *role,
		}
	}

	/// Whether this event records a failed step.
	pub fn is_failure(&self) -> bool {
		matches!(
			self,
			ProbeEvent::ConnectFailed { .. }
				| ProbeEvent::SendFailed { .. }
				| ProbeEvent::ReceiveFailed { .. }
				| ProbeEvent::CloseFailed { .. }
		)
	}

	/// Emits the event as a `tracing` record.
	pub(crate) fn trace(&self) {
		let role = self.role().label();
		match self {
			ProbeEvent::Connected { url, .. } => tracing::info!(role, %url, "session connected"),
			ProbeEvent::ConnectFailed { url, error, .. } => tracing::warn!(role, %url, %error, "session connect failed"),
			ProbeEvent::Sent { payload, .. } => tracing::info!(role, %payload, "payload sent"),
			ProbeEvent::SendFailed { error, .. } => tracing::warn!(role, %error, "payload send failed"),
			ProbeEvent::Received { response, .. } => tracing::info!(role, %response, "response received"),
			ProbeEvent::ReceiveFailed { error, .. } => tracing::warn!(role, %error, "response read failed"),
			ProbeEvent::Awaiting { timeout_ms, .. } => tracing::info!(role, timeout_ms, "awaiting completion signal"),
			ProbeEvent::Released { cause, .. } => tracing::info!(role, ?cause, "released from wait"),
			ProbeEvent::Closed { .. } => tracing::info!(role, "session closed"),
			ProbeEvent::CloseFailed { error, .. } => tracing::warn!(role, %error, "session close failed"),
		}
	}
}

/// Sink for task status events. Called from both tasks concurrently.
pub trait Reporter: Send + Sync {
	fn report(&self, event: &ProbeEvent);
}

/// Reporter that keeps every event in arrival order.
#[derive(Debug, Default)]
pub struct RecordingReporter {
	events: Mutex<Vec<ProbeEvent>>,
}

impl RecordingReporter {
	pub fn new() -> Self {
		Self::default()
	}

	/// Snapshot of all events so far.
	pub fn events(&self) -> Vec<ProbeEvent> {
		self.events.lock().clone()
	}

	/// Events emitted by one role, in order.
	pub fn events_for(&self, role: SessionRole) -> Vec<ProbeEvent> {
		self.events.lock().iter().filter(|e| e.role() == role).cloned().collect()
	}
}

impl Reporter for RecordingReporter {
	fn report(&self, event: &ProbeEvent) {
		self.events.lock().push(event.clone());
	}
}
