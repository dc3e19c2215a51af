//! Secondary session task: one-shot check on `/ws2`.
//!
//! `IDLE → CONNECTING → CONNECTED → CHECKING → CLOSING → DONE`. The completion
//! signal is armed before anything can fail and fires when the task body ends,
//! whatever path it takes.


use serde::Serialize;
use serde_json::Value;

use crate::endpoint::SessionRole;
use crate::report::ProbeEvent;
use crate::session::{CloseStatus, DuplexSession};
use crate::signal::CompletionSignal;
use crate::task::TaskContext;

const ROLE: SessionRole = SessionRole::Secondary;

/// What the secondary task observed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SecondaryOutcome {
	pub connected: bool,
	pub response: Option<Value>,
	pub closed: bool,
	pub error: Option<String>,
}

pub struct SecondaryTask {
	ctx: TaskContext,
	signal: CompletionSignal,
}

impl SecondaryTask {
	pub(crate) fn new(ctx: TaskContext, signal: CompletionSignal) -> Self {
		Self { ctx, signal }
	}

	/// Runs the check. The completion signal has fired by the time this returns.
	pub async fn run(self) -> SecondaryOutcome {
		let _release = self.signal.guard();

		let mut outcome = SecondaryOutcome::default();
		let url = self.ctx.endpoint.session_url(ROLE);

		let mut session = match self.ctx.bounded(self.ctx.connector.connect(&url)).await {
			Ok(session) => session,
			Err(err) => {
				let error = err.to_string();
				self.ctx.emit(ProbeEvent::ConnectFailed {
					role: ROLE,
					url: url.to_string(),
					error: error.clone(),
				});
				outcome.error = Some(error);
				return outcome;
			}
		};
		outcome.connected = true;
		self.ctx.emit(ProbeEvent::Connected {
			role: ROLE,
			url: url.to_string(),
		});

		self.check(session.as_mut(), &mut outcome).await;

		match session.close(CloseStatus::normal("")).await {
			Ok(()) => {
				outcome.closed = true;
				self.ctx.emit(ProbeEvent::Closed { role: ROLE });
			}
			Err(err) => {
				let error = err.to_string();
				self.ctx.emit(ProbeEvent::CloseFailed {
					role: ROLE,
					error: error.clone(),
				});
				outcome.error.get_or_insert(error);
			}
		}

		outcome
	}

	async fn check(&self, session: &mut dyn DuplexSession, outcome: &mut SecondaryOutcome) {
		if let Err(err) = self.ctx.bounded(session.send_text(ROLE.payload())).await {
			let error = err.to_string();
			self.ctx.emit(ProbeEvent::SendFailed {
				role: ROLE,
				error: error.clone(),
			});
			outcome.error = Some(error);
			return;
		}
		self.ctx.emit(ProbeEvent::Sent {
			role: ROLE,
			payload: ROLE.payload().to_string(),
		});

		// The read is telemetry only: a failure is logged but never reported.
		match self.ctx.bounded(session.recv_json()).await {
			Ok(response) => {
				self.ctx.emit(ProbeEvent::Received {
					role: ROLE,
					response: response.clone(),
				});
				outcome.response = Some(response);
			}
			Err(err) => tracing::debug!(role = ROLE.label(), error = %err, "check response unavailable"),
		}
	}
}
