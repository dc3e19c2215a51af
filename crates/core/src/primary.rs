//! Primary session task: holds `/ws1` open until the secondary check is done.
//!
//! `IDLE → CONNECTING → CONNECTED → AWAITING_SIGNAL → CLOSING → DONE`.
//! A failed connect goes straight to `DONE`. A failed send skips the read and
//! the wait and goes to `CLOSING`. A failed read is reported and the task still
//! waits.
//!
//! The wait window opens once the session is connected and lasts the wait
//! timeout (clipped to the run deadline). The send, the read and the wait
//! all share it, so a peer that never answers cannot hold the task past it.


use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;

use crate::endpoint::SessionRole;
use crate::error::SessionError;
use crate::report::{ProbeEvent, ReleaseCause};
use crate::session::{CloseStatus, DuplexSession};
use crate::signal::CompletionSignal;
use crate::task::TaskContext;

const ROLE: SessionRole = SessionRole::Primary;

/// What the primary task observed.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrimaryOutcome {
	pub connected: bool,
	pub response: Option<Value>,
	pub release: Option<ReleaseCause>,
	pub closed: bool,
	/// First failure of the run, if any.
	pub error: Option<String>,
}

impl PrimaryOutcome {
	fn record_error(&mut self, error: String) {
		self.error.get_or_insert(error);
	}
}

pub struct PrimaryTask {
	ctx: TaskContext,
	signal: CompletionSignal,
	wait_timeout: Duration,
}

impl PrimaryTask {
	pub(crate) fn new(ctx: TaskContext, signal: CompletionSignal, wait_timeout: Duration) -> Self {
		Self { ctx, signal, wait_timeout }
	}

	/// Runs the task to completion. Never fails; failures land in the outcome.
	pub async fn run(self) -> PrimaryOutcome {
		let mut outcome = PrimaryOutcome::default();
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
				outcome.record_error(error);
				return outcome;
			}
		};
		outcome.connected = true;
		self.ctx.emit(ProbeEvent::Connected {
			role: ROLE,
			url: url.to_string(),
		});

		let release_at = self.ctx.clock.now() + self.window();
		if self.exchange(session.as_mut(), release_at, &mut outcome).await {
			outcome.release = Some(self.await_release(release_at).await);
		}

		match session.close(CloseStatus::normal("done")).await {
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
				outcome.record_error(error);
			}
		}

		outcome
	}

	/// Length of the wait window: the wait timeout, or less if the run
	/// deadline comes first.
	fn window(&self) -> Duration {
		match self.ctx.remaining() {
			Some(remaining) => remaining.min(self.wait_timeout),
			None => self.wait_timeout,
		}
	}

	/// Sends the trigger and reads one response.
	///
	/// Returns `false` when the send failed; the read is then skipped and the
	/// task goes straight to closing. A failed read is only reported.
	async fn exchange(&self, session: &mut dyn DuplexSession, release_at: Instant, outcome: &mut PrimaryOutcome) -> bool {
		if let Err(err) = self.within(release_at, session.send_text(ROLE.payload())).await {
			let error = err.to_string();
			self.ctx.emit(ProbeEvent::SendFailed {
				role: ROLE,
				error: error.clone(),
			});
			outcome.record_error(error);
			return false;
		}
		self.ctx.emit(ProbeEvent::Sent {
			role: ROLE,
			payload: ROLE.payload().to_string(),
		});

		match self.within(release_at, session.recv_json()).await {
			Ok(response) => {
				self.ctx.emit(ProbeEvent::Received {
					role: ROLE,
					response: response.clone(),
				});
				outcome.response = Some(response);
			}
			Err(err) => {
				let error = err.to_string();
				self.ctx.emit(ProbeEvent::ReceiveFailed {
					role: ROLE,
					error: error.clone(),
				});
				outcome.record_error(error);
			}
		}
		true
	}

	/// Runs a session operation that must finish before the wait window closes.
	///
	/// The run deadline is checked first, so when it is what clipped the
	/// window the failure is reported as [`SessionError::DeadlineElapsed`].
	async fn within<T, F>(&self, release_at: Instant, op: F) -> Result<T, SessionError>
	where
		F: Future<Output = Result<T, SessionError>>,
	{
		tokio::select! {
			biased;
			result = self.ctx.bounded(op) => result,
			() = self.ctx.clock.sleep_until(release_at) => Err(SessionError::WaitElapsed(self.wait_timeout)),
		}
	}

	/// Waits for the completion signal or the end of the wait window,
	/// whichever is first.
	///
	/// The signal branch is polled first. When the window closes, the task
	/// yields once before settling, so a signal fired in the same timer tick
	/// is still reported as [`ReleaseCause::Signal`].
	async fn await_release(&self, release_at: Instant) -> ReleaseCause {
		let bound = release_at.saturating_duration_since(self.ctx.clock.now());
		self.ctx.emit(ProbeEvent::Awaiting {
			role: ROLE,
			timeout_ms: u64::try_from(bound.as_millis()).unwrap_or(u64::MAX),
		});

		let cause = tokio::select! {
			biased;
			() = self.signal.wait() => ReleaseCause::Signal,
			() = self.ctx.clock.sleep_until(release_at) => {
				tokio::task::yield_now().await;
				if self.signal.is_fired() { ReleaseCause::Signal } else { ReleaseCause::Timeout }
			}
		};
		self.ctx.emit(ProbeEvent::Released { role: ROLE, cause });
		cause
	}
}
