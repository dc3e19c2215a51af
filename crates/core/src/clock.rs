//! Injectable time source for the coordinator and the primary wait.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

/// Source of "now" and of suspension for a duration.
///
/// Uses tokio's [`Instant`] so tests running on a paused runtime observe the
/// same virtual time as the tasks.
#[async_trait]
pub trait Clock: Send + Sync {
	fn now(&self) -> Instant;

	/// Yields the calling task for `duration` without blocking the runtime.
	async fn sleep(&self, duration: Duration);

	/// Sleeps until `deadline`; returns at once if it has already passed.
	async fn sleep_until(&self, deadline: Instant) {
		let remaining = deadline.saturating_duration_since(self.now());
		if !remaining.is_zero() {
			self.sleep(remaining).await;
		}
	}
}

/// [`Clock`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
	fn now(&self) -> Instant {
		Instant::now()
	}

	async fn sleep(&self, duration: Duration) {
		tokio::time::sleep(duration).await;
	}
}
