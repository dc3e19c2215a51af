//! One-shot completion signal shared between the probe tasks.
//!
//! The signal has two states, pending and fired. Firing is irreversible and
//! idempotent; any number of waiters observe it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
	fired: AtomicBool,
	notify: Notify,
}

/// Broadcast-once "done" event with no payload.
///
/// Clones share the same state. A fresh signal is created for every probe run.
#[derive(Debug, Clone, Default)]
pub struct CompletionSignal {
	inner: Arc<Inner>,
}

impl CompletionSignal {
	pub fn new() -> Self {
		Self::default()
	}

	/// Moves the signal to fired and wakes every waiter.
	///
	/// Returns `true` only for the call that performed the transition.
	pub fn fire(&self) -> bool {
		let first = !self.inner.fired.swap(true, Ordering::AcqRel);
		if first {
			self.inner.notify.notify_waiters();
		}
		first
	}

	pub fn is_fired(&self) -> bool {
		self.inner.fired.load(Ordering::Acquire)
	}

	/// Suspends until the signal fires. Resolves immediately if it already has.
	pub async fn wait(&self) {
		let notified = self.inner.notify.notified();
		tokio::pin!(notified);
		// Register before checking the flag so a concurrent fire cannot be missed.
		notified.as_mut().enable();
		if self.is_fired() {
			return;
		}
		notified.await;
	}

	/// Returns a guard that fires the signal when dropped.
	pub fn guard(&self) -> SignalGuard {
		SignalGuard { signal: self.clone() }
	}
}

/// Fires its [`CompletionSignal`] on drop, on every exit path including unwinding.
#[derive(Debug)]
#[must_use = "the signal fires as soon as the guard is dropped"]
pub struct SignalGuard {
	signal: CompletionSignal,
}

impl Drop for SignalGuard {
	fn drop(&mut self) {
		if self.signal.fire() {
			tracing::debug!("completion signal fired");
		}
	}
}
