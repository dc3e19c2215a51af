//! Two-phase session affinity probe.
//!
//! Opens a primary duplex session, lets it settle, then opens a secondary
//! session against a sibling endpoint. The primary session stays open until the
//! secondary one reports completion (or a timeout elapses), so both sessions are
//! alive at the same time and their responses can be compared.
//!
//! ```text
//!  Probe::run
//!    ├─ spawn PrimaryTask ──► connect /ws1 ─► send "start" ─► recv ─► wait(signal | timeout) ─► close
//!    ├─ sleep(stabilization_delay)
//!    ├─ spawn SecondaryTask ─► [guard] connect /ws2 ─► send "check" ─► recv ─► close ─► [fire signal]
//!    └─ join both
//! ```
//!
//! The transport is supplied through [`Connector`] / [`DuplexSession`]; the
//! WebSocket implementation lives in `affprobe-runtime`.

pub mod clock;
pub mod coordinator;
pub mod endpoint;
pub mod error;
pub mod primary;
pub mod report;
pub mod secondary;
pub mod session;
pub mod signal;

mod task;

#[cfg(test)]
mod testing;

pub use clock::{Clock, TokioClock};
pub use coordinator::{Probe, ProbeConfig, ProbeReport};
pub use endpoint::{Endpoint, SessionRole};
pub use error::{BoxError, ConfigError, SessionError};
pub use primary::{PrimaryOutcome, PrimaryTask};
pub use report::{ProbeEvent, RecordingReporter, ReleaseCause, Reporter};
pub use secondary::{SecondaryOutcome, SecondaryTask};
pub use session::{CloseStatus, Connector, DuplexSession};
pub use signal::{CompletionSignal, SignalGuard};
