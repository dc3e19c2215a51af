//! Command-line front end for the affprobe session affinity probe.

pub mod cli;
pub mod error;
pub mod logging;
pub mod output;
pub mod probe;
