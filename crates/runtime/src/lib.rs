//! WebSocket transport for the session affinity probe.
//!
//! Implements [`affprobe::Connector`] and [`affprobe::DuplexSession`] over
//! `tokio-tungstenite`. TLS goes through rustls with certificate verification
//! disabled, so probes work against staging hosts and self-signed endpoints.
//!
//! One [`WsConnector`] is built per run and shared by both probe sessions.
//! Against a `wss://` endpoint that speaks HTTP/2 with extended CONNECT, both
//! sessions ride the same connection; otherwise each gets its own.

pub mod error;
pub mod tls;
pub mod websocket;

pub use error::{Error, Result};
pub use websocket::{Transport, WsConnector, WsSession};
