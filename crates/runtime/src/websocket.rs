//! `tokio-tungstenite` implementation of the probe session traits.
//!
//! `wss://` endpoints offer `h2` first. When the server picks it, every
//! session to that authority runs as an extended CONNECT stream (RFC 8441) on
//! one HTTP/2 connection held by the connector, so both probe sessions share a
//! transport. A server that picks `http/1.1`, or that refuses WebSocket
//! streams over HTTP/2, gets a classic upgrade on a connection per session.
//! Plain `ws://` endpoints always use the HTTP/1.1 upgrade.

use std::sync::Arc;
use std::time::{Duration, Instant};

use affprobe::{CloseStatus, Connector, DuplexSession, SessionError};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use http_body_util::Empty;
use hyper::client::conn::http2;
use hyper::ext::Protocol;
use hyper::{Method, Request, StatusCode, header};
use hyper_util::rt::{TokioExecutor, TokioIo};
use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Role};
use tokio_tungstenite::{WebSocketStream, client_async};
use tracing::{debug, trace};
use url::{Host, Url};

use crate::error::Result;
use crate::tls::{ALPN_H2, http1_only, insecure_client_config};

/// How long `close` waits for the peer to answer the close frame.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Extended CONNECT stays disabled until the server's SETTINGS frame arrives,
/// a round trip after the HTTP/2 handshake. Requests are retried this long.
const SETTINGS_GRACE: Duration = Duration::from_secs(1);
const SETTINGS_POLL: Duration = Duration::from_millis(20);

/// Byte stream under a session, erased so both transports share one type.
trait Io: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Io for T {}

type WsStream = WebSocketStream<Box<dyn Io>>;
type Http2Sender = http2::SendRequest<Empty<Bytes>>;

/// HTTP version a session was opened over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
	/// Classic `Upgrade: websocket` on a connection of its own.
	Http1,
	/// Extended CONNECT stream on the shared HTTP/2 connection.
	Http2,
}

#[derive(Clone)]
enum Link {
	Http2(Http2Sender),
	/// The server does not carry WebSocket streams over HTTP/2.
	Http1Only,
}

impl Link {
	fn is_usable(&self) -> bool {
		match self {
			Link::Http2(sender) => !sender.is_closed(),
			Link::Http1Only => true,
		}
	}
}

struct SharedLink {
	authority: String,
	link: Link,
}

enum Http2Error {
	/// Extended CONNECT is not available on this connection.
	Unsupported(String),
	/// The stream was attempted and failed.
	Session(SessionError),
}

/// Opens WebSocket sessions with the shared insecure TLS configuration.
pub struct WsConnector {
	tls: Arc<ClientConfig>,
	tls_http1: Arc<ClientConfig>,
	shared: Mutex<Option<SharedLink>>,
}

impl WsConnector {
	pub fn new() -> Result<Self> {
		Ok(Self::with_tls_config(insecure_client_config()?))
	}

	/// Uses a caller-provided TLS configuration instead of the accept-any one.
	pub fn with_tls_config(config: ClientConfig) -> Self {
		Self {
			tls_http1: Arc::new(http1_only(&config)),
			tls: Arc::new(config),
			shared: Mutex::new(None),
		}
	}

	/// Opens one session to `url`.
	pub async fn open(&self, url: &Url) -> std::result::Result<WsSession, SessionError> {
		debug!(%url, "opening websocket");
		let session = match url.scheme() {
			"wss" => self.open_secure(url).await?,
			_ => upgrade_http1(url, Box::new(dial(url).await?)).await?,
		};
		debug!(%url, transport = ?session.transport, "websocket open");
		Ok(session)
	}

	async fn open_secure(&self, url: &Url) -> std::result::Result<WsSession, SessionError> {
		let authority = authority(url)?;
		let mut shared = self.shared.lock().await;

		let link = match shared.as_ref() {
			Some(cached) if cached.authority == authority && cached.link.is_usable() => cached.link.clone(),
			_ => {
				let tls = dial_tls(url, Arc::clone(&self.tls)).await?;
				if tls.get_ref().1.alpn_protocol() != Some(ALPN_H2) {
					*shared = Some(SharedLink {
						authority,
						link: Link::Http1Only,
					});
					drop(shared);
					return upgrade_http1(url, Box::new(tls)).await;
				}
				let link = Link::Http2(handshake_http2(url, tls).await?);
				*shared = Some(SharedLink {
					authority: authority.clone(),
					link: link.clone(),
				});
				link
			}
		};
		drop(shared);

		let sender = match link {
			Link::Http2(sender) => sender,
			Link::Http1Only => return self.open_secure_http1(url).await,
		};

		match open_http2(url, sender).await {
			Ok(session) => Ok(session),
			Err(Http2Error::Session(err)) => Err(err),
			Err(Http2Error::Unsupported(reason)) => {
				debug!(%url, %reason, "server refused websocket over HTTP/2, falling back to HTTP/1.1");
				*self.shared.lock().await = Some(SharedLink {
					authority,
					link: Link::Http1Only,
				});
				self.open_secure_http1(url).await
			}
		}
	}

	async fn open_secure_http1(&self, url: &Url) -> std::result::Result<WsSession, SessionError> {
		let tls = dial_tls(url, Arc::clone(&self.tls_http1)).await?;
		upgrade_http1(url, Box::new(tls)).await
	}
}

impl std::fmt::Debug for WsConnector {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("WsConnector")
			.field("alpn", &self.tls.alpn_protocols.iter().map(|p| String::from_utf8_lossy(p)).collect::<Vec<_>>())
			.finish()
	}
}

#[async_trait]
impl Connector for WsConnector {
	async fn connect(&self, url: &Url) -> std::result::Result<Box<dyn DuplexSession>, SessionError> {
		Ok(Box::new(self.open(url).await?))
	}
}

fn host(url: &Url) -> std::result::Result<String, SessionError> {
	match url.host() {
		Some(Host::Domain(domain)) => Ok(domain.to_string()),
		Some(Host::Ipv4(addr)) => Ok(addr.to_string()),
		Some(Host::Ipv6(addr)) => Ok(addr.to_string()),
		None => Err(SessionError::transport(format!("no host in {url}"))),
	}
}

fn port(url: &Url) -> std::result::Result<u16, SessionError> {
	url.port_or_known_default()
		.ok_or_else(|| SessionError::transport(format!("no port for {url}")))
}

fn authority(url: &Url) -> std::result::Result<String, SessionError> {
	Ok(format!("{}:{}", host(url)?, port(url)?))
}

async fn dial(url: &Url) -> std::result::Result<TcpStream, SessionError> {
	let stream = TcpStream::connect((host(url)?.as_str(), port(url)?))
		.await
		.map_err(SessionError::transport)?;
	stream.set_nodelay(true).map_err(SessionError::transport)?;
	Ok(stream)
}

async fn dial_tls(url: &Url, config: Arc<ClientConfig>) -> std::result::Result<TlsStream<TcpStream>, SessionError> {
	let name = ServerName::try_from(host(url)?).map_err(SessionError::transport)?;
	let tcp = dial(url).await?;
	TlsConnector::from(config)
		.connect(name, tcp)
		.await
		.map_err(SessionError::transport)
}

async fn upgrade_http1(url: &Url, io: Box<dyn Io>) -> std::result::Result<WsSession, SessionError> {
	let (stream, response) = client_async(url.as_str(), io).await.map_err(SessionError::transport)?;
	debug!(%url, status = %response.status(), "websocket handshake complete");
	Ok(WsSession {
		stream,
		url: url.clone(),
		transport: Transport::Http1,
	})
}

async fn handshake_http2(url: &Url, tls: TlsStream<TcpStream>) -> std::result::Result<Http2Sender, SessionError> {
	let (sender, connection) = http2::handshake(TokioExecutor::new(), TokioIo::new(tls))
		.await
		.map_err(SessionError::transport)?;

	let url = url.clone();
	tokio::spawn(async move {
		if let Err(err) = connection.await {
			debug!(%url, error = %err, "http/2 connection ended");
		}
	});
	Ok(sender)
}

/// `CONNECT` request with `:protocol = websocket` for `url`.
fn extended_connect(url: &Url) -> hyper::http::Result<Request<Empty<Bytes>>> {
	let mut target = url.clone();
	// ws -> http and wss -> https are both special schemes, so this cannot fail.
	let _ = target.set_scheme(if url.scheme() == "wss" { "https" } else { "http" });

	let mut request = Request::builder()
		.method(Method::CONNECT)
		.uri(target.as_str())
		.header(header::SEC_WEBSOCKET_VERSION, "13")
		.body(Empty::new())?;
	request.extensions_mut().insert(Protocol::from_static("websocket"));
	Ok(request)
}

async fn open_http2(url: &Url, mut sender: Http2Sender) -> std::result::Result<WsSession, Http2Error> {
	let started = Instant::now();
	let response = loop {
		let request = extended_connect(url).map_err(|e| Http2Error::Session(SessionError::transport(e)))?;
		sender.ready().await.map_err(|e| Http2Error::Unsupported(e.to_string()))?;
		match sender.send_request(request).await {
			Ok(response) => break response,
			Err(err) if !sender.is_closed() && started.elapsed() < SETTINGS_GRACE => {
				trace!(%url, error = %err, "extended CONNECT not accepted yet");
				tokio::time::sleep(SETTINGS_POLL).await;
			}
			Err(err) => return Err(Http2Error::Unsupported(err.to_string())),
		}
	};

	if response.status() != StatusCode::OK {
		return Err(Http2Error::Session(SessionError::transport(format!(
			"extended CONNECT rejected with status {}",
			response.status()
		))));
	}

	let upgraded = hyper::upgrade::on(response)
		.await
		.map_err(|e| Http2Error::Session(SessionError::transport(e)))?;
	let io: Box<dyn Io> = Box::new(TokioIo::new(upgraded));
	let stream = WebSocketStream::from_raw_socket(io, Role::Client, None).await;
	debug!(%url, "websocket stream open on shared HTTP/2 connection");

	Ok(WsSession {
		stream,
		url: url.clone(),
		transport: Transport::Http2,
	})
}

/// One open WebSocket.
pub struct WsSession {
	stream: WsStream,
	url: Url,
	transport: Transport,
}

impl WsSession {
	pub fn transport(&self) -> Transport {
		self.transport
	}
}

#[async_trait]
impl DuplexSession for WsSession {
	async fn send_text(&mut self, text: &str) -> std::result::Result<(), SessionError> {
		self.stream.send(Message::text(text)).await.map_err(SessionError::transport)
	}

	async fn recv_json(&mut self) -> std::result::Result<Value, SessionError> {
		while let Some(message) = self.stream.next().await {
			match message.map_err(SessionError::transport)? {
				Message::Text(text) => return Ok(serde_json::from_str(&text)?),
				Message::Binary(bytes) => return Ok(serde_json::from_slice(&bytes)?),
				Message::Close(frame) => {
					let reason = frame.map(|f| f.reason.to_string()).filter(|r| !r.is_empty());
					return Err(SessionError::Closed(reason));
				}
				Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
			}
		}
		Err(SessionError::Closed(None))
	}

	async fn close(self: Box<Self>, status: CloseStatus) -> std::result::Result<(), SessionError> {
		let WsSession { mut stream, url, .. } = *self;
		let frame = CloseFrame {
			code: CloseCode::from(status.code),
			reason: status.reason.into(),
		};

		match stream.close(Some(frame)).await {
			Ok(()) | Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {}
			Err(err) => return Err(SessionError::transport(err)),
		}

		// Read until the peer echoes the close frame so the stream shuts down cleanly.
		let drain = async { while let Some(Ok(_)) = stream.next().await {} };
		if tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, drain).await.is_err() {
			debug!(%url, "peer did not complete the close handshake");
		}
		Ok(())
	}
}
