//! TLS client configuration that accepts any server certificate.
//!
//! The probe targets edge workers, staging hosts and tunnels that often
//! present certificates the platform store does not trust. Certificate chains
//! and host names are not checked; handshake signatures still are, so the
//! session is at least bound to the presented key.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{WebPkiSupportedAlgorithms, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, SignatureScheme};

use crate::error::Result;

/// ALPN id for HTTP/2, offered first so sessions can share one connection.
pub const ALPN_H2: &[u8] = b"h2";

/// ALPN id for HTTP/1.1, the classic WebSocket upgrade.
pub const ALPN_HTTP_1_1: &[u8] = b"http/1.1";

/// Builds the shared client configuration used for every `wss://` session.
pub fn insecure_client_config() -> Result<ClientConfig> {
	let provider = Arc::new(rustls::crypto::ring::default_provider());
	let verifier = AcceptAnyServerCert {
		algorithms: provider.signature_verification_algorithms,
	};

	let mut config = ClientConfig::builder_with_provider(provider)
		.with_safe_default_protocol_versions()?
		.dangerous()
		.with_custom_certificate_verifier(Arc::new(verifier))
		.with_no_client_auth();
	config.alpn_protocols = vec![ALPN_H2.to_vec(), ALPN_HTTP_1_1.to_vec()];

	Ok(config)
}

/// Copy of `config` that only offers HTTP/1.1, for servers that negotiated
/// `h2` but refuse WebSocket streams over it.
pub fn http1_only(config: &ClientConfig) -> ClientConfig {
	let mut config = config.clone();
	config.alpn_protocols = vec![ALPN_HTTP_1_1.to_vec()];
	config
}

/// Verifier that trusts every certificate chain and host name.
#[derive(Debug)]
struct AcceptAnyServerCert {
	algorithms: WebPkiSupportedAlgorithms,
}

impl ServerCertVerifier for AcceptAnyServerCert {
	fn verify_server_cert(
		&self,
		_end_entity: &CertificateDer<'_>,
		_intermediates: &[CertificateDer<'_>],
		server_name: &ServerName<'_>,
		_ocsp_response: &[u8],
		_now: UnixTime,
	) -> std::result::Result<ServerCertVerified, rustls::Error> {
		tracing::trace!(server = ?server_name, "accepting server certificate without verification");
		Ok(ServerCertVerified::assertion())
	}

	fn verify_tls12_signature(
		&self,
		message: &[u8],
		cert: &CertificateDer<'_>,
		dss: &DigitallySignedStruct,
	) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
		verify_tls12_signature(message, cert, dss, &self.algorithms)
	}

	fn verify_tls13_signature(
		&self,
		message: &[u8],
		cert: &CertificateDer<'_>,
		dss: &DigitallySignedStruct,
	) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
		verify_tls13_signature(message, cert, dss, &self.algorithms)
	}

	fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
		self.algorithms.supported_schemes()
	}
}
