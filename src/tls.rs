//! TLS layer: wraps an already-connected Transport to perform a client TLS
//! handshake with SNI, peer-certificate verification, and hostname
//! verification.
//!
//! Builds a `rustls::ClientConfig` and drives `tokio_rustls::TlsConnector`;
//! `webpki-roots` supplies the default CA bundle since an arbitrary
//! `ca_bundle_path` file can't be loaded through the OS trust store alone
//! (see DESIGN.md).

use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, ServerName};
use rustls::{CertificateError, ClientConfig, RootCertStore};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

use crate::error::{Error, Kind};
use crate::logger::Logger;
use crate::transport::Transport;

/// Load the CA bundle to trust. `path` takes precedence; with no path the
/// build-time default (`webpki-roots`' Mozilla bundle) is used.
fn load_root_store(path: Option<&Path>) -> Result<RootCertStore, Error> {
    let mut store = RootCertStore::empty();
    match path {
        None => {
            store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        }
        Some(path) => {
            let pem = std::fs::read_to_string(path).map_err(|_| {
                Error::new(Kind::MissingCaBundlePathError).with_context(path.display().to_string())
            })?;
            for cert in parse_pem_certificates(&pem) {
                store
                    .add(CertificateDer::from(cert))
                    .map_err(|e| Error::with_cause(Kind::SslInvalidCertificateError, std::io::Error::other(e.to_string())))?;
            }
        }
    }
    Ok(store)
}

/// Minimal PEM certificate extraction: base64 payloads between
/// `BEGIN CERTIFICATE` / `END CERTIFICATE` markers. Avoids a dedicated PEM
/// crate for what is, functionally, one `base64::decode` per block.
fn parse_pem_certificates(pem: &str) -> Vec<Vec<u8>> {
    use base64::Engine;
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_block = false;
    for line in pem.lines() {
        if line.starts_with("-----BEGIN CERTIFICATE-----") {
            in_block = true;
            current.clear();
            continue;
        }
        if line.starts_with("-----END CERTIFICATE-----") {
            in_block = false;
            if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(&current) {
                out.push(bytes);
            }
            continue;
        }
        if in_block {
            current.push_str(line.trim());
        }
    }
    out
}

/// Perform the TLS client handshake over `transport`, consuming it and
/// returning a new `Transport` wrapping the encrypted stream.
///
/// State machine: `Underlying-connected → Handshaking → Open` on success;
/// any failure during `Handshaking` leaves nothing to close (the
/// underlying stream is consumed by `tokio_rustls`, matching
/// `Underlying-connected → Handshaking → Closed`).
pub async fn connect_ssl<S>(
    transport: Transport<S>,
    hostname: &str,
    ca_bundle_path: Option<&Path>,
    logger: Logger,
) -> Result<Transport<TlsStream<S>>, Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    logger.in_progress(&format!("tls: handshake with {hostname}"));

    let root_store = load_root_store(ca_bundle_path)?;
    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));

    let server_name = ServerName::try_from(hostname.to_string())
        .map_err(|_| Error::new(Kind::SslInvalidHostnameError).with_context(hostname.to_string()))?;

    let underlying = transport.into_inner();
    let stream = connector
        .connect(server_name, underlying)
        .await
        .map_err(classify_handshake_error)?;

    logger.complete("tls: handshake", None);
    Ok(Transport::new(stream, logger))
}

/// Map the `io::Error` `tokio_rustls` reports on a failed handshake onto
/// the closed TLS error kinds. `tokio_rustls` wraps the underlying
/// `rustls::Error` as the `io::Error`'s source, so the real reason is
/// recovered by downcasting rather than pattern-matching `Display` text.
fn classify_handshake_error(e: std::io::Error) -> Error {
    let kind = e
        .get_ref()
        .and_then(|inner| inner.downcast_ref::<rustls::Error>())
        .map(classify_rustls_error)
        .unwrap_or(Kind::SslError);
    Error::with_cause(kind, e)
}

fn classify_rustls_error(e: &rustls::Error) -> Kind {
    match e {
        rustls::Error::NoCertificatesPresented => Kind::SslNoCertificateError,
        rustls::Error::InvalidCertificate(CertificateError::NotValidForName) => {
            Kind::SslInvalidHostnameError
        }
        rustls::Error::InvalidCertificate(_) => Kind::SslInvalidCertificateError,
        _ => Kind::SslError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_pem_extracts_one_block() {
        let pem = "-----BEGIN CERTIFICATE-----\nQUJD\n-----END CERTIFICATE-----\n";
        let certs = parse_pem_certificates(pem);
        assert_eq!(certs.len(), 1);
        assert_eq!(certs[0], b"ABC");
    }

    #[test]
    fn missing_ca_bundle_path_fails() {
        let err = load_root_store(Some(Path::new("/nonexistent/ca.pem"))).unwrap_err();
        assert_eq!(err.kind(), Kind::MissingCaBundlePathError);
    }

    #[test]
    fn no_certificate_presented_maps_to_no_certificate_kind() {
        let kind = classify_rustls_error(&rustls::Error::NoCertificatesPresented);
        assert_eq!(kind, Kind::SslNoCertificateError);
    }

    #[test]
    fn hostname_mismatch_maps_to_invalid_hostname_kind() {
        let kind = classify_rustls_error(&rustls::Error::InvalidCertificate(
            CertificateError::NotValidForName,
        ));
        assert_eq!(kind, Kind::SslInvalidHostnameError);
    }

    #[test]
    fn other_certificate_errors_map_to_invalid_certificate_kind() {
        let kind = classify_rustls_error(&rustls::Error::InvalidCertificate(
            CertificateError::UnknownIssuer,
        ));
        assert_eq!(kind, Kind::SslInvalidCertificateError);
    }

    #[test]
    fn non_certificate_rustls_errors_map_to_generic_ssl_kind() {
        let kind = classify_rustls_error(&rustls::Error::General("boom".to_string()));
        assert_eq!(kind, Kind::SslError);
    }

    #[test]
    fn classify_handshake_error_recovers_kind_from_wrapped_rustls_error() {
        let io_err = std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            rustls::Error::InvalidCertificate(CertificateError::NotValidForName),
        );
        let err = classify_handshake_error(io_err);
        assert_eq!(err.kind(), Kind::SslInvalidHostnameError);
    }

    #[test]
    fn classify_handshake_error_falls_back_to_generic_kind_for_non_rustls_io_errors() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
        let err = classify_handshake_error(io_err);
        assert_eq!(err.kind(), Kind::SslError);
    }
}
