//! TLS 1.3 mutual-authentication configuration.
//!
//! Both directions of the service use the same material layout: a leaf
//! certificate, its private key, and a CA bundle the peer is verified
//! against. Certificate parsing is strict: a CA bundle containing anything
//! that is not a parseable certificate is rejected instead of silently
//! skipped.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{ClientConfig, RootCertStore, ServerConfig};

use crate::error::{WireError, WireResult};

/// Paths to the PEM material of one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    /// Leaf certificate chain presented to peers.
    pub certificate: PathBuf,
    /// Private key for the leaf certificate.
    pub private_key: PathBuf,
    /// CA bundle used to verify the peer.
    pub ca: PathBuf,
}

/// Build the server-side TLS configuration: TLS 1.3 only, client
/// certificates required and verified against the CA bundle.
///
/// # Errors
///
/// Fails if any PEM file is missing, unparseable, or empty, or if the
/// resulting configuration is rejected by rustls.
pub fn server_config(paths: &TlsPaths) -> WireResult<Arc<ServerConfig>> {
    let certs = load_certs(&paths.certificate)?;
    let key = load_private_key(&paths.private_key)?;
    let roots = load_root_store(&paths.ca)?;

    let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
        .build()
        .map_err(|err| WireError::Certificate(err.to_string()))?;

    let config = ServerConfig::builder_with_protocol_versions(&[&rustls::version::TLS13])
        .with_client_cert_verifier(verifier)
        .with_single_cert(certs, key)?;
    Ok(Arc::new(config))
}

/// Build the client-side TLS configuration used when dialing agents:
/// TLS 1.3 only, agent certificate verified against the CA bundle, our own
/// certificate presented for mutual authentication.
///
/// # Errors
///
/// Fails if any PEM file is missing, unparseable, or empty, or if the
/// resulting configuration is rejected by rustls.
pub fn client_config(paths: &TlsPaths) -> WireResult<Arc<ClientConfig>> {
    let certs = load_certs(&paths.certificate)?;
    let key = load_private_key(&paths.private_key)?;
    let roots = load_root_store(&paths.ca)?;

    let config = ClientConfig::builder_with_protocol_versions(&[&rustls::version::TLS13])
        .with_root_certificates(roots)
        .with_client_auth_cert(certs, key)?;
    Ok(Arc::new(config))
}

fn load_certs(path: &Path) -> WireResult<Vec<CertificateDer<'static>>> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| WireError::Certificate(format!("{}: {err}", path.display())))?;
    if certs.is_empty() {
        return Err(WireError::Certificate(format!(
            "{}: no certificates found",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> WireResult<PrivateKeyDer<'static>> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|err| WireError::Certificate(format!("{}: {err}", path.display())))?
        .ok_or_else(|| {
            WireError::Certificate(format!("{}: no private key found", path.display()))
        })
}

fn load_root_store(path: &Path) -> WireResult<RootCertStore> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(path)? {
        roots
            .add(cert)
            .map_err(|err| WireError::Certificate(format!("{}: {err}", path.display())))?;
    }
    Ok(roots)
}

fn open(path: &Path) -> WireResult<BufReader<File>> {
    let file = File::open(path)
        .map_err(|err| WireError::Certificate(format!("{}: {err}", path.display())))?;
    Ok(BufReader::new(file))
}
