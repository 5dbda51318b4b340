//! Certificate loading and rustls configuration for mutual TLS.
//!
//! Both sides present a certificate and verify the other against a
//! shared root CA. The PEM files follow the conventional layout: the
//! identity file carries the certificate chain and private key, the CA
//! file carries the trust root.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::{VerifierBuilderError, WebPkiClientVerifier};
use rustls::{ClientConfig, RootCertStore, ServerConfig};
use thiserror::Error;
use tracing::debug;

/// Errors surfaced while loading credentials or building TLS configs.
#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no certificate found in {path}")]
    NoCertificate { path: PathBuf },

    #[error("no private key found in {path}")]
    NoPrivateKey { path: PathBuf },

    #[error("failed to parse PEM in {path}: {source}")]
    Pem {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to build client verifier: {0}")]
    Verifier(#[from] VerifierBuilderError),

    #[error("TLS configuration error: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Paths to the local identity and the trust root.
#[derive(Debug, Clone)]
pub struct TlsSettings {
    /// PEM file holding this side's certificate chain and private key.
    pub cert_file: PathBuf,

    /// PEM file holding the root CA used to verify the remote peer.
    pub ca_file: PathBuf,
}

impl TlsSettings {
    pub fn new(cert_file: impl Into<PathBuf>, ca_file: impl Into<PathBuf>) -> Self {
        Self {
            cert_file: cert_file.into(),
            ca_file: ca_file.into(),
        }
    }

    /// Builds the server-side configuration: present our identity and
    /// require a client certificate signed by the root CA.
    pub fn server_config(&self) -> Result<Arc<ServerConfig>, TlsError> {
        let (certs, key) = load_identity(&self.cert_file)?;
        let roots = load_roots(&self.ca_file)?;

        let verifier = WebPkiClientVerifier::builder(Arc::new(roots)).build()?;

        let config = ServerConfig::builder()
            .with_client_cert_verifier(verifier)
            .with_single_cert(certs, key)?;

        debug!(cert = %self.cert_file.display(), ca = %self.ca_file.display(), "Built server TLS config");
        Ok(Arc::new(config))
    }

    /// Builds the client-side configuration: verify the server against
    /// the root CA and present our identity when asked.
    pub fn client_config(&self) -> Result<Arc<ClientConfig>, TlsError> {
        let (certs, key) = load_identity(&self.cert_file)?;
        let roots = load_roots(&self.ca_file)?;

        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_client_auth_cert(certs, key)?;

        debug!(cert = %self.cert_file.display(), ca = %self.ca_file.display(), "Built client TLS config");
        Ok(Arc::new(config))
    }
}

/// Loads a certificate chain and private key from one PEM file.
fn load_identity(
    path: &Path,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>), TlsError> {
    let pem = std::fs::read(path).map_err(|source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let certs = rustls_pemfile::certs(&mut pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Pem {
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificate {
            path: path.to_path_buf(),
        });
    }

    let key = rustls_pemfile::private_key(&mut pem.as_slice())
        .map_err(|source| TlsError::Pem {
            path: path.to_path_buf(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey {
            path: path.to_path_buf(),
        })?;

    Ok((certs, key))
}

/// Loads root certificates into a trust store.
fn load_roots(path: &Path) -> Result<RootCertStore, TlsError> {
    let pem = std::fs::read(path).map_err(|source| TlsError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let certs = rustls_pemfile::certs(&mut pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Pem {
            path: path.to_path_buf(),
            source,
        })?;

    if certs.is_empty() {
        return Err(TlsError::NoCertificate {
            path: path.to_path_buf(),
        });
    }

    let mut roots = RootCertStore::empty();
    for cert in certs {
        roots.add(cert)?;
    }
    Ok(roots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{BasicConstraints, CertificateParams, ExtendedKeyUsagePurpose, IsCa, KeyPair};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_pem(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(contents.as_bytes()).expect("write pem");
        file
    }

    /// Generates a self-signed CA and a leaf signed by it, returning
    /// (leaf identity PEM, CA certificate PEM).
    fn generate_credentials() -> (String, String) {
        let ca_key = KeyPair::generate().expect("ca key");
        let mut ca_params = CertificateParams::new(Vec::new()).expect("ca params");
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let ca_cert = ca_params.self_signed(&ca_key).expect("ca cert");

        let leaf_key = KeyPair::generate().expect("leaf key");
        let mut leaf_params =
            CertificateParams::new(vec!["localhost".to_string()]).expect("leaf params");
        leaf_params.extended_key_usages = vec![
            ExtendedKeyUsagePurpose::ClientAuth,
            ExtendedKeyUsagePurpose::ServerAuth,
        ];
        let leaf_cert = leaf_params
            .signed_by(&leaf_key, &ca_cert, &ca_key)
            .expect("leaf cert");

        let identity = format!("{}{}", leaf_cert.pem(), leaf_key.serialize_pem());
        (identity, ca_cert.pem())
    }

    #[test]
    fn test_server_config_builds() {
        let (identity, ca) = generate_credentials();
        let cert_file = write_pem(&identity);
        let ca_file = write_pem(&ca);

        let settings = TlsSettings::new(cert_file.path(), ca_file.path());
        settings.server_config().expect("server config builds");
    }

    #[test]
    fn test_client_config_builds() {
        let (identity, ca) = generate_credentials();
        let cert_file = write_pem(&identity);
        let ca_file = write_pem(&ca);

        let settings = TlsSettings::new(cert_file.path(), ca_file.path());
        settings.client_config().expect("client config builds");
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let settings = TlsSettings::new("/nonexistent/client.pem", "/nonexistent/rootCA.pem");
        let err = settings.server_config().unwrap_err();
        assert!(matches!(err, TlsError::Read { .. }));
    }

    #[test]
    fn test_identity_without_key_rejected() {
        let (_, ca) = generate_credentials();
        let cert_file = write_pem(&ca);
        let ca_file = write_pem(&ca);

        let settings = TlsSettings::new(cert_file.path(), ca_file.path());
        let err = settings.server_config().unwrap_err();
        assert!(matches!(err, TlsError::NoPrivateKey { .. }));
    }

    #[test]
    fn test_empty_pem_rejected() {
        let empty = write_pem("");
        let settings = TlsSettings::new(empty.path(), empty.path());
        let err = settings.client_config().unwrap_err();
        assert!(matches!(err, TlsError::NoCertificate { .. }));
    }
}
