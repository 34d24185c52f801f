//! TLS trust material loading
//!
//! Reads the optional CA bundle and client certificate/key pair named by a
//! [`TrustConfig`] and turns them into a rustls client configuration layered
//! on the platform trust store.

use crate::config::ConfigError;
use crate::profile::TrustConfig;
use rumqttc::tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rumqttc::tokio_rustls::rustls::{ClientConfig, RootCertStore};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, warn};

/// PEM material read from disk, not yet bound to a TLS configuration
pub struct LoadedTrust {
    extra_roots: Vec<CertificateDer<'static>>,
    identity: Option<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)>,
}

impl LoadedTrust {
    /// Read and parse every file named by `trust`
    pub fn load(trust: &TrustConfig) -> Result<Self, ConfigError> {
        let extra_roots = match &trust.ca_root {
            Some(path) => read_certificates(path)?,
            None => Vec::new(),
        };

        let identity = match &trust.identity {
            Some(identity) => Some((
                read_certificates(&identity.cert_file)?,
                read_private_key(&identity.key_file)?,
            )),
            None => None,
        };

        Ok(Self {
            extra_roots,
            identity,
        })
    }

    /// Number of certificates loaded from the extra CA bundle
    pub fn extra_root_count(&self) -> usize {
        self.extra_roots.len()
    }

    /// Whether a client identity was loaded
    pub fn has_identity(&self) -> bool {
        self.identity.is_some()
    }

    /// Build a rustls client configuration: platform roots plus extra roots,
    /// with the client identity attached when present.
    pub fn into_client_config(self) -> Result<ClientConfig, ConfigError> {
        let mut roots = RootCertStore::empty();

        match rustls_native_certs::load_native_certs() {
            Ok(native) => {
                let (added, ignored) = roots.add_parsable_certificates(native);
                debug!(added, ignored, "loaded platform trust roots");
            }
            Err(e) => warn!(error = %e, "could not load platform trust roots"),
        }

        for cert in self.extra_roots {
            roots.add(cert)?;
        }

        let builder = ClientConfig::builder().with_root_certificates(roots);
        let config = match self.identity {
            Some((chain, key)) => builder.with_client_auth_cert(chain, key)?,
            None => builder.with_no_client_auth(),
        };

        Ok(config)
    }
}

fn open(path: &Path) -> Result<BufReader<File>, ConfigError> {
    let file = File::open(path).map_err(|source| ConfigError::MaterialRead {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}

fn read_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, ConfigError> {
    let mut reader = open(path)?;
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ConfigError::InvalidPem {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    if certs.is_empty() {
        return Err(ConfigError::InvalidPem {
            path: path.to_path_buf(),
            reason: "no certificates found".to_string(),
        });
    }
    Ok(certs)
}

fn read_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, ConfigError> {
    let mut reader = open(path)?;
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| ConfigError::InvalidPem {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
        .ok_or_else(|| ConfigError::InvalidPem {
            path: path.to_path_buf(),
            reason: "no private key found".to_string(),
        })
}
