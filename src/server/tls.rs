use crate::cli::Args;
use crate::error::ConfigError;
use log::info;
use rustls::ServerConfig;
use rustls::pki_types::{ CertificateDer, PrivateKeyDer };
use rustls_pemfile::{ certs, pkcs8_private_keys };
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert_path: String,
    pub key_path: String,
}

impl TlsPaths {
    /// `None` when TLS is disabled; an error when it is enabled without both files.
    pub fn from_args(args: &Args) -> Result<Option<Self>, ConfigError> {
        if !args.enable_tls {
            info!("TLS not enabled. Serving plain HTTP/WS.");
            return Ok(None);
        }
        match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert_path), Some(key_path)) => {
                info!("TLS enabled. Certificate '{}', key '{}'", cert_path, key_path);
                Ok(Some(Self { cert_path: cert_path.clone(), key_path: key_path.clone() }))
            }
            (Some(_), None) | (None, Some(_)) =>
                Err(
                    ConfigError::Invalid(
                        "Both --tls-cert-path and --tls-key-path must be provided to enable TLS".into()
                    )
                ),
            (None, None) =>
                Err(ConfigError::Invalid("--enable-tls was set but no certificate/key paths provided".into())),
        }
    }
}

pub fn load_tls_config(paths: &TlsPaths) -> Result<Arc<ServerConfig>, ConfigError> {
    let cert_file = File::open(&paths.cert_path).map_err(|e|
        ConfigError::Invalid(format!("Failed to open TLS certificate file '{}': {}", paths.cert_path, e))
    )?;
    let key_file = File::open(&paths.key_path).map_err(|e|
        ConfigError::Invalid(format!("Failed to open TLS key file '{}': {}", paths.key_path, e))
    )?;

    let mut cert_reader = BufReader::new(cert_file);
    let mut key_reader = BufReader::new(key_file);
    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| ConfigError::Invalid(format!("Failed to read certificate(s): {}", e)))?;

    let key = match pkcs8_private_keys(&mut key_reader).next() {
        Some(Ok(k)) => PrivateKeyDer::Pkcs8(k),
        Some(Err(e)) => {
            return Err(ConfigError::Invalid(format!("Error reading private key: {}", e)));
        }
        None => {
            return Err(ConfigError::Invalid("No PKCS8 private key found in key file".into()));
        }
    };

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .map_err(|e| ConfigError::Invalid(format!("Invalid TLS certificate/key: {}", e)))?;

    Ok(Arc::new(config))
}
