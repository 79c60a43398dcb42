//! TLS listener configuration.

use std::path::Path;

use axum_server::tls_rustls::RustlsConfig;

/// Load the listener certificate chain and private key (PEM).
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, std::io::Error> {
    for (kind, path) in [("Certificate", cert_path), ("Private key", key_path)] {
        if !path.exists() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} file not found: {:?}", kind, path),
            ));
        }
    }

    let config = RustlsConfig::from_pem_file(cert_path, key_path).await?;
    tracing::info!(cert = ?cert_path, "TLS certificate loaded");
    Ok(config)
}
