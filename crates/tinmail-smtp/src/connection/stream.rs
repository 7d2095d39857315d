//! TLS transport for SMTP submission.

use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tracing::debug;

use crate::error::Result;

/// Implicit-TLS stream to a submission server (port 465).
pub type SmtpStream = TlsStream<TcpStream>;

/// Connects to an SMTP server over implicit TLS.
///
/// # Errors
///
/// Returns an error if the connection or TLS handshake fails.
pub async fn connect_tls(hostname: &str, port: u16) -> Result<SmtpStream> {
    debug!(host = hostname, port, "connecting to SMTP server");
    let tcp_stream = TcpStream::connect((hostname, port)).await?;

    let server_name = ServerName::try_from(hostname.to_string())?;
    let tls_stream = create_tls_connector()
        .connect(server_name, tcp_stream)
        .await?;

    Ok(tls_stream)
}

fn create_tls_connector() -> TlsConnector {
    let root_store = RootCertStore {
        roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
    };

    let config = ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    TlsConnector::from(Arc::new(config))
}
