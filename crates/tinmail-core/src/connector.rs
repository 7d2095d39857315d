//! Opening server connections.
//!
//! Retrieval and sending open one connection per operation through a
//! [`Connector`], so tests can hand the clients scripted streams instead of
//! sockets.

use std::future::Future;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::ServerConfig;
use crate::error::{Error, Result};

/// Produces a fresh byte stream to a mail server.
pub trait Connector: Send + Sync {
    /// Connected stream type.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Opens a new connection.
    fn connect(&self) -> impl Future<Output = Result<Self::Stream>> + Send;
}

/// Implicit-TLS connection to an IMAP server.
#[derive(Debug, Clone)]
pub struct ImapTls {
    host: String,
    port: u16,
}

impl ImapTls {
    /// Targets `host:port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl From<&ServerConfig> for ImapTls {
    fn from(server: &ServerConfig) -> Self {
        Self::new(server.host.clone(), server.port)
    }
}

impl Connector for ImapTls {
    type Stream = tinmail_imap::ImapStream;

    async fn connect(&self) -> Result<Self::Stream> {
        tinmail_imap::connection::connect_tls(&self.host, self.port)
            .await
            .map_err(|e| Error::Connection(format!("{}:{}: {e}", self.host, self.port)))
    }
}

/// Implicit-TLS connection to an SMTP submission server.
#[derive(Debug, Clone)]
pub struct SmtpTls {
    host: String,
    port: u16,
}

impl SmtpTls {
    /// Targets `host:port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Server host name.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }
}

impl From<&ServerConfig> for SmtpTls {
    fn from(server: &ServerConfig) -> Self {
        Self::new(server.host.clone(), server.port)
    }
}

impl Connector for SmtpTls {
    type Stream = tinmail_smtp::SmtpStream;

    async fn connect(&self) -> Result<Self::Stream> {
        tinmail_smtp::connection::connect_tls(&self.host, self.port)
            .await
            .map_err(|e| Error::Connection(format!("{}:{}: {e}", self.host, self.port)))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_refused_connection_is_connection_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = ImapTls::new("127.0.0.1", port).connect().await.unwrap_err();
        assert!(matches!(err, Error::Connection(ref msg) if msg.starts_with("127.0.0.1:")));

        let err = SmtpTls::new("127.0.0.1", port).connect().await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }

    #[test]
    fn test_from_server_config() {
        let server = ServerConfig {
            host: "imap.example.com".to_string(),
            port: 993,
            ..ServerConfig::default()
        };
        let imap = ImapTls::from(&server);
        assert_eq!(imap.host, "imap.example.com");
        assert_eq!(imap.port, 993);
        assert_eq!(SmtpTls::from(&server).host(), "imap.example.com");
    }
}
