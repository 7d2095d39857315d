//! Error types for SMTP operations.

use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TLS error.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// Invalid DNS name for TLS.
    #[error("Invalid DNS name: {0}")]
    InvalidDnsName(#[from] rustls::pki_types::InvalidDnsNameError),

    /// Server replied with an unexpected code.
    #[error("SMTP error {code}: {message}")]
    Reply {
        /// Reply code (e.g., 550).
        code: u16,
        /// Reply text.
        message: String,
    },

    /// Protocol error (malformed reply).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Feature not supported by the server.
    #[error("Server does not support {0}")]
    NotSupported(String),
}

impl Error {
    /// Creates a reply error from a code and text.
    #[must_use]
    pub fn reply(code: u16, message: impl Into<String>) -> Self {
        Self::Reply {
            code,
            message: message.into(),
        }
    }

    /// Returns true for 5xx reply errors.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, Self::Reply { code, .. } if *code >= 500 && *code < 600)
    }

    /// Returns true for 4xx reply errors.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Reply { code, .. } if *code >= 400 && *code < 500)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn reply_error_classes() {
        let permanent = Error::reply(550, "no such user");
        assert!(permanent.is_permanent());
        assert!(!permanent.is_transient());
        assert_eq!(permanent.to_string(), "SMTP error 550: no such user");

        assert!(Error::reply(421, "busy").is_transient());
        assert!(!Error::Protocol("x".into()).is_permanent());
    }
}
