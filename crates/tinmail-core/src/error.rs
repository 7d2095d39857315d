//! Error types for the mail core.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::Attachment;

/// Boxed error kept as the cause of a protocol failure.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Transport or TLS dial failure, or a server that refused the session.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Credentials were rejected.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// A mailbox or submission command failed.
    #[error("Failed to {operation}: {source}")]
    Protocol {
        /// What was being attempted, e.g. `search`.
        operation: &'static str,
        /// The underlying client error.
        #[source]
        source: BoxError,
    },

    /// The body could not be extracted. Attachments found before the
    /// failure are kept.
    #[error("Failed to parse email body: {error}")]
    Body {
        /// What went wrong.
        #[source]
        error: BodyError,
        /// Attachments extracted before the failure.
        attachments: Vec<Attachment>,
    },

    /// Extraction finished with an empty body.
    #[error("email body is empty")]
    EmptyBody,

    /// The server returned no body for the requested UID.
    #[error("email not found (UID {0})")]
    NotFound(u32),

    /// A draft had no usable To or Cc address.
    #[error("no recipients")]
    NoRecipients,

    /// Configuration file missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`Error::Connection`].
    Connection,
    /// See [`Error::Auth`].
    Auth,
    /// Command failures, including a missing message.
    Protocol,
    /// Body extraction failures.
    Parse,
    /// See [`Error::EmptyBody`].
    EmptyBody,
    /// Invalid input from the caller or the config file.
    Config,
    /// See [`Error::Io`].
    Io,
}

impl Error {
    /// Wraps a client error as a failed protocol step.
    #[must_use]
    pub fn protocol(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Protocol {
            operation,
            source: source.into(),
        }
    }

    /// Returns the category of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection(_) => ErrorKind::Connection,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Protocol { .. } | Self::NotFound(_) => ErrorKind::Protocol,
            Self::Body { .. } => ErrorKind::Parse,
            Self::EmptyBody => ErrorKind::EmptyBody,
            Self::NoRecipients | Self::Config(_) => ErrorKind::Config,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Attachments that were extracted even though the operation failed.
    #[must_use]
    pub fn attachments(&self) -> &[Attachment] {
        match self {
            Self::Body { attachments, .. } => attachments,
            _ => &[],
        }
    }
}

/// Why a body could not be extracted from a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BodyError {
    /// The raw message had no bytes.
    #[error("email data is empty")]
    EmptyData,

    /// No part in the tree carried text.
    #[error("no text content found in email (only attachments or unsupported content types)")]
    NoTextContent,

    /// Text was seen but both accumulators ended up empty.
    #[error("email body could not be extracted")]
    NotExtracted,
}

/// Errors from persisting or copying attachment files.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every candidate name up to the retry bound was taken.
    #[error("no free file name for {path} after {attempts} attempts")]
    CollisionLimit {
        /// The first candidate path.
        path: PathBuf,
        /// Number of names tried.
        attempts: u32,
    },

    /// The attachment has not been written to disk.
    #[error("attachment {0} has no local file")]
    NotPersisted(String),

    /// The platform opener failed.
    #[error("failed to open file: {0}")]
    Open(#[from] opener::OpenError),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

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

    #[test]
    fn test_body_error_messages() {
        assert_eq!(BodyError::EmptyData.to_string(), "email data is empty");
        assert_eq!(
            BodyError::NoTextContent.to_string(),
            "no text content found in email (only attachments or unsupported content types)"
        );
        assert_eq!(
            BodyError::NotExtracted.to_string(),
            "email body could not be extracted"
        );
    }

    #[test]
    fn test_protocol_error_keeps_cause() {
        let cause = std::io::Error::other("tagged NO");
        let err = Error::protocol("search", cause);
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.to_string(), "Failed to search: tagged NO");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_body_error_carries_attachments() {
        let err = Error::Body {
            error: BodyError::NoTextContent,
            attachments: vec![Attachment {
                filename: "a.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                size: 3,
                file_path: None,
            }],
        };
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert_eq!(err.attachments().len(), 1);
        assert!(Error::EmptyBody.attachments().is_empty());
    }

    #[test]
    fn test_kinds() {
        assert_eq!(Error::Auth("no".into()).kind(), ErrorKind::Auth);
        assert_eq!(Error::NotFound(4).kind(), ErrorKind::Protocol);
        assert_eq!(Error::NoRecipients.kind(), ErrorKind::Config);
        assert_eq!(Error::EmptyBody.kind(), ErrorKind::EmptyBody);
    }
}
