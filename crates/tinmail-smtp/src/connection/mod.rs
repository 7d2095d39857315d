//! SMTP connection management with type-state pattern.

mod client;
mod stream;

pub use client::{Authenticated, Client, Connected, Data, MailTransaction, RecipientAdded};
pub use stream::{SmtpStream, connect_tls};

use crate::types::{AuthMechanism, Extension};

/// What the server told us about itself.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    /// Greeting text after the reply code.
    pub greeting: String,
    /// Extensions from the last EHLO reply.
    pub extensions: Vec<Extension>,
}

impl ServerInfo {
    /// Checks if the server advertised an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Returns the advertised maximum message size.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(size) => *size,
            _ => None,
        })
    }

    /// Returns the advertised authentication mechanisms.
    #[must_use]
    pub fn auth_mechanisms(&self) -> &[AuthMechanism] {
        self.extensions
            .iter()
            .find_map(|ext| match ext {
                Extension::Auth(mechanisms) => Some(mechanisms.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn server_info_lookups() {
        let info = ServerInfo {
            greeting: "mx ESMTP".to_string(),
            extensions: vec![
                Extension::Pipelining,
                Extension::Size(Some(1000)),
                Extension::Auth(vec![AuthMechanism::Login, AuthMechanism::Plain]),
            ],
        };

        assert!(info.supports(&Extension::Pipelining));
        assert!(!info.supports(&Extension::StartTls));
        assert_eq!(info.max_message_size(), Some(1000));
        assert!(info.auth_mechanisms().contains(&AuthMechanism::Plain));
        assert!(ServerInfo::default().auth_mechanisms().is_empty());
    }
}
