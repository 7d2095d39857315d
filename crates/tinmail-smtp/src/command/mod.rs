//! SMTP command serialization.

use crate::types::{Address, AuthMechanism};

/// SMTP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// EHLO with the client's host name.
    Ehlo {
        /// Client host name.
        hostname: String,
    },
    /// AUTH with an optional initial response (already base64).
    Auth {
        /// Mechanism.
        mechanism: AuthMechanism,
        /// Initial response.
        initial_response: Option<String>,
    },
    /// MAIL FROM.
    MailFrom {
        /// Reverse path.
        from: Address,
    },
    /// RCPT TO.
    RcptTo {
        /// Forward path.
        to: Address,
    },
    /// DATA.
    Data,
    /// QUIT.
    Quit,
}

impl Command {
    /// Serializes the command, CRLF-terminated.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let line = match self {
            Self::Ehlo { hostname } => format!("EHLO {hostname}"),
            Self::Auth {
                mechanism,
                initial_response: Some(response),
            } => format!("AUTH {} {response}", mechanism.as_str()),
            Self::Auth {
                mechanism,
                initial_response: None,
            } => format!("AUTH {}", mechanism.as_str()),
            Self::MailFrom { from } => format!("MAIL FROM:<{from}>"),
            Self::RcptTo { to } => format!("RCPT TO:<{to}>"),
            Self::Data => "DATA".to_string(),
            Self::Quit => "QUIT".to_string(),
        };

        let mut buf = line.into_bytes();
        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Command verb for logging; never includes credentials.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Ehlo { .. } => "EHLO",
            Self::Auth { .. } => "AUTH",
            Self::MailFrom { .. } => "MAIL FROM",
            Self::RcptTo { .. } => "RCPT TO",
            Self::Data => "DATA",
            Self::Quit => "QUIT",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_ehlo() {
        let cmd = Command::Ehlo {
            hostname: "localhost".to_string(),
        };
        assert_eq!(cmd.serialize(), b"EHLO localhost\r\n");
    }

    #[test]
    fn test_auth_plain_with_initial_response() {
        let cmd = Command::Auth {
            mechanism: AuthMechanism::Plain,
            initial_response: Some("AHVzZXIAcGFzcw==".to_string()),
        };
        assert_eq!(cmd.serialize(), b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n");
        assert_eq!(cmd.verb(), "AUTH");
    }

    #[test]
    fn test_envelope_commands() {
        let from = Command::MailFrom {
            from: Address::new("sender@example.com").unwrap(),
        };
        let to = Command::RcptTo {
            to: Address::new("recipient@example.com").unwrap(),
        };
        assert_eq!(from.serialize(), b"MAIL FROM:<sender@example.com>\r\n");
        assert_eq!(to.serialize(), b"RCPT TO:<recipient@example.com>\r\n");
    }

    #[test]
    fn test_bare_commands() {
        assert_eq!(Command::Data.serialize(), b"DATA\r\n");
        assert_eq!(Command::Quit.serialize(), b"QUIT\r\n");
    }
}
