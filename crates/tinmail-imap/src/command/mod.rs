//! IMAP commands and their wire serialization.

mod serialize;
mod tag_generator;
mod types;

use crate::types::SequenceSet;

pub use tag_generator::TagGenerator;
pub use types::{FetchAttribute, FetchItems, SearchCriteria};

use serialize::{write_astring, write_fetch_items, write_search_criteria};

/// IMAP command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// LOGOUT command.
    Logout,
    /// LOGIN command.
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// SELECT command.
    Select {
        /// Mailbox to select.
        mailbox: String,
    },
    /// SEARCH or UID SEARCH command.
    Search {
        /// Search criteria.
        criteria: SearchCriteria,
        /// Use UIDs.
        uid: bool,
    },
    /// FETCH or UID FETCH command.
    Fetch {
        /// Message set.
        sequence: SequenceSet,
        /// Items to fetch.
        items: FetchItems,
        /// Interpret `sequence` as UIDs.
        uid: bool,
    },
}

impl Command {
    /// Serializes the command with the given tag, CRLF-terminated.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');

        match self {
            Self::Logout => buf.extend_from_slice(b"LOGOUT"),

            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN ");
                write_astring(&mut buf, username);
                buf.push(b' ');
                write_astring(&mut buf, password);
            }

            Self::Select { mailbox } => {
                buf.extend_from_slice(b"SELECT ");
                write_astring(&mut buf, mailbox);
            }

            Self::Search { criteria, uid } => {
                if *uid {
                    buf.extend_from_slice(b"UID ");
                }
                buf.extend_from_slice(b"SEARCH ");
                write_search_criteria(&mut buf, criteria);
            }

            Self::Fetch {
                sequence,
                items,
                uid,
            } => {
                if *uid {
                    buf.extend_from_slice(b"UID ");
                }
                buf.extend_from_slice(b"FETCH ");
                buf.extend_from_slice(sequence.to_string().as_bytes());
                buf.push(b' ');
                write_fetch_items(&mut buf, items);
            }
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }

    /// Short name for logging; never includes arguments such as passwords.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Logout => "LOGOUT",
            Self::Login { .. } => "LOGIN",
            Self::Select { .. } => "SELECT",
            Self::Search { uid: false, .. } => "SEARCH",
            Self::Search { uid: true, .. } => "UID SEARCH",
            Self::Fetch { uid: false, .. } => "FETCH",
            Self::Fetch { uid: true, .. } => "UID FETCH",
        }
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

    fn wire(cmd: &Command) -> String {
        String::from_utf8(cmd.serialize("A0001")).unwrap()
    }

    #[test]
    fn login_quotes_when_needed() {
        let cmd = Command::Login {
            username: "user@example.com".to_string(),
            password: "pa ss\"word".to_string(),
        };
        assert_eq!(
            wire(&cmd),
            "A0001 LOGIN user@example.com \"pa ss\\\"word\"\r\n"
        );
        assert_eq!(cmd.name(), "LOGIN");
    }

    #[test]
    fn select_inbox() {
        let cmd = Command::Select {
            mailbox: "INBOX".to_string(),
        };
        assert_eq!(wire(&cmd), "A0001 SELECT INBOX\r\n");

        let spaced = Command::Select {
            mailbox: "Sent Items".to_string(),
        };
        assert_eq!(wire(&spaced), "A0001 SELECT \"Sent Items\"\r\n");
    }

    #[test]
    fn search_criteria() {
        let cmd = Command::Search {
            criteria: SearchCriteria::And(vec![
                SearchCriteria::Unseen,
                SearchCriteria::Not(Box::new(SearchCriteria::Flagged)),
            ]),
            uid: false,
        };
        assert_eq!(wire(&cmd), "A0001 SEARCH UNSEEN NOT FLAGGED\r\n");
    }

    #[test]
    fn fetch_envelope() {
        let cmd = Command::Fetch {
            sequence: SequenceSet::range(1, 3).unwrap(),
            items: FetchItems::envelope(),
            uid: false,
        };
        assert_eq!(wire(&cmd), "A0001 FETCH 1:3 (UID ENVELOPE)\r\n");
    }

    #[test]
    fn uid_fetch_body() {
        let cmd = Command::Fetch {
            sequence: SequenceSet::single(4827).unwrap(),
            items: FetchItems::full_body(false),
            uid: true,
        };
        assert_eq!(wire(&cmd), "A0001 UID FETCH 4827 BODY[]\r\n");
        assert_eq!(cmd.name(), "UID FETCH");

        let peek = Command::Fetch {
            sequence: SequenceSet::single(7).unwrap(),
            items: FetchItems::full_body(true),
            uid: true,
        };
        assert_eq!(wire(&peek), "A0001 UID FETCH 7 BODY.PEEK[]\r\n");
    }

    #[test]
    fn logout() {
        assert_eq!(wire(&Command::Logout), "A0001 LOGOUT\r\n");
    }
}
