//! Implementation for the authenticated state.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::Client;
use super::states::{Authenticated, Selected};
use crate::Result;
use crate::command::Command;
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{MailboxStatus, ResponseCode};

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Selects a mailbox.
    ///
    /// Consumes self and returns a selected client plus the mailbox status.
    pub async fn select(mut self, mailbox: &str) -> Result<(Client<S, Selected>, MailboxStatus)> {
        let command = Command::Select {
            mailbox: mailbox.to_string(),
        };
        let responses = self.execute(&command).await?;
        let status = parse_mailbox_status(&responses);
        debug!(mailbox, exists = status.exists, "mailbox selected");

        let client = self.transition(Selected::new(mailbox, status.clone()));
        Ok((client, status))
    }
}

/// Collects mailbox state from the untagged data and the completion code of
/// a SELECT.
pub(super) fn parse_mailbox_status(responses: &[Vec<u8>]) -> MailboxStatus {
    let mut status = MailboxStatus::default();

    for response_bytes in responses {
        let code = match ResponseParser::parse(response_bytes) {
            Ok(Response::Untagged(untagged)) => match untagged {
                UntaggedResponse::Exists(n) => {
                    status.exists = n;
                    continue;
                }
                UntaggedResponse::Recent(n) => {
                    status.recent = n;
                    continue;
                }
                UntaggedResponse::Flags(flags) => {
                    status.flags = flags;
                    continue;
                }
                UntaggedResponse::Ok { code, .. } => code,
                _ => continue,
            },
            Ok(Response::Tagged { code, .. }) => code,
            _ => continue,
        };

        match code {
            Some(ResponseCode::UidValidity(v)) => status.uid_validity = Some(v),
            Some(ResponseCode::UidNext(v)) => status.uid_next = Some(v),
            Some(ResponseCode::Unseen(v)) => status.unseen = Some(v),
            Some(ResponseCode::PermanentFlags(flags)) => {
                status.permanent_flags = flags.into_iter().collect();
            }
            Some(ResponseCode::ReadOnly) => status.read_only = true,
            Some(ResponseCode::ReadWrite) => status.read_only = false,
            _ => {}
        }
    }

    status
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
    use crate::types::Flag;

    #[test]
    fn test_parse_mailbox_status() {
        let responses: Vec<Vec<u8>> = vec![
            b"* FLAGS (\\Answered \\Flagged \\Deleted \\Seen \\Draft)\r\n".to_vec(),
            b"* 172 EXISTS\r\n".to_vec(),
            b"* 1 RECENT\r\n".to_vec(),
            b"* OK [UNSEEN 12] Message 12 is first unseen\r\n".to_vec(),
            b"* OK [UIDVALIDITY 3857529045] UIDs valid\r\n".to_vec(),
            b"* OK [UIDNEXT 4392] Predicted next UID\r\n".to_vec(),
            b"* OK [PERMANENTFLAGS (\\Deleted \\Seen \\*)] Limited\r\n".to_vec(),
            b"A0002 OK [READ-WRITE] SELECT completed\r\n".to_vec(),
        ];

        let status = parse_mailbox_status(&responses);
        assert_eq!(status.exists, 172);
        assert_eq!(status.recent, 1);
        assert_eq!(status.unseen.map(|s| s.get()), Some(12));
        assert_eq!(status.uid_validity.map(|v| v.get()), Some(3857529045));
        assert_eq!(status.uid_next.map(|u| u.get()), Some(4392));
        assert_eq!(status.flags.len(), 5);
        assert!(status.permanent_flags.contains(&Flag::Wildcard));
        assert!(!status.read_only);
    }

    #[test]
    fn test_parse_read_only() {
        let responses: Vec<Vec<u8>> = vec![
            b"* 0 EXISTS\r\n".to_vec(),
            b"A0002 OK [READ-ONLY] EXAMINE completed\r\n".to_vec(),
        ];

        let status = parse_mailbox_status(&responses);
        assert!(status.is_empty());
        assert!(status.read_only);
    }
}
