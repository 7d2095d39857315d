//! Type-state markers for IMAP client connection states.

use crate::types::MailboxStatus;

/// State before LOGIN; only authentication is valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotAuthenticated;

/// State after LOGIN; mailbox selection is valid.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

/// State with a selected mailbox.
///
/// Carries the mailbox name and the status snapshot from SELECT.
#[derive(Debug, Clone)]
pub struct Selected {
    pub(crate) mailbox: String,
    pub(crate) status: MailboxStatus,
}

impl Selected {
    /// Creates a new Selected state.
    #[must_use]
    pub fn new(mailbox: impl Into<String>, status: MailboxStatus) -> Self {
        Self {
            mailbox: mailbox.into(),
            status,
        }
    }

    /// Returns the name of the selected mailbox.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    /// Returns the mailbox status snapshot from SELECT.
    #[must_use]
    pub const fn status(&self) -> &MailboxStatus {
        &self.status
    }

    /// Returns the number of messages in the mailbox.
    #[must_use]
    pub const fn exists(&self) -> u32 {
        self.status.exists
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

    fn _assert_send<T: Send>() {}

    #[test]
    fn test_states_are_send() {
        _assert_send::<NotAuthenticated>();
        _assert_send::<Authenticated>();
        _assert_send::<Selected>();
    }

    #[test]
    fn test_selected_state_accessors() {
        let status = MailboxStatus {
            exists: 100,
            recent: 5,
            ..Default::default()
        };
        let selected = Selected::new("INBOX", status);

        assert_eq!(selected.mailbox(), "INBOX");
        assert_eq!(selected.exists(), 100);
        assert_eq!(selected.status().recent, 5);
    }
}
