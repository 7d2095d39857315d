//! Selected mailbox state.

use super::{Flags, SeqNum, Uid, UidValidity};

/// State reported by the server in response to SELECT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailboxStatus {
    /// Number of messages in the mailbox.
    pub exists: u32,
    /// Number of recent messages.
    pub recent: u32,
    /// First unseen message sequence number.
    pub unseen: Option<SeqNum>,
    /// Next UID to be assigned.
    pub uid_next: Option<Uid>,
    /// UIDVALIDITY value.
    pub uid_validity: Option<UidValidity>,
    /// Flags defined for this mailbox.
    pub flags: Flags,
    /// Flags that can be permanently stored.
    pub permanent_flags: Flags,
    /// Whether mailbox is read-only.
    pub read_only: bool,
}

impl MailboxStatus {
    /// Returns true if the mailbox holds no messages.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.exists == 0
    }
}
