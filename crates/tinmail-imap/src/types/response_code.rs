//! Response codes carried in `[...]` after a status.

use super::{Capability, Flag, SeqNum, Uid, UidValidity};

/// Bracketed response code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseCode {
    /// ALERT: text that must be shown to the user.
    Alert,
    /// CAPABILITY list, usually in the greeting or LOGIN completion.
    Capability(Vec<Capability>),
    /// PERMANENTFLAGS: flags that can be changed permanently.
    PermanentFlags(Vec<Flag>),
    /// READ-ONLY: mailbox selected as read-only.
    ReadOnly,
    /// READ-WRITE: mailbox selected as read-write.
    ReadWrite,
    /// TRYCREATE: mailbox doesn't exist, but can be created.
    TryCreate,
    /// UIDNEXT: next UID to be assigned.
    UidNext(Uid),
    /// UIDVALIDITY of the selected mailbox.
    UidValidity(UidValidity),
    /// UNSEEN: first unseen message sequence number.
    Unseen(SeqNum),
    /// Any other code, with its raw text.
    Unknown(String),
}
