//! Tags, sequence numbers, UIDs and UIDVALIDITY.

use std::fmt;
use std::num::NonZeroU32;

/// IMAP command tag, echoed by the server in the completion response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag(pub String);

impl Tag {
    /// Creates a new tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! nonzero_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub NonZeroU32);

        impl $name {
            /// Creates the identifier. Returns `None` for 0.
            #[must_use]
            pub fn new(n: u32) -> Option<Self> {
                NonZeroU32::new(n).map(Self)
            }

            /// Returns the underlying value.
            #[must_use]
            pub fn get(self) -> u32 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

nonzero_id!(
    /// Message sequence number, 1-based position in the selected mailbox.
    ///
    /// Sequence numbers shift when messages are expunged.
    SeqNum
);

nonzero_id!(
    /// Unique identifier of a message within a mailbox.
    ///
    /// Stable for as long as the mailbox's UIDVALIDITY does not change.
    Uid
);

nonzero_id!(
    /// UIDVALIDITY of a mailbox; a change invalidates all known UIDs.
    UidValidity
);

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
    fn tag_display() {
        assert_eq!(Tag::new("A0001").to_string(), "A0001");
        assert_eq!(Tag::new(String::from("B2")).as_str(), "B2");
    }

    #[test]
    fn zero_is_rejected() {
        assert!(SeqNum::new(0).is_none());
        assert!(Uid::new(0).is_none());
        assert!(UidValidity::new(0).is_none());
    }

    #[test]
    fn ordering_and_display() {
        let a = SeqNum::new(3).unwrap();
        let b = SeqNum::new(12).unwrap();
        assert!(a < b);
        assert_eq!(b.to_string(), "12");
        assert_eq!(Uid::new(4_294_967_295).unwrap().get(), u32::MAX);
    }
}
