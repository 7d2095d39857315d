//! Command argument types.

/// FETCH items to request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchItems {
    /// FAST macro (FLAGS INTERNALDATE RFC822.SIZE).
    Fast,
    /// Explicit list of attributes.
    Items(Vec<FetchAttribute>),
}

impl FetchItems {
    /// UID and ENVELOPE: what a message list needs.
    #[must_use]
    pub fn envelope() -> Self {
        Self::Items(vec![FetchAttribute::Uid, FetchAttribute::Envelope])
    }

    /// The complete message text. Without `peek` the server sets `\Seen`.
    #[must_use]
    pub fn full_body(peek: bool) -> Self {
        Self::Items(vec![FetchAttribute::Body {
            section: None,
            peek,
        }])
    }
}

/// Individual FETCH attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchAttribute {
    /// Message flags.
    Flags,
    /// Internal date.
    InternalDate,
    /// RFC822 size.
    Rfc822Size,
    /// Envelope structure.
    Envelope,
    /// UID.
    Uid,
    /// `BODY[section]` or `BODY.PEEK[section]`.
    Body {
        /// Section specifier; `None` is the whole message.
        section: Option<String>,
        /// Peek (don't set \Seen).
        peek: bool,
    },
}

/// SEARCH criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    /// All messages.
    All,
    /// Messages with the \Seen flag.
    Seen,
    /// Messages without the \Seen flag.
    Unseen,
    /// Messages with the \Flagged flag.
    Flagged,
    /// Negation.
    Not(Box<Self>),
    /// Conjunction (space-separated keys).
    And(Vec<Self>),
}
