//! Envelope addresses.

use std::fmt;

use crate::error::{Error, Result};

/// Bare `local@domain` address for MAIL FROM and RCPT TO.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Creates an address after basic validation.
    ///
    /// Surrounding whitespace is trimmed. The address must contain exactly one
    /// `@` with non-empty parts and no whitespace, angle brackets or control
    /// characters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is malformed.
    pub fn new(addr: impl AsRef<str>) -> Result<Self> {
        let addr = addr.as_ref().trim();
        let invalid = |reason: &str| Error::InvalidAddress(format!("{addr:?}: {reason}"));

        if addr.is_empty() {
            return Err(invalid("empty"));
        }
        if addr
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || c == '<' || c == '>')
        {
            return Err(invalid("contains forbidden characters"));
        }

        let Some((local, domain)) = addr.split_once('@') else {
            return Err(invalid("missing @"));
        };
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(invalid("expected exactly one @ between non-empty parts"));
        }

        Ok(Self(addr.to_string()))
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn valid_address_is_trimmed() {
        let addr = Address::new("  user@example.com ").unwrap();
        assert_eq!(addr.as_str(), "user@example.com");
    }

    #[test]
    fn invalid_addresses() {
        for bad in ["", "userexample.com", "@example.com", "user@", "a@b@c", "a b@c", "<a@b>", "a@b\r\nRCPT"] {
            assert!(Address::new(bad).is_err(), "{bad:?} should be rejected");
        }
    }
}
