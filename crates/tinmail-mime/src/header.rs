//! MIME header handling.

use crate::encoding::{decode_rfc2047, encode_rfc2047};
use crate::error::{Error, Result};
use std::fmt;

/// Ordered collection of email headers.
///
/// Lookups are case-insensitive; names keep the spelling they were added
/// with and iteration follows insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Sets a header value, replacing any existing values.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value.into()));
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Returns an iterator over all headers in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of header lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses a header block.
    ///
    /// Parsing stops at the first empty line. Folded continuation lines
    /// (starting with space or tab) are unfolded with a single space.
    ///
    /// # Errors
    ///
    /// Returns an error if a line is neither `Name: value` nor a
    /// continuation of the previous header.
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_with(text, true)
    }

    /// Parses a header block, skipping malformed lines.
    #[must_use]
    pub fn parse_lossy(text: &str) -> Self {
        // Lenient mode never returns an error.
        Self::parse_with(text, false).unwrap_or_default()
    }

    fn parse_with(text: &str, strict: bool) -> Result<Self> {
        let mut headers = Self::new();

        for line in text.lines() {
            if line.is_empty() {
                break;
            }

            if line.starts_with(' ') || line.starts_with('\t') {
                match headers.entries.last_mut() {
                    Some((_, value)) => {
                        if !value.is_empty() {
                            value.push(' ');
                        }
                        value.push_str(line.trim());
                    }
                    None if strict => {
                        return Err(Error::InvalidHeader(format!(
                            "continuation without header: {line}"
                        )));
                    }
                    None => {}
                }
                continue;
            }

            match line.split_once(':') {
                Some((name, value)) if is_valid_name(name) => {
                    headers.add(name, value.trim());
                }
                _ if strict => return Err(Error::InvalidHeader(line.to_string())),
                _ => {}
            }
        }

        Ok(headers)
    }

    /// Encodes a header value using RFC 2047 if needed.
    #[must_use]
    pub fn encode_value(value: &str) -> String {
        encode_rfc2047(value, "utf-8")
    }

    /// Decodes RFC 2047 encoded words in a header value.
    #[must_use]
    pub fn decode_value(value: &str) -> String {
        decode_rfc2047(value)
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_graphic() && b != b':')
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
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

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.get("Subject"), None);
    }

    #[test]
    fn test_headers_set_replaces() {
        let mut headers = Headers::new();
        headers.add("To", "alice@example.com");
        headers.add("to", "bob@example.com");
        assert_eq!(headers.get_all("To").len(), 2);

        headers.set("To", "charlie@example.com");
        assert_eq!(headers.get_all("TO"), vec!["charlie@example.com"]);
    }

    #[test]
    fn test_headers_remove() {
        let mut headers = Headers::new();
        headers.add("Subject", "Test");
        headers.remove("subject");
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_parse_folded() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: multipart/mixed;\r\n",
            "\tboundary=\"abc\"\r\n",
            "\r\n",
            "Not-A-Header: body text\r\n"
        );

        let headers = Headers::parse(text).unwrap();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get("from"), Some("sender@example.com"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("multipart/mixed; boundary=\"abc\"")
        );
        assert_eq!(headers.get("Not-A-Header"), None);
    }

    #[test]
    fn test_headers_parse_rejects_garbage() {
        assert!(Headers::parse("this is just a sentence\r\n").is_err());
        assert!(Headers::parse(" leading continuation\r\n").is_err());
        assert!(Headers::parse("Bad Name: value\r\n").is_err());
    }

    #[test]
    fn test_headers_parse_lossy_skips_garbage() {
        let headers = Headers::parse_lossy("garbage line\r\nSubject: ok\r\n");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("subject"), Some("ok"));
    }

    #[test]
    fn test_headers_display_keeps_order() {
        let mut headers = Headers::new();
        headers.add("To", "recipient@example.com");
        headers.add("From", "sender@example.com");

        assert_eq!(
            headers.to_string(),
            "To: recipient@example.com\r\nFrom: sender@example.com\r\n"
        );
    }

    #[test]
    fn test_headers_encode_decode_value() {
        let encoded = Headers::encode_value("Привет");
        assert_ne!(encoded, "Привет");
        assert_eq!(Headers::decode_value(&encoded), "Привет");
    }
}
