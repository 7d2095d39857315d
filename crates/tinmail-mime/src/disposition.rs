//! Content-Disposition handling (RFC 2183).

use crate::encoding::decode_rfc2047;
use crate::params::{format_parameter, split_parameters};
use std::collections::BTreeMap;
use std::fmt;

/// Disposition type of a body part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispositionType {
    /// Displayed as part of the message.
    Inline,
    /// Stored separately from the message.
    Attachment,
    /// Any other token, kept lowercased.
    Other(String),
}

/// Parsed Content-Disposition header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Disposition type.
    pub disposition: DispositionType,
    /// Parameters keyed by lowercase name.
    pub parameters: BTreeMap<String, String>,
}

impl ContentDisposition {
    /// Creates an attachment disposition with a filename.
    #[must_use]
    pub fn attachment(filename: impl Into<String>) -> Self {
        let mut parameters = BTreeMap::new();
        parameters.insert("filename".to_string(), filename.into());
        Self {
            disposition: DispositionType::Attachment,
            parameters,
        }
    }

    /// Parses a header value. Parsing never fails; an unrecognized type
    /// becomes [`DispositionType::Other`].
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let (kind, parameters) = split_parameters(value);
        let disposition = match kind.to_ascii_lowercase().as_str() {
            "inline" => DispositionType::Inline,
            "attachment" => DispositionType::Attachment,
            other => DispositionType::Other(other.to_string()),
        };
        Self {
            disposition,
            parameters,
        }
    }

    /// Returns true for `inline`.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.disposition == DispositionType::Inline
    }

    /// Returns true for `attachment`.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.disposition == DispositionType::Attachment
    }

    /// Returns the decoded `filename` parameter, if present.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        self.parameters.get("filename").map(|f| decode_rfc2047(f))
    }
}

impl fmt::Display for ContentDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.disposition {
            DispositionType::Inline => f.write_str("inline")?,
            DispositionType::Attachment => f.write_str("attachment")?,
            DispositionType::Other(other) => f.write_str(other)?,
        }
        for (key, value) in &self.parameters {
            f.write_str(&format_parameter(key, value))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attachment() {
        let cd = ContentDisposition::parse("attachment; filename=\"report.pdf\"; size=1024");
        assert!(cd.is_attachment());
        assert_eq!(cd.filename().as_deref(), Some("report.pdf"));
        assert_eq!(cd.parameters.get("size").unwrap(), "1024");
    }

    #[test]
    fn test_parse_inline_case_insensitive() {
        let cd = ContentDisposition::parse("INLINE");
        assert!(cd.is_inline());
        assert_eq!(cd.filename(), None);
    }

    #[test]
    fn test_parse_encoded_filename() {
        let cd = ContentDisposition::parse("attachment; filename=\"=?UTF-8?B?w7xiZXIudHh0?=\"");
        assert_eq!(cd.filename().as_deref(), Some("über.txt"));
    }

    #[test]
    fn test_parse_other() {
        let cd = ContentDisposition::parse("form-data; name=field");
        assert_eq!(cd.disposition, DispositionType::Other("form-data".to_string()));
    }

    #[test]
    fn test_display() {
        let cd = ContentDisposition::attachment("notes final.txt");
        assert_eq!(cd.to_string(), "attachment; filename=\"notes final.txt\"");
    }
}
