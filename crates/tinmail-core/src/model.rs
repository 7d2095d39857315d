//! Domain models shared by retrieval, extraction and composition.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::composer::parse_recipients;

/// An email message as shown in a list and, once opened, with its body.
///
/// Serializes to the persisted record shape. The UID is only meaningful
/// within one mailbox session and is never written out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    /// Formatted sender address.
    pub from: String,
    /// Formatted recipient addresses, comma separated.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub to: String,
    /// Formatted Cc addresses, comma separated.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub cc: String,
    /// Decoded subject.
    pub subject: String,
    /// Display date.
    pub date: String,
    /// Body text; empty until fetched.
    pub body: String,
    /// Machine time of the Date header, in UTC.
    pub timestamp: DateTime<Utc>,
    /// Attachments; empty until the body is fetched.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// Server-assigned UID.
    #[serde(skip)]
    pub uid: u32,
}

/// A file attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attachment {
    /// Display name as declared by the sender.
    pub filename: String,
    /// MIME type, e.g. `application/pdf`.
    pub content_type: String,
    /// Size in bytes.
    pub size: u64,
    /// Location on disk; `None` until the bytes are persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
}

impl Attachment {
    /// Describes an existing local file for sending.
    ///
    /// The content type is guessed from the extension.
    ///
    /// # Errors
    ///
    /// Returns an error if the file's metadata cannot be read.
    pub fn from_path(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        let filename = path
            .file_name()
            .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
        Ok(Self {
            filename,
            content_type: guess_content_type(path).to_string(),
            size: metadata.len(),
            file_path: Some(path.to_path_buf()),
        })
    }

    /// Returns true when the attachment has a file on disk.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.file_path.as_deref().is_some_and(Path::is_file)
    }
}

/// Guesses a MIME type from a file extension.
#[must_use]
pub fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "txt" | "md" => "text/plain",
        "html" | "htm" => "text/html",
        "csv" => "text/csv",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "json" => "application/json",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "mp3" => "audio/mpeg",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}

/// An outgoing message being composed.
///
/// Addresses are free text here; they are split when sending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    /// Comma-separated recipients.
    pub to: String,
    /// Comma-separated Cc recipients.
    pub cc: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
    /// Local files to attach.
    pub attachments: Vec<Attachment>,
}

impl Draft {
    /// All envelope recipients: To followed by Cc.
    #[must_use]
    pub fn recipients(&self) -> Vec<String> {
        let mut all = parse_recipients(&self.to);
        all.extend(parse_recipients(&self.cc));
        all
    }
}

/// Which messages a listing returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailboxFilter {
    /// Messages without the seen flag.
    Unseen,
    /// Messages with the seen flag.
    Seen,
    /// Every message.
    #[default]
    All,
}

impl MailboxFilter {
    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unseen => "unseen",
            Self::Seen => "seen",
            Self::All => "all",
        }
    }
}

impl fmt::Display for MailboxFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown filter name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid inbox view '{0}', must be 'unseen', 'seen', or 'all'")]
pub struct ParseFilterError(pub String);

impl FromStr for MailboxFilter {
    type Err = ParseFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unseen" => Ok(Self::Unseen),
            "seen" => Ok(Self::Seen),
            "all" => Ok(Self::All),
            other => Err(ParseFilterError(other.to_string())),
        }
    }
}

/// Where an extracted body's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextFormat {
    /// A `text/plain` part, or an unstructured message.
    Plain,
    /// A `text/html` part.
    Html,
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

    fn sample_message() -> Message {
        Message {
            from: "Alice <alice@example.com>".to_string(),
            subject: "Hi".to_string(),
            date: "Mon, 02 Jan 2006 15:04:05 -0700".to_string(),
            uid: 42,
            ..Message::default()
        }
    }

    #[test]
    fn test_filter_roundtrip() {
        for filter in [MailboxFilter::Unseen, MailboxFilter::Seen, MailboxFilter::All] {
            assert_eq!(filter.to_string().parse::<MailboxFilter>().unwrap(), filter);
        }
        assert_eq!(MailboxFilter::default(), MailboxFilter::All);
    }

    #[test]
    fn test_filter_rejects_unknown() {
        let err = "flagged".parse::<MailboxFilter>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid inbox view 'flagged', must be 'unseen', 'seen', or 'all'"
        );
        assert!("Unseen".parse::<MailboxFilter>().is_err());
    }

    #[test]
    fn test_filter_serde() {
        let json = serde_json::to_string(&MailboxFilter::Unseen).unwrap();
        assert_eq!(json, "\"unseen\"");
        let back: MailboxFilter = serde_json::from_str("\"seen\"").unwrap();
        assert_eq!(back, MailboxFilter::Seen);
    }

    #[test]
    fn test_message_record_omits_empty_fields() {
        let value = serde_json::to_value(sample_message()).unwrap();
        let obj = value.as_object().unwrap();
        assert!(obj.contains_key("from"));
        assert!(obj.contains_key("body"));
        assert!(obj.contains_key("timestamp"));
        assert!(!obj.contains_key("to"));
        assert!(!obj.contains_key("cc"));
        assert!(!obj.contains_key("attachments"));
        assert!(!obj.contains_key("uid"));
    }

    #[test]
    fn test_message_record_roundtrip_drops_uid() {
        let mut message = sample_message();
        message.body = "Hello".to_string();
        message.attachments = vec![Attachment {
            filename: "a.txt".to_string(),
            content_type: "text/plain".to_string(),
            size: 5,
            file_path: None,
        }];
        let json = serde_json::to_string(&message).unwrap();
        assert!(!json.contains("file_path"));

        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.uid, 0);
        assert_eq!(back.body, "Hello");
        assert_eq!(back.attachments.len(), 1);
    }

    #[test]
    fn test_draft_recipients() {
        let draft = Draft {
            to: "a@example.com, ,b@example.com".to_string(),
            cc: " c@example.com ".to_string(),
            ..Draft::default()
        };
        assert_eq!(
            draft.recipients(),
            vec!["a@example.com", "b@example.com", "c@example.com"]
        );
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("x.PDF")), "application/pdf");
        assert_eq!(guess_content_type(Path::new("photo.jpeg")), "image/jpeg");
        assert_eq!(
            guess_content_type(Path::new("noext")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_attachment_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        let attachment = Attachment::from_path(&path).unwrap();
        assert_eq!(attachment.filename, "notes.txt");
        assert_eq!(attachment.content_type, "text/plain");
        assert_eq!(attachment.size, 5);
        assert!(attachment.is_persisted());

        assert!(Attachment::from_path(dir.path().join("missing")).is_err());
    }
}
