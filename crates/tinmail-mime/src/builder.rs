//! Composition of outgoing messages.

use crate::content_type::ContentType;
use crate::disposition::ContentDisposition;
use crate::encoding::{encode_base64_wrapped, encode_quoted_printable, encode_rfc2047};
use crate::error::{Error, Result};
use crate::header::Headers;
use chrono::{DateTime, FixedOffset, Local};
use rand::Rng;
use rand::distributions::Alphanumeric;

/// A file attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPart {
    /// Name shown to the recipient.
    pub filename: String,
    /// Declared content type.
    pub content_type: ContentType,
    /// Raw file contents.
    pub data: Vec<u8>,
}

impl AttachmentPart {
    /// Creates an attachment part.
    #[must_use]
    pub fn new(filename: impl Into<String>, content_type: ContentType, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            data,
        }
    }
}

/// Builds RFC 5322 messages with a plain-text body and optional
/// attachments.
///
/// Without attachments the message is a single `text/plain; charset=UTF-8`
/// part. With attachments it becomes `multipart/mixed` with the text part
/// first.
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<String>,
    to: Vec<String>,
    cc: Vec<String>,
    subject: String,
    date: Option<DateTime<FixedOffset>>,
    message_id: Option<String>,
    text: String,
    attachments: Vec<AttachmentPart>,
    boundary: Option<String>,
}

impl MessageBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sender address.
    #[must_use]
    pub fn from(mut self, address: impl Into<String>) -> Self {
        self.from = Some(address.into());
        self
    }

    /// Adds a To recipient.
    #[must_use]
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    /// Adds a Cc recipient.
    #[must_use]
    pub fn cc(mut self, address: impl Into<String>) -> Self {
        self.cc.push(address.into());
        self
    }

    /// Sets the subject. Non-ASCII text is RFC 2047 encoded on build.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the Date header; defaults to the current local time.
    #[must_use]
    pub fn date(mut self, date: impl Into<DateTime<FixedOffset>>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// Sets the Message-ID, including angle brackets.
    #[must_use]
    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Sets the plain-text body.
    #[must_use]
    pub fn text_body(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Adds an attachment.
    #[must_use]
    pub fn attach(mut self, attachment: AttachmentPart) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Overrides the generated multipart boundary.
    #[must_use]
    pub fn boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = Some(boundary.into());
        self
    }

    /// Serializes the message with CRLF line endings.
    ///
    /// # Errors
    ///
    /// Returns an error if From is missing or any header value (including
    /// attachment filenames) contains a line break.
    pub fn build(self) -> Result<Vec<u8>> {
        let from = self
            .from
            .ok_or_else(|| Error::MissingHeader("From".to_string()))?;

        let mut headers = Headers::new();
        headers.add("From", checked(&from)?);
        if !self.to.is_empty() {
            headers.add("To", checked(&self.to.join(", "))?);
        }
        if !self.cc.is_empty() {
            headers.add("Cc", checked(&self.cc.join(", "))?);
        }
        headers.add("Subject", encode_rfc2047(checked(&self.subject)?, "UTF-8"));
        let date = self.date.unwrap_or_else(|| Local::now().into());
        headers.add("Date", date.to_rfc2822());
        let message_id = match self.message_id {
            Some(id) => checked(&id)?.to_string(),
            None => generate_message_id(&from),
        };
        headers.add("Message-ID", message_id);
        headers.add("MIME-Version", "1.0");

        let text = encode_quoted_printable(&self.text);

        if self.attachments.is_empty() {
            headers.add("Content-Type", ContentType::text_plain().to_string());
            headers.add("Content-Transfer-Encoding", "quoted-printable");
            let mut out = headers.to_string();
            out.push_str("\r\n");
            out.push_str(&text);
            return Ok(out.into_bytes());
        }

        let boundary = self.boundary.unwrap_or_else(generate_boundary);
        headers.add(
            "Content-Type",
            ContentType::multipart_mixed(checked(&boundary)?).to_string(),
        );

        let mut out = headers.to_string();
        out.push_str("\r\nThis is a multi-part message in MIME format.\r\n");

        out.push_str(&format!("--{boundary}\r\n"));
        out.push_str(&format!("Content-Type: {}\r\n", ContentType::text_plain()));
        out.push_str("Content-Transfer-Encoding: quoted-printable\r\n\r\n");
        out.push_str(&text);
        out.push_str("\r\n");

        for attachment in &self.attachments {
            let filename = encode_rfc2047(checked(&attachment.filename)?, "UTF-8");
            let content_type = attachment
                .content_type
                .clone()
                .with_parameter("name", filename.clone());
            out.push_str(&format!("--{boundary}\r\n"));
            out.push_str(&format!("Content-Type: {content_type}\r\n"));
            out.push_str(&format!(
                "Content-Disposition: {}\r\n",
                ContentDisposition::attachment(filename)
            ));
            out.push_str("Content-Transfer-Encoding: base64\r\n\r\n");
            out.push_str(&encode_base64_wrapped(&attachment.data));
            out.push_str("\r\n");
        }

        out.push_str(&format!("--{boundary}--\r\n"));
        Ok(out.into_bytes())
    }
}

/// Rejects values that would inject extra header lines.
fn checked(value: &str) -> Result<&str> {
    if value.contains(['\r', '\n']) {
        return Err(Error::InvalidHeader(format!(
            "line break in header value: {value:?}"
        )));
    }
    Ok(value)
}

fn random_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generates a fresh multipart boundary.
#[must_use]
pub fn generate_boundary() -> String {
    format!("=_tinmail_{}", random_token(24))
}

/// Generates a Message-ID using the domain of the sender address.
#[must_use]
pub fn generate_message_id(from: &str) -> String {
    let domain = from
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim_end_matches('>').trim())
        .filter(|domain| !domain.is_empty())
        .unwrap_or("localhost");
    format!("<{}@{domain}>", random_token(20))
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
    use crate::message::Message;

    #[test]
    fn test_build_single_part() {
        let raw = MessageBuilder::new()
            .from("alice@example.com")
            .to("bob@example.com")
            .subject("Hello")
            .text_body("Hello")
            .build()
            .unwrap();

        let message = Message::parse(&raw).unwrap();
        assert_eq!(message.from(), Some("alice@example.com"));
        assert_eq!(message.to(), Some("bob@example.com"));
        assert_eq!(message.headers().get("Cc"), None);
        assert_eq!(message.headers().get("MIME-Version"), Some("1.0"));
        assert!(message.content_type().unwrap().is("text", "plain"));
        assert_eq!(message.root().body_text().unwrap(), "Hello");
    }

    #[test]
    fn test_build_multipart() {
        let raw = MessageBuilder::new()
            .from("Alice <alice@example.com>")
            .to("bob@example.com")
            .cc("carol@example.com")
            .cc("dave@example.com")
            .subject("Report")
            .text_body("See attached.\nThanks")
            .attach(AttachmentPart::new(
                "report.pdf",
                ContentType::new("application", "pdf"),
                vec![1, 2, 3, 4],
            ))
            .boundary("BOUNDARY")
            .build()
            .unwrap();

        let message = Message::parse(&raw).unwrap();
        assert_eq!(
            message.headers().get("Cc"),
            Some("carol@example.com, dave@example.com")
        );
        assert_eq!(message.content_type().unwrap().boundary(), Some("BOUNDARY"));

        let parts = message.parts().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].body_text().unwrap(), "See attached.\r\nThanks");
        let disposition = parts[1].disposition().unwrap();
        assert!(disposition.is_attachment());
        assert_eq!(disposition.filename().as_deref(), Some("report.pdf"));
        assert_eq!(parts[1].decode_body().unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_build_encodes_subject_and_filename() {
        let raw = MessageBuilder::new()
            .from("alice@example.com")
            .subject("Résumé")
            .attach(AttachmentPart::new(
                "résumé.txt",
                ContentType::new("text", "plain"),
                b"cv".to_vec(),
            ))
            .build()
            .unwrap();

        let message = Message::parse(&raw).unwrap();
        let subject = message.subject().unwrap();
        assert!(subject.starts_with("=?UTF-8?B?"));
        assert_eq!(Headers::decode_value(subject), "Résumé");

        let parts = message.parts().unwrap();
        assert_eq!(
            parts[1].disposition().unwrap().filename().as_deref(),
            Some("résumé.txt")
        );
    }

    #[test]
    fn test_build_rejects_header_injection() {
        let result = MessageBuilder::new()
            .from("alice@example.com")
            .subject("Hi\r\nBcc: eve@example.com")
            .build();
        assert!(matches!(result, Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_build_requires_from() {
        let result = MessageBuilder::new().text_body("x").build();
        assert!(matches!(result, Err(Error::MissingHeader(_))));
    }

    #[test]
    fn test_generate_message_id() {
        let id = generate_message_id("Alice <alice@example.com>");
        assert!(id.starts_with('<'));
        assert!(id.ends_with("@example.com>"));
        assert!(generate_message_id("nobody").ends_with("@localhost>"));
    }

    #[test]
    fn test_generate_boundary_unique() {
        assert_ne!(generate_boundary(), generate_boundary());
    }
}
