//! Outgoing message composition and submission.

use std::fs;

use chrono::Local;
use tinmail_mime::{AttachmentPart, ContentType, MessageBuilder};
use tinmail_smtp::{Address, Client};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::connector::{Connector, SmtpTls};
use crate::error::{Error, Result};
use crate::model::{Attachment, Draft};

/// Host name announced in EHLO.
const CLIENT_HOSTNAME: &str = "localhost";

/// Splits a comma-separated recipient list, trimming entries and dropping
/// empty ones.
#[must_use]
pub fn parse_recipients(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect()
}

/// Serializes `draft` as an RFC 5322 message from `from`.
///
/// Attachments that cannot be read are skipped with a warning. If the
/// structured builder rejects the draft, a minimal plain-text message is
/// produced instead.
#[must_use]
pub fn build_message(from: &str, draft: &Draft) -> Vec<u8> {
    let mut builder = MessageBuilder::new()
        .from(from)
        .subject(draft.subject.as_str())
        .text_body(draft.body.as_str());
    for to in parse_recipients(&draft.to) {
        builder = builder.to(to);
    }
    for cc in parse_recipients(&draft.cc) {
        builder = builder.cc(cc);
    }
    for attachment in &draft.attachments {
        if let Some(part) = attachment_part(attachment) {
            builder = builder.attach(part);
        }
    }

    match builder.build() {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "falling back to a minimal message");
            build_fallback(from, draft)
        }
    }
}

fn attachment_part(attachment: &Attachment) -> Option<AttachmentPart> {
    let Some(path) = attachment.file_path.as_deref() else {
        warn!(filename = %attachment.filename, "attachment has no file, skipping");
        return None;
    };
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read attachment, skipping");
            return None;
        }
    };
    let content_type = ContentType::parse(&attachment.content_type)
        .unwrap_or_else(|_| ContentType::octet_stream());
    let filename = if attachment.filename.is_empty() {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    } else {
        attachment.filename.clone()
    };
    Some(AttachmentPart::new(filename, content_type, data))
}

/// Hand-assembled message used when the builder fails. Attachments are
/// dropped.
fn build_fallback(from: &str, draft: &Draft) -> Vec<u8> {
    let mut message = String::new();

    message.push_str(&format!("From: {}\r\n", flatten(from)));
    message.push_str(&format!("To: {}\r\n", flatten(&draft.to)));
    if !draft.cc.trim().is_empty() {
        message.push_str(&format!("Cc: {}\r\n", flatten(&draft.cc)));
    }
    message.push_str(&format!("Subject: {}\r\n", flatten(&draft.subject)));
    message.push_str(&format!("Date: {}\r\n", Local::now().to_rfc2822()));
    message.push_str("MIME-Version: 1.0\r\n");
    message.push_str("Content-Type: text/plain; charset=UTF-8\r\n");
    message.push_str("\r\n");
    message.push_str(&draft.body);

    message.into_bytes()
}

fn flatten(value: &str) -> String {
    value.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

/// Sends drafts through an authenticated SMTP session.
#[derive(Debug)]
pub struct MessageComposer<C> {
    connector: C,
    username: String,
    password: String,
}

impl MessageComposer<SmtpTls> {
    /// Composer for the SMTP server in `server`.
    #[must_use]
    pub fn from_config(server: &ServerConfig) -> Self {
        Self::new(
            SmtpTls::from(server),
            server.user.clone(),
            server.password.clone(),
        )
    }
}

impl<C: Connector> MessageComposer<C> {
    /// Creates a composer that authenticates with the given credentials.
    #[must_use]
    pub fn new(connector: C, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            connector,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Builds `draft` and sends it from `from` to every To and Cc
    /// recipient.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecipients`] if the draft names nobody, and any
    /// connection, authentication or submission failure otherwise.
    pub async fn send(&self, from: &str, draft: &Draft) -> Result<()> {
        let recipients = draft.recipients();
        if recipients.is_empty() {
            return Err(Error::NoRecipients);
        }
        let message = build_message(from, draft);
        self.send_raw(from, &recipients, &message).await
    }

    /// Submits an already serialized message.
    ///
    /// # Errors
    ///
    /// Any failed step aborts the submission.
    pub async fn send_raw(&self, from: &str, recipients: &[String], message: &[u8]) -> Result<()> {
        if recipients.is_empty() {
            return Err(Error::NoRecipients);
        }
        let sender = Address::new(from).map_err(|e| Error::protocol("declare sender", e))?;
        let recipients = recipients
            .iter()
            .map(|r| Address::new(r).map_err(|e| Error::protocol("declare recipient", e)))
            .collect::<Result<Vec<_>>>()?;

        let stream = self.connector.connect().await?;
        let client = Client::from_stream(stream)
            .await
            .map_err(|e| Error::Connection(format!("server greeting: {e}")))?;
        let client = client
            .ehlo(CLIENT_HOSTNAME)
            .await
            .map_err(|e| Error::protocol("greet server", e))?;
        let client = client
            .auth_plain(&self.username, &self.password)
            .await
            .map_err(|e| match e {
                tinmail_smtp::Error::Reply { .. } | tinmail_smtp::Error::NotSupported(_) => {
                    Error::Auth(e.to_string())
                }
                other => Error::protocol("authenticate", other),
            })?;

        let client = client
            .mail_from(sender)
            .await
            .map_err(|e| Error::protocol("declare sender", e))?;
        let mut recipients = recipients.into_iter();
        let Some(first) = recipients.next() else {
            return Err(Error::NoRecipients);
        };
        let mut client = client
            .rcpt_to(first)
            .await
            .map_err(|e| Error::protocol("declare recipient", e))?;
        for recipient in recipients {
            client = client
                .rcpt_to(recipient)
                .await
                .map_err(|e| Error::protocol("declare recipient", e))?;
        }

        let client = client
            .data()
            .await
            .map_err(|e| Error::protocol("start message data", e))?;
        let client = client
            .send_message(message)
            .await
            .map_err(|e| Error::protocol("send message", e))?;
        debug!(bytes = message.len(), "message accepted");

        client
            .quit()
            .await
            .map_err(|e| Error::protocol("close session", e))?;
        info!(from, "message sent");
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
    use crate::attachments::AttachmentStore;
    use crate::parser::MimeParser;

    fn draft(body: &str) -> Draft {
        Draft {
            to: "bob@example.com, carol@example.com".to_string(),
            cc: "dan@example.com".to_string(),
            subject: "Hi".to_string(),
            body: body.to_string(),
            attachments: Vec::new(),
        }
    }

    fn text(message: &[u8]) -> String {
        String::from_utf8_lossy(message).into_owned()
    }

    #[test]
    fn test_parse_recipients() {
        assert_eq!(
            parse_recipients(" a@x.org,b@x.org , ,"),
            vec!["a@x.org", "b@x.org"]
        );
        assert!(parse_recipients("").is_empty());
        assert!(parse_recipients(" , ").is_empty());
    }

    #[test]
    fn test_plain_message_headers() {
        let message = text(&build_message("alice@example.com", &draft("Hello")));

        assert!(message.contains("From: alice@example.com\r\n"));
        assert!(message.contains("To: bob@example.com, carol@example.com\r\n"));
        assert!(message.contains("Cc: dan@example.com\r\n"));
        assert!(message.contains("Subject: Hi\r\n"));
        assert!(message.contains("Date: "));
        assert!(message.contains("MIME-Version: 1.0\r\n"));
        assert!(message.contains("Content-Type: text/plain; charset=UTF-8\r\n"));
        assert!(!message.contains("multipart"));
    }

    #[test]
    fn test_attachments_make_multipart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, b"some notes").unwrap();

        let mut draft = draft("See attached");
        draft.attachments.push(Attachment {
            filename: "notes.txt".to_string(),
            content_type: String::new(),
            size: 10,
            file_path: Some(path),
        });
        let message = text(&build_message("alice@example.com", &draft));

        assert!(message.contains("Content-Type: multipart/mixed;"));
        assert!(message.contains("Content-Type: application/octet-stream; name=notes.txt"));
        assert!(message.contains("Content-Disposition: attachment; filename=notes.txt"));
        assert!(message.contains("c29tZSBub3Rlcw=="));
    }

    #[test]
    fn test_unreadable_attachment_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let readable = dir.path().join("ok.pdf");
        fs::write(&readable, b"%PDF").unwrap();

        let mut draft = draft("Two files");
        draft.attachments.push(Attachment {
            filename: "missing.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            size: 0,
            file_path: Some(dir.path().join("missing.pdf")),
        });
        draft.attachments.push(Attachment {
            filename: "ok.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            size: 4,
            file_path: Some(readable),
        });
        let message = build_message("alice@example.com", &draft);

        let store = AttachmentStore::new(dir.path().join("inbound"));
        let parsed = MimeParser::new(store).parse(&message);
        assert_eq!(parsed.attachments.len(), 1);
        assert_eq!(parsed.attachments[0].filename, "ok.pdf");
        assert_eq!(parsed.plain, "Two files");
    }

    #[test]
    fn test_line_break_in_header_uses_fallback() {
        let mut draft = draft("Body text");
        draft.subject = "Line one\r\nBcc: victim@example.com".to_string();
        let message = text(&build_message("alice@example.com", &draft));

        assert!(message.contains("Subject: Line one Bcc: victim@example.com\r\n"));
        assert!(!message.contains("\r\nBcc:"));
        assert!(message.contains("Content-Type: text/plain; charset=UTF-8\r\n\r\nBody text"));
        assert!(!message.contains("Message-ID"));
    }

    #[test]
    fn test_fallback_omits_empty_cc() {
        let mut draft = draft("x");
        draft.cc = String::new();
        let message = text(&build_fallback("a@x.org", &draft));
        assert!(!message.contains("Cc:"));
        assert!(message.starts_with("From: a@x.org\r\nTo: bob@example.com, carol@example.com\r\n"));
    }
}
