//! Body and attachment extraction.
//!
//! [`MimeParser`] walks a message's part tree. Text parts meant for display
//! are collected into a plain and an HTML accumulator; attachment parts are
//! written out through an [`AttachmentStore`]. Nested multiparts are
//! followed to any depth, and a part that fails to decode is skipped
//! without affecting its siblings.

use tinmail_mime::encoding::decode_rfc2047;
use tinmail_mime::{ContentDisposition, ContentType, Message, Part};
use tracing::{debug, trace, warn};

use crate::attachments::AttachmentStore;
use crate::error::{BodyError, Error, Result};
use crate::model::{Attachment, TextFormat};

/// How a part is meant to be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartRole {
    /// Shown as part of the message body.
    Inline,
    /// Stored separately.
    Attachment,
}

impl PartRole {
    /// Classifies a part by its declared disposition.
    ///
    /// An `attachment` disposition always means a stored file. Otherwise a
    /// part is inline unless it is non-text and names a file: through the
    /// disposition `filename` when disposed inline, or through the
    /// Content-Type `name` when no disposition is given and the part is not
    /// referenced by Content-ID.
    #[must_use]
    pub fn classify(
        content_type: &ContentType,
        disposition: Option<&ContentDisposition>,
        content_id: Option<&str>,
    ) -> Self {
        let named_file = match disposition {
            Some(d) if d.is_attachment() => return Self::Attachment,
            Some(d) if d.is_inline() => d.parameters.contains_key("filename"),
            _ => content_type.name().is_some() && content_id.is_none_or(str::is_empty),
        };
        if named_file && !content_type.is_text() {
            Self::Attachment
        } else {
            Self::Inline
        }
    }
}

/// Everything collected from a part tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedParts {
    /// Concatenated `text/plain` content.
    pub plain: String,
    /// Concatenated `text/html` content.
    pub html: String,
    /// Whether any non-empty text part was seen.
    pub has_content: bool,
    /// Attachments written to the store.
    pub attachments: Vec<Attachment>,
}

impl ParsedParts {
    fn merge_nested(&mut self, nested: Self) {
        if nested.has_content {
            self.plain.push_str(&nested.plain);
            self.html.push_str(&nested.html);
            self.has_content = true;
        }
        self.attachments.extend(nested.attachments);
    }
}

/// The displayable body chosen from a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyExtraction {
    /// Body text.
    pub text: String,
    /// Which accumulator the text came from.
    pub format: TextFormat,
    /// Attachments written to the store.
    pub attachments: Vec<Attachment>,
}

/// Extracts text and attachments from raw messages.
#[derive(Debug, Clone)]
pub struct MimeParser {
    store: AttachmentStore,
}

impl MimeParser {
    /// Creates a parser that saves attachments into `store`.
    #[must_use]
    pub const fn new(store: AttachmentStore) -> Self {
        Self { store }
    }

    /// Collects text and attachments from `raw`.
    ///
    /// Input that is not a structured message at all is returned verbatim
    /// as plain text.
    #[must_use]
    pub fn parse(&self, raw: &[u8]) -> ParsedParts {
        let message = match Message::parse(raw) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "not a MIME message, using raw text");
                let text = String::from_utf8_lossy(raw).into_owned();
                return ParsedParts {
                    has_content: !text.is_empty(),
                    plain: text,
                    ..ParsedParts::default()
                };
            }
        };

        let mut parts = ParsedParts::default();
        let root = message.root();
        if content_type_of(root).is_multipart() {
            if let Err(e) = self.walk_children(root, &mut parts) {
                warn!(error = %e, "unreadable multipart message");
            }
        } else {
            self.visit(root, &mut parts);
        }

        debug!(
            plain = parts.plain.len(),
            html = parts.html.len(),
            attachments = parts.attachments.len(),
            "parsed message"
        );
        parts
    }

    /// Picks the body to display: plain text first, then HTML.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Body`] when the input is empty or no text was
    /// found. The error still carries any attachments that were saved.
    pub fn extract(&self, raw: &[u8]) -> Result<BodyExtraction> {
        if raw.is_empty() {
            return Err(Error::Body {
                error: BodyError::EmptyData,
                attachments: Vec::new(),
            });
        }

        let parts = self.parse(raw);
        let (text, format) = if !parts.plain.is_empty() {
            (parts.plain, TextFormat::Plain)
        } else if !parts.html.is_empty() {
            (parts.html, TextFormat::Html)
        } else {
            let error = if parts.has_content {
                BodyError::NotExtracted
            } else {
                BodyError::NoTextContent
            };
            return Err(Error::Body {
                error,
                attachments: parts.attachments,
            });
        };

        Ok(BodyExtraction {
            text,
            format,
            attachments: parts.attachments,
        })
    }

    fn walk_children(&self, part: &Part, acc: &mut ParsedParts) -> tinmail_mime::Result<()> {
        for child in &part.subparts()? {
            self.visit(child, acc);
        }
        Ok(())
    }

    fn visit(&self, part: &Part, acc: &mut ParsedParts) {
        let content_type = content_type_of(part);
        let disposition = part.disposition();
        let content_id = part.content_id();

        if content_type.is_multipart() {
            self.visit_nested(part, acc);
            return;
        }

        match PartRole::classify(&content_type, disposition.as_ref(), content_id) {
            PartRole::Inline if content_type.is("text", "plain") => {
                append_text(part, &mut acc.plain, &mut acc.has_content);
            }
            PartRole::Inline if content_type.is("text", "html") => {
                append_text(part, &mut acc.html, &mut acc.has_content);
            }
            PartRole::Inline => {
                trace!(content_type = %content_type.mime_type(), "discarding inline part");
            }
            PartRole::Attachment => {
                if is_inline_image(&content_type, disposition.as_ref(), content_id) {
                    trace!(content_type = %content_type.mime_type(), "discarding inline image");
                } else if let Some(attachment) = self.save_attachment(part, &content_type, disposition.as_ref()) {
                    acc.attachments.push(attachment);
                }
            }
        }
    }

    fn visit_nested(&self, part: &Part, acc: &mut ParsedParts) {
        let mut nested = ParsedParts::default();
        match self.walk_children(part, &mut nested) {
            Ok(()) => acc.merge_nested(nested),
            Err(e) => warn!(error = %e, "skipping unreadable nested multipart"),
        }
    }

    fn save_attachment(
        &self,
        part: &Part,
        content_type: &ContentType,
        disposition: Option<&ContentDisposition>,
    ) -> Option<Attachment> {
        let filename = disposition
            .and_then(ContentDisposition::filename)
            .or_else(|| content_type.name().map(decode_rfc2047));

        let data = match part.decode_body() {
            Ok(data) => data,
            Err(e) => {
                warn!(filename = ?filename, error = %e, "skipping undecodable attachment");
                return None;
            }
        };
        self.store
            .extract(filename.as_deref(), &content_type.mime_type(), &data)
    }
}

/// A part's content type; an unparsable header counts as opaque data.
fn content_type_of(part: &Part) -> ContentType {
    part.content_type().unwrap_or_else(|e| {
        warn!(error = %e, "invalid content type");
        ContentType::octet_stream()
    })
}

fn append_text(part: &Part, out: &mut String, has_content: &mut bool) {
    match part.body_text() {
        Ok(text) if !text.is_empty() => {
            out.push_str(&text);
            *has_content = true;
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "skipping undecodable text part"),
    }
}

/// Images and unnamed parts shown inline are part of the rendering, not
/// files for the user.
#[must_use]
pub fn is_inline_image(
    content_type: &ContentType,
    disposition: Option<&ContentDisposition>,
    content_id: Option<&str>,
) -> bool {
    let Some(disposition) = disposition.filter(|d| d.is_inline()) else {
        return false;
    };
    content_type.main_type == "image"
        || !disposition.parameters.contains_key("filename")
        || content_id.is_some_and(|id| !id.is_empty())
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
    use tempfile::TempDir;

    fn parser() -> (TempDir, MimeParser) {
        let dir = tempfile::tempdir().unwrap();
        let parser = MimeParser::new(AttachmentStore::new(dir.path().join("attachments")));
        (dir, parser)
    }

    fn crlf(s: &str) -> Vec<u8> {
        s.replace('\n', "\r\n").into_bytes()
    }

    const PDF_PART: &str = "--outer\n\
Content-Type: application/pdf\n\
Content-Disposition: attachment; filename=\"invoice.pdf\"\n\
Content-Transfer-Encoding: base64\n\
\n\
JVBERi0xLjQ=\n";

    #[test]
    fn test_single_plain_part() {
        let (_dir, parser) = parser();
        let raw = crlf("From: a@example.com\nSubject: x\n\nHello there");
        let body = parser.extract(&raw).unwrap();
        assert_eq!(body.text, "Hello there");
        assert_eq!(body.format, TextFormat::Plain);
        assert!(body.attachments.is_empty());
    }

    #[test]
    fn test_unstructured_input_is_returned_verbatim() {
        let (_dir, parser) = parser();
        let body = parser.extract(b"just some words").unwrap();
        assert_eq!(body.text, "just some words");
        assert_eq!(body.format, TextFormat::Plain);
    }

    #[test]
    fn test_empty_input() {
        let (_dir, parser) = parser();
        let err = parser.extract(b"").unwrap_err();
        assert!(matches!(
            err,
            Error::Body {
                error: BodyError::EmptyData,
                ..
            }
        ));
    }

    #[test]
    fn test_alternative_inside_mixed_with_attachment() {
        let (_dir, parser) = parser();
        let raw = crlf(&format!(
            "From: a@example.com\n\
Content-Type: multipart/mixed; boundary=outer\n\
\n\
--outer\n\
Content-Type: multipart/alternative; boundary=inner\n\
\n\
--inner\n\
Content-Type: text/plain; charset=utf-8\n\
\n\
Plain version\n\
--inner\n\
Content-Type: text/html; charset=utf-8\n\
\n\
<p>HTML version</p>\n\
--inner--\n\
{PDF_PART}--outer--\n"
        ));

        let body = parser.extract(&raw).unwrap();
        assert_eq!(body.text, "Plain version");
        assert_eq!(body.format, TextFormat::Plain);
        assert_eq!(body.attachments.len(), 1);

        let attachment = &body.attachments[0];
        assert_eq!(attachment.filename, "invoice.pdf");
        assert_eq!(attachment.content_type, "application/pdf");
        assert_eq!(attachment.size, 8);
        let path = attachment.file_path.as_ref().unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"%PDF-1.4");
    }

    #[test]
    fn test_deep_nesting() {
        let (_dir, parser) = parser();
        let raw = crlf(&format!(
            "From: a@example.com\n\
Content-Type: multipart/mixed; boundary=outer\n\
\n\
--outer\n\
Content-Type: multipart/related; boundary=mid\n\
\n\
--mid\n\
Content-Type: multipart/alternative; boundary=inner\n\
\n\
--inner\n\
Content-Type: text/plain\n\
\n\
Deep text\n\
--inner--\n\
--mid--\n\
{PDF_PART}--outer--\n"
        ));

        let body = parser.extract(&raw).unwrap();
        assert_eq!(body.text, "Deep text");
        assert_eq!(body.attachments.len(), 1);
    }

    #[test]
    fn test_html_only_with_inline_image() {
        let (_dir, parser) = parser();
        let raw = crlf(
            "From: a@example.com\n\
Content-Type: multipart/related; boundary=b\n\
\n\
--b\n\
Content-Type: text/html\n\
\n\
<img src=\"cid:logo\">\n\
--b\n\
Content-Type: image/png\n\
Content-Disposition: inline\n\
Content-ID: <logo>\n\
Content-Transfer-Encoding: base64\n\
\n\
iVBORw0KGgo=\n\
--b--\n",
        );

        let body = parser.extract(&raw).unwrap();
        assert_eq!(body.format, TextFormat::Html);
        assert_eq!(body.text, "<img src=\"cid:logo\">");
        assert!(body.attachments.is_empty());
    }

    #[test]
    fn test_attachment_only_keeps_attachments_on_error() {
        let (_dir, parser) = parser();
        let raw = crlf(&format!(
            "From: a@example.com\n\
Content-Type: multipart/mixed; boundary=outer\n\
\n\
{PDF_PART}--outer--\n"
        ));

        let err = parser.extract(&raw).unwrap_err();
        match err {
            Error::Body { error, attachments } => {
                assert_eq!(error, BodyError::NoTextContent);
                assert_eq!(attachments.len(), 1);
                assert_eq!(attachments[0].filename, "invoice.pdf");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_single_part_attachment_message() {
        let (_dir, parser) = parser();
        let raw = crlf(
            "From: a@example.com\n\
Content-Type: application/zip; name=\"bundle.zip\"\n\
Content-Transfer-Encoding: base64\n\
\n\
UEsDBA==\n",
        );

        let err = parser.extract(&raw).unwrap_err();
        assert_eq!(err.attachments().len(), 1);
        assert_eq!(err.attachments()[0].filename, "bundle.zip");
    }

    #[test]
    fn test_same_filename_twice() {
        let (dir, parser) = parser();
        let raw = crlf(&format!(
            "From: a@example.com\n\
Content-Type: multipart/mixed; boundary=outer\n\
\n\
--outer\n\
Content-Type: text/plain\n\
\n\
See attached\n\
{PDF_PART}{PDF_PART}--outer--\n"
        ));

        let body = parser.extract(&raw).unwrap();
        let names: Vec<_> = body
            .attachments
            .iter()
            .map(|a| a.file_path.as_ref().unwrap().file_name().unwrap().to_owned())
            .collect();
        assert_eq!(names, vec!["invoice.pdf", "invoice_1.pdf"]);
        assert!(body.attachments.iter().all(|a| a.filename == "invoice.pdf"));
        assert!(dir.path().join("attachments/invoice.pdf").is_file());
    }

    #[test]
    fn test_hostile_filename_stays_in_store() {
        let (dir, parser) = parser();
        let raw = crlf(
            "From: a@example.com\n\
Content-Type: multipart/mixed; boundary=outer\n\
\n\
--outer\n\
Content-Type: text/plain\n\
\n\
x\n\
--outer\n\
Content-Type: application/octet-stream\n\
Content-Disposition: attachment; filename=\"../../etc/passwd\"\n\
\n\
root\n\
--outer--\n",
        );

        let body = parser.extract(&raw).unwrap();
        let path = body.attachments[0].file_path.as_ref().unwrap();
        assert_eq!(path.parent().unwrap(), dir.path().join("attachments"));
        assert_eq!(body.attachments[0].filename, "../../etc/passwd");
    }

    #[test]
    fn test_broken_parts_do_not_abort_siblings() {
        let (_dir, parser) = parser();
        let raw = crlf(&format!(
            "From: a@example.com\n\
Content-Type: multipart/mixed; boundary=outer\n\
\n\
--outer\n\
Content-Type: multipart/alternative\n\
\n\
no boundary here\n\
--outer\n\
Content-Type: text/plain\n\
Content-Transfer-Encoding: base64\n\
\n\
@@not base64@@\n\
--outer\n\
Content-Type: text/plain\n\
\n\
Survivor\n\
{PDF_PART}--outer--\n"
        ));

        let body = parser.extract(&raw).unwrap();
        assert_eq!(body.text, "Survivor");
        assert_eq!(body.attachments.len(), 1);
    }

    #[test]
    fn test_inline_unnamed_non_text_is_discarded() {
        let (_dir, parser) = parser();
        let raw = crlf(
            "From: a@example.com\n\
Content-Type: multipart/mixed; boundary=b\n\
\n\
--b\n\
Content-Type: text/plain\n\
\n\
Body\n\
--b\n\
Content-Type: application/pdf\n\
Content-Disposition: inline\n\
\n\
data\n\
--b--\n",
        );

        let body = parser.extract(&raw).unwrap();
        assert_eq!(body.text, "Body");
        assert!(body.attachments.is_empty());
    }

    #[test]
    fn test_inline_named_file_is_saved_but_named_image_is_not() {
        let (_dir, parser) = parser();
        let raw = crlf(
            "From: a@example.com\n\
Content-Type: multipart/mixed; boundary=b\n\
\n\
--b\n\
Content-Type: text/plain\n\
\n\
Body\n\
--b\n\
Content-Type: application/pdf\n\
Content-Disposition: inline; filename=\"shown.pdf\"\n\
\n\
data\n\
--b\n\
Content-Type: image/png\n\
Content-Disposition: inline; filename=\"logo.png\"\n\
Content-Transfer-Encoding: base64\n\
\n\
iVBORw0KGgo=\n\
--b\n\
Content-Type: application/pdf\n\
Content-Disposition: inline; filename=\"embedded.pdf\"\n\
Content-ID: <doc1>\n\
\n\
data\n\
--b--\n",
        );

        let body = parser.extract(&raw).unwrap();
        assert_eq!(body.attachments.len(), 1);
        assert_eq!(body.attachments[0].filename, "shown.pdf");
        assert_eq!(body.attachments[0].content_type, "application/pdf");
    }

    #[test]
    fn test_related_image_without_disposition_is_not_saved() {
        let (dir, parser) = parser();
        let raw = crlf(
            "From: a@example.com\n\
Content-Type: multipart/related; boundary=b\n\
\n\
--b\n\
Content-Type: text/html\n\
\n\
<img src=\"cid:image001\">\n\
--b\n\
Content-Type: image/png; name=\"image001.png\"\n\
Content-ID: <image001>\n\
Content-Transfer-Encoding: base64\n\
\n\
iVBORw0KGgo=\n\
--b--\n",
        );

        let body = parser.extract(&raw).unwrap();
        assert_eq!(body.format, TextFormat::Html);
        assert!(body.attachments.is_empty());
        assert!(!dir.path().join("attachments").exists());
    }

    #[test]
    fn test_forwarded_message_without_disposition_is_not_saved() {
        let (_dir, parser) = parser();
        let raw = crlf(
            "From: a@example.com\n\
Content-Type: multipart/mixed; boundary=b\n\
\n\
--b\n\
Content-Type: text/plain\n\
\n\
See below\n\
--b\n\
Content-Type: message/rfc822\n\
\n\
From: c@example.com\n\
Subject: original\n\
\n\
Forwarded text\n\
--b--\n",
        );

        let body = parser.extract(&raw).unwrap();
        assert_eq!(body.text, "See below");
        assert!(body.attachments.is_empty());
    }

    #[test]
    fn test_charset_and_quoted_printable() {
        let (_dir, parser) = parser();
        let mut raw = crlf(
            "From: a@example.com\n\
Content-Type: text/plain; charset=iso-8859-1\n\
\n\
caf",
        );
        raw.push(0xE9);
        assert_eq!(parser.extract(&raw).unwrap().text, "café");

        let raw = crlf(
            "From: a@example.com\n\
Content-Type: text/plain; charset=utf-8\n\
Content-Transfer-Encoding: quoted-printable\n\
\n\
caf=C3=A9",
        );
        assert_eq!(parser.extract(&raw).unwrap().text, "café");
    }

    #[test]
    fn test_classify() {
        let text = ContentType::new("text", "plain");
        let pdf = ContentType::new("application", "pdf");
        let named_pdf = ContentType::parse("application/pdf; name=a.pdf").unwrap();
        let attachment = ContentDisposition::parse("attachment; filename=a.txt");
        let inline = ContentDisposition::parse("inline");
        let inline_named = ContentDisposition::parse("inline; filename=a.pdf");

        assert_eq!(PartRole::classify(&text, None, None), PartRole::Inline);
        assert_eq!(
            PartRole::classify(&text, Some(&attachment), None),
            PartRole::Attachment
        );
        assert_eq!(PartRole::classify(&pdf, None, None), PartRole::Inline);
        assert_eq!(PartRole::classify(&named_pdf, None, None), PartRole::Attachment);
        assert_eq!(PartRole::classify(&named_pdf, None, Some("x1")), PartRole::Inline);
        assert_eq!(PartRole::classify(&named_pdf, None, Some("")), PartRole::Attachment);
        assert_eq!(PartRole::classify(&pdf, Some(&inline), None), PartRole::Inline);
        assert_eq!(
            PartRole::classify(&pdf, Some(&inline_named), None),
            PartRole::Attachment
        );
        assert_eq!(PartRole::classify(&text, Some(&inline_named), None), PartRole::Inline);
    }

    #[test]
    fn test_inline_image_heuristic() {
        let png = ContentType::new("image", "png");
        let pdf = ContentType::new("application", "pdf");
        let inline = ContentDisposition::parse("inline");
        let inline_named = ContentDisposition::parse("inline; filename=doc.pdf");
        let attachment = ContentDisposition::parse("attachment; filename=logo.png");

        assert!(is_inline_image(&png, Some(&inline), None));
        assert!(is_inline_image(&pdf, Some(&inline), None));
        assert!(!is_inline_image(&pdf, Some(&inline_named), None));
        assert!(is_inline_image(&pdf, Some(&inline_named), Some("part1")));
        assert!(!is_inline_image(&pdf, Some(&inline_named), Some("")));
        assert!(!is_inline_image(&png, Some(&attachment), Some("logo")));
        assert!(!is_inline_image(&png, None, None));
    }
}
