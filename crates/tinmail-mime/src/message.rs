//! MIME message structure and handling.

use crate::content_type::ContentType;
use crate::disposition::ContentDisposition;
use crate::encoding::{decode_base64, decode_charset, decode_quoted_printable};
use crate::error::{Error, Result};
use crate::header::Headers;
use std::fmt;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    #[default]
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// MIME body part: a header block and its still-encoded body.
///
/// Multipart bodies are split on demand with [`Part::subparts`], so a tree
/// is only materialized as deep as a caller walks it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Part body (raw, transfer-encoded bytes).
    pub body: Vec<u8>,
}

impl Part {
    /// Creates a new part.
    #[must_use]
    pub const fn new(headers: Headers, body: Vec<u8>) -> Self {
        Self { headers, body }
    }

    /// Parses a body part. Malformed header lines are skipped; a part
    /// that does not start with a header block is all body.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        match split_header_body(raw) {
            Some((head, body)) => Self {
                headers: Headers::parse_lossy(&String::from_utf8_lossy(head)),
                body: body.to_vec(),
            },
            None => {
                let text = String::from_utf8_lossy(raw);
                match Headers::parse(&text) {
                    Ok(headers) if !headers.is_empty() => Self::new(headers, Vec::new()),
                    _ => Self::new(Headers::new(), raw.to_vec()),
                }
            }
        }
    }

    /// Gets the content type, `text/plain` when absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.headers
            .get("content-type")
            .map_or_else(|| Ok(ContentType::default_text()), ContentType::parse)
    }

    /// Gets the parsed Content-Disposition header, if any.
    #[must_use]
    pub fn disposition(&self) -> Option<ContentDisposition> {
        self.headers
            .get("content-disposition")
            .map(ContentDisposition::parse)
    }

    /// Gets the Content-ID header without surrounding angle brackets.
    #[must_use]
    pub fn content_id(&self) -> Option<&str> {
        self.headers
            .get("content-id")
            .map(|id| id.trim().trim_start_matches('<').trim_end_matches('>'))
            .filter(|id| !id.is_empty())
    }

    /// Gets the transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Decodes the body according to the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if a base64 body is malformed.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        match self.transfer_encoding() {
            TransferEncoding::Base64 => decode_base64(&String::from_utf8_lossy(&self.body)),
            TransferEncoding::QuotedPrintable => Ok(decode_quoted_printable(&self.body)),
            _ => Ok(self.body.clone()),
        }
    }

    /// Gets the decoded body as text in its declared charset.
    ///
    /// # Errors
    ///
    /// Returns an error if transfer decoding fails.
    pub fn body_text(&self) -> Result<String> {
        let decoded = self.decode_body()?;
        let content_type = self.content_type().ok();
        Ok(decode_charset(
            &decoded,
            content_type.as_ref().and_then(ContentType::charset),
        ))
    }

    /// Splits a multipart body into its direct children.
    ///
    /// # Errors
    ///
    /// Returns an error if this part is not multipart, has no boundary,
    /// or the body contains no delimited parts.
    pub fn subparts(&self) -> Result<Vec<Self>> {
        let content_type = self.content_type()?;
        if !content_type.is_multipart() {
            return Err(Error::InvalidMultipart(format!(
                "{} is not multipart",
                content_type.mime_type()
            )));
        }
        let boundary = content_type
            .boundary()
            .filter(|b| !b.is_empty())
            .ok_or(Error::MissingBoundary)?;
        split_multipart(&self.body, boundary)
    }
}

/// Top-level MIME message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    root: Part,
}

impl Message {
    /// Parses a complete message.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty or does not start with a
    /// valid header block.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Err(Error::Parse("empty message".to_string()));
        }

        let (head, body) = split_header_body(raw).unwrap_or((raw, &[]));
        let headers = Headers::parse(&String::from_utf8_lossy(head))?;
        if headers.is_empty() {
            return Err(Error::Parse("missing header block".to_string()));
        }

        Ok(Self {
            root: Part::new(headers, body.to_vec()),
        })
    }

    /// The message as a body part.
    #[must_use]
    pub const fn root(&self) -> &Part {
        &self.root
    }

    /// Message headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.root.headers
    }

    /// Gets the content type.
    ///
    /// # Errors
    ///
    /// Returns an error if content type header is invalid.
    pub fn content_type(&self) -> Result<ContentType> {
        self.root.content_type()
    }

    /// Top-level parts of a multipart message.
    ///
    /// # Errors
    ///
    /// See [`Part::subparts`].
    pub fn parts(&self) -> Result<Vec<Part>> {
        self.root.subparts()
    }

    /// Gets the From header.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.headers().get("from")
    }

    /// Gets the To header.
    #[must_use]
    pub fn to(&self) -> Option<&str> {
        self.headers().get("to")
    }

    /// Gets the Subject header, still RFC 2047 encoded.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.headers().get("subject")
    }

    /// Gets the Date header.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.headers().get("date")
    }

    /// Gets the Message-ID header.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.headers().get("message-id")
    }
}

/// Splits raw bytes at the first empty line. Returns `None` if there is
/// no empty line.
fn split_header_body(raw: &[u8]) -> Option<(&[u8], &[u8])> {
    if let Some(rest) = raw.strip_prefix(b"\r\n") {
        return Some((&[], rest));
    }
    if let Some(rest) = raw.strip_prefix(b"\n") {
        return Some((&[], rest));
    }

    let mut i = 0;
    while let Some(offset) = raw[i..].iter().position(|b| *b == b'\n') {
        let next = i + offset + 1;
        match &raw[next..] {
            [b'\r', b'\n', ..] => return Some((&raw[..next], &raw[next + 2..])),
            [b'\n', ..] => return Some((&raw[..next], &raw[next + 1..])),
            _ => i = next,
        }
    }
    None
}

/// Splits a multipart body on `--boundary` lines.
///
/// The line break before a delimiter belongs to the delimiter. The
/// preamble and epilogue are ignored. A missing closing delimiter is
/// tolerated: the last part then runs to the end of the body.
fn split_multipart(body: &[u8], boundary: &str) -> Result<Vec<Part>> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut parts = Vec::new();
    let mut part_start: Option<usize> = None;
    let mut line_start = 0;

    while line_start < body.len() {
        let line_end = body[line_start..]
            .iter()
            .position(|b| *b == b'\n')
            .map_or(body.len(), |p| line_start + p);
        let next = (line_end + 1).min(body.len());
        let line = body[line_start..line_end].trim_ascii_end();

        if let Some(rest) = line.strip_prefix(delimiter) {
            let closing = rest == b"--";
            if rest.is_empty() || closing {
                if let Some(start) = part_start.take() {
                    let end = strip_trailing_line_break(body, start, line_start);
                    parts.push(Part::parse(&body[start..end]));
                }
                if closing {
                    break;
                }
                part_start = Some(next);
            }
        }

        line_start = next;
    }

    if let Some(start) = part_start {
        parts.push(Part::parse(&body[start..]));
    }

    if parts.is_empty() {
        return Err(Error::InvalidMultipart(format!(
            "no parts delimited by boundary {boundary:?}"
        )));
    }
    Ok(parts)
}

fn strip_trailing_line_break(body: &[u8], start: usize, mut end: usize) -> usize {
    if end > start && body[end - 1] == b'\n' {
        end -= 1;
        if end > start && body[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
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

    const NESTED: &str = concat!(
        "From: alice@example.com\r\n",
        "Subject: Nested\r\n",
        "MIME-Version: 1.0\r\n",
        "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
        "\r\n",
        "This is a preamble.\r\n",
        "--outer\r\n",
        "Content-Type: multipart/alternative; boundary=\"inner\"\r\n",
        "\r\n",
        "--inner\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "\r\n",
        "plain text\r\n",
        "--inner\r\n",
        "Content-Type: text/html; charset=utf-8\r\n",
        "\r\n",
        "<p>html</p>\r\n",
        "--inner--\r\n",
        "--outer\r\n",
        "Content-Type: application/pdf\r\n",
        "Content-Disposition: attachment; filename=\"a.pdf\"\r\n",
        "Content-Transfer-Encoding: base64\r\n",
        "\r\n",
        "JVBERi0=\r\n",
        "--outer--\r\n",
        "epilogue\r\n"
    );

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse(" BASE64 "), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(TransferEncoding::parse("x-unknown"), TransferEncoding::SevenBit);
    }

    #[test]
    fn test_parse_single_part() {
        let raw = b"From: a@example.com\r\nSubject: Hi\r\n\r\nHello, World!";
        let message = Message::parse(raw).unwrap();
        assert_eq!(message.from(), Some("a@example.com"));
        assert_eq!(message.subject(), Some("Hi"));
        assert_eq!(message.root().body_text().unwrap(), "Hello, World!");
        assert!(message.content_type().unwrap().is("text", "plain"));
    }

    #[test]
    fn test_parse_lf_only() {
        let raw = b"Subject: Unix\n\nline one\nline two\n";
        let message = Message::parse(raw).unwrap();
        assert_eq!(message.root().body, b"line one\nline two\n");
    }

    #[test]
    fn test_parse_rejects_empty_and_garbage() {
        assert!(Message::parse(b"").is_err());
        assert!(Message::parse(b"  \r\n").is_err());
        assert!(Message::parse(b"just some words\r\nand more").is_err());
    }

    #[test]
    fn test_nested_multipart() {
        let message = Message::parse(NESTED.as_bytes()).unwrap();
        let parts = message.parts().unwrap();
        assert_eq!(parts.len(), 2);

        let alternatives = parts[0].subparts().unwrap();
        assert_eq!(alternatives.len(), 2);
        assert_eq!(alternatives[0].body_text().unwrap(), "plain text");
        assert_eq!(alternatives[1].body_text().unwrap(), "<p>html</p>");

        let pdf = &parts[1];
        assert!(pdf.disposition().unwrap().is_attachment());
        assert_eq!(pdf.decode_body().unwrap(), b"%PDF-");
    }

    #[test]
    fn test_missing_close_delimiter() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "\r\n",
            "first\r\n",
            "--b\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "second\r\n"
        );
        let parts = Message::parse(raw.as_bytes()).unwrap().parts().unwrap();
        assert_eq!(parts.len(), 2);
        assert!(parts[0].headers.is_empty());
        assert_eq!(parts[0].body, b"first");
        assert_eq!(parts[1].body, b"second\r\n");
    }

    #[test]
    fn test_boundary_prefix_is_not_delimiter() {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=b\r\n",
            "\r\n",
            "--b\r\n",
            "\r\n",
            "--bx is text\r\n",
            "--b--\r\n"
        );
        let parts = Message::parse(raw.as_bytes()).unwrap().parts().unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].body, b"--bx is text");
    }

    #[test]
    fn test_subparts_errors() {
        let no_boundary = Message::parse(b"Content-Type: multipart/mixed\r\n\r\nbody").unwrap();
        assert!(matches!(no_boundary.parts(), Err(Error::MissingBoundary)));

        let no_parts =
            Message::parse(b"Content-Type: multipart/mixed; boundary=z\r\n\r\nbody").unwrap();
        assert!(matches!(no_parts.parts(), Err(Error::InvalidMultipart(_))));

        let not_multipart = Message::parse(b"Subject: x\r\n\r\nbody").unwrap();
        assert!(not_multipart.parts().is_err());
    }

    #[test]
    fn test_part_charset_and_qp() {
        let raw = b"Content-Type: text/plain; charset=iso-8859-1\r\nContent-Transfer-Encoding: quoted-printable\r\n\r\ncaf=E9";
        let part = Part::parse(raw);
        assert_eq!(part.body_text().unwrap(), "café");
    }

    #[test]
    fn test_part_without_headers_is_body() {
        let part = Part::parse(b"no headers here");
        assert!(part.headers.is_empty());
        assert_eq!(part.body, b"no headers here");
    }

    #[test]
    fn test_content_id() {
        let part = Part::parse(b"Content-ID: <logo@example>\r\n\r\n");
        assert_eq!(part.content_id(), Some("logo@example"));
        let blank = Part::parse(b"Content-ID: <>\r\n\r\n");
        assert_eq!(blank.content_id(), None);
    }
}
