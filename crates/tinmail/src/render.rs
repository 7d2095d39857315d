//! Plain-text rendering for terminal output.

use std::fmt::Write as _;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use tinmail_core::{Attachment, BodyExtraction, Message, TextFormat};

const FROM_WIDTH: usize = 28;
const SUBJECT_WIDTH: usize = 60;

/// One listed message with the UID needed to open it later.
#[derive(Serialize)]
pub struct ListEntry<'a> {
    pub uid: u32,
    #[serde(flatten)]
    pub message: &'a Message,
}

/// Human-readable byte count: `512 B`, `1.5 KB`, `3.2 MB`.
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    const SUFFIXES: [&str; 5] = ["KB", "MB", "GB", "TB", "PB"];

    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / UNIT as f64;
    let mut suffix = 0;
    while value >= UNIT as f64 && suffix < SUFFIXES.len() - 1 {
        value /= UNIT as f64;
        suffix += 1;
    }
    format!("{value:.1} {}", SUFFIXES[suffix])
}

/// Cuts `text` to at most `width` characters, marking the cut with `…`.
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// Short local date for list rows; the raw header when it did not parse.
fn list_date(message: &Message) -> String {
    if message.timestamp == DateTime::<Utc>::default() {
        return truncate(&message.date, 16);
    }
    message
        .timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

/// Table of envelopes, one per line.
pub fn message_table(messages: &[Message]) -> String {
    let mut out = String::new();
    for message in messages {
        let _ = writeln!(
            out,
            "{:>7}  {:<16}  {:<fw$}  {}",
            message.uid,
            list_date(message),
            truncate(&message.from, FROM_WIDTH),
            truncate(&message.subject, SUBJECT_WIDTH),
            fw = FROM_WIDTH,
        );
    }
    out
}

/// Body text ready for the terminal. HTML is converted to Markdown.
pub fn body_text(body: &BodyExtraction) -> String {
    match body.format {
        TextFormat::Plain => body.text.clone(),
        TextFormat::Html => html_to_text(&body.text),
    }
}

fn html_to_text(html: &str) -> String {
    match htmd::convert(html) {
        Ok(markdown) => markdown,
        Err(e) => {
            tracing::warn!(error = %e, "HTML conversion failed, showing source");
            html.to_string()
        }
    }
}

/// Numbered attachment lines with size and stored path.
pub fn attachment_list(attachments: &[Attachment]) -> String {
    let mut out = String::new();
    for (i, attachment) in attachments.iter().enumerate() {
        let _ = write!(
            out,
            "[{}] {} ({}, {})",
            i + 1,
            attachment.filename,
            attachment.content_type,
            format_size(attachment.size)
        );
        if let Some(path) = &attachment.file_path {
            let _ = write!(out, " -> {}", path.display());
        }
        out.push('\n');
    }
    out
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
    use std::path::PathBuf;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
        assert_eq!(truncate("a longer subject", 8), "a longe…");
        assert_eq!(truncate("héllo wörld", 6), "héllo…");
    }

    #[test]
    fn test_list_entry_json_includes_uid() {
        let message = Message {
            uid: 42,
            from: "alice@example.com".to_string(),
            subject: "Hi".to_string(),
            ..Message::default()
        };
        let entry = ListEntry {
            uid: message.uid,
            message: &message,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["uid"], 42);
        assert_eq!(json["from"], "alice@example.com");
        assert_eq!(json["subject"], "Hi");
        assert!(json.get("attachments").is_none());
    }

    #[test]
    fn test_unparsed_date_shows_raw_text() {
        let message = Message {
            uid: 7,
            date: "yesterday".to_string(),
            from: "bob@example.com".to_string(),
            subject: "Lunch".to_string(),
            ..Message::default()
        };
        let table = message_table(&[message]);
        assert!(table.starts_with("      7  yesterday"));
        assert!(table.trim_end().ends_with("Lunch"));
    }

    #[test]
    fn test_html_body_is_converted() {
        let body = BodyExtraction {
            text: "<p>Hello <b>there</b></p>".to_string(),
            format: TextFormat::Html,
            attachments: Vec::new(),
        };
        let text = body_text(&body);
        assert!(text.contains("Hello **there**"));
        assert!(!text.contains("<p>"));
    }

    #[test]
    fn test_attachment_list() {
        let attachments = vec![
            Attachment {
                filename: "invoice.pdf".to_string(),
                content_type: "application/pdf".to_string(),
                size: 2048,
                file_path: Some(PathBuf::from("/tmp/invoice.pdf")),
            },
            Attachment {
                filename: "notes.txt".to_string(),
                content_type: "text/plain".to_string(),
                size: 12,
                file_path: None,
            },
        ];
        assert_eq!(
            attachment_list(&attachments),
            "[1] invoice.pdf (application/pdf, 2.0 KB) -> /tmp/invoice.pdf\n\
             [2] notes.txt (text/plain, 12 B)\n"
        );
    }
}
