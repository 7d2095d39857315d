//! SMTP reply parser.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Parses a reply from its lines (CRLF already stripped).
///
/// - Single: `250 OK`
/// - Multi: `250-First`, `250-Second`, `250 Last`
///
/// Every line must carry the same code.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if the reply is malformed.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let first = lines
        .first()
        .ok_or_else(|| Error::Protocol("empty reply".into()))?;
    let code = parse_code(first)?;

    let mut text = Vec::with_capacity(lines.len());
    for line in lines {
        if parse_code(line)? != code {
            return Err(Error::Protocol(format!("inconsistent reply code: {line}")));
        }
        text.push(line.get(4..).unwrap_or_default().to_string());
    }

    Ok(Reply::new(ReplyCode::new(code), text))
}

fn parse_code(line: &str) -> Result<u16> {
    let digits = line
        .get(..3)
        .filter(|d| d.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| Error::Protocol(format!("invalid reply line: {line:?}")))?;

    match line.as_bytes().get(3) {
        None | Some(b' ' | b'-') => digits
            .parse()
            .map_err(|_| Error::Protocol(format!("invalid reply code: {digits}"))),
        Some(_) => Err(Error::Protocol(format!("invalid reply line: {line:?}"))),
    }
}

/// Returns true if `line` ends a reply (`250 ...` or a bare `250`).
#[must_use]
pub fn is_last_reply_line(line: &str) -> bool {
    line.as_bytes().get(3) != Some(&b'-')
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn lines(input: &[&str]) -> Vec<String> {
        input.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_single_line_reply() {
        let reply = parse_reply(&lines(&["250 OK"])).unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert_eq!(reply.lines, vec!["OK"]);
    }

    #[test]
    fn test_multi_line_reply() {
        let reply =
            parse_reply(&lines(&["250-mail.example.com", "250-PIPELINING", "250 AUTH PLAIN"]))
                .unwrap();
        assert_eq!(reply.lines, vec!["mail.example.com", "PIPELINING", "AUTH PLAIN"]);
    }

    #[test]
    fn test_bare_code() {
        let reply = parse_reply(&lines(&["354"])).unwrap();
        assert_eq!(reply.code, ReplyCode::START_DATA);
        assert_eq!(reply.lines, vec![""]);
    }

    #[test]
    fn test_is_last_reply_line() {
        assert!(is_last_reply_line("250 OK"));
        assert!(is_last_reply_line("250"));
        assert!(!is_last_reply_line("250-Continuing"));
    }

    #[test]
    fn test_malformed_replies() {
        assert!(parse_reply(&[]).is_err());
        assert!(parse_reply(&lines(&["25"])).is_err());
        assert!(parse_reply(&lines(&["ABC OK"])).is_err());
        assert!(parse_reply(&lines(&["250xOK"])).is_err());
        assert!(parse_reply(&lines(&["250-a", "251 b"])).is_err());
    }
}
