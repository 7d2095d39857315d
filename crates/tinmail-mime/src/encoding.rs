//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, RFC 2047 header words and charset
//! conversion of decoded text.

use crate::error::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use encoding_rs::Encoding;
use std::fmt::Write as _;

/// Line width for encoded bodies (RFC 2045).
const MAX_LINE_LENGTH: usize = 76;

/// Encodes data as Base64 on a single line.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64, wrapped at 76 columns with CRLF line breaks.
#[must_use]
pub fn encode_base64_wrapped(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut result = String::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2);

    // Base64 output is pure ASCII, so byte chunks are valid boundaries.
    for (i, chunk) in encoded.as_bytes().chunks(MAX_LINE_LENGTH).enumerate() {
        if i > 0 {
            result.push_str("\r\n");
        }
        result.push_str(&String::from_utf8_lossy(chunk));
    }

    result
}

/// Decodes Base64 data, ignoring embedded whitespace and line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &str) -> Result<Vec<u8>> {
    let cleaned: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(cleaned).map_err(Into::into)
}

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks in the input (LF or CRLF) become hard CRLF breaks; long
/// lines are split with soft breaks. Trailing whitespace on a line is
/// always escaped.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let mut result = String::new();

    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            result.push_str("\r\n");
        }
        let line = line.strip_suffix('\r').unwrap_or(line);
        encode_qp_line(line.as_bytes(), &mut result);
    }

    result
}

fn encode_qp_line(line: &[u8], out: &mut String) {
    let mut line_length = 0;

    for (i, &byte) in line.iter().enumerate() {
        let is_last = i + 1 == line.len();
        let literal = match byte {
            b'!'..=b'<' | b'>'..=b'~' => true,
            b' ' | b'\t' => !is_last,
            _ => false,
        };
        let width = if literal { 1 } else { 3 };

        // Leave room for the trailing '=' of a soft break.
        if line_length + width > MAX_LINE_LENGTH - 1 {
            out.push_str("=\r\n");
            line_length = 0;
        }

        if literal {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "={byte:02X}");
        }
        line_length += width;
    }
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Malformed escape sequences are kept literally instead of failing, as
/// real-world mail frequently contains stray `=` characters.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            result.push(byte);
            i += 1;
            continue;
        }

        // Soft line break, possibly with transport padding before it
        let rest = &data[i + 1..];
        let padding = rest
            .iter()
            .take_while(|b| **b == b' ' || **b == b'\t')
            .count();
        match &rest[padding..] {
            [b'\r', b'\n', ..] => {
                i += 1 + padding + 2;
                continue;
            }
            [b'\n', ..] => {
                i += 1 + padding + 1;
                continue;
            }
            _ => {}
        }

        match (rest.first().and_then(|b| hex_value(*b)), rest.get(1).and_then(|b| hex_value(*b))) {
            (Some(high), Some(low)) => {
                result.push((high << 4) | low);
                i += 3;
            }
            _ => {
                result.push(b'=');
                i += 1;
            }
        }
    }

    result
}

const fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// Encodes a header value using RFC 2047 `B` encoding when it is not
/// plain ASCII.
///
/// Long values are split over several encoded words so each stays within
/// the 75 character limit; words never split a UTF-8 sequence.
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    // 45 input bytes encode to 60 base64 characters.
    const CHUNK: usize = 45;

    if text.is_ascii() && !text.contains("=?") {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut chunk = String::new();
    for ch in text.chars() {
        if chunk.len() + ch.len_utf8() > CHUNK {
            words.push(format!("=?{charset}?B?{}?=", encode_base64(chunk.as_bytes())));
            chunk.clear();
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() {
        words.push(format!("=?{charset}?B?{}?=", encode_base64(chunk.as_bytes())));
    }

    words.join(" ")
}

/// Decodes every RFC 2047 encoded word in a header value.
///
/// Both `B` and `Q` encodings are supported in any charset known to
/// `encoding_rs`. Whitespace between adjacent encoded words is dropped.
/// Words that fail to decode are left as they are.
#[must_use]
pub fn decode_rfc2047(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut rest = value;
    let mut pending_space = String::new();
    let mut last_was_word = false;

    while !rest.is_empty() {
        if let Some((decoded, consumed)) = decode_encoded_word(rest) {
            if !last_was_word {
                result.push_str(&pending_space);
            }
            pending_space.clear();
            result.push_str(&decoded);
            rest = &rest[consumed..];
            last_was_word = true;
            continue;
        }

        let Some(ch) = rest.chars().next() else {
            break;
        };
        if ch == ' ' || ch == '\t' {
            pending_space.push(ch);
        } else {
            result.push_str(&pending_space);
            pending_space.clear();
            result.push(ch);
            last_was_word = false;
        }
        rest = &rest[ch.len_utf8()..];
    }

    result.push_str(&pending_space);
    result
}

/// Decodes a single `=?charset?enc?text?=` word at the start of `input`,
/// returning the text and the number of bytes consumed.
fn decode_encoded_word(input: &str) -> Option<(String, usize)> {
    let body = input.strip_prefix("=?")?;
    let (charset, body) = body.split_once('?')?;
    let (encoding, body) = body.split_once('?')?;
    let end = body.find("?=")?;
    let text = &body[..end];
    if text.contains(' ') || charset.is_empty() {
        return None;
    }

    let bytes = match encoding {
        "B" | "b" => decode_base64(text).ok()?,
        "Q" | "q" => decode_q(text),
        _ => return None,
    };

    // "=?" + charset + "?" + encoding + "?" + text + "?="
    let consumed = 2 + charset.len() + 1 + encoding.len() + 1 + end + 2;

    // Strip an RFC 2231 language suffix (charset*lang).
    let charset = charset.split('*').next().unwrap_or(charset);
    Some((decode_charset(&bytes, Some(charset)), consumed))
}

fn decode_q(text: &str) -> Vec<u8> {
    let underscored: Vec<u8> = text
        .bytes()
        .map(|b| if b == b'_' { b' ' } else { b })
        .collect();
    decode_quoted_printable(&underscored)
}

/// Decodes text bytes from a declared charset.
///
/// Unknown or missing charsets fall back to lossy UTF-8.
#[must_use]
pub fn decode_charset(bytes: &[u8], charset: Option<&str>) -> String {
    let encoding = charset
        .map(|label| label.trim().trim_matches('"'))
        .and_then(|label| Encoding::for_label(label.as_bytes()));

    match encoding {
        Some(encoding) => {
            let (text, _, _) = encoding.decode(bytes);
            text.into_owned()
        }
        None => String::from_utf8_lossy(bytes).into_owned(),
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
    use proptest::prelude::*;

    #[test]
    fn test_base64_wrapped_lines() {
        let data = vec![0xAB_u8; 200];
        let encoded = encode_base64_wrapped(&data);
        for line in encoded.split("\r\n") {
            assert!(line.len() <= 76);
        }
        assert_eq!(decode_base64(&encoded).unwrap(), data);
    }

    #[test]
    fn test_base64_decode_ignores_whitespace() {
        let decoded = decode_base64("SGVs\r\nbG8s\n IFdv\tcmxkIQ==").unwrap();
        assert_eq!(decoded, b"Hello, World!");
    }

    #[test]
    fn test_base64_decode_invalid() {
        assert!(decode_base64("!!!not base64!!!").is_err());
    }

    #[test]
    fn test_quoted_printable_plain_ascii() {
        assert_eq!(encode_quoted_printable("Hello"), "Hello");
    }

    #[test]
    fn test_quoted_printable_escapes() {
        assert_eq!(encode_quoted_printable("a=b"), "a=3Db");
        assert_eq!(encode_quoted_printable("café"), "caf=C3=A9");
        assert_eq!(encode_quoted_printable("trailing "), "trailing=20");
    }

    #[test]
    fn test_quoted_printable_hard_breaks() {
        assert_eq!(encode_quoted_printable("one\ntwo\r\nthree"), "one\r\ntwo\r\nthree");
    }

    #[test]
    fn test_quoted_printable_soft_breaks() {
        let long = "x".repeat(200);
        let encoded = encode_quoted_printable(&long);
        for line in encoded.split("\r\n") {
            assert!(line.len() <= 76, "line too long: {}", line.len());
        }
        assert_eq!(decode_quoted_printable(encoded.as_bytes()), long.as_bytes());
    }

    #[test]
    fn test_quoted_printable_decode() {
        assert_eq!(decode_quoted_printable(b"caf=C3=A9"), "café".as_bytes());
        assert_eq!(decode_quoted_printable(b"soft=\r\nbreak"), b"softbreak");
        assert_eq!(decode_quoted_printable(b"soft=  \nbreak"), b"softbreak");
        assert_eq!(decode_quoted_printable(b"lower=c3=a9"), "loweré".as_bytes());
    }

    #[test]
    fn test_quoted_printable_decode_malformed_kept() {
        assert_eq!(decode_quoted_printable(b"50% =ZZ off="), b"50% =ZZ off=");
    }

    #[test]
    fn test_rfc2047_ascii_untouched() {
        assert_eq!(encode_rfc2047("Weekly report", "utf-8"), "Weekly report");
    }

    #[test]
    fn test_rfc2047_encode_decode() {
        let encoded = encode_rfc2047("Grüße aus Köln", "utf-8");
        assert!(encoded.starts_with("=?utf-8?B?"));
        assert_eq!(decode_rfc2047(&encoded), "Grüße aus Köln");
    }

    #[test]
    fn test_rfc2047_long_value_splits_words() {
        let subject = "ünïcödé ".repeat(20);
        let encoded = encode_rfc2047(&subject, "utf-8");
        assert!(encoded.split(' ').all(|word| word.len() <= 75));
        assert_eq!(decode_rfc2047(&encoded), subject);
    }

    #[test]
    fn test_rfc2047_q_encoding() {
        assert_eq!(decode_rfc2047("=?ISO-8859-1?Q?Andr=E9_Pirard?="), "André Pirard");
    }

    #[test]
    fn test_rfc2047_mixed_text() {
        assert_eq!(
            decode_rfc2047("Re: =?utf-8?B?w6l0w6k=?= plans"),
            "Re: été plans"
        );
    }

    #[test]
    fn test_rfc2047_adjacent_words_join() {
        assert_eq!(decode_rfc2047("=?utf-8?Q?a?= =?utf-8?Q?b?="), "ab");
    }

    #[test]
    fn test_rfc2047_malformed_left_alone() {
        assert_eq!(decode_rfc2047("=?utf-8?X?abc?="), "=?utf-8?X?abc?=");
        assert_eq!(decode_rfc2047("price =? unknown"), "price =? unknown");
    }

    #[test]
    fn test_decode_charset() {
        assert_eq!(decode_charset(&[0x63, 0x61, 0x66, 0xE9], Some("iso-8859-1")), "café");
        assert_eq!(decode_charset("café".as_bytes(), Some("\"UTF-8\"")), "café");
        assert_eq!(decode_charset(b"plain", Some("x-unknown")), "plain");
        assert_eq!(decode_charset(b"plain", None), "plain");
    }

    proptest! {
        #[test]
        fn prop_quoted_printable_roundtrip(text in "[ -~\u{a0}-\u{2fff}]{0,300}") {
            let encoded = encode_quoted_printable(&text);
            prop_assert!(encoded.is_ascii());
            prop_assert_eq!(decode_quoted_printable(encoded.as_bytes()), text.as_bytes());
        }

        #[test]
        fn prop_base64_wrapped_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..600)) {
            let encoded = encode_base64_wrapped(&data);
            prop_assert_eq!(decode_base64(&encoded).unwrap(), data);
        }
    }
}
