//! Header parameter lists (`; key=value` pairs) shared by Content-Type and
//! Content-Disposition.

use crate::encoding::decode_charset;
use std::collections::BTreeMap;

/// Characters that force a parameter value to be quoted (RFC 2045 tspecials).
const TSPECIALS: &str = "()<>@,;:\\\"/[]?=";

/// Splits `value; a=1; b="x;y"` into the leading value and its parameters.
///
/// Keys are lowercased. RFC 2231 extended (`key*`) and continued
/// (`key*0`, `key*1*`) parameters are reassembled and decoded.
pub fn split_parameters(input: &str) -> (String, BTreeMap<String, String>) {
    let mut segments = split_unquoted(input, ';').into_iter();
    let head = segments.next().unwrap_or_default().trim().to_string();

    let mut plain = BTreeMap::new();
    // key -> (index, extended, raw value)
    let mut continued: BTreeMap<String, Vec<(u32, bool, String)>> = BTreeMap::new();

    for segment in segments {
        let Some((key, value)) = segment.split_once('=') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = unquote(value.trim());
        if key.is_empty() {
            continue;
        }

        let Some((base, suffix)) = key.split_once('*') else {
            plain.insert(key, value);
            continue;
        };

        let extended = suffix.ends_with('*') || suffix.is_empty();
        let index = suffix.trim_end_matches('*').parse::<u32>().unwrap_or(0);
        continued
            .entry(base.to_string())
            .or_default()
            .push((index, extended, value));
    }

    // Extended forms take precedence over plain ones.
    for (key, mut pieces) in continued {
        pieces.sort_by_key(|(index, _, _)| *index);
        plain.insert(key, decode_extended(&pieces));
    }

    (head, plain)
}

/// Decodes reassembled RFC 2231 pieces. The first extended piece may carry
/// `charset'language'` in front of its percent-encoded text.
fn decode_extended(pieces: &[(u32, bool, String)]) -> String {
    let mut charset = None;
    let mut bytes = Vec::new();

    for (position, (_, extended, value)) in pieces.iter().enumerate() {
        if !extended {
            bytes.extend_from_slice(value.as_bytes());
            continue;
        }

        let mut text = value.as_str();
        if position == 0 {
            let mut fields = value.splitn(3, '\'');
            if let (Some(cs), Some(_lang), Some(rest)) = (fields.next(), fields.next(), fields.next())
            {
                if !cs.is_empty() {
                    charset = Some(cs.to_string());
                }
                text = rest;
            }
        }
        bytes.extend(percent_decode(text));
    }

    decode_charset(&bytes, charset.as_deref())
}

fn percent_decode(text: &str) -> Vec<u8> {
    let raw = text.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%'
            && let Some(hex) = text.get(i + 1..i + 3)
            && let Ok(byte) = u8::from_str_radix(hex, 16)
        {
            out.push(byte);
            i += 3;
            continue;
        }
        out.push(raw[i]);
        i += 1;
    }
    out
}

/// Splits on `sep` outside of double quotes.
fn split_unquoted(input: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for ch in input.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => {
                current.push(ch);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            c if c == sep && !in_quotes => parts.push(std::mem::take(&mut current)),
            c => current.push(c),
        }
    }
    parts.push(current);
    parts
}

/// Removes surrounding quotes and backslash escapes.
fn unquote(value: &str) -> String {
    let Some(inner) = value
        .strip_prefix('"')
        .map(|v| v.strip_suffix('"').unwrap_or(v))
    else {
        return value.to_string();
    };

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Formats a `; key=value` pair, quoting the value when required.
pub fn format_parameter(key: &str, value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || TSPECIALS.contains(c));
    if needs_quotes {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("; {key}=\"{escaped}\"")
    } else {
        format!("; {key}={value}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_split_simple() {
        let (head, params) = split_parameters("text/plain; charset=utf-8; Format=flowed");
        assert_eq!(head, "text/plain");
        assert_eq!(params.get("charset").unwrap(), "utf-8");
        assert_eq!(params.get("format").unwrap(), "flowed");
    }

    #[test]
    fn test_split_quoted_with_separator() {
        let (_, params) = split_parameters(r#"attachment; filename="a;b \"c\".txt""#);
        assert_eq!(params.get("filename").unwrap(), "a;b \"c\".txt");
    }

    #[test]
    fn test_rfc2231_extended() {
        let (_, params) = split_parameters("attachment; filename*=UTF-8''na%C3%AFve%20plan.pdf");
        assert_eq!(params.get("filename").unwrap(), "naïve plan.pdf");
    }

    #[test]
    fn test_rfc2231_continuations() {
        let (_, params) = split_parameters(
            "attachment; filename*0=\"quarterly\"; filename*1*=%20report; filename*2=\".xlsx\"",
        );
        assert_eq!(params.get("filename").unwrap(), "quarterly report.xlsx");
    }

    #[test]
    fn test_missing_value_skipped() {
        let (head, params) = split_parameters("inline; size");
        assert_eq!(head, "inline");
        assert!(params.is_empty());
    }

    #[test]
    fn test_format_parameter() {
        assert_eq!(format_parameter("charset", "UTF-8"), "; charset=UTF-8");
        assert_eq!(
            format_parameter("filename", "my report.pdf"),
            "; filename=\"my report.pdf\""
        );
    }
}
