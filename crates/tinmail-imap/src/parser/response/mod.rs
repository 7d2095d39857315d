//! IMAP response parser.
//!
//! Parses one complete server response (including any literals) into a
//! [`Response`].

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::needless_continue)]

mod fetch;
mod helpers;
mod types;

pub use types::{Address, Envelope, FetchItem, UntaggedResponse};

use crate::parser::lexer::{Lexer, Token};
use crate::types::{ResponseCode, SeqNum, Status, Tag};
use crate::{Error, Result};

use helpers::{
    parse_capability_data, parse_flag_list, parse_response_code, parse_search_response,
    read_text_until_crlf,
};

/// A parsed IMAP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Tagged response (command completion).
    Tagged {
        /// The command tag.
        tag: Tag,
        /// Response status.
        status: Status,
        /// Optional response code.
        code: Option<ResponseCode>,
        /// Human-readable text.
        text: String,
    },
    /// Untagged response (server data).
    Untagged(UntaggedResponse),
    /// Continuation request.
    Continuation {
        /// Optional text.
        text: Option<String>,
    },
}

/// Response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses a complete response.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let mut lexer = Lexer::new(input);

        match lexer.next_token()? {
            Token::Asterisk => Self::parse_untagged(&mut lexer),
            Token::Plus => Ok(Self::parse_continuation(&mut lexer)),
            Token::Atom(tag) => Self::parse_tagged(&mut lexer, tag),
            token => Err(Error::Parse {
                position: 0,
                message: format!("Expected *, +, or tag, got {token:?}"),
            }),
        }
    }

    fn parse_tagged(lexer: &mut Lexer<'_>, tag: &str) -> Result<Response> {
        lexer.expect_space()?;

        let status = Self::parse_status(lexer)?;
        let (code, text) = Self::parse_resp_text(lexer)?;

        Ok(Response::Tagged {
            tag: Tag::new(tag),
            status,
            code,
            text,
        })
    }

    fn parse_untagged(lexer: &mut Lexer<'_>) -> Result<Response> {
        lexer.expect_space()?;

        let untagged = match lexer.next_token()? {
            Token::Atom(keyword) => match keyword.to_ascii_uppercase().as_str() {
                "OK" => {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    UntaggedResponse::Ok { code, text }
                }
                "NO" => {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    UntaggedResponse::No { code, text }
                }
                "BAD" => {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    UntaggedResponse::Bad { code, text }
                }
                "PREAUTH" => {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    UntaggedResponse::PreAuth { code, text }
                }
                "BYE" => {
                    let (code, text) = Self::parse_resp_text(lexer)?;
                    UntaggedResponse::Bye { code, text }
                }
                "CAPABILITY" => UntaggedResponse::Capability(parse_capability_data(lexer)?),
                "FLAGS" => {
                    lexer.expect_space()?;
                    UntaggedResponse::Flags(parse_flag_list(lexer)?)
                }
                "SEARCH" => UntaggedResponse::Search(parse_search_response(lexer)?),
                _ => UntaggedResponse::Other(keyword.to_string()),
            },
            Token::Number(n) => {
                lexer.expect_space()?;
                let keyword = lexer.read_atom_string()?;

                match keyword.to_ascii_uppercase().as_str() {
                    "EXISTS" => UntaggedResponse::Exists(n),
                    "RECENT" => UntaggedResponse::Recent(n),
                    "EXPUNGE" => UntaggedResponse::Expunge(Self::seq_num(lexer, n)?),
                    "FETCH" => {
                        let seq = Self::seq_num(lexer, n)?;
                        lexer.expect_space()?;
                        let items = fetch::parse_fetch_response(lexer)?;
                        UntaggedResponse::Fetch { seq, items }
                    }
                    _ => UntaggedResponse::Other(keyword.to_string()),
                }
            }
            token => {
                return Err(lexer.error(&format!(
                    "Unexpected token in untagged response: {token:?}"
                )));
            }
        };

        Ok(Response::Untagged(untagged))
    }

    fn seq_num(lexer: &Lexer<'_>, n: u32) -> Result<SeqNum> {
        SeqNum::new(n).ok_or_else(|| lexer.error("Invalid sequence number 0"))
    }

    fn parse_continuation(lexer: &mut Lexer<'_>) -> Response {
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }

        let text = read_text_until_crlf(lexer);

        Response::Continuation {
            text: if text.is_empty() { None } else { Some(text) },
        }
    }

    fn parse_status(lexer: &mut Lexer<'_>) -> Result<Status> {
        let s = lexer.read_atom_string()?;
        match s.to_ascii_uppercase().as_str() {
            "OK" => Ok(Status::Ok),
            "NO" => Ok(Status::No),
            "BAD" => Ok(Status::Bad),
            "PREAUTH" => Ok(Status::PreAuth),
            "BYE" => Ok(Status::Bye),
            _ => Err(lexer.error(&format!("Invalid status: {s}"))),
        }
    }

    /// Parses `[code] text` following a status keyword.
    ///
    /// Some servers omit the text entirely (`A1 OK\r\n`), so the leading
    /// space is optional.
    fn parse_resp_text(lexer: &mut Lexer<'_>) -> Result<(Option<ResponseCode>, String)> {
        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }

        let code = if lexer.peek() == Some(b'[') {
            Some(parse_response_code(lexer)?)
        } else {
            None
        };

        if lexer.peek() == Some(b' ') {
            lexer.advance();
        }

        Ok((code, read_text_until_crlf(lexer)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::types::{Capability, Flag};

    use super::*;

    #[test]
    fn test_parse_greeting() {
        let response = ResponseParser::parse(b"* OK IMAP4rev1 server ready\r\n").unwrap();

        match response {
            Response::Untagged(UntaggedResponse::Ok { code, text }) => {
                assert!(code.is_none());
                assert_eq!(text, "IMAP4rev1 server ready");
            }
            _ => panic!("Expected untagged OK"),
        }
    }

    #[test]
    fn test_parse_tagged_ok() {
        let response = ResponseParser::parse(b"A0001 OK LOGIN completed\r\n").unwrap();

        assert_eq!(
            response,
            Response::Tagged {
                tag: Tag::new("A0001"),
                status: Status::Ok,
                code: None,
                text: "LOGIN completed".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_tagged_without_text() {
        let response = ResponseParser::parse(b"A0002 OK\r\n").unwrap();

        assert!(matches!(
            response,
            Response::Tagged { status: Status::Ok, ref text, .. } if text.is_empty()
        ));
    }

    #[test]
    fn test_parse_tagged_no_with_code() {
        let response =
            ResponseParser::parse(b"A0003 NO [TRYCREATE] Mailbox does not exist\r\n").unwrap();

        match response {
            Response::Tagged {
                status, code, text, ..
            } => {
                assert_eq!(status, Status::No);
                assert_eq!(code, Some(ResponseCode::TryCreate));
                assert_eq!(text, "Mailbox does not exist");
            }
            _ => panic!("Expected tagged response"),
        }
    }

    #[test]
    fn test_parse_capability() {
        let response =
            ResponseParser::parse(b"* CAPABILITY IMAP4rev1 IDLE AUTH=PLAIN\r\n").unwrap();

        match response {
            Response::Untagged(UntaggedResponse::Capability(caps)) => {
                assert!(caps.contains(&Capability::Imap4Rev1));
                assert!(caps.contains(&Capability::Idle));
                assert!(caps.contains(&Capability::Auth("PLAIN".to_string())));
            }
            _ => panic!("Expected capability response"),
        }
    }

    #[test]
    fn test_parse_exists_and_recent() {
        assert_eq!(
            ResponseParser::parse(b"* 23 EXISTS\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Exists(23))
        );
        assert_eq!(
            ResponseParser::parse(b"* 0 RECENT\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Recent(0))
        );
    }

    #[test]
    fn test_parse_flags() {
        let response =
            ResponseParser::parse(b"* FLAGS (\\Seen \\Answered \\Flagged \\Deleted \\Draft)\r\n")
                .unwrap();

        match response {
            Response::Untagged(UntaggedResponse::Flags(flags)) => {
                assert!(flags.contains(&Flag::Seen));
                assert!(flags.contains(&Flag::Flagged));
                assert_eq!(flags.len(), 5);
            }
            _ => panic!("Expected FLAGS"),
        }
    }

    #[test]
    fn test_parse_permanent_flags_wildcard() {
        let response =
            ResponseParser::parse(b"* OK [PERMANENTFLAGS (\\Seen \\*)] Limited\r\n").unwrap();

        match response {
            Response::Untagged(UntaggedResponse::Ok {
                code: Some(ResponseCode::PermanentFlags(flags)),
                ..
            }) => {
                assert!(flags.contains(&Flag::Seen));
                assert!(flags.contains(&Flag::Wildcard));
            }
            other => panic!("Expected PERMANENTFLAGS, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_continuation() {
        assert_eq!(
            ResponseParser::parse(b"+ Ready for literal\r\n").unwrap(),
            Response::Continuation {
                text: Some("Ready for literal".to_string())
            }
        );
        assert_eq!(
            ResponseParser::parse(b"+\r\n").unwrap(),
            Response::Continuation { text: None }
        );
    }

    #[test]
    fn test_parse_uidvalidity_code() {
        let response =
            ResponseParser::parse(b"* OK [UIDVALIDITY 1234567890] UIDs valid\r\n").unwrap();

        match response {
            Response::Untagged(UntaggedResponse::Ok { code, text }) => {
                match code {
                    Some(ResponseCode::UidValidity(v)) => assert_eq!(v.get(), 1_234_567_890),
                    _ => panic!("Expected UIDVALIDITY code"),
                }
                assert_eq!(text, "UIDs valid");
            }
            _ => panic!("Expected untagged OK"),
        }
    }

    #[test]
    fn test_parse_fetch() {
        let response = ResponseParser::parse(b"* 1 FETCH (FLAGS (\\Seen) UID 12345)\r\n").unwrap();

        match response {
            Response::Untagged(UntaggedResponse::Fetch { seq, items }) => {
                assert_eq!(seq.get(), 1);
                assert!(
                    items
                        .iter()
                        .any(|i| matches!(i, FetchItem::Uid(uid) if uid.get() == 12345))
                );
                assert!(
                    items
                        .iter()
                        .any(|i| matches!(i, FetchItem::Flags(f) if f.is_seen()))
                );
            }
            _ => panic!("Expected FETCH"),
        }
    }

    #[test]
    fn test_parse_search() {
        let response = ResponseParser::parse(b"* SEARCH 1 2 3 5 8 13\r\n").unwrap();

        match response {
            Response::Untagged(UntaggedResponse::Search(nums)) => {
                let values: Vec<u32> = nums.iter().map(|n| n.get()).collect();
                assert_eq!(values, vec![1, 2, 3, 5, 8, 13]);
            }
            _ => panic!("Expected SEARCH"),
        }
    }

    #[test]
    fn test_parse_empty_search() {
        assert_eq!(
            ResponseParser::parse(b"* SEARCH\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Search(Vec::new()))
        );
    }

    #[test]
    fn test_unknown_untagged_is_tolerated() {
        assert_eq!(
            ResponseParser::parse(b"* LIST (\\HasChildren) \"/\" INBOX\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Other("LIST".to_string()))
        );
        assert_eq!(
            ResponseParser::parse(b"* 3 XWEIRD\r\n").unwrap(),
            Response::Untagged(UntaggedResponse::Other("XWEIRD".to_string()))
        );
    }

    #[test]
    fn test_fetch_zero_is_rejected() {
        assert!(ResponseParser::parse(b"* 0 FETCH (UID 1)\r\n").is_err());
    }
}
