//! FETCH response parsing.

use crate::parser::lexer::{Lexer, Token};
use crate::types::Uid;
use crate::Result;

use super::helpers::parse_flag_list;
use super::types::{Address, Envelope, FetchItem};

/// Parses the parenthesized item list of a FETCH response.
///
/// Items this client does not interpret are skipped.
pub fn parse_fetch_response(lexer: &mut Lexer<'_>) -> Result<Vec<FetchItem>> {
    lexer.expect(Token::LParen)?;

    let mut items = Vec::new();

    loop {
        let name = match lexer.next_token()? {
            Token::RParen => break,
            Token::Space => continue,
            Token::Atom(name) => name,
            token => return Err(lexer.error(&format!("Unexpected token in FETCH: {token:?}"))),
        };

        match name.to_ascii_uppercase().as_str() {
            "FLAGS" => {
                lexer.expect_space()?;
                items.push(FetchItem::Flags(parse_flag_list(lexer)?));
            }
            "UID" => {
                lexer.expect_space()?;
                let n = lexer.read_number()?;
                let uid = Uid::new(n).ok_or_else(|| lexer.error("UID cannot be 0"))?;
                items.push(FetchItem::Uid(uid));
            }
            "RFC822.SIZE" => {
                lexer.expect_space()?;
                items.push(FetchItem::Rfc822Size(lexer.read_number()?));
            }
            "INTERNALDATE" => {
                lexer.expect_space()?;
                if let Some(date) = lexer.read_nstring()? {
                    items.push(FetchItem::InternalDate(date));
                }
            }
            "ENVELOPE" => {
                lexer.expect_space()?;
                items.push(FetchItem::Envelope(Box::new(parse_envelope(lexer)?)));
            }
            "BODY" | "BODY.PEEK" if lexer.peek() == Some(b'[') => {
                let (section, origin) = parse_section_and_origin(lexer);
                lexer.expect_space()?;
                let data = read_body_data(lexer)?;
                items.push(FetchItem::Body {
                    section,
                    origin,
                    data,
                });
            }
            "RFC822" => {
                lexer.expect_space()?;
                let data = read_body_data(lexer)?;
                items.push(FetchItem::Body {
                    section: None,
                    origin: None,
                    data,
                });
            }
            _ => {
                // Unknown item, or BODY without a section (a BODYSTRUCTURE form).
                lexer.expect_space()?;
                lexer.skip_value()?;
            }
        }
    }

    Ok(items)
}

fn read_body_data(lexer: &mut Lexer<'_>) -> Result<Option<Vec<u8>>> {
    match lexer.next_token()? {
        Token::Literal(data) => Ok(Some(data)),
        Token::QuotedString(s) => Ok(Some(s.into_bytes())),
        Token::Nil => Ok(None),
        token => Err(lexer.error(&format!("Expected body data, got {token:?}"))),
    }
}

/// Reads the optional `[section]` and `<origin>` following BODY.
fn parse_section_and_origin(lexer: &mut Lexer<'_>) -> (Option<String>, Option<u32>) {
    let mut section = None;
    let mut origin = None;

    if lexer.peek() == Some(b'[') {
        lexer.advance();
        let mut buf = String::new();
        while let Some(b) = lexer.advance() {
            if b == b']' {
                break;
            }
            buf.push(char::from(b));
        }
        if !buf.is_empty() {
            section = Some(buf);
        }
    }

    if lexer.peek() == Some(b'<') {
        lexer.advance();
        let mut buf = String::new();
        while let Some(b) = lexer.advance() {
            if b == b'>' {
                break;
            }
            buf.push(char::from(b));
        }
        origin = buf.parse().ok();
    }

    (section, origin)
}

/// Parses an ENVELOPE structure.
pub fn parse_envelope(lexer: &mut Lexer<'_>) -> Result<Envelope> {
    lexer.expect(Token::LParen)?;

    let date = lexer.read_nstring()?;
    lexer.expect_space()?;
    let subject = lexer.read_nstring()?;
    lexer.expect_space()?;

    let mut lists: [Vec<Address>; 6] = Default::default();
    for list in &mut lists {
        *list = parse_address_list(lexer)?;
        lexer.expect_space()?;
    }
    let [from, sender, reply_to, to, cc, bcc] = lists;

    let in_reply_to = lexer.read_nstring()?;
    lexer.expect_space()?;
    let message_id = lexer.read_nstring()?;

    lexer.expect(Token::RParen)?;

    Ok(Envelope {
        date,
        subject,
        from,
        sender,
        reply_to,
        to,
        cc,
        bcc,
        in_reply_to,
        message_id,
    })
}

/// Parses an address list (`NIL` or `((...)(...))`).
///
/// Group syntax markers (entries without a host) are dropped.
fn parse_address_list(lexer: &mut Lexer<'_>) -> Result<Vec<Address>> {
    match lexer.next_token()? {
        Token::Nil => Ok(Vec::new()),
        Token::LParen => {
            let mut addresses = Vec::new();
            loop {
                match lexer.peek() {
                    Some(b')') => {
                        lexer.advance();
                        break;
                    }
                    Some(b'(') => {
                        let address = parse_address(lexer)?;
                        if address.host.is_some() {
                            addresses.push(address);
                        }
                    }
                    Some(b' ') => {
                        lexer.advance();
                    }
                    _ => return Err(lexer.error("Malformed address list")),
                }
            }
            Ok(addresses)
        }
        token => Err(lexer.error(&format!("Expected address list, got {token:?}"))),
    }
}

fn parse_address(lexer: &mut Lexer<'_>) -> Result<Address> {
    lexer.expect(Token::LParen)?;
    let name = lexer.read_nstring()?;
    lexer.expect_space()?;
    let adl = lexer.read_nstring()?;
    lexer.expect_space()?;
    let mailbox = lexer.read_nstring()?;
    lexer.expect_space()?;
    let host = lexer.read_nstring()?;
    lexer.expect(Token::RParen)?;

    Ok(Address {
        name,
        adl,
        mailbox,
        host,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_body_literal() {
        let input = b"(UID 4827 BODY[] {11}\r\nHello World)";
        let mut lexer = Lexer::new(input);
        let items = parse_fetch_response(&mut lexer).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0], FetchItem::Uid(Uid::new(4827).unwrap()));
        assert_eq!(
            items[1],
            FetchItem::Body {
                section: None,
                origin: None,
                data: Some(b"Hello World".to_vec()),
            }
        );
    }

    #[test]
    fn test_fetch_body_section_and_origin() {
        let input = b"(BODY[HEADER]<0> \"abc\")";
        let mut lexer = Lexer::new(input);
        let items = parse_fetch_response(&mut lexer).unwrap();

        assert_eq!(
            items,
            vec![FetchItem::Body {
                section: Some("HEADER".to_string()),
                origin: Some(0),
                data: Some(b"abc".to_vec()),
            }]
        );
    }

    #[test]
    fn test_fetch_skips_bodystructure() {
        let input = b"(BODYSTRUCTURE (\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\" 5 1) UID 9)";
        let mut lexer = Lexer::new(input);
        let items = parse_fetch_response(&mut lexer).unwrap();

        assert_eq!(items, vec![FetchItem::Uid(Uid::new(9).unwrap())]);
    }

    #[test]
    fn test_fetch_envelope() {
        let input = b"(ENVELOPE (\"Mon, 7 Feb 1994 21:52:25 -0800\" \"Hi\" \
((\"Fred\" NIL \"fred\" \"example.com\")) NIL NIL \
((NIL NIL \"bob\" \"example.org\")(NIL NIL \"amy\" \"example.org\")) \
NIL NIL NIL \"<id@example.com>\"))";
        let mut lexer = Lexer::new(input);
        let items = parse_fetch_response(&mut lexer).unwrap();

        let FetchItem::Envelope(env) = &items[0] else {
            panic!("Expected envelope");
        };
        assert_eq!(env.subject.as_deref(), Some("Hi"));
        assert_eq!(env.from[0].name.as_deref(), Some("Fred"));
        assert_eq!(env.from[0].email().as_deref(), Some("fred@example.com"));
        assert!(env.sender.is_empty());
        assert_eq!(env.to.len(), 2);
        assert_eq!(env.to[1].email().as_deref(), Some("amy@example.org"));
        assert_eq!(env.message_id.as_deref(), Some("<id@example.com>"));
    }

    #[test]
    fn test_address_group_markers_dropped() {
        let input = b"((NIL NIL \"team\" NIL)(NIL NIL \"a\" \"b.c\")(NIL NIL NIL NIL))";
        let mut lexer = Lexer::new(input);
        let list = parse_address_list(&mut lexer).unwrap();

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].email().as_deref(), Some("a@b.c"));
    }
}
