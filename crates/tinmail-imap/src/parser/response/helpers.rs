//! Parser helper functions.

use crate::parser::lexer::{Lexer, Token};
use crate::types::{Capability, Flag, Flags, ResponseCode, SeqNum, Uid, UidValidity};
use crate::Result;

/// Parses a bracketed response code.
pub fn parse_response_code(lexer: &mut Lexer<'_>) -> Result<ResponseCode> {
    lexer.expect(Token::LBracket)?;

    let atom = lexer.read_atom_string()?;
    let code = match atom.to_ascii_uppercase().as_str() {
        "ALERT" => ResponseCode::Alert,
        "READ-ONLY" => ResponseCode::ReadOnly,
        "READ-WRITE" => ResponseCode::ReadWrite,
        "TRYCREATE" => ResponseCode::TryCreate,
        "UIDNEXT" => {
            lexer.expect_space()?;
            Uid::new(lexer.read_number()?)
                .map_or_else(|| ResponseCode::Unknown(atom.to_string()), ResponseCode::UidNext)
        }
        "UIDVALIDITY" => {
            lexer.expect_space()?;
            UidValidity::new(lexer.read_number()?).map_or_else(
                || ResponseCode::Unknown(atom.to_string()),
                ResponseCode::UidValidity,
            )
        }
        "UNSEEN" => {
            lexer.expect_space()?;
            SeqNum::new(lexer.read_number()?)
                .map_or_else(|| ResponseCode::Unknown(atom.to_string()), ResponseCode::Unseen)
        }
        "CAPABILITY" => ResponseCode::Capability(parse_capability_data(lexer)?),
        "PERMANENTFLAGS" => {
            lexer.expect_space()?;
            ResponseCode::PermanentFlags(parse_flag_list(lexer)?.iter().cloned().collect())
        }
        _ => ResponseCode::Unknown(atom.to_string()),
    };

    // Skip arguments of codes we do not interpret.
    while lexer.peek() != Some(b']') && !lexer.is_eof() {
        lexer.advance();
    }
    lexer.expect(Token::RBracket)?;

    Ok(code)
}

/// Parses space-separated capability atoms.
pub fn parse_capability_data(lexer: &mut Lexer<'_>) -> Result<Vec<Capability>> {
    let mut caps = Vec::new();

    while lexer.peek() == Some(b' ') {
        lexer.advance();
        if let Token::Atom(s) = lexer.next_token()? {
            caps.push(Capability::parse(s));
        }
    }

    Ok(caps)
}

/// Parses a parenthesized flag list.
pub fn parse_flag_list(lexer: &mut Lexer<'_>) -> Result<Flags> {
    lexer.expect(Token::LParen)?;

    let mut flags = Flags::new();

    loop {
        match lexer.next_token()? {
            Token::RParen => break,
            // `\*` lexes as an atom `\` followed by an asterisk.
            Token::Atom("\\") if lexer.peek() == Some(b'*') => {
                lexer.advance();
                flags.insert(Flag::Wildcard);
            }
            Token::Atom(s) => flags.insert(Flag::parse(s)),
            Token::Space => {}
            token => {
                return Err(lexer.error(&format!("Unexpected token in flag list: {token:?}")));
            }
        }
    }

    Ok(flags)
}

/// Parses the numbers of a SEARCH response.
pub fn parse_search_response(lexer: &mut Lexer<'_>) -> Result<Vec<SeqNum>> {
    let mut nums = Vec::new();

    while lexer.peek() == Some(b' ') {
        lexer.advance();
        if let Token::Number(n) = lexer.next_token()?
            && let Some(seq) = SeqNum::new(n)
        {
            nums.push(seq);
        }
    }

    Ok(nums)
}

/// Reads text until CRLF and consumes the CRLF.
pub fn read_text_until_crlf(lexer: &mut Lexer<'_>) -> String {
    let remaining = lexer.remaining();
    let end = remaining
        .iter()
        .position(|b| *b == b'\r' || *b == b'\n')
        .unwrap_or(remaining.len());

    lexer.skip(end);
    if lexer.peek() == Some(b'\r') {
        lexer.advance();
    }
    if lexer.peek() == Some(b'\n') {
        lexer.advance();
    }

    String::from_utf8_lossy(&remaining[..end]).into_owned()
}
