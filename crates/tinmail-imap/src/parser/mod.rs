//! Sans-I/O parser for IMAP server responses.
//!
//! - **Lexer**: tokenizes raw bytes into IMAP tokens (atoms, strings, literals, numbers)
//! - **Response parser**: builds structured responses from tokens
//!
//! # Example
//!
//! ```
//! use tinmail_imap::parser::{Response, ResponseParser, UntaggedResponse};
//!
//! let response = ResponseParser::parse(b"* 3 EXISTS\r\n").unwrap();
//! assert_eq!(response, Response::Untagged(UntaggedResponse::Exists(3)));
//! ```

pub mod lexer;
pub mod response;

pub use lexer::{Lexer, Token};
pub use response::{Address, Envelope, FetchItem, Response, ResponseParser, UntaggedResponse};
