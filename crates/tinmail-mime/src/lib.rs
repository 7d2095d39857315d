//! # tinmail-mime
//!
//! MIME message parsing and composition for the tinmail client.
//!
//! ## Features
//!
//! - **Message parsing**: header blocks, folded lines, and lazily split
//!   multipart bodies of any nesting depth
//! - **Parameters**: Content-Type and Content-Disposition parameters with
//!   quoting, RFC 2231 continuations and RFC 2047 encoded filenames
//! - **Encodings**: Base64, Quoted-Printable, RFC 2047 header words, and
//!   charset conversion through `encoding_rs`
//! - **Composition**: a builder for plain-text messages with attachments
//!
//! ## Quick Start
//!
//! ### Parsing
//!
//! ```
//! use tinmail_mime::Message;
//!
//! let raw = b"From: sender@example.com\r\n\
//!             Subject: Test\r\n\
//!             Content-Type: text/plain; charset=utf-8\r\n\
//!             \r\n\
//!             Hello, World!";
//!
//! let message = Message::parse(raw)?;
//! assert_eq!(message.subject(), Some("Test"));
//! assert_eq!(message.root().body_text()?, "Hello, World!");
//! # Ok::<(), tinmail_mime::Error>(())
//! ```
//!
//! ### Building
//!
//! ```
//! use tinmail_mime::{AttachmentPart, ContentType, MessageBuilder};
//!
//! let bytes = MessageBuilder::new()
//!     .from("sender@example.com")
//!     .to("recipient@example.com")
//!     .subject("Document")
//!     .text_body("Please find the attached document.")
//!     .attach(AttachmentPart::new(
//!         "notes.txt",
//!         ContentType::new("text", "plain"),
//!         b"notes".to_vec(),
//!     ))
//!     .build()?;
//! assert!(bytes.starts_with(b"From: sender@example.com\r\n"));
//! # Ok::<(), tinmail_mime::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod builder;
mod content_type;
mod disposition;
mod error;
mod header;
mod message;
mod params;

pub mod encoding;

pub use builder::{AttachmentPart, MessageBuilder, generate_boundary, generate_message_id};
pub use content_type::ContentType;
pub use disposition::{ContentDisposition, DispositionType};
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Message, Part, TransferEncoding};
