//! # tinmail-core
//!
//! Mail handling for the `tinmail` terminal client.
//!
//! This crate provides:
//! - Envelope listing and lazy body retrieval over IMAP ([`MailRetriever`])
//! - Best-effort extraction of text and attachments from MIME trees ([`MimeParser`])
//! - Attachment persistence with sanitized, collision-free names ([`AttachmentStore`])
//! - Message composition and SMTP submission ([`MessageComposer`])
//! - Account configuration loaded from TOML ([`Config`])
//!
//! Every network operation opens its own connection and session; nothing
//! is pooled or shared between calls.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod attachments;
pub mod composer;
pub mod config;
pub mod connector;
mod error;
pub mod model;
pub mod parser;
pub mod retriever;

pub use attachments::{AttachmentStore, download_to_folder, open_attachment, sanitize_filename};
pub use composer::{MessageComposer, build_message, parse_recipients};
pub use config::{Account, Config, ServerConfig};
pub use connector::{Connector, ImapTls, SmtpTls};
pub use error::{BodyError, BoxError, Error, ErrorKind, Result, StoreError};
pub use model::{Attachment, Draft, MailboxFilter, Message, ParseFilterError, TextFormat};
pub use parser::{BodyExtraction, MimeParser, ParsedParts, PartRole};
pub use retriever::{INBOX, MailRetriever};
