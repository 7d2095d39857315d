//! # tinmail-imap
//!
//! An async IMAP4rev1 client covering what a mail reader needs: greeting,
//! LOGIN, SELECT, SEARCH, FETCH and UID FETCH, plus a streaming FETCH that
//! hands each message to a bounded channel as it arrives.
//!
//! ## Quick Start
//!
//! ```ignore
//! use tinmail_imap::{Client, FetchItems, SearchCriteria, SequenceSet};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> tinmail_imap::Result<()> {
//!     let stream = tinmail_imap::connection::connect_tls("imap.example.com", 993).await?;
//!     let client = Client::from_stream(stream).await?;
//!     let client = client.login("user@example.com", "password").await?;
//!
//!     let (mut client, status) = client.select("INBOX").await?;
//!     println!("Messages: {}", status.exists);
//!
//!     let unseen = client.search(SearchCriteria::Unseen).await?;
//!     if let Some(set) = SequenceSet::from_numbers(&unseen) {
//!         let (tx, mut rx) = mpsc::channel(10);
//!         let fetch = client.fetch_into(&set, FetchItems::envelope(), &tx);
//!         let print = async {
//!             while let Some((seq, _items)) = rx.recv().await {
//!                 println!("Fetched {}", seq.get());
//!             }
//!         };
//!         let (result, ()) = tokio::join!(fetch, print);
//!         result?;
//!     }
//!
//!     client.logout().await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! NotAuthenticated ── login() ──→ Authenticated ── select() ──→ Selected
//! ```
//!
//! Commands are only callable in the state where they are valid.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use command::{Command, FetchAttribute, FetchItems, SearchCriteria, TagGenerator};
pub use connection::{
    Authenticated, Client, FetchedMessage, FramedStream, ImapStream, NotAuthenticated, Selected,
};
pub use error::{Error, Result};
pub use parser::{Address, Envelope, FetchItem, Response, ResponseParser, UntaggedResponse};
pub use types::{
    Capability, Flag, Flags, MailboxStatus, ResponseCode, SeqNum, SequenceSet, Status, Tag, Uid,
    UidSet, UidValidity,
};
