//! IMAP connection management.
//!
//! - TLS stream setup
//! - Framed I/O (lines plus literals)
//! - Type-state client

mod client;
mod framed;
mod stream;

pub use client::{Authenticated, Client, FetchedMessage, NotAuthenticated, Selected};
pub use framed::FramedStream;
pub use stream::{ImapStream, connect_tls, create_tls_connector};
