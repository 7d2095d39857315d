//! # tinmail-smtp
//!
//! An async SMTP submission client: greeting, EHLO with extension discovery,
//! AUTH PLAIN, MAIL FROM, RCPT TO, DATA with dot-stuffing, and QUIT, over
//! implicit TLS.
//!
//! ## Quick Start
//!
//! ```ignore
//! use tinmail_smtp::{Address, Client};
//!
//! #[tokio::main]
//! async fn main() -> tinmail_smtp::Result<()> {
//!     let stream = tinmail_smtp::connection::connect_tls("smtp.example.com", 465).await?;
//!     let client = Client::from_stream(stream).await?;
//!     let client = client.ehlo("localhost").await?;
//!     let client = client.auth_plain("user@example.com", "password").await?;
//!
//!     let client = client.mail_from(Address::new("user@example.com")?).await?;
//!     let client = client.rcpt_to(Address::new("friend@example.org")?).await?;
//!     let client = client.data().await?;
//!     let client = client.send_message(b"Subject: Hi\r\n\r\nHello!\r\n").await?;
//!
//!     client.quit().await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! Connected ── auth_plain() ──→ Authenticated ── mail_from() ──→ MailTransaction
//!                                     ↑                                │
//!                               send_message()                     rcpt_to()
//!                                     │                                ↓
//!                                   Data ←──── data() ────────── RecipientAdded
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use connection::{
    Authenticated, Client, Connected, Data, MailTransaction, RecipientAdded, ServerInfo,
    SmtpStream,
};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
