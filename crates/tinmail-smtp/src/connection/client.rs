//! Type-state SMTP client.

use std::io;
use std::marker::PhantomData;

use base64::Engine;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, trace};

use super::ServerInfo;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Address, AuthMechanism, Extension, Reply, ReplyCode};

/// Greeted; EHLO and AUTH are valid.
#[derive(Debug)]
pub struct Connected;

/// Authenticated; a transaction may start.
#[derive(Debug)]
pub struct Authenticated;

/// MAIL FROM accepted.
#[derive(Debug)]
pub struct MailTransaction;

/// At least one RCPT TO accepted.
#[derive(Debug)]
pub struct RecipientAdded;

/// DATA accepted; the server waits for the message.
#[derive(Debug)]
pub struct Data;

/// SMTP client with type-state pattern.
pub struct Client<S, State> {
    stream: BufReader<S>,
    server_info: ServerInfo,
    _state: PhantomData<State>,
}

impl<S, State> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("server_info", &self.server_info)
            .field("state", &std::any::type_name::<State>())
            .finish_non_exhaustive()
    }
}

impl<S> Client<S, Connected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a client from a connected stream and reads the greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the greeting cannot be read or is not 220.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut stream = BufReader::new(stream);
        let greeting = read_reply(&mut stream).await?;
        expect_code(&greeting, ReplyCode::SERVICE_READY)?;
        debug!(greeting = %greeting.text(), "received SMTP greeting");

        Ok(Self {
            stream,
            server_info: ServerInfo {
                greeting: greeting.text(),
                extensions: Vec::new(),
            },
            _state: PhantomData,
        })
    }

    /// Sends EHLO and records the advertised extensions.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects EHLO.
    pub async fn ehlo(mut self, client_hostname: &str) -> Result<Self> {
        let reply = self
            .send_command(&Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;
        expect_success(&reply)?;

        // The first line is the server's identity, the rest are extensions.
        self.server_info.extensions = reply
            .lines
            .iter()
            .skip(1)
            .map(|line| Extension::parse(line))
            .collect();
        debug!(extensions = self.server_info.extensions.len(), "EHLO accepted");

        Ok(self)
    }

    /// Authenticates with AUTH PLAIN (initial response form).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSupported`] if the server did not advertise
    /// PLAIN, or a reply error if the credentials are rejected.
    pub async fn auth_plain(
        mut self,
        username: &str,
        password: &str,
    ) -> Result<Client<S, Authenticated>> {
        if !self
            .server_info
            .auth_mechanisms()
            .contains(&AuthMechanism::Plain)
        {
            return Err(Error::NotSupported("AUTH PLAIN".into()));
        }

        let credentials = format!("\0{username}\0{password}");
        let encoded = base64::engine::general_purpose::STANDARD.encode(credentials.as_bytes());

        let reply = self
            .send_command(&Command::Auth {
                mechanism: AuthMechanism::Plain,
                initial_response: Some(encoded),
            })
            .await?;
        expect_code(&reply, ReplyCode::AUTH_OK)?;
        debug!(user = username, "SMTP authentication succeeded");

        Ok(self.transition())
    }
}

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Starts a mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if MAIL FROM is rejected.
    pub async fn mail_from(mut self, from: Address) -> Result<Client<S, MailTransaction>> {
        let reply = self.send_command(&Command::MailFrom { from }).await?;
        expect_success(&reply)?;
        Ok(self.transition())
    }
}

impl<S> Client<S, MailTransaction>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Adds the first recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if RCPT TO is rejected.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Client<S, RecipientAdded>> {
        let reply = self.send_command(&Command::RcptTo { to }).await?;
        expect_success(&reply)?;
        Ok(self.transition())
    }
}

impl<S> Client<S, RecipientAdded>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Adds another recipient.
    ///
    /// # Errors
    ///
    /// Returns an error if RCPT TO is rejected.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Self> {
        let reply = self.send_command(&Command::RcptTo { to }).await?;
        expect_success(&reply)?;
        Ok(self)
    }

    /// Sends DATA.
    ///
    /// # Errors
    ///
    /// Returns an error unless the server answers 354.
    pub async fn data(mut self) -> Result<Client<S, Data>> {
        let reply = self.send_command(&Command::Data).await?;
        expect_code(&reply, ReplyCode::START_DATA)?;
        Ok(self.transition())
    }
}

impl<S> Client<S, Data>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Sends the message and completes the transaction.
    ///
    /// Line endings are normalized to CRLF, lines starting with `.` are
    /// dot-stuffed, and the terminating `.` line is appended.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails or the server rejects the message.
    pub async fn send_message(mut self, message: &[u8]) -> Result<Client<S, Authenticated>> {
        let payload = encode_data(message);
        self.stream.get_mut().write_all(&payload).await?;
        self.stream.get_mut().flush().await?;

        let reply = read_reply(&mut self.stream).await?;
        expect_success(&reply)?;
        debug!(bytes = message.len(), "message accepted");

        Ok(self.transition())
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns what the server advertised.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Sends QUIT and closes the session (valid in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if QUIT is rejected.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(&Command::Quit).await?;
        if !reply.is_success() {
            return Err(Error::reply(reply.code.as_u16(), reply.text()));
        }
        let _ = self.stream.get_mut().shutdown().await;
        Ok(())
    }

    async fn send_command(&mut self, cmd: &Command) -> Result<Reply> {
        trace!(command = cmd.verb(), "sending SMTP command");
        let stream = self.stream.get_mut();
        stream.write_all(&cmd.serialize()).await?;
        stream.flush().await?;
        read_reply(&mut self.stream).await
    }

    fn transition<Next>(self) -> Client<S, Next> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            _state: PhantomData,
        }
    }
}

async fn read_reply<S>(stream: &mut BufReader<S>) -> Result<Reply>
where
    S: AsyncRead + Unpin,
{
    let mut lines = Vec::new();
    loop {
        let mut raw = Vec::new();
        if stream.read_until(b'\n', &mut raw).await? == 0 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed",
            )));
        }

        let line = String::from_utf8_lossy(&raw).trim_end().to_string();
        if line.is_empty() {
            continue;
        }

        let last = is_last_reply_line(&line);
        lines.push(line);
        if last {
            return parse_reply(&lines);
        }
    }
}

fn expect_success(reply: &Reply) -> Result<()> {
    if reply.is_success() {
        Ok(())
    } else {
        Err(Error::reply(reply.code.as_u16(), reply.text()))
    }
}

fn expect_code(reply: &Reply, code: ReplyCode) -> Result<()> {
    if reply.code == code {
        Ok(())
    } else {
        Err(Error::reply(reply.code.as_u16(), reply.text()))
    }
}

/// Converts a message into the DATA payload, terminator included.
fn encode_data(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + message.len() / 50 + 5);

    let body = message.strip_suffix(b"\n").unwrap_or(message);
    let body = body.strip_suffix(b"\r").unwrap_or(body);

    if !body.is_empty() {
        for line in body.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.first() == Some(&b'.') {
                out.push(b'.');
            }
            out.extend_from_slice(line);
            out.extend_from_slice(b"\r\n");
        }
    }

    out.extend_from_slice(b".\r\n");
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;

    #[test]
    fn test_encode_data_normalizes_and_stuffs() {
        assert_eq!(
            encode_data(b"Subject: x\n\n.hidden\r\nend"),
            b"Subject: x\r\n\r\n..hidden\r\nend\r\n.\r\n"
        );
    }

    #[test]
    fn test_encode_data_trailing_newline_adds_no_blank_line() {
        assert_eq!(encode_data(b"body\r\n"), b"body\r\n.\r\n");
        assert_eq!(encode_data(b"body\n"), b"body\r\n.\r\n");
        assert_eq!(encode_data(b"body"), b"body\r\n.\r\n");
    }

    #[test]
    fn test_encode_data_keeps_intentional_blank_line() {
        assert_eq!(encode_data(b"body\r\n\r\n"), b"body\r\n\r\n.\r\n");
    }

    #[test]
    fn test_encode_data_empty() {
        assert_eq!(encode_data(b""), b".\r\n");
    }

    #[tokio::test]
    async fn test_read_multiline_reply() {
        let mock = Builder::new()
            .read(b"250-mx.example.com\r\n250-SIZE 100\r\n")
            .read(b"250 AUTH PLAIN\r\n")
            .build();
        let mut reader = BufReader::new(mock);

        let reply = read_reply(&mut reader).await.unwrap();
        assert_eq!(reply.code, ReplyCode::OK);
        assert_eq!(reply.lines.len(), 3);
    }

    #[tokio::test]
    async fn test_read_reply_eof() {
        let mock = Builder::new().read(b"250-partial\r\n").build();
        let mut reader = BufReader::new(mock);

        let err = read_reply(&mut reader).await.unwrap_err();
        assert!(matches!(err, Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof));
    }

    #[tokio::test]
    async fn test_greeting_must_be_220() {
        let mock = Builder::new().read(b"554 no service\r\n").build();

        let err = Client::from_stream(mock).await.unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_auth_plain_requires_advertisement() {
        let mock = Builder::new()
            .read(b"220 mx ESMTP\r\n")
            .write(b"EHLO localhost\r\n")
            .read(b"250-mx\r\n250 AUTH LOGIN\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let client = client.ehlo("localhost").await.unwrap();
        let err = client.auth_plain("u", "p").await.unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));
    }
}
