//! Type-state IMAP client connection.
//!
//! The IMAP connection states are:
//!
//! - `NotAuthenticated`: after the greeting
//! - `Authenticated`: after a successful LOGIN
//! - `Selected`: after a successful SELECT
//!
//! Each state only exposes the commands valid in it.

#![allow(clippy::missing_errors_doc)]

mod authenticated;
mod not_authenticated;
mod selected;
mod states;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::trace;

pub use self::selected::FetchedMessage;
pub use self::states::{Authenticated, NotAuthenticated, Selected};
use super::framed::FramedStream;
use crate::command::{Command, TagGenerator};
use crate::parser::{Response, ResponseParser, UntaggedResponse};
use crate::types::{Capability, Status};
use crate::{Error, Result};

/// IMAP client connection with type-state.
pub struct Client<S, State> {
    pub(crate) stream: FramedStream<S>,
    pub(crate) tag_gen: TagGenerator,
    pub(crate) capabilities: Vec<Capability>,
    pub(crate) state: State,
}

impl<S, State: std::fmt::Debug> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tag_gen", &self.tag_gen)
            .field("capabilities", &self.capabilities)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the server capabilities.
    #[must_use]
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Gracefully disconnects from the server.
    ///
    /// The server's reply is drained but not checked; the connection is
    /// dropped either way.
    pub async fn logout(mut self) -> Result<()> {
        let tag = self.tag_gen.next();
        self.stream
            .write_command(&Command::Logout.serialize(&tag))
            .await?;
        let _ = self.stream.read_until_tagged(&tag).await;
        Ok(())
    }

    /// Sends `command`, collects every response up to its completion and
    /// checks that it completed OK.
    pub(crate) async fn execute(&mut self, command: &Command) -> Result<Vec<Vec<u8>>> {
        let tag = self.tag_gen.next();
        trace!(tag = %tag, command = command.name(), "sending command");

        self.stream.write_command(&command.serialize(&tag)).await?;
        let responses = self.stream.read_until_tagged(&tag).await?;
        Self::check_tagged_ok(&responses, &tag)?;

        Ok(responses)
    }

    pub(crate) fn absorb_capabilities(&mut self, responses: &[Vec<u8>]) {
        for response_bytes in responses {
            if let Ok(Response::Untagged(UntaggedResponse::Capability(caps))) =
                ResponseParser::parse(response_bytes)
            {
                self.capabilities = caps;
            }
        }
    }

    /// Moves the connection into another state.
    pub(crate) fn transition<Next>(self, state: Next) -> Client<S, Next> {
        Client {
            stream: self.stream,
            tag_gen: self.tag_gen,
            capabilities: self.capabilities,
            state,
        }
    }

    /// Checks that the completion response for `tag` is OK.
    pub(crate) fn check_tagged_ok(responses: &[Vec<u8>], tag: &str) -> Result<()> {
        let tagged = responses
            .last()
            .ok_or_else(|| Error::Protocol("missing tagged response".to_string()))?;

        match ResponseParser::parse(tagged)? {
            Response::Tagged {
                tag: resp_tag,
                status,
                text,
                ..
            } if resp_tag.as_str() == tag => status_to_result(status, text),
            _ => Err(Error::Protocol("missing tagged response".to_string())),
        }
    }
}

pub(crate) fn status_to_result(status: Status, text: String) -> Result<()> {
    match status {
        Status::Ok | Status::PreAuth => Ok(()),
        Status::No => Err(Error::No(text)),
        Status::Bad => Err(Error::Bad(text)),
        Status::Bye => Err(Error::Bye(text)),
    }
}
