//! Implementation for the selected state.

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::states::Selected;
use super::{Client, status_to_result};
use crate::command::{Command, FetchItems, SearchCriteria};
use crate::connection::framed::is_tagged;
use crate::parser::{FetchItem, Response, ResponseParser, UntaggedResponse};
use crate::types::{SeqNum, SequenceSet, UidSet};
use crate::{Error, Result};

/// One message's FETCH data.
pub type FetchedMessage = (SeqNum, Vec<FetchItem>);

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Returns the selected mailbox name.
    #[must_use]
    pub fn mailbox(&self) -> &str {
        self.state.mailbox()
    }

    /// Returns the status reported when the mailbox was selected.
    #[must_use]
    pub const fn mailbox_status(&self) -> &crate::types::MailboxStatus {
        self.state.status()
    }

    /// Searches for messages matching the given criteria.
    ///
    /// Returns sequence numbers in the order the server reported them.
    pub async fn search(&mut self, criteria: SearchCriteria) -> Result<Vec<SeqNum>> {
        let responses = self
            .execute(&Command::Search {
                criteria,
                uid: false,
            })
            .await?;

        let mut results = Vec::new();
        for response_bytes in &responses {
            if let Ok(Response::Untagged(UntaggedResponse::Search(ids))) =
                ResponseParser::parse(response_bytes)
            {
                results.extend(ids);
            }
        }

        debug!(count = results.len(), "search completed");
        Ok(results)
    }

    /// Fetches message data addressed by UID.
    pub async fn uid_fetch(
        &mut self,
        uid_set: &UidSet,
        items: FetchItems,
    ) -> Result<Vec<FetchedMessage>> {
        let command = Command::Fetch {
            sequence: uid_set.as_sequence_set(),
            items,
            uid: true,
        };
        let responses = self.execute(&command).await?;
        Ok(collect_fetches(&responses))
    }

    /// Fetches message data, sending each message into `tx` as soon as its
    /// response is read.
    ///
    /// Returns once the command has completed. If the receiver goes away,
    /// the remaining responses are still drained so the connection stays
    /// usable, and the fetch reports [`Error::InvalidState`].
    pub async fn fetch_into(
        &mut self,
        sequence: &SequenceSet,
        items: FetchItems,
        tx: &mpsc::Sender<FetchedMessage>,
    ) -> Result<()> {
        let tag = self.tag_gen.next();
        let command = Command::Fetch {
            sequence: sequence.clone(),
            items,
            uid: false,
        };
        trace!(tag = %tag, sequence = %sequence, "sending streaming fetch");
        self.stream.write_command(&command.serialize(&tag)).await?;

        let mut delivered = 0usize;
        let mut receiver_gone = false;

        loop {
            let response_bytes = self.stream.read_response().await?;

            if is_tagged(&response_bytes, &tag) {
                return match ResponseParser::parse(&response_bytes)? {
                    Response::Tagged { status, text, .. } => {
                        status_to_result(status, text)?;
                        debug!(delivered, "streaming fetch completed");
                        if receiver_gone {
                            Err(Error::InvalidState("fetch receiver closed".to_string()))
                        } else {
                            Ok(())
                        }
                    }
                    _ => Err(Error::Protocol("malformed tagged response".to_string())),
                };
            }

            if receiver_gone {
                continue;
            }
            if let Response::Untagged(UntaggedResponse::Fetch { seq, items }) =
                ResponseParser::parse(&response_bytes)?
            {
                if tx.send((seq, items)).await.is_err() {
                    receiver_gone = true;
                } else {
                    delivered += 1;
                }
            }
        }
    }
}

fn collect_fetches(responses: &[Vec<u8>]) -> Vec<FetchedMessage> {
    responses
        .iter()
        .filter_map(|bytes| match ResponseParser::parse(bytes) {
            Ok(Response::Untagged(UntaggedResponse::Fetch { seq, items })) => Some((seq, items)),
            _ => None,
        })
        .collect()
}
