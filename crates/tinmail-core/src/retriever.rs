//! Mailbox retrieval.
//!
//! Every call opens its own IMAP session: connect, log in, select the
//! mailbox, do the work, log out. Listing only fetches envelopes; bodies
//! are fetched one message at a time when opened.

use chrono::{DateTime, FixedOffset, Utc};
use tinmail_imap::connection::{Client, Selected};
use tinmail_imap::{
    Address, Envelope, FetchItem, FetchItems, FetchedMessage, MailboxStatus, SearchCriteria,
    SeqNum, SequenceSet, Uid, UidSet,
};
use tinmail_mime::encoding::decode_rfc2047;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::config::ServerConfig;
use crate::connector::{Connector, ImapTls};
use crate::error::{Error, Result};
use crate::model::{MailboxFilter, Message};
use crate::parser::{BodyExtraction, MimeParser};

/// Mailbox every operation selects.
pub const INBOX: &str = "INBOX";

/// Fetched envelopes buffered between the network task and the caller.
const FETCH_QUEUE_CAPACITY: usize = 10;

/// Display format for envelope dates.
const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Lists messages and fetches bodies from the inbox.
#[derive(Debug)]
pub struct MailRetriever<C> {
    connector: C,
    username: String,
    password: String,
    parser: MimeParser,
}

impl MailRetriever<ImapTls> {
    /// Retriever for the IMAP server in `server`.
    #[must_use]
    pub fn from_config(server: &ServerConfig, parser: MimeParser) -> Self {
        Self::new(
            ImapTls::from(server),
            server.user.clone(),
            server.password.clone(),
            parser,
        )
    }
}

impl<C: Connector> MailRetriever<C> {
    /// Creates a retriever that logs in with the given credentials.
    #[must_use]
    pub fn new(
        connector: C,
        username: impl Into<String>,
        password: impl Into<String>,
        parser: MimeParser,
    ) -> Self {
        Self {
            connector,
            username: username.into(),
            password: password.into(),
            parser,
        }
    }

    /// Lists envelopes matching `filter`, newest first.
    ///
    /// Bodies and attachments are left empty.
    ///
    /// # Errors
    ///
    /// Any connection, login, select, search or fetch failure aborts the
    /// listing.
    pub async fn list_messages(&self, filter: MailboxFilter) -> Result<Vec<Message>> {
        let (mut client, status) = self.open_session().await?;
        if status.is_empty() {
            debug!(mailbox = INBOX, "mailbox is empty");
            logout(client).await;
            return Ok(Vec::new());
        }

        let found = match client.search(search_criteria(filter)).await {
            Ok(found) => found,
            Err(e) => {
                logout(client).await;
                return Err(Error::protocol("search", e));
            }
        };
        debug!(%filter, matches = found.len(), "search finished");

        let Some(sequence) = SequenceSet::from_numbers(&found) else {
            logout(client).await;
            return Ok(Vec::new());
        };

        let mut fetched = fetch_envelopes(client, sequence).await?;
        fetched.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(fetched
            .into_iter()
            .map(|(_, message)| message)
            .collect())
    }

    /// Fetches one message by UID and extracts its body and attachments.
    ///
    /// # Errors
    ///
    /// Returns session errors as for [`list_messages`](Self::list_messages),
    /// [`Error::NotFound`] if the server returns no body, [`Error::Body`]
    /// if no text could be extracted (attachments included), and
    /// [`Error::EmptyBody`] if the extracted text is empty.
    pub async fn fetch_body(&self, uid: u32) -> Result<BodyExtraction> {
        let uid_value = Uid::new(uid).ok_or(Error::NotFound(uid))?;
        let (mut client, _) = self.open_session().await?;

        let fetched = client
            .uid_fetch(&UidSet::from(uid_value), FetchItems::full_body(false))
            .await;
        logout(client).await;
        let fetched = fetched.map_err(|e| Error::protocol("fetch message body", e))?;

        let raw = fetched
            .into_iter()
            .flat_map(|(_, items)| items)
            .find_map(|item| match item {
                FetchItem::Body {
                    data: Some(data), ..
                } => Some(data),
                _ => None,
            })
            .ok_or(Error::NotFound(uid))?;
        debug!(uid, bytes = raw.len(), "fetched message body");

        let body = self.parser.extract(&raw)?;
        if body.text.is_empty() {
            return Err(Error::EmptyBody);
        }
        Ok(body)
    }

    async fn open_session(&self) -> Result<(Client<C::Stream, Selected>, MailboxStatus)> {
        let stream = self.connector.connect().await?;
        let client = Client::from_stream(stream)
            .await
            .map_err(|e| Error::Connection(format!("server greeting: {e}")))?;

        let client = client
            .login(&self.username, &self.password)
            .await
            .map_err(|e| match e {
                tinmail_imap::Error::Auth(text) => Error::Auth(text),
                other => Error::protocol("log in", other),
            })?;

        let (client, status) = client
            .select(INBOX)
            .await
            .map_err(|e| Error::protocol("select mailbox", e))?;
        debug!(mailbox = INBOX, exists = status.exists, "mailbox selected");
        Ok((client, status))
    }
}

/// Streams envelopes out of a spawned fetch and collects them.
///
/// The queue is drained until the task closes it, and only then is the
/// task's own result read, so an error reported after the last message
/// still fails the listing.
async fn fetch_envelopes<S>(
    mut client: Client<S, Selected>,
    sequence: SequenceSet,
) -> Result<Vec<(SeqNum, Message)>>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<FetchedMessage>(FETCH_QUEUE_CAPACITY);
    let (done_tx, done_rx) = oneshot::channel();

    tokio::spawn(async move {
        let result = client
            .fetch_into(&sequence, FetchItems::envelope(), &tx)
            .await;
        drop(tx);
        logout(client).await;
        let _ = done_tx.send(result);
    });

    let mut messages = Vec::new();
    while let Some((seq, items)) = rx.recv().await {
        messages.push((seq, message_from_fetch(items)));
    }

    match done_rx.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(Error::protocol("fetch messages", e)),
        Err(e) => return Err(Error::protocol("fetch messages", e)),
    }
    debug!(count = messages.len(), "fetched envelopes");
    Ok(messages)
}

async fn logout<S, State>(client: Client<S, State>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Err(e) = client.logout().await {
        debug!(error = %e, "logout failed");
    }
}

/// Maps a listing filter to IMAP search keys.
#[must_use]
pub const fn search_criteria(filter: MailboxFilter) -> SearchCriteria {
    match filter {
        MailboxFilter::Unseen => SearchCriteria::Unseen,
        MailboxFilter::Seen => SearchCriteria::Seen,
        MailboxFilter::All => SearchCriteria::All,
    }
}

fn message_from_fetch(items: Vec<FetchItem>) -> Message {
    let mut message = Message::default();
    for item in items {
        match item {
            FetchItem::Uid(uid) => message.uid = uid.get(),
            FetchItem::Envelope(envelope) => apply_envelope(&mut message, &envelope),
            _ => {}
        }
    }
    message
}

fn apply_envelope(message: &mut Message, envelope: &Envelope) {
    if let Some(from) = envelope.from.first() {
        message.from = format_address(from);
    }
    message.to = format_address_list(&envelope.to);
    message.cc = format_address_list(&envelope.cc);
    message.subject = envelope
        .subject
        .as_deref()
        .map(decode_rfc2047)
        .unwrap_or_default();
    (message.date, message.timestamp) = parse_envelope_date(envelope.date.as_deref());
}

/// Renders an envelope address as `Name <mailbox@host>` or `mailbox@host`.
#[must_use]
pub fn format_address(address: &Address) -> String {
    let email = match (&address.mailbox, &address.host) {
        (Some(mailbox), Some(host)) => format!("{mailbox}@{host}"),
        (Some(part), None) | (None, Some(part)) => part.clone(),
        (None, None) => String::new(),
    };
    let name = address
        .name
        .as_deref()
        .map(decode_rfc2047)
        .filter(|n| !n.is_empty());

    match name {
        Some(name) if !email.is_empty() => format!("{name} <{email}>"),
        Some(name) => name,
        None => email,
    }
}

fn format_address_list(addresses: &[Address]) -> String {
    addresses
        .iter()
        .map(format_address)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parses an envelope Date into display text and a UTC timestamp.
///
/// Unparsable dates keep their raw text and get the Unix epoch.
#[must_use]
pub fn parse_envelope_date(raw: Option<&str>) -> (String, DateTime<Utc>) {
    let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
        return (String::new(), DateTime::default());
    };
    match parse_rfc2822(raw) {
        Some(date) => (
            date.format(DATE_FORMAT).to_string(),
            date.with_timezone(&Utc),
        ),
        None => (raw.to_string(), DateTime::default()),
    }
}

fn parse_rfc2822(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc2822(raw).ok().or_else(|| {
        // Trailing zone comments such as "(UTC)"
        let (head, _) = raw.split_once('(')?;
        DateTime::parse_from_rfc2822(head.trim()).ok()
    })
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn address(name: Option<&str>, mailbox: Option<&str>, host: Option<&str>) -> Address {
        Address {
            name: name.map(str::to_string),
            adl: None,
            mailbox: mailbox.map(str::to_string),
            host: host.map(str::to_string),
        }
    }

    #[test]
    fn test_format_address() {
        assert_eq!(
            format_address(&address(Some("Alice"), Some("alice"), Some("example.com"))),
            "Alice <alice@example.com>"
        );
        assert_eq!(
            format_address(&address(None, Some("bob"), Some("example.com"))),
            "bob@example.com"
        );
        assert_eq!(format_address(&address(None, Some("bob"), None)), "bob");
        assert_eq!(
            format_address(&address(Some("=?UTF-8?B?w4lsaXNl?="), Some("e"), Some("x.org"))),
            "Élise <e@x.org>"
        );
        assert_eq!(format_address(&address(Some(""), None, None)), "");
    }

    #[test]
    fn test_format_address_list() {
        let list = [
            address(None, Some("a"), Some("x.org")),
            address(Some("B"), Some("b"), Some("x.org")),
        ];
        assert_eq!(format_address_list(&list), "a@x.org, B <b@x.org>");
        assert_eq!(format_address_list(&[]), "");
    }

    #[test]
    fn test_parse_envelope_date() {
        let (display, ts) = parse_envelope_date(Some("Mon, 2 Jan 2006 15:04:05 -0700"));
        assert_eq!(display, "Mon, 02 Jan 2006 15:04:05 -0700");
        assert_eq!(ts.to_rfc3339(), "2006-01-02T22:04:05+00:00");

        let (display, _) = parse_envelope_date(Some("Tue, 3 Jan 2006 10:00:00 +0000 (UTC)"));
        assert_eq!(display, "Tue, 03 Jan 2006 10:00:00 +0000");
    }

    #[test]
    fn test_unparsable_date_keeps_raw_text() {
        let (display, ts) = parse_envelope_date(Some("sometime last week"));
        assert_eq!(display, "sometime last week");
        assert_eq!(ts.timestamp(), 0);

        let (display, ts) = parse_envelope_date(None);
        assert_eq!(display, "");
        assert_eq!(ts.timestamp(), 0);
    }

    #[test]
    fn test_search_criteria() {
        assert_eq!(search_criteria(MailboxFilter::Unseen), SearchCriteria::Unseen);
        assert_eq!(search_criteria(MailboxFilter::Seen), SearchCriteria::Seen);
        assert_eq!(search_criteria(MailboxFilter::All), SearchCriteria::All);
    }

    #[test]
    fn test_message_from_fetch() {
        let envelope = Envelope {
            date: Some("Mon, 02 Jan 2006 15:04:05 -0700".to_string()),
            subject: Some("=?UTF-8?Q?Caf=C3=A9?=".to_string()),
            from: vec![address(Some("Alice"), Some("alice"), Some("example.com"))],
            to: vec![
                address(None, Some("bob"), Some("example.com")),
                address(None, Some("carol"), Some("example.com")),
            ],
            cc: vec![address(None, Some("dan"), Some("example.com"))],
            ..Envelope::default()
        };
        let message = message_from_fetch(vec![
            FetchItem::Uid(Uid::new(77).unwrap()),
            FetchItem::Envelope(Box::new(envelope)),
        ]);

        assert_eq!(message.uid, 77);
        assert_eq!(message.from, "Alice <alice@example.com>");
        assert_eq!(message.to, "bob@example.com, carol@example.com");
        assert_eq!(message.cc, "dan@example.com");
        assert_eq!(message.subject, "Café");
        assert_eq!(message.date, "Mon, 02 Jan 2006 15:04:05 -0700");
        assert!(message.body.is_empty());
        assert!(message.attachments.is_empty());
    }
}
