//! End-to-end tests for retrieval, extraction and sending.
//!
//! Servers are scripted with `tokio_test::io::Builder`; each connector
//! hands out one scripted stream per session.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio_test::io::{Builder, Mock};

use tinmail_core::{
    AttachmentStore, BodyError, Connector, Draft, Error, ErrorKind, MailRetriever, MailboxFilter,
    MessageComposer, MimeParser, TextFormat, build_message,
};

const GREETING: &[u8] = b"* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] ready\r\n";

/// Connector that replays prepared server scripts in order.
struct Scripted(Mutex<VecDeque<Mock>>);

impl Scripted {
    fn new(mocks: impl IntoIterator<Item = Mock>) -> Self {
        Self(Mutex::new(mocks.into_iter().collect()))
    }
}

impl Connector for Scripted {
    type Stream = Mock;

    async fn connect(&self) -> tinmail_core::Result<Mock> {
        self.0
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Connection("no scripted session left".to_string()))
    }
}

fn retriever(mocks: impl IntoIterator<Item = Mock>, dir: &std::path::Path) -> MailRetriever<Scripted> {
    MailRetriever::new(
        Scripted::new(mocks),
        "user@example.com",
        "secret",
        MimeParser::new(AttachmentStore::new(dir)),
    )
}

fn login_and_select(builder: &mut Builder, exists: u32) -> &mut Builder {
    builder
        .read(GREETING)
        .write(b"A0001 LOGIN user@example.com secret\r\n")
        .read(b"A0001 OK LOGIN completed\r\n")
        .write(b"A0002 SELECT INBOX\r\n")
        .read(format!("* {exists} EXISTS\r\n* 0 RECENT\r\n").as_bytes())
        .read(b"A0002 OK [READ-WRITE] SELECT completed\r\n")
}

#[tokio::test]
async fn test_empty_mailbox_skips_search() {
    let dir = tempfile::tempdir().unwrap();
    let mock = login_and_select(&mut Builder::new(), 0)
        .write(b"A0003 LOGOUT\r\n")
        .read(b"* BYE logging out\r\nA0003 OK LOGOUT completed\r\n")
        .build();

    let messages = retriever([mock], dir.path())
        .list_messages(MailboxFilter::Unseen)
        .await
        .unwrap();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn test_empty_search_result() {
    let dir = tempfile::tempdir().unwrap();
    let mock = login_and_select(&mut Builder::new(), 4)
        .write(b"A0003 SEARCH SEEN\r\n")
        .read(b"* SEARCH\r\nA0003 OK SEARCH completed\r\n")
        .write(b"A0004 LOGOUT\r\n")
        .read(b"* BYE logging out\r\nA0004 OK LOGOUT completed\r\n")
        .build();

    let messages = retriever([mock], dir.path())
        .list_messages(MailboxFilter::Seen)
        .await
        .unwrap();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn test_list_is_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let mock = login_and_select(&mut Builder::new(), 9)
        .write(b"A0003 SEARCH ALL\r\n")
        .read(b"* SEARCH 2 5 9\r\nA0003 OK SEARCH completed\r\n")
        .write(b"A0004 FETCH 2,5,9 (UID ENVELOPE)\r\n")
        .read(
            b"* 5 FETCH (UID 105 ENVELOPE (\"Tue, 03 Jan 2006 10:00:00 +0000\" \"middle\" \
              ((\"Alice\" NIL \"alice\" \"example.com\")) NIL NIL \
              ((NIL NIL \"bob\" \"example.com\")(NIL NIL \"carol\" \"example.com\")) \
              NIL NIL NIL NIL))\r\n",
        )
        .read(b"* 2 FETCH (UID 102 ENVELOPE (NIL \"oldest\" NIL NIL NIL NIL NIL NIL NIL NIL))\r\n")
        .read(b"* 9 FETCH (UID 109 ENVELOPE (NIL \"newest\" NIL NIL NIL NIL NIL NIL NIL NIL))\r\n")
        .read(b"A0004 OK FETCH completed\r\n")
        .write(b"A0005 LOGOUT\r\n")
        .read(b"* BYE logging out\r\nA0005 OK LOGOUT completed\r\n")
        .build();

    let messages = retriever([mock], dir.path())
        .list_messages(MailboxFilter::All)
        .await
        .unwrap();

    let subjects: Vec<_> = messages.iter().map(|m| m.subject.as_str()).collect();
    assert_eq!(subjects, ["newest", "middle", "oldest"]);
    let uids: Vec<_> = messages.iter().map(|m| m.uid).collect();
    assert_eq!(uids, [109, 105, 102]);

    let middle = &messages[1];
    assert_eq!(middle.from, "Alice <alice@example.com>");
    assert_eq!(middle.to, "bob@example.com, carol@example.com");
    assert_eq!(middle.date, "Tue, 03 Jan 2006 10:00:00 +0000");
    assert!(middle.body.is_empty());
    assert!(middle.attachments.is_empty());
}

#[tokio::test]
async fn test_each_filter_sends_its_search_key_and_lists_newest_first() {
    for (filter, key) in [
        (MailboxFilter::Unseen, "UNSEEN"),
        (MailboxFilter::Seen, "SEEN"),
        (MailboxFilter::All, "ALL"),
    ] {
        let dir = tempfile::tempdir().unwrap();
        let mock = login_and_select(&mut Builder::new(), 4)
            .write(format!("A0003 SEARCH {key}\r\n").as_bytes())
            .read(b"* SEARCH 4 1\r\nA0003 OK SEARCH completed\r\n")
            .write(b"A0004 FETCH 1,4 (UID ENVELOPE)\r\n")
            .read(b"* 1 FETCH (UID 11 ENVELOPE (NIL \"older\" NIL NIL NIL NIL NIL NIL NIL NIL))\r\n")
            .read(b"* 4 FETCH (UID 14 ENVELOPE (NIL \"newer\" NIL NIL NIL NIL NIL NIL NIL NIL))\r\n")
            .read(b"A0004 OK FETCH completed\r\n")
            .write(b"A0005 LOGOUT\r\n")
            .read(b"* BYE logging out\r\nA0005 OK LOGOUT completed\r\n")
            .build();

        let messages = retriever([mock], dir.path())
            .list_messages(filter)
            .await
            .unwrap();
        let uids: Vec<_> = messages.iter().map(|m| m.uid).collect();
        assert_eq!(uids, [14, 11], "filter {filter}");
    }
}

#[tokio::test]
async fn test_rejected_select_is_protocol_error() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGIN user@example.com secret\r\n")
        .read(b"A0001 OK LOGIN completed\r\n")
        .write(b"A0002 SELECT INBOX\r\n")
        .read(b"A0002 NO Mailbox unavailable\r\n")
        .build();

    let err = retriever([mock], dir.path())
        .list_messages(MailboxFilter::All)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert!(err.to_string().starts_with("Failed to select mailbox"));
}

#[tokio::test]
async fn test_rejected_search_is_protocol_error_and_logs_out() {
    let dir = tempfile::tempdir().unwrap();
    let mock = login_and_select(&mut Builder::new(), 2)
        .write(b"A0003 SEARCH UNSEEN\r\n")
        .read(b"A0003 BAD Command syntax error\r\n")
        .write(b"A0004 LOGOUT\r\n")
        .read(b"* BYE logging out\r\nA0004 OK LOGOUT completed\r\n")
        .build();

    let err = retriever([mock], dir.path())
        .list_messages(MailboxFilter::Unseen)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert!(err.to_string().starts_with("Failed to search"));
}

#[tokio::test]
async fn test_fetch_failure_after_last_message_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mock = login_and_select(&mut Builder::new(), 1)
        .write(b"A0003 SEARCH UNSEEN\r\n")
        .read(b"* SEARCH 1\r\nA0003 OK SEARCH completed\r\n")
        .write(b"A0004 FETCH 1 (UID ENVELOPE)\r\n")
        .read(b"* 1 FETCH (UID 7 ENVELOPE (NIL \"only\" NIL NIL NIL NIL NIL NIL NIL NIL))\r\n")
        .read(b"A0004 NO FETCH failed\r\n")
        .write(b"A0005 LOGOUT\r\n")
        .read(b"* BYE logging out\r\nA0005 OK LOGOUT completed\r\n")
        .build();

    let err = retriever([mock], dir.path())
        .list_messages(MailboxFilter::Unseen)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert!(err.to_string().starts_with("Failed to fetch messages"));
}

#[tokio::test]
async fn test_rejected_login_is_auth_error() {
    let dir = tempfile::tempdir().unwrap();
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGIN user@example.com secret\r\n")
        .read(b"A0001 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
        .build();

    let err = retriever([mock], dir.path())
        .list_messages(MailboxFilter::All)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth(ref text) if text == "Invalid credentials"));
}

#[tokio::test]
async fn test_fetch_body() {
    let dir = tempfile::tempdir().unwrap();
    let mock = login_and_select(&mut Builder::new(), 3)
        .write(b"A0003 UID FETCH 42 BODY[]\r\n")
        .read(b"* 3 FETCH (UID 42 BODY[] {92}\r\n")
        .read(b"From: alice@example.com\r\nSubject: hi\r\nContent-Type: text/plain; charset=UTF-8\r\n\r\nHello there")
        .read(b")\r\nA0003 OK FETCH completed\r\n")
        .write(b"A0004 LOGOUT\r\n")
        .read(b"* BYE logging out\r\nA0004 OK LOGOUT completed\r\n")
        .build();

    let body = retriever([mock], dir.path()).fetch_body(42).await.unwrap();
    assert_eq!(body.text, "Hello there");
    assert_eq!(body.format, TextFormat::Plain);
    assert!(body.attachments.is_empty());
}

#[tokio::test]
async fn test_fetch_body_keeps_attachments_without_text() {
    let dir = tempfile::tempdir().unwrap();
    let mock = login_and_select(&mut Builder::new(), 1)
        .write(b"A0003 UID FETCH 8 BODY[]\r\n")
        .read(b"* 1 FETCH (UID 8 BODY[] {211}\r\n")
        .read(
            b"Subject: invoice\r\nContent-Type: multipart/mixed; boundary=XX\r\n\r\n\
              --XX\r\nContent-Type: application/pdf\r\n\
              Content-Disposition: attachment; filename=invoice.pdf\r\n\
              Content-Transfer-Encoding: base64\r\n\r\nJVBERg==\r\n--XX--\r\n",
        )
        .read(b")\r\nA0003 OK FETCH completed\r\n")
        .write(b"A0004 LOGOUT\r\n")
        .read(b"* BYE logging out\r\nA0004 OK LOGOUT completed\r\n")
        .build();

    let err = retriever([mock], dir.path()).fetch_body(8).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Body {
            error: BodyError::NoTextContent,
            ..
        }
    ));
    let attachments = err.attachments();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].filename, "invoice.pdf");
    assert_eq!(attachments[0].size, 4);
    assert!(attachments[0].file_path.as_ref().unwrap().is_file());
}

#[tokio::test]
async fn test_fetch_body_missing_message() {
    let dir = tempfile::tempdir().unwrap();
    let mock = login_and_select(&mut Builder::new(), 1)
        .write(b"A0003 UID FETCH 42 BODY[]\r\n")
        .read(b"A0003 OK FETCH completed\r\n")
        .write(b"A0004 LOGOUT\r\n")
        .read(b"* BYE logging out\r\nA0004 OK LOGOUT completed\r\n")
        .build();

    let err = retriever([mock], dir.path()).fetch_body(42).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(42)));
}

#[tokio::test]
async fn test_connection_failure() {
    let dir = tempfile::tempdir().unwrap();
    let err = retriever([], dir.path())
        .list_messages(MailboxFilter::All)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connection);
}

#[test]
fn test_composed_message_parses_back() {
    let dir = tempfile::tempdir().unwrap();
    let draft = Draft {
        to: "bob@example.com".to_string(),
        subject: "Greetings".to_string(),
        body: "Hello".to_string(),
        ..Draft::default()
    };
    let raw = build_message("alice@example.com", &draft);

    let parser = MimeParser::new(AttachmentStore::new(dir.path()));
    let parsed = parser.parse(&raw);
    assert_eq!(parsed.plain, "Hello");
    assert!(parsed.attachments.is_empty());
    assert_eq!(parser.extract(&raw).unwrap().text, "Hello");
}

const EHLO_REPLY: &[u8] = b"250-smtp.example.com\r\n250-PIPELINING\r\n250 AUTH LOGIN PLAIN\r\n";

#[tokio::test]
async fn test_send_raw() {
    let mock = Builder::new()
        .read(b"220 smtp.example.com ESMTP ready\r\n")
        .write(b"EHLO localhost\r\n")
        .read(EHLO_REPLY)
        .write(b"AUTH PLAIN AHVzZXJAZXhhbXBsZS5jb20Ac2VjcmV0\r\n")
        .read(b"235 2.7.0 Authentication successful\r\n")
        .write(b"MAIL FROM:<user@example.com>\r\n")
        .read(b"250 2.1.0 Ok\r\n")
        .write(b"RCPT TO:<bob@example.com>\r\n")
        .read(b"250 2.1.5 Ok\r\n")
        .write(b"RCPT TO:<carol@example.com>\r\n")
        .read(b"250 2.1.5 Ok\r\n")
        .write(b"DATA\r\n")
        .read(b"354 End data with <CR><LF>.<CR><LF>\r\n")
        .write(b"Subject: Hi\r\n\r\nHello\r\n.\r\n")
        .read(b"250 2.0.0 Ok: queued\r\n")
        .write(b"QUIT\r\n")
        .read(b"221 2.0.0 Bye\r\n")
        .build();

    let composer = MessageComposer::new(Scripted::new([mock]), "user@example.com", "secret");
    let recipients = ["bob@example.com".to_string(), "carol@example.com".to_string()];
    composer
        .send_raw("user@example.com", &recipients, b"Subject: Hi\r\n\r\nHello\r\n")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_send_rejected_credentials() {
    let mock = Builder::new()
        .read(b"220 smtp.example.com ESMTP ready\r\n")
        .write(b"EHLO localhost\r\n")
        .read(EHLO_REPLY)
        .write(b"AUTH PLAIN AHVzZXJAZXhhbXBsZS5jb20Ac2VjcmV0\r\n")
        .read(b"535 5.7.8 Authentication credentials invalid\r\n")
        .build();

    let composer = MessageComposer::new(Scripted::new([mock]), "user@example.com", "secret");
    let err = composer
        .send_raw("user@example.com", &["bob@example.com".to_string()], b"x")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);
}

#[tokio::test]
async fn test_send_without_recipients() {
    let composer = MessageComposer::new(Scripted::new([]), "user@example.com", "secret");
    let draft = Draft {
        to: " , ".to_string(),
        body: "Hello".to_string(),
        ..Draft::default()
    };
    let err = composer.send("user@example.com", &draft).await.unwrap_err();
    assert!(matches!(err, Error::NoRecipients));
}
