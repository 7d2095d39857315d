//! Integration tests for the IMAP client.
//!
//! Server dialogs are scripted with `tokio_test::io::Builder`; every write
//! the client makes must match the script byte for byte.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use tokio::sync::mpsc;
use tokio_test::io::Builder;

use tinmail_imap::{
    Client, Error, FetchItem, FetchItems, ResponseParser, SearchCriteria, SeqNum, SequenceSet,
    Uid, UidSet,
};

const GREETING: &[u8] = b"* OK [CAPABILITY IMAP4rev1 AUTH=PLAIN] ready\r\n";

#[tokio::test]
async fn test_list_session() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGIN user@example.com secret\r\n")
        .read(b"A0001 OK LOGIN completed\r\n")
        .write(b"A0002 SELECT INBOX\r\n")
        .read(b"* 3 EXISTS\r\n* 0 RECENT\r\n")
        .read(b"A0002 OK [READ-WRITE] SELECT completed\r\n")
        .write(b"A0003 SEARCH UNSEEN\r\n")
        .read(b"* SEARCH 1 3\r\n")
        .read(b"A0003 OK SEARCH completed\r\n")
        .write(b"A0004 FETCH 1,3 (UID ENVELOPE)\r\n")
        .read(b"* 1 FETCH (UID 10 ENVELOPE (NIL \"first\" NIL NIL NIL NIL NIL NIL NIL NIL))\r\n")
        .read(b"* 3 FETCH (UID 12 ENVELOPE (NIL \"third\" NIL NIL NIL NIL NIL NIL NIL NIL))\r\n")
        .read(b"A0004 OK FETCH completed\r\n")
        .write(b"A0005 LOGOUT\r\n")
        .read(b"* BYE logging out\r\nA0005 OK LOGOUT completed\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    assert_eq!(client.capabilities().len(), 2);

    let client = client.login("user@example.com", "secret").await.unwrap();
    let (mut client, status) = client.select("INBOX").await.unwrap();
    assert_eq!(status.exists, 3);
    assert_eq!(client.mailbox(), "INBOX");

    let found = client.search(SearchCriteria::Unseen).await.unwrap();
    assert_eq!(found.len(), 2);

    let set = SequenceSet::from_numbers(&found).unwrap();
    let (tx, mut rx) = mpsc::channel(10);
    client
        .fetch_into(&set, FetchItems::envelope(), &tx)
        .await
        .unwrap();
    drop(tx);

    let mut messages = Vec::new();
    while let Some(message) = rx.recv().await {
        messages.push(message);
    }
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].0, SeqNum::new(3).unwrap());
    assert!(matches!(
        &messages[1].1[1],
        FetchItem::Envelope(env) if env.subject.as_deref() == Some("third")
    ));

    client.logout().await.unwrap();
}

#[tokio::test]
async fn test_login_rejected_is_auth_error() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGIN user \"bad pass\"\r\n")
        .read(b"A0001 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let err = client.login("user", "bad pass").await.unwrap_err();

    match err {
        Error::Auth(text) => assert_eq!(text, "Invalid credentials"),
        other => panic!("Expected Auth error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_bye_greeting_is_error() {
    let mock = Builder::new()
        .read(b"* BYE too many connections\r\n")
        .build();

    let err = Client::from_stream(mock).await.unwrap_err();
    assert!(matches!(err, Error::Bye(text) if text == "too many connections"));
}

#[tokio::test]
async fn test_select_failure_is_no() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGIN u p\r\n")
        .read(b"A0001 OK done\r\n")
        .write(b"A0002 SELECT Archive\r\n")
        .read(b"A0002 NO Mailbox does not exist\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.login("u", "p").await.unwrap();
    let err = client.select("Archive").await.unwrap_err();

    assert!(matches!(err, Error::No(text) if text == "Mailbox does not exist"));
}

#[tokio::test]
async fn test_uid_fetch_body_literal() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGIN u p\r\n")
        .read(b"A0001 OK done\r\n")
        .write(b"A0002 SELECT INBOX\r\n")
        .read(b"* 1 EXISTS\r\nA0002 OK done\r\n")
        .write(b"A0003 UID FETCH 4827 BODY[]\r\n")
        .read(b"* 1 FETCH (UID 4827 BODY[] {16}\r\n")
        .read(b"Subject: hi\r\n\r\nx")
        .read(b")\r\nA0003 OK FETCH completed\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.login("u", "p").await.unwrap();
    let (mut client, _) = client.select("INBOX").await.unwrap();

    let uid = UidSet::from(Uid::new(4827).unwrap());
    let messages = client
        .uid_fetch(&uid, FetchItems::full_body(false))
        .await
        .unwrap();

    assert_eq!(messages.len(), 1);
    let body = messages[0].1.iter().find_map(|item| match item {
        FetchItem::Body { data, .. } => data.clone(),
        _ => None,
    });
    assert_eq!(body.as_deref(), Some(&b"Subject: hi\r\n\r\nx"[..]));
}

#[tokio::test]
async fn test_fetch_into_streams_then_reports_completion() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGIN u p\r\n")
        .read(b"A0001 OK done\r\n")
        .write(b"A0002 SELECT INBOX\r\n")
        .read(b"* 2 EXISTS\r\nA0002 OK done\r\n")
        .write(b"A0003 FETCH 1:2 (UID ENVELOPE)\r\n")
        .read(b"* 1 FETCH (UID 5 ENVELOPE (NIL \"a\" NIL NIL NIL NIL NIL NIL NIL NIL))\r\n")
        .read(b"* 2 FETCH (UID 6 ENVELOPE (NIL \"b\" NIL NIL NIL NIL NIL NIL NIL NIL))\r\n")
        .read(b"A0003 NO [SERVERBUG] fetch aborted\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.login("u", "p").await.unwrap();
    let (mut client, _) = client.select("INBOX").await.unwrap();

    let (tx, mut rx) = mpsc::channel(10);
    let set = SequenceSet::range(1, 2).unwrap();
    let result = client.fetch_into(&set, FetchItems::envelope(), &tx).await;
    drop(tx);

    let mut received = Vec::new();
    while let Some((seq, _items)) = rx.recv().await {
        received.push(seq.get());
    }

    assert_eq!(received, vec![1, 2]);
    assert!(matches!(result, Err(Error::No(text)) if text == "fetch aborted"));
}

#[tokio::test]
async fn test_connection_closed_mid_command() {
    let mock = Builder::new()
        .read(GREETING)
        .write(b"A0001 LOGIN u p\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let err = client.login("u", "p").await.unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

proptest! {
    #[test]
    fn parser_never_panics(input in proptest::collection::vec(any::<u8>(), 0..256)) {
        let _ = ResponseParser::parse(&input);
    }

    #[test]
    fn exists_count_round_trips(n in 0u32..1_000_000) {
        let line = format!("* {n} EXISTS\r\n");
        let parsed = ResponseParser::parse(line.as_bytes()).unwrap();
        prop_assert_eq!(
            parsed,
            tinmail_imap::Response::Untagged(tinmail_imap::UntaggedResponse::Exists(n))
        );
    }
}
