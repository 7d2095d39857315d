//! Integration tests for the SMTP client against scripted servers.

#![allow(clippy::unwrap_used)]

use tokio_test::io::Builder;

use tinmail_smtp::{Address, Client, Error};

const EHLO_REPLY: &[u8] = b"250-smtp.example.com\r\n250-PIPELINING\r\n250-SIZE 35882577\r\n250 AUTH LOGIN PLAIN\r\n";

#[tokio::test]
async fn test_full_submission() {
    let mock = Builder::new()
        .read(b"220 smtp.example.com ESMTP ready\r\n")
        .write(b"EHLO localhost\r\n")
        .read(EHLO_REPLY)
        // base64("\0user@example.com\0secret")
        .write(b"AUTH PLAIN AHVzZXJAZXhhbXBsZS5jb20Ac2VjcmV0\r\n")
        .read(b"235 2.7.0 Authentication successful\r\n")
        .write(b"MAIL FROM:<user@example.com>\r\n")
        .read(b"250 2.1.0 Ok\r\n")
        .write(b"RCPT TO:<a@example.org>\r\n")
        .read(b"250 2.1.5 Ok\r\n")
        .write(b"RCPT TO:<b@example.org>\r\n")
        .read(b"250 2.1.5 Ok\r\n")
        .write(b"DATA\r\n")
        .read(b"354 End data with <CR><LF>.<CR><LF>\r\n")
        .write(b"Subject: Hi\r\n\r\nHello\r\n..dots\r\n.\r\n")
        .read(b"250 2.0.0 Ok: queued\r\n")
        .write(b"QUIT\r\n")
        .read(b"221 2.0.0 Bye\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.ehlo("localhost").await.unwrap();
    assert_eq!(client.server_info().max_message_size(), Some(35_882_577));

    let client = client.auth_plain("user@example.com", "secret").await.unwrap();
    let client = client
        .mail_from(Address::new("user@example.com").unwrap())
        .await
        .unwrap();
    let client = client
        .rcpt_to(Address::new("a@example.org").unwrap())
        .await
        .unwrap();
    let client = client
        .rcpt_to(Address::new("b@example.org").unwrap())
        .await
        .unwrap();
    let client = client.data().await.unwrap();
    let client = client
        .send_message(b"Subject: Hi\n\nHello\n.dots\n")
        .await
        .unwrap();

    client.quit().await.unwrap();
}

#[tokio::test]
async fn test_rejected_credentials() {
    let mock = Builder::new()
        .read(b"220 smtp.example.com ESMTP\r\n")
        .write(b"EHLO localhost\r\n")
        .read(EHLO_REPLY)
        .write(b"AUTH PLAIN AHUAcA==\r\n")
        .read(b"535 5.7.8 Authentication credentials invalid\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.ehlo("localhost").await.unwrap();
    let err = client.auth_plain("u", "p").await.unwrap_err();

    assert!(err.is_permanent());
    assert!(matches!(err, Error::Reply { code: 535, .. }));
}

#[tokio::test]
async fn test_rejected_recipient() {
    let mock = Builder::new()
        .read(b"220 smtp.example.com ESMTP\r\n")
        .write(b"EHLO localhost\r\n")
        .read(EHLO_REPLY)
        .write(b"AUTH PLAIN AHUAcA==\r\n")
        .read(b"235 ok\r\n")
        .write(b"MAIL FROM:<u@example.com>\r\n")
        .read(b"250 ok\r\n")
        .write(b"RCPT TO:<nobody@example.org>\r\n")
        .read(b"450 4.2.1 Mailbox busy\r\n")
        .build();

    let client = Client::from_stream(mock).await.unwrap();
    let client = client.ehlo("localhost").await.unwrap();
    let client = client.auth_plain("u", "p").await.unwrap();
    let client = client
        .mail_from(Address::new("u@example.com").unwrap())
        .await
        .unwrap();
    let err = client
        .rcpt_to(Address::new("nobody@example.org").unwrap())
        .await
        .unwrap_err();

    assert!(err.is_transient());
}
