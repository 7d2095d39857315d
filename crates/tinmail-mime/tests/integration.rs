//! Integration tests: messages built here must parse back through the
//! public parsing API.

#![allow(clippy::unwrap_used)]

use chrono::{FixedOffset, TimeZone};

use tinmail_mime::encoding::decode_rfc2047;
use tinmail_mime::{AttachmentPart, ContentType, Error, Message, MessageBuilder};

fn fixed_date() -> chrono::DateTime<FixedOffset> {
    FixedOffset::east_opt(3600)
        .unwrap()
        .with_ymd_and_hms(2024, 3, 1, 9, 30, 0)
        .unwrap()
}

#[test]
fn test_built_message_with_attachments_parses_back() {
    let pdf = b"%PDF-1.4 fake".to_vec();
    let raw = MessageBuilder::new()
        .from("alice@example.com")
        .to("bob@example.com")
        .cc("carol@example.com")
        .subject("Quarterly numbers")
        .date(fixed_date())
        .message_id("<q1@example.com>")
        .text_body("See the attached report.\nThanks!")
        .attach(AttachmentPart::new(
            "report.pdf",
            ContentType::new("application", "pdf"),
            pdf.clone(),
        ))
        .attach(AttachmentPart::new(
            "Übersicht.txt",
            ContentType::text_plain(),
            "Grüße".as_bytes().to_vec(),
        ))
        .boundary("test-boundary")
        .build()
        .unwrap();

    let message = Message::parse(&raw).unwrap();
    assert_eq!(message.from(), Some("alice@example.com"));
    assert_eq!(message.to(), Some("bob@example.com"));
    assert_eq!(message.date(), Some("Fri, 1 Mar 2024 09:30:00 +0100"));
    assert_eq!(message.message_id(), Some("<q1@example.com>"));
    assert_eq!(message.content_type().unwrap().boundary(), Some("test-boundary"));

    let parts = message.parts().unwrap();
    assert_eq!(parts.len(), 3);

    assert_eq!(parts[0].body_text().unwrap(), "See the attached report.\r\nThanks!");
    assert!(parts[0].disposition().is_none());

    let report = &parts[1];
    assert!(report.content_type().unwrap().is("application", "pdf"));
    let disposition = report.disposition().unwrap();
    assert!(disposition.is_attachment());
    assert_eq!(disposition.filename().as_deref(), Some("report.pdf"));
    assert_eq!(report.decode_body().unwrap(), pdf);

    let overview = &parts[2];
    assert_eq!(
        overview.disposition().unwrap().filename().as_deref(),
        Some("Übersicht.txt")
    );
    assert_eq!(overview.body_text().unwrap(), "Grüße");
}

#[test]
fn test_non_ascii_subject_round_trips() {
    let raw = MessageBuilder::new()
        .from("alice@example.com")
        .subject("Café au lait ☕")
        .text_body("x")
        .build()
        .unwrap();

    let message = Message::parse(&raw).unwrap();
    let encoded = message.subject().unwrap();
    assert!(encoded.starts_with("=?UTF-8?B?"));
    assert_eq!(decode_rfc2047(encoded), "Café au lait ☕");
}

#[test]
fn test_header_injection_is_rejected() {
    let err = MessageBuilder::new()
        .from("alice@example.com")
        .to("bob@example.com\r\nBcc: eve@example.com")
        .text_body("x")
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::InvalidHeader(_)));

    let err = MessageBuilder::new().text_body("x").build().unwrap_err();
    assert!(matches!(err, Error::MissingHeader(_)));
}

#[test]
fn test_nested_alternative_inside_mixed() {
    let raw = b"From: a@example.com\r\n\
        Content-Type: multipart/mixed; boundary=outer\r\n\
        \r\n\
        --outer\r\n\
        Content-Type: multipart/alternative; boundary=inner\r\n\
        \r\n\
        --inner\r\n\
        Content-Type: text/plain; charset=iso-8859-1\r\n\
        Content-Transfer-Encoding: quoted-printable\r\n\
        \r\n\
        Caf=E9\r\n\
        --inner\r\n\
        Content-Type: text/html\r\n\
        \r\n\
        <p>Caf&eacute;</p>\r\n\
        --inner--\r\n\
        --outer\r\n\
        Content-Type: image/png; name=dot.png\r\n\
        Content-Transfer-Encoding: base64\r\n\
        \r\n\
        iVBORw0KGgo=\r\n\
        --outer--\r\n";

    let message = Message::parse(raw).unwrap();
    let parts = message.parts().unwrap();
    assert_eq!(parts.len(), 2);

    let alternatives = parts[0].subparts().unwrap();
    assert_eq!(alternatives.len(), 2);
    assert_eq!(alternatives[0].body_text().unwrap(), "Café");
    assert_eq!(alternatives[1].body_text().unwrap(), "<p>Caf&eacute;</p>");

    let image = &parts[1];
    assert_eq!(image.content_type().unwrap().name(), Some("dot.png"));
    assert_eq!(image.decode_body().unwrap(), b"\x89PNG\r\n\x1a\n");
}

#[test]
fn test_multipart_without_boundary_is_an_error() {
    let raw = b"From: a@example.com\r\nContent-Type: multipart/mixed\r\n\r\nbody";
    let message = Message::parse(raw).unwrap();
    assert!(message.parts().is_err());
    assert!(Message::parse(b"  \r\n").is_err());
}
