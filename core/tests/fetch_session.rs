/*
 * fetch_session.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * Integration test for the IMAP read path: a scripted server on a local
 * TCP socket serves a greeting, EXAMINE, a two-message batch FETCH with an
 * attachment-bearing body structure, and a single-part UID FETCH. The test
 * drives the real client end to end: connect, examine, aggregate the batch,
 * locate the attachment, download and decode it.
 *
 * Run with:
 *   cargo test -p lettera_core --test fetch_session
 */

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use lettera_core::fetch::{collect_messages, find_attachment_parts, save_attachment, FetchSession, FetchSpec};
use lettera_core::protocol::imap;

const ATTACHMENT_BYTES: &[u8] = b"attachment content bytes! \x00\x01\x02\xfe\xff";

async fn read_command(stream: &mut TcpStream) -> String {
    let mut line = Vec::new();
    let mut b = [0u8; 1];
    loop {
        let n = stream.read(&mut b).await.unwrap();
        if n == 0 {
            break;
        }
        line.push(b[0]);
        if line.ends_with(b"\r\n") {
            break;
        }
    }
    String::from_utf8_lossy(&line).trim().to_string()
}

fn fetch_response() -> Vec<u8> {
    let header_1 = b"From: alice@example.org\r\nSubject: Photos\r\n\r\n";
    let body_1 = b"see the attached cat";
    let header_2 = b"From: bob@example.org\r\nSubject: Plain note\r\n\r\n";
    let body_2 = b"nothing attached here";

    let structure_1 = concat!(
        r#"(("TEXT" "PLAIN" ("CHARSET" "UTF-8") NIL NIL "7BIT" 20 1)"#,
        r#"("IMAGE" "PNG" ("NAME" "cat.png") NIL NIL "BASE64" 44 NIL"#,
        r#" ("ATTACHMENT" ("FILENAME" "cat.png")) NIL)"#,
        r#" "MIXED" ("BOUNDARY" "b1") NIL NIL)"#,
    );
    let structure_2 = r#"("TEXT" "PLAIN" ("CHARSET" "UTF-8") NIL NIL "7BIT" 21 1)"#;

    let mut out = Vec::new();
    out.extend_from_slice(
        format!(
            "* 1 FETCH (UID 101 FLAGS (\\Seen) BODYSTRUCTURE {} \
             BODY[HEADER.FIELDS (FROM TO SUBJECT DATE)] {{{}}}\r\n",
            structure_1,
            header_1.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(header_1);
    out.extend_from_slice(format!(" BODY[TEXT] {{{}}}\r\n", body_1.len()).as_bytes());
    out.extend_from_slice(body_1);
    out.extend_from_slice(b")\r\n");

    out.extend_from_slice(
        format!(
            "* 2 FETCH (UID 102 FLAGS () BODYSTRUCTURE {} \
             BODY[HEADER.FIELDS (FROM TO SUBJECT DATE)] {{{}}}\r\n",
            structure_2,
            header_2.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(header_2);
    out.extend_from_slice(format!(" BODY[TEXT] {{{}}}\r\n", body_2.len()).as_bytes());
    out.extend_from_slice(body_2);
    out.extend_from_slice(b")\r\n");
    out
}

async fn serve_one_session(listener: TcpListener) {
    let (mut stream, _peer) = listener.accept().await.unwrap();
    stream
        .write_all(b"* OK [CAPABILITY IMAP4rev1] scripted server ready\r\n")
        .await
        .unwrap();

    loop {
        let command = read_command(&mut stream).await;
        if command.is_empty() {
            return;
        }
        let tag = command.split(' ').next().unwrap_or("*").to_string();
        let rest = command[tag.len()..].trim_start().to_uppercase();

        if rest.starts_with("EXAMINE") {
            stream
                .write_all(
                    format!(
                        "* 2 EXISTS\r\n* OK [UIDVALIDITY 7] UIDs valid\r\n{} OK [READ-ONLY] EXAMINE completed\r\n",
                        tag
                    )
                    .as_bytes(),
                )
                .await
                .unwrap();
        } else if rest.starts_with("UID FETCH") {
            let encoded = BASE64.encode(ATTACHMENT_BYTES);
            stream
                .write_all(
                    format!("* 1 FETCH (UID 101 BODY[2] {{{}}}\r\n", encoded.len()).as_bytes(),
                )
                .await
                .unwrap();
            stream.write_all(encoded.as_bytes()).await.unwrap();
            stream
                .write_all(format!(")\r\n{} OK UID FETCH completed\r\n", tag).as_bytes())
                .await
                .unwrap();
        } else if rest.starts_with("FETCH") {
            stream.write_all(&fetch_response()).await.unwrap();
            stream
                .write_all(format!("{} OK FETCH completed\r\n", tag).as_bytes())
                .await
                .unwrap();
        } else if rest.starts_with("LOGOUT") {
            stream
                .write_all(format!("* BYE closing\r\n{} OK LOGOUT completed\r\n", tag).as_bytes())
                .await
                .unwrap();
            return;
        } else {
            stream
                .write_all(format!("{} OK noop\r\n", tag).as_bytes())
                .await
                .unwrap();
        }
    }
}

#[tokio::test]
async fn read_path_end_to_end() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = tokio::spawn(serve_one_session(listener));

    let dir = tempfile::tempdir().unwrap();
    let mut session = imap::connect("127.0.0.1", port, false, false, None)
        .await
        .unwrap();

    let status = session.examine("INBOX").await.unwrap();
    assert_eq!(status.exists, 2);
    assert_eq!(status.uid_validity, Some(7));

    let spec = FetchSpec::preview();
    let (fetch_session, sender) = FetchSession::channel();
    let (fetch_result, messages) = tokio::join!(
        session.fetch_into(1, status.exists, &spec, sender),
        collect_messages(fetch_session, dir.path()),
    );
    fetch_result.unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].seq, 1);
    assert_eq!(messages[1].seq, 2);
    assert_eq!(messages[0].attributes.uid, Some(101));
    assert_eq!(
        messages[0].header.as_ref().unwrap().get("from"),
        Some("alice@example.org")
    );
    assert_eq!(messages[0].body.as_deref(), Some("see the attached cat"));
    assert_eq!(messages[1].body.as_deref(), Some("nothing attached here"));

    // Locate the attachment on message 1, none on message 2.
    let structure_1 = messages[0].attributes.structure.as_ref().unwrap();
    let parts = find_attachment_parts(structure_1);
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].part_id, "2");
    assert_eq!(parts[0].filename(), Some("cat.png"));

    let structure_2 = messages[1].attributes.structure.as_ref().unwrap();
    assert!(find_attachment_parts(structure_2).is_empty());

    // Download and decode the attachment.
    let uid = messages[0].attributes.uid.unwrap();
    let path = save_attachment(&mut session, uid, parts[0], dir.path())
        .await
        .unwrap();
    assert_eq!(path.file_name().unwrap().to_str().unwrap(), "cat.png");
    assert_eq!(std::fs::read(&path).unwrap(), ATTACHMENT_BYTES);

    session.logout().await.unwrap();
    server.await.unwrap();
}
