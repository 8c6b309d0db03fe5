/*
 * fetch.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Lettera, an interactive terminal email client.
 *
 * Lettera is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Lettera is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Lettera.  If not, see <http://www.gnu.org/licenses/>.
 */

//! FETCH response drivers.
//!
//! A batch FETCH response interleaves response text with `{N}` literals, one
//! per requested section, across several physical lines:
//!
//! ```text
//! * 3 FETCH (UID 7 BODYSTRUCTURE (...) BODY[HEADER.FIELDS (...)] {52}
//! <52 bytes> BODY[TEXT] {1024}
//! <1024 bytes>)
//! ```
//!
//! `run_fetch_session` scans the items incrementally and forwards everything
//! into the fetch-session channels: one message sub-stream per `* n FETCH`,
//! one chunked section stream per `BODY[...]` literal. Literal bytes are
//! streamed in bounded chunks, never held whole in memory here.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::fetch::{FetchAttributes, MessageSender, SectionId, SessionSender};

use super::bodystructure::parse_body_structure;
use super::client::{
    parse_response_line, read_line_literal_size, read_literal_chunked, write_line,
    ImapClientError, Status,
};

/// Drive one batch FETCH command, emitting fetch-session events.
/// Returns once the tagged response arrives; Err on NO/BAD or transport loss.
pub(crate) async fn run_fetch_session<S>(
    stream: &mut S,
    read_buf: &mut Vec<u8>,
    tag: &str,
    command: &str,
    chunk_size: usize,
    out: &SessionSender,
) -> Result<(), ImapClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_line(stream, format!("{} {}", tag, command).as_bytes()).await?;
    loop {
        let (line, literal_size) = read_line_literal_size(stream, read_buf).await?;
        let parsed = parse_response_line(&line);
        if parsed.untagged {
            if let Some((seq, items_at)) = parse_fetch_banner(&line) {
                let msg = out.begin_message(seq);
                let rest = line[items_at..].to_string();
                scan_fetch_items(stream, read_buf, rest, chunk_size, &msg).await?;
                msg.finish();
                continue;
            }
            // Unrelated untagged data; consume a trailing literal to stay in sync.
            if let Some(n) = literal_size {
                skip_literal(stream, n, chunk_size).await?;
            }
        } else if parsed.tag.as_deref() == Some(tag) {
            return if parsed.status == Some(Status::Ok) {
                Ok(())
            } else {
                Err(ImapClientError::new(parsed.raw))
            };
        } else if let Some(n) = literal_size {
            skip_literal(stream, n, chunk_size).await?;
        }
    }
}

/// Drive a single-part fetch (`UID FETCH uid (BODY.PEEK[part])`), streaming
/// the literal to `on_chunk`.
pub(crate) async fn run_fetch_part<S, F>(
    stream: &mut S,
    read_buf: &mut Vec<u8>,
    tag: &str,
    command: &str,
    chunk_size: usize,
    on_chunk: &mut F,
) -> Result<(), ImapClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FnMut(&[u8]),
{
    write_line(stream, format!("{} {}", tag, command).as_bytes()).await?;
    loop {
        let (line, literal_size) = read_line_literal_size(stream, read_buf).await?;
        let parsed = parse_response_line(&line);
        if parsed.untagged && line.contains(" FETCH (") {
            if let Some(n) = literal_size {
                read_literal_chunked(stream, n, chunk_size, &mut *on_chunk).await?;
                // Next iteration reads the closing ")" line.
            }
        } else if parsed.tag.as_deref() == Some(tag) {
            return if parsed.status == Some(Status::Ok) {
                Ok(())
            } else {
                Err(ImapClientError::new(parsed.raw))
            };
        } else if let Some(n) = literal_size {
            skip_literal(stream, n, chunk_size).await?;
        }
    }
}

async fn skip_literal<S>(stream: &mut S, size: u32, chunk_size: usize) -> std::io::Result<()>
where
    S: AsyncRead + Unpin,
{
    read_literal_chunked(stream, size, chunk_size, |_| {}).await
}

/// "* 12 FETCH (" → (12, offset of first item).
fn parse_fetch_banner(line: &str) -> Option<(u32, usize)> {
    let after_star = line.strip_prefix("* ")?;
    let fetch_at = after_star.find(" FETCH (")?;
    let seq: u32 = after_star[..fetch_at].trim().parse().ok()?;
    Some((seq, 2 + fetch_at + " FETCH (".len()))
}

/// Scan the items of one FETCH response, reading continuation lines and
/// literals from the stream as needed. `rest` is the item text remaining on
/// the current physical line (a trailing `{N}` marker stays in the text and
/// is resolved here).
async fn scan_fetch_items<S>(
    stream: &mut S,
    read_buf: &mut Vec<u8>,
    mut rest: String,
    chunk_size: usize,
    msg: &MessageSender,
) -> Result<(), ImapClientError>
where
    S: AsyncRead + Unpin,
{
    let mut attrs = FetchAttributes::default();
    loop {
        rest = rest.trim_start().to_string();
        if rest.is_empty() {
            // The response continues on the next physical line (after a literal).
            let (line, _size) = read_line_literal_size(stream, read_buf).await?;
            rest = line;
            continue;
        }
        if rest.starts_with(')') {
            break;
        }
        if let Some(after) = strip_prefix_ci(&rest, "UID ") {
            let (number, remainder) = take_number(after);
            attrs.uid = number;
            rest = remainder;
            continue;
        }
        if let Some(after) = strip_prefix_ci(&rest, "FLAGS ") {
            let (group, remainder) = take_group(after)
                .ok_or_else(|| ImapClientError::new("malformed FLAGS item"))?;
            attrs.flags = group
                .trim_start_matches('(')
                .trim_end_matches(')')
                .split_whitespace()
                .map(|w| w.to_string())
                .collect();
            rest = remainder;
            continue;
        }
        if let Some(after) = strip_prefix_ci(&rest, "BODYSTRUCTURE ") {
            let (group, remainder) = take_group(after)
                .ok_or_else(|| ImapClientError::new("malformed BODYSTRUCTURE item"))?;
            attrs.structure = parse_body_structure(&group);
            rest = remainder;
            continue;
        }
        if let Some(after) = strip_prefix_ci(&rest, "BODY[") {
            let close = after
                .find(']')
                .ok_or_else(|| ImapClientError::new("unterminated BODY section"))?;
            let section = SectionId::from_imap_token(&after[..close]);
            let mut value = after[close + 1..].trim_start();
            // Optional partial-fetch origin "<origin>".
            if value.starts_with('<') {
                match value.find('>') {
                    Some(gt) => value = value[gt + 1..].trim_start(),
                    None => return Err(ImapClientError::new("unterminated fetch origin")),
                }
            }
            let sender = msg.open_section(section);
            if value.starts_with('{') {
                let size: u32 = value[1..]
                    .trim_end_matches('}')
                    .trim()
                    .parse()
                    .map_err(|_| ImapClientError::new("bad literal size"))?;
                read_literal_chunked(stream, size, chunk_size, |chunk| {
                    sender.chunk(Bytes::copy_from_slice(chunk));
                })
                .await?;
                drop(sender);
                rest.clear();
                continue;
            }
            if value.starts_with('"') {
                let (text, remainder) = take_quoted(value)
                    .ok_or_else(|| ImapClientError::new("unterminated quoted section value"))?;
                sender.chunk(Bytes::from(text.into_bytes()));
                drop(sender);
                rest = remainder;
                continue;
            }
            if let Some(after_nil) = strip_prefix_ci(value, "NIL") {
                drop(sender);
                rest = after_nil.to_string();
                continue;
            }
            return Err(ImapClientError::new("unsupported BODY section value"));
        }
        // Item we did not request or do not model (INTERNALDATE, ENVELOPE,
        // MODSEQ...): skip its name and one value.
        rest = skip_unknown_item(&rest)
            .ok_or_else(|| ImapClientError::new(format!("malformed FETCH item near: {}", rest)))?;
    }
    if attrs.uid.is_some() || !attrs.flags.is_empty() || attrs.structure.is_some() {
        msg.attributes(attrs);
    }
    Ok(())
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

fn take_number(s: &str) -> (Option<u32>, String) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    (s[..end].parse().ok(), s[end..].to_string())
}

/// Take one balanced parenthesized group (quote- and escape-aware).
/// Returns (group including parens, remainder).
fn take_group(s: &str) -> Option<(String, String)> {
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'(') {
        return None;
    }
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if in_quote {
            match b {
                b'\\' => i += 1,
                b'"' => in_quote = false,
                _ => {}
            }
        } else {
            match b {
                b'"' => in_quote = true,
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some((s[..=i].to_string(), s[i + 1..].to_string()));
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

/// Take one quoted string. Returns (unescaped contents, remainder).
fn take_quoted(s: &str) -> Option<(String, String)> {
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'"') {
        return None;
    }
    let mut out = String::new();
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => return Some((out, s[i + 1..].to_string())),
            b'\\' if i + 1 < bytes.len() => {
                out.push(bytes[i + 1] as char);
                i += 2;
                continue;
            }
            b => out.push(b as char),
        }
        i += 1;
    }
    None
}

/// Skip an item name plus one value of unknown shape.
fn skip_unknown_item(s: &str) -> Option<String> {
    let name_end = s.find(|c: char| c == ' ' || c == ')')?;
    let after_name = s[name_end..].trim_start();
    if after_name.starts_with('(') {
        take_group(after_name).map(|(_, remainder)| remainder)
    } else if after_name.starts_with('"') {
        take_quoted(after_name).map(|(_, remainder)| remainder)
    } else {
        let value_end = after_name
            .find(|c: char| c == ' ' || c == ')')
            .unwrap_or(after_name.len());
        Some(after_name[value_end..].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{collect_messages, FetchSession, FetchSpec};
    use crate::protocol::imap::BodyStructure;
    use tokio::io::AsyncReadExt;
    use tokio::io::AsyncWriteExt;

    #[test]
    fn banner_parsing() {
        assert_eq!(parse_fetch_banner("* 12 FETCH (UID 9)"), Some((12, 12)));
        assert_eq!(parse_fetch_banner("* OK done"), None);
    }

    #[test]
    fn group_taking_respects_quotes() {
        let (group, rest) = take_group(r#"(("a)b" 1) 2) tail"#).unwrap();
        assert_eq!(group, r#"(("a)b" 1) 2)"#);
        assert_eq!(rest, " tail");
    }

    #[test]
    fn unknown_items_are_skipped() {
        let rest = skip_unknown_item(r#"INTERNALDATE "17-Jul-2026 02:44:25 -0700" UID 4)"#).unwrap();
        assert_eq!(rest.trim_start(), "UID 4)");
        let rest = skip_unknown_item("MODSEQ (625616) UID 4)").unwrap();
        assert_eq!(rest.trim_start(), "UID 4)");
    }

    async fn script_server(
        mut server: tokio::io::DuplexStream,
        response: &'static [u8],
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            // Consume the command line first.
            let mut buf = [0u8; 512];
            let mut seen = Vec::new();
            loop {
                let n = server.read(&mut buf).await.unwrap();
                seen.extend_from_slice(&buf[..n]);
                if seen.ends_with(b"\r\n") {
                    break;
                }
            }
            server.write_all(response).await.unwrap();
        })
    }

    #[tokio::test]
    async fn batch_fetch_streams_sections_and_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let (mut client, server) = tokio::io::duplex(4096);
        let response: &[u8] = concat!(
            "* 1 FETCH (UID 101 FLAGS (\\Seen) ",
            "BODYSTRUCTURE (\"TEXT\" \"PLAIN\" NIL NIL NIL \"7BIT\" 5 1) ",
            "BODY[HEADER.FIELDS (FROM TO SUBJECT DATE)] {18}\r\n",
            "Subject: Hello\r\n\r\n",
            " BODY[TEXT] {5}\r\n",
            "world)\r\n",
            "* 2 FETCH (UID 102 BODY[TEXT] \"short\")\r\n",
            "T1 OK FETCH completed\r\n",
        )
        .as_bytes();
        let server_task = script_server(server, response).await;

        let (session, sender) = FetchSession::channel();
        let spec = FetchSpec::preview();
        let command = format!("FETCH 1:2 {}", spec.fetch_items());
        let driver = async {
            let mut read_buf = Vec::new();
            run_fetch_session(&mut client, &mut read_buf, "T1", &command, 8, &sender)
                .await
                .unwrap();
            sender.finish();
        };
        let (_, messages) = tokio::join!(driver, collect_messages(session, dir.path()));
        server_task.await.unwrap();

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].seq, 1);
        assert_eq!(messages[0].attributes.uid, Some(101));
        assert_eq!(messages[0].attributes.flags, vec!["\\Seen"]);
        assert!(matches!(
            messages[0].attributes.structure,
            Some(BodyStructure::Part(_))
        ));
        assert_eq!(
            messages[0].header.as_ref().unwrap().get("subject"),
            Some("Hello")
        );
        assert_eq!(messages[0].body.as_deref(), Some("world"));
        assert_eq!(messages[1].seq, 2);
        assert_eq!(messages[1].attributes.uid, Some(102));
        assert_eq!(messages[1].body.as_deref(), Some("short"));
    }

    #[tokio::test]
    async fn tagged_no_fails_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let (mut client, server) = tokio::io::duplex(1024);
        let server_task =
            script_server(server, b"T2 NO [LIMIT] too much\r\n").await;

        let (session, sender) = FetchSession::channel();
        let driver = async {
            let mut read_buf = Vec::new();
            let result =
                run_fetch_session(&mut client, &mut read_buf, "T2", "FETCH 1:1 (BODY.PEEK[TEXT])", 8, &sender)
                    .await;
            assert!(result.is_err());
            sender.fail(result.unwrap_err().to_string());
        };
        let (_, messages) = tokio::join!(driver, collect_messages(session, dir.path()));
        server_task.await.unwrap();
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn single_part_fetch_streams_chunks() {
        let (mut client, server) = tokio::io::duplex(1024);
        let response: &[u8] = concat!(
            "* 4 FETCH (UID 9 BODY[2] {12}\r\n",
            "aGVsbG8gd28=",
            ")\r\n",
            "T3 OK UID FETCH completed\r\n",
        )
        .as_bytes();
        let server_task = script_server(server, response).await;

        let mut read_buf = Vec::new();
        let mut collected = Vec::new();
        run_fetch_part(
            &mut client,
            &mut read_buf,
            "T3",
            "UID FETCH 9 (BODY.PEEK[2])",
            4,
            &mut |chunk: &[u8]| collected.extend_from_slice(chunk),
        )
        .await
        .unwrap();
        server_task.await.unwrap();
        assert_eq!(collected, b"aGVsbG8gd28=");
    }
}
