/*
 * client.rs
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

//! Async IMAP client: connect, CAPABILITY, STARTTLS (when advertised),
//! AUTHENTICATE PLAIN / LOGIN, EXAMINE, FETCH, LOGOUT.
//! Pattern follows the SMTP client (stateful line protocol over net streams).

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::fetch::{FetchSpec, SessionSender};
use crate::net::{connect_implicit_tls, connect_plain, PlainStream, TlsStream};
use crate::sasl::{initial_client_response, SaslError, SaslMechanism};

use super::fetch::{run_fetch_part, run_fetch_session};

const FETCH_CHUNK_SIZE: usize = 8 * 1024;

/// IMAP client error (network, protocol, auth).
#[derive(Debug)]
pub struct ImapClientError {
    pub message: String,
}

impl ImapClientError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { message: msg.into() }
    }
}

impl std::fmt::Display for ImapClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ImapClientError {}

impl From<io::Error> for ImapClientError {
    fn from(e: io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<SaslError> for ImapClientError {
    fn from(e: SaslError) -> Self {
        Self::new(e.to_string())
    }
}

/// One parsed response line (untagged `*`, continuation `+`, or tagged).
#[derive(Debug, Clone)]
pub(crate) struct ResponseLine {
    pub raw: String,
    pub tag: Option<String>,
    pub untagged: bool,
    pub continuation: bool,
    pub status: Option<Status>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Status {
    Ok,
    No,
    Bad,
}

fn status_of(rest: &str) -> Option<Status> {
    if rest.starts_with("OK ") || rest == "OK" {
        Some(Status::Ok)
    } else if rest.starts_with("NO ") || rest == "NO" {
        Some(Status::No)
    } else if rest.starts_with("BAD ") || rest == "BAD" {
        Some(Status::Bad)
    } else {
        None
    }
}

/// Parse "* OK ...", "+ ...", or "A001 OK ...".
pub(crate) fn parse_response_line(s: &str) -> ResponseLine {
    let raw = s.to_string();
    if let Some(rest) = s.strip_prefix('*') {
        return ResponseLine {
            raw,
            tag: None,
            untagged: true,
            continuation: false,
            status: status_of(rest.trim_start()),
        };
    }
    if s.starts_with('+') {
        return ResponseLine {
            raw,
            tag: None,
            untagged: false,
            continuation: true,
            status: None,
        };
    }
    let mut split = s.splitn(2, ' ');
    let tag = split.next().unwrap_or("").to_string();
    let rest = split.next().unwrap_or("");
    ResponseLine {
        raw,
        tag: Some(tag).filter(|t| !t.is_empty()),
        untagged: false,
        continuation: false,
        status: status_of(rest),
    }
}

/// Read one line up to CRLF. If the line ends with an IMAP literal marker
/// `{N}`, return (line_text, Some(N)) without consuming the N bytes so the
/// caller can stream them.
pub(crate) async fn read_line_literal_size<S>(
    stream: &mut S,
    buf: &mut Vec<u8>,
) -> io::Result<(String, Option<u32>)>
where
    S: AsyncRead + Unpin,
{
    buf.clear();
    loop {
        let mut b = [0u8; 1];
        let n = stream.read(&mut b).await?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"));
        }
        buf.push(b[0]);
        if buf.len() >= 2 && buf[buf.len() - 2..] == *b"\r\n" {
            break;
        }
    }
    let line = String::from_utf8_lossy(&buf[..buf.len() - 2]).trim().to_string();
    let literal_size = line
        .rfind('{')
        .map(|open| &line[open + 1..])
        .filter(|rest| rest.ends_with('}'))
        .and_then(|rest| rest.trim_end_matches('}').trim().parse().ok());
    Ok((line, literal_size))
}

/// Read one line and, when it announces a literal, read the whole literal.
pub(crate) async fn read_line<S>(
    stream: &mut S,
    buf: &mut Vec<u8>,
) -> io::Result<(String, Option<Vec<u8>>)>
where
    S: AsyncRead + Unpin,
{
    let (line, literal_size) = read_line_literal_size(stream, buf).await?;
    if let Some(n) = literal_size {
        let mut literal = vec![0u8; n as usize];
        stream.read_exact(&mut literal).await?;
        return Ok((line, Some(literal)));
    }
    Ok((line, None))
}

/// Read exactly `size` literal bytes in chunks of at most `chunk_size`,
/// handing each to `on_chunk`.
pub(crate) async fn read_literal_chunked<S, F>(
    stream: &mut S,
    size: u32,
    chunk_size: usize,
    mut on_chunk: F,
) -> io::Result<()>
where
    S: AsyncRead + Unpin,
    F: FnMut(&[u8]),
{
    let mut remaining = size as usize;
    let mut buf = vec![0u8; chunk_size.min(remaining.max(1))];
    while remaining > 0 {
        let to_read = buf.len().min(remaining);
        let n = stream.read(&mut buf[..to_read]).await?;
        if n == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"));
        }
        on_chunk(&buf[..n]);
        remaining -= n;
    }
    Ok(())
}

/// Write a line (no CRLF) then CRLF, flushing.
pub(crate) async fn write_line<S>(stream: &mut S, line: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(line).await?;
    stream.write_all(b"\r\n").await?;
    stream.flush().await?;
    Ok(())
}

/// Generate next tag (A0001, A0002, ...).
pub(crate) fn next_tag() -> String {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed) % 9999 + 1;
    format!("A{:04}", n)
}

pub(crate) fn quote_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Parse "* CAPABILITY ..." or the [CAPABILITY ...] code in an OK line.
fn parse_capabilities(line: &str) -> Vec<String> {
    let body = line
        .strip_prefix("* CAPABILITY ")
        .or_else(|| {
            line.find("[CAPABILITY ")
                .map(|i| &line[i + "[CAPABILITY ".len()..])
                .and_then(|t| t.split(']').next())
        })
        .unwrap_or("");
    body.split_whitespace().map(|w| w.to_uppercase()).collect()
}

fn has_capability(caps: &[String], name: &str) -> bool {
    caps.iter().any(|c| c.eq_ignore_ascii_case(name))
}

/// Send a command and read until its tagged response.
/// Returns (untagged lines with optional literals, tagged line).
async fn send_command<S>(
    stream: &mut S,
    read_buf: &mut Vec<u8>,
    tag: &str,
    command: &str,
) -> Result<(Vec<(ResponseLine, Option<Vec<u8>>)>, ResponseLine), ImapClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_line(stream, format!("{} {}", tag, command).as_bytes()).await?;
    let mut untagged = Vec::new();
    loop {
        let (line_str, literal) = read_line(stream, read_buf).await?;
        let line = parse_response_line(&line_str);
        if line.tag.as_deref() == Some(tag) {
            return Ok((untagged, line));
        }
        untagged.push((line, literal));
    }
}

/// Read the server greeting (* OK ...).
async fn read_greeting<S>(stream: &mut S, read_buf: &mut Vec<u8>) -> Result<String, ImapClientError>
where
    S: AsyncRead + Unpin,
{
    let (line, _literal) = read_line(stream, read_buf).await?;
    if !line.starts_with("* OK") && !line.starts_with("* PREAUTH") {
        return Err(ImapClientError::new(format!("expected * OK greeting, got: {}", line)));
    }
    Ok(line)
}

/// Capabilities from the greeting's response code, or via CAPABILITY.
async fn ensure_capabilities<S>(
    stream: &mut S,
    read_buf: &mut Vec<u8>,
    greeting: Option<&str>,
) -> Result<Vec<String>, ImapClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if let Some(line) = greeting {
        let caps = parse_capabilities(line);
        if !caps.is_empty() {
            return Ok(caps);
        }
    }
    let tag = next_tag();
    let (untagged, final_line) = send_command(stream, read_buf, &tag, "CAPABILITY").await?;
    if final_line.status != Some(Status::Ok) {
        return Err(ImapClientError::new(final_line.raw));
    }
    for (line, _literal) in untagged {
        if line.raw.starts_with("* CAPABILITY ") {
            return Ok(parse_capabilities(&line.raw));
        }
    }
    Ok(Vec::new())
}

/// AUTHENTICATE PLAIN via the continuation flow (works with or without
/// SASL-IR support on the server side).
async fn authenticate_plain<S>(
    stream: &mut S,
    read_buf: &mut Vec<u8>,
    user: &str,
    pass: &str,
) -> Result<(), ImapClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let tag = next_tag();
    write_line(stream, format!("{} AUTHENTICATE PLAIN", tag).as_bytes()).await?;
    loop {
        let (line_str, _literal) = read_line(stream, read_buf).await?;
        let line = parse_response_line(&line_str);
        if line.continuation {
            let response = initial_client_response(SaslMechanism::Plain, "", user, pass);
            write_line(stream, response.as_bytes()).await?;
            continue;
        }
        if line.tag.as_deref() == Some(tag.as_str()) {
            return match line.status {
                Some(Status::Ok) => Ok(()),
                _ => Err(ImapClientError::new(line.raw)),
            };
        }
    }
}

/// LOGIN with quoted credentials (fallback when AUTH=PLAIN is absent).
async fn login<S>(
    stream: &mut S,
    read_buf: &mut Vec<u8>,
    user: &str,
    pass: &str,
) -> Result<(), ImapClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let tag = next_tag();
    let cmd = format!("LOGIN {} {}", quote_string(user), quote_string(pass));
    let (_untagged, final_line) = send_command(stream, read_buf, &tag, &cmd).await?;
    match final_line.status {
        Some(Status::Ok) => Ok(()),
        _ => Err(ImapClientError::new(final_line.raw)),
    }
}

async fn do_auth<S>(
    stream: &mut S,
    read_buf: &mut Vec<u8>,
    caps: &[String],
    user: &str,
    pass: &str,
) -> Result<(), ImapClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if has_capability(caps, "AUTH=PLAIN") {
        authenticate_plain(stream, read_buf, user, pass).await
    } else {
        login(stream, read_buf, user, pass).await
    }
}

/// Result of EXAMINE: message count and UIDVALIDITY when reported.
#[derive(Debug)]
pub struct MailboxStatus {
    pub exists: u32,
    pub uid_validity: Option<u32>,
}

/// Connect and authenticate; returns a session for EXAMINE and FETCH.
/// STARTTLS is used on plain connections when the server advertises it,
/// unless `use_starttls` is false.
pub async fn connect(
    host: &str,
    port: u16,
    use_implicit_tls: bool,
    use_starttls: bool,
    auth: Option<(&str, &str)>,
) -> Result<MailSession, ImapClientError> {
    if use_implicit_tls {
        let mut stream = connect_implicit_tls(host, port).await?;
        let mut read_buf = Vec::with_capacity(4096);
        let greeting = read_greeting(&mut stream, &mut read_buf).await?;
        let caps = ensure_capabilities(&mut stream, &mut read_buf, Some(greeting.as_str())).await?;
        if let Some((user, pass)) = auth {
            do_auth(&mut stream, &mut read_buf, &caps, user, pass).await?;
        }
        debug!(host, port, "imap session established (implicit tls)");
        return Ok(MailSession::Tls { stream, read_buf, capabilities: caps });
    }

    let mut plain = connect_plain(host, port).await?;
    let mut read_buf = Vec::with_capacity(4096);
    let greeting = read_greeting(&mut plain, &mut read_buf).await?;
    let caps = ensure_capabilities(&mut plain, &mut read_buf, Some(greeting.as_str())).await?;

    if use_starttls && has_capability(&caps, "STARTTLS") {
        let tag = next_tag();
        let (_untagged, final_line) = send_command(&mut plain, &mut read_buf, &tag, "STARTTLS").await?;
        if final_line.status != Some(Status::Ok) {
            return Err(ImapClientError::new(final_line.raw));
        }
        let mut tls = plain.upgrade_to_tls(host).await?;
        let caps = ensure_capabilities(&mut tls, &mut read_buf, None).await?;
        if let Some((user, pass)) = auth {
            do_auth(&mut tls, &mut read_buf, &caps, user, pass).await?;
        }
        debug!(host, port, "imap session established (starttls)");
        return Ok(MailSession::Tls { stream: tls, read_buf, capabilities: caps });
    }

    if let Some((user, pass)) = auth {
        do_auth(&mut plain, &mut read_buf, &caps, user, pass).await?;
    }
    debug!(host, port, "imap session established (plaintext)");
    Ok(MailSession::Plain { stream: plain, read_buf, capabilities: caps })
}

/// Authenticated IMAP session (plain or TLS).
pub enum MailSession {
    Plain {
        stream: PlainStream,
        read_buf: Vec<u8>,
        capabilities: Vec<String>,
    },
    Tls {
        stream: TlsStream,
        read_buf: Vec<u8>,
        capabilities: Vec<String>,
    },
}

impl MailSession {
    pub fn capabilities(&self) -> &[String] {
        match self {
            MailSession::Plain { capabilities, .. } => capabilities,
            MailSession::Tls { capabilities, .. } => capabilities,
        }
    }

    /// EXAMINE a mailbox (read-only SELECT). Returns message count and
    /// UIDVALIDITY.
    pub async fn examine(&mut self, mailbox: &str) -> Result<MailboxStatus, ImapClientError> {
        let tag = next_tag();
        let cmd = format!("EXAMINE {}", quote_string(mailbox));
        let (untagged, final_line) = match self {
            MailSession::Plain { stream, read_buf, .. } => {
                send_command(stream, read_buf, &tag, &cmd).await?
            }
            MailSession::Tls { stream, read_buf, .. } => {
                send_command(stream, read_buf, &tag, &cmd).await?
            }
        };
        if final_line.status != Some(Status::Ok) {
            return Err(ImapClientError::new(final_line.raw));
        }
        let mut exists = 0u32;
        let mut uid_validity = None;
        for (line, _literal) in untagged {
            let rest = line.raw.trim_start_matches('*').trim_start();
            if let Some(n) = rest.strip_suffix(" EXISTS").and_then(|s| s.trim().parse().ok()) {
                exists = n;
            } else if let Some(after) = rest.find("[UIDVALIDITY ").map(|i| &rest[i + 13..]) {
                uid_validity = after
                    .split_whitespace()
                    .next()
                    .and_then(|s| s.trim_end_matches(']').parse().ok());
            }
        }
        Ok(MailboxStatus { exists, uid_validity })
    }

    /// Batch fetch: sends `FETCH start:end (...)` and drives the response
    /// into the session sender. Events stream while the response is read, so
    /// run this joined with the aggregator consuming the paired
    /// `FetchSession`. On transport or protocol failure the sender is failed
    /// (in-flight message streams stay valid) and the error is returned.
    pub async fn fetch_into(
        &mut self,
        seq_start: u32,
        seq_end: u32,
        spec: &FetchSpec,
        out: SessionSender,
    ) -> Result<(), ImapClientError> {
        let tag = next_tag();
        let cmd = format!("FETCH {}:{} {}", seq_start, seq_end, spec.fetch_items());
        let result = match self {
            MailSession::Plain { stream, read_buf, .. } => {
                run_fetch_session(stream, read_buf, &tag, &cmd, FETCH_CHUNK_SIZE, &out).await
            }
            MailSession::Tls { stream, read_buf, .. } => {
                run_fetch_session(stream, read_buf, &tag, &cmd, FETCH_CHUNK_SIZE, &out).await
            }
        };
        match result {
            Ok(()) => {
                out.finish();
                Ok(())
            }
            Err(e) => {
                out.fail(e.to_string());
                Err(e)
            }
        }
    }

    /// Fetch a single body part by UID, streaming literal chunks to
    /// `on_chunk` as they are read from the socket.
    pub async fn fetch_part<F>(
        &mut self,
        uid: u32,
        part_id: &str,
        chunk_size: usize,
        mut on_chunk: F,
    ) -> Result<(), ImapClientError>
    where
        F: FnMut(&[u8]),
    {
        let tag = next_tag();
        let cmd = format!("UID FETCH {} (BODY.PEEK[{}])", uid, part_id);
        match self {
            MailSession::Plain { stream, read_buf, .. } => {
                run_fetch_part(stream, read_buf, &tag, &cmd, chunk_size, &mut on_chunk).await
            }
            MailSession::Tls { stream, read_buf, .. } => {
                run_fetch_part(stream, read_buf, &tag, &cmd, chunk_size, &mut on_chunk).await
            }
        }
    }

    /// LOGOUT. The connection is unusable afterwards.
    pub async fn logout(&mut self) -> Result<(), ImapClientError> {
        let tag = next_tag();
        let result = match self {
            MailSession::Plain { stream, read_buf, .. } => {
                send_command(stream, read_buf, &tag, "LOGOUT").await
            }
            MailSession::Tls { stream, read_buf, .. } => {
                send_command(stream, read_buf, &tag, "LOGOUT").await
            }
        };
        // BYE plus tagged OK; a server that just drops the connection is fine too.
        if let Err(error) = result {
            debug!(%error, "logout");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_untagged_and_tagged_lines() {
        let line = parse_response_line("* OK Dovecot ready.");
        assert!(line.untagged);
        assert_eq!(line.status, Some(Status::Ok));

        let line = parse_response_line("A0007 NO [AUTHENTICATIONFAILED] oops");
        assert_eq!(line.tag.as_deref(), Some("A0007"));
        assert_eq!(line.status, Some(Status::No));

        let line = parse_response_line("+ ");
        assert!(line.continuation);
    }

    #[test]
    fn capability_parsing_from_greeting_code() {
        let caps =
            parse_capabilities("* OK [CAPABILITY IMAP4rev1 STARTTLS AUTH=PLAIN] ready");
        assert!(has_capability(&caps, "STARTTLS"));
        assert!(has_capability(&caps, "AUTH=PLAIN"));
        assert!(!has_capability(&caps, "IDLE"));
    }

    #[test]
    fn capability_parsing_from_untagged_line() {
        let caps = parse_capabilities("* CAPABILITY IMAP4rev2 IDLE auth=login");
        assert!(has_capability(&caps, "IDLE"));
        assert!(has_capability(&caps, "AUTH=LOGIN"));
    }

    #[test]
    fn quoting_escapes_backslash_and_quote() {
        assert_eq!(quote_string(r#"a"b\c"#), r#""a\"b\\c""#);
    }

    #[tokio::test]
    async fn line_reader_detects_literal_marker() {
        let input = b"* 1 FETCH (BODY[TEXT] {5}\r\nhello)\r\n".to_vec();
        let mut cursor = &input[..];
        let mut buf = Vec::new();
        let (line, size) = read_line_literal_size(&mut cursor, &mut buf).await.unwrap();
        assert_eq!(line, "* 1 FETCH (BODY[TEXT] {5}");
        assert_eq!(size, Some(5));

        let mut collected = Vec::new();
        read_literal_chunked(&mut cursor, 5, 2, |c| collected.extend_from_slice(c))
            .await
            .unwrap();
        assert_eq!(collected, b"hello");

        let (line, size) = read_line_literal_size(&mut cursor, &mut buf).await.unwrap();
        assert_eq!(line, ")");
        assert_eq!(size, None);
    }
}
