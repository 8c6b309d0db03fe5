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

//! Async SMTP client: connect, EHLO, STARTTLS, AUTH, MAIL FROM, RCPT TO,
//! DATA/BDAT, QUIT. Pattern follows the IMAP client (stateful line protocol
//! over net streams).

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::net::{connect_implicit_tls, connect_plain};
use crate::sasl::{
    initial_client_response, login_respond_to_challenge, SaslError, SaslMechanism,
};

use super::dot_stuffer::DotStuffer;

/// SMTP client error (network, protocol, auth).
#[derive(Debug)]
pub struct SmtpClientError {
    pub message: String,
}

impl SmtpClientError {
    fn new(msg: impl Into<String>) -> Self {
        Self { message: msg.into() }
    }
}

impl std::fmt::Display for SmtpClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SmtpClientError {}

impl From<io::Error> for SmtpClientError {
    fn from(e: io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<SaslError> for SmtpClientError {
    fn from(e: SaslError) -> Self {
        Self::new(e.to_string())
    }
}

/// Parsed SMTP response (code plus one line of text per response line).
struct SmtpResponse {
    code: u16,
    lines: Vec<String>,
}

impl SmtpResponse {
    fn message(&self) -> &str {
        self.lines.last().map(String::as_str).unwrap_or("")
    }

    fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    fn reject(&self, context: &str) -> SmtpClientError {
        SmtpClientError::new(format!("{}: {} {}", context, self.code, self.message()))
    }
}

/// Read one SMTP response (single or multi-line "NNN-").
async fn read_response<S>(stream: &mut S, buf: &mut Vec<u8>) -> io::Result<SmtpResponse>
where
    S: AsyncRead + Unpin,
{
    let mut lines = Vec::new();
    loop {
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
        if line.len() >= 3 {
            let code: u16 = line[..3].parse().unwrap_or(0);
            let continuation = line.as_bytes().get(3) == Some(&b'-');
            lines.push(line.get(4..).unwrap_or("").trim().to_string());
            if !continuation {
                return Ok(SmtpResponse { code, lines });
            }
        }
    }
}

async fn write_line<S>(stream: &mut S, line: &[u8]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(line).await?;
    stream.write_all(b"\r\n").await?;
    stream.flush().await?;
    Ok(())
}

/// EHLO capability scan: (starttls, auth mechanisms, chunking).
async fn ehlo<S>(
    stream: &mut S,
    read_buf: &mut Vec<u8>,
    hostname: &str,
) -> Result<(bool, Vec<String>, bool), SmtpClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_line(stream, format!("EHLO {}", hostname).as_bytes()).await?;
    let r = read_response(stream, read_buf).await?;
    if !r.is_success() {
        return Err(r.reject("EHLO failed"));
    }
    let mut starttls = false;
    let mut auth_methods = Vec::new();
    let mut chunking = false;
    for line in &r.lines {
        let upper = line.to_uppercase();
        if upper == "STARTTLS" {
            starttls = true;
        } else if upper == "CHUNKING" {
            chunking = true;
        } else if let Some(rest) = upper.strip_prefix("AUTH ") {
            auth_methods.extend(rest.split_whitespace().map(String::from));
        }
    }
    Ok((starttls, auth_methods, chunking))
}

fn pick_mechanism(auth_methods: &[String]) -> SaslMechanism {
    if auth_methods.iter().any(|m| m == "PLAIN") {
        return SaslMechanism::Plain;
    }
    auth_methods
        .iter()
        .find_map(|m| SaslMechanism::from_name(m))
        .unwrap_or(SaslMechanism::Plain)
}

/// AUTH with PLAIN (initial response) or LOGIN (challenge per field).
async fn do_auth<S>(
    stream: &mut S,
    read_buf: &mut Vec<u8>,
    mechanism: SaslMechanism,
    user: &str,
    password: &str,
) -> Result<(), SmtpClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let initial = initial_client_response(mechanism, "", user, password);
    let cmd = if initial.is_empty() {
        format!("AUTH {}", mechanism.name())
    } else {
        format!("AUTH {} {}", mechanism.name(), initial)
    };
    write_line(stream, cmd.as_bytes()).await?;

    loop {
        let r = read_response(stream, read_buf).await?;
        match r.code {
            235 => return Ok(()),
            334 => {
                let response = login_respond_to_challenge(r.message(), user, password)?;
                write_line(stream, response.as_bytes()).await?;
            }
            _ => return Err(r.reject("auth failed")),
        }
    }
}

/// MAIL FROM, RCPT TO per recipient, then DATA (dot-stuffed) or BDAT.
async fn send_transaction<S>(
    stream: &mut S,
    read_buf: &mut Vec<u8>,
    from: &str,
    recipients: &[String],
    message: &[u8],
    use_bdat: bool,
) -> Result<(), SmtpClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    if recipients.is_empty() {
        return Err(SmtpClientError::new("no recipients"));
    }
    write_line(stream, format!("MAIL FROM:<{}>", from).as_bytes()).await?;
    let r = read_response(stream, read_buf).await?;
    if !r.is_success() {
        return Err(r.reject("MAIL FROM failed"));
    }

    for rcpt in recipients {
        write_line(stream, format!("RCPT TO:<{}>", rcpt).as_bytes()).await?;
        let r = read_response(stream, read_buf).await?;
        if !r.is_success() && r.code != 251 && r.code != 252 {
            return Err(r.reject("RCPT TO failed"));
        }
    }

    if use_bdat {
        write_line(stream, format!("BDAT {} LAST", message.len()).as_bytes()).await?;
        stream.write_all(message).await?;
        stream.flush().await?;
    } else {
        write_line(stream, b"DATA").await?;
        let r = read_response(stream, read_buf).await?;
        if r.code != 354 {
            return Err(r.reject("DATA not accepted"));
        }
        let mut data = Vec::with_capacity(message.len() + 64);
        let mut stuffer = DotStuffer::new();
        stuffer.stuff_into(message, &mut data);
        stuffer.finish_into(&mut data);
        stream.write_all(&data).await?;
        stream.flush().await?;
    }

    let r = read_response(stream, read_buf).await?;
    if !r.is_success() {
        return Err(r.reject("message rejected"));
    }
    Ok(())
}

/// Greeting, EHLO, AUTH, transaction, QUIT over an established stream.
async fn run_session<S>(
    stream: &mut S,
    read_buf: &mut Vec<u8>,
    auth: Option<(&str, &str)>,
    ehlo_hostname: &str,
    from: &str,
    recipients: &[String],
    message: &[u8],
) -> Result<(), SmtpClientError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let r = read_response(stream, read_buf).await?;
    if r.code != 220 {
        return Err(r.reject("expected 220 greeting"));
    }
    let (_starttls, auth_methods, chunking) = ehlo(stream, read_buf, ehlo_hostname).await?;
    if let Some((user, password)) = auth {
        do_auth(stream, read_buf, pick_mechanism(&auth_methods), user, password).await?;
    }
    send_transaction(stream, read_buf, from, recipients, message, chunking).await?;
    write_line(stream, b"QUIT").await?;
    let _ = read_response(stream, read_buf).await;
    Ok(())
}

/// Send one message: connect (plain or implicit TLS), EHLO, optional
/// STARTTLS upgrade + re-EHLO, AUTH, MAIL/RCPT/DATA (BDAT when the server
/// advertises CHUNKING), QUIT.
pub async fn send_message(
    host: &str,
    port: u16,
    use_implicit_tls: bool,
    use_starttls: bool,
    auth: Option<(&str, &str)>,
    ehlo_hostname: &str,
    from: &str,
    recipients: &[String],
    message: &[u8],
) -> Result<(), SmtpClientError> {
    let mut read_buf = Vec::with_capacity(1024);

    if use_implicit_tls {
        let mut stream = connect_implicit_tls(host, port).await?;
        debug!(host, port, "smtp session (implicit tls)");
        return run_session(
            &mut stream, &mut read_buf, auth, ehlo_hostname, from, recipients, message,
        )
        .await;
    }

    let mut plain = connect_plain(host, port).await?;
    let r = read_response(&mut plain, &mut read_buf).await?;
    if r.code != 220 {
        return Err(r.reject("expected 220 greeting"));
    }
    let (starttls_capability, auth_methods, chunking) =
        ehlo(&mut plain, &mut read_buf, ehlo_hostname).await?;

    if use_starttls && starttls_capability {
        write_line(&mut plain, b"STARTTLS").await?;
        let r = read_response(&mut plain, &mut read_buf).await?;
        if r.code != 220 {
            return Err(r.reject("STARTTLS failed"));
        }
        let mut tls = plain.upgrade_to_tls(host).await?;
        debug!(host, port, "smtp session (starttls)");
        let (_starttls, auth_methods, chunking) =
            ehlo(&mut tls, &mut read_buf, ehlo_hostname).await?;
        if let Some((user, password)) = auth {
            do_auth(&mut tls, &mut read_buf, pick_mechanism(&auth_methods), user, password)
                .await?;
        }
        send_transaction(&mut tls, &mut read_buf, from, recipients, message, chunking).await?;
        write_line(&mut tls, b"QUIT").await?;
        let _ = read_response(&mut tls, &mut read_buf).await;
        return Ok(());
    }

    debug!(host, port, "smtp session (plaintext)");
    if let Some((user, password)) = auth {
        do_auth(&mut plain, &mut read_buf, pick_mechanism(&auth_methods), user, password).await?;
    }
    send_transaction(&mut plain, &mut read_buf, from, recipients, message, chunking).await?;
    write_line(&mut plain, b"QUIT").await?;
    let _ = read_response(&mut plain, &mut read_buf).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn multiline_response_parsed() {
        let input = b"250-mail.example.org\r\n250-STARTTLS\r\n250-AUTH PLAIN LOGIN\r\n250 CHUNKING\r\n".to_vec();
        let mut cursor = &input[..];
        let mut buf = Vec::new();
        let r = read_response(&mut cursor, &mut buf).await.unwrap();
        assert_eq!(r.code, 250);
        assert_eq!(r.lines.len(), 4);
        assert_eq!(r.message(), "CHUNKING");
    }

    #[tokio::test]
    async fn ehlo_scan_finds_capabilities() {
        let (mut client, mut server) = tokio::io::duplex(1024);
        tokio::spawn(async move {
            let mut buf = [0u8; 128];
            let _ = server.read(&mut buf).await.unwrap();
            server
                .write_all(b"250-hi\r\n250-STARTTLS\r\n250-AUTH PLAIN LOGIN\r\n250 CHUNKING\r\n")
                .await
                .unwrap();
        });
        let mut buf = Vec::new();
        let (starttls, auth, chunking) = ehlo(&mut client, &mut buf, "localhost").await.unwrap();
        assert!(starttls);
        assert!(chunking);
        assert_eq!(auth, vec!["PLAIN", "LOGIN"]);
    }

    #[test]
    fn mechanism_preference() {
        assert_eq!(
            pick_mechanism(&["LOGIN".into(), "PLAIN".into()]),
            SaslMechanism::Plain
        );
        assert_eq!(pick_mechanism(&["LOGIN".into()]), SaslMechanism::Login);
        assert_eq!(pick_mechanism(&[]), SaslMechanism::Plain);
    }

    #[tokio::test]
    async fn transaction_over_scripted_server() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let server_task = tokio::spawn(async move {
            let mut transcript = Vec::new();
            let mut buf = [0u8; 1024];
            // MAIL FROM
            let n = server.read(&mut buf).await.unwrap();
            transcript.extend_from_slice(&buf[..n]);
            server.write_all(b"250 ok\r\n").await.unwrap();
            // RCPT TO
            let n = server.read(&mut buf).await.unwrap();
            transcript.extend_from_slice(&buf[..n]);
            server.write_all(b"250 ok\r\n").await.unwrap();
            // DATA
            let n = server.read(&mut buf).await.unwrap();
            transcript.extend_from_slice(&buf[..n]);
            server.write_all(b"354 go ahead\r\n").await.unwrap();
            // payload until CRLF.CRLF
            loop {
                let n = server.read(&mut buf).await.unwrap();
                transcript.extend_from_slice(&buf[..n]);
                if transcript.ends_with(b"\r\n.\r\n") {
                    break;
                }
            }
            server.write_all(b"250 accepted\r\n").await.unwrap();
            transcript
        });

        let mut buf = Vec::new();
        send_transaction(
            &mut client,
            &mut buf,
            "me@example.org",
            &vec!["you@example.org".to_string()],
            b"Subject: t\r\n\r\n.hidden\r\n",
            false,
        )
        .await
        .unwrap();

        let transcript = server_task.await.unwrap();
        let text = String::from_utf8_lossy(&transcript);
        assert!(text.contains("MAIL FROM:<me@example.org>"));
        assert!(text.contains("RCPT TO:<you@example.org>"));
        // Dot stuffing applied to the leading-dot line.
        assert!(text.contains("\r\n..hidden\r\n"));
    }
}
