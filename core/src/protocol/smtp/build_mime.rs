/*
 * build_mime.rs
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

//! Build RFC 5322 / MIME bytes from a SendPayload.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;

use super::{OutgoingAttachment, SendPayload};

/// Build the full wire message: headers plus a plain, HTML,
/// multipart/alternative, or multipart/mixed body.
pub fn build_message(payload: &SendPayload) -> Vec<u8> {
    let mut out = Vec::new();

    append_header(&mut out, "From", &format_from(payload));
    append_header(&mut out, "To", &payload.to.join(", "));
    if let Some(ref subject) = payload.subject {
        append_header(&mut out, "Subject", subject);
    }
    append_header(&mut out, "Date", &Utc::now().to_rfc2822());
    append_header(&mut out, "MIME-Version", "1.0");

    if payload.attachments.is_empty() {
        append_body(&mut out, payload);
    } else {
        let boundary = make_boundary("mixed");
        append_header(
            &mut out,
            "Content-Type",
            &format!("multipart/mixed; boundary=\"{}\"", boundary),
        );
        out.extend_from_slice(b"\r\n");

        open_part(&mut out, &boundary);
        append_body(&mut out, payload);
        for attachment in &payload.attachments {
            open_part(&mut out, &boundary);
            append_attachment(&mut out, attachment);
        }
        close_multipart(&mut out, &boundary);
    }
    out
}

fn format_from(payload: &SendPayload) -> String {
    match &payload.from_display {
        Some(display) => format!(
            "\"{}\" <{}>",
            display.replace('\\', "\\\\").replace('"', "\\\""),
            payload.from
        ),
        None => payload.from.clone(),
    }
}

fn append_header(out: &mut Vec<u8>, name: &str, value: &str) {
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(b": ");
    out.extend_from_slice(value.as_bytes());
    out.extend_from_slice(b"\r\n");
}

fn append_body(out: &mut Vec<u8>, payload: &SendPayload) {
    let plain = payload.body_plain.as_deref().filter(|s| !s.is_empty());
    let html = payload.body_html.as_deref().filter(|s| !s.is_empty());
    match (plain, html) {
        (Some(plain), Some(html)) => {
            let boundary = make_boundary("alt");
            append_header(
                out,
                "Content-Type",
                &format!("multipart/alternative; boundary=\"{}\"", boundary),
            );
            out.extend_from_slice(b"\r\n");
            open_part(out, &boundary);
            append_text_part(out, "text/plain", plain);
            open_part(out, &boundary);
            append_text_part(out, "text/html", html);
            close_multipart(out, &boundary);
        }
        (None, Some(html)) => append_text_part(out, "text/html", html),
        (plain, None) => append_text_part(out, "text/plain", plain.unwrap_or("")),
    }
}

fn append_text_part(out: &mut Vec<u8>, mime_type: &str, body: &str) {
    append_header(out, "Content-Type", &format!("{}; charset=utf-8", mime_type));
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body.as_bytes());
    out.extend_from_slice(b"\r\n");
}

fn append_attachment(out: &mut Vec<u8>, attachment: &OutgoingAttachment) {
    append_header(out, "Content-Type", &attachment.mime_type);
    append_header(
        out,
        "Content-Disposition",
        &format!(
            "attachment; filename=\"{}\"",
            attachment.filename.replace('\\', "\\\\").replace('"', "\\\"")
        ),
    );
    append_header(out, "Content-Transfer-Encoding", "base64");
    out.extend_from_slice(b"\r\n");
    let encoded = BASE64.encode(&attachment.content);
    for line in encoded.as_bytes().chunks(76) {
        out.extend_from_slice(line);
        out.extend_from_slice(b"\r\n");
    }
}

fn open_part(out: &mut Vec<u8>, boundary: &str) {
    out.extend_from_slice(b"\r\n--");
    out.extend_from_slice(boundary.as_bytes());
    out.extend_from_slice(b"\r\n");
}

fn close_multipart(out: &mut Vec<u8>, boundary: &str) {
    out.extend_from_slice(b"\r\n--");
    out.extend_from_slice(boundary.as_bytes());
    out.extend_from_slice(b"--\r\n");
}

fn make_boundary(label: &str) -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("_bound_{}_{}_{}", label, std::process::id(), n)
}
