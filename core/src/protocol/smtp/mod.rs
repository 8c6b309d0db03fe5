/*
 * mod.rs
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

//! SMTP submission: build an RFC 5322 / MIME message from a structured
//! payload and send it (EHLO, STARTTLS, AUTH, MAIL/RCPT, DATA or BDAT).

mod build_mime;
mod client;
mod dot_stuffer;

pub use build_mime::build_message;
pub use client::{send_message, SmtpClientError};
pub use dot_stuffer::DotStuffer;

/// Structured payload for one outgoing message. The SMTP client builds the
/// wire format (RFC 5322 + MIME) from this.
#[derive(Debug, Clone, Default)]
pub struct SendPayload {
    /// Envelope and From-header address (bare `local@domain`).
    pub from: String,
    /// Display name for the From header, when any.
    pub from_display: Option<String>,
    /// Recipient addresses (To header and RCPT TO).
    pub to: Vec<String>,
    pub subject: Option<String>,
    pub body_plain: Option<String>,
    pub body_html: Option<String>,
    pub attachments: Vec<OutgoingAttachment>,
}

/// One attachment to send (content is base64-encoded on the wire).
#[derive(Debug, Clone)]
pub struct OutgoingAttachment {
    pub filename: String,
    pub mime_type: String,
    pub content: Vec<u8>,
}
