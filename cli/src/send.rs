/*
 * send.rs
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

//! Send flow: compose a message interactively and submit it over SMTP.

use anyhow::{Context, Result};

use lettera_core::protocol::smtp::{self, build_message, OutgoingAttachment, SendPayload};

use crate::console::Console;
use crate::options::ServerOptions;

pub async fn run_send(console: &mut Console, options: &ServerOptions) -> Result<()> {
    println!("Sending an e-mail.");

    let destinations = console
        .read_line("Enter destination (comma-separated list of e-mails):")
        .await?;
    let to: Vec<String> = destinations
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let subject = console.read_line("Enter subject:").await?;
    let body_type = console.read_line("Use (T)ext or (H)tml body?").await?;

    println!("Enter body, enter <<EOF>> to terminate body:");
    let mut body = String::new();
    loop {
        let line = console.read_raw().await?;
        if line == "<<EOF>>" {
            break;
        }
        body.push_str(&line);
        body.push_str("\r\n");
    }

    let mut payload = SendPayload {
        from: options.user.clone(),
        to,
        subject: Some(subject),
        ..Default::default()
    };
    if body_type.trim().eq_ignore_ascii_case("H") {
        payload.body_html = Some(body);
    } else {
        payload.body_plain = Some(body);
    }

    if let Some(path) = console
        .read_optional("Add attachment (enter a path, or empty for none):")
        .await?
    {
        let filename = console.read_line("Add filename:").await?;
        let content = tokio::fs::read(&path)
            .await
            .with_context(|| format!("cannot read attachment {}", path))?;
        payload.attachments.push(OutgoingAttachment {
            filename,
            mime_type: "application/octet-stream".into(),
            content,
        });
    }

    let message = build_message(&payload);
    smtp::send_message(
        &options.smtp.host,
        options.smtp.port,
        options.smtp.secure,
        true,
        Some((options.user.as_str(), options.password.as_str())),
        "localhost",
        &payload.from,
        &payload.to,
        &message,
    )
    .await?;
    println!("Message sent.");
    Ok(())
}
