/*
 * read.rs
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

//! Read flow: open INBOX read-only, fetch the most recent messages, print
//! them, and download their attachments.

use std::path::Path;

use anyhow::Result;
use tracing::warn;

use lettera_core::fetch::{
    collect_messages, find_attachment_parts, save_attachment, FetchSession, FetchSpec,
};
use lettera_core::protocol::imap;

use crate::options::ServerOptions;

/// How many of the newest messages one read pass shows.
const WINDOW: u32 = 10;

pub async fn run_read(options: &ServerOptions, download_dir: &Path) -> Result<()> {
    println!("Fetching e-mails...");
    let mut session = imap::connect(
        &options.imap.host,
        options.imap.port,
        options.imap.secure,
        true,
        Some((options.user.as_str(), options.password.as_str())),
    )
    .await?;

    let status = session.examine("INBOX").await?;
    println!("Total {} messages", status.exists);
    if status.exists == 0 {
        session.logout().await?;
        return Ok(());
    }

    let start = if status.exists > WINDOW { status.exists - WINDOW } else { 1 };
    println!("{}:{}", start, status.exists);

    let spec = FetchSpec::preview();
    let (fetch_session, sender) = FetchSession::channel();
    let (fetch_result, messages) = tokio::join!(
        session.fetch_into(start, status.exists, &spec, sender),
        collect_messages(fetch_session, download_dir),
    );
    if let Err(error) = fetch_result {
        // The aggregator already resolved with whatever completed.
        warn!(%error, "batch fetch ended with an error");
    }

    for message in &messages {
        println!("--- MESSAGE {} ---", message.seq);
        println!("Header:");
        println!("{}", message.header_raw.as_deref().unwrap_or(""));
        println!("Body:");
        println!("{}", message.body.as_deref().unwrap_or(""));

        if let Some(structure) = &message.attributes.structure {
            let parts = find_attachment_parts(structure);
            println!("Attachments ({}):", parts.len());
            match message.attributes.uid {
                Some(uid) => {
                    for part in parts {
                        println!(
                            "> Fetching attachment {}",
                            part.filename().unwrap_or("<unnamed>")
                        );
                        match save_attachment(&mut session, uid, part, download_dir).await {
                            Ok(path) => println!("Saved {}", path.display()),
                            Err(error) => warn!(%error, "attachment fetch failed"),
                        }
                    }
                }
                None => {
                    if !parts.is_empty() {
                        warn!(seq = message.seq, "no UID in fetch response; skipping attachments");
                    }
                }
            }
        }
        println!("--- END MESSAGE {} ---", message.seq);
        println!();
    }

    session.logout().await?;
    Ok(())
}
