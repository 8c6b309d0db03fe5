/*
 * options.rs
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

//! Server endpoints and credentials, collected interactively with built-in
//! presets for localhost and Gmail.

use anyhow::{Context, Result};

use crate::console::Console;

#[derive(Debug, Clone)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub secure: bool,
}

#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub imap: Endpoint,
    pub smtp: Endpoint,
    pub user: String,
    pub password: String,
}

fn localhost_preset() -> (Endpoint, Endpoint) {
    (
        Endpoint { host: "127.0.0.1".into(), port: 143, secure: false },
        Endpoint { host: "127.0.0.1".into(), port: 25, secure: false },
    )
}

fn gmail_preset() -> (Endpoint, Endpoint) {
    (
        Endpoint { host: "imap.gmail.com".into(), port: 993, secure: true },
        Endpoint { host: "smtp.gmail.com".into(), port: 465, secure: true },
    )
}

async fn prompt_endpoint(console: &mut Console, label: &str) -> Result<Endpoint> {
    let host = console.read_line(&format!("Enter {} host:", label)).await?;
    let secure = console
        .read_line(&format!("Secure {} (yes/no):", label))
        .await?
        .eq_ignore_ascii_case("yes");
    let port_line = console.read_line(&format!("Enter {} port:", label)).await?;
    let port = port_line
        .trim()
        .parse()
        .with_context(|| format!("invalid {} port: {}", label, port_line))?;
    Ok(Endpoint { host, port, secure })
}

/// Collect server settings and credentials.
pub async fn prompt_options(console: &mut Console) -> Result<ServerOptions> {
    let choice = console
        .read_line("Use (L)ocalhost, (G)mail or (C)ustom servers?")
        .await?;
    let (imap, smtp) = match choice.trim().to_uppercase().as_str() {
        "L" => localhost_preset(),
        "G" => gmail_preset(),
        _ => (
            prompt_endpoint(console, "IMAP").await?,
            prompt_endpoint(console, "SMTP").await?,
        ),
    };
    let user = console.read_line("Enter e-mail address:").await?;
    let password = console.read_line("Enter password:").await?;
    Ok(ServerOptions { imap, smtp, user, password })
}
