/*
 * main.rs
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

//! CLI entry point for `lettera`.

mod console;
mod options;
mod read;
mod send;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use console::Console;

#[derive(Parser)]
#[command(name = "lettera", version)]
struct Cli {
    /// Directory for downloaded attachments and raw body sections
    #[arg(short, long, default_value = ".", value_name = "DIR")]
    download_dir: PathBuf,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut console = Console::new();
    let options = options::prompt_options(&mut console).await?;

    loop {
        let command = console
            .read_line("Would you like to (R)ead or (S)end e-mail, or (Q)uit?")
            .await?;
        match command.trim().to_uppercase().as_str() {
            "R" => {
                if let Err(error) = read::run_read(&options, &cli.download_dir).await {
                    eprintln!("Read failed: {:#}", error);
                }
            }
            "S" => {
                if let Err(error) = send::run_send(&mut console, &options).await {
                    eprintln!("Send failed: {:#}", error);
                }
            }
            "Q" => break,
            _ => {}
        }
    }
    Ok(())
}
