/*
 * console.rs
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

//! Interactive console over an owned stdin handle. Each prompt is an
//! explicit read call; no shared line-reader state between menu iterations.

use std::io;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

pub struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Console {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Print a prompt, then read one line. EOF yields an empty string.
    pub async fn read_line(&mut self, prompt: &str) -> io::Result<String> {
        println!("{}", prompt);
        self.read_raw().await
    }

    /// Like `read_line`, but an empty answer becomes None.
    pub async fn read_optional(&mut self, prompt: &str) -> io::Result<Option<String>> {
        let line = self.read_line(prompt).await?;
        Ok(Some(line).filter(|l| !l.is_empty()))
    }

    /// Read one line without printing a prompt (multi-line body input).
    pub async fn read_raw(&mut self) -> io::Result<String> {
        Ok(self.lines.next_line().await?.unwrap_or_default())
    }
}
