/*
 * dot_stuffer.rs
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

//! Dot stuffing for SMTP DATA (RFC 5321 §4.5.2): a '.' at the start of a
//! line is doubled; the message is terminated by CRLF "." CRLF.

/// Transparency encoder. State survives chunk boundaries, so a "\r\n."
/// sequence split across chunks is still stuffed.
pub struct DotStuffer {
    at_line_start: bool,
    tail: [u8; 2],
}

impl Default for DotStuffer {
    fn default() -> Self {
        Self { at_line_start: true, tail: [0, 0] }
    }
}

impl DotStuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the transparency-encoded form of `chunk` to `out`.
    pub fn stuff_into(&mut self, chunk: &[u8], out: &mut Vec<u8>) {
        for &b in chunk {
            if self.at_line_start && b == b'.' {
                out.push(b'.');
            }
            out.push(b);
            self.at_line_start = b == b'\n';
            self.tail = [self.tail[1], b];
        }
    }

    /// Append the DATA terminator, inserting a CRLF first when the message
    /// does not already end with one. Resets state.
    pub fn finish_into(&mut self, out: &mut Vec<u8>) {
        if self.tail != *b"\r\n" {
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b".\r\n");
        self.at_line_start = true;
        self.tail = [0, 0];
    }
}
