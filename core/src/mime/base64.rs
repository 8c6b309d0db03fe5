/*
 * base64.rs
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

//! Incremental base64 decoder for Content-Transfer-Encoding (RFC 2045).
//!
//! Attachment parts arrive in transport-sized chunks that split the base64
//! stream at arbitrary byte positions, so decoding carries quantum state
//! across chunk boundaries. CR, LF, space and tab are skipped wherever they
//! appear (MIME wraps encoded lines at 76 chars). The `base64` crate covers
//! the whole-buffer cases; it has no incremental API, hence this decoder.

/// Streaming base64 decoder. Feed chunks with [`decode_chunk`], then call
/// [`finish`] once at end-of-stream to flush any unpadded tail.
///
/// [`decode_chunk`]: Base64Decoder::decode_chunk
/// [`finish`]: Base64Decoder::finish
#[derive(Debug, Default)]
pub struct Base64Decoder {
    quantum: u32,
    bits: u8,
    done: bool,
}

fn sextet(b: u8) -> Option<u32> {
    match b {
        b'A'..=b'Z' => Some((b - b'A') as u32),
        b'a'..=b'z' => Some((b - b'a' + 26) as u32),
        b'0'..=b'9' => Some((b - b'0' + 52) as u32),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

impl Base64Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk, appending output bytes to `out`.
    /// Invalid bytes other than whitespace are skipped; padding ends decoding.
    pub fn decode_chunk(&mut self, input: &[u8], out: &mut Vec<u8>) {
        if self.done {
            return;
        }
        for &b in input {
            if b == b'=' {
                self.flush(out);
                self.done = true;
                return;
            }
            let Some(v) = sextet(b) else { continue };
            self.quantum = (self.quantum << 6) | v;
            self.bits += 6;
            if self.bits == 24 {
                out.push((self.quantum >> 16) as u8);
                out.push((self.quantum >> 8) as u8);
                out.push(self.quantum as u8);
                self.quantum = 0;
                self.bits = 0;
            }
        }
    }

    /// Flush remaining complete octets at end-of-stream (handles input that
    /// omits the trailing padding).
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        if !self.done {
            self.flush(out);
            self.done = true;
        }
    }

    fn flush(&mut self, out: &mut Vec<u8>) {
        if self.bits >= 8 {
            out.push((self.quantum >> (self.bits - 8)) as u8);
        }
        if self.bits >= 16 {
            out.push((self.quantum >> (self.bits - 16)) as u8);
        }
        self.quantum = 0;
        self.bits = 0;
    }
}
