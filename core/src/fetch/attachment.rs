/*
 * attachment.rs
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

//! Attachment fetcher: single-part fetch, transfer decode, write to disk.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::mime::Base64Decoder;
use crate::protocol::imap::{BodyPart, ImapClientError, MailSession, TransferEncoding};

const FETCH_CHUNK_SIZE: usize = 8 * 1024;

/// Attachment fetch/decode/write error.
#[derive(Debug)]
pub struct AttachmentError {
    pub message: String,
}

impl AttachmentError {
    fn new(msg: impl Into<String>) -> Self {
        Self { message: msg.into() }
    }
}

impl std::fmt::Display for AttachmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AttachmentError {}

impl From<io::Error> for AttachmentError {
    fn from(e: io::Error) -> Self {
        Self::new(e.to_string())
    }
}

impl From<ImapClientError> for AttachmentError {
    fn from(e: ImapClientError) -> Self {
        Self::new(e.to_string())
    }
}

/// Fetch one attachment part of the message addressed by `uid`, decode its
/// transfer encoding, and write it under `dest_dir`. Returns the written
/// path. Transport and I/O failures reject the operation; nothing hangs.
///
/// The file is named from the part's declared filename (path components are
/// stripped), falling back to `msg-<uid>-<part>.bin`. Two attachments
/// declaring the same filename overwrite each other; that collision is
/// undefined behavior and deliberately not handled here.
pub async fn save_attachment(
    session: &mut MailSession,
    uid: u32,
    part: &BodyPart,
    dest_dir: &Path,
) -> Result<PathBuf, AttachmentError> {
    let name = attachment_file_name(uid, part);
    let path = dest_dir.join(name);

    let decode = part.encoding == TransferEncoding::Base64;
    let (tx, rx) = mpsc::unbounded_channel::<Bytes>();

    // The fetch driver pushes encoded chunks into the channel; the writer
    // future drains, decodes, and persists them. The chunk sender drops when
    // the fetch completes, which closes the channel and ends the writer.
    let fetch = session.fetch_part(uid, &part.part_id, FETCH_CHUNK_SIZE, move |chunk| {
        let _ = tx.send(Bytes::copy_from_slice(chunk));
    });
    let write = write_decoded(rx, decode, &path);

    let (fetch_result, write_result) = tokio::join!(fetch, write);
    fetch_result?;
    write_result?;
    Ok(path)
}

/// Declared filename with any path components stripped, or a deterministic
/// fallback name.
fn attachment_file_name(uid: u32, part: &BodyPart) -> String {
    part.filename()
        .map(Path::new)
        .and_then(Path::file_name)
        .and_then(|n| n.to_str())
        .map(|n| n.to_string())
        .unwrap_or_else(|| format!("msg-{}-{}.bin", uid, part.part_id))
}

/// Drain encoded chunks from `rx`, optionally decoding base64, writing the
/// result to `path`.
async fn write_decoded(
    mut rx: mpsc::UnboundedReceiver<Bytes>,
    decode_base64: bool,
    path: &Path,
) -> io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut decoder = Base64Decoder::new();
    let mut decoded = Vec::new();
    while let Some(chunk) = rx.recv().await {
        if decode_base64 {
            decoded.clear();
            decoder.decode_chunk(&chunk, &mut decoded);
            file.write_all(&decoded).await?;
        } else {
            file.write_all(&chunk).await?;
        }
    }
    if decode_base64 {
        decoded.clear();
        decoder.finish(&mut decoded);
        file.write_all(&decoded).await?;
    }
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::imap::Disposition;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    fn part_with(filename: Option<&str>, encoding: TransferEncoding) -> BodyPart {
        BodyPart {
            part_id: "2".to_string(),
            mime_type: "application".to_string(),
            mime_subtype: "octet-stream".to_string(),
            params: Vec::new(),
            encoding,
            size: None,
            disposition: Disposition::Attachment(
                filename
                    .map(|f| vec![("filename".to_string(), f.to_string())])
                    .unwrap_or_default(),
            ),
        }
    }

    #[test]
    fn filename_strips_path_components() {
        let part = part_with(Some("../../etc/passwd"), TransferEncoding::Base64);
        assert_eq!(attachment_file_name(9, &part), "passwd");
    }

    #[test]
    fn filename_falls_back_to_uid_and_part() {
        let part = part_with(None, TransferEncoding::Base64);
        assert_eq!(attachment_file_name(9, &part), "msg-9-2.bin");
    }

    #[tokio::test]
    async fn base64_chunks_round_trip_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let original: Vec<u8> = (0u8..=255).collect();
        let encoded = BASE64.encode(&original);

        let (tx, rx) = mpsc::unbounded_channel();
        for chunk in encoded.as_bytes().chunks(7) {
            tx.send(Bytes::copy_from_slice(chunk)).unwrap();
        }
        drop(tx);

        write_decoded(rx, true, &path).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), original);
    }

    #[tokio::test]
    async fn raw_chunks_written_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.txt");

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Bytes::from_static(b"no ")).unwrap();
        tx.send(Bytes::from_static(b"encoding")).unwrap();
        drop(tx);

        write_decoded(rx, false, &path).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"no encoding");
    }
}
