/*
 * collector.rs
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

//! Part collector: accumulates one message's section streams and classifies
//! them when each stream ends.

use std::path::PathBuf;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::warn;

use super::session::MessageEvent;
use super::{Message, SectionId};
use crate::mime::HeaderFields;

/// Collects the sections of a single in-flight message. Sections of other
/// messages never pass through here; interleaving across messages is handled
/// one level up by giving each message its own collector.
pub(crate) struct PartCollector {
    seq: u32,
    download_dir: PathBuf,
}

impl PartCollector {
    pub(crate) fn new(seq: u32, download_dir: PathBuf) -> Self {
        Self { seq, download_dir }
    }

    /// Consume the message's event stream until it closes; returns the
    /// completed Message. Buffered sections (header fields, body text) are
    /// drained in arrival order and classified at end-of-stream. Raw numbered
    /// parts are handed to a detached writer task so a slow disk never blocks
    /// aggregation of sibling sections.
    pub(crate) async fn collect(
        self,
        mut events: mpsc::UnboundedReceiver<MessageEvent>,
    ) -> Message {
        let mut message = Message::empty(self.seq);
        while let Some(event) = events.recv().await {
            match event {
                MessageEvent::Section(stream) => {
                    if stream.id.is_buffered() {
                        let data = drain(stream.chunks).await;
                        self.classify(&stream.id, data, &mut message);
                    } else {
                        let path = self.download_dir.join(format!(
                            "msg-{}-{}.part",
                            self.seq,
                            stream.id.file_label()
                        ));
                        message.saved_parts.push(path.clone());
                        tokio::spawn(write_raw_section(stream.chunks, path));
                    }
                }
                MessageEvent::Attributes(attrs) => {
                    message.attributes = attrs;
                }
                MessageEvent::Done => {
                    // Terminal signal; the sender closes right after, which
                    // ends the loop.
                }
            }
        }
        message
    }

    fn classify(&self, id: &SectionId, data: Vec<u8>, message: &mut Message) {
        match id {
            SectionId::Header(_) => {
                message.header = Some(HeaderFields::parse(&data));
                message.header_raw = Some(String::from_utf8_lossy(&data).into_owned());
            }
            SectionId::Text => {
                message.body = Some(String::from_utf8_lossy(&data).into_owned());
            }
            SectionId::Part(_) => unreachable!("raw parts are not buffered"),
        }
    }
}

async fn drain(mut chunks: mpsc::UnboundedReceiver<Bytes>) -> Vec<u8> {
    let mut buf = Vec::new();
    while let Some(chunk) = chunks.recv().await {
        buf.extend_from_slice(&chunk);
    }
    buf
}

/// Fire-and-forget raw section write. Failures are logged, not propagated:
/// a broken sink must not stall the batch.
async fn write_raw_section(mut chunks: mpsc::UnboundedReceiver<Bytes>, path: PathBuf) {
    let result = async {
        let mut file = tokio::fs::File::create(&path).await?;
        while let Some(chunk) = chunks.recv().await {
            file.write_all(&chunk).await?;
        }
        file.flush().await
    }
    .await;
    if let Err(error) = result {
        warn!(path = %path.display(), %error, "failed to write raw section");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::session::{FetchSession, SessionEvent};
    use crate::fetch::FetchAttributes;

    #[tokio::test]
    async fn header_and_text_sections_classified() {
        let (mut session, sender) = FetchSession::channel();
        let msg = sender.begin_message(7);

        let header = msg.open_section(SectionId::Header(vec!["SUBJECT".into()]));
        header.chunk(Bytes::from_static(b"Subject: Hi\r\nSub"));
        header.chunk(Bytes::from_static(b"ject: Bye\r\n"));
        drop(header);

        let text = msg.open_section(SectionId::Text);
        text.chunk(Bytes::from_static(b"hello "));
        text.chunk(Bytes::from_static(b"world"));
        drop(text);

        msg.attributes(FetchAttributes { uid: Some(42), ..Default::default() });
        msg.finish();
        drop(sender);

        let Some(SessionEvent::Message(stream)) = session.recv().await else {
            panic!("expected message event")
        };
        let collector = PartCollector::new(stream.seq, std::env::temp_dir());
        let message = collector.collect(stream.events).await;

        assert_eq!(message.seq, 7);
        assert_eq!(message.body.as_deref(), Some("hello world"));
        let fields = message.header.unwrap();
        assert_eq!(fields.get_all("subject"), vec!["Hi", "Bye"]);
        assert_eq!(message.attributes.uid, Some(42));
    }

    #[tokio::test]
    async fn raw_section_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let (mut session, sender) = FetchSession::channel();
        let msg = sender.begin_message(3);

        let raw = msg.open_section(SectionId::Part("2".into()));
        raw.chunk(Bytes::from_static(b"attachment "));
        raw.chunk(Bytes::from_static(b"payload"));
        drop(raw);
        msg.finish();
        drop(sender);

        let Some(SessionEvent::Message(stream)) = session.recv().await else {
            panic!("expected message event")
        };
        let collector = PartCollector::new(stream.seq, dir.path().to_path_buf());
        let message = collector.collect(stream.events).await;
        assert_eq!(message.saved_parts.len(), 1);
        let path = &message.saved_parts[0];
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), "msg-3-2.part");

        // The write is detached; give it a moment to land.
        for _ in 0..50 {
            if path.exists() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(std::fs::read(path).unwrap(), b"attachment payload");
    }
}
