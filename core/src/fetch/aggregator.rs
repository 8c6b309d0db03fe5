/*
 * aggregator.rs
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

//! Message aggregator: one collector task per in-flight message, joined as a
//! group once the session stream ends.
//!
//! Completion is structural rather than counted: the aggregate resolves when
//! the session channel has closed and every spawned collector has joined.
//! Message and section streams may interleave arbitrarily; each message's
//! sections are scoped to its own collector, so nothing here needs ordering
//! assumptions beyond per-stream chunk order.

use std::path::Path;

use tokio::task::JoinSet;
use tracing::warn;

use super::collector::PartCollector;
use super::session::{FetchSession, SessionEvent};
use super::Message;

/// Aggregate a batch-fetch session into completed messages, preserving the
/// arrival order of their "message started" events.
///
/// A session-level failure is logged and absorbed: in-flight messages still
/// run to completion and the result carries whatever finished. An empty batch
/// (immediate session end) resolves to an empty collection. The function
/// returns exactly once by construction.
pub async fn collect_messages(mut session: FetchSession, download_dir: &Path) -> Vec<Message> {
    let mut collectors: JoinSet<(usize, Message)> = JoinSet::new();
    let mut arrivals = 0usize;

    while let Some(event) = session.recv().await {
        match event {
            SessionEvent::Message(stream) => {
                let collector = PartCollector::new(stream.seq, download_dir.to_path_buf());
                let index = arrivals;
                arrivals += 1;
                collectors.spawn(async move { (index, collector.collect(stream.events).await) });
            }
            SessionEvent::Done => {}
            SessionEvent::Failed(reason) => {
                warn!(%reason, "fetch session error");
            }
        }
    }

    let mut completed = Vec::with_capacity(arrivals);
    while let Some(joined) = collectors.join_next().await {
        match joined {
            Ok(entry) => completed.push(entry),
            Err(error) => warn!(%error, "message collector task failed"),
        }
    }
    completed.sort_by_key(|(index, _)| *index);
    completed.into_iter().map(|(_, message)| message).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchAttributes, SectionId};
    use bytes::Bytes;

    #[tokio::test]
    async fn empty_batch_resolves_empty() {
        let (session, sender) = FetchSession::channel();
        sender.finish();
        let messages = collect_messages(session, std::env::temp_dir().as_path()).await;
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn session_error_before_messages_resolves_empty() {
        let (session, sender) = FetchSession::channel();
        sender.fail("connection lost");
        let messages = collect_messages(session, std::env::temp_dir().as_path()).await;
        assert!(messages.is_empty());
    }

    #[tokio::test]
    async fn interleaved_sections_across_messages() {
        let dir = tempfile::tempdir().unwrap();
        let (session, sender) = FetchSession::channel();

        // Two messages; message 1 also carries a raw part. Section chunks and
        // end signals interleave across the two messages.
        let m1 = sender.begin_message(11);
        let m2 = sender.begin_message(12);

        let h1 = m1.open_section(SectionId::Header(vec!["SUBJECT".into()]));
        let h2 = m2.open_section(SectionId::Header(vec!["SUBJECT".into()]));
        h2.chunk(Bytes::from_static(b"Subject: second\r\n"));
        h1.chunk(Bytes::from_static(b"Subject: first\r\n"));
        drop(h2);

        let t1 = m1.open_section(SectionId::Text);
        let raw1 = m1.open_section(SectionId::Part("2".into()));
        let t2 = m2.open_section(SectionId::Text);
        t2.chunk(Bytes::from_static(b"body two"));
        raw1.chunk(Bytes::from_static(b"raw bytes"));
        t1.chunk(Bytes::from_static(b"body one"));
        drop(h1);
        drop(t2);
        m2.attributes(FetchAttributes { uid: Some(102), ..Default::default() });
        m2.finish();
        drop(raw1);
        drop(t1);
        m1.attributes(FetchAttributes { uid: Some(101), ..Default::default() });
        m1.finish();
        sender.finish();

        let messages = collect_messages(session, dir.path()).await;
        assert_eq!(messages.len(), 2);

        // Arrival order of message starts, not completion order.
        assert_eq!(messages[0].seq, 11);
        assert_eq!(messages[1].seq, 12);
        assert_eq!(messages[0].body.as_deref(), Some("body one"));
        assert_eq!(messages[1].body.as_deref(), Some("body two"));
        assert_eq!(
            messages[0].header.as_ref().unwrap().get("subject"),
            Some("first")
        );
        assert_eq!(messages[0].attributes.uid, Some(101));
        assert_eq!(messages[1].attributes.uid, Some(102));
        assert_eq!(messages[0].saved_parts.len(), 1);
        assert!(messages[1].saved_parts.is_empty());
    }

    #[tokio::test]
    async fn session_error_after_messages_keeps_completed_work() {
        let (session, sender) = FetchSession::channel();

        let m1 = sender.begin_message(5);
        let t1 = m1.open_section(SectionId::Text);
        t1.chunk(Bytes::from_static(b"kept"));
        drop(t1);
        m1.finish();
        sender.fail("BYE unexpected");

        let messages = collect_messages(session, std::env::temp_dir().as_path()).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].seq, 5);
        assert_eq!(messages[0].body.as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn dropped_section_sender_completes_with_partial_data() {
        // A producer that dies mid-section closes the channel; the message
        // still completes with the bytes that arrived.
        let (session, sender) = FetchSession::channel();
        let m1 = sender.begin_message(9);
        let t1 = m1.open_section(SectionId::Text);
        t1.chunk(Bytes::from_static(b"partial"));
        drop(t1);
        drop(m1); // no Done: producer died
        drop(sender);

        let messages = collect_messages(session, std::env::temp_dir().as_path()).await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body.as_deref(), Some("partial"));
    }
}
