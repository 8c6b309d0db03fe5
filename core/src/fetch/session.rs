/*
 * session.rs
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

//! Fetch-session event contract between the protocol driver and the
//! aggregator.
//!
//! The driver owns the socket; the aggregator owns the consumer halves.
//! A batch fetch is one session stream carrying per-message sub-streams,
//! each of which carries per-section chunk streams. End-of-stream is
//! signaled by dropping the sender half, so a driver that dies mid-way
//! (transport error, panic) closes every stream it opened and no consumer
//! can hang waiting for a terminal event.

use bytes::Bytes;
use tokio::sync::mpsc;

use super::{FetchAttributes, SectionId};

/// One section's byte stream. Chunks arrive in transport order; the stream
/// ends when the channel closes.
pub struct SectionStream {
    pub id: SectionId,
    pub chunks: mpsc::UnboundedReceiver<Bytes>,
}

/// Events within one message sub-session.
pub enum MessageEvent {
    /// A body-section stream opened.
    Section(SectionStream),
    /// Attributes payload (UID, flags, body structure).
    Attributes(FetchAttributes),
    /// The message's own end signal.
    Done,
}

/// One message sub-session: sequence number plus its event stream.
pub struct MessageStream {
    pub seq: u32,
    pub events: mpsc::UnboundedReceiver<MessageEvent>,
}

/// Top-level session events.
pub enum SessionEvent {
    /// A message started; its sections arrive on the nested stream.
    Message(MessageStream),
    /// The session ended normally.
    Done,
    /// The session failed. In-flight message streams stay valid.
    Failed(String),
}

/// Consumer half of a fetch session.
pub struct FetchSession {
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl FetchSession {
    /// Create a session pipe: consumer half plus the driver's sender.
    pub fn channel() -> (FetchSession, SessionSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        (FetchSession { events: rx }, SessionSender { tx })
    }

    /// Next session event; None once the driver is done and dropped.
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }
}

/// Driver half of a fetch session.
pub struct SessionSender {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionSender {
    /// Announce a message; returns the sender for its sub-session.
    pub fn begin_message(&self, seq: u32) -> MessageSender {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = self
            .tx
            .send(SessionEvent::Message(MessageStream { seq, events: rx }));
        MessageSender { tx }
    }

    /// Signal normal session end and close the stream.
    pub fn finish(self) {
        let _ = self.tx.send(SessionEvent::Done);
    }

    /// Signal session failure and close the stream.
    pub fn fail(self, reason: impl Into<String>) {
        let _ = self.tx.send(SessionEvent::Failed(reason.into()));
    }
}

/// Driver half of one message sub-session.
pub struct MessageSender {
    tx: mpsc::UnboundedSender<MessageEvent>,
}

impl MessageSender {
    /// Open a section stream; returns the chunk sender. Dropping the sender
    /// ends the section.
    pub fn open_section(&self, id: SectionId) -> SectionSender {
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = self
            .tx
            .send(MessageEvent::Section(SectionStream { id, chunks: rx }));
        SectionSender { tx }
    }

    /// Deliver the attributes payload.
    pub fn attributes(&self, attrs: FetchAttributes) {
        let _ = self.tx.send(MessageEvent::Attributes(attrs));
    }

    /// Signal the message end and close the sub-session.
    pub fn finish(self) {
        let _ = self.tx.send(MessageEvent::Done);
    }
}

/// Driver half of one section stream.
pub struct SectionSender {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl SectionSender {
    pub fn chunk(&self, data: Bytes) {
        let _ = self.tx.send(data);
    }
}
