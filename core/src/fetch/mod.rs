/*
 * mod.rs
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

//! Batch-fetch aggregation: turn a stream of interleaved per-message section
//! events into completed, ordered Messages, then locate and download
//! attachment parts.

mod aggregator;
mod attachment;
mod collector;
mod locate;
mod session;

pub use aggregator::collect_messages;
pub use attachment::{save_attachment, AttachmentError};
pub use locate::find_attachment_parts;
pub use session::{
    FetchSession, MessageEvent, MessageSender, MessageStream, SectionSender, SectionStream,
    SessionEvent, SessionSender,
};

use std::path::PathBuf;

use crate::mime::HeaderFields;
use crate::protocol::imap::BodyStructure;

/// Identifier of one requested body section.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SectionId {
    /// Message body text (IMAP `TEXT`).
    Text,
    /// Header fields; an empty list requests the full header.
    Header(Vec<String>),
    /// A raw numbered body part, e.g. "2" or "2.1".
    Part(String),
}

impl SectionId {
    /// Section token as used inside `BODY[...]`.
    pub fn imap_token(&self) -> String {
        match self {
            SectionId::Text => "TEXT".to_string(),
            SectionId::Header(fields) if fields.is_empty() => "HEADER".to_string(),
            SectionId::Header(fields) => {
                format!("HEADER.FIELDS ({})", fields.join(" "))
            }
            SectionId::Part(id) => id.clone(),
        }
    }

    /// Classify the section token echoed back in a fetch response.
    pub fn from_imap_token(token: &str) -> SectionId {
        let t = token.trim();
        if t.eq_ignore_ascii_case("TEXT") {
            return SectionId::Text;
        }
        if t.len() >= 6 && t[..6].eq_ignore_ascii_case("HEADER") {
            let fields = t
                .find('(')
                .and_then(|open| t[open + 1..].find(')').map(|close| &t[open + 1..open + 1 + close]))
                .map(|inner| inner.split_whitespace().map(|w| w.to_string()).collect())
                .unwrap_or_default();
            return SectionId::Header(fields);
        }
        SectionId::Part(t.to_string())
    }

    /// Buffered sections aggregate in memory; raw parts stream to disk.
    pub fn is_buffered(&self) -> bool {
        !matches!(self, SectionId::Part(_))
    }

    /// Label used in on-disk artifact names for raw sections.
    pub fn file_label(&self) -> String {
        match self {
            SectionId::Text => "text".to_string(),
            SectionId::Header(_) => "header".to_string(),
            SectionId::Part(id) => id.clone(),
        }
    }
}

/// What one batch fetch requests. Immutable once the fetch begins.
#[derive(Debug, Clone)]
pub struct FetchSpec {
    sections: Vec<SectionId>,
    with_attributes: bool,
}

impl FetchSpec {
    pub fn new(sections: Vec<SectionId>) -> Self {
        Self { sections, with_attributes: false }
    }

    /// Also request UID, FLAGS and BODYSTRUCTURE per message.
    pub fn with_attributes(mut self) -> Self {
        self.with_attributes = true;
        self
    }

    /// The preview request used by the read flow: envelope header fields plus
    /// body text, with attributes for attachment discovery.
    pub fn preview() -> Self {
        Self::new(vec![
            SectionId::Header(
                ["FROM", "TO", "SUBJECT", "DATE"].map(String::from).to_vec(),
            ),
            SectionId::Text,
        ])
        .with_attributes()
    }

    pub fn sections(&self) -> &[SectionId] {
        &self.sections
    }

    pub fn wants_attributes(&self) -> bool {
        self.with_attributes
    }

    /// Parenthesized item list for the FETCH command. BODY.PEEK keeps the
    /// server from setting \Seen on our behalf.
    pub fn fetch_items(&self) -> String {
        let mut items: Vec<String> = Vec::new();
        if self.with_attributes {
            items.push("UID".to_string());
            items.push("FLAGS".to_string());
            items.push("BODYSTRUCTURE".to_string());
        }
        for section in &self.sections {
            items.push(format!("BODY.PEEK[{}]", section.imap_token()));
        }
        format!("({})", items.join(" "))
    }
}

/// Attributes payload of one fetched message.
#[derive(Debug, Clone, Default)]
pub struct FetchAttributes {
    pub uid: Option<u32>,
    pub flags: Vec<String>,
    pub structure: Option<BodyStructure>,
}

/// One completed message from a batch fetch. Emitted by the aggregator
/// exactly once, after all its buffered sections and its end signal.
#[derive(Debug)]
pub struct Message {
    pub seq: u32,
    /// Raw bytes of the header section, when one was requested.
    pub header_raw: Option<String>,
    /// Parsed header fields (case-insensitive multimap).
    pub header: Option<HeaderFields>,
    /// Body text section, when requested.
    pub body: Option<String>,
    /// Files written for raw (non-preview) sections.
    pub saved_parts: Vec<PathBuf>,
    pub attributes: FetchAttributes,
}

impl Message {
    pub(crate) fn empty(seq: u32) -> Self {
        Self {
            seq,
            header_raw: None,
            header: None,
            body: None,
            saved_parts: Vec::new(),
            attributes: FetchAttributes::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_token_round_trip() {
        let header = SectionId::Header(vec!["FROM".into(), "SUBJECT".into()]);
        assert_eq!(header.imap_token(), "HEADER.FIELDS (FROM SUBJECT)");
        assert_eq!(
            SectionId::from_imap_token("HEADER.FIELDS (FROM SUBJECT)"),
            header
        );
        assert_eq!(SectionId::from_imap_token("text"), SectionId::Text);
        assert_eq!(
            SectionId::from_imap_token("2.1"),
            SectionId::Part("2.1".into())
        );
    }

    #[test]
    fn raw_parts_are_not_buffered() {
        assert!(SectionId::Text.is_buffered());
        assert!(SectionId::Header(vec![]).is_buffered());
        assert!(!SectionId::Part("3".into()).is_buffered());
    }

    #[test]
    fn preview_fetch_items() {
        let items = FetchSpec::preview().fetch_items();
        assert_eq!(
            items,
            "(UID FLAGS BODYSTRUCTURE BODY.PEEK[HEADER.FIELDS (FROM TO SUBJECT DATE)] BODY.PEEK[TEXT])"
        );
    }
}
