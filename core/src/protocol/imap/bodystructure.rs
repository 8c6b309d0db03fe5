/*
 * bodystructure.rs
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

//! BODYSTRUCTURE response parsing (RFC 9051 §7.5.2) into a typed part tree.
//!
//! The server sends a nested parenthesized list; we parse it into
//! `Part`/`Multipart` variants and assign IMAP section numbers ("1", "2.1")
//! during the walk so attachment fetches can address single parts directly.

use std::fmt;

/// MIME body structure: a leaf part or an ordered group of nested structures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyStructure {
    Part(BodyPart),
    Multipart {
        /// Multipart subtype, lowercased (e.g. "mixed", "alternative").
        subtype: String,
        parts: Vec<BodyStructure>,
    },
}

/// One leaf part descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPart {
    /// IMAP section number ("1", "2.1"), usable in BODY[...] fetch items.
    pub part_id: String,
    /// Primary MIME type, lowercased (e.g. "text", "image").
    pub mime_type: String,
    /// MIME subtype, lowercased (e.g. "plain", "png").
    pub mime_subtype: String,
    /// Content-Type parameters, names lowercased.
    pub params: Vec<(String, String)>,
    pub encoding: TransferEncoding,
    pub size: Option<u32>,
    pub disposition: Disposition,
}

impl BodyPart {
    /// Declared filename: Content-Disposition `filename` parameter, falling
    /// back to the Content-Type `name` parameter.
    pub fn filename(&self) -> Option<&str> {
        self.disposition
            .param("filename")
            .or_else(|| param_lookup(&self.params, "name"))
    }

    pub fn mime_label(&self) -> String {
        format!("{}/{}", self.mime_type, self.mime_subtype)
    }
}

/// Content-Transfer-Encoding, normalized at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEncoding {
    SevenBit,
    EightBit,
    Binary,
    Base64,
    QuotedPrintable,
    Other(String),
}

impl TransferEncoding {
    fn from_imap(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "7bit" => TransferEncoding::SevenBit,
            "8bit" => TransferEncoding::EightBit,
            "binary" => TransferEncoding::Binary,
            "base64" => TransferEncoding::Base64,
            "quoted-printable" => TransferEncoding::QuotedPrintable,
            other => TransferEncoding::Other(other.to_string()),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferEncoding::SevenBit => write!(f, "7bit"),
            TransferEncoding::EightBit => write!(f, "8bit"),
            TransferEncoding::Binary => write!(f, "binary"),
            TransferEncoding::Base64 => write!(f, "base64"),
            TransferEncoding::QuotedPrintable => write!(f, "quoted-printable"),
            TransferEncoding::Other(s) => write!(f, "{}", s),
        }
    }
}

/// Content-Disposition, normalized at parse time (RFC 2183).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Disposition {
    #[default]
    None,
    Inline(Vec<(String, String)>),
    Attachment(Vec<(String, String)>),
}

impl Disposition {
    pub fn is_attachment_content(&self) -> bool {
        matches!(self, Disposition::Inline(_) | Disposition::Attachment(_))
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        match self {
            Disposition::None => None,
            Disposition::Inline(params) | Disposition::Attachment(params) => {
                param_lookup(params, name)
            }
        }
    }
}

fn param_lookup<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

// ---------------------------------------------------------------------------
// Parenthesized-list reader
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Item {
    List(Vec<Item>),
    Str(String),
    Nil,
    Number(u32),
    Atom(String),
}

impl Item {
    fn as_str(&self) -> Option<&str> {
        match self {
            Item::Str(s) | Item::Atom(s) => Some(s),
            _ => None,
        }
    }

    fn as_number(&self) -> Option<u32> {
        match self {
            Item::Number(n) => Some(*n),
            _ => None,
        }
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(s: &'a str) -> Self {
        Self { bytes: s.as_bytes(), pos: 0 }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn read_item(&mut self) -> Option<Item> {
        self.skip_ws();
        match self.bytes.get(self.pos)? {
            b'(' => {
                self.pos += 1;
                let mut items = Vec::new();
                loop {
                    self.skip_ws();
                    if self.bytes.get(self.pos) == Some(&b')') {
                        self.pos += 1;
                        return Some(Item::List(items));
                    }
                    items.push(self.read_item()?);
                }
            }
            b'"' => {
                self.pos += 1;
                let mut s = String::new();
                while let Some(&b) = self.bytes.get(self.pos) {
                    self.pos += 1;
                    match b {
                        b'"' => return Some(Item::Str(s)),
                        b'\\' => {
                            if let Some(&next) = self.bytes.get(self.pos) {
                                s.push(next as char);
                                self.pos += 1;
                            }
                        }
                        _ => s.push(b as char),
                    }
                }
                None
            }
            _ => {
                let start = self.pos;
                while let Some(&b) = self.bytes.get(self.pos) {
                    if b.is_ascii_whitespace() || b == b'(' || b == b')' {
                        break;
                    }
                    self.pos += 1;
                }
                let word = std::str::from_utf8(&self.bytes[start..self.pos]).ok()?;
                if word.is_empty() {
                    return None;
                }
                if word.eq_ignore_ascii_case("NIL") {
                    Some(Item::Nil)
                } else if let Ok(n) = word.parse::<u32>() {
                    Some(Item::Number(n))
                } else {
                    Some(Item::Atom(word.to_string()))
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tree construction
// ---------------------------------------------------------------------------

/// Parse a BODYSTRUCTURE value (including its outer parentheses) into a tree.
/// Returns None on grammar the parser does not recognize.
pub fn parse_body_structure(text: &str) -> Option<BodyStructure> {
    let mut reader = Reader::new(text.trim());
    let item = reader.read_item()?;
    match item {
        Item::List(items) => build_node(&items, ""),
        _ => None,
    }
}

fn build_node(items: &[Item], part_prefix: &str) -> Option<BodyStructure> {
    if items.is_empty() {
        return None;
    }
    if matches!(items[0], Item::List(_)) {
        // Multipart: leading lists are the children, then the subtype string.
        let mut parts = Vec::new();
        let mut i = 0;
        while let Some(Item::List(child)) = items.get(i) {
            let child_id = if part_prefix.is_empty() {
                format!("{}", i + 1)
            } else {
                format!("{}.{}", part_prefix, i + 1)
            };
            parts.push(build_node(child, &child_id)?);
            i += 1;
        }
        let subtype = items.get(i)?.as_str()?.to_ascii_lowercase();
        return Some(BodyStructure::Multipart { subtype, parts });
    }

    // Leaf: type subtype params id description encoding size [extensions...]
    let mime_type = items.first()?.as_str()?.to_ascii_lowercase();
    let mime_subtype = items.get(1)?.as_str()?.to_ascii_lowercase();
    let params = match items.get(2) {
        Some(Item::List(p)) => param_pairs(p),
        _ => Vec::new(),
    };
    let encoding = items
        .get(5)
        .and_then(Item::as_str)
        .map(TransferEncoding::from_imap)
        .unwrap_or(TransferEncoding::SevenBit);
    let size = items.get(6).and_then(Item::as_number);
    let disposition = items
        .iter()
        .skip(7)
        .find_map(parse_disposition)
        .unwrap_or_default();

    let part_id = if part_prefix.is_empty() {
        "1".to_string()
    } else {
        part_prefix.to_string()
    };
    Some(BodyStructure::Part(BodyPart {
        part_id,
        mime_type,
        mime_subtype,
        params,
        encoding,
        size,
        disposition,
    }))
}

/// A disposition extension item is a list of (type, params); anything else is
/// md5/language/location noise and is skipped.
fn parse_disposition(item: &Item) -> Option<Disposition> {
    let Item::List(fields) = item else { return None };
    let kind = fields.first()?.as_str()?;
    let params = match fields.get(1) {
        Some(Item::List(p)) => param_pairs(p),
        _ => Vec::new(),
    };
    if kind.eq_ignore_ascii_case("inline") {
        Some(Disposition::Inline(params))
    } else if kind.eq_ignore_ascii_case("attachment") {
        Some(Disposition::Attachment(params))
    } else {
        None
    }
}

fn param_pairs(items: &[Item]) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i + 1 < items.len() {
        if let (Some(name), Some(value)) = (items[i].as_str(), items[i + 1].as_str()) {
            out.push((name.to_ascii_lowercase(), value.to_string()));
        }
        i += 2;
    }
    out
}
