/*
 * headers.rs
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

//! RFC 5322 header-field parsing: unfolding plus an ordered,
//! case-insensitive, duplicate-preserving name → values view.

/// Parsed header block. Field order and duplicate occurrences are preserved
/// as they appeared on the wire; lookup is case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFields {
    entries: Vec<(String, String)>,
}

impl HeaderFields {
    /// Parse raw header bytes. Folded continuation lines (leading space or
    /// tab) are joined to the preceding field with a single space. Lines
    /// without a colon are ignored.
    pub fn parse(raw: &[u8]) -> Self {
        let text = String::from_utf8_lossy(raw);
        let mut entries: Vec<(String, String)> = Vec::new();
        for line in text.split("\r\n").flat_map(|l| l.split('\n')) {
            if line.is_empty() {
                continue;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, value)) = entries.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim_start());
                }
                continue;
            }
            if let Some(colon) = line.find(':') {
                let name = line[..colon].trim().to_string();
                let value = line[colon + 1..].trim().to_string();
                if !name.is_empty() {
                    entries.push((name, value));
                }
            }
        }
        Self { entries }
    }

    /// All values for `name`, case-insensitively, in arrival order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// First value for `name`, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All fields in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_keep_order() {
        let h = HeaderFields::parse(b"Subject: Hi\r\nSubject: Bye\r\n");
        assert_eq!(h.get_all("Subject"), vec!["Hi", "Bye"]);
        assert_eq!(h.get_all("subject"), vec!["Hi", "Bye"]);
        assert_eq!(h.get("SUBJECT"), Some("Hi"));
    }

    #[test]
    fn folded_value_is_unfolded() {
        let h = HeaderFields::parse(b"To: one@example.org,\r\n\ttwo@example.org\r\n");
        assert_eq!(h.get("To"), Some("one@example.org, two@example.org"));
    }

    #[test]
    fn field_order_preserved() {
        let h = HeaderFields::parse(b"From: a@b\r\nTo: c@d\r\nDate: today\r\n");
        let names: Vec<&str> = h.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["From", "To", "Date"]);
    }

    #[test]
    fn junk_lines_ignored() {
        let h = HeaderFields::parse(b"no colon here\r\nX-Ok: yes\r\n");
        assert_eq!(h.len(), 1);
        assert_eq!(h.get("x-ok"), Some("yes"));
    }
}
