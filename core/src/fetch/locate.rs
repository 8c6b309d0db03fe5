/*
 * locate.rs
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

//! Attachment locator: flatten a body-structure tree into the leaves meant
//! for download (inline or attachment disposition).

use crate::protocol::imap::{BodyPart, BodyStructure};

/// Depth-first walk collecting every leaf whose disposition marks it as
/// inline or attachment content. Traversal order is preserved. Pure.
pub fn find_attachment_parts(structure: &BodyStructure) -> Vec<&BodyPart> {
    let mut found = Vec::new();
    walk(structure, &mut found);
    found
}

fn walk<'a>(node: &'a BodyStructure, found: &mut Vec<&'a BodyPart>) {
    match node {
        BodyStructure::Multipart { parts, .. } => {
            for part in parts {
                walk(part, found);
            }
        }
        BodyStructure::Part(part) => {
            if part.disposition.is_attachment_content() {
                found.push(part);
            }
        }
    }
}
