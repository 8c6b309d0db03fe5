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

//! IMAP client: connect/authenticate, EXAMINE, batch fetch into the
//! aggregation channels, single-part fetch for attachments.

mod bodystructure;
mod client;
mod fetch;

pub use bodystructure::{
    parse_body_structure, BodyPart, BodyStructure, Disposition, TransferEncoding,
};
pub use client::{connect, ImapClientError, MailSession, MailboxStatus};
