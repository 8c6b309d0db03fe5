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

//! SASL client: PLAIN and LOGIN, shared by the IMAP and SMTP clients.
//!
//! PLAIN sends everything in the initial response; LOGIN answers the
//! server's base64 "Username:" / "Password:" challenges one at a time.

mod mechanism;
mod plain;

pub use mechanism::SaslMechanism;
pub use plain::encode_plain;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

#[derive(Debug)]
pub struct SaslError {
    pub message: String,
}

impl SaslError {
    pub fn invalid(msg: &str) -> Self {
        Self { message: msg.to_string() }
    }
}

impl std::fmt::Display for SaslError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SaslError {}

/// Build the base64 initial client response for the given mechanism.
/// PLAIN carries the whole exchange; LOGIN sends nothing up front.
pub fn initial_client_response(
    mechanism: SaslMechanism,
    authzid: &str,
    authcid: &str,
    password: &str,
) -> String {
    match mechanism {
        SaslMechanism::Plain => BASE64.encode(encode_plain(authzid, authcid, password)),
        SaslMechanism::Login => String::new(),
    }
}

/// LOGIN: first challenge is "Username:", second is "Password:".
/// Returns the base64 response for the matching challenge.
pub fn login_respond_to_challenge(
    challenge_b64: &str,
    authcid: &str,
    password: &str,
) -> Result<String, SaslError> {
    let decoded = BASE64
        .decode(challenge_b64.trim())
        .map_err(|_| SaslError::invalid("invalid base64 in LOGIN challenge"))?;
    let s = String::from_utf8_lossy(&decoded).to_lowercase();
    if s.contains("username") {
        Ok(BASE64.encode(authcid.as_bytes()))
    } else if s.contains("password") {
        Ok(BASE64.encode(password.as_bytes()))
    } else {
        Err(SaslError::invalid("unexpected LOGIN challenge"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_initial_response_is_base64_of_nul_triple() {
        let r = initial_client_response(SaslMechanism::Plain, "", "a@b", "pw");
        assert_eq!(BASE64.decode(r).unwrap(), b"\0a@b\0pw");
    }

    #[test]
    fn login_challenges() {
        let user_challenge = BASE64.encode(b"Username:");
        let r = login_respond_to_challenge(&user_challenge, "a@b", "pw").unwrap();
        assert_eq!(BASE64.decode(r).unwrap(), b"a@b");

        let pass_challenge = BASE64.encode(b"Password:");
        let r = login_respond_to_challenge(&pass_challenge, "a@b", "pw").unwrap();
        assert_eq!(BASE64.decode(r).unwrap(), b"pw");
    }

    #[test]
    fn login_rejects_unknown_challenge() {
        let odd = BASE64.encode(b"What?");
        assert!(login_respond_to_challenge(&odd, "a@b", "pw").is_err());
    }
}
