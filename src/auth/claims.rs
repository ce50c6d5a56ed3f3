use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Payload of a backend-issued token. The signature is not checked; the
/// backend remains the authority.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub role: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    pub exp: i64,
}

impl TokenClaims {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.exp
    }
}

/// Decodes the payload segment of a JWT. Returns `None` for anything that
/// is not a three-part token with a JSON payload.
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return None;
    };

    // Some issuers pad the segment; the URL-safe engine here does not accept it.
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// A token that cannot be decoded counts as expired.
pub fn is_token_expired(token: &str) -> bool {
    match decode_claims(token) {
        Some(claims) => {
            let expired = claims.is_expired_at(Utc::now());
            tracing::debug!("Token expiration check: exp={}, expired={}", claims.exp, expired);
            expired
        }
        None => true,
    }
}
