//! Helpers for the JWT credentials issued by the backend.

mod claims;

pub use claims::{TokenClaims, TokenKind, decode_claims, is_token_expired};
