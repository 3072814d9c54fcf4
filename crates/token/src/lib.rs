//! Identity tokens for peer files.
//!
//! A token carries everything needed to request a file from a peer later on:
//! the owning peer, the peer-side path and the size in bytes. Nothing is kept
//! server side, the token *is* the state. Tokens are URL-safe base64 over a
//! compact JSON document, so they survive being embedded in query strings.

use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while decoding an identity token.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token: {0}")]
    Malformed(#[from] base64::DecodeError),
    #[error("corrupt token payload: {0}")]
    CorruptPayload(#[from] serde_json::Error),
}

/// Reference to a single file shared by a peer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentityToken {
    #[serde(rename = "u")]
    pub owner: String,
    #[serde(rename = "f")]
    pub resource_path: String,
    #[serde(rename = "s")]
    pub size_bytes: u64,
}

impl IdentityToken {
    pub fn new(owner: impl Into<String>, resource_path: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            owner: owner.into(),
            resource_path: resource_path.into(),
            size_bytes,
        }
    }

    /// Render the token as an opaque URL-safe string.
    pub fn encode(&self) -> String {
        // Serializing a struct of strings and an integer cannot fail.
        let payload = serde_json::to_vec(self).unwrap_or_default();
        general_purpose::URL_SAFE.encode(payload)
    }

    /// Parse a string previously produced by [`IdentityToken::encode`].
    pub fn decode(token: &str) -> Result<Self, TokenError> {
        let payload = general_purpose::URL_SAFE.decode(token)?;
        Ok(serde_json::from_slice(&payload)?)
    }
}

/// Encode `(owner, resource_path, size_bytes)` into a token string.
pub fn encode(owner: &str, resource_path: &str, size_bytes: u64) -> String {
    IdentityToken::new(owner, resource_path, size_bytes).encode()
}

/// Decode a token string back into its parts.
pub fn decode(token: &str) -> Result<IdentityToken, TokenError> {
    IdentityToken::decode(token)
}
