//! Token minting and request token resolution.
//!
//! A request may carry its bearer token in three places. Resolution walks
//! `TOKEN_PRECEDENCE` in order and takes the first non-empty candidate, so a
//! query parameter beats the request body, which beats a token embedded in
//! the `meta` blob of an upload form.

use uuid::Uuid;

use crate::types::SessionToken;

/// A place in the request a token can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// `?token=` query parameter.
    QueryParam,
    /// `token` field of a JSON request body.
    RequestBody,
    /// `token` field inside the JSON `meta` form field.
    MetadataBlob,
}

/// Sources in descending precedence.
pub const TOKEN_PRECEDENCE: [TokenSource; 3] = [
    TokenSource::QueryParam,
    TokenSource::RequestBody,
    TokenSource::MetadataBlob,
];

/// Token values found in a request, one slot per source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenCandidates {
    pub query: Option<String>,
    pub body: Option<String>,
    pub metadata: Option<String>,
}

impl TokenCandidates {
    /// Candidate from a single source. Empty strings count as absent.
    pub fn get(&self, source: TokenSource) -> Option<&str> {
        let value = match source {
            TokenSource::QueryParam => self.query.as_deref(),
            TokenSource::RequestBody => self.body.as_deref(),
            TokenSource::MetadataBlob => self.metadata.as_deref(),
        };
        value.filter(|v| !v.is_empty())
    }

    /// Resolve the effective token and the source it came from.
    pub fn resolve(&self) -> Option<(SessionToken, TokenSource)> {
        TOKEN_PRECEDENCE
            .iter()
            .find_map(|source| self.get(*source).map(|v| (SessionToken::new(v), *source)))
    }
}

/// Mint a new unpredictable session token (two v4 UUIDs, 244 random bits).
pub fn generate_session_token() -> SessionToken {
    let token = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
    SessionToken::new(token)
}
