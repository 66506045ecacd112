//! NewType wrappers for the identifiers that flow between the auth and
//! document layers.
//!
//! A login, a session token and a document id are all plain strings on the
//! wire; wrapping them keeps a token from being passed where a login is
//! expected.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to generate a NewType wrapper with standard trait implementations.
macro_rules! newtype_string {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new instance.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Get the inner value as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume and return the inner String.
            pub fn into_inner(self) -> String {
                self.0
            }

            /// Whether the wrapped string is empty.
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

newtype_string!(
    /// Unique login of a registered user.
    ///
    /// Logins double as the owner reference on documents, so the document
    /// layer never needs to touch the user table.
    Login
);

newtype_string!(
    /// Opaque document identifier (a UUID v4 rendered as a string).
    DocumentId
);

newtype_string!(
    /// Opaque bearer token handed out by `AuthService::authenticate`.
    SessionToken
);

newtype_string!(
    /// One-way password hash as persisted in the credential store.
    ///
    /// Either a hex SHA-256 digest (salted scheme) or an Argon2 PHC string.
    PasswordHash
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_login_creation() {
        let login = Login::new("alice");
        assert_eq!(login.as_str(), "alice");
        assert_eq!(login.to_string(), "alice");
    }

    #[test]
    fn test_document_id_from_string() {
        let id: DocumentId = "0f8e".into();
        assert_eq!(id.as_str(), "0f8e");

        let id: DocumentId = String::from("1a2b").into();
        assert_eq!(id.into_inner(), "1a2b");
    }

    #[test]
    fn test_session_token_serde_is_transparent() {
        let token = SessionToken::new("abc123");
        let json = serde_json::to_string(&token).unwrap();
        assert_eq!(json, "\"abc123\"");

        let parsed: SessionToken = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, token);
    }

    #[test]
    fn test_is_empty() {
        assert!(Login::new("").is_empty());
        assert!(!Login::new("bob").is_empty());
    }

    #[test]
    fn test_borrow_for_map_lookup() {
        use std::collections::HashSet;

        let mut set = HashSet::new();
        set.insert(Login::new("alice"));

        assert!(set.contains("alice"));
        assert!(!set.contains("mallory"));
    }
}
