//! Identity of the caller behind a validated token.

use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

use crate::types::Login;

/// The acting user, resolved from a session token by the auth gate.
///
/// Document operations take an `Identity` instead of a raw token; holding one
/// means the token was valid when the request entered the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Database record ID for this user
    user_id: RecordId,
    /// Login, also the owner reference on documents
    login: Login,
}

impl Identity {
    pub fn new(user_id: RecordId, login: Login) -> Self {
        Self { user_id, login }
    }

    /// Get the database user ID.
    pub fn user_id(&self) -> &RecordId {
        &self.user_id
    }

    /// Get the login.
    pub fn login(&self) -> &Login {
        &self.login
    }

    /// Whether this identity owns documents recorded under `owner`.
    pub fn owns(&self, owner: &str) -> bool {
        self.login.as_str() == owner
    }
}
