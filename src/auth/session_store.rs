//! Session storage.
//!
//! Sessions are expiring records keyed by an opaque token. Expiry is lazy:
//! lookups filter on `expires_at > now`, and `purge_expired` is optional
//! housekeeping.

use tracing::debug;

use crate::db::Db;
use crate::db::schema::{SessionCreate, SessionRecord};
use crate::error::{ServiceError, ServiceResult};

/// Session store over the `session` table.
#[derive(Clone)]
pub struct SessionStore {
    db: Db,
}

impl SessionStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Insert a session row.
    pub async fn create(&self, create: SessionCreate) -> ServiceResult<SessionRecord> {
        let query = r#"
            CREATE session CONTENT {
                token: $session_token,
                user_id: $user_id,
                login: $login,
                expires_at: $expires_at,
                created_at: $created_at
            }
        "#;

        let mut res = self
            .db
            .query(query)
            .bind(("session_token", create.token))
            .bind(("user_id", create.user_id))
            .bind(("login", create.login))
            .bind(("expires_at", create.expires_at))
            .bind(("created_at", create.created_at))
            .await?;

        let sessions: Vec<SessionRecord> = res.take(0)?;
        sessions
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Internal("failed to create session".to_string()))
    }

    /// Find the session for `token` if it is still valid at `now_ms`.
    pub async fn find_active(
        &self,
        token: &str,
        now_ms: i64,
    ) -> ServiceResult<Option<SessionRecord>> {
        let query = r#"
            SELECT * FROM session
            WHERE token = $session_token
              AND expires_at > $now
            LIMIT 1
        "#;

        let mut res = self
            .db
            .query(query)
            .bind(("session_token", token.to_string()))
            .bind(("now", now_ms))
            .await?;

        let sessions: Vec<SessionRecord> = res.take(0)?;
        Ok(sessions.into_iter().next())
    }

    /// Delete the session for `token`. Deleting an unknown token is not an error.
    pub async fn delete(&self, token: &str) -> ServiceResult<()> {
        self.db
            .query("DELETE session WHERE token = $session_token")
            .bind(("session_token", token.to_string()))
            .await?
            .check()?;

        Ok(())
    }

    /// Delete every session that expired at or before `now_ms`.
    ///
    /// Returns the number of rows removed.
    pub async fn purge_expired(&self, now_ms: i64) -> ServiceResult<usize> {
        let mut res = self
            .db
            .query("DELETE session WHERE expires_at <= $now RETURN BEFORE")
            .bind(("now", now_ms))
            .await?;

        let removed: Vec<SessionRecord> = res.take(0)?;
        debug!("purged {} expired sessions", removed.len());
        Ok(removed.len())
    }
}
