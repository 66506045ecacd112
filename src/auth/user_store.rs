//! Credential storage.

use surrealdb::RecordId;
use tracing::debug;

use crate::db::Db;
use crate::db::schema::{UserCreate, UserRecord};
use crate::error::{ServiceError, ServiceResult};

/// Credential store over the `user` table.
#[derive(Clone)]
pub struct UserStore {
    db: Db,
}

impl UserStore {
    /// Create a new user store.
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Insert a credential row.
    ///
    /// Uniqueness of `login` is left to the `user_login` index; a violation
    /// comes back as `Conflict`.
    pub async fn create(&self, create: UserCreate) -> ServiceResult<UserRecord> {
        let query = r#"
            CREATE user CONTENT {
                login: $login,
                password_hash: $password_hash,
                created_at: $created_at
            }
        "#;

        let login = create.login.clone();
        let mut res = self
            .db
            .query(query)
            .bind(("login", create.login))
            .bind(("password_hash", create.password_hash))
            .bind(("created_at", create.created_at))
            .await?;

        let users: Vec<UserRecord> = res.take(0).map_err(|e| {
            if is_unique_violation(&e) {
                ServiceError::Conflict(format!("Login '{}' is already taken", login))
            } else {
                ServiceError::from(e)
            }
        })?;

        debug!("created credential row for {}", login);
        users
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Internal("failed to create user".to_string()))
    }

    /// Get a user by login.
    pub async fn get_by_login(&self, login: &str) -> ServiceResult<Option<UserRecord>> {
        let query = "SELECT * FROM user WHERE login = $login LIMIT 1";

        let mut res = self
            .db
            .query(query)
            .bind(("login", login.to_string()))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next())
    }

    /// Get a user by database ID.
    pub async fn get_by_id(&self, user_id: &RecordId) -> ServiceResult<Option<UserRecord>> {
        let query = "SELECT * FROM user WHERE id = $id LIMIT 1";

        let mut res = self
            .db
            .query(query)
            .bind(("id", user_id.clone()))
            .await?;

        let users: Vec<UserRecord> = res.take(0)?;
        Ok(users.into_iter().next())
    }
}

/// Whether a SurrealDB error is a UNIQUE index violation.
fn is_unique_violation(err: &surrealdb::Error) -> bool {
    let msg = err.to_string();
    msg.contains("already contains") || msg.contains("already exists")
}
