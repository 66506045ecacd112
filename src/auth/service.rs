//! Registration, authentication and session lifecycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;
use tracing::{debug, info, warn};

use crate::auth::context::Identity;
use crate::auth::password::PasswordScheme;
use crate::auth::session_store::SessionStore;
use crate::auth::token::generate_session_token;
use crate::auth::user_store::UserStore;
use crate::db::Db;
use crate::db::schema::{SessionCreate, UserCreate};
use crate::error::{ServiceError, ServiceResult};
use crate::types::{Login, PasswordHash, SessionToken};
use crate::utils::{bounded, constant_time_eq};

/// Default session lifetime (24 hours).
pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 86_400;

/// Authentication configuration, injected once at construction.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Shared secret that gates registration. Treated as a capability.
    pub admin_token: String,
    /// How passwords are hashed before they reach the credential store.
    pub password: PasswordScheme,
    /// Lifetime of a freshly issued session.
    pub session_ttl: Duration,
    /// Deadline for each store call.
    pub operation_timeout: Duration,
}

impl AuthConfig {
    pub fn new(admin_token: impl Into<String>, password: PasswordScheme) -> Self {
        Self {
            admin_token: admin_token.into(),
            password,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECONDS),
            operation_timeout: Duration::from_secs(5),
        }
    }
}

/// A newly issued session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionGrant {
    pub token: SessionToken,
    pub expires_at: DateTime<Utc>,
}

/// Public view of a registered user. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserInfo {
    /// Database id in `table:key` form.
    pub id: String,
    pub login: Login,
    pub created_at: Option<DateTime<Utc>>,
}

/// Auth service over the credential and session stores.
#[derive(Clone)]
pub struct AuthService {
    config: Arc<AuthConfig>,
    users: UserStore,
    sessions: SessionStore,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Db) -> Self {
        Self {
            config: Arc::new(config),
            users: UserStore::new(db.clone()),
            sessions: SessionStore::new(db),
        }
    }

    /// Register a new login. Requires the admin token.
    pub async fn register(
        &self,
        admin_token: &str,
        login: &str,
        password: &str,
    ) -> ServiceResult<Login> {
        if !constant_time_eq(admin_token.as_bytes(), self.config.admin_token.as_bytes()) {
            warn!("registration rejected: invalid admin token");
            return Err(ServiceError::unauthorized("Invalid admin token"));
        }
        if login.trim().is_empty() || password.is_empty() {
            return Err(ServiceError::invalid("Login and password are required"));
        }

        let password_hash = self.config.password.hash(password)?;
        let create = UserCreate {
            login: login.to_string(),
            password_hash: password_hash.into_inner(),
            created_at: Utc::now().timestamp_millis(),
        };

        let user = bounded("create_user", self.config.operation_timeout, self.users.create(create)).await?;
        info!("registered user {}", user.login);
        Ok(Login::new(user.login))
    }

    /// Check credentials and issue a session token.
    ///
    /// Unknown login and wrong password produce the same error.
    pub async fn authenticate(&self, login: &str, password: &str) -> ServiceResult<SessionToken> {
        let timeout = self.config.operation_timeout;
        let user = bounded("get_user_by_login", timeout, self.users.get_by_login(login)).await?;

        let user = match user {
            Some(user)
                if self
                    .config
                    .password
                    .verify(password, &PasswordHash::new(user.password_hash.clone())) =>
            {
                user
            }
            _ => {
                warn!("authentication failed for login {}", login);
                return Err(ServiceError::unauthorized("Invalid credentials"));
            }
        };

        let grant = self.issue_session(user.id, user.login.clone()).await?;
        info!("issued session for {}", user.login);
        Ok(grant.token)
    }

    /// Whether `token` names a session that has not expired.
    pub async fn validate_token(&self, token: &str) -> ServiceResult<bool> {
        self.validate_token_at(token, Utc::now()).await
    }

    /// `validate_token` against an explicit clock reading.
    pub async fn validate_token_at(&self, token: &str, now: DateTime<Utc>) -> ServiceResult<bool> {
        Ok(self.resolve_at(token, now).await?.is_some())
    }

    /// Resolve a valid token to the identity that owns it.
    pub async fn resolve(&self, token: &str) -> ServiceResult<Option<Identity>> {
        self.resolve_at(token, Utc::now()).await
    }

    async fn resolve_at(&self, token: &str, now: DateTime<Utc>) -> ServiceResult<Option<Identity>> {
        if token.is_empty() {
            return Ok(None);
        }

        let session = bounded(
            "find_session",
            self.config.operation_timeout,
            self.sessions.find_active(token, now.timestamp_millis()),
        )
        .await?;

        Ok(session.map(|s| Identity::new(s.user_id, Login::new(s.login))))
    }

    /// Revoke a session. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> ServiceResult<()> {
        bounded(
            "delete_session",
            self.config.operation_timeout,
            self.sessions.delete(token),
        )
        .await?;
        debug!("session revoked");
        Ok(())
    }

    /// Swap a valid token for a new one with a fresh expiry.
    ///
    /// The new session is inserted before the old row is deleted; rows are
    /// never updated in place. Once the new session exists the grant is
    /// returned even if revoking the old token fails. That failure is logged
    /// and the old token stays valid until it expires or is logged out.
    pub async fn renew(&self, token: &str) -> ServiceResult<SessionGrant> {
        let identity = self
            .resolve(token)
            .await?
            .ok_or_else(|| ServiceError::unauthorized("Invalid token"))?;

        let grant = self
            .issue_session(identity.user_id().clone(), identity.login().to_string())
            .await?;
        if let Err(e) = self.logout(token).await {
            warn!(
                "renewed session for {} but the old token was not revoked: {}",
                identity.login(),
                e
            );
        }

        info!("renewed session for {}", identity.login());
        Ok(grant)
    }

    /// Look up a user by database ID.
    pub async fn user(&self, user_id: &RecordId) -> ServiceResult<UserInfo> {
        let user = bounded(
            "get_user_by_id",
            self.config.operation_timeout,
            self.users.get_by_id(user_id),
        )
        .await?
        .ok_or_else(|| ServiceError::not_found("User not found"))?;

        Ok(UserInfo {
            id: user.id.to_string(),
            login: Login::new(user.login),
            created_at: DateTime::from_timestamp_millis(user.created_at),
        })
    }

    /// Remove expired session rows. Returns how many were deleted.
    pub async fn purge_expired_sessions(&self) -> ServiceResult<usize> {
        bounded(
            "purge_sessions",
            self.config.operation_timeout,
            self.sessions.purge_expired(Utc::now().timestamp_millis()),
        )
        .await
    }

    async fn issue_session(&self, user_id: RecordId, login: String) -> ServiceResult<SessionGrant> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.config.session_ttl)
            .map_err(|e| ServiceError::Internal(format!("session ttl out of range: {e}")))?;
        let expires_at = now + ttl;
        let token = generate_session_token();

        let create = SessionCreate {
            token: token.as_str().to_string(),
            user_id,
            login,
            expires_at: expires_at.timestamp_millis(),
            created_at: now.timestamp_millis(),
        };
        bounded(
            "create_session",
            self.config.operation_timeout,
            self.sessions.create(create),
        )
        .await?;

        Ok(SessionGrant { token, expires_at })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DatabaseConfig, create_connection, ensure_schema};

    const ADMIN: &str = "admin-secret";

    async fn setup_service(password: PasswordScheme) -> AuthService {
        let db = create_connection(DatabaseConfig::in_memory()).await.unwrap();
        ensure_schema(&db).await.unwrap();
        AuthService::new(AuthConfig::new(ADMIN, password), db)
    }

    fn salted() -> PasswordScheme {
        PasswordScheme::SaltedSha256 {
            salt: "2ru035c3x3w25".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_then_authenticate() {
        let auth = setup_service(salted()).await;

        let login = auth.register(ADMIN, "alice", "Passw0rd!").await.unwrap();
        assert_eq!(login.as_str(), "alice");

        let token = auth.authenticate("alice", "Passw0rd!").await.unwrap();
        assert!(auth.validate_token(token.as_str()).await.unwrap());

        let identity = auth.resolve(token.as_str()).await.unwrap().unwrap();
        assert_eq!(identity.login().as_str(), "alice");
    }

    #[tokio::test]
    async fn test_token_expires_after_session_ttl() {
        let auth = setup_service(salted()).await;
        auth.register(ADMIN, "alice", "pw").await.unwrap();
        let token = auth.authenticate("alice", "pw").await.unwrap();

        let in_23h = Utc::now() + chrono::Duration::hours(23);
        let in_25h = Utc::now() + chrono::Duration::hours(25);
        assert!(auth.validate_token_at(token.as_str(), in_23h).await.unwrap());
        assert!(!auth.validate_token_at(token.as_str(), in_25h).await.unwrap());
    }

    #[tokio::test]
    async fn test_register_with_wrong_admin_token_fails() {
        let auth = setup_service(salted()).await;

        for admin in ["", "admin-secreT", "admin-secret-and-more", "x"] {
            let err = auth.register(admin, "alice", "pw").await.unwrap_err();
            assert!(matches!(err, ServiceError::Unauthorized(_)));
        }
        // Fails even when the login/password would otherwise be invalid.
        let err = auth.register("nope", "", "").await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_register_duplicate_login_conflicts() {
        let auth = setup_service(salted()).await;
        auth.register(ADMIN, "alice", "pw").await.unwrap();

        let err = auth.register(ADMIN, "alice", "other").await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_register_rejects_empty_credentials() {
        let auth = setup_service(salted()).await;
        let err = auth.register(ADMIN, "  ", "pw").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_bad_credentials_share_one_error() {
        let auth = setup_service(salted()).await;
        auth.register(ADMIN, "alice", "pw").await.unwrap();

        let unknown = auth.authenticate("mallory", "pw").await.unwrap_err();
        let wrong = auth.authenticate("alice", "wrong").await.unwrap_err();

        assert!(matches!(unknown, ServiceError::Unauthorized(_)));
        assert!(matches!(wrong, ServiceError::Unauthorized(_)));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn test_multiple_concurrent_sessions() {
        let auth = setup_service(salted()).await;
        auth.register(ADMIN, "alice", "pw").await.unwrap();

        let t1 = auth.authenticate("alice", "pw").await.unwrap();
        let t2 = auth.authenticate("alice", "pw").await.unwrap();
        assert_ne!(t1, t2);

        auth.logout(t1.as_str()).await.unwrap();
        assert!(!auth.validate_token(t1.as_str()).await.unwrap());
        assert!(auth.validate_token(t2.as_str()).await.unwrap());
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let auth = setup_service(salted()).await;
        auth.register(ADMIN, "alice", "pw").await.unwrap();
        let token = auth.authenticate("alice", "pw").await.unwrap();

        auth.logout(token.as_str()).await.unwrap();
        auth.logout(token.as_str()).await.unwrap();
        assert!(!auth.validate_token(token.as_str()).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_token_is_false_not_error() {
        let auth = setup_service(salted()).await;
        assert!(!auth.validate_token("no-such-token").await.unwrap());
        assert!(!auth.validate_token("").await.unwrap());
    }

    #[tokio::test]
    async fn test_renew_issues_new_token_and_revokes_old() {
        let auth = setup_service(salted()).await;
        auth.register(ADMIN, "alice", "pw").await.unwrap();
        let old = auth.authenticate("alice", "pw").await.unwrap();

        let grant = auth.renew(old.as_str()).await.unwrap();
        assert_ne!(grant.token, old);
        assert!(grant.expires_at > Utc::now());
        assert!(auth.validate_token(grant.token.as_str()).await.unwrap());
        assert!(!auth.validate_token(old.as_str()).await.unwrap());

        let err = auth.renew(old.as_str()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_renew_returns_grant_when_old_token_cannot_be_revoked() {
        let db = create_connection(DatabaseConfig::in_memory()).await.unwrap();
        ensure_schema(&db).await.unwrap();
        let auth = AuthService::new(AuthConfig::new(ADMIN, salted()), db.clone());
        auth.register(ADMIN, "alice", "pw").await.unwrap();
        let old = auth.authenticate("alice", "pw").await.unwrap();

        db.query(
            r#"DEFINE EVENT session_locked ON TABLE session
               WHEN $event = "DELETE" THEN { THROW "sessions are locked" };"#,
        )
        .await
        .unwrap()
        .check()
        .unwrap();
        assert!(auth.logout(old.as_str()).await.is_err());

        let grant = auth.renew(old.as_str()).await.unwrap();
        assert_ne!(grant.token, old);
        assert!(auth.validate_token(grant.token.as_str()).await.unwrap());
        assert!(auth.validate_token(old.as_str()).await.unwrap());
    }

    #[tokio::test]
    async fn test_argon2_scheme_end_to_end() {
        let auth = setup_service(PasswordScheme::Argon2).await;
        auth.register(ADMIN, "alice", "pw").await.unwrap();

        assert!(auth.authenticate("alice", "pw").await.is_ok());
        assert!(auth.authenticate("alice", "PW").await.is_err());
    }

    #[tokio::test]
    async fn test_user_lookup_hides_hash() {
        let auth = setup_service(salted()).await;
        auth.register(ADMIN, "alice", "pw").await.unwrap();
        let token = auth.authenticate("alice", "pw").await.unwrap();
        let identity = auth.resolve(token.as_str()).await.unwrap().unwrap();

        let info = auth.user(identity.user_id()).await.unwrap();
        assert_eq!(info.login.as_str(), "alice");
        assert_eq!(info.id, identity.user_id().to_string());
        assert!(info.created_at.is_some());

        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("password"));
    }

    #[tokio::test]
    async fn test_purge_expired_sessions() {
        let db = create_connection(DatabaseConfig::in_memory()).await.unwrap();
        ensure_schema(&db).await.unwrap();
        let mut config = AuthConfig::new(ADMIN, salted());
        config.session_ttl = Duration::from_millis(0);
        let auth = AuthService::new(config, db);

        auth.register(ADMIN, "alice", "pw").await.unwrap();
        let token = auth.authenticate("alice", "pw").await.unwrap();

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!auth.validate_token(token.as_str()).await.unwrap());
        assert_eq!(auth.purge_expired_sessions().await.unwrap(), 1);
    }
}
