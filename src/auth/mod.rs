//! Authentication and session management.
//!
//! Every document request passes through this module first:
//!
//! - **Credential store** (`UserStore`): login + password hash
//! - **Session store** (`SessionStore`): opaque token -> user + expiry
//! - **Auth service** (`AuthService`): register, authenticate, validate,
//!   logout, renew
//! - **Token resolution** (`TokenCandidates`): picks the request token by a
//!   fixed source precedence
//!
//! ## Usage
//!
//! ```ignore
//! let auth = AuthService::new(AuthConfig::new(admin_token, scheme), db);
//! auth.register(admin_token, "alice", "pw").await?;
//! let token = auth.authenticate("alice", "pw").await?;
//! let identity = auth.resolve(token.as_str()).await?;
//! ```

mod context;
pub mod password;
mod service;
mod session_store;
pub mod token;
mod user_store;

pub use context::Identity;
pub use password::PasswordScheme;
pub use service::{AuthConfig, AuthService, DEFAULT_SESSION_TTL_SECONDS, SessionGrant, UserInfo};
pub use session_store::SessionStore;
pub use token::{TOKEN_PRECEDENCE, TokenCandidates, TokenSource, generate_session_token};
pub use user_store::UserStore;
