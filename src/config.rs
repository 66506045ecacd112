//! Process configuration, loaded once at startup.
//!
//! Read from a JSON file when one is found (`--config`, `DOCVAULT_CONFIG`, or
//! `./docvault.json`); otherwise built from defaults and environment
//! variables. `${VAR}` references inside string values are expanded from the
//! environment.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::auth::{AuthConfig, DEFAULT_SESSION_TTL_SECONDS, PasswordScheme};
use crate::db::DatabaseConfig;
use crate::documents::CacheConfig;

const DEFAULT_CONFIG_FILE: &str = "docvault.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Secret required to register new users.
    pub admin_token: String,
    pub password: PasswordScheme,
    pub session_ttl_seconds: u64,
    pub cache: CacheConfig,
    /// Deadline for each store or cache call.
    pub operation_timeout_ms: u64,
    /// Largest accepted upload body.
    pub max_upload_bytes: usize,
    /// Interval of the expired-session sweep. Disabled when unset.
    pub session_sweep_seconds: Option<u64>,
    pub database: DatabaseConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            admin_token: env::var("DOCVAULT_ADMIN_TOKEN").unwrap_or_default(),
            password: PasswordScheme::SaltedSha256 {
                salt: env::var("DOCVAULT_PASSWORD_SALT").unwrap_or_default(),
            },
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            cache: CacheConfig::default(),
            operation_timeout_ms: 5_000,
            max_upload_bytes: 32 * 1024 * 1024,
            session_sweep_seconds: None,
            database: DatabaseConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load from `path`, or from the first config file found, or from defaults.
    ///
    /// Not validated; commands that serve requests call `validate` first.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match resolve_config_path(path)? {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("invalid JSON in {}", path.display()))?;
        expand_strings(&mut value, &|name: &str| env::var(name).ok());

        serde_json::from_value(value)
            .with_context(|| format!("invalid configuration in {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.admin_token.is_empty() {
            bail!("admin token is not configured (set `admin_token` or DOCVAULT_ADMIN_TOKEN)");
        }
        if matches!(&self.password, PasswordScheme::SaltedSha256 { salt } if salt.is_empty()) {
            bail!(
                "password salt is not configured (set `password.salt` or DOCVAULT_PASSWORD_SALT, \
                 or use the argon2 scheme)"
            );
        }
        if self.operation_timeout_ms == 0 {
            bail!("operation_timeout_ms must be positive");
        }
        if self.session_ttl_seconds == 0 {
            bail!("session_ttl_seconds must be positive");
        }
        Ok(())
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn auth_config(&self) -> AuthConfig {
        let mut auth = AuthConfig::new(self.admin_token.clone(), self.password.clone());
        auth.session_ttl = Duration::from_secs(self.session_ttl_seconds);
        auth.operation_timeout = self.operation_timeout();
        auth
    }
}

/// Pick the config file: explicit path, then `DOCVAULT_CONFIG`, then
/// `./docvault.json` if present.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if !path.exists() {
            bail!("config file {} does not exist", path.display());
        }
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(p) = env::var("DOCVAULT_CONFIG") {
        return Ok(Some(PathBuf::from(p)));
    }

    let candidate = PathBuf::from(DEFAULT_CONFIG_FILE);
    if candidate.exists() {
        return Ok(Some(candidate));
    }

    Ok(None)
}

fn expand_strings(value: &mut Value, lookup: &dyn Fn(&str) -> Option<String>) {
    match value {
        Value::String(s) => *s = expand_env_vars(s, lookup),
        Value::Array(items) => items.iter_mut().for_each(|v| expand_strings(v, lookup)),
        Value::Object(map) => map.values_mut().for_each(|v| expand_strings(v, lookup)),
        _ => {}
    }
}

/// Replace `${NAME}` with `lookup(NAME)`. Unknown names are left as written.
fn expand_env_vars(input: &str, lookup: &dyn Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next(); // consume '{'
            let mut name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            match lookup(&name) {
                Some(val) => out.push_str(&val),
                None => {
                    out.push_str("${");
                    out.push_str(&name);
                    out.push('}');
                }
            }
        } else {
            out.push(ch);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "SECRET" => Some("s3cr3t".to_string()),
            "SALT" => Some("pepper".to_string()),
            _ => None,
        }
    }

    #[test]
    fn test_expand_env_vars() {
        assert_eq!(expand_env_vars("${SECRET}", &lookup), "s3cr3t");
        assert_eq!(expand_env_vars("a-${SALT}-b", &lookup), "a-pepper-b");
        assert_eq!(expand_env_vars("${MISSING}", &lookup), "${MISSING}");
        assert_eq!(expand_env_vars("$plain", &lookup), "$plain");
    }

    #[test]
    fn test_expand_nested_values() {
        let mut value = json!({
            "admin_token": "${SECRET}",
            "password": {"scheme": "salted_sha256", "salt": "${SALT}"},
            "list": ["${SECRET}", 1]
        });
        expand_strings(&mut value, &lookup);

        assert_eq!(value["admin_token"], "s3cr3t");
        assert_eq!(value["password"]["salt"], "pepper");
        assert_eq!(value["list"][0], "s3cr3t");
        assert_eq!(value["list"][1], 1);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            json!({
                "admin_token": "from-file",
                "password": {"scheme": "argon2"},
                "session_ttl_seconds": 60,
                "cache": {"ttl_seconds": 10},
                "database": {"url": "memory", "namespace": "t", "database": "t"}
            })
        )
        .unwrap();

        let config = ServiceConfig::load(Some(file.path())).unwrap();
        config.validate().unwrap();
        assert_eq!(config.admin_token, "from-file");
        assert_eq!(config.password, PasswordScheme::Argon2);
        assert_eq!(config.session_ttl_seconds, 60);
        assert_eq!(config.cache.ttl_seconds, 10);
        assert_eq!(config.cache.max_capacity, crate::documents::DEFAULT_CACHE_CAPACITY);
        assert_eq!(config.operation_timeout(), Duration::from_secs(5));

        let auth = config.auth_config();
        assert_eq!(auth.session_ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_missing_admin_token_is_rejected() {
        let config = ServiceConfig {
            admin_token: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_salt_is_rejected() {
        let unsalted = ServiceConfig {
            admin_token: "admin".into(),
            password: PasswordScheme::SaltedSha256 {
                salt: String::new(),
            },
            ..Default::default()
        };
        let err = unsalted.validate().unwrap_err();
        assert!(err.to_string().contains("salt"));

        let salted = ServiceConfig {
            password: PasswordScheme::SaltedSha256 {
                salt: "pepper".into(),
            },
            ..unsalted.clone()
        };
        salted.validate().unwrap();

        let argon = ServiceConfig {
            password: PasswordScheme::Argon2,
            ..unsalted
        };
        argon.validate().unwrap();
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(ServiceConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(ServiceConfig::from_file(file.path()).is_err());
    }
}
