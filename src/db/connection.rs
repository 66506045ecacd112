use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::env;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::Root;
use surrealdb::Surreal;

pub type Db = Surreal<Any>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: env::var("DOCVAULT_DB_URL").unwrap_or_else(|_| "memory".to_string()),
            namespace: env::var("DOCVAULT_DB_NAMESPACE")
                .unwrap_or_else(|_| "docvault".to_string()),
            database: env::var("DOCVAULT_DB_DATABASE")
                .unwrap_or_else(|_| "documents".to_string()),
            username: env::var("DOCVAULT_DB_USERNAME").ok(),
            password: env::var("DOCVAULT_DB_PASSWORD").ok(),
        }
    }
}

impl DatabaseConfig {
    /// Config for a private in-memory database (tests, local runs).
    pub fn in_memory() -> Self {
        Self {
            url: "memory".to_string(),
            namespace: "docvault".to_string(),
            database: "documents".to_string(),
            username: None,
            password: None,
        }
    }

    /// Whether the url points at a database that lives only inside this process.
    pub fn is_in_memory(&self) -> bool {
        self.url == "memory" || self.url.starts_with("mem://")
    }

    /// Fail for one-shot commands whose writes would vanish when the process exits.
    pub fn require_persistent(&self, command: &str) -> Result<()> {
        if self.is_in_memory() {
            bail!(
                "`{command}` needs a persistent database, but the url is `{}`; \
                 pass --db-url or set DOCVAULT_DB_URL",
                self.url
            );
        }
        Ok(())
    }
}

pub async fn create_connection(config: DatabaseConfig) -> Result<Db> {
    let db = surrealdb::engine::any::connect(config.url).await?;

    // Sign in if credentials are provided
    if let (Some(username), Some(password)) = (config.username, config.password) {
        db.signin(Root {
            username: &username,
            password: &password,
        })
        .await?;
    }

    db.use_ns(config.namespace).use_db(config.database).await?;

    Ok(db)
}

pub async fn ensure_schema(db: &Db) -> Result<()> {
    let schema_queries = [
        // Credential store. The UNIQUE index is what turns a duplicate
        // registration into a conflict.
        "DEFINE TABLE IF NOT EXISTS user SCHEMALESS;
         DEFINE INDEX IF NOT EXISTS user_login ON TABLE user COLUMNS login UNIQUE;",
        // Session store
        "DEFINE TABLE IF NOT EXISTS session SCHEMALESS;
         DEFINE INDEX IF NOT EXISTS session_token ON TABLE session COLUMNS token UNIQUE;
         DEFINE INDEX IF NOT EXISTS session_expires ON TABLE session COLUMNS expires_at;",
        // Document store
        "DEFINE TABLE IF NOT EXISTS document SCHEMALESS;
         DEFINE INDEX IF NOT EXISTS document_doc_id ON TABLE document COLUMNS doc_id UNIQUE;
         DEFINE INDEX IF NOT EXISTS document_owner ON TABLE document COLUMNS owner;",
    ];

    for query in schema_queries {
        db.query(query).await?.check()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let db = create_connection(DatabaseConfig::in_memory()).await.unwrap();
        ensure_schema(&db).await.unwrap();
        ensure_schema(&db).await.unwrap();
    }

    #[test]
    fn test_in_memory_urls_are_not_persistent() {
        let memory = DatabaseConfig::in_memory();
        assert!(memory.is_in_memory());
        let err = memory.require_persistent("register").unwrap_err();
        assert!(err.to_string().contains("--db-url"));

        let mem_scheme = DatabaseConfig {
            url: "mem://".to_string(),
            ..DatabaseConfig::in_memory()
        };
        assert!(mem_scheme.require_persistent("init").is_err());

        for url in ["rocksdb://data/docvault", "ws://localhost:8000"] {
            let config = DatabaseConfig {
                url: url.to_string(),
                ..DatabaseConfig::in_memory()
            };
            assert!(!config.is_in_memory());
            config.require_persistent("init").unwrap();
        }
    }
}
