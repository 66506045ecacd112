//! Document persistence over the `document` table.

use tracing::debug;

use crate::db::Db;
use crate::db::schema::{DocumentContentRecord, DocumentCreate, DocumentRecord, json_text};
use crate::error::{ServiceError, ServiceResult};

/// Metadata columns. Listings select these so file bytes are never read.
const METADATA_FIELDS: &str =
    "doc_id, owner, name, has_file, mime, is_public, attributes, extra, created_at";

/// Store-side listing filter.
#[derive(Debug, Clone, Default)]
pub struct StoreFilter {
    /// Only documents with this owner login.
    pub owner: Option<String>,
    /// Only documents whose attributes contain this exact pair.
    pub attribute: Option<(String, String)>,
}

impl StoreFilter {
    fn matches(&self, record: &DocumentRecord) -> bool {
        match &self.attribute {
            Some((key, value)) => record.attributes.get(key) == Some(value),
            None => true,
        }
    }
}

#[derive(Clone)]
pub struct DocumentStore {
    db: Db,
}

impl DocumentStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Insert a document row, metadata and content in one record.
    pub async fn create(&self, create: DocumentCreate) -> ServiceResult<DocumentRecord> {
        let DocumentCreate { record, content } = create;
        let extra = json_text::to_text(&record.extra)
            .map_err(|e| ServiceError::Internal(format!("failed to encode metadata: {e}")))?;
        let query = format!(
            r#"
            CREATE document CONTENT {{
                doc_id: $doc_id,
                owner: $owner,
                name: $name,
                has_file: $has_file,
                mime: $mime,
                is_public: $is_public,
                attributes: $attributes,
                extra: $extra,
                content: $content,
                created_at: $created_at
            }} RETURN {METADATA_FIELDS}
        "#
        );

        let mut res = self
            .db
            .query(query)
            .bind(("doc_id", record.doc_id))
            .bind(("owner", record.owner))
            .bind(("name", record.name))
            .bind(("has_file", record.has_file))
            .bind(("mime", record.mime))
            .bind(("is_public", record.is_public))
            .bind(("attributes", record.attributes))
            .bind(("extra", extra))
            .bind(("content", content))
            .bind(("created_at", record.created_at))
            .await?;

        let created: Vec<DocumentRecord> = res.take(0)?;
        created
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Internal("failed to create document".to_string()))
    }

    /// List document metadata, ordered by name, then creation time, then id.
    ///
    /// The owner filter runs in the database; the attribute filter runs over
    /// the returned rows because attribute keys are caller-supplied.
    pub async fn list(&self, filter: &StoreFilter) -> ServiceResult<Vec<DocumentRecord>> {
        let where_clause = if filter.owner.is_some() {
            "WHERE owner = $owner"
        } else {
            ""
        };
        let query = format!(
            "SELECT {METADATA_FIELDS} FROM document {where_clause} \
             ORDER BY name ASC, created_at ASC, doc_id ASC"
        );

        let mut res = self
            .db
            .query(query)
            .bind(("owner", filter.owner.clone()))
            .await?;

        let records: Vec<DocumentRecord> = res.take(0)?;
        debug!("document store returned {} rows", records.len());

        Ok(records.into_iter().filter(|r| filter.matches(r)).collect())
    }

    /// Metadata for a single document.
    pub async fn get(&self, doc_id: &str) -> ServiceResult<Option<DocumentRecord>> {
        let query = format!("SELECT {METADATA_FIELDS} FROM document WHERE doc_id = $doc_id LIMIT 1");

        let mut res = self
            .db
            .query(query)
            .bind(("doc_id", doc_id.to_string()))
            .await?;

        let records: Vec<DocumentRecord> = res.take(0)?;
        Ok(records.into_iter().next())
    }

    /// Stored payload for a single document.
    pub async fn get_content(&self, doc_id: &str) -> ServiceResult<Option<DocumentContentRecord>> {
        let mut res = self
            .db
            .query("SELECT has_file, mime, content FROM document WHERE doc_id = $doc_id LIMIT 1")
            .bind(("doc_id", doc_id.to_string()))
            .await?;

        let records: Vec<DocumentContentRecord> = res.take(0)?;
        Ok(records.into_iter().next())
    }

    /// Delete a document. Returns whether a row was removed.
    pub async fn delete(&self, doc_id: &str) -> ServiceResult<bool> {
        let mut res = self
            .db
            .query("DELETE document WHERE doc_id = $doc_id RETURN BEFORE")
            .bind(("doc_id", doc_id.to_string()))
            .await?;

        let removed: Vec<DocumentContentRecord> = res.take(0)?;
        Ok(!removed.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DatabaseConfig, create_connection, ensure_schema};
    use serde_json::{Map, json};
    use std::collections::BTreeMap;

    async fn setup_store() -> DocumentStore {
        let db = create_connection(DatabaseConfig::in_memory()).await.unwrap();
        ensure_schema(&db).await.unwrap();
        DocumentStore::new(db)
    }

    fn doc(id: &str, owner: &str, name: &str, created_at: i64) -> DocumentCreate {
        DocumentCreate {
            record: DocumentRecord {
                doc_id: id.to_string(),
                owner: owner.to_string(),
                name: Some(name.to_string()),
                has_file: false,
                mime: None,
                is_public: false,
                attributes: BTreeMap::new(),
                extra: Map::new(),
                created_at,
            },
            content: r#"{"n":1}"#.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = setup_store().await;
        let mut create = doc("d1", "alice", "notes", 10);
        create.record.attributes.insert("dept".into(), "eng".into());
        create.record.extra.insert("pages".into(), json!(3));

        let created = store.create(create).await.unwrap();
        assert_eq!(created.doc_id, "d1");

        let fetched = store.get("d1").await.unwrap().unwrap();
        assert_eq!(fetched.owner, "alice");
        assert_eq!(fetched.attributes.get("dept").map(String::as_str), Some("eng"));
        assert_eq!(fetched.extra.get("pages"), Some(&json!(3)));

        let content = store.get_content("d1").await.unwrap().unwrap();
        assert!(!content.has_file);
        assert_eq!(content.content, r#"{"n":1}"#);

        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_extra_metadata_is_stored_exactly() {
        let store = setup_store().await;
        let mut create = doc("d1", "alice", "ledger", 0);
        create.record.extra.insert("big".into(), json!(u64::MAX));
        create.record.extra.insert("missing".into(), json!(null));
        create
            .record
            .extra
            .insert("nested".into(), json!({"list": [1, null, -2.5], "on": true}));
        let expected = create.record.extra.clone();

        let created = store.create(create).await.unwrap();
        assert_eq!(created.extra, expected);

        let fetched = store.get("d1").await.unwrap().unwrap();
        assert_eq!(fetched.extra, expected);
        assert_eq!(fetched.extra.get("big").and_then(|v| v.as_u64()), Some(u64::MAX));
        assert!(fetched.extra.contains_key("missing"));

        let listed = store.list(&StoreFilter::default()).await.unwrap();
        assert_eq!(listed[0].extra, expected);
    }

    #[tokio::test]
    async fn test_list_orders_and_filters() {
        let store = setup_store().await;
        store.create(doc("d3", "alice", "beta", 5)).await.unwrap();
        store.create(doc("d1", "alice", "alpha", 7)).await.unwrap();
        store.create(doc("d2", "alice", "alpha", 6)).await.unwrap();
        let mut tagged = doc("d4", "bob", "gamma", 1);
        tagged.record.attributes.insert("dept".into(), "eng".into());
        store.create(tagged).await.unwrap();

        let all = store.list(&StoreFilter::default()).await.unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["d2", "d1", "d3", "d4"]);

        let alice_only = store
            .list(&StoreFilter {
                owner: Some("alice".into()),
                attribute: None,
            })
            .await
            .unwrap();
        assert_eq!(alice_only.len(), 3);

        let eng = store
            .list(&StoreFilter {
                owner: None,
                attribute: Some(("dept".into(), "eng".into())),
            })
            .await
            .unwrap();
        assert_eq!(eng.len(), 1);
        assert_eq!(eng[0].doc_id, "d4");
    }

    #[tokio::test]
    async fn test_delete_reports_removal() {
        let store = setup_store().await;
        store.create(doc("d1", "alice", "a", 0)).await.unwrap();

        assert!(store.delete("d1").await.unwrap());
        assert!(!store.delete("d1").await.unwrap());
        assert!(store.get("d1").await.unwrap().is_none());
    }
}
