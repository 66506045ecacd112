//! Authorized, cache-aware document operations.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::cache::{DocumentCache, ListingKey, StoredDocument};
use super::model::{
    ContentKind, Document, DocumentContent, DocumentMetadata, DocumentQuery, UploadRequest,
};
use super::store::{DocumentStore, StoreFilter};
use crate::auth::Identity;
use crate::db::Db;
use crate::db::schema::{DocumentCreate, DocumentRecord};
use crate::error::{ServiceError, ServiceResult};
use crate::types::DocumentId;
use crate::utils::bounded;

const NOT_FOUND: &str = "Document not found";

#[derive(Clone)]
pub struct DocumentService {
    store: DocumentStore,
    cache: DocumentCache,
    timeout: Duration,
}

impl DocumentService {
    pub fn new(db: Db, cache: DocumentCache, operation_timeout: Duration) -> Self {
        Self {
            store: DocumentStore::new(db),
            cache,
            timeout: operation_timeout,
        }
    }

    /// Store a new document owned by `caller`.
    pub async fn upload(&self, caller: &Identity, request: UploadRequest) -> ServiceResult<Document> {
        let content = request.content()?;
        let meta = DocumentMetadata::parse(&request.meta)?;

        let kind = content.kind();
        let record = DocumentRecord {
            doc_id: Uuid::new_v4().to_string(),
            owner: caller.login().to_string(),
            name: meta.name,
            has_file: matches!(content, DocumentContent::File { .. }),
            mime: match kind {
                ContentKind::File { mime } => Some(mime),
                ContentKind::Json => None,
            },
            is_public: meta.public,
            attributes: meta.attributes,
            extra: meta.extra,
            created_at: Utc::now().timestamp_millis(),
        };
        let create = DocumentCreate {
            record,
            content: content.to_column(),
        };

        let created = bounded("create_document", self.timeout, self.store.create(create)).await?;
        let document = Document::from_record(created);

        self.cache
            .invalidate_listings(caller.login(), document.public)?;

        info!("{} uploaded document {}", caller.login(), document.id);
        Ok(document)
    }

    /// Documents visible to `caller` that match `query`, metadata only.
    pub async fn get_all(
        &self,
        caller: &Identity,
        query: &DocumentQuery,
    ) -> ServiceResult<Arc<Vec<Document>>> {
        let key = ListingKey {
            caller: caller.login().clone(),
            fingerprint: query.fingerprint(caller.login()),
        };
        if let Some(hit) = self.cache.listing(&key).await {
            return Ok(hit);
        }

        let seen = self.cache.epoch();
        let filter = StoreFilter {
            owner: query.login_filter().map(str::to_string),
            attribute: query
                .meta_filter()
                .map(|(k, v)| (k.to_string(), v.to_string())),
        };
        let records = bounded("list_documents", self.timeout, self.store.list(&filter)).await?;

        let visible = records
            .into_iter()
            .map(Document::from_record)
            .filter(|doc| doc.visible_to(caller.login()));
        let docs: Vec<Document> = match query.effective_limit() {
            Some(limit) => visible.take(limit).collect(),
            None => visible.collect(),
        };
        debug!("{} documents listed for {}", docs.len(), caller.login());

        let docs = Arc::new(docs);
        self.cache.insert_listing(key, docs.clone(), seen).await;
        Ok(docs)
    }

    /// A single document with its content.
    ///
    /// Absent and invisible documents both report `NotFound`.
    pub async fn get_by_id(&self, caller: &Identity, id: &str) -> ServiceResult<Arc<StoredDocument>> {
        let doc_id = DocumentId::new(id);

        let stored = match self.cache.document(&doc_id).await {
            Some(hit) => hit,
            None => {
                let seen = self.cache.epoch();
                let record = bounded("get_document", self.timeout, self.store.get(id))
                    .await?
                    .ok_or_else(|| ServiceError::not_found(NOT_FOUND))?;
                let document = Document::from_record(record);
                if !document.visible_to(caller.login()) {
                    return Err(ServiceError::not_found(NOT_FOUND));
                }

                let content = bounded("get_document_content", self.timeout, self.store.get_content(id))
                    .await?
                    .ok_or_else(|| ServiceError::not_found(NOT_FOUND))?;
                let stored = Arc::new(StoredDocument {
                    document,
                    content: DocumentContent::from_record(content)?,
                });
                self.cache.insert_document(stored.clone(), seen).await;
                stored
            }
        };

        if !stored.document.visible_to(caller.login()) {
            return Err(ServiceError::not_found(NOT_FOUND));
        }
        Ok(stored)
    }

    /// Delete a document. Only its owner may do this.
    pub async fn delete(&self, caller: &Identity, id: &str) -> ServiceResult<()> {
        let record = bounded("get_document", self.timeout, self.store.get(id))
            .await?
            .ok_or_else(|| ServiceError::not_found(NOT_FOUND))?;

        if !caller.owns(&record.owner) {
            warn!("{} attempted to delete document {} owned by {}", caller.login(), id, record.owner);
            return Err(ServiceError::Forbidden(
                "Only the owner can delete this document".to_string(),
            ));
        }

        let removed = bounded("delete_document", self.timeout, self.store.delete(id)).await?;
        if !removed {
            return Err(ServiceError::not_found(NOT_FOUND));
        }

        self.cache.invalidate_document(&DocumentId::new(id)).await;
        self.cache
            .invalidate_listings(caller.login(), record.is_public)?;

        info!("{} deleted document {}", caller.login(), id);
        Ok(())
    }
}
