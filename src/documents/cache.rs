//! Read-path cache for document listings and single documents.
//!
//! Two moka caches: listings keyed by (caller, query fingerprint) and single
//! documents keyed by id. Writers bump a shared epoch before invalidating, and
//! readers only keep an entry if no write happened while they were reading
//! the store. Without that check a slow reader could re-insert a result that
//! the writer had just invalidated.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::model::{Document, DocumentContent};
use crate::error::{ServiceError, ServiceResult};
use crate::types::{DocumentId, Login};

/// Default entry lifetime (5 minutes)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default number of entries per cache
pub const DEFAULT_CACHE_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_CACHE_TTL_SECS,
            max_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

/// Key of a cached listing.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct ListingKey {
    /// Caller the listing was computed for. Owner-scoped invalidation
    /// matches on this.
    pub caller: Login,
    /// `DocumentQuery::fingerprint` of the request.
    pub fingerprint: String,
}

/// A document with its content, as cached per id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub document: Document,
    pub content: DocumentContent,
}

/// Snapshot of the write epoch, taken before a store read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Epoch(u64);

#[derive(Clone)]
pub struct DocumentCache {
    listings: Cache<ListingKey, Arc<Vec<Document>>>,
    documents: Cache<DocumentId, Arc<StoredDocument>>,
    epoch: Arc<AtomicU64>,
}

impl DocumentCache {
    pub fn new(config: &CacheConfig) -> Self {
        let ttl = Duration::from_secs(config.ttl_seconds);

        Self {
            listings: Cache::builder()
                .max_capacity(config.max_capacity)
                .time_to_live(ttl)
                .support_invalidation_closures()
                .build(),
            documents: Cache::builder()
                .max_capacity(config.max_capacity)
                .time_to_live(ttl)
                .build(),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current write epoch. Take this before reading the store.
    pub fn epoch(&self) -> Epoch {
        Epoch(self.epoch.load(Ordering::Acquire))
    }

    fn bump(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    pub async fn listing(&self, key: &ListingKey) -> Option<Arc<Vec<Document>>> {
        let hit = self.listings.get(key).await;
        debug!(
            "listing cache {} for {}",
            if hit.is_some() { "hit" } else { "miss" },
            key.caller
        );
        hit
    }

    /// Cache a listing read at `seen`. Dropped if a write happened since.
    pub async fn insert_listing(&self, key: ListingKey, docs: Arc<Vec<Document>>, seen: Epoch) {
        if self.epoch() != seen {
            return;
        }
        self.listings.insert(key.clone(), docs).await;
        if self.epoch() != seen {
            self.listings.invalidate(&key).await;
        }
    }

    pub async fn document(&self, id: &DocumentId) -> Option<Arc<StoredDocument>> {
        let hit = self.documents.get(id).await;
        debug!(
            "document cache {} for {}",
            if hit.is_some() { "hit" } else { "miss" },
            id
        );
        hit
    }

    /// Cache a document read at `seen`. Dropped if a write happened since.
    pub async fn insert_document(&self, stored: Arc<StoredDocument>, seen: Epoch) {
        if self.epoch() != seen {
            return;
        }
        let id = stored.document.id.clone();
        self.documents.insert(id.clone(), stored).await;
        if self.epoch() != seen {
            self.documents.invalidate(&id).await;
        }
    }

    /// Drop cached listings affected by a write to one of `owner`'s documents.
    ///
    /// A private document only appears in its owner's listings. A shared one
    /// can appear in anyone's, so every listing goes.
    pub fn invalidate_listings(&self, owner: &Login, shared: bool) -> ServiceResult<()> {
        self.bump();
        if shared {
            debug!("invalidating all cached listings");
            self.listings.invalidate_all();
            return Ok(());
        }

        debug!("invalidating cached listings for {}", owner);
        let owner = owner.clone();
        self.listings
            .invalidate_entries_if(move |key, _| key.caller == owner)
            .map_err(|e| ServiceError::Internal(format!("cache invalidation failed: {e}")))?;
        Ok(())
    }

    /// Drop the cached entry for one document.
    pub async fn invalidate_document(&self, id: &DocumentId) {
        self.bump();
        self.documents.invalidate(id).await;
    }
}

impl Default for DocumentCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
