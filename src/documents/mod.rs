//! Document storage and retrieval.
//!
//! `DocumentService` is the entry point. It takes an authenticated
//! `Identity`, applies owner/shared visibility, consults `DocumentCache`
//! before `DocumentStore` on reads, and invalidates the cache once a store
//! write has committed.

mod cache;
mod model;
mod service;
mod store;

pub use cache::{
    CacheConfig, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL_SECS, DocumentCache, ListingKey,
    StoredDocument,
};
pub use model::{
    ContentKind, DEFAULT_FILE_MIME, Document, DocumentContent, DocumentMetadata, DocumentQuery,
    FileUpload, UploadRequest,
};
pub use service::DocumentService;
pub use store::{DocumentStore, StoreFilter};
