//! crates/study_shelf_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the storefront's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases, the
//! chat platform, or text-generation APIs.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

use crate::domain::{
    CatalogFilter, CatalogItem, CatalogPatch, CatalogSummary, Category, CategoryTrend,
    DateRange, DownloadEntry, NewCatalogItem, StoredContent, TopicTrend, UserRecord, UserStats,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services and carries
/// the service's error taxonomy: validation, not-found, external-service
/// unavailability, transfer-size rejection, and everything else.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("External service unavailable: {0}")]
    Unavailable(String),
    #[error("Transfer too large: {size} bytes exceeds the {limit} byte ceiling")]
    TooLarge { size: u64, limit: u64 },
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A stream of raw file bytes read back from the content store.
pub type ContentStream = Pin<Box<dyn Stream<Item = PortResult<Bytes>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert(&self, item: NewCatalogItem) -> PortResult<CatalogItem>;

    async fn find_by_id(&self, id: Uuid) -> PortResult<CatalogItem>;

    /// Admin listing, filtered by topic/category/free-text search.
    async fn list(&self, filter: CatalogFilter) -> PortResult<Vec<CatalogItem>>;

    /// The newest items, optionally scoped to a category. Used as the search
    /// fallback when a query yields no usable tokens.
    async fn list_recent(&self, category: Option<Category>, limit: i64) -> PortResult<Vec<CatalogItem>>;

    /// Items where any token appears (case-insensitively) in title, category,
    /// topics, keywords, or description. The first pass matches on word
    /// boundaries; `loose` retries with a wildcard-wrapped substring pattern.
    /// Results come back in the store's natural insertion order.
    async fn find_matching(
        &self,
        tokens: &[String],
        category: Option<Category>,
        loose: bool,
    ) -> PortResult<Vec<CatalogItem>>;

    async fn update(&self, id: Uuid, patch: CatalogPatch) -> PortResult<CatalogItem>;

    /// Removes the record and returns it so the caller can delete the
    /// referenced binary content as well.
    async fn delete(&self, id: Uuid) -> PortResult<CatalogItem>;

    /// Atomic at the store level: never synthesized from read-then-write.
    async fn increment_download(&self, id: Uuid) -> PortResult<()>;

    /// Bumps the purchase counter and adds `amount` to revenue in one
    /// store-side operation.
    async fn record_purchase(&self, id: Uuid, amount: f64) -> PortResult<()>;

    // --- Analytics ---
    async fn analytics_summary(&self) -> PortResult<CatalogSummary>;

    async fn topic_trends(&self, range: DateRange) -> PortResult<Vec<TopicTrend>>;

    async fn category_trends(&self, range: DateRange) -> PortResult<Vec<CategoryTrend>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Creates the record on first contact and refreshes `last_active_at` on
    /// every call.
    async fn get_or_create(&self, external_id: i64, name: &str) -> PortResult<UserRecord>;

    /// Fetches one user with their download history populated.
    async fn find_by_id(&self, id: Uuid) -> PortResult<UserRecord>;

    /// Bulk listing for the dashboard. Histories are left empty.
    async fn list(&self) -> PortResult<Vec<UserRecord>>;

    async fn append_download(&self, external_id: i64, entry: DownloadEntry) -> PortResult<()>;

    async fn stats_summary(&self) -> PortResult<UserStats>;
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Writes the file in chunks and returns its stored metadata, including
    /// the content id catalog records reference.
    async fn put(&self, file_name: &str, mime_type: &str, data: Bytes) -> PortResult<StoredContent>;

    /// Opens the stored file for reading, or `NotFound`.
    async fn open_read(&self, content_id: Uuid) -> PortResult<ContentStream>;

    async fn delete(&self, content_id: Uuid) -> PortResult<()>;
}

#[async_trait]
pub trait TextGeneration: Send + Sync {
    /// Produces free-form text for a prompt. May fail with `Unavailable`;
    /// every consumer must degrade to a deterministic templated reply and
    /// never block on or retry this call indefinitely.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> PortResult<String>;
}

#[async_trait]
pub trait ChatChannel: Send + Sync {
    /// Sends formatted reply text to the user this channel belongs to.
    async fn send_text(&self, text: &str) -> PortResult<()>;

    /// Sends a named binary attachment with a caption.
    async fn send_document(
        &self,
        file_name: &str,
        mime_type: &str,
        caption: &str,
        data: Bytes,
    ) -> PortResult<()>;
}
