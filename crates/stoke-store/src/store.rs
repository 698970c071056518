//! The `DocumentStore` trait: the remote collaborator surface.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::events::Subscription;
use crate::query::Query;
use crate::types::Document;

/// Durable storage for documents grouped into collections, with a realtime
/// change feed per collection.
///
/// All implementations are shared behind `Arc<dyn DocumentStore>`; callers
/// never observe which backend they are talking to.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// List documents in a collection matching every query predicate.
    async fn list_documents(&self, collection: &str, queries: &[Query]) -> Result<Vec<Document>>;

    /// Create a document. With `id: None` the store assigns a unique id;
    /// a caller-chosen id that already exists fails with
    /// [`StoreError::Conflict`](crate::StoreError::Conflict).
    async fn create_document(
        &self,
        collection: &str,
        id: Option<&str>,
        data: Value,
    ) -> Result<Document>;

    /// Partially update a document: fields present in `data` replace the
    /// stored fields, everything else is kept (last-write-wins).
    async fn update_document(&self, collection: &str, id: &str, data: Value) -> Result<Document>;

    /// Delete a document.
    async fn delete_document(&self, collection: &str, id: &str) -> Result<()>;

    /// Subscribe to a realtime channel (see
    /// [`documents_channel`](crate::documents_channel)). The subscription
    /// unsubscribes when dropped.
    fn subscribe(&self, channel: &str) -> Subscription;
}
