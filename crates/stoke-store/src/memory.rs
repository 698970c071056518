//! In-memory document store.
//!
//! Backs tests and the CLI demo mode. Behaves like the remote store from
//! the client's perspective: assigns ids, enforces id uniqueness, evaluates
//! query predicates, and emits the same realtime events a gateway would.
//!
//! Failure injection knobs let tests exercise the error paths without a
//! network.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::events::{document_events, documents_channel, ChangeKind, RealtimeHub, Subscription};
use crate::query::Query;
use crate::store::DocumentStore;
use crate::types::Document;

/// In-memory `DocumentStore` with realtime event emission.
pub struct MemoryStore {
    database_id: String,
    collections: RwLock<HashMap<String, BTreeMap<String, Document>>>,
    hub: Arc<RealtimeHub>,
    event_buffer: usize,
    fail_lists: AtomicBool,
    fail_creates: AtomicBool,
    fail_updates: AtomicBool,
    list_calls: AtomicU32,
}

impl MemoryStore {
    /// Create an empty store for the given database id.
    pub fn new(database_id: impl Into<String>) -> Self {
        Self {
            database_id: database_id.into(),
            collections: RwLock::new(HashMap::new()),
            hub: RealtimeHub::new(),
            event_buffer: 64,
            fail_lists: AtomicBool::new(false),
            fail_creates: AtomicBool::new(false),
            fail_updates: AtomicBool::new(false),
            list_calls: AtomicU32::new(0),
        }
    }

    /// Make every `list_documents` call fail until reset.
    pub fn set_fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    /// Make every `create_document` call fail until reset.
    pub fn set_fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    /// Make every `update_document` call fail until reset.
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    /// Number of `list_documents` calls served (including failed ones).
    pub fn list_calls(&self) -> u32 {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Fetch one document without a query round-trip. Test convenience.
    pub async fn get_document(&self, collection: &str, id: &str) -> Option<Document> {
        let collections = self.collections.read().await;
        collections.get(collection)?.get(id).cloned()
    }

    /// Number of documents in a collection. Test convenience.
    pub async fn document_count(&self, collection: &str) -> usize {
        let collections = self.collections.read().await;
        collections.get(collection).map_or(0, |docs| docs.len())
    }

    fn emit(&self, collection: &str, document_id: &str, kind: ChangeKind, payload: Value) {
        let channel = documents_channel(&self.database_id, collection);
        let events = document_events(&self.database_id, collection, document_id, kind);
        self.hub.publish(crate::events::RealtimeEvent {
            channel,
            events,
            payload,
        });
    }

    fn injected(&self, flag: &AtomicBool, op: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::Server {
                status: 503,
                message: format!("injected {op} failure"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list_documents(&self, collection: &str, queries: &[Query]) -> Result<Vec<Document>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.injected(&self.fail_lists, "list")?;

        let collections = self.collections.read().await;
        let Some(docs) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(docs
            .values()
            .filter(|doc| queries.iter().all(|q| q.matches(&doc.data)))
            .cloned()
            .collect())
    }

    async fn create_document(
        &self,
        collection: &str,
        id: Option<&str>,
        data: Value,
    ) -> Result<Document> {
        self.injected(&self.fail_creates, "create")?;

        let id = match id {
            Some(id) => id.to_string(),
            None => uuid::Uuid::new_v4().to_string(),
        };
        let now = Utc::now();
        let document = Document {
            id: id.clone(),
            collection: collection.to_string(),
            created_at: now,
            updated_at: now,
            data,
        };

        {
            let mut collections = self.collections.write().await;
            let docs = collections.entry(collection.to_string()).or_default();
            if docs.contains_key(&id) {
                return Err(StoreError::Conflict(id));
            }
            docs.insert(id.clone(), document.clone());
        }

        let payload = serde_json::to_value(&document)?;
        self.emit(collection, &id, ChangeKind::Create, payload);
        Ok(document)
    }

    async fn update_document(&self, collection: &str, id: &str, data: Value) -> Result<Document> {
        self.injected(&self.fail_updates, "update")?;

        let document = {
            let mut collections = self.collections.write().await;
            let doc = collections
                .get_mut(collection)
                .and_then(|docs| docs.get_mut(id))
                .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

            if let (Value::Object(stored), Value::Object(updates)) = (&mut doc.data, data) {
                for (key, value) in updates {
                    stored.insert(key, value);
                }
            }
            doc.updated_at = Utc::now();
            doc.clone()
        };

        let payload = serde_json::to_value(&document)?;
        self.emit(collection, id, ChangeKind::Update, payload);
        Ok(document)
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<()> {
        let removed = {
            let mut collections = self.collections.write().await;
            collections
                .get_mut(collection)
                .and_then(|docs| docs.remove(id))
        };
        if removed.is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }

        self.emit(collection, id, ChangeKind::Delete, Value::Object(Default::default()));
        Ok(())
    }

    fn subscribe(&self, channel: &str) -> Subscription {
        self.hub.subscribe(channel, self.event_buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_create_assigns_id_when_absent() {
        let store = MemoryStore::new("main");
        let doc = store
            .create_document("habits", None, json!({"title": "Read"}))
            .await
            .unwrap();
        assert!(!doc.id.is_empty());
        assert_eq!(store.document_count("habits").await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_id_conflicts() {
        let store = MemoryStore::new("main");
        store
            .create_document("completions", Some("h-1-2026-08-07"), json!({"habit_id": "h-1"}))
            .await
            .unwrap();

        let err = store
            .create_document("completions", Some("h-1-2026-08-07"), json!({"habit_id": "h-1"}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.document_count("completions").await, 1);
    }

    #[tokio::test]
    async fn test_list_applies_queries_conjunctively() {
        let store = MemoryStore::new("main");
        for (user, title) in [("u-1", "Read"), ("u-1", "Run"), ("u-2", "Write")] {
            store
                .create_document("habits", None, json!({"user_id": user, "title": title}))
                .await
                .unwrap();
        }

        let docs = store
            .list_documents(
                "habits",
                &[
                    Query::equal("user_id", "u-1"),
                    Query::equal("title", "Run"),
                ],
            )
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].data["title"], "Run");
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = MemoryStore::new("main");
        let doc = store
            .create_document("habits", None, json!({"title": "Read", "streak_count": 0}))
            .await
            .unwrap();

        let updated = store
            .update_document("habits", &doc.id, json!({"streak_count": 1}))
            .await
            .unwrap();
        assert_eq!(updated.data["streak_count"], 1);
        assert_eq!(updated.data["title"], "Read");
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = MemoryStore::new("main");
        let err = store.delete_document("habits", "nope").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_mutations_emit_realtime_events() {
        let store = MemoryStore::new("main");
        let mut sub = store.subscribe(&documents_channel("main", "habits"));

        let doc = store
            .create_document("habits", None, json!({"title": "Read"}))
            .await
            .unwrap();
        let event = sub.recv().await.unwrap();
        assert!(event.includes(ChangeKind::Create));
        assert!(event
            .events
            .contains(&"databases.*.collections.*.documents.*.create".to_string()));

        store.delete_document("habits", &doc.id).await.unwrap();
        let event = sub.recv().await.unwrap();
        assert!(event.includes(ChangeKind::Delete));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryStore::new("main");
        store.set_fail_lists(true);
        assert!(store.list_documents("habits", &[]).await.is_err());
        store.set_fail_lists(false);
        assert!(store.list_documents("habits", &[]).await.is_ok());
        assert_eq!(store.list_calls(), 2);
    }
}
