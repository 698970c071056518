//! Session-scoped cache of habits and today's completions.
//!
//! The cache is the only holder of local state. It is rebuilt wholesale by
//! the two refresh operations, never patched incrementally, and read
//! through snapshot accessors. Nothing else may write it.
//!
//! Refreshes may overlap; a ticket taken at issue time makes the
//! last-issued refresh win even when responses resolve out of order. A
//! refresh that fails leaves the previous snapshot in place.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::session::SessionConfig;
use crate::types::{decode, start_of_local_day, Completion, Habit};
use stoke_store::{DocumentStore, Query};

#[derive(Default)]
struct CacheState {
    habits: Vec<Habit>,
    completed_today: HashSet<String>,
    habits_installed: u64,
    completions_installed: u64,
}

/// Authoritative local snapshot for one authenticated session.
pub struct HabitCache {
    store: Arc<dyn DocumentStore>,
    config: SessionConfig,
    user_id: String,
    state: RwLock<CacheState>,
    habits_issued: AtomicU64,
    completions_issued: AtomicU64,
    closed: AtomicBool,
}

impl HabitCache {
    pub fn new(store: Arc<dyn DocumentStore>, user_id: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            store,
            config,
            user_id: user_id.into(),
            state: RwLock::new(CacheState::default()),
            habits_issued: AtomicU64::new(0),
            completions_issued: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Re-fetch all of the user's habits and replace the local list.
    ///
    /// Idempotent and safe to invoke concurrently with itself; see module
    /// docs for the overlap policy.
    pub async fn refresh_habits(&self) {
        let ticket = self.habits_issued.fetch_add(1, Ordering::SeqCst) + 1;
        match self.fetch_habits().await {
            Ok(habits) => self.install_habits(ticket, habits).await,
            Err(e) => warn!(error = %e, "habit refresh failed, keeping previous snapshot"),
        }
    }

    /// Re-fetch today's completions and replace the completed-today set.
    pub async fn refresh_completions(&self) {
        let ticket = self.completions_issued.fetch_add(1, Ordering::SeqCst) + 1;
        match self.fetch_completions().await {
            Ok(completed) => self.install_completions(ticket, completed).await,
            Err(e) => warn!(error = %e, "completions refresh failed, keeping previous snapshot"),
        }
    }

    async fn fetch_habits(&self) -> crate::error::Result<Vec<Habit>> {
        let docs = self
            .store
            .list_documents(
                &self.config.habits_collection,
                &[Query::equal("user_id", self.user_id.clone())],
            )
            .await?;

        let mut habits = Vec::with_capacity(docs.len());
        for doc in &docs {
            match decode::<Habit>(doc) {
                Ok(habit) => habits.push(habit),
                Err(e) => warn!(doc_id = %doc.id, error = %e, "skipping undecodable habit"),
            }
        }
        Ok(habits)
    }

    async fn fetch_completions(&self) -> crate::error::Result<HashSet<String>> {
        let since = start_of_local_day(Utc::now());
        let docs = self
            .store
            .list_documents(
                &self.config.completions_collection,
                &[
                    Query::equal("user_id", self.user_id.clone()),
                    Query::greater_than_equal("completed_at", since.to_rfc3339()),
                ],
            )
            .await?;

        let mut completed = HashSet::with_capacity(docs.len());
        for doc in &docs {
            match decode::<Completion>(doc) {
                Ok(completion) => {
                    completed.insert(completion.habit_id);
                }
                Err(e) => warn!(doc_id = %doc.id, error = %e, "skipping undecodable completion"),
            }
        }
        Ok(completed)
    }

    async fn install_habits(&self, ticket: u64, habits: Vec<Habit>) {
        if self.closed.load(Ordering::SeqCst) {
            debug!(ticket, "cache closed, discarding habit snapshot");
            return;
        }
        let mut state = self.state.write().await;
        if ticket < state.habits_installed {
            debug!(ticket, "discarding stale habit snapshot");
            return;
        }
        state.habits_installed = ticket;
        state.habits = habits;
    }

    async fn install_completions(&self, ticket: u64, completed: HashSet<String>) {
        if self.closed.load(Ordering::SeqCst) {
            debug!(ticket, "cache closed, discarding completions snapshot");
            return;
        }
        let mut state = self.state.write().await;
        if ticket < state.completions_installed {
            debug!(ticket, "discarding stale completions snapshot");
            return;
        }
        state.completions_installed = ticket;
        state.completed_today = completed;
    }

    /// Stop installing refresh results. Called on session shutdown so a
    /// fetch resolving late cannot update a cache nobody observes.
    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Snapshot of the user's habits.
    pub async fn habits(&self) -> Vec<Habit> {
        self.state.read().await.habits.clone()
    }

    /// Look up one habit in the current snapshot.
    pub async fn habit(&self, habit_id: &str) -> Option<Habit> {
        self.state
            .read()
            .await
            .habits
            .iter()
            .find(|h| h.id == habit_id)
            .cloned()
    }

    /// Snapshot of the habit ids completed today.
    pub async fn completed_today(&self) -> HashSet<String> {
        self.state.read().await.completed_today.clone()
    }

    /// Membership test against the current completed-today snapshot.
    pub async fn is_completed_today(&self, habit_id: &str) -> bool {
        self.state.read().await.completed_today.contains(habit_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;
    use stoke_store::MemoryStore;

    fn cache_over(store: Arc<MemoryStore>) -> HabitCache {
        HabitCache::new(store, "u-1", SessionConfig::default())
    }

    async fn seed_habit(store: &MemoryStore, user: &str, title: &str) -> String {
        store
            .create_document(
                "habits",
                None,
                json!({
                    "user_id": user,
                    "title": title,
                    "frequency": "daily",
                    "streak_count": 0,
                }),
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_refresh_habits_is_user_filtered() {
        let store = Arc::new(MemoryStore::new("main"));
        seed_habit(&store, "u-1", "Read").await;
        seed_habit(&store, "u-2", "Run").await;

        let cache = cache_over(store);
        cache.refresh_habits().await;

        let habits = cache.habits().await;
        assert_eq!(habits.len(), 1);
        assert_eq!(habits[0].title, "Read");
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let store = Arc::new(MemoryStore::new("main"));
        seed_habit(&store, "u-1", "Read").await;

        let cache = cache_over(store);
        cache.refresh_habits().await;
        let first = cache.habits().await;
        cache.refresh_habits().await;
        assert_eq!(cache.habits().await, first);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let store = Arc::new(MemoryStore::new("main"));
        seed_habit(&store, "u-1", "Read").await;

        let cache = cache_over(store.clone());
        cache.refresh_habits().await;
        assert_eq!(cache.habits().await.len(), 1);

        store.set_fail_lists(true);
        cache.refresh_habits().await;
        assert_eq!(cache.habits().await.len(), 1, "stale but consistent");
    }

    #[tokio::test]
    async fn test_last_issued_refresh_wins() {
        let store = Arc::new(MemoryStore::new("main"));
        let cache = cache_over(store);

        let earlier = vec![Habit {
            id: "h-old".into(),
            user_id: "u-1".into(),
            title: "Old".into(),
            description: String::new(),
            frequency: crate::types::Frequency::Daily,
            streak_count: 0,
            last_completed: None,
        }];
        let later = vec![Habit {
            id: "h-new".into(),
            title: "New".into(),
            ..earlier[0].clone()
        }];

        // Ticket 2 resolves first, ticket 1 arrives late: the later-issued
        // snapshot must stand.
        cache.install_habits(2, later).await;
        cache.install_habits(1, earlier).await;

        let habits = cache.habits().await;
        assert_eq!(habits.len(), 1);
        assert_eq!(habits[0].id, "h-new");
    }

    #[tokio::test]
    async fn test_completions_window_is_today_only() {
        let store = Arc::new(MemoryStore::new("main"));
        let now = Utc::now();
        for (habit, at) in [("h-today", now), ("h-yesterday", now - Duration::days(1))] {
            store
                .create_document(
                    "completions",
                    None,
                    json!({"habit_id": habit, "user_id": "u-1", "completed_at": at}),
                )
                .await
                .unwrap();
        }

        let cache = cache_over(store);
        cache.refresh_completions().await;

        assert!(cache.is_completed_today("h-today").await);
        assert!(!cache.is_completed_today("h-yesterday").await);
        assert_eq!(cache.completed_today().await.len(), 1);
    }

    #[tokio::test]
    async fn test_undecodable_documents_are_skipped() {
        let store = Arc::new(MemoryStore::new("main"));
        seed_habit(&store, "u-1", "Read").await;
        store
            .create_document("habits", None, json!({"user_id": "u-1", "garbage": true}))
            .await
            .unwrap();

        let cache = cache_over(store);
        cache.refresh_habits().await;
        assert_eq!(cache.habits().await.len(), 1);
    }

    #[tokio::test]
    async fn test_closed_cache_discards_results() {
        let store = Arc::new(MemoryStore::new("main"));
        seed_habit(&store, "u-1", "Read").await;

        let cache = cache_over(store);
        cache.close();
        cache.refresh_habits().await;
        assert!(cache.habits().await.is_empty());
    }
}
