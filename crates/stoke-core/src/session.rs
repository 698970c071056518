//! Session lifecycle: one subscription pair per authenticated user.
//!
//! A `Session` owns the cache, the write path, and the router task that
//! turns realtime notifications into re-fetches. Subscriptions are created
//! once at start and torn down exactly once at shutdown; consumers read
//! snapshots and never touch the subscriptions themselves. "No user" is
//! simply "no session": nothing is cached and nothing is subscribed.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::HabitCache;
use crate::error::Result;
use crate::recorder::Recorder;
use crate::router::{route, Channel, RefreshAction};
use crate::types::{Frequency, Habit};
use stoke_store::{documents_channel, DocumentStore, Subscription};

/// Collection layout for a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Database the collections live under
    pub database_id: String,
    /// Collection holding Habit documents
    pub habits_collection: String,
    /// Collection holding Completion documents
    pub completions_collection: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            database_id: "main".to_string(),
            habits_collection: "habits".to_string(),
            completions_collection: "completions".to_string(),
        }
    }
}

/// A running reconciliation session for one authenticated user.
pub struct Session {
    user_id: String,
    cache: Arc<HabitCache>,
    recorder: Recorder,
    shutdown: watch::Sender<bool>,
    router: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Subscribe, fetch the initial snapshot, and spawn the router loop.
    pub async fn start(
        store: Arc<dyn DocumentStore>,
        user_id: impl Into<String>,
        config: SessionConfig,
    ) -> Session {
        let user_id = user_id.into();
        info!(user_id = %user_id, "starting habit session");

        let cache = Arc::new(HabitCache::new(
            Arc::clone(&store),
            user_id.clone(),
            config.clone(),
        ));

        // Subscribe before the initial fetch: a mutation landing between
        // the two still produces an event, and the re-fetch it triggers is
        // idempotent.
        let habit_sub =
            store.subscribe(&documents_channel(&config.database_id, &config.habits_collection));
        let completion_sub = store.subscribe(&documents_channel(
            &config.database_id,
            &config.completions_collection,
        ));

        cache.refresh_habits().await;
        cache.refresh_completions().await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let router = tokio::spawn(router_loop(
            Arc::clone(&cache),
            habit_sub,
            completion_sub,
            shutdown_rx,
        ));

        let recorder = Recorder::new(store, Arc::clone(&cache), user_id.clone(), config);

        Session {
            user_id,
            cache,
            recorder,
            shutdown: shutdown_tx,
            router: Mutex::new(Some(router)),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Snapshot of the user's habits.
    pub async fn habits(&self) -> Vec<Habit> {
        self.cache.habits().await
    }

    /// Look up one habit in the current snapshot.
    pub async fn habit(&self, habit_id: &str) -> Option<Habit> {
        self.cache.habit(habit_id).await
    }

    /// Snapshot of the habit ids completed today.
    pub async fn completed_today(&self) -> HashSet<String> {
        self.cache.completed_today().await
    }

    /// Whether a habit has a completion within the current local day.
    pub async fn is_completed_today(&self, habit_id: &str) -> bool {
        self.cache.is_completed_today(habit_id).await
    }

    /// Re-pull both collections. The same operation the router runs on
    /// events; useful when a consumer wants a fresh snapshot on demand.
    pub async fn refresh(&self) {
        self.cache.refresh_habits().await;
        self.cache.refresh_completions().await;
    }

    /// Create a new habit with a zero streak.
    pub async fn add_habit(
        &self,
        title: &str,
        description: &str,
        frequency: Frequency,
    ) -> Result<Habit> {
        self.recorder.add_habit(title, description, frequency).await
    }

    /// Record today's completion and advance the streak. See
    /// [`Recorder::complete_habit`].
    pub async fn complete_habit(&self, habit_id: &str) -> Result<()> {
        self.recorder.complete_habit(habit_id).await
    }

    /// Delete a habit remotely; the cache converges via the delete event.
    pub async fn delete_habit(&self, habit_id: &str) -> Result<()> {
        self.recorder.delete_habit(habit_id).await
    }

    /// Tear the session down: stop the router, drop both subscriptions,
    /// and stop installing any still-in-flight refresh results.
    pub async fn shutdown(&self) {
        info!(user_id = %self.user_id, "shutting down habit session");
        self.cache.close();
        let _ = self.shutdown.send(true);
        let handle = match self.router.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.router.lock() {
            if let Some(handle) = guard.take() {
                handle.abort();
            }
        }
    }
}

/// Dispatch realtime notifications to cache refreshes until shutdown or
/// until both channels close.
async fn router_loop(
    cache: Arc<HabitCache>,
    mut habit_sub: Subscription,
    mut completion_sub: Subscription,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut habits_open = true;
    let mut completions_open = true;

    while habits_open || completions_open {
        let action = tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                None
            }
            event = habit_sub.recv(), if habits_open => match event {
                Some(event) => route(Channel::Habits, &event.events),
                None => {
                    habits_open = false;
                    None
                }
            },
            event = completion_sub.recv(), if completions_open => match event {
                Some(event) => route(Channel::Completions, &event.events),
                None => {
                    completions_open = false;
                    None
                }
            },
        };

        match action {
            Some(RefreshAction::Habits) => cache.refresh_habits().await,
            Some(RefreshAction::Completions) => cache.refresh_completions().await,
            None => {}
        }
    }
    debug!("router loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use stoke_store::MemoryStore;

    const TICK: Duration = Duration::from_millis(10);
    const TRIES: usize = 200;

    async fn start_session(store: &Arc<MemoryStore>) -> Session {
        Session::start(
            store.clone() as Arc<dyn DocumentStore>,
            "u-1",
            SessionConfig::default(),
        )
        .await
    }

    fn habit_data(user: &str, title: &str) -> serde_json::Value {
        json!({
            "user_id": user,
            "title": title,
            "frequency": "daily",
            "streak_count": 0,
        })
    }

    #[tokio::test]
    async fn test_start_loads_initial_snapshot() {
        let store = Arc::new(MemoryStore::new("main"));
        store
            .create_document("habits", None, habit_data("u-1", "Read"))
            .await
            .unwrap();

        let session = start_session(&store).await;
        assert_eq!(session.habits().await.len(), 1);
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_remote_create_converges() {
        let store = Arc::new(MemoryStore::new("main"));
        let session = start_session(&store).await;
        assert!(session.habits().await.is_empty());

        // A different client writes directly to the store.
        store
            .create_document("habits", None, habit_data("u-1", "Run"))
            .await
            .unwrap();

        let mut converged = false;
        for _ in 0..TRIES {
            if session.habits().await.len() == 1 {
                converged = true;
                break;
            }
            tokio::time::sleep(TICK).await;
        }
        assert!(converged, "habit create event did not trigger a refresh");
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_completion_event_converges_completed_today() {
        let store = Arc::new(MemoryStore::new("main"));
        store
            .create_document("habits", Some("h-1"), habit_data("u-1", "Read"))
            .await
            .unwrap();
        let session = start_session(&store).await;

        session.complete_habit("h-1").await.unwrap();

        let mut converged = false;
        for _ in 0..TRIES {
            if session.is_completed_today("h-1").await
                && session.habit("h-1").await.map(|h| h.streak_count) == Some(1)
            {
                converged = true;
                break;
            }
            tokio::time::sleep(TICK).await;
        }
        assert!(converged, "completion did not converge through events");
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_remote_delete_converges() {
        let store = Arc::new(MemoryStore::new("main"));
        store
            .create_document("habits", Some("h-1"), habit_data("u-1", "Read"))
            .await
            .unwrap();
        let session = start_session(&store).await;
        assert_eq!(session.habits().await.len(), 1);

        session.delete_habit("h-1").await.unwrap();

        let mut converged = false;
        for _ in 0..TRIES {
            if session.habits().await.is_empty() {
                converged = true;
                break;
            }
            tokio::time::sleep(TICK).await;
        }
        assert!(converged, "habit delete event did not trigger a refresh");
        session.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_stops_reconciliation() {
        let store = Arc::new(MemoryStore::new("main"));
        let session = start_session(&store).await;
        session.shutdown().await;

        store
            .create_document("habits", None, habit_data("u-1", "Read"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(
            session.habits().await.is_empty(),
            "cache updated after shutdown"
        );
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let store = Arc::new(MemoryStore::new("main"));
        let session = start_session(&store).await;
        session.shutdown().await;
        session.shutdown().await;
    }
}
