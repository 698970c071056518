//! The write path: create habits, record completions, delete habits.
//!
//! `complete_habit` is two sequential remote writes (completion record,
//! then streak update) that must look atomic to the caller. Success is
//! observed indirectly: each write makes the store emit a realtime event,
//! the router re-fetches, and the cache converges.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, warn};

use crate::cache::HabitCache;
use crate::error::Result;
use crate::session::SessionConfig;
use crate::types::{completion_id, decode, Frequency, Habit};
use stoke_store::{DocumentStore, StoreError};

/// Write-path operations for one authenticated session.
pub struct Recorder {
    store: Arc<dyn DocumentStore>,
    cache: Arc<HabitCache>,
    config: SessionConfig,
    user_id: String,
}

impl Recorder {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        cache: Arc<HabitCache>,
        user_id: impl Into<String>,
        config: SessionConfig,
    ) -> Self {
        Self {
            store,
            cache,
            config,
            user_id: user_id.into(),
        }
    }

    /// Create a new habit with a zero streak.
    pub async fn add_habit(
        &self,
        title: &str,
        description: &str,
        frequency: Frequency,
    ) -> Result<Habit> {
        let data = json!({
            "user_id": self.user_id,
            "title": title,
            "description": description,
            "frequency": frequency,
            "streak_count": 0,
            "last_completed": null,
        });
        let doc = self
            .store
            .create_document(&self.config.habits_collection, None, data)
            .await?;
        decode(&doc)
    }

    /// Record a completion for today and advance the habit's streak.
    ///
    /// Preconditions make this a no-op rather than an error: a habit
    /// already completed today is skipped locally, and a completion that
    /// already exists remotely (another device won the race) is treated
    /// the same once the store reports the id conflict.
    ///
    /// If the completion write succeeds but the streak update fails, the
    /// inconsistency is logged and surfaced; no repair pass exists.
    pub async fn complete_habit(&self, habit_id: &str) -> Result<()> {
        if self.cache.is_completed_today(habit_id).await {
            debug!(habit_id, "already completed today, skipping");
            return Ok(());
        }

        let now = Utc::now();
        let data = json!({
            "habit_id": habit_id,
            "user_id": self.user_id,
            "completed_at": now,
        });
        let create = self
            .store
            .create_document(
                &self.config.completions_collection,
                Some(&completion_id(habit_id, now)),
                data,
            )
            .await;
        match create {
            Ok(_) => {}
            Err(StoreError::Conflict(id)) => {
                debug!(habit_id, completion_id = %id, "completion already recorded for today");
                return Ok(());
            }
            Err(e) => {
                warn!(habit_id, error = %e, "failed to record completion");
                return Err(e.into());
            }
        }

        // The habit may have been deleted concurrently; recording the
        // completion without a streak update is the defined outcome.
        let Some(habit) = self.cache.habit(habit_id).await else {
            debug!(habit_id, "habit missing from cache, skipping streak update");
            return Ok(());
        };

        let update = json!({
            "streak_count": habit.streak_count + 1,
            "last_completed": now,
        });
        if let Err(e) = self
            .store
            .update_document(&self.config.habits_collection, habit_id, update)
            .await
        {
            warn!(habit_id, error = %e, "completion recorded but streak update failed");
            return Err(e.into());
        }
        Ok(())
    }

    /// Delete a habit remotely.
    ///
    /// No optimistic local removal: the habit leaves the cache when the
    /// store's delete event triggers the next habit refresh. Completion
    /// records referencing the habit are not cascaded.
    pub async fn delete_habit(&self, habit_id: &str) -> Result<()> {
        self.store
            .delete_document(&self.config.habits_collection, habit_id)
            .await?;
        Ok(())
    }
}
