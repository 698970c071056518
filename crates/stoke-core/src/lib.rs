//! Habit reconciliation core.
//!
//! Keeps a local view of two remote collections (habits, completions)
//! consistent with a document store under concurrent remote mutations,
//! using realtime notifications as refresh triggers rather than polling.
//!
//! # Architecture
//!
//! ```text
//! remote event ──► router ──► cache refresh (full replace) ──► snapshots
//! user write  ──► recorder ──► store ──► realtime event ──► (same path)
//! ```
//!
//! The subscription is signal-only: it says a collection changed, never
//! what changed. Every trigger answers with a full, user-filtered re-fetch,
//! trading bandwidth for correctness simplicity; there is no partial-merge
//! path to drift. Writes converge through the same loop, so the recorder
//! never edits the cache directly.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stoke_core::{Frequency, Session, SessionConfig};
//! use stoke_store::MemoryStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new("main"));
//! let session = Session::start(store, "u-1", SessionConfig::default()).await;
//!
//! let habit = session.add_habit("Read", "20 pages", Frequency::Daily).await?;
//! session.complete_habit(&habit.id).await?;
//!
//! // Convergence is observed through snapshots, not return values.
//! let done = session.is_completed_today(&habit.id).await;
//! # let _ = done;
//! session.shutdown().await;
//! # Ok(())
//! # }
//! ```

// Domain records
pub mod types;

// Event routing (realtime notification -> refresh action)
pub mod router;

// Session-scoped cache and derived completed-today set
pub mod cache;

// Write path
pub mod recorder;

// Session lifecycle
pub mod session;

// Error types
pub mod error;

// Re-export core types
pub use cache::HabitCache;
pub use error::{CoreError, Result};
pub use recorder::Recorder;
pub use router::{route, Channel, RefreshAction};
pub use session::{Session, SessionConfig};
pub use types::{completion_id, local_day_stamp, start_of_local_day, Completion, Frequency, Habit};

// Re-export from the store crate
pub use stoke_store::{DocumentStore, HttpStore, MemoryStore, StoreConfig};
