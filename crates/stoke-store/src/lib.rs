//! Document store client for stoke.
//!
//! One trait, three concerns:
//!
//! - [`DocumentStore`]: filtered list / create / update / delete over
//!   collections of JSON documents, plus realtime change subscriptions.
//! - [`HttpStore`]: the production client. REST for documents, a single
//!   multiplexed WebSocket for realtime events.
//! - [`MemoryStore`]: in-process store with the same observable behavior,
//!   including realtime events. Backs tests and the CLI demo mode.
//!
//! # Example
//!
//! ```rust,no_run
//! use stoke_store::{DocumentStore, HttpStore, Query, StoreConfig, documents_channel};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = HttpStore::connect(StoreConfig {
//!     endpoint: "https://store.example.com".into(),
//!     project_id: "stoke".into(),
//!     ..Default::default()
//! })?;
//!
//! let habits = store
//!     .list_documents("habits", &[Query::equal("user_id", "u-1")])
//!     .await?;
//!
//! let mut sub = store.subscribe(&documents_channel("main", "habits"));
//! while let Some(event) = sub.recv().await {
//!     println!("{:?}", event.events);
//! }
//! # let _ = habits;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod events;
pub mod http;
pub mod memory;
pub mod query;
pub mod store;
pub mod types;

// Re-export main types
pub use error::{Result, StoreError};
pub use events::{document_events, documents_channel, ChangeKind, RealtimeEvent, Subscription};
pub use http::HttpStore;
pub use memory::MemoryStore;
pub use query::Query;
pub use store::DocumentStore;
pub use types::{Document, StoreConfig};
