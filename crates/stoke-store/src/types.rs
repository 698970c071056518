//! Types for the document store API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Client configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Base URL for the document store HTTP API
    pub endpoint: String,
    /// Project id for namespacing
    pub project_id: String,
    /// Database id documents live under
    pub database_id: String,
    /// Optional API key for authentication
    pub api_key: Option<String>,
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    /// Per-subscription event buffer (default: 64)
    pub event_buffer: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            project_id: "default".to_string(),
            database_id: "main".to_string(),
            api_key: None,
            timeout_secs: 30,
            event_buffer: 64,
        }
    }
}

/// A stored document: server-managed envelope plus the caller's payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Document id, assigned by the store
    pub id: String,
    /// Collection this document belongs to
    pub collection: String,
    /// Server time of creation
    pub created_at: DateTime<Utc>,
    /// Server time of the last update
    pub updated_at: DateTime<Utc>,
    /// The document fields
    pub data: Value,
}

impl Document {
    /// Deserialize the payload into a typed record.
    ///
    /// The envelope `id` is merged into the payload under `"id"` so record
    /// types can carry their identity as a plain field.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        let mut data = self.data.clone();
        if let Value::Object(map) = &mut data {
            map.insert("id".to_string(), Value::String(self.id.clone()));
        }
        Ok(serde_json::from_value(data)?)
    }
}
