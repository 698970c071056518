//! HTTP implementation of `DocumentStore`.
//!
//! REST for document operations, one multiplexed WebSocket for realtime
//! events. The socket is owned by a background task that fans incoming
//! events out to channel subscribers through the shared hub; subscribers
//! come and go without touching the socket.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::events::{RealtimeEvent, RealtimeHub, Subscription};
use crate::query::Query;
use crate::store::DocumentStore;
use crate::types::{Document, StoreConfig};

/// Reconnect delay for the realtime socket.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct DocumentListResponse {
    #[allow(dead_code)]
    total: u64,
    documents: Vec<Document>,
}

/// HTTP + WebSocket client for the remote document store.
pub struct HttpStore {
    config: StoreConfig,
    client: Client,
    hub: Arc<RealtimeHub>,
    realtime: Option<JoinHandle<()>>,
}

impl HttpStore {
    /// Create a client for document operations only (no realtime socket).
    pub fn new(config: StoreConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref api_key) = config.api_key {
            let value = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| StoreError::Config(format!("invalid API key: {e}")))?;
            headers.insert(header::AUTHORIZATION, value);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config,
            client,
            hub: RealtimeHub::new(),
            realtime: None,
        })
    }

    /// Create a client and start the realtime socket task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn connect(config: StoreConfig) -> Result<Self> {
        let mut store = Self::new(config)?;
        let url = store.realtime_url();
        let hub = Arc::clone(&store.hub);
        store.realtime = Some(tokio::spawn(realtime_task(url, hub)));
        Ok(store)
    }

    fn base_url(&self) -> String {
        format!(
            "{}/v1/projects/{}/databases/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.project_id,
            self.config.database_id,
        )
    }

    fn realtime_url(&self) -> String {
        let ws_endpoint = self
            .config
            .endpoint
            .trim_end_matches('/')
            .replacen("http", "ws", 1);
        format!(
            "{}/v1/projects/{}/realtime",
            ws_endpoint, self.config.project_id
        )
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
        context: &str,
    ) -> Result<T> {
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(context.to_string()));
        }
        if response.status() == StatusCode::CONFLICT {
            return Err(StoreError::Conflict(context.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Server {
                status,
                message: body,
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl DocumentStore for HttpStore {
    async fn list_documents(&self, collection: &str, queries: &[Query]) -> Result<Vec<Document>> {
        let mut url = format!(
            "{}/collections/{}/documents",
            self.base_url(),
            urlencoding::encode(collection)
        );

        let params: Vec<String> = queries
            .iter()
            .map(|q| format!("query={}", urlencoding::encode(&q.to_param())))
            .collect();
        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }

        let response = self.client.get(&url).send().await?;
        let list: DocumentListResponse = self.handle_response(response, collection).await?;
        Ok(list.documents)
    }

    async fn create_document(
        &self,
        collection: &str,
        id: Option<&str>,
        data: Value,
    ) -> Result<Document> {
        let url = format!(
            "{}/collections/{}/documents",
            self.base_url(),
            urlencoding::encode(collection)
        );

        // Caller-chosen ids pass through; otherwise the client picks a
        // unique one, as the store treats the id as opaque.
        let document_id = match id {
            Some(id) => id.to_string(),
            None => uuid::Uuid::new_v4().to_string(),
        };

        let body = json!({ "document_id": document_id, "data": data });
        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;
        self.handle_response(response, &document_id).await
    }

    async fn update_document(&self, collection: &str, id: &str, data: Value) -> Result<Document> {
        let url = format!(
            "{}/collections/{}/documents/{}",
            self.base_url(),
            urlencoding::encode(collection),
            urlencoding::encode(id)
        );

        let body = json!({ "data": data });
        let response = self
            .client
            .patch(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await?;
        self.handle_response(response, id).await
    }

    async fn delete_document(&self, collection: &str, id: &str) -> Result<()> {
        let url = format!(
            "{}/collections/{}/documents/{}",
            self.base_url(),
            urlencoding::encode(collection),
            urlencoding::encode(id)
        );

        let response = self.client.delete(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(id.to_string()));
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Server {
                status,
                message: body,
            });
        }
        Ok(())
    }

    fn subscribe(&self, channel: &str) -> Subscription {
        self.hub.subscribe(channel, self.config.event_buffer)
    }
}

impl Drop for HttpStore {
    fn drop(&mut self) {
        if let Some(handle) = self.realtime.take() {
            handle.abort();
        }
    }
}

/// Own the realtime socket: connect, fan events out, reconnect on failure.
async fn realtime_task(url: String, hub: Arc<RealtimeHub>) {
    loop {
        match connect_async(url.as_str()).await {
            Ok((mut socket, _)) => {
                debug!(%url, "realtime socket connected");
                while let Some(message) = socket.next().await {
                    match message {
                        Ok(Message::Text(text)) => {
                            match serde_json::from_str::<RealtimeEvent>(&text) {
                                Ok(event) => hub.publish(event),
                                Err(e) => {
                                    warn!(error = %e, "undecodable realtime message, skipping")
                                }
                            }
                        }
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            warn!(error = %e, "realtime socket error");
                            break;
                        }
                    }
                }
                debug!("realtime socket closed, reconnecting");
            }
            Err(e) => {
                warn!(error = %e, "realtime connect failed, retrying");
            }
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}
