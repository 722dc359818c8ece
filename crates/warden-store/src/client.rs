//! HTTP client for the document store platform.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    CommitResponse, Document, ListDocumentsResponse, MAX_WRITES_PER_COMMIT, StoreError, WriteOp,
};

/// Page size used when walking a whole collection.
const LIST_PAGE_SIZE: u32 = 100;

/// Total attempts per request: initial + 3 retries with backoff.
const MAX_ATTEMPTS: u32 = 4;

/// Client for the document store's admin API.
///
/// One instance is created at process start and shared read-only by every
/// handler. The admin key does not expire, so there is no session state.
pub struct StoreClient {
    http: Client,
    base_url: String,
    admin_key: String,
}

impl StoreClient {
    /// Create a new client for the given store URL and admin key.
    pub fn new(base_url: impl Into<String>, admin_key: impl Into<String>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: base_url.into(),
            admin_key: admin_key.into(),
        }
    }

    /// Get the store base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List one page of documents in a collection.
    pub async fn list_documents<T: DeserializeOwned>(
        &self,
        collection: &str,
        limit: Option<u32>,
        cursor: Option<&str>,
    ) -> Result<ListDocumentsResponse<T>, StoreError> {
        let url = format!(
            "{}/v1/collections/{}/documents",
            self.base_url, collection
        );

        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        let mut last_error = None;
        for attempt in 0..MAX_ATTEMPTS {
            let response = self
                .http
                .get(&url)
                .header("Authorization", format!("Bearer {}", self.admin_key))
                .query(&query)
                .send()
                .await;

            let result = match response {
                Ok(response) => self.handle_response(response).await,
                Err(e) => Err(StoreError::Http(e)),
            };

            match result {
                Ok(v) => return Ok(v),
                Err(ref e) if Self::is_transient_error(e) && attempt < MAX_ATTEMPTS - 1 => {
                    let backoff_ms = 500 * (1 << attempt); // 500ms, 1s, 2s
                    debug!(
                        attempt = attempt + 1,
                        backoff_ms,
                        error = %e,
                        "transient error in list_documents, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    last_error = Some(result);
                    continue;
                }
                Err(_) => return result,
            }
        }

        last_error.unwrap_or_else(|| Err(StoreError::InvalidResponse("retry exhausted".into())))
    }

    /// List every document in a collection, following pagination cursors.
    ///
    /// The store caps list pages, so a full snapshot read is a cursor walk.
    pub async fn list_all_documents<T: DeserializeOwned>(
        &self,
        collection: &str,
    ) -> Result<Vec<Document<T>>, StoreError> {
        let mut all_documents = Vec::new();
        let mut cursor = None;

        loop {
            let response: ListDocumentsResponse<T> = self
                .list_documents(collection, Some(LIST_PAGE_SIZE), cursor.as_deref())
                .await?;

            all_documents.extend(response.documents);

            if response.cursor.is_none() {
                break;
            }
            cursor = response.cursor;
        }

        Ok(all_documents)
    }

    /// Partially update a single document, merging `fields` into it.
    pub async fn patch_document(
        &self,
        collection: &str,
        id: &str,
        fields: serde_json::Value,
    ) -> Result<Document<serde_json::Value>, StoreError> {
        let url = format!(
            "{}/v1/collections/{}/documents/{}",
            self.base_url, collection, id
        );

        let body = serde_json::json!({ "fields": fields });

        let mut last_error = None;
        for attempt in 0..MAX_ATTEMPTS {
            let response = self
                .http
                .patch(&url)
                .header("Authorization", format!("Bearer {}", self.admin_key))
                .json(&body)
                .send()
                .await;

            let result = match response {
                Ok(response) => {
                    if response.status() == reqwest::StatusCode::NOT_FOUND {
                        return Err(StoreError::NotFound {
                            collection: collection.to_string(),
                            id: id.to_string(),
                        });
                    }
                    self.handle_response(response).await
                }
                Err(e) => Err(StoreError::Http(e)),
            };

            match result {
                Ok(v) => return Ok(v),
                Err(ref e) if Self::is_transient_error(e) && attempt < MAX_ATTEMPTS - 1 => {
                    let backoff_ms = 500 * (1 << attempt); // 500ms, 1s, 2s
                    warn!(
                        attempt = attempt + 1,
                        backoff_ms,
                        error = %e,
                        "transient error in patch_document, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    last_error = Some(result);
                    continue;
                }
                Err(_) => return result,
            }
        }

        last_error.unwrap_or_else(|| Err(StoreError::InvalidResponse("retry exhausted".into())))
    }

    /// Apply a batch of writes atomically.
    ///
    /// The store applies the whole batch or none of it. Batches are capped at
    /// [`MAX_WRITES_PER_COMMIT`] writes; larger mutations must be split into
    /// several commits by the caller.
    pub async fn commit(&self, writes: Vec<WriteOp>) -> Result<CommitResponse, StoreError> {
        if writes.is_empty() {
            return Err(StoreError::EmptyCommit);
        }
        if writes.len() > MAX_WRITES_PER_COMMIT {
            return Err(StoreError::CommitTooLarge {
                count: writes.len(),
                max: MAX_WRITES_PER_COMMIT,
            });
        }

        let count = writes.len();
        let url = format!("{}/v1/commit", self.base_url);
        let body = serde_json::json!({ "writes": writes });

        debug!(count, "committing batch");

        let mut last_error = None;
        for attempt in 0..MAX_ATTEMPTS {
            let response = self
                .http
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.admin_key))
                .json(&body)
                .send()
                .await;

            let result = match response {
                Ok(response) => self.handle_response(response).await,
                Err(e) => Err(StoreError::Http(e)),
            };

            match result {
                Ok(v) => return Ok(v),
                Err(ref e) if Self::is_transient_error(e) && attempt < MAX_ATTEMPTS - 1 => {
                    let backoff_ms = 500 * (1 << attempt); // 500ms, 1s, 2s
                    warn!(
                        attempt = attempt + 1,
                        backoff_ms,
                        error = %e,
                        "transient error in commit, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    last_error = Some(result);
                    continue;
                }
                Err(_) => return result,
            }
        }

        last_error.unwrap_or_else(|| Err(StoreError::InvalidResponse("retry exhausted".into())))
    }

    /// Check if an error is transient and worth retrying.
    fn is_transient_error(err: &StoreError) -> bool {
        match err {
            StoreError::Api { code, .. } => {
                code == "unavailable" || code == "internal" || code == "deadlineExceeded"
            }
            StoreError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }

    /// Handle HTTP response and parse JSON.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, StoreError> {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok());
            return Err(StoreError::RateLimited { retry_after_secs });
        }

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(StoreError::Auth(format!(
                "store rejected the admin key ({})",
                status
            )));
        }

        if !status.is_success() {
            let text = response.text().await.map_err(|e| {
                StoreError::InvalidResponse(format!(
                    "request failed ({}): failed to read response: {}",
                    status, e
                ))
            })?;

            // Try to parse the store's structured error envelope
            if let Ok(api_error) = serde_json::from_str::<ApiErrorBody>(&text) {
                return Err(StoreError::Api {
                    code: api_error.error,
                    message: api_error.message,
                });
            }

            return Err(StoreError::InvalidResponse(format!(
                "request failed ({}): {}",
                status, text
            )));
        }

        let body = response.json().await?;
        Ok(body)
    }
}

/// Structured error body returned by the store API.
#[derive(Debug, serde::Deserialize)]
struct ApiErrorBody {
    error: String,
    message: String,
}
