//! REST binding of the store contract.
//!
//! Thin JSON adapter over the clinic API. Transport and HTTP-status failures
//! are folded into the `StoreError` taxonomy so callers never see a raw
//! `reqwest` error; a 409 from the API is the store vetoing a uniqueness
//! constraint and surfaces as `Conflict`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use uuid::Uuid;

use super::{QueueStore, StoreError};
use crate::config::QueueConfig;
use crate::models::{Appointment, NewQueueEntry, QueueEntry, QueueEntryPatch};

/// HTTP client for the remote queue API.
pub struct RestStore {
    base_url: String,
    client: reqwest::Client,
}

impl RestStore {
    /// Create a client pointing at the clinic API.
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(&config.store_base_url, config.store_timeout_secs)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request_error(&self, e: reqwest::Error) -> StoreError {
        if e.is_timeout() {
            StoreError::Timeout
        } else if e.is_connect() {
            StoreError::Transport(format!("cannot reach store at {}", self.base_url))
        } else {
            StoreError::Transport(e.to_string())
        }
    }

    /// Failure mapping for writes addressed at one entity.
    async fn write_failure(entity: &'static str, id: Uuid, response: Response) -> StoreError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::NOT_FOUND => StoreError::NotFound { entity, id },
            StatusCode::CONFLICT => StoreError::Conflict(body),
            _ => StoreError::InvalidResponse(format!("HTTP {status}: {body}")),
        }
    }

    /// Failure mapping for day-scoped reads.
    async fn read_failure(response: Response) -> StoreError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        StoreError::InvalidResponse(format!("HTTP {status}: {body}"))
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, StoreError> {
        response
            .json()
            .await
            .map_err(|e| StoreError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl QueueStore for RestStore {
    async fn create_queue_entry(&self, new: NewQueueEntry) -> Result<QueueEntry, StoreError> {
        let response = self
            .client
            .post(self.url("/queue/entries"))
            .json(&new)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            return Err(Self::write_failure("queue_entry", Uuid::nil(), response).await);
        }
        Self::parse(response).await
    }

    async fn update_queue_entry(
        &self,
        id: Uuid,
        patch: QueueEntryPatch,
    ) -> Result<QueueEntry, StoreError> {
        let response = self
            .client
            .patch(self.url(&format!("/queue/entries/{id}")))
            .json(&patch)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            return Err(Self::write_failure("queue_entry", id, response).await);
        }
        Self::parse(response).await
    }

    async fn remove_queue_entry(&self, id: Uuid) -> Result<(), StoreError> {
        let response = self
            .client
            .delete(self.url(&format!("/queue/entries/{id}")))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            return Err(Self::write_failure("queue_entry", id, response).await);
        }
        Ok(())
    }

    async fn list_queue_entries_today(&self) -> Result<Vec<QueueEntry>, StoreError> {
        let response = self
            .client
            .get(self.url("/queue/entries/today"))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            return Err(Self::read_failure(response).await);
        }
        Self::parse(response).await
    }

    async fn list_appointments_today(&self) -> Result<Vec<Appointment>, StoreError> {
        let response = self
            .client
            .get(self.url("/appointments/today"))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            return Err(Self::read_failure(response).await);
        }
        Self::parse(response).await
    }
}
