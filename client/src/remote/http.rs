//! HTTP client for the Pensebête remote store service.

use super::{RemoteReminders, RemoteTables, RowChange};
use crate::connectivity::ConnectivityProbe;
use crate::error::RemoteError;
use async_trait::async_trait;
use pensebete_engine::protocol::{
    CreateRowRequest, CreateRowResponse, ErrorResponse, MutationResponse, ReminderQuery,
    UpdateRowRequest,
};
use pensebete_engine::{Reminder, Table};
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Remote store reached over HTTP.
///
/// Every request carries the owner identity as a bearer token.
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: Client,
    base_url: Url,
    user_id: String,
}

impl HttpRemoteStore {
    /// `base_url` is an http(s) URL; endpoint paths are appended to it.
    pub fn new(
        base_url: Url,
        user_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            user_id: user_id.into(),
        })
    }

    /// Endpoint URL with every segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RemoteError> {
        let response = request
            .bearer_auth(&self.user_id)
            .send()
            .await
            .map_err(|e| RemoteError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|e| RemoteError::Transient(format!("invalid response body: {}", e)));
        }

        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.error,
            Err(_) => status.to_string(),
        };
        Err(classify_status(status, message))
    }

    /// Check that the service answers its health endpoint.
    pub async fn ping(&self) -> bool {
        match self.client.get(self.url(&["health"])).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::debug!("Remote store unreachable: {}", e);
                false
            }
        }
    }
}

/// Map a failed response to a retry decision.
///
/// Server-side failures, throttling and timeouts are worth retrying. Any
/// other refusal is permanent.
fn classify_status(status: StatusCode, message: String) -> RemoteError {
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        RemoteError::Transient(format!("{}: {}", status, message))
    } else {
        RemoteError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl RemoteTables for HttpRemoteStore {
    async fn create(
        &self,
        table: Table,
        idempotency_key: &str,
        payload: &serde_json::Value,
    ) -> Result<CreateRowResponse, RemoteError> {
        let body = CreateRowRequest {
            idempotency_key: idempotency_key.to_string(),
            data: payload.clone(),
        };
        let request = self
            .client
            .post(self.url(&["tables", table.as_str(), "rows"]))
            .json(&body);
        self.send(request).await
    }

    async fn update(
        &self,
        table: Table,
        record_id: &str,
        payload: &serde_json::Value,
    ) -> Result<RowChange, RemoteError> {
        let body = UpdateRowRequest {
            data: payload.clone(),
        };
        let request = self
            .client
            .patch(self.url(&["tables", table.as_str(), "rows", record_id]))
            .json(&body);
        let response: MutationResponse = self.send(request).await?;
        Ok(RowChange::from_applied(response.applied))
    }

    async fn delete(&self, table: Table, record_id: &str) -> Result<RowChange, RemoteError> {
        let request = self
            .client
            .delete(self.url(&["tables", table.as_str(), "rows", record_id]));
        let response: MutationResponse = self.send(request).await?;
        Ok(RowChange::from_applied(response.applied))
    }
}

#[async_trait]
impl RemoteReminders for HttpRemoteStore {
    async fn query_reminders(&self, query: &ReminderQuery) -> Result<Vec<Reminder>, RemoteError> {
        let request = self.client.get(self.url(&["reminders"])).query(query);
        self.send(request).await
    }

    async fn mark_reminder_sent(&self, reminder_id: &str) -> Result<RowChange, RemoteError> {
        let request = self
            .client
            .post(self.url(&["reminders", reminder_id, "sent"]));
        let response: MutationResponse = self.send(request).await?;
        Ok(RowChange::from_applied(response.applied))
    }
}

#[async_trait]
impl ConnectivityProbe for HttpRemoteStore {
    async fn probe(&self) -> bool {
        self.ping().await
    }
}
