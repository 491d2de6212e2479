//! REST surface of the notifications resource.
//!
//! ```text
//! GET  {base}/notifications            → [Notification] (newest first, ≤ 50)
//! POST {base}/notifications/{id}/read  → 404 if not the caller's
//! POST {base}/notifications/read-all
//! ```

use async_trait::async_trait;
use bizflow_core::notification::NotificationId;
use bizflow_core::Notification;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::error::{ClientError, ClientResult};
use crate::session::TokenCell;

#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn list(&self) -> ClientResult<Vec<Notification>>;

    async fn mark_read(&self, id: NotificationId) -> ClientResult<()>;

    async fn mark_all_read(&self) -> ClientResult<()>;
}

/// Error body shape of the backend (`{"detail": "..."}`).
#[derive(Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

/// [`NotificationApi`] over HTTP with the session's bearer token.
#[derive(Clone)]
pub struct HttpNotificationApi {
    client: reqwest::Client,
    collection: Url,
    token: TokenCell,
}

impl HttpNotificationApi {
    /// `collection` is the notifications resource URL.
    pub fn new(collection: Url, token: TokenCell, timeout: Duration) -> ClientResult<Self> {
        if collection.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(collection.to_string()));
        }
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(HttpNotificationApi {
            client,
            collection,
            token,
        })
    }

    fn url(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.collection.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.collection.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn bearer(&self) -> ClientResult<String> {
        self.token
            .read()
            .await
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(ClientError::NotAuthenticated)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> ClientResult<reqwest::Response> {
        let token = self.bearer().await?;
        let response = request.bearer_auth(token).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorBody>(&body) {
            Ok(ErrorBody {
                detail: serde_json::Value::String(detail),
            }) => detail,
            Ok(ErrorBody { detail }) => detail.to_string(),
            Err(_) => status.canonical_reason().unwrap_or("request failed").to_string(),
        };
        Err(ClientError::Http {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl NotificationApi for HttpNotificationApi {
    async fn list(&self) -> ClientResult<Vec<Notification>> {
        let response = self.send(self.client.get(self.url(&[])?)).await?;
        let items: Vec<Notification> = response.json().await?;
        debug!(count = items.len(), "Fetched notifications");
        Ok(items)
    }

    async fn mark_read(&self, id: NotificationId) -> ClientResult<()> {
        let id = id.to_string();
        self.send(self.client.post(self.url(&[id.as_str(), "read"])?))
            .await?;
        Ok(())
    }

    async fn mark_all_read(&self) -> ClientResult<()> {
        self.send(self.client.post(self.url(&["read-all"])?)).await?;
        Ok(())
    }
}
