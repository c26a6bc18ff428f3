use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::notification::Notification;

/// The server-side notification collection, as seen from the client.
///
/// `list` returns the full set for a recipient when `after` is `None`, and
/// only records changed at or after `after` otherwise. Both mark operations
/// are idempotent server-side.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn list(
        &self,
        recipient: &str,
        after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Notification>, StoreError>;

    async fn mark_read(&self, recipient: &str, ids: &[Uuid]) -> Result<(), StoreError>;

    async fn mark_all_read(&self, recipient: &str) -> Result<(), StoreError>;
}

/// REST-backed store talking to the notification API.
pub struct HttpNotificationStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpNotificationStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl NotificationStore for HttpNotificationStore {
    async fn list(
        &self,
        recipient: &str,
        after: Option<DateTime<Utc>>,
    ) -> Result<Vec<Notification>, StoreError> {
        let mut request = self
            .client
            .get(format!("{}/api/notifications", self.base_url))
            .query(&[("recipient", recipient)]);

        if let Some(after) = after {
            request = request.query(&[("after", after.to_rfc3339())]);
        }

        let notifications = request
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Notification>>()
            .await?;

        Ok(notifications)
    }

    async fn mark_read(&self, recipient: &str, ids: &[Uuid]) -> Result<(), StoreError> {
        self.client
            .patch(format!("{}/api/notifications/mark-read", self.base_url))
            .json(&serde_json::json!({ "recipient": recipient, "ids": ids }))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    async fn mark_all_read(&self, recipient: &str) -> Result<(), StoreError> {
        self.client
            .patch(format!("{}/api/notifications/mark-all-read", self.base_url))
            .json(&serde_json::json!({ "recipient": recipient }))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
