use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::notification_models::Notification;

/// In-memory notification store, partitioned by recipient.
///
/// Notifications are created server-side only; clients read them and flip
/// the `read` flag. Both mark operations are idempotent and bump
/// `updated_at` so the change is visible to delta fetches.
#[derive(Clone, Default)]
pub struct NotificationRepository {
    inner: Arc<DashMap<String, Vec<Notification>>>,
}

impl NotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &self,
        recipient: &str,
        kind: Option<String>,
        title: Option<String>,
        message: &str,
        metadata: Option<serde_json::Value>,
    ) -> Notification {
        let now = Utc::now();
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient: recipient.to_string(),
            kind: kind.unwrap_or_else(|| "info".to_string()),
            title,
            message: message.to_string(),
            read: false,
            created_at: now,
            updated_at: now,
            metadata,
        };

        self.inner
            .entry(recipient.to_string())
            .or_default()
            .push(notification.clone());

        notification
    }

    /// Newest-first listing; with `after`, only records changed at or after
    /// that instant (filtered on `updated_at`, so read-state changes made
    /// from another session flow through deltas too).
    pub fn find_by_recipient(
        &self,
        recipient: &str,
        after: Option<DateTime<Utc>>,
    ) -> Vec<Notification> {
        let Some(list) = self.inner.get(recipient) else {
            return Vec::new();
        };

        let mut notifications: Vec<Notification> = list
            .iter()
            .filter(|n| after.map_or(true, |cursor| n.updated_at >= cursor))
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        notifications
    }

    /// Returns the number of notifications actually flipped to read.
    pub fn mark_read(&self, recipient: &str, ids: &[Uuid]) -> u64 {
        let Some(mut list) = self.inner.get_mut(recipient) else {
            return 0;
        };

        let now = Utc::now();
        let mut affected = 0;
        for notification in list.iter_mut() {
            if !notification.read && ids.contains(&notification.id) {
                notification.read = true;
                notification.updated_at = now;
                affected += 1;
            }
        }

        affected
    }

    pub fn mark_all_read(&self, recipient: &str) -> u64 {
        let Some(mut list) = self.inner.get_mut(recipient) else {
            return 0;
        };

        let now = Utc::now();
        let mut affected = 0;
        for notification in list.iter_mut() {
            if !notification.read {
                notification.read = true;
                notification.updated_at = now;
                affected += 1;
            }
        }

        affected
    }
}
