use chrono::{DateTime, Utc};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ListNotificationsQuery {
    pub recipient: String,
    /// Delta cursor: only records changed at or after this instant.
    pub after: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkReadRequest {
    pub recipient: String,
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkAllReadRequest {
    pub recipient: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateNotificationRequest {
    #[validate(email)]
    pub recipient: String,
    pub kind: Option<String>,
    pub title: Option<String>,
    #[validate(length(min = 1, max = 2000))]
    pub message: String,
    pub metadata: Option<serde_json::Value>,
}
