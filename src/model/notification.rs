use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Notification {
    pub id: u64,
    #[serde(skip_serializing)]
    pub user_id: u64,
    #[schema(example = "Office closed")]
    pub title: String,
    #[schema(example = "The office is closed on Friday for maintenance.")]
    pub message: String,
    #[schema(value_type = String, format = "date-time")]
    pub notification_date: DateTime<Utc>,
    pub is_active: bool,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}
