use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct UserSettings {
    pub id: u64,
    #[serde(skip_serializing)]
    pub user_id: u64,
    pub company_name: Option<String>,
    pub company_email: Option<String>,
    pub company_address: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub email_notifications: bool,
    pub attendance_alerts: bool,
    pub task_reminders: bool,
    pub weekly_reports: bool,
    pub dark_mode: bool,
    #[schema(example = "#1e40af")]
    pub theme_color: Option<String>,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}
