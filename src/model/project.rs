use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, ToSchema)]
pub enum ProjectCategory {
    #[serde(rename = "Data Analysis")]
    #[strum(serialize = "Data Analysis")]
    DataAnalysis,
    #[serde(rename = "Data Engineering")]
    #[strum(serialize = "Data Engineering")]
    DataEngineering,
    #[serde(rename = "Data Science")]
    #[strum(serialize = "Data Science")]
    DataScience,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, ToSchema)]
pub enum ProjectTag {
    Basic,
    Intermediate,
    Advanced,
}

/// Project row joined with the assigned employee's name.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Project {
    pub id: u64,
    #[serde(skip_serializing)]
    pub user_id: u64,
    pub employee_id: u64,
    pub employee_first_name: String,
    pub employee_last_name: String,
    pub title: String,
    #[schema(example = "Data Engineering")]
    pub category: String,
    #[schema(example = "Intermediate")]
    pub tag: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct ProjectFile {
    pub id: u64,
    #[serde(skip_serializing)]
    pub user_id: u64,
    pub project_id: u64,
    #[schema(example = "7/1767225600000-report.pdf")]
    pub path: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

impl ProjectFile {
    /// File name shown to users: the last path segment without the upload
    /// timestamp prefix.
    pub fn display_name(&self) -> &str {
        let last = self.path.rsplit('/').next().unwrap_or(&self.path);
        match last.split_once('-') {
            Some((stamp, rest)) if stamp.chars().all(|c| c.is_ascii_digit()) => rest,
            _ => last,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn category_uses_display_names() {
        assert_eq!(
            ProjectCategory::from_str("Data Science").unwrap(),
            ProjectCategory::DataScience
        );
        assert!(ProjectCategory::from_str("DataScience").is_err());
        assert_eq!(ProjectTag::Advanced.as_ref(), "Advanced");
    }

    #[test]
    fn display_name_strips_upload_prefix() {
        let file = ProjectFile {
            id: 1,
            user_id: 7,
            project_id: 3,
            path: "7/1767225600000-q1-report.pdf".to_string(),
            created_at: Utc::now(),
        };
        assert_eq!(file.display_name(), "q1-report.pdf");
    }
}
