use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmployeeStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "first_name": "John",
        "last_name": "Doe",
        "email": "john.doe@company.com",
        "phone": "+8801712345678",
        "position": "Data Engineer",
        "department": "Engineering",
        "hire_date": "2024-01-01",
        "salary": 55000.0,
        "address": "123 Business District, Tech City",
        "education_degree": "BSc",
        "branch": "Dhaka",
        "skills": "Rust, SQL",
        "emergency_contact_name": "Jane Doe",
        "emergency_contact_phone": "+8801712345679",
        "emergency_contact_relationship": "Spouse",
        "status": "active",
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z"
    })
)]
pub struct Employee {
    pub id: u64,
    #[serde(skip_serializing)]
    pub user_id: u64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub position: String,
    pub department: String,
    #[schema(value_type = String, format = "date")]
    pub hire_date: NaiveDate,
    pub salary: f64,
    pub address: String,
    pub education_degree: Option<String>,
    pub branch: Option<String>,
    pub skills: Option<String>,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub emergency_contact_relationship: String,
    #[schema(example = "active")]
    pub status: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[schema(value_type = String, format = "date-time")]
    pub updated_at: DateTime<Utc>,
}

impl Employee {
    pub fn is_active(&self) -> bool {
        self.status == EmployeeStatus::Active.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_parses_lowercase_only() {
        assert_eq!(EmployeeStatus::from_str("inactive").unwrap(), EmployeeStatus::Inactive);
        assert!(EmployeeStatus::from_str("Retired").is_err());
    }
}
