use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, ToSchema)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    HalfDay,
}

impl AttendanceStatus {
    /// Present and late both count as having shown up.
    pub fn counts_as_present(self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }
}

/// Work-from-office / work-from-home.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, EnumString, AsRefStr, ToSchema)]
pub enum WorkLocation {
    #[default]
    #[serde(rename = "WFO")]
    #[strum(serialize = "WFO")]
    Wfo,
    #[serde(rename = "WFH")]
    #[strum(serialize = "WFH")]
    Wfh,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceRecord {
    pub id: u64,
    pub user_id: u64,
    pub employee_id: u64,
    pub date: NaiveDate,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub status: String,
    pub work_location: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn half_day_uses_kebab_case() {
        assert_eq!(AttendanceStatus::from_str("half-day").unwrap(), AttendanceStatus::HalfDay);
        assert_eq!(AttendanceStatus::HalfDay.as_ref(), "half-day");
        assert!(!AttendanceStatus::HalfDay.counts_as_present());
        assert!(AttendanceStatus::Late.counts_as_present());
    }

    #[test]
    fn work_location_tags_are_uppercase() {
        assert_eq!(WorkLocation::from_str("WFH").unwrap(), WorkLocation::Wfh);
        assert_eq!(WorkLocation::default().as_ref(), "WFO");
        let json = serde_json::to_string(&WorkLocation::Wfh).unwrap();
        assert_eq!(json, "\"WFH\"");
    }
}
