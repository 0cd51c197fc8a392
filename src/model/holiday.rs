use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Holiday {
    pub id: u64,
    pub user_id: u64,
    pub name: String,
    pub date: NaiveDate,
    pub description: Option<String>,
    pub is_recurring: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Holiday {
    /// The day this holiday falls on in `year`, if any.
    ///
    /// Recurring holidays repeat on the same month/day; a recurring Feb 29
    /// is observed on Feb 28 in non-leap years. Recurring holidays do not
    /// occur before the year they were first recorded.
    pub fn occurrence_in(&self, year: i32) -> Option<NaiveDate> {
        if !self.is_recurring {
            return (self.date.year() == year).then_some(self.date);
        }
        if year < self.date.year() {
            return None;
        }
        NaiveDate::from_ymd_opt(year, self.date.month(), self.date.day())
            .or_else(|| NaiveDate::from_ymd_opt(year, 2, 28))
    }

    /// Next occurrence on or after `from`.
    pub fn next_occurrence(&self, from: NaiveDate) -> Option<NaiveDate> {
        if !self.is_recurring {
            return Some(self.date).filter(|d| *d >= from);
        }
        let year = from.year().max(self.date.year());
        self.occurrence_in(year)
            .filter(|d| *d >= from)
            .or_else(|| self.occurrence_in(year + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holiday(date: NaiveDate, is_recurring: bool) -> Holiday {
        Holiday {
            id: 1,
            user_id: 1,
            name: "Test".to_string(),
            date,
            description: None,
            is_recurring,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn one_off_holiday_only_in_its_year() {
        let h = holiday(d(2026, 3, 17), false);
        assert_eq!(h.occurrence_in(2026), Some(d(2026, 3, 17)));
        assert_eq!(h.occurrence_in(2027), None);
    }

    #[test]
    fn recurring_holiday_repeats_from_first_year() {
        let h = holiday(d(2024, 12, 25), true);
        assert_eq!(h.occurrence_in(2030), Some(d(2030, 12, 25)));
        assert_eq!(h.occurrence_in(2023), None);
    }

    #[test]
    fn leap_day_falls_back_to_feb_28() {
        let h = holiday(d(2024, 2, 29), true);
        assert_eq!(h.occurrence_in(2025), Some(d(2025, 2, 28)));
        assert_eq!(h.occurrence_in(2028), Some(d(2028, 2, 29)));
    }

    #[test]
    fn next_occurrence_rolls_into_next_year() {
        let h = holiday(d(2024, 1, 1), true);
        assert_eq!(h.next_occurrence(d(2026, 10, 17)), Some(d(2027, 1, 1)));
        let past = holiday(d(2026, 1, 1), false);
        assert_eq!(past.next_occurrence(d(2026, 10, 17)), None);
    }

    #[test]
    fn next_occurrence_reaches_holidays_years_ahead() {
        let from = d(2026, 10, 17);
        let one_off = holiday(d(2028, 5, 1), false);
        assert_eq!(one_off.next_occurrence(from), Some(d(2028, 5, 1)));

        let recurring = holiday(d(2028, 6, 1), true);
        assert_eq!(recurring.next_occurrence(from), Some(d(2028, 6, 1)));
    }
}
