use chrono::NaiveTime;

/// Parses a time of day given as `HH:MM` or `HH:MM:SS`.
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .ok()
}

/// Hours between check-in and check-out, rounded to one decimal.
///
/// Seconds are ignored, matching the minute resolution of the clock-in
/// form. Returns `None` when check-out is earlier than check-in.
pub fn elapsed_hours(check_in: NaiveTime, check_out: NaiveTime) -> Option<f64> {
    let minutes = (check_out - check_in).num_minutes();
    if minutes < 0 {
        return None;
    }
    Some((minutes as f64 / 60.0 * 10.0).round() / 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(raw: &str) -> NaiveTime {
        parse_time_of_day(raw).unwrap()
    }

    #[test]
    fn whole_hours() {
        assert_eq!(elapsed_hours(t("09:00"), t("17:00")), Some(8.0));
    }

    #[test]
    fn partial_hours_round_to_one_decimal() {
        assert_eq!(elapsed_hours(t("09:00"), t("17:30")), Some(8.5));
        assert_eq!(elapsed_hours(t("09:15"), t("17:02")), Some(7.8));
        // 57 minutes is closer to a full hour than to 0.9
        assert_eq!(elapsed_hours(t("09:00"), t("09:57")), Some(1.0));
    }

    #[test]
    fn same_time_is_zero() {
        assert_eq!(elapsed_hours(t("12:00"), t("12:00")), Some(0.0));
    }

    #[test]
    fn check_out_before_check_in_is_rejected() {
        assert_eq!(elapsed_hours(t("18:00"), t("09:00")), None);
    }

    #[test]
    fn accepts_seconds_and_rejects_garbage() {
        assert_eq!(t("08:05:59"), NaiveTime::from_hms_opt(8, 5, 59).unwrap());
        assert!(parse_time_of_day("25:00").is_none());
        assert!(parse_time_of_day("nine").is_none());
    }
}
