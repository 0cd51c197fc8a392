use crate::{
    api::{attendance, employee, holiday, leave, work_log},
    api::{attendance::AttendanceView, holiday::HolidayOccurrence},
    auth::extractor::AuthUser,
    model::{attendance::AttendanceStatus, work_log::{WorkLog, WorkStatus}},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use std::str::FromStr;
use utoipa::{IntoParams, ToSchema};

const UPCOMING_HOLIDAYS: usize = 5;

#[derive(Deserialize, IntoParams)]
pub struct DashboardQuery {
    /// Day to report on, defaults to today
    #[param(value_type = Option<String>, format = Date)]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = 12)]
    pub total_employees: usize,
    #[schema(example = 10)]
    pub present_today: usize,
    /// Whole percent of active employees present
    #[schema(example = 83)]
    pub attendance_rate: u32,
    #[schema(example = 64.5)]
    pub hours_logged: f64,
    #[schema(example = 7)]
    pub active_tasks: usize,
    #[schema(example = 2)]
    pub pending_leaves: i64,
    pub upcoming_holidays: Vec<HolidayOccurrence>,
    pub today_attendance: Vec<AttendanceView>,
}

pub fn attendance_rate(present: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    let rate = (present as f64 / total as f64 * 100.0).round() as u32;
    rate.min(100)
}

/// Folds one day's rows into the dashboard figures.
pub fn summarize(
    date: NaiveDate,
    active_employees: usize,
    attendance: Vec<AttendanceView>,
    logs: &[WorkLog],
    pending_leaves: i64,
    upcoming_holidays: Vec<HolidayOccurrence>,
) -> DashboardStats {
    let present_today = attendance
        .iter()
        .filter(|a| {
            AttendanceStatus::from_str(&a.status)
                .map(AttendanceStatus::counts_as_present)
                .unwrap_or(false)
        })
        .count();

    let hours_logged: f64 = logs.iter().map(|l| l.hours_spent).sum();

    DashboardStats {
        date,
        total_employees: active_employees,
        present_today,
        attendance_rate: attendance_rate(present_today, active_employees),
        hours_logged: (hours_logged * 100.0).round() / 100.0,
        active_tasks: logs.iter().filter(|l| l.has_status(WorkStatus::InProgress)).count(),
        pending_leaves,
        upcoming_holidays,
        today_attendance: attendance,
    }
}

#[utoipa::path(
    get,
    path = "/api/dashboard",
    params(DashboardQuery),
    responses((status = 200, description = "Figures for the day", body = DashboardStats)),
    security(("bearer_auth" = [])),
    tag = "Dashboard"
)]
pub async fn get_dashboard(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<DashboardQuery>,
) -> actix_web::Result<impl Responder> {
    let date = query.date.unwrap_or_else(|| Local::now().date_naive());
    let pool = pool.get_ref();
    let user_id = auth.user_id;

    let (employees, today, logs, pending, holidays) = futures::try_join!(
        employee::list_all(pool, user_id),
        attendance::list_for_day(pool, user_id, date, None),
        work_log::list_for_day(pool, user_id, date),
        leave::count_pending(pool, user_id),
        holiday::list_all(pool, user_id),
    )?;

    let active = employees.iter().filter(|e| e.is_active()).count();
    let upcoming = holiday::upcoming(holidays, date, UPCOMING_HOLIDAYS);

    Ok(HttpResponse::Ok().json(summarize(date, active, today, &logs, pending, upcoming)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
    }

    fn row(status: &str) -> AttendanceView {
        AttendanceView {
            id: 1,
            employee_id: 1,
            employee_name: "John Doe".into(),
            date: day(),
            check_in: Some("09:00".into()),
            check_out: None,
            status: status.into(),
            work_location: "WFO".into(),
            notes: None,
            total_hours: None,
        }
    }

    fn log(hours: f64, status: WorkStatus) -> WorkLog {
        WorkLog {
            id: 1,
            user_id: 1,
            employee_id: 1,
            date: day(),
            task: "Task".into(),
            description: None,
            hours_spent: hours,
            priority: "medium".into(),
            status: status.as_ref().into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn rate_is_whole_percent() {
        assert_eq!(attendance_rate(0, 0), 0);
        assert_eq!(attendance_rate(2, 3), 67);
        assert_eq!(attendance_rate(5, 5), 100);
        assert_eq!(attendance_rate(6, 5), 100);
    }

    #[test]
    fn late_counts_as_present() {
        let attendance = vec![row("present"), row("late"), row("absent"), row("half-day")];
        let logs = vec![
            log(3.5, WorkStatus::InProgress),
            log(4.25, WorkStatus::Completed),
            log(1.0, WorkStatus::InProgress),
        ];

        let stats = summarize(day(), 4, attendance, &logs, 3, Vec::new());
        assert_eq!(stats.present_today, 2);
        assert_eq!(stats.attendance_rate, 50);
        assert_eq!(stats.hours_logged, 8.75);
        assert_eq!(stats.active_tasks, 2);
        assert_eq!(stats.pending_leaves, 3);
        assert_eq!(stats.today_attendance.len(), 4);
    }

    #[test]
    fn empty_company() {
        let stats = summarize(day(), 0, Vec::new(), &[], 0, Vec::new());
        assert_eq!(stats.total_employees, 0);
        assert_eq!(stats.attendance_rate, 0);
        assert_eq!(stats.hours_logged, 0.0);
    }
}
