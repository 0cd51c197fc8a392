use crate::{
    api::employee::find_owned,
    auth::extractor::AuthUser,
    config::Config,
    db::is_duplicate_key,
    error::ApiError,
    model::attendance::{AttendanceRecord, AttendanceStatus, WorkLocation},
    utils::{
        db_utils::nullable,
        time::{elapsed_hours, parse_time_of_day},
        validation,
    },
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Local, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{FromRow, MySqlPool};
use tracing::{error, info};
use utoipa::{IntoParams, ToSchema};

const STATUSES: &[&str] = &["present", "absent", "late", "half-day"];
const LOCATIONS: &[&str] = &["WFO", "WFH"];

/// Attendance row joined with the employee name.
#[derive(FromRow)]
pub struct AttendanceRow {
    #[sqlx(flatten)]
    pub record: AttendanceRecord,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttendanceView {
    pub id: u64,
    pub employee_id: u64,
    #[schema(example = "John Doe")]
    pub employee_name: String,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "09:00")]
    pub check_in: Option<String>,
    #[schema(example = "17:30")]
    pub check_out: Option<String>,
    #[schema(example = "present")]
    pub status: String,
    #[schema(example = "WFO")]
    pub work_location: String,
    pub notes: Option<String>,
    /// Hours between check-in and check-out, one decimal
    #[schema(example = 8.5)]
    pub total_hours: Option<f64>,
}

fn hhmm(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

impl From<AttendanceRow> for AttendanceView {
    fn from(row: AttendanceRow) -> Self {
        let r = row.record;
        let total_hours = match (r.check_in, r.check_out) {
            (Some(i), Some(o)) => elapsed_hours(i, o),
            _ => None,
        };
        Self {
            id: r.id,
            employee_id: r.employee_id,
            employee_name: format!("{} {}", row.first_name, row.last_name),
            date: r.date,
            check_in: r.check_in.map(hhmm),
            check_out: r.check_out.map(hhmm),
            status: r.status,
            work_location: r.work_location,
            notes: r.notes,
            total_hours,
        }
    }
}

const SELECT_WITH_EMPLOYEE: &str = r#"
    SELECT a.*, e.first_name, e.last_name
    FROM attendance_records a
    JOIN employees e ON e.id = a.employee_id
"#;

async fn find_view(pool: &MySqlPool, user_id: u64, id: u64) -> Result<AttendanceView, ApiError> {
    let sql = format!("{SELECT_WITH_EMPLOYEE} WHERE a.id = ? AND a.user_id = ?");
    sqlx::query_as::<_, AttendanceRow>(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(ApiError::db("Failed to fetch attendance record"))?
        .map(AttendanceView::from)
        .ok_or_else(|| ApiError::not_found("Attendance record"))
}

/// Rows for one day, used by the list endpoint and the dashboard.
pub async fn list_for_day(
    pool: &MySqlPool,
    user_id: u64,
    date: NaiveDate,
    employee_id: Option<u64>,
) -> Result<Vec<AttendanceView>, ApiError> {
    let mut sql = format!("{SELECT_WITH_EMPLOYEE} WHERE a.user_id = ? AND a.date = ?");
    if employee_id.is_some() {
        sql.push_str(" AND a.employee_id = ?");
    }
    sql.push_str(" ORDER BY a.check_in IS NULL, a.check_in, e.first_name");

    let mut query = sqlx::query_as::<_, AttendanceRow>(&sql).bind(user_id).bind(date);
    if let Some(employee_id) = employee_id {
        query = query.bind(employee_id);
    }

    let rows = query
        .fetch_all(pool)
        .await
        .map_err(ApiError::db("Failed to list attendance"))?;

    Ok(rows.into_iter().map(AttendanceView::from).collect())
}

/// Reads an optional `HH:MM` field, falling back to the current minute.
fn time_or_now(field: &str, raw: Option<&str>) -> Result<NaiveTime, ApiError> {
    match raw {
        Some(raw) => parse_time(field, raw),
        None => {
            let now = Local::now().time();
            Ok(NaiveTime::from_hms_opt(now.hour(), now.minute(), 0).unwrap_or(now))
        }
    }
}

fn parse_time(field: &str, raw: &str) -> Result<NaiveTime, ApiError> {
    parse_time_of_day(raw).ok_or_else(|| ApiError::bad_request(format!("{field} must be HH:MM")))
}

/// Status for a fresh check-in given the configured lateness threshold.
pub fn check_in_status(time: NaiveTime, late_after: Option<NaiveTime>) -> AttendanceStatus {
    match late_after {
        Some(limit) if time > limit => AttendanceStatus::Late,
        _ => AttendanceStatus::Present,
    }
}

fn ensure_order(check_in: Option<NaiveTime>, check_out: Option<NaiveTime>) -> Result<(), ApiError> {
    match (check_in, check_out) {
        (Some(i), Some(o)) if o < i => Err(ApiError::bad_request("check_out cannot be before check_in")),
        (None, Some(_)) => Err(ApiError::bad_request("check_out requires check_in")),
        _ => Ok(()),
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CheckInReq {
    #[schema(example = 1)]
    pub employee_id: u64,
    #[schema(example = "WFH")]
    pub work_location: Option<WorkLocation>,
    /// Defaults to the current time
    #[schema(example = "09:05")]
    pub time: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CheckOutReq {
    /// Defaults to the current time
    #[schema(example = "17:30")]
    pub time: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateAttendance {
    pub employee_id: u64,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub date: NaiveDate,
    #[schema(example = "09:00")]
    pub check_in: Option<String>,
    #[schema(example = "17:00")]
    pub check_out: Option<String>,
    #[schema(example = "present")]
    pub status: String,
    pub work_location: Option<WorkLocation>,
    pub notes: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateAttendance {
    #[schema(example = "2026-01-05", format = "date", value_type = Option<String>)]
    pub date: Option<NaiveDate>,
    pub check_in: Option<String>,
    pub check_out: Option<String>,
    pub status: Option<String>,
    pub work_location: Option<WorkLocation>,
    /// `null` clears the notes
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub notes: Option<Option<String>>,
}

#[derive(Deserialize, IntoParams)]
pub struct AttendanceFilter {
    /// Day to list, defaults to today
    #[param(value_type = Option<String>, format = Date)]
    pub date: Option<NaiveDate>,
    /// Only this employee
    pub employee_id: Option<u64>,
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    request_body = CheckInReq,
    responses(
        (status = 201, description = "Checked in", body = AttendanceView),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Already checked in today", body = Object, example = json!({
            "message": "Already checked in today"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    payload: web::Json<CheckInReq>,
) -> actix_web::Result<impl Responder> {
    let employee = find_owned(pool.get_ref(), auth.user_id, payload.employee_id).await?;
    if !employee.is_active() {
        return Err(ApiError::bad_request("Employee is inactive").into());
    }

    let time = time_or_now("time", payload.time.as_deref())?;
    let status = check_in_status(time, config.late_after);
    let location = payload.work_location.unwrap_or_default();
    let today = Local::now().date_naive();

    let result = sqlx::query(
        r#"
        INSERT INTO attendance_records (user_id, employee_id, date, check_in, status, work_location)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(employee.id)
    .bind(today)
    .bind(time)
    .bind(status.as_ref())
    .bind(location.as_ref())
    .execute(pool.get_ref())
    .await;

    let id = match result {
        Ok(res) => res.last_insert_id(),
        Err(e) if is_duplicate_key(&e) => {
            return Err(ApiError::Conflict("Already checked in today".into()).into());
        }
        Err(e) => {
            error!(error = %e, employee_id = employee.id, "Check-in failed");
            return Err(ApiError::Internal.into());
        }
    };

    info!(employee_id = employee.id, status = status.as_ref(), "Checked in");

    let view = find_view(pool.get_ref(), auth.user_id, id).await?;
    Ok(HttpResponse::Created().json(view))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/{record_id}/check-out",
    params(("record_id" = u64, Path, description = "Attendance record ID")),
    request_body = CheckOutReq,
    responses(
        (status = 200, description = "Checked out", body = AttendanceView),
        (status = 400, description = "Already checked out or time before check-in", body = Object, example = json!({
            "message": "Already checked out"
        })),
        (status = 404, description = "Attendance record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: Option<web::Json<CheckOutReq>>,
) -> actix_web::Result<impl Responder> {
    let record_id = path.into_inner();
    let current = find_view(pool.get_ref(), auth.user_id, record_id).await?;

    let time = time_or_now("time", payload.as_ref().and_then(|p| p.time.as_deref()))?;

    if current.check_out.is_some() {
        return Err(ApiError::bad_request("Already checked out").into());
    }
    let check_in = current.check_in.as_deref().and_then(parse_time_of_day);
    if check_in.is_none() {
        return Err(ApiError::bad_request("No check-in recorded").into());
    }
    ensure_order(check_in, Some(time))?;

    let result = sqlx::query(
        r#"
        UPDATE attendance_records
        SET check_out = ?
        WHERE id = ? AND user_id = ? AND check_out IS NULL
        "#,
    )
    .bind(time)
    .bind(record_id)
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await
    .map_err(ApiError::db("Check-out failed"))?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("Already checked out").into());
    }

    let view = find_view(pool.get_ref(), auth.user_id, record_id).await?;
    Ok(HttpResponse::Ok().json(view))
}

/// Record attendance manually
#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = CreateAttendance,
    responses(
        (status = 201, description = "Record created", body = AttendanceView),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Record already exists for that day")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn create_record(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateAttendance>,
) -> actix_web::Result<impl Responder> {
    let status: AttendanceStatus = validation::one_of("status", &payload.status, STATUSES)?;
    let check_in = payload.check_in.as_deref().map(|t| parse_time("check_in", t)).transpose()?;
    let check_out = payload.check_out.as_deref().map(|t| parse_time("check_out", t)).transpose()?;
    ensure_order(check_in, check_out)?;

    let employee = find_owned(pool.get_ref(), auth.user_id, payload.employee_id).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO attendance_records
            (user_id, employee_id, date, check_in, check_out, status, work_location, notes)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(employee.id)
    .bind(payload.date)
    .bind(check_in)
    .bind(check_out)
    .bind(status.as_ref())
    .bind(payload.work_location.unwrap_or_default().as_ref())
    .bind(&payload.notes)
    .execute(pool.get_ref())
    .await;

    let id = match result {
        Ok(res) => res.last_insert_id(),
        Err(e) if is_duplicate_key(&e) => {
            return Err(ApiError::Conflict("Attendance already recorded for that day".into()).into());
        }
        Err(e) => return Err(ApiError::db("Failed to create attendance record")(e).into()),
    };

    let view = find_view(pool.get_ref(), auth.user_id, id).await?;
    Ok(HttpResponse::Created().json(view))
}

/// Update an attendance record
#[utoipa::path(
    put,
    path = "/api/attendance/{record_id}",
    params(("record_id" = u64, Path, description = "Attendance record ID")),
    request_body = UpdateAttendance,
    responses(
        (status = 200, description = "Record updated", body = AttendanceView),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Attendance record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn update_record(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateAttendance>,
) -> actix_web::Result<impl Responder> {
    let record_id = path.into_inner();
    let current = find_view(pool.get_ref(), auth.user_id, record_id).await?;

    let date = payload.date.unwrap_or(current.date);
    let check_in = match payload.check_in.as_deref() {
        Some(t) => Some(parse_time("check_in", t)?),
        None => current.check_in.as_deref().and_then(parse_time_of_day),
    };
    let check_out = match payload.check_out.as_deref() {
        Some(t) => Some(parse_time("check_out", t)?),
        None => current.check_out.as_deref().and_then(parse_time_of_day),
    };
    ensure_order(check_in, check_out)?;

    let status: AttendanceStatus = match payload.status.as_deref() {
        Some(s) => validation::one_of("status", s, STATUSES)?,
        None => validation::one_of("status", &current.status, STATUSES)?,
    };
    let location: WorkLocation = match payload.work_location {
        Some(l) => l,
        None => validation::one_of("work_location", &current.work_location, LOCATIONS)?,
    };
    let notes = payload.notes.clone().unwrap_or(current.notes);

    let result = sqlx::query(
        r#"
        UPDATE attendance_records
        SET date = ?, check_in = ?, check_out = ?, status = ?, work_location = ?, notes = ?
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(date)
    .bind(check_in)
    .bind(check_out)
    .bind(status.as_ref())
    .bind(location.as_ref())
    .bind(notes)
    .bind(record_id)
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await;

    if let Err(e) = result {
        if is_duplicate_key(&e) {
            return Err(ApiError::Conflict("Attendance already recorded for that day".into()).into());
        }
        return Err(ApiError::db("Failed to update attendance record")(e).into());
    }

    let view = find_view(pool.get_ref(), auth.user_id, record_id).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[utoipa::path(
    delete,
    path = "/api/attendance/{record_id}",
    params(("record_id" = u64, Path, description = "Attendance record ID")),
    responses(
        (status = 200, description = "Record deleted"),
        (status = 404, description = "Attendance record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn delete_record(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let res = sqlx::query("DELETE FROM attendance_records WHERE id = ? AND user_id = ?")
        .bind(path.into_inner())
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::db("Failed to delete attendance record"))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("Attendance record").into());
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Attendance record deleted" })))
}

#[utoipa::path(
    get,
    path = "/api/attendance/{record_id}",
    params(("record_id" = u64, Path, description = "Attendance record ID")),
    responses(
        (status = 200, description = "Attendance record", body = AttendanceView),
        (status = 404, description = "Attendance record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn get_record(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let view = find_view(pool.get_ref(), auth.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(view))
}

#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceFilter),
    responses((status = 200, description = "Attendance for the day", body = [AttendanceView])),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<AttendanceFilter>,
) -> actix_web::Result<impl Responder> {
    let date = query.date.unwrap_or_else(|| Local::now().date_naive());
    let rows = list_for_day(pool.get_ref(), auth.user_id, date, query.employee_id).await?;
    Ok(HttpResponse::Ok().json(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn t(raw: &str) -> NaiveTime {
        parse_time_of_day(raw).unwrap()
    }

    #[test]
    fn lateness_needs_a_threshold() {
        assert_eq!(check_in_status(t("11:00"), None), AttendanceStatus::Present);
        assert_eq!(check_in_status(t("09:30"), Some(t("09:30"))), AttendanceStatus::Present);
        assert_eq!(check_in_status(t("09:31"), Some(t("09:30"))), AttendanceStatus::Late);
    }

    #[test]
    fn check_out_must_follow_check_in() {
        assert!(ensure_order(Some(t("09:00")), Some(t("08:59"))).is_err());
        assert!(ensure_order(None, Some(t("17:00"))).is_err());
        assert!(ensure_order(Some(t("09:00")), None).is_ok());
        assert!(ensure_order(Some(t("09:00")), Some(t("09:00"))).is_ok());
    }

    #[test]
    fn view_formats_times_and_totals_hours() {
        let row = AttendanceRow {
            record: AttendanceRecord {
                id: 1,
                user_id: 1,
                employee_id: 2,
                date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
                check_in: Some(t("09:00:41")),
                check_out: Some(t("17:30")),
                status: "present".into(),
                work_location: "WFH".into(),
                notes: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            first_name: "John".into(),
            last_name: "Doe".into(),
        };

        let view = AttendanceView::from(row);
        assert_eq!(view.check_in.as_deref(), Some("09:00"));
        assert_eq!(view.check_out.as_deref(), Some("17:30"));
        assert_eq!(view.total_hours, Some(8.5));
        assert_eq!(view.employee_name, "John Doe");
    }

    #[test]
    fn open_record_has_no_total() {
        let view = AttendanceView {
            id: 1,
            employee_id: 1,
            employee_name: String::new(),
            date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            check_in: Some("09:00".into()),
            check_out: None,
            status: "present".into(),
            work_location: "WFO".into(),
            notes: None,
            total_hours: None,
        };
        let json = serde_json::to_value(&view).unwrap();
        assert!(json["total_hours"].is_null());
    }

    #[test]
    fn update_can_clear_notes() {
        let untouched: UpdateAttendance = serde_json::from_value(json!({})).unwrap();
        assert!(untouched.notes.is_none());

        let cleared: UpdateAttendance = serde_json::from_value(json!({ "notes": null })).unwrap();
        assert_eq!(cleared.notes, Some(None));

        let set: UpdateAttendance = serde_json::from_value(json!({ "notes": "Left early" })).unwrap();
        assert_eq!(set.notes, Some(Some("Left early".to_string())));
    }
}
