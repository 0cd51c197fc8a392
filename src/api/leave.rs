use crate::{
    api::employee::find_owned,
    auth::extractor::AuthUser,
    error::ApiError,
    model::leave::{LeaveRequest, LeaveStatus, LeaveType, ranges_overlap},
    utils::{db_utils::Page, validation},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{FromRow, MySqlPool};
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const STATUSES: &[&str] = &["pending", "approved", "rejected"];

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = 1)]
    pub employee_id: u64,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "sick")]
    pub leave_type: LeaveType, // enum ensures Swagger dropdown
    #[schema(example = "Flu")]
    pub reason: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateLeave {
    #[schema(example = "2026-01-01", format = "date", value_type = Option<String>)]
    pub start_date: Option<NaiveDate>,
    #[schema(example = "2026-01-03", format = "date", value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
    pub leave_type: Option<LeaveType>,
    pub reason: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    /// Filter by employee ID
    #[schema(example = 1)]
    pub employee_id: Option<u64>,
    /// Filter by leave status
    #[schema(example = "pending")]
    pub status: Option<String>,
    /// Pagination page number (start with 1)
    pub page: Option<u32>,
    /// Pagination per page number
    pub per_page: Option<u32>,
}

#[derive(FromRow)]
pub struct LeaveRow {
    #[sqlx(flatten)]
    pub leave: LeaveRequest,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveResponse {
    pub id: u64,
    pub employee_id: u64,
    #[schema(example = "John Doe")]
    pub employee_name: String,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-03", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    /// Calendar days, inclusive
    #[schema(example = 3)]
    pub days: i64,
    #[schema(example = "sick")]
    pub leave_type: String,
    pub reason: String,
    #[schema(example = "pending")]
    pub status: String,
    pub approved_by: Option<String>,
    #[schema(format = "date-time", value_type = Option<String>)]
    pub approved_at: Option<DateTime<Utc>>,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub created_at: DateTime<Utc>,
}

impl From<LeaveRow> for LeaveResponse {
    fn from(row: LeaveRow) -> Self {
        let l = row.leave;
        Self {
            days: l.days(),
            id: l.id,
            employee_id: l.employee_id,
            employee_name: format!("{} {}", row.first_name, row.last_name),
            start_date: l.start_date,
            end_date: l.end_date,
            leave_type: l.leave_type,
            reason: l.reason,
            status: l.status,
            approved_by: l.approved_by,
            approved_at: l.approved_at,
            created_at: l.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveResponse>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

const SELECT_WITH_EMPLOYEE: &str = r#"
    SELECT l.*, e.first_name, e.last_name
    FROM leaves l
    JOIN employees e ON e.id = l.employee_id
"#;

async fn find_leave(pool: &MySqlPool, user_id: u64, id: u64) -> Result<LeaveRow, ApiError> {
    let sql = format!("{SELECT_WITH_EMPLOYEE} WHERE l.id = ? AND l.user_id = ?");
    sqlx::query_as::<_, LeaveRow>(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(ApiError::db("Failed to fetch leave request"))?
        .ok_or_else(|| ApiError::not_found("Leave request"))
}

fn validate_range(start: NaiveDate, end: NaiveDate) -> Result<(), ApiError> {
    if start > end {
        return Err(ApiError::bad_request("start_date cannot be after end_date"));
    }
    Ok(())
}

/// Rejects a range that overlaps another pending or approved leave of the
/// same employee. `exclude` skips the request being edited.
async fn ensure_no_overlap(
    pool: &MySqlPool,
    user_id: u64,
    employee_id: u64,
    range: (NaiveDate, NaiveDate),
    exclude: Option<u64>,
) -> Result<(), ApiError> {
    let existing = sqlx::query_as::<_, (u64, NaiveDate, NaiveDate)>(
        r#"
        SELECT id, start_date, end_date
        FROM leaves
        WHERE user_id = ? AND employee_id = ? AND status IN ('pending', 'approved')
        "#,
    )
    .bind(user_id)
    .bind(employee_id)
    .fetch_all(pool)
    .await
    .map_err(ApiError::db("Failed to check overlapping leave"))?;

    let clash = existing
        .into_iter()
        .filter(|(id, _, _)| Some(*id) != exclude)
        .any(|(_, start, end)| ranges_overlap(range, (start, end)));

    if clash {
        return Err(ApiError::Conflict(
            "Leave overlaps an existing pending or approved request".into(),
        ));
    }
    Ok(())
}

/* =========================
Create leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveResponse),
        (status = 400, description = "Bad request"),
        (status = 404, description = "Employee not found"),
        (status = 409, description = "Overlaps another request")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    // 1️⃣ validate input
    validate_range(payload.start_date, payload.end_date)?;
    let reason = validation::required("reason", &payload.reason)?;

    // 2️⃣ employee must belong to the caller
    let employee = find_owned(pool.get_ref(), auth.user_id, payload.employee_id).await?;

    ensure_no_overlap(
        pool.get_ref(),
        auth.user_id,
        employee.id,
        (payload.start_date, payload.end_date),
        None,
    )
    .await?;

    // 3️⃣ insert request
    let result = sqlx::query(
        r#"
        INSERT INTO leaves
            (user_id, employee_id, start_date, end_date, leave_type, reason)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(employee.id)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.leave_type.as_ref())
    .bind(reason)
    .execute(pool.get_ref())
    .await
    .map_err(ApiError::db("Failed to create leave request"))?;

    info!(employee_id = employee.id, "Leave request submitted");

    let row = find_leave(pool.get_ref(), auth.user_id, result.last_insert_id()).await?;
    Ok(HttpResponse::Created().json(LeaveResponse::from(row)))
}

/// Edit a request that is still pending
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request")),
    request_body = UpdateLeave,
    responses(
        (status = 200, description = "Leave request updated", body = LeaveResponse),
        (status = 400, description = "Invalid range or request already processed"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Overlaps another request")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn update_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateLeave>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();
    let current = find_leave(pool.get_ref(), auth.user_id, leave_id).await?.leave;

    if current.status != LeaveStatus::Pending.as_ref() {
        return Err(ApiError::bad_request("Only pending requests can be edited").into());
    }

    let start = payload.start_date.unwrap_or(current.start_date);
    let end = payload.end_date.unwrap_or(current.end_date);
    validate_range(start, end)?;

    let reason = match payload.reason.as_deref() {
        Some(r) => validation::required("reason", r)?.to_string(),
        None => current.reason,
    };
    let leave_type = payload
        .leave_type
        .map(|t| t.as_ref().to_string())
        .unwrap_or(current.leave_type);

    ensure_no_overlap(pool.get_ref(), auth.user_id, current.employee_id, (start, end), Some(leave_id)).await?;

    let result = sqlx::query(
        r#"
        UPDATE leaves
        SET start_date = ?, end_date = ?, leave_type = ?, reason = ?
        WHERE id = ? AND user_id = ? AND status = 'pending'
        "#,
    )
    .bind(start)
    .bind(end)
    .bind(leave_type)
    .bind(reason)
    .bind(leave_id)
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await
    .map_err(ApiError::db("Failed to update leave request"))?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("Leave request not found or already processed").into());
    }

    let row = find_leave(pool.get_ref(), auth.user_id, leave_id).await?;
    Ok(HttpResponse::Ok().json(LeaveResponse::from(row)))
}

#[utoipa::path(
    delete,
    path = "/api/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request")),
    responses(
        (status = 200, description = "Leave request deleted"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn delete_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let res = sqlx::query("DELETE FROM leaves WHERE id = ? AND user_id = ?")
        .bind(path.into_inner())
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::db("Failed to delete leave request"))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("Leave request").into());
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Leave request deleted" })))
}

/// Moves a pending request to `approved` or `rejected`.
async fn decide(
    auth: &AuthUser,
    pool: &MySqlPool,
    leave_id: u64,
    decision: LeaveStatus,
) -> Result<LeaveResponse, ApiError> {
    auth.require_hr_or_admin()?;

    let result = sqlx::query(
        r#"
        UPDATE leaves
        SET status = ?, approved_by = ?, approved_at = ?
        WHERE id = ? AND user_id = ? AND status = 'pending'
        "#,
    )
    .bind(decision.as_ref())
    .bind(&auth.email)
    .bind(Utc::now())
    .bind(leave_id)
    .bind(auth.user_id)
    .execute(pool)
    .await
    .map_err(ApiError::db("Failed to decide leave request"))?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("Leave request not found or already processed"));
    }

    info!(leave_id, decision = decision.as_ref(), by = %auth.email, "Leave request decided");

    find_leave(pool, auth.user_id, leave_id).await.map(LeaveResponse::from)
}

/* =========================
Approve leave (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/approve",
    params(("leave_id" = u64, Path, description = "ID of the leave request to approve")),
    responses(
        (status = 200, description = "Leave approved", body = LeaveResponse),
        (status = 400, description = "Leave request not found or already processed", body = Object, example = json!({
            "message": "Leave request not found or already processed"
        })),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave = decide(&auth, pool.get_ref(), path.into_inner(), LeaveStatus::Approved).await?;
    Ok(HttpResponse::Ok().json(leave))
}

/* =========================
Reject leave (HR/Admin)
========================= */
#[utoipa::path(
    put,
    path = "/api/leave/{leave_id}/reject",
    params(("leave_id" = u64, Path, description = "ID of the leave request to reject")),
    responses(
        (status = 200, description = "Leave rejected", body = LeaveResponse),
        (status = 400, description = "Leave request not found or already processed", body = Object, example = json!({
            "message": "Leave request not found or already processed"
        })),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave = decide(&auth, pool.get_ref(), path.into_inner(), LeaveStatus::Rejected).await?;
    Ok(HttpResponse::Ok().json(leave))
}

/// for getting a leave application details endpoint
#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(("leave_id" = u64, Path, description = "ID of the leave request to fetch")),
    responses(
        (status = 200, description = "Leave request found", body = LeaveResponse),
        (status = 404, description = "Leave request not found", body = Object, example = json!({
            "message": "Leave request not found"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let row = find_leave(pool.get_ref(), auth.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(LeaveResponse::from(row)))
}

/// Number of pending requests, shown on the dashboard.
pub async fn count_pending(pool: &MySqlPool, user_id: u64) -> Result<i64, ApiError> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM leaves WHERE user_id = ? AND status = 'pending'")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(ApiError::db("Failed to count pending leave"))
}

/// for getting leave applications endpoint
#[utoipa::path(
    get,
    path = "/api/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 400, description = "Invalid status filter")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    // -------------------------
    // Pagination
    // -------------------------
    let page = Page::new(query.page, query.per_page, 10);

    // -------------------------
    // WHERE clause
    // -------------------------
    let mut where_sql = String::from(" WHERE l.user_id = ?");

    if query.employee_id.is_some() {
        where_sql.push_str(" AND l.employee_id = ?");
    }

    let status = match query.status.as_deref() {
        Some(s) => Some(validation::one_of::<LeaveStatus>("status", s, STATUSES)?.as_ref().to_owned()),
        None => None,
    };
    if status.is_some() {
        where_sql.push_str(" AND l.status = ?");
    }

    // -------------------------
    // COUNT query
    // -------------------------
    let count_sql = format!("SELECT COUNT(*) FROM leaves l{}", where_sql);

    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql).bind(auth.user_id);
    if let Some(emp_id) = query.employee_id {
        count_q = count_q.bind(emp_id);
    }
    if let Some(status) = &status {
        count_q = count_q.bind(status.as_str());
    }

    let total = count_q
        .fetch_one(pool.get_ref())
        .await
        .map_err(ApiError::db("Failed to count leave requests"))?;

    // -------------------------
    // DATA query
    // -------------------------
    let data_sql = format!(
        "{SELECT_WITH_EMPLOYEE}{} ORDER BY l.created_at DESC, l.id DESC LIMIT ? OFFSET ?",
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, LeaveRow>(&data_sql).bind(auth.user_id);
    if let Some(emp_id) = query.employee_id {
        data_q = data_q.bind(emp_id);
    }
    if let Some(status) = &status {
        data_q = data_q.bind(status.as_str());
    }

    let leaves = data_q
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool.get_ref())
        .await
        .map_err(ApiError::db("Failed to fetch leave list"))?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data: leaves.into_iter().map(LeaveResponse::from).collect(),
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversed_range_is_rejected() {
        let a = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
        let b = NaiveDate::from_ymd_opt(2026, 2, 9).unwrap();
        assert!(validate_range(a, b).is_err());
        assert!(validate_range(b, a).is_ok());
        assert!(validate_range(a, a).is_ok());
    }

    #[test]
    fn create_payload_rejects_unknown_type() {
        let err = serde_json::from_value::<CreateLeave>(json!({
            "employee_id": 1,
            "start_date": "2026-02-09",
            "end_date": "2026-02-10",
            "leave_type": "vacation",
            "reason": "Trip"
        }));
        assert!(err.is_err());
    }

    #[test]
    fn response_counts_days() {
        let row = LeaveRow {
            leave: LeaveRequest {
                id: 1,
                user_id: 1,
                employee_id: 2,
                start_date: NaiveDate::from_ymd_opt(2026, 2, 9).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2026, 2, 13).unwrap(),
                leave_type: "annual".into(),
                reason: "Trip".into(),
                status: "pending".into(),
                approved_by: None,
                approved_at: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
        };
        let resp = LeaveResponse::from(row);
        assert_eq!(resp.days, 5);
        assert_eq!(resp.employee_name, "Ada Lovelace");
    }
}
