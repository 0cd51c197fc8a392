use crate::{
    api::employee::find_owned,
    auth::extractor::AuthUser,
    error::ApiError,
    model::work_log::{Priority, WorkLog, WorkStatus},
    utils::{db_utils::nullable, validation},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

const STATUSES: &[&str] = &["in-progress", "completed", "on-hold"];

#[derive(Deserialize, ToSchema)]
pub struct CreateWorkLog {
    pub employee_id: u64,
    /// Defaults to today
    #[schema(example = "2026-01-05", format = "date", value_type = Option<String>)]
    pub date: Option<NaiveDate>,
    #[schema(example = "Build ingestion pipeline")]
    pub task: String,
    pub description: Option<String>,
    #[schema(example = 3.5)]
    pub hours_spent: f64,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: WorkStatus,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateWorkLog {
    #[schema(format = "date", value_type = Option<String>)]
    pub date: Option<NaiveDate>,
    pub task: Option<String>,
    /// `null` clears the description
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    pub hours_spent: Option<f64>,
    pub priority: Option<Priority>,
    pub status: Option<WorkStatus>,
}

#[derive(Deserialize, IntoParams)]
pub struct WorkLogQuery {
    pub employee_id: Option<u64>,
    #[param(value_type = Option<String>, format = Date)]
    pub date: Option<NaiveDate>,
    /// in-progress, completed or on-hold
    pub status: Option<String>,
}

#[derive(Debug, Default, PartialEq, Serialize, ToSchema)]
pub struct WorkLogSummary {
    #[schema(example = 12.5)]
    pub total_hours: f64,
    pub completed: usize,
    pub in_progress: usize,
    pub on_hold: usize,
}

impl WorkLogSummary {
    pub fn of(logs: &[WorkLog]) -> Self {
        let mut summary = WorkLogSummary::default();
        for log in logs {
            summary.total_hours += log.hours_spent;
            if log.has_status(WorkStatus::Completed) {
                summary.completed += 1;
            } else if log.has_status(WorkStatus::InProgress) {
                summary.in_progress += 1;
            } else if log.has_status(WorkStatus::OnHold) {
                summary.on_hold += 1;
            }
        }
        summary.total_hours = (summary.total_hours * 100.0).round() / 100.0;
        summary
    }
}

#[derive(Serialize)]
pub struct WorkLogListResponse {
    pub data: Vec<WorkLog>,
    pub summary: WorkLogSummary,
}

fn validate_hours(hours: f64) -> Result<(), ApiError> {
    if hours.is_finite() && hours > 0.0 && hours <= 24.0 {
        Ok(())
    } else {
        Err(ApiError::bad_request("hours_spent must be more than 0 and at most 24"))
    }
}

async fn find_log(pool: &MySqlPool, user_id: u64, id: u64) -> Result<WorkLog, ApiError> {
    sqlx::query_as::<_, WorkLog>("SELECT * FROM work_logs WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(ApiError::db("Failed to fetch work log"))?
        .ok_or_else(|| ApiError::not_found("Work log"))
}

/// Logs for one day, used by the dashboard.
pub async fn list_for_day(pool: &MySqlPool, user_id: u64, date: NaiveDate) -> Result<Vec<WorkLog>, ApiError> {
    sqlx::query_as::<_, WorkLog>("SELECT * FROM work_logs WHERE user_id = ? AND date = ?")
        .bind(user_id)
        .bind(date)
        .fetch_all(pool)
        .await
        .map_err(ApiError::db("Failed to list work logs"))
}

#[utoipa::path(
    get,
    path = "/api/work-logs",
    params(WorkLogQuery),
    responses((status = 200, description = "Work logs with totals")),
    security(("bearer_auth" = [])),
    tag = "WorkLog"
)]
pub async fn list_work_logs(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<WorkLogQuery>,
) -> actix_web::Result<impl Responder> {
    let status = match query.status.as_deref() {
        Some(s) => Some(validation::one_of::<WorkStatus>("status", s, STATUSES)?.as_ref().to_owned()),
        None => None,
    };

    let mut sql = String::from("SELECT * FROM work_logs WHERE user_id = ?");
    if query.employee_id.is_some() {
        sql.push_str(" AND employee_id = ?");
    }
    if query.date.is_some() {
        sql.push_str(" AND date = ?");
    }
    if status.is_some() {
        sql.push_str(" AND status = ?");
    }
    sql.push_str(" ORDER BY date DESC, id DESC");

    let mut q = sqlx::query_as::<_, WorkLog>(&sql).bind(auth.user_id);
    if let Some(employee_id) = query.employee_id {
        q = q.bind(employee_id);
    }
    if let Some(date) = query.date {
        q = q.bind(date);
    }
    if let Some(status) = &status {
        q = q.bind(status.as_str());
    }

    let logs = q
        .fetch_all(pool.get_ref())
        .await
        .map_err(ApiError::db("Failed to list work logs"))?;

    let summary = WorkLogSummary::of(&logs);
    Ok(HttpResponse::Ok().json(WorkLogListResponse { data: logs, summary }))
}

#[utoipa::path(
    get,
    path = "/api/work-logs/{log_id}",
    params(("log_id" = u64, Path, description = "Work log ID")),
    responses(
        (status = 200, description = "Work log"),
        (status = 404, description = "Work log not found")
    ),
    security(("bearer_auth" = [])),
    tag = "WorkLog"
)]
pub async fn get_work_log(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let log = find_log(pool.get_ref(), auth.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(log))
}

#[utoipa::path(
    post,
    path = "/api/work-logs",
    request_body = CreateWorkLog,
    responses(
        (status = 201, description = "Work log created"),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "WorkLog"
)]
pub async fn create_work_log(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateWorkLog>,
) -> actix_web::Result<impl Responder> {
    let task = validation::required("task", &payload.task)?;
    validate_hours(payload.hours_spent)?;
    let employee = find_owned(pool.get_ref(), auth.user_id, payload.employee_id).await?;

    let result = sqlx::query(
        r#"
        INSERT INTO work_logs
            (user_id, employee_id, date, task, description, hours_spent, priority, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(employee.id)
    .bind(payload.date.unwrap_or_else(|| Local::now().date_naive()))
    .bind(task)
    .bind(&payload.description)
    .bind(payload.hours_spent)
    .bind(payload.priority.as_ref())
    .bind(payload.status.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(ApiError::db("Failed to create work log"))?;

    let log = find_log(pool.get_ref(), auth.user_id, result.last_insert_id()).await?;
    Ok(HttpResponse::Created().json(log))
}

#[utoipa::path(
    put,
    path = "/api/work-logs/{log_id}",
    params(("log_id" = u64, Path, description = "Work log ID")),
    request_body = UpdateWorkLog,
    responses(
        (status = 200, description = "Work log updated"),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Work log not found")
    ),
    security(("bearer_auth" = [])),
    tag = "WorkLog"
)]
pub async fn update_work_log(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateWorkLog>,
) -> actix_web::Result<impl Responder> {
    let log_id = path.into_inner();
    let current = find_log(pool.get_ref(), auth.user_id, log_id).await?;

    let task = match payload.task.as_deref() {
        Some(t) => validation::required("task", t)?.to_string(),
        None => current.task,
    };
    let hours = payload.hours_spent.unwrap_or(current.hours_spent);
    validate_hours(hours)?;

    let priority = payload
        .priority
        .map(|p| p.as_ref().to_string())
        .unwrap_or(current.priority);
    let status = payload
        .status
        .map(|s| s.as_ref().to_string())
        .unwrap_or(current.status);

    sqlx::query(
        r#"
        UPDATE work_logs
        SET date = ?, task = ?, description = ?, hours_spent = ?, priority = ?, status = ?
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(payload.date.unwrap_or(current.date))
    .bind(task)
    .bind(payload.description.clone().unwrap_or(current.description))
    .bind(hours)
    .bind(priority)
    .bind(status)
    .bind(log_id)
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await
    .map_err(ApiError::db("Failed to update work log"))?;

    let log = find_log(pool.get_ref(), auth.user_id, log_id).await?;
    Ok(HttpResponse::Ok().json(log))
}

#[utoipa::path(
    delete,
    path = "/api/work-logs/{log_id}",
    params(("log_id" = u64, Path, description = "Work log ID")),
    responses(
        (status = 200, description = "Work log deleted"),
        (status = 404, description = "Work log not found")
    ),
    security(("bearer_auth" = [])),
    tag = "WorkLog"
)]
pub async fn delete_work_log(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let res = sqlx::query("DELETE FROM work_logs WHERE id = ? AND user_id = ?")
        .bind(path.into_inner())
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::db("Failed to delete work log"))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("Work log").into());
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Work log deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn log(hours: f64, status: WorkStatus) -> WorkLog {
        WorkLog {
            id: 1,
            user_id: 1,
            employee_id: 1,
            date: NaiveDate::from_ymd_opt(2026, 1, 5).unwrap(),
            task: "Task".into(),
            description: None,
            hours_spent: hours,
            priority: Priority::Medium.as_ref().into(),
            status: status.as_ref().into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn summary_counts_by_status() {
        let logs = vec![
            log(2.5, WorkStatus::Completed),
            log(1.25, WorkStatus::InProgress),
            log(4.0, WorkStatus::InProgress),
            log(0.1, WorkStatus::OnHold),
        ];
        let summary = WorkLogSummary::of(&logs);
        assert_eq!(
            summary,
            WorkLogSummary {
                total_hours: 7.85,
                completed: 1,
                in_progress: 2,
                on_hold: 1,
            }
        );
    }

    #[test]
    fn empty_summary() {
        assert_eq!(WorkLogSummary::of(&[]), WorkLogSummary::default());
    }

    #[test]
    fn hours_bounds() {
        assert!(validate_hours(0.0).is_err());
        assert!(validate_hours(24.5).is_err());
        assert!(validate_hours(f64::NAN).is_err());
        assert!(validate_hours(24.0).is_ok());
        assert!(validate_hours(0.25).is_ok());
    }

    #[test]
    fn create_defaults_priority_and_status() {
        let payload: CreateWorkLog = serde_json::from_value(json!({
            "employee_id": 1,
            "task": "Review",
            "hours_spent": 1.0
        }))
        .unwrap();
        assert_eq!(payload.priority, Priority::Medium);
        assert_eq!(payload.status, WorkStatus::InProgress);
    }

    #[test]
    fn update_can_clear_description() {
        let untouched: UpdateWorkLog = serde_json::from_value(json!({})).unwrap();
        assert!(untouched.description.is_none());

        let cleared: UpdateWorkLog = serde_json::from_value(json!({ "description": null })).unwrap();
        assert_eq!(cleared.description, Some(None));

        let set: UpdateWorkLog = serde_json::from_value(json!({ "description": "Schema review" })).unwrap();
        assert_eq!(set.description, Some(Some("Schema review".to_string())));
    }

    #[actix_web::test]
    async fn unknown_status_filter_is_rejected() {
        use crate::auth::jwt::{Subject, generate_access_token};
        use crate::config::Config;
        use actix_web::App;
        use actix_web::test::{TestRequest, call_service, init_service};

        let config = Config::for_tests();
        let subject = Subject {
            user_id: 1,
            email: "hr@aziteck.com",
            role: 2,
        };
        let token = generate_access_token(&subject, &config.jwt_secret, 60).unwrap();
        let pool = sqlx::mysql::MySqlPoolOptions::new()
            .connect_lazy(&config.database_url)
            .unwrap();

        let app = init_service(
            App::new()
                .app_data(web::Data::new(pool))
                .app_data(web::Data::new(config))
                .route("/work-logs", web::get().to(list_work_logs)),
        )
        .await;

        let req = TestRequest::get()
            .uri("/work-logs?status=blocked")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }
}
