use crate::{
    auth::extractor::AuthUser,
    error::ApiError,
    model::notification::Notification,
    utils::validation,
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateNotification {
    #[schema(example = "Office closed")]
    pub title: String,
    #[schema(example = "The office is closed on Friday for maintenance.")]
    pub message: String,
    /// Defaults to now
    #[schema(value_type = Option<String>, format = "date-time")]
    pub notification_date: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateNotification {
    pub title: Option<String>,
    pub message: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub notification_date: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize, IntoParams)]
pub struct NotificationQuery {
    /// Only active (`true`) or inactive (`false`) notifications
    pub active: Option<bool>,
}

async fn find_notification(pool: &MySqlPool, user_id: u64, id: u64) -> Result<Notification, ApiError> {
    sqlx::query_as::<_, Notification>("SELECT * FROM notifications WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(ApiError::db("Failed to fetch notification"))?
        .ok_or_else(|| ApiError::not_found("Notification"))
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    params(NotificationQuery),
    responses((status = 200, description = "Notifications, newest first", body = [Notification])),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn list_notifications(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<NotificationQuery>,
) -> actix_web::Result<impl Responder> {
    let mut sql = String::from("SELECT * FROM notifications WHERE user_id = ?");
    if query.active.is_some() {
        sql.push_str(" AND is_active = ?");
    }
    sql.push_str(" ORDER BY notification_date DESC, id DESC");

    let mut q = sqlx::query_as::<_, Notification>(&sql).bind(auth.user_id);
    if let Some(active) = query.active {
        q = q.bind(active);
    }

    let notifications = q
        .fetch_all(pool.get_ref())
        .await
        .map_err(ApiError::db("Failed to list notifications"))?;

    Ok(HttpResponse::Ok().json(notifications))
}

#[utoipa::path(
    get,
    path = "/api/notifications/{notification_id}",
    params(("notification_id" = u64, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification", body = Notification),
        (status = 404, description = "Notification not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn get_notification(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let notification = find_notification(pool.get_ref(), auth.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(notification))
}

#[utoipa::path(
    post,
    path = "/api/notifications",
    request_body = CreateNotification,
    responses(
        (status = 201, description = "Notification created", body = Notification),
        (status = 400, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn create_notification(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateNotification>,
) -> actix_web::Result<impl Responder> {
    let title = validation::required("title", &payload.title)?;
    let message = validation::required("message", &payload.message)?;

    let result = sqlx::query(
        "INSERT INTO notifications (user_id, title, message, notification_date, is_active) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(auth.user_id)
    .bind(title)
    .bind(message)
    .bind(payload.notification_date.unwrap_or_else(Utc::now))
    .bind(payload.is_active.unwrap_or(true))
    .execute(pool.get_ref())
    .await
    .map_err(ApiError::db("Failed to create notification"))?;

    let notification = find_notification(pool.get_ref(), auth.user_id, result.last_insert_id()).await?;
    Ok(HttpResponse::Created().json(notification))
}

#[utoipa::path(
    put,
    path = "/api/notifications/{notification_id}",
    params(("notification_id" = u64, Path, description = "Notification ID")),
    request_body = UpdateNotification,
    responses(
        (status = 200, description = "Notification updated", body = Notification),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Notification not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn update_notification(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateNotification>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();
    let current = find_notification(pool.get_ref(), auth.user_id, id).await?;

    let title = match payload.title.as_deref() {
        Some(t) => validation::required("title", t)?.to_string(),
        None => current.title,
    };
    let message = match payload.message.as_deref() {
        Some(m) => validation::required("message", m)?.to_string(),
        None => current.message,
    };

    sqlx::query(
        r#"
        UPDATE notifications
        SET title = ?, message = ?, notification_date = ?, is_active = ?
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(title)
    .bind(message)
    .bind(payload.notification_date.unwrap_or(current.notification_date))
    .bind(payload.is_active.unwrap_or(current.is_active))
    .bind(id)
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await
    .map_err(ApiError::db("Failed to update notification"))?;

    let notification = find_notification(pool.get_ref(), auth.user_id, id).await?;
    Ok(HttpResponse::Ok().json(notification))
}

#[utoipa::path(
    put,
    path = "/api/notifications/{notification_id}/toggle",
    params(("notification_id" = u64, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Active flag flipped", body = Notification),
        (status = 404, description = "Notification not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn toggle_notification(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let id = path.into_inner();

    let res = sqlx::query("UPDATE notifications SET is_active = NOT is_active WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::db("Failed to toggle notification"))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("Notification").into());
    }

    let notification = find_notification(pool.get_ref(), auth.user_id, id).await?;
    Ok(HttpResponse::Ok().json(notification))
}

#[utoipa::path(
    delete,
    path = "/api/notifications/{notification_id}",
    params(("notification_id" = u64, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification deleted"),
        (status = 404, description = "Notification not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Notification"
)]
pub async fn delete_notification(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let res = sqlx::query("DELETE FROM notifications WHERE id = ? AND user_id = ?")
        .bind(path.into_inner())
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::db("Failed to delete notification"))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("Notification").into());
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Notification deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::App;
    use actix_web::test::{TestRequest, call_and_read_body_json, call_service, init_service};

    #[test]
    fn create_accepts_missing_date() {
        let payload: CreateNotification = serde_json::from_value(json!({
            "title": "Payday",
            "message": "Salaries go out on the 25th"
        }))
        .unwrap();
        assert!(payload.notification_date.is_none());
        assert!(payload.is_active.is_none());
    }

    #[actix_web::test]
    async fn active_filter_parses_from_query() {
        async fn echo(query: web::Query<NotificationQuery>) -> HttpResponse {
            HttpResponse::Ok().json(json!({ "active": query.active }))
        }

        let app = init_service(App::new().route("/n", web::get().to(echo))).await;
        let req = TestRequest::get().uri("/n?active=false").to_request();
        let body: serde_json::Value = call_and_read_body_json(&app, req).await;
        assert_eq!(body["active"], false);

        let req = TestRequest::get().uri("/n?active=maybe").to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }
}
