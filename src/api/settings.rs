use crate::{
    auth::extractor::AuthUser,
    error::ApiError,
    model::user_settings::UserSettings,
    utils::{
        db_utils::{build_update_sql, execute_update},
        validation,
    },
};
use actix_web::{HttpResponse, Responder, web};
use serde_json::{Map, Value};
use sqlx::MySqlPool;

const UPDATABLE: &[&str] = &[
    "company_name",
    "company_email",
    "company_address",
    "first_name",
    "last_name",
    "email",
    "role",
    "email_notifications",
    "attendance_alerts",
    "task_reminders",
    "weekly_reports",
    "dark_mode",
    "theme_color",
];

const FLAGS: &[&str] = &[
    "email_notifications",
    "attendance_alerts",
    "task_reminders",
    "weekly_reports",
    "dark_mode",
];

fn validate_patch(payload: &Map<String, Value>) -> Result<(), ApiError> {
    for (key, value) in payload {
        match (key.as_str(), value) {
            (_, Value::Null) if !FLAGS.contains(&key.as_str()) => {}
            ("company_email" | "email", Value::String(s)) => validation::email(key, s)?,
            ("theme_color", Value::String(s)) if !validation::is_hex_color(s) => {
                return Err(ApiError::bad_request("theme_color must be a hex color like #1e40af"));
            }
            (k, Value::Bool(_)) if FLAGS.contains(&k) => {}
            (k, _) if FLAGS.contains(&k) => {
                return Err(ApiError::bad_request(format!("{k} must be true or false")));
            }
            (_, Value::String(_)) => {}
            (k, _) => return Err(ApiError::bad_request(format!("{k} must be a string"))),
        }
    }
    Ok(())
}

async fn find_settings(pool: &MySqlPool, user_id: u64) -> Result<Option<UserSettings>, ApiError> {
    sqlx::query_as::<_, UserSettings>("SELECT * FROM user_settings WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(ApiError::db("Failed to fetch settings"))
}

/// Inserts the default row unless one exists already.
pub async fn ensure_defaults(pool: &MySqlPool, user_id: u64) -> Result<(), ApiError> {
    sqlx::query("INSERT IGNORE INTO user_settings (user_id) VALUES (?)")
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(ApiError::db("Failed to create settings"))?;
    Ok(())
}

async fn get_or_create(pool: &MySqlPool, user_id: u64) -> Result<UserSettings, ApiError> {
    if let Some(settings) = find_settings(pool, user_id).await? {
        return Ok(settings);
    }
    ensure_defaults(pool, user_id).await?;
    find_settings(pool, user_id)
        .await?
        .ok_or(ApiError::Internal)
}

#[utoipa::path(
    get,
    path = "/api/settings",
    responses((status = 200, description = "Settings of the signed-in user", body = UserSettings)),
    security(("bearer_auth" = [])),
    tag = "Settings"
)]
pub async fn get_settings(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let settings = get_or_create(pool.get_ref(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(settings))
}

#[utoipa::path(
    put,
    path = "/api/settings",
    request_body(content = Object, description = "Any subset of the settings fields", example = json!({ "dark_mode": true, "theme_color": "#0f766e" })),
    responses(
        (status = 200, description = "Updated settings", body = UserSettings),
        (status = 400, description = "Validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "Settings"
)]
pub async fn update_settings(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    let Value::Object(fields) = payload.into_inner() else {
        return Err(ApiError::bad_request("Expected a JSON object").into());
    };
    validate_patch(&fields)?;

    let current = get_or_create(pool.get_ref(), auth.user_id).await?;
    let update = build_update_sql("user_settings", &fields, UPDATABLE, current.id, auth.user_id)?;
    execute_update(pool.get_ref(), update)
        .await
        .map_err(ApiError::db("Failed to update settings"))?;

    let settings = get_or_create(pool.get_ref(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patch(value: Value) -> Result<(), ApiError> {
        validate_patch(value.as_object().unwrap())
    }

    #[test]
    fn accepts_partial_updates() {
        assert!(patch(json!({ "dark_mode": true })).is_ok());
        assert!(patch(json!({ "company_name": "Acme", "theme_color": "#0f766e" })).is_ok());
        assert!(patch(json!({ "company_address": null })).is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(patch(json!({ "company_email": "not-an-email" })).is_err());
        assert!(patch(json!({ "theme_color": "teal" })).is_err());
        assert!(patch(json!({ "dark_mode": "yes" })).is_err());
        assert!(patch(json!({ "dark_mode": null })).is_err());
        assert!(patch(json!({ "first_name": 42 })).is_err());
    }
}
