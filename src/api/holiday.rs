use crate::{
    auth::extractor::AuthUser,
    error::ApiError,
    model::holiday::Holiday,
    utils::validation,
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct HolidayReq {
    #[schema(example = "Independence Day")]
    pub name: String,
    #[schema(example = "2026-03-26", format = "date", value_type = String)]
    pub date: NaiveDate,
    pub description: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
}

#[derive(Deserialize, IntoParams)]
pub struct HolidayQuery {
    /// Calendar year, defaults to the current one
    pub year: Option<i32>,
}

/// A holiday placed on a concrete day of the requested year.
#[derive(Debug, Serialize, ToSchema)]
pub struct HolidayOccurrence {
    pub id: u64,
    #[schema(example = "Independence Day")]
    pub name: String,
    /// Day it is observed in the requested year
    #[schema(example = "2026-03-26", format = "date", value_type = String)]
    pub date: NaiveDate,
    /// Day it was originally recorded on
    #[schema(example = "2024-03-26", format = "date", value_type = String)]
    pub original_date: NaiveDate,
    pub description: Option<String>,
    pub is_recurring: bool,
}

impl HolidayOccurrence {
    fn new(holiday: Holiday, date: NaiveDate) -> Self {
        Self {
            id: holiday.id,
            name: holiday.name,
            date,
            original_date: holiday.date,
            description: holiday.description,
            is_recurring: holiday.is_recurring,
        }
    }
}

/// Holidays observed during `year`, sorted by day.
pub fn calendar_for_year(holidays: Vec<Holiday>, year: i32) -> Vec<HolidayOccurrence> {
    let mut out: Vec<_> = holidays
        .into_iter()
        .filter_map(|h| h.occurrence_in(year).map(|d| HolidayOccurrence::new(h, d)))
        .collect();
    out.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.name.cmp(&b.name)));
    out
}

/// The next `limit` holidays on or after `from`.
pub fn upcoming(holidays: Vec<Holiday>, from: NaiveDate, limit: usize) -> Vec<HolidayOccurrence> {
    let mut out: Vec<_> = holidays
        .into_iter()
        .filter_map(|h| h.next_occurrence(from).map(|d| HolidayOccurrence::new(h, d)))
        .collect();
    out.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.name.cmp(&b.name)));
    out.truncate(limit);
    out
}

pub async fn list_all(pool: &MySqlPool, user_id: u64) -> Result<Vec<Holiday>, ApiError> {
    sqlx::query_as::<_, Holiday>("SELECT * FROM holidays WHERE user_id = ?")
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(ApiError::db("Failed to list holidays"))
}

async fn find_holiday(pool: &MySqlPool, user_id: u64, id: u64) -> Result<Holiday, ApiError> {
    sqlx::query_as::<_, Holiday>("SELECT * FROM holidays WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(ApiError::db("Failed to fetch holiday"))?
        .ok_or_else(|| ApiError::not_found("Holiday"))
}

#[utoipa::path(
    get,
    path = "/api/holidays",
    params(HolidayQuery),
    responses((status = 200, description = "Holidays observed in the year", body = [HolidayOccurrence])),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn list_holidays(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<HolidayQuery>,
) -> actix_web::Result<impl Responder> {
    let year = query.year.unwrap_or_else(|| Local::now().year());
    let holidays = list_all(pool.get_ref(), auth.user_id).await?;
    Ok(HttpResponse::Ok().json(calendar_for_year(holidays, year)))
}

#[utoipa::path(
    get,
    path = "/api/holidays/{holiday_id}",
    params(("holiday_id" = u64, Path, description = "Holiday ID")),
    responses(
        (status = 200, description = "Holiday", body = HolidayOccurrence),
        (status = 404, description = "Holiday not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn get_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let holiday = find_holiday(pool.get_ref(), auth.user_id, path.into_inner()).await?;
    let date = holiday.date;
    Ok(HttpResponse::Ok().json(HolidayOccurrence::new(holiday, date)))
}

#[utoipa::path(
    post,
    path = "/api/holidays",
    request_body = HolidayReq,
    responses(
        (status = 201, description = "Holiday created", body = Object, example = json!({ "message": "Holiday created", "id": 1 })),
        (status = 400, description = "Validation failed"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn create_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<HolidayReq>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let name = validation::required("name", &payload.name)?;

    let result = sqlx::query(
        "INSERT INTO holidays (user_id, name, date, description, is_recurring) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(auth.user_id)
    .bind(name)
    .bind(payload.date)
    .bind(&payload.description)
    .bind(payload.is_recurring)
    .execute(pool.get_ref())
    .await
    .map_err(ApiError::db("Failed to create holiday"))?;

    Ok(HttpResponse::Created().json(json!({
        "message": "Holiday created",
        "id": result.last_insert_id()
    })))
}

#[utoipa::path(
    put,
    path = "/api/holidays/{holiday_id}",
    params(("holiday_id" = u64, Path, description = "Holiday ID")),
    request_body = HolidayReq,
    responses(
        (status = 200, description = "Holiday updated"),
        (status = 404, description = "Holiday not found"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn update_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<HolidayReq>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;
    let holiday_id = path.into_inner();
    let name = validation::required("name", &payload.name)?;

    // existence check first, MySQL reports unchanged rows as unaffected
    find_holiday(pool.get_ref(), auth.user_id, holiday_id).await?;

    sqlx::query(
        r#"
        UPDATE holidays
        SET name = ?, date = ?, description = ?, is_recurring = ?
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(name)
    .bind(payload.date)
    .bind(&payload.description)
    .bind(payload.is_recurring)
    .bind(holiday_id)
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await
    .map_err(ApiError::db("Failed to update holiday"))?;

    Ok(HttpResponse::Ok().json(json!({ "message": "Holiday updated" })))
}

#[utoipa::path(
    delete,
    path = "/api/holidays/{holiday_id}",
    params(("holiday_id" = u64, Path, description = "Holiday ID")),
    responses(
        (status = 200, description = "Holiday deleted"),
        (status = 404, description = "Holiday not found"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Holiday"
)]
pub async fn delete_holiday(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let res = sqlx::query("DELETE FROM holidays WHERE id = ? AND user_id = ?")
        .bind(path.into_inner())
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::db("Failed to delete holiday"))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("Holiday").into());
    }

    Ok(HttpResponse::Ok().json(json!({ "message": "Holiday deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn holiday(id: u64, name: &str, date: (i32, u32, u32), is_recurring: bool) -> Holiday {
        Holiday {
            id,
            user_id: 1,
            name: name.to_string(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            description: None,
            is_recurring,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn calendar_mixes_one_off_and_recurring() {
        let holidays = vec![
            holiday(1, "Christmas", (2020, 12, 25), true),
            holiday(2, "Company retreat", (2026, 6, 1), false),
            holiday(3, "Old retreat", (2025, 6, 1), false),
            holiday(4, "New Year", (2020, 1, 1), true),
        ];

        let calendar = calendar_for_year(holidays, 2026);
        let names: Vec<_> = calendar.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, ["New Year", "Company retreat", "Christmas"]);
        assert_eq!(calendar[2].date, NaiveDate::from_ymd_opt(2026, 12, 25).unwrap());
        assert_eq!(calendar[2].original_date, NaiveDate::from_ymd_opt(2020, 12, 25).unwrap());
    }

    #[test]
    fn upcoming_is_sorted_and_limited() {
        let holidays = vec![
            holiday(1, "Christmas", (2020, 12, 25), true),
            holiday(2, "New Year", (2020, 1, 1), true),
            holiday(3, "Past", (2026, 1, 10), false),
        ];
        let from = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();

        let next = upcoming(holidays, from, 1);
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].name, "Christmas");
    }

    #[test]
    fn upcoming_includes_holidays_beyond_next_year() {
        let holidays = vec![
            holiday(1, "Founders Day", (2028, 5, 1), false),
            holiday(2, "Company Day", (2028, 6, 1), true),
        ];
        let from = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();

        let next = upcoming(holidays, from, 5);
        let names: Vec<_> = next.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["Founders Day", "Company Day"]);
    }
}
