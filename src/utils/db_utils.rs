use crate::error::ApiError;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use sqlx::MySqlPool;

/// SQL bindable value
#[derive(Debug, PartialEq)]
pub enum SqlValue {
    String(String),
    I64(i64),
    U64(u64),
    F64(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

#[derive(Debug)]
pub struct SqlUpdate {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Builds a partial `UPDATE` for one row owned by `user_id`.
///
/// Only keys listed in `allowed` may appear in the payload; they become the
/// `SET` list verbatim, so the whitelist is what keeps the SQL safe.
pub fn build_update_sql(
    table: &str,
    payload: &Map<String, Value>,
    allowed: &[&str],
    id: u64,
    user_id: u64,
) -> Result<SqlUpdate, ApiError> {
    if payload.is_empty() {
        return Err(ApiError::bad_request("No fields provided for update"));
    }

    if let Some(unknown) = payload.keys().find(|k| !allowed.contains(&k.as_str())) {
        return Err(ApiError::bad_request(format!("Field `{unknown}` cannot be updated")));
    }

    let set_clause = payload
        .keys()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!("UPDATE {} SET {} WHERE id = ? AND user_id = ?", table, set_clause);

    let mut values = Vec::with_capacity(payload.len() + 2);

    for value in payload.values() {
        values.push(to_sql_value(value)?);
    }

    values.push(SqlValue::U64(id));
    values.push(SqlValue::U64(user_id));

    Ok(SqlUpdate { sql, values })
}

fn to_sql_value(value: &Value) -> Result<SqlValue, ApiError> {
    Ok(match value {
        Value::String(s) => {
            if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                SqlValue::Date(d)
            } else if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
                SqlValue::DateTime(dt)
            } else {
                SqlValue::String(s.clone())
            }
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::I64(i)
            } else if let Some(u) = n.as_u64() {
                SqlValue::U64(u)
            } else if let Some(f) = n.as_f64() {
                SqlValue::F64(f)
            } else {
                return Err(ApiError::bad_request("Unsupported number"));
            }
        }
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Null => SqlValue::Null,
        _ => return Err(ApiError::bad_request("Unsupported JSON value type")),
    })
}

/// Executes the update, returning the number of rows matched.
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let mut query = sqlx::query(&update.sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::I64(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::DateTime(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.execute(pool).await?;
    Ok(result.rows_affected())
}

/// Pagination as accepted by every list endpoint: `page` starts at 1,
/// `per_page` is clamped to 1..=100.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    pub fn new(page: Option<u32>, per_page: Option<u32>, default_per_page: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(default_per_page).clamp(1, 100),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }
}

/// For `Option<Option<T>>` patch fields with `#[serde(default)]`: a missing
/// key stays `None`, an explicit `null` becomes `Some(None)`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn update_is_scoped_to_owner() {
        let payload = object(json!({ "title": "Standup moved", "is_active": false }));
        let update = build_update_sql("notifications", &payload, &["title", "is_active"], 4, 9).unwrap();

        assert!(update.sql.ends_with("WHERE id = ? AND user_id = ?"));
        assert!(update.sql.contains("title = ?"));
        assert_eq!(update.values.len(), 4);
        assert_eq!(update.values[2..], [SqlValue::U64(4), SqlValue::U64(9)]);
    }

    #[test]
    fn rejects_columns_outside_whitelist() {
        let payload = object(json!({ "user_id": 1 }));
        let err = build_update_sql("employees", &payload, &["first_name"], 1, 1).unwrap_err();
        assert!(err.to_string().contains("user_id"));
    }

    #[test]
    fn rejects_empty_payload() {
        assert!(build_update_sql("employees", &Map::new(), &["first_name"], 1, 1).is_err());
    }

    #[test]
    fn date_strings_bind_as_dates() {
        let payload = object(json!({ "hire_date": "2026-01-05", "branch": null }));
        let update = build_update_sql("employees", &payload, &["hire_date", "branch"], 1, 1).unwrap();
        assert!(update.values.contains(&SqlValue::Date(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap())));
        assert!(update.values.contains(&SqlValue::Null));
    }

    #[test]
    fn page_clamps_input() {
        let page = Page::new(Some(0), Some(500), 20);
        assert_eq!(page, Page { page: 1, per_page: 100 });
        assert_eq!(page.offset(), 0);

        let page = Page::new(Some(3), None, 20);
        assert_eq!(page.offset(), 40);
        assert_eq!(page.limit(), 20);
    }

    #[test]
    fn nullable_tells_missing_from_null() {
        #[derive(serde::Deserialize)]
        struct Patch {
            #[serde(default, deserialize_with = "nullable")]
            notes: Option<Option<String>>,
        }

        let missing: Patch = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(missing.notes, None);

        let cleared: Patch = serde_json::from_value(serde_json::json!({ "notes": null })).unwrap();
        assert_eq!(cleared.notes, Some(None));

        let set: Patch = serde_json::from_value(serde_json::json!({ "notes": "late bus" })).unwrap();
        assert_eq!(set.notes, Some(Some("late bus".to_string())));
    }
}
