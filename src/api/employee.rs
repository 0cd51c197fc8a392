use crate::{
    api::project::{employee_file_keys, purge_objects},
    auth::extractor::AuthUser,
    error::ApiError,
    model::employee::{Employee, EmployeeStatus},
    storage::ObjectStore,
    utils::db_utils::{Page, build_update_sql, execute_update},
    utils::validation,
};
use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sqlx::MySqlPool;
use tracing::{debug, info};
use utoipa::{IntoParams, ToSchema};

const STATUSES: &[&str] = &["active", "inactive"];

/// Columns a client may change through `PUT /employees/{id}`.
const UPDATABLE: &[&str] = &[
    "first_name",
    "last_name",
    "email",
    "phone",
    "position",
    "department",
    "hire_date",
    "salary",
    "address",
    "education_degree",
    "branch",
    "skills",
    "emergency_contact_name",
    "emergency_contact_phone",
    "emergency_contact_relationship",
    "status",
];

#[derive(Deserialize, Serialize, ToSchema)]
pub struct EmergencyContact {
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[schema(example = "+8801712345679")]
    pub phone: String,
    #[schema(example = "Spouse")]
    pub relationship: String,
}

#[derive(Deserialize, Serialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "John")]
    pub first_name: String,
    #[schema(example = "Doe")]
    pub last_name: String,
    #[schema(example = "john@email.com", format = "email")]
    pub email: String,
    #[schema(example = "+8801712345678")]
    pub phone: String,
    #[schema(example = "Data Engineer")]
    pub position: String,
    #[schema(example = "Engineering")]
    pub department: String,
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub hire_date: NaiveDate,
    #[schema(example = 55000.0)]
    #[serde(default)]
    pub salary: f64,
    #[serde(default)]
    pub address: String,
    pub education_degree: Option<String>,
    pub branch: Option<String>,
    pub skills: Option<String>,
    pub emergency_contact: Option<EmergencyContact>,
    #[schema(example = "active")]
    pub status: Option<String>,
}

impl CreateEmployee {
    fn validate(&self) -> Result<EmployeeStatus, ApiError> {
        validation::required("first_name", &self.first_name)?;
        validation::required("last_name", &self.last_name)?;
        validation::email("email", &self.email)?;
        validation::required("phone", &self.phone)?;
        validation::required("position", &self.position)?;
        validation::required("department", &self.department)?;

        if !self.salary.is_finite() || self.salary < 0.0 {
            return Err(ApiError::bad_request("salary cannot be negative"));
        }

        match self.status.as_deref() {
            Some(s) => validation::one_of("status", s, STATUSES),
            None => Ok(EmployeeStatus::Active),
        }
    }
}

/// Checks the fields present in a partial update.
fn validate_patch(patch: &Map<String, Value>) -> Result<(), ApiError> {
    for (key, value) in patch {
        match (key.as_str(), value) {
            ("email", Value::String(s)) => validation::email("email", s)?,
            ("status", Value::String(s)) => {
                validation::one_of::<EmployeeStatus>("status", s, STATUSES)?;
            }
            ("salary", Value::Number(n)) => {
                if n.as_f64().is_none_or(|v| v < 0.0) {
                    return Err(ApiError::bad_request("salary cannot be negative"));
                }
            }
            ("hire_date", Value::String(s)) => {
                NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map_err(|_| ApiError::bad_request("hire_date must be YYYY-MM-DD"))?;
            }
            ("education_degree" | "branch" | "skills", Value::String(_) | Value::Null) => {}
            (
                "first_name" | "last_name" | "phone" | "position" | "department",
                Value::String(s),
            ) => {
                validation::required(key, s)?;
            }
            (
                "address"
                | "emergency_contact_name"
                | "emergency_contact_phone"
                | "emergency_contact_relationship",
                Value::String(_),
            ) => {}
            (field, _) if UPDATABLE.contains(&field) => {
                return Err(ApiError::bad_request(format!("Invalid value for `{field}`")));
            }
            // unknown keys are reported by build_update_sql
            _ => {}
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct EmployeeQuery {
    /// Page number (starts at 1)
    pub page: Option<u32>,
    /// Items per page (max 100)
    pub per_page: Option<u32>,
    /// Filter by department
    pub department: Option<String>,
    /// Filter by status
    pub status: Option<String>,
    /// Search by name or email
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 10)]
    pub total: i64,
}

/// Loads an employee that belongs to the caller.
pub async fn find_owned(pool: &MySqlPool, user_id: u64, employee_id: u64) -> Result<Employee, ApiError> {
    sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = ? AND user_id = ?")
        .bind(employee_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(ApiError::db("Failed to fetch employee"))?
        .ok_or_else(|| ApiError::not_found("Employee"))
}

/// Every employee of the caller, used by the dashboard and pickers.
pub async fn list_all(pool: &MySqlPool, user_id: u64) -> Result<Vec<Employee>, ApiError> {
    sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE user_id = ? ORDER BY first_name, last_name")
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(ApiError::db("Failed to list employees"))
}

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Object, example = json!({
            "message": "Employee created successfully",
            "id": 1
        })),
        (status = 400, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateEmployee>,
) -> actix_web::Result<impl Responder> {
    let status = payload.validate()?;
    let contact = payload.emergency_contact.as_ref();

    let result = sqlx::query(
        r#"
        INSERT INTO employees
        (user_id, first_name, last_name, email, phone, position, department, hire_date, salary,
         address, education_degree, branch, skills,
         emergency_contact_name, emergency_contact_phone, emergency_contact_relationship, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(auth.user_id)
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(payload.email.trim())
    .bind(payload.phone.trim())
    .bind(payload.position.trim())
    .bind(payload.department.trim())
    .bind(payload.hire_date)
    .bind(payload.salary)
    .bind(payload.address.trim())
    .bind(&payload.education_degree)
    .bind(&payload.branch)
    .bind(&payload.skills)
    .bind(contact.map_or("", |c| c.name.as_str()))
    .bind(contact.map_or("", |c| c.phone.as_str()))
    .bind(contact.map_or("", |c| c.relationship.as_str()))
    .bind(status.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(ApiError::db("Failed to create employee"))?;

    info!(user_id = auth.user_id, employee_id = result.last_insert_id(), "Employee created");

    Ok(HttpResponse::Created().json(json!({
        "message": "Employee created successfully",
        "id": result.last_insert_id()
    })))
}

#[utoipa::path(
    get,
    path = "/api/employees",
    params(EmployeeQuery),
    responses(
        (status = 200, description = "Paginated employee list", body = EmployeeListResponse)
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<EmployeeQuery>,
) -> actix_web::Result<impl Responder> {
    let page = Page::new(query.page, query.per_page, 20);

    // ---------- build WHERE clause dynamically ----------
    let mut conditions = vec!["user_id = ?"];
    let mut bindings: Vec<String> = Vec::new();

    if let Some(department) = &query.department {
        conditions.push("department = ?");
        bindings.push(department.clone());
    }

    if let Some(status) = &query.status {
        conditions.push("status = ?");
        bindings.push(status.clone());
    }

    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        conditions.push("(first_name LIKE ? OR last_name LIKE ? OR email LIKE ?)");
        let like = format!("%{}%", search);
        bindings.push(like.clone());
        bindings.push(like.clone());
        bindings.push(like);
    }

    let where_clause = format!("WHERE {}", conditions.join(" AND "));

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) FROM employees {}", where_clause);
    debug!(sql = %count_sql, bindings = ?bindings, "Counting employees");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(auth.user_id);
    for b in &bindings {
        count_query = count_query.bind(b);
    }

    let total = count_query
        .fetch_one(pool.get_ref())
        .await
        .map_err(ApiError::db("Failed to count employees"))?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT * FROM employees {} ORDER BY id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    debug!(sql = %data_sql, page = page.page, per_page = page.per_page, "Fetching employees");

    let mut data_query = sqlx::query_as::<_, Employee>(&data_sql).bind(auth.user_id);
    for b in &bindings {
        data_query = data_query.bind(b);
    }

    let employees = data_query
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(pool.get_ref())
        .await
        .map_err(ApiError::db("Failed to fetch employees"))?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page: page.page,
        per_page: page.per_page,
        total,
    }))
}

/// Update Employee
#[utoipa::path(
    put,
    path = "/api/employees/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    request_body(content = Object, description = "Any subset of employee fields"),
    responses(
        (status = 200, description = "Employee updated successfully", body = Object, example = json!({
            "message": "Employee updated successfully"
        })),
        (status = 400, description = "Invalid field or value"),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();

    let patch = body
        .as_object()
        .ok_or_else(|| ApiError::bad_request("Payload must be a JSON object"))?;
    validate_patch(patch)?;

    let update = build_update_sql("employees", patch, UPDATABLE, employee_id, auth.user_id)?;

    let affected = execute_update(pool.get_ref(), update)
        .await
        .map_err(ApiError::db("Failed to update employee"))?;

    if affected == 0 {
        // MySQL reports 0 for an unchanged row too, tell the two apart
        find_owned(pool.get_ref(), auth.user_id, employee_id).await?;
    }

    Ok(HttpResponse::Ok().json(json!({
        "message": "Employee updated successfully"
    })))
}

/// Delete Employee
#[utoipa::path(
    delete,
    path = "/api/employees/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Successfully deleted", body = Object, example = json!({
            "message": "Successfully deleted"
        })),
        (status = 404, description = "Employee not found")
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn delete_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    store: web::Data<dyn ObjectStore>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee_id = path.into_inner();

    // projects and their file rows cascade, the stored objects do not
    let keys = employee_file_keys(pool.get_ref(), auth.user_id, employee_id).await?;

    let res = sqlx::query("DELETE FROM employees WHERE id = ? AND user_id = ?")
        .bind(employee_id)
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::db("Failed to delete employee"))?;

    if res.rows_affected() == 0 {
        return Err(ApiError::not_found("Employee").into());
    }

    let removed = purge_objects(store.into_inner(), keys).await?;
    info!(employee_id, files = removed, "Employee deleted");

    Ok(HttpResponse::Ok().json(json!({
        "message": "Successfully deleted"
    })))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/employees/{employee_id}",
    params(("employee_id" = u64, Path, description = "Employee ID")),
    responses(
        (status = 200, description = "Employee found", body = Employee),
        (status = 404, description = "Employee not found", body = Object, example = json!({
            "message": "Employee not found"
        }))
    ),
    tag = "Employee",
    security(("bearer_auth" = []))
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let employee = find_owned(pool.get_ref(), auth.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(employee))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> CreateEmployee {
        serde_json::from_value(json!({
            "first_name": "John",
            "last_name": "Doe",
            "email": "john@company.com",
            "phone": "+8801712345678",
            "position": "Analyst",
            "department": "Data",
            "hire_date": "2026-01-05",
            "salary": 1000.0
        }))
        .unwrap()
    }

    #[test]
    fn create_defaults_to_active() {
        assert_eq!(payload().validate().unwrap(), EmployeeStatus::Active);
    }

    #[test]
    fn create_rejects_bad_fields() {
        let mut p = payload();
        p.email = "john".into();
        assert!(p.validate().is_err());

        let mut p = payload();
        p.salary = -1.0;
        assert!(p.validate().is_err());

        let mut p = payload();
        p.position = " ".into();
        assert!(p.validate().is_err());

        let mut p = payload();
        p.status = Some("fired".into());
        assert!(p.validate().is_err());
    }

    #[test]
    fn patch_validation() {
        let ok = json!({ "status": "inactive", "salary": 10, "branch": null });
        assert!(validate_patch(ok.as_object().unwrap()).is_ok());

        for bad in [
            json!({ "email": "nope" }),
            json!({ "salary": -5 }),
            json!({ "first_name": "" }),
            json!({ "hire_date": "05/01/2026" }),
            json!({ "phone": 123 }),
        ] {
            assert!(validate_patch(bad.as_object().unwrap()).is_err(), "{bad}");
        }
    }
}
