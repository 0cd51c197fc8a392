use crate::{
    api::employee::find_owned,
    auth::extractor::AuthUser,
    config::Config,
    error::ApiError,
    model::project::{Project, ProjectCategory, ProjectFile, ProjectTag},
    storage::{ObjectStore, object_key},
    utils::validation,
};
use actix_web::{
    HttpResponse, Responder,
    http::header::{ContentDisposition, ContentType, DispositionParam, DispositionType},
    web,
};
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{IntoParams, ToSchema};

const CATEGORIES: &[&str] = &["Data Analysis", "Data Engineering", "Data Science"];
const TAGS: &[&str] = &["Basic", "Intermediate", "Advanced"];

const SELECT_WITH_EMPLOYEE: &str = r#"
    SELECT p.*, e.first_name AS employee_first_name, e.last_name AS employee_last_name
    FROM projects p
    JOIN employees e ON e.id = p.employee_id
"#;

#[derive(Deserialize, ToSchema)]
pub struct CreateProject {
    #[schema(example = 1)]
    pub employee_id: u64,
    #[schema(example = "Churn model")]
    pub title: String,
    #[schema(example = "Data Science")]
    pub category: String,
    #[schema(example = "Advanced")]
    pub tag: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateProject {
    pub employee_id: Option<u64>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
}

#[derive(Deserialize, IntoParams)]
pub struct UploadQuery {
    /// Original file name
    #[param(example = "report.pdf")]
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectFileView {
    pub id: u64,
    pub project_id: u64,
    #[schema(example = "report.pdf")]
    pub name: String,
    #[schema(example = "7/1767225600000-report.pdf")]
    pub path: String,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: chrono::DateTime<Utc>,
}

impl From<ProjectFile> for ProjectFileView {
    fn from(file: ProjectFile) -> Self {
        Self {
            name: file.display_name().to_string(),
            id: file.id,
            project_id: file.project_id,
            path: file.path,
            created_at: file.created_at,
        }
    }
}

fn parse_category(raw: &str) -> Result<ProjectCategory, ApiError> {
    validation::one_of("category", raw, CATEGORIES)
}

fn parse_tag(raw: &str) -> Result<ProjectTag, ApiError> {
    validation::one_of("tag", raw, TAGS)
}

/// Projects may only be assigned to active employees of the caller.
async fn assignable_employee(pool: &MySqlPool, user_id: u64, employee_id: u64) -> Result<u64, ApiError> {
    let employee = find_owned(pool, user_id, employee_id).await?;
    if !employee.is_active() {
        return Err(ApiError::bad_request("Projects can only be assigned to active employees"));
    }
    Ok(employee.id)
}

async fn find_project(pool: &MySqlPool, user_id: u64, id: u64) -> Result<Project, ApiError> {
    let sql = format!("{SELECT_WITH_EMPLOYEE} WHERE p.id = ? AND p.user_id = ?");
    sqlx::query_as::<_, Project>(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(ApiError::db("Failed to fetch project"))?
        .ok_or_else(|| ApiError::not_found("Project"))
}

async fn find_file(pool: &MySqlPool, user_id: u64, project_id: u64, file_id: u64) -> Result<ProjectFile, ApiError> {
    sqlx::query_as::<_, ProjectFile>(
        "SELECT * FROM project_files WHERE id = ? AND project_id = ? AND user_id = ?",
    )
    .bind(file_id)
    .bind(project_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(ApiError::db("Failed to fetch project file"))?
    .ok_or_else(|| ApiError::not_found("File"))
}

async fn run_blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> std::io::Result<T> + Send + 'static,
    T: Send + 'static,
{
    match web::block(f).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => Err(ApiError::not_found("File")),
        Ok(Err(e)) => {
            error!(error = %e, "Object store failure");
            Err(ApiError::Internal)
        }
        Err(e) => {
            error!(error = %e, "Blocking pool failure");
            Err(ApiError::Internal)
        }
    }
}

/// Collects an upload body, stopping as soon as it grows past `limit` bytes.
async fn read_limited<S, E>(body: S, limit: usize) -> Result<web::BytesMut, ApiError>
where
    S: Stream<Item = Result<web::Bytes, E>>,
    E: std::fmt::Display,
{
    pin_mut!(body);
    let mut buf = web::BytesMut::new();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| {
            warn!(error = %e, "Upload interrupted");
            ApiError::bad_request("Failed to read upload")
        })?;
        if buf.len() + chunk.len() > limit {
            return Err(ApiError::PayloadTooLarge(limit));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf)
}

/// Removes stored objects whose rows are already gone. Failures are logged
/// and skipped; returns how many objects were removed.
pub async fn purge_objects(store: Arc<dyn ObjectStore>, keys: Vec<String>) -> Result<usize, ApiError> {
    if keys.is_empty() {
        return Ok(0);
    }
    run_blocking(move || {
        let mut removed = 0;
        for key in &keys {
            match store.delete(key) {
                Ok(()) => removed += 1,
                Err(e) => warn!(key = %key, error = %e, "Failed to remove project file"),
            }
        }
        Ok(removed)
    })
    .await
}

/// Object keys of every file attached to the employee's projects.
pub async fn employee_file_keys(pool: &MySqlPool, user_id: u64, employee_id: u64) -> Result<Vec<String>, ApiError> {
    sqlx::query_scalar(
        r#"
        SELECT pf.path
        FROM project_files pf
        JOIN projects p ON p.id = pf.project_id
        WHERE p.employee_id = ? AND p.user_id = ?
        "#,
    )
    .bind(employee_id)
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(ApiError::db("Failed to list employee project files"))
}

#[utoipa::path(
    get,
    path = "/api/projects",
    responses((status = 200, description = "Projects, newest first", body = [Project])),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn list_projects(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let sql = format!("{SELECT_WITH_EMPLOYEE} WHERE p.user_id = ? ORDER BY p.created_at DESC, p.id DESC");
    let projects = sqlx::query_as::<_, Project>(&sql)
        .bind(auth.user_id)
        .fetch_all(pool.get_ref())
        .await
        .map_err(ApiError::db("Failed to list projects"))?;

    Ok(HttpResponse::Ok().json(projects))
}

#[utoipa::path(
    get,
    path = "/api/projects/{project_id}",
    params(("project_id" = u64, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project", body = Project),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn get_project(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let project = find_project(pool.get_ref(), auth.user_id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(project))
}

#[utoipa::path(
    post,
    path = "/api/projects",
    request_body = CreateProject,
    responses(
        (status = 201, description = "Project created", body = Project),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Employee not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn create_project(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateProject>,
) -> actix_web::Result<impl Responder> {
    let title = validation::required("title", &payload.title)?;
    let category = parse_category(&payload.category)?;
    let tag = parse_tag(&payload.tag)?;
    let employee_id = assignable_employee(pool.get_ref(), auth.user_id, payload.employee_id).await?;

    let result = sqlx::query(
        "INSERT INTO projects (user_id, employee_id, title, category, tag) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(auth.user_id)
    .bind(employee_id)
    .bind(title)
    .bind(category.as_ref())
    .bind(tag.as_ref())
    .execute(pool.get_ref())
    .await
    .map_err(ApiError::db("Failed to create project"))?;

    let project = find_project(pool.get_ref(), auth.user_id, result.last_insert_id()).await?;
    Ok(HttpResponse::Created().json(project))
}

#[utoipa::path(
    put,
    path = "/api/projects/{project_id}",
    params(("project_id" = u64, Path, description = "Project ID")),
    request_body = UpdateProject,
    responses(
        (status = 200, description = "Project updated", body = Project),
        (status = 400, description = "Validation failed"),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn update_project(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<UpdateProject>,
) -> actix_web::Result<impl Responder> {
    let project_id = path.into_inner();
    let current = find_project(pool.get_ref(), auth.user_id, project_id).await?;

    let title = match payload.title.as_deref() {
        Some(t) => validation::required("title", t)?.to_string(),
        None => current.title,
    };
    let category = match payload.category.as_deref() {
        Some(c) => parse_category(c)?.as_ref().to_string(),
        None => current.category,
    };
    let tag = match payload.tag.as_deref() {
        Some(t) => parse_tag(t)?.as_ref().to_string(),
        None => current.tag,
    };
    let employee_id = match payload.employee_id {
        Some(id) if id != current.employee_id => assignable_employee(pool.get_ref(), auth.user_id, id).await?,
        _ => current.employee_id,
    };

    sqlx::query(
        "UPDATE projects SET employee_id = ?, title = ?, category = ?, tag = ? WHERE id = ? AND user_id = ?",
    )
    .bind(employee_id)
    .bind(title)
    .bind(category)
    .bind(tag)
    .bind(project_id)
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await
    .map_err(ApiError::db("Failed to update project"))?;

    let project = find_project(pool.get_ref(), auth.user_id, project_id).await?;
    Ok(HttpResponse::Ok().json(project))
}

#[utoipa::path(
    delete,
    path = "/api/projects/{project_id}",
    params(("project_id" = u64, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project and its files deleted"),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn delete_project(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    store: web::Data<dyn ObjectStore>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let project_id = path.into_inner();
    find_project(pool.get_ref(), auth.user_id, project_id).await?;

    let keys: Vec<String> =
        sqlx::query_scalar("SELECT path FROM project_files WHERE project_id = ? AND user_id = ?")
            .bind(project_id)
            .bind(auth.user_id)
            .fetch_all(pool.get_ref())
            .await
            .map_err(ApiError::db("Failed to list project files"))?;

    // file rows go with the project (ON DELETE CASCADE)
    sqlx::query("DELETE FROM projects WHERE id = ? AND user_id = ?")
        .bind(project_id)
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::db("Failed to delete project"))?;

    let removed = purge_objects(store.into_inner(), keys).await?;

    info!(project_id, files = removed, "Project deleted");
    Ok(HttpResponse::Ok().json(json!({ "message": "Project deleted" })))
}

#[utoipa::path(
    get,
    path = "/api/projects/{project_id}/files",
    params(("project_id" = u64, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Attached files", body = [ProjectFileView]),
        (status = 404, description = "Project not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn list_files(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let project_id = path.into_inner();
    find_project(pool.get_ref(), auth.user_id, project_id).await?;

    let files = sqlx::query_as::<_, ProjectFile>(
        "SELECT * FROM project_files WHERE project_id = ? AND user_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(project_id)
    .bind(auth.user_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(ApiError::db("Failed to list project files"))?;

    let views: Vec<ProjectFileView> = files.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(views))
}

/// Upload an attachment; the request body is the raw file content.
#[utoipa::path(
    post,
    path = "/api/projects/{project_id}/files",
    params(("project_id" = u64, Path, description = "Project ID"), UploadQuery),
    request_body(content = String, content_type = "application/octet-stream", description = "Raw file content"),
    responses(
        (status = 201, description = "File stored", body = ProjectFileView),
        (status = 400, description = "Empty file"),
        (status = 404, description = "Project not found"),
        (status = 413, description = "File too large")
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn upload_file(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    store: web::Data<dyn ObjectStore>,
    config: web::Data<Config>,
    path: web::Path<u64>,
    query: web::Query<UploadQuery>,
    payload: web::Payload,
) -> actix_web::Result<impl Responder> {
    let project_id = path.into_inner();
    let name = validation::required("name", &query.name)?;

    find_project(pool.get_ref(), auth.user_id, project_id).await?;

    let body = read_limited(payload, config.max_upload_bytes).await?;
    if body.is_empty() {
        return Err(ApiError::bad_request("File is empty").into());
    }

    let key = object_key(auth.user_id, Utc::now().timestamp_millis(), name);
    let store = store.into_inner();
    let writer = store.clone();
    let put_key = key.clone();
    run_blocking(move || writer.put(&put_key, &body)).await?;

    let inserted = sqlx::query("INSERT INTO project_files (user_id, project_id, path) VALUES (?, ?, ?)")
        .bind(auth.user_id)
        .bind(project_id)
        .bind(&key)
        .execute(pool.get_ref())
        .await;

    let result = match inserted {
        Ok(result) => result,
        Err(e) => {
            let err = ApiError::db("Failed to record project file")(e);
            purge_objects(store, vec![key]).await?;
            return Err(err.into());
        }
    };

    info!(project_id, key = %key, "Project file stored");

    let file = find_file(pool.get_ref(), auth.user_id, project_id, result.last_insert_id()).await?;
    Ok(HttpResponse::Created().json(ProjectFileView::from(file)))
}

#[utoipa::path(
    get,
    path = "/api/projects/{project_id}/files/{file_id}",
    params(
        ("project_id" = u64, Path, description = "Project ID"),
        ("file_id" = u64, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "File content as an attachment"),
        (status = 404, description = "File not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn download_file(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    store: web::Data<dyn ObjectStore>,
    path: web::Path<(u64, u64)>,
) -> actix_web::Result<impl Responder> {
    let (project_id, file_id) = path.into_inner();
    let file = find_file(pool.get_ref(), auth.user_id, project_id, file_id).await?;

    let store = store.into_inner();
    let key = file.path.clone();
    let bytes = run_blocking(move || store.get(&key)).await?;

    let disposition = ContentDisposition {
        disposition: DispositionType::Attachment,
        parameters: vec![DispositionParam::Filename(file.display_name().to_string())],
    };

    Ok(HttpResponse::Ok()
        .content_type(ContentType::octet_stream())
        .insert_header(disposition)
        .body(bytes))
}

#[utoipa::path(
    delete,
    path = "/api/projects/{project_id}/files/{file_id}",
    params(
        ("project_id" = u64, Path, description = "Project ID"),
        ("file_id" = u64, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "File deleted"),
        (status = 404, description = "File not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Project"
)]
pub async fn delete_file(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    store: web::Data<dyn ObjectStore>,
    path: web::Path<(u64, u64)>,
) -> actix_web::Result<impl Responder> {
    let (project_id, file_id) = path.into_inner();
    let file = find_file(pool.get_ref(), auth.user_id, project_id, file_id).await?;

    let store = store.into_inner();
    let key = file.path.clone();
    run_blocking(move || store.delete(&key)).await?;

    sqlx::query("DELETE FROM project_files WHERE id = ? AND user_id = ?")
        .bind(file.id)
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::db("Failed to delete project file"))?;

    Ok(HttpResponse::Ok().json(json!({ "message": "File deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalBucket;

    #[test]
    fn category_and_tag_are_validated() {
        assert_eq!(parse_category("Data Engineering").unwrap(), ProjectCategory::DataEngineering);
        let err = parse_category("Marketing").unwrap_err();
        assert!(err.to_string().contains("Data Analysis, Data Engineering, Data Science"));
        assert!(parse_tag("Expert").is_err());
        assert_eq!(parse_tag("Basic").unwrap(), ProjectTag::Basic);
    }

    #[test]
    fn file_view_uses_display_name() {
        let view = ProjectFileView::from(ProjectFile {
            id: 5,
            user_id: 7,
            project_id: 2,
            path: "7/1767225600000-notes.txt".into(),
            created_at: Utc::now(),
        });
        assert_eq!(view.name, "notes.txt");
        assert_eq!(view.path, "7/1767225600000-notes.txt");
    }

    #[actix_web::test]
    async fn blocking_store_calls_map_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(LocalBucket::new(dir.path()).unwrap());

        let s = store.clone();
        run_blocking(move || s.put("1/1-a.txt", b"hello")).await.unwrap();

        let s = store.clone();
        let bytes = run_blocking(move || s.get("1/1-a.txt")).await.unwrap();
        assert_eq!(bytes, b"hello");

        let s = store.clone();
        let err = run_blocking(move || s.get("1/2-missing.txt")).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[actix_web::test]
    async fn purge_removes_objects_and_skips_bad_keys() {
        let dir = tempfile::tempdir().unwrap();
        let bucket = LocalBucket::new(dir.path()).unwrap();
        bucket.put("4/1-a.txt", b"a").unwrap();
        bucket.put("4/2-b.txt", b"b").unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(bucket);

        let keys = vec!["4/1-a.txt".to_string(), "../escape".to_string(), "4/2-b.txt".to_string()];
        let removed = purge_objects(store.clone(), keys).await.unwrap();

        assert_eq!(removed, 2);
        assert!(store.get("4/1-a.txt").is_err());
        assert!(store.get("4/2-b.txt").is_err());
        assert_eq!(purge_objects(store, Vec::new()).await.unwrap(), 0);
    }

    #[actix_web::test]
    async fn upload_body_is_capped_at_the_limit() {
        let chunks = || {
            futures::stream::iter(vec![
                Ok::<_, std::io::Error>(web::Bytes::from_static(b"abcd")),
                Ok(web::Bytes::from_static(b"efgh")),
            ])
        };

        let body = read_limited(chunks(), 8).await.unwrap();
        assert_eq!(&body[..], b"abcdefgh");

        let err = read_limited(chunks(), 7).await.unwrap_err();
        assert!(matches!(err, ApiError::PayloadTooLarge(7)));
    }

    #[actix_web::test]
    async fn broken_upload_stream_is_a_bad_request() {
        let body = futures::stream::iter(vec![
            Ok(web::Bytes::from_static(b"ab")),
            Err(std::io::Error::other("connection reset")),
        ]);
        let err = read_limited(body, 1024).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
