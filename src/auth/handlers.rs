use crate::{
    api::settings::ensure_defaults,
    auth::{
        extractor::{AuthUser, bearer_token},
        jwt::{Subject, generate_access_token, generate_refresh_token, generate_reset_token, verify_token},
        password::{hash_password, verify_password},
    },
    config::Config,
    db::is_duplicate_key,
    error::ApiError,
    model::{role::Role, user::User},
    models::{
        ChangePasswordReq, Claims, ForgotPasswordReq, LoginReqDto, ResetPasswordReq, SignUpReq,
        TokenPair, TokenType,
    },
    utils::{
        email_registry::{EmailRegistry, normalize},
        validation,
    },
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument, warn};

fn hash(password: &str) -> Result<String, ApiError> {
    hash_password(password).map_err(|e| {
        error!(error = %e, "Failed to hash password");
        ApiError::Internal
    })
}

fn token_error(e: jsonwebtoken::errors::Error) -> ApiError {
    error!(error = %e, "Failed to sign token");
    ApiError::Internal
}

async fn find_user_by_email(pool: &MySqlPool, email: &str) -> Result<Option<User>, ApiError> {
    sqlx::query_as::<_, User>(
        "SELECT id, email, password, role_id, created_at, last_login_at FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
    .map_err(ApiError::db("Failed to fetch user"))
}

async fn find_user(pool: &MySqlPool, id: u64) -> Result<User, ApiError> {
    sqlx::query_as::<_, User>(
        "SELECT id, email, password, role_id, created_at, last_login_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(ApiError::db("Failed to fetch user"))?
    .ok_or_else(|| ApiError::not_found("Account"))
}

async fn store_refresh_token(pool: &MySqlPool, claims: &Claims) -> Result<(), ApiError> {
    sqlx::query("INSERT INTO refresh_tokens (user_id, jti, expires_at) VALUES (?, ?, FROM_UNIXTIME(?))")
        .bind(claims.user_id)
        .bind(&claims.jti)
        .bind(claims.exp as i64)
        .execute(pool)
        .await
        .map_err(ApiError::db("Failed to store refresh token"))?;
    Ok(())
}

fn issue_pair(subject: &Subject<'_>, config: &Config) -> Result<(TokenPair, Claims), ApiError> {
    let access_token =
        generate_access_token(subject, &config.jwt_secret, config.access_token_ttl).map_err(token_error)?;
    let (refresh_token, claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl).map_err(token_error)?;

    Ok((TokenPair { access_token, refresh_token }, claims))
}

/// Decodes a bearer token of the given type, rejecting everything else.
fn claims_of(token: &str, expected: TokenType, config: &Config) -> Result<Claims, ApiError> {
    let claims = verify_token(token, &config.jwt_secret)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;
    if claims.token_type != expected {
        return Err(ApiError::Unauthorized("Wrong token type".into()));
    }
    Ok(claims)
}

pub fn reset_link(base_url: &str, token: &str) -> String {
    format!("{}/auth?mode=reset&token={}", base_url.trim_end_matches('/'), token)
}

#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignUpReq,
    responses(
        (status = 201, description = "Account created"),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Email already registered")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_signup", skip_all)]
pub async fn signup(
    payload: web::Json<SignUpReq>,
    pool: web::Data<MySqlPool>,
    registry: web::Data<EmailRegistry>,
) -> actix_web::Result<impl Responder> {
    let email = normalize(&payload.email);
    validation::email("email", &email)?;
    validation::new_password(&payload.password, &payload.confirm_password)?;

    if !registry.is_available(&email, pool.get_ref()).await {
        return Err(ApiError::Conflict("Email already registered".into()).into());
    }

    let hashed = hash(&payload.password)?;

    let result = sqlx::query("INSERT INTO users (email, password, role_id) VALUES (?, ?, ?)")
        .bind(&email)
        .bind(&hashed)
        .bind(Role::Hr.id())
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            if is_duplicate_key(&e) {
                ApiError::Conflict("Email already registered".into())
            } else {
                ApiError::db("Failed to create account")(e)
            }
        })?;

    let user_id = result.last_insert_id();
    registry.record(&email).await;

    if let Err(e) = ensure_defaults(pool.get_ref(), user_id).await {
        // the settings endpoint creates the row lazily as well
        warn!(user_id, error = %e, "Failed to create default settings");
    }

    info!(user_id, "Account created");

    Ok(HttpResponse::Created().json(json!({
        "message": "Account created",
        "id": user_id
    })))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Signed in", body = TokenPair),
        (status = 400, description = "Missing email or password"),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, payload),
    fields(email = %payload.email)
)]
pub async fn login(
    payload: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    info!("Login request received");

    let email = normalize(&payload.email);
    if email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::bad_request("Email and password are required").into());
    }

    let invalid = || ApiError::Unauthorized("Invalid credentials".into());

    let Some(user) = find_user_by_email(pool.get_ref(), &email).await? else {
        info!("Invalid credentials: account not found");
        return Err(invalid().into());
    };

    if let Err(e) = verify_password(&payload.password, &user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return Err(invalid().into());
    }

    debug!(user_id = user.id, "Password verified");

    let subject = Subject {
        user_id: user.id,
        email: &user.email,
        role: user.role_id,
    };
    let (pair, refresh_claims) = issue_pair(&subject, &config)?;
    store_refresh_token(pool.get_ref(), &refresh_claims).await?;

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(user.id)
        .execute(pool.get_ref())
        .await
    {
        // not fatal for the sign-in itself
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = user.id, "Login successful");
    Ok(HttpResponse::Ok().json(pair))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Rotated token pair", body = TokenPair),
        (status = 401, description = "Refresh token missing, invalid or revoked")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    let header = req.headers().get("Authorization").and_then(|h| h.to_str().ok());
    let claims = claims_of(bearer_token(header)?, TokenType::Refresh, &config)?;

    // revoke-on-use: only the first refresh with a given jti wins
    let revoked = sqlx::query(
        "UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ? AND revoked = FALSE AND expires_at > NOW()",
    )
    .bind(&claims.jti)
    .execute(pool.get_ref())
    .await
    .map_err(ApiError::db("Failed to revoke refresh token"))?;

    if revoked.rows_affected() == 0 {
        warn!(user_id = claims.user_id, "Refresh with unknown or revoked token");
        return Err(ApiError::Unauthorized("Refresh token revoked".into()).into());
    }

    let subject = Subject {
        user_id: claims.user_id,
        email: &claims.sub,
        role: claims.role,
    };
    let (pair, new_claims) = issue_pair(&subject, &config)?;
    store_refresh_token(pool.get_ref(), &new_claims).await?;

    Ok(HttpResponse::Ok().json(pair))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Refresh token revoked if it was valid")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(req: HttpRequest, pool: web::Data<MySqlPool>, config: web::Data<Config>) -> impl Responder {
    let header = req.headers().get("Authorization").and_then(|h| h.to_str().ok());

    let claims = match bearer_token(header).and_then(|t| claims_of(t, TokenType::Refresh, &config)) {
        Ok(claims) => claims,
        Err(_) => return HttpResponse::NoContent().finish(),
    };

    // idempotent
    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
    }

    HttpResponse::NoContent().finish()
}

#[utoipa::path(
    post,
    path = "/auth/password/forgot",
    request_body = ForgotPasswordReq,
    responses((status = 202, description = "Reset link issued if the account exists")),
    tag = "Auth"
)]
#[instrument(name = "auth_forgot_password", skip_all)]
pub async fn forgot_password(
    payload: web::Json<ForgotPasswordReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    let accepted = || {
        HttpResponse::Accepted().json(json!({
            "message": "If the account exists, a reset link has been sent"
        }))
    };

    let email = normalize(&payload.email);
    if !validation::is_valid_email(&email) {
        return Ok(accepted());
    }

    let Some(user) = find_user_by_email(pool.get_ref(), &email).await? else {
        debug!("Reset requested for unknown account");
        return Ok(accepted());
    };

    let subject = Subject {
        user_id: user.id,
        email: &user.email,
        role: user.role_id,
    };
    let (token, claims) =
        generate_reset_token(&subject, &config.jwt_secret, config.reset_token_ttl).map_err(token_error)?;

    sqlx::query("INSERT INTO password_resets (user_id, jti, expires_at) VALUES (?, ?, FROM_UNIXTIME(?))")
        .bind(user.id)
        .bind(&claims.jti)
        .bind(claims.exp as i64)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::db("Failed to store reset token"))?;

    // no mailer yet, the link goes to the log
    info!(user_id = user.id, link = %reset_link(&config.app_base_url, &token), "Password reset link issued");

    Ok(accepted())
}

#[utoipa::path(
    post,
    path = "/auth/password/reset",
    request_body = ResetPasswordReq,
    responses(
        (status = 200, description = "Password updated"),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Reset token invalid, expired or used")
    ),
    tag = "Auth"
)]
#[instrument(name = "auth_reset_password", skip_all)]
pub async fn reset_password(
    payload: web::Json<ResetPasswordReq>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    validation::new_password(&payload.password, &payload.confirm_password)?;
    let claims = claims_of(payload.token.trim(), TokenType::Reset, &config)?;
    let hashed = hash(&payload.password)?;

    let mut tx = pool
        .begin()
        .await
        .map_err(ApiError::db("Failed to start transaction"))?;

    let used = sqlx::query(
        r#"
        UPDATE password_resets
        SET used = TRUE
        WHERE jti = ? AND user_id = ? AND used = FALSE AND expires_at > NOW()
        "#,
    )
    .bind(&claims.jti)
    .bind(claims.user_id)
    .execute(&mut *tx)
    .await
    .map_err(ApiError::db("Failed to consume reset token"))?;

    if used.rows_affected() == 0 {
        return Err(ApiError::Unauthorized("Reset link is invalid or has expired".into()).into());
    }

    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(&hashed)
        .bind(claims.user_id)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::db("Failed to update password"))?;

    sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = ?")
        .bind(claims.user_id)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::db("Failed to revoke sessions"))?;

    tx.commit()
        .await
        .map_err(ApiError::db("Failed to commit password reset"))?;

    info!(user_id = claims.user_id, "Password reset");
    Ok(HttpResponse::Ok().json(json!({ "message": "Password updated" })))
}

#[utoipa::path(
    put,
    path = "/api/account/password",
    request_body = ChangePasswordReq,
    responses(
        (status = 200, description = "Password changed"),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Current password is wrong")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn change_password(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<ChangePasswordReq>,
) -> actix_web::Result<impl Responder> {
    validation::new_password(&payload.new_password, &payload.confirm_password)?;

    let user = find_user(pool.get_ref(), auth.user_id).await?;
    if verify_password(&payload.current_password, &user.password).is_err() {
        return Err(ApiError::Unauthorized("Current password is incorrect".into()).into());
    }

    let hashed = hash(&payload.new_password)?;
    sqlx::query("UPDATE users SET password = ? WHERE id = ?")
        .bind(&hashed)
        .bind(user.id)
        .execute(pool.get_ref())
        .await
        .map_err(ApiError::db("Failed to update password"))?;

    info!(user_id = user.id, "Password changed");
    Ok(HttpResponse::Ok().json(json!({ "message": "Password changed" })))
}

#[utoipa::path(
    get,
    path = "/api/account",
    responses(
        (status = 200, description = "Signed-in account", body = Object, example = json!({
            "id": 1,
            "email": "hr@aziteck.com",
            "role": "hr"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn account(auth: AuthUser, pool: web::Data<MySqlPool>) -> actix_web::Result<impl Responder> {
    let user = find_user(pool.get_ref(), auth.user_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "id": user.id,
        "email": user.email,
        "role": auth.role,
        "created_at": user.created_at,
        "last_login_at": user.last_login_at,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode};
    use actix_web::test::{TestRequest, call_service, init_service};

    #[test]
    fn reset_link_points_at_client() {
        assert_eq!(
            reset_link("https://hr.example.com/", "abc"),
            "https://hr.example.com/auth?mode=reset&token=abc"
        );
    }

    #[test]
    fn only_expected_token_type_is_accepted() {
        let config = Config::for_tests();
        let subject = Subject {
            user_id: 3,
            email: "hr@aziteck.com",
            role: Role::Hr.id(),
        };
        let access = generate_access_token(&subject, &config.jwt_secret, 60).unwrap();
        let (reset, _) = generate_reset_token(&subject, &config.jwt_secret, 60).unwrap();

        assert!(claims_of(&access, TokenType::Reset, &config).is_err());
        let claims = claims_of(&reset, TokenType::Reset, &config).unwrap();
        assert_eq!(claims.user_id, 3);
    }

    #[test]
    fn issued_pair_is_signed_with_config_secret() {
        let config = Config::for_tests();
        let subject = Subject {
            user_id: 9,
            email: "admin@aziteck.com",
            role: Role::Admin.id(),
        };
        let (pair, refresh) = issue_pair(&subject, &config).unwrap();

        assert_eq!(refresh.token_type, TokenType::Refresh);
        assert!(claims_of(&pair.access_token, TokenType::Access, &config).is_ok());
        assert!(claims_of(&pair.refresh_token, TokenType::Access, &config).is_err());
    }

    #[actix_web::test]
    async fn logout_without_token_is_still_no_content() {
        let pool = sqlx::mysql::MySqlPoolOptions::new()
            .connect_lazy("mysql://localhost/hr_portal_test")
            .unwrap();
        let app = init_service(
            App::new()
                .app_data(web::Data::new(pool))
                .app_data(web::Data::new(Config::for_tests()))
                .route("/auth/logout", web::post().to(logout)),
        )
        .await;

        let req = TestRequest::post().uri("/auth/logout").to_request();
        let resp = call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }
}
