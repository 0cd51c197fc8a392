use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::ApiError;
use crate::model::role::Role;
use crate::models::TokenType;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub role: Role,
}

/// Pulls the token out of an `Authorization: Bearer ...` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, ApiError> {
    let header = header.ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".into()))?;
    header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("Authorization header must start with Bearer".into()))
}

/// Validates an access token and turns its claims into an [`AuthUser`].
pub fn authenticate(token: &str, secret: &str) -> Result<AuthUser, ApiError> {
    let claims = verify_token(token, secret)
        .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;

    if claims.token_type != TokenType::Access {
        return Err(ApiError::Unauthorized("Access token required".into()));
    }

    let role = Role::from_id(claims.role).ok_or_else(|| ApiError::Unauthorized("Invalid role".into()))?;

    Ok(AuthUser {
        user_id: claims.user_id,
        email: claims.sub,
        role,
    })
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // Set by auth_middleware on the protected scope
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let Some(config) = req.app_data::<Data<Config>>() else {
            return ready(Err(ApiError::Internal.into()));
        };

        let header = req.headers().get("Authorization").and_then(|h| h.to_str().ok());
        let result = bearer_token(header).and_then(|token| authenticate(token, &config.jwt_secret));

        ready(result.map_err(Into::into))
    }
}

impl AuthUser {
    pub fn require_hr_or_admin(&self) -> Result<(), ApiError> {
        if matches!(self.role, Role::Admin | Role::Hr) {
            Ok(())
        } else {
            Err(ApiError::Forbidden("HR/Admin only".into()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::{Subject, generate_access_token, generate_refresh_token};

    fn subject(role: Role) -> Subject<'static> {
        Subject {
            user_id: 3,
            email: "hr@aziteck.com",
            role: role.id(),
        }
    }

    #[test]
    fn bearer_prefix_is_required() {
        assert!(bearer_token(None).is_err());
        assert!(bearer_token(Some("Token abc")).is_err());
        assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
    }

    #[test]
    fn refresh_token_cannot_authenticate_requests() {
        let (token, _) = generate_refresh_token(&subject(Role::Hr), "secret", 60).unwrap();
        assert!(matches!(authenticate(&token, "secret"), Err(ApiError::Unauthorized(_))));
    }

    #[test]
    fn role_guards() {
        let token = generate_access_token(&subject(Role::Employee), "secret", 60).unwrap();
        let user = authenticate(&token, "secret").unwrap();
        assert!(matches!(user.require_hr_or_admin(), Err(ApiError::Forbidden(_))));

        let token = generate_access_token(&subject(Role::Hr), "secret", 60).unwrap();
        let user = authenticate(&token, "secret").unwrap();
        assert!(user.require_hr_or_admin().is_ok());

        let token = generate_access_token(&subject(Role::Admin), "secret", 60).unwrap();
        let user = authenticate(&token, "secret").unwrap();
        assert!(user.require_hr_or_admin().is_ok());
    }
}
