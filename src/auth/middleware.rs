use crate::auth::extractor::{authenticate, bearer_token};
use crate::config::Config;
use crate::error::ApiError;
use actix_web::middleware::Next;
use actix_web::{
    Error, HttpMessage, ResponseError,
    body::BoxBody,
    dev::{ServiceRequest, ServiceResponse},
    web::Data,
};
use tracing::debug;

pub async fn auth_middleware(
    req: ServiceRequest,
    next: Next<BoxBody>,
) -> Result<ServiceResponse<BoxBody>, Error> {
    let config = req
        .app_data::<Data<Config>>()
        .ok_or(ApiError::Internal)?
        .clone();

    let header = req.headers().get("Authorization").and_then(|h| h.to_str().ok());

    let auth_user = match bearer_token(header).and_then(|t| authenticate(t, &config.jwt_secret)) {
        Ok(user) => user,
        Err(e) => {
            debug!(path = %req.path(), reason = %e, "Rejected unauthenticated request");
            let resp = e.error_response();
            return Ok(req.into_response(resp));
        }
    };

    req.extensions_mut().insert(auth_user);

    next.call(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::extractor::AuthUser;
    use crate::auth::jwt::{Subject, generate_access_token};
    use actix_web::{App, HttpResponse, http::StatusCode, middleware::from_fn, web};
    use actix_web::test::{TestRequest, call_and_read_body, call_service, init_service};

    async fn whoami(user: AuthUser) -> HttpResponse {
        HttpResponse::Ok().body(user.email)
    }

    fn app_config() -> Config {
        Config::for_tests()
    }

    #[actix_web::test]
    async fn missing_header_is_401() {
        let app = init_service(
            App::new()
                .app_data(Data::new(app_config()))
                .service(web::scope("/api").wrap(from_fn(auth_middleware)).route("/me", web::get().to(whoami))),
        )
        .await;

        let resp = call_service(&app, TestRequest::get().uri("/api/me").to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn valid_access_token_reaches_handler() {
        let config = app_config();
        let token = generate_access_token(
            &Subject {
                user_id: 1,
                email: "hr@aziteck.com",
                role: 2,
            },
            &config.jwt_secret,
            60,
        )
        .unwrap();

        let app = init_service(
            App::new()
                .app_data(Data::new(config))
                .service(web::scope("/api").wrap(from_fn(auth_middleware)).route("/me", web::get().to(whoami))),
        )
        .await;

        let req = TestRequest::get()
            .uri("/api/me")
            .insert_header(("Authorization", format!("Bearer {token}")))
            .to_request();
        let body = call_and_read_body(&app, req).await;
        assert_eq!(body, "hr@aziteck.com");
    }
}
