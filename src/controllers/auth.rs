use actix_web::{web, HttpRequest, HttpResponse};
use sqlx::PgPool;
use tracing::{info_span, Instrument};
use validator::Validate;

use crate::{
    config::Config,
    controllers::authorize,
    models::user::{ApiError, ApiResponse, AuthResponse, LoginRequest, RegisterRequest},
    services::{
        auth_service::{AuthError, AuthService},
        metrics_service::{endpoint_tags, MetricsService},
    },
};

fn auth_failure(err: &AuthError) -> HttpResponse {
    match err {
        AuthError::UserExists => HttpResponse::UnprocessableEntity().json(ApiResponse::<AuthResponse>::failed(
            vec![ApiError::new("1002", "USER_ALREADY_EXISTS")],
        )),
        AuthError::InvalidCredentials => HttpResponse::UnprocessableEntity().json(
            ApiResponse::<AuthResponse>::failed(vec![ApiError::new("1001", "INVALID_EMAIL_OR_PASSWORD")]),
        ),
        AuthError::Internal(e) => {
            tracing::error!(error = %e, "auth request failed");
            HttpResponse::InternalServerError()
                .json(ApiResponse::<AuthResponse>::failed(vec![ApiError::new("1000", "SYSTEM_ERROR")]))
        }
    }
}

fn metric_error_tag(err: &AuthError) -> &'static str {
    match err {
        AuthError::UserExists => "user_exists",
        AuthError::InvalidCredentials => "invalid_credentials",
        AuthError::Internal(_) => "system_error",
    }
}

/// Anyone may create the first admin; after that only an admin can add another.
fn admit_registration(req: &HttpRequest, jwt_secret: &str, bootstrap: bool) -> Result<(), HttpResponse> {
    if bootstrap {
        return Ok(());
    }
    authorize(req, jwt_secret).map(|_| ())
}

#[actix_web::post("/register")]
async fn register(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    metrics: web::Data<MetricsService>,
    request: web::Json<RegisterRequest>,
) -> HttpResponse {
    let start = std::time::Instant::now();
    let mut tags = endpoint_tags("register");

    if request.validate().is_err() {
        metrics.increment("auth.validation.failed", Some(tags.clone()));
        return HttpResponse::UnprocessableEntity().json(ApiResponse::<AuthResponse>::failed(vec![
            ApiError::new("1001", "INVALID_EMAIL_OR_PASSWORD"),
        ]));
    }

    let auth_service = AuthService::new(pool.get_ref().clone(), config.jwt_secret.clone());

    let bootstrap = match auth_service.is_bootstrap().await {
        Ok(bootstrap) => bootstrap,
        Err(e) => {
            tags.insert("error".to_string(), metric_error_tag(&e).to_string());
            metrics.increment("auth.register.failed", Some(tags));
            return auth_failure(&e);
        }
    };
    if let Err(response) = admit_registration(&req, &config.jwt_secret, bootstrap) {
        tags.insert("error".to_string(), "unauthorized".to_string());
        metrics.increment("auth.register.failed", Some(tags));
        return response;
    }
    if bootstrap {
        tracing::info!("registering the first admin account");
    }

    match auth_service.register(request.into_inner()).await {
        Ok(response) => {
            metrics.increment("auth.register.success", Some(tags.clone()));
            metrics.timing("auth.register.duration", start.elapsed(), Some(tags));
            HttpResponse::Ok().json(ApiResponse::ok(response))
        }
        Err(e) => {
            tags.insert("error".to_string(), metric_error_tag(&e).to_string());
            metrics.increment("auth.register.failed", Some(tags.clone()));
            metrics.timing("auth.register.duration", start.elapsed(), Some(tags));
            auth_failure(&e)
        }
    }
}

#[actix_web::post("/login")]
async fn login(
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    metrics: web::Data<MetricsService>,
    request: web::Json<LoginRequest>,
) -> HttpResponse {
    let span = info_span!("login-api", correlation_id = uuid::Uuid::new_v4().to_string());
    let start = std::time::Instant::now();
    let mut tags = endpoint_tags("login");

    if request.validate().is_err() {
        metrics.increment("auth.validation.failed", Some(tags.clone()));
        return HttpResponse::UnprocessableEntity().json(ApiResponse::<AuthResponse>::failed(vec![
            ApiError::new("1001", "INVALID_EMAIL_OR_PASSWORD"),
        ]));
    }

    let auth_service = AuthService::new(pool.get_ref().clone(), config.jwt_secret.clone());

    match auth_service.login(request.into_inner()).instrument(span).await {
        Ok(response) => {
            metrics.increment("auth.login.success", Some(tags.clone()));
            metrics.timing("auth.login.duration", start.elapsed(), Some(tags));
            HttpResponse::Ok().json(ApiResponse::ok(response))
        }
        Err(e) => {
            tags.insert("error".to_string(), metric_error_tag(&e).to_string());
            metrics.increment("auth.login.failed", Some(tags.clone()));
            metrics.timing("auth.login.duration", start.elapsed(), Some(tags));
            auth_failure(&e)
        }
    }
}
