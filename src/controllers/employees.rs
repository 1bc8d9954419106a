use actix_web::{web, HttpRequest, HttpResponse};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    commons::minio_service::{sniff_image_type, MinioService},
    config::Config,
    controllers::authorize,
    models::{
        employee::{CreateEmployeeRequest, Employee},
        user::{ApiError, ApiResponse},
    },
    repositories::{employee_repository::EmployeeRepository, StoreError},
    services::metrics_service::{endpoint_tags, MetricsService},
    utils::decode_image,
};

fn bad_request(cause: String) -> HttpResponse {
    HttpResponse::BadRequest().json(ApiResponse::<()>::failed(vec![ApiError::new("1003", cause)]))
}

fn store_failure(err: StoreError) -> HttpResponse {
    tracing::error!(error = %err, "employee query failed");
    match err {
        StoreError::Unavailable(_) => HttpResponse::ServiceUnavailable().json(ApiResponse::<()>::failed(vec![
            ApiError::new("2004", "STORE_UNAVAILABLE"),
        ])),
        _ => HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::failed(vec![ApiError::new("1002", "DATABASE_ERROR")])),
    }
}

/// Decoded photo bytes and their content type.
fn parse_photo(payload: &str) -> Result<(Vec<u8>, &'static str), String> {
    let content = decode_image(payload).map_err(|e| format!("INVALID_PHOTO: {}", e))?;
    let content_type = sniff_image_type(&content).ok_or_else(|| "INVALID_PHOTO: expected JPEG or PNG".to_string())?;
    Ok((content, content_type))
}

#[actix_web::post("/employees")]
async fn create_employee(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    minio_service: web::Data<MinioService>,
    metrics: web::Data<MetricsService>,
    body: Result<web::Json<CreateEmployeeRequest>, actix_web::Error>,
) -> HttpResponse {
    if let Err(response) = authorize(&req, &config.jwt_secret) {
        return response;
    }
    let start = std::time::Instant::now();
    let tags = endpoint_tags("create_employee");

    let body = match body {
        Ok(b) => b.into_inner(),
        Err(e) => return bad_request(format!("INVALID_REQUEST_BODY: {}", e)),
    };
    if let Err(e) = body.validate() {
        metrics.increment("employees.validation.failed", Some(tags.clone()));
        return bad_request(format!("INVALID_REQUEST_BODY: {}", e));
    }

    let photo_url = match body.photo.as_deref().map(parse_photo).transpose() {
        Ok(None) => None,
        Ok(Some((content, content_type))) => match minio_service.upload_photo(content, content_type).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::error!(error = %e, "employee photo upload failed");
                metrics.increment("employees.create.failed", Some(tags.clone()));
                return HttpResponse::InternalServerError().json(ApiResponse::<()>::failed(vec![
                    ApiError::new("1001", "PHOTO_UPLOAD_FAILED"),
                ]));
            }
        },
        Err(cause) => return bad_request(cause),
    };

    let repository = EmployeeRepository::new(pool.get_ref().clone());
    let created = repository
        .create(
            &body.name,
            body.gender.as_deref(),
            body.age,
            body.department.as_deref(),
            photo_url.as_deref(),
        )
        .await;

    match created {
        Ok(employee) => {
            tracing::info!(employee_id = employee.id, has_photo = employee.photo_url.is_some(), "employee enrolled");
            metrics.increment("employees.create.success", Some(tags.clone()));
            metrics.timing("employees.create.duration", start.elapsed(), Some(tags));
            HttpResponse::Created().json(ApiResponse::<Employee>::ok(employee))
        }
        Err(e) => {
            metrics.increment("employees.create.failed", Some(tags));
            store_failure(e)
        }
    }
}

#[actix_web::get("/employees")]
async fn list_employees(req: HttpRequest, pool: web::Data<PgPool>, config: web::Data<Config>) -> HttpResponse {
    if let Err(response) = authorize(&req, &config.jwt_secret) {
        return response;
    }

    match EmployeeRepository::new(pool.get_ref().clone()).list_all().await {
        Ok(employees) => HttpResponse::Ok().json(ApiResponse::ok(employees)),
        Err(e) => store_failure(e),
    }
}

#[actix_web::delete("/employees/{id}")]
async fn delete_employee(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    minio_service: web::Data<MinioService>,
    path: web::Path<i32>,
) -> HttpResponse {
    if let Err(response) = authorize(&req, &config.jwt_secret) {
        return response;
    }
    let id = path.into_inner();

    match EmployeeRepository::new(pool.get_ref().clone()).delete(id).await {
        Ok(Some(employee)) => {
            if let Some(url) = employee.photo_url.as_deref() {
                // The row is gone either way; a stale object is only logged.
                if let Err(e) = minio_service.delete_photo(url).await {
                    tracing::warn!(employee_id = id, error = %e, "employee photo cleanup failed");
                }
            }
            HttpResponse::Ok().json(ApiResponse::ok(employee))
        }
        Ok(None) => HttpResponse::NotFound().json(ApiResponse::<()>::failed(vec![ApiError::new(
            "1004",
            "EMPLOYEE_NOT_FOUND",
        )])),
        Err(e) => store_failure(e),
    }
}
