use actix_web::{HttpRequest, HttpResponse};
use chrono::{NaiveDate, Utc};

use crate::{
    models::user::{ApiError, ApiResponse},
    utils::{validate_token, Claims},
};

pub mod auth;
pub mod dashboard;
pub mod employees;

pub const TOKEN_HEADER: &str = "x-user-token";

/// Admin claims from the `x-user-token` header, or the 401 to return.
pub fn authorize(req: &HttpRequest, jwt_secret: &str) -> Result<Claims, HttpResponse> {
    req.headers()
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|token| validate_token(token, jwt_secret).ok())
        .ok_or_else(|| {
            HttpResponse::Unauthorized().json(ApiResponse::<()>::failed(vec![ApiError::new(
                "401",
                "MISSING_OR_INVALID_TOKEN",
            )]))
        })
}

/// `YYYY-MM-DD`, defaulting to today (UTC).
pub fn parse_date(value: Option<&str>) -> Result<NaiveDate, HttpResponse> {
    match value {
        None => Ok(Utc::now().date_naive()),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
            HttpResponse::BadRequest().json(ApiResponse::<()>::failed(vec![ApiError::new(
                "1003",
                format!("INVALID_DATE: {}", raw),
            )]))
        }),
    }
}
