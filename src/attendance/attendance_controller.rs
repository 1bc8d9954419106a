use actix_web::{web, HttpResponse};
use tracing::{info_span, Instrument};

use crate::{
    attendance::{
        attendance_service::{AttendanceError, AttendanceService},
        dto::attendance_response::{AttendanceStatus, AttendanceSubmission, SubmitAttendanceBody},
    },
    models::user::{ApiError, ApiResponse},
    services::metrics_service::{endpoint_tags, MetricsService},
    utils::decode_image,
};

#[actix_web::post("/attendance")]
async fn submit_attendance(
    attendance_service: web::Data<AttendanceService>,
    metrics: web::Data<MetricsService>,
    body: Result<web::Json<SubmitAttendanceBody>, actix_web::Error>,
) -> HttpResponse {
    let start = std::time::Instant::now();
    let mut tags = endpoint_tags("attendance");

    let body = match body {
        Ok(b) => b,
        Err(e) => {
            metrics.increment("attendance.validation.failed", Some(tags.clone()));
            return HttpResponse::BadRequest().json(ApiResponse::<()>::failed(vec![ApiError::new(
                "1003",
                format!("INVALID_REQUEST_BODY: {}", e),
            )]));
        }
    };

    let image = match decode_image(&body.image) {
        Ok(image) => image,
        Err(e) => {
            let err = AttendanceError::InvalidImage(e.to_string());
            metrics.increment("attendance.validation.failed", Some(tags.clone()));
            return HttpResponse::build(err.status_code())
                .json(ApiResponse::<()>::failed(vec![err.to_api_error()]));
        }
    };

    let span = info_span!("attendance-api", correlation_id = uuid::Uuid::new_v4().to_string());
    let result = attendance_service.submit(image).instrument(span).await;

    match result {
        Ok(submission) => {
            let metric = match submission.status {
                AttendanceStatus::Recorded => "attendance.recorded",
                AttendanceStatus::AlreadyRecorded => "attendance.already_recorded",
            };
            metrics.increment(metric, Some(tags.clone()));
            metrics.gauge("attendance.similarity", submission.similarity, Some(tags.clone()));
            metrics.timing("attendance.duration", start.elapsed(), Some(tags));
            HttpResponse::Ok().json(ApiResponse::<AttendanceSubmission>::ok(submission))
        }
        Err(e) => {
            match &e {
                AttendanceError::Vision(_) | AttendanceError::Store(_) | AttendanceError::StoreUnavailable(_) => {
                    tracing::error!(error = %e, "attendance submission failed")
                }
                _ => tracing::info!(error = %e, "attendance submission rejected"),
            }
            tags.insert("error".to_string(), e.kind().to_string());
            metrics.increment("attendance.failed", Some(tags.clone()));
            metrics.timing("attendance.duration", start.elapsed(), Some(tags));
            HttpResponse::build(e.status_code()).json(ApiResponse::<()>::failed(vec![e.to_api_error()]))
        }
    }
}
