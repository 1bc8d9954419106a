use actix_web::{get, web, HttpRequest, HttpResponse};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::BTreeMap;

use crate::{
    config::Config,
    controllers::{authorize, parse_date},
    models::{
        attendance::AttendanceEntry,
        emotion::EmotionAggregate,
        user::{ApiError, ApiResponse},
    },
    repositories::{
        attendance_repository::AttendanceRepository, emotion_repository::EmotionRepository, StoreError,
    },
};

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionTotal {
    pub count: i32,
    /// Count-weighted mean over all buckets of the emotion.
    pub confidence: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionSummary {
    pub date: NaiveDate,
    pub total_check_ins: i32,
    pub by_emotion: BTreeMap<String, EmotionTotal>,
    pub buckets: Vec<EmotionAggregate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub date: NaiveDate,
    pub present: usize,
    pub records: Vec<AttendanceEntry>,
}

pub fn summarize(date: NaiveDate, buckets: Vec<EmotionAggregate>) -> EmotionSummary {
    let mut sums: BTreeMap<String, (i32, f64)> = BTreeMap::new();
    for bucket in &buckets {
        let entry = sums.entry(bucket.emotion.clone()).or_insert((0, 0.0));
        entry.0 += bucket.count;
        entry.1 += bucket.confidence * bucket.count as f64;
    }

    let by_emotion = sums
        .into_iter()
        .map(|(emotion, (count, weighted))| {
            let confidence = crate::utils::round2(weighted / count.max(1) as f64);
            (emotion, EmotionTotal { count, confidence })
        })
        .collect::<BTreeMap<_, _>>();

    EmotionSummary {
        date,
        total_check_ins: by_emotion.values().map(|total| total.count).sum(),
        by_emotion,
        buckets,
    }
}

fn store_failure(err: StoreError) -> HttpResponse {
    tracing::error!(error = %err, "dashboard query failed");
    match err {
        StoreError::Unavailable(_) => HttpResponse::ServiceUnavailable().json(ApiResponse::<()>::failed(vec![
            ApiError::new("2004", "STORE_UNAVAILABLE"),
        ])),
        _ => HttpResponse::InternalServerError()
            .json(ApiResponse::<()>::failed(vec![ApiError::new("1002", "DATABASE_ERROR")])),
    }
}

#[get("/dashboard/emotions")]
pub async fn get_emotion_summary(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    query: web::Query<DashboardQuery>,
) -> HttpResponse {
    if let Err(response) = authorize(&req, &config.jwt_secret) {
        return response;
    }
    let date = match parse_date(query.date.as_deref()) {
        Ok(date) => date,
        Err(response) => return response,
    };

    let repository = EmotionRepository::new(pool.get_ref().clone());
    match repository.list_aggregates_by_date(date).await {
        Ok(buckets) => HttpResponse::Ok().json(ApiResponse::ok(summarize(date, buckets))),
        Err(e) => store_failure(e),
    }
}

#[get("/dashboard/attendance")]
pub async fn get_attendance_summary(
    req: HttpRequest,
    pool: web::Data<PgPool>,
    config: web::Data<Config>,
    query: web::Query<DashboardQuery>,
) -> HttpResponse {
    if let Err(response) = authorize(&req, &config.jwt_secret) {
        return response;
    }
    let date = match parse_date(query.date.as_deref()) {
        Ok(date) => date,
        Err(response) => return response,
    };

    let repository = AttendanceRepository::new(pool.get_ref().clone());
    match repository.list_by_date(date).await {
        Ok(records) => HttpResponse::Ok().json(ApiResponse::ok(AttendanceSummary {
            date,
            present: records.iter().filter(|r| r.present).count(),
            records,
        })),
        Err(e) => store_failure(e),
    }
}
