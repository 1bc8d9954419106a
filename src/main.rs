use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::attendance::attendance_service::AttendanceService;
use crate::config::Config;
use crate::repositories::{
    attendance_repository::AttendanceRepository, emotion_repository::EmotionRepository,
    employee_repository::EmployeeRepository,
};
use crate::services::{
    attendance_reconciler::AttendanceReconciler, emotion_aggregator::EmotionAggregator, face_matcher::FaceMatcher,
    image_fetcher::HttpImageFetcher, metrics_service::MetricsService, vision_service::HttpVisionGateway,
};

mod attendance;
mod commons;
mod config;
mod controllers;
mod models;
mod repositories;
mod services;
mod utils;

#[cfg(test)]
mod testing;

/// Captured photos arrive base64-encoded in the JSON body.
const JSON_BODY_LIMIT: usize = 10 * 1024 * 1024;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    // Initialize tracing with JSON format
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let config = Config::from_env();
    let bind_address = config.bind_address();

    let pool = commons::database::pool(&config.database_url, config.database_max_connections)
        .await
        .expect("Failed to create pool");
    commons::database::migrate(pool)
        .await
        .expect("Failed to run database migrations");

    let metrics_service = MetricsService::new(&config.statsd_host, config.statsd_port, &config.statsd_prefix)
        .expect("Failed to initialize statsd client");

    let vision = Arc::new(
        HttpVisionGateway::new(
            config.vision_host.clone(),
            config.vision_timeout_millis,
            metrics_service.clone(),
        )
        .expect("Failed to initialize vision client"),
    );
    let fetcher =
        Arc::new(HttpImageFetcher::new(config.image_fetch_timeout_millis).expect("Failed to initialize image fetcher"));

    let employees = Arc::new(EmployeeRepository::new(pool.clone()));
    let emotions = Arc::new(EmotionRepository::new(pool.clone()));

    let attendance_service = web::Data::new(AttendanceService::new(
        vision.clone(),
        employees,
        FaceMatcher::new(vision, fetcher, config.match_policy),
        AttendanceReconciler::new(Arc::new(AttendanceRepository::new(pool.clone()))),
        EmotionAggregator::new(emotions.clone(), emotions),
    ));

    let minio_service = web::Data::new(
        commons::minio_service::MinioService::new(
            &config.minio_endpoint,
            &config.minio_access_key,
            &config.minio_secret_key,
            &config.minio_bucket_name,
            config.minio_public_url.as_deref(),
        )
        .await
        .expect("Failed to initialize MinIO service"),
    );

    tracing::info!(address = %bind_address, "starting mood attendance service");

    let pool = web::Data::new(pool.clone());
    let config = web::Data::new(config);
    let metrics_service = web::Data::new(metrics_service);

    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(web::JsonConfig::default().limit(JSON_BODY_LIMIT))
            .app_data(pool.clone())
            .app_data(config.clone())
            .app_data(metrics_service.clone())
            .app_data(attendance_service.clone())
            .app_data(minio_service.clone())
            .service(
                web::scope("/v1")
                    .service(controllers::auth::register)
                    .service(controllers::auth::login)
                    .service(attendance::attendance_controller::submit_attendance)
                    .service(controllers::employees::create_employee)
                    .service(controllers::employees::list_employees)
                    .service(controllers::employees::delete_employee)
                    .service(controllers::dashboard::get_emotion_summary)
                    .service(controllers::dashboard::get_attendance_summary),
            )
    })
    .bind(bind_address)?
    .run()
    .await
}
