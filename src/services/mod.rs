pub mod attendance_reconciler;
pub mod auth_service;
pub mod emotion_aggregator;
pub mod face_matcher;
pub mod image_fetcher;
pub mod metrics_service;
pub mod vision_service;
