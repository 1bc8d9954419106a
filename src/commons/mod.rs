pub mod database;
pub mod minio_service;
