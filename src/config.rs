use std::env;
use std::time::Duration;

use crate::services::face_matcher::{MatchPolicy, BATCH_SIZE, CANDIDATE_TIMEOUT, EARLY_EXIT_SIMILARITY, MIN_SIMILARITY};

/// Service configuration, loaded from environment variables (and `.env`).
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt_secret: String,

    pub statsd_host: String,
    pub statsd_port: u16,
    pub statsd_prefix: String,

    /// Base URL of the face detection/comparison service.
    pub vision_host: String,
    pub vision_timeout_millis: u64,
    /// Timeout for downloading one reference photo.
    pub image_fetch_timeout_millis: u64,
    pub match_policy: MatchPolicy,

    pub minio_endpoint: String,
    pub minio_access_key: String,
    pub minio_secret_key: String,
    pub minio_bucket_name: String,
    /// Public URL prefix of the bucket, when served behind a different host.
    pub minio_public_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_parse("PORT", 8080),
            database_url: required("DATABASE_URL"),
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 5),
            jwt_secret: required("JWT_SECRET"),

            statsd_host: env::var("STATSD_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            statsd_port: env_parse("STATSD_PORT", 8125),
            statsd_prefix: env::var("STATSD_PREFIX").unwrap_or_else(|_| "mood_attendance".to_string()),

            vision_host: required("VISION_HOST"),
            vision_timeout_millis: env_parse("VISION_TIMEOUT_MILLIS", 8_000),
            image_fetch_timeout_millis: env_parse("IMAGE_FETCH_TIMEOUT_MILLIS", 5_000),
            match_policy: MatchPolicy {
                batch_size: env_parse("MATCH_BATCH_SIZE", BATCH_SIZE),
                min_similarity: env_parse("MATCH_MIN_SIMILARITY", MIN_SIMILARITY),
                early_exit_similarity: env_parse("MATCH_EARLY_EXIT_SIMILARITY", EARLY_EXIT_SIMILARITY),
                candidate_timeout: Duration::from_millis(env_parse(
                    "MATCH_CANDIDATE_TIMEOUT_MILLIS",
                    CANDIDATE_TIMEOUT.as_millis() as u64,
                )),
            },

            minio_endpoint: required("MINIO_ENDPOINT"),
            minio_access_key: required("MINIO_ACCESS_KEY"),
            minio_secret_key: required("MINIO_SECRET_KEY"),
            minio_bucket_name: required("MINIO_BUCKET_NAME"),
            minio_public_url: env::var("MINIO_PUBLIC_URL").ok(),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn required(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{} must be set", key))
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, "invalid value, using default");
            default
        }),
        Err(_) => default,
    }
}
