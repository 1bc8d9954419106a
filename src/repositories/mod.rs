use thiserror::Error;

pub mod attendance_repository;
pub mod emotion_repository;
pub mod employee_repository;
pub mod user_repository;

const UNIQUE_VIOLATION: &str = "23505";
const UNDEFINED_TABLE: &str = "42P01";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let code = match &err {
            sqlx::Error::Database(db) => db.code().map(|code| code.into_owned()),
            _ => None,
        };
        match &err {
            sqlx::Error::Database(db) if code.as_deref() == Some(UNIQUE_VIOLATION) => {
                StoreError::Conflict(db.message().to_string())
            }
            sqlx::Error::Database(db) if code.as_deref() == Some(UNDEFINED_TABLE) => {
                StoreError::Unavailable(db.message().to_string())
            }
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Database(err),
        }
    }
}
