use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: i32,
    pub name: String,
    pub gender: Option<String>,
    pub age: Option<i32>,
    pub department: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEmployeeRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: String,
    pub gender: Option<String>,
    #[validate(range(min = 14, max = 120, message = "Age out of range"))]
    pub age: Option<i32>,
    pub department: Option<String>,
    /// Base64 image, optionally as a `data:image/...;base64,` URL.
    pub photo: Option<String>,
}
