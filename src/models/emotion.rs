use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Anonymous bucket key. `None` gender/department is its own bucket and only
/// matches `None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateKey {
    pub date: NaiveDate,
    pub emotion: String,
    pub gender: Option<String>,
    pub department: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EmotionAggregate {
    pub id: i64,
    pub date: NaiveDate,
    pub emotion: String,
    pub gender: Option<String>,
    pub department: Option<String>,
    pub count: i32,
    pub confidence: f64,
    pub updated_at: DateTime<Utc>,
}

impl EmotionAggregate {
    pub fn key(&self) -> AggregateKey {
        AggregateKey {
            date: self.date,
            emotion: self.emotion.clone(),
            gender: self.gender.clone(),
            department: self.department.clone(),
        }
    }
}

/// Latest emotion of the day for one employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EmotionRecord {
    pub id: i64,
    pub employee_id: i32,
    pub date: NaiveDate,
    pub emotion: String,
    pub confidence: f64,
    pub updated_at: DateTime<Utc>,
}
