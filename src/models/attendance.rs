use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: i64,
    pub employee_id: i32,
    pub date: NaiveDate,
    pub recorded_at: DateTime<Utc>,
    pub gender: Option<String>,
    pub age_low: Option<i32>,
    pub age_high: Option<i32>,
    pub present: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAttendanceRecord {
    pub employee_id: i32,
    pub date: NaiveDate,
    pub recorded_at: DateTime<Utc>,
    pub gender: Option<String>,
    pub age_low: Option<i32>,
    pub age_high: Option<i32>,
    pub present: bool,
}

/// Attendance row joined with the employee's name, for the dashboard.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEntry {
    pub id: i64,
    pub employee_id: i32,
    pub employee_name: String,
    pub department: Option<String>,
    pub date: NaiveDate,
    pub recorded_at: DateTime<Utc>,
    pub present: bool,
}
