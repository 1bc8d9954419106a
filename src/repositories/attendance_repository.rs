use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use crate::models::attendance::{AttendanceEntry, AttendanceRecord, NewAttendanceRecord};
use crate::repositories::StoreError;

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn find_by_employee_and_date(
        &self,
        employee_id: i32,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError>;

    /// Fails with `StoreError::Conflict` when (employee, date) already exists.
    async fn insert(&self, record: NewAttendanceRecord) -> Result<AttendanceRecord, StoreError>;
}

#[derive(Clone)]
pub struct AttendanceRepository {
    pool: PgPool,
}

impl AttendanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<AttendanceEntry>, StoreError> {
        let entries = sqlx::query_as::<_, AttendanceEntry>(
            r#"
            SELECT
                a.id,
                a.employee_id,
                e.name AS employee_name,
                e.department,
                a.date,
                a.recorded_at,
                a.present
            FROM attendance a
            JOIN employees e ON e.id = a.employee_id
            WHERE a.date = $1
            ORDER BY a.recorded_at
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

#[async_trait]
impl AttendanceStore for AttendanceRepository {
    async fn find_by_employee_and_date(
        &self,
        employee_id: i32,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let record = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT id, employee_id, date, recorded_at, gender, age_low, age_high, present
            FROM attendance
            WHERE employee_id = $1 AND date = $2
            "#,
        )
        .bind(employee_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert(&self, record: NewAttendanceRecord) -> Result<AttendanceRecord, StoreError> {
        let record = sqlx::query_as::<_, AttendanceRecord>(
            r#"
            INSERT INTO attendance (employee_id, date, recorded_at, gender, age_low, age_high, present)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, employee_id, date, recorded_at, gender, age_low, age_high, present
            "#,
        )
        .bind(record.employee_id)
        .bind(record.date)
        .bind(record.recorded_at)
        .bind(record.gender)
        .bind(record.age_low)
        .bind(record.age_high)
        .bind(record.present)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }
}
