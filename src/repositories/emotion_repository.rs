use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use crate::models::emotion::{AggregateKey, EmotionAggregate, EmotionRecord};
use crate::repositories::StoreError;

#[async_trait]
pub trait EmotionAggregateStore: Send + Sync {
    /// Exact key lookup. A `None` gender or department only matches `None`.
    async fn find_aggregate(&self, key: &AggregateKey) -> Result<Option<EmotionAggregate>, StoreError>;

    async fn insert_aggregate(
        &self,
        key: &AggregateKey,
        count: i32,
        confidence: f64,
        at: DateTime<Utc>,
    ) -> Result<EmotionAggregate, StoreError>;

    /// Writes the folded values only while the row still holds
    /// `expected_count`; `None` means another fold got there first.
    async fn update_aggregate(
        &self,
        id: i64,
        expected_count: i32,
        count: i32,
        confidence: f64,
        at: DateTime<Utc>,
    ) -> Result<Option<EmotionAggregate>, StoreError>;
}

#[async_trait]
pub trait EmployeeEmotionStore: Send + Sync {
    async fn find_employee_emotion(
        &self,
        employee_id: i32,
        date: NaiveDate,
    ) -> Result<Option<EmotionRecord>, StoreError>;

    async fn insert_employee_emotion(
        &self,
        employee_id: i32,
        date: NaiveDate,
        emotion: &str,
        confidence: f64,
        at: DateTime<Utc>,
    ) -> Result<EmotionRecord, StoreError>;

    async fn update_employee_emotion(
        &self,
        id: i64,
        emotion: &str,
        confidence: f64,
        at: DateTime<Utc>,
    ) -> Result<EmotionRecord, StoreError>;
}

#[derive(Clone)]
pub struct EmotionRepository {
    pool: PgPool,
}

impl EmotionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_aggregates_by_date(&self, date: NaiveDate) -> Result<Vec<EmotionAggregate>, StoreError> {
        let aggregates = sqlx::query_as::<_, EmotionAggregate>(
            r#"
            SELECT id, date, emotion, gender, department, count, confidence, updated_at
            FROM emotion_aggregates
            WHERE date = $1
            ORDER BY count DESC, emotion
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(aggregates)
    }
}

#[async_trait]
impl EmotionAggregateStore for EmotionRepository {
    async fn find_aggregate(&self, key: &AggregateKey) -> Result<Option<EmotionAggregate>, StoreError> {
        let aggregate = sqlx::query_as::<_, EmotionAggregate>(
            r#"
            SELECT id, date, emotion, gender, department, count, confidence, updated_at
            FROM emotion_aggregates
            WHERE date = $1
              AND emotion = $2
              AND gender IS NOT DISTINCT FROM $3
              AND department IS NOT DISTINCT FROM $4
            "#,
        )
        .bind(key.date)
        .bind(&key.emotion)
        .bind(key.gender.as_deref())
        .bind(key.department.as_deref())
        .fetch_optional(&self.pool)
        .await?;

        Ok(aggregate)
    }

    async fn insert_aggregate(
        &self,
        key: &AggregateKey,
        count: i32,
        confidence: f64,
        at: DateTime<Utc>,
    ) -> Result<EmotionAggregate, StoreError> {
        let aggregate = sqlx::query_as::<_, EmotionAggregate>(
            r#"
            INSERT INTO emotion_aggregates (date, emotion, gender, department, count, confidence, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, date, emotion, gender, department, count, confidence, updated_at
            "#,
        )
        .bind(key.date)
        .bind(&key.emotion)
        .bind(key.gender.as_deref())
        .bind(key.department.as_deref())
        .bind(count)
        .bind(confidence)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;

        Ok(aggregate)
    }

    async fn update_aggregate(
        &self,
        id: i64,
        expected_count: i32,
        count: i32,
        confidence: f64,
        at: DateTime<Utc>,
    ) -> Result<Option<EmotionAggregate>, StoreError> {
        let aggregate = sqlx::query_as::<_, EmotionAggregate>(
            r#"
            UPDATE emotion_aggregates
            SET count = $3, confidence = $4, updated_at = $5
            WHERE id = $1 AND count = $2
            RETURNING id, date, emotion, gender, department, count, confidence, updated_at
            "#,
        )
        .bind(id)
        .bind(expected_count)
        .bind(count)
        .bind(confidence)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(aggregate)
    }
}

#[async_trait]
impl EmployeeEmotionStore for EmotionRepository {
    async fn find_employee_emotion(
        &self,
        employee_id: i32,
        date: NaiveDate,
    ) -> Result<Option<EmotionRecord>, StoreError> {
        let record = sqlx::query_as::<_, EmotionRecord>(
            r#"
            SELECT id, employee_id, date, emotion, confidence, updated_at
            FROM emotion_records
            WHERE employee_id = $1 AND date = $2
            "#,
        )
        .bind(employee_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert_employee_emotion(
        &self,
        employee_id: i32,
        date: NaiveDate,
        emotion: &str,
        confidence: f64,
        at: DateTime<Utc>,
    ) -> Result<EmotionRecord, StoreError> {
        let record = sqlx::query_as::<_, EmotionRecord>(
            r#"
            INSERT INTO emotion_records (employee_id, date, emotion, confidence, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, employee_id, date, emotion, confidence, updated_at
            "#,
        )
        .bind(employee_id)
        .bind(date)
        .bind(emotion)
        .bind(confidence)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn update_employee_emotion(
        &self,
        id: i64,
        emotion: &str,
        confidence: f64,
        at: DateTime<Utc>,
    ) -> Result<EmotionRecord, StoreError> {
        let record = sqlx::query_as::<_, EmotionRecord>(
            r#"
            UPDATE emotion_records
            SET emotion = $2, confidence = $3, updated_at = $4
            WHERE id = $1
            RETURNING id, employee_id, date, emotion, confidence, updated_at
            "#,
        )
        .bind(id)
        .bind(emotion)
        .bind(confidence)
        .bind(at)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }
}
