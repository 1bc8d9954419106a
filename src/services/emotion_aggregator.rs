//! Anonymous per-day emotion statistics and the per-employee emotion of the day.
//!
//! The aggregate confidence is a running mean rounded to two decimals at every
//! fold, so a series of folds can drift slightly from the plain mean of all
//! inputs. Dashboards read these stored values directly.

use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::emotion::{AggregateKey, EmotionAggregate, EmotionRecord};
use crate::repositories::emotion_repository::{EmotionAggregateStore, EmployeeEmotionStore};
use crate::repositories::StoreError;
use crate::utils::round2;

const FOLD_ATTEMPTS: u32 = 5;

/// Mean of `count` values averaging `average`, extended by one `value`.
pub fn fold_average(average: f64, count: i32, value: f64) -> (i32, f64) {
    let new_count = count + 1;
    let folded = (average * count as f64 + value) / new_count as f64;
    (new_count, round2(folded))
}

#[derive(Clone)]
pub struct EmotionAggregator {
    aggregates: Arc<dyn EmotionAggregateStore>,
    records: Arc<dyn EmployeeEmotionStore>,
}

impl EmotionAggregator {
    pub fn new(aggregates: Arc<dyn EmotionAggregateStore>, records: Arc<dyn EmployeeEmotionStore>) -> Self {
        Self { aggregates, records }
    }

    /// Folds one confidence into the bucket for `key`, creating it on first
    /// use. Updates are conditional on the count that was read, so a
    /// concurrent fold into the same bucket forces a re-read instead of
    /// overwriting it.
    pub async fn fold_emotion(
        &self,
        key: AggregateKey,
        confidence: f64,
        now: DateTime<Utc>,
    ) -> Result<EmotionAggregate, StoreError> {
        for attempt in 1..=FOLD_ATTEMPTS {
            let existing = match self.aggregates.find_aggregate(&key).await? {
                Some(existing) => existing,
                None => match self
                    .aggregates
                    .insert_aggregate(&key, 1, round2(confidence), now)
                    .await
                {
                    Ok(created) => {
                        debug!(emotion = %key.emotion, date = %key.date, "emotion bucket created");
                        return Ok(created);
                    }
                    Err(StoreError::Conflict(reason)) => {
                        // Another request created the bucket first; fold into it.
                        warn!(emotion = %key.emotion, attempt, %reason, "emotion bucket insert conflicted");
                        continue;
                    }
                    Err(e) => return Err(e),
                },
            };

            let (count, average) = fold_average(existing.confidence, existing.count, confidence);
            match self
                .aggregates
                .update_aggregate(existing.id, existing.count, count, average, now)
                .await?
            {
                Some(updated) => {
                    debug!(
                        emotion = %updated.emotion,
                        count,
                        confidence = average,
                        "emotion bucket updated"
                    );
                    return Ok(updated);
                }
                None => warn!(emotion = %key.emotion, attempt, "emotion bucket changed concurrently, retrying"),
            }
        }

        Err(StoreError::Conflict(format!(
            "emotion bucket {} on {} still contended after {} attempts",
            key.emotion, key.date, FOLD_ATTEMPTS
        )))
    }

    /// Keeps the latest detected emotion of the day for one employee.
    pub async fn record_employee_emotion(
        &self,
        employee_id: i32,
        date: NaiveDate,
        emotion: &str,
        confidence: f64,
        now: DateTime<Utc>,
    ) -> Result<EmotionRecord, StoreError> {
        let confidence = round2(confidence);
        match self.records.find_employee_emotion(employee_id, date).await? {
            Some(existing) => {
                self.records
                    .update_employee_emotion(existing.id, emotion, confidence, now)
                    .await
            }
            None => {
                self.records
                    .insert_employee_emotion(employee_id, date, emotion, confidence, now)
                    .await
            }
        }
    }
}
