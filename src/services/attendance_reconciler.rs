use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::attendance::{AttendanceRecord, NewAttendanceRecord};
use crate::models::employee::Employee;
use crate::models::face::FaceAttributes;
use crate::repositories::attendance_repository::AttendanceStore;
use crate::repositories::StoreError;

#[derive(Debug, Clone, PartialEq)]
pub enum AttendanceOutcome {
    Recorded(AttendanceRecord),
    /// The employee already checked in on that date; carries the first record.
    AlreadyRecorded(AttendanceRecord),
}

impl AttendanceOutcome {
    pub fn record(&self) -> &AttendanceRecord {
        match self {
            AttendanceOutcome::Recorded(record) | AttendanceOutcome::AlreadyRecorded(record) => record,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, AttendanceOutcome::Recorded(_))
    }
}

#[derive(Clone)]
pub struct AttendanceReconciler {
    store: Arc<dyn AttendanceStore>,
}

impl AttendanceReconciler {
    pub fn new(store: Arc<dyn AttendanceStore>) -> Self {
        Self { store }
    }

    /// Records at most one attendance per employee and date.
    pub async fn record_attendance(
        &self,
        employee: &Employee,
        attributes: &FaceAttributes,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<AttendanceOutcome, StoreError> {
        if let Some(existing) = self.store.find_by_employee_and_date(employee.id, today).await? {
            info!(employee_id = employee.id, %today, "attendance already recorded");
            return Ok(AttendanceOutcome::AlreadyRecorded(existing));
        }

        let record = NewAttendanceRecord {
            employee_id: employee.id,
            date: today,
            recorded_at: now,
            gender: attributes.gender_value().map(str::to_string),
            age_low: attributes.age_range.map(|range| range.low as i32),
            age_high: attributes.age_range.map(|range| range.high as i32),
            present: true,
        };

        match self.store.insert(record).await {
            Ok(record) => {
                info!(employee_id = employee.id, %today, "attendance recorded");
                Ok(AttendanceOutcome::Recorded(record))
            }
            Err(StoreError::Conflict(reason)) => {
                // A concurrent check-in won between the lookup and the insert.
                warn!(employee_id = employee.id, %today, %reason, "attendance insert conflicted");
                match self.store.find_by_employee_and_date(employee.id, today).await? {
                    Some(existing) => Ok(AttendanceOutcome::AlreadyRecorded(existing)),
                    None => Err(StoreError::Conflict(reason)),
                }
            }
            Err(e) => Err(e),
        }
    }
}
