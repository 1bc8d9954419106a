//! In-memory stand-ins for the external collaborators.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::models::attendance::{AttendanceRecord, NewAttendanceRecord};
use crate::models::emotion::{AggregateKey, EmotionAggregate, EmotionRecord};
use crate::models::employee::Employee;
use crate::models::face::{FaceAttributes, FaceMatch};
use crate::repositories::attendance_repository::AttendanceStore;
use crate::repositories::emotion_repository::{EmotionAggregateStore, EmployeeEmotionStore};
use crate::repositories::employee_repository::EmployeeDirectory;
use crate::repositories::StoreError;
use crate::services::image_fetcher::{FetchError, ReferenceImageFetcher};
use crate::services::vision_service::{VisionError, VisionGateway};

pub fn photo_url(id: i32) -> String {
    format!("https://photos.test/employees/{}.jpg", id)
}

pub fn employee(id: i32, name: &str) -> Employee {
    Employee {
        id,
        name: name.to_string(),
        gender: None,
        age: Some(30),
        department: None,
        photo_url: Some(photo_url(id)),
        created_at: Utc::now(),
    }
}

/// The fake fetcher returns the photo URL itself as the image bytes, so the
/// fake vision service can tell which employee a reference image belongs to.
fn employee_id_of(reference: &[u8]) -> Option<i32> {
    let url = std::str::from_utf8(reference).ok()?;
    url.rsplit('/').next()?.strip_suffix(".jpg")?.parse().ok()
}

#[derive(Default)]
pub struct FakeVision {
    faces: Vec<FaceAttributes>,
    scores: HashMap<i32, Vec<f64>>,
    failing: HashSet<i32>,
    delays: HashMap<i32, Duration>,
    compared: Mutex<Vec<i32>>,
    detect_calls: AtomicUsize,
}

impl FakeVision {
    pub fn new() -> Self {
        Self {
            faces: vec![FaceAttributes::default()],
            ..Default::default()
        }
    }

    pub fn with_faces(mut self, faces: Vec<FaceAttributes>) -> Self {
        self.faces = faces;
        self
    }

    pub fn score(mut self, employee_id: i32, similarities: &[f64]) -> Self {
        self.scores.insert(employee_id, similarities.to_vec());
        self
    }

    pub fn failing(mut self, employee_id: i32) -> Self {
        self.failing.insert(employee_id);
        self
    }

    pub fn delayed(mut self, employee_id: i32, delay: Duration) -> Self {
        self.delays.insert(employee_id, delay);
        self
    }

    pub fn compared_ids(&self) -> Vec<i32> {
        self.compared.lock().unwrap().clone()
    }

    pub fn detect_calls(&self) -> usize {
        self.detect_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VisionGateway for FakeVision {
    async fn detect_faces(&self, _image: &[u8]) -> Result<Vec<FaceAttributes>, VisionError> {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.faces.clone())
    }

    async fn compare_faces(
        &self,
        _source: &[u8],
        target: &[u8],
        _min_similarity: f64,
    ) -> Result<Vec<FaceMatch>, VisionError> {
        let id = employee_id_of(target).unwrap_or_default();

        if let Some(delay) = self.delays.get(&id) {
            tokio::time::sleep(*delay).await;
        }
        self.compared.lock().unwrap().push(id);

        if self.failing.contains(&id) {
            return Err(VisionError::Status(reqwest::StatusCode::INTERNAL_SERVER_ERROR));
        }

        Ok(self
            .scores
            .get(&id)
            .map(|scores| scores.iter().map(|&similarity| FaceMatch { similarity }).collect())
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct FakeFetcher {
    failing: HashSet<String>,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, employee_id: i32) -> Self {
        self.failing.insert(photo_url(employee_id));
        self
    }
}

#[async_trait]
impl ReferenceImageFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if self.failing.contains(url) {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: reqwest::StatusCode::NOT_FOUND,
            });
        }
        Ok(url.as_bytes().to_vec())
    }
}

#[derive(Default)]
struct Tables {
    employees: Vec<Employee>,
    attendance: Vec<AttendanceRecord>,
    aggregates: Vec<EmotionAggregate>,
    employee_emotions: Vec<EmotionRecord>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Mirrors the Postgres tables, including their unique constraints.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    hide_attendance_lookup: AtomicBool,
    hide_aggregate_lookup: AtomicBool,
    aggregates_unavailable: AtomicBool,
    directory_unavailable: AtomicBool,
    directory_reads: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_employees(employees: Vec<Employee>) -> Self {
        let store = Self::default();
        store.tables.lock().unwrap().employees = employees;
        store
    }

    /// The next attendance lookup reports no row, like a lookup that ran just
    /// before a concurrent insert.
    pub fn hide_next_attendance_lookup(&self) {
        self.hide_attendance_lookup.store(true, Ordering::SeqCst);
    }

    pub fn hide_next_aggregate_lookup(&self) {
        self.hide_aggregate_lookup.store(true, Ordering::SeqCst);
    }

    pub fn break_aggregates(&self) {
        self.aggregates_unavailable.store(true, Ordering::SeqCst);
    }

    pub fn break_directory(&self) {
        self.directory_unavailable.store(true, Ordering::SeqCst);
    }

    pub fn directory_reads(&self) -> usize {
        self.directory_reads.load(Ordering::SeqCst)
    }

    pub fn attendance(&self) -> Vec<AttendanceRecord> {
        self.tables.lock().unwrap().attendance.clone()
    }

    pub fn attendance_count(&self) -> usize {
        self.tables.lock().unwrap().attendance.len()
    }

    pub fn aggregates(&self) -> Vec<EmotionAggregate> {
        self.tables.lock().unwrap().aggregates.clone()
    }

    pub fn employee_emotions(&self) -> Vec<EmotionRecord> {
        self.tables.lock().unwrap().employee_emotions.clone()
    }

    fn check_aggregates(&self) -> Result<(), StoreError> {
        if self.aggregates_unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "relation \"emotion_aggregates\" does not exist".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl EmployeeDirectory for InMemoryStore {
    async fn list_with_photo(&self) -> Result<Vec<Employee>, StoreError> {
        self.directory_reads.fetch_add(1, Ordering::SeqCst);
        if self.directory_unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "relation \"employees\" does not exist".to_string(),
            ));
        }
        let tables = self.tables.lock().unwrap();
        let mut employees: Vec<Employee> = tables
            .employees
            .iter()
            .filter(|e| e.photo_url.is_some())
            .cloned()
            .collect();
        employees.sort_by_key(|e| e.id);
        Ok(employees)
    }
}

#[async_trait]
impl AttendanceStore for InMemoryStore {
    async fn find_by_employee_and_date(
        &self,
        employee_id: i32,
        date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        if self.hide_attendance_lookup.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .attendance
            .iter()
            .find(|r| r.employee_id == employee_id && r.date == date)
            .cloned())
    }

    async fn insert(&self, record: NewAttendanceRecord) -> Result<AttendanceRecord, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if tables
            .attendance
            .iter()
            .any(|r| r.employee_id == record.employee_id && r.date == record.date)
        {
            return Err(StoreError::Conflict(
                "duplicate key value violates unique constraint \"attendance_employee_date_key\"".to_string(),
            ));
        }
        let id = tables.next_id();
        let stored = AttendanceRecord {
            id,
            employee_id: record.employee_id,
            date: record.date,
            recorded_at: record.recorded_at,
            gender: record.gender,
            age_low: record.age_low,
            age_high: record.age_high,
            present: record.present,
        };
        tables.attendance.push(stored.clone());
        Ok(stored)
    }
}

#[async_trait]
impl EmotionAggregateStore for InMemoryStore {
    async fn find_aggregate(&self, key: &AggregateKey) -> Result<Option<EmotionAggregate>, StoreError> {
        self.check_aggregates()?;
        if self.hide_aggregate_lookup.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        let tables = self.tables.lock().unwrap();
        Ok(tables.aggregates.iter().find(|a| &a.key() == key).cloned())
    }

    async fn insert_aggregate(
        &self,
        key: &AggregateKey,
        count: i32,
        confidence: f64,
        at: DateTime<Utc>,
    ) -> Result<EmotionAggregate, StoreError> {
        self.check_aggregates()?;
        let mut tables = self.tables.lock().unwrap();
        if tables.aggregates.iter().any(|a| &a.key() == key) {
            return Err(StoreError::Conflict(
                "duplicate key value violates unique constraint \"emotion_aggregates_key\"".to_string(),
            ));
        }
        let id = tables.next_id();
        let aggregate = EmotionAggregate {
            id,
            date: key.date,
            emotion: key.emotion.clone(),
            gender: key.gender.clone(),
            department: key.department.clone(),
            count,
            confidence,
            updated_at: at,
        };
        tables.aggregates.push(aggregate.clone());
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
        self.check_aggregates()?;
        let mut tables = self.tables.lock().unwrap();
        Ok(tables
            .aggregates
            .iter_mut()
            .find(|a| a.id == id && a.count == expected_count)
            .map(|aggregate| {
                aggregate.count = count;
                aggregate.confidence = confidence;
                aggregate.updated_at = at;
                aggregate.clone()
            }))
    }
}

#[async_trait]
impl EmployeeEmotionStore for InMemoryStore {
    async fn find_employee_emotion(
        &self,
        employee_id: i32,
        date: NaiveDate,
    ) -> Result<Option<EmotionRecord>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .employee_emotions
            .iter()
            .find(|r| r.employee_id == employee_id && r.date == date)
            .cloned())
    }

    async fn insert_employee_emotion(
        &self,
        employee_id: i32,
        date: NaiveDate,
        emotion: &str,
        confidence: f64,
        at: DateTime<Utc>,
    ) -> Result<EmotionRecord, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let id = tables.next_id();
        let record = EmotionRecord {
            id,
            employee_id,
            date,
            emotion: emotion.to_string(),
            confidence,
            updated_at: at,
        };
        tables.employee_emotions.push(record.clone());
        Ok(record)
    }

    async fn update_employee_emotion(
        &self,
        id: i64,
        emotion: &str,
        confidence: f64,
        at: DateTime<Utc>,
    ) -> Result<EmotionRecord, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let record = tables
            .employee_emotions
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;
        record.emotion = emotion.to_string();
        record.confidence = confidence;
        record.updated_at = at;
        Ok(record.clone())
    }
}
