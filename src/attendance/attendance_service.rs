use actix_web::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    attendance::dto::attendance_response::{AttendanceStatus, AttendanceSubmission},
    models::{emotion::AggregateKey, employee::Employee, face::Emotion, user::ApiError},
    repositories::{employee_repository::EmployeeDirectory, StoreError},
    services::{
        attendance_reconciler::{AttendanceOutcome, AttendanceReconciler},
        emotion_aggregator::EmotionAggregator,
        face_matcher::{FaceMatcher, MatchError},
        vision_service::{VisionError, VisionGateway},
    },
};

#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("invalid image: {0}")]
    InvalidImage(String),
    #[error("no face detected in the captured image")]
    NoFaceDetected,
    #[error("no enrolled employee has a reference photo")]
    NoEnrolledEmployees,
    #[error("no employee matched, best similarity {best_similarity:.2}")]
    NoMatch { best_similarity: f64 },
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("vision service error: {0}")]
    Vision(#[from] VisionError),
    #[error("database error: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for AttendanceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(reason) => AttendanceError::StoreUnavailable(reason),
            other => AttendanceError::Store(other),
        }
    }
}

impl From<MatchError> for AttendanceError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::NoEnrolledEmployees => AttendanceError::NoEnrolledEmployees,
            MatchError::NoMatch { best_similarity } => AttendanceError::NoMatch { best_similarity },
        }
    }
}

impl AttendanceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AttendanceError::InvalidImage(_) => StatusCode::BAD_REQUEST,
            AttendanceError::NoFaceDetected
            | AttendanceError::NoEnrolledEmployees
            | AttendanceError::NoMatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            AttendanceError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AttendanceError::Vision(_) => StatusCode::BAD_GATEWAY,
            AttendanceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used as a metrics tag.
    pub fn kind(&self) -> &'static str {
        match self {
            AttendanceError::InvalidImage(_) => "invalid_image",
            AttendanceError::NoFaceDetected => "no_face",
            AttendanceError::NoEnrolledEmployees => "no_employees",
            AttendanceError::NoMatch { .. } => "no_match",
            AttendanceError::StoreUnavailable(_) => "store_unavailable",
            AttendanceError::Vision(_) => "vision_error",
            AttendanceError::Store(_) => "database_error",
        }
    }

    pub fn to_api_error(&self) -> ApiError {
        match self {
            AttendanceError::InvalidImage(reason) => {
                ApiError::new("1003", "INVALID_IMAGE").with_detail(json!({ "reason": reason }))
            }
            AttendanceError::NoFaceDetected => ApiError::new("2001", "NO_FACE_DETECTED"),
            AttendanceError::NoEnrolledEmployees => ApiError::new("2002", "NO_ENROLLED_EMPLOYEES"),
            AttendanceError::NoMatch { best_similarity } => ApiError::new("2003", "NO_MATCH")
                .with_detail(json!({ "bestSimilarity": best_similarity })),
            AttendanceError::StoreUnavailable(reason) => ApiError::new("2004", "STORE_UNAVAILABLE")
                .with_detail(json!({
                    "reason": reason,
                    "hint": "Run the database migrations (migrations/) and check DATABASE_URL",
                })),
            AttendanceError::Vision(e) => ApiError::new("1006", "VISION_SERVICE_ERROR")
                .with_detail(json!({ "reason": e.to_string() })),
            AttendanceError::Store(e) => ApiError::new("1002", "DATABASE_ERROR")
                .with_detail(json!({ "reason": e.to_string() })),
        }
    }
}

/// Check-in pipeline: detect, identify, record attendance, fold the mood.
#[derive(Clone)]
pub struct AttendanceService {
    vision: Arc<dyn VisionGateway>,
    directory: Arc<dyn EmployeeDirectory>,
    matcher: FaceMatcher,
    reconciler: AttendanceReconciler,
    aggregator: EmotionAggregator,
}

impl AttendanceService {
    pub fn new(
        vision: Arc<dyn VisionGateway>,
        directory: Arc<dyn EmployeeDirectory>,
        matcher: FaceMatcher,
        reconciler: AttendanceReconciler,
        aggregator: EmotionAggregator,
    ) -> Self {
        Self {
            vision,
            directory,
            matcher,
            reconciler,
            aggregator,
        }
    }

    pub async fn submit(&self, image: Vec<u8>) -> Result<AttendanceSubmission, AttendanceError> {
        self.submit_at(image, Utc::now()).await
    }

    pub async fn submit_at(
        &self,
        image: Vec<u8>,
        now: DateTime<Utc>,
    ) -> Result<AttendanceSubmission, AttendanceError> {
        if image.is_empty() {
            return Err(AttendanceError::InvalidImage("empty image".to_string()));
        }
        let today = now.date_naive();

        let face = self
            .vision
            .detect_faces(&image)
            .await?
            .into_iter()
            .next()
            .ok_or(AttendanceError::NoFaceDetected)?;

        let candidates = self.directory.list_with_photo().await?;
        let matched = self.matcher.identify(Arc::new(image), candidates).await?;
        info!(
            employee_id = matched.employee.id,
            similarity = matched.similarity,
            "employee identified"
        );

        let outcome = self
            .reconciler
            .record_attendance(&matched.employee, &face, today, now)
            .await?;

        let primary = face.primary_emotion().cloned();
        if let Some(emotion) = &primary {
            self.record_emotion(&matched.employee, emotion, outcome.is_new(), today, now)
                .await;
        }

        let status = match outcome {
            AttendanceOutcome::Recorded(_) => AttendanceStatus::Recorded,
            AttendanceOutcome::AlreadyRecorded(_) => AttendanceStatus::AlreadyRecorded,
        };

        Ok(AttendanceSubmission {
            status,
            attendance: outcome.record().clone(),
            employee: matched.employee,
            emotion: primary,
            emotions: face.sorted_emotions(),
            similarity: matched.similarity,
        })
    }

    /// The anonymous aggregate counts each employee once per day; the
    /// employee's own record always tracks the latest check-in. Attendance is
    /// already stored at this point, so failures here are only logged.
    async fn record_emotion(
        &self,
        employee: &Employee,
        emotion: &Emotion,
        first_of_day: bool,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) {
        if first_of_day {
            let key = AggregateKey {
                date: today,
                emotion: emotion.emotion_type.clone(),
                gender: employee.gender.clone(),
                department: employee.department.clone(),
            };

            if let Err(e) = self.aggregator.fold_emotion(key, emotion.confidence, now).await {
                warn!(employee_id = employee.id, error = %e, "emotion aggregate update failed");
            }
        }

        if let Err(e) = self
            .aggregator
            .record_employee_emotion(employee.id, today, &emotion.emotion_type, emotion.confidence, now)
            .await
        {
            warn!(employee_id = employee.id, error = %e, "employee emotion update failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::face::{AgeRange, FaceAttributes, Gender};
    use crate::services::face_matcher::MatchPolicy;
    use crate::testing::{employee, FakeFetcher, FakeVision, InMemoryStore};
    use chrono::{Duration, TimeZone};

    fn face() -> FaceAttributes {
        FaceAttributes {
            age_range: Some(AgeRange { low: 25, high: 33 }),
            gender: Some(Gender {
                value: "Male".to_string(),
                confidence: 98.0,
            }),
            emotions: vec![
                Emotion {
                    emotion_type: "CALM".to_string(),
                    confidence: 20.0,
                },
                Emotion {
                    emotion_type: "HAPPY".to_string(),
                    confidence: 76.456,
                },
            ],
            ..Default::default()
        }
    }

    fn service(vision: Arc<FakeVision>, fetcher: FakeFetcher, store: Arc<InMemoryStore>) -> AttendanceService {
        AttendanceService::new(
            vision.clone(),
            store.clone(),
            FaceMatcher::new(vision, Arc::new(fetcher), MatchPolicy::default()),
            AttendanceReconciler::new(store.clone()),
            EmotionAggregator::new(store.clone(), store),
        )
    }

    fn morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 11, 8, 0, 0).unwrap()
    }

    fn staff() -> Vec<Employee> {
        let mut budi = employee(2, "Budi");
        budi.gender = Some("Male".to_string());
        budi.department = Some("Engineering".to_string());
        vec![employee(1, "Ana"), budi]
    }

    #[tokio::test]
    async fn check_in_records_once_and_folds_emotion() {
        let vision = Arc::new(FakeVision::new().with_faces(vec![face()]).score(1, &[60.0]).score(2, &[85.0]));
        let store = Arc::new(InMemoryStore::with_employees(staff()));
        let service = service(vision, FakeFetcher::new(), store.clone());

        let first = service.submit_at(b"capture".to_vec(), morning()).await.unwrap();

        assert_eq!(first.status, AttendanceStatus::Recorded);
        assert_eq!(first.employee.id, 2);
        assert_eq!(first.similarity, 85.0);
        assert_eq!(first.attendance.recorded_at, morning());
        assert_eq!(first.emotion.as_ref().map(|e| e.emotion_type.as_str()), Some("HAPPY"));
        assert_eq!(first.emotions[0].emotion_type, "HAPPY");

        let aggregates = store.aggregates();
        assert_eq!(aggregates.len(), 1);
        assert_eq!(aggregates[0].emotion, "HAPPY");
        assert_eq!(aggregates[0].gender.as_deref(), Some("Male"));
        assert_eq!(aggregates[0].department.as_deref(), Some("Engineering"));
        assert_eq!((aggregates[0].count, aggregates[0].confidence), (1, 76.46));
        assert_eq!(store.employee_emotions().len(), 1);

        let second = service
            .submit_at(b"capture".to_vec(), morning() + Duration::hours(2))
            .await
            .unwrap();

        assert_eq!(second.status, AttendanceStatus::AlreadyRecorded);
        assert_eq!(second.attendance.recorded_at, morning());
        assert_eq!(store.attendance_count(), 1);
        assert_eq!(store.aggregates()[0].count, 1);
    }

    #[tokio::test]
    async fn repeat_check_in_updates_employee_emotion_but_not_aggregates() {
        let store = Arc::new(InMemoryStore::with_employees(staff()));
        let calm = FaceAttributes {
            emotions: vec![Emotion {
                emotion_type: "CALM".to_string(),
                confidence: 64.0,
            }],
            ..face()
        };
        let sad = FaceAttributes {
            emotions: vec![Emotion {
                emotion_type: "SAD".to_string(),
                confidence: 71.5,
            }],
            ..face()
        };

        let morning_kiosk = service(
            Arc::new(FakeVision::new().with_faces(vec![calm]).score(2, &[90.0])),
            FakeFetcher::new(),
            store.clone(),
        );
        morning_kiosk.submit_at(b"capture".to_vec(), morning()).await.unwrap();

        let later_kiosk = service(
            Arc::new(FakeVision::new().with_faces(vec![sad]).score(2, &[90.0])),
            FakeFetcher::new(),
            store.clone(),
        );
        let repeat = later_kiosk
            .submit_at(b"capture".to_vec(), morning() + Duration::hours(3))
            .await
            .unwrap();

        assert_eq!(repeat.status, AttendanceStatus::AlreadyRecorded);

        let emotions = store.employee_emotions();
        assert_eq!(emotions.len(), 1);
        assert_eq!(emotions[0].emotion, "SAD");
        assert_eq!(emotions[0].confidence, 71.5);
        assert_eq!(emotions[0].updated_at, morning() + Duration::hours(3));

        let aggregates = store.aggregates();
        assert_eq!(aggregates.len(), 1);
        assert_eq!((aggregates[0].emotion.as_str(), aggregates[0].count), ("CALM", 1));
    }

    #[tokio::test]
    async fn no_face_stops_before_matching_or_persistence() {
        let vision = Arc::new(FakeVision::new().with_faces(Vec::new()).score(2, &[99.0]));
        let store = Arc::new(InMemoryStore::with_employees(staff()));
        let service = service(vision.clone(), FakeFetcher::new(), store.clone());

        let err = service.submit_at(b"capture".to_vec(), morning()).await.unwrap_err();

        assert!(matches!(err, AttendanceError::NoFaceDetected));
        assert_eq!(vision.detect_calls(), 1);
        assert!(vision.compared_ids().is_empty());
        assert_eq!(store.directory_reads(), 0);
        assert_eq!(store.attendance_count(), 0);
        assert!(store.aggregates().is_empty());
    }

    #[tokio::test]
    async fn empty_directory_reports_no_enrolled_employees() {
        let vision = Arc::new(FakeVision::new().with_faces(vec![face()]));
        let store = Arc::new(InMemoryStore::new());
        let service = service(vision, FakeFetcher::new(), store);

        let err = service.submit_at(b"capture".to_vec(), morning()).await.unwrap_err();

        assert!(matches!(err, AttendanceError::NoEnrolledEmployees));
        assert_eq!(err.to_api_error().code, "2002");
    }

    #[tokio::test]
    async fn no_match_carries_best_similarity() {
        let vision = Arc::new(FakeVision::new().with_faces(vec![face()]).score(1, &[61.5]));
        let store = Arc::new(InMemoryStore::with_employees(staff()));
        let service = service(vision, FakeFetcher::new(), store.clone());

        let err = service.submit_at(b"capture".to_vec(), morning()).await.unwrap_err();

        match &err {
            AttendanceError::NoMatch { best_similarity } => assert_eq!(*best_similarity, 61.5),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.to_api_error().detail, Some(json!({ "bestSimilarity": 61.5 })));
        assert_eq!(store.attendance_count(), 0);
    }

    #[tokio::test]
    async fn aggregate_failure_does_not_fail_check_in() {
        let vision = Arc::new(FakeVision::new().with_faces(vec![face()]).score(2, &[90.0]));
        let store = Arc::new(InMemoryStore::with_employees(staff()));
        store.break_aggregates();
        let service = service(vision, FakeFetcher::new(), store.clone());

        let submission = service.submit_at(b"capture".to_vec(), morning()).await.unwrap();

        assert_eq!(submission.status, AttendanceStatus::Recorded);
        assert_eq!(store.attendance_count(), 1);
        assert_eq!(store.employee_emotions().len(), 1);
    }

    #[tokio::test]
    async fn missing_employee_table_is_store_unavailable() {
        let vision = Arc::new(FakeVision::new().with_faces(vec![face()]));
        let store = Arc::new(InMemoryStore::with_employees(staff()));
        store.break_directory();
        let service = service(vision, FakeFetcher::new(), store);

        let err = service.submit_at(b"capture".to_vec(), morning()).await.unwrap_err();

        assert!(matches!(err, AttendanceError::StoreUnavailable(_)));
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(err.to_api_error().detail.unwrap()["hint"].is_string());
    }

    #[tokio::test]
    async fn failed_reference_download_is_not_surfaced() {
        let vision = Arc::new(FakeVision::new().with_faces(vec![face()]).score(1, &[99.0]).score(2, &[80.0]));
        let store = Arc::new(InMemoryStore::with_employees(staff()));
        let service = service(vision, FakeFetcher::new().failing(1), store);

        let submission = service.submit_at(b"capture".to_vec(), morning()).await.unwrap();

        assert_eq!(submission.employee.id, 2);
    }

    #[tokio::test]
    async fn empty_image_is_rejected_before_detection() {
        let vision = Arc::new(FakeVision::new());
        let store = Arc::new(InMemoryStore::new());
        let service = service(vision.clone(), FakeFetcher::new(), store);

        let err = service.submit_at(Vec::new(), morning()).await.unwrap_err();

        assert!(matches!(err, AttendanceError::InvalidImage(_)));
        assert_eq!(vision.detect_calls(), 0);
    }

    #[tokio::test]
    async fn face_without_emotions_still_checks_in() {
        let vision = Arc::new(
            FakeVision::new()
                .with_faces(vec![FaceAttributes::default()])
                .score(1, &[88.0]),
        );
        let store = Arc::new(InMemoryStore::with_employees(staff()));
        let service = service(vision, FakeFetcher::new(), store.clone());

        let submission = service.submit_at(b"capture".to_vec(), morning()).await.unwrap();

        assert_eq!(submission.employee.id, 1);
        assert!(submission.emotion.is_none());
        assert!(store.aggregates().is_empty());
    }

    #[test]
    fn error_codes_are_distinct_per_kind() {
        let errors = [
            AttendanceError::NoFaceDetected,
            AttendanceError::NoEnrolledEmployees,
            AttendanceError::NoMatch { best_similarity: 0.0 },
            AttendanceError::StoreUnavailable("down".to_string()),
        ];
        let codes: std::collections::HashSet<_> = errors.iter().map(|e| e.to_api_error().code).collect();
        assert_eq!(codes.len(), errors.len());
    }
}
