use serde::{Deserialize, Serialize};

use crate::models::attendance::AttendanceRecord;
use crate::models::employee::Employee;
use crate::models::face::Emotion;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitAttendanceBody {
    /// Webcam capture, base64 or a `data:image/...;base64,` URL.
    pub image: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Recorded,
    AlreadyRecorded,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSubmission {
    pub status: AttendanceStatus,
    pub employee: Employee,
    pub attendance: AttendanceRecord,
    /// Primary emotion of the captured face.
    pub emotion: Option<Emotion>,
    /// All detected emotions, highest confidence first.
    pub emotions: Vec<Emotion>,
    pub similarity: f64,
}
