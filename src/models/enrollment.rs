// src/models/enrollment.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const ATTENDANCE_STATUSES: &[&str] = &["present", "late", "present_no_camera", "absent"];

/// Represents the 'enrollments' table: a student signed up to a promotion.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: i64,
    pub student_id: i64,
    pub promotion_id: i64,
    pub active: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateEnrollmentRequest {
    pub student_id: i64,
    pub promotion_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateEnrollmentRequest {
    pub active: Option<bool>,
}

/// Represents the 'attendance' table: one status per (enrollment, topic).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attendance {
    pub id: i64,
    pub enrollment_id: i64,
    pub topic_id: i64,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAttendanceRequest {
    pub enrollment_id: i64,
    pub topic_id: i64,
    pub status: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAttendanceRequest {
    pub status: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EnrollmentListParams {
    pub promotion: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AttendanceListParams {
    pub topic: Option<i64>,
    pub enrollment: Option<i64>,
}
