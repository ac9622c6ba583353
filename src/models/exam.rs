// src/models/exam.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::question::PublicQuestion;

/// Represents the 'exams' table. Each topic has at most one exam; the
/// attempt draws `question_count` questions from the topic's bank and each
/// correct answer is worth `points_per_question`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub topic_id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub question_count: i64,
    pub points_per_question: i64,
    /// Time limit in minutes.
    pub time_limit: Option<i64>,
    pub starts_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ends_at: Option<chrono::DateTime<chrono::Utc>>,
    pub active: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Exam {
    pub fn total_points(&self) -> i64 {
        self.question_count * self.points_per_question
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamRequest {
    pub topic_id: i64,
    #[validate(length(max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub question_count: Option<i64>,
    #[validate(range(min = 1))]
    pub points_per_question: Option<i64>,
    pub time_limit: Option<i64>,
    pub starts_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ends_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateExamRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub question_count: Option<i64>,
    pub points_per_question: Option<i64>,
    pub time_limit: Option<i64>,
    pub starts_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ends_at: Option<chrono::DateTime<chrono::Utc>>,
    pub active: Option<bool>,
}

/// Represents the 'retake_windows' table: a teacher-authorized, time-boxed
/// second attempt at an exam for one enrollment.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RetakeWindow {
    pub id: i64,
    pub exam_id: i64,
    pub enrollment_id: i64,
    pub starts_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ends_at: Option<chrono::DateTime<chrono::Utc>>,
    pub active: bool,
    pub completed: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct CreateRetakeRequest {
    pub exam_id: i64,
    pub enrollment_id: i64,
    pub starts_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ends_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRetakeRequest {
    pub starts_at: Option<chrono::DateTime<chrono::Utc>>,
    pub ends_at: Option<chrono::DateTime<chrono::Utc>>,
    pub active: Option<bool>,
}

/// Represents the 'answers' table: one submitted answer within an attempt
/// (normal attempt when `retake_window_id` is null).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Answer {
    pub id: i64,
    pub exam_id: i64,
    pub enrollment_id: i64,
    pub question_id: i64,
    pub retake_window_id: Option<i64>,
    pub submitted: String,
    pub is_correct: bool,
    pub points_earned: f64,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'grades' table: the scored outcome of one complete attempt.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Grade {
    pub id: i64,
    pub exam_id: i64,
    pub enrollment_id: i64,
    pub retake_window_id: Option<i64>,
    pub points_earned: f64,
    pub points_possible: f64,
    pub percentage: f64,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Query parameter for the attempt endpoint: which retake window, if any,
/// this attempt is running under.
#[derive(Debug, Deserialize)]
pub struct AttemptParams {
    pub retake_window: Option<i64>,
}

/// The randomized paper handed to a student starting an attempt.
#[derive(Debug, Serialize)]
pub struct AttemptResponse {
    pub exam_id: i64,
    pub retake_window_id: Option<i64>,
    pub questions: Vec<PublicQuestion>,
    pub question_count: i64,
    pub points_per_question: i64,
    pub total_points: i64,
    pub time_limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: i64,
    pub answer: String,
}

/// DTO for submitting a complete attempt. The answer list must contain
/// exactly `question_count` entries.
#[derive(Debug, Deserialize)]
pub struct SubmitExamRequest {
    pub retake_window: Option<i64>,
    pub answers: Vec<SubmittedAnswer>,
}

#[derive(Debug, Deserialize)]
pub struct ExamListParams {
    pub topic: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RetakeListParams {
    pub exam: Option<i64>,
    pub enrollment: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RetakeCountParams {
    pub enrollment: i64,
}

#[derive(Debug, Deserialize)]
pub struct GradeListParams {
    pub exam: Option<i64>,
    pub enrollment: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerListParams {
    pub exam: Option<i64>,
    pub enrollment: Option<i64>,
}
