// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

pub const QUESTION_TYPES: &[&str] = &["multiple_choice", "true_false", "free_text"];

/// Represents the 'questions' table: the per-topic question bank.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub topic_id: i64,
    pub text: String,

    /// 'multiple_choice', 'true_false' or 'free_text'.
    pub question_type: String,

    pub option_a: Option<String>,
    pub option_b: Option<String>,
    pub option_c: Option<String>,
    pub option_d: Option<String>,

    /// Answer key: 'a'..'d' for multiple choice, 'true'/'false' for
    /// true/false. Free-text questions carry no key.
    pub correct_answer: Option<String>,

    /// Display point value; scoring uses the exam's points-per-question.
    pub points: i64,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for sending a question to a student taking an exam.
/// Excludes the answer key.
#[derive(Debug, Serialize, FromRow)]
pub struct PublicQuestion {
    pub id: i64,
    pub text: String,
    pub question_type: String,
    pub option_a: Option<String>,
    pub option_b: Option<String>,
    pub option_c: Option<String>,
    pub option_d: Option<String>,
    pub points: i64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    pub topic_id: i64,
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
    pub question_type: String,
    #[validate(length(max = 500))]
    pub option_a: Option<String>,
    #[validate(length(max = 500))]
    pub option_b: Option<String>,
    #[validate(length(max = 500))]
    pub option_c: Option<String>,
    #[validate(length(max = 500))]
    pub option_d: Option<String>,
    #[validate(length(max = 10))]
    pub correct_answer: Option<String>,
    #[validate(range(min = 1))]
    pub points: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuestionRequest {
    pub text: Option<String>,
    pub question_type: Option<String>,
    pub option_a: Option<String>,
    pub option_b: Option<String>,
    pub option_c: Option<String>,
    pub option_d: Option<String>,
    pub correct_answer: Option<String>,
    pub points: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionListParams {
    pub topic: Option<i64>,
}
