// src/models/catalog.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'courses' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCourseRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCourseRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub active: Option<bool>,
}

/// Represents the 'promotions' table: one scheduled running of a course,
/// with an assigned teacher and date range.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Promotion {
    pub id: i64,
    pub course_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub start_date: chrono::NaiveDate,
    pub end_date: Option<chrono::NaiveDate>,
    pub teacher_id: Option<i64>,
    pub active: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePromotionRequest {
    pub course_id: i64,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub start_date: chrono::NaiveDate,
    pub end_date: Option<chrono::NaiveDate>,
    pub teacher_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePromotionRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<chrono::NaiveDate>,
    pub end_date: Option<chrono::NaiveDate>,
    pub teacher_id: Option<i64>,
    pub active: Option<bool>,
}

/// Represents the 'topics' table: numbered lessons of a course.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,
    pub course_id: i64,
    pub topic_number: i64,
    pub title: String,
    pub description: Option<String>,
    pub class_date: Option<chrono::NaiveDate>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTopicRequest {
    pub course_id: i64,
    #[validate(range(min = 1))]
    pub topic_number: i64,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    pub class_date: Option<chrono::NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTopicRequest {
    pub topic_number: Option<i64>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub class_date: Option<chrono::NaiveDate>,
}

/// Represents the 'materials' table: lesson files plus metadata. Only the
/// file path is stored; serving the files is outside this API.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Material {
    pub id: i64,
    pub topic_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub file_path: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMaterialRequest {
    pub topic_id: i64,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(min = 1))]
    pub file_path: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMaterialRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub file_path: Option<String>,
}

/// Common query filters for catalog listings.
#[derive(Debug, Deserialize)]
pub struct CatalogListParams {
    pub course: Option<i64>,
    pub promotion: Option<i64>,
    pub topic: Option<i64>,
}
