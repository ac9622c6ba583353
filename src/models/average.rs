// src/models/average.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'promotion_averages' table: one stored average per
/// enrollment, recomputed on demand.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PromotionAverage {
    pub id: i64,
    pub enrollment_id: i64,
    pub average: f64,
    pub passed: bool,
    pub computed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'diplomas' table. The code is generated once at creation
/// and never regenerated.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Diploma {
    pub id: i64,
    pub enrollment_id: i64,
    pub code: String,
    pub issued_at: Option<chrono::DateTime<chrono::Utc>>,
    pub valid_until: Option<chrono::NaiveDate>,
    pub active: bool,
}

#[derive(Debug, Deserialize)]
pub struct PromotionActionRequest {
    pub promotion_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct AverageListParams {
    pub promotion: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDiplomaRequest {
    pub valid_until: Option<chrono::NaiveDate>,
    pub active: Option<bool>,
}

/// One newly issued diploma in the issue-diplomas response.
#[derive(Debug, Serialize)]
pub struct IssuedDiploma {
    pub enrollment_id: i64,
    pub student: String,
    pub code: String,
}
