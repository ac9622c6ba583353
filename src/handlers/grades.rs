// src/handlers/grades.rs
//
// Read-only grade listings, promotion-average recomputation and diploma
// issuance. Averages are recomputed only when a caller asks for it, never
// automatically on grade writes.

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{
        average::{
            AverageListParams, Diploma, IssuedDiploma, PromotionActionRequest,
            PromotionAverage, UpdateDiplomaRequest,
        },
        exam::{Grade, GradeListParams},
    },
    scoring::{self, GradeCandidate},
    utils::jwt::Claims,
};

/// Lists grades. Students see only their own.
pub async fn list_grades(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<GradeListParams>,
) -> Result<impl IntoResponse, AppError> {
    let grades = if claims.is_student() {
        sqlx::query_as::<_, Grade>(
            r#"
            SELECT g.* FROM grades g
            JOIN enrollments e ON g.enrollment_id = e.id
            WHERE e.student_id = ?1
              AND (?2 IS NULL OR g.exam_id = ?2)
              AND (?3 IS NULL OR g.enrollment_id = ?3)
            ORDER BY g.completed_at DESC
            "#,
        )
        .bind(claims.user_id())
        .bind(params.exam)
        .bind(params.enrollment)
        .fetch_all(&pool)
        .await?
    } else {
        sqlx::query_as::<_, Grade>(
            r#"
            SELECT * FROM grades
            WHERE (?1 IS NULL OR exam_id = ?1)
              AND (?2 IS NULL OR enrollment_id = ?2)
            ORDER BY completed_at DESC
            "#,
        )
        .bind(params.exam)
        .bind(params.enrollment)
        .fetch_all(&pool)
        .await?
    };

    Ok(Json(grades))
}

pub async fn get_grade(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let grade = sqlx::query_as::<_, Grade>("SELECT * FROM grades WHERE id = ?")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Grade not found".to_string()))?;

    if claims.is_student() {
        let owner =
            sqlx::query_scalar::<_, i64>("SELECT student_id FROM enrollments WHERE id = ?")
                .bind(grade.enrollment_id)
                .fetch_one(&pool)
                .await?;

        if owner != claims.user_id() {
            return Err(AppError::NotFound("Grade not found".to_string()));
        }
    }

    Ok(Json(grade))
}

/// Lists stored promotion averages. Students see only their own.
pub async fn list_averages(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<AverageListParams>,
) -> Result<impl IntoResponse, AppError> {
    let averages = if claims.is_student() {
        sqlx::query_as::<_, PromotionAverage>(
            r#"
            SELECT pa.* FROM promotion_averages pa
            JOIN enrollments e ON pa.enrollment_id = e.id
            WHERE e.student_id = ?1 AND (?2 IS NULL OR e.promotion_id = ?2)
            ORDER BY pa.average DESC
            "#,
        )
        .bind(claims.user_id())
        .bind(params.promotion)
        .fetch_all(&pool)
        .await?
    } else {
        sqlx::query_as::<_, PromotionAverage>(
            r#"
            SELECT pa.* FROM promotion_averages pa
            JOIN enrollments e ON pa.enrollment_id = e.id
            WHERE (?1 IS NULL OR e.promotion_id = ?1)
            ORDER BY pa.average DESC
            "#,
        )
        .bind(params.promotion)
        .fetch_all(&pool)
        .await?
    };

    Ok(Json(averages))
}

/// Recomputes the stored average for every active enrollment of a
/// promotion. Per exam of the promotion's course, the latest-completed
/// retake grade wins over the normal grade; exams without any grade
/// contribute nothing. The stored row is fully overwritten, so the call is
/// idempotent and can be re-run after new retakes are graded.
pub async fn recompute_averages(
    State(pool): State<SqlitePool>,
    Json(payload): Json<PromotionActionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let course_id =
        sqlx::query_scalar::<_, i64>("SELECT course_id FROM promotions WHERE id = ?")
            .bind(payload.promotion_id)
            .fetch_optional(&pool)
            .await?
            .ok_or(AppError::NotFound("Promotion not found".to_string()))?;

    let enrollment_ids = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM enrollments WHERE promotion_id = ? AND active = TRUE",
    )
    .bind(payload.promotion_id)
    .fetch_all(&pool)
    .await?;

    let exam_ids = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT x.id FROM exams x
        JOIN topics t ON x.topic_id = t.id
        WHERE t.course_id = ?
        "#,
    )
    .bind(course_id)
    .fetch_all(&pool)
    .await?;

    let mut updated = 0;
    for enrollment_id in enrollment_ids {
        let grades = sqlx::query_as::<_, Grade>(
            "SELECT * FROM grades WHERE enrollment_id = ?",
        )
        .bind(enrollment_id)
        .fetch_all(&pool)
        .await?;

        let mut percentages = Vec::new();
        for exam_id in &exam_ids {
            let candidates: Vec<GradeCandidate> = grades
                .iter()
                .filter(|g| g.exam_id == *exam_id)
                .map(|g| GradeCandidate {
                    percentage: g.percentage,
                    retake_window_id: g.retake_window_id,
                    completed_at: g.completed_at.unwrap_or_default(),
                })
                .collect();

            if let Some(chosen) = scoring::preferred_grade(candidates) {
                percentages.push(chosen.percentage);
            }
        }

        let average = scoring::promotion_average(&percentages);
        let passed = scoring::passes(average);

        sqlx::query(
            r#"
            INSERT INTO promotion_averages (enrollment_id, average, passed, computed_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(enrollment_id) DO UPDATE SET
                average = excluded.average,
                passed = excluded.passed,
                computed_at = excluded.computed_at
            "#,
        )
        .bind(enrollment_id)
        .bind(average)
        .bind(passed)
        .bind(Utc::now())
        .execute(&pool)
        .await?;

        updated += 1;
    }

    Ok(Json(serde_json::json!({
        "message": "Averages recomputed",
        "enrollments": updated,
    })))
}

/// Lists diplomas. Students see only their own.
pub async fn list_diplomas(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let diplomas = if claims.is_student() {
        sqlx::query_as::<_, Diploma>(
            r#"
            SELECT d.* FROM diplomas d
            JOIN enrollments e ON d.enrollment_id = e.id
            WHERE e.student_id = ?
            ORDER BY d.issued_at DESC
            "#,
        )
        .bind(claims.user_id())
        .fetch_all(&pool)
        .await?
    } else {
        sqlx::query_as::<_, Diploma>("SELECT * FROM diplomas ORDER BY issued_at DESC")
            .fetch_all(&pool)
            .await?
    };

    Ok(Json(diplomas))
}

pub async fn get_diploma(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let diploma = sqlx::query_as::<_, Diploma>("SELECT * FROM diplomas WHERE id = ?")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Diploma not found".to_string()))?;

    if claims.is_student() {
        let owner =
            sqlx::query_scalar::<_, i64>("SELECT student_id FROM enrollments WHERE id = ?")
                .bind(diploma.enrollment_id)
                .fetch_one(&pool)
                .await?;

        if owner != claims.user_id() {
            return Err(AppError::NotFound("Diploma not found".to_string()));
        }
    }

    Ok(Json(diploma))
}

/// Issues diplomas to every enrollment of a promotion whose stored average
/// passed. Get-or-create per enrollment: running this twice never creates
/// a second diploma, and existing codes are never regenerated.
pub async fn issue_diplomas(
    State(pool): State<SqlitePool>,
    Json(payload): Json<PromotionActionRequest>,
) -> Result<impl IntoResponse, AppError> {
    sqlx::query("SELECT id FROM promotions WHERE id = ?")
        .bind(payload.promotion_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Promotion not found".to_string()))?;

    #[derive(sqlx::FromRow)]
    struct PassingEnrollment {
        enrollment_id: i64,
        username: String,
        first_name: Option<String>,
        last_name: Option<String>,
    }

    let passing = sqlx::query_as::<_, PassingEnrollment>(
        r#"
        SELECT pa.enrollment_id, u.username, u.first_name, u.last_name
        FROM promotion_averages pa
        JOIN enrollments e ON pa.enrollment_id = e.id
        JOIN users u ON e.student_id = u.id
        WHERE e.promotion_id = ? AND pa.passed = TRUE
        "#,
    )
    .bind(payload.promotion_id)
    .fetch_all(&pool)
    .await?;

    let mut issued = Vec::new();
    for row in passing {
        let existing =
            sqlx::query_scalar::<_, i64>("SELECT id FROM diplomas WHERE enrollment_id = ?")
                .bind(row.enrollment_id)
                .fetch_optional(&pool)
                .await?;

        if existing.is_some() {
            continue;
        }

        let code = diploma_code();

        sqlx::query(
            "INSERT INTO diplomas (enrollment_id, code, issued_at) VALUES (?, ?, ?)",
        )
        .bind(row.enrollment_id)
        .bind(&code)
        .bind(Utc::now())
        .execute(&pool)
        .await?;

        let student = match (row.first_name, row.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            _ => row.username,
        };

        issued.push(IssuedDiploma {
            enrollment_id: row.enrollment_id,
            student,
            code,
        });
    }

    Ok(Json(serde_json::json!({
        "message": format!("Diplomas issued: {}", issued.len()),
        "diplomas": issued,
    })))
}

pub async fn update_diploma(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateDiplomaRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE diplomas SET
            valid_until = COALESCE(?, valid_until),
            active = COALESCE(?, active)
        WHERE id = ?
        "#,
    )
    .bind(payload.valid_until)
    .bind(payload.active)
    .bind(id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Diploma not found".to_string()));
    }

    Ok(StatusCode::OK)
}

pub async fn delete_diploma(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM diplomas WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Diploma not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Opaque unique diploma code, generated once at creation.
fn diploma_code() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("DIP-{}", hex[..12].to_uppercase())
}
