// src/handlers/retakes.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    handlers::scope::can_view_enrollment,
    models::exam::{
        CreateRetakeRequest, RetakeCountParams, RetakeListParams, RetakeWindow,
        UpdateRetakeRequest,
    },
    utils::jwt::Claims,
};

/// Lists retake windows. Students see only their own.
pub async fn list_retakes(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<RetakeListParams>,
) -> Result<impl IntoResponse, AppError> {
    let retakes = if claims.is_student() {
        sqlx::query_as::<_, RetakeWindow>(
            r#"
            SELECT r.* FROM retake_windows r
            JOIN enrollments e ON r.enrollment_id = e.id
            WHERE e.student_id = ?1
              AND (?2 IS NULL OR r.exam_id = ?2)
              AND (?3 IS NULL OR r.enrollment_id = ?3)
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(claims.user_id())
        .bind(params.exam)
        .bind(params.enrollment)
        .fetch_all(&pool)
        .await?
    } else {
        sqlx::query_as::<_, RetakeWindow>(
            r#"
            SELECT * FROM retake_windows
            WHERE (?1 IS NULL OR exam_id = ?1)
              AND (?2 IS NULL OR enrollment_id = ?2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(params.exam)
        .bind(params.enrollment)
        .fetch_all(&pool)
        .await?
    };

    Ok(Json(retakes))
}

pub async fn get_retake(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let retake = sqlx::query_as::<_, RetakeWindow>("SELECT * FROM retake_windows WHERE id = ?")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Retake not found".to_string()))?;

    if !can_view_enrollment(&pool, &claims, retake.enrollment_id).await? {
        return Err(AppError::NotFound("Retake not found".to_string()));
    }

    Ok(Json(retake))
}

/// Authorizes a retake window for an (exam, enrollment) pair. Staff only;
/// the enrollment must belong to the exam's course.
pub async fn create_retake(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateRetakeRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let (Some(starts), Some(ends)) = (payload.starts_at, payload.ends_at) {
        if ends < starts {
            return Err(AppError::BadRequest(
                "ends_at cannot precede starts_at".to_string(),
            ));
        }
    }

    let exam_course = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT t.course_id FROM exams x
        JOIN topics t ON x.topic_id = t.id
        WHERE x.id = ?
        "#,
    )
    .bind(payload.exam_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    let enrollment_course = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT p.course_id FROM enrollments e
        JOIN promotions p ON e.promotion_id = p.id
        WHERE e.id = ?
        "#,
    )
    .bind(payload.enrollment_id)
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Enrollment not found".to_string()))?;

    if exam_course != enrollment_course {
        return Err(AppError::BadRequest(
            "Enrollment does not belong to the exam's course".to_string(),
        ));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO retake_windows (exam_id, enrollment_id, starts_at, ends_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(payload.exam_id)
    .bind(payload.enrollment_id)
    .bind(payload.starts_at)
    .bind(payload.ends_at)
    .execute(&pool)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"id": result.last_insert_rowid()})),
    ))
}

pub async fn update_retake(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateRetakeRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE retake_windows SET
            starts_at = COALESCE(?, starts_at),
            ends_at = COALESCE(?, ends_at),
            active = COALESCE(?, active)
        WHERE id = ?
        "#,
    )
    .bind(payload.starts_at)
    .bind(payload.ends_at)
    .bind(payload.active)
    .bind(id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Retake not found".to_string()));
    }

    Ok(StatusCode::OK)
}

pub async fn delete_retake(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM retake_windows WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Retake not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Counts every retake window granted to an enrollment across its
/// promotion's course. Used by clients to enforce retake limits; the
/// count itself carries no correctness guarantee.
pub async fn count_retakes(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<RetakeCountParams>,
) -> Result<impl IntoResponse, AppError> {
    if !can_view_enrollment(&pool, &claims, params.enrollment).await? {
        return Err(AppError::NotFound("Enrollment not found".to_string()));
    }

    sqlx::query("SELECT id FROM enrollments WHERE id = ?")
        .bind(params.enrollment)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Enrollment not found".to_string()))?;

    let total = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM retake_windows r
        JOIN exams x ON r.exam_id = x.id
        JOIN topics t ON x.topic_id = t.id
        WHERE r.enrollment_id = ?1
          AND t.course_id = (
            SELECT p.course_id FROM enrollments e
            JOIN promotions p ON e.promotion_id = p.id
            WHERE e.id = ?1
          )
        "#,
    )
    .bind(params.enrollment)
    .fetch_one(&pool)
    .await?;

    Ok(Json(serde_json::json!({
        "enrollment_id": params.enrollment,
        "total_retakes": total,
    })))
}
