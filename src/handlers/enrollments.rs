// src/handlers/enrollments.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::enrollment::{
        ATTENDANCE_STATUSES, Attendance, AttendanceListParams, CreateAttendanceRequest,
        CreateEnrollmentRequest, Enrollment, EnrollmentListParams, UpdateAttendanceRequest,
        UpdateEnrollmentRequest,
    },
    utils::jwt::Claims,
};

/// Lists enrollments. Students see only their own.
pub async fn list_enrollments(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<EnrollmentListParams>,
) -> Result<impl IntoResponse, AppError> {
    let enrollments = if claims.is_student() {
        sqlx::query_as::<_, Enrollment>(
            r#"
            SELECT * FROM enrollments
            WHERE student_id = ?1 AND (?2 IS NULL OR promotion_id = ?2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(claims.user_id())
        .bind(params.promotion)
        .fetch_all(&pool)
        .await?
    } else {
        sqlx::query_as::<_, Enrollment>(
            r#"
            SELECT * FROM enrollments
            WHERE (?1 IS NULL OR promotion_id = ?1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(params.promotion)
        .fetch_all(&pool)
        .await?
    };

    Ok(Json(enrollments))
}

pub async fn get_enrollment(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let enrollment = sqlx::query_as::<_, Enrollment>("SELECT * FROM enrollments WHERE id = ?")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Enrollment not found".to_string()))?;

    if claims.is_student() && enrollment.student_id != claims.user_id() {
        return Err(AppError::NotFound("Enrollment not found".to_string()));
    }

    Ok(Json(enrollment))
}

/// Enrolls a student in a promotion. Staff only (route-gated); duplicate
/// (student, promotion) pairs are rejected with 409.
pub async fn create_enrollment(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateEnrollmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let role = sqlx::query_scalar::<_, String>("SELECT role FROM users WHERE id = ?")
        .bind(payload.student_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Student not found".to_string()))?;

    if role != "student" {
        return Err(AppError::BadRequest(
            "Only students can be enrolled".to_string(),
        ));
    }

    sqlx::query("SELECT id FROM promotions WHERE id = ?")
        .bind(payload.promotion_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Promotion not found".to_string()))?;

    let result =
        sqlx::query("INSERT INTO enrollments (student_id, promotion_id) VALUES (?, ?)")
            .bind(payload.student_id)
            .bind(payload.promotion_id)
            .execute(&pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                    AppError::Conflict(
                        "Student is already enrolled in this promotion".to_string(),
                    )
                }
                _ => {
                    tracing::error!("Failed to create enrollment: {:?}", e);
                    AppError::InternalServerError(e.to_string())
                }
            })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"id": result.last_insert_rowid()})),
    ))
}

pub async fn update_enrollment(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateEnrollmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("UPDATE enrollments SET active = COALESCE(?, active) WHERE id = ?")
        .bind(payload.active)
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Enrollment not found".to_string()));
    }

    Ok(StatusCode::OK)
}

pub async fn delete_enrollment(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM enrollments WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Enrollment not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Lists attendance records. Students see only their own.
pub async fn list_attendance(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<AttendanceListParams>,
) -> Result<impl IntoResponse, AppError> {
    let records = if claims.is_student() {
        sqlx::query_as::<_, Attendance>(
            r#"
            SELECT a.* FROM attendance a
            JOIN enrollments e ON a.enrollment_id = e.id
            WHERE e.student_id = ?1
              AND (?2 IS NULL OR a.topic_id = ?2)
              AND (?3 IS NULL OR a.enrollment_id = ?3)
            ORDER BY a.topic_id, a.enrollment_id
            "#,
        )
        .bind(claims.user_id())
        .bind(params.topic)
        .bind(params.enrollment)
        .fetch_all(&pool)
        .await?
    } else {
        sqlx::query_as::<_, Attendance>(
            r#"
            SELECT * FROM attendance
            WHERE (?1 IS NULL OR topic_id = ?1)
              AND (?2 IS NULL OR enrollment_id = ?2)
            ORDER BY topic_id, enrollment_id
            "#,
        )
        .bind(params.topic)
        .bind(params.enrollment)
        .fetch_all(&pool)
        .await?
    };

    Ok(Json(records))
}

pub async fn get_attendance(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let record = sqlx::query_as::<_, Attendance>("SELECT * FROM attendance WHERE id = ?")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Attendance record not found".to_string()))?;

    if claims.is_student() {
        let owner =
            sqlx::query_scalar::<_, i64>("SELECT student_id FROM enrollments WHERE id = ?")
                .bind(record.enrollment_id)
                .fetch_one(&pool)
                .await?;

        if owner != claims.user_id() {
            return Err(AppError::NotFound(
                "Attendance record not found".to_string(),
            ));
        }
    }

    Ok(Json(record))
}

/// Marks attendance for an (enrollment, topic) pair. Staff only.
pub async fn create_attendance(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateAttendanceRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !ATTENDANCE_STATUSES.contains(&payload.status.as_str()) {
        return Err(AppError::BadRequest(format!(
            "Invalid attendance status '{}'",
            payload.status
        )));
    }

    sqlx::query("SELECT id FROM enrollments WHERE id = ?")
        .bind(payload.enrollment_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Enrollment not found".to_string()))?;

    sqlx::query("SELECT id FROM topics WHERE id = ?")
        .bind(payload.topic_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Topic not found".to_string()))?;

    let result = sqlx::query(
        "INSERT INTO attendance (enrollment_id, topic_id, status, notes) VALUES (?, ?, ?, ?)",
    )
    .bind(payload.enrollment_id)
    .bind(payload.topic_id)
    .bind(&payload.status)
    .bind(&payload.notes)
    .execute(&pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => AppError::Conflict(
            "Attendance already recorded for this enrollment and topic".to_string(),
        ),
        _ => {
            tracing::error!("Failed to create attendance: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"id": result.last_insert_rowid()})),
    ))
}

pub async fn update_attendance(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateAttendanceRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(ref status) = payload.status {
        if !ATTENDANCE_STATUSES.contains(&status.as_str()) {
            return Err(AppError::BadRequest(format!(
                "Invalid attendance status '{}'",
                status
            )));
        }
    }

    let result = sqlx::query(
        r#"
        UPDATE attendance SET
            status = COALESCE(?, status),
            notes = COALESCE(?, notes)
        WHERE id = ?
        "#,
    )
    .bind(&payload.status)
    .bind(&payload.notes)
    .bind(id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(
            "Attendance record not found".to_string(),
        ));
    }

    Ok(StatusCode::OK)
}

pub async fn delete_attendance(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM attendance WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(
            "Attendance record not found".to_string(),
        ));
    }

    Ok(StatusCode::NO_CONTENT)
}
