// src/handlers/scope.rs
//
// Role-scoped visibility helpers shared by the list/retrieve handlers.
// Every access decision goes through these instead of ad hoc conditionals
// in each handler.

use sqlx::SqlitePool;

use crate::{error::AppError, models::enrollment::Enrollment, utils::jwt::Claims};

/// Rejects callers that are not students. Exam attempts are student-only.
pub fn ensure_student(claims: &Claims) -> Result<(), AppError> {
    if !claims.is_student() {
        return Err(AppError::Forbidden(
            "Only students can take exams".to_string(),
        ));
    }
    Ok(())
}

/// The student's active enrollment granting access to a course, if any.
/// Lookup is "any active enrollment whose promotion's course equals the
/// exam's course".
pub async fn active_enrollment_for_course(
    pool: &SqlitePool,
    student_id: i64,
    course_id: i64,
) -> Result<Option<Enrollment>, AppError> {
    let enrollment = sqlx::query_as::<_, Enrollment>(
        r#"
        SELECT e.id, e.student_id, e.promotion_id, e.active, e.created_at
        FROM enrollments e
        JOIN promotions p ON e.promotion_id = p.id
        WHERE e.student_id = ? AND e.active = TRUE AND p.course_id = ?
        "#,
    )
    .bind(student_id)
    .bind(course_id)
    .fetch_optional(pool)
    .await?;

    Ok(enrollment)
}

/// Courses the student can see through an active enrollment.
pub async fn enrolled_course_ids(
    pool: &SqlitePool,
    student_id: i64,
) -> Result<Vec<i64>, AppError> {
    let ids = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT DISTINCT p.course_id
        FROM enrollments e
        JOIN promotions p ON e.promotion_id = p.id
        WHERE e.student_id = ? AND e.active = TRUE
        "#,
    )
    .bind(student_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// True when the enrollment belongs to the calling student. Staff always
/// pass.
pub async fn can_view_enrollment(
    pool: &SqlitePool,
    claims: &Claims,
    enrollment_id: i64,
) -> Result<bool, AppError> {
    if claims.is_staff() {
        return Ok(true);
    }

    let owner = sqlx::query_scalar::<_, i64>("SELECT student_id FROM enrollments WHERE id = ?")
        .bind(enrollment_id)
        .fetch_optional(pool)
        .await?;

    Ok(owner == Some(claims.user_id()))
}
