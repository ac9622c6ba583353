// src/handlers/catalog.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::catalog::{
        CatalogListParams, Course, CreateCourseRequest, CreatePromotionRequest, Promotion,
        UpdateCourseRequest, UpdatePromotionRequest,
    },
    utils::jwt::Claims,
};

/// Lists all courses. Visible to every authenticated user.
pub async fn list_courses(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let courses = sqlx::query_as::<_, Course>("SELECT * FROM courses ORDER BY name")
        .fetch_all(&pool)
        .await?;

    Ok(Json(courses))
}

pub async fn get_course(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let course = sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = ?")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))?;

    Ok(Json(course))
}

pub async fn create_course(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let result = sqlx::query("INSERT INTO courses (name, description) VALUES (?, ?)")
        .bind(&payload.name)
        .bind(&payload.description)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to create course: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"id": result.last_insert_rowid()})),
    ))
}

pub async fn update_course(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCourseRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE courses SET
            name = COALESCE(?, name),
            description = COALESCE(?, description),
            active = COALESCE(?, active)
        WHERE id = ?
        "#,
    )
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(payload.active)
    .bind(id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    Ok(StatusCode::OK)
}

pub async fn delete_course(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Course not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Lists promotions, scoped by role: students see only promotions they hold
/// an active enrollment in; teachers see the promotions they teach; admins
/// see everything.
pub async fn list_promotions(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<CatalogListParams>,
) -> Result<impl IntoResponse, AppError> {
    let promotions = if claims.is_student() {
        sqlx::query_as::<_, Promotion>(
            r#"
            SELECT p.* FROM promotions p
            JOIN enrollments e ON e.promotion_id = p.id
            WHERE e.student_id = ?1 AND e.active = TRUE AND p.active = TRUE
              AND (?2 IS NULL OR p.course_id = ?2)
            ORDER BY p.start_date DESC
            "#,
        )
        .bind(claims.user_id())
        .bind(params.course)
        .fetch_all(&pool)
        .await?
    } else if claims.is_admin() {
        sqlx::query_as::<_, Promotion>(
            r#"
            SELECT * FROM promotions
            WHERE (?1 IS NULL OR course_id = ?1)
            ORDER BY start_date DESC
            "#,
        )
        .bind(params.course)
        .fetch_all(&pool)
        .await?
    } else {
        // Teachers see only the promotions they teach.
        sqlx::query_as::<_, Promotion>(
            r#"
            SELECT * FROM promotions
            WHERE teacher_id = ?1 AND (?2 IS NULL OR course_id = ?2)
            ORDER BY start_date DESC
            "#,
        )
        .bind(claims.user_id())
        .bind(params.course)
        .fetch_all(&pool)
        .await?
    };

    Ok(Json(promotions))
}

pub async fn get_promotion(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let promotion = sqlx::query_as::<_, Promotion>("SELECT * FROM promotions WHERE id = ?")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Promotion not found".to_string()))?;

    if claims.is_student() {
        let enrolled = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM enrollments WHERE student_id = ? AND promotion_id = ? AND active = TRUE",
        )
        .bind(claims.user_id())
        .bind(id)
        .fetch_one(&pool)
        .await?;

        if enrolled == 0 {
            return Err(AppError::NotFound("Promotion not found".to_string()));
        }
    }

    Ok(Json(promotion))
}

pub async fn create_promotion(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreatePromotionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if let (Some(end), start) = (payload.end_date, payload.start_date) {
        if end < start {
            return Err(AppError::BadRequest(
                "end_date cannot precede start_date".to_string(),
            ));
        }
    }

    sqlx::query("SELECT id FROM courses WHERE id = ?")
        .bind(payload.course_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))?;

    if let Some(teacher_id) = payload.teacher_id {
        let role = sqlx::query_scalar::<_, String>("SELECT role FROM users WHERE id = ?")
            .bind(teacher_id)
            .fetch_optional(&pool)
            .await?
            .ok_or(AppError::NotFound("Teacher not found".to_string()))?;

        if role == "student" {
            return Err(AppError::BadRequest(
                "Promotion teacher must be a teacher or admin".to_string(),
            ));
        }
    }

    let result = sqlx::query(
        r#"
        INSERT INTO promotions (course_id, name, description, start_date, end_date, teacher_id)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.course_id)
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.teacher_id)
    .execute(&pool)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"id": result.last_insert_rowid()})),
    ))
}

pub async fn update_promotion(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdatePromotionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE promotions SET
            name = COALESCE(?, name),
            description = COALESCE(?, description),
            start_date = COALESCE(?, start_date),
            end_date = COALESCE(?, end_date),
            teacher_id = COALESCE(?, teacher_id),
            active = COALESCE(?, active)
        WHERE id = ?
        "#,
    )
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(payload.teacher_id)
    .bind(payload.active)
    .bind(id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Promotion not found".to_string()));
    }

    Ok(StatusCode::OK)
}

pub async fn delete_promotion(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM promotions WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Promotion not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
