// src/handlers/topics.rs

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
    handlers::scope::enrolled_course_ids,
    models::catalog::{
        CatalogListParams, CreateMaterialRequest, CreateTopicRequest, Material, Topic,
        UpdateMaterialRequest, UpdateTopicRequest,
    },
    utils::jwt::Claims,
};

/// Lists topics. Students see only topics of courses they are enrolled in;
/// `?course=` and `?promotion=` narrow the listing.
pub async fn list_topics(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<CatalogListParams>,
) -> Result<impl IntoResponse, AppError> {
    // A promotion filter resolves to the promotion's course.
    let course_filter = match params.promotion {
        Some(promotion_id) => {
            let course_id =
                sqlx::query_scalar::<_, i64>("SELECT course_id FROM promotions WHERE id = ?")
                    .bind(promotion_id)
                    .fetch_optional(&pool)
                    .await?;
            match course_id {
                Some(id) => Some(id),
                None => return Ok(Json(Vec::<Topic>::new())),
            }
        }
        None => params.course,
    };

    let mut topics = sqlx::query_as::<_, Topic>(
        r#"
        SELECT * FROM topics
        WHERE (?1 IS NULL OR course_id = ?1)
        ORDER BY course_id, topic_number
        "#,
    )
    .bind(course_filter)
    .fetch_all(&pool)
    .await?;

    if claims.is_student() {
        let visible = enrolled_course_ids(&pool, claims.user_id()).await?;
        topics.retain(|t| visible.contains(&t.course_id));
    }

    Ok(Json(topics))
}

pub async fn get_topic(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let topic = sqlx::query_as::<_, Topic>("SELECT * FROM topics WHERE id = ?")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Topic not found".to_string()))?;

    if claims.is_student() {
        let visible = enrolled_course_ids(&pool, claims.user_id()).await?;
        if !visible.contains(&topic.course_id) {
            return Err(AppError::NotFound("Topic not found".to_string()));
        }
    }

    Ok(Json(topic))
}

pub async fn create_topic(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    sqlx::query("SELECT id FROM courses WHERE id = ?")
        .bind(payload.course_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Course not found".to_string()))?;

    let result = sqlx::query(
        r#"
        INSERT INTO topics (course_id, topic_number, title, description, class_date)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.course_id)
    .bind(payload.topic_number)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(payload.class_date)
    .execute(&pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => AppError::Conflict(
            format!("Topic number {} already exists for this course", payload.topic_number),
        ),
        _ => {
            tracing::error!("Failed to create topic: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"id": result.last_insert_rowid()})),
    ))
}

pub async fn update_topic(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE topics SET
            topic_number = COALESCE(?, topic_number),
            title = COALESCE(?, title),
            description = COALESCE(?, description),
            class_date = COALESCE(?, class_date)
        WHERE id = ?
        "#,
    )
    .bind(payload.topic_number)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(payload.class_date)
    .bind(id)
    .execute(&pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict("Topic number already exists for this course".to_string())
        }
        _ => AppError::InternalServerError(e.to_string()),
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Topic not found".to_string()));
    }

    Ok(StatusCode::OK)
}

pub async fn delete_topic(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM topics WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Topic not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Lists materials, student-scoped through the topic's course.
pub async fn list_materials(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<CatalogListParams>,
) -> Result<impl IntoResponse, AppError> {
    let materials = if claims.is_student() {
        sqlx::query_as::<_, Material>(
            r#"
            SELECT m.* FROM materials m
            JOIN topics t ON m.topic_id = t.id
            WHERE t.course_id IN (
                SELECT p.course_id FROM enrollments e
                JOIN promotions p ON e.promotion_id = p.id
                WHERE e.student_id = ?1 AND e.active = TRUE
            )
              AND (?2 IS NULL OR m.topic_id = ?2)
            ORDER BY m.created_at DESC
            "#,
        )
        .bind(claims.user_id())
        .bind(params.topic)
        .fetch_all(&pool)
        .await?
    } else {
        sqlx::query_as::<_, Material>(
            r#"
            SELECT * FROM materials
            WHERE (?1 IS NULL OR topic_id = ?1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(params.topic)
        .fetch_all(&pool)
        .await?
    };

    Ok(Json(materials))
}

pub async fn get_material(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let material = sqlx::query_as::<_, Material>("SELECT * FROM materials WHERE id = ?")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Material not found".to_string()))?;

    if claims.is_student() {
        let course_id = sqlx::query_scalar::<_, i64>("SELECT course_id FROM topics WHERE id = ?")
            .bind(material.topic_id)
            .fetch_one(&pool)
            .await?;

        let visible = enrolled_course_ids(&pool, claims.user_id()).await?;
        if !visible.contains(&course_id) {
            return Err(AppError::NotFound("Material not found".to_string()));
        }
    }

    Ok(Json(material))
}

pub async fn create_material(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateMaterialRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    sqlx::query("SELECT id FROM topics WHERE id = ?")
        .bind(payload.topic_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Topic not found".to_string()))?;

    let result = sqlx::query(
        "INSERT INTO materials (topic_id, title, description, file_path) VALUES (?, ?, ?, ?)",
    )
    .bind(payload.topic_id)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(&payload.file_path)
    .execute(&pool)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"id": result.last_insert_rowid()})),
    ))
}

pub async fn update_material(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateMaterialRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE materials SET
            title = COALESCE(?, title),
            description = COALESCE(?, description),
            file_path = COALESCE(?, file_path)
        WHERE id = ?
        "#,
    )
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(&payload.file_path)
    .bind(id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Material not found".to_string()));
    }

    Ok(StatusCode::OK)
}

pub async fn delete_material(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM materials WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Material not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
