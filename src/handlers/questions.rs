// src/handlers/questions.rs
//
// Question-bank management. Staff only: question payloads include the
// answer key, so students never hit these routes; they receive sanitized
// questions through the exam-attempt endpoint instead.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    models::question::{
        CreateQuestionRequest, QUESTION_TYPES, Question, QuestionListParams, UpdateQuestionRequest,
    },
};

pub async fn list_questions(
    State(pool): State<SqlitePool>,
    Query(params): Query<QuestionListParams>,
) -> Result<impl IntoResponse, AppError> {
    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT * FROM questions
        WHERE (?1 IS NULL OR topic_id = ?1)
        ORDER BY topic_id, created_at
        "#,
    )
    .bind(params.topic)
    .fetch_all(&pool)
    .await?;

    Ok(Json(questions))
}

pub async fn get_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let question = sqlx::query_as::<_, Question>("SELECT * FROM questions WHERE id = ?")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    Ok(Json(question))
}

pub async fn create_question(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if !QUESTION_TYPES.contains(&payload.question_type.as_str()) {
        return Err(AppError::BadRequest(format!(
            "Invalid question type '{}'",
            payload.question_type
        )));
    }

    if payload.question_type != "free_text" && payload.correct_answer.is_none() {
        return Err(AppError::BadRequest(
            "Scored questions need a correct answer".to_string(),
        ));
    }

    sqlx::query("SELECT id FROM topics WHERE id = ?")
        .bind(payload.topic_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Topic not found".to_string()))?;

    let result = sqlx::query(
        r#"
        INSERT INTO questions
        (topic_id, text, question_type, option_a, option_b, option_c, option_d, correct_answer, points)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.topic_id)
    .bind(&payload.text)
    .bind(&payload.question_type)
    .bind(&payload.option_a)
    .bind(&payload.option_b)
    .bind(&payload.option_c)
    .bind(&payload.option_d)
    .bind(&payload.correct_answer)
    .bind(payload.points.unwrap_or(1))
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"id": result.last_insert_rowid()})),
    ))
}

pub async fn update_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Some(ref question_type) = payload.question_type {
        if !QUESTION_TYPES.contains(&question_type.as_str()) {
            return Err(AppError::BadRequest(format!(
                "Invalid question type '{}'",
                question_type
            )));
        }
    }

    if let Some(points) = payload.points {
        if points < 1 {
            return Err(AppError::BadRequest(
                "Question points must be at least 1".to_string(),
            ));
        }
    }

    let result = sqlx::query(
        r#"
        UPDATE questions SET
            text = COALESCE(?, text),
            question_type = COALESCE(?, question_type),
            option_a = COALESCE(?, option_a),
            option_b = COALESCE(?, option_b),
            option_c = COALESCE(?, option_c),
            option_d = COALESCE(?, option_d),
            correct_answer = COALESCE(?, correct_answer),
            points = COALESCE(?, points)
        WHERE id = ?
        "#,
    )
    .bind(&payload.text)
    .bind(&payload.question_type)
    .bind(&payload.option_a)
    .bind(&payload.option_b)
    .bind(&payload.option_c)
    .bind(&payload.option_d)
    .bind(&payload.correct_answer)
    .bind(payload.points)
    .bind(id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::OK)
}

pub async fn delete_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
