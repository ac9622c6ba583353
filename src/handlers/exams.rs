// src/handlers/exams.rs
//
// Exam CRUD plus the two attempt endpoints: fetching a randomized paper and
// submitting answers. Eligibility rules follow the same order in both
// places; `attempt_context` owns them.

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    error::AppError,
    handlers::scope::{active_enrollment_for_course, can_view_enrollment, ensure_student},
    models::{
        enrollment::Enrollment,
        exam::{
            Answer, AnswerListParams, AttemptParams, AttemptResponse, CreateExamRequest, Exam,
            ExamListParams, Grade, RetakeWindow, SubmitExamRequest, UpdateExamRequest,
        },
        question::{PublicQuestion, Question},
    },
    scoring,
    utils::jwt::Claims,
};

/// Lists exams. Students see only active exams of courses they are
/// enrolled in.
pub async fn list_exams(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ExamListParams>,
) -> Result<impl IntoResponse, AppError> {
    let exams = if claims.is_student() {
        sqlx::query_as::<_, Exam>(
            r#"
            SELECT x.* FROM exams x
            JOIN topics t ON x.topic_id = t.id
            WHERE x.active = TRUE
              AND t.course_id IN (
                SELECT p.course_id FROM enrollments e
                JOIN promotions p ON e.promotion_id = p.id
                WHERE e.student_id = ?1 AND e.active = TRUE
              )
              AND (?2 IS NULL OR x.topic_id = ?2)
            ORDER BY x.created_at DESC
            "#,
        )
        .bind(claims.user_id())
        .bind(params.topic)
        .fetch_all(&pool)
        .await?
    } else {
        sqlx::query_as::<_, Exam>(
            r#"
            SELECT * FROM exams
            WHERE (?1 IS NULL OR topic_id = ?1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(params.topic)
        .fetch_all(&pool)
        .await?
    };

    Ok(Json(exams))
}

pub async fn get_exam(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = fetch_exam(&pool, id).await?;

    if claims.is_student() {
        let course_id = exam_course_id(&pool, &exam).await?;
        let enrollment =
            active_enrollment_for_course(&pool, claims.user_id(), course_id).await?;
        if !exam.active || enrollment.is_none() {
            return Err(AppError::NotFound("Exam not found".to_string()));
        }
    }

    Ok(Json(exam))
}

pub async fn create_exam(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if let (Some(starts), Some(ends)) = (payload.starts_at, payload.ends_at) {
        if ends < starts {
            return Err(AppError::BadRequest(
                "ends_at cannot precede starts_at".to_string(),
            ));
        }
    }

    sqlx::query("SELECT id FROM topics WHERE id = ?")
        .bind(payload.topic_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Topic not found".to_string()))?;

    let result = sqlx::query(
        r#"
        INSERT INTO exams
        (topic_id, title, description, question_count, points_per_question, time_limit, starts_at, ends_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(payload.topic_id)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(payload.question_count.unwrap_or(10))
    .bind(payload.points_per_question.unwrap_or(1))
    .bind(payload.time_limit)
    .bind(payload.starts_at)
    .bind(payload.ends_at)
    .execute(&pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict("This topic already has an exam".to_string())
        }
        _ => {
            tracing::error!("Failed to create exam: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"id": result.last_insert_rowid()})),
    ))
}

pub async fn update_exam(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    if matches!(payload.question_count, Some(n) if n < 1) {
        return Err(AppError::BadRequest(
            "question_count must be at least 1".to_string(),
        ));
    }
    if matches!(payload.points_per_question, Some(p) if p < 1) {
        return Err(AppError::BadRequest(
            "points_per_question must be at least 1".to_string(),
        ));
    }

    let result = sqlx::query(
        r#"
        UPDATE exams SET
            title = COALESCE(?, title),
            description = COALESCE(?, description),
            question_count = COALESCE(?, question_count),
            points_per_question = COALESCE(?, points_per_question),
            time_limit = COALESCE(?, time_limit),
            starts_at = COALESCE(?, starts_at),
            ends_at = COALESCE(?, ends_at),
            active = COALESCE(?, active)
        WHERE id = ?
        "#,
    )
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(payload.question_count)
    .bind(payload.points_per_question)
    .bind(payload.time_limit)
    .bind(payload.starts_at)
    .bind(payload.ends_at)
    .bind(payload.active)
    .bind(id)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Exam not found".to_string()));
    }

    Ok(StatusCode::OK)
}

pub async fn delete_exam(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM exams WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Exam not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Everything an attempt needs once eligibility has been established.
struct AttemptContext {
    exam: Exam,
    enrollment: Enrollment,
    retake: Option<RetakeWindow>,
}

async fn fetch_exam(pool: &SqlitePool, id: i64) -> Result<Exam, AppError> {
    sqlx::query_as::<_, Exam>("SELECT * FROM exams WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))
}

async fn exam_course_id(pool: &SqlitePool, exam: &Exam) -> Result<i64, AppError> {
    sqlx::query_scalar::<_, i64>("SELECT course_id FROM topics WHERE id = ?")
        .bind(exam.topic_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AppError::NotFound("Topic not found".to_string()))
}

fn within_window(
    now: DateTime<Utc>,
    starts_at: Option<DateTime<Utc>>,
    ends_at: Option<DateTime<Utc>>,
) -> Result<(), AppError> {
    if let Some(starts) = starts_at {
        if now < starts {
            return Err(AppError::Forbidden("Not available yet".to_string()));
        }
    }
    if let Some(ends) = ends_at {
        if now > ends {
            return Err(AppError::Forbidden("No longer available".to_string()));
        }
    }
    Ok(())
}

/// Runs the eligibility checks shared by attempt start and submission, in
/// order: student role, active enrollment in the exam's course, then either
/// a valid open retake window or the exam's own window plus no existing
/// normal-attempt grade.
async fn attempt_context(
    pool: &SqlitePool,
    claims: &Claims,
    exam_id: i64,
    retake_window_id: Option<i64>,
) -> Result<AttemptContext, AppError> {
    ensure_student(claims)?;

    let exam = fetch_exam(pool, exam_id).await?;
    if !exam.active {
        return Err(AppError::NotFound("Exam not found".to_string()));
    }

    let course_id = exam_course_id(pool, &exam).await?;

    let enrollment = active_enrollment_for_course(pool, claims.user_id(), course_id)
        .await?
        .ok_or(AppError::Forbidden(
            "You are not enrolled in a promotion of this course".to_string(),
        ))?;

    let now = Utc::now();

    let retake = match retake_window_id {
        Some(window_id) => {
            let window = sqlx::query_as::<_, RetakeWindow>(
                "SELECT * FROM retake_windows WHERE id = ? AND exam_id = ? AND enrollment_id = ?",
            )
            .bind(window_id)
            .bind(exam.id)
            .bind(enrollment.id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::Forbidden(
                "Retake not valid or not available".to_string(),
            ))?;

            if !window.active || window.completed {
                return Err(AppError::Forbidden(
                    "Retake not valid or not available".to_string(),
                ));
            }
            within_window(now, window.starts_at, window.ends_at)?;

            Some(window)
        }
        None => {
            within_window(now, exam.starts_at, exam.ends_at)?;

            let normal_grade = sqlx::query_scalar::<_, i64>(
                r#"
                SELECT COUNT(*) FROM grades
                WHERE exam_id = ? AND enrollment_id = ? AND retake_window_id IS NULL
                "#,
            )
            .bind(exam.id)
            .bind(enrollment.id)
            .fetch_one(pool)
            .await?;

            if normal_grade > 0 {
                return Err(AppError::Forbidden(
                    "You have already taken this exam. Look for a retake if one is available."
                        .to_string(),
                ));
            }

            None
        }
    };

    Ok(AttemptContext {
        exam,
        enrollment,
        retake,
    })
}

/// Starts an attempt: returns `question_count` questions drawn uniformly at
/// random, without replacement, from the topic's bank. No side effects; a
/// bank smaller than the configured count rejects the call instead of
/// silently shrinking the attempt.
pub async fn attempt_questions(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Query(params): Query<AttemptParams>,
) -> Result<impl IntoResponse, AppError> {
    let ctx = attempt_context(&pool, &claims, id, params.retake_window).await?;

    let available = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM questions WHERE topic_id = ?",
    )
    .bind(ctx.exam.topic_id)
    .fetch_one(&pool)
    .await?;

    if available < ctx.exam.question_count {
        return Err(AppError::BadRequest(format!(
            "Not enough questions in the bank. At least {} are required",
            ctx.exam.question_count
        )));
    }

    let questions = sqlx::query_as::<_, PublicQuestion>(
        r#"
        SELECT id, text, question_type, option_a, option_b, option_c, option_d, points
        FROM questions
        WHERE topic_id = ?
        ORDER BY RANDOM()
        LIMIT ?
        "#,
    )
    .bind(ctx.exam.topic_id)
    .bind(ctx.exam.question_count)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to fetch attempt questions: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(AttemptResponse {
        exam_id: ctx.exam.id,
        retake_window_id: ctx.retake.as_ref().map(|r| r.id),
        question_count: ctx.exam.question_count,
        points_per_question: ctx.exam.points_per_question,
        total_points: ctx.exam.total_points(),
        time_limit: ctx.exam.time_limit,
        questions,
    }))
}

/// Submits a complete attempt and produces its grade.
///
/// Every answer is validated and scored before anything is written; the
/// answers plus the single grade row then go in one transaction.
pub async fn submit_exam(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<SubmitExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ctx = attempt_context(&pool, &claims, id, req.retake_window).await?;

    // A retake that already has a grade was submitted once already.
    if let Some(ref window) = ctx.retake {
        let graded = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM grades WHERE exam_id = ? AND enrollment_id = ? AND retake_window_id = ?",
        )
        .bind(ctx.exam.id)
        .bind(ctx.enrollment.id)
        .bind(window.id)
        .fetch_one(&pool)
        .await?;

        if graded > 0 {
            return Err(AppError::BadRequest(
                "You have already submitted this retake".to_string(),
            ));
        }
    }

    if req.answers.len() as i64 != ctx.exam.question_count {
        return Err(AppError::BadRequest(format!(
            "You must answer exactly {} questions",
            ctx.exam.question_count
        )));
    }

    // Score everything up front so a bad question id rejects the whole call
    // before any row is written.
    let mut scored = Vec::with_capacity(req.answers.len());
    for submitted in &req.answers {
        let question = sqlx::query_as::<_, Question>(
            "SELECT * FROM questions WHERE id = ? AND topic_id = ?",
        )
        .bind(submitted.question_id)
        .bind(ctx.exam.topic_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound(format!(
            "Question {} does not belong to this exam",
            submitted.question_id
        )))?;

        let is_correct = scoring::answer_is_correct(
            &question.question_type,
            question.correct_answer.as_deref(),
            &submitted.answer,
        );
        let points_earned = if is_correct {
            ctx.exam.points_per_question as f64
        } else {
            0.0
        };

        scored.push((question.id, submitted.answer.clone(), is_correct, points_earned));
    }

    let points_earned: f64 = scored.iter().map(|(_, _, _, p)| p).sum();
    let points_possible = ctx.exam.total_points() as f64;
    let percentage = scoring::percentage(points_earned, points_possible);
    let now = Utc::now();
    let retake_window_id = ctx.retake.as_ref().map(|r| r.id);

    let mut tx = pool.begin().await?;

    for (question_id, answer_text, is_correct, points) in &scored {
        sqlx::query(
            r#"
            INSERT INTO answers
            (exam_id, enrollment_id, question_id, retake_window_id, submitted, is_correct, points_earned)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(ctx.exam.id)
        .bind(ctx.enrollment.id)
        .bind(question_id)
        .bind(retake_window_id)
        .bind(answer_text)
        .bind(is_correct)
        .bind(points)
        .execute(&mut *tx)
        .await?;
    }

    let grade_id = sqlx::query(
        r#"
        INSERT INTO grades
        (exam_id, enrollment_id, retake_window_id, points_earned, points_possible, percentage, completed_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(ctx.exam.id)
    .bind(ctx.enrollment.id)
    .bind(retake_window_id)
    .bind(points_earned)
    .bind(points_possible)
    .bind(percentage)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    if let Some(window_id) = retake_window_id {
        sqlx::query("UPDATE retake_windows SET completed = TRUE WHERE id = ?")
            .bind(window_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    let grade = Grade {
        id: grade_id,
        exam_id: ctx.exam.id,
        enrollment_id: ctx.enrollment.id,
        retake_window_id,
        points_earned,
        points_possible,
        percentage,
        completed_at: Some(now),
    };

    Ok((StatusCode::CREATED, Json(grade)))
}

/// Lists recorded answers. Students see only their own.
pub async fn list_answers(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<AnswerListParams>,
) -> Result<impl IntoResponse, AppError> {
    let answers = if claims.is_student() {
        sqlx::query_as::<_, Answer>(
            r#"
            SELECT a.* FROM answers a
            JOIN enrollments e ON a.enrollment_id = e.id
            WHERE e.student_id = ?1
              AND (?2 IS NULL OR a.exam_id = ?2)
              AND (?3 IS NULL OR a.enrollment_id = ?3)
            ORDER BY a.created_at, a.id
            "#,
        )
        .bind(claims.user_id())
        .bind(params.exam)
        .bind(params.enrollment)
        .fetch_all(&pool)
        .await?
    } else {
        sqlx::query_as::<_, Answer>(
            r#"
            SELECT * FROM answers
            WHERE (?1 IS NULL OR exam_id = ?1)
              AND (?2 IS NULL OR enrollment_id = ?2)
            ORDER BY created_at, id
            "#,
        )
        .bind(params.exam)
        .bind(params.enrollment)
        .fetch_all(&pool)
        .await?
    };

    Ok(Json(answers))
}

pub async fn get_answer(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let answer = sqlx::query_as::<_, Answer>("SELECT * FROM answers WHERE id = ?")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Answer not found".to_string()))?;

    if !can_view_enrollment(&pool, &claims, answer.enrollment_id).await? {
        return Err(AppError::NotFound("Answer not found".to_string()));
    }

    Ok(Json(answer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn window_without_bounds_is_always_open() {
        assert!(within_window(at(12), None, None).is_ok());
    }

    #[test]
    fn missing_bound_is_unbounded_on_that_side() {
        assert!(within_window(at(12), Some(at(10)), None).is_ok());
        assert!(within_window(at(12), None, Some(at(14))).is_ok());
        assert!(within_window(at(9), Some(at(10)), None).is_err());
        assert!(within_window(at(15), None, Some(at(14))).is_err());
    }

    #[test]
    fn bounds_are_inclusive() {
        assert!(within_window(at(10), Some(at(10)), Some(at(14))).is_ok());
        assert!(within_window(at(14), Some(at(10)), Some(at(14))).is_ok());
        assert!(within_window(at(9), Some(at(10)), Some(at(14))).is_err());
        assert!(within_window(at(15), Some(at(10)), Some(at(14))).is_err());
    }
}
