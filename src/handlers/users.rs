// src/handlers/users.rs

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
    models::user::{CreateUserRequest, ROLES, UpdateUserRequest, User, UserListParams},
    utils::{hash::hash_password, jwt::Claims, passwords::generate_password},
};

/// Lists users. Staff only; students get 403. Optional `?role=` filter.
pub async fn list_users(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<UserListParams>,
) -> Result<impl IntoResponse, AppError> {
    if !claims.is_staff() {
        return Err(AppError::Forbidden(
            "Only teachers and admins can list users".to_string(),
        ));
    }

    let users = sqlx::query_as::<_, User>(
        r#"
        SELECT * FROM users
        WHERE (?1 IS NULL OR role = ?1)
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(&params.role)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(users))
}

/// Creates a user. Admin only.
///
/// When no password is supplied one is generated from the word list and
/// returned once in plaintext; either way the account is flagged to change
/// its password on first login.
pub async fn create_user(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !claims.is_admin() {
        return Err(AppError::Forbidden(
            "Only admins can create users".to_string(),
        ));
    }

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if !ROLES.contains(&payload.role.as_str()) {
        return Err(AppError::BadRequest(format!(
            "Invalid role '{}'",
            payload.role
        )));
    }

    let plain_password = payload
        .password
        .clone()
        .unwrap_or_else(generate_password);
    let hashed_password = hash_password(&plain_password)?;

    let result = sqlx::query(
        r#"
        INSERT INTO users
        (username, password, role, first_name, last_name, email, phone, birth_date, address, must_change_password)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, TRUE)
        "#,
    )
    .bind(&payload.username)
    .bind(&hashed_password)
    .bind(&payload.role)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(&payload.email)
    .bind(&payload.phone)
    .bind(payload.birth_date)
    .bind(&payload.address)
    .execute(&pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(format!("Username '{}' already exists", payload.username))
        }
        _ => {
            tracing::error!("Failed to create user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    let id = result.last_insert_rowid();

    // The plaintext is returned exactly once, at creation.
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": id,
            "username": payload.username,
            "role": payload.role,
            "generated_password": plain_password,
            "must_change_password": true,
        })),
    ))
}

/// Retrieves a single user. Staff, or the user themselves.
pub async fn get_user(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !claims.is_staff() && claims.user_id() != id {
        return Err(AppError::Forbidden("Not allowed".to_string()));
    }

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Updates user information. Admin only.
pub async fn update_user(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if !claims.is_admin() {
        return Err(AppError::Forbidden(
            "Only admins can update users".to_string(),
        ));
    }

    sqlx::query("SELECT id FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    if let Some(ref role) = payload.role {
        if !ROLES.contains(&role.as_str()) {
            return Err(AppError::BadRequest(format!("Invalid role '{}'", role)));
        }
    }

    let password_hash = match payload.password {
        Some(ref new_password) => Some(hash_password(new_password)?),
        None => None,
    };

    sqlx::query(
        r#"
        UPDATE users SET
            username = COALESCE(?, username),
            role = COALESCE(?, role),
            password = COALESCE(?, password),
            active = COALESCE(?, active),
            first_name = COALESCE(?, first_name),
            last_name = COALESCE(?, last_name),
            email = COALESCE(?, email),
            phone = COALESCE(?, phone),
            birth_date = COALESCE(?, birth_date),
            address = COALESCE(?, address)
        WHERE id = ?
        "#,
    )
    .bind(&payload.username)
    .bind(&payload.role)
    .bind(&password_hash)
    .bind(payload.active)
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(&payload.email)
    .bind(&payload.phone)
    .bind(payload.birth_date)
    .bind(&payload.address)
    .bind(id)
    .execute(&pool)
    .await?;

    Ok(StatusCode::OK)
}

/// Deletes a user by ID. Admin only; prevents deleting self.
pub async fn delete_user(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if !claims.is_admin() {
        return Err(AppError::Forbidden(
            "Only admins can delete users".to_string(),
        ));
    }

    if id == claims.user_id() {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
