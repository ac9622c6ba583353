// src/handlers/auth.rs

use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::{Config, MIN_PASSWORD_LENGTH},
    error::AppError,
    models::user::{ChangePasswordRequest, LoginRequest, UpdateProfileRequest, User},
    utils::{
        hash::{hash_password, verify_password},
        jwt::{Claims, sign_jwt},
    },
};

/// Authenticates a user and returns a JWT token.
///
/// The response carries `must_change_password` so the client can force a
/// password change for accounts created with a generated password.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let user = sqlx::query_as::<_, User>(
        "SELECT * FROM users WHERE username = ? AND active = TRUE",
    )
    .bind(&payload.username)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Login DB error: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let user = user.ok_or(AppError::AuthError("User not found".to_string()))?;

    let is_valid = verify_password(&payload.password, &user.password)?;

    if !is_valid {
        return Err(AppError::AuthError("Invalid password".to_string()));
    }

    let token = sign_jwt(user.id, &user.role, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "must_change_password": user.must_change_password,
    })))
}

/// Get the current user's profile.
pub async fn me(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(claims.user_id())
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// Update the current user's contact details. Username and role stay as
/// they are; those are admin-managed.
pub async fn update_me(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id();

    sqlx::query(
        r#"
        UPDATE users SET
            first_name = COALESCE(?, first_name),
            last_name = COALESCE(?, last_name),
            email = COALESCE(?, email),
            phone = COALESCE(?, phone),
            birth_date = COALESCE(?, birth_date),
            address = COALESCE(?, address)
        WHERE id = ?
        "#,
    )
    .bind(&payload.first_name)
    .bind(&payload.last_name)
    .bind(&payload.email)
    .bind(&payload.phone)
    .bind(payload.birth_date)
    .bind(&payload.address)
    .bind(user_id)
    .execute(&pool)
    .await?;

    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(&pool)
        .await?;

    Ok(Json(user))
}

/// Change the current user's password.
///
/// Requires the current password plus a matching confirmation; clears the
/// forced-change flag set when an account is created with a generated
/// password.
pub async fn change_password(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.current_password.is_empty()
        || payload.new_password.is_empty()
        || payload.new_password_confirm.is_empty()
    {
        return Err(AppError::BadRequest("All fields are required".to_string()));
    }

    if payload.new_password != payload.new_password_confirm {
        return Err(AppError::BadRequest(
            "New passwords do not match".to_string(),
        ));
    }

    if payload.new_password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    let user_id = claims.user_id();

    let current_hash = sqlx::query_scalar::<_, String>("SELECT password FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    if !verify_password(&payload.current_password, &current_hash)? {
        return Err(AppError::BadRequest(
            "Current password is incorrect".to_string(),
        ));
    }

    let new_hash = hash_password(&payload.new_password)?;

    sqlx::query("UPDATE users SET password = ?, must_change_password = FALSE WHERE id = ?")
        .bind(new_hash)
        .bind(user_id)
        .execute(&pool)
        .await?;

    Ok(Json(json!({ "message": "Password updated" })))
}
