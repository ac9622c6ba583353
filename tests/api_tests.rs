// tests/api_tests.rs

use academia::{config::Config, routes, state::AppState, utils::hash::hash_password};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL and the pool so tests can seed rows directly.
async fn spawn_app() -> (String, SqlitePool) {
    // In-memory SQLite; a single kept-alive connection owns the database
    // for the lifetime of the test.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, pool)
}

/// Inserts a user directly and returns its id.
async fn seed_user(pool: &SqlitePool, username: &str, password: &str, role: &str) -> i64 {
    let hashed = hash_password(password).unwrap();
    sqlx::query("INSERT INTO users (username, password, role) VALUES (?, ?, ?)")
        .bind(username)
        .bind(hashed)
        .bind(role)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
}

/// Logs in through the API and returns the bearer token.
async fn login(client: &reqwest::Client, address: &str, username: &str, password: &str) -> String {
    let body: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": username, "password": password}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn unknown_path_returns_404() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn protected_routes_require_token() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/courses", address))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn login_works_and_rejects_bad_password() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    seed_user(&pool, "maria", "password123", "admin").await;

    // Act: correct credentials
    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": "maria", "password": "password123"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["token"].as_str().is_some());
    assert_eq!(body["must_change_password"], false);

    // Act: wrong password
    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": "maria", "password": "nope"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn inactive_users_cannot_login() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let id = seed_user(&pool, "gone", "password123", "student").await;

    sqlx::query("UPDATE users SET active = FALSE WHERE id = ?")
        .bind(id)
        .execute(&pool)
        .await
        .unwrap();

    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": "gone", "password": "password123"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn students_cannot_use_manage_routes() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    seed_user(&pool, "alumno", "password123", "student").await;
    let token = login(&client, &address, "alumno", "password123").await;

    let response = client
        .post(format!("{}/api/manage/courses", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"name": "Patristics"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn teachers_can_use_manage_routes_but_not_create_users() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    seed_user(&pool, "profesor", "password123", "teacher").await;
    let token = login(&client, &address, "profesor", "password123").await;

    let response = client
        .post(format!("{}/api/manage/courses", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"name": "Patristics"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    // User creation is admin only.
    let response = client
        .post(format!("{}/api/users", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"username": "newbie", "role": "student"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn admin_creates_user_with_generated_password() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    seed_user(&pool, "rector", "password123", "admin").await;
    let admin_token = login(&client, &address, "rector", "password123").await;

    // Act: no password supplied
    let response = client
        .post(format!("{}/api/users", address))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&serde_json::json!({
            "username": "seminarista",
            "role": "student",
            "first_name": "Juan",
            "last_name": "Perez"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let body: serde_json::Value = response.json().await.unwrap();
    let generated = body["generated_password"].as_str().unwrap().to_string();
    assert!(!generated.is_empty());
    assert_eq!(body["must_change_password"], true);

    // The generated password works, and the flag travels with the login.
    let login_body: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": "seminarista", "password": generated}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(login_body["must_change_password"], true);
    let student_token = login_body["token"].as_str().unwrap();

    // Changing the password clears the flag.
    let response = client
        .post(format!("{}/api/auth/change-password", address))
        .header("Authorization", format!("Bearer {}", student_token))
        .json(&serde_json::json!({
            "current_password": generated,
            "new_password": "brandnew",
            "new_password_confirm": "brandnew"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let login_body: serde_json::Value = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({"username": "seminarista", "password": "brandnew"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(login_body["must_change_password"], false);

    // Duplicate usernames are a conflict.
    let response = client
        .post(format!("{}/api/users", address))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&serde_json::json!({"username": "seminarista", "role": "student"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn admin_updates_users_but_teachers_cannot() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    seed_user(&pool, "rector", "password123", "admin").await;
    seed_user(&pool, "profesor", "password123", "teacher").await;
    let student_id = seed_user(&pool, "alumno", "password123", "student").await;

    // Teachers hold no user-administration rights.
    let teacher_token = login(&client, &address, "profesor", "password123").await;
    let response = client
        .put(format!("{}/api/users/{}", address, student_id))
        .header("Authorization", format!("Bearer {}", teacher_token))
        .json(&serde_json::json!({"first_name": "Luis"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // Admins can correct any detail, including the birth date.
    let admin_token = login(&client, &address, "rector", "password123").await;
    let response = client
        .put(format!("{}/api/users/{}", address, student_id))
        .header("Authorization", format!("Bearer {}", admin_token))
        .json(&serde_json::json!({
            "first_name": "Luis",
            "birth_date": "1990-05-01"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let user: serde_json::Value = client
        .get(format!("{}/api/users/{}", address, student_id))
        .header("Authorization", format!("Bearer {}", admin_token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(user["first_name"], "Luis");
    assert_eq!(user["birth_date"], "1990-05-01");
}

#[tokio::test]
async fn profile_update_and_me() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    seed_user(&pool, "alumno", "password123", "student").await;
    let token = login(&client, &address, "alumno", "password123").await;

    let response = client
        .put(format!("{}/api/auth/me", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({
            "first_name": "Ana",
            "email": "ana@example.com"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let me: serde_json::Value = client
        .get(format!("{}/api/auth/me", address))
        .header("Authorization", format!("Bearer {}", token))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(me["first_name"], "Ana");
    assert_eq!(me["email"], "ana@example.com");
    // The hash never leaves the server.
    assert!(me.get("password").is_none());
}

#[tokio::test]
async fn duplicate_topic_number_is_a_conflict() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    seed_user(&pool, "rector", "password123", "admin").await;
    let token = login(&client, &address, "rector", "password123").await;

    let course: serde_json::Value = client
        .post(format!("{}/api/manage/courses", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&serde_json::json!({"name": "Liturgy"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let course_id = course["id"].as_i64().unwrap();

    let topic = serde_json::json!({
        "course_id": course_id,
        "topic_number": 1,
        "title": "Introduction"
    });

    let response = client
        .post(format!("{}/api/manage/topics", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&topic)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let response = client
        .post(format!("{}/api/manage/topics", address))
        .header("Authorization", format!("Bearer {}", token))
        .json(&topic)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
}
