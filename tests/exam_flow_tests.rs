// tests/exam_flow_tests.rs
//
// End-to-end exam lifecycle: catalog setup, a normal attempt, a retake, the
// recomputed promotion average and diploma issuance.

use academia::{config::Config, routes, state::AppState, utils::hash::hash_password};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

async fn spawn_app() -> (String, SqlitePool) {
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
        jwt_secret: "exam_flow_test_secret".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
    };

    let app = routes::create_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, pool)
}

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

/// POSTs to a manage endpoint and returns the created row id.
async fn create(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    path: &str,
    body: serde_json::Value,
) -> i64 {
    let response = client
        .post(format!("{}/api/manage/{}", address, path))
        .header("Authorization", format!("Bearer {}", token))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201, "create {} failed", path);

    let body: serde_json::Value = response.json().await.unwrap();
    body["id"].as_i64().unwrap()
}

/// Builds a course with one topic, an answer bank and an exam over it.
/// Returns (promotion_id, topic_id, exam_id, question ids).
async fn build_catalog(
    client: &reqwest::Client,
    address: &str,
    token: &str,
) -> (i64, i64, i64, Vec<i64>) {
    let course_id = create(
        client,
        address,
        token,
        "courses",
        serde_json::json!({"name": "Church History"}),
    )
    .await;

    let promotion_id = create(
        client,
        address,
        token,
        "promotions",
        serde_json::json!({
            "course_id": course_id,
            "name": "Cohort 2026",
            "start_date": "2026-01-12"
        }),
    )
    .await;

    let topic_id = create(
        client,
        address,
        token,
        "topics",
        serde_json::json!({
            "course_id": course_id,
            "topic_number": 1,
            "title": "The Early Church"
        }),
    )
    .await;

    let q1 = create(
        client,
        address,
        token,
        "questions",
        serde_json::json!({
            "topic_id": topic_id,
            "text": "In which city was the first council held?",
            "question_type": "multiple_choice",
            "option_a": "Nicaea",
            "option_b": "Rome",
            "option_c": "Alexandria",
            "option_d": "Antioch",
            "correct_answer": "a"
        }),
    )
    .await;

    let q2 = create(
        client,
        address,
        token,
        "questions",
        serde_json::json!({
            "topic_id": topic_id,
            "text": "The Edict of Milan was issued in 313.",
            "question_type": "true_false",
            "correct_answer": "true"
        }),
    )
    .await;

    let exam_id = create(
        client,
        address,
        token,
        "exams",
        serde_json::json!({
            "topic_id": topic_id,
            "title": "Topic 1 exam",
            "question_count": 2,
            "points_per_question": 5
        }),
    )
    .await;

    (promotion_id, topic_id, exam_id, vec![q1, q2])
}

#[tokio::test]
async fn full_exam_retake_and_diploma_flow() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();

    seed_user(&pool, "rector", "password123", "admin").await;
    let admin = login(&client, &address, "rector", "password123").await;

    let (promotion_id, _topic_id, exam_id, questions) =
        build_catalog(&client, &address, &admin).await;

    let student_id = seed_user(&pool, "alumno", "password123", "student").await;
    let enrollment_id = create(
        &client,
        &address,
        &admin,
        "enrollments",
        serde_json::json!({"student_id": student_id, "promotion_id": promotion_id}),
    )
    .await;

    let student = login(&client, &address, "alumno", "password123").await;

    // 1. The attempt hands out sanitized questions.
    let response = client
        .get(format!("{}/api/exams/{}/attempt", address, exam_id))
        .header("Authorization", format!("Bearer {}", student))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let paper: serde_json::Value = response.json().await.unwrap();
    assert_eq!(paper["question_count"], 2);
    assert_eq!(paper["total_points"], 10);
    let handed = paper["questions"].as_array().unwrap();
    assert_eq!(handed.len(), 2);
    for q in handed {
        assert!(q.get("correct_answer").is_none());
    }

    // 2. An incomplete submission is rejected before anything is written.
    let response = client
        .post(format!("{}/api/exams/{}/submit", address, exam_id))
        .header("Authorization", format!("Bearer {}", student))
        .json(&serde_json::json!({
            "answers": [{"question_id": questions[0], "answer": "a"}]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // 3. Normal attempt: one right (case-insensitive), one wrong.
    let response = client
        .post(format!("{}/api/exams/{}/submit", address, exam_id))
        .header("Authorization", format!("Bearer {}", student))
        .json(&serde_json::json!({
            "answers": [
                {"question_id": questions[0], "answer": "A"},
                {"question_id": questions[1], "answer": "false"}
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let grade: serde_json::Value = response.json().await.unwrap();
    assert_eq!(grade["percentage"], 50.0);
    assert_eq!(grade["points_earned"], 5.0);
    assert!(grade["retake_window_id"].is_null());

    // 4. The recorded answers are readable, scoped to the student.
    let answers: Vec<serde_json::Value> = client
        .get(format!("{}/api/answers?exam={}", address, exam_id))
        .header("Authorization", format!("Bearer {}", student))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(answers.len(), 2);
    let correct = answers.iter().filter(|a| a["is_correct"] == true).count();
    assert_eq!(correct, 1);

    // 5. A second normal attempt is forbidden.
    let response = client
        .post(format!("{}/api/exams/{}/submit", address, exam_id))
        .header("Authorization", format!("Bearer {}", student))
        .json(&serde_json::json!({
            "answers": [
                {"question_id": questions[0], "answer": "a"},
                {"question_id": questions[1], "answer": "true"}
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // 6. Staff authorizes a retake; the student aces it.
    let retake_id = create(
        &client,
        &address,
        &admin,
        "retakes",
        serde_json::json!({"exam_id": exam_id, "enrollment_id": enrollment_id}),
    )
    .await;

    let response = client
        .post(format!("{}/api/exams/{}/submit", address, exam_id))
        .header("Authorization", format!("Bearer {}", student))
        .json(&serde_json::json!({
            "retake_window": retake_id,
            "answers": [
                {"question_id": questions[0], "answer": "a"},
                {"question_id": questions[1], "answer": "true"}
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);

    let retake_grade: serde_json::Value = response.json().await.unwrap();
    assert_eq!(retake_grade["percentage"], 100.0);
    assert_eq!(retake_grade["retake_window_id"], retake_id);

    // 7. The consumed window cannot be used again.
    let response = client
        .post(format!("{}/api/exams/{}/submit", address, exam_id))
        .header("Authorization", format!("Bearer {}", student))
        .json(&serde_json::json!({
            "retake_window": retake_id,
            "answers": [
                {"question_id": questions[0], "answer": "a"},
                {"question_id": questions[1], "answer": "true"}
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // 8. Recompute: the retake grade replaces the normal one.
    let response = client
        .post(format!("{}/api/manage/averages/recompute", address))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&serde_json::json!({"promotion_id": promotion_id}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let averages: Vec<serde_json::Value> = client
        .get(format!("{}/api/averages", address))
        .header("Authorization", format!("Bearer {}", student))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(averages.len(), 1);
    assert_eq!(averages[0]["average"], 100.0);
    assert_eq!(averages[0]["passed"], true);

    // 9. Diplomas: issued once, never twice.
    let issued: serde_json::Value = client
        .post(format!("{}/api/manage/diplomas/issue", address))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&serde_json::json!({"promotion_id": promotion_id}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let diplomas = issued["diplomas"].as_array().unwrap();
    assert_eq!(diplomas.len(), 1);
    assert!(
        diplomas[0]["code"].as_str().unwrap().starts_with("DIP-"),
        "unexpected code {}",
        diplomas[0]["code"]
    );

    let issued_again: serde_json::Value = client
        .post(format!("{}/api/manage/diplomas/issue", address))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&serde_json::json!({"promotion_id": promotion_id}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(issued_again["diplomas"].as_array().unwrap().len(), 0);

    // The student sees their diploma.
    let mine: Vec<serde_json::Value> = client
        .get(format!("{}/api/diplomas", address))
        .header("Authorization", format!("Bearer {}", student))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
}

#[tokio::test]
async fn unenrolled_students_cannot_attempt() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();

    seed_user(&pool, "rector", "password123", "admin").await;
    let admin = login(&client, &address, "rector", "password123").await;
    let (_promotion_id, _topic_id, exam_id, _questions) =
        build_catalog(&client, &address, &admin).await;

    seed_user(&pool, "intruso", "password123", "student").await;
    let student = login(&client, &address, "intruso", "password123").await;

    let response = client
        .get(format!("{}/api/exams/{}/attempt", address, exam_id))
        .header("Authorization", format!("Bearer {}", student))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn attempt_rejected_when_bank_is_too_small() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();

    seed_user(&pool, "rector", "password123", "admin").await;
    let admin = login(&client, &address, "rector", "password123").await;

    let course_id = create(
        &client,
        &address,
        &admin,
        "courses",
        serde_json::json!({"name": "Canon Law"}),
    )
    .await;
    let promotion_id = create(
        &client,
        &address,
        &admin,
        "promotions",
        serde_json::json!({
            "course_id": course_id,
            "name": "Cohort 2026",
            "start_date": "2026-01-12"
        }),
    )
    .await;
    let topic_id = create(
        &client,
        &address,
        &admin,
        "topics",
        serde_json::json!({"course_id": course_id, "topic_number": 1, "title": "Sources"}),
    )
    .await;
    create(
        &client,
        &address,
        &admin,
        "questions",
        serde_json::json!({
            "topic_id": topic_id,
            "text": "Is custom a source of canon law?",
            "question_type": "true_false",
            "correct_answer": "true"
        }),
    )
    .await;
    // Exam wants ten questions; the bank has one.
    let exam_id = create(
        &client,
        &address,
        &admin,
        "exams",
        serde_json::json!({"topic_id": topic_id, "question_count": 10}),
    )
    .await;

    let student_id = seed_user(&pool, "alumno", "password123", "student").await;
    create(
        &client,
        &address,
        &admin,
        "enrollments",
        serde_json::json!({"student_id": student_id, "promotion_id": promotion_id}),
    )
    .await;
    let student = login(&client, &address, "alumno", "password123").await;

    let response = client
        .get(format!("{}/api/exams/{}/attempt", address, exam_id))
        .header("Authorization", format!("Bearer {}", student))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn availability_windows_gate_attempts() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();

    seed_user(&pool, "rector", "password123", "admin").await;
    let admin = login(&client, &address, "rector", "password123").await;
    let (promotion_id, _topic_id, exam_id, questions) =
        build_catalog(&client, &address, &admin).await;

    let student_id = seed_user(&pool, "alumno", "password123", "student").await;
    let enrollment_id = create(
        &client,
        &address,
        &admin,
        "enrollments",
        serde_json::json!({"student_id": student_id, "promotion_id": promotion_id}),
    )
    .await;
    let student = login(&client, &address, "alumno", "password123").await;

    // The exam window closed years ago.
    let response = client
        .put(format!("{}/api/manage/exams/{}", address, exam_id))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&serde_json::json!({"ends_at": "2020-01-01T00:00:00Z"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let response = client
        .get(format!("{}/api/exams/{}/attempt", address, exam_id))
        .header("Authorization", format!("Bearer {}", student))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // A retake window that has not opened yet is just as closed.
    let early_retake = create(
        &client,
        &address,
        &admin,
        "retakes",
        serde_json::json!({
            "exam_id": exam_id,
            "enrollment_id": enrollment_id,
            "starts_at": "2099-01-01T00:00:00Z"
        }),
    )
    .await;

    let response = client
        .get(format!(
            "{}/api/exams/{}/attempt?retake_window={}",
            address, exam_id, early_retake
        ))
        .header("Authorization", format!("Bearer {}", student))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);

    // An unbounded retake window reopens the exam.
    let open_retake = create(
        &client,
        &address,
        &admin,
        "retakes",
        serde_json::json!({"exam_id": exam_id, "enrollment_id": enrollment_id}),
    )
    .await;

    let response = client
        .post(format!("{}/api/exams/{}/submit", address, exam_id))
        .header("Authorization", format!("Bearer {}", student))
        .json(&serde_json::json!({
            "retake_window": open_retake,
            "answers": [
                {"question_id": questions[0], "answer": "a"},
                {"question_id": questions[1], "answer": "true"}
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
}

#[tokio::test]
async fn retake_count_is_scoped_to_its_student() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();

    seed_user(&pool, "rector", "password123", "admin").await;
    let admin = login(&client, &address, "rector", "password123").await;
    let (promotion_id, _topic_id, exam_id, _questions) =
        build_catalog(&client, &address, &admin).await;

    let student_id = seed_user(&pool, "alumno", "password123", "student").await;
    let enrollment_id = create(
        &client,
        &address,
        &admin,
        "enrollments",
        serde_json::json!({"student_id": student_id, "promotion_id": promotion_id}),
    )
    .await;

    for _ in 0..2 {
        create(
            &client,
            &address,
            &admin,
            "retakes",
            serde_json::json!({"exam_id": exam_id, "enrollment_id": enrollment_id}),
        )
        .await;
    }

    let student = login(&client, &address, "alumno", "password123").await;
    let count: serde_json::Value = client
        .get(format!(
            "{}/api/retakes/count?enrollment={}",
            address, enrollment_id
        ))
        .header("Authorization", format!("Bearer {}", student))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(count["enrollment_id"], enrollment_id);
    assert_eq!(count["total_retakes"], 2);

    // Another student cannot read someone else's count.
    seed_user(&pool, "intruso", "password123", "student").await;
    let other = login(&client, &address, "intruso", "password123").await;
    let response = client
        .get(format!(
            "{}/api/retakes/count?enrollment={}",
            address, enrollment_id
        ))
        .header("Authorization", format!("Bearer {}", other))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn second_exam_on_same_topic_is_a_conflict() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();

    seed_user(&pool, "rector", "password123", "admin").await;
    let admin = login(&client, &address, "rector", "password123").await;
    let (_promotion_id, topic_id, _exam_id, _questions) =
        build_catalog(&client, &address, &admin).await;

    let response = client
        .post(format!("{}/api/manage/exams", address))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&serde_json::json!({"topic_id": topic_id}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn attendance_is_unique_per_topic_and_visible_to_its_student() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();

    seed_user(&pool, "rector", "password123", "admin").await;
    let admin = login(&client, &address, "rector", "password123").await;
    let (promotion_id, topic_id, _exam_id, _questions) =
        build_catalog(&client, &address, &admin).await;

    let student_id = seed_user(&pool, "alumno", "password123", "student").await;
    let enrollment_id = create(
        &client,
        &address,
        &admin,
        "enrollments",
        serde_json::json!({"student_id": student_id, "promotion_id": promotion_id}),
    )
    .await;

    create(
        &client,
        &address,
        &admin,
        "attendance",
        serde_json::json!({
            "enrollment_id": enrollment_id,
            "topic_id": topic_id,
            "status": "present"
        }),
    )
    .await;

    // Same (enrollment, topic) pair again: conflict.
    let response = client
        .post(format!("{}/api/manage/attendance", address))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&serde_json::json!({
            "enrollment_id": enrollment_id,
            "topic_id": topic_id,
            "status": "late"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);

    // An unknown status never reaches the database.
    let response = client
        .post(format!("{}/api/manage/attendance", address))
        .header("Authorization", format!("Bearer {}", admin))
        .json(&serde_json::json!({
            "enrollment_id": enrollment_id,
            "topic_id": topic_id,
            "status": "asleep"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let student = login(&client, &address, "alumno", "password123").await;
    let records: Vec<serde_json::Value> = client
        .get(format!("{}/api/attendance", address))
        .header("Authorization", format!("Bearer {}", student))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["status"], "present");
}
