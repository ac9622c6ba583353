// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, catalog, enrollments, exams, grades, questions, retakes, topics, users},
    state::AppState,
    utils::jwt::{auth_middleware, staff_middleware},
};

/// Assembles the main application router.
///
/// * `/api/auth/login` is the only public route.
/// * Read routes sit behind authentication; handlers narrow what students
///   can see.
/// * `/api/manage/*` carries every staff mutation behind the staff check.
/// * `/api/users` is authenticated; the handlers enforce admin/staff rules
///   per operation.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new().route("/login", post(auth::login));

    let account_routes = Router::new()
        .route("/me", get(auth::me).put(auth::update_me))
        .route("/change-password", post(auth::change_password));

    let user_routes = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        .route(
            "/{id}",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        );

    let read_routes = Router::new()
        .route("/courses", get(catalog::list_courses))
        .route("/courses/{id}", get(catalog::get_course))
        .route("/promotions", get(catalog::list_promotions))
        .route("/promotions/{id}", get(catalog::get_promotion))
        .route("/topics", get(topics::list_topics))
        .route("/topics/{id}", get(topics::get_topic))
        .route("/materials", get(topics::list_materials))
        .route("/materials/{id}", get(topics::get_material))
        .route("/enrollments", get(enrollments::list_enrollments))
        .route("/enrollments/{id}", get(enrollments::get_enrollment))
        .route("/attendance", get(enrollments::list_attendance))
        .route("/attendance/{id}", get(enrollments::get_attendance))
        .route("/exams", get(exams::list_exams))
        .route("/exams/{id}", get(exams::get_exam))
        .route("/exams/{id}/attempt", get(exams::attempt_questions))
        .route("/exams/{id}/submit", post(exams::submit_exam))
        .route("/answers", get(exams::list_answers))
        .route("/answers/{id}", get(exams::get_answer))
        .route("/retakes", get(retakes::list_retakes))
        .route("/retakes/count", get(retakes::count_retakes))
        .route("/retakes/{id}", get(retakes::get_retake))
        .route("/grades", get(grades::list_grades))
        .route("/grades/{id}", get(grades::get_grade))
        .route("/averages", get(grades::list_averages))
        .route("/diplomas", get(grades::list_diplomas))
        .route("/diplomas/{id}", get(grades::get_diploma));

    let manage_routes = Router::new()
        .route("/courses", post(catalog::create_course))
        .route(
            "/courses/{id}",
            put(catalog::update_course).delete(catalog::delete_course),
        )
        .route("/promotions", post(catalog::create_promotion))
        .route(
            "/promotions/{id}",
            put(catalog::update_promotion).delete(catalog::delete_promotion),
        )
        .route("/topics", post(topics::create_topic))
        .route(
            "/topics/{id}",
            put(topics::update_topic).delete(topics::delete_topic),
        )
        .route("/materials", post(topics::create_material))
        .route(
            "/materials/{id}",
            put(topics::update_material).delete(topics::delete_material),
        )
        .route("/enrollments", post(enrollments::create_enrollment))
        .route(
            "/enrollments/{id}",
            put(enrollments::update_enrollment).delete(enrollments::delete_enrollment),
        )
        .route("/attendance", post(enrollments::create_attendance))
        .route(
            "/attendance/{id}",
            put(enrollments::update_attendance).delete(enrollments::delete_attendance),
        )
        .route(
            "/questions",
            get(questions::list_questions).post(questions::create_question),
        )
        .route(
            "/questions/{id}",
            get(questions::get_question)
                .put(questions::update_question)
                .delete(questions::delete_question),
        )
        .route("/exams", post(exams::create_exam))
        .route(
            "/exams/{id}",
            put(exams::update_exam).delete(exams::delete_exam),
        )
        .route("/retakes", post(retakes::create_retake))
        .route(
            "/retakes/{id}",
            put(retakes::update_retake).delete(retakes::delete_retake),
        )
        .route("/averages/recompute", post(grades::recompute_averages))
        .route("/diplomas/issue", post(grades::issue_diplomas))
        .route(
            "/diplomas/{id}",
            put(grades::update_diploma).delete(grades::delete_diploma),
        )
        // Auth first, then the staff check
        .layer(middleware::from_fn(staff_middleware));

    let protected = Router::new()
        .nest("/api/auth", account_routes)
        .nest("/api/users", user_routes)
        .nest("/api", read_routes)
        .nest("/api/manage", manage_routes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .merge(protected)
        // Global middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
