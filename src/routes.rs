// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{attempts, auth, quizzes, reports},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, quizzes, attempts, reports).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (Database Pool + Config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let quiz_routes = Router::new()
        .route("/", get(quizzes::list_quizzes))
        .route("/{id}", get(quizzes::get_quiz))
        .route("/{id}/start", post(attempts::start_attempt))
        // Authoring and analytics require the admin capability
        .merge(
            Router::new()
                .route("/", post(quizzes::create_quiz))
                .route(
                    "/{id}",
                    put(quizzes::update_quiz).delete(quizzes::delete_quiz),
                )
                .route("/{id}/questions", post(quizzes::add_question))
                .route("/{id}/analytics", get(reports::quiz_analytics))
                .layer(middleware::from_fn(admin_middleware)),
        );

    let attempt_routes = Router::new()
        .route("/{id}/next", get(attempts::next_question))
        .route("/{id}/answers", post(attempts::submit_answer))
        .route("/{id}/result", get(attempts::attempt_result));

    let report_routes = Router::new()
        .route("/dashboard", get(reports::dashboard))
        .route("/submissions", get(reports::submission_history))
        .route("/submissions/{id}", get(reports::submission_detail));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest(
            "/api",
            Router::new()
                .nest("/quizzes", quiz_routes)
                .nest("/attempts", attempt_routes)
                .nest("/reports", report_routes)
                // Everything outside /api/auth requires a valid token
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        )
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
