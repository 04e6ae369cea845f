// tests/api_tests.rs

use quizdeck::{config::Config, routes, state::AppState, utils::hash::hash_password};
use serde_json::{Value, json};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

/// Helper to spawn the app on a random port against an in-memory database.
/// Returns the base URL and a handle to the pool for direct fixture work.
async fn spawn_app() -> (String, SqlitePool) {
    // A single connection keeps the in-memory database alive and shared
    // between the server and the test's own fixture queries.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory sqlite");

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

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, pool)
}

fn unique_username(prefix: &str) -> String {
    format!("{}_{}", prefix, &uuid::Uuid::new_v4().simple().to_string()[..12])
}

/// Inserts a privileged user directly and returns (username, password).
async fn seed_admin(pool: &SqlitePool) -> (String, String) {
    let username = unique_username("admin");
    let password = "admin_pass".to_string();
    let hashed = hash_password(&password).unwrap();

    sqlx::query(
        "INSERT INTO users (username, password, role, is_staff, created_at)
         VALUES (?, ?, 'admin', 1, ?)",
    )
    .bind(&username)
    .bind(hashed)
    .bind(chrono::Utc::now())
    .execute(pool)
    .await
    .unwrap();

    (username, password)
}

async fn register(client: &reqwest::Client, address: &str, username: &str, password: &str) {
    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
}

async fn login(client: &reqwest::Client, address: &str, username: &str, password: &str) -> String {
    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

/// Creates a quiz with one MCQ (correct 'a') and one short answer ("Paris").
/// Returns (quiz_id, mcq_id, short_answer_id).
async fn author_geo_quiz(
    client: &reqwest::Client,
    address: &str,
    admin_token: &str,
    duration_minutes: i64,
) -> (i64, i64, i64) {
    let response = client
        .post(format!("{}/api/quizzes", address))
        .bearer_auth(admin_token)
        .json(&json!({ "title": "Geo101", "duration_minutes": duration_minutes }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let quiz: Value = response.json().await.unwrap();
    let quiz_id = quiz["id"].as_i64().unwrap();

    let response = client
        .post(format!("{}/api/quizzes/{}/questions", address, quiz_id))
        .bearer_auth(admin_token)
        .json(&json!({
            "question_text": "Which city is the capital of France?",
            "question_type": "mcq",
            "option_a": "Paris",
            "option_b": "London",
            "correct_option": "a"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let q1: Value = response.json().await.unwrap();

    let response = client
        .post(format!("{}/api/quizzes/{}/questions", address, quiz_id))
        .bearer_auth(admin_token)
        .json(&json!({
            "question_text": "Name the capital of France.",
            "question_type": "short_answer",
            "correct_answer": "Paris"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 201);
    let q2: Value = response.json().await.unwrap();

    (quiz_id, q1["id"].as_i64().unwrap(), q2["id"].as_i64().unwrap())
}

async fn start_attempt(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    quiz_id: i64,
) -> Value {
    let response = client
        .post(format!("{}/api/quizzes/{}/start", address, quiz_id))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    response.json().await.unwrap()
}

async fn answer(
    client: &reqwest::Client,
    address: &str,
    token: &str,
    submission_id: i64,
    question_id: i64,
    raw: &str,
) -> reqwest::Response {
    client
        .post(format!("{}/api/attempts/{}/answers", address, submission_id))
        .bearer_auth(token)
        .json(&json!({ "question_id": question_id, "answer": raw }))
        .send()
        .await
        .unwrap()
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_then_login_works() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let username = unique_username("alice");

    register(&client, &address, &username, "password123").await;
    let token = login(&client, &address, &username, "password123").await;
    assert!(!token.is_empty());
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let username = unique_username("alice");

    register(&client, &address, &username, "password123").await;

    let response = client
        .post(format!("{}/api/auth/register", address))
        .json(&json!({ "username": username, "password": "password123" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let username = unique_username("alice");

    register(&client, &address, &username, "password123").await;

    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&json!({ "username": username, "password": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn quiz_list_requires_a_token() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/quizzes", address))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn regular_user_cannot_author_quizzes() {
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let username = unique_username("bob");

    register(&client, &address, &username, "password123").await;
    let token = login(&client, &address, &username, "password123").await;

    let response = client
        .post(format!("{}/api/quizzes", address))
        .bearer_auth(&token)
        .json(&json!({ "title": "Nope", "duration_minutes": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn authoring_validation_rejects_half_valid_questions() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (admin, password) = seed_admin(&pool).await;
    let admin_token = login(&client, &address, &admin, &password).await;

    let response = client
        .post(format!("{}/api/quizzes", address))
        .bearer_auth(&admin_token)
        .json(&json!({ "title": "Geo101", "duration_minutes": 5 }))
        .send()
        .await
        .unwrap();
    let quiz: Value = response.json().await.unwrap();
    let quiz_id = quiz["id"].as_i64().unwrap();

    // MCQ missing option B
    let response = client
        .post(format!("{}/api/quizzes/{}/questions", address, quiz_id))
        .bearer_auth(&admin_token)
        .json(&json!({
            "question_text": "Incomplete",
            "question_type": "mcq",
            "option_a": "Only one",
            "correct_option": "a"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Short answer without a reference answer
    let response = client
        .post(format!("{}/api/quizzes/{}/questions", address, quiz_id))
        .bearer_auth(&admin_token)
        .json(&json!({
            "question_text": "No reference",
            "question_type": "short_answer"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // Nothing was persisted half-valid
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE quiz_id = ?")
        .bind(quiz_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn zero_duration_quiz_is_rejected() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (admin, password) = seed_admin(&pool).await;
    let admin_token = login(&client, &address, &admin, &password).await;

    let response = client
        .post(format!("{}/api/quizzes", address))
        .bearer_auth(&admin_token)
        .json(&json!({ "title": "Geo101", "duration_minutes": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn full_run_scores_100_and_feeds_analytics() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (admin, admin_password) = seed_admin(&pool).await;
    let admin_token = login(&client, &address, &admin, &admin_password).await;
    let (quiz_id, q1, q2) = author_geo_quiz(&client, &address, &admin_token, 5).await;

    let username = unique_username("carol");
    register(&client, &address, &username, "password123").await;
    let token = login(&client, &address, &username, "password123").await;

    let started = start_attempt(&client, &address, &token, quiz_id).await;
    let submission_id = started["submission"]["id"].as_i64().unwrap();
    assert_eq!(started["submission"]["total_questions"], 2);

    // First question arrives in creation order
    let response = client
        .get(format!("{}/api/attempts/{}/next", address, submission_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let next: Value = response.json().await.unwrap();
    assert_eq!(next["question"]["id"].as_i64().unwrap(), q1);

    let response = answer(&client, &address, &token, submission_id, q1, "a").await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["completed"], false);
    assert_eq!(body["next_question"]["id"].as_i64().unwrap(), q2);

    // Whitespace and case are irrelevant for short answers
    let response = answer(&client, &address, &token, submission_id, q2, " paris ").await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["completed"], true);

    let response = client
        .get(format!("{}/api/attempts/{}/result", address, submission_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["score"].as_f64().unwrap(), 100.0);
    assert_eq!(result["correct_answers"], 2);
    assert_eq!(result["total_questions"], 2);
    assert_eq!(result["answers"].as_array().unwrap().len(), 2);

    // Analytics see the completed attempt
    let response = client
        .get(format!("{}/api/quizzes/{}/analytics", address, quiz_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let analytics: Value = response.json().await.unwrap();
    assert_eq!(analytics["total_attempts"], 1);
    assert_eq!(analytics["average_score"].as_f64().unwrap(), 100.0);
    assert_eq!(analytics["score_ranges"]["90-100"], 1);
    assert_eq!(analytics["score_ranges"]["0-59"], 0);
    let question_stats = analytics["question_stats"].as_array().unwrap();
    assert_eq!(question_stats.len(), 2);
    assert_eq!(question_stats[0]["accuracy"].as_f64().unwrap(), 100.0);

    // And so does the user's dashboard
    let response = client
        .get(format!("{}/api/reports/dashboard", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let dashboard: Value = response.json().await.unwrap();
    assert_eq!(dashboard["quizzes_taken"], 1);
    assert_eq!(dashboard["best_score"].as_f64().unwrap(), 100.0);
}

#[tokio::test]
async fn all_wrong_answers_score_0() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (admin, admin_password) = seed_admin(&pool).await;
    let admin_token = login(&client, &address, &admin, &admin_password).await;
    let (quiz_id, q1, q2) = author_geo_quiz(&client, &address, &admin_token, 5).await;

    let username = unique_username("dave");
    register(&client, &address, &username, "password123").await;
    let token = login(&client, &address, &username, "password123").await;

    let started = start_attempt(&client, &address, &token, quiz_id).await;
    let submission_id = started["submission"]["id"].as_i64().unwrap();

    answer(&client, &address, &token, submission_id, q1, "b").await;
    answer(&client, &address, &token, submission_id, q2, "London").await;

    let response = client
        .get(format!("{}/api/attempts/{}/result", address, submission_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["score"].as_f64().unwrap(), 0.0);
    assert_eq!(result["correct_answers"], 0);
}

#[tokio::test]
async fn starting_twice_resumes_the_same_attempt() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (admin, admin_password) = seed_admin(&pool).await;
    let admin_token = login(&client, &address, &admin, &admin_password).await;
    let (quiz_id, _q1, _q2) = author_geo_quiz(&client, &address, &admin_token, 5).await;

    let username = unique_username("erin");
    register(&client, &address, &username, "password123").await;
    let token = login(&client, &address, &username, "password123").await;

    let first = start_attempt(&client, &address, &token, quiz_id).await;
    let second = start_attempt(&client, &address, &token, quiz_id).await;
    assert_eq!(first["submission"]["id"], second["submission"]["id"]);
}

#[tokio::test]
async fn double_submitting_an_answer_is_rejected() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (admin, admin_password) = seed_admin(&pool).await;
    let admin_token = login(&client, &address, &admin, &admin_password).await;
    let (quiz_id, q1, _q2) = author_geo_quiz(&client, &address, &admin_token, 5).await;

    let username = unique_username("frank");
    register(&client, &address, &username, "password123").await;
    let token = login(&client, &address, &username, "password123").await;

    let started = start_attempt(&client, &address, &token, quiz_id).await;
    let submission_id = started["submission"]["id"].as_i64().unwrap();

    let response = answer(&client, &address, &token, submission_id, q1, "a").await;
    assert_eq!(response.status().as_u16(), 200);

    let response = answer(&client, &address, &token, submission_id, q1, "b").await;
    assert_eq!(response.status().as_u16(), 409);

    // The correctness count is unaffected by the rejected resubmission
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM user_answers WHERE submission_id = ? AND is_correct = 1",
    )
    .bind(submission_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn expired_attempt_rejects_late_answers() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (admin, admin_password) = seed_admin(&pool).await;
    let admin_token = login(&client, &address, &admin, &admin_password).await;
    let (quiz_id, q1, _q2) = author_geo_quiz(&client, &address, &admin_token, 1).await;

    let username = unique_username("grace");
    register(&client, &address, &username, "password123").await;
    let token = login(&client, &address, &username, "password123").await;

    let started = start_attempt(&client, &address, &token, quiz_id).await;
    let submission_id = started["submission"]["id"].as_i64().unwrap();

    // Simulate waiting past the 1-minute duration
    sqlx::query("UPDATE submissions SET started_at = ? WHERE id = ?")
        .bind(chrono::Utc::now() - chrono::Duration::minutes(2))
        .bind(submission_id)
        .execute(&pool)
        .await
        .unwrap();

    let response = answer(&client, &address, &token, submission_id, q1, "a").await;
    assert_eq!(response.status().as_u16(), 409);

    // Force-finalized over answered-so-far: zero answers, score 0
    let response = client
        .get(format!("{}/api/attempts/{}/result", address, submission_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let result: Value = response.json().await.unwrap();
    assert_eq!(result["score"].as_f64().unwrap(), 0.0);
    assert_eq!(result["answers"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn foreign_submissions_read_as_not_found() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (admin, admin_password) = seed_admin(&pool).await;
    let admin_token = login(&client, &address, &admin, &admin_password).await;
    let (quiz_id, _q1, _q2) = author_geo_quiz(&client, &address, &admin_token, 5).await;

    let owner = unique_username("henry");
    register(&client, &address, &owner, "password123").await;
    let owner_token = login(&client, &address, &owner, "password123").await;
    let started = start_attempt(&client, &address, &owner_token, quiz_id).await;
    let submission_id = started["submission"]["id"].as_i64().unwrap();

    let intruder = unique_username("iris");
    register(&client, &address, &intruder, "password123").await;
    let intruder_token = login(&client, &address, &intruder, "password123").await;

    let response = client
        .get(format!("{}/api/attempts/{}/next", address, submission_id))
        .bearer_auth(&intruder_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn soft_deleted_quiz_disappears_from_listing_and_start() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    let (admin, admin_password) = seed_admin(&pool).await;
    let admin_token = login(&client, &address, &admin, &admin_password).await;
    let (quiz_id, _q1, _q2) = author_geo_quiz(&client, &address, &admin_token, 5).await;

    let response = client
        .delete(format!("{}/api/quizzes/{}", address, quiz_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 204);

    // The row survives with the active flag cleared
    let is_active: bool = sqlx::query_scalar("SELECT is_active FROM quizzes WHERE id = ?")
        .bind(quiz_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(!is_active);

    let response = client
        .get(format!("{}/api/quizzes", address))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    let quizzes: Value = response.json().await.unwrap();
    assert!(quizzes.as_array().unwrap().is_empty());

    let response = client
        .post(format!("{}/api/quizzes/{}/start", address, quiz_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}
