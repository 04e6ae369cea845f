// src/handlers/quizzes.rs
//
// Quiz catalog: authoring and browsing. Admin-gated operations sit behind the
// admin middleware layer in routes.rs.

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    attempt,
    error::AppError,
    models::quiz::{
        CreateQuestionRequest, CreateQuizRequest, PublicQuestion, Question, Quiz,
        UpdateQuizRequest,
    },
    utils::jwt::Claims,
};

/// Lists active quizzes, newest first.
pub async fn list_quizzes(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let quizzes = sqlx::query_as::<_, Quiz>(
        "SELECT id, title, description, duration_minutes, created_by, is_active, created_at, updated_at
         FROM quizzes WHERE is_active = 1
         ORDER BY created_at DESC, id DESC",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list quizzes: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(quizzes))
}

/// Quiz detail: the quiz plus its questions in stable creation order, with
/// answers stripped from the payload.
pub async fn get_quiz(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = attempt::fetch_active_quiz(&pool, id).await?;

    let questions = sqlx::query_as::<_, Question>(
        "SELECT id, quiz_id, question_text, question_type, option_a, option_b, option_c, option_d,
                correct_option, correct_answer, points, created_at
         FROM questions WHERE quiz_id = ?
         ORDER BY created_at, id",
    )
    .bind(id)
    .fetch_all(&pool)
    .await?;

    let questions: Vec<PublicQuestion> = questions.into_iter().map(Into::into).collect();

    Ok(Json(serde_json::json!({
        "quiz": quiz,
        "questions": questions,
    })))
}

/// Creates a new quiz.
/// Admin only.
pub async fn create_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let now = Utc::now();
    let quiz = sqlx::query_as::<_, Quiz>(
        "INSERT INTO quizzes (title, description, duration_minutes, created_by, is_active, created_at, updated_at)
         VALUES (?, ?, ?, ?, 1, ?, ?)
         RETURNING id, title, description, duration_minutes, created_by, is_active, created_at, updated_at",
    )
    .bind(&payload.title)
    .bind(payload.description.unwrap_or_default())
    .bind(payload.duration_minutes)
    .bind(claims.user_id())
    .bind(now)
    .bind(now)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create quiz: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(quiz)))
}

/// Updates a quiz by ID. Fields are optional; updated_at always moves.
/// Admin only.
pub async fn update_quiz(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    if payload.title.is_none()
        && payload.description.is_none()
        && payload.duration_minutes.is_none()
    {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE quizzes SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(description);
    }

    if let Some(duration_minutes) = payload.duration_minutes {
        separated.push("duration_minutes = ");
        separated.push_bind_unseparated(duration_minutes);
    }

    separated.push("updated_at = ");
    separated.push_bind_unseparated(Utc::now());

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update quiz: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Soft-deletes a quiz: clears the active flag, never removes the row.
/// Admin only.
pub async fn delete_quiz(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("UPDATE quizzes SET is_active = 0, updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete quiz: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Quiz not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Adds a question to a quiz, applying type-specific authoring validation
/// before anything is persisted.
/// Admin only.
pub async fn add_question(
    State(pool): State<SqlitePool>,
    Path(quiz_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    // Questions may still be added to a deactivated quiz; only taking is gated
    // on the active flag.
    attempt::fetch_quiz(&pool, quiz_id).await?;

    let question = payload.into_new_question()?;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO questions
             (quiz_id, question_text, question_type, option_a, option_b, option_c, option_d,
              correct_option, correct_answer, points, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(quiz_id)
    .bind(&question.question_text)
    .bind(question.question_type)
    .bind(&question.option_a)
    .bind(&question.option_b)
    .bind(&question.option_c)
    .bind(&question.option_d)
    .bind(&question.correct_option)
    .bind(&question.correct_answer)
    .bind(question.points)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}
