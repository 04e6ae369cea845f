// src/handlers/attempts.rs
//
// HTTP shell over the attempt state machine. Every lookup is scoped to the
// authenticated owner; foreign submissions read as 404.

use axum::{
    Json,
    extract::{Extension, Path, State},
    response::IntoResponse,
};
use sqlx::SqlitePool;

use crate::{
    attempt,
    error::AppError,
    models::submission::{
        AnswerReview, AttemptResult, NextQuestionResponse, StartAttemptResponse,
        SubmitAnswerRequest, SubmitAnswerResponse,
    },
    utils::jwt::Claims,
};

/// POST /api/quizzes/{id}/start
///
/// Resumes the caller's incomplete attempt on this quiz, or creates a fresh
/// one. The quiz must be active.
pub async fn start_attempt(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = attempt::fetch_active_quiz(&pool, quiz_id).await?;
    let submission = attempt::start(&pool, claims.user_id(), &quiz).await?;
    let time_remaining_seconds = attempt::time_remaining(&submission, &quiz);

    Ok(Json(StartAttemptResponse {
        submission,
        time_remaining_seconds,
    }))
}

/// GET /api/attempts/{id}/next
///
/// The first unanswered question in creation order, or a completed marker.
/// Touching an expired attempt finalizes it here.
pub async fn next_question(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(submission_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let submission = attempt::fetch_owned_submission(&pool, submission_id, claims.user_id()).await?;
    let quiz = attempt::fetch_quiz(&pool, submission.quiz_id).await?;

    let time_remaining_seconds = attempt::time_remaining(&submission, &quiz);
    let question = attempt::next_question(&pool, &submission, &quiz).await?;

    Ok(Json(NextQuestionResponse {
        completed: question.is_none(),
        question: question.map(Into::into),
        time_remaining_seconds,
    }))
}

/// POST /api/attempts/{id}/answers
///
/// Records and grades one answer. Duplicate answers and answers against a
/// completed or expired attempt are rejected, never overwritten.
pub async fn submit_answer(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(submission_id): Path<i64>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let submission = attempt::fetch_owned_submission(&pool, submission_id, claims.user_id()).await?;
    let quiz = attempt::fetch_quiz(&pool, submission.quiz_id).await?;

    let outcome =
        attempt::submit_answer(&pool, &submission, &quiz, payload.question_id, &payload.answer)
            .await?;

    Ok(Json(SubmitAnswerResponse {
        completed: outcome.completed,
        next_question: outcome.next_question.map(Into::into),
    }))
}

/// GET /api/attempts/{id}/result
///
/// Score and per-question breakdown of a finalized attempt. An expired
/// attempt is force-finalized before results are returned; an attempt that is
/// still running yields 409.
pub async fn attempt_result(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(submission_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut submission =
        attempt::fetch_owned_submission(&pool, submission_id, claims.user_id()).await?;
    let quiz = attempt::fetch_quiz(&pool, submission.quiz_id).await?;

    if !submission.is_completed {
        if attempt::time_remaining(&submission, &quiz) > 0 {
            return Err(AppError::Conflict(
                "This attempt is still in progress".to_string(),
            ));
        }
        attempt::finalize(&pool, submission.id).await?;
        submission = attempt::fetch_owned_submission(&pool, submission_id, claims.user_id()).await?;
    }

    let answers = sqlx::query_as::<_, AnswerReview>(
        "SELECT a.question_id, q.question_text, q.question_type,
                a.chosen_option, a.answer_text, a.is_correct
         FROM user_answers a
         JOIN questions q ON q.id = a.question_id
         WHERE a.submission_id = ?
         ORDER BY a.answered_at, a.id",
    )
    .bind(submission.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(AttemptResult {
        submission_id: submission.id,
        quiz_id: quiz.id,
        quiz_title: quiz.title,
        score: submission.score,
        correct_answers: submission.correct_answers,
        total_questions: submission.total_questions,
        started_at: submission.started_at,
        completed_at: submission.completed_at,
        answers,
    }))
}
