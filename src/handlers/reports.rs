// src/handlers/reports.rs
//
// Reporting and analytics over completed submissions. Everything here is
// recomputed on read; nothing is cached or incrementally maintained.

use axum::{
    Json,
    extract::{Extension, Path, State},
    response::IntoResponse,
};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::{
    attempt,
    error::AppError,
    models::submission::{AnswerReview, AttemptResult},
    utils::jwt::Claims,
};

/// Scores are stored raw and rounded to one decimal for display.
fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// A submission row joined with its quiz title, for history lists.
#[derive(Debug, Serialize, FromRow)]
pub struct SubmissionSummary {
    pub id: i64,
    pub quiz_id: i64,
    pub quiz_title: String,
    pub score: f64,
    pub is_completed: bool,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, FromRow)]
struct UserStatsRow {
    quizzes_taken: i64,
    average_score: f64,
    best_score: f64,
}

#[derive(Debug, Serialize, FromRow)]
struct QuizStatsRow {
    id: i64,
    title: String,
    attempts: i64,
    average_score: f64,
    best_score: f64,
}

#[derive(Debug, Serialize, FromRow)]
struct RecentActivityRow {
    id: i64,
    username: String,
    quiz_title: String,
    score: f64,
    is_completed: bool,
    started_at: chrono::DateTime<chrono::Utc>,
}

/// GET /api/reports/dashboard
///
/// Per-user aggregate for regular callers; privileged callers get the
/// system-wide admin dashboard instead.
pub async fn dashboard(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    if claims.is_privileged() {
        admin_dashboard(&pool).await
    } else {
        user_dashboard(&pool, claims.user_id()).await
    }
}

async fn user_dashboard(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<axum::response::Response, AppError> {
    let stats = sqlx::query_as::<_, UserStatsRow>(
        "SELECT COUNT(*) AS quizzes_taken,
                COALESCE(AVG(score), 0.0) AS average_score,
                COALESCE(MAX(score), 0.0) AS best_score
         FROM submissions
         WHERE user_id = ? AND is_completed = 1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    let recent = sqlx::query_as::<_, SubmissionSummary>(
        "SELECT s.id, s.quiz_id, z.title AS quiz_title, s.score, s.is_completed,
                s.started_at, s.completed_at
         FROM submissions s
         JOIN quizzes z ON z.id = s.quiz_id
         WHERE s.user_id = ?
         ORDER BY s.started_at DESC, s.id DESC
         LIMIT 5",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(Json(serde_json::json!({
        "quizzes_taken": stats.quizzes_taken,
        "average_score": round1(stats.average_score),
        "best_score": round1(stats.best_score),
        "recent_submissions": recent,
    }))
    .into_response())
}

async fn admin_dashboard(pool: &SqlitePool) -> Result<axum::response::Response, AppError> {
    let total_quizzes: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM quizzes WHERE is_active = 1")
            .fetch_one(pool)
            .await?;
    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await?;
    let total_submissions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM submissions")
        .fetch_one(pool)
        .await?;
    let completed_submissions: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM submissions WHERE is_completed = 1")
            .fetch_one(pool)
            .await?;

    let quiz_stats = sqlx::query_as::<_, QuizStatsRow>(
        "SELECT z.id, z.title,
                COUNT(s.id) AS attempts,
                COALESCE(AVG(CASE WHEN s.is_completed = 1 THEN s.score END), 0.0) AS average_score,
                COALESCE(MAX(CASE WHEN s.is_completed = 1 THEN s.score END), 0.0) AS best_score
         FROM quizzes z
         LEFT JOIN submissions s ON s.quiz_id = z.id
         WHERE z.is_active = 1
         GROUP BY z.id, z.title
         ORDER BY z.created_at DESC, z.id DESC
         LIMIT 5",
    )
    .fetch_all(pool)
    .await?;

    let recent_submissions = sqlx::query_as::<_, RecentActivityRow>(
        "SELECT s.id, u.username, z.title AS quiz_title, s.score, s.is_completed, s.started_at
         FROM submissions s
         JOIN users u ON u.id = s.user_id
         JOIN quizzes z ON z.id = s.quiz_id
         ORDER BY s.started_at DESC, s.id DESC
         LIMIT 10",
    )
    .fetch_all(pool)
    .await?;

    Ok(Json(serde_json::json!({
        "total_quizzes": total_quizzes,
        "total_users": total_users,
        "total_submissions": total_submissions,
        "completed_submissions": completed_submissions,
        "quiz_stats": quiz_stats,
        "recent_submissions": recent_submissions,
    }))
    .into_response())
}

/// GET /api/reports/submissions — the caller's submission history.
pub async fn submission_history(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let submissions = sqlx::query_as::<_, SubmissionSummary>(
        "SELECT s.id, s.quiz_id, z.title AS quiz_title, s.score, s.is_completed,
                s.started_at, s.completed_at
         FROM submissions s
         JOIN quizzes z ON z.id = s.quiz_id
         WHERE s.user_id = ?
         ORDER BY s.started_at DESC, s.id DESC",
    )
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(submissions))
}

/// GET /api/reports/submissions/{id} — one submission with its graded
/// answers. Owner-scoped; other users' submissions read as 404.
pub async fn submission_detail(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(submission_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let submission =
        attempt::fetch_owned_submission(&pool, submission_id, claims.user_id()).await?;
    let quiz = attempt::fetch_quiz(&pool, submission.quiz_id).await?;

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

#[derive(Debug, FromRow)]
struct QuizAggregateRow {
    total_attempts: i64,
    average_score: f64,
    best_score: f64,
    worst_score: f64,
}

#[derive(Debug, FromRow)]
struct HistogramRow {
    band_0_59: i64,
    band_60_69: i64,
    band_70_79: i64,
    band_80_89: i64,
    band_90_100: i64,
}

#[derive(Debug, FromRow)]
struct QuestionAccuracyRow {
    id: i64,
    question_text: String,
    total_answers: i64,
    correct_answers: i64,
}

#[derive(Debug, Serialize, FromRow)]
struct TopSubmissionRow {
    username: String,
    score: f64,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// GET /api/quizzes/{id}/analytics
///
/// Per-quiz analytics over completed submissions: attempt count, average /
/// best / worst score, a fixed-band score histogram, per-question accuracy
/// and the top performances.
/// Admin only.
pub async fn quiz_analytics(
    State(pool): State<SqlitePool>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = attempt::fetch_quiz(&pool, quiz_id).await?;

    let aggregate = sqlx::query_as::<_, QuizAggregateRow>(
        "SELECT COUNT(*) AS total_attempts,
                COALESCE(AVG(score), 0.0) AS average_score,
                COALESCE(MAX(score), 0.0) AS best_score,
                COALESCE(MIN(score), 0.0) AS worst_score
         FROM submissions
         WHERE quiz_id = ? AND is_completed = 1",
    )
    .bind(quiz_id)
    .fetch_one(&pool)
    .await?;

    let histogram = sqlx::query_as::<_, HistogramRow>(
        "SELECT COALESCE(SUM(CASE WHEN score < 60 THEN 1 ELSE 0 END), 0) AS band_0_59,
                COALESCE(SUM(CASE WHEN score >= 60 AND score < 70 THEN 1 ELSE 0 END), 0) AS band_60_69,
                COALESCE(SUM(CASE WHEN score >= 70 AND score < 80 THEN 1 ELSE 0 END), 0) AS band_70_79,
                COALESCE(SUM(CASE WHEN score >= 80 AND score < 90 THEN 1 ELSE 0 END), 0) AS band_80_89,
                COALESCE(SUM(CASE WHEN score >= 90 THEN 1 ELSE 0 END), 0) AS band_90_100
         FROM submissions
         WHERE quiz_id = ? AND is_completed = 1",
    )
    .bind(quiz_id)
    .fetch_one(&pool)
    .await?;

    let question_rows = sqlx::query_as::<_, QuestionAccuracyRow>(
        "SELECT q.id, q.question_text,
                COUNT(a.id) AS total_answers,
                COALESCE(SUM(CASE WHEN a.is_correct = 1 THEN 1 ELSE 0 END), 0) AS correct_answers
         FROM questions q
         LEFT JOIN user_answers a ON a.question_id = q.id
         WHERE q.quiz_id = ?
         GROUP BY q.id, q.question_text
         ORDER BY q.created_at, q.id",
    )
    .bind(quiz_id)
    .fetch_all(&pool)
    .await?;

    let question_stats: Vec<serde_json::Value> = question_rows
        .into_iter()
        .map(|row| {
            let accuracy = if row.total_answers > 0 {
                round1(row.correct_answers as f64 / row.total_answers as f64 * 100.0)
            } else {
                0.0
            };
            serde_json::json!({
                "question_id": row.id,
                "question_text": row.question_text,
                "correct_answers": row.correct_answers,
                "total_answers": row.total_answers,
                "accuracy": accuracy,
            })
        })
        .collect();

    let top_submissions = sqlx::query_as::<_, TopSubmissionRow>(
        "SELECT u.username, s.score, s.completed_at
         FROM submissions s
         JOIN users u ON u.id = s.user_id
         WHERE s.quiz_id = ? AND s.is_completed = 1
         ORDER BY s.score DESC, s.completed_at ASC
         LIMIT 10",
    )
    .bind(quiz_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(serde_json::json!({
        "quiz_id": quiz.id,
        "quiz_title": quiz.title,
        "total_attempts": aggregate.total_attempts,
        "average_score": round1(aggregate.average_score),
        "best_score": round1(aggregate.best_score),
        "worst_score": round1(aggregate.worst_score),
        "score_ranges": {
            "0-59": histogram.band_0_59,
            "60-69": histogram.band_60_69,
            "70-79": histogram.band_70_79,
            "80-89": histogram.band_80_89,
            "90-100": histogram.band_90_100,
        },
        "question_stats": question_stats,
        "top_submissions": top_submissions,
    })))
}
