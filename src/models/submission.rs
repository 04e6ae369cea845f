// src/models/submission.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::quiz::{PublicQuestion, QuestionType};

/// Represents the 'submissions' table: one user's timed run through a quiz.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizSubmission {
    pub id: i64,
    pub user_id: i64,
    pub quiz_id: i64,

    /// Percentage 0-100. Stays 0 until the attempt is finalized.
    pub score: f64,

    /// Question count of the quiz, snapshotted when the attempt starts.
    pub total_questions: i64,
    pub correct_answers: i64,

    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub is_completed: bool,
}

/// Represents the 'user_answers' table. One row per (submission, question),
/// graded on insert and immutable thereafter.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UserAnswer {
    pub id: i64,
    pub submission_id: i64,
    pub question_id: i64,

    /// Chosen option letter for MCQ / true-false questions.
    pub chosen_option: String,

    /// Free-text answer for short-answer questions.
    pub answer_text: String,

    pub is_correct: bool,
    pub answered_at: chrono::DateTime<chrono::Utc>,
}

/// Response for starting (or resuming) an attempt.
#[derive(Debug, Serialize)]
pub struct StartAttemptResponse {
    pub submission: QuizSubmission,
    pub time_remaining_seconds: i64,
}

/// Response for fetching the next unanswered question.
#[derive(Debug, Serialize)]
pub struct NextQuestionResponse {
    pub completed: bool,
    pub question: Option<PublicQuestion>,
    pub time_remaining_seconds: i64,
}

/// DTO for submitting one answer.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_id: i64,
    /// Option letter for choice questions, free text for short answers.
    pub answer: String,
}

/// Response after recording an answer.
#[derive(Debug, Serialize)]
pub struct SubmitAnswerResponse {
    pub completed: bool,
    pub next_question: Option<PublicQuestion>,
}

/// One graded answer joined with its question, for result/review pages.
#[derive(Debug, Serialize, FromRow)]
pub struct AnswerReview {
    pub question_id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    pub chosen_option: String,
    pub answer_text: String,
    pub is_correct: bool,
}

/// Full result of a finalized attempt.
#[derive(Debug, Serialize)]
pub struct AttemptResult {
    pub submission_id: i64,
    pub quiz_id: i64,
    pub quiz_title: String,
    pub score: f64,
    pub correct_answers: i64,
    pub total_questions: i64,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub answers: Vec<AnswerReview>,
}
