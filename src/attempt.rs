// src/attempt.rs
//
// The attempt state machine. A submission moves NotStarted -> InProgress on
// `start` and InProgress -> Completed via `finalize`, either when every
// question has an answer or when the quiz duration has elapsed. Completed is
// terminal. Timeout is evaluated lazily on read/write; there is no timer.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    grading,
    models::{
        quiz::{Question, Quiz},
        submission::QuizSubmission,
    },
};

const QUESTION_COLUMNS: &str = "id, quiz_id, question_text, question_type, \
     option_a, option_b, option_c, option_d, correct_option, correct_answer, points, created_at";

const SUBMISSION_COLUMNS: &str = "id, user_id, quiz_id, score, total_questions, \
     correct_answers, started_at, completed_at, is_completed";

/// Outcome of recording one answer.
#[derive(Debug)]
pub struct AnswerOutcome {
    pub completed: bool,
    pub next_question: Option<Question>,
}

/// Fetches an active quiz or returns 404.
pub async fn fetch_active_quiz(pool: &SqlitePool, quiz_id: i64) -> Result<Quiz, AppError> {
    sqlx::query_as::<_, Quiz>(
        "SELECT id, title, description, duration_minutes, created_by, is_active, created_at, updated_at
         FROM quizzes WHERE id = ? AND is_active = 1",
    )
    .bind(quiz_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))
}

/// Fetches a quiz regardless of its active flag (attempts keep working on
/// quizzes that were soft-deleted mid-flight).
pub async fn fetch_quiz(pool: &SqlitePool, quiz_id: i64) -> Result<Quiz, AppError> {
    sqlx::query_as::<_, Quiz>(
        "SELECT id, title, description, duration_minutes, created_by, is_active, created_at, updated_at
         FROM quizzes WHERE id = ?",
    )
    .bind(quiz_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))
}

/// Fetches a submission scoped to its owner, or returns 404.
pub async fn fetch_owned_submission(
    pool: &SqlitePool,
    submission_id: i64,
    user_id: i64,
) -> Result<QuizSubmission, AppError> {
    sqlx::query_as::<_, QuizSubmission>(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM submissions WHERE id = ? AND user_id = ?"
    ))
    .bind(submission_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))
}

/// Seconds left before the attempt expires, clamped at zero.
pub fn time_remaining(submission: &QuizSubmission, quiz: &Quiz) -> i64 {
    let deadline = submission.started_at + chrono::Duration::minutes(quiz.duration_minutes);
    (deadline - Utc::now()).num_seconds().max(0)
}

/// Starts a quiz attempt, resuming the incomplete submission for this
/// (user, quiz) pair when one exists. Guarantees at most one active attempt
/// per user per quiz; the partial unique index on submissions backs the
/// read-then-write check under concurrent requests.
pub async fn start(
    pool: &SqlitePool,
    user_id: i64,
    quiz: &Quiz,
) -> Result<QuizSubmission, AppError> {
    if let Some(existing) = find_incomplete(pool, user_id, quiz.id).await? {
        return Ok(existing);
    }

    let total_questions: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM questions WHERE quiz_id = ?")
            .bind(quiz.id)
            .fetch_one(pool)
            .await?;

    let insert = sqlx::query_as::<_, QuizSubmission>(&format!(
        "INSERT INTO submissions
             (user_id, quiz_id, score, total_questions, correct_answers, started_at, is_completed)
         VALUES (?, ?, 0.0, ?, 0, ?, 0)
         RETURNING {SUBMISSION_COLUMNS}"
    ))
    .bind(user_id)
    .bind(quiz.id)
    .bind(total_questions)
    .bind(Utc::now())
    .fetch_one(pool)
    .await;

    match insert {
        Ok(submission) => Ok(submission),
        // Lost the race against a concurrent start: resume the winner's row.
        Err(e) if e.to_string().contains("UNIQUE constraint failed") => {
            find_incomplete(pool, user_id, quiz.id)
                .await?
                .ok_or_else(|| AppError::InternalServerError(e.to_string()))
        }
        Err(e) => {
            tracing::error!("Failed to create submission: {:?}", e);
            Err(AppError::from(e))
        }
    }
}

async fn find_incomplete(
    pool: &SqlitePool,
    user_id: i64,
    quiz_id: i64,
) -> Result<Option<QuizSubmission>, AppError> {
    let submission = sqlx::query_as::<_, QuizSubmission>(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM submissions
         WHERE user_id = ? AND quiz_id = ? AND is_completed = 0"
    ))
    .bind(user_id)
    .bind(quiz_id)
    .fetch_optional(pool)
    .await?;
    Ok(submission)
}

/// Returns the first question, in creation order, that this submission has
/// not answered yet. Finalizes the attempt and returns None when nothing
/// remains or the time limit has passed.
pub async fn next_question(
    pool: &SqlitePool,
    submission: &QuizSubmission,
    quiz: &Quiz,
) -> Result<Option<Question>, AppError> {
    if submission.is_completed {
        return Ok(None);
    }
    if time_remaining(submission, quiz) == 0 {
        finalize(pool, submission.id).await?;
        return Ok(None);
    }

    let question = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions q
         WHERE q.quiz_id = ?
           AND NOT EXISTS (
               SELECT 1 FROM user_answers a
               WHERE a.submission_id = ? AND a.question_id = q.id
           )
         ORDER BY q.created_at, q.id
         LIMIT 1"
    ))
    .bind(quiz.id)
    .bind(submission.id)
    .fetch_optional(pool)
    .await?;

    if question.is_none() {
        finalize(pool, submission.id).await?;
    }

    Ok(question)
}

/// Records and grades one answer.
///
/// Rejected when the attempt is already completed, when the time limit has
/// passed (the attempt is force-finalized and the late answer dropped), when
/// the question does not belong to the quiz, or when the question already has
/// an answer in this submission. A successful call may complete the attempt
/// if this was the last unanswered question.
pub async fn submit_answer(
    pool: &SqlitePool,
    submission: &QuizSubmission,
    quiz: &Quiz,
    question_id: i64,
    raw_answer: &str,
) -> Result<AnswerOutcome, AppError> {
    if submission.is_completed {
        return Err(AppError::Conflict(
            "This attempt is already completed".to_string(),
        ));
    }
    if time_remaining(submission, quiz) == 0 {
        finalize(pool, submission.id).await?;
        return Err(AppError::Conflict(
            "Time is up; the attempt has been finalized".to_string(),
        ));
    }

    let question = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ? AND quiz_id = ?"
    ))
    .bind(question_id)
    .bind(quiz.id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Question not found in this quiz".to_string()))?;

    let already_answered: Option<i64> =
        sqlx::query_scalar("SELECT id FROM user_answers WHERE submission_id = ? AND question_id = ?")
            .bind(submission.id)
            .bind(question.id)
            .fetch_optional(pool)
            .await?;
    if already_answered.is_some() {
        return Err(AppError::Conflict(
            "This question has already been answered".to_string(),
        ));
    }

    let (chosen_option, answer_text) = grading::route_answer(question.question_type, raw_answer);
    let is_correct = grading::grade(&question, raw_answer);

    sqlx::query(
        "INSERT INTO user_answers
             (submission_id, question_id, chosen_option, answer_text, is_correct, answered_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(submission.id)
    .bind(question.id)
    .bind(chosen_option)
    .bind(answer_text)
    .bind(is_correct)
    .bind(Utc::now())
    .execute(pool)
    .await
    .map_err(|e| {
        // Double-submit racing past the SELECT above: the unique index wins.
        if e.to_string().contains("UNIQUE constraint failed") {
            AppError::Conflict("This question has already been answered".to_string())
        } else {
            tracing::error!("Failed to record answer: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    let next = next_question(pool, submission, quiz).await?;
    Ok(AnswerOutcome {
        completed: next.is_none(),
        next_question: next,
    })
}

/// Finalizes an attempt: one-time transition to Completed.
///
/// Idempotent; the `is_completed = 0` guard makes a second call a no-op, so
/// completed_at and score are only ever written once. Score is
/// 100 * correct / total, 0 when the quiz has no questions.
pub async fn finalize(pool: &SqlitePool, submission_id: i64) -> Result<(), AppError> {
    let correct: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM user_answers WHERE submission_id = ? AND is_correct = 1",
    )
    .bind(submission_id)
    .fetch_one(pool)
    .await?;

    let total: i64 = sqlx::query_scalar("SELECT total_questions FROM submissions WHERE id = ?")
        .bind(submission_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Submission not found".to_string()))?;

    let score = if total > 0 {
        correct as f64 / total as f64 * 100.0
    } else {
        0.0
    };

    sqlx::query(
        "UPDATE submissions
         SET is_completed = 1, completed_at = ?, correct_answers = ?, score = ?
         WHERE id = ? AND is_completed = 0",
    )
    .bind(Utc::now())
    .bind(correct)
    .bind(score)
    .bind(submission_id)
    .execute(pool)
    .await?;

    Ok(())
}
