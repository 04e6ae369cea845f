// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

use crate::error::AppError;

/// Question type vocabulary, stored as TEXT in the database.
///
/// True/false is a two-option MCQ in disguise: option A is always "True",
/// option B is always "False", and `correct_option` picks between them. This
/// keeps grading on a single comparison path for both choice types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum QuestionType {
    Mcq,
    TrueFalse,
    ShortAnswer,
}

/// Represents the 'quizzes' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub title: String,
    pub description: String,

    /// Time limit for one attempt. Always > 0, enforced at authoring time.
    pub duration_minutes: i64,

    pub created_by: i64,

    /// Soft-delete flag. Quizzes are never hard-deleted.
    pub is_active: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    pub question_text: String,
    pub question_type: QuestionType,

    /// Labeled options A-D. Unused options stay blank.
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,

    /// Correct option letter ('a'-'d') for choice questions, blank otherwise.
    pub correct_option: String,

    /// Reference answer for short-answer questions, blank otherwise.
    pub correct_answer: String,

    pub points: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for sending a question to the quiz taker.
/// Excludes the correct option and reference answer.
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub points: i64,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        Self {
            id: q.id,
            question_text: q.question_text,
            question_type: q.question_type,
            option_a: q.option_a,
            option_b: q.option_b,
            option_c: q.option_c,
            option_d: q.option_d,
            points: q.points,
        }
    }
}

/// DTO for creating a new quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 1, message = "Duration must be at least one minute."))]
    pub duration_minutes: i64,
}

/// DTO for updating a quiz. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 1, message = "Duration must be at least one minute."))]
    pub duration_minutes: Option<i64>,
}

/// DTO for adding a question to a quiz.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 1000))]
    pub question_text: String,
    pub question_type: QuestionType,
    #[validate(length(max = 200))]
    pub option_a: Option<String>,
    #[validate(length(max = 200))]
    pub option_b: Option<String>,
    #[validate(length(max = 200))]
    pub option_c: Option<String>,
    #[validate(length(max = 200))]
    pub option_d: Option<String>,
    pub correct_option: Option<String>,
    #[validate(length(max = 500))]
    pub correct_answer: Option<String>,
    #[validate(range(min = 1))]
    pub points: Option<i64>,
}

/// A question payload that passed type-specific authoring validation and is
/// ready to insert.
#[derive(Debug)]
pub struct NewQuestion {
    pub question_text: String,
    pub question_type: QuestionType,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_option: String,
    pub correct_answer: String,
    pub points: i64,
}

impl CreateQuestionRequest {
    /// Applies the per-type authoring rules and normalizes the payload.
    ///
    /// * mcq: options A and B must be populated, and the designated correct
    ///   option must point at a populated option.
    /// * true_false: correct option must be 'a' or 'b'; the option labels are
    ///   forced to "True"/"False".
    /// * short_answer: the reference answer must be non-blank.
    ///
    /// Nothing is persisted when any rule fails; the grading engine assumes
    /// well-formed questions.
    pub fn into_new_question(self) -> Result<NewQuestion, AppError> {
        let blank = String::new;
        let option_a = self.option_a.unwrap_or_else(blank);
        let option_b = self.option_b.unwrap_or_else(blank);
        let option_c = self.option_c.unwrap_or_else(blank);
        let option_d = self.option_d.unwrap_or_else(blank);
        let correct_option = self
            .correct_option
            .unwrap_or_else(blank)
            .trim()
            .to_lowercase();
        let correct_answer = self.correct_answer.unwrap_or_else(blank);
        let points = self.points.unwrap_or(1);

        match self.question_type {
            QuestionType::Mcq => {
                if option_a.trim().is_empty() || option_b.trim().is_empty() {
                    return Err(AppError::BadRequest(
                        "A multiple-choice question needs at least options A and B".to_string(),
                    ));
                }
                let populated = [
                    ("a", &option_a),
                    ("b", &option_b),
                    ("c", &option_c),
                    ("d", &option_d),
                ];
                let valid = populated
                    .iter()
                    .any(|(letter, text)| *letter == correct_option && !text.trim().is_empty());
                if !valid {
                    return Err(AppError::BadRequest(
                        "The correct option must reference a populated option (a-d)".to_string(),
                    ));
                }
                Ok(NewQuestion {
                    question_text: self.question_text,
                    question_type: QuestionType::Mcq,
                    option_a,
                    option_b,
                    option_c,
                    option_d,
                    correct_option,
                    correct_answer: String::new(),
                    points,
                })
            }
            QuestionType::TrueFalse => {
                if correct_option != "a" && correct_option != "b" {
                    return Err(AppError::BadRequest(
                        "A true/false question's correct option must be 'a' (True) or 'b' (False)"
                            .to_string(),
                    ));
                }
                Ok(NewQuestion {
                    question_text: self.question_text,
                    question_type: QuestionType::TrueFalse,
                    option_a: "True".to_string(),
                    option_b: "False".to_string(),
                    option_c: String::new(),
                    option_d: String::new(),
                    correct_option,
                    correct_answer: String::new(),
                    points,
                })
            }
            QuestionType::ShortAnswer => {
                if correct_answer.trim().is_empty() {
                    return Err(AppError::BadRequest(
                        "A short-answer question needs a reference answer".to_string(),
                    ));
                }
                Ok(NewQuestion {
                    question_text: self.question_text,
                    question_type: QuestionType::ShortAnswer,
                    option_a: String::new(),
                    option_b: String::new(),
                    option_c: String::new(),
                    option_d: String::new(),
                    correct_option: String::new(),
                    correct_answer,
                    points,
                })
            }
        }
    }
}
