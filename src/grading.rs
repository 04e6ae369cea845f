// src/grading.rs
//
// Deterministic correctness evaluation of a submitted answer against a
// question's reference. Pure: no database access, no side effects.

use crate::models::quiz::{Question, QuestionType};

/// Grades a raw submitted answer against a question.
///
/// * Choice questions (mcq / true_false) compare the submitted option letter,
///   trimmed and case-normalized, against `correct_option`.
/// * Short answers compare trimmed, case-folded text against the reference.
///   No punctuation normalization, no partial credit.
/// * A blank submission is incorrect, never "ungraded".
pub fn grade(question: &Question, raw_answer: &str) -> bool {
    let submitted = raw_answer.trim().to_lowercase();
    if submitted.is_empty() {
        return false;
    }

    match question.question_type {
        QuestionType::Mcq | QuestionType::TrueFalse => {
            submitted == question.correct_option.trim().to_lowercase()
        }
        QuestionType::ShortAnswer => submitted == question.correct_answer.trim().to_lowercase(),
    }
}

/// Routes a raw answer to the column it belongs in: (chosen_option,
/// answer_text). Choice answers are normalized to a lowercase letter; free
/// text is stored verbatim.
pub fn route_answer(question_type: QuestionType, raw_answer: &str) -> (String, String) {
    match question_type {
        QuestionType::Mcq | QuestionType::TrueFalse => {
            (raw_answer.trim().to_lowercase(), String::new())
        }
        QuestionType::ShortAnswer => (String::new(), raw_answer.to_string()),
    }
}
