// src/quiz/grader.rs

use std::collections::HashSet;

use crate::models::question::{Choice, QuestionType};

/// One submitted answer after wire normalization: selected choice ids with
/// duplicates removed (submission order kept) and the free-text answer.
#[derive(Debug, Clone, Default)]
pub struct SubmittedAnswer {
    pub choice_ids: Vec<i64>,
    pub text_answer: Option<String>,
}

impl SubmittedAnswer {
    /// A question the user never answered grades the same as an empty one.
    pub fn blank() -> Self {
        Self::default()
    }
}

/// Grading outcome for a single question. `is_correct` is None for TEXT
/// questions, which are recorded for manual review and never auto-graded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verdict {
    pub is_correct: Option<bool>,
    pub points_awarded: i64,
}

/// Grades one question against one submitted answer. Pure and deterministic.
///
/// * SINGLE_CHOICE / TRUE_FALSE: only the first selected choice counts;
///   correct iff it is one of the choices flagged correct.
/// * MULTI_CHOICE: correct iff the selected set equals the correct set
///   exactly. No partial credit.
/// * TEXT: never auto-graded, zero points.
pub fn grade(
    question_type: QuestionType,
    points: i64,
    choices: &[Choice],
    answer: &SubmittedAnswer,
) -> Verdict {
    let correct_ids: HashSet<i64> = choices
        .iter()
        .filter(|choice| choice.is_correct)
        .map(|choice| choice.id)
        .collect();

    match question_type {
        QuestionType::SingleChoice | QuestionType::TrueFalse => {
            let chosen = answer.choice_ids.first();
            let is_correct = chosen.is_some_and(|id| correct_ids.contains(id));
            Verdict {
                is_correct: Some(is_correct),
                points_awarded: if is_correct { points } else { 0 },
            }
        }
        QuestionType::MultiChoice => {
            let chosen: HashSet<i64> = answer.choice_ids.iter().copied().collect();
            let is_correct = chosen == correct_ids;
            Verdict {
                is_correct: Some(is_correct),
                points_awarded: if is_correct { points } else { 0 },
            }
        }
        QuestionType::Text => Verdict {
            is_correct: None,
            points_awarded: 0,
        },
    }
}
