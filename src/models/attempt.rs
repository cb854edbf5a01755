// src/models/attempt.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'attempts' table: one instance of a user taking a quiz.
///
/// `asset_id = NULL` means the attempt covers the whole topic. `submitted_at`
/// is the state flag: NULL while open, set exactly once on submission, after
/// which the row is terminal.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub id: i64,
    pub user_id: i64,
    pub assignment_id: i64,
    pub asset_id: Option<i64>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub submitted_at: Option<chrono::DateTime<chrono::Utc>>,

    /// Percentage score, 2 decimal places. Null until submitted.
    pub score: Option<f64>,
    pub passed: Option<bool>,

    /// Count of fully-correct answers to questions worth more than zero
    /// points. Null until submitted.
    pub correct_count: Option<i64>,
}

/// Represents the 'attempt_answers' table. For choice questions one row is
/// written per selected choice; a blank answer is recorded as a single row
/// with a null choice id so that "visited but unanswered" stays visible.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptAnswer {
    pub id: i64,
    pub attempt_id: i64,
    pub question_id: i64,
    pub choice_id: Option<i64>,
    pub text_answer: Option<String>,
    pub is_correct: Option<bool>,
    pub points_awarded: i64,
}

/// DTO for starting (or resuming) a quiz attempt.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartQuizRequest {
    pub assignment_id: i64,
    pub asset_id: Option<i64>,
}

/// One submitted answer as it appears on the wire.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingAnswer {
    pub question_id: i64,
    pub choice_ids: Option<Vec<i64>>,
    pub text_answer: Option<String>,
}

/// DTO for submitting a quiz attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    pub answers: Vec<IncomingAnswer>,
}
