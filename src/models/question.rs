// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Closed set of question types. TEXT questions are never auto-graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    SingleChoice,
    MultiChoice,
    TrueFalse,
    Text,
}

/// Represents the 'questions' table in the database.
///
/// A question is scoped to an asset and carries the owning topic id as well;
/// per-attempt scope resolution picks one of the two (asset wins when the
/// attempt is asset-scoped).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub topic_id: Option<i64>,
    pub asset_id: Option<i64>,

    /// Mapped from the database column 'type' since `type` is a reserved
    /// keyword in Rust.
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub question_type: QuestionType,

    pub text: String,

    /// Non-negative point value. Zero-point questions count toward the total
    /// but never toward the correct-answer tally.
    pub points: i64,

    pub position: i64,
}

/// Represents the 'choices' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Choice {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
    pub is_correct: bool,
    pub position: i64,
}

/// DTO for creating a question under an asset.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
    #[validate(range(min = 0))]
    pub points: Option<i64>,
    pub position: Option<i64>,
}

/// DTO for updating a question. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateQuestionRequest {
    #[serde(rename = "type")]
    pub question_type: Option<QuestionType>,
    pub text: Option<String>,
    pub points: Option<i64>,
    pub position: Option<i64>,
}

/// DTO for creating a choice.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateChoiceRequest {
    #[validate(length(min = 1, max = 1000))]
    pub text: String,
    pub is_correct: Option<bool>,
    pub position: Option<i64>,
}

/// DTO for updating a choice. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateChoiceRequest {
    pub text: Option<String>,
    pub is_correct: Option<bool>,
    pub position: Option<i64>,
}
