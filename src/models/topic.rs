// src/models/topic.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum TopicStatus {
    Active,
    Draft,
    Archived,
}

/// Represents the 'topics' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Topic {
    pub id: i64,

    /// Unique slug-style code, generated from the title on creation.
    pub code: String,

    pub title: String,
    pub description: Option<String>,
    pub status: TopicStatus,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating a topic.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTopicRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub status: Option<TopicStatus>,
}

/// DTO for updating a topic. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateTopicRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TopicStatus>,
}
