// src/models/asset.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// One unit of lesson content within a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum AssetKind {
    Video,
    Pdf,
    Image,
    Link,
    Html,
}

/// Represents the 'assets' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Asset {
    pub id: i64,
    pub topic_id: i64,
    pub title: String,
    pub kind: AssetKind,
    pub url: Option<String>,

    /// Required assets gate the topic-level quiz.
    pub is_required: bool,

    pub position: i64,

    /// Raw feedback-range configuration for this asset's quiz, if any.
    /// Serialized `{"ranges": [{"minCorrect": n, "message": "..."}]}`.
    #[serde(skip)]
    pub quiz_feedback_json: Option<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for creating an asset under a topic.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAssetRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub kind: AssetKind,
    #[validate(length(max = 2000))]
    pub url: Option<String>,
    pub is_required: Option<bool>,
    pub position: Option<i64>,
}

/// DTO for updating an asset. Fields are optional.
#[derive(Debug, Deserialize)]
pub struct UpdateAssetRequest {
    pub title: Option<String>,
    pub kind: Option<AssetKind>,
    pub url: Option<String>,
    pub is_required: Option<bool>,
    pub position: Option<i64>,
}
