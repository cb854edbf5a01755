// src/models/completion.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'completions' table. One row per (user, topic); created by
/// the first passing submission, score refreshed on later passes while
/// `completed_at` keeps the original date.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub id: i64,
    pub user_id: i64,
    pub topic_id: i64,
    pub completed_at: chrono::DateTime<chrono::Utc>,
    pub score: Option<f64>,
    pub certificate_url: Option<String>,
}

/// Represents the 'asset_progress' table, keyed by (assignment, asset).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetProgress {
    pub id: i64,
    pub assignment_id: i64,
    pub asset_id: i64,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}
