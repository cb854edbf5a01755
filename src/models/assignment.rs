// src/models/assignment.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Assignment lifecycle. Quiz outcomes drive the transitions: a passing
/// submission completes the assignment, a failing one advances ASSIGNED to
/// IN_PROGRESS. COMPLETED and CANCELED are never regressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Assigned,
    InProgress,
    Completed,
    Canceled,
}

impl AssignmentStatus {
    pub fn as_key(&self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "ASSIGNED",
            AssignmentStatus::InProgress => "IN_PROGRESS",
            AssignmentStatus::Completed => "COMPLETED",
            AssignmentStatus::Canceled => "CANCELED",
        }
    }
}

/// Represents the 'assignments' table: the pairing of a user to a topic.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Assignment {
    pub id: i64,
    pub user_id: i64,
    pub topic_id: i64,
    pub status: AssignmentStatus,
    pub assigned_at: Option<chrono::DateTime<chrono::Utc>>,
    pub due_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for assigning topics to users. Accepts single ids or bulk lists;
/// duplicate (user, topic) pairs are skipped.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub user_id: Option<i64>,
    pub topic_id: Option<i64>,
    pub user_ids: Option<Vec<i64>>,
    pub topic_ids: Option<Vec<i64>>,
    pub due_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Row shape for an employee's own assignment listing, joined with topic info.
#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentWithTopic {
    pub id: i64,
    pub topic_id: i64,
    pub topic_title: String,
    pub status: AssignmentStatus,
    pub assigned_at: Option<chrono::DateTime<chrono::Utc>>,
    pub due_at: Option<chrono::DateTime<chrono::Utc>>,
}
