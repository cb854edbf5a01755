// src/quiz/ledger.rs

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::AppError;

/// Helper struct for the ownership-checked assignment lookup.
#[derive(sqlx::FromRow)]
struct AssignmentScope {
    id: i64,
    topic_id: i64,
}

/// Returns the open attempt for (user, assignment, asset-or-topic), creating
/// one if none exists. Idempotent: repeated calls before submission return
/// the same attempt id, and answers already saved on it are preserved.
///
/// Topic-level starts (no asset id) are gated: every required asset of the
/// topic must have progress marked complete under this assignment first.
pub async fn start_or_resume(
    pool: &SqlitePool,
    user_id: i64,
    assignment_id: i64,
    asset_id: Option<i64>,
) -> Result<i64, AppError> {
    let assignment = sqlx::query_as::<_, AssignmentScope>(
        "SELECT id, topic_id FROM assignments WHERE id = ?1 AND user_id = ?2",
    )
    .bind(assignment_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Assignment not found".to_string()))?;

    match asset_id {
        Some(asset_id) => {
            // The asset must belong to the assignment's topic.
            sqlx::query_scalar::<_, i64>(
                "SELECT id FROM assets WHERE id = ?1 AND topic_id = ?2",
            )
            .bind(asset_id)
            .bind(assignment.topic_id)
            .fetch_optional(pool)
            .await?
            .ok_or(AppError::NotFound("Asset not found".to_string()))?;
        }
        None => {
            require_assets_complete(pool, assignment.id, assignment.topic_id).await?;
        }
    }

    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM attempts \
         WHERE assignment_id = ?1 AND user_id = ?2 AND asset_id IS ?3 \
           AND submitted_at IS NULL \
         ORDER BY started_at DESC LIMIT 1",
    )
    .bind(assignment.id)
    .bind(user_id)
    .bind(asset_id)
    .fetch_optional(pool)
    .await?;

    if let Some(attempt_id) = existing {
        return Ok(attempt_id);
    }

    let attempt_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO attempts (user_id, assignment_id, asset_id, started_at) \
         VALUES (?1, ?2, ?3, ?4) RETURNING id",
    )
    .bind(user_id)
    .bind(assignment.id)
    .bind(asset_id)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    tracing::debug!(
        "Opened attempt {} for user {} on assignment {}",
        attempt_id,
        user_id,
        assignment.id
    );

    Ok(attempt_id)
}

/// Refuses a topic-level quiz start while any required asset of the topic is
/// still incomplete under this assignment.
async fn require_assets_complete(
    pool: &SqlitePool,
    assignment_id: i64,
    topic_id: i64,
) -> Result<(), AppError> {
    let required: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM assets WHERE topic_id = ?1 AND is_required = 1",
    )
    .bind(topic_id)
    .fetch_one(pool)
    .await?;

    if required == 0 {
        return Ok(());
    }

    let completed: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM asset_progress \
         WHERE assignment_id = ?1 AND completed_at IS NOT NULL \
           AND asset_id IN (SELECT id FROM assets WHERE topic_id = ?2 AND is_required = 1)",
    )
    .bind(assignment_id)
    .bind(topic_id)
    .fetch_one(pool)
    .await?;

    if completed < required {
        return Err(AppError::Gated(format!(
            "Complete all required assets first ({} of {} done)",
            completed, required
        )));
    }

    Ok(())
}
