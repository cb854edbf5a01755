// src/handlers/progress.rs

use axum::{
    Extension, Json,
    extract::{Query, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{
        assignment::AssignmentStatus,
        completion::{AssetProgress, Completion},
    },
    utils::jwt::Claims,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteAssetRequest {
    pub assignment_id: i64,
    pub asset_id: i64,
}

/// Marks an asset complete under the caller's assignment. This is how
/// required assets without quizzes satisfy the topic-quiz gate; quiz-backed
/// assets get the same row written by a passing submission.
pub async fn complete_asset(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CompleteAssetRequest>,
) -> Result<impl IntoResponse, AppError> {
    let owned = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM assignments WHERE id = ?1 AND user_id = ?2",
    )
    .bind(payload.assignment_id)
    .bind(claims.user_id())
    .fetch_optional(&pool)
    .await?;

    if owned.is_none() {
        return Err(AppError::Forbidden("Not your assignment".to_string()));
    }

    sqlx::query(
        "INSERT INTO asset_progress (assignment_id, asset_id, completed_at) \
         VALUES (?1, ?2, ?3) \
         ON CONFLICT(assignment_id, asset_id) DO UPDATE SET completed_at = excluded.completed_at",
    )
    .bind(payload.assignment_id)
    .bind(payload.asset_id)
    .bind(Utc::now())
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to upsert asset progress: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    // Touching any asset moves a fresh assignment into IN_PROGRESS.
    sqlx::query("UPDATE assignments SET status = ?1 WHERE id = ?2 AND status = ?3")
        .bind(AssignmentStatus::InProgress)
        .bind(payload.assignment_id)
        .bind(AssignmentStatus::Assigned)
        .execute(&pool)
        .await?;

    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressQuery {
    pub assignment_id: i64,
}

/// Lists the asset-progress rows for one of the caller's assignments, for
/// the lesson view to mark which assets are done.
pub async fn list_progress(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ProgressQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, AssetProgress>(
        "SELECT p.id, p.assignment_id, p.asset_id, p.completed_at \
         FROM asset_progress p \
         JOIN assignments a ON a.id = p.assignment_id \
         WHERE p.assignment_id = ?1 AND a.user_id = ?2 \
         ORDER BY p.asset_id ASC",
    )
    .bind(query.assignment_id)
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(rows))
}

/// Lists the caller's topic completions, the records certificates are
/// issued from.
pub async fn my_completions(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, Completion>(
        "SELECT id, user_id, topic_id, completed_at, score, certificate_url \
         FROM completions WHERE user_id = ?1 ORDER BY completed_at DESC",
    )
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(rows))
}
