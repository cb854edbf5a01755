// src/handlers/assignments.rs

use std::collections::HashSet;

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{
    error::AppError,
    models::assignment::{AssignRequest, AssignmentStatus, AssignmentWithTopic},
    utils::jwt::Claims,
};

/// Assigns topics to users, single or bulk. Every (user, topic) pair is
/// attempted; pairs that already exist are skipped via the unique key.
/// Trainer/Admin only.
pub async fn assign(
    State(pool): State<SqlitePool>,
    Json(payload): Json<AssignRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user_ids = collect_ids(payload.user_ids, payload.user_id);
    let topic_ids = collect_ids(payload.topic_ids, payload.topic_id);

    if user_ids.is_empty() || topic_ids.is_empty() {
        return Err(AppError::BadRequest("No users/topics selected".to_string()));
    }

    let valid_users = existing_ids(&pool, "users", &user_ids).await?;
    let valid_topics = existing_ids(&pool, "topics", &topic_ids).await?;

    let mut created: u64 = 0;
    let now = Utc::now();

    for user_id in &valid_users {
        for topic_id in &valid_topics {
            let result = sqlx::query(
                "INSERT INTO assignments (user_id, topic_id, status, assigned_at, due_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5) \
                 ON CONFLICT(user_id, topic_id) DO NOTHING",
            )
            .bind(user_id)
            .bind(topic_id)
            .bind(AssignmentStatus::Assigned)
            .bind(now)
            .bind(payload.due_at)
            .execute(&pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create assignment: {:?}", e);
                AppError::InternalServerError(e.to_string())
            })?;

            created += result.rows_affected();
        }
    }

    let attempted = (valid_users.len() * valid_topics.len()) as u64;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "ok": true,
            "created": created,
            "skipped": attempted - created,
        })),
    ))
}

/// Row shape for the trainer-facing assignment listing.
#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
struct AssignmentOverviewRow {
    id: i64,
    user_id: i64,
    username: String,
    topic_id: i64,
    topic_title: String,
    status: AssignmentStatus,
    assigned_at: Option<chrono::DateTime<chrono::Utc>>,
    due_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Lists all assignments with user and topic context.
/// Trainer/Admin only.
pub async fn list_assignments(
    State(pool): State<SqlitePool>,
) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, AssignmentOverviewRow>(
        "SELECT a.id, a.user_id, u.username, a.topic_id, t.title AS topic_title, \
                a.status, a.assigned_at, a.due_at \
         FROM assignments a \
         JOIN users u ON u.id = a.user_id \
         JOIN topics t ON t.id = a.topic_id \
         ORDER BY a.id DESC",
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(rows))
}

/// Lists the signed-in user's own assignments with topic titles.
pub async fn my_assignments(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let rows = sqlx::query_as::<_, AssignmentWithTopic>(
        "SELECT a.id, a.topic_id, t.title AS topic_title, a.status, a.assigned_at, a.due_at \
         FROM assignments a \
         JOIN topics t ON t.id = a.topic_id \
         WHERE a.user_id = ?1 \
         ORDER BY a.id DESC",
    )
    .bind(claims.user_id())
    .fetch_all(&pool)
    .await?;

    Ok(Json(rows))
}

fn collect_ids(bulk: Option<Vec<i64>>, single: Option<i64>) -> Vec<i64> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for id in bulk
        .unwrap_or_default()
        .into_iter()
        .chain(single)
    {
        if seen.insert(id) {
            ids.push(id);
        }
    }
    ids
}

/// Filters the requested ids down to rows that actually exist.
async fn existing_ids(
    pool: &SqlitePool,
    table: &str,
    ids: &[i64],
) -> Result<Vec<i64>, AppError> {
    let mut query_builder =
        QueryBuilder::<Sqlite>::new(format!("SELECT id FROM {} WHERE id IN (", table));

    let mut separated = query_builder.separated(",");
    for id in ids {
        separated.push_bind(id);
    }
    separated.push_unseparated(")");

    let found: Vec<i64> = query_builder.build_query_scalar().fetch_all(pool).await?;

    Ok(found)
}
