// src/handlers/admin.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        asset::{Asset, CreateAssetRequest, UpdateAssetRequest},
        question::{
            Choice, CreateChoiceRequest, CreateQuestionRequest, Question, UpdateChoiceRequest,
            UpdateQuestionRequest,
        },
        topic::{CreateTopicRequest, Topic, TopicStatus, UpdateTopicRequest},
        user::{User, UserRole},
    },
    quiz::bank::{self, QuizScope},
    utils::{hash::hash_password, jwt::Claims},
};

/// Lists all topics, newest first.
/// Trainer/Admin only.
pub async fn list_topics(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let topics = sqlx::query_as::<_, Topic>(
        "SELECT id, code, title, description, status, created_at FROM topics ORDER BY id DESC",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list topics: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(topics))
}

/// Creates a topic with a generated unique slug code.
/// Trainer/Admin only.
pub async fn create_topic(
    State(pool): State<SqlitePool>,
    Json(payload): Json<CreateTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let code = generate_unique_code(&pool, &payload.title).await?;
    let status = payload.status.unwrap_or(TopicStatus::Draft);

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO topics (code, title, description, status, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5) RETURNING id",
    )
    .bind(&code)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(status)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create topic: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({"id": id, "code": code})),
    ))
}

/// Updates a topic by ID. Fields are optional.
/// Trainer/Admin only.
pub async fn update_topic(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.title.is_none() && payload.description.is_none() && payload.status.is_none() {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE topics SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }

    if let Some(description) = payload.description {
        separated.push("description = ");
        separated.push_bind_unseparated(description);
    }

    if let Some(status) = payload.status {
        separated.push("status = ");
        separated.push_bind_unseparated(status);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update topic: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Topic not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Deletes a topic by ID. Assets, questions, assignments and their dependent
/// rows go with it via the schema's cascades.
/// Trainer/Admin only.
pub async fn delete_topic(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM topics WHERE id = ?1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete topic: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Topic not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Lists a topic's assets in display order.
/// Trainer/Admin only.
pub async fn list_assets(
    State(pool): State<SqlitePool>,
    Path(topic_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let assets = sqlx::query_as::<_, Asset>(
        "SELECT id, topic_id, title, kind, url, is_required, position, quiz_feedback_json, created_at \
         FROM assets WHERE topic_id = ?1 ORDER BY position ASC, id ASC",
    )
    .bind(topic_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(assets))
}

/// Creates an asset under a topic.
/// Trainer/Admin only.
pub async fn create_asset(
    State(pool): State<SqlitePool>,
    Path(topic_id): Path<i64>,
    Json(payload): Json<CreateAssetRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    sqlx::query_scalar::<_, i64>("SELECT id FROM topics WHERE id = ?1")
        .bind(topic_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Topic not found".to_string()))?;

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO assets (topic_id, title, kind, url, is_required, position, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) RETURNING id",
    )
    .bind(topic_id)
    .bind(&payload.title)
    .bind(payload.kind)
    .bind(&payload.url)
    .bind(payload.is_required.unwrap_or(false))
    .bind(payload.position.unwrap_or(1))
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create asset: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Updates an asset by ID. Fields are optional.
/// Trainer/Admin only.
pub async fn update_asset(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateAssetRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.title.is_none()
        && payload.kind.is_none()
        && payload.url.is_none()
        && payload.is_required.is_none()
        && payload.position.is_none()
    {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE assets SET ");
    let mut separated = builder.separated(", ");

    if let Some(title) = payload.title {
        separated.push("title = ");
        separated.push_bind_unseparated(title);
    }

    if let Some(kind) = payload.kind {
        separated.push("kind = ");
        separated.push_bind_unseparated(kind);
    }

    if let Some(url) = payload.url {
        separated.push("url = ");
        separated.push_bind_unseparated(url);
    }

    if let Some(is_required) = payload.is_required {
        separated.push("is_required = ");
        separated.push_bind_unseparated(is_required);
    }

    if let Some(position) = payload.position {
        separated.push("position = ");
        separated.push_bind_unseparated(position);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update asset: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Asset not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Deletes an asset by ID.
/// Trainer/Admin only.
pub async fn delete_asset(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM assets WHERE id = ?1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete asset: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Asset not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Question with its choices, correctness flags included.
/// This is the trainer-facing shape; quiz takers get the stripped view.
#[derive(Debug, Serialize)]
struct QuestionWithChoices {
    #[serde(flatten)]
    question: Question,
    choices: Vec<Choice>,
}

/// Lists an asset's questions with their choices for the question manager.
/// Trainer/Admin only.
pub async fn list_questions(
    State(pool): State<SqlitePool>,
    Path(asset_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let questions: Vec<QuestionWithChoices> =
        bank::load_questions(&pool, QuizScope::Asset(asset_id))
            .await?
            .into_iter()
            .map(|entry| QuestionWithChoices {
                question: entry.question,
                choices: entry.choices,
            })
            .collect();

    Ok(Json(questions))
}

/// Creates a question under an asset. The question records both the asset id
/// and the asset's topic id so either scope can reach it.
/// Trainer/Admin only.
pub async fn create_question(
    State(pool): State<SqlitePool>,
    Path(asset_id): Path<i64>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let topic_id = sqlx::query_scalar::<_, i64>("SELECT topic_id FROM assets WHERE id = ?1")
        .bind(asset_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Asset not found".to_string()))?;

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO questions (topic_id, asset_id, type, text, points, position) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING id",
    )
    .bind(topic_id)
    .bind(asset_id)
    .bind(payload.question_type)
    .bind(&payload.text)
    .bind(payload.points.unwrap_or(1))
    .bind(payload.position.unwrap_or(1))
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Updates a question by ID. Fields are optional.
/// Trainer/Admin only.
pub async fn update_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.question_type.is_none()
        && payload.text.is_none()
        && payload.points.is_none()
        && payload.position.is_none()
    {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE questions SET ");
    let mut separated = builder.separated(", ");

    if let Some(question_type) = payload.question_type {
        separated.push("type = ");
        separated.push_bind_unseparated(question_type);
    }

    if let Some(text) = payload.text {
        separated.push("text = ");
        separated.push_bind_unseparated(text);
    }

    if let Some(points) = payload.points {
        separated.push("points = ");
        separated.push_bind_unseparated(points);
    }

    if let Some(position) = payload.position {
        separated.push("position = ");
        separated.push_bind_unseparated(position);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Deletes a question by ID, together with its choices and any attempt
/// answers referencing it, in one transaction.
/// Trainer/Admin only.
pub async fn delete_question(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM attempt_answers WHERE question_id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM choices WHERE question_id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let result = sqlx::query("DELETE FROM questions WHERE id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    tx.commit().await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Creates a choice under a question.
/// Trainer/Admin only.
pub async fn create_choice(
    State(pool): State<SqlitePool>,
    Path(question_id): Path<i64>,
    Json(payload): Json<CreateChoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    sqlx::query_scalar::<_, i64>("SELECT id FROM questions WHERE id = ?1")
        .bind(question_id)
        .fetch_optional(&pool)
        .await?
        .ok_or(AppError::NotFound("Question not found".to_string()))?;

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO choices (question_id, text, is_correct, position) \
         VALUES (?1, ?2, ?3, ?4) RETURNING id",
    )
    .bind(question_id)
    .bind(&payload.text)
    .bind(payload.is_correct.unwrap_or(false))
    .bind(payload.position.unwrap_or(1))
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create choice: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Updates a choice by ID. Fields are optional.
/// Trainer/Admin only.
pub async fn update_choice(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateChoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.text.is_none() && payload.is_correct.is_none() && payload.position.is_none() {
        return Ok(StatusCode::OK);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE choices SET ");
    let mut separated = builder.separated(", ");

    if let Some(text) = payload.text {
        separated.push("text = ");
        separated.push_bind_unseparated(text);
    }

    if let Some(is_correct) = payload.is_correct {
        separated.push("is_correct = ");
        separated.push_bind_unseparated(is_correct);
    }

    if let Some(position) = payload.position {
        separated.push("position = ");
        separated.push_bind_unseparated(position);
    }

    builder.push(" WHERE id = ");
    builder.push_bind(id);

    let result = builder.build().execute(&pool).await.map_err(|e| {
        tracing::error!("Failed to update choice: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Choice not found".to_string()));
    }

    Ok(StatusCode::OK)
}

/// Deletes a choice by ID.
/// Trainer/Admin only.
pub async fn delete_choice(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM choices WHERE id = ?1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete choice: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Choice not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Lists all users in the system.
/// Trainer/Admin only (trainers need the roster to assign topics).
pub async fn list_users(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let users = sqlx::query_as::<_, User>(
        "SELECT id, username, email, password, role, created_at FROM users ORDER BY id DESC",
    )
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list users: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(users))
}

/// DTO for Admin creating a user (can specify role).
#[derive(Debug, Deserialize, Validate)]
pub struct AdminCreateUserRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
    pub role: UserRole,
    #[validate(email)]
    pub email: Option<String>,
}

/// Creates a new user with a specific role.
/// Admin only (trainers reach this route but are turned away here).
pub async fn create_user(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<AdminCreateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    if claims.role != "ADMIN" {
        return Err(AppError::Forbidden("Admin role required".to_string()));
    }

    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let hashed_password = hash_password(&payload.password)?;

    let id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO users (username, email, password, role, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5) RETURNING id",
    )
    .bind(&payload.username)
    .bind(&payload.email)
    .bind(&hashed_password)
    .bind(payload.role)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint") {
            AppError::Conflict(format!("Username '{}' already exists", payload.username))
        } else {
            tracing::error!("Failed to create user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        }
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": id}))))
}

/// Derives a unique slug code from the topic title, retrying with fresh
/// random suffixes before falling back to a timestamp suffix.
async fn generate_unique_code(pool: &SqlitePool, title: &str) -> Result<String, AppError> {
    let base = slugify(title);

    for _ in 0..8 {
        let suffix: String = rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(4)
            .map(|b| (b as char).to_ascii_lowercase())
            .collect();
        let code = format!("{}-{}", base, suffix);

        let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM topics WHERE code = ?1")
            .bind(&code)
            .fetch_optional(pool)
            .await?;

        if exists.is_none() {
            return Ok(code);
        }
    }

    Ok(format!("{}-{}", base, Utc::now().timestamp_millis()))
}

fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for c in title.chars().flat_map(|c| c.to_lowercase()) {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if (c.is_whitespace() || c == '-' || c == '_') && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let slug: String = slug.trim_matches('-').chars().take(60).collect();
    if slug.is_empty() {
        "topic".to_string()
    } else {
        slug
    }
}
