// src/handlers/quiz.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde::Serialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{
        attempt::{Attempt, AttemptAnswer, StartQuizRequest},
        question::QuestionType,
    },
    quiz::{
        bank::{self, QuizScope},
        feedback::{self, FeedbackConfig},
        ledger, scoring,
    },
    utils::jwt::Claims,
};

/// Helper struct for ownership-filtered attempt lookups.
#[derive(sqlx::FromRow)]
struct AttemptRow {
    id: i64,
    asset_id: Option<i64>,
    submitted_at: Option<chrono::DateTime<chrono::Utc>>,
    topic_id: i64,
}

/// Question as exposed to the quiz-taking client: choices carry no
/// correctness flags.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuestionView {
    id: i64,
    #[serde(rename = "type")]
    question_type: QuestionType,
    text: String,
    points: i64,
    position: i64,
    choices: Vec<ChoiceView>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChoiceView {
    id: i64,
    text: String,
    position: i64,
}

/// Starts a quiz attempt, or resumes the open one.
///
/// * The assignment must belong to the caller.
/// * Topic-level starts are refused until required assets are complete.
/// * Repeated calls before submission return the same attempt id.
pub async fn start_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<StartQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    let attempt_id = ledger::start_or_resume(
        &pool,
        claims.user_id(),
        payload.assignment_id,
        payload.asset_id,
    )
    .await?;

    Ok(Json(json!({ "attemptId": attempt_id })))
}

/// Read surface for resuming an in-progress quiz: the attempt's questions
/// (without answer keys) plus whatever answers were saved already.
pub async fn get_attempt(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = fetch_attempt(&pool, attempt_id, claims.user_id()).await?;

    let scope = QuizScope::for_attempt(attempt.asset_id, attempt.topic_id);
    let questions: Vec<QuestionView> = bank::load_questions(&pool, scope)
        .await?
        .into_iter()
        .map(|entry| QuestionView {
            id: entry.question.id,
            question_type: entry.question.question_type,
            text: entry.question.text,
            points: entry.question.points,
            position: entry.question.position,
            choices: entry
                .choices
                .into_iter()
                .map(|choice| ChoiceView {
                    id: choice.id,
                    text: choice.text,
                    position: choice.position,
                })
                .collect(),
        })
        .collect();

    let answers = sqlx::query_as::<_, AttemptAnswer>(
        "SELECT id, attempt_id, question_id, choice_id, text_answer, is_correct, points_awarded \
         FROM attempt_answers WHERE attempt_id = ?1",
    )
    .bind(attempt.id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(json!({
        "attemptId": attempt.id,
        "submitted": attempt.submitted_at.is_some(),
        "questions": questions,
        "answers": answers,
    })))
}

/// Grades and finalizes the attempt. See `quiz::scoring` for the transaction
/// semantics; this handler only owns the HTTP shape.
pub async fn submit_quiz(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
    Json(payload): Json<serde_json::Value>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = scoring::submit(&pool, attempt_id, claims.user_id(), payload).await?;

    Ok(Json(json!({
        "ok": true,
        "score": outcome.score,
        "passed": outcome.passed,
    })))
}

/// Helper struct for the result page's topic lookup.
#[derive(sqlx::FromRow)]
struct TopicInfo {
    id: i64,
    title: String,
}

/// Returns the submitted attempt's outcome plus the feedback message
/// resolved from the asset's configured ranges (or the built-in defaults).
pub async fn get_result(
    State(pool): State<SqlitePool>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let attempt = sqlx::query_as::<_, Attempt>(
        "SELECT id, user_id, assignment_id, asset_id, started_at, submitted_at, \
                score, passed, correct_count \
         FROM attempts WHERE id = ?1 AND user_id = ?2",
    )
    .bind(attempt_id)
    .bind(claims.user_id())
    .fetch_optional(&pool)
    .await?
    .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    if attempt.submitted_at.is_none() {
        return Err(AppError::BadRequest("Attempt not submitted".to_string()));
    }

    let topic = sqlx::query_as::<_, TopicInfo>(
        "SELECT t.id, t.title FROM topics t \
         JOIN assignments s ON s.topic_id = t.id \
         WHERE s.id = ?1",
    )
    .bind(attempt.assignment_id)
    .fetch_one(&pool)
    .await?;

    let stored_config = match attempt.asset_id {
        Some(asset_id) => sqlx::query_scalar::<_, Option<String>>(
            "SELECT quiz_feedback_json FROM assets WHERE id = ?1",
        )
        .bind(asset_id)
        .fetch_optional(&pool)
        .await?
        .flatten(),
        None => None,
    };

    let correct_count = attempt.correct_count.unwrap_or(0);
    let ranges = feedback::load_ranges(stored_config.as_deref());
    let feedback_message = feedback::resolve(correct_count, &ranges);

    Ok(Json(json!({
        "attemptId": attempt.id,
        "score": attempt.score,
        "passed": attempt.passed,
        "correctCount": correct_count,
        "feedbackMessage": feedback_message,
        "topicId": topic.id,
        "topicTitle": topic.title,
    })))
}

/// Stores the per-asset feedback-range configuration.
/// Trainer/Admin only.
///
/// The payload is normalized before storage (trimmed messages, thresholds
/// clamped to >= 0, sorted descending); a configuration that normalizes to
/// nothing clears the blob instead.
pub async fn put_feedback(
    State(pool): State<SqlitePool>,
    Path(asset_id): Path<i64>,
    Json(payload): Json<serde_json::Value>,
) -> Result<impl IntoResponse, AppError> {
    let config: FeedbackConfig = serde_json::from_value(payload)
        .map_err(|e| AppError::InvalidPayload(e.to_string()))?;

    let normalized = feedback::normalize(config.ranges);
    let blob = if normalized.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&FeedbackConfig { ranges: normalized })?)
    };

    let result = sqlx::query("UPDATE assets SET quiz_feedback_json = ?1 WHERE id = ?2")
        .bind(blob)
        .bind(asset_id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Asset not found".to_string()));
    }

    Ok(Json(json!({ "ok": true })))
}

/// Clears the per-asset feedback configuration.
/// Trainer/Admin only.
pub async fn delete_feedback(
    State(pool): State<SqlitePool>,
    Path(asset_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("UPDATE assets SET quiz_feedback_json = NULL WHERE id = ?1")
        .bind(asset_id)
        .execute(&pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Asset not found".to_string()));
    }

    Ok(Json(json!({ "ok": true })))
}

async fn fetch_attempt(
    pool: &SqlitePool,
    attempt_id: i64,
    user_id: i64,
) -> Result<AttemptRow, AppError> {
    sqlx::query_as::<_, AttemptRow>(
        "SELECT a.id, a.asset_id, a.submitted_at, s.topic_id \
         FROM attempts a \
         JOIN assignments s ON s.id = a.assignment_id \
         WHERE a.id = ?1 AND a.user_id = ?2",
    )
    .bind(attempt_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Attempt not found".to_string()))
}
