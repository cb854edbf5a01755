// src/handlers/reports.rs

use std::collections::{BTreeMap, HashMap};

use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::{assignment::AssignmentStatus, topic::TopicStatus},
    quiz::bank::{self, QuizScope},
};

const STATUS_KEYS: [AssignmentStatus; 4] = [
    AssignmentStatus::Assigned,
    AssignmentStatus::InProgress,
    AssignmentStatus::Completed,
    AssignmentStatus::Canceled,
];

#[derive(sqlx::FromRow)]
struct StatusCount {
    status: AssignmentStatus,
    count: i64,
}

#[derive(sqlx::FromRow)]
struct TopicStatusCount {
    topic_id: i64,
    status: AssignmentStatus,
    count: i64,
}

#[derive(sqlx::FromRow)]
struct TopicRow {
    id: i64,
    code: String,
    title: String,
    status: TopicStatus,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
struct RecentCompletion {
    id: i64,
    completed_at: chrono::DateTime<chrono::Utc>,
    topic_id: i64,
    topic_title: String,
    user_id: i64,
    username: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TopicSummary {
    id: i64,
    code: String,
    title: String,
    status: TopicStatus,
    assignments_total: i64,
    assignments_by_status: BTreeMap<String, i64>,
    completions: i64,
    completion_rate_pct: f64,
}

/// Aggregated progress overview for the reports page: assignment totals by
/// status, overdue count, per-topic completion rates, recent completions.
/// Trainer/Admin only.
pub async fn overview(State(pool): State<SqlitePool>) -> Result<impl IntoResponse, AppError> {
    let status_groups = sqlx::query_as::<_, StatusCount>(
        "SELECT status, COUNT(*) AS count FROM assignments GROUP BY status",
    )
    .fetch_all(&pool)
    .await?;

    let mut by_status = empty_status_map();
    let mut total_assignments: i64 = 0;
    for group in &status_groups {
        by_status.insert(group.status.as_key().to_string(), group.count);
        total_assignments += group.count;
    }

    let overdue: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM assignments \
         WHERE due_at IS NOT NULL AND due_at < ?1 AND status != ?2",
    )
    .bind(Utc::now())
    .bind(AssignmentStatus::Completed)
    .fetch_one(&pool)
    .await?;

    let unique_learners: i64 =
        sqlx::query_scalar("SELECT COUNT(DISTINCT user_id) FROM assignments")
            .fetch_one(&pool)
            .await?;

    let topics = sqlx::query_as::<_, TopicRow>("SELECT id, code, title, status FROM topics")
        .fetch_all(&pool)
        .await?;

    let per_topic_status = sqlx::query_as::<_, TopicStatusCount>(
        "SELECT topic_id, status, COUNT(*) AS count FROM assignments GROUP BY topic_id, status",
    )
    .fetch_all(&pool)
    .await?;

    #[derive(sqlx::FromRow)]
    struct TopicCompletions {
        topic_id: i64,
        count: i64,
    }

    let completion_groups = sqlx::query_as::<_, TopicCompletions>(
        "SELECT topic_id, COUNT(*) AS count FROM completions GROUP BY topic_id",
    )
    .fetch_all(&pool)
    .await?;
    let completions_by_topic: HashMap<i64, i64> = completion_groups
        .into_iter()
        .map(|row| (row.topic_id, row.count))
        .collect();

    let mut topic_summaries = Vec::with_capacity(topics.len());
    for topic in topics {
        let mut topic_by_status = empty_status_map();
        let mut topic_total: i64 = 0;
        for row in per_topic_status.iter().filter(|row| row.topic_id == topic.id) {
            topic_by_status.insert(row.status.as_key().to_string(), row.count);
            topic_total += row.count;
        }

        let completions = completions_by_topic.get(&topic.id).copied().unwrap_or(0);
        let completion_rate_pct = if topic_total > 0 {
            ((completions as f64 / topic_total as f64) * 10000.0).round() / 100.0
        } else {
            0.0
        };

        topic_summaries.push(TopicSummary {
            id: topic.id,
            code: topic.code,
            title: topic.title,
            status: topic.status,
            assignments_total: topic_total,
            assignments_by_status: topic_by_status,
            completions,
            completion_rate_pct,
        });
    }

    let recent_completions = sqlx::query_as::<_, RecentCompletion>(
        "SELECT c.id, c.completed_at, c.topic_id, t.title AS topic_title, c.user_id, u.username \
         FROM completions c \
         JOIN topics t ON t.id = c.topic_id \
         JOIN users u ON u.id = c.user_id \
         ORDER BY c.completed_at DESC LIMIT 10",
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(serde_json::json!({
        "summary": {
            "totalAssignments": total_assignments,
            "byStatus": by_status,
            "uniqueLearners": unique_learners,
            "overdueAssignments": overdue,
        },
        "topics": topic_summaries,
        "recentCompletions": recent_completions,
    })))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChoiceCount {
    choice_id: i64,
    count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuestionAnswerStats {
    question_id: i64,
    total_responses: i64,
    text_responses: i64,
    choice_counts: Vec<ChoiceCount>,
}

/// Per-question response counts for one asset's quiz: how often each choice
/// was selected and how many blank/text rows were recorded. Every question
/// gets an entry even before any attempts exist.
/// Trainer/Admin only.
pub async fn asset_question_stats(
    State(pool): State<SqlitePool>,
    Path(asset_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let questions = bank::load_questions(&pool, QuizScope::Asset(asset_id)).await?;

    let mut stats: Vec<QuestionAnswerStats> = questions
        .iter()
        .map(|entry| QuestionAnswerStats {
            question_id: entry.question.id,
            total_responses: 0,
            text_responses: 0,
            choice_counts: entry
                .choices
                .iter()
                .map(|choice| ChoiceCount {
                    choice_id: choice.id,
                    count: 0,
                })
                .collect(),
        })
        .collect();

    #[derive(sqlx::FromRow)]
    struct GroupedAnswer {
        question_id: i64,
        choice_id: Option<i64>,
        count: i64,
    }

    let grouped = sqlx::query_as::<_, GroupedAnswer>(
        "SELECT question_id, choice_id, COUNT(*) AS count \
         FROM attempt_answers \
         WHERE question_id IN (SELECT id FROM questions WHERE asset_id = ?1) \
         GROUP BY question_id, choice_id",
    )
    .bind(asset_id)
    .fetch_all(&pool)
    .await?;

    for row in grouped {
        let Some(entry) = stats.iter_mut().find(|s| s.question_id == row.question_id) else {
            continue;
        };
        entry.total_responses += row.count;

        match row.choice_id {
            None => entry.text_responses += row.count,
            Some(choice_id) => {
                if let Some(choice) = entry
                    .choice_counts
                    .iter_mut()
                    .find(|c| c.choice_id == choice_id)
                {
                    choice.count += row.count;
                } else {
                    entry.choice_counts.push(ChoiceCount {
                        choice_id,
                        count: row.count,
                    });
                }
            }
        }
    }

    Ok(Json(stats))
}

fn empty_status_map() -> BTreeMap<String, i64> {
    STATUS_KEYS
        .iter()
        .map(|status| (status.as_key().to_string(), 0))
        .collect()
}
