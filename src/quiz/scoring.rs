// src/quiz/scoring.rs

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{
    config::PASS_THRESHOLD,
    error::AppError,
    models::{
        assignment::AssignmentStatus,
        attempt::{IncomingAnswer, SubmitQuizRequest},
        question::QuestionType,
    },
    quiz::{
        bank::{self, QuizScope},
        grader::{self, SubmittedAnswer},
    },
};

/// Result of a successful submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubmitOutcome {
    pub score: f64,
    pub passed: bool,
}

/// Helper struct for the attempt lookup joined with its assignment's topic.
#[derive(sqlx::FromRow)]
struct AttemptForSubmit {
    id: i64,
    assignment_id: i64,
    asset_id: Option<i64>,
    topic_id: i64,
    submitted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// One graded answer row staged for insertion.
struct GradedRow {
    question_id: i64,
    choice_id: Option<i64>,
    text_answer: Option<String>,
    is_correct: Option<bool>,
    points_awarded: i64,
}

/// Grades and finalizes one attempt inside a single transaction.
///
/// The attempt row is the serialization point: the OPEN -> SUBMITTED flip is
/// a conditional update (`submitted_at IS NULL`), so of two concurrent
/// submissions exactly one scores the attempt and the other observes
/// `AlreadySubmitted`. All answer rows are replaced atomically; the
/// completion cascade (asset progress, topic completion, assignment status)
/// commits or rolls back with them.
pub async fn submit(
    pool: &SqlitePool,
    attempt_id: i64,
    user_id: i64,
    payload: serde_json::Value,
) -> Result<SubmitOutcome, AppError> {
    let attempt = sqlx::query_as::<_, AttemptForSubmit>(
        "SELECT a.id, a.assignment_id, a.asset_id, a.submitted_at, s.topic_id \
         FROM attempts a \
         JOIN assignments s ON s.id = a.assignment_id \
         WHERE a.id = ?1 AND a.user_id = ?2",
    )
    .bind(attempt_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    if attempt.submitted_at.is_some() {
        return Err(AppError::AlreadySubmitted);
    }

    let request: SubmitQuizRequest = serde_json::from_value(payload)
        .map_err(|e| AppError::InvalidPayload(e.to_string()))?;
    let answers = normalize_answers(request.answers);

    let scope = QuizScope::for_attempt(attempt.asset_id, attempt.topic_id);
    let questions = bank::load_questions(pool, scope).await?;

    let mut total_points: i64 = 0;
    let mut earned_points: i64 = 0;
    let mut correct_count: i64 = 0;
    let mut rows: Vec<GradedRow> = Vec::new();

    for entry in &questions {
        let question = &entry.question;
        total_points += question.points;

        let blank = SubmittedAnswer::blank();
        let answer = answers.get(&question.id).unwrap_or(&blank);
        let verdict = grader::grade(question.question_type, question.points, &entry.choices, answer);

        earned_points += verdict.points_awarded;
        if verdict.is_correct == Some(true) && question.points > 0 {
            correct_count += 1;
        }

        match question.question_type {
            QuestionType::SingleChoice | QuestionType::TrueFalse => {
                rows.push(GradedRow {
                    question_id: question.id,
                    choice_id: answer.choice_ids.first().copied(),
                    text_answer: None,
                    is_correct: verdict.is_correct,
                    points_awarded: verdict.points_awarded,
                });
            }
            QuestionType::MultiChoice => {
                if answer.choice_ids.is_empty() {
                    // Sentinel row: question visited but left blank.
                    rows.push(GradedRow {
                        question_id: question.id,
                        choice_id: None,
                        text_answer: None,
                        is_correct: verdict.is_correct,
                        points_awarded: verdict.points_awarded,
                    });
                } else {
                    for choice_id in &answer.choice_ids {
                        rows.push(GradedRow {
                            question_id: question.id,
                            choice_id: Some(*choice_id),
                            text_answer: None,
                            is_correct: verdict.is_correct,
                            points_awarded: verdict.points_awarded,
                        });
                    }
                }
            }
            QuestionType::Text => {
                rows.push(GradedRow {
                    question_id: question.id,
                    choice_id: None,
                    text_answer: answer.text_answer.clone(),
                    is_correct: None,
                    points_awarded: 0,
                });
            }
        }
    }

    let percent = if total_points > 0 {
        earned_points as f64 / total_points as f64 * 100.0
    } else {
        0.0
    };
    let score = round2(percent);
    let passed = score >= PASS_THRESHOLD;

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| AppError::SubmissionFailed(e.to_string()))?;

    // Replace any rows left over from an interrupted earlier submission.
    sqlx::query("DELETE FROM attempt_answers WHERE attempt_id = ?1")
        .bind(attempt.id)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::SubmissionFailed(e.to_string()))?;

    if !rows.is_empty() {
        let mut query_builder = QueryBuilder::<Sqlite>::new(
            "INSERT INTO attempt_answers \
             (attempt_id, question_id, choice_id, text_answer, is_correct, points_awarded) ",
        );
        query_builder.push_values(rows.iter(), |mut b, row| {
            b.push_bind(attempt.id)
                .push_bind(row.question_id)
                .push_bind(row.choice_id)
                .push_bind(row.text_answer.clone())
                .push_bind(row.is_correct)
                .push_bind(row.points_awarded);
        });
        query_builder
            .build()
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::SubmissionFailed(e.to_string()))?;
    }

    let now = Utc::now();

    // Conditional OPEN -> SUBMITTED flip; the guard makes scoring exactly-once
    // even if two submissions raced past the read above.
    let updated = sqlx::query(
        "UPDATE attempts \
         SET submitted_at = ?1, score = ?2, passed = ?3, correct_count = ?4 \
         WHERE id = ?5 AND submitted_at IS NULL",
    )
    .bind(now)
    .bind(score)
    .bind(passed)
    .bind(correct_count)
    .bind(attempt.id)
    .execute(&mut *tx)
    .await
    .map_err(|e| AppError::SubmissionFailed(e.to_string()))?;

    if updated.rows_affected() == 0 {
        return Err(AppError::AlreadySubmitted);
    }

    if passed {
        if let Some(asset_id) = attempt.asset_id {
            sqlx::query(
                "INSERT INTO asset_progress (assignment_id, asset_id, completed_at) \
                 VALUES (?1, ?2, ?3) \
                 ON CONFLICT(assignment_id, asset_id) \
                 DO UPDATE SET completed_at = excluded.completed_at",
            )
            .bind(attempt.assignment_id)
            .bind(asset_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::SubmissionFailed(e.to_string()))?;
        }

        // Re-passing refreshes the score but keeps the original completion date.
        sqlx::query(
            "INSERT INTO completions (user_id, topic_id, completed_at, score) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(user_id, topic_id) DO UPDATE SET score = excluded.score",
        )
        .bind(user_id)
        .bind(attempt.topic_id)
        .bind(now)
        .bind(score)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::SubmissionFailed(e.to_string()))?;

        sqlx::query("UPDATE assignments SET status = ?1 WHERE id = ?2")
            .bind(AssignmentStatus::Completed)
            .bind(attempt.assignment_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::SubmissionFailed(e.to_string()))?;
    } else {
        // A failed attempt still counts as engagement; never regress
        // COMPLETED or CANCELED.
        sqlx::query("UPDATE assignments SET status = ?1 WHERE id = ?2 AND status = ?3")
            .bind(AssignmentStatus::InProgress)
            .bind(attempt.assignment_id)
            .bind(AssignmentStatus::Assigned)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::SubmissionFailed(e.to_string()))?;
    }

    tx.commit()
        .await
        .map_err(|e| AppError::SubmissionFailed(e.to_string()))?;

    tracing::info!(
        "Attempt {} submitted: score {:.2}, passed {}",
        attempt.id,
        score,
        passed
    );

    Ok(SubmitOutcome { score, passed })
}

/// Collapses the wire answers into one entry per question: duplicate choice
/// ids dropped (first occurrence kept), a repeated question id overwritten by
/// the later entry.
fn normalize_answers(answers: Vec<IncomingAnswer>) -> HashMap<i64, SubmittedAnswer> {
    let mut map = HashMap::new();
    for entry in answers {
        let mut seen = HashSet::new();
        let mut choice_ids = Vec::new();
        for id in entry.choice_ids.unwrap_or_default() {
            if seen.insert(id) {
                choice_ids.push(id);
            }
        }
        map.insert(
            entry.question_id,
            SubmittedAnswer {
                choice_ids,
                text_answer: entry.text_answer,
            },
        );
    }
    map
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
