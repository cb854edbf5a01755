// src/quiz/bank.rs

use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::{
    error::AppError,
    models::question::{Choice, Question},
};

/// Which question set an attempt draws from. Decided once at attempt
/// creation: an attempt with an asset id uses that asset's questions,
/// otherwise the whole topic's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizScope {
    Asset(i64),
    Topic(i64),
}

impl QuizScope {
    pub fn for_attempt(asset_id: Option<i64>, topic_id: i64) -> Self {
        match asset_id {
            Some(asset_id) => QuizScope::Asset(asset_id),
            None => QuizScope::Topic(topic_id),
        }
    }
}

/// A question together with its candidate choices, in display order.
#[derive(Debug, Clone)]
pub struct QuizQuestion {
    pub question: Question,
    pub choices: Vec<Choice>,
}

/// Loads the full question set for a scope, ordered by (position, id) for
/// questions and choices alike.
pub async fn load_questions(
    pool: &SqlitePool,
    scope: QuizScope,
) -> Result<Vec<QuizQuestion>, AppError> {
    let (filter, scope_id) = match scope {
        QuizScope::Asset(id) => ("asset_id", id),
        QuizScope::Topic(id) => ("topic_id", id),
    };

    let sql = format!(
        "SELECT id, topic_id, asset_id, type, text, points, position \
         FROM questions WHERE {} = ?1 ORDER BY position ASC, id ASC",
        filter
    );

    let questions: Vec<Question> = sqlx::query_as(&sql).bind(scope_id).fetch_all(pool).await?;

    if questions.is_empty() {
        return Ok(Vec::new());
    }

    // Dynamic IN clause for the choice fetch
    let mut query_builder = QueryBuilder::<Sqlite>::new(
        "SELECT id, question_id, text, is_correct, position FROM choices WHERE question_id IN (",
    );

    let mut separated = query_builder.separated(",");
    for question in &questions {
        separated.push_bind(question.id);
    }
    separated.push_unseparated(") ORDER BY position ASC, id ASC");

    let choices: Vec<Choice> = query_builder.build_query_as().fetch_all(pool).await?;

    let mut by_question: HashMap<i64, Vec<Choice>> = HashMap::new();
    for choice in choices {
        by_question.entry(choice.question_id).or_default().push(choice);
    }

    Ok(questions
        .into_iter()
        .map(|question| {
            let choices = by_question.remove(&question.id).unwrap_or_default();
            QuizQuestion { question, choices }
        })
        .collect())
}
