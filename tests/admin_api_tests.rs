// tests/admin_api_tests.rs

use std::str::FromStr;

use chrono::Utc;
use lms_backend::{config::Config, routes, state::AppState, utils::hash::hash_password};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL and the shared in-memory pool.
async fn spawn_app() -> (String, SqlitePool) {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .expect("Failed to parse in-memory SQLite URL");

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .connect_with(options)
        .await
        .expect("Failed to open in-memory SQLite");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    let config = Config {
        database_url: "sqlite::memory:".to_string(),
        jwt_secret: "admin_test_secret".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
    };

    let state = AppState {
        pool: pool.clone(),
        config,
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (address, pool)
}

async fn seed_user(pool: &SqlitePool, username: &str, role: &str) -> i64 {
    let hash = hash_password("password123").expect("Failed to hash password");
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO users (username, password, role, created_at) \
         VALUES (?1, ?2, ?3, ?4) RETURNING id",
    )
    .bind(username)
    .bind(hash)
    .bind(role)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .unwrap()
}

async fn login(client: &reqwest::Client, address: &str, username: &str) -> String {
    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "username": username,
            "password": "password123"
        }))
        .send()
        .await
        .expect("Login failed")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login json");

    response["token"].as_str().expect("Token not found").to_string()
}

#[tokio::test]
async fn unknown_route_is_404() {
    // Arrange
    let (address, _pool) = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn login_rejects_bad_password() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    seed_user(&pool, "login_victim", "EMPLOYEE").await;

    let response = client
        .post(format!("{}/api/auth/login", address))
        .json(&serde_json::json!({
            "username": "login_victim",
            "password": "wrong_password"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn employees_cannot_touch_trainer_surfaces() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    seed_user(&pool, "plain_employee", "EMPLOYEE").await;
    let token = login(&client, &address, "plain_employee").await;

    let response = client
        .post(format!("{}/api/topics", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "title": "Sneaky Topic" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn trainer_builds_a_topic_with_quiz_content() {
    // Arrange
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    seed_user(&pool, "trainer_crud", "TRAINER").await;
    let token = login(&client, &address, "trainer_crud").await;

    // Topic
    let topic: serde_json::Value = client
        .post(format!("{}/api/topics", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "title": "Fire Safety", "status": "ACTIVE" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let topic_id = topic["id"].as_i64().unwrap();
    assert!(topic["code"].as_str().unwrap().starts_with("fire-safety-"));

    // Asset
    let asset: serde_json::Value = client
        .post(format!("{}/api/topics/{}/assets", address, topic_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "title": "Extinguisher Demo",
            "kind": "VIDEO",
            "is_required": true
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let asset_id = asset["id"].as_i64().unwrap();

    // Question + choices
    let question: serde_json::Value = client
        .post(format!("{}/api/assets/{}/questions", address, asset_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "type": "SINGLE_CHOICE",
            "text": "Which class of fire is grease?",
            "points": 5
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let question_id = question["id"].as_i64().unwrap();

    for (text, correct) in [("Class K", true), ("Class A", false)] {
        let created = client
            .post(format!("{}/api/questions/{}/choices", address, question_id))
            .bearer_auth(&token)
            .json(&serde_json::json!({ "text": text, "is_correct": correct }))
            .send()
            .await
            .unwrap();
        assert_eq!(created.status().as_u16(), 201);
    }

    // The trainer listing shows answer keys
    let questions: serde_json::Value = client
        .get(format!("{}/api/assets/{}/questions", address, asset_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let listed = questions.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    let choices = listed[0]["choices"].as_array().unwrap();
    assert_eq!(choices.len(), 2);
    assert_eq!(choices[0]["is_correct"], true);

    // The question inherited the asset's topic
    let stored_topic: Option<i64> =
        sqlx::query_scalar("SELECT topic_id FROM questions WHERE id = ?1")
            .bind(question_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(stored_topic, Some(topic_id));

    // Deleting the question sweeps its choices
    let deleted = client
        .delete(format!("{}/api/questions/{}", address, question_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status().as_u16(), 204);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM choices WHERE question_id = ?1")
        .bind(question_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn feedback_config_is_normalized_on_write() {
    // Arrange
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    seed_user(&pool, "trainer_feedback", "TRAINER").await;
    let token = login(&client, &address, "trainer_feedback").await;

    let topic_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO topics (code, title, status, created_at) \
         VALUES ('fb-topic', 'Feedback Topic', 'ACTIVE', ?1) RETURNING id",
    )
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .unwrap();
    let asset_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO assets (topic_id, title, kind, is_required, position, created_at) \
         VALUES (?1, 'Quiz Asset', 'HTML', 0, 1, ?2) RETURNING id",
    )
    .bind(topic_id)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .unwrap();

    // Act: messy ranges - unordered, untrimmed, one empty, one negative
    let response = client
        .put(format!("{}/api/assets/{}/feedback", address, asset_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "ranges": [
                { "minCorrect": 2, "message": "  getting there  " },
                { "minCorrect": -1, "message": "start over" },
                { "minCorrect": 6, "message": "   " },
                { "minCorrect": 4, "message": "solid" },
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    // Assert: stored blob is trimmed, clamped, sorted descending
    let blob: Option<String> =
        sqlx::query_scalar("SELECT quiz_feedback_json FROM assets WHERE id = ?1")
            .bind(asset_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&blob.unwrap()).unwrap();
    let ranges = parsed["ranges"].as_array().unwrap();
    assert_eq!(ranges.len(), 3);
    assert_eq!(ranges[0]["minCorrect"], 4);
    assert_eq!(ranges[0]["message"], "solid");
    assert_eq!(ranges[1]["minCorrect"], 2);
    assert_eq!(ranges[1]["message"], "getting there");
    assert_eq!(ranges[2]["minCorrect"], 0);
    assert_eq!(ranges[2]["message"], "start over");

    // A payload without a ranges array is rejected
    let bad = client
        .put(format!("{}/api/assets/{}/feedback", address, asset_id))
        .bearer_auth(&token)
        .json(&serde_json::json!({ "ranges": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status().as_u16(), 400);

    // DELETE clears the configuration
    let cleared = client
        .delete(format!("{}/api/assets/{}/feedback", address, asset_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(cleared.status().as_u16(), 200);

    let blob: Option<String> =
        sqlx::query_scalar("SELECT quiz_feedback_json FROM assets WHERE id = ?1")
            .bind(asset_id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert!(blob.is_none());
}

#[tokio::test]
async fn bulk_assignment_skips_existing_pairs() {
    // Arrange
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    seed_user(&pool, "trainer_assign", "TRAINER").await;
    let emp_a = seed_user(&pool, "assignee_a", "EMPLOYEE").await;
    let emp_b = seed_user(&pool, "assignee_b", "EMPLOYEE").await;
    let token = login(&client, &address, "trainer_assign").await;

    let topic_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO topics (code, title, status, created_at) \
         VALUES ('assign-topic', 'Assignable', 'ACTIVE', ?1) RETURNING id",
    )
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .unwrap();

    // Act: first round assigns both employees
    let first: serde_json::Value = client
        .post(format!("{}/api/assignments", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "userIds": [emp_a, emp_b],
            "topicIds": [topic_id],
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(first["created"], 2);

    // Second round repeats one pair and adds nothing new
    let second: serde_json::Value = client
        .post(format!("{}/api/assignments", address))
        .bearer_auth(&token)
        .json(&serde_json::json!({
            "userId": emp_a,
            "topicId": topic_id,
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["created"], 0);
    assert_eq!(second["skipped"], 1);

    // Assert: the employee sees their assignment
    let emp_token = login(&client, &address, "assignee_a").await;
    let mine: serde_json::Value = client
        .get(format!("{}/api/assignments/self", address))
        .bearer_auth(&emp_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let rows = mine.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["topicTitle"], "Assignable");
    assert_eq!(rows[0]["status"], "ASSIGNED");
}

#[tokio::test]
async fn reports_overview_counts_statuses_and_completions() {
    // Arrange: one completed and one fresh assignment
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    seed_user(&pool, "trainer_reports", "TRAINER").await;
    let emp_done = seed_user(&pool, "finisher", "EMPLOYEE").await;
    let emp_new = seed_user(&pool, "starter", "EMPLOYEE").await;
    let token = login(&client, &address, "trainer_reports").await;

    let topic_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO topics (code, title, status, created_at) \
         VALUES ('report-topic', 'Reportable', 'ACTIVE', ?1) RETURNING id",
    )
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO assignments (user_id, topic_id, status, assigned_at) \
         VALUES (?1, ?2, 'COMPLETED', ?3)",
    )
    .bind(emp_done)
    .bind(topic_id)
    .bind(Utc::now())
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO assignments (user_id, topic_id, status, assigned_at) \
         VALUES (?1, ?2, 'ASSIGNED', ?3)",
    )
    .bind(emp_new)
    .bind(topic_id)
    .bind(Utc::now())
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO completions (user_id, topic_id, completed_at, score) \
         VALUES (?1, ?2, ?3, 85.0)",
    )
    .bind(emp_done)
    .bind(topic_id)
    .bind(Utc::now())
    .execute(&pool)
    .await
    .unwrap();

    // Act
    let overview: serde_json::Value = client
        .get(format!("{}/api/reports/overview", address))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Assert
    assert_eq!(overview["summary"]["totalAssignments"], 2);
    assert_eq!(overview["summary"]["byStatus"]["COMPLETED"], 1);
    assert_eq!(overview["summary"]["byStatus"]["ASSIGNED"], 1);
    assert_eq!(overview["summary"]["uniqueLearners"], 2);

    let topics = overview["topics"].as_array().unwrap();
    assert_eq!(topics.len(), 1);
    assert_eq!(topics[0]["completions"], 1);
    assert_eq!(topics[0]["completionRatePct"], 50.0);

    let recent = overview["recentCompletions"].as_array().unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0]["username"], "finisher");
}

#[tokio::test]
async fn asset_stats_count_choice_and_blank_rows() {
    // Arrange: seed one graded attempt's answer rows directly
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    seed_user(&pool, "trainer_stats", "TRAINER").await;
    let emp = seed_user(&pool, "stats_emp", "EMPLOYEE").await;
    let token = login(&client, &address, "trainer_stats").await;

    let topic_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO topics (code, title, status, created_at) \
         VALUES ('stats-topic', 'Stats Topic', 'ACTIVE', ?1) RETURNING id",
    )
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .unwrap();
    let asset_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO assets (topic_id, title, kind, is_required, position, created_at) \
         VALUES (?1, 'Stats Asset', 'PDF', 0, 1, ?2) RETURNING id",
    )
    .bind(topic_id)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .unwrap();
    let question_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO questions (topic_id, asset_id, type, text, points, position) \
         VALUES (?1, ?2, 'SINGLE_CHOICE', 'Pick one', 5, 1) RETURNING id",
    )
    .bind(topic_id)
    .bind(asset_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    let choice_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO choices (question_id, text, is_correct, position) \
         VALUES (?1, 'The one', 1, 1) RETURNING id",
    )
    .bind(question_id)
    .fetch_one(&pool)
    .await
    .unwrap();

    let assignment_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO assignments (user_id, topic_id, status, assigned_at) \
         VALUES (?1, ?2, 'IN_PROGRESS', ?3) RETURNING id",
    )
    .bind(emp)
    .bind(topic_id)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .unwrap();
    let attempt_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO attempts (user_id, assignment_id, asset_id, started_at) \
         VALUES (?1, ?2, ?3, ?4) RETURNING id",
    )
    .bind(emp)
    .bind(assignment_id)
    .bind(asset_id)
    .bind(Utc::now())
    .fetch_one(&pool)
    .await
    .unwrap();

    // Two selections of the choice and one blank sentinel
    for chosen in [Some(choice_id), Some(choice_id), None] {
        sqlx::query(
            "INSERT INTO attempt_answers \
             (attempt_id, question_id, choice_id, is_correct, points_awarded) \
             VALUES (?1, ?2, ?3, ?4, 0)",
        )
        .bind(attempt_id)
        .bind(question_id)
        .bind(chosen)
        .bind(chosen.is_some())
        .execute(&pool)
        .await
        .unwrap();
    }

    // Act
    let stats: serde_json::Value = client
        .get(format!("{}/api/assets/{}/stats", address, asset_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // Assert
    let entries = stats.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["questionId"], question_id);
    assert_eq!(entries[0]["totalResponses"], 3);
    assert_eq!(entries[0]["textResponses"], 1);
    let counts = entries[0]["choiceCounts"].as_array().unwrap();
    assert_eq!(counts[0]["choiceId"], choice_id);
    assert_eq!(counts[0]["count"], 2);
}

#[tokio::test]
async fn admin_creates_users_but_trainer_cannot() {
    let (address, pool) = spawn_app().await;
    let client = reqwest::Client::new();
    seed_user(&pool, "root_admin", "ADMIN").await;
    seed_user(&pool, "mere_trainer", "TRAINER").await;

    let admin_token = login(&client, &address, "root_admin").await;
    let trainer_token = login(&client, &address, "mere_trainer").await;

    let created = client
        .post(format!("{}/api/users", address))
        .bearer_auth(&admin_token)
        .json(&serde_json::json!({
            "username": "new_hire",
            "password": "password123",
            "role": "EMPLOYEE"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status().as_u16(), 201);

    // Duplicate username conflicts
    let duplicate = client
        .post(format!("{}/api/users", address))
        .bearer_auth(&admin_token)
        .json(&serde_json::json!({
            "username": "new_hire",
            "password": "password123",
            "role": "EMPLOYEE"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status().as_u16(), 409);

    // Trainers may list but not create
    let listing = client
        .get(format!("{}/api/users", address))
        .bearer_auth(&trainer_token)
        .send()
        .await
        .unwrap();
    assert_eq!(listing.status().as_u16(), 200);

    let forbidden = client
        .post(format!("{}/api/users", address))
        .bearer_auth(&trainer_token)
        .json(&serde_json::json!({
            "username": "another_hire",
            "password": "password123",
            "role": "EMPLOYEE"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status().as_u16(), 403);
}
