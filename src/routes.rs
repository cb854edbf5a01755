// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{get, patch, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, assignments, auth, progress, quiz, reports},
    state::AppState,
    utils::jwt::{auth_middleware, trainer_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, quiz, assignments, progress, admin CRUD).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool + config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new().route("/login", post(auth::login));

    let quiz_routes = Router::new()
        .route("/start", post(quiz::start_quiz))
        .route("/{attempt_id}", get(quiz::get_attempt))
        .route("/{attempt_id}/submit", post(quiz::submit_quiz))
        .route("/{attempt_id}/result", get(quiz::get_result))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let progress_routes = Router::new()
        .route("/", get(progress::list_progress).post(progress::complete_asset))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let completion_routes = Router::new()
        .route("/self", get(progress::my_completions))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let assignment_routes = Router::new()
        .route("/self", get(assignments::my_assignments))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .merge(
            Router::new()
                .route(
                    "/",
                    get(assignments::list_assignments).post(assignments::assign),
                )
                .layer(middleware::from_fn(trainer_middleware))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let topic_routes = Router::new()
        .route("/", get(admin::list_topics).post(admin::create_topic))
        .route("/{id}", patch(admin::update_topic).delete(admin::delete_topic))
        .route(
            "/{id}/assets",
            get(admin::list_assets).post(admin::create_asset),
        )
        .layer(middleware::from_fn(trainer_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let asset_routes = Router::new()
        .route("/{id}", patch(admin::update_asset).delete(admin::delete_asset))
        .route(
            "/{id}/questions",
            get(admin::list_questions).post(admin::create_question),
        )
        .route(
            "/{id}/feedback",
            put(quiz::put_feedback).delete(quiz::delete_feedback),
        )
        .route("/{id}/stats", get(reports::asset_question_stats))
        .layer(middleware::from_fn(trainer_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let question_routes = Router::new()
        .route(
            "/{id}",
            patch(admin::update_question).delete(admin::delete_question),
        )
        .route("/{id}/choices", post(admin::create_choice))
        .layer(middleware::from_fn(trainer_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let choice_routes = Router::new()
        .route(
            "/{id}",
            patch(admin::update_choice).delete(admin::delete_choice),
        )
        .layer(middleware::from_fn(trainer_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Listing is open to trainers (they need the roster to assign topics);
    // creation re-checks for the admin role inside the handler.
    let user_routes = Router::new()
        .route("/", get(admin::list_users).post(admin::create_user))
        .layer(middleware::from_fn(trainer_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let report_routes = Router::new()
        .route("/overview", get(reports::overview))
        .layer(middleware::from_fn(trainer_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/quiz", quiz_routes)
        .nest("/api/asset-progress", progress_routes)
        .nest("/api/completions", completion_routes)
        .nest("/api/assignments", assignment_routes)
        .nest("/api/topics", topic_routes)
        .nest("/api/assets", asset_routes)
        .nest("/api/questions", question_routes)
        .nest("/api/choices", choice_routes)
        .nest("/api/users", user_routes)
        .nest("/api/reports", report_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
