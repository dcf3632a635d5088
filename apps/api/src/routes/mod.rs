pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::analytics;
use crate::evaluation::handlers as evaluation;
use crate::intake::handlers as intake;
use crate::ranking;
use crate::state::AppState;
use crate::taxonomy;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Intake
        .route(
            "/api/v1/resumes",
            post(intake::handle_upload_resume).get(intake::handle_list_resumes),
        )
        .route("/api/v1/resumes/:id", get(intake::handle_get_resume))
        .route(
            "/api/v1/jobs",
            post(intake::handle_create_job).get(intake::handle_list_jobs),
        )
        .route("/api/v1/jobs/:id", get(intake::handle_get_job))
        // Evaluation
        .route("/api/v1/evaluations", post(evaluation::handle_submit))
        .route(
            "/api/v1/evaluations/sync",
            post(evaluation::handle_evaluate_sync),
        )
        .route(
            "/api/v1/evaluations/:id",
            get(evaluation::handle_get_evaluation),
        )
        .route(
            "/api/v1/evaluations/:id/cancel",
            post(evaluation::handle_cancel),
        )
        // Ranking and analytics
        .route(
            "/api/v1/jobs/:id/rankings",
            get(ranking::handle_get_rankings),
        )
        .route("/api/v1/analytics", get(analytics::handle_get_analytics))
        // Taxonomy
        .route("/api/v1/taxonomy", get(taxonomy::handle_get_taxonomy))
        .route(
            "/api/v1/taxonomy/reload",
            post(taxonomy::handle_reload_taxonomy),
        )
        .with_state(state)
}
