use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{AppError, EvalError};
use crate::evaluation::context::{EvaluationContext, RunState, StageFailure};
use crate::evaluation::matcher::SkillGapReport;
use crate::evaluation::pipeline::{self, PipelineInput, ResumeDocument, StageDeps};
use crate::evaluation::queue::EvalJob;
use crate::evaluation::scorer::DisplayScore;
use crate::models::evaluation::EvaluationRow;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct EvaluationRequest {
    pub resume_id: Uuid,
    pub job_id: Uuid,
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub evaluation_id: Uuid,
    pub status: &'static str,
}

/// Full projection of an in-memory evaluation context, returned by the
/// synchronous endpoint.
#[derive(Serialize)]
pub struct EvaluationView {
    pub evaluation_id: Uuid,
    pub resume_id: Uuid,
    pub job_id: Uuid,
    pub status: String,
    pub candidate_name: Option<String>,
    pub job_title: Option<String>,
    pub scores: Option<DisplayScore>,
    pub matched_skill_count: Option<usize>,
    pub gap_report: Option<SkillGapReport>,
    pub degraded: Vec<String>,
    pub recommendation_text: Option<String>,
    pub stage_errors: Vec<StageFailure>,
    pub persistence_failed: bool,
}

impl From<&EvaluationContext> for EvaluationView {
    fn from(ctx: &EvaluationContext) -> Self {
        Self {
            evaluation_id: ctx.evaluation_id,
            resume_id: ctx.resume_id,
            job_id: ctx.job_id,
            status: ctx.state.status_str().to_string(),
            candidate_name: ctx.candidate.as_ref().and_then(|c| c.name.clone()),
            job_title: ctx.requirements.as_ref().map(|r| r.title.clone()),
            scores: ctx.scores.as_ref().map(|s| s.display()),
            matched_skill_count: ctx.gap_report.as_ref().map(|r| r.matched.len()),
            gap_report: ctx.gap_report.clone(),
            degraded: ctx
                .degraded_dimensions()
                .into_iter()
                .map(String::from)
                .collect(),
            recommendation_text: ctx.recommendation_text.clone(),
            stage_errors: ctx.stage_errors.clone(),
            persistence_failed: ctx.persistence_failed,
        }
    }
}

/// POST /api/v1/evaluations
/// Enqueues a background run and returns its id immediately. A full queue is
/// 503 backpressure, not an error in the evaluation itself.
pub async fn handle_submit(
    State(state): State<AppState>,
    Json(req): Json<EvaluationRequest>,
) -> Result<(StatusCode, Json<SubmitResponse>), AppError> {
    ensure_resume_exists(&state, req.resume_id).await?;
    ensure_job_exists(&state, req.job_id).await?;

    let evaluation_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO evaluations (id, resume_id, job_id, status) VALUES ($1, $2, $3, 'queued')",
    )
    .bind(evaluation_id)
    .bind(req.resume_id)
    .bind(req.job_id)
    .execute(&state.db)
    .await?;

    if let Err(err) = state.queue.submit(EvalJob {
        evaluation_id,
        resume_id: req.resume_id,
        job_id: req.job_id,
    }) {
        // The run never entered the queue; drop the orphan row.
        let _ = sqlx::query("DELETE FROM evaluations WHERE id = $1")
            .bind(evaluation_id)
            .execute(&state.db)
            .await;
        return Err(err);
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitResponse {
            evaluation_id,
            status: "queued",
        }),
    ))
}

/// POST /api/v1/evaluations/sync
/// Runs the pipeline inline and blocks until a terminal state. A Failed run
/// maps to the fatal error's kind and message.
pub async fn handle_evaluate_sync(
    State(state): State<AppState>,
    Json(req): Json<EvaluationRequest>,
) -> Result<Json<EvaluationView>, AppError> {
    let resume = fetch_resume_document(&state, req.resume_id).await?;
    let job_text = fetch_job_text(&state, req.job_id).await?;

    let evaluation_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO evaluations (id, resume_id, job_id, status) VALUES ($1, $2, $3, 'running')",
    )
    .bind(evaluation_id)
    .bind(req.resume_id)
    .bind(req.job_id)
    .execute(&state.db)
    .await?;

    let deps = StageDeps {
        taxonomy: state.taxonomy.snapshot(),
        embedder: state.embedder.clone(),
        recommender: state.recommender.clone(),
        matcher: state.matcher.clone(),
        scoring: state.scoring.clone(),
        stage_timeout: state.config.stage_timeout(),
        cancel: Default::default(),
    };
    let input = PipelineInput {
        evaluation_id,
        resume_id: req.resume_id,
        job_id: req.job_id,
        resume,
        job_text,
    };

    let ctx = pipeline::run(input, &deps, &state.db).await;
    if ctx.state == RunState::Failed {
        let fatal = ctx.fatal_failure().expect("failed run records its error");
        return Err(AppError::Eval(EvalError::from_kind(
            fatal.kind,
            fatal.message.clone(),
        )));
    }
    Ok(Json(EvaluationView::from(&ctx)))
}

/// GET /api/v1/evaluations/:id
pub async fn handle_get_evaluation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<EvaluationRow>, AppError> {
    let row: Option<EvaluationRow> = sqlx::query_as(
        r#"
        SELECT id, resume_id, job_id, status, overall_score, skill_match_score,
               semantic_score, experience_score, education_score,
               matched_skill_count, matched_skills, missing_skills, degraded,
               gap_report, stage_errors, recommendation_text, error_kind,
               error_message, created_at, completed_at
        FROM evaluations WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?;

    row.map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Evaluation {id} not found")))
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub evaluation_id: Uuid,
    pub status: &'static str,
}

/// POST /api/v1/evaluations/:id/cancel
/// Queued runs never start; running runs stop at the next stage boundary.
pub async fn handle_cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CancelResponse>, AppError> {
    if state.queue.cancel(id) {
        return Ok(Json(CancelResponse {
            evaluation_id: id,
            status: "cancelling",
        }));
    }

    let row: Option<(String,)> = sqlx::query_as("SELECT status FROM evaluations WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    match row {
        None => Err(AppError::NotFound(format!("Evaluation {id} not found"))),
        Some((status,)) => Err(AppError::Validation(format!(
            "Evaluation {id} is not cancellable (status: {status})"
        ))),
    }
}

async fn ensure_resume_exists(state: &AppState, id: Uuid) -> Result<(), AppError> {
    let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM resumes WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    found
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
}

async fn ensure_job_exists(state: &AppState, id: Uuid) -> Result<(), AppError> {
    let found: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    found
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
}

async fn fetch_resume_document(state: &AppState, id: Uuid) -> Result<ResumeDocument, AppError> {
    let row: Option<(String, Vec<u8>, Option<String>)> =
        sqlx::query_as("SELECT file_name, content, extracted_text FROM resumes WHERE id = $1")
            .bind(id)
            .fetch_optional(&state.db)
            .await?;
    row.map(|(file_name, content, cached_text)| ResumeDocument {
        file_name,
        content,
        cached_text,
    })
    .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
}

async fn fetch_job_text(state: &AppState, id: Uuid) -> Result<String, AppError> {
    let row: Option<(String,)> = sqlx::query_as("SELECT description_text FROM jobs WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    row.map(|(text,)| text)
        .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
}
