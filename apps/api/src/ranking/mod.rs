//! Cross-candidate ranking: a pure projection over the completed evaluations
//! for one job, recomputed in full on every request. The tie-break chain
//! (overall score, matched skills, recency, evaluation id) is a strict total
//! order, so ranks are dense and repeat calls are stable.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

/// One completed evaluation competing for rank. `overall_score` is the
/// full-precision value, not the display rounding.
#[derive(Debug, Clone, FromRow)]
pub struct RankingCandidate {
    pub evaluation_id: Uuid,
    pub resume_id: Uuid,
    pub candidate_name: Option<String>,
    pub overall_score: f64,
    pub matched_skill_count: i32,
    pub evaluated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankingEntry {
    /// 1-based dense rank; no shared ranks.
    pub rank: u32,
    pub evaluation_id: Uuid,
    pub resume_id: Uuid,
    pub candidate_name: Option<String>,
    pub overall_score: f64,
    pub matched_skill_count: i32,
    pub evaluated_at: DateTime<Utc>,
}

/// Orders candidates best-first: overall score descending, then matched skill
/// count descending, then most recent evaluation first, then evaluation id as
/// the final deterministic fallback.
pub fn rank(mut candidates: Vec<RankingCandidate>) -> Vec<RankingEntry> {
    candidates.sort_by(|a, b| {
        b.overall_score
            .total_cmp(&a.overall_score)
            .then_with(|| b.matched_skill_count.cmp(&a.matched_skill_count))
            .then_with(|| b.evaluated_at.cmp(&a.evaluated_at))
            .then_with(|| a.evaluation_id.cmp(&b.evaluation_id))
    });

    candidates
        .into_iter()
        .enumerate()
        .map(|(i, c)| RankingEntry {
            rank: i as u32 + 1,
            evaluation_id: c.evaluation_id,
            resume_id: c.resume_id,
            candidate_name: c.candidate_name,
            overall_score: c.overall_score,
            matched_skill_count: c.matched_skill_count,
            evaluated_at: c.evaluated_at,
        })
        .collect()
}

/// GET /api/v1/jobs/:id/rankings
pub async fn handle_get_rankings(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<Vec<RankingEntry>>, AppError> {
    let job: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM jobs WHERE id = $1")
        .bind(job_id)
        .fetch_optional(&state.db)
        .await?;
    if job.is_none() {
        return Err(AppError::NotFound(format!("Job {job_id} not found")));
    }

    let candidates: Vec<RankingCandidate> = sqlx::query_as(
        r#"
        SELECT e.id AS evaluation_id,
               e.resume_id,
               r.candidate_name,
               e.overall_score,
               COALESCE(e.matched_skill_count, 0) AS matched_skill_count,
               COALESCE(e.completed_at, e.created_at) AS evaluated_at
        FROM evaluations e
        JOIN resumes r ON r.id = e.resume_id
        WHERE e.job_id = $1
          AND e.status IN ('completed', 'partially_failed')
          AND e.overall_score IS NOT NULL
        "#,
    )
    .bind(job_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(rank(candidates)))
}
