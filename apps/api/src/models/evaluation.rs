use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A persisted evaluation. Score columns hold the one-decimal display values
/// except `overall_score`, which keeps full precision for ranking; null score
/// columns mean the stage that computes them was never reached.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EvaluationRow {
    pub id: Uuid,
    pub resume_id: Uuid,
    pub job_id: Uuid,
    pub status: String,
    pub overall_score: Option<f64>,
    pub skill_match_score: Option<f64>,
    pub semantic_score: Option<f64>,
    pub experience_score: Option<f64>,
    pub education_score: Option<f64>,
    pub matched_skill_count: Option<i32>,
    pub matched_skills: Option<Vec<String>>,
    pub missing_skills: Option<Vec<String>>,
    pub degraded: Option<Vec<String>>,
    pub gap_report: Option<Value>,
    pub stage_errors: Option<Value>,
    pub recommendation_text: Option<String>,
    pub error_kind: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
