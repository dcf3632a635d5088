use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A stored job posting. Parsed requirement fields are cached by the
/// pipeline's Persist stage after the first evaluation against the job.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub title: String,
    pub company: Option<String>,
    pub description_text: String,
    pub required_skills: Option<Vec<String>>,
    pub preferred_skills: Option<Vec<String>>,
    pub experience_required: Option<f64>,
    pub education_required: Option<String>,
    pub created_at: DateTime<Utc>,
}
