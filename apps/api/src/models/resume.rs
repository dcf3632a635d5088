use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Listing projection of a stored resume. Parsed candidate fields are null
/// until the first evaluation run persists them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeSummaryRow {
    pub id: Uuid,
    pub file_name: String,
    pub candidate_name: Option<String>,
    pub email: Option<String>,
    pub skills: Option<Vec<String>>,
    pub experience_years: Option<f64>,
    pub education_level: Option<String>,
    pub created_at: DateTime<Utc>,
}
