use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::extract::extract_text;
use crate::models::job::JobRow;
use crate::models::resume::ResumeSummaryRow;
use crate::state::AppState;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const PREVIEW_CHARS: usize = 300;

#[derive(Serialize)]
pub struct ResumeUploadResponse {
    pub id: Uuid,
    pub file_name: String,
    pub text_length: usize,
    pub preview: String,
}

/// POST /api/v1/resumes
/// Multipart upload: either a `file` part (pdf/txt) or a `text` part with
/// pasted resume text. Extraction runs at intake so unreadable documents are
/// rejected immediately; the text is cached for the pipeline.
pub async fn handle_upload_resume(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ResumeUploadResponse>), AppError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut pasted: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("invalid multipart payload: {e}")))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field
                    .file_name()
                    .unwrap_or("resume.txt")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("failed to read file part: {e}")))?;
                file = Some((file_name, bytes.to_vec()));
            }
            Some("text") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("failed to read text part: {e}")))?;
                pasted = Some(text);
            }
            _ => {}
        }
    }

    let (file_name, content) = match (file, pasted) {
        (Some(file), _) => file,
        (None, Some(text)) => ("pasted_resume.txt".to_string(), text.into_bytes()),
        (None, None) => {
            return Err(AppError::Validation(
                "provide a 'file' or 'text' part".into(),
            ))
        }
    };
    if content.len() > MAX_UPLOAD_BYTES {
        return Err(AppError::Validation("file too large (max 10MB)".into()));
    }

    let extracted = extract_text(&content, &file_name)?;

    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO resumes (id, file_name, content, extracted_text) VALUES ($1, $2, $3, $4)",
    )
    .bind(id)
    .bind(&file_name)
    .bind(&content)
    .bind(&extracted)
    .execute(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ResumeUploadResponse {
            id,
            file_name,
            text_length: extracted.len(),
            preview: preview(&extracted),
        }),
    ))
}

/// GET /api/v1/resumes
pub async fn handle_list_resumes(
    State(state): State<AppState>,
) -> Result<Json<Vec<ResumeSummaryRow>>, AppError> {
    let rows: Vec<ResumeSummaryRow> = sqlx::query_as(
        r#"
        SELECT id, file_name, candidate_name, email, skills, experience_years,
               education_level, created_at
        FROM resumes
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

/// GET /api/v1/resumes/:id
pub async fn handle_get_resume(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ResumeSummaryRow>, AppError> {
    let row: Option<ResumeSummaryRow> = sqlx::query_as(
        r#"
        SELECT id, file_name, candidate_name, email, skills, experience_years,
               education_level, created_at
        FROM resumes
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?;
    row.map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Resume {id} not found")))
}

#[derive(Deserialize)]
pub struct JobCreateRequest {
    pub title: String,
    pub company: Option<String>,
    pub description_text: String,
}

#[derive(Serialize)]
pub struct JobCreateResponse {
    pub id: Uuid,
    pub title: String,
    pub text_length: usize,
}

/// POST /api/v1/jobs
pub async fn handle_create_job(
    State(state): State<AppState>,
    Json(req): Json<JobCreateRequest>,
) -> Result<(StatusCode, Json<JobCreateResponse>), AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("title must not be empty".into()));
    }
    if req.description_text.trim().is_empty() {
        return Err(AppError::Validation(
            "description_text must not be empty".into(),
        ));
    }

    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO jobs (id, title, company, description_text) VALUES ($1, $2, $3, $4)",
    )
    .bind(id)
    .bind(req.title.trim())
    .bind(req.company.as_deref())
    .bind(&req.description_text)
    .execute(&state.db)
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(JobCreateResponse {
            id,
            title: req.title.trim().to_string(),
            text_length: req.description_text.len(),
        }),
    ))
}

/// GET /api/v1/jobs
pub async fn handle_list_jobs(State(state): State<AppState>) -> Result<Json<Vec<JobRow>>, AppError> {
    let rows: Vec<JobRow> = sqlx::query_as(
        r#"
        SELECT id, title, company, description_text, required_skills,
               preferred_skills, experience_required, education_required,
               created_at
        FROM jobs
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

/// GET /api/v1/jobs/:id
pub async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobRow>, AppError> {
    let row: Option<JobRow> = sqlx::query_as(
        r#"
        SELECT id, title, company, description_text, required_skills,
               preferred_skills, experience_required, education_required,
               created_at
        FROM jobs
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await?;
    row.map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Job {id} not found")))
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        return text.to_string();
    }
    let truncated: String = text.chars().take(PREVIEW_CHARS).collect();
    format!("{truncated}...")
}
