use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

/// Machine-readable classification for evaluation failures. Stored with each
/// stage error record and mapped 1:1 to caller-facing error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Extraction,
    Analysis,
    Embedding,
    Similarity,
    Recommendation,
    TaxonomyUnavailable,
    InvalidScoreInput,
    Persistence,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Extraction => "extraction",
            ErrorKind::Analysis => "analysis",
            ErrorKind::Embedding => "embedding",
            ErrorKind::Similarity => "similarity",
            ErrorKind::Recommendation => "recommendation",
            ErrorKind::TaxonomyUnavailable => "taxonomy_unavailable",
            ErrorKind::InvalidScoreInput => "invalid_score_input",
            ErrorKind::Persistence => "persistence",
        }
    }
}

/// Errors raised by pipeline stages and the collaborators they drive.
///
/// Extraction, Analysis, TaxonomyUnavailable and InvalidScoreInput are fatal
/// to a run; Embedding, Similarity and Recommendation degrade it; Persistence
/// is recorded without invalidating computed results.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("document extraction failed: {0}")]
    Extraction(String),

    #[error("analysis failed: {0}")]
    Analysis(String),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("similarity failed: {0}")]
    Similarity(String),

    #[error("recommendation failed: {0}")]
    Recommendation(String),

    #[error("skill taxonomy unavailable: {0}")]
    TaxonomyUnavailable(String),

    #[error("invalid score input: {0}")]
    InvalidScoreInput(String),

    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl EvalError {
    /// Rebuilds an error from its stored (kind, message) form.
    pub fn from_kind(kind: ErrorKind, message: String) -> Self {
        match kind {
            ErrorKind::Extraction => EvalError::Extraction(message),
            ErrorKind::Analysis => EvalError::Analysis(message),
            ErrorKind::Embedding => EvalError::Embedding(message),
            ErrorKind::Similarity => EvalError::Similarity(message),
            ErrorKind::Recommendation => EvalError::Recommendation(message),
            ErrorKind::TaxonomyUnavailable => EvalError::TaxonomyUnavailable(message),
            ErrorKind::InvalidScoreInput => EvalError::InvalidScoreInput(message),
            ErrorKind::Persistence => EvalError::Persistence(message),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::Extraction(_) => ErrorKind::Extraction,
            EvalError::Analysis(_) => ErrorKind::Analysis,
            EvalError::Embedding(_) => ErrorKind::Embedding,
            EvalError::Similarity(_) => ErrorKind::Similarity,
            EvalError::Recommendation(_) => ErrorKind::Recommendation,
            EvalError::TaxonomyUnavailable(_) => ErrorKind::TaxonomyUnavailable,
            EvalError::InvalidScoreInput(_) => ErrorKind::InvalidScoreInput,
            EvalError::Persistence(_) => ErrorKind::Persistence,
        }
    }
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Evaluation queue is full")]
    QueueFull,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::QueueFull => (
                StatusCode::SERVICE_UNAVAILABLE,
                "QUEUE_FULL",
                "Evaluation queue is full, try again later".to_string(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Eval(e) => eval_error_response(e),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

fn eval_error_response(e: &EvalError) -> (StatusCode, &'static str, String) {
    match e {
        EvalError::Extraction(msg) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "EXTRACTION_ERROR",
            msg.clone(),
        ),
        EvalError::Analysis(msg) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "ANALYSIS_ERROR",
            msg.clone(),
        ),
        EvalError::Embedding(msg) => (StatusCode::BAD_GATEWAY, "EMBEDDING_ERROR", msg.clone()),
        EvalError::Similarity(msg) => (StatusCode::BAD_GATEWAY, "SIMILARITY_ERROR", msg.clone()),
        EvalError::Recommendation(msg) => (
            StatusCode::BAD_GATEWAY,
            "RECOMMENDATION_ERROR",
            msg.clone(),
        ),
        EvalError::TaxonomyUnavailable(msg) => {
            tracing::error!("Taxonomy unavailable: {msg}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "TAXONOMY_UNAVAILABLE",
                msg.clone(),
            )
        }
        EvalError::InvalidScoreInput(msg) => {
            tracing::error!("Invalid score input (contract bug upstream): {msg}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INVALID_SCORE_INPUT",
                msg.clone(),
            )
        }
        EvalError::Persistence(msg) => {
            tracing::error!("Persistence error: {msg}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "PERSISTENCE_ERROR",
                msg.clone(),
            )
        }
    }
}
