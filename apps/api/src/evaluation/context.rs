//! The evaluation context: one exclusively owned, append-only object threaded
//! through a pipeline run. Stages populate their own fields and never touch
//! fields written by earlier stages.

use serde::Serialize;
use uuid::Uuid;

use crate::analysis::{CandidateProfile, JobRequirements};
use crate::errors::{ErrorKind, EvalError};
use crate::evaluation::matcher::SkillGapReport;
use crate::evaluation::scorer::CompositeScore;

/// The fixed stage sequence of the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extract,
    Analyze,
    Embed,
    MatchSemantic,
    MatchSkills,
    Score,
    Recommend,
    Persist,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Analyze => "analyze",
            Stage::Embed => "embed",
            Stage::MatchSemantic => "match_semantic",
            Stage::MatchSkills => "match_skills",
            Stage::Score => "score",
            Stage::Recommend => "recommend",
            Stage::Persist => "persist",
        }
    }
}

/// Tagged run state. Completed means every stage ran clean; PartiallyFailed
/// means at least one best-effort stage degraded but scoring finished; Failed
/// means a mandatory stage aborted the run before scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running(Stage),
    Completed,
    PartiallyFailed,
    Failed,
    Cancelled,
}

impl RunState {
    pub fn status_str(self) -> &'static str {
        match self {
            RunState::Pending => "queued",
            RunState::Running(_) => "running",
            RunState::Completed => "completed",
            RunState::PartiallyFailed => "partially_failed",
            RunState::Failed => "failed",
            RunState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Completed | RunState::PartiallyFailed | RunState::Failed | RunState::Cancelled
        )
    }
}

/// One recorded stage failure, in occurrence order.
#[derive(Debug, Clone, Serialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug)]
pub struct EvaluationContext {
    pub evaluation_id: Uuid,
    pub resume_id: Uuid,
    pub job_id: Uuid,

    // Extract
    pub resume_text: Option<String>,
    pub job_text: String,

    // Analyze
    pub candidate: Option<CandidateProfile>,
    pub requirements: Option<JobRequirements>,

    // Embed
    pub resume_vector: Option<Vec<f32>>,
    pub job_vector: Option<Vec<f32>>,

    // MatchSemantic: percentage in [0, 100]
    pub semantic_score: Option<f64>,

    // MatchSkills
    pub gap_report: Option<SkillGapReport>,

    // Score
    pub scores: Option<CompositeScore>,

    // Recommend
    pub recommendation_text: Option<String>,

    pub stage_errors: Vec<StageFailure>,
    pub persistence_failed: bool,
    pub state: RunState,
}

impl EvaluationContext {
    pub fn new(evaluation_id: Uuid, resume_id: Uuid, job_id: Uuid, job_text: String) -> Self {
        Self {
            evaluation_id,
            resume_id,
            job_id,
            resume_text: None,
            job_text,
            candidate: None,
            requirements: None,
            resume_vector: None,
            job_vector: None,
            semantic_score: None,
            gap_report: None,
            scores: None,
            recommendation_text: None,
            stage_errors: Vec::new(),
            persistence_failed: false,
            state: RunState::Pending,
        }
    }

    pub fn record_failure(&mut self, stage: Stage, error: &EvalError) {
        self.stage_errors.push(StageFailure {
            stage,
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    /// The fatal failure that terminated a Failed run, if any.
    pub fn fatal_failure(&self) -> Option<&StageFailure> {
        if self.state == RunState::Failed {
            self.stage_errors.last()
        } else {
            None
        }
    }

    /// Names of dimensions left unavailable by degraded best-effort stages.
    pub fn degraded_dimensions(&self) -> Vec<&'static str> {
        let mut dims = Vec::new();
        for failure in &self.stage_errors {
            let dim = match failure.stage {
                Stage::Embed | Stage::MatchSemantic => Some("semantic"),
                Stage::Recommend => Some("recommendation"),
                _ => None,
            };
            if let Some(dim) = dim {
                if !dims.contains(&dim) {
                    dims.push(dim);
                }
            }
        }
        dims
    }

}
