//! The evaluation pipeline: a static, compiled sequence of typed stage
//! functions over one exclusively owned `EvaluationContext`.
//!
//! Stage policy:
//! - Extract and Analyze are mandatory; failure aborts the run as Failed.
//! - Embed, MatchSemantic and Recommend are best-effort; failure (or
//!   timeout) is recorded and the run continues with that field unavailable.
//! - MatchSkills and Score are mandatory once Analyze succeeded.
//! - Persist failure is flagged but never invalidates a computed result.
//!
//! No stage is retried inside a run; retry is a caller-level decision.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analysis::{analyze_job, analyze_resume};
use crate::embedding::{similarity, Embedder};
use crate::errors::EvalError;
use crate::evaluation::context::{EvaluationContext, RunState, Stage};
use crate::evaluation::matcher::{match_skills, MatcherConfig, RequirementKind};
use crate::evaluation::recommend::{RecommendationInput, Recommender};
use crate::evaluation::scorer::{score, ScoreInputs, ScoringConfig};
use crate::extract::extract_text;
use crate::taxonomy::SkillTaxonomy;

/// Cooperative cancellation flag for one run. Checked at stage boundaries;
/// stages are not preemptible mid-computation.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The resume document as stored at intake. Extraction is skipped when the
/// intake path already cached the text.
#[derive(Debug, Clone)]
pub struct ResumeDocument {
    pub file_name: String,
    pub content: Vec<u8>,
    pub cached_text: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PipelineInput {
    pub evaluation_id: Uuid,
    pub resume_id: Uuid,
    pub job_id: Uuid,
    pub resume: ResumeDocument,
    pub job_text: String,
}

/// Everything the stages need. One taxonomy snapshot is captured per run, so
/// a mid-run reload never changes matching behavior.
pub struct StageDeps {
    pub taxonomy: Arc<SkillTaxonomy>,
    pub embedder: Arc<dyn Embedder>,
    pub recommender: Arc<dyn Recommender>,
    pub matcher: MatcherConfig,
    pub scoring: ScoringConfig,
    pub stage_timeout: Duration,
    pub cancel: CancelFlag,
}

/// Runs the full pipeline including the Persist stage.
pub async fn run(input: PipelineInput, deps: &StageDeps, db: &PgPool) -> EvaluationContext {
    let mut ctx = run_stages(input, deps).await;

    if ctx.state == RunState::Cancelled {
        if let Err(e) = mark_status(db, ctx.evaluation_id, "cancelled").await {
            warn!("Failed to persist cancelled status: {e}");
        }
        return ctx;
    }

    if let Err(e) = persist_stage(&ctx, db).await {
        warn!(
            "Persist stage failed for evaluation {}: {e}",
            ctx.evaluation_id
        );
        ctx.record_failure(Stage::Persist, &e);
        ctx.persistence_failed = true;
    }
    ctx
}

/// Runs Extract through Recommend and computes the terminal state, without
/// touching the database.
pub async fn run_stages(input: PipelineInput, deps: &StageDeps) -> EvaluationContext {
    let mut ctx = EvaluationContext::new(
        input.evaluation_id,
        input.resume_id,
        input.job_id,
        input.job_text,
    );

    if deps.cancel.is_cancelled() {
        ctx.state = RunState::Cancelled;
        return ctx;
    }

    // Extract: mandatory, bounded by the stage timeout.
    ctx.state = RunState::Running(Stage::Extract);
    match extract_stage(&input.resume, deps).await {
        Ok(text) => ctx.resume_text = Some(text),
        Err(e) => return abort(ctx, Stage::Extract, e),
    }
    if deps.cancel.is_cancelled() {
        ctx.state = RunState::Cancelled;
        return ctx;
    }

    // Analyze: mandatory; covers both the resume and the job description.
    ctx.state = RunState::Running(Stage::Analyze);
    let resume_text = ctx.resume_text.clone().unwrap_or_default();
    match analyze_resume(&resume_text, &deps.taxonomy) {
        Ok(profile) => ctx.candidate = Some(profile),
        Err(e) => return abort(ctx, Stage::Analyze, e),
    }
    match analyze_job(&ctx.job_text, &deps.taxonomy) {
        Ok(requirements) => ctx.requirements = Some(requirements),
        Err(e) => return abort(ctx, Stage::Analyze, e),
    }
    if deps.cancel.is_cancelled() {
        ctx.state = RunState::Cancelled;
        return ctx;
    }

    // Embed: best-effort.
    ctx.state = RunState::Running(Stage::Embed);
    match embed_stage(&resume_text, &ctx.job_text, deps).await {
        Ok((resume_vector, job_vector)) => {
            ctx.resume_vector = Some(resume_vector);
            ctx.job_vector = Some(job_vector);
        }
        Err(e) => {
            warn!("Embed stage degraded: {e}");
            ctx.record_failure(Stage::Embed, &e);
        }
    }
    if deps.cancel.is_cancelled() {
        ctx.state = RunState::Cancelled;
        return ctx;
    }

    // MatchSemantic: best-effort, pure computation over the vectors.
    ctx.state = RunState::Running(Stage::MatchSemantic);
    match semantic_stage(&ctx) {
        Ok(semantic) => ctx.semantic_score = Some(semantic),
        Err(e) => {
            warn!("MatchSemantic stage degraded: {e}");
            ctx.record_failure(Stage::MatchSemantic, &e);
        }
    }
    if deps.cancel.is_cancelled() {
        ctx.state = RunState::Cancelled;
        return ctx;
    }

    // MatchSkills: mandatory, in-process, cannot fail once Analyze succeeded.
    ctx.state = RunState::Running(Stage::MatchSkills);
    let candidate = ctx.candidate.as_ref().expect("analyze stage populated");
    let requirements = ctx.requirements.as_ref().expect("analyze stage populated");
    let report = match_skills(
        &candidate.skills,
        &requirements.required_skills,
        &requirements.preferred_skills,
        &deps.taxonomy,
        &deps.matcher,
    );
    info!(
        "MatchSkills: score={:.1} matched={} partial={} missing={}",
        report.skill_match_score,
        report.matched.len(),
        report.partial.len(),
        report.missing.len()
    );
    ctx.gap_report = Some(report);

    // Score: always runs once MatchSkills succeeded, over whatever
    // dimensions are available. An input violation here is a bug upstream
    // and aborts the run.
    ctx.state = RunState::Running(Stage::Score);
    let inputs = ScoreInputs {
        skill_match: ctx
            .gap_report
            .as_ref()
            .map(|r| r.skill_match_score)
            .unwrap_or_default(),
        semantic: ctx.semantic_score,
        candidate_experience: candidate.experience_years,
        required_experience: requirements.experience_required,
        candidate_education: candidate.education,
        required_education: requirements.education_required,
    };
    match score(&inputs, &deps.scoring) {
        Ok(composite) => {
            info!(
                "Score: overall={:.1} skill={:.1} semantic={:?} exp={:.1} edu={:.1}",
                composite.overall,
                composite.skill_match,
                composite.semantic.map(crate::evaluation::scorer::round1),
                composite.experience,
                composite.education
            );
            ctx.scores = Some(composite);
        }
        Err(e) => return abort(ctx, Stage::Score, e),
    }
    if deps.cancel.is_cancelled() {
        ctx.state = RunState::Cancelled;
        return ctx;
    }

    // Recommend: best-effort.
    ctx.state = RunState::Running(Stage::Recommend);
    match recommend_stage(&ctx, deps).await {
        Ok(text) => ctx.recommendation_text = Some(text),
        Err(e) => {
            warn!("Recommend stage degraded: {e}");
            ctx.record_failure(Stage::Recommend, &e);
        }
    }

    ctx.state = if ctx.stage_errors.is_empty() {
        RunState::Completed
    } else {
        RunState::PartiallyFailed
    };
    ctx
}

fn abort(mut ctx: EvaluationContext, stage: Stage, error: EvalError) -> EvaluationContext {
    warn!("{} stage failed, aborting run: {error}", stage.as_str());
    ctx.record_failure(stage, &error);
    ctx.state = RunState::Failed;
    ctx
}

fn timeout_error(stage: Stage, after: Duration) -> EvalError {
    let message = format!("{} stage timed out after {:?}", stage.as_str(), after);
    match stage {
        Stage::Extract => EvalError::Extraction(message),
        Stage::Embed => EvalError::Embedding(message),
        Stage::Recommend => EvalError::Recommendation(message),
        _ => EvalError::Analysis(message),
    }
}

async fn extract_stage(
    resume: &ResumeDocument,
    deps: &StageDeps,
) -> Result<String, EvalError> {
    if let Some(cached) = resume.cached_text.as_deref() {
        if !cached.trim().is_empty() {
            return Ok(cached.to_string());
        }
    }

    let content = resume.content.clone();
    let file_name = resume.file_name.clone();
    let task = tokio::task::spawn_blocking(move || extract_text(&content, &file_name));
    match tokio::time::timeout(deps.stage_timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(EvalError::Extraction(format!(
            "extraction task failed: {join_error}"
        ))),
        Err(_) => Err(timeout_error(Stage::Extract, deps.stage_timeout)),
    }
}

async fn embed_stage(
    resume_text: &str,
    job_text: &str,
    deps: &StageDeps,
) -> Result<(Vec<f32>, Vec<f32>), EvalError> {
    let work = async {
        let resume_vector = deps.embedder.embed(resume_text).await?;
        let job_vector = deps.embedder.embed(job_text).await?;
        Ok((resume_vector, job_vector))
    };
    match tokio::time::timeout(deps.stage_timeout, work).await {
        Ok(result) => result,
        Err(_) => Err(timeout_error(Stage::Embed, deps.stage_timeout)),
    }
}

fn semantic_stage(ctx: &EvaluationContext) -> Result<f64, EvalError> {
    let (Some(resume_vector), Some(job_vector)) = (&ctx.resume_vector, &ctx.job_vector) else {
        return Err(EvalError::Similarity(
            "embeddings unavailable, semantic match skipped".into(),
        ));
    };
    Ok(similarity(resume_vector, job_vector)? * 100.0)
}

async fn recommend_stage(
    ctx: &EvaluationContext,
    deps: &StageDeps,
) -> Result<String, EvalError> {
    let candidate = ctx.candidate.as_ref().expect("analyze stage populated");
    let requirements = ctx.requirements.as_ref().expect("analyze stage populated");
    let gap_report = ctx.gap_report.as_ref().expect("match stage populated");
    let scores = ctx.scores.as_ref().expect("score stage populated");

    let input = RecommendationInput {
        job_title: &requirements.title,
        candidate_skills: &candidate.skills,
        gap_report,
        scores,
        experience_gap: (requirements.experience_required - candidate.experience_years).max(0.0),
    };
    match tokio::time::timeout(deps.stage_timeout, deps.recommender.recommend(input)).await {
        Ok(result) => result,
        Err(_) => Err(timeout_error(Stage::Recommend, deps.stage_timeout)),
    }
}

/// Persist: writes the terminal evaluation row and refreshes the parsed
/// fields cached on the resume and job rows.
async fn persist_stage(ctx: &EvaluationContext, db: &PgPool) -> Result<(), EvalError> {
    let scores = ctx.scores.as_ref();
    let display = scores.map(|s| s.display());
    let gap_report = ctx
        .gap_report
        .as_ref()
        .and_then(|r| serde_json::to_value(r).ok());
    let stage_errors =
        serde_json::to_value(&ctx.stage_errors).unwrap_or(serde_json::Value::Null);
    let matched_skills = ctx.gap_report.as_ref().map(|r| r.matched_skills());
    let missing_skills = ctx
        .gap_report
        .as_ref()
        .map(|r| r.missing_skills(RequirementKind::Required));
    let degraded: Vec<String> = ctx
        .degraded_dimensions()
        .into_iter()
        .map(String::from)
        .collect();
    let fatal = ctx.fatal_failure();

    sqlx::query(
        r#"
        UPDATE evaluations SET
            status = $2,
            overall_score = $3,
            skill_match_score = $4,
            semantic_score = $5,
            experience_score = $6,
            education_score = $7,
            matched_skill_count = $8,
            matched_skills = $9,
            missing_skills = $10,
            degraded = $11,
            gap_report = $12,
            stage_errors = $13,
            recommendation_text = $14,
            error_kind = $15,
            error_message = $16,
            completed_at = now()
        WHERE id = $1
        "#,
    )
    .bind(ctx.evaluation_id)
    .bind(ctx.state.status_str())
    .bind(scores.map(|s| s.overall))
    .bind(display.as_ref().map(|d| d.skill_match))
    .bind(display.as_ref().and_then(|d| d.semantic))
    .bind(display.as_ref().map(|d| d.experience))
    .bind(display.as_ref().map(|d| d.education))
    .bind(ctx.gap_report.as_ref().map(|r| r.matched.len() as i32))
    .bind(&matched_skills)
    .bind(&missing_skills)
    .bind(&degraded)
    .bind(gap_report)
    .bind(stage_errors)
    .bind(ctx.recommendation_text.as_deref())
    .bind(fatal.map(|f| f.kind.as_str()))
    .bind(fatal.map(|f| f.message.as_str()))
    .execute(db)
    .await
    .map_err(|e| EvalError::Persistence(e.to_string()))?;

    if let Some(candidate) = &ctx.candidate {
        sqlx::query(
            r#"
            UPDATE resumes SET
                candidate_name = $2,
                email = $3,
                skills = $4,
                experience_years = $5,
                education_level = $6,
                extracted_text = COALESCE(extracted_text, $7)
            WHERE id = $1
            "#,
        )
        .bind(ctx.resume_id)
        .bind(candidate.name.as_deref())
        .bind(candidate.email.as_deref())
        .bind(&candidate.skills)
        .bind(candidate.experience_years)
        .bind(candidate.education.as_str())
        .bind(ctx.resume_text.as_deref())
        .execute(db)
        .await
        .map_err(|e| EvalError::Persistence(e.to_string()))?;
    }

    if let Some(requirements) = &ctx.requirements {
        sqlx::query(
            r#"
            UPDATE jobs SET
                required_skills = $2,
                preferred_skills = $3,
                experience_required = $4,
                education_required = $5
            WHERE id = $1
            "#,
        )
        .bind(ctx.job_id)
        .bind(&requirements.required_skills)
        .bind(&requirements.preferred_skills)
        .bind(requirements.experience_required)
        .bind(requirements.education_required.as_str())
        .execute(db)
        .await
        .map_err(|e| EvalError::Persistence(e.to_string()))?;
    }

    Ok(())
}

pub async fn mark_status(db: &PgPool, id: Uuid, status: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE evaluations SET status = $2, completed_at = now() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(db)
        .await?;
    Ok(())
}

/// Marks a run failed for infrastructure reasons outside the stage sequence
/// (missing rows, worker errors).
pub async fn mark_failed(db: &PgPool, id: Uuid, message: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE evaluations SET status = 'failed', error_kind = 'persistence', error_message = $2, completed_at = now() WHERE id = $1",
    )
    .bind(id)
    .bind(message)
    .execute(db)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::recommend::TemplateRecommender;
    use async_trait::async_trait;

    const RESUME_TEXT: &str = "\
Jane Arbor
jane@example.com
8 years of professional experience with Python, Kubernetes and PostgreSQL.
Education: B.Sc. in Computer Science
";

    const JOB_TEXT: &str = "\
Senior Data Engineer
Requirements: 5+ years of experience with Python and AWS. Bachelor's degree.
Nice to have: Docker
";

    struct StubEmbedder {
        fail: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, EvalError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(EvalError::Embedding("service unavailable".into()));
            }
            // Deterministic toy vector derived from the text length.
            let len = text.len() as f32;
            Ok(vec![1.0, len / (len + 1.0), 0.5])
        }
    }

    fn deps(embedder: StubEmbedder, timeout: Duration) -> StageDeps {
        StageDeps {
            taxonomy: Arc::new(SkillTaxonomy::load_default().unwrap()),
            embedder: Arc::new(embedder),
            recommender: Arc::new(TemplateRecommender),
            matcher: MatcherConfig::default(),
            scoring: ScoringConfig::default(),
            stage_timeout: timeout,
            cancel: CancelFlag::default(),
        }
    }

    fn input() -> PipelineInput {
        PipelineInput {
            evaluation_id: Uuid::new_v4(),
            resume_id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            resume: ResumeDocument {
                file_name: "resume.txt".into(),
                content: RESUME_TEXT.as_bytes().to_vec(),
                cached_text: None,
            },
            job_text: JOB_TEXT.to_string(),
        }
    }

    #[tokio::test]
    async fn test_clean_run_completes_with_all_dimensions() {
        let deps = deps(
            StubEmbedder {
                fail: false,
                delay: None,
            },
            Duration::from_secs(5),
        );
        let ctx = run_stages(input(), &deps).await;

        assert_eq!(ctx.state, RunState::Completed);
        assert!(ctx.stage_errors.is_empty());
        assert!(ctx.semantic_score.is_some());
        assert!(ctx.recommendation_text.is_some());
        let scores = ctx.scores.as_ref().unwrap();
        assert!(scores.unavailable.is_empty());
        assert!(scores.overall > 0.0);
    }

    #[tokio::test]
    async fn test_forced_embed_failure_partially_fails_with_semantic_unavailable() {
        let deps = deps(
            StubEmbedder {
                fail: true,
                delay: None,
            },
            Duration::from_secs(5),
        );
        let ctx = run_stages(input(), &deps).await;

        assert_eq!(ctx.state, RunState::PartiallyFailed);
        assert!(ctx.semantic_score.is_none());
        assert_eq!(ctx.degraded_dimensions(), vec!["semantic"]);

        // Scoring still completed; semantic contributed 0 to the weighted sum.
        let scores = ctx.scores.as_ref().unwrap();
        assert!(scores.semantic.is_none());
        let expected = 0.40 * scores.skill_match + 0.20 * scores.experience + 0.10 * scores.education;
        assert!((scores.overall - expected).abs() < 1e-9);

        // Both the embed failure and the skipped semantic match are recorded.
        assert!(ctx
            .stage_errors
            .iter()
            .any(|f| f.stage == Stage::Embed));
        assert!(ctx
            .stage_errors
            .iter()
            .any(|f| f.stage == Stage::MatchSemantic));
    }

    #[tokio::test]
    async fn test_embed_timeout_degrades_not_aborts() {
        let deps = deps(
            StubEmbedder {
                fail: false,
                delay: Some(Duration::from_secs(30)),
            },
            Duration::from_millis(20),
        );
        let ctx = run_stages(input(), &deps).await;

        assert_eq!(ctx.state, RunState::PartiallyFailed);
        let embed_failure = ctx
            .stage_errors
            .iter()
            .find(|f| f.stage == Stage::Embed)
            .unwrap();
        assert!(embed_failure.message.contains("timed out"));
        assert!(ctx.scores.is_some());
    }

    #[tokio::test]
    async fn test_unreadable_document_fails_run() {
        let mut input = input();
        input.resume.file_name = "resume.pdf".into();
        input.resume.content = b"not a pdf".to_vec();
        let deps = deps(
            StubEmbedder {
                fail: false,
                delay: None,
            },
            Duration::from_secs(5),
        );
        let ctx = run_stages(input, &deps).await;

        assert_eq!(ctx.state, RunState::Failed);
        let fatal = ctx.fatal_failure().unwrap();
        assert_eq!(fatal.stage, Stage::Extract);
        assert!(ctx.scores.is_none());
    }

    #[tokio::test]
    async fn test_empty_job_text_fails_at_analyze() {
        let mut input = input();
        input.job_text = "   ".into();
        let deps = deps(
            StubEmbedder {
                fail: false,
                delay: None,
            },
            Duration::from_secs(5),
        );
        let ctx = run_stages(input, &deps).await;

        assert_eq!(ctx.state, RunState::Failed);
        assert_eq!(ctx.fatal_failure().unwrap().stage, Stage::Analyze);
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let deps = deps(
            StubEmbedder {
                fail: false,
                delay: None,
            },
            Duration::from_secs(5),
        );
        deps.cancel.cancel();
        let ctx = run_stages(input(), &deps).await;
        assert_eq!(ctx.state, RunState::Cancelled);
        assert!(ctx.resume_text.is_none());
    }

    #[tokio::test]
    async fn test_cached_text_skips_extraction() {
        let mut input = input();
        input.resume.content = Vec::new();
        input.resume.cached_text = Some(RESUME_TEXT.to_string());
        let deps = deps(
            StubEmbedder {
                fail: false,
                delay: None,
            },
            Duration::from_secs(5),
        );
        let ctx = run_stages(input, &deps).await;
        assert_eq!(ctx.state, RunState::Completed);
    }

    #[tokio::test]
    async fn test_partial_credit_scenario_end_to_end() {
        // Candidate: Python + Kubernetes. Job: Python, AWS required; Docker
        // preferred. Expected skill match 54%.
        let mut input = input();
        input.resume.cached_text = Some(
            "Jane Arbor\n8 years of professional experience with Python and Kubernetes."
                .to_string(),
        );
        input.job_text =
            "Data Engineer\nRequired: Python, AWS\nNice to have: Docker".to_string();
        let deps = deps(
            StubEmbedder {
                fail: true,
                delay: None,
            },
            Duration::from_secs(5),
        );
        let ctx = run_stages(input, &deps).await;

        let report = ctx.gap_report.as_ref().unwrap();
        assert!(
            (report.skill_match_score - 54.0).abs() < 1e-9,
            "got {}",
            report.skill_match_score
        );
    }
}
