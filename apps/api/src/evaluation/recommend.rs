//! Recommendation collaborator: turns a gap report and scores into a short
//! human-readable evaluation summary. Behind a trait so the template renderer
//! can be swapped for an LLM-backed generator without touching the pipeline.

use async_trait::async_trait;

use crate::errors::EvalError;
use crate::evaluation::matcher::{RequirementKind, SkillGapReport};
use crate::evaluation::scorer::{round1, score_label, CompositeScore};

pub struct RecommendationInput<'a> {
    pub job_title: &'a str,
    pub candidate_skills: &'a [String],
    pub gap_report: &'a SkillGapReport,
    pub scores: &'a CompositeScore,
    pub experience_gap: f64,
}

#[async_trait]
pub trait Recommender: Send + Sync {
    async fn recommend(&self, input: RecommendationInput<'_>) -> Result<String, EvalError>;
}

/// Deterministic markdown renderer. Fast and offline; the default backend.
pub struct TemplateRecommender;

#[async_trait]
impl Recommender for TemplateRecommender {
    async fn recommend(&self, input: RecommendationInput<'_>) -> Result<String, EvalError> {
        Ok(render_recommendation(&input))
    }
}

fn overall_action(overall: f64, job_title: &str) -> String {
    if overall >= 85.0 {
        format!("Excellent candidate for {job_title}. Strongly recommend moving to the interview stage.")
    } else if overall >= 70.0 {
        format!("Strong candidate for {job_title}. Recommend for technical interview.")
    } else if overall >= 55.0 {
        format!("Reasonable match for {job_title}. Consider a preliminary interview.")
    } else if overall >= 40.0 {
        format!("Moderate match for {job_title}. Candidate needs skill development before being interview-ready.")
    } else {
        format!("Significant skill gaps for {job_title}. Recommend skill development before applying.")
    }
}

pub fn render_recommendation(input: &RecommendationInput<'_>) -> String {
    let overall = round1(input.scores.overall);
    let mut out = String::new();

    out.push_str("## Candidate Evaluation Summary\n\n");
    out.push_str(&format!(
        "**Match Score**: {overall:.1}/100 ({})\n\n",
        score_label(input.scores.overall)
    ));
    out.push_str(&overall_action(input.scores.overall, input.job_title));
    out.push('\n');

    out.push_str("\n### Key Strengths\n");
    if input.candidate_skills.is_empty() {
        out.push_str("No recognized technical skills detected.\n");
    } else {
        let strengths: Vec<&str> = input
            .candidate_skills
            .iter()
            .take(8)
            .map(String::as_str)
            .collect();
        out.push_str(&strengths.join(", "));
        out.push('\n');
    }

    out.push_str("\n### Skill Gaps\n");
    let missing_required = input.gap_report.missing_skills(RequirementKind::Required);
    let missing_preferred = input.gap_report.missing_skills(RequirementKind::Preferred);
    if missing_required.is_empty() && missing_preferred.is_empty() {
        out.push_str("No missing skills identified.\n");
    } else {
        for skill in missing_required.iter().take(5) {
            out.push_str(&format!(
                "- **{skill}** (priority: HIGH): acquire {skill} to meet core job requirements\n"
            ));
        }
        for skill in missing_preferred.iter().take(3) {
            out.push_str(&format!(
                "- **{skill}** (priority: MEDIUM): consider learning {skill} to strengthen the profile\n"
            ));
        }
    }

    if !input.gap_report.partial.is_empty() {
        out.push_str("\n### Accepted Substitutes\n");
        for assessment in input.gap_report.partial.iter().take(3) {
            if let Some(via) = &assessment.satisfied_by {
                out.push_str(&format!(
                    "- {via} counts toward {} at {:.0}% credit\n",
                    assessment.skill,
                    assessment.credit * 100.0
                ));
            }
        }
    }

    if input.experience_gap > 0.0 {
        out.push_str(&format!(
            "\n### Experience\nCandidate is {:.1} years short of the stated requirement; relevant projects or open-source work can close the gap.\n",
            input.experience_gap
        ));
    }

    out.trim_end().to_string()
}
