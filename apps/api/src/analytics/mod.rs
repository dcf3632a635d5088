//! Corpus analytics: totals, score distribution, and skill supply/demand
//! across all completed evaluations. A read-only projection for dashboards.

use std::collections::HashMap;

use axum::{extract::State, Json};
use serde::Serialize;
use sqlx::FromRow;

use crate::errors::AppError;
use crate::state::AppState;

const TOP_SKILLS: usize = 15;
const TOP_GAPS: usize = 10;

#[derive(Debug, Default, Serialize)]
pub struct ScoreDistribution {
    pub from_0_to_25: usize,
    pub from_25_to_50: usize,
    pub from_50_to_75: usize,
    pub from_75_to_100: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SkillCount {
    pub skill: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsSummary {
    pub total_resumes: usize,
    pub total_jobs: usize,
    pub total_evaluations: usize,
    pub avg_match_score: f64,
    pub score_distribution: ScoreDistribution,
    pub top_skills_demand: Vec<SkillCount>,
    pub top_skills_supply: Vec<SkillCount>,
    pub common_skill_gaps: Vec<SkillCount>,
    pub high_match_count: usize,
    pub low_match_count: usize,
}

pub struct AnalyticsInput {
    pub total_resumes: usize,
    pub total_jobs: usize,
    pub scores: Vec<f64>,
    pub demand_skills: Vec<String>,
    pub supply_skills: Vec<String>,
    pub missing_skills: Vec<String>,
}

pub fn summarize(input: AnalyticsInput) -> AnalyticsSummary {
    let mut distribution = ScoreDistribution::default();
    for score in &input.scores {
        if *score < 25.0 {
            distribution.from_0_to_25 += 1;
        } else if *score < 50.0 {
            distribution.from_25_to_50 += 1;
        } else if *score < 75.0 {
            distribution.from_50_to_75 += 1;
        } else {
            distribution.from_75_to_100 += 1;
        }
    }

    let avg_match_score = if input.scores.is_empty() {
        0.0
    } else {
        let sum: f64 = input.scores.iter().sum();
        (sum / input.scores.len() as f64 * 100.0).round() / 100.0
    };

    let high_match_count = distribution.from_75_to_100;
    let low_match_count = distribution.from_0_to_25;

    AnalyticsSummary {
        total_resumes: input.total_resumes,
        total_jobs: input.total_jobs,
        total_evaluations: input.scores.len(),
        avg_match_score,
        score_distribution: distribution,
        top_skills_demand: top_counts(&input.demand_skills, TOP_SKILLS),
        top_skills_supply: top_counts(&input.supply_skills, TOP_SKILLS),
        common_skill_gaps: top_counts(&input.missing_skills, TOP_GAPS),
        high_match_count,
        low_match_count,
    }
}

/// Most frequent skills first; equal counts order alphabetically so repeat
/// calls are stable.
fn top_counts(skills: &[String], limit: usize) -> Vec<SkillCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for skill in skills {
        *counts.entry(skill.as_str()).or_default() += 1;
    }
    let mut entries: Vec<SkillCount> = counts
        .into_iter()
        .map(|(skill, count)| SkillCount {
            skill: skill.to_string(),
            count,
        })
        .collect();
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.skill.cmp(&b.skill)));
    entries.truncate(limit);
    entries
}

#[derive(FromRow)]
struct EvalStatsRow {
    overall_score: Option<f64>,
    missing_skills: Option<Vec<String>>,
}

/// GET /api/v1/analytics
pub async fn handle_get_analytics(
    State(state): State<AppState>,
) -> Result<Json<AnalyticsSummary>, AppError> {
    let (total_resumes,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM resumes")
        .fetch_one(&state.db)
        .await?;
    let (total_jobs,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs")
        .fetch_one(&state.db)
        .await?;

    let supply: Vec<(Option<Vec<String>>,)> = sqlx::query_as("SELECT skills FROM resumes")
        .fetch_all(&state.db)
        .await?;
    let demand: Vec<(Option<Vec<String>>,)> = sqlx::query_as("SELECT required_skills FROM jobs")
        .fetch_all(&state.db)
        .await?;

    let evaluations: Vec<EvalStatsRow> = sqlx::query_as(
        r#"
        SELECT overall_score, missing_skills
        FROM evaluations
        WHERE status IN ('completed', 'partially_failed')
        "#,
    )
    .fetch_all(&state.db)
    .await?;

    let input = AnalyticsInput {
        total_resumes: total_resumes as usize,
        total_jobs: total_jobs as usize,
        scores: evaluations
            .iter()
            .filter_map(|row| row.overall_score)
            .collect(),
        demand_skills: demand.into_iter().flat_map(|(s,)| s.unwrap_or_default()).collect(),
        supply_skills: supply.into_iter().flat_map(|(s,)| s.unwrap_or_default()).collect(),
        missing_skills: evaluations
            .into_iter()
            .flat_map(|row| row.missing_skills.unwrap_or_default())
            .collect(),
    };
    Ok(Json(summarize(input)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_score_distribution_buckets() {
        let summary = summarize(AnalyticsInput {
            total_resumes: 4,
            total_jobs: 1,
            scores: vec![10.0, 25.0, 49.9, 75.0, 92.5],
            demand_skills: vec![],
            supply_skills: vec![],
            missing_skills: vec![],
        });
        assert_eq!(summary.score_distribution.from_0_to_25, 1);
        assert_eq!(summary.score_distribution.from_25_to_50, 2);
        assert_eq!(summary.score_distribution.from_50_to_75, 0);
        assert_eq!(summary.score_distribution.from_75_to_100, 2);
        assert_eq!(summary.high_match_count, 2);
        assert_eq!(summary.low_match_count, 1);
        assert_eq!(summary.total_evaluations, 5);
    }

    #[test]
    fn test_average_rounded_two_decimals() {
        let summary = summarize(AnalyticsInput {
            total_resumes: 0,
            total_jobs: 0,
            scores: vec![50.0, 51.0, 53.0],
            demand_skills: vec![],
            supply_skills: vec![],
            missing_skills: vec![],
        });
        assert!((summary.avg_match_score - 51.33).abs() < 1e-9);
    }

    #[test]
    fn test_empty_scores_average_zero() {
        let summary = summarize(AnalyticsInput {
            total_resumes: 0,
            total_jobs: 0,
            scores: vec![],
            demand_skills: vec![],
            supply_skills: vec![],
            missing_skills: vec![],
        });
        assert_eq!(summary.avg_match_score, 0.0);
    }

    #[test]
    fn test_top_counts_order_and_alphabetical_ties() {
        let counts = top_counts(
            &strings(&["aws", "python", "aws", "docker", "python", "aws"]),
            10,
        );
        assert_eq!(counts[0].skill, "aws");
        assert_eq!(counts[0].count, 3);
        assert_eq!(counts[1].skill, "python");
        // docker and any other singletons order alphabetically.
        assert_eq!(counts[2].skill, "docker");
    }

    #[test]
    fn test_top_counts_truncates() {
        let skills = strings(&["a", "b", "c", "d"]);
        assert_eq!(top_counts(&skills, 2).len(), 2);
    }
}
