//! Skill gap matcher: classifies every required and preferred skill as
//! matched, partially matched (via the taxonomy equivalence table), or
//! missing, and computes the weighted skill-match score.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::taxonomy::{CanonicalSkill, SkillTaxonomy};

/// Matching knobs. Preferred skills count at a fraction of required weight;
/// the default of 0.5 is a product decision, not a constant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    pub preferred_weight: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            preferred_weight: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementKind {
    Required,
    Preferred,
}

/// The verdict for one required or preferred skill. `credit` is 1.0 for an
/// exact match, the equivalence-rule weight in (0, 1) for a partial match,
/// and 0.0 for a miss. `satisfied_by` names the candidate skill that earned
/// partial credit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillAssessment {
    pub skill: String,
    pub kind: RequirementKind,
    pub credit: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub satisfied_by: Option<String>,
    /// Taxonomy category of the skill; None for non-canonical skills.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Full gap report. Every required/preferred skill appears in exactly one of
/// the three sets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillGapReport {
    pub matched: Vec<SkillAssessment>,
    pub partial: Vec<SkillAssessment>,
    pub missing: Vec<SkillAssessment>,
    /// Percentage in [0, 100].
    pub skill_match_score: f64,
}

impl SkillGapReport {
    pub fn matched_skills(&self) -> Vec<String> {
        self.matched.iter().map(|a| a.skill.clone()).collect()
    }

    pub fn missing_skills(&self, kind: RequirementKind) -> Vec<String> {
        self.missing
            .iter()
            .filter(|a| a.kind == kind)
            .map(|a| a.skill.clone())
            .collect()
    }
}

/// Matches candidate skills against a job's required and preferred skills.
///
/// Skills are canonicalized first; duplicates collapse, and a skill listed as
/// both required and preferred counts once, as required. Never fails: empty
/// inputs produce an empty report with the defined score.
pub fn match_skills(
    candidate_skills: &[String],
    required: &[String],
    preferred: &[String],
    taxonomy: &SkillTaxonomy,
    config: &MatcherConfig,
) -> SkillGapReport {
    let held = canonicalize_unique(candidate_skills, taxonomy);
    let held_names: HashSet<&str> = held.iter().map(|s| s.name.as_str()).collect();

    let required_targets = canonicalize_unique(required, taxonomy);
    let mut preferred_targets = canonicalize_unique(preferred, taxonomy);
    preferred_targets.retain(|p| !required_targets.iter().any(|r| r.name == p.name));

    let mut report = SkillGapReport {
        matched: Vec::new(),
        partial: Vec::new(),
        missing: Vec::new(),
        skill_match_score: 0.0,
    };

    let mut required_credit = 0.0;
    for target in &required_targets {
        let assessment = assess(target, RequirementKind::Required, &held_names, &held, taxonomy);
        required_credit += assessment.credit;
        file_assessment(&mut report, assessment);
    }

    let mut preferred_credit = 0.0;
    for target in &preferred_targets {
        let assessment = assess(target, RequirementKind::Preferred, &held_names, &held, taxonomy);
        preferred_credit += assessment.credit;
        file_assessment(&mut report, assessment);
    }

    report.skill_match_score = score(
        required_credit,
        required_targets.len(),
        preferred_credit,
        preferred_targets.len(),
        config.preferred_weight,
    );
    report
}

fn assess(
    target: &CanonicalSkill,
    kind: RequirementKind,
    held_names: &HashSet<&str>,
    held: &[CanonicalSkill],
    taxonomy: &SkillTaxonomy,
) -> SkillAssessment {
    let category = taxonomy.category_of(&target.name).map(String::from);

    if held_names.contains(target.name.as_str()) {
        return SkillAssessment {
            skill: target.name.clone(),
            kind,
            credit: 1.0,
            satisfied_by: None,
            category,
        };
    }

    // Equivalence lookups are canonical-only; unknown strings exact-match
    // above but never substitute.
    if target.canonical {
        if let Some((via, weight)) = taxonomy.equivalent_match(&target.name, held) {
            return SkillAssessment {
                skill: target.name.clone(),
                kind,
                credit: weight,
                satisfied_by: Some(via),
                category,
            };
        }
    }

    SkillAssessment {
        skill: target.name.clone(),
        kind,
        credit: 0.0,
        satisfied_by: None,
        category,
    }
}

fn file_assessment(report: &mut SkillGapReport, assessment: SkillAssessment) {
    if assessment.credit >= 1.0 {
        report.matched.push(assessment);
    } else if assessment.credit > 0.0 {
        report.partial.push(assessment);
    } else {
        report.missing.push(assessment);
    }
}

/// Weighted credit over weighted totals, as a percentage. Preferred skills
/// can only raise the score: the result is floored at what required-only
/// matching would give. No requirements at all is trivially a full match.
fn score(
    required_credit: f64,
    required_count: usize,
    preferred_credit: f64,
    preferred_count: usize,
    preferred_weight: f64,
) -> f64 {
    let required_total = required_count as f64;
    let preferred_total = preferred_count as f64 * preferred_weight;
    let denominator = required_total + preferred_total;
    if denominator == 0.0 {
        return 100.0;
    }

    let combined =
        (required_credit + preferred_credit * preferred_weight) / denominator * 100.0;
    let floored = if required_count > 0 {
        combined.max(required_credit / required_total * 100.0)
    } else {
        combined
    };
    floored.clamp(0.0, 100.0)
}

fn canonicalize_unique(skills: &[String], taxonomy: &SkillTaxonomy) -> Vec<CanonicalSkill> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for raw in skills {
        let skill = taxonomy.canonicalize(raw);
        if skill.name.is_empty() || !seen.insert(skill.name.clone()) {
            continue;
        }
        out.push(skill);
    }
    out
}
