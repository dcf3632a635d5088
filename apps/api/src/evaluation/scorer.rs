//! Composite scorer: pure arithmetic over the four evaluation dimensions
//! with fixed weights. Re-running it on the same inputs is bit-identical.

use serde::{Deserialize, Serialize};

use crate::analysis::EducationLevel;
use crate::errors::EvalError;

/// Fixed dimension weights. They sum to 1.0; skill match dominates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub skill: f64,
    pub semantic: f64,
    pub experience: f64,
    pub education: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            skill: 0.40,
            semantic: 0.30,
            experience: 0.20,
            education: 0.10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub weights: ScoreWeights,
    /// Education credit for a candidate one level below the requirement.
    pub education_partial: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            education_partial: 60.0,
        }
    }
}

/// A dimension that could not be computed because its stage never produced a
/// value. It contributes 0 to the weighted sum but is reported so callers can
/// tell "scored 0" from "not computed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Semantic,
}

#[derive(Debug, Clone)]
pub struct ScoreInputs {
    /// Percentage in [0, 100].
    pub skill_match: f64,
    /// Percentage in [0, 100]; None when the embedding path degraded.
    pub semantic: Option<f64>,
    pub candidate_experience: f64,
    pub required_experience: f64,
    pub candidate_education: EducationLevel,
    pub required_education: EducationLevel,
}

/// All sub-scores at full precision. Ranking compares these values directly;
/// `display()` rounds for presentation only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeScore {
    pub overall: f64,
    pub skill_match: f64,
    pub semantic: Option<f64>,
    pub experience: f64,
    pub education: f64,
    pub unavailable: Vec<Dimension>,
}

/// One-decimal projection for presentation.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayScore {
    pub overall: f64,
    pub skill_match: f64,
    pub semantic: Option<f64>,
    pub experience: f64,
    pub education: f64,
}

impl CompositeScore {
    pub fn display(&self) -> DisplayScore {
        DisplayScore {
            overall: round1(self.overall),
            skill_match: round1(self.skill_match),
            semantic: self.semantic.map(round1),
            experience: round1(self.experience),
            education: round1(self.education),
        }
    }
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Computes the weighted composite score.
///
/// Malformed inputs are a contract violation from an upstream stage and fail
/// fast before any weighting.
pub fn score(inputs: &ScoreInputs, config: &ScoringConfig) -> Result<CompositeScore, EvalError> {
    validate(inputs)?;

    let experience = experience_score(inputs.candidate_experience, inputs.required_experience);
    let education = education_score(
        inputs.candidate_education,
        inputs.required_education,
        config.education_partial,
    );

    let mut unavailable = Vec::new();
    let semantic_value = match inputs.semantic {
        Some(v) => v,
        None => {
            unavailable.push(Dimension::Semantic);
            0.0
        }
    };

    let w = &config.weights;
    let overall = w.skill * inputs.skill_match
        + w.semantic * semantic_value
        + w.experience * experience
        + w.education * education;

    Ok(CompositeScore {
        overall,
        skill_match: inputs.skill_match,
        semantic: inputs.semantic,
        experience,
        education,
        unavailable,
    })
}

fn validate(inputs: &ScoreInputs) -> Result<(), EvalError> {
    check_percent("skill_match_score", inputs.skill_match)?;
    if let Some(semantic) = inputs.semantic {
        check_percent("semantic_score", semantic)?;
    }
    check_years("candidate_experience", inputs.candidate_experience)?;
    check_years("required_experience", inputs.required_experience)?;
    Ok(())
}

fn check_percent(name: &str, value: f64) -> Result<(), EvalError> {
    if !value.is_finite() || !(0.0..=100.0).contains(&value) {
        return Err(EvalError::InvalidScoreInput(format!(
            "{name} must be in [0, 100], got {value}"
        )));
    }
    Ok(())
}

fn check_years(name: &str, value: f64) -> Result<(), EvalError> {
    if !value.is_finite() || value < 0.0 {
        return Err(EvalError::InvalidScoreInput(format!(
            "{name} must be non-negative, got {value}"
        )));
    }
    Ok(())
}

/// Linear ratio of candidate to required experience, capped at 100.
/// No requirement means any candidate satisfies it.
fn experience_score(candidate: f64, required: f64) -> f64 {
    if required == 0.0 {
        return 100.0;
    }
    (100.0 * candidate / required).min(100.0)
}

/// Step function over the ordinal education scale.
fn education_score(candidate: EducationLevel, required: EducationLevel, partial: f64) -> f64 {
    if candidate >= required {
        return 100.0;
    }
    match required.rank() - candidate.rank() {
        1 => partial,
        _ => 0.0,
    }
}

/// Human-readable band for an overall score.
pub fn score_label(overall: f64) -> &'static str {
    if overall >= 85.0 {
        "Excellent Match"
    } else if overall >= 70.0 {
        "Strong Match"
    } else if overall >= 55.0 {
        "Good Match"
    } else if overall >= 40.0 {
        "Moderate Match"
    } else if overall >= 25.0 {
        "Weak Match"
    } else {
        "Poor Match"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> ScoreInputs {
        ScoreInputs {
            skill_match: 80.0,
            semantic: Some(60.0),
            candidate_experience: 5.0,
            required_experience: 5.0,
            candidate_education: EducationLevel::Bachelor,
            required_education: EducationLevel::Bachelor,
        }
    }

    fn config() -> ScoringConfig {
        ScoringConfig::default()
    }

    #[test]
    fn test_weighted_formula() {
        // 0.4*80 + 0.3*60 + 0.2*100 + 0.1*100 = 32 + 18 + 20 + 10 = 80
        let result = score(&inputs(), &config()).unwrap();
        assert!((result.overall - 80.0).abs() < 1e-9);
        assert!(result.unavailable.is_empty());
    }

    #[test]
    fn test_deterministic_bit_identical() {
        let a = score(&inputs(), &config()).unwrap();
        let b = score(&inputs(), &config()).unwrap();
        assert_eq!(a.overall.to_bits(), b.overall.to_bits());
        assert_eq!(a.experience.to_bits(), b.experience.to_bits());
        assert_eq!(a.education.to_bits(), b.education.to_bits());
    }

    #[test]
    fn test_unavailable_semantic_contributes_zero_and_is_recorded() {
        let mut i = inputs();
        i.semantic = None;
        let result = score(&i, &config()).unwrap();
        // 0.4*80 + 0 + 0.2*100 + 0.1*100 = 62
        assert!((result.overall - 62.0).abs() < 1e-9);
        assert_eq!(result.unavailable, vec![Dimension::Semantic]);
        assert!(result.semantic.is_none());
    }

    #[test]
    fn test_experience_monotonic_and_capped() {
        let mut last = -1.0;
        for years in [0.0, 1.0, 2.5, 5.0, 7.5, 10.0, 50.0] {
            let s = experience_score(years, 5.0);
            assert!(s >= last, "not monotonic at {years}");
            assert!(s <= 100.0);
            last = s;
        }
        assert_eq!(experience_score(10.0, 5.0), 100.0);
        assert_eq!(experience_score(2.5, 5.0), 50.0);
    }

    #[test]
    fn test_no_experience_requirement_is_full_credit() {
        assert_eq!(experience_score(0.0, 0.0), 100.0);
        assert_eq!(experience_score(20.0, 0.0), 100.0);
    }

    #[test]
    fn test_education_step_function() {
        let partial = 60.0;
        assert_eq!(
            education_score(EducationLevel::Master, EducationLevel::Bachelor, partial),
            100.0
        );
        assert_eq!(
            education_score(EducationLevel::Bachelor, EducationLevel::Bachelor, partial),
            100.0
        );
        assert_eq!(
            education_score(EducationLevel::Bachelor, EducationLevel::Master, partial),
            60.0
        );
        assert_eq!(
            education_score(EducationLevel::Bachelor, EducationLevel::Doctorate, partial),
            0.0
        );
    }

    #[test]
    fn test_unspecified_requirement_always_full_credit() {
        assert_eq!(
            education_score(EducationLevel::Unspecified, EducationLevel::Unspecified, 60.0),
            100.0
        );
        assert_eq!(
            education_score(EducationLevel::Doctorate, EducationLevel::Unspecified, 60.0),
            100.0
        );
    }

    #[test]
    fn test_negative_experience_fails_fast() {
        let mut i = inputs();
        i.candidate_experience = -1.0;
        let err = score(&i, &config()).unwrap_err();
        assert!(matches!(err, EvalError::InvalidScoreInput(_)));
    }

    #[test]
    fn test_out_of_range_scores_fail_fast() {
        let mut i = inputs();
        i.skill_match = 101.0;
        assert!(matches!(
            score(&i, &config()).unwrap_err(),
            EvalError::InvalidScoreInput(_)
        ));

        let mut i = inputs();
        i.semantic = Some(f64::NAN);
        assert!(matches!(
            score(&i, &config()).unwrap_err(),
            EvalError::InvalidScoreInput(_)
        ));
    }

    #[test]
    fn test_display_rounds_to_one_decimal_full_precision_retained() {
        let mut i = inputs();
        i.skill_match = 54.321;
        let result = score(&i, &config()).unwrap();
        let display = result.display();
        assert_eq!(display.skill_match, 54.3);
        assert!((result.skill_match - 54.321).abs() < 1e-12);
    }

    #[test]
    fn test_overall_bounded() {
        let i = ScoreInputs {
            skill_match: 100.0,
            semantic: Some(100.0),
            candidate_experience: 50.0,
            required_experience: 1.0,
            candidate_education: EducationLevel::Doctorate,
            required_education: EducationLevel::Unspecified,
        };
        let result = score(&i, &config()).unwrap();
        assert!((result.overall - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_score_labels() {
        assert_eq!(score_label(90.0), "Excellent Match");
        assert_eq!(score_label(72.0), "Strong Match");
        assert_eq!(score_label(55.0), "Good Match");
        assert_eq!(score_label(41.0), "Moderate Match");
        assert_eq!(score_label(30.0), "Weak Match");
        assert_eq!(score_label(10.0), "Poor Match");
    }
}
