//! Resume analysis: candidate identity, skills, experience and education
//! from extracted resume text.

use std::sync::LazyLock;

use chrono::{Datelike, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::analysis::{extract_skills, EducationLevel};
use crate::errors::EvalError;
use crate::taxonomy::SkillTaxonomy;

/// Experience sums from date ranges are capped here; anything longer is a
/// parsing artifact, not a career.
const MAX_EXPERIENCE_YEARS: f64 = 40.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Canonical skill names, in deterministic lexicon order.
    pub skills: Vec<String>,
    pub experience_years: f64,
    pub education: EducationLevel,
}

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("Invalid regex")
});

static EXPERIENCE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)(\d{1,2})\s*\+?\s*years?\s+of\s+(?:work\s+|professional\s+)?experience",
        r"(?i)experience\s+of\s+(\d{1,2})\s*\+?\s*years?",
        r"(?i)(\d{1,2})\s*\+?\s*years?\s+(?:of\s+)?(?:work|professional|industry|relevant)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid regex"))
    .collect()
});

static DATE_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(19\d{2}|20\d{2})\s*[-–—]\s*(19\d{2}|20\d{2}|present|current|now)\b")
        .expect("Invalid regex")
});

static NON_NAME_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)@|https?://|www\.|linkedin|github|resume|curriculum|\bcv\b")
        .expect("Invalid regex")
});

/// Parses resume text into a `CandidateProfile`.
/// Fails only on empty input; individual fields degrade to None/0/empty.
pub fn analyze_resume(
    text: &str,
    taxonomy: &SkillTaxonomy,
) -> Result<CandidateProfile, EvalError> {
    if text.trim().is_empty() {
        return Err(EvalError::Analysis("resume text is empty".into()));
    }

    let skills = extract_skills(text, taxonomy)
        .into_iter()
        .map(|f| f.canonical)
        .collect();

    Ok(CandidateProfile {
        name: extract_name(text),
        email: extract_email(text),
        skills,
        experience_years: extract_experience_years(text),
        education: EducationLevel::detect(text),
    })
}

fn extract_email(text: &str) -> Option<String> {
    EMAIL.find(text).map(|m| m.as_str().to_string())
}

/// The candidate's name is usually one of the first lines: short, no digits,
/// every word capitalized, not contact info.
fn extract_name(text: &str) -> Option<String> {
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()).take(5) {
        if NON_NAME_LINE.is_match(line) {
            continue;
        }
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() || words.len() > 4 {
            continue;
        }
        if line.chars().any(|c| c.is_ascii_digit()) {
            continue;
        }
        let capitalized = words
            .iter()
            .all(|w| w.chars().next().is_some_and(|c| c.is_uppercase()));
        if capitalized {
            return Some(line.to_string());
        }
    }
    None
}

/// Stated experience ("7+ years of experience") wins; otherwise employment
/// date ranges are summed.
fn extract_experience_years(text: &str) -> f64 {
    for pattern in EXPERIENCE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            if let Ok(years) = caps[1].parse::<f64>() {
                return years.min(MAX_EXPERIENCE_YEARS);
            }
        }
    }

    let current_year = Utc::now().year();
    let mut total = 0.0;
    for caps in DATE_RANGE.captures_iter(text) {
        let Ok(start) = caps[1].parse::<i32>() else {
            continue;
        };
        let end = match caps[2].to_lowercase().as_str() {
            "present" | "current" | "now" => current_year,
            year => year.parse::<i32>().unwrap_or(start),
        };
        if (1990..=current_year).contains(&start) && start <= end {
            total += f64::from(end - start);
        }
    }
    total.min(MAX_EXPERIENCE_YEARS)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESUME: &str = "\
Jane Arbor
jane.arbor@example.com | +1 555 010 0199
Senior Backend Engineer

Summary
8 years of professional experience building data platforms in Python and Go,
deployed on Kubernetes with PostgreSQL and Redis.

Experience
Data Platform Lead, Nimbus Analytics, 2019 - present
Backend Engineer, River Systems, 2015 - 2019

Education
B.Sc. in Computer Science
";

    fn taxonomy() -> SkillTaxonomy {
        SkillTaxonomy::load_default().unwrap()
    }

    #[test]
    fn test_analyze_resume_full_profile() {
        let profile = analyze_resume(RESUME, &taxonomy()).unwrap();
        assert_eq!(profile.name.as_deref(), Some("Jane Arbor"));
        assert_eq!(profile.email.as_deref(), Some("jane.arbor@example.com"));
        assert!((profile.experience_years - 8.0).abs() < f64::EPSILON);
        assert_eq!(profile.education, EducationLevel::Bachelor);
        for skill in ["python", "go", "kubernetes", "postgresql", "redis"] {
            assert!(
                profile.skills.iter().any(|s| s == skill),
                "missing {skill} in {:?}",
                profile.skills
            );
        }
    }

    #[test]
    fn test_empty_resume_is_analysis_error() {
        let err = analyze_resume("   \n ", &taxonomy()).unwrap_err();
        assert!(matches!(err, EvalError::Analysis(_)));
    }

    #[test]
    fn test_name_skips_contact_lines() {
        let text = "jane@example.com\nJane Arbor\nEngineer";
        assert_eq!(extract_name(text).as_deref(), Some("Jane Arbor"));
    }

    #[test]
    fn test_name_none_when_nothing_plausible() {
        let text = "RESUME 2024\n12 Elm Street\nphone: 555";
        assert_eq!(extract_name(text), None);
    }

    #[test]
    fn test_experience_from_date_ranges() {
        let text = "Acme Corp 2016 - 2020\nBeta LLC 2020 - 2023";
        assert!((extract_experience_years(text) - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_experience_stated_beats_date_ranges() {
        let text = "3 years of experience\nAcme 2010 - 2020";
        assert!((extract_experience_years(text) - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_experience_capped() {
        let text = "Acme 1991 - present\nBeta 1990 - 2020";
        assert!((extract_experience_years(text) - MAX_EXPERIENCE_YEARS).abs() < f64::EPSILON);
    }

    #[test]
    fn test_no_experience_signal_is_zero() {
        assert_eq!(extract_experience_years("fresh graduate"), 0.0);
    }
}
