//! Job-description analysis: title, required vs preferred skills, experience
//! and education requirements.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::analysis::{extract_skills, EducationLevel};
use crate::errors::EvalError;
use crate::taxonomy::SkillTaxonomy;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequirements {
    pub title: String,
    pub required_skills: Vec<String>,
    pub preferred_skills: Vec<String>,
    pub experience_required: f64,
    pub education_required: EducationLevel,
}

static TITLE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^(?:job\s+title|position(?:\s+title)?|role|opening)\s*[:\-]\s*(.{3,80})$")
        .expect("Invalid regex")
});

static ROLE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:engineer|developer|analyst|scientist|architect|manager|designer|specialist|lead|consultant|director|administrator)\b",
    )
    .expect("Invalid regex")
});

static SKIP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)@|https?://|\b(?:about\s+(?:us|the\s+company)|benefits|responsibilities|requirements|qualifications|overview|location|remote)\b",
    )
    .expect("Invalid regex")
});

static PREFERRED_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:preferred|nice\s+to\s+have|desired|bonus|a\s+plus)[\s\S]*")
        .expect("Invalid regex")
});

static EXPERIENCE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)(?:minimum|at\s+least|minimum\s+of)\s+(\d{1,2})\s*\+?\s*years?",
        r"(?i)(\d{1,2})\s*\+?\s*years?\s+(?:of\s+)?(?:relevant\s+)?experience",
        r"(?i)(\d{1,2})\s*\+?\s*years?\s+(?:in|of|with)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Invalid regex"))
    .collect()
});

static EXPERIENCE_RANGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d{1,2})\s*-\s*(\d{1,2})\s*years?").expect("Invalid regex"));

const FALLBACK_TITLE: &str = "Position Not Specified";

/// Parses job-description text into structured requirements.
/// Fails only on empty input.
pub fn analyze_job(text: &str, taxonomy: &SkillTaxonomy) -> Result<JobRequirements, EvalError> {
    if text.trim().is_empty() {
        return Err(EvalError::Analysis("job description text is empty".into()));
    }

    let found = extract_skills(text, taxonomy);
    let (required_skills, preferred_skills) = split_required_preferred(text, &found);

    Ok(JobRequirements {
        title: extract_title(text),
        required_skills,
        preferred_skills,
        experience_required: extract_experience_requirement(text),
        education_required: EducationLevel::detect(text),
    })
}

/// Title extraction, in order of confidence: an explicit "Job Title:" label,
/// then the first short line naming a role, then the fallback constant.
fn extract_title(text: &str) -> String {
    if let Some(caps) = TITLE_LABEL.captures(text) {
        return caps[1].trim().to_string();
    }

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()).take(20) {
        if SKIP_LINE.is_match(line) || line.len() > 70 {
            continue;
        }
        if ROLE_SUFFIX.is_match(line) {
            return line.to_string();
        }
    }

    FALLBACK_TITLE.to_string()
}

/// Skills mentioned in the preferred/nice-to-have section are preferred;
/// everything else defaults to required. The literal matched term is what is
/// searched for, so synonyms land in the right bucket.
fn split_required_preferred(
    text: &str,
    found: &[super::FoundSkill],
) -> (Vec<String>, Vec<String>) {
    let preferred_text = PREFERRED_SECTION
        .find(text)
        .map(|m| m.as_str().to_lowercase())
        .unwrap_or_default();

    let mut required = Vec::new();
    let mut preferred = Vec::new();
    for skill in found {
        if !preferred_text.is_empty() && super::contains_term(&preferred_text, &skill.term) {
            preferred.push(skill.canonical.clone());
        } else {
            required.push(skill.canonical.clone());
        }
    }
    (required, preferred)
}

fn extract_experience_requirement(text: &str) -> f64 {
    for pattern in EXPERIENCE_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            if let Ok(years) = caps[1].parse::<f64>() {
                return years;
            }
        }
    }
    // "3-5 years": the minimum bound is the requirement.
    if let Some(caps) = EXPERIENCE_RANGE.captures(text) {
        let low = caps[1].parse::<f64>().unwrap_or(0.0);
        let high = caps[2].parse::<f64>().unwrap_or(0.0);
        return low.min(high);
    }
    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const JD: &str = "\
Senior Data Engineer
Build and operate our analytics platform.

Requirements:
- 5+ years of experience with Python and SQL
- Production experience with PostgreSQL and AWS
- Bachelor's degree in a technical field

Nice to have:
- Docker and Terraform
- Airflow
";

    fn taxonomy() -> SkillTaxonomy {
        SkillTaxonomy::load_default().unwrap()
    }

    #[test]
    fn test_analyze_job_splits_required_and_preferred() {
        let req = analyze_job(JD, &taxonomy()).unwrap();
        assert_eq!(req.title, "Senior Data Engineer");
        assert!((req.experience_required - 5.0).abs() < f64::EPSILON);
        assert_eq!(req.education_required, EducationLevel::Bachelor);
        for skill in ["python", "sql", "postgresql", "aws"] {
            assert!(
                req.required_skills.iter().any(|s| s == skill),
                "missing required {skill} in {:?}",
                req.required_skills
            );
        }
        for skill in ["docker", "terraform"] {
            assert!(
                req.preferred_skills.iter().any(|s| s == skill),
                "missing preferred {skill} in {:?}",
                req.preferred_skills
            );
        }
    }

    #[test]
    fn test_title_label_wins() {
        let text = "Job Title: Platform Engineer\nSome Engineer mention later";
        assert_eq!(extract_title(text), "Platform Engineer");
    }

    #[test]
    fn test_title_fallback() {
        assert_eq!(extract_title("We make widgets."), FALLBACK_TITLE);
    }

    #[test]
    fn test_experience_minimum_phrase() {
        assert!(
            (extract_experience_requirement("minimum of 3 years in backend work") - 3.0).abs()
                < f64::EPSILON
        );
    }

    #[test]
    fn test_experience_range_takes_minimum() {
        assert!((extract_experience_requirement("3-5 years preferred") - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_experience_default_zero() {
        assert_eq!(extract_experience_requirement("no constraints here"), 0.0);
    }

    #[test]
    fn test_empty_jd_is_analysis_error() {
        let err = analyze_job("", &taxonomy()).unwrap_err();
        assert!(matches!(err, EvalError::Analysis(_)));
    }

    #[test]
    fn test_all_skills_required_without_preferred_section() {
        let req = analyze_job("Backend Developer needing Python and Docker", &taxonomy()).unwrap();
        assert!(req.preferred_skills.is_empty());
        assert!(req.required_skills.iter().any(|s| s == "docker"));
    }
}
