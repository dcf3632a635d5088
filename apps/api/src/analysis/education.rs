use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Ordinal education scale used by the composite scorer. Variant order is the
/// ordering; `Unspecified` is the bottom so "no requirement" compares below
/// everything.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EducationLevel {
    #[default]
    Unspecified,
    HighSchool,
    Associate,
    Bachelor,
    Master,
    Doctorate,
}

static DOCTORATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bph\.?\s?d\.?\b|\bdoctorate\b|\bdoctoral\b").expect("Invalid regex")
});
static MASTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bmaster(?:'s|s)?\b|\bm\.?s(?:c)?\.?\b|\bmba\b").expect("Invalid regex")
});
static BACHELOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bbachelor(?:'s|s)?\b|\bb\.?s(?:c)?\.?\b|\bb\.?tech\b|\bb\.e\b")
        .expect("Invalid regex")
});
static ASSOCIATE: LazyLock<Regex> = LazyLock::new(|| {
    // Bare "associate" is a job-title word; require the degree phrasing.
    Regex::new(r"(?i)\bassociate(?:'s|s)?\s+(?:degree|of)\b").expect("Invalid regex")
});
static HIGH_SCHOOL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bhigh\s+school\b|\bsecondary\s+school\b|\bged\b").expect("Invalid regex")
});

impl EducationLevel {
    pub fn rank(self) -> u8 {
        match self {
            EducationLevel::Unspecified => 0,
            EducationLevel::HighSchool => 1,
            EducationLevel::Associate => 2,
            EducationLevel::Bachelor => 3,
            EducationLevel::Master => 4,
            EducationLevel::Doctorate => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EducationLevel::Unspecified => "unspecified",
            EducationLevel::HighSchool => "high_school",
            EducationLevel::Associate => "associate",
            EducationLevel::Bachelor => "bachelor",
            EducationLevel::Master => "master",
            EducationLevel::Doctorate => "doctorate",
        }
    }

    /// The highest education level mentioned in the text. Checked from the
    /// top of the scale down, so the first hit is the highest.
    pub fn detect(text: &str) -> EducationLevel {
        if DOCTORATE.is_match(text) {
            EducationLevel::Doctorate
        } else if MASTER.is_match(text) {
            EducationLevel::Master
        } else if BACHELOR.is_match(text) {
            EducationLevel::Bachelor
        } else if ASSOCIATE.is_match(text) {
            EducationLevel::Associate
        } else if HIGH_SCHOOL.is_match(text) {
            EducationLevel::HighSchool
        } else {
            EducationLevel::Unspecified
        }
    }
}
