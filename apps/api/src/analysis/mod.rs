//! Resume and job-description analysis: turns extracted text into the
//! structured fields the evaluation pipeline scores. Pure regex and lexicon
//! scanning, no external calls.

pub mod education;
pub mod job;
pub mod resume;

pub use education::EducationLevel;
pub use job::{analyze_job, JobRequirements};
pub use resume::{analyze_resume, CandidateProfile};

use crate::taxonomy::SkillTaxonomy;

/// A skill found in source text: the canonical name it resolves to and the
/// literal term that matched (the term may be a synonym of the canonical).
#[derive(Debug, Clone)]
pub struct FoundSkill {
    pub canonical: String,
    pub term: String,
}

/// Scans lowercased text for every taxonomy term (canonical names and
/// synonyms), deduplicated by canonical name. Lexicon order keeps the result
/// deterministic for identical input.
pub fn extract_skills(text: &str, taxonomy: &SkillTaxonomy) -> Vec<FoundSkill> {
    let haystack = text.to_lowercase();
    let mut found = Vec::new();
    for (term, canonical) in taxonomy.lexicon() {
        if found.iter().any(|f: &FoundSkill| f.canonical == canonical) {
            continue;
        }
        if contains_term(&haystack, &term) {
            found.push(FoundSkill { canonical, term });
        }
    }
    found
}

/// Whole-token containment check. The regex crate has no lookaround, so token
/// boundaries are checked manually; '+', '#' and '.' count as word characters
/// so that "c" never matches inside "c++" or "c#", and "go" never matches
/// inside "going".
fn contains_term(haystack: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    let bytes = haystack.as_bytes();
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(term) {
        let at = start + pos;
        let end = at + term.len();
        let before_ok = at == 0 || !is_token_char(bytes[at - 1]);
        let after_ok = end == bytes.len() || !is_token_char(bytes[end]);
        if before_ok && after_ok {
            return true;
        }
        start = at + 1;
        if start >= haystack.len() {
            break;
        }
    }
    false
}

fn is_token_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'+' || b == b'#'
}
