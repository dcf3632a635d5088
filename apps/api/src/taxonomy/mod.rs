//! Skill taxonomy: the static, versioned catalog of canonical skill names,
//! their synonyms, category membership, and the equivalence table used for
//! partial-credit matching.
//!
//! A taxonomy is immutable once loaded. Reload builds a whole new snapshot
//! and swaps it atomically behind `TaxonomyHandle`; a run in flight keeps the
//! snapshot it started with.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock};

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::{AppError, EvalError};
use crate::state::AppState;

const DEFAULT_TAXONOMY_JSON: &str = include_str!("default_taxonomy.json");

/// A skill name after synonym resolution. Non-canonical skills (strings the
/// taxonomy does not know) can still exact-match but never participate in
/// equivalence lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalSkill {
    pub name: String,
    pub canonical: bool,
}

/// One entry of the equivalence table: holding `left` partially satisfies a
/// requirement for `right` (and vice versa) at `weight` credit.
/// Table order is match priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquivalenceRule {
    pub left: String,
    pub right: String,
    pub weight: f64,
}

#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    version: String,
    categories: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    synonyms: BTreeMap<String, String>,
    #[serde(default)]
    equivalences: Vec<RawEquivalence>,
}

#[derive(Debug, Deserialize)]
struct RawEquivalence {
    pair: [String; 2],
    weight: f64,
}

#[derive(Debug)]
pub struct SkillTaxonomy {
    version: String,
    canonical: HashSet<String>,
    categories: BTreeMap<String, Vec<String>>,
    synonyms: HashMap<String, String>,
    equivalences: Vec<EquivalenceRule>,
}

impl SkillTaxonomy {
    /// Loads the built-in taxonomy compiled into the binary.
    pub fn load_default() -> Result<Self, EvalError> {
        Self::from_json(DEFAULT_TAXONOMY_JSON)
    }

    /// Loads a taxonomy from a JSON file on disk.
    pub fn load_from_path(path: &str) -> Result<Self, EvalError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            EvalError::TaxonomyUnavailable(format!("cannot read taxonomy file {path}: {e}"))
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, EvalError> {
        let file: TaxonomyFile = serde_json::from_str(raw)
            .map_err(|e| EvalError::TaxonomyUnavailable(format!("malformed taxonomy: {e}")))?;
        Self::build(file)
    }

    fn build(file: TaxonomyFile) -> Result<Self, EvalError> {
        if file.version.trim().is_empty() {
            return Err(EvalError::TaxonomyUnavailable(
                "taxonomy version must not be empty".into(),
            ));
        }

        let mut canonical = HashSet::new();
        let mut categories = BTreeMap::new();
        for (category, skills) in file.categories {
            let skills: Vec<String> = skills.iter().map(|s| normalize(s)).collect();
            for skill in &skills {
                canonical.insert(skill.clone());
            }
            categories.insert(category, skills);
        }
        if canonical.is_empty() {
            return Err(EvalError::TaxonomyUnavailable(
                "taxonomy defines no canonical skills".into(),
            ));
        }

        let mut synonyms = HashMap::new();
        for (raw, target) in file.synonyms {
            let target = normalize(&target);
            if !canonical.contains(&target) {
                return Err(EvalError::TaxonomyUnavailable(format!(
                    "synonym '{raw}' maps to unknown canonical skill '{target}'"
                )));
            }
            synonyms.insert(normalize(&raw), target);
        }

        let mut equivalences = Vec::with_capacity(file.equivalences.len());
        for rule in file.equivalences {
            let left = normalize(&rule.pair[0]);
            let right = normalize(&rule.pair[1]);
            for side in [&left, &right] {
                if !canonical.contains(side) {
                    return Err(EvalError::TaxonomyUnavailable(format!(
                        "equivalence references unknown canonical skill '{side}'"
                    )));
                }
            }
            if !(rule.weight > 0.0 && rule.weight < 1.0) {
                return Err(EvalError::TaxonomyUnavailable(format!(
                    "equivalence weight for ({left}, {right}) must be in (0, 1), got {}",
                    rule.weight
                )));
            }
            equivalences.push(EquivalenceRule {
                left,
                right,
                weight: rule.weight,
            });
        }

        Ok(Self {
            version: file.version,
            canonical,
            categories,
            synonyms,
            equivalences,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn canonical_count(&self) -> usize {
        self.canonical.len()
    }

    pub fn synonym_count(&self) -> usize {
        self.synonyms.len()
    }

    pub fn equivalence_count(&self) -> usize {
        self.equivalences.len()
    }

    pub fn category_count(&self) -> usize {
        self.categories.len()
    }

    /// Resolves a raw skill string to its canonical form. Unknown strings are
    /// lowercased and trimmed but flagged non-canonical.
    pub fn canonicalize(&self, raw: &str) -> CanonicalSkill {
        let name = normalize(raw);
        if let Some(target) = self.synonyms.get(&name) {
            return CanonicalSkill {
                name: target.clone(),
                canonical: true,
            };
        }
        let canonical = self.canonical.contains(&name);
        CanonicalSkill { name, canonical }
    }

    /// The category a canonical skill belongs to, if any.
    pub fn category_of(&self, canonical_skill: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|(_, skills)| skills.iter().any(|s| s == canonical_skill))
            .map(|(name, _)| name.as_str())
    }

    /// All terms the analyzers scan source text for, paired with the
    /// canonical name they resolve to. Canonical names first, then synonyms,
    /// both in stable sorted order so extraction is deterministic.
    pub fn lexicon(&self) -> Vec<(String, String)> {
        let mut terms: Vec<(String, String)> = self
            .categories
            .values()
            .flatten()
            .map(|s| (s.clone(), s.clone()))
            .collect();
        terms.sort();
        terms.dedup();
        let mut synonyms: Vec<(String, String)> = self
            .synonyms
            .iter()
            .map(|(raw, target)| (raw.clone(), target.clone()))
            .collect();
        synonyms.sort();
        terms.extend(synonyms);
        terms
    }

    /// Finds the highest-priority equivalence rule pairing `target` with a
    /// skill the candidate holds. Returns the satisfying held skill and the
    /// rule's credit weight. Priority is table insertion order, then held
    /// skill order, so overlapping rules resolve the same way every run.
    pub fn equivalent_match(
        &self,
        target: &str,
        held: &[CanonicalSkill],
    ) -> Option<(String, f64)> {
        for rule in &self.equivalences {
            let partner = if rule.left == target {
                &rule.right
            } else if rule.right == target {
                &rule.left
            } else {
                continue;
            };
            if let Some(hit) = held.iter().find(|s| s.canonical && &s.name == partner) {
                return Some((hit.name.clone(), rule.weight));
            }
        }
        None
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Process-wide taxonomy holder. `snapshot` hands out the current immutable
/// taxonomy; `swap` replaces it wholesale.
#[derive(Clone)]
pub struct TaxonomyHandle {
    inner: Arc<RwLock<Arc<SkillTaxonomy>>>,
}

impl TaxonomyHandle {
    pub fn new(taxonomy: SkillTaxonomy) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(taxonomy))),
        }
    }

    pub fn snapshot(&self) -> Arc<SkillTaxonomy> {
        self.inner.read().expect("taxonomy lock poisoned").clone()
    }

    pub fn swap(&self, taxonomy: SkillTaxonomy) {
        *self.inner.write().expect("taxonomy lock poisoned") = Arc::new(taxonomy);
    }
}

#[derive(Serialize)]
pub struct TaxonomyInfo {
    pub version: String,
    pub canonical_skills: usize,
    pub categories: usize,
    pub synonyms: usize,
    pub equivalences: usize,
}

impl TaxonomyInfo {
    fn of(taxonomy: &SkillTaxonomy) -> Self {
        Self {
            version: taxonomy.version().to_string(),
            canonical_skills: taxonomy.canonical_count(),
            categories: taxonomy.category_count(),
            synonyms: taxonomy.synonym_count(),
            equivalences: taxonomy.equivalence_count(),
        }
    }
}

/// GET /api/v1/taxonomy
pub async fn handle_get_taxonomy(State(state): State<AppState>) -> Json<TaxonomyInfo> {
    Json(TaxonomyInfo::of(&state.taxonomy.snapshot()))
}

/// POST /api/v1/taxonomy/reload
/// Rebuilds the snapshot from TAXONOMY_PATH and swaps it in. A failed reload
/// leaves the current snapshot serving.
pub async fn handle_reload_taxonomy(
    State(state): State<AppState>,
) -> Result<Json<TaxonomyInfo>, AppError> {
    let path = state.config.taxonomy_path.clone().ok_or_else(|| {
        AppError::Validation("TAXONOMY_PATH is not configured; reload is unavailable".into())
    })?;
    let taxonomy = SkillTaxonomy::load_from_path(&path)?;
    info!(
        "Taxonomy reloaded: v{} ({} canonical skills)",
        taxonomy.version(),
        taxonomy.canonical_count()
    );
    state.taxonomy.swap(taxonomy);
    Ok(Json(TaxonomyInfo::of(&state.taxonomy.snapshot())))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taxonomy() -> SkillTaxonomy {
        SkillTaxonomy::load_default().unwrap()
    }

    #[test]
    fn test_default_taxonomy_loads() {
        let t = taxonomy();
        assert!(!t.version().is_empty());
        assert!(t.canonical_count() > 50);
        assert!(t.equivalence_count() > 10);
    }

    #[test]
    fn test_synonym_resolves_to_canonical() {
        let t = taxonomy();
        let skill = t.canonicalize("K8s");
        assert_eq!(skill.name, "kubernetes");
        assert!(skill.canonical);
    }

    #[test]
    fn test_canonical_name_passes_through() {
        let t = taxonomy();
        let skill = t.canonicalize("  PostgreSQL ");
        assert_eq!(skill.name, "postgresql");
        assert!(skill.canonical);
    }

    #[test]
    fn test_unknown_skill_flagged_non_canonical() {
        let t = taxonomy();
        let skill = t.canonicalize("COBOL-85");
        assert_eq!(skill.name, "cobol-85");
        assert!(!skill.canonical);
    }

    #[test]
    fn test_equivalence_lookup_is_symmetric() {
        let t = taxonomy();
        let held = vec![t.canonicalize("kubernetes")];
        let (via, weight) = t.equivalent_match("docker", &held).unwrap();
        assert_eq!(via, "kubernetes");
        assert!((weight - 0.7).abs() < f64::EPSILON);

        let held = vec![t.canonicalize("docker")];
        let (via, weight) = t.equivalent_match("kubernetes", &held).unwrap();
        assert_eq!(via, "docker");
        assert!((weight - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_equivalence_priority_is_table_order() {
        let t = SkillTaxonomy::from_json(
            r#"{
                "version": "test",
                "categories": {"frameworks": ["react", "angular", "vue"]},
                "equivalences": [
                    { "pair": ["react", "angular"], "weight": 0.6 },
                    { "pair": ["react", "vue"], "weight": 0.5 }
                ]
            }"#,
        )
        .unwrap();
        // Candidate holds both partners; the first-inserted rule must win.
        let held = vec![t.canonicalize("vue"), t.canonicalize("angular")];
        let (via, weight) = t.equivalent_match("react", &held).unwrap();
        assert_eq!(via, "angular");
        assert!((weight - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_non_canonical_held_skill_never_matches_equivalence() {
        let t = taxonomy();
        let held = vec![CanonicalSkill {
            name: "kubernetes".into(),
            canonical: false,
        }];
        assert!(t.equivalent_match("docker", &held).is_none());
    }

    #[test]
    fn test_rejects_out_of_range_weight() {
        let err = SkillTaxonomy::from_json(
            r#"{
                "version": "test",
                "categories": {"cloud": ["aws", "azure"]},
                "equivalences": [{ "pair": ["aws", "azure"], "weight": 1.0 }]
            }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be in (0, 1)"));
    }

    #[test]
    fn test_rejects_synonym_to_unknown_skill() {
        let err = SkillTaxonomy::from_json(
            r#"{
                "version": "test",
                "categories": {"cloud": ["aws"]},
                "synonyms": {"big cloud": "oracle cloud"}
            }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown canonical skill"));
    }

    #[test]
    fn test_handle_swap_replaces_snapshot() {
        let handle = TaxonomyHandle::new(taxonomy());
        let before = handle.snapshot();
        let replacement = SkillTaxonomy::from_json(
            r#"{"version": "swapped", "categories": {"programming": ["rust"]}}"#,
        )
        .unwrap();
        handle.swap(replacement);
        // The old snapshot is still usable; new reads see the swap.
        assert_ne!(before.version(), handle.snapshot().version());
        assert_eq!(handle.snapshot().version(), "swapped");
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taxonomy.json");
        std::fs::write(
            &path,
            r#"{"version": "disk", "categories": {"programming": ["rust"]}}"#,
        )
        .unwrap();
        let t = SkillTaxonomy::load_from_path(path.to_str().unwrap()).unwrap();
        assert_eq!(t.version(), "disk");

        let err = SkillTaxonomy::load_from_path("/nonexistent/taxonomy.json").unwrap_err();
        assert!(matches!(err, EvalError::TaxonomyUnavailable(_)));
    }

    #[test]
    fn test_category_of() {
        let t = taxonomy();
        assert_eq!(t.category_of("kubernetes"), Some("cloud"));
        assert_eq!(t.category_of("nonexistent"), None);
    }

    #[test]
    fn test_lexicon_contains_synonyms_and_is_sorted_within_sections() {
        let t = taxonomy();
        let lexicon = t.lexicon();
        assert!(lexicon.iter().any(|(term, target)| term == "k8s" && target == "kubernetes"));
        assert!(lexicon.iter().any(|(term, target)| term == "rust" && target == "rust"));
    }
}
