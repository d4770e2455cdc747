//! Skill dictionary: canonical skills and the surface forms that fold into them

use crate::error::{Result, SkillMatchError};
use crate::processing::text_processor::{strip_stop_words, TextNormalizer};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;
use strsim::jaro_winkler;

const BUILTIN_DICTIONARY: &str = include_str!("../../resources/skills.toml");

/// Single-token terms shorter than this never take part in fuzzy matching.
const MIN_FUZZY_TERM_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkillEntry {
    pub canonical: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DictionaryFile {
    skills: Vec<SkillEntry>,
}

/// Immutable lookup structure from surface forms to canonical skill names.
///
/// Surface forms are indexed by their normalized key. When two entries claim
/// the same key the entry loaded first keeps it.
#[derive(Debug)]
pub struct SkillDictionary {
    entries: Vec<SkillEntry>,
    index: HashMap<String, usize>,
    single_token_forms: Vec<(String, usize)>,
    max_phrase_len: usize,
    fuzzy_threshold: Option<f32>,
    normalizer: TextNormalizer,
    fingerprint: String,
}

impl SkillDictionary {
    /// Load a TOML dictionary (`[[skills]]` tables) from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SkillMatchError::Config(format!(
                "Failed to read skill dictionary {}: {}",
                path.display(),
                e
            ))
        })?;
        let dictionary = Self::from_toml_str(&content)?;
        info!(
            "Loaded skill dictionary from {} ({} skills)",
            path.display(),
            dictionary.len()
        );
        Ok(dictionary)
    }

    /// The dictionary bundled with the crate.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_DICTIONARY)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: DictionaryFile = toml::from_str(content).map_err(|e| {
            SkillMatchError::Config(format!("Malformed skill dictionary: {}", e))
        })?;
        if file.skills.is_empty() {
            return Err(SkillMatchError::Config(
                "Skill dictionary defines no [[skills]] entries".to_string(),
            ));
        }
        Self::from_entries(file.skills)
    }

    pub fn from_entries(entries: Vec<SkillEntry>) -> Result<Self> {
        let normalizer = TextNormalizer::new();
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut canonical_keys: HashMap<String, usize> = HashMap::new();
        let mut single_token_forms = Vec::new();
        let mut max_phrase_len = 0;
        let mut cleaned = Vec::with_capacity(entries.len());

        for (idx, entry) in entries.into_iter().enumerate() {
            let canonical = entry.canonical.trim().to_string();
            let canonical_key = normalizer.normalize_term(&canonical);
            if canonical_key.is_empty() {
                return Err(SkillMatchError::Config(format!(
                    "Skill dictionary entry #{} has an empty canonical name",
                    idx + 1
                )));
            }
            if let Some(previous) = canonical_keys.insert(canonical_key.clone(), idx) {
                return Err(SkillMatchError::Config(format!(
                    "Duplicate canonical skill '{}' (entries #{} and #{})",
                    canonical,
                    previous + 1,
                    idx + 1
                )));
            }

            let mut forms = vec![canonical.clone()];
            for synonym in &entry.synonyms {
                if normalizer.normalize_term(synonym).is_empty() {
                    return Err(SkillMatchError::Config(format!(
                        "Skill '{}' has an empty synonym",
                        canonical
                    )));
                }
                forms.push(synonym.trim().to_string());
            }

            for form in &forms {
                let tokens = normalizer.normalize(form);
                let key = tokens.join(" ");
                max_phrase_len = max_phrase_len.max(tokens.len());

                match index.entry(key.clone()) {
                    Entry::Vacant(slot) => {
                        slot.insert(idx);
                        if tokens.len() == 1 {
                            single_token_forms.push((key, idx));
                        }
                    }
                    Entry::Occupied(slot) if *slot.get() != idx => {
                        warn!(
                            "Surface form '{}' of '{}' already maps to '{}'; keeping the earlier entry",
                            form,
                            canonical,
                            cleaned
                                .get(*slot.get())
                                .map(|e: &SkillEntry| e.canonical.as_str())
                                .unwrap_or("?")
                        );
                    }
                    Entry::Occupied(_) => {}
                }

                // Variant without stop words so text normalized with
                // stop-word removal still hits multi-word forms.
                let stripped = strip_stop_words(&tokens);
                if !stripped.is_empty() && stripped.len() != tokens.len() {
                    index.entry(stripped.join(" ")).or_insert(idx);
                }
            }

            cleaned.push(SkillEntry {
                canonical,
                synonyms: forms.into_iter().skip(1).collect(),
            });
        }

        let fingerprint = Self::compute_fingerprint(&cleaned);
        debug!(
            "Skill dictionary indexed: {} skills, {} surface forms, longest phrase {} tokens",
            cleaned.len(),
            index.len(),
            max_phrase_len
        );

        Ok(Self {
            entries: cleaned,
            index,
            single_token_forms,
            max_phrase_len,
            fuzzy_threshold: None,
            normalizer,
            fingerprint,
        })
    }

    /// Enable Jaro-Winkler fallback for single-token terms with no exact hit.
    pub fn with_fuzzy_threshold(mut self, threshold: Option<f32>) -> Self {
        self.fuzzy_threshold = threshold;
        self
    }

    /// Case-, whitespace- and punctuation-insensitive lookup.
    pub fn resolve(&self, term: &str) -> Option<&str> {
        let key = self.normalizer.normalize_term(term);
        self.resolve_key(&key)
    }

    /// Lookup for a term that is already a normalized key.
    pub(crate) fn resolve_key(&self, key: &str) -> Option<&str> {
        if key.is_empty() {
            return None;
        }
        if let Some(&idx) = self.index.get(key) {
            return Some(self.entries[idx].canonical.as_str());
        }
        self.resolve_fuzzy(key)
    }

    fn resolve_fuzzy(&self, key: &str) -> Option<&str> {
        let threshold = self.fuzzy_threshold?;
        if key.contains(' ') || key.chars().count() < MIN_FUZZY_TERM_LEN {
            return None;
        }

        let mut best: Option<(f64, usize)> = None;
        for (form, idx) in &self.single_token_forms {
            if form.chars().count() < MIN_FUZZY_TERM_LEN {
                continue;
            }
            let similarity = jaro_winkler(key, form);
            // Strictly greater keeps the earliest entry on ties.
            if best.map_or(true, |(score, _)| similarity > score) {
                best = Some((similarity, *idx));
            }
        }

        best.filter(|(score, _)| *score >= f64::from(threshold))
            .map(|(_, idx)| self.entries[idx].canonical.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of tokens in the longest indexed surface form.
    pub fn max_phrase_len(&self) -> usize {
        self.max_phrase_len
    }

    pub fn fuzzy_threshold(&self) -> Option<f32> {
        self.fuzzy_threshold
    }

    /// Content hash of the entries, in load order.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    fn compute_fingerprint(entries: &[SkillEntry]) -> String {
        let mut hasher = Sha256::new();
        for entry in entries {
            hasher.update(entry.canonical.as_bytes());
            hasher.update([0x1f]);
            for synonym in &entry.synonyms {
                hasher.update(synonym.as_bytes());
                hasher.update([0x1e]);
            }
            hasher.update([0x1d]);
        }
        format!("{:x}", hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(canonical: &str, synonyms: &[&str]) -> SkillEntry {
        SkillEntry {
            canonical: canonical.to_string(),
            synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn sample() -> SkillDictionary {
        SkillDictionary::from_entries(vec![
            entry("python", &["py"]),
            entry("sql", &["sql", "structured query language"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_resolve_canonical_and_synonyms() {
        let dict = sample();
        assert_eq!(dict.resolve("python"), Some("python"));
        assert_eq!(dict.resolve("PY"), Some("python"));
        assert_eq!(dict.resolve("  Structured   Query Language "), Some("sql"));
        assert_eq!(dict.resolve("structured-query-language"), Some("sql"));
        assert_eq!(dict.resolve("java"), None);
        assert_eq!(dict.resolve(""), None);
    }

    #[test]
    fn test_first_entry_wins_on_collision() {
        let dict = SkillDictionary::from_entries(vec![
            entry("machine learning", &["ml"]),
            entry("markup language", &["ml"]),
        ])
        .unwrap();
        assert_eq!(dict.resolve("ML"), Some("machine learning"));
        assert_eq!(dict.len(), 2);
    }

    #[test]
    fn test_duplicate_canonical_after_normalization() {
        let result = SkillDictionary::from_entries(vec![
            entry("Node.js", &[]),
            entry("node js", &[]),
        ]);
        assert!(matches!(result, Err(SkillMatchError::Config(_))));
    }

    #[test]
    fn test_empty_entries_rejected() {
        let result = SkillDictionary::from_entries(vec![entry("  ", &["x"])]);
        assert!(matches!(result, Err(SkillMatchError::Config(_))));

        let result = SkillDictionary::from_entries(vec![entry("rust", &["!!"])]);
        assert!(matches!(result, Err(SkillMatchError::Config(_))));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let result = SkillDictionary::from_toml_str("[[skills]]\ncanonical = ");
        assert!(matches!(result, Err(SkillMatchError::Config(_))));
    }

    #[test]
    fn test_misspelled_keys_are_config_errors() {
        let result = SkillDictionary::from_toml_str("[[skills]]\ncanonical = \"python\"\nsynonym = [\"py\"]");
        assert!(matches!(result, Err(SkillMatchError::Config(_))));

        let result = SkillDictionary::from_toml_str("[[skill]]\ncanonical = \"python\"");
        assert!(matches!(result, Err(SkillMatchError::Config(_))));

        let result = SkillDictionary::from_toml_str("# nothing here\n");
        assert!(matches!(result, Err(SkillMatchError::Config(_))));
    }

    #[test]
    fn test_unreadable_file_is_config_error() {
        let result = SkillDictionary::load(Path::new("does/not/exist.toml"));
        assert!(matches!(result, Err(SkillMatchError::Config(_))));
    }

    #[test]
    fn test_builtin_dictionary_loads() {
        let dict = SkillDictionary::builtin().unwrap();
        assert!(!dict.is_empty());
        assert_eq!(dict.resolve("C++"), Some("c++"));
        assert_eq!(dict.resolve("Node.js"), Some("node.js"));
        assert_eq!(dict.resolve("k8s"), Some("kubernetes"));
        assert!(dict.max_phrase_len() >= 3);
    }

    #[test]
    fn test_stop_word_variant_indexed() {
        let dict = SkillDictionary::from_entries(vec![entry("rails", &["ruby on rails"])]).unwrap();
        assert_eq!(dict.resolve("ruby on rails"), Some("rails"));
        assert_eq!(dict.resolve("ruby rails"), Some("rails"));
    }

    #[test]
    fn test_fuzzy_only_when_enabled() {
        let dict = SkillDictionary::from_entries(vec![entry("kubernetes", &[])]).unwrap();
        assert_eq!(dict.resolve("kubernets"), None);

        let dict = dict.with_fuzzy_threshold(Some(0.9));
        assert_eq!(dict.resolve("kubernets"), Some("kubernetes"));
        assert_eq!(dict.resolve("kafka"), None);
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let a = sample();
        let b = sample();
        let c = SkillDictionary::from_entries(vec![entry("python", &["py"])]).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
