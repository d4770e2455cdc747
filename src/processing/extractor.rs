//! Dictionary-driven skill extraction with a fingerprint-keyed cache

use crate::error::{Result, SkillMatchError};
use crate::processing::dictionary::SkillDictionary;
use crate::processing::document::{Document, Fingerprint, SkillSet};
use crate::processing::text_processor::TextNormalizer;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

#[derive(Debug, Clone)]
pub struct ExtractorOptions {
    pub max_ngram: usize,
    pub cache_enabled: bool,
}

impl Default for ExtractorOptions {
    fn default() -> Self {
        Self {
            max_ngram: 4,
            cache_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: usize,
    pub misses: usize,
}

/// Shared map from document fingerprint to extracted skills.
///
/// Each fingerprint owns a `OnceLock` cell; the map lock is only held while
/// fetching or creating the cell, and concurrent callers for the same
/// fingerprint block on the cell so the skill set is computed at most once.
#[derive(Debug, Default)]
pub struct ExtractionCache {
    cells: Mutex<HashMap<Fingerprint, Arc<OnceLock<SkillSet>>>>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCache {
    signature: String,
    entries: BTreeMap<Fingerprint, SkillSet>,
}

impl ExtractionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute<F>(&self, fingerprint: &Fingerprint, compute: F) -> SkillSet
    where
        F: FnOnce() -> SkillSet,
    {
        let cell = {
            let mut cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(cells.entry(fingerprint.clone()).or_default())
        };

        let mut computed = false;
        let skills = cell.get_or_init(|| {
            computed = true;
            compute()
        });

        if computed {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!("Extraction cache miss for {}", fingerprint);
        } else {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!("Extraction cache hit for {}", fingerprint);
        }
        skills.clone()
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<SkillSet> {
        let cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.get(fingerprint).and_then(|cell| cell.get().cloned())
    }

    pub fn len(&self) -> usize {
        let cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
        cells.values().filter(|cell| cell.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Write all completed entries to `path` as JSON, tagged with `signature`.
    pub fn save(&self, path: &Path, signature: &str) -> Result<()> {
        let entries: BTreeMap<Fingerprint, SkillSet> = {
            let cells = self.cells.lock().unwrap_or_else(|e| e.into_inner());
            cells
                .iter()
                .filter_map(|(fp, cell)| cell.get().map(|skills| (fp.clone(), skills.clone())))
                .collect()
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let persisted = PersistedCache {
            signature: signature.to_string(),
            entries,
        };
        std::fs::write(path, serde_json::to_string(&persisted)?)?;
        info!(
            "Saved {} extraction cache entries to {}",
            persisted.entries.len(),
            path.display()
        );
        Ok(())
    }

    /// Load a cache written by [`ExtractionCache::save`].
    ///
    /// A missing, unreadable or foreign (different signature) file yields an
    /// empty cache; extraction is still correct, only slower.
    pub fn load(path: &Path, signature: &str) -> Self {
        let cache = Self::new();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                if path.exists() {
                    warn!("Ignoring unreadable extraction cache {}: {}", path.display(), e);
                }
                return cache;
            }
        };

        let persisted: PersistedCache = match serde_json::from_str(&content) {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!("Ignoring malformed extraction cache {}: {}", path.display(), e);
                return cache;
            }
        };

        if persisted.signature != signature {
            warn!(
                "Ignoring extraction cache {} built with a different dictionary or settings",
                path.display()
            );
            return cache;
        }

        {
            let mut cells = cache.cells.lock().unwrap_or_else(|e| e.into_inner());
            for (fingerprint, skills) in persisted.entries {
                let cell = OnceLock::new();
                let _ = cell.set(skills);
                cells.insert(fingerprint, Arc::new(cell));
            }
        }
        info!("Loaded {} extraction cache entries from {}", cache.len(), path.display());
        cache
    }
}

/// Scans normalized text for dictionary surface forms.
pub struct SkillExtractor {
    dictionary: Arc<SkillDictionary>,
    normalizer: TextNormalizer,
    max_ngram: usize,
    cache: Option<ExtractionCache>,
}

impl SkillExtractor {
    pub fn new(
        dictionary: Arc<SkillDictionary>,
        normalizer: TextNormalizer,
        options: ExtractorOptions,
    ) -> Self {
        let max_ngram = options.max_ngram.max(1);
        if dictionary.max_phrase_len() > max_ngram {
            warn!(
                "Dictionary has surface forms of {} tokens but max_ngram is {}; longer forms will never match",
                dictionary.max_phrase_len(),
                max_ngram
            );
        }

        Self {
            dictionary,
            normalizer,
            max_ngram,
            cache: options.cache_enabled.then(ExtractionCache::new),
        }
    }

    /// Replace the (empty) cache with a preloaded one. No-op when caching is off.
    pub fn with_cache(mut self, cache: ExtractionCache) -> Self {
        if self.cache.is_some() {
            self.cache = Some(cache);
        }
        self
    }

    /// Extract the canonical skills mentioned in `document`.
    ///
    /// Only an empty dictionary is an error; unusable text yields an empty set.
    pub fn extract(&self, document: &Document) -> Result<SkillSet> {
        if self.dictionary.is_empty() {
            return Err(SkillMatchError::Extraction(
                "skill dictionary is empty".to_string(),
            ));
        }

        let skills = match &self.cache {
            Some(cache) => {
                cache.get_or_compute(document.fingerprint(), || self.scan(document.raw_text()))
            }
            None => self.scan(document.raw_text()),
        };

        debug!("Extracted {} skills from '{}'", skills.len(), document.id());
        Ok(skills)
    }

    fn scan(&self, raw_text: &str) -> SkillSet {
        let tokens = self.normalizer.normalize(raw_text);
        let window = self.max_ngram.min(self.dictionary.max_phrase_len()).max(1);
        let mut skills = SkillSet::new();

        for start in 0..tokens.len() {
            let mut key = String::new();
            for token in tokens.iter().skip(start).take(window) {
                if !key.is_empty() {
                    key.push(' ');
                }
                key.push_str(token);
                if let Some(canonical) = self.dictionary.resolve_key(&key) {
                    skills.insert(canonical);
                }
            }
        }

        skills
    }

    pub fn dictionary(&self) -> &SkillDictionary {
        &self.dictionary
    }

    /// Identifies everything that influences extraction output; persisted
    /// caches are only reused when it matches.
    pub fn cache_signature(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.dictionary.fingerprint().as_bytes());
        hasher.update(self.max_ngram.to_le_bytes());
        hasher.update([u8::from(self.normalizer.removes_stop_words())]);
        if let Some(threshold) = self.dictionary.fuzzy_threshold() {
            hasher.update(threshold.to_le_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.as_ref().map(ExtractionCache::stats).unwrap_or_default()
    }

    pub fn save_cache(&self, path: &Path) -> Result<()> {
        match &self.cache {
            Some(cache) => cache.save(path, &self.cache_signature()),
            None => Ok(()),
        }
    }
}
