//! Configuration management for the skill matcher

use crate::error::{Result, SkillMatchError};
use crate::processing::scorer::AggregationPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub models: ModelConfig,
    pub matching: MatchingConfig,
    pub extraction: ExtractionConfig,
    pub processing: ProcessingConfig,
    pub input: InputConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub models_dir: PathBuf,
    pub embedding_model: String,
    pub backend: EmbeddingBackend,
    pub hashing_dimension: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    Model2Vec,
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub similarity_threshold: f32,
    pub aggregation: AggregationPolicy,
    pub fuzzy_threshold: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub max_ngram: usize,
    pub remove_stop_words: bool,
    pub dictionary_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub cache_enabled: bool,
    pub max_concurrency: usize,
    pub batch_size: usize,
    pub cache_path: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub max_file_size_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub top_n: Option<usize>,
    pub color_output: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Console,
    Json,
    Csv,
    Markdown,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let models_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".skill-matcher")
            .join("models");

        Self {
            models_dir,
            embedding_model: "minishlab/potion-base-8M".to_string(),
            backend: EmbeddingBackend::Model2Vec,
            hashing_dimension: 256,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.75,
            aggregation: AggregationPolicy::BestMatch,
            fuzzy_threshold: None,
        }
    }
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_ngram: 4,
            remove_stop_words: false,
            dictionary_path: None,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        let max_concurrency = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);

        Self {
            cache_enabled: true,
            max_concurrency,
            batch_size: 32,
            cache_path: None,
            timeout_secs: None,
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self { max_file_size_mb: 10 }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Console,
            top_n: None,
            color_output: true,
        }
    }
}

impl Config {
    /// Load from the default location, writing defaults on first use.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Load from an explicit file. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SkillMatchError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| SkillMatchError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| SkillMatchError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join("skill-matcher")
            .join("config.toml")
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.matching.similarity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(SkillMatchError::Config(format!(
                "similarity_threshold must be in (0, 1], got {}",
                threshold
            )));
        }
        if let Some(fuzzy) = self.matching.fuzzy_threshold {
            if !(fuzzy > 0.0 && fuzzy <= 1.0) {
                return Err(SkillMatchError::Config(format!(
                    "fuzzy_threshold must be in (0, 1], got {}",
                    fuzzy
                )));
            }
        }
        if self.extraction.max_ngram == 0 {
            return Err(SkillMatchError::Config("max_ngram must be at least 1".to_string()));
        }
        if self.processing.max_concurrency == 0 {
            return Err(SkillMatchError::Config(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.processing.batch_size == 0 {
            return Err(SkillMatchError::Config("batch_size must be at least 1".to_string()));
        }
        if self.models.backend == EmbeddingBackend::Hashing && self.models.hashing_dimension == 0 {
            return Err(SkillMatchError::Config(
                "hashing_dimension must be at least 1".to_string(),
            ));
        }
        if self.models.embedding_model.trim().is_empty() {
            return Err(SkillMatchError::Config("embedding_model must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<std::time::Duration> {
        self.processing.timeout_secs.map(std::time::Duration::from_secs)
    }

    /// Where the extraction cache is persisted, if caching is on.
    pub fn cache_file(&self) -> Option<PathBuf> {
        if !self.processing.cache_enabled {
            return None;
        }
        self.processing.cache_path.clone().or_else(|| {
            dirs::cache_dir().map(|dir| dir.join("skill-matcher").join("extractions.json"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.matching.similarity_threshold, 0.75);
        assert_eq!(config.extraction.max_ngram, 4);
        assert!(config.processing.cache_enabled);
        assert!(config.processing.max_concurrency >= 1);
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[matching]\nsimilarity_threshold = 0.9\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.matching.similarity_threshold, 0.9);
        assert_eq!(config.matching.aggregation, AggregationPolicy::BestMatch);
        assert_eq!(config.extraction.max_ngram, 4);
    }

    #[test]
    fn test_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");
        let mut config = Config::default();
        config.models.backend = EmbeddingBackend::Hashing;
        config.output.top_n = Some(5);
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.models.backend, EmbeddingBackend::Hashing);
        assert_eq!(loaded.output.top_n, Some(5));
    }

    #[test]
    fn test_cache_file_follows_cache_setting() {
        let mut config = Config::default();
        config.processing.cache_path = Some(PathBuf::from("/tmp/extractions.json"));
        assert_eq!(config.cache_file(), Some(PathBuf::from("/tmp/extractions.json")));

        config.processing.cache_enabled = false;
        assert_eq!(config.cache_file(), None);
    }

    #[test]
    fn test_rejects_out_of_range_values() {
        let mut config = Config::default();
        config.matching.similarity_threshold = 0.0;
        assert!(matches!(config.validate(), Err(SkillMatchError::Config(_))));

        let mut config = Config::default();
        config.matching.similarity_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.extraction.max_ngram = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.processing.max_concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.processing.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "matching = [not valid").unwrap();
        assert!(matches!(Config::load_from(&path), Err(SkillMatchError::Config(_))));
    }
}
