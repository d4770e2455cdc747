//! Embedding providers: Model2Vec, deterministic feature hashing, and a
//! thread-safe caching layer in front of either

use crate::config::{Config, EmbeddingBackend};
use crate::error::{Result, SkillMatchError};
use log::{debug, info};
use model2vec_rs::model::StaticModel;
use std::collections::HashMap;
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use twox_hash::XxHash64;
use unicode_segmentation::UnicodeSegmentation;

const DEFAULT_BATCH_SIZE: usize = 32;

/// Fixed-length embedding. Cheap to clone; never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector(Arc<[f32]>);

impl EmbeddingVector {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values.into())
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    /// Element-wise mean. `None` for an empty input.
    pub fn mean(vectors: &[EmbeddingVector]) -> Result<Option<EmbeddingVector>> {
        let Some(first) = vectors.first() else {
            return Ok(None);
        };
        let dim = first.dimension();
        let mut sum = vec![0.0f32; dim];
        for vector in vectors {
            if vector.dimension() != dim {
                return Err(SkillMatchError::Embedding(format!(
                    "Embedding dimensions don't match: {} vs {}",
                    dim,
                    vector.dimension()
                )));
            }
            for (acc, value) in sum.iter_mut().zip(vector.as_slice()) {
                *acc += value;
            }
        }
        let count = vectors.len() as f32;
        sum.iter_mut().for_each(|v| *v /= count);
        Ok(Some(EmbeddingVector::new(sum)))
    }
}

/// Maps text to a fixed-length vector. Implementations must be deterministic:
/// the same text always yields the same vector for the provider's lifetime.
pub trait EmbeddingProvider: Send + Sync {
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Embed several texts, returning one vector per input in input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>>;

    fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| SkillMatchError::Embedding("provider returned no vector".to_string()))
    }
}

/// Largest similarity two different vectors can reach.
const BELOW_IDENTITY: f32 = 1.0 - f32::EPSILON / 2.0;

/// Cosine similarity clamped to [-1, 1].
///
/// Only bit-identical vectors score exactly 1.0; any other pair stays
/// strictly below it even when rounding would reach 1.0. A zero vector
/// scores 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(SkillMatchError::Embedding(format!(
            "Embedding dimensions don't match: {} vs {}",
            a.len(),
            b.len()
        )));
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    if a == b {
        return Ok(1.0);
    }
    Ok((dot_product / (norm_a * norm_b)).clamp(-1.0, BELOW_IDENTITY))
}

/// Pretrained static embeddings via Model2Vec.
pub struct Model2VecEmbedder {
    model: StaticModel,
    model_id: String,
    dimension: usize,
}

impl Model2VecEmbedder {
    /// Load from `models_dir/<model_id>` when present, otherwise treat
    /// `model_id` as a local path or Hugging Face repository id.
    ///
    /// Any failure is [`SkillMatchError::ModelUnavailable`]; retrying without
    /// fixing the environment cannot succeed, so none is attempted.
    pub fn load(model_id: &str, models_dir: &Path) -> Result<Self> {
        let start_time = Instant::now();
        let local_path = models_dir.join(model_id);
        let source = if local_path.exists() {
            local_path
        } else {
            PathBuf::from(model_id)
        };

        info!("Loading Model2Vec embedding model from: {}", source.display());

        let model = StaticModel::from_pretrained(&source, None, None, None).map_err(|e| {
            SkillMatchError::ModelUnavailable(format!(
                "Failed to load model '{}': {:#}",
                model_id, e
            ))
        })?;

        let dimension = model.encode_single("dimension").len();
        if dimension == 0 {
            return Err(SkillMatchError::ModelUnavailable(format!(
                "Model '{}' produced zero-length embeddings",
                model_id
            )));
        }

        info!(
            "Model loaded successfully in {:.2?} (dimension {})",
            start_time.elapsed(),
            dimension
        );

        Ok(Self {
            model,
            model_id: model_id.to_string(),
            dimension,
        })
    }
}

impl EmbeddingProvider for Model2VecEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .model
            .encode(texts)
            .into_iter()
            .map(EmbeddingVector::new)
            .collect())
    }
}

/// Feature-hashing embedder: no model files, fully deterministic.
///
/// Word tokens and character trigrams are hashed into `dimension` signed
/// buckets and the result is L2-normalized. Surface overlap drives
/// similarity, so it is a fallback rather than a semantic model.
pub struct HashingEmbedder {
    dimension: usize,
    model_id: String,
}

const HASH_SEED: u64 = 0x5eed_cafe_f00d_d00d;
const WORD_WEIGHT: f32 = 1.0;
const TRIGRAM_WEIGHT: f32 = 0.5;

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            model_id: format!("hashing-{}", dimension),
        }
    }

    fn hash_feature(prefix: &str, feature: &str) -> u64 {
        let mut hasher = XxHash64::with_seed(HASH_SEED);
        hasher.write(prefix.as_bytes());
        hasher.write(feature.as_bytes());
        hasher.finish()
    }

    fn add_feature(&self, vector: &mut [f32], prefix: &str, feature: &str, weight: f32) {
        let hash = Self::hash_feature(prefix, feature);
        let idx = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[idx] += sign * weight;
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        let mut vector = vec![0.0f32; self.dimension];

        for word in lowered.unicode_words() {
            self.add_feature(&mut vector, "w:", word, WORD_WEIGHT);
        }

        if lowered.trim().is_empty() {
            return vector;
        }
        let padded: Vec<char> = format!(" {} ", lowered.trim()).chars().collect();
        for window in padded.windows(3) {
            let trigram: String = window.iter().collect();
            self.add_feature(&mut vector, "c:", &trigram, TRIGRAM_WEIGHT);
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        Ok(texts
            .iter()
            .map(|text| EmbeddingVector::new(self.embed_one(text)))
            .collect())
    }
}

/// Memoizes another provider. Reads share a lock; inserts are serialized.
/// Only uncached texts reach the inner provider, in batches.
pub struct CachingEmbedder {
    inner: Box<dyn EmbeddingProvider>,
    cache: RwLock<HashMap<String, EmbeddingVector>>,
    batch_size: usize,
}

impl CachingEmbedder {
    pub fn new(inner: Box<dyn EmbeddingProvider>) -> Self {
        Self {
            inner,
            cache: RwLock::new(HashMap::new()),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn cache_size(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn check_dimension(&self, vector: &EmbeddingVector) -> Result<()> {
        if vector.dimension() != self.inner.dimension() {
            return Err(SkillMatchError::Embedding(format!(
                "Model '{}' returned a {}-dimensional vector, expected {}",
                self.inner.model_id(),
                vector.dimension(),
                self.inner.dimension()
            )));
        }
        Ok(())
    }
}

impl EmbeddingProvider for CachingEmbedder {
    fn model_id(&self) -> &str {
        self.inner.model_id()
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        let mut missing: Vec<String> = {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            texts
                .iter()
                .filter(|text| !cache.contains_key(*text))
                .cloned()
                .collect()
        };
        missing.sort();
        missing.dedup();

        if !missing.is_empty() {
            debug!(
                "Embedding {} uncached texts ({} requested)",
                missing.len(),
                texts.len()
            );
            let mut computed = Vec::with_capacity(missing.len());
            for batch in missing.chunks(self.batch_size) {
                let vectors = self.inner.embed_batch(batch)?;
                if vectors.len() != batch.len() {
                    return Err(SkillMatchError::Embedding(format!(
                        "Model '{}' returned {} vectors for {} texts",
                        self.inner.model_id(),
                        vectors.len(),
                        batch.len()
                    )));
                }
                for (text, vector) in batch.iter().zip(vectors) {
                    self.check_dimension(&vector)?;
                    computed.push((text.clone(), vector));
                }
            }

            let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
            for (text, vector) in computed {
                // Keep the first vector stored for a text.
                cache.entry(text).or_insert(vector);
            }
        }

        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        texts
            .iter()
            .map(|text| {
                cache.get(text).cloned().ok_or_else(|| {
                    SkillMatchError::Embedding(format!("No embedding cached for '{}'", text))
                })
            })
            .collect()
    }
}

/// Build the configured provider, wrapped in a [`CachingEmbedder`].
pub fn load_provider(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    let inner: Box<dyn EmbeddingProvider> = match config.models.backend {
        EmbeddingBackend::Model2Vec => Box::new(Model2VecEmbedder::load(
            &config.models.embedding_model,
            &config.models.models_dir,
        )?),
        EmbeddingBackend::Hashing => {
            info!(
                "Using hashing embedder with dimension {}",
                config.models.hashing_dimension
            );
            Box::new(HashingEmbedder::new(config.models.hashing_dimension))
        }
    };
    Ok(Arc::new(
        CachingEmbedder::new(inner).with_batch_size(config.processing.batch_size),
    ))
}
