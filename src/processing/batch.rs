//! Concurrent scoring of many candidates against one job description

use crate::config::Config;
use crate::error::{ErrorKind, Result, SkillMatchError};
use crate::input::{DocumentDecoder, FileDecoder};
use crate::processing::dictionary::SkillDictionary;
use crate::processing::document::{Document, SkillSet};
use crate::processing::embeddings::load_provider;
use crate::processing::extractor::{ExtractionCache, ExtractorOptions, SkillExtractor};
use crate::processing::ranking::{rank, RankedReport};
use crate::processing::scorer::{JobProfile, MatchResult, ScorerOptions, SimilarityScorer};
use crate::processing::text_processor::TextNormalizer;
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::future::pending;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};

#[derive(Debug, Clone)]
pub enum CandidateSource {
    Text(String),
    Bytes {
        data: Vec<u8>,
        mime_hint: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub source: CandidateSource,
}

impl Candidate {
    pub fn from_text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: CandidateSource::Text(text.into()),
        }
    }

    pub fn from_bytes(id: impl Into<String>, data: Vec<u8>, mime_hint: Option<&str>) -> Self {
        Self {
            id: id.into(),
            source: CandidateSource::Bytes {
                data,
                mime_hint: mime_hint.map(str::to_string),
            },
        }
    }
}

/// Cooperative stop signal shared between a run and its caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Scored,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressEvent {
    pub candidate_id: String,
    pub completed: usize,
    pub total: usize,
    pub status: CandidateStatus,
}

pub type ProgressCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

#[derive(Clone, Default)]
pub struct RunOptions {
    pub cancel: Option<CancellationToken>,
    pub timeout: Option<Duration>,
    pub progress: Option<ProgressCallback>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub candidate_id: String,
    pub error_kind: ErrorKind,
    pub message: String,
}

impl FailureRecord {
    pub fn new(candidate_id: String, error: &SkillMatchError) -> Self {
        Self {
            candidate_id,
            error_kind: error.kind(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total: usize,
    pub scored: usize,
    pub failed: usize,
    pub skipped: usize,
    pub jd_skill_count: usize,
    pub timed_out: bool,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub report: RankedReport,
    pub failures: Vec<FailureRecord>,
    pub cancelled: bool,
    /// Candidates never started because the run was stopped, in input order.
    pub skipped: Vec<String>,
    pub jd_skills: SkillSet,
    pub stats: BatchStats,
}

impl BatchOutcome {
    /// Fold in candidates that failed before they could join the batch,
    /// such as files rejected while loading.
    pub fn record_failures(&mut self, records: Vec<FailureRecord>) {
        if records.is_empty() {
            return;
        }
        self.stats.total += records.len();
        self.failures.extend(records);
        self.failures.sort_by(|a, b| a.candidate_id.cmp(&b.candidate_id));
        self.stats.failed = self.failures.len();
    }
}

/// Runs extraction and scoring for a batch of candidates.
///
/// Every candidate runs on a blocking task; at most `max_concurrency` run at
/// once. Results are ranked only after all started work has finished.
pub struct BatchCoordinator {
    extractor: Arc<SkillExtractor>,
    scorer: Arc<SimilarityScorer>,
    decoder: Arc<dyn DocumentDecoder>,
    max_concurrency: usize,
}

impl BatchCoordinator {
    pub fn new(
        extractor: Arc<SkillExtractor>,
        scorer: Arc<SimilarityScorer>,
        decoder: Arc<dyn DocumentDecoder>,
        max_concurrency: usize,
    ) -> Self {
        Self {
            extractor,
            scorer,
            decoder,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Wire up dictionary, extractor, embedding provider and scorer from
    /// configuration. Startup errors surface here, before any document work.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let dictionary = match &config.extraction.dictionary_path {
            Some(path) => SkillDictionary::load(path)?,
            None => SkillDictionary::builtin()?,
        }
        .with_fuzzy_threshold(config.matching.fuzzy_threshold);

        let normalizer =
            TextNormalizer::new().with_stop_words_removed(config.extraction.remove_stop_words);
        let mut extractor = SkillExtractor::new(
            Arc::new(dictionary),
            normalizer,
            ExtractorOptions {
                max_ngram: config.extraction.max_ngram,
                cache_enabled: config.processing.cache_enabled,
            },
        );
        if let Some(path) = config.cache_file() {
            let cache = ExtractionCache::load(&path, &extractor.cache_signature());
            extractor = extractor.with_cache(cache);
        }

        let provider = load_provider(config)?;
        let scorer = SimilarityScorer::new(
            provider,
            ScorerOptions {
                threshold: config.matching.similarity_threshold,
                aggregation: config.matching.aggregation,
            },
        )?;

        Ok(Self::new(
            Arc::new(extractor),
            Arc::new(scorer),
            Arc::new(FileDecoder),
            config.processing.max_concurrency,
        ))
    }

    pub fn extractor(&self) -> &SkillExtractor {
        &self.extractor
    }

    pub fn scorer(&self) -> &SimilarityScorer {
        &self.scorer
    }

    pub async fn run(&self, jd: Document, candidates: Vec<Candidate>) -> Result<BatchOutcome> {
        self.run_with(jd, candidates, RunOptions::default()).await
    }

    pub async fn run_with(
        &self,
        jd: Document,
        candidates: Vec<Candidate>,
        options: RunOptions,
    ) -> Result<BatchOutcome> {
        let started = Instant::now();
        check_unique_ids(&candidates)?;

        let total = candidates.len();
        info!(
            "Scoring {} candidates against '{}' (concurrency {})",
            total,
            jd.id(),
            self.max_concurrency
        );

        let job = Arc::new(self.prepare_job(jd).await?);
        debug!("Job requires {} skills: {}", job.skills().len(), job.skills());

        let deadline = options.timeout.map(|timeout| started + timeout);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut queue: VecDeque<Candidate> = candidates.into();
        let mut tasks: JoinSet<(String, Result<MatchResult>)> = JoinSet::new();

        let mut results = Vec::with_capacity(total);
        let mut failures = Vec::new();
        let mut fatal: Option<SkillMatchError> = None;
        let mut stopped = false;
        let mut cancelled = false;
        let mut completed = 0;

        while (!stopped && !queue.is_empty()) || !tasks.is_empty() {
            tokio::select! {
                biased;

                _ = stop_requested(options.cancel.as_ref(), deadline), if !stopped => {
                    stopped = true;
                    cancelled = true;
                    info!(
                        "Run stopped; waiting for {} in-flight candidates, skipping {}",
                        tasks.len(),
                        queue.len()
                    );
                }

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    let (candidate_id, result) = joined?;
                    completed += 1;
                    let status = match result {
                        Ok(result) => {
                            results.push(result);
                            CandidateStatus::Scored
                        }
                        Err(e) if e.is_fatal() => {
                            error!("Fatal error for '{}': {}", candidate_id, e);
                            stopped = true;
                            fatal.get_or_insert(e);
                            CandidateStatus::Failed
                        }
                        Err(e) => {
                            warn!("Skipping candidate '{}': {}", candidate_id, e);
                            failures.push(FailureRecord::new(candidate_id.clone(), &e));
                            CandidateStatus::Failed
                        }
                    };

                    if let Some(progress) = &options.progress {
                        progress(&ProgressEvent {
                            candidate_id,
                            completed,
                            total,
                            status,
                        });
                    }
                }

                Ok(permit) = Arc::clone(&semaphore).acquire_owned(), if !stopped && !queue.is_empty() => {
                    if let Some(candidate) = queue.pop_front() {
                        let extractor = Arc::clone(&self.extractor);
                        let scorer = Arc::clone(&self.scorer);
                        let decoder = Arc::clone(&self.decoder);
                        let job = Arc::clone(&job);

                        tasks.spawn(async move {
                            let candidate_id = candidate.id.clone();
                            let result = tokio::task::spawn_blocking(move || {
                                let _permit = permit;
                                score_candidate(&extractor, &scorer, decoder.as_ref(), &job, candidate)
                            })
                            .await
                            .unwrap_or_else(|e| Err(SkillMatchError::from(e)));
                            (candidate_id, result)
                        });
                    }
                }

                else => break,
            }
        }

        if let Some(e) = fatal {
            return Err(e);
        }

        let skipped: Vec<String> = queue.into_iter().map(|c| c.id).collect();
        failures.sort_by(|a, b| a.candidate_id.cmp(&b.candidate_id));
        let timed_out = cancelled
            && !options.cancel.as_ref().is_some_and(CancellationToken::is_cancelled);

        let report = rank(results);
        let stats = BatchStats {
            total,
            scored: report.len(),
            failed: failures.len(),
            skipped: skipped.len(),
            jd_skill_count: job.skills().len(),
            timed_out,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            "Batch finished: {} scored, {} failed, {} skipped in {} ms",
            stats.scored, stats.failed, stats.skipped, stats.elapsed_ms
        );

        Ok(BatchOutcome {
            report,
            failures,
            cancelled,
            skipped,
            jd_skills: job.skills().clone(),
            stats,
        })
    }

    async fn prepare_job(&self, jd: Document) -> Result<JobProfile> {
        let extractor = Arc::clone(&self.extractor);
        let scorer = Arc::clone(&self.scorer);
        tokio::task::spawn_blocking(move || {
            let skills = extractor.extract(&jd)?;
            scorer.prepare_job(&skills)
        })
        .await?
    }
}

fn score_candidate(
    extractor: &SkillExtractor,
    scorer: &SimilarityScorer,
    decoder: &dyn DocumentDecoder,
    job: &JobProfile,
    candidate: Candidate,
) -> Result<MatchResult> {
    let text = match candidate.source {
        CandidateSource::Text(text) => text,
        CandidateSource::Bytes { data, mime_hint } => decoder.decode(&data, mime_hint.as_deref())?,
    };
    let document = Document::new(candidate.id, text);
    let skills = extractor.extract(&document)?;
    scorer.score_prepared(document.id(), job, &skills)
}

fn check_unique_ids(candidates: &[Candidate]) -> Result<()> {
    let mut seen = HashSet::with_capacity(candidates.len());
    for candidate in candidates {
        if !seen.insert(candidate.id.as_str()) {
            return Err(SkillMatchError::InvalidInput(format!(
                "Duplicate candidate id: {}",
                candidate.id
            )));
        }
    }
    Ok(())
}

async fn stop_requested(cancel: Option<&CancellationToken>, deadline: Option<Instant>) {
    let cancelled = async {
        match cancel {
            Some(token) => token.cancelled().await,
            None => pending().await,
        }
    };
    let expired = async {
        match deadline {
            Some(deadline) => sleep_until(deadline).await,
            None => pending().await,
        }
    };
    tokio::select! {
        _ = cancelled => {}
        _ = expired => {}
    }
}
