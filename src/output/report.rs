//! Presentation model of a ranking run

use crate::processing::batch::{BatchOutcome, BatchStats, FailureRecord};
use crate::processing::scorer::{AggregationPolicy, MatchResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub job_name: String,
    pub embedding_model: String,
    pub similarity_threshold: f32,
    pub aggregation: AggregationPolicy,
    pub tool_version: String,
}

impl ReportMetadata {
    pub fn new(
        job_name: impl Into<String>,
        embedding_model: impl Into<String>,
        similarity_threshold: f32,
        aggregation: AggregationPolicy,
    ) -> Self {
        Self {
            generated_at: Utc::now(),
            job_name: job_name.into(),
            embedding_model: embedding_model.into(),
            similarity_threshold,
            aggregation,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// One line of the ranking table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    pub rank: usize,
    pub candidate: String,
    pub score: f32,
    pub score_percentage: u8,
    pub matched_skills: Vec<String>,
    pub missing_skills: Vec<String>,
    /// `cv skill -> job skill (similarity)` for every matched job skill.
    pub matched_pairs: Vec<String>,
    pub jd_skill_count: usize,
    pub cv_skill_count: usize,
}

impl ReportRow {
    fn new(rank: usize, result: &MatchResult) -> Self {
        let matched_pairs = result
            .skill_matches
            .iter()
            .filter(|m| m.matched)
            .map(|m| match &m.best_cv_skill {
                Some(cv_skill) => format!("{} -> {} ({:.2})", cv_skill, m.jd_skill, m.similarity),
                None => format!("{} ({:.2})", m.jd_skill, m.similarity),
            })
            .collect();

        Self {
            rank,
            candidate: result.candidate_id.clone(),
            score: result.score,
            score_percentage: (result.score * 100.0).round().clamp(0.0, 100.0) as u8,
            matched_skills: result.matched_skills.to_vec(),
            missing_skills: result.missing_skills.to_vec(),
            matched_pairs,
            jd_skill_count: result.jd_skill_count,
            cv_skill_count: result.cv_skill_count,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchReport {
    pub metadata: ReportMetadata,
    pub job_skills: Vec<String>,
    pub rows: Vec<ReportRow>,
    /// Rows left out by `top_n`.
    pub omitted: usize,
    pub failures: Vec<FailureRecord>,
    pub cancelled: bool,
    pub skipped: Vec<String>,
    pub stats: BatchStats,
}

impl MatchReport {
    /// Rows keep the ranked order; `top_n` only truncates.
    pub fn new(outcome: &BatchOutcome, metadata: ReportMetadata, top_n: Option<usize>) -> Self {
        let shown = outcome.report.top(top_n);
        let rows = shown
            .iter()
            .enumerate()
            .map(|(idx, result)| ReportRow::new(idx + 1, result))
            .collect();

        Self {
            metadata,
            job_skills: outcome.jd_skills.to_vec(),
            rows,
            omitted: outcome.report.len() - shown.len(),
            failures: outcome.failures.clone(),
            cancelled: outcome.cancelled,
            skipped: outcome.skipped.clone(),
            stats: outcome.stats.clone(),
        }
    }
}
