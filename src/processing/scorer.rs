//! Semantic similarity scoring of a candidate's skills against a job's skills

use crate::error::{Result, SkillMatchError};
use crate::processing::document::SkillSet;
use crate::processing::embeddings::{cosine_similarity, EmbeddingProvider, EmbeddingVector};
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a job skill is compared with a candidate's skill set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationPolicy {
    /// Best cosine similarity against any single candidate skill.
    #[default]
    BestMatch,
    /// Cosine similarity against the mean of the candidate's skill embeddings.
    Aggregate,
}

impl std::str::FromStr for AggregationPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "best_match" | "best" => Ok(AggregationPolicy::BestMatch),
            "aggregate" | "mean" => Ok(AggregationPolicy::Aggregate),
            _ => Err(format!(
                "Invalid aggregation policy: {}. Supported: best_match, aggregate",
                s
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScorerOptions {
    pub threshold: f32,
    pub aggregation: AggregationPolicy,
}

impl Default for ScorerOptions {
    fn default() -> Self {
        Self {
            threshold: 0.75,
            aggregation: AggregationPolicy::BestMatch,
        }
    }
}

impl ScorerOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(SkillMatchError::Config(format!(
                "similarity threshold must be in (0, 1], got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Per job-skill detail behind a [`MatchResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillMatch {
    pub jd_skill: String,
    /// Closest candidate skill under the best-match policy.
    pub best_cv_skill: Option<String>,
    pub similarity: f32,
    pub matched: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub candidate_id: String,
    /// Fraction of job skills matched, in [0, 1].
    pub score: f32,
    pub matched_skills: SkillSet,
    pub missing_skills: SkillSet,
    pub skill_matches: Vec<SkillMatch>,
    pub jd_skill_count: usize,
    pub cv_skill_count: usize,
}

/// Job skills with their embeddings, computed once per batch.
#[derive(Debug, Clone)]
pub struct JobProfile {
    skills: SkillSet,
    embeddings: Vec<(String, EmbeddingVector)>,
}

impl JobProfile {
    pub fn skills(&self) -> &SkillSet {
        &self.skills
    }
}

pub struct SimilarityScorer {
    provider: Arc<dyn EmbeddingProvider>,
    options: ScorerOptions,
}

impl SimilarityScorer {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, options: ScorerOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self { provider, options })
    }

    pub fn options(&self) -> &ScorerOptions {
        &self.options
    }

    pub fn provider(&self) -> &dyn EmbeddingProvider {
        self.provider.as_ref()
    }

    pub fn prepare_job(&self, jd_skills: &SkillSet) -> Result<JobProfile> {
        Ok(JobProfile {
            skills: jd_skills.clone(),
            embeddings: self.embed_skills(jd_skills)?,
        })
    }

    pub fn score(
        &self,
        candidate_id: &str,
        jd_skills: &SkillSet,
        cv_skills: &SkillSet,
    ) -> Result<MatchResult> {
        let job = self.prepare_job(jd_skills)?;
        self.score_prepared(candidate_id, &job, cv_skills)
    }

    /// Score a candidate against a prepared job.
    ///
    /// `matched_skills` and `missing_skills` always partition the job skills;
    /// an empty job scores 0.0.
    pub fn score_prepared(
        &self,
        candidate_id: &str,
        job: &JobProfile,
        cv_skills: &SkillSet,
    ) -> Result<MatchResult> {
        let cv_embeddings = self.embed_skills(cv_skills)?;
        let centroid = match self.options.aggregation {
            AggregationPolicy::Aggregate => {
                let vectors: Vec<EmbeddingVector> =
                    cv_embeddings.iter().map(|(_, v)| v.clone()).collect();
                EmbeddingVector::mean(&vectors)?
            }
            AggregationPolicy::BestMatch => None,
        };

        let mut matched_skills = SkillSet::new();
        let mut missing_skills = SkillSet::new();
        let mut skill_matches = Vec::with_capacity(job.embeddings.len());

        for (jd_skill, jd_vector) in &job.embeddings {
            let (best_cv_skill, similarity) = match self.options.aggregation {
                AggregationPolicy::BestMatch => best_match(jd_vector, &cv_embeddings)?,
                AggregationPolicy::Aggregate => match &centroid {
                    Some(centroid) => (
                        None,
                        cosine_similarity(jd_vector.as_slice(), centroid.as_slice())?,
                    ),
                    None => (None, 0.0),
                },
            };

            let matched = !cv_embeddings.is_empty() && similarity >= self.options.threshold;
            if matched {
                matched_skills.insert(jd_skill.clone());
            } else {
                missing_skills.insert(jd_skill.clone());
            }
            skill_matches.push(SkillMatch {
                jd_skill: jd_skill.clone(),
                best_cv_skill,
                similarity,
                matched,
            });
        }

        let score = if job.skills.is_empty() {
            0.0
        } else {
            (matched_skills.len() as f32 / job.skills.len() as f32).clamp(0.0, 1.0)
        };

        debug!(
            "Scored '{}': {:.2} ({}/{} job skills matched)",
            candidate_id,
            score,
            matched_skills.len(),
            job.skills.len()
        );

        Ok(MatchResult {
            candidate_id: candidate_id.to_string(),
            score,
            matched_skills,
            missing_skills,
            skill_matches,
            jd_skill_count: job.skills.len(),
            cv_skill_count: cv_skills.len(),
        })
    }

    fn embed_skills(&self, skills: &SkillSet) -> Result<Vec<(String, EmbeddingVector)>> {
        if skills.is_empty() {
            return Ok(Vec::new());
        }
        let names = skills.to_vec();
        let vectors = self.provider.embed_batch(&names)?;
        if vectors.len() != names.len() {
            return Err(SkillMatchError::Embedding(format!(
                "expected {} embeddings, got {}",
                names.len(),
                vectors.len()
            )));
        }
        Ok(names.into_iter().zip(vectors).collect())
    }
}

/// Highest similarity against any candidate skill; earlier skills win ties.
fn best_match(
    jd_vector: &EmbeddingVector,
    cv_embeddings: &[(String, EmbeddingVector)],
) -> Result<(Option<String>, f32)> {
    let mut best: Option<(&str, f32)> = None;
    for (cv_skill, cv_vector) in cv_embeddings {
        let similarity = cosine_similarity(jd_vector.as_slice(), cv_vector.as_slice())?;
        if best.map_or(true, |(_, score)| similarity > score) {
            best = Some((cv_skill, similarity));
        }
    }
    Ok(match best {
        Some((skill, similarity)) => (Some(skill.to_string()), similarity),
        None => (None, 0.0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Provider with hand-picked vectors so similarities are known exactly.
    struct TableProvider {
        vectors: HashMap<String, Vec<f32>>,
    }

    impl TableProvider {
        fn new(entries: &[(&str, [f32; 3])]) -> Arc<Self> {
            Arc::new(Self {
                vectors: entries
                    .iter()
                    .map(|(name, v)| (name.to_string(), v.to_vec()))
                    .collect(),
            })
        }
    }

    impl EmbeddingProvider for TableProvider {
        fn model_id(&self) -> &str {
            "table"
        }

        fn dimension(&self) -> usize {
            3
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
            texts
                .iter()
                .map(|t| {
                    self.vectors
                        .get(t)
                        .cloned()
                        .map(EmbeddingVector::new)
                        .ok_or_else(|| SkillMatchError::Embedding(format!("unknown {}", t)))
                })
                .collect()
        }
    }

    fn provider() -> Arc<TableProvider> {
        TableProvider::new(&[
            ("python", [1.0, 0.0, 0.0]),
            ("sql", [0.0, 1.0, 0.0]),
            ("postgresql", [0.0, 0.8, 0.6]),
            ("docker", [0.0, 0.0, 1.0]),
            ("rust", [1.0, 2.0, 0.0]),
            ("rustlang", [2.0, 4.0, 0.0]),
        ])
    }

    fn skills(names: &[&str]) -> SkillSet {
        names.iter().copied().collect()
    }

    fn scorer(threshold: f32, aggregation: AggregationPolicy) -> SimilarityScorer {
        SimilarityScorer::new(provider(), ScorerOptions { threshold, aggregation }).unwrap()
    }

    #[test]
    fn test_identical_skill_sets_score_one() {
        let result = scorer(0.75, AggregationPolicy::BestMatch)
            .score("cv", &skills(&["python", "sql"]), &skills(&["python", "sql"]))
            .unwrap();
        assert_eq!(result.score, 1.0);
        assert_eq!(result.matched_skills, skills(&["python", "sql"]));
        assert!(result.missing_skills.is_empty());
    }

    #[test]
    fn test_semantic_neighbour_matches_below_identity() {
        let jd = skills(&["python", "sql"]);
        let cv = skills(&["postgresql"]);

        let lenient = scorer(0.75, AggregationPolicy::BestMatch).score("cv", &jd, &cv).unwrap();
        assert_eq!(lenient.matched_skills, skills(&["sql"]));
        assert_eq!(lenient.missing_skills, skills(&["python"]));
        assert_eq!(lenient.score, 0.5);
        let sql = lenient.skill_matches.iter().find(|m| m.jd_skill == "sql").unwrap();
        assert_eq!(sql.best_cv_skill.as_deref(), Some("postgresql"));
        assert!((sql.similarity - 0.8).abs() < 1e-6);

        let strict = scorer(1.0, AggregationPolicy::BestMatch).score("cv", &jd, &cv).unwrap();
        assert!(strict.matched_skills.is_empty());
        assert_eq!(strict.score, 0.0);
    }

    #[test]
    fn test_parallel_embeddings_are_not_identity_matches() {
        let jd = skills(&["rust"]);
        let cv = skills(&["rustlang"]);

        let strict = scorer(1.0, AggregationPolicy::BestMatch).score("cv", &jd, &cv).unwrap();
        assert!(strict.matched_skills.is_empty());
        assert!(strict.skill_matches[0].similarity < 1.0);

        let exact = scorer(1.0, AggregationPolicy::BestMatch).score("cv", &jd, &jd).unwrap();
        assert_eq!(exact.matched_skills, jd);
    }

    #[test]
    fn test_raising_threshold_never_adds_matches() {
        let jd = skills(&["python", "sql", "docker"]);
        let cv = skills(&["postgresql", "python"]);
        let mut previous = usize::MAX;
        for threshold in [0.1, 0.5, 0.75, 0.8, 0.9, 1.0] {
            let result = scorer(threshold, AggregationPolicy::BestMatch).score("cv", &jd, &cv).unwrap();
            assert!(result.matched_skills.len() <= previous);
            previous = result.matched_skills.len();
        }
    }

    #[test]
    fn test_partition_and_bounds() {
        let jd = skills(&["python", "sql", "docker"]);
        for aggregation in [AggregationPolicy::BestMatch, AggregationPolicy::Aggregate] {
            for cv in [skills(&[]), skills(&["docker"]), skills(&["python", "postgresql"])] {
                let result = scorer(0.5, aggregation).score("cv", &jd, &cv).unwrap();
                assert!((0.0..=1.0).contains(&result.score));
                assert_eq!(
                    result.matched_skills.len() + result.missing_skills.len(),
                    jd.len()
                );
                for skill in jd.iter() {
                    assert!(result.matched_skills.contains(skill) ^ result.missing_skills.contains(skill));
                }
            }
        }
    }

    #[test]
    fn test_empty_job_scores_zero() {
        let result = scorer(0.75, AggregationPolicy::BestMatch)
            .score("cv", &skills(&[]), &skills(&["python"]))
            .unwrap();
        assert_eq!(result.score, 0.0);
        assert!(result.matched_skills.is_empty());
        assert!(result.missing_skills.is_empty());
    }

    #[test]
    fn test_empty_cv_misses_everything() {
        let result = scorer(0.75, AggregationPolicy::Aggregate)
            .score("cv", &skills(&["python"]), &skills(&[]))
            .unwrap();
        assert_eq!(result.score, 0.0);
        assert_eq!(result.missing_skills, skills(&["python"]));
    }

    #[test]
    fn test_aggregate_policy_uses_centroid() {
        // centroid of python and docker is (0.5, 0, 0.5): cos to python ~0.707
        let jd = skills(&["python"]);
        let cv = skills(&["python", "docker"]);

        let best = scorer(0.75, AggregationPolicy::BestMatch).score("cv", &jd, &cv).unwrap();
        assert_eq!(best.score, 1.0);

        let aggregate = scorer(0.75, AggregationPolicy::Aggregate).score("cv", &jd, &cv).unwrap();
        assert_eq!(aggregate.score, 0.0);
        assert!((aggregate.skill_matches[0].similarity - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-5);
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        for threshold in [0.0, -0.5, 1.01] {
            let result = SimilarityScorer::new(
                provider(),
                ScorerOptions {
                    threshold,
                    aggregation: AggregationPolicy::BestMatch,
                },
            );
            assert!(matches!(result, Err(SkillMatchError::Config(_))));
        }
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("best-match".parse::<AggregationPolicy>(), Ok(AggregationPolicy::BestMatch));
        assert_eq!("aggregate".parse::<AggregationPolicy>(), Ok(AggregationPolicy::Aggregate));
        assert!("median".parse::<AggregationPolicy>().is_err());
    }
}
