//! Skill matcher library

pub mod cli;
pub mod config;
pub mod error;
pub mod input;
pub mod output;
pub mod processing;

pub use config::Config;
pub use error::{ErrorKind, Result, SkillMatchError};
pub use processing::batch::{BatchCoordinator, BatchOutcome, Candidate, CancellationToken, RunOptions};
pub use processing::dictionary::SkillDictionary;
pub use processing::document::{Document, SkillSet};
pub use processing::extractor::SkillExtractor;
pub use processing::ranking::{rank, RankedReport};
pub use processing::scorer::{AggregationPolicy, MatchResult, ScorerOptions, SimilarityScorer};
