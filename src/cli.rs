//! CLI interface for the skill matcher

use crate::config::{EmbeddingBackend, OutputFormat};
use crate::processing::scorer::AggregationPolicy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "skill-matcher")]
#[command(about = "Rank CVs against a job description by semantic skill overlap")]
#[command(long_about = "Extract canonical skills from a job description and a set of CVs, \
compare them with sentence embeddings, and rank candidates by the share of required skills they cover")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Rank CVs against a job description
    Rank {
        /// Path to job description file (PDF, TXT, MD)
        #[arg(short, long)]
        job: PathBuf,

        /// CV files to rank (PDF, TXT, MD); repeat for several
        #[arg(long = "cv", num_args = 1..)]
        cvs: Vec<PathBuf>,

        /// Directory whose supported files are all ranked
        #[arg(long)]
        cv_dir: Option<PathBuf>,

        /// Similarity a job skill needs to count as matched, in (0, 1]
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Aggregation policy: best_match, aggregate
        #[arg(short, long)]
        aggregation: Option<String>,

        /// Embedding backend: model2vec, hashing
        #[arg(long)]
        backend: Option<String>,

        /// Skill dictionary (TOML) to use instead of the built-in one
        #[arg(long)]
        dictionary: Option<PathBuf>,

        /// Output format: console, json, csv, markdown
        #[arg(short, long)]
        format: Option<String>,

        /// Save output to file (format inferred from extension when --format is absent)
        #[arg(short, long)]
        save: Option<PathBuf>,

        /// Show only the best N candidates
        #[arg(short = 'n', long)]
        top_n: Option<usize>,

        /// Stop issuing new work after this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Disable the extraction cache
        #[arg(long)]
        no_cache: bool,

        /// Show which CV skill matched each job skill
        #[arg(short, long)]
        detailed: bool,
    },

    /// Print the canonical skills found in one document
    Extract {
        /// Path to the document (PDF, TXT, MD)
        file: PathBuf,

        /// Skill dictionary (TOML) to use instead of the built-in one
        #[arg(long)]
        dictionary: Option<PathBuf>,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Reset configuration to defaults
    Reset,

    /// Print the configuration file location
    Path,
}

/// Parse and validate output format
pub fn parse_output_format(format: &str) -> Result<OutputFormat, String> {
    match format.to_lowercase().as_str() {
        "console" => Ok(OutputFormat::Console),
        "json" => Ok(OutputFormat::Json),
        "csv" => Ok(OutputFormat::Csv),
        "markdown" | "md" => Ok(OutputFormat::Markdown),
        _ => Err(format!(
            "Invalid output format: {}. Supported: console, json, csv, markdown",
            format
        )),
    }
}

pub fn parse_aggregation(policy: &str) -> Result<AggregationPolicy, String> {
    policy.parse()
}

pub fn parse_backend(backend: &str) -> Result<EmbeddingBackend, String> {
    match backend.to_lowercase().as_str() {
        "model2vec" => Ok(EmbeddingBackend::Model2Vec),
        "hashing" => Ok(EmbeddingBackend::Hashing),
        _ => Err(format!(
            "Invalid embedding backend: {}. Supported: model2vec, hashing",
            backend
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rank_command() {
        let cli = Cli::try_parse_from([
            "skill-matcher",
            "rank",
            "--job",
            "job.txt",
            "--cv",
            "a.pdf",
            "b.md",
            "--threshold",
            "0.8",
            "-n",
            "3",
            "--no-cache",
        ])
        .unwrap();

        match cli.command {
            Commands::Rank {
                job,
                cvs,
                threshold,
                top_n,
                no_cache,
                ..
            } => {
                assert_eq!(job, PathBuf::from("job.txt"));
                assert_eq!(cvs, vec![PathBuf::from("a.pdf"), PathBuf::from("b.md")]);
                assert_eq!(threshold, Some(0.8));
                assert_eq!(top_n, Some(3));
                assert!(no_cache);
            }
            _ => panic!("expected rank command"),
        }
    }

    #[test]
    fn test_value_parsers() {
        assert_eq!(parse_output_format("CSV"), Ok(OutputFormat::Csv));
        assert!(parse_output_format("html").is_err());
        assert_eq!(parse_aggregation("aggregate"), Ok(AggregationPolicy::Aggregate));
        assert_eq!(parse_backend("hashing"), Ok(EmbeddingBackend::Hashing));
        assert!(parse_backend("bert").is_err());
    }
}
