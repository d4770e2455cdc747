//! skill-matcher: rank CVs against a job description by semantic skill overlap

use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use skill_matcher::cli::{self, Cli, Commands, ConfigAction};
use skill_matcher::config::{Config, OutputFormat};
use skill_matcher::error::{Result, SkillMatchError};
use skill_matcher::input::{
    collect_documents, load_candidates, read_document, DocumentDecoder, FileDecoder,
};
use skill_matcher::output::formatter::{format_for_path, save_report_to_file, suggest_filename};
use skill_matcher::output::{MatchReport, ReportGenerator, ReportMetadata};
use skill_matcher::processing::batch::{
    BatchCoordinator, CancellationToken, CandidateStatus, ProgressCallback, ProgressEvent,
    RunOptions,
};
use skill_matcher::processing::dictionary::SkillDictionary;
use skill_matcher::processing::document::Document;
use skill_matcher::processing::extractor::{ExtractorOptions, SkillExtractor};
use skill_matcher::processing::text_processor::TextNormalizer;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(2);
        }
    };

    if let Err(e) = run_command(cli.command, config, cli.config).await {
        error!("Command failed: {}", e);
        eprintln!("{} {}", "error:".red().bold(), e);
        process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

async fn run_command(command: Commands, mut config: Config, config_path: Option<PathBuf>) -> Result<()> {
    match command {
        Commands::Rank {
            job,
            cvs,
            cv_dir,
            threshold,
            aggregation,
            backend,
            dictionary,
            format,
            save,
            top_n,
            timeout,
            no_cache,
            detailed,
        } => {
            if let Some(threshold) = threshold {
                config.matching.similarity_threshold = threshold;
            }
            if let Some(aggregation) = aggregation {
                config.matching.aggregation =
                    cli::parse_aggregation(&aggregation).map_err(SkillMatchError::InvalidInput)?;
            }
            if let Some(backend) = backend {
                config.models.backend =
                    cli::parse_backend(&backend).map_err(SkillMatchError::InvalidInput)?;
            }
            if dictionary.is_some() {
                config.extraction.dictionary_path = dictionary;
            }
            if top_n.is_some() {
                config.output.top_n = top_n;
            }
            if timeout.is_some() {
                config.processing.timeout_secs = timeout;
            }
            if no_cache {
                config.processing.cache_enabled = false;
            }
            config.validate()?;

            let output_format = match (&format, &save) {
                (Some(format), _) => {
                    cli::parse_output_format(format).map_err(SkillMatchError::InvalidInput)?
                }
                (None, Some(path)) => format_for_path(path).unwrap_or(config.output.format),
                (None, None) => config.output.format,
            };

            let mut cv_paths = cvs;
            if let Some(dir) = &cv_dir {
                cv_paths.extend(collect_documents(dir).await?);
            }
            if cv_paths.is_empty() {
                return Err(SkillMatchError::InvalidInput(
                    "No CVs given; use --cv <file> or --cv-dir <dir>".to_string(),
                ));
            }

            rank_candidates(&config, &job, &cv_paths, output_format, save.as_deref(), detailed).await
        }

        Commands::Extract { file, dictionary } => {
            if dictionary.is_some() {
                config.extraction.dictionary_path = dictionary;
            }
            extract_skills(&config, &file).await
        }

        Commands::Config { action } => {
            let path = config_path.unwrap_or_else(Config::config_path);
            match action {
                Some(ConfigAction::Show) | None => {
                    println!("Configuration ({})\n", path.display());
                    let content = toml::to_string_pretty(&config).map_err(|e| {
                        SkillMatchError::Config(format!("Failed to serialize config: {}", e))
                    })?;
                    println!("{}", content);
                }
                Some(ConfigAction::Reset) => {
                    Config::default().save_to(&path)?;
                    println!("Configuration reset to defaults: {}", path.display());
                }
                Some(ConfigAction::Path) => {
                    println!("{}", path.display());
                }
            }
            Ok(())
        }
    }
}

async fn rank_candidates(
    config: &Config,
    job_path: &Path,
    cv_paths: &[PathBuf],
    output_format: OutputFormat,
    save: Option<&Path>,
    detailed: bool,
) -> Result<()> {
    let coordinator = BatchCoordinator::from_config(config)?;
    let max_file_size_mb = config.input.max_file_size_mb;

    let job_file = read_document(job_path, max_file_size_mb).await?;
    let job_text = FileDecoder.decode(&job_file.bytes, job_file.mime_hint())?;
    let job = Document::new(job_file.name.clone(), job_text);

    let (candidates, unreadable) = load_candidates(cv_paths, max_file_size_mb).await;

    let progress_bar = ProgressBar::new(candidates.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .map_err(|e| SkillMatchError::Output(e.to_string()))?
            .progress_chars("#>-"),
    );
    let bar = progress_bar.clone();
    let progress: ProgressCallback = Arc::new(move |event: &ProgressEvent| {
        bar.set_position(event.completed as u64);
        let marker = match event.status {
            CandidateStatus::Scored => "scored",
            CandidateStatus::Failed => "failed",
        };
        bar.set_message(format!("{} {}", marker, event.candidate_id));
    });

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received; finishing in-flight documents (press Ctrl-C again to quit)");
        on_interrupt.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{} interrupted", "error:".red().bold());
            process::exit(130);
        }
    });

    let outcome = coordinator
        .run_with(
            job,
            candidates,
            RunOptions {
                cancel: Some(cancel),
                timeout: config.timeout(),
                progress: Some(progress),
            },
        )
        .await;
    progress_bar.finish_and_clear();
    let mut outcome = outcome?;
    outcome.record_failures(unreadable);

    if let Some(path) = config.cache_file() {
        if let Err(e) = coordinator.extractor().save_cache(&path) {
            warn!("Could not persist extraction cache: {}", e);
        }
    }

    let metadata = ReportMetadata::new(
        job_file.name,
        coordinator.scorer().provider().model_id(),
        config.matching.similarity_threshold,
        config.matching.aggregation,
    );
    let report = MatchReport::new(&outcome, metadata, config.output.top_n);

    let generator = ReportGenerator::with_options(config.output.color_output, detailed);
    let rendered = generator.generate_report(&report, output_format)?;

    match save {
        Some(path) => {
            let path = if path.is_dir() {
                path.join(suggest_filename(output_format, &report.metadata.job_name, true))
            } else {
                path.to_path_buf()
            };
            let content = if output_format == OutputFormat::Console {
                ReportGenerator::with_options(false, detailed).generate_report(&report, output_format)?
            } else {
                rendered
            };
            save_report_to_file(&content, &path)?;
            println!("Report saved to {}", path.display());
        }
        None => println!("{}", rendered),
    }

    info!(
        "Ranked {} candidates ({} failed, {} skipped)",
        outcome.stats.scored, outcome.stats.failed, outcome.stats.skipped
    );
    Ok(())
}

async fn extract_skills(config: &Config, path: &Path) -> Result<()> {
    let file = read_document(path, config.input.max_file_size_mb).await?;
    let text = FileDecoder.decode(&file.bytes, file.mime_hint())?;

    let dictionary = match &config.extraction.dictionary_path {
        Some(dictionary_path) => SkillDictionary::load(dictionary_path)?,
        None => SkillDictionary::builtin()?,
    }
    .with_fuzzy_threshold(config.matching.fuzzy_threshold);
    let extractor = SkillExtractor::new(
        Arc::new(dictionary),
        TextNormalizer::new().with_stop_words_removed(config.extraction.remove_stop_words),
        ExtractorOptions {
            max_ngram: config.extraction.max_ngram,
            cache_enabled: false,
        },
    );

    let document = Document::new(file.name, text);
    let skills = extractor.extract(&document)?;

    println!(
        "{} ({} words): {} skills",
        document.id().bold(),
        document.word_count(),
        skills.len()
    );
    for skill in skills.iter() {
        println!("  • {}", skill);
    }
    Ok(())
}
