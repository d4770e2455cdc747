//! Integration tests for the skill matcher

use skill_matcher::config::{Config, EmbeddingBackend, OutputFormat};
use skill_matcher::error::{ErrorKind, SkillMatchError};
use skill_matcher::input::{
    collect_documents, load_candidates, read_document, DocumentDecoder, FileDecoder,
};
use skill_matcher::output::{MatchReport, ReportGenerator, ReportMetadata};
use skill_matcher::processing::batch::{BatchCoordinator, Candidate};
use skill_matcher::processing::document::Document;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

/// Hashing embeddings with a strict threshold: only identical skills match.
fn test_config(cache_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.models.backend = EmbeddingBackend::Hashing;
    config.models.hashing_dimension = 128;
    config.matching.similarity_threshold = 0.95;
    config.processing.max_concurrency = 3;
    config.processing.cache_path = Some(cache_dir.path().join("extractions.json"));
    config
}

async fn job() -> Document {
    let file = read_document(&fixture("job_backend.txt"), 10).await.unwrap();
    let text = FileDecoder.decode(&file.bytes, file.mime_hint()).unwrap();
    Document::new(file.name, text)
}

async fn fixture_candidates() -> Vec<Candidate> {
    let mut candidates = Vec::new();
    for path in collect_documents(&fixture("cvs")).await.unwrap() {
        let file = read_document(&path, 10).await.unwrap();
        let mime_hint = file.mime_hint();
        candidates.push(Candidate::from_bytes(file.name, file.bytes, mime_hint));
    }
    candidates
}

#[tokio::test]
async fn test_rank_fixture_directory() {
    let cache_dir = TempDir::new().unwrap();
    let coordinator = BatchCoordinator::from_config(&test_config(&cache_dir)).unwrap();

    let outcome = coordinator.run(job().await, fixture_candidates().await).await.unwrap();

    assert_eq!(outcome.jd_skills.len(), 7);
    assert!(outcome.jd_skills.contains("kubernetes"));
    assert!(outcome.jd_skills.contains("machine learning"));

    let ranking: Vec<(&str, usize)> = outcome
        .report
        .iter()
        .map(|r| (r.candidate_id.as_str(), r.matched_skills.len()))
        .collect();
    assert_eq!(
        ranking,
        vec![("alice.txt", 7), ("bob.md", 2), ("carol.txt", 2), ("dave.txt", 0)]
    );

    let alice = outcome.report.iter().next().unwrap();
    assert_eq!(alice.score, 1.0);
    assert!(alice.missing_skills.is_empty());

    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].candidate_id, "corrupt.pdf");
    assert_eq!(outcome.failures[0].error_kind, ErrorKind::Decode);
    assert!(!outcome.cancelled);
}

#[tokio::test]
async fn test_extraction_cache_survives_restart() {
    let cache_dir = TempDir::new().unwrap();
    let config = test_config(&cache_dir);
    let cache_file = config.cache_file().unwrap();

    let first = BatchCoordinator::from_config(&config).unwrap();
    let baseline = first.run(job().await, fixture_candidates().await).await.unwrap();
    first.extractor().save_cache(&cache_file).unwrap();
    assert!(cache_file.exists());

    let second = BatchCoordinator::from_config(&config).unwrap();
    let preloaded = second.extractor().cache_stats().entries;
    assert!(preloaded >= 5);

    let rerun = second.run(job().await, fixture_candidates().await).await.unwrap();
    assert_eq!(rerun.report, baseline.report);
    assert!(second.extractor().cache_stats().hits >= 5);
}

#[tokio::test]
async fn test_custom_dictionary() {
    let cache_dir = TempDir::new().unwrap();
    let mut config = test_config(&cache_dir);
    config.extraction.dictionary_path = Some(fixture("dictionary.toml"));
    let coordinator = BatchCoordinator::from_config(&config).unwrap();

    let jd = Document::new("bakery", "Looking for a pastry cook who speaks French.");
    let outcome = coordinator.run(jd, fixture_candidates().await).await.unwrap();

    assert_eq!(outcome.jd_skills.len(), 2);
    let best = outcome.report.iter().next().unwrap();
    assert_eq!(best.candidate_id, "dave.txt");
    assert_eq!(best.score, 1.0);
}

#[test]
fn test_startup_errors_surface_before_work() {
    let cache_dir = TempDir::new().unwrap();

    let mut config = test_config(&cache_dir);
    config.extraction.dictionary_path = Some(fixture("missing.toml"));
    assert!(matches!(
        BatchCoordinator::from_config(&config),
        Err(SkillMatchError::Config(_))
    ));

    let models_dir = TempDir::new().unwrap();
    std::fs::create_dir(models_dir.path().join("absent-model")).unwrap();
    let mut config = test_config(&cache_dir);
    config.models.backend = EmbeddingBackend::Model2Vec;
    config.models.models_dir = models_dir.path().to_path_buf();
    config.models.embedding_model = "absent-model".to_string();
    assert!(matches!(
        BatchCoordinator::from_config(&config),
        Err(SkillMatchError::ModelUnavailable(_))
    ));
}

#[tokio::test]
async fn test_reports_keep_ranked_order() {
    let cache_dir = TempDir::new().unwrap();
    let coordinator = BatchCoordinator::from_config(&test_config(&cache_dir)).unwrap();
    let outcome = coordinator.run(job().await, fixture_candidates().await).await.unwrap();

    let metadata = ReportMetadata::new(
        "job_backend.txt",
        coordinator.scorer().provider().model_id(),
        0.95,
        Default::default(),
    );
    let report = MatchReport::new(&outcome, metadata, Some(3));
    let generator = ReportGenerator::with_options(false, false);

    let csv = generator.generate_report(&report, OutputFormat::Csv).unwrap();
    let candidates: Vec<&str> = csv
        .lines()
        .skip(1)
        .map(|line| line.split(',').nth(1).unwrap())
        .collect();
    assert_eq!(candidates, vec!["alice.txt", "bob.md", "carol.txt"]);

    let console = generator.generate_report(&report, OutputFormat::Console).unwrap();
    assert!(console.contains("corrupt.pdf"));
    assert!(console.contains("... and 1 more"));

    let json = generator.generate_report(&report, OutputFormat::Json).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["rows"].as_array().unwrap().len(), 3);
    assert_eq!(parsed["failures"][0]["error_kind"], "decode");
}

#[tokio::test]
async fn test_markdown_cv_is_decoded_to_plain_text() {
    let file = read_document(&fixture("cvs/bob.md"), 10).await.unwrap();
    let text = FileDecoder.decode(&file.bytes, file.mime_hint()).unwrap();
    assert!(text.contains("Python and pandas"));
    assert!(!text.contains("**"));
    assert!(!text.contains("##"));
}

#[tokio::test]
async fn test_unloadable_cvs_are_reported_as_failures() {
    let cache_dir = TempDir::new().unwrap();
    let coordinator = BatchCoordinator::from_config(&test_config(&cache_dir)).unwrap();

    let scratch = TempDir::new().unwrap();
    let docx = scratch.path().join("erin.docx");
    std::fs::write(&docx, b"PK\x03\x04").unwrap();
    let oversized = scratch.path().join("frank.txt");
    std::fs::write(&oversized, vec![b'a'; 1024 * 1024 + 1]).unwrap();

    let paths = vec![fixture("cvs/alice.txt"), docx, oversized];
    let (candidates, unreadable) = load_candidates(&paths, 1).await;
    assert_eq!(candidates.len(), 1);
    assert_eq!(unreadable.len(), 2);

    let mut outcome = coordinator.run(job().await, candidates).await.unwrap();
    outcome.record_failures(unreadable);
    assert_eq!(outcome.stats.total, 3);
    assert_eq!(outcome.stats.scored, 1);
    assert_eq!(outcome.stats.failed, 2);

    let metadata = ReportMetadata::new("job_backend.txt", "hashing", 0.95, Default::default());
    let report = MatchReport::new(&outcome, metadata, None);
    let json = ReportGenerator::with_options(false, false)
        .generate_report(&report, OutputFormat::Json)
        .unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed["failures"][0]["candidate_id"], "erin.docx");
    assert_eq!(parsed["failures"][1]["candidate_id"], "frank.txt");
    assert_eq!(parsed["failures"][1]["error_kind"], "invalid_input");
    assert_eq!(parsed["stats"]["failed"], 2);
}
