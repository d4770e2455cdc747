//! Output formatters for ranking reports

use crate::config::OutputFormat;
use crate::error::{Result, SkillMatchError};
use crate::output::report::{MatchReport, ReportRow};
use colored::{Color, Colorize};
use std::path::Path;

/// Renders a [`MatchReport`] without reordering its rows.
pub trait ReportFormatter {
    fn format_report(&self, report: &MatchReport) -> Result<String>;
    fn supports_format(&self) -> OutputFormat;
}

/// Colored ranking table for terminals
pub struct ConsoleFormatter {
    use_colors: bool,
    detailed: bool,
}

pub struct JsonFormatter {
    pretty: bool,
}

/// One CSV record per ranked candidate
pub struct CsvFormatter;

pub struct MarkdownFormatter {
    include_metadata: bool,
}

impl ConsoleFormatter {
    pub fn new(use_colors: bool, detailed: bool) -> Self {
        Self { use_colors, detailed }
    }

    fn colorize(&self, text: &str, color: Color) -> String {
        if self.use_colors {
            text.color(color).to_string()
        } else {
            text.to_string()
        }
    }

    fn format_header(&self, title: &str, level: u8) -> String {
        let prefix = match level {
            1 => "█",
            2 => "▓",
            _ => "▒",
        };
        let color = match level {
            1 => Color::Blue,
            2 => Color::Green,
            _ => Color::Yellow,
        };

        if self.use_colors {
            format!("\n{} {}\n", prefix.color(color).bold(), title.color(color).bold())
        } else {
            format!("\n{} {}\n", prefix, title)
        }
    }

    fn format_score_badge(&self, score: u8) -> String {
        let (badge, color) = match score {
            80..=100 => ("STRONG", Color::Green),
            60..=79 => ("GOOD", Color::BrightGreen),
            40..=59 => ("PARTIAL", Color::Yellow),
            20..=39 => ("WEAK", Color::Red),
            _ => ("POOR", Color::BrightRed),
        };

        if self.use_colors {
            format!("[{}]", badge.color(color).bold())
        } else {
            format!("[{}]", badge)
        }
    }

    fn format_row(&self, row: &ReportRow, name_width: usize) -> String {
        let mut line = format!(
            "{:>3}. {:<width$}  {:>3}% {:<10} {:>2}/{:<2} matched  ({} CV skills)\n",
            row.rank,
            row.candidate,
            row.score_percentage,
            self.format_score_badge(row.score_percentage),
            row.matched_skills.len(),
            row.jd_skill_count,
            row.cv_skill_count,
            width = name_width
        );

        if !row.matched_skills.is_empty() {
            line.push_str(&format!(
                "     {} {}\n",
                self.colorize("matched:", Color::Green),
                row.matched_skills.join(", ")
            ));
        }
        if !row.missing_skills.is_empty() {
            line.push_str(&format!(
                "     {} {}\n",
                self.colorize("missing:", Color::Yellow),
                row.missing_skills.join(", ")
            ));
        }
        if self.detailed {
            for pair in &row.matched_pairs {
                line.push_str(&format!("       {}\n", self.colorize(pair, Color::BrightBlack)));
            }
        }
        line
    }
}

impl ReportFormatter for ConsoleFormatter {
    fn format_report(&self, report: &MatchReport) -> Result<String> {
        let mut output = String::new();

        output.push_str(&self.format_header("CANDIDATE RANKING", 1));
        output.push_str(&format!(
            "Job: {} | Generated: {} | {} ms\n",
            report.metadata.job_name,
            report.metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            report.stats.elapsed_ms
        ));
        output.push_str(&format!(
            "Model: {} | Threshold: {:.2} | Policy: {:?}\n",
            report.metadata.embedding_model,
            report.metadata.similarity_threshold,
            report.metadata.aggregation
        ));

        output.push_str(&self.format_header(
            &format!("Required skills ({})", report.job_skills.len()),
            2,
        ));
        if report.job_skills.is_empty() {
            output.push_str(&self.colorize(
                "No known skills found in the job description; every candidate scores 0.\n",
                Color::Yellow,
            ));
        } else {
            output.push_str(&format!("{}\n", report.job_skills.join(", ")));
        }

        output.push_str(&self.format_header("Ranking", 2));
        if report.rows.is_empty() {
            output.push_str("No candidates were scored.\n");
        }
        let name_width = report
            .rows
            .iter()
            .map(|row| row.candidate.chars().count())
            .max()
            .unwrap_or(0);
        for row in &report.rows {
            output.push_str(&self.format_row(row, name_width));
        }
        if report.omitted > 0 {
            output.push_str(&format!("     ... and {} more\n", report.omitted));
        }

        if !report.failures.is_empty() {
            output.push_str(&self.format_header("Failed documents", 3));
            for failure in &report.failures {
                output.push_str(&format!(
                    "  • {} {}\n",
                    self.colorize(&failure.candidate_id, Color::Red),
                    self.colorize(&format!("({}: {})", failure.error_kind, failure.message), Color::BrightBlack)
                ));
            }
        }

        if report.cancelled {
            output.push_str(&self.format_header("Run stopped early", 3));
            let reason = if report.stats.timed_out { "timeout" } else { "cancelled" };
            output.push_str(&format!(
                "{} ({}); {} candidates not processed: {}\n",
                self.colorize("Partial results", Color::Yellow),
                reason,
                report.skipped.len(),
                report.skipped.join(", ")
            ));
        }

        output.push_str(&format!(
            "\n{} scored, {} failed, {} skipped | skill-matcher v{}\n",
            report.stats.scored,
            report.stats.failed,
            report.stats.skipped,
            report.metadata.tool_version
        ));

        Ok(output)
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Console
    }
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl ReportFormatter for JsonFormatter {
    fn format_report(&self, report: &MatchReport) -> Result<String> {
        if self.pretty {
            Ok(serde_json::to_string_pretty(report)?)
        } else {
            Ok(serde_json::to_string(report)?)
        }
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Json
    }
}

impl ReportFormatter for CsvFormatter {
    fn format_report(&self, report: &MatchReport) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "rank",
            "candidate",
            "score",
            "matched_skills",
            "missing_skills",
            "matched_pairs",
            "matched_count",
            "jd_skill_count",
            "cv_skill_count",
        ])?;

        for row in &report.rows {
            writer.write_record([
                row.rank.to_string(),
                row.candidate.clone(),
                format!("{:.4}", row.score),
                row.matched_skills.join("; "),
                row.missing_skills.join("; "),
                row.matched_pairs.join("; "),
                row.matched_skills.len().to_string(),
                row.jd_skill_count.to_string(),
                row.cv_skill_count.to_string(),
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| SkillMatchError::Output(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| SkillMatchError::Output(e.to_string()))
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Csv
    }
}

impl MarkdownFormatter {
    pub fn new(include_metadata: bool) -> Self {
        Self { include_metadata }
    }

    fn escape_cell(text: &str) -> String {
        text.replace('|', "\\|")
    }
}

impl ReportFormatter for MarkdownFormatter {
    fn format_report(&self, report: &MatchReport) -> Result<String> {
        let mut output = String::new();

        output.push_str(&format!(
            "# Candidate Ranking: {}\n\n",
            Self::escape_cell(&report.metadata.job_name)
        ));

        if self.include_metadata {
            output.push_str(&format!(
                "**Generated:** {} | **Model:** `{}` | **Threshold:** {:.2} | **Policy:** {:?}\n\n",
                report.metadata.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
                report.metadata.embedding_model,
                report.metadata.similarity_threshold,
                report.metadata.aggregation
            ));
        }

        output.push_str(&format!(
            "**Required skills ({}):** {}\n\n",
            report.job_skills.len(),
            report.job_skills.join(", ")
        ));

        output.push_str("| Rank | Candidate | Score | Matched | Missing | JD / CV skills |\n");
        output.push_str("|------|-----------|-------|---------|---------|----------------|\n");
        for row in &report.rows {
            output.push_str(&format!(
                "| {} | {} | {}% | {} | {} | {} / {} |\n",
                row.rank,
                Self::escape_cell(&row.candidate),
                row.score_percentage,
                Self::escape_cell(&row.matched_skills.join(", ")),
                Self::escape_cell(&row.missing_skills.join(", ")),
                row.jd_skill_count,
                row.cv_skill_count
            ));
        }
        if report.omitted > 0 {
            output.push_str(&format!("\n_{} more candidates not shown._\n", report.omitted));
        }

        if !report.failures.is_empty() {
            output.push_str("\n## Failed documents\n\n");
            for failure in &report.failures {
                output.push_str(&format!(
                    "- `{}`: {} ({})\n",
                    failure.candidate_id, failure.message, failure.error_kind
                ));
            }
        }

        if report.cancelled {
            output.push_str(&format!(
                "\n> **Partial results:** the run was stopped before {} candidates were processed.\n",
                report.skipped.len()
            ));
        }

        Ok(output)
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Markdown
    }
}

/// Picks the formatter for each output format
pub struct ReportGenerator {
    console_formatter: ConsoleFormatter,
    json_formatter: JsonFormatter,
    csv_formatter: CsvFormatter,
    markdown_formatter: MarkdownFormatter,
}

impl ReportGenerator {
    pub fn with_options(use_colors: bool, detailed: bool) -> Self {
        Self {
            console_formatter: ConsoleFormatter::new(use_colors, detailed),
            json_formatter: JsonFormatter::new(true),
            csv_formatter: CsvFormatter,
            markdown_formatter: MarkdownFormatter::new(true),
        }
    }

    pub fn generate_report(&self, report: &MatchReport, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Console => self.console_formatter.format_report(report),
            OutputFormat::Json => self.json_formatter.format_report(report),
            OutputFormat::Csv => self.csv_formatter.format_report(report),
            OutputFormat::Markdown => self.markdown_formatter.format_report(report),
        }
    }
}

pub fn save_report_to_file(content: &str, file_path: &Path) -> Result<()> {
    use std::fs;
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(file_path, content)?;
    Ok(())
}

/// Infer the output format of `--save` from the file extension.
pub fn format_for_path(path: &Path) -> Option<OutputFormat> {
    match path.extension()?.to_str()?.to_lowercase().as_str() {
        "json" => Some(OutputFormat::Json),
        "csv" => Some(OutputFormat::Csv),
        "md" | "markdown" => Some(OutputFormat::Markdown),
        "txt" => Some(OutputFormat::Console),
        _ => None,
    }
}

pub fn suggest_filename(format: OutputFormat, job_name: &str, timestamp: bool) -> String {
    let base_name = Path::new(job_name)
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy();

    let timestamp_suffix = if timestamp {
        format!("_{}", chrono::Utc::now().format("%Y%m%d_%H%M%S"))
    } else {
        String::new()
    };

    match format {
        OutputFormat::Console => format!("{}_ranking{}.txt", base_name, timestamp_suffix),
        OutputFormat::Json => format!("{}_ranking{}.json", base_name, timestamp_suffix),
        OutputFormat::Csv => format!("{}_ranking{}.csv", base_name, timestamp_suffix),
        OutputFormat::Markdown => format!("{}_ranking{}.md", base_name, timestamp_suffix),
    }
}
