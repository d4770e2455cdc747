//! Report presentation: console, JSON, CSV and markdown

pub mod formatter;
pub mod report;

pub use formatter::{ReportFormatter, ReportGenerator};
pub use report::{MatchReport, ReportMetadata};
