//! Text decoding from the supported document formats

use crate::error::{Result, SkillMatchError};
use crate::input::file_detector::FileType;
use pulldown_cmark::{html, Parser};
use regex::Regex;
use std::sync::OnceLock;

/// Turns raw document bytes into plain text.
pub trait DocumentDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8], mime_hint: Option<&str>) -> Result<String>;
}

pub struct PdfExtractor;

impl PdfExtractor {
    pub fn extract(&self, bytes: &[u8]) -> Result<String> {
        if !bytes.starts_with(b"%PDF-") {
            return Err(SkillMatchError::Decode(
                "content is not a valid PDF (missing %PDF header)".to_string(),
            ));
        }
        // pdf-extract panics on some malformed files
        match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(SkillMatchError::Decode(format!(
                "Failed to extract text from PDF: {}",
                e
            ))),
            Err(_) => Err(SkillMatchError::Decode(
                "PDF parser aborted on malformed content".to_string(),
            )),
        }
    }
}

pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn extract(&self, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| SkillMatchError::Decode(format!("text is not valid UTF-8: {}", e)))
    }
}

pub struct MarkdownExtractor;

impl MarkdownExtractor {
    pub fn extract(&self, bytes: &[u8]) -> Result<String> {
        let markdown_content = PlainTextExtractor.extract(bytes)?;

        let parser = Parser::new(&markdown_content);
        let mut html_output = String::new();
        html::push_html(&mut html_output, parser);

        Ok(self.html_to_text(&html_output))
    }

    fn html_to_text(&self, html: &str) -> String {
        static TAG: OnceLock<Regex> = OnceLock::new();
        let tag = TAG.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));

        let text = html
            .replace("<br>", "\n")
            .replace("</p>", "\n\n")
            .replace("</li>", "\n");
        let stripped = tag.replace_all(&text, "");
        let unescaped = stripped
            .replace("&nbsp;", " ")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&amp;", "&");

        unescaped
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Dispatches on the MIME hint, or on the content when there is none.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileDecoder;

impl DocumentDecoder for FileDecoder {
    fn decode(&self, bytes: &[u8], mime_hint: Option<&str>) -> Result<String> {
        let file_type = match mime_hint {
            Some(mime) => FileType::from_mime(mime),
            None => FileType::sniff(bytes),
        };

        match file_type {
            FileType::Pdf => PdfExtractor.extract(bytes),
            FileType::Text => PlainTextExtractor.extract(bytes),
            FileType::Markdown => MarkdownExtractor.extract(bytes),
            FileType::Unknown => Err(SkillMatchError::Decode(format!(
                "Unsupported document type: {}",
                mime_hint.unwrap_or("unknown")
            ))),
        }
    }
}
