//! Text normalization and tokenization

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Lowercases, strips noise and tokenizes document text for skill matching.
///
/// Tokens are runs of letters and digits, optionally followed by `+` or `#`
/// so that names like `c++`, `c#` and `f#` survive. Every other character is
/// a separator, which makes `node.js` and `Node JS` normalize identically.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    remove_stop_words: bool,
}

struct Patterns {
    url: Regex,
    email: Regex,
    token: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        url: Regex::new(r"(?i)\b(?:https?://|www\.)\S+").expect("Invalid URL regex"),
        email: Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}")
            .expect("Invalid email regex"),
        token: Regex::new(r"[\p{Alphabetic}\p{Nd}][\p{Alphabetic}\p{Nd}]*[+#]*")
            .expect("Invalid token regex"),
    })
}

fn stop_words() -> &'static HashSet<&'static str> {
    static STOP_WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    STOP_WORDS.get_or_init(create_stop_words)
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextNormalizer {
    pub fn new() -> Self {
        Self {
            remove_stop_words: false,
        }
    }

    pub fn with_stop_words_removed(mut self, remove: bool) -> Self {
        self.remove_stop_words = remove;
        self
    }

    pub fn removes_stop_words(&self) -> bool {
        self.remove_stop_words
    }

    /// Normalize raw text into a token sequence. Empty input yields no tokens.
    pub fn normalize(&self, raw_text: &str) -> Vec<String> {
        let cleaned = self.clean_text(raw_text);
        tokenize(&cleaned)
            .into_iter()
            .filter(|token| !(self.remove_stop_words && is_stop_word(token)))
            .collect()
    }

    /// Normalize a short term (skill name or synonym) into its lookup key.
    pub fn normalize_term(&self, term: &str) -> String {
        self.normalize(term).join(" ")
    }

    /// Remove URLs and e-mail addresses; their fragments would otherwise
    /// surface as spurious tokens (`john.py@host` -> `py`).
    fn clean_text(&self, text: &str) -> String {
        let p = patterns();
        let without_urls = p.url.replace_all(text, " ");
        p.email.replace_all(&without_urls, " ").into_owned()
    }
}

/// Lowercase and split into tokens without any stop-word filtering.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = normalize_unicode(&text.to_lowercase());
    patterns()
        .token
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Join tokens with stop words removed; used to index stop-word-free variants.
pub fn strip_stop_words(tokens: &[String]) -> Vec<String> {
    tokens
        .iter()
        .filter(|t| !is_stop_word(t))
        .cloned()
        .collect()
}

pub fn is_stop_word(token: &str) -> bool {
    stop_words().contains(token)
}

fn normalize_unicode(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2013}' | '\u{2014}' => '-',
            '\u{2026}' => '.',
            '\u{00A0}' => ' ',
            '\u{FF0B}' => '+',
            '\u{FF03}' => '#',
            _ => c,
        })
        .collect()
}

/// English function words only; content words such as "go" or "team" are
/// skill names in their own right and must not be dropped.
fn create_stop_words() -> HashSet<&'static str> {
    [
        "a", "an", "and", "are", "as", "at", "be", "been", "but", "by", "can", "do",
        "for", "from", "had", "has", "have", "he", "her", "his", "i", "if", "in",
        "into", "is", "it", "its", "me", "my", "of", "on", "or", "our", "she", "so",
        "than", "that", "the", "their", "them", "then", "there", "these", "they",
        "this", "those", "to", "us", "was", "we", "were", "which", "who", "will",
        "with", "you", "your",
    ]
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_strips_punctuation() {
        let normalizer = TextNormalizer::new();
        let tokens = normalizer.normalize("Need Python, and SQL skills!!!");
        assert_eq!(tokens, vec!["need", "python", "and", "sql", "skills"]);
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        let normalizer = TextNormalizer::new();
        assert!(normalizer.normalize("").is_empty());
        assert!(normalizer.normalize("   \n\t  ").is_empty());
        assert!(normalizer.normalize("... --- !!!").is_empty());
    }

    #[test]
    fn test_keeps_language_suffixes() {
        let normalizer = TextNormalizer::new();
        let tokens = normalizer.normalize("C++, C# and Node.js");
        assert_eq!(tokens, vec!["c++", "c#", "and", "node", "js"]);
    }

    #[test]
    fn test_stop_word_removal_is_optional() {
        let text = "Ruby on Rails with the team";
        let keep = TextNormalizer::new().normalize(text);
        assert_eq!(keep, vec!["ruby", "on", "rails", "with", "the", "team"]);

        let drop = TextNormalizer::new().with_stop_words_removed(true).normalize(text);
        assert_eq!(drop, vec!["ruby", "rails", "team"]);
    }

    #[test]
    fn test_urls_and_emails_are_removed() {
        let normalizer = TextNormalizer::new();
        let tokens = normalizer.normalize("Mail john.py@example.com or see https://py.example.org/rust now");
        assert_eq!(tokens, vec!["mail", "or", "see", "now"]);
    }

    #[test]
    fn test_normalize_term_collapses_whitespace() {
        let normalizer = TextNormalizer::new();
        assert_eq!(
            normalizer.normalize_term("  Structured   Query\nLanguage "),
            "structured query language"
        );
    }

    #[test]
    fn test_deterministic() {
        let normalizer = TextNormalizer::new().with_stop_words_removed(true);
        let text = "Experienced in py and structured query language.";
        assert_eq!(normalizer.normalize(text), normalizer.normalize(text));
    }
}
