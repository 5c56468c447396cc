//! Transcript text filtering
//!
//! Transcript lines pass through a `TranscriptFilter` before they are stored
//! and broadcast. Filters may call out to external services, so they run
//! before the session lock is taken.

use async_trait::async_trait;
use std::collections::HashSet;

/// Result of filtering one transcript line
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredText {
    pub text: String,
    /// True if anything was masked
    pub beeped: bool,
}

#[async_trait]
pub trait TranscriptFilter: Send + Sync {
    async fn filter(&self, text: &str) -> FilteredText;

    /// Get the name of this filter
    fn name(&self) -> &str;
}

/// Masks whole words from a fixed list, case-insensitively
#[derive(Debug, Clone, Default)]
pub struct WordListFilter {
    words: HashSet<String>,
}

impl WordListFilter {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn mask(&self, text: &str) -> FilteredText {
        if self.words.is_empty() {
            return FilteredText {
                text: text.to_string(),
                beeped: false,
            };
        }

        let mut out = String::with_capacity(text.len());
        let mut beeped = false;

        for piece in text.split_inclusive(char::is_whitespace) {
            let word = piece.trim_end();
            let trailing = &piece[word.len()..];

            let core = word.trim_matches(|c: char| !c.is_alphanumeric());
            if core.is_empty() || !self.words.contains(&core.to_lowercase()) {
                out.push_str(piece);
                continue;
            }

            // Keep surrounding punctuation, mask the word itself
            let lead = word.len() - word.trim_start_matches(|c: char| !c.is_alphanumeric()).len();
            out.push_str(&word[..lead]);
            out.push_str(&"*".repeat(core.chars().count()));
            out.push_str(&word[lead + core.len()..]);
            out.push_str(trailing);
            beeped = true;
        }

        FilteredText { text: out, beeped }
    }
}

#[async_trait]
impl TranscriptFilter for WordListFilter {
    async fn filter(&self, text: &str) -> FilteredText {
        self.mask(text)
    }

    fn name(&self) -> &str {
        "word-list"
    }
}
