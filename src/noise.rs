// src/noise.rs
//! Social-media chrome filter. Runs on raw OCR text *before* normalization so the
//! engagement counters ("1.1M", "356K", "10,2 k") still have their literal shape.

use once_cell::sync::Lazy;
use regex::Regex;

/// One to three digits, optional decimal part, optional space, then `k` or `m`.
static ENGAGEMENT_COUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\d{1,3}(?:[.,]\d{1,2})?\s*[km]$").expect("engagement count regex")
});

/// Characters stripped from both ends of each word before the checks.
const EDGE_PUNCT: &[char] = &['.', ',', '!', '?', ';', ':'];

/// Drops UI vocabulary ("follow", "like", "instagram", …) and engagement counters.
///
/// Vocabulary matching is substring containment, not whole-word: "followers"
/// is dropped because it contains "follow".
#[derive(Debug, Clone, Default)]
pub struct NoiseFilter {
    vocabulary: Vec<String>,
}

impl NoiseFilter {
    pub fn new<I, S>(vocabulary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocabulary: Vec<String> = vocabulary
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            // an empty entry would be a substring of every word
            .filter(|s| !s.is_empty())
            .collect();
        vocabulary.dedup();
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    /// True when `word` would be removed by [`NoiseFilter::filter`].
    pub fn is_noise(&self, word: &str) -> bool {
        let cleaned = word.trim_matches(EDGE_PUNCT).to_lowercase();
        if self.vocabulary.iter().any(|ui| cleaned.contains(ui.as_str())) {
            return true;
        }
        is_engagement_count(&cleaned)
    }

    /// Keep the surviving words (in their original form and order), joined by
    /// single spaces.
    pub fn filter(&self, raw_text: &str) -> String {
        raw_text
            .split_whitespace()
            .filter(|w| !self.is_noise(w))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// "1.1M", "356K", "10,2k", "28 k" (a single whitespace-delimited word never
/// carries the inner space, but the pattern allows it).
pub fn is_engagement_count(word: &str) -> bool {
    ENGAGEMENT_COUNT.is_match(word)
}

/// Free-function form for callers holding only a vocabulary slice.
pub fn filter_ui_noise(raw_text: &str, vocabulary: &[String]) -> String {
    NoiseFilter::new(vocabulary).filter(raw_text)
}
