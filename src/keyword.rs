// src/keyword.rs
//! Keywords with an explicit matching mode, decided once at load time.

use crate::normalize::{normalize, NormalizedText, TokenSet};

/// How a keyword is looked up in a [`NormalizedText`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Whole-token membership (single words).
    Token,
    /// Substring of the normalized text (multi-word phrases).
    Phrase,
    /// Phrase words in order, each at most `window` words after the previous one.
    Gapped { window: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyword {
    /// As written in the configuration; reported back in matched terms.
    pub literal: String,
    pub normalized: String,
    pub mode: MatchMode,
}

impl Keyword {
    /// Token mode for single words, phrase mode when the normalized form has a space.
    pub fn new(literal: &str) -> Self {
        let normalized = normalize(literal);
        let mode = if normalized.contains(' ') {
            MatchMode::Phrase
        } else {
            MatchMode::Token
        };
        Self {
            literal: literal.to_string(),
            normalized,
            mode,
        }
    }

    /// Gapped phrase; single words stay in token mode.
    pub fn gapped(literal: &str, window: usize) -> Self {
        let mut kw = Self::new(literal);
        if kw.mode == MatchMode::Phrase {
            kw.mode = MatchMode::Gapped { window };
        }
        kw
    }

    /// True when the keyword normalizes to nothing (e.g. "!!!").
    pub fn is_empty(&self) -> bool {
        self.normalized.is_empty()
    }

    pub fn matches(&self, text: &NormalizedText) -> bool {
        if self.is_empty() {
            return false;
        }
        match self.mode {
            MatchMode::Token => text.has_token(&self.normalized),
            MatchMode::Phrase => text.contains_phrase(&self.normalized),
            MatchMode::Gapped { window } => {
                text.contains_phrase(&self.normalized)
                    || gapped_match(&self.normalized, text.words(), window)
            }
        }
    }
}

/// Literals of the keywords in `list` that match `text`, in list order.
pub fn matching_literals(list: &[Keyword], text: &NormalizedText) -> Vec<String> {
    list.iter()
        .filter(|k| k.matches(text))
        .map(|k| k.literal.clone())
        .collect()
}

/// Ad-hoc form of the matcher: normalizes `keyword`, then phrase → substring of
/// `normalized_text`, single word → membership in `tokens`.
pub fn matches_keyword(keyword: &str, normalized_text: &str, tokens: &TokenSet) -> bool {
    let k = normalize(keyword);
    if k.is_empty() {
        return false;
    }
    if k.contains(' ') {
        normalized_text.contains(k.as_str())
    } else {
        tokens.contains(&k)
    }
}

/// Flexible phrase lookup over a normalized text: every phrase word must appear
/// in order, each within `max_distance` words after the previous one.
pub fn matches_phrase_flexible(phrase: &str, normalized_text: &str, max_distance: usize) -> bool {
    let phrase = normalize(phrase);
    gapped_match(&phrase, normalized_text.split(' '), max_distance)
}

fn gapped_match<'a>(
    phrase: &str,
    words: impl Iterator<Item = &'a str>,
    window: usize,
) -> bool {
    let needle: Vec<&str> = phrase.split(' ').filter(|w| !w.is_empty()).collect();
    if needle.is_empty() {
        return false;
    }
    let hay: Vec<&str> = words.filter(|w| !w.is_empty()).collect();
    (0..hay.len())
        .filter(|&i| hay[i] == needle[0])
        .any(|i| extend_from(&hay, &needle[1..], i, window))
}

/// Try every candidate position for the next word, so an early occurrence does
/// not shadow a later one that leaves more room for the rest of the phrase.
fn extend_from(hay: &[&str], rest: &[&str], pos: usize, window: usize) -> bool {
    let Some((next, tail)) = rest.split_first() else {
        return true;
    };
    let end = (pos + window).min(hay.len().saturating_sub(1));
    (pos + 1..=end)
        .filter(|&j| hay[j] == *next)
        .any(|j| extend_from(hay, tail, j, window))
}
