// src/normalize.rs
//! Text normalization shared by every matcher: lowercase, diacritics folded to
//! their base letters, punctuation collapsed to single spaces.

use std::collections::HashSet;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Distinct whole words of a normalized text.
pub type TokenSet = HashSet<String>;

/// Same notion of "word character" as regex `\w`: letters, digits, underscore.
#[inline]
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Lowercase, strip diacritics ("á" → "a", "č" → "c", "ł" → "l"), replace every
/// non-word, non-space character with a space, collapse whitespace, trim.
///
/// Idempotent: `normalize(&normalize(x)) == normalize(x)`.
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let mut folded = String::with_capacity(text.len());
    for c in text.to_lowercase().nfd().filter(|c| !is_combining_mark(*c)) {
        if let Some(ascii) = fold_letter(c) {
            folded.push_str(ascii);
        } else if is_word_char(c) || c.is_whitespace() {
            folded.push(c);
        } else {
            folded.push(' ');
        }
    }
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase letters with no canonical decomposition, so NFD keeps them whole.
fn fold_letter(c: char) -> Option<&'static str> {
    let ascii = match c {
        'ł' | 'ŀ' => "l",
        'đ' | 'ð' => "d",
        'ø' => "o",
        'ß' => "ss",
        'æ' => "ae",
        'œ' => "oe",
        'ħ' => "h",
        'ŧ' => "t",
        'ı' => "i",
        'þ' => "th",
        _ => return None,
    };
    Some(ascii)
}

/// All maximal runs of word characters, as a set. Order and repetition are lost
/// on purpose: a single-word keyword can only ever match a whole token.
pub fn tokenize(normalized: &str) -> TokenSet {
    normalized
        .split(|c: char| !is_word_char(c))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// A normalized text together with its token set, built once per classification.
#[derive(Debug, Clone, Default)]
pub struct NormalizedText {
    text: String,
    tokens: TokenSet,
}

impl NormalizedText {
    /// Normalize raw text and tokenize it.
    pub fn new(raw: &str) -> Self {
        Self::from_normalized(normalize(raw))
    }

    /// Wrap an already normalized string.
    pub fn from_normalized(text: String) -> Self {
        let tokens = tokenize(&text);
        Self { text, tokens }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &TokenSet {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn has_token(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    pub fn contains_phrase(&self, phrase: &str) -> bool {
        self.text.contains(phrase)
    }

    /// Words in reading order (normalized text is single-space separated).
    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.text.split(' ').filter(|w| !w.is_empty())
    }
}
