// src/scoring.rs
//! Fallback scorer: weighted keyword sums over the flat category table,
//! negative-hint penalties, confidence floor and ambiguity guard.
//!
//! Only whole tokens score here. A multi-word entry in the category table can
//! never equal a single token, so it never contributes; phrases only count
//! inside rule blocks.

use crate::config::{ClassifierConfig, ScoringSection};
use crate::keyword::Keyword;
use crate::normalize::{normalize, NormalizedText};
use anyhow::anyhow;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// One category's keywords, deduplicated by normalized form.
#[derive(Debug, Clone)]
pub struct WeightedCategory {
    pub name: String,
    keywords: Vec<(Keyword, i32)>,
}

impl WeightedCategory {
    pub fn keywords(&self) -> impl Iterator<Item = (&Keyword, i32)> {
        self.keywords.iter().map(|(k, w)| (k, *w))
    }
}

/// Toy listings: when any `keywords` is present, `skipped` keywords do not
/// count for `category`.
#[derive(Debug, Clone)]
pub struct ToyContext {
    pub category: String,
    keywords: Vec<Keyword>,
    skipped: HashSet<String>,
}

impl ToyContext {
    pub fn new(category: &str, keywords: &[String], skipped: &[String]) -> Self {
        Self {
            category: category.to_string(),
            keywords: keywords.iter().map(|k| Keyword::new(k)).collect(),
            skipped: skipped.iter().map(|k| normalize(k)).collect(),
        }
    }

    pub fn detected(&self, text: &NormalizedText) -> bool {
        self.keywords.iter().any(|k| text.has_token(&k.normalized))
    }

    fn skips(&self, normalized_keyword: &str) -> bool {
        self.skipped.contains(normalized_keyword)
    }
}

#[derive(Debug, Clone)]
pub struct NegativeHint {
    pub category: String,
    patterns: Vec<Regex>,
}

impl NegativeHint {
    pub fn new(category: &str, patterns: &[String]) -> anyhow::Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    anyhow!("negative hint `{}` pattern `{}` regex error: {}", category, p, e)
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self {
            category: category.to_string(),
            patterns,
        })
    }

    /// Patterns that match the normalized text; each counts once.
    pub fn matching(&self, text: &NormalizedText) -> Vec<&str> {
        self.patterns
            .iter()
            .filter(|re| re.is_match(text.as_str()))
            .map(|re| re.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryScore {
    pub category: String,
    /// After penalty, never below zero.
    pub score: i32,
    pub penalty: i32,
    /// Normalized keywords, heaviest first.
    pub matched: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackOutcome {
    /// Every category scored zero.
    NoMatch,
    BelowFloor { top: CategoryScore },
    /// `runner_up` is `None` when `top` is the only category.
    Ambiguous {
        top: CategoryScore,
        runner_up: Option<CategoryScore>,
    },
    Assigned { top: CategoryScore },
}

impl FallbackOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            FallbackOutcome::NoMatch => "no_match",
            FallbackOutcome::BelowFloor { .. } => "below_floor",
            FallbackOutcome::Ambiguous { .. } => "ambiguous",
            FallbackOutcome::Assigned { .. } => "assigned",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FallbackScorer {
    categories: Vec<WeightedCategory>,
    toy_context: Option<ToyContext>,
    negative_hints: Vec<NegativeHint>,
    params: ScoringSection,
}

impl FallbackScorer {
    pub fn from_config(cfg: &ClassifierConfig) -> anyhow::Result<Self> {
        let params = cfg.scoring.clone();

        let mut weights: HashMap<String, i32> = HashMap::new();
        for (raw, w) in &cfg.weights {
            let e = weights.entry(normalize(raw)).or_insert(*w);
            *e = (*e).max(*w);
        }

        let categories = cfg
            .categories
            .iter()
            .map(|c| {
                let mut seen = HashSet::new();
                let mut keywords = Vec::new();
                for lit in &c.keywords {
                    let kw = Keyword::new(lit);
                    if kw.is_empty() {
                        return Err(anyhow!(
                            "category `{}` keyword `{}` has no word characters",
                            c.name,
                            lit
                        ));
                    }
                    if !seen.insert(kw.normalized.clone()) {
                        continue;
                    }
                    let w = cfg
                        .weights
                        .get(lit)
                        .or_else(|| weights.get(&kw.normalized))
                        .copied()
                        .unwrap_or(params.default_weight);
                    keywords.push((kw, w));
                }
                Ok(WeightedCategory {
                    name: c.name.clone(),
                    keywords,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let toy_context = cfg
            .toy_context
            .as_ref()
            .map(|t| ToyContext::new(&t.category, &t.keywords, &t.skipped_keywords));

        let negative_hints = cfg
            .negative_hints
            .iter()
            .map(|h| NegativeHint::new(&h.category, &h.patterns))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            categories,
            toy_context,
            negative_hints,
            params,
        })
    }

    pub fn categories(&self) -> &[WeightedCategory] {
        &self.categories
    }

    pub fn params(&self) -> &ScoringSection {
        &self.params
    }

    /// Scores for every category, in table order. Categories with no match
    /// are present with score 0.
    pub fn score(&self, text: &NormalizedText) -> Vec<CategoryScore> {
        let toy = self
            .toy_context
            .as_ref()
            .filter(|t| t.detected(text));

        self.categories
            .iter()
            .map(|cat| {
                let skip_sizes = toy.filter(|t| t.category == cat.name);
                let mut hits: Vec<(&str, i32)> = cat
                    .keywords
                    .iter()
                    .filter(|(kw, _)| text.has_token(&kw.normalized))
                    .filter(|(kw, _)| !skip_sizes.is_some_and(|t| t.skips(&kw.normalized)))
                    .map(|(kw, w)| (kw.normalized.as_str(), *w))
                    .collect();
                let raw: i32 = hits.iter().map(|(_, w)| w).sum();

                let penalty: i32 = self
                    .negative_hints
                    .iter()
                    .filter(|h| h.category == cat.name)
                    .map(|h| h.matching(text).len() as i32 * self.params.negative_hint_penalty)
                    .sum();

                // stable: equal weights keep table order
                hits.sort_by(|a, b| b.1.cmp(&a.1));
                CategoryScore {
                    category: cat.name.clone(),
                    score: (raw - penalty).max(0),
                    penalty,
                    matched: hits
                        .into_iter()
                        .take(self.params.max_matched_terms)
                        .map(|(k, _)| k.to_string())
                        .collect(),
                }
            })
            .collect()
    }

    /// Apply floor and ambiguity guard to a set of scores.
    pub fn resolve(&self, scores: &[CategoryScore]) -> FallbackOutcome {
        let mut ranked: Vec<&CategoryScore> = scores.iter().collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score));

        let Some(top) = ranked.first().copied() else {
            return FallbackOutcome::NoMatch;
        };
        if top.score == 0 {
            return FallbackOutcome::NoMatch;
        }
        if top.score < self.params.confidence_floor {
            return FallbackOutcome::BelowFloor { top: top.clone() };
        }
        // a lone category is measured against an implicit runner-up of 0
        let runner_up = ranked.get(1).map_or(0, |r| r.score);
        if top.score - runner_up < self.params.min_margin {
            return FallbackOutcome::Ambiguous {
                top: top.clone(),
                runner_up: ranked.get(1).map(|r| (*r).clone()),
            };
        }
        FallbackOutcome::Assigned { top: top.clone() }
    }

    pub fn score_and_resolve(&self, text: &NormalizedText) -> FallbackOutcome {
        self.resolve(&self.score(text))
    }
}
