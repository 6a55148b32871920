// src/rules.rs
//! Ordered rule blocks. The first block whose activation condition holds
//! decides the category; later blocks are never consulted.

use crate::config::{RuleKind, RuleSection, DEFAULT_MIN_HITS};
use crate::keyword::{matching_literals, Keyword};
use crate::normalize::NormalizedText;
use anyhow::anyhow;
use std::collections::HashSet;
use std::fmt;

/// Which part of a block produced the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Flat trigger list reached its hit threshold.
    Trigger,
    VerySpecific,
    /// Two combinational hits, or one combinational plus one contextual.
    Combinational,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tier::Trigger => "trigger",
            Tier::VerySpecific => "very_specific",
            Tier::Combinational => "combinational",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleHit {
    pub category: String,
    /// Keyword literals as configured, in list order.
    pub terms: Vec<String>,
    pub tier: Tier,
    /// Position of the winning block in priority order.
    pub rule_index: usize,
}

#[derive(Debug, Clone)]
pub enum Activation {
    CountThreshold {
        triggers: Vec<Keyword>,
        min_hits: usize,
    },
    Tiered {
        very_specific: Vec<Keyword>,
        combinational: Vec<Keyword>,
        contextual: Vec<Keyword>,
    },
}

#[derive(Debug, Clone)]
pub struct RuleBlock {
    pub category: String,
    pub activation: Activation,
}

impl RuleBlock {
    /// Compile one `[[rules]]` entry. Phrases listed in `gapped` use the
    /// flexible matcher with `gap_window`.
    pub fn compile(section: &RuleSection, gap_window: usize) -> anyhow::Result<Self> {
        let cat = &section.category;
        let gapped: HashSet<&str> = section.gapped.iter().map(String::as_str).collect();

        let build = |list: &[String], tier: &str| -> anyhow::Result<Vec<Keyword>> {
            list.iter()
                .map(|lit| {
                    let kw = if gapped.contains(lit.as_str()) {
                        Keyword::gapped(lit, gap_window)
                    } else {
                        Keyword::new(lit)
                    };
                    if kw.is_empty() {
                        return Err(anyhow!(
                            "rule `{}` {} keyword `{}` has no word characters",
                            cat,
                            tier,
                            lit
                        ));
                    }
                    Ok(kw)
                })
                .collect()
        };

        let activation = match section.kind {
            RuleKind::Count => {
                if section.triggers.is_empty() {
                    return Err(anyhow!("rule `{}` (count) has no triggers", cat));
                }
                let min_hits = section.min_hits.unwrap_or(DEFAULT_MIN_HITS);
                if min_hits == 0 {
                    return Err(anyhow!("rule `{}` min_hits must be at least 1", cat));
                }
                Activation::CountThreshold {
                    triggers: build(&section.triggers, "trigger")?,
                    min_hits,
                }
            }
            RuleKind::Tiered => {
                if section.very_specific.is_empty() && section.combinational.is_empty() {
                    return Err(anyhow!(
                        "rule `{}` (tiered) needs very_specific or combinational keywords",
                        cat
                    ));
                }
                Activation::Tiered {
                    very_specific: build(&section.very_specific, "very_specific")?,
                    combinational: build(&section.combinational, "combinational")?,
                    contextual: build(&section.contextual, "contextual")?,
                }
            }
        };

        let listed: HashSet<&str> = section
            .triggers
            .iter()
            .chain(&section.very_specific)
            .chain(&section.combinational)
            .chain(&section.contextual)
            .map(String::as_str)
            .collect();
        if let Some(stray) = section.gapped.iter().find(|g| !listed.contains(g.as_str())) {
            return Err(anyhow!(
                "rule `{}` gapped phrase `{}` is not listed in any tier",
                cat,
                stray
            ));
        }

        Ok(Self {
            category: cat.clone(),
            activation,
        })
    }

    /// Decide this block alone. Returns the tier and the matched literals.
    pub fn evaluate(&self, text: &NormalizedText) -> Option<(Tier, Vec<String>)> {
        match &self.activation {
            Activation::CountThreshold { triggers, min_hits } => {
                let hits = matching_literals(triggers, text);
                (hits.len() >= *min_hits).then_some((Tier::Trigger, hits))
            }
            Activation::Tiered {
                very_specific,
                combinational,
                contextual,
            } => {
                let specific = matching_literals(very_specific, text);
                if !specific.is_empty() {
                    return Some((Tier::VerySpecific, specific));
                }
                let combo = matching_literals(combinational, text);
                if combo.is_empty() {
                    return None;
                }
                let context = matching_literals(contextual, text);
                if combo.len() >= 2 || !context.is_empty() {
                    let mut terms = combo;
                    terms.extend(context);
                    return Some((Tier::Combinational, terms));
                }
                None
            }
        }
    }

    pub fn keyword_count(&self) -> usize {
        match &self.activation {
            Activation::CountThreshold { triggers, .. } => triggers.len(),
            Activation::Tiered {
                very_specific,
                combinational,
                contextual,
            } => very_specific.len() + combinational.len() + contextual.len(),
        }
    }
}

/// Priority list of rule blocks.
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    blocks: Vec<RuleBlock>,
}

impl RuleEngine {
    pub fn new(blocks: Vec<RuleBlock>) -> Self {
        Self { blocks }
    }

    pub fn from_sections(sections: &[RuleSection], gap_window: usize) -> anyhow::Result<Self> {
        let blocks = sections
            .iter()
            .map(|s| RuleBlock::compile(s, gap_window))
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self::new(blocks))
    }

    pub fn blocks(&self) -> &[RuleBlock] {
        &self.blocks
    }

    /// First block (in priority order) that fires, if any.
    pub fn apply_rules(&self, text: &NormalizedText) -> Option<RuleHit> {
        if text.is_empty() {
            return None;
        }
        self.blocks.iter().enumerate().find_map(|(i, block)| {
            block.evaluate(text).map(|(tier, terms)| RuleHit {
                category: block.category.clone(),
                terms,
                tier,
                rule_index: i,
            })
        })
    }
}
