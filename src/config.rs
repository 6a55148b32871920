// src/config.rs
//! Classifier bundle schema (TOML) and loading.
//!
//! The bundle is plain data: fallback keyword table, weights, social-media UI
//! vocabulary, negative hints and the ordered rule blocks. A copy of
//! `config/classifier.toml` is compiled into the binary so the library works
//! without any file on disk.

use anyhow::{anyhow, Context};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

// --- env defaults & names ---
pub const DEFAULT_CONFIG_PATH: &str = "config/classifier.toml";
pub const ENV_CONFIG_PATH: &str = "SORTER_CONFIG_PATH";
pub const ENV_CONFIDENCE_FLOOR: &str = "SORTER_CONFIDENCE_FLOOR";

pub const DEFAULT_KEYWORD_WEIGHT: i32 = 3;
pub const DEFAULT_CONFIDENCE_FLOOR: i32 = 3;
pub const DEFAULT_MIN_MARGIN: i32 = 2;
pub const DEFAULT_NEGATIVE_HINT_PENALTY: i32 = 2;
pub const DEFAULT_MAX_MATCHED_TERMS: usize = 5;
pub const DEFAULT_GAP_WINDOW: usize = 10;
pub const DEFAULT_MIN_HITS: usize = 2;

const BUILTIN_BUNDLE: &str = include_str!("../config/classifier.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub scoring: ScoringSection,
    #[serde(default)]
    pub noise: NoiseSection,
    #[serde(default)]
    pub toy_context: Option<ToyContextSection>,
    #[serde(default)]
    pub weights: HashMap<String, i32>,
    #[serde(default)]
    pub negative_hints: Vec<NegativeHintSection>,
    #[serde(default)]
    pub rules: Vec<RuleSection>,
    #[serde(default)]
    pub categories: Vec<CategorySection>,
}

fn default_version() -> String {
    "unversioned".to_string()
}

/// Fallback scorer knobs. Every field may be omitted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringSection {
    pub default_weight: i32,
    pub confidence_floor: i32,
    pub min_margin: i32,
    pub negative_hint_penalty: i32,
    pub max_matched_terms: usize,
    /// Word window used by `gapped` phrases in rule blocks.
    pub gap_window: usize,
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            default_weight: DEFAULT_KEYWORD_WEIGHT,
            confidence_floor: DEFAULT_CONFIDENCE_FLOOR,
            min_margin: DEFAULT_MIN_MARGIN,
            negative_hint_penalty: DEFAULT_NEGATIVE_HINT_PENALTY,
            max_matched_terms: DEFAULT_MAX_MATCHED_TERMS,
            gap_window: DEFAULT_GAP_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoiseSection {
    #[serde(default)]
    pub ui_vocabulary: Vec<String>,
}

/// Toy listings mention sizes ("vel. 30 cm") without being clothing.
#[derive(Debug, Clone, Deserialize)]
pub struct ToyContextSection {
    pub category: String,
    pub keywords: Vec<String>,
    pub skipped_keywords: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NegativeHintSection {
    pub category: String,
    pub patterns: Vec<String>, // regex over normalized text
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// Fires when at least `min_hits` of `triggers` match.
    Count,
    /// very_specific → combinational → contextual.
    Tiered,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleSection {
    pub category: String,
    pub kind: RuleKind,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub min_hits: Option<usize>,
    #[serde(default)]
    pub very_specific: Vec<String>,
    #[serde(default)]
    pub combinational: Vec<String>,
    #[serde(default)]
    pub contextual: Vec<String>,
    /// Phrases of this block that use the flexible (gapped) matcher.
    #[serde(default)]
    pub gapped: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategorySection {
    pub name: String,
    pub keywords: Vec<String>,
}

impl ClassifierConfig {
    /// The bundle shipped inside the binary.
    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_toml_str(BUILTIN_BUNDLE).context("built-in classifier bundle")
    }

    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let cfg: ClassifierConfig = toml::from_str(toml_str)?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            anyhow!(
                "Failed to read classifier config at {}: {}",
                path.display(),
                e
            )
        })?;
        Self::from_toml_str(&content)
            .with_context(|| format!("parsing classifier config {}", path.display()))
    }

    /// Resolve the bundle the way the binary does:
    /// 1) `$SORTER_CONFIG_PATH` (must exist)
    /// 2) `config/classifier.toml` when present
    /// 3) the built-in bundle
    ///
    /// `$SORTER_CONFIDENCE_FLOOR` then overrides `scoring.confidence_floor`.
    pub fn from_env() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => Self::from_path(Path::new(&p))?,
            Err(_) => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::from_path(&default)?
                } else {
                    info!("no {DEFAULT_CONFIG_PATH} on disk, using built-in bundle");
                    Self::builtin()?
                }
            }
        };
        if let Some(floor) = parse_floor_env(std::env::var(ENV_CONFIDENCE_FLOOR).ok()) {
            cfg.scoring.confidence_floor = floor;
        }
        Ok(cfg)
    }

    /// Names of the fallback categories, in table order.
    pub fn category_names(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.name.clone()).collect()
    }
}

/// The path the hot-reload watcher should follow.
pub fn resolve_config_path() -> PathBuf {
    std::env::var(ENV_CONFIG_PATH)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

// parse optional integer env; negative floors make no sense
fn parse_floor_env(raw: Option<String>) -> Option<i32> {
    raw.and_then(|s| s.trim().parse::<i32>().ok())
        .map(|v| v.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn builtin_bundle_parses() {
        let cfg = ClassifierConfig::builtin().expect("builtin");
        assert_eq!(cfg.rules.len(), 12);
        assert_eq!(cfg.rules[0].category, "Recepty");
        assert_eq!(cfg.rules[11].category, "Holidays");
        assert!(cfg.category_names().iter().any(|c| c == "IT_Prace"));
        assert_eq!(cfg.scoring.confidence_floor, 3);
        assert_eq!(cfg.weights.get("jira"), Some(&10));
        assert!(cfg.toy_context.is_some());
        assert_eq!(cfg.negative_hints.len(), 2);
    }

    #[test]
    fn omitted_sections_take_defaults() {
        let cfg = ClassifierConfig::from_toml_str(
            r#"
[[categories]]
name = "Podcast"
keywords = ["podcast"]
"#,
        )
        .expect("minimal config");
        assert_eq!(cfg.version, "unversioned");
        assert_eq!(cfg.scoring.default_weight, DEFAULT_KEYWORD_WEIGHT);
        assert_eq!(cfg.scoring.min_margin, DEFAULT_MIN_MARGIN);
        assert_eq!(cfg.scoring.gap_window, DEFAULT_GAP_WINDOW);
        assert!(cfg.rules.is_empty());
        assert!(cfg.noise.ui_vocabulary.is_empty());
    }

    #[test]
    fn partial_scoring_section_keeps_other_defaults() {
        let cfg = ClassifierConfig::from_toml_str(
            r#"
[scoring]
confidence_floor = 7
"#,
        )
        .expect("partial scoring");
        assert_eq!(cfg.scoring.confidence_floor, 7);
        assert_eq!(cfg.scoring.negative_hint_penalty, DEFAULT_NEGATIVE_HINT_PENALTY);
    }

    #[test]
    fn unknown_rule_kind_is_rejected() {
        let err = ClassifierConfig::from_toml_str(
            r#"
[[rules]]
category = "X"
kind = "fuzzy"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("fuzzy") || err.to_string().contains("variant"));
    }

    #[test]
    fn floor_env_parsing() {
        assert_eq!(parse_floor_env(Some(" 5 ".into())), Some(5));
        assert_eq!(parse_floor_env(Some("-4".into())), Some(0));
        assert_eq!(parse_floor_env(Some("abc".into())), None);
        assert_eq!(parse_floor_env(None), None);
    }

    #[test]
    #[serial]
    fn env_path_and_floor_override() {
        let dir = std::env::temp_dir().join(format!(
            "sorter_cfg_test_{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bundle.toml");
        fs::write(
            &path,
            "version = \"test\"\n[[categories]]\nname = \"Podcast\"\nkeywords = [\"podcast\"]\n",
        )
        .unwrap();

        std::env::set_var(ENV_CONFIG_PATH, &path);
        std::env::set_var(ENV_CONFIDENCE_FLOOR, "9");
        let cfg = ClassifierConfig::from_env();
        std::env::remove_var(ENV_CONFIG_PATH);
        std::env::remove_var(ENV_CONFIDENCE_FLOOR);

        let cfg = cfg.expect("env config");
        assert_eq!(cfg.version, "test");
        assert_eq!(cfg.scoring.confidence_floor, 9);
        assert_eq!(resolve_config_path(), PathBuf::from(DEFAULT_CONFIG_PATH));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    #[serial]
    fn missing_env_path_is_an_error() {
        std::env::set_var(ENV_CONFIG_PATH, "/definitely/not/here/classifier.toml");
        let res = ClassifierConfig::from_env();
        std::env::remove_var(ENV_CONFIG_PATH);
        let err = res.unwrap_err().to_string();
        assert!(err.contains("Failed to read classifier config"), "{err}");
    }
}
