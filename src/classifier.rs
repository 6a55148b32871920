// src/classifier.rs
//! Category resolver: noise filter → normalize → rule blocks → fallback scorer.
//! Also the shared, hot-reloadable handle used by the batch scan.

use crate::config::ClassifierConfig;
use crate::noise::NoiseFilter;
use crate::normalize::NormalizedText;
use crate::ocr::is_ocr_error;
use crate::rules::RuleEngine;
use crate::scoring::{CategoryScore, FallbackOutcome, FallbackScorer};
use anyhow::anyhow;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

/// Category returned when nothing decides with enough confidence.
pub const UNASSIGNED: &str = "Unassigned";

pub const ENV_HOT_RELOAD: &str = "SORTER_HOT_RELOAD";

const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub category: String,
    /// Empty whenever `category` is [`UNASSIGNED`].
    pub matched_terms: Vec<String>,
}

impl Classification {
    pub fn unassigned() -> Self {
        Self {
            category: UNASSIGNED.to_string(),
            matched_terms: Vec::new(),
        }
    }

    pub fn is_unassigned(&self) -> bool {
        self.category == UNASSIGNED
    }
}

// Short, stable id for a text so debug logs never carry the raw OCR output.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn nonzero_scores(scores: &[CategoryScore]) -> Vec<String> {
    scores
        .iter()
        .filter(|s| s.score > 0 || s.penalty > 0)
        .map(|s| format!("{}={}(-{})", s.category, s.score, s.penalty))
        .collect()
}

/// Immutable, compiled classifier bundle.
#[derive(Debug, Clone)]
pub struct Classifier {
    version: String,
    categories: Vec<String>,
    noise: NoiseFilter,
    rules: RuleEngine,
    scorer: FallbackScorer,
}

impl Classifier {
    /// Compile and cross-check a parsed bundle.
    pub fn from_config(cfg: &ClassifierConfig) -> anyhow::Result<Self> {
        let mut known: HashSet<&str> = HashSet::new();
        for c in &cfg.categories {
            if c.name.trim().is_empty() {
                return Err(anyhow!("category with an empty name"));
            }
            if c.name == UNASSIGNED {
                return Err(anyhow!("`{}` is reserved and cannot be a category", UNASSIGNED));
            }
            if !known.insert(c.name.as_str()) {
                return Err(anyhow!("category `{}` is defined twice", c.name));
            }
        }
        let check = |what: &str, name: &str| -> anyhow::Result<()> {
            if known.contains(name) {
                Ok(())
            } else {
                Err(anyhow!("{} refers to unknown category `{}`", what, name))
            }
        };
        for r in &cfg.rules {
            check("rule", &r.category)?;
        }
        for h in &cfg.negative_hints {
            check("negative hint", &h.category)?;
        }
        if let Some(t) = &cfg.toy_context {
            check("toy_context", &t.category)?;
        }

        Ok(Self {
            version: cfg.version.clone(),
            categories: cfg.category_names(),
            noise: NoiseFilter::new(&cfg.noise.ui_vocabulary),
            rules: RuleEngine::from_sections(&cfg.rules, cfg.scoring.gap_window)?,
            scorer: FallbackScorer::from_config(cfg)?,
        })
    }

    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        Self::from_config(&ClassifierConfig::from_toml_str(toml_str)?)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        Self::from_config(&ClassifierConfig::from_path(path)?)
    }

    /// Bundle resolved from the environment (see [`ClassifierConfig::from_env`]).
    pub fn load() -> anyhow::Result<Self> {
        let cfg = ClassifierConfig::from_env()?;
        let c = Self::from_config(&cfg)?;
        info!(
            version = %c.version,
            categories = c.categories.len(),
            rules = c.rules.blocks().len(),
            "classifier loaded"
        );
        Ok(c)
    }

    pub fn builtin() -> anyhow::Result<Self> {
        Self::from_config(&ClassifierConfig::builtin()?)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Configured category names, in table order.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    pub fn scorer(&self) -> &FallbackScorer {
        &self.scorer
    }

    /// Resolve raw OCR text to exactly one category (or [`UNASSIGNED`]).
    ///
    /// Total over all inputs. `debug` only adds `info!` events under the
    /// `categorize` target; the result is the same either way.
    pub fn categorize(&self, raw_text: &str, debug: bool) -> Classification {
        // hashed only when something will be logged
        let id = debug.then(|| anon_hash(raw_text));
        if raw_text.trim().is_empty() || is_ocr_error(raw_text) {
            if let Some(id) = &id {
                info!(target: "categorize", %id, "empty text or ocr error");
            }
            return Classification::unassigned();
        }

        let filtered = self.noise.filter(raw_text);
        let text = NormalizedText::new(&filtered);
        if let Some(id) = &id {
            info!(
                target: "categorize",
                %id,
                tokens = text.tokens().len(),
                normalized = %preview(text.as_str(), PREVIEW_CHARS),
                "normalized"
            );
        }

        if let Some(hit) = self.rules.apply_rules(&text) {
            if let Some(id) = &id {
                info!(
                    target: "categorize",
                    %id,
                    category = %hit.category,
                    tier = %hit.tier,
                    rule = hit.rule_index,
                    matched = ?hit.terms,
                    "rule fired"
                );
            }
            return Classification {
                category: hit.category,
                matched_terms: hit.terms,
            };
        }

        if let Some(id) = &id {
            info!(target: "categorize", %id, "no rule fired, falling back to scoring");
        }
        let scores = self.scorer.score(&text);
        let outcome = self.scorer.resolve(&scores);
        if let Some(id) = &id {
            info!(
                target: "categorize",
                %id,
                outcome = outcome.label(),
                scores = ?nonzero_scores(&scores),
                "fallback scored"
            );
        }

        match outcome {
            FallbackOutcome::Assigned { top } => Classification {
                category: top.category,
                matched_terms: top.matched,
            },
            _ => Classification::unassigned(),
        }
    }
}

/// Cloneable handle over the current classifier; swapped atomically on reload.
#[derive(Clone)]
pub struct ClassifierHandle {
    inner: Arc<RwLock<Classifier>>,
}

impl ClassifierHandle {
    pub fn new(classifier: Classifier) -> Self {
        Self {
            inner: Arc::new(RwLock::new(classifier)),
        }
    }

    pub fn inner(&self) -> Arc<RwLock<Classifier>> {
        self.inner.clone()
    }

    pub fn categorize(&self, raw_text: &str, debug: bool) -> Classification {
        if let Ok(c) = self.inner.read() {
            c.categorize(raw_text, debug)
        } else {
            Classification::unassigned()
        }
    }

    pub fn categories(&self) -> Vec<String> {
        self.inner
            .read()
            .map(|c| c.categories().to_vec())
            .unwrap_or_default()
    }

    pub fn version(&self) -> String {
        self.inner
            .read()
            .map(|c| c.version().to_string())
            .unwrap_or_default()
    }

    /// Compile `path` and swap it in. On error the current classifier stays.
    pub fn reload_from_path(&self, path: &Path) -> anyhow::Result<()> {
        let next = Classifier::from_path(path)?;
        let mut guard = self
            .inner
            .write()
            .map_err(|_| anyhow!("classifier lock poisoned"))?;
        *guard = next;
        Ok(())
    }
}

fn hot_reload_enabled() -> bool {
    std::env::var(ENV_HOT_RELOAD)
        .ok()
        .map(|v| v == "1")
        .unwrap_or(false)
}

/// Poll `path` every 2s and reload `handle` when its mtime moves forward.
/// No-op unless `SORTER_HOT_RELOAD=1`.
pub fn start_hot_reload_thread(handle: ClassifierHandle, path: PathBuf) {
    if !hot_reload_enabled() {
        return;
    }
    info!(path = %path.display(), "classifier hot reload enabled");

    thread::spawn(move || {
        let poll = Duration::from_secs(2);
        let mut last_mtime: Option<SystemTime> = None;

        loop {
            if let Ok(mtime) = fs::metadata(&path).and_then(|m| m.modified()) {
                let changed = match last_mtime {
                    None => {
                        last_mtime = Some(mtime);
                        false
                    }
                    Some(prev) => mtime > prev,
                };
                if changed {
                    match handle.reload_from_path(&path) {
                        Ok(()) => info!(version = %handle.version(), "classifier reloaded"),
                        Err(e) => warn!(error = %e, "classifier reload failed, keeping previous"),
                    }
                    last_mtime = Some(mtime);
                }
            }
            thread::sleep(poll);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_TOML: &str = r#"
version = "test-1"

[noise]
ui_vocabulary = ["follow", "like", "instagram"]

[weights]
"podcast" = 5
"epizoda" = 5
"kniha" = 5
"day" = 1

[[rules]]
category = "Recepty"
kind = "tiered"
very_specific = ["thermomix"]
combinational = ["recept", "ingredience", "muffiny"]
contextual = ["mouka"]

[[rules]]
category = "Zahrada"
kind = "count"
min_hits = 1
triggers = ["hortenzie"]

[[categories]]
name = "Recepty"
keywords = ["recept"]

[[categories]]
name = "Zahrada"
keywords = ["hortenzie"]

[[categories]]
name = "Podcast"
keywords = ["podcast", "epizoda", "day"]

[[categories]]
name = "Knihy_Cetba"
keywords = ["kniha"]
"#;

    fn classifier() -> Classifier {
        Classifier::from_toml_str(TEST_TOML).expect("test config")
    }

    #[test]
    fn empty_and_sentinel_are_unassigned() {
        let c = classifier();
        for input in ["", "   \n", "[CHYBA: tesseract not found]", "!!! ???"] {
            let r = c.categorize(input, true);
            assert_eq!(r, Classification::unassigned(), "input {input:?}");
        }
    }

    #[test]
    fn rule_path_returns_literals() {
        let r = classifier().categorize("Skvělý RECEPT na muffiny", false);
        assert_eq!(r.category, "Recepty");
        assert_eq!(r.matched_terms, vec!["recept", "muffiny"]);
    }

    #[test]
    fn noise_is_removed_before_rules() {
        let r = classifier().categorize("Instagram 356K hortenzie follow", false);
        assert_eq!(r.category, "Zahrada");
        assert_eq!(r.matched_terms, vec!["hortenzie"]);
    }

    #[test]
    fn fallback_path_and_guards() {
        let c = classifier();
        let r = c.categorize("nová epizoda podcast", false);
        assert_eq!(r.category, "Podcast");
        assert_eq!(r.matched_terms, vec!["podcast", "epizoda"]);

        // weight 1 alone is under the floor
        assert!(c.categorize("good day", false).is_unassigned());
        // 5 vs 5
        assert!(c.categorize("podcast kniha", false).is_unassigned());
    }

    #[test]
    fn debug_flag_does_not_change_results() {
        let c = classifier();
        for input in ["recept muffiny", "podcast kniha", "epizoda podcast", "x"] {
            assert_eq!(c.categorize(input, true), c.categorize(input, false));
        }
    }

    struct CategorizeEvents(Arc<std::sync::atomic::AtomicUsize>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CategorizeEvents {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            if event.metadata().target() == "categorize" {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn trace_events_only_with_debug() {
        use tracing_subscriber::prelude::*;
        let c = classifier();
        let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let subscriber =
            tracing_subscriber::registry().with(CategorizeEvents(Arc::clone(&count)));
        tracing::subscriber::with_default(subscriber, || {
            c.categorize("recept muffiny", false);
            c.categorize("", false);
            assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 0);
            c.categorize("recept muffiny", true);
        });
        assert!(count.load(std::sync::atomic::Ordering::SeqCst) >= 2);
    }

    #[test]
    fn unknown_category_references_are_rejected() {
        let bad = r#"
[[rules]]
category = "Nope"
kind = "count"
triggers = ["x"]
[[categories]]
name = "A"
keywords = ["a"]
"#;
        let err = Classifier::from_toml_str(bad).unwrap_err().to_string();
        assert!(err.contains("unknown category `Nope`"), "{err}");

        let dup = r#"
[[categories]]
name = "A"
keywords = ["a"]
[[categories]]
name = "A"
keywords = ["b"]
"#;
        assert!(Classifier::from_toml_str(dup).is_err());

        let reserved = r#"
[[categories]]
name = "Unassigned"
keywords = ["a"]
"#;
        assert!(Classifier::from_toml_str(reserved).is_err());
    }

    #[test]
    fn anon_hash_is_short_and_stable() {
        let a = anon_hash("recept");
        assert_eq!(a.len(), 12);
        assert_eq!(a, anon_hash("recept"));
        assert_ne!(a, anon_hash("recepty"));
    }

    #[test]
    fn handle_reload_swaps_and_keeps_on_error() {
        let dir = std::env::temp_dir().join(format!(
            "sorter_handle_test_{}",
            SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bundle.toml");

        let handle = ClassifierHandle::new(classifier());
        assert_eq!(handle.version(), "test-1");

        fs::write(
            &path,
            "version = \"test-2\"\n[[categories]]\nname = \"Finance\"\nkeywords = [\"faktura\"]\n",
        )
        .unwrap();
        handle.reload_from_path(&path).expect("reload");
        assert_eq!(handle.version(), "test-2");
        assert_eq!(handle.categories(), vec!["Finance".to_string()]);
        assert_eq!(handle.categorize("faktura", false).category, "Finance");

        fs::write(&path, "this is = = not toml").unwrap();
        assert!(handle.reload_from_path(&path).is_err());
        assert_eq!(handle.version(), "test-2", "previous classifier kept");

        let _ = fs::remove_dir_all(&dir);
    }
}
