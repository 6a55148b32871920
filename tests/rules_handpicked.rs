// tests/rules_handpicked.rs
// Hand-picked tests for rule priority and fallback policy.
// Self-contained: every test builds its classifier from an inline TOML bundle.

use screenshot_sorter::classifier::{Classifier, UNASSIGNED};
use screenshot_sorter::config::ClassifierConfig;
use screenshot_sorter::normalize::NormalizedText;
use screenshot_sorter::scoring::FallbackOutcome;

const TEST_TOML: &str = r#"
version = "handpicked"

[scoring]
confidence_floor = 3
min_margin = 2
negative_hint_penalty = 2

[noise]
ui_vocabulary = ["follow", "like"]

[weights]
"jira" = 10
"api" = 10
"garden" = 5
"hortenzie" = 5
"mikina" = 5
"style" = 1
"velikost" = 3
"lego" = 10

[toy_context]
category = "Obleceni_Styl"
keywords = ["lego", "puzzle"]
skipped_keywords = ["velikost", "cm"]

[[negative_hints]]
category = "IT_Prace"
patterns = ['\bgarden\b', '\bzahrad', '\bflower\b']

# A: very specific
[[rules]]
category = "Recepty"
kind = "tiered"
very_specific = ["thermomix"]
combinational = ["recept", "ingredience"]
contextual = ["mouka"]

# B: combinational
[[rules]]
category = "IT_Prace"
kind = "tiered"
very_specific = ["postman"]
combinational = ["sprint", "ticket", "backlog"]
contextual = ["team"]

[[categories]]
name = "Recepty"
keywords = ["recept"]

[[categories]]
name = "IT_Prace"
keywords = ["jira", "api", "bug"]

[[categories]]
name = "Zahrada"
keywords = ["garden", "hortenzie"]

[[categories]]
name = "Obleceni_Styl"
keywords = ["mikina", "velikost", "cm", "style"]

[[categories]]
name = "Deti_Aktivity"
keywords = ["lego", "stavebnice"]
"#;

fn classifier() -> Classifier {
    Classifier::from_toml_str(TEST_TOML).expect("test config")
}

#[test]
fn earlier_block_wins_even_when_later_block_also_fires() {
    // satisfies A (very specific) and B (two combinational)
    let r = classifier().categorize("thermomix sprint ticket", false);
    assert_eq!(r.category, "Recepty");
    assert_eq!(r.matched_terms, vec!["thermomix"]);
}

#[test]
fn swapping_rule_order_swaps_the_winner() {
    let mut cfg = ClassifierConfig::from_toml_str(TEST_TOML).unwrap();
    cfg.rules.swap(0, 1);
    let c = Classifier::from_config(&cfg).unwrap();
    let r = c.categorize("thermomix sprint ticket", false);
    assert_eq!(r.category, "IT_Prace");
    assert_eq!(r.matched_terms, vec!["sprint", "ticket"]);
}

#[test]
fn combinational_with_context() {
    let r = classifier().categorize("new ticket for the team", false);
    assert_eq!(r.category, "IT_Prace");
    assert_eq!(r.matched_terms, vec!["ticket", "team"]);
}

#[test]
fn one_combinational_alone_falls_through_to_scoring() {
    // "recept" alone: no rule, fallback Recepty = 3, runner-up 0
    let r = classifier().categorize("recept", false);
    assert_eq!(r.category, "Recepty");
    assert_eq!(r.matched_terms, vec!["recept"]);
}

#[test]
fn ambiguity_guard() {
    // Zahrada: hortenzie 5 vs Obleceni: mikina 5
    let r = classifier().categorize("hortenzie mikina", false);
    assert_eq!(r.category, UNASSIGNED);
    assert!(r.matched_terms.is_empty());
}

#[test]
fn confidence_floor() {
    let r = classifier().categorize("style", false);
    assert_eq!(r.category, UNASSIGNED);

    let c = classifier();
    let out = c.scorer().score_and_resolve(&NormalizedText::new("style"));
    assert!(matches!(out, FallbackOutcome::BelowFloor { .. }), "{out:?}");
}

#[test]
fn toy_context_blocks_sizes_but_not_other_clothing_words() {
    let c = classifier();
    // lego scores Deti_Aktivity 10; velikost is ignored for clothing
    let r = c.categorize("lego velikost", false);
    assert_eq!(r.category, "Deti_Aktivity");

    let scores = c.scorer().score(&NormalizedText::new("lego velikost"));
    let cloth = scores.iter().find(|s| s.category == "Obleceni_Styl").unwrap();
    assert_eq!(cloth.score, 0);

    // without toy context the same size word counts
    let scores = c.scorer().score(&NormalizedText::new("velikost"));
    let cloth = scores.iter().find(|s| s.category == "Obleceni_Styl").unwrap();
    assert_eq!(cloth.score, 3);

    // clothing can still win through non-size keywords
    let scores = c.scorer().score(&NormalizedText::new("puzzle mikina velikost cm"));
    let cloth = scores.iter().find(|s| s.category == "Obleceni_Styl").unwrap();
    assert_eq!(cloth.score, 5);
    let r = c.categorize("puzzle mikina velikost cm", false);
    assert_eq!(r.category, "Obleceni_Styl");
    assert_eq!(r.matched_terms, vec!["mikina"]);
}

#[test]
fn negative_hints_can_flip_the_winner() {
    let c = classifier();
    // IT: api 10 minus 3 hints * 2 = 4, Zahrada: garden 5, margin 1
    let r = c.categorize("api garden flower zahrada", false);
    assert_eq!(r.category, UNASSIGNED);

    // one hint: IT 8, Zahrada 5
    let r = c.categorize("api garden", false);
    assert_eq!(r.category, "IT_Prace");
    assert_eq!(r.matched_terms, vec!["api"]);
}

#[test]
fn ui_noise_never_reaches_the_rules() {
    let r = classifier().categorize("follow 10,2k like sprint ticket", false);
    assert_eq!(r.category, "IT_Prace");
    assert_eq!(r.matched_terms, vec!["sprint", "ticket"]);
}

#[test]
fn phrase_only_category_never_wins_the_fallback() {
    let c = Classifier::from_toml_str(
        r#"
[[categories]]
name = "Code"
keywords = ["code review", "pull request"]
"#,
    )
    .unwrap();
    let r = c.categorize("code review of a pull request", false);
    assert_eq!(r.category, UNASSIGNED);
    let out = c.scorer().score_and_resolve(&NormalizedText::new("code review"));
    assert_eq!(out, FallbackOutcome::NoMatch);
}
