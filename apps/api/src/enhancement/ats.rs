//! ATS scoring: deterministic, rule-based quality score for résumé text.
//!
//! Pure function of (text, context). No I/O, no clock, no randomness.
//!
//! overall = 0.35·action_verbs + 0.25·metrics + 0.25·keyword_density + 0.15·formatting
//!
//! The weights and saturation points are carried over unchanged from the scoring
//! rules this service has always used. They are tunable, not validated optima.

use std::collections::{BTreeSet, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::enhancement::models::EnhanceContext;

pub const ACTION_VERBS: &[&str] = &[
    "achieved", "led", "managed", "developed", "created", "designed", "implemented",
    "improved", "increased", "decreased", "reduced", "optimized", "streamlined",
    "launched", "delivered", "built", "established", "initiated", "coordinated",
    "executed", "analyzed", "resolved", "transformed", "spearheaded", "drove",
    "accelerated", "generated", "negotiated", "collaborated", "mentored", "trained",
    "supervised", "directed", "architected", "engineered", "automated", "scaled",
];

pub const TECH_KEYWORDS: &[&str] = &[
    "python", "java", "javascript", "typescript", "react", "angular", "vue",
    "node", "sql", "mongodb", "postgresql", "aws", "azure", "gcp", "docker",
    "kubernetes", "ci/cd", "agile", "scrum", "git", "api", "rest", "graphql",
    "microservices", "machine learning", "ai", "data", "analytics", "cloud",
];

/// Scoring weights. Must sum to 1.0 so `overall` stays in [0, 1].
pub const WEIGHT_ACTION_VERBS: f64 = 0.35;
pub const WEIGHT_METRICS: f64 = 0.25;
pub const WEIGHT_KEYWORD_DENSITY: f64 = 0.25;
pub const WEIGHT_FORMATTING: f64 = 0.15;

/// Distinct matches at which each factor saturates to 1.0.
const ACTION_VERB_SATURATION: f64 = 8.0;
const METRIC_SATURATION: f64 = 5.0;
const KEYWORD_SATURATION: f64 = 6.0;

const MAX_LISTED: usize = 10;

static ACTION_VERB_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ACTION_VERBS.iter().copied().collect());

static TECH_KEYWORD_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| TECH_KEYWORDS.iter().copied().collect());

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w+\b").expect("valid word regex"));

/// Percentages, plain/suffixed numbers, currency amounts.
static METRIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\d+%|\b\d+[kKmMbB]?\b|\$\d+|\d+\+?").expect("valid metric regex")
});

static SENTENCE_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s+").expect("valid sentence regex"));

static EXCESSIVE_PUNCT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[!?]{2,}").expect("valid punctuation regex"));

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AtsFactors {
    pub action_verbs: f64,
    pub metrics: f64,
    pub keyword_density: f64,
    pub formatting: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AtsScore {
    /// 0.0 – 1.0
    pub score: f64,
    pub factors: AtsFactors,
    pub keywords_found: Vec<String>,
    pub action_verbs_found: Vec<String>,
}

/// Lowercased word tokens (alphanumeric runs).
fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    WORD_RE
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn capped_sorted(set: BTreeSet<String>) -> Vec<String> {
    set.into_iter().take(MAX_LISTED).collect()
}

/// Scores `text` on four factors and their weighted sum.
/// Empty or whitespace-only text scores 0 on everything.
pub fn score(text: &str, context: Option<&EnhanceContext>) -> AtsScore {
    if text.trim().is_empty() {
        return AtsScore::default();
    }

    let words = tokenize(text);
    let word_count = words.len();

    // Factor 1: distinct action verbs
    let verbs_found: BTreeSet<String> = words
        .iter()
        .filter(|w| ACTION_VERB_SET.contains(w.as_str()))
        .cloned()
        .collect();
    let action_verbs = (verbs_found.len() as f64 / ACTION_VERB_SATURATION).min(1.0);

    // Factor 2: metric occurrences (not distinct)
    let metric_count = METRIC_RE.find_iter(text).count();
    let metrics = (metric_count as f64 / METRIC_SATURATION).min(1.0);

    // Factor 3: tech keywords plus words from the target job title
    let job_title_words: HashSet<String> = context
        .and_then(|c| c.job_title.as_deref())
        .map(|title| tokenize(title).into_iter().collect())
        .unwrap_or_default();
    let keywords_found: BTreeSet<String> = words
        .iter()
        .filter(|w| TECH_KEYWORD_SET.contains(w.as_str()) || job_title_words.contains(*w))
        .cloned()
        .collect();
    let keyword_density = (keywords_found.len() as f64 / KEYWORD_SATURATION).min(1.0);

    let formatting = formatting_score(text, word_count);

    let overall = WEIGHT_ACTION_VERBS * action_verbs
        + WEIGHT_METRICS * metrics
        + WEIGHT_KEYWORD_DENSITY * keyword_density
        + WEIGHT_FORMATTING * formatting;

    AtsScore {
        score: round3(overall.clamp(0.0, 1.0)),
        factors: AtsFactors {
            action_verbs: round3(action_verbs),
            metrics: round3(metrics),
            keyword_density: round3(keyword_density),
            formatting: round3(formatting),
        },
        keywords_found: capped_sorted(keywords_found),
        action_verbs_found: capped_sorted(verbs_found),
    }
}

/// Capitalized sentences (≤0.5) + structure markers (0.3) + no shouting (0.2).
fn formatting_score(text: &str, word_count: usize) -> f64 {
    let mut formatting = 0.0;

    let sentences: Vec<&str> = SENTENCE_SPLIT_RE.split(text).collect();
    if !sentences.is_empty() {
        let capitalized = sentences
            .iter()
            .filter(|s| s.chars().next().is_some_and(char::is_uppercase))
            .count();
        formatting += (capitalized as f64 / sentences.len() as f64).min(0.5);
    }

    if text.contains('•') || text.contains('-') || text.contains('\n') {
        formatting += 0.3;
    }

    let shouting = EXCESSIVE_PUNCT_RE.find_iter(text).count();
    if (shouting as f64 / word_count.max(1) as f64) < 0.01 {
        formatting += 0.2;
    }

    f64::min(formatting, 1.0)
}

/// Verbs and keywords that appear in `after` but not in `before`, sorted, at most 10.
pub fn compute_keywords_added(before: &str, after: &str) -> Vec<String> {
    let before_words: HashSet<String> = tokenize(before).into_iter().collect();
    let added: BTreeSet<String> = tokenize(after)
        .into_iter()
        .filter(|w| !before_words.contains(w))
        .filter(|w| ACTION_VERB_SET.contains(w.as_str()) || TECH_KEYWORD_SET.contains(w.as_str()))
        .collect();
    capped_sorted(added)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEAK: &str = "I worked on software projects and helped the team.";
    const STRONG: &str =
        "Led development of microservices serving 1M+ users, improving performance by 40%.";

    fn assert_bounded(s: &AtsScore) {
        for v in [
            s.score,
            s.factors.action_verbs,
            s.factors.metrics,
            s.factors.keyword_density,
            s.factors.formatting,
        ] {
            assert!((0.0..=1.0).contains(&v), "value out of range: {v}");
        }
    }

    #[test]
    fn test_empty_text_scores_zero() {
        for text in ["", "   ", "\n\t"] {
            let s = score(text, None);
            assert_eq!(s.score, 0.0);
            assert_eq!(s.factors, AtsFactors::default());
            assert!(s.keywords_found.is_empty());
            assert!(s.action_verbs_found.is_empty());
        }
    }

    #[test]
    fn test_weak_text_has_no_action_verbs() {
        let s = score(WEAK, None);
        assert_eq!(s.factors.action_verbs, 0.0);
        assert_eq!(s.factors.metrics, 0.0);
        assert_eq!(s.factors.keyword_density, 0.0);
        // 0.5 capitalized + 0.2 clean punctuation
        assert_eq!(s.factors.formatting, 0.7);
        assert_eq!(s.score, 0.105);
    }

    #[test]
    fn test_strong_text_scores_higher_than_weak() {
        let weak = score(WEAK, None);
        let strong = score(STRONG, None);

        assert!(strong.factors.action_verbs > 0.0);
        assert_eq!(strong.action_verbs_found, vec!["led".to_string()]);
        assert!(strong.factors.metrics > 0.0);
        assert_eq!(strong.factors.metrics, 0.4); // "1M", "40%"
        assert_eq!(strong.keywords_found, vec!["microservices".to_string()]);
        assert!(strong.score > weak.score);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let ctx = EnhanceContext {
            job_title: Some("Data Engineer".to_string()),
            ..Default::default()
        };
        let a = score(STRONG, Some(&ctx));
        let b = score(STRONG, Some(&ctx));
        assert_eq!(a, b);
    }

    #[test]
    fn test_job_title_words_count_as_keywords() {
        let text = "Platform engineer owning the payments platform";
        let without = score(text, None);
        let ctx = EnhanceContext {
            job_title: Some("Platform Engineer".to_string()),
            ..Default::default()
        };
        let with = score(text, Some(&ctx));
        assert_eq!(without.factors.keyword_density, 0.0);
        assert_eq!(with.keywords_found, vec!["engineer", "platform"]);
        assert!(with.score > without.score);
    }

    #[test]
    fn test_factors_saturate_at_one() {
        let text = "Achieved, led, managed, developed, created, designed, implemented, \
                    improved and scaled python java react docker aws kubernetes sql \
                    by 10% 20% 30% 40% 50% 60%.\n- bullet";
        let s = score(text, None);
        assert_eq!(s.factors.action_verbs, 1.0);
        assert_eq!(s.factors.metrics, 1.0);
        assert_eq!(s.factors.keyword_density, 1.0);
        assert_eq!(s.action_verbs_found.len(), 9);
        assert!(s.keywords_found.len() <= 10);
        assert_bounded(&s);
    }

    #[test]
    fn test_found_lists_are_capped_at_ten() {
        let text = ACTION_VERBS.join(" ");
        let s = score(&text, None);
        assert_eq!(s.action_verbs_found.len(), 10);
        let mut sorted = s.action_verbs_found.clone();
        sorted.sort();
        assert_eq!(sorted, s.action_verbs_found);
    }

    #[test]
    fn test_excessive_punctuation_loses_bonus() {
        let calm = score("Shipped it. Great result", None);
        let loud = score("Shipped it!! Great result??", None);
        assert!(loud.factors.formatting < calm.factors.formatting);
    }

    #[test]
    fn test_bullets_add_structure_bonus() {
        let flat = score("Built pipelines. Shipped dashboards", None);
        let bulleted = score("Built pipelines\nShipped dashboards", None);
        assert!((bulleted.factors.formatting - flat.factors.formatting - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_scores_bounded_for_arbitrary_text() {
        let samples = [
            "!!!!????",
            "1 2 3 4 5 6 7 8 9 10 11 12 $5 $6 %%%",
            "ünïcödé text with ÄÖÜ and 東京",
            "a",
            "\n\n\n- - -",
        ];
        for text in samples {
            assert_bounded(&score(text, None));
        }
    }

    #[test]
    fn test_keywords_added_only_new_targets() {
        let added = compute_keywords_added(
            "I worked on software projects and helped the team.",
            "Led and automated Python data pipelines; led the team.",
        );
        assert_eq!(added, vec!["automated", "data", "led", "python"]);
    }

    #[test]
    fn test_keywords_added_is_subset_of_new_words() {
        let before = "Built docker images and led releases";
        let after = "Built docker images, led releases, scaled kubernetes and mentored juniors";
        let added = compute_keywords_added(before, after);
        let before_words: HashSet<String> = tokenize(before).into_iter().collect();
        let after_words: HashSet<String> = tokenize(after).into_iter().collect();
        for word in &added {
            assert!(after_words.contains(word));
            assert!(!before_words.contains(word));
        }
        assert_eq!(added, vec!["kubernetes", "mentored", "scaled"]);
    }

    #[test]
    fn test_keywords_added_capped_at_ten() {
        let after = format!("{} {}", ACTION_VERBS.join(" "), TECH_KEYWORDS.join(" "));
        assert_eq!(compute_keywords_added("", &after).len(), 10);
    }
}
