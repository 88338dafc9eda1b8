//! PII anonymization: irreversible token substitution before any agent call.
//!
//! Detectors run in a fixed order, each over the output of the previous one, so a
//! token written by an earlier detector is never re-matched by a later one.
//! Passes repeat until the text stops changing: a substitution can open a word
//! boundary that exposes a span an earlier detector skipped (`5551234www.x.io`).
//! The returned mapping is audit-only. Nothing in the pipeline reads it back.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

pub static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[\w.%+-]+@[\w.-]+\.[A-Za-z]{2,6}\b").expect("valid email regex")
});

pub static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:\+\d{1,3}[\s-]?)?(?:\(\d{2,4}\)[\s-]?)?\d{3,4}[\s-]?\d{3,4}\b")
        .expect("valid phone regex")
});

pub static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+|www\.\S+").expect("valid url regex"));

/// Leading house number, some words, then a street-type token.
pub static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b\d+\s+[^\n,]+\b(?:street|st\.|avenue|ave\.|road|rd\.|boulevard|blvd\.|lane|ln\.|drive|dr\.)\b",
    )
    .expect("valid address regex")
});

/// Two or three consecutive capitalized words.
pub static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([A-Z][a-z]{1,}\s+[A-Z][a-z]{1,})(?:\s+[A-Z][a-z]{1,})?\b")
        .expect("valid name regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PiiKind {
    Email,
    Phone,
    Url,
    Address,
    Name,
}

impl PiiKind {
    /// Detection order. Changing it changes what gets tokenized.
    pub const ORDERED: [PiiKind; 5] = [
        PiiKind::Email,
        PiiKind::Phone,
        PiiKind::Url,
        PiiKind::Address,
        PiiKind::Name,
    ];

    /// Contact details only; used for short free-form fields such as job
    /// titles, where the name detector would eat ordinary capitalized words.
    pub const CONTACT: [PiiKind; 4] = [
        PiiKind::Email,
        PiiKind::Phone,
        PiiKind::Url,
        PiiKind::Address,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            PiiKind::Email => "[EMAIL]",
            PiiKind::Phone => "[PHONE]",
            PiiKind::Url => "[URL]",
            PiiKind::Address => "[ADDRESS]",
            PiiKind::Name => "[NAME]",
        }
    }

    pub fn pattern(&self) -> &'static Regex {
        match self {
            PiiKind::Email => &EMAIL_RE,
            PiiKind::Phone => &PHONE_RE,
            PiiKind::Url => &URL_RE,
            PiiKind::Address => &ADDRESS_RE,
            PiiKind::Name => &NAME_RE,
        }
    }
}

/// Text with PII replaced by class tokens, plus token → originals seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnonymizedText {
    pub text: String,
    pub mapping: BTreeMap<String, BTreeSet<String>>,
}

impl AnonymizedText {
    pub fn found_pii(&self) -> bool {
        !self.mapping.is_empty()
    }
}

/// Upper bound on detector rounds. Every substitution removes the digits,
/// `@`, URL prefix or capitalized words it matched, so real input settles in
/// two or three rounds.
const MAX_ROUNDS: usize = 16;

/// Replaces every detected PII span with its class token. Never fails; text
/// without PII comes back unchanged with an empty mapping.
pub fn anonymize(text: &str) -> AnonymizedText {
    anonymize_with(text, &PiiKind::ORDERED)
}

/// Runs `kinds` in order, repeating the whole sequence until a round changes
/// nothing, so the output holds no span any of `kinds` can match.
pub fn anonymize_with(text: &str, kinds: &[PiiKind]) -> AnonymizedText {
    let mut mapping: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut current = text.to_string();

    for _ in 0..MAX_ROUNDS {
        let mut changed = false;
        for kind in kinds {
            let token = kind.token();
            let replaced = kind.pattern().replace_all(&current, |caps: &Captures| {
                mapping
                    .entry(token.to_string())
                    .or_default()
                    .insert(caps[0].to_string());
                token.to_string()
            });
            if let Cow::Owned(replaced) = replaced {
                current = replaced;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    AnonymizedText {
        text: current,
        mapping,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_no_pii_returns_text_unchanged() {
        let input = "designed caching for the payments platform";
        let out = anonymize(input);
        assert_eq!(out.text, input);
        assert!(out.mapping.is_empty());
        assert!(!out.found_pii());
    }

    #[test]
    fn test_email_is_tokenized_and_recorded() {
        let out = anonymize("reach me at jane.doe@example.com for details");
        assert_eq!(out.text, "reach me at [EMAIL] for details");
        assert!(out.mapping["[EMAIL]"].contains("jane.doe@example.com"));
    }

    #[test]
    fn test_phone_is_tokenized() {
        let out = anonymize("call 555-1234 today");
        assert_eq!(out.text, "call [PHONE] today");
        assert!(out.mapping["[PHONE]"].contains("555-1234"));
    }

    #[test]
    fn test_urls_are_tokenized() {
        let out = anonymize("portfolio: https://github.com/janedoe and www.janedoe.dev");
        assert_eq!(out.text, "portfolio: [URL] and [URL]");
        assert_eq!(out.mapping["[URL]"].len(), 2);
    }

    #[test]
    fn test_address_is_tokenized() {
        let out = anonymize("lives at 221 Baker Street, near the park");
        assert_eq!(out.text, "lives at [ADDRESS], near the park");
    }

    #[test]
    fn test_name_is_tokenized() {
        let out = anonymize("references: Jane Smith on request");
        assert_eq!(out.text, "references: [NAME] on request");
        assert!(out.mapping["[NAME]"].contains("Jane Smith"));
    }

    #[test]
    fn test_repeated_values_are_deduplicated_in_mapping() {
        let out = anonymize("a@b.io wrote to a@b.io and c@d.io");
        assert_eq!(out.text, "[EMAIL] wrote to [EMAIL] and [EMAIL]");
        assert_eq!(out.mapping["[EMAIL]"].len(), 2);
    }

    #[test]
    fn test_email_is_not_reclassified_as_url_or_name() {
        let out = anonymize("mail Jane.Doe@Corp.com");
        assert_eq!(out.text, "mail [EMAIL]");
        assert!(!out.mapping.contains_key("[NAME]"));
    }

    #[test]
    fn test_output_has_no_remaining_matches() {
        let inputs = [
            "jane.doe@example.com, call 555-1234, see https://jane.dev",
            "Contact: bob@mail.org / www.bob.io / 020 7946",
            "Jane Smith, 10 Downing Street, jane@gov.uk",
        ];
        for input in inputs {
            let out = anonymize(input);
            for kind in [PiiKind::Email, PiiKind::Phone, PiiKind::Url] {
                assert!(
                    !kind.pattern().is_match(&out.text),
                    "{:?} still matches in {:?}",
                    kind,
                    out.text
                );
            }
        }
    }

    #[test]
    fn test_phone_glued_to_url_is_caught_after_url_pass() {
        let out = anonymize("call 555 1234www.jane.dev");
        assert_eq!(out.text, "call [PHONE][URL]");
        assert!(!PHONE_RE.is_match(&out.text));
        assert!(out.mapping["[PHONE]"].contains("555 1234"));

        let out = anonymize("5551234www.x.io-Ann-Doe+44");
        assert_eq!(out.text, "[PHONE][URL]");
        assert!(anonymize(&out.text).mapping.is_empty());
    }

    #[test]
    fn test_contact_kinds_keep_capitalized_words() {
        let out = anonymize_with("Staff Engineer, ping a@b.io", &PiiKind::CONTACT);
        assert_eq!(out.text, "Staff Engineer, ping [EMAIL]");
        assert!(!out.mapping.contains_key("[NAME]"));
    }

    #[test]
    fn test_reapplication_is_idempotent() {
        let once = anonymize("Jane Smith <jane@x.com> 555-1234 https://x.com/jane");
        let twice = anonymize(&once.text);
        assert_eq!(twice.text, once.text);
        assert!(twice.mapping.is_empty());
    }

    fn fragment() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec![
            "555", "1234", "020 7946", "+44", "www.", "https://", "x.io", ".dev", "@", "a@b.io",
            "jane", "Ann", "Doe", "Smith", "12", "Main", "Street", "-", " ", ", ", "\n",
        ])
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn prop_output_is_a_fixed_point(parts in prop::collection::vec(fragment(), 0..14)) {
            let input = parts.concat();
            let once = anonymize(&input);
            let twice = anonymize(&once.text);
            prop_assert_eq!(&twice.text, &once.text);
            prop_assert!(twice.mapping.is_empty());
            for kind in PiiKind::ORDERED {
                prop_assert!(!kind.pattern().is_match(&once.text), "{:?} in {:?}", kind, once.text);
            }
        }
    }
}
