//! Candidate filter: decides whether a search result really contains a
//! rule's misspelling and is worth acting on.
//!
//! Checks run cheapest first:
//! 1. Whole-token match of the search term (no substring hits)
//! 2. Self-mention exclusion (never answer our own handle)
//! 3. Language gate via the injected classifier (fails closed)

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::debug;

use crate::lang::LanguageClassifier;
use crate::pipeline::types::{Rule, SearchCandidate};

/// Separators between tokens: space, common and inverted punctuation,
/// newline, tab, hyphen.
static TOKEN_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ .,?!¡¿\n\t\-]+").unwrap());

/// Split lower-cased text into tokens, dropping empty ones.
pub fn tokenize(text: &str) -> Vec<&str> {
    TOKEN_SEPARATORS
        .split(text)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Pure predicate over (candidate, rule).
pub struct CandidateFilter {
    bot_handle: String,
    classifier: Arc<dyn LanguageClassifier>,
}

impl CandidateFilter {
    /// `bot_handle` may be given with or without the leading `@`.
    pub fn new(bot_handle: &str, classifier: Arc<dyn LanguageClassifier>) -> Self {
        Self {
            bot_handle: bot_handle.trim_start_matches('@').to_lowercase(),
            classifier,
        }
    }

    /// True only if every check passes.
    pub fn matches(&self, candidate: &SearchCandidate, rule: &Rule) -> bool {
        let text_lower = candidate.text.to_lowercase();
        let term = rule.search_term.to_lowercase();

        if !tokenize(&text_lower).contains(&term.as_str()) {
            return false;
        }

        if !self.bot_handle.is_empty() && text_lower.contains(&self.bot_handle) {
            debug!(candidate = %candidate.id, "Skipping status that mentions the bot");
            return false;
        }

        match self.classifier.classify(&candidate.text) {
            Ok(label) if label.language == rule.language => true,
            Ok(label) => {
                debug!(
                    candidate = %candidate.id,
                    detected = %label.language,
                    expected = %rule.language,
                    "Language mismatch"
                );
                false
            }
            Err(e) => {
                debug!(candidate = %candidate.id, error = %e, "Classifier failed, treating as non-match");
                false
            }
        }
    }
}
