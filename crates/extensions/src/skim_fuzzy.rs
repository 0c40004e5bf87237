//! Fuzzy command matching backed by the skim matcher.
//!
//! Scores every synonym of every key against the utterance and reports the
//! best, with the raw score normalized against the synonym's self-match score
//! so confidence lands in `[0, 1]` regardless of phrase length. With
//! remainders allowed, word-boundary prefixes of the utterance are tried too,
//! so "timer stop the oven" can match a "timer" subtree and carry "stop the
//! oven" into it.

use anyhow::Result;
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use lyra_core::{
    CommandTree, Engine, Extension, FuzzyMatch, FuzzyProcessor, Manifest,
};
use tracing::trace;

pub struct SkimFuzzyUnit;

struct SkimFuzzy {
    matcher: SkimMatcherV2,
}

impl SkimFuzzy {
    fn new() -> Self {
        Self {
            matcher: SkimMatcherV2::default().ignore_case(),
        }
    }

    /// Confidence of `candidate` against one synonym phrase, normalized by
    /// the synonym's self-match score. The candidate is the pattern matched
    /// into the synonym, so a dropped letter in the utterance still scores.
    fn confidence(&self, candidate: &str, synonym: &str) -> Option<f32> {
        let ceiling = self.matcher.fuzzy_match(synonym, synonym)?;
        if ceiling <= 0 {
            return None;
        }
        let score = self.matcher.fuzzy_match(synonym, candidate)?;
        Some((score as f32 / ceiling as f32).clamp(0.0, 1.0))
    }
}

impl FuzzyProcessor for SkimFuzzy {
    fn compare(
        &self,
        _engine: &Engine,
        utterance: &str,
        tree: &CommandTree,
        allow_remainder: bool,
    ) -> Result<Option<FuzzyMatch>> {
        let words: Vec<&str> = utterance.split_whitespace().collect();
        if words.is_empty() {
            return Ok(None);
        }

        let mut best: Option<FuzzyMatch> = None;
        for key in tree.keys() {
            for synonym in key.synonyms() {
                // The whole utterance first, then shorter word prefixes with
                // the cut-off tail as remainder.
                let splits = if allow_remainder { words.len() } else { 1 };
                for taken in (words.len() - splits + 1..=words.len()).rev() {
                    let candidate = words[..taken].join(" ");
                    let Some(confidence) = self.confidence(&candidate, synonym) else {
                        continue;
                    };
                    trace!(candidate, synonym, confidence, "fuzzy candidate");
                    if best.as_ref().is_none_or(|b| confidence > b.confidence) {
                        best = Some(FuzzyMatch {
                            key: key.clone(),
                            confidence,
                            remainder: words[taken..].join(" "),
                        });
                    }
                }
            }
        }
        Ok(best)
    }
}

impl Extension for SkimFuzzyUnit {
    fn start(&mut self, _engine: &mut Engine) -> Result<Manifest> {
        let mut manifest = Manifest::named("Skim fuzzy matching");
        manifest
            .fuzzy
            .push(("skim".to_string(), std::sync::Arc::new(SkimFuzzy::new())));
        Ok(manifest)
    }
}
