//! Plain text normalizer: lowercases, strips punctuation, and collapses
//! whitespace so synthesized speech and matching both see the same shape of
//! text regardless of how the recognizer punctuated it.

use anyhow::Result;
use lyra_core::{Engine, Extension, Manifest, Normalizer};
use std::sync::Arc;

pub struct PlainNormalizerUnit;

struct PlainNormalizer;

pub(crate) fn normalize_text(text: &str) -> String {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Normalizer for PlainNormalizer {
    fn normalize(&self, _engine: &Engine, text: &str) -> Result<String> {
        Ok(normalize_text(text))
    }
}

impl Extension for PlainNormalizerUnit {
    fn start(&mut self, _engine: &mut Engine) -> Result<Manifest> {
        let mut manifest = Manifest::named("Plain normalizer");
        manifest
            .normalizers
            .insert("plain".to_string(), Arc::new(PlainNormalizer));
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_and_case_are_flattened() {
        assert_eq!(normalize_text("Hello, Lyra!"), "hello lyra");
    }

    #[test]
    fn whitespace_runs_collapse() {
        assert_eq!(normalize_text("  set   timer\t5 minutes "), "set timer 5 minutes");
    }
}
