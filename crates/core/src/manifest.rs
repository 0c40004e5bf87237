//! Extension Manifest and Capability Contracts
//!
//! An extension describes everything it contributes through a [`Manifest`]:
//! a command subtree plus engine bindings for speech synthesis, playback,
//! text normalization, and fuzzy command matching. The traits here are the
//! contracts those bindings must satisfy; the engine only ever talks to them
//! as trait objects pulled from the merged registry.

use crate::command::{CommandTree, CompositeKey};
use crate::engine::Engine;
use anyhow::Result;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Everything a single extension contributes to the runtime.
///
/// All categories are optional; an extension that only registers a TTS engine
/// simply leaves the rest at their defaults.
#[derive(Default, Clone)]
pub struct Manifest {
    /// Human-readable extension title, used in logs only.
    pub name: String,
    /// Extension-private options. Defaults declared here are merged with any
    /// persisted overrides before `start_with_options` runs.
    pub options: Map<String, Value>,
    /// Command subtree to merge into the global command tree.
    pub commands: CommandTree,
    /// Speech synthesis engines, keyed by engine id.
    pub tts: HashMap<String, Arc<dyn TtsEngine>>,
    /// WAV playback engines, keyed by engine id.
    pub playback: HashMap<String, Arc<dyn PlaybackEngine>>,
    /// Text normalizers, keyed by engine id.
    pub normalizers: HashMap<String, Arc<dyn Normalizer>>,
    /// Fuzzy processors in consultation order. Order matters: the dispatcher
    /// accepts the first processor that clears the confidence threshold.
    pub fuzzy: Vec<(String, Arc<dyn FuzzyProcessor>)>,
}

impl Manifest {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Failure modes of a speech synthesis engine.
#[derive(Debug, thiserror::Error)]
pub enum TtsError {
    /// The engine does not implement this capability. `say` falling back to
    /// `to_wav` plus playback relies on this variant; it is a capability
    /// signal, not a failure.
    #[error("operation not supported by this TTS engine")]
    Unsupported,
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// A speech synthesis engine contributed through a manifest.
///
/// Engines implement at least one of [`say`](TtsEngine::say) and
/// [`to_wav`](TtsEngine::to_wav). When direct `say` is unsupported the core
/// renders to a WAV file and routes it through the playback engine.
pub trait TtsEngine: Send + Sync {
    /// One-time setup, run when the engine is selected at voice init.
    fn init(&self, engine: &mut Engine) -> Result<()> {
        let _ = engine;
        Ok(())
    }

    /// Speaks the text directly.
    fn say(&self, engine: &mut Engine, text: &str) -> Result<(), TtsError> {
        let _ = (engine, text);
        Err(TtsError::Unsupported)
    }

    /// Renders the text into a WAV file at `out`.
    fn to_wav(&self, engine: &mut Engine, text: &str, out: &Path) -> Result<(), TtsError> {
        let _ = (engine, text, out);
        Err(TtsError::Unsupported)
    }
}

/// A WAV playback engine contributed through a manifest.
pub trait PlaybackEngine: Send + Sync {
    fn init(&self, engine: &mut Engine) -> Result<()> {
        let _ = engine;
        Ok(())
    }

    /// Plays the WAV file at `path`, blocking until done.
    fn play(&self, engine: &mut Engine, path: &Path) -> Result<()>;
}

/// A text normalizer preparing raw text for synthesis.
pub trait Normalizer: Send + Sync {
    fn init(&self, engine: &mut Engine) -> Result<()> {
        let _ = engine;
        Ok(())
    }

    fn normalize(&self, engine: &Engine, text: &str) -> Result<String>;
}

/// A successful fuzzy comparison against one interior tree level.
#[derive(Debug, Clone, PartialEq)]
pub struct FuzzyMatch {
    /// The composite key of the matched node.
    pub key: CompositeKey,
    /// Similarity confidence in `[0, 1]`.
    pub confidence: f32,
    /// Unconsumed tail of the utterance, empty when fully consumed.
    pub remainder: String,
}

/// A pluggable similarity matcher consulted after exact and prefix matching
/// fail.
///
/// Newer processors override [`compare`](FuzzyProcessor::compare) and honor
/// `allow_remainder`. Processors written before remainder splitting existed
/// override only [`compare_basic`](FuzzyProcessor::compare_basic); the default
/// `compare` body forwards to it, so both generations are called through one
/// entry point.
pub trait FuzzyProcessor: Send + Sync {
    /// One-time setup, run once after all extensions have loaded.
    fn init(&self, engine: &mut Engine) -> Result<()> {
        let _ = engine;
        Ok(())
    }

    /// Compares `utterance` against the keys of `tree`, returning `Ok(None)`
    /// when nothing resembles the utterance closely enough to report.
    fn compare(
        &self,
        engine: &Engine,
        utterance: &str,
        tree: &CommandTree,
        allow_remainder: bool,
    ) -> Result<Option<FuzzyMatch>> {
        let _ = allow_remainder;
        self.compare_basic(engine, utterance, tree)
    }

    /// Remainder-unaware comparison kept for processors predating the
    /// `allow_remainder` flag.
    fn compare_basic(
        &self,
        engine: &Engine,
        utterance: &str,
        tree: &CommandTree,
    ) -> Result<Option<FuzzyMatch>> {
        let _ = (engine, utterance, tree);
        Ok(None)
    }
}
