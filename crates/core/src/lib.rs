//! Lyra Core — Command & Dialog Dispatch Engine
//!
//! An extensible assistant runtime: extensions contribute command subtrees
//! and engine bindings through manifests, utterances are resolved against the
//! merged tree with exact, prefix, and pluggable fuzzy matching, and a single
//! dialog context with a time-to-live carries multi-turn exchanges. Timers
//! are a fixed slot bank polled by the host's own loop.

pub mod clock;
pub mod command;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod extension;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod speech;
pub mod timers;

pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{Action, CommandNode, CommandTree, CompositeKey, leaf, leaf_with, tree};
pub use config::{Config, ConfigError};
pub use engine::Engine;
pub use extension::{Extension, ExtensionCatalog};
pub use manifest::{
    FuzzyMatch, FuzzyProcessor, Manifest, Normalizer, PlaybackEngine, TtsEngine, TtsError,
};
pub use speech::{OutputMode, SpeechReply};
pub use timers::SLOT_COUNT;
