//! The Assistant Engine
//!
//! `Engine` is the single runtime object everything hangs off: the merged
//! capability registry, the timer bank, the dialog slot, and the voice
//! output state. Command handlers, timer callbacks, and engine bindings all
//! receive `&mut Engine`, which is also why dispatch and callback invocation
//! run synchronously on whichever thread calls in — the engine has no thread
//! pool of its own.

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::context::DialogSlot;
use crate::extension::ExtensionCatalog;
use crate::registry::Registry;
use crate::speech::SpeechState;
use crate::timers::TimerBank;
use std::sync::Arc;
use tracing::{error, info};

pub struct Engine {
    pub config: Config,
    pub(crate) registry: Registry,
    pub(crate) timers: TimerBank,
    pub(crate) dialog: DialogSlot,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) speech: SpeechState,
    pub(crate) input_cmd_full: String,
    pub(crate) cur_wake_word: String,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Builds an engine around an explicit time source; tests drive timers
    /// through a [`crate::clock::ManualClock`] this way.
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            registry: Registry::default(),
            timers: TimerBank::default(),
            dialog: DialogSlot::default(),
            clock,
            speech: SpeechState::default(),
            input_cmd_full: String::new(),
            cur_wake_word: String::new(),
        }
    }

    /// Read access to the merged capability registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Loads all extensions and brings up the voice engines. The usual
    /// one-call startup for hosts.
    pub fn init_with_extensions(&mut self, catalog: &ExtensionCatalog, priority: &[&str]) {
        self.load_extensions(catalog, priority);
        self.init_voice();
    }

    /// Initializes the selected playback, normalizer, and synthesis engines,
    /// then every fuzzy processor. Broken engines degrade to the console
    /// fallbacks instead of failing startup.
    pub fn init_voice(&mut self) {
        if let Some(playback) = self.registry.playback(&self.config.playback_engine).cloned() {
            if let Err(err) = playback.init(self) {
                error!(engine = %self.config.playback_engine, error = %format!("{err:#}"),
                    "playback engine failed to init, falling back to console TTS");
                // Without playback, file-rendering TTS engines are useless;
                // the console engine speaks without WAV files.
                self.config.tts_engine = "console".to_string();
            }
        } else {
            error!(engine = %self.config.playback_engine, "playback engine is not registered");
            self.config.tts_engine = "console".to_string();
        }

        if self.config.normalizer != "none" {
            match self.registry.normalizer(&self.config.normalizer).cloned() {
                Some(normalizer) => {
                    if let Err(err) = normalizer.init(self) {
                        error!(engine = %self.config.normalizer, error = %format!("{err:#}"),
                            "normalizer failed to init, disabling normalization");
                        self.config.normalizer = "none".to_string();
                    }
                }
                None => {
                    error!(engine = %self.config.normalizer, "normalizer is not registered, disabling");
                    self.config.normalizer = "none".to_string();
                }
            }
        }

        match self.registry.tts(&self.config.tts_engine).cloned() {
            Some(tts) => {
                if let Err(err) = tts.init(self) {
                    error!(engine = %self.config.tts_engine, error = %format!("{err:#}"),
                        "TTS engine failed to init, falling back to console");
                    self.config.tts_engine = "console".to_string();
                }
            }
            None => {
                error!(engine = %self.config.tts_engine, "TTS engine is not registered, falling back to console");
                self.config.tts_engine = "console".to_string();
            }
        }

        if self.config.tts_engine_secondary.is_empty() {
            self.config.tts_engine_secondary = self.config.tts_engine.clone();
        }
        if self.config.tts_engine_secondary != self.config.tts_engine {
            if let Some(tts) = self.registry.tts(&self.config.tts_engine_secondary).cloned() {
                if let Err(err) = tts.init(self) {
                    error!(engine = %self.config.tts_engine_secondary, error = %format!("{err:#}"),
                        "secondary TTS engine failed to init");
                }
            } else {
                error!(engine = %self.config.tts_engine_secondary, "secondary TTS engine is not registered");
            }
        }

        let processors: Vec<_> = self
            .registry
            .fuzzy_processors()
            .iter()
            .map(|(id, processor)| (id.clone(), Arc::clone(processor)))
            .collect();
        for (id, processor) in processors {
            if let Err(err) = processor.init(self) {
                error!(processor = %id, error = %format!("{err:#}"), "fuzzy processor failed to init");
            }
        }

        info!(
            tts = %self.config.tts_engine,
            playback = %self.config.playback_engine,
            normalizer = %self.config.normalizer,
            "voice engines ready"
        );
    }
}
