//! Runtime Configuration
//!
//! All tunables of the engine live here, loaded from the environment at
//! startup. `Default` provides a self-contained configuration for tests and
//! embedding.

use crate::speech::OutputMode;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A configuration loading failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all engine configuration, loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Working directory for persisted options, TTS cache, and temp files.
    pub runtime_dir: PathBuf,
    /// Names that address the assistant; one of them must appear in an
    /// utterance before top-level dispatch happens.
    pub wake_words: Vec<String>,
    /// Command text prepended to the utterance when a specific wake word is
    /// used, e.g. mapping a nickname straight to a subsystem.
    pub wake_word_commands: HashMap<String, String>,
    /// Primary speech synthesis engine id.
    pub tts_engine: String,
    /// Secondary synthesis engine id; empty means "same as primary".
    pub tts_engine_secondary: String,
    /// WAV playback engine id.
    pub playback_engine: String,
    /// Normalizer id, `"none"` disables normalization.
    pub normalizer: String,
    /// Confidence a fuzzy processor must strictly exceed to win.
    pub fuzzy_threshold: f32,
    /// Whether fuzzy matching runs on the very first resolution step. Nested
    /// steps always allow it; this flag exists for command producers that
    /// only ever emit exact top-level phrases.
    pub top_level_fuzzy: bool,
    /// Where spoken replies go: local speakers and/or the remote reply.
    pub output_modes: Vec<OutputMode>,
    /// Cache rendered WAV files keyed by phrase instead of re-synthesizing.
    pub use_tts_cache: bool,
    /// Dialog context lifetime when the extension does not pick one.
    pub context_default_ttl: Duration,
    /// Defer the dialog TTL until the transport confirms delivery of the
    /// prompt (remote output modes only).
    pub context_wait_for_delivery: bool,
    /// Spoken fallback when no command matches.
    pub reply_not_understood: String,
    /// Spoken fallback when no command matches inside an active dialog.
    pub reply_not_understood_in_context: String,
    pub log_level: Level,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runtime_dir: PathBuf::from("runtime"),
            wake_words: vec!["lyra".to_string()],
            wake_word_commands: HashMap::new(),
            tts_engine: "console".to_string(),
            tts_engine_secondary: String::new(),
            playback_engine: "console".to_string(),
            normalizer: "plain".to_string(),
            fuzzy_threshold: 0.5,
            top_level_fuzzy: true,
            output_modes: vec![OutputMode::Local],
            use_tts_cache: false,
            context_default_ttl: Duration::from_secs(10),
            context_wait_for_delivery: false,
            reply_not_understood: "Sorry, I did not understand that".to_string(),
            reply_not_understood_in_context: "I did not catch that".to_string(),
            log_level: Level::INFO,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables, falling back to the
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let mut config = Self::default();

        if let Ok(dir) = std::env::var("LYRA_RUNTIME_DIR") {
            config.runtime_dir = PathBuf::from(dir);
        }
        if let Ok(words) = std::env::var("LYRA_WAKE_WORDS") {
            config.wake_words = split_list(&words);
        }
        if let Ok(id) = std::env::var("LYRA_TTS_ENGINE") {
            config.tts_engine = id;
        }
        if let Ok(id) = std::env::var("LYRA_TTS_ENGINE_SECONDARY") {
            config.tts_engine_secondary = id;
        }
        if let Ok(id) = std::env::var("LYRA_PLAYBACK_ENGINE") {
            config.playback_engine = id;
        }
        if let Ok(id) = std::env::var("LYRA_NORMALIZER") {
            config.normalizer = id;
        }
        if let Ok(raw) = std::env::var("LYRA_FUZZY_THRESHOLD") {
            let threshold = raw.parse::<f32>().map_err(|e| {
                ConfigError::InvalidValue("LYRA_FUZZY_THRESHOLD".to_string(), e.to_string())
            })?;
            if !(0.0..=1.0).contains(&threshold) {
                return Err(ConfigError::InvalidValue(
                    "LYRA_FUZZY_THRESHOLD".to_string(),
                    format!("{threshold} is outside [0, 1]"),
                ));
            }
            config.fuzzy_threshold = threshold;
        }
        if let Ok(raw) = std::env::var("LYRA_TOP_LEVEL_FUZZY") {
            config.top_level_fuzzy = parse_bool("LYRA_TOP_LEVEL_FUZZY", &raw)?;
        }
        if let Ok(raw) = std::env::var("LYRA_OUTPUT_MODES") {
            config.output_modes = split_list(&raw)
                .iter()
                .map(|mode| {
                    mode.parse::<OutputMode>().map_err(|_| {
                        ConfigError::InvalidValue(
                            "LYRA_OUTPUT_MODES".to_string(),
                            format!("'{mode}' is not one of local, text, wav"),
                        )
                    })
                })
                .collect::<Result<_, _>>()?;
        }
        if let Ok(raw) = std::env::var("LYRA_TTS_CACHE") {
            config.use_tts_cache = parse_bool("LYRA_TTS_CACHE", &raw)?;
        }
        if let Ok(raw) = std::env::var("LYRA_CONTEXT_TTL_SECS") {
            let secs = raw.parse::<u64>().map_err(|e| {
                ConfigError::InvalidValue("LYRA_CONTEXT_TTL_SECS".to_string(), e.to_string())
            })?;
            config.context_default_ttl = Duration::from_secs(secs);
        }
        if let Ok(raw) = std::env::var("LYRA_CONTEXT_WAIT_FOR_DELIVERY") {
            config.context_wait_for_delivery = parse_bool("LYRA_CONTEXT_WAIT_FOR_DELIVERY", &raw)?;
        }
        if let Ok(reply) = std::env::var("LYRA_REPLY_NOT_UNDERSTOOD") {
            config.reply_not_understood = reply;
        }
        if let Ok(reply) = std::env::var("LYRA_REPLY_NOT_UNDERSTOOD_IN_CONTEXT") {
            config.reply_not_understood_in_context = reply;
        }
        if let Ok(raw) = std::env::var("RUST_LOG") {
            config.log_level = raw.parse::<Level>().map_err(|_| {
                ConfigError::InvalidValue(
                    "RUST_LOG".to_string(),
                    format!("'{raw}' is not a valid log level"),
                )
            })?;
        }

        Ok(config)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue(
            var.to_string(),
            format!("'{raw}' is not a boolean"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("LYRA_RUNTIME_DIR");
            env::remove_var("LYRA_WAKE_WORDS");
            env::remove_var("LYRA_TTS_ENGINE");
            env::remove_var("LYRA_TTS_ENGINE_SECONDARY");
            env::remove_var("LYRA_PLAYBACK_ENGINE");
            env::remove_var("LYRA_NORMALIZER");
            env::remove_var("LYRA_FUZZY_THRESHOLD");
            env::remove_var("LYRA_TOP_LEVEL_FUZZY");
            env::remove_var("LYRA_OUTPUT_MODES");
            env::remove_var("LYRA_TTS_CACHE");
            env::remove_var("LYRA_CONTEXT_TTL_SECS");
            env::remove_var("LYRA_CONTEXT_WAIT_FOR_DELIVERY");
            env::remove_var("LYRA_REPLY_NOT_UNDERSTOOD");
            env::remove_var("LYRA_REPLY_NOT_UNDERSTOOD_IN_CONTEXT");
            env::remove_var("RUST_LOG");
        }
    }

    #[test]
    #[serial]
    fn defaults_without_env() {
        clear_env_vars();
        let config = Config::from_env().expect("defaults should load");
        assert_eq!(config.wake_words, vec!["lyra".to_string()]);
        assert_eq!(config.tts_engine, "console");
        assert_eq!(config.fuzzy_threshold, 0.5);
        assert_eq!(config.output_modes, vec![OutputMode::Local]);
        assert_eq!(config.context_default_ttl, Duration::from_secs(10));
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    #[serial]
    fn custom_values_override_defaults() {
        clear_env_vars();
        unsafe {
            env::set_var("LYRA_WAKE_WORDS", "lyra, computer");
            env::set_var("LYRA_OUTPUT_MODES", "local,text");
            env::set_var("LYRA_FUZZY_THRESHOLD", "0.7");
            env::set_var("LYRA_CONTEXT_TTL_SECS", "30");
            env::set_var("LYRA_CONTEXT_WAIT_FOR_DELIVERY", "true");
            env::set_var("RUST_LOG", "debug");
        }

        let config = Config::from_env().expect("config should load");
        assert_eq!(
            config.wake_words,
            vec!["lyra".to_string(), "computer".to_string()]
        );
        assert_eq!(
            config.output_modes,
            vec![OutputMode::Local, OutputMode::Text]
        );
        assert_eq!(config.fuzzy_threshold, 0.7);
        assert_eq!(config.context_default_ttl, Duration::from_secs(30));
        assert!(config.context_wait_for_delivery);
        assert_eq!(config.log_level, Level::DEBUG);
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn invalid_threshold_is_rejected() {
        clear_env_vars();
        unsafe {
            env::set_var("LYRA_FUZZY_THRESHOLD", "1.5");
        }
        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "LYRA_FUZZY_THRESHOLD"),
        }
        clear_env_vars();
    }

    #[test]
    #[serial]
    fn invalid_output_mode_is_rejected() {
        clear_env_vars();
        unsafe {
            env::set_var("LYRA_OUTPUT_MODES", "local,telepathy");
        }
        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "LYRA_OUTPUT_MODES"),
        }
        clear_env_vars();
    }
}
