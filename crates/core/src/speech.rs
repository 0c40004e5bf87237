//! Voice Output Path
//!
//! Spoken replies can go to the local speakers, into a plain-text remote
//! reply, into a base64-encoded WAV remote reply, or any combination. The
//! local path prefers direct synthesis; engines that can only render files
//! are routed through `to_wav` plus the playback engine, with an optional
//! on-disk cache keyed by phrase.

use crate::engine::Engine;
use crate::manifest::TtsError;
use anyhow::{Context, Result, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

/// Where a spoken reply is delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    /// Speak through the local TTS / playback engines.
    Local,
    /// Collect the reply text for a remote client.
    Text,
    /// Render a WAV and collect it base64-encoded for a remote client.
    Wav,
}

impl FromStr for OutputMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "text" => Ok(Self::Text),
            "wav" => Ok(Self::Wav),
            _ => Err(()),
        }
    }
}

/// The reply collected for a remote client by the last [`Engine::say`] call.
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct SpeechReply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wav_base64: Option<String>,
}

/// Mutable speech bookkeeping hanging off the engine.
#[derive(Default)]
pub(crate) struct SpeechState {
    pub(crate) last_say: String,
    pub(crate) reply: Option<SpeechReply>,
    tmp_counter: u64,
}

impl Engine {
    /// Speaks `text` through every configured output mode.
    pub fn say(&mut self, text: &str) -> Result<()> {
        self.speech.last_say = text.to_string();
        let modes = self.config.output_modes.clone();
        let mut reply = SpeechReply::default();
        let mut handled = false;

        if modes.contains(&OutputMode::Local) {
            let id = self.config.tts_engine.clone();
            self.speak_local(&id, text)?;
            handled = true;
        }
        if modes.contains(&OutputMode::Text) {
            reply.text = Some(text.to_string());
            handled = true;
        }
        if modes.contains(&OutputMode::Wav) {
            reply.wav_base64 = Some(self.render_wav_base64(text)?);
            handled = true;
        }

        if !handled {
            warn!(?modes, "no output mode handled the reply");
        }
        self.speech.reply = Some(reply);
        Ok(())
    }

    /// Speaks through the secondary synthesis engine, falling back to the
    /// primary when no secondary is configured. Local-only; remote reply
    /// collection stays untouched.
    pub fn say_secondary(&mut self, text: &str) -> Result<()> {
        let id = if self.config.tts_engine_secondary.is_empty() {
            self.config.tts_engine.clone()
        } else {
            self.config.tts_engine_secondary.clone()
        };
        self.speak_local(&id, text)
    }

    /// The last phrase passed to [`Engine::say`].
    pub fn last_say(&self) -> &str {
        &self.speech.last_say
    }

    /// Takes the remote reply collected by the last [`Engine::say`] call.
    pub fn take_reply(&mut self) -> Option<SpeechReply> {
        self.speech.reply.take()
    }

    /// Runs `text` through the configured normalizer; `"none"` is identity.
    pub fn normalize(&self, text: &str) -> Result<String> {
        if self.config.normalizer == "none" {
            return Ok(text.to_string());
        }
        let normalizer = self
            .registry
            .normalizer(&self.config.normalizer)
            .with_context(|| format!("normalizer '{}' is not registered", self.config.normalizer))?
            .clone();
        normalizer.normalize(self, text)
    }

    /// Plays a WAV file through the configured playback engine.
    pub fn play_wav(&mut self, path: &Path) -> Result<()> {
        let playback = self
            .registry
            .playback(&self.config.playback_engine)
            .with_context(|| {
                format!(
                    "playback engine '{}' is not registered",
                    self.config.playback_engine
                )
            })?
            .clone();
        playback.play(self, path)
    }

    fn speak_local(&mut self, engine_id: &str, text: &str) -> Result<()> {
        let text = &self.normalize(text)?;
        let tts = self
            .registry
            .tts(engine_id)
            .with_context(|| format!("TTS engine '{engine_id}' is not registered"))?
            .clone();
        match tts.say(self, text) {
            Ok(()) => Ok(()),
            Err(TtsError::Unsupported) => {
                let (path, cached) = self.synthesize_to_file(engine_id, text)?;
                self.play_wav(&path)?;
                if !cached {
                    if let Err(err) = std::fs::remove_file(&path) {
                        warn!(path = %path.display(), error = %err, "failed to remove temp WAV");
                    }
                }
                Ok(())
            }
            Err(TtsError::Failed(err)) => Err(err.context(format!("TTS '{engine_id}' failed"))),
        }
    }

    fn render_wav_base64(&mut self, text: &str) -> Result<String> {
        let engine_id = self.config.tts_engine.clone();
        let text = self.normalize(text)?;
        let (path, cached) = self.synthesize_to_file(&engine_id, &text)?;
        let bytes = std::fs::read(&path)
            .with_context(|| format!("failed to read rendered WAV {}", path.display()))?;
        if !cached {
            let _ = std::fs::remove_file(&path);
        }
        Ok(BASE64.encode(bytes))
    }

    /// Renders `text` to a WAV file, reusing the cache when enabled. Returns
    /// the file path and whether it lives in the cache (cached files are
    /// kept, temp files are the caller's to delete).
    fn synthesize_to_file(&mut self, engine_id: &str, text: &str) -> Result<(PathBuf, bool)> {
        let tts = self
            .registry
            .tts(engine_id)
            .with_context(|| format!("TTS engine '{engine_id}' is not registered"))?
            .clone();

        if self.config.use_tts_cache {
            let path = self.tts_cache_file(engine_id, text);
            if !path.exists() {
                if let Some(dir) = path.parent() {
                    std::fs::create_dir_all(dir)?;
                }
                tts.to_wav(self, text, &path)
                    .map_err(|err| anyhow!(err).context("WAV rendering failed"))?;
            }
            return Ok((path, true));
        }

        let path = self.next_temp_file("wav")?;
        tts.to_wav(self, text, &path)
            .map_err(|err| anyhow!(err).context("WAV rendering failed"))?;
        Ok((path, false))
    }

    /// Cache file path for a phrase: a readable prefix plus a content hash,
    /// segregated per engine id so switching voices never collides.
    fn tts_cache_file(&self, engine_id: &str, text: &str) -> PathBuf {
        let digest = Sha256::digest(text.as_bytes());
        let prefix: String = text
            .chars()
            .take(24)
            .map(|c| if c.is_alphanumeric() { c } else { '_' })
            .collect();
        self.config
            .runtime_dir
            .join("cache/tts")
            .join(engine_id)
            .join(format!("{prefix}.{digest:x}.wav"))
    }

    /// Allocates a fresh counter-named file path under the runtime temp dir.
    fn next_temp_file(&mut self, ext: &str) -> Result<PathBuf> {
        let dir = self.config.runtime_dir.join("temp");
        std::fs::create_dir_all(&dir)?;
        self.speech.tmp_counter += 1;
        Ok(dir.join(format!("speech_{}.{ext}", self.speech.tmp_counter)))
    }
}
