//! Console playback engine: logs the WAV path instead of playing it. Keeps
//! headless hosts working when a file-rendering TTS engine is selected.

use anyhow::Result;
use lyra_core::{Engine, Extension, Manifest, PlaybackEngine};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub struct ConsolePlaybackUnit;

struct ConsolePlayback;

impl PlaybackEngine for ConsolePlayback {
    fn play(&self, _engine: &mut Engine, path: &Path) -> Result<()> {
        info!(path = %path.display(), "would play WAV");
        println!("[playback] {}", path.display());
        Ok(())
    }
}

impl Extension for ConsolePlaybackUnit {
    fn start(&mut self, _engine: &mut Engine) -> Result<Manifest> {
        let mut manifest = Manifest::named("Console playback");
        manifest
            .playback
            .insert("console".to_string(), Arc::new(ConsolePlayback));
        Ok(manifest)
    }
}
