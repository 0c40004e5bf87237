//! Console TTS engine: "speaks" by printing, the always-available fallback
//! every configuration can degrade to.

use anyhow::Result;
use lyra_core::{Engine, Extension, Manifest, TtsEngine, TtsError};
use std::sync::Arc;

pub struct ConsoleTtsUnit;

struct ConsoleTts;

impl TtsEngine for ConsoleTts {
    fn say(&self, _engine: &mut Engine, text: &str) -> Result<(), TtsError> {
        println!("[voice] {text}");
        Ok(())
    }
    // to_wav stays unsupported: there is nothing to render.
}

impl Extension for ConsoleTtsUnit {
    fn start(&mut self, _engine: &mut Engine) -> Result<Manifest> {
        let mut manifest = Manifest::named("Console TTS");
        manifest.tts.insert("console".to_string(), Arc::new(ConsoleTts));
        Ok(manifest)
    }
}
