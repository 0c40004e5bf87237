//! Built-in Lyra extensions
//!
//! The standard set of extension units every Lyra host gets out of the box:
//! console voice engines, a text normalizer, a fuzzy processor backed by a
//! general-purpose matcher, and a small command pack for greetings, date and
//! time, timers, and coin or dice throws.

pub mod console_playback;
pub mod console_tts;
pub mod greetings;
pub mod plain_normalizer;
pub mod skim_fuzzy;

use lyra_core::ExtensionCatalog;

/// The standard catalog: voice engines and the normalizer first so they are
/// registered before anything speaks, then the command packs.
pub fn default_catalog() -> ExtensionCatalog {
    let mut catalog = ExtensionCatalog::new();
    catalog
        .register("console_tts", || Box::new(console_tts::ConsoleTtsUnit))
        .register("console_playback", || {
            Box::new(console_playback::ConsolePlaybackUnit)
        })
        .register("plain_normalizer", || {
            Box::new(plain_normalizer::PlainNormalizerUnit)
        })
        .register("skim_fuzzy", || Box::new(skim_fuzzy::SkimFuzzyUnit))
        .register("greetings", || Box::new(greetings::GreetingsUnit));
    catalog
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_registers_engines_before_command_packs() {
        let catalog = default_catalog();
        let names: Vec<&str> = catalog.names().collect();
        assert_eq!(names.first(), Some(&"console_tts"));
        assert!(names.contains(&"greetings"));
        assert_eq!(names.last(), Some(&"greetings"));
    }
}
