//! Merged Capability Registry
//!
//! Every loaded extension's manifest is folded into one set of global tables:
//! the command tree plus the engine tables for synthesis, playback,
//! normalization, and fuzzy matching. Later contributions win on key
//! collisions; the registry also remembers which unit contributed which
//! command keys so listing commands per extension stays possible.

use crate::command::{CommandTree, CompositeKey};
use crate::manifest::{FuzzyProcessor, Manifest, Normalizer, PlaybackEngine, TtsEngine};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// The global tables assembled from all loaded extensions.
#[derive(Default)]
pub struct Registry {
    commands: CommandTree,
    tts: HashMap<String, Arc<dyn TtsEngine>>,
    playback: HashMap<String, Arc<dyn PlaybackEngine>>,
    normalizers: HashMap<String, Arc<dyn Normalizer>>,
    /// Consultation order is first-registration order; re-registering an id
    /// replaces the processor in place.
    fuzzy: Vec<(String, Arc<dyn FuzzyProcessor>)>,
    /// Command keys contributed per unit name, for introspection.
    contributions: HashMap<String, Vec<CompositeKey>>,
    /// Effective options per unit name.
    options: HashMap<String, Map<String, Value>>,
}

impl Registry {
    /// Folds one extension's manifest into the global tables. Every key
    /// present overwrites an existing entry with the same key; absent
    /// categories are skipped.
    pub fn merge(&mut self, unit: &str, manifest: Manifest) {
        let Manifest {
            name,
            options,
            commands,
            tts,
            playback,
            normalizers,
            fuzzy,
        } = manifest;
        debug!(unit, title = %name, "merging manifest");

        for (key, node) in commands {
            if self.commands.insert(key.clone(), node).is_some() {
                warn!(unit, key = %key, "command key collision, later extension wins");
            }
            self.contributions.entry(unit.to_string()).or_default().push(key);
        }
        self.tts.extend(tts);
        self.playback.extend(playback);
        self.normalizers.extend(normalizers);
        for (id, processor) in fuzzy {
            match self.fuzzy.iter_mut().find(|(existing, _)| *existing == id) {
                Some(entry) => entry.1 = processor,
                None => self.fuzzy.push((id, processor)),
            }
        }
        self.options.insert(unit.to_string(), options);
    }

    /// The merged top-level command tree.
    pub fn commands(&self) -> &CommandTree {
        &self.commands
    }

    pub fn tts(&self, id: &str) -> Option<&Arc<dyn TtsEngine>> {
        self.tts.get(id)
    }

    pub fn playback(&self, id: &str) -> Option<&Arc<dyn PlaybackEngine>> {
        self.playback.get(id)
    }

    pub fn normalizer(&self, id: &str) -> Option<&Arc<dyn Normalizer>> {
        self.normalizers.get(id)
    }

    /// Fuzzy processors in consultation order.
    pub fn fuzzy_processors(&self) -> &[(String, Arc<dyn FuzzyProcessor>)] {
        &self.fuzzy
    }

    /// Command keys contributed by `unit`, in contribution order.
    pub fn contributed_commands(&self, unit: &str) -> &[CompositeKey] {
        self.contributions.get(unit).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates `(unit, contributed command keys)` for every unit that
    /// contributed at least one command.
    pub fn contributions(&self) -> impl Iterator<Item = (&str, &[CompositeKey])> {
        self.contributions
            .iter()
            .map(|(unit, keys)| (unit.as_str(), keys.as_slice()))
    }

    /// Effective options of `unit`, if it loaded.
    pub fn options(&self, unit: &str) -> Option<&Map<String, Value>> {
        self.options.get(unit)
    }
}
