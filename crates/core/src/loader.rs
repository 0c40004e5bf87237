//! Extension Loader
//!
//! Runs the extension lifecycle for every unit in a catalog and merges the
//! resulting manifests into the registry. A failing unit is logged and
//! skipped; it never takes the rest of the load sequence down with it, so a
//! broken extension degrades capability instead of crashing the assistant.

use crate::engine::Engine;
use crate::extension::ExtensionCatalog;
use crate::manifest::Manifest;
use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::PathBuf;
use tracing::{error, info};

impl Engine {
    /// Loads every extension in the catalog: `priority` names first, in the
    /// given order, then the remaining units in catalog registration order.
    /// Failures are isolated per unit.
    pub fn load_extensions(&mut self, catalog: &ExtensionCatalog, priority: &[&str]) {
        let mut loaded: Vec<String> = Vec::new();
        for name in priority {
            if self.load_one(catalog, name) {
                loaded.push(name.to_string());
            }
        }
        let remaining: Vec<String> = catalog
            .names()
            .filter(|name| !loaded.iter().any(|done| done == name))
            .map(str::to_string)
            .collect();
        for name in remaining {
            self.load_one(catalog, &name);
        }
    }

    /// Runs one unit through its lifecycle. Returns whether it loaded.
    pub fn load_one(&mut self, catalog: &ExtensionCatalog, name: &str) -> bool {
        match self.try_load(catalog, name) {
            Ok(()) => {
                info!(unit = name, "extension loaded");
                true
            }
            Err(err) => {
                error!(unit = name, error = %format!("{err:#}"), "extension failed to load, skipping");
                false
            }
        }
    }

    fn try_load(&mut self, catalog: &ExtensionCatalog, name: &str) -> Result<()> {
        let mut extension = catalog
            .construct(name)
            .with_context(|| format!("unit '{name}' is not in the catalog"))?;

        let mut manifest = extension
            .start(self)
            .with_context(|| format!("start() failed for '{name}'"))?;
        self.merge_option_overrides(name, &mut manifest)
            .with_context(|| format!("option override merge failed for '{name}'"))?;

        if let Some(replacement) = extension
            .start_with_options(self, &manifest)
            .with_context(|| format!("start_with_options() failed for '{name}'"))?
        {
            manifest = replacement;
            // The replacement is re-merged so overrides survive it.
            self.merge_option_overrides(name, &mut manifest)
                .with_context(|| format!("option override re-merge failed for '{name}'"))?;
        }

        self.registry.merge(name, manifest);
        Ok(())
    }

    /// Shallow-merges persisted overrides from
    /// `<runtime_dir>/options/<unit>.json` over the manifest's option
    /// defaults, then writes the effective map back so newly introduced
    /// defaults materialize on disk.
    fn merge_option_overrides(&self, unit: &str, manifest: &mut Manifest) -> Result<()> {
        if manifest.options.is_empty() && !self.options_file(unit).exists() {
            return Ok(());
        }

        let path = self.options_file(unit);
        if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let overrides: Map<String, Value> = serde_json::from_str(&raw)
                .with_context(|| format!("{} is not a JSON object", path.display()))?;
            for (key, value) in overrides {
                manifest.options.insert(key, value);
            }
        }

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let effective = serde_json::to_string_pretty(&manifest.options)?;
        std::fs::write(&path, effective)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    fn options_file(&self, unit: &str) -> PathBuf {
        self.config.runtime_dir.join("options").join(format!("{unit}.json"))
    }

    /// Effective options of a loaded extension, empty when the unit is
    /// unknown.
    pub fn extension_options(&self, unit: &str) -> Map<String, Value> {
        self.registry.options(unit).cloned().unwrap_or_default()
    }
}
