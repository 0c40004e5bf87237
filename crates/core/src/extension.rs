//! Extension Contract and Catalog
//!
//! Extensions are self-contained contributors of commands and engine
//! bindings. Instead of scanning a directory for loadable modules, the host
//! registers constructors in an [`ExtensionCatalog`] and hands it to the
//! loader; registration order is load order for everything not pulled
//! forward by the priority list.

use crate::engine::Engine;
use crate::manifest::Manifest;
use anyhow::Result;

/// The lifecycle an extension unit implements.
pub trait Extension: Send {
    /// First lifecycle phase: describe everything this extension contributes.
    /// Runs before options are merged with persisted overrides.
    fn start(&mut self, engine: &mut Engine) -> Result<Manifest>;

    /// Second lifecycle phase, after the manifest's options have been merged
    /// with persisted overrides. Returning a manifest replaces the original
    /// wholesale (it is re-merged with overrides); `None` keeps it.
    fn start_with_options(
        &mut self,
        engine: &mut Engine,
        manifest: &Manifest,
    ) -> Result<Option<Manifest>> {
        let _ = (engine, manifest);
        Ok(None)
    }
}

type Constructor = Box<dyn Fn() -> Box<dyn Extension>>;

/// An ordered registry of named extension constructors.
#[derive(Default)]
pub struct ExtensionCatalog {
    entries: Vec<(String, Constructor)>,
}

impl ExtensionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor under a unit name. Re-registering a name
    /// replaces the constructor but keeps its position.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        constructor: impl Fn() -> Box<dyn Extension> + 'static,
    ) -> &mut Self {
        let name = name.into();
        let constructor: Constructor = Box::new(constructor);
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = constructor,
            None => self.entries.push((name, constructor)),
        }
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub(crate) fn construct(&self, name: &str) -> Option<Box<dyn Extension>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, constructor)| constructor())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Nop;

    impl Extension for Nop {
        fn start(&mut self, _engine: &mut Engine) -> Result<Manifest> {
            Ok(Manifest::named("nop"))
        }
    }

    #[test]
    fn registration_order_is_preserved() {
        let mut catalog = ExtensionCatalog::new();
        catalog
            .register("b", || Box::new(Nop))
            .register("a", || Box::new(Nop))
            .register("c", || Box::new(Nop));
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["b", "a", "c"]);
    }

    #[test]
    fn reregistration_keeps_position() {
        let mut catalog = ExtensionCatalog::new();
        catalog.register("a", || Box::new(Nop)).register("b", || Box::new(Nop));
        catalog.register("a", || Box::new(Nop));
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
