//! Command Tree Data Model
//!
//! Commands form a tree assembled at runtime from extension manifests. Interior
//! nodes map phrase keys to further subtrees; leaves hold the action that fires
//! once resolution bottoms out. A single key can carry several synonym phrases
//! (`"hello|hi"`), any of which resolves the whole key.

use crate::engine::Engine;
use anyhow::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Separator between synonym phrases inside a [`CompositeKey`].
pub const SYNONYM_SEPARATOR: char = '|';

/// A command-tree key holding one or more synonym phrases joined by `|`.
///
/// Equality and hashing use the full joined string, so `"hello|hi"` and
/// `"hi|hello"` are distinct keys even though they resolve the same phrases.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompositeKey(String);

impl CompositeKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Iterates the synonym phrases of this key in declaration order.
    pub fn synonyms(&self) -> impl Iterator<Item = &str> {
        self.0.split(SYNONYM_SEPARATOR)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CompositeKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type PlainFn = dyn Fn(&mut Engine, &str) -> Result<()> + Send + Sync;
type ParamFn = dyn Fn(&mut Engine, &str, &Value) -> Result<()> + Send + Sync;

/// A terminal handler reached at the bottom of command resolution.
///
/// The same shape doubles as a timer end-callback, where the phrase is empty.
#[derive(Clone)]
pub enum Action {
    /// Invoked with the engine and the unconsumed remainder of the utterance.
    Plain(Arc<PlainFn>),
    /// Invoked like [`Action::Plain`] plus a parameter captured at registration
    /// time, so one handler can serve several tree positions.
    WithParam { func: Arc<ParamFn>, param: Value },
}

impl Action {
    pub fn plain(func: impl Fn(&mut Engine, &str) -> Result<()> + Send + Sync + 'static) -> Self {
        Self::Plain(Arc::new(func))
    }

    pub fn with_param(
        func: impl Fn(&mut Engine, &str, &Value) -> Result<()> + Send + Sync + 'static,
        param: impl Into<Value>,
    ) -> Self {
        Self::WithParam {
            func: Arc::new(func),
            param: param.into(),
        }
    }

    /// Runs the action with the given phrase remainder.
    pub fn invoke(&self, engine: &mut Engine, phrase: &str) -> Result<()> {
        match self {
            Self::Plain(func) => func(engine, phrase),
            Self::WithParam { func, param } => func(engine, phrase, param),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Action::Plain"),
            Self::WithParam { param, .. } => write!(f, "Action::WithParam({param})"),
        }
    }
}

/// One node of the merged command tree.
#[derive(Clone, Debug)]
pub enum CommandNode {
    /// A further level of phrase resolution.
    Interior(CommandTree),
    /// A terminal action.
    Leaf(Action),
}

/// A phrase map forming one interior level of the command tree.
pub type CommandTree = HashMap<CompositeKey, CommandNode>;

/// Builds a leaf node from a plain handler.
pub fn leaf(func: impl Fn(&mut Engine, &str) -> Result<()> + Send + Sync + 'static) -> CommandNode {
    CommandNode::Leaf(Action::plain(func))
}

/// Builds a leaf node from a handler plus a captured parameter.
pub fn leaf_with(
    func: impl Fn(&mut Engine, &str, &Value) -> Result<()> + Send + Sync + 'static,
    param: impl Into<Value>,
) -> CommandNode {
    CommandNode::Leaf(Action::with_param(func, param))
}

/// Builds an interior tree level from `(key, node)` pairs.
pub fn tree<const N: usize>(entries: [(&str, CommandNode); N]) -> CommandTree {
    entries
        .into_iter()
        .map(|(key, node)| (CompositeKey::from(key), node))
        .collect()
}

/// Finds the composite key of `tree` containing `phrase` as one of its
/// synonyms. Fuzzy processors predict a single phrase and use this to map it
/// back to the key the dispatcher needs.
pub fn key_for_synonym(tree: &CommandTree, phrase: &str) -> Option<CompositeKey> {
    tree.keys()
        .find(|key| key.synonyms().any(|syn| syn == phrase))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_key_splits_synonyms() {
        let key = CompositeKey::from("a|b|c");
        let synonyms: Vec<&str> = key.synonyms().collect();
        assert_eq!(synonyms, vec!["a", "b", "c"]);
    }

    #[test]
    fn single_phrase_key_has_one_synonym() {
        let key = CompositeKey::from("set timer");
        assert_eq!(key.synonyms().collect::<Vec<_>>(), vec!["set timer"]);
    }

    #[test]
    fn key_for_synonym_returns_full_key() {
        let commands = tree([("hello|hi", leaf(|_, _| Ok(())))]);
        let key = key_for_synonym(&commands, "hi").expect("synonym should resolve");
        assert_eq!(key.as_str(), "hello|hi");
        assert!(key_for_synonym(&commands, "hell").is_none());
    }

    #[test]
    fn action_with_param_passes_param_through() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        let mut engine = Engine::new(crate::config::Config::default());
        let seen = Arc::new(AtomicBool::new(false));
        let seen_inner = Arc::clone(&seen);
        let action = Action::with_param(
            move |_, phrase, param| {
                assert_eq!(phrase, "rest");
                assert_eq!(param.as_str(), Some("signal.wav"));
                seen_inner.store(true, Ordering::SeqCst);
                Ok(())
            },
            "signal.wav",
        );
        action.invoke(&mut engine, "rest").unwrap();
        assert!(seen.load(Ordering::SeqCst));
    }
}
