//! Command Dispatch
//!
//! Resolution walks the merged command tree one interior level at a time,
//! trying exact synonym matches first, then prefix matches that split off a
//! remainder, then the registered fuzzy processors in order. A matched child
//! recurses with the remainder until a leaf fires; a miss produces a spoken
//! fallback, and inside an active dialog it also rearms the dialog TTL with
//! the duration the context was originally set with.

use crate::command::{CommandNode, CompositeKey};
use crate::engine::Engine;
use crate::manifest::FuzzyMatch;
use anyhow::Result;
use tracing::{debug, info, warn};

impl Engine {
    /// Resolves recognized speech: a configured wake word must appear in the
    /// utterance before dispatch happens, and the command is whatever follows
    /// it. With an active dialog context the whole utterance is treated as a
    /// continuation and no wake word is required. Returns whether dispatch
    /// ran.
    pub fn run_input_str(&mut self, utterance: &str) -> bool {
        if let Some(node) = self.dialog.active_node() {
            info!(utterance, "input continues active dialog");
            if let Err(err) = self.execute_next(utterance, Some(node)) {
                warn!(error = %format!("{err:#}"), "dispatch failed");
            }
            return true;
        }

        let words: Vec<&str> = utterance.split_whitespace().collect();
        for (position, word) in words.iter().enumerate() {
            if !self.config.wake_words.iter().any(|wake| wake == word) {
                continue;
            }
            self.cur_wake_word = word.to_string();
            info!(utterance, wake_word = word, "input addressed the assistant");

            let mut command = words[position + 1..].join(" ");
            if let Some(prefix) = self.config.wake_word_commands.get(*word) {
                // Some wake words route straight into a subsystem.
                command = format!("{prefix} {command}");
                debug!(prefix, "wake word prepended a command");
            }
            if let Err(err) = self.execute_next(&command, None) {
                warn!(error = %format!("{err:#}"), "dispatch failed");
            }
            return true;
        }
        false
    }

    /// One step of command resolution. `context` is `None` for a fresh
    /// top-level resolution (binding to the merged command tree) and a
    /// subtree when recursing or continuing a dialog.
    pub fn execute_next(&mut self, command: &str, context: Option<CommandNode>) -> Result<()> {
        let (node, is_first) = match context {
            Some(node) => (node, false),
            None => {
                self.input_cmd_full = command.to_string();
                (CommandNode::Interior(self.registry.commands().clone()), true)
            }
        };

        let tree = match node {
            CommandNode::Leaf(action) => {
                // The context is consumed by reaching a terminal, whichever
                // path led here.
                self.context_clear();
                return action.invoke(self, command);
            }
            CommandNode::Interior(tree) => tree,
        };

        let allow_fuzzy = !is_first || self.config.top_level_fuzzy;
        if let Some(found) = self.resolve(command, &tree, true, allow_fuzzy)? {
            debug!(key = %found.key, confidence = found.confidence, remainder = %found.remainder, "matched");
            if let Some(next) = tree.get(&found.key).cloned() {
                return self.execute_next(&found.remainder, Some(next));
            }
            // A processor can report a key that is not in this tree at all;
            // that is its bug, not grounds to take the dispatch down.
            warn!(key = %found.key, "matched key is not in the tree, treating as no match");
        }

        if self.dialog.is_idle() {
            info!(command, "no command matched");
            let reply = self.config.reply_not_understood.clone();
            self.say(&reply)?;
        } else {
            info!(command, "no command matched inside dialog");
            let reply = self.config.reply_not_understood_in_context.clone();
            self.say(&reply)?;
            // Give the user another full window, sized like the original one.
            if let Some((node, duration)) = self.dialog.active() {
                self.context_set(node, Some(duration));
            }
        }
        Ok(())
    }

    /// Finds the best key of `tree` for `command`: exact synonym, then prefix
    /// with remainder, then the fuzzy processors in registration order. The
    /// first processor strictly above the configured threshold wins even if a
    /// later one would be more confident.
    pub(crate) fn resolve(
        &self,
        command: &str,
        tree: &crate::command::CommandTree,
        allow_remainder: bool,
        allow_fuzzy: bool,
    ) -> Result<Option<FuzzyMatch>> {
        for key in tree.keys() {
            for synonym in key.synonyms() {
                if synonym == command {
                    return Ok(Some(exact(key)));
                }
            }
        }

        if allow_remainder {
            for key in tree.keys() {
                for synonym in key.synonyms() {
                    if let Some(rest) = command.strip_prefix(synonym) {
                        if let Some(remainder) = rest.strip_prefix(' ') {
                            return Ok(Some(FuzzyMatch {
                                key: key.clone(),
                                confidence: 1.0,
                                remainder: remainder.to_string(),
                            }));
                        }
                    }
                }
            }
        }

        if !allow_fuzzy {
            return Ok(None);
        }
        let threshold = self.config.fuzzy_threshold;
        for (id, processor) in self.registry.fuzzy_processors() {
            let result = processor.compare(self, command, tree, allow_remainder)?;
            debug!(processor = %id, command, result = ?result, "fuzzy comparison");
            if let Some(found) = result {
                if found.confidence > threshold {
                    return Ok(Some(found));
                }
            }
        }
        Ok(None)
    }

    /// The full original command string recorded at the last top-level
    /// resolution, for handlers that want more than their remainder.
    pub fn input_cmd_full(&self) -> &str {
        &self.input_cmd_full
    }

    /// The wake word that addressed the assistant last.
    pub fn current_wake_word(&self) -> &str {
        &self.cur_wake_word
    }
}

fn exact(key: &CompositeKey) -> FuzzyMatch {
    FuzzyMatch {
        key: key.clone(),
        confidence: 1.0,
        remainder: String::new(),
    }
}
