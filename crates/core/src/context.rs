//! Dialog Context State Machine
//!
//! At most one dialog context is active at a time: a command subtree waiting
//! for a continuation utterance within a time-to-live window. Unlike the
//! polled timer bank, the TTL is a genuine one-shot primitive whose expiry
//! runs on its own thread, so every `Idle`/`Active` transition happens under a
//! single mutex and is tagged with an epoch. An expiry thread only clears the
//! state if the epoch it was armed with is still current, which makes clearing
//! idempotent and resolves the race between "TTL fires" and "dispatch reached
//! a leaf and cleared the context" without ever double-firing.

use crate::command::CommandNode;
use crate::engine::Engine;
use crate::speech::OutputMode;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

enum DialogState {
    Idle,
    Active {
        node: CommandNode,
        /// Duration used when the context was set; a miss inside the context
        /// rearms with this value, not the configured default.
        duration: Duration,
        /// False while arming is deferred until delivery confirmation.
        armed: bool,
    },
}

struct Inner {
    state: DialogState,
    /// Bumped on every transition; stale expiry threads see the mismatch and
    /// exit without touching the state.
    epoch: u64,
}

/// The single shared dialog slot. Cloning shares the same underlying state;
/// the expiry thread holds one such clone.
#[derive(Clone)]
pub struct DialogSlot {
    shared: Arc<(Mutex<Inner>, Condvar)>,
}

impl Default for DialogSlot {
    fn default() -> Self {
        Self {
            shared: Arc::new((
                Mutex::new(Inner {
                    state: DialogState::Idle,
                    epoch: 0,
                }),
                Condvar::new(),
            )),
        }
    }
}

impl DialogSlot {
    /// Activates a context, replacing (and cancelling the TTL of) any previous
    /// one. With `defer` the expiry timer is not started until
    /// [`DialogSlot::arm_deferred`].
    pub fn set(&self, node: CommandNode, duration: Duration, defer: bool) {
        let (lock, cvar) = &*self.shared;
        let epoch = {
            let mut inner = lock.lock().expect("dialog state poisoned");
            inner.epoch += 1;
            inner.state = DialogState::Active {
                node,
                duration,
                armed: !defer,
            };
            inner.epoch
        };
        cvar.notify_all();
        if !defer {
            self.spawn_expiry(epoch, duration);
        }
    }

    /// Starts the TTL of a context that was set with deferred arming. No-op
    /// when idle or already armed.
    pub fn arm_deferred(&self) {
        let (lock, _) = &*self.shared;
        let pending = {
            let mut inner = lock.lock().expect("dialog state poisoned");
            let epoch = inner.epoch;
            match &mut inner.state {
                DialogState::Active { armed, duration, .. } if !*armed => {
                    *armed = true;
                    Some((epoch, *duration))
                }
                _ => None,
            }
        };
        if let Some((epoch, duration)) = pending {
            self.spawn_expiry(epoch, duration);
        }
    }

    /// Returns to `Idle`, cancelling the TTL. Safe to call any number of
    /// times.
    pub fn clear(&self) {
        let (lock, cvar) = &*self.shared;
        {
            let mut inner = lock.lock().expect("dialog state poisoned");
            if matches!(inner.state, DialogState::Idle) {
                return;
            }
            inner.state = DialogState::Idle;
            inner.epoch += 1;
        }
        cvar.notify_all();
    }

    pub fn is_idle(&self) -> bool {
        let (lock, _) = &*self.shared;
        matches!(
            lock.lock().expect("dialog state poisoned").state,
            DialogState::Idle
        )
    }

    /// The active subtree, if any.
    pub fn active_node(&self) -> Option<CommandNode> {
        self.active().map(|(node, _)| node)
    }

    /// The active subtree together with the duration it was set with.
    pub fn active(&self) -> Option<(CommandNode, Duration)> {
        let (lock, _) = &*self.shared;
        let inner = lock.lock().expect("dialog state poisoned");
        match &inner.state {
            DialogState::Active { node, duration, .. } => Some((node.clone(), *duration)),
            DialogState::Idle => None,
        }
    }

    fn spawn_expiry(&self, epoch: u64, duration: Duration) {
        let shared = Arc::clone(&self.shared);
        thread::spawn(move || {
            let deadline = Instant::now() + duration;
            let (lock, cvar) = &*shared;
            let mut inner = lock.lock().expect("dialog state poisoned");
            while inner.epoch == epoch {
                let now = Instant::now();
                if now >= deadline {
                    inner.state = DialogState::Idle;
                    inner.epoch += 1;
                    debug!("dialog context expired");
                    return;
                }
                let (guard, _) = cvar
                    .wait_timeout(inner, deadline - now)
                    .expect("dialog state poisoned");
                inner = guard;
            }
            // Epoch moved on: the context was cleared or replaced.
        });
    }
}

impl Engine {
    /// Activates a dialog context: the next utterance resolves against `node`
    /// instead of the top-level command tree, for `duration` (the configured
    /// default when `None`).
    ///
    /// When `context_wait_for_delivery` is configured together with a remote
    /// output mode, the TTL does not start counting until the transport
    /// confirms delivery via [`Engine::context_commit`] — a slow remote client
    /// must receive its prompt before the window opens.
    pub fn context_set(&mut self, node: CommandNode, duration: Option<Duration>) {
        let duration = duration.unwrap_or(self.config.context_default_ttl);
        let defer = self.config.context_wait_for_delivery
            && self
                .config
                .output_modes
                .iter()
                .any(|mode| matches!(mode, OutputMode::Text | OutputMode::Wav));
        debug!(?duration, defer, "dialog context set");
        self.dialog.set(node, duration, defer);
    }

    /// Signals that the reply prompting the continuation reached its client,
    /// starting a deferred TTL. No-op otherwise.
    pub fn context_commit(&mut self) {
        self.dialog.arm_deferred();
    }

    /// Drops the active dialog context, if any. Idempotent.
    pub fn context_clear(&mut self) {
        self.dialog.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Action, CommandNode};

    fn some_node() -> CommandNode {
        CommandNode::Leaf(Action::plain(|_, _| Ok(())))
    }

    #[test]
    fn clear_is_idempotent() {
        let slot = DialogSlot::default();
        slot.set(some_node(), Duration::from_secs(30), false);
        slot.clear();
        slot.clear();
        assert!(slot.is_idle());
    }

    #[test]
    fn context_expires_after_ttl() {
        let slot = DialogSlot::default();
        slot.set(some_node(), Duration::from_millis(40), false);
        assert!(!slot.is_idle());
        thread::sleep(Duration::from_millis(120));
        assert!(slot.is_idle());
    }

    #[test]
    fn replacing_a_context_cancels_the_old_ttl() {
        let slot = DialogSlot::default();
        slot.set(some_node(), Duration::from_millis(40), false);
        slot.set(some_node(), Duration::from_secs(60), false);
        thread::sleep(Duration::from_millis(120));
        // The short TTL belonged to the replaced context and must not clear
        // the new one.
        assert!(!slot.is_idle());
        assert_eq!(slot.active().map(|(_, d)| d), Some(Duration::from_secs(60)));
    }

    #[test]
    fn deferred_context_only_expires_once_armed() {
        let slot = DialogSlot::default();
        slot.set(some_node(), Duration::from_millis(40), true);
        thread::sleep(Duration::from_millis(120));
        assert!(!slot.is_idle(), "unarmed context must not expire");

        slot.arm_deferred();
        thread::sleep(Duration::from_millis(120));
        assert!(slot.is_idle());
    }

    #[test]
    fn delivery_gated_context_waits_for_commit() {
        let config = crate::config::Config {
            context_wait_for_delivery: true,
            output_modes: vec![OutputMode::Text],
            ..crate::config::Config::default()
        };
        let mut engine = Engine::new(config);

        engine.context_set(some_node(), Some(Duration::from_millis(40)));
        thread::sleep(Duration::from_millis(120));
        // The reply has not been delivered yet, the window stays open.
        assert!(!engine.dialog.is_idle());

        engine.context_commit();
        thread::sleep(Duration::from_millis(120));
        assert!(engine.dialog.is_idle());
    }

    #[test]
    fn clear_beats_expiry_without_reviving_state() {
        let slot = DialogSlot::default();
        slot.set(some_node(), Duration::from_millis(60), false);
        slot.clear();
        thread::sleep(Duration::from_millis(150));
        assert!(slot.is_idle());
        // A context set after the stale expiry thread exits is unaffected.
        slot.set(some_node(), Duration::from_secs(60), false);
        assert!(!slot.is_idle());
    }
}
