//! Cooperative Timer Subsystem
//!
//! A fixed bank of timer slots polled by a host-provided driver loop. Nothing
//! here spawns threads or fires on its own: deadlines only take effect when
//! the host calls [`Engine::update_timers`], typically from the same loop that
//! feeds recognized speech into the engine. Capacity exhaustion is an expected
//! outcome signaled through `None`, not an error.

use crate::command::Action;
use crate::engine::Engine;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Number of concurrently running timers the bank supports.
pub const SLOT_COUNT: usize = 8;

#[derive(Default)]
struct Slot {
    /// `None` marks a free slot.
    deadline: Option<Instant>,
    on_end: Option<Action>,
}

/// The fixed-capacity slot array backing user-visible timers.
///
/// The bank is a pure data structure: callers pass in `now` so it stays
/// agnostic of the time source, and due callbacks are handed back rather than
/// invoked, keeping the engine borrow out of the bank.
#[derive(Default)]
pub struct TimerBank {
    slots: [Slot; SLOT_COUNT],
}

impl TimerBank {
    /// Arms the first free slot with `now + duration`, returning its index, or
    /// `None` when every slot is occupied.
    pub fn set(&mut self, now: Instant, duration: Duration, on_end: Action) -> Option<usize> {
        let (index, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.deadline.is_none())?;
        *slot = Slot {
            deadline: Some(now + duration),
            on_end: Some(on_end),
        };
        Some(index)
    }

    /// Frees slot `index`, handing back its end-callback so the caller can
    /// decide whether to run it. Freeing a free slot is a no-op.
    pub fn clear(&mut self, index: usize) -> Option<Action> {
        let slot = self.slots.get_mut(index)?;
        slot.deadline = None;
        slot.on_end.take()
    }

    /// Frees every occupied slot, dropping all end-callbacks unrun.
    pub fn clear_all(&mut self) {
        for slot in &mut self.slots {
            slot.deadline = None;
            slot.on_end = None;
        }
    }

    /// Frees every slot whose deadline has passed, returning the freed
    /// `(index, end-callback)` pairs in slot order.
    pub fn take_due(&mut self, now: Instant) -> Vec<(usize, Action)> {
        let mut due = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.deadline.is_some_and(|deadline| now >= deadline) {
                slot.deadline = None;
                if let Some(action) = slot.on_end.take() {
                    due.push((index, action));
                }
            }
        }
        due
    }

    /// Remaining time per occupied slot, in slot order. Slots already past
    /// their deadline report a zero remainder until the next poll frees them.
    pub fn remaining(&self, now: Instant) -> Vec<(usize, Duration)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.deadline
                    .map(|deadline| (index, deadline.saturating_duration_since(now)))
            })
            .collect()
    }
}

impl Engine {
    /// Starts a one-shot timer, returning its slot index or `None` when all
    /// [`SLOT_COUNT`] slots are busy.
    pub fn set_timer(&mut self, duration: Duration, on_end: Action) -> Option<usize> {
        let now = self.clock.now();
        let index = self.timers.set(now, duration, on_end);
        match index {
            Some(index) => info!(slot = index, ?duration, "timer armed"),
            None => warn!("no free timer slot, timer not armed"),
        }
        index
    }

    /// Frees timer slot `index`; with `run_end_callback` the stored callback
    /// runs first.
    pub fn clear_timer(&mut self, index: usize, run_end_callback: bool) -> anyhow::Result<()> {
        if let Some(action) = self.timers.clear(index) {
            if run_end_callback {
                action.invoke(self, "")?;
            }
        }
        Ok(())
    }

    /// Cancels every running timer without invoking any end-callback.
    pub fn clear_timers(&mut self) {
        self.timers.clear_all();
    }

    /// Polls the timer bank, firing the end-callback of every expired slot.
    ///
    /// This is the host driver's tick: the engine never fires timers on its
    /// own. Callback errors are logged and do not stop the poll.
    pub fn update_timers(&mut self) {
        let now = self.clock.now();
        for (index, action) in self.timers.take_due(now) {
            info!(slot = index, "timer expired");
            if let Err(err) = action.invoke(self, "") {
                warn!(slot = index, error = %err, "timer end-callback failed");
            }
        }
    }

    /// Remaining time of every running timer, for listing and cancellation
    /// commands.
    pub fn timer_deadlines(&self) -> Vec<(usize, Duration)> {
        self.timers.remaining(self.clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Action {
        Action::plain(|_, _| Ok(()))
    }

    #[test]
    fn ninth_timer_is_rejected() {
        let mut bank = TimerBank::default();
        let now = Instant::now();
        for expected in 0..SLOT_COUNT {
            assert_eq!(
                bank.set(now, Duration::from_secs(10), noop()),
                Some(expected)
            );
        }
        assert_eq!(bank.set(now, Duration::from_secs(10), noop()), None);
        // The first eight stay armed.
        assert_eq!(bank.remaining(now).len(), SLOT_COUNT);
    }

    #[test]
    fn due_slots_are_freed_and_reusable() {
        let mut bank = TimerBank::default();
        let start = Instant::now();
        bank.set(start, Duration::from_secs(1), noop());
        bank.set(start, Duration::from_secs(60), noop());

        let due = bank.take_due(start + Duration::from_secs(2));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].0, 0);

        // The freed slot is the first candidate again.
        assert_eq!(bank.set(start, Duration::from_secs(5), noop()), Some(0));
    }

    #[test]
    fn clear_all_drops_callbacks_unrun() {
        let mut bank = TimerBank::default();
        let start = Instant::now();
        bank.set(start, Duration::from_secs(1), noop());
        bank.set(start, Duration::from_secs(2), noop());
        bank.clear_all();
        assert!(bank.take_due(start + Duration::from_secs(10)).is_empty());
        assert!(bank.remaining(start).is_empty());
    }

    #[test]
    fn clearing_a_free_slot_is_a_no_op() {
        let mut bank = TimerBank::default();
        assert!(bank.clear(3).is_none());
        assert!(bank.clear(SLOT_COUNT + 1).is_none());
    }
}
