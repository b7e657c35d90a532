//! Cooperative queues: deferred commands, host triggers, key-release
//! actions. Nothing here yields or preempts; the host polls once per
//! frame tick and everything runs synchronously on its thread.

use std::collections::VecDeque;

use crate::ident::{IdentId, NativeFn};
use crate::value::Value;
use crate::vm::Console;

/// One `sleep`-deferred command.
pub struct SleepEntry {
    pub remaining_ms: i64,
    pub cmd: Value,
}

/// A `D`-style command captured during a key press, replayed with the
/// down slot forced to 0 when the key is released.
pub struct ReleaseAction {
    pub native: NativeFn,
    pub args: Vec<Value>,
}

impl Console {
    pub fn add_sleep(&mut self, delay_ms: i64, cmd: Value) {
        self.sleeps.push(SleepEntry {
            remaining_ms: delay_ms,
            cmd,
        });
    }

    pub fn clear_sleeps(&mut self) {
        self.sleeps.clear();
    }

    pub fn pending_sleeps(&self) -> usize {
        self.sleeps.len()
    }

    /// Host frame tick. Ages every deferred command by `frame_ms` and
    /// executes at most one that has come due; the rest wait for later
    /// ticks. Cancellation is just `clear_sleeps` before the deadline.
    pub fn update(&mut self, frame_ms: u64) {
        for entry in &mut self.sleeps {
            entry.remaining_ms -= frame_ms as i64;
        }
        let due = self.sleeps.iter().position(|e| e.remaining_ms <= 0);
        if let Some(at) = due {
            let entry = self.sleeps.remove(at);
            self.run_value(&entry.cmd);
        }
    }

    // -------------------------
    // Trigger queue
    // -------------------------

    /// Enqueue a pending host-side event by ident. Interpretation of the
    /// drained idents is entirely up to the host.
    pub fn queue_trigger(&mut self, id: IdentId) {
        self.triggers.push_back(id);
    }

    pub fn queue_trigger_name(&mut self, name: &str) {
        let id = self.regs.lookup_or_create_unknown(name);
        self.queue_trigger(id);
    }

    pub fn drain_triggers(&mut self) -> VecDeque<IdentId> {
        std::mem::take(&mut self.triggers)
    }

    // -------------------------
    // Release actions
    // -------------------------

    /// Replay every release action queued by `D`-param commands during
    /// `execute_pressed`, with the down slot reporting 0.
    pub fn release_all(&mut self) {
        let actions = std::mem::take(&mut self.release_actions);
        for action in actions {
            let native = action.native.clone();
            native(self, &action.args);
        }
    }

    pub fn pending_release_actions(&self) -> usize {
        self.release_actions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_due_entry_per_tick() {
        let mut con = Console::new();
        con.execute("sleep 20 [alias a 1]; sleep 20 [alias b 2]")
            .unwrap();
        assert_eq!(con.pending_sleeps(), 2);

        con.update(10);
        assert_eq!(con.pending_sleeps(), 2);

        con.update(10);
        // Both are due, only one ran.
        assert_eq!(con.pending_sleeps(), 1);
        con.update(0);
        assert_eq!(con.pending_sleeps(), 0);

        assert_eq!(con.get_alias("a").map(|v| v.get_int()), Some(1));
        assert_eq!(con.get_alias("b").map(|v| v.get_int()), Some(2));
    }

    #[test]
    fn clear_sleeps_cancels() {
        let mut con = Console::new();
        con.execute("sleep 5 [alias fired 1]").unwrap();
        con.clear_sleeps();
        con.update(10);
        assert!(con.get_alias("fired").is_none());
    }

    #[test]
    fn triggers_drain_fifo() {
        let mut con = Console::new();
        con.queue_trigger_name("level_start");
        con.queue_trigger_name("level_end");
        let drained = con.drain_triggers();
        assert_eq!(drained.len(), 2);
        assert!(con.drain_triggers().is_empty());
        let first = con.registry().ident(drained[0]).name.clone();
        assert_eq!(&*first, "level_start");
    }
}
