//! Call frames and argument shadowing.
//!
//! Alias arguments bind to the fixed `arg1..arg25` idents, which are
//! global by name. Every call frame therefore saves the previous binding
//! of each slot it rebinds on that ident's own shadow LIFO, and restores
//! exactly those slots when it unwinds. This is what makes recursive
//! alias calls behave like ordinary stack-local shadowing.

use crate::ident::{IdentId, Shadowed, MAX_ARGS, NUMARGS_ID};
use crate::value::Value;
use crate::vm::Console;

/// One active alias invocation. The root frame (owner `None`) means no
/// alias is running.
pub struct Frame {
    pub owner: Option<IdentId>,
    /// Bit per argument ident this frame rebound (bit i = `arg{i+1}`,
    /// plus the `numargs` bit).
    pub used_args: u32,
    /// Idents shadowed by `local` inside this frame, restored on exit.
    pub locals: Vec<IdentId>,
}

impl Frame {
    pub fn root() -> Frame {
        Frame {
            owner: None,
            used_args: 0,
            locals: Vec::new(),
        }
    }
}

impl Console {
    /// Save `id`'s current binding on its own shadow stack and install a
    /// new value in its place.
    pub(crate) fn push_shadow(&mut self, id: IdentId, value: Value) {
        let Some(a) = self.regs.ident_mut(id).alias_mut() else {
            return;
        };
        let prev = Shadowed {
            value: std::mem::replace(&mut a.value, value),
            code: a.code.take(),
        };
        a.shadow.push(prev);
    }

    /// Undo the matching `push_shadow`.
    pub(crate) fn pop_shadow(&mut self, id: IdentId) {
        let Some(a) = self.regs.ident_mut(id).alias_mut() else {
            return;
        };
        if let Some(prev) = a.shadow.pop() {
            a.value = prev.value;
            a.code = prev.code;
        }
    }

    /// Bind an extra ident into the current frame (`local`); the frame's
    /// exit restores it.
    pub(crate) fn add_local(&mut self, id: IdentId) {
        self.push_shadow(id, Value::Null);
        if let Some(frame) = self.frames.last_mut() {
            frame.locals.push(id);
        }
    }

    /// Unwind the innermost frame: restore every argument slot its mask
    /// names and every `local` it registered, newest first.
    pub(crate) fn pop_frame(&mut self) {
        if self.frames.len() <= 1 {
            // The sentinel root never pops.
            return;
        }
        let frame = self.frames.pop().expect("frame stack underflow");
        for id in frame.locals.iter().rev() {
            self.pop_shadow(*id);
        }
        for bit in 0..=NUMARGS_ID {
            if frame.used_args & (1 << bit) != 0 {
                self.pop_shadow(bit);
            }
        }
    }

    /// Swap the current frame's bound arguments with their shadowed
    /// predecessors, exposing the caller's bindings (`doargs`). Returns
    /// whether anything was swapped; `redo_args` swaps back.
    pub(crate) fn undo_args(&mut self) -> bool {
        let Some(frame) = self.frames.last() else {
            return false;
        };
        if frame.owner.is_none() || frame.used_args == 0 {
            return false;
        }
        let mask = frame.used_args;
        self.swap_args(mask);
        true
    }

    pub(crate) fn redo_args(&mut self) {
        let Some(frame) = self.frames.last() else {
            return;
        };
        let mask = frame.used_args;
        self.swap_args(mask);
    }

    fn swap_args(&mut self, mask: u32) {
        for bit in 0..=NUMARGS_ID {
            if mask & (1 << bit) == 0 {
                continue;
            }
            let Some(a) = self.regs.ident_mut(bit).alias_mut() else {
                continue;
            };
            if let Some(top) = a.shadow.last_mut() {
                std::mem::swap(&mut a.value, &mut top.value);
                std::mem::swap(&mut a.code, &mut top.code);
            }
        }
    }

    /// Depth of the frame stack, counting the sentinel root.
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Number of arguments the innermost alias call received.
    pub fn current_numargs(&self) -> i32 {
        if self.frames.len() <= 1 {
            return 0;
        }
        self.lookup_value(NUMARGS_ID).get_int()
    }
}

/// The bitmask covers `arg1..arg25` plus `numargs`; keep that within u32.
const _: () = assert!(MAX_ARGS + 1 <= 32);
