//! The VM's between-instruction hook (spec.md §5's "suspension" seam): the
//! sole extension point for an external event loop, a debugger's pause
//! button, or execution tracing.
//!
//! [`NoHook`] compiles away entirely via monomorphization — the VM is
//! generic over `H: VmHook`, so a build that never installs a hook pays
//! nothing for the seam, the same trick [`crate::resource::NoLimitTracker`]
//! uses for resource bounding.

use log::{debug, trace};

use crate::bytecode::Opcode;

/// A read-only snapshot of VM state, handed to a hook once per instruction.
/// Deliberately minimal and non-mutable: spec.md §5 forbids a hook from
/// touching the VM's stacks.
#[derive(Debug, Clone, Copy)]
pub struct VmView<'a> {
    pub ip: usize,
    pub opcode: Opcode,
    pub operand_depth: usize,
    pub call_depth: usize,
    pub function_name: &'a str,
}

/// What a hook asks the VM to do after observing one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookAction {
    /// Proceed normally.
    Continue,
    /// Unwind with `RuntimeErrorKind::Aborted`, leaving the VM reusable
    /// (spec.md §5's cancellation seam).
    Abort,
}

/// The VM's execution-observability capability.
pub trait VmHook {
    /// Called once between every instruction dispatch.
    fn step(&mut self, view: &VmView<'_>) -> HookAction;
}

/// Zero-cost default: never installed, never called in the hot loop's
/// generic-monomorphized form, always continues if it is.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHook;

impl VmHook for NoHook {
    #[inline(always)]
    fn step(&mut self, _view: &VmView<'_>) -> HookAction {
        HookAction::Continue
    }
}

/// Emits a `trace!` record per instruction and a `debug!` record per call,
/// through the ambient `log` facade rather than writing to stderr directly
/// (an embedder wires up whichever subscriber it wants, same as
/// `wisp-cli`'s `simple_logger` installation).
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingHook;

impl VmHook for TracingHook {
    fn step(&mut self, view: &VmView<'_>) -> HookAction {
        trace!("ip={} op={} stack={} calls={} fn={}", view.ip, view.opcode, view.operand_depth, view.call_depth, view.function_name);
        if matches!(view.opcode, Opcode::Call | Opcode::Tail) {
            debug!("entering call in {} (depth {})", view.function_name, view.call_depth);
        }
        HookAction::Continue
    }
}

/// Counts instructions dispatched and the deepest call stack observed.
/// Used by tests asserting bounded call-stack growth under tail recursion
/// (spec.md §8 property 5) without needing a full tracing subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct CountingHook {
    pub instructions: u64,
    pub max_call_depth: usize,
}

impl VmHook for CountingHook {
    fn step(&mut self, view: &VmView<'_>) -> HookAction {
        self.instructions += 1;
        self.max_call_depth = self.max_call_depth.max(view.call_depth);
        HookAction::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(call_depth: usize) -> VmView<'static> {
        VmView { ip: 0, opcode: Opcode::Nop, operand_depth: 0, call_depth, function_name: "top" }
    }

    #[test]
    fn counting_hook_tracks_instructions_and_peak_depth() {
        let mut hook = CountingHook::default();
        hook.step(&view(1));
        hook.step(&view(3));
        hook.step(&view(2));
        assert_eq!(hook.instructions, 3);
        assert_eq!(hook.max_call_depth, 3);
    }

    #[test]
    fn no_hook_always_continues() {
        let mut hook = NoHook;
        assert_eq!(hook.step(&view(0)), HookAction::Continue);
    }
}
