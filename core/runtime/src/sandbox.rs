/// Process-wide (in practice, per-processor) sandbox state: whether a
/// guest call is currently executing. Owned by `TxProcessor` and threaded
/// through as `&mut self` rather than kept in a real global, per the
/// design note on modelling "process-wide mutable state" in a systems
/// language (spec.md §9).
#[derive(Debug, Default)]
pub struct Sandbox {
    sandboxed: bool,
}

impl Sandbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_sandboxed(&self) -> bool {
        self.sandboxed
    }

    /// Enter the sandboxed region. Idempotent: entering twice in a row is a
    /// no-op, not a panic, since re-entrancy is guarded one layer up by the
    /// processor's `is_processing` flag rather than here.
    pub fn enter(&mut self) {
        self.sandboxed = true;
    }

    pub fn leave(&mut self) {
        self.sandboxed = false;
    }

    /// Diagnostic guard for host-side code (the processor, the DB adapter)
    /// that must never run while sandboxed. Panics rather than returning a
    /// `Result`: a clock read from inside the sandbox is a programming
    /// error in this codebase, not a reachable guest input.
    pub fn assert_unsandboxed_clock(&self) {
        assert!(!self.sandboxed, "clock read attempted from within a sandboxed region");
    }

    pub fn assert_unsandboxed_random(&self) {
        assert!(!self.sandboxed, "randomness requested from within a sandboxed region");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enter_leave_is_idempotent() {
        let mut sandbox = Sandbox::new();
        assert!(!sandbox.is_sandboxed());
        sandbox.enter();
        sandbox.enter();
        assert!(sandbox.is_sandboxed());
        sandbox.leave();
        sandbox.leave();
        assert!(!sandbox.is_sandboxed());
    }

    #[test]
    #[should_panic(expected = "clock read")]
    fn clock_guard_panics_while_sandboxed() {
        let mut sandbox = Sandbox::new();
        sandbox.enter();
        sandbox.assert_unsandboxed_clock();
    }

    #[test]
    fn clock_guard_passes_when_unsandboxed() {
        let sandbox = Sandbox::new();
        sandbox.assert_unsandboxed_clock();
        sandbox.assert_unsandboxed_random();
    }
}
