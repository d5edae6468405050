use thiserror::Error;

/// Why the dispatch loop stopped. Distinguished from `VmError` so a caller can tell a
/// clean halt apart from a hard failure without inspecting exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// PC moved to or past `HALT_BOUNDARY`.
    PcOutOfRange,
    /// A `HALT` opcode (or a `JMP` degraded from a self-loop) executed.
    HaltOpcode,
    /// A blocking read hit end-of-input; treated as a normal termination, not a fault.
    InputEof,
    /// `Vm::run`'s caller-supplied step bound was reached before any other halt
    /// condition. Not part of the guest-observable contract of §7 — it exists so
    /// callers (tests, in particular) can compare a genuinely non-terminating raw
    /// SUBLEQ program against its optimized counterpart without running forever.
    StepLimitReached,
}

#[derive(Debug, Error)]
pub enum VmError {
    /// Already folded into a clean `HaltReason::InputEof` by `run`; retained as a
    /// distinct variant so callers that bypass `run` (e.g. single-stepping) can still
    /// observe it as an error.
    #[error("input stream reached end-of-input")]
    InputEof,
    #[error("output stream write failed: {0}")]
    OutputFailed(#[from] std::io::Error),
}
