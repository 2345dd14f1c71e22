//! The apply gate: a pure policy decision over caller-supplied flags.
//!
//! Evaluated once per mutation request, before any capture or write. It has
//! no side effects and no dependency on the journal or the network, so the
//! caller can render dry-run previews and confirmation prompts from its
//! decision alone.

/// What the engine should do with a requested operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Proceed with capture and write.
    Execute,
    /// Print the planned diff; perform no capture, no write, no journaling.
    DryRun,
    /// The caller must obtain an explicit yes before the engine proceeds.
    RequireConfirmation,
    /// Non-interactive run without prior confirmation: refuse rather than
    /// hang on a prompt nobody will answer.
    RefuseNonInteractive,
}

/// Decide how a request proceeds.
///
/// `confirmed` is a prior explicit yes (`--yes` or an answered prompt);
/// `interactive` is whether stdin can actually ask.
pub fn decide(is_write: bool, dry_run: bool, confirmed: bool, interactive: bool) -> GateDecision {
    if !is_write {
        return GateDecision::Execute;
    }
    if dry_run {
        return GateDecision::DryRun;
    }
    if confirmed {
        return GateDecision::Execute;
    }
    if interactive {
        return GateDecision::RequireConfirmation;
    }
    GateDecision::RefuseNonInteractive
}
