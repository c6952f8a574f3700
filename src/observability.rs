// ── Mutation path metrics ───────────────────────────────────────

/// Counter: remote commits completed.
pub const COMMITS_TOTAL: &str = "prepslot_commits_total";

/// Counter: remote commits that failed and rolled the local view back.
pub const COMMIT_FAILURES_TOTAL: &str = "prepslot_commit_failures_total";

/// Counter: auto-assign runs.
pub const AUTO_ASSIGN_RUNS_TOTAL: &str = "prepslot_auto_assign_runs_total";

// ── Collaboration metrics ───────────────────────────────────────

/// Counter: remote-edit notices raised to the local editor.
pub const CONFLICT_NOTICES_TOTAL: &str = "prepslot_conflict_notices_total";

/// Counter: removals undone within the grace period.
pub const UNDO_CANCELLATIONS_TOTAL: &str = "prepslot_undo_cancellations_total";

/// Counter: delayed deletes that expired the grace period and went remote.
pub const DELAYED_DELETES_TOTAL: &str = "prepslot_delayed_deletes_total";

/// Install the fmt subscriber. Safe to call more than once; later calls
/// are no-ops (matters for tests sharing a process).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();
}
