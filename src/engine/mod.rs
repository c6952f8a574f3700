mod error;
pub mod matching;
mod mutations;
mod queries;
#[cfg(test)]
mod tests;
mod undo;

pub use error::EngineError;
pub use matching::{MatchOutcome, MatchedPair, match_day};

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;
use crate::notify::{Signal, SignalHub};
use crate::remote::{RemoteError, RemoteStore};

use self::undo::UndoQueue;

pub type SharedBoard = Arc<RwLock<BoardState>>;

/// Result of a spawned remote commit. The caller is never blocked on it;
/// awaiting the handle is optional.
pub type CommitHandle = tokio::task::JoinHandle<Result<(), EngineError>>;

/// User-facing summary of an auto-assign run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoAssignReport {
    pub day: CycleDay,
    pub matched: usize,
    pub eligible: usize,
    pub cutoff_excluded: usize,
}

// ── Committed local view ─────────────────────────────────

/// The committed state of one open schedule view. Mutated only through
/// the transition functions below, which maintain the one-per-slot and
/// one-per-submission invariants; ScheduleBoard wraps every transition
/// with the optimistic-apply/rollback bookkeeping.
#[derive(Debug, Clone)]
pub struct BoardState {
    pub schedule: ScheduleConfig,
    /// Keyed by ulid, which sorts by creation time — iteration order is
    /// submission order, the matching tie-break.
    pub submissions: BTreeMap<Ulid, Submission>,
    pub assignments: HashMap<Ulid, SlotAssignment>,
    pub change_requests: HashMap<Ulid, ChangeRequest>,
}

impl BoardState {
    pub fn new(schedule: ScheduleConfig) -> Self {
        Self {
            schedule,
            submissions: BTreeMap::new(),
            assignments: HashMap::new(),
            change_requests: HashMap::new(),
        }
    }

    pub fn assignment_for_slot(&self, day: CycleDay, slot: &str) -> Option<&SlotAssignment> {
        self.assignments
            .values()
            .find(|a| a.day == day && a.slot == slot)
    }

    pub fn assignment_for_submission(
        &self,
        day: CycleDay,
        submission_id: Ulid,
    ) -> Option<&SlotAssignment> {
        self.assignments
            .values()
            .find(|a| a.day == day && a.submission_id == submission_id)
    }

    /// Insert one assignment, clearing whatever occupied its slot and
    /// whatever its submission already held that day. Returns the
    /// displaced records (for the remote commit).
    pub fn apply_assign(&mut self, assignment: SlotAssignment) -> Vec<SlotAssignment> {
        let displaced_ids: Vec<Ulid> = self
            .assignments
            .values()
            .filter(|a| {
                a.day == assignment.day
                    && (a.slot == assignment.slot || a.submission_id == assignment.submission_id)
            })
            .map(|a| a.id)
            .collect();
        let displaced = displaced_ids
            .iter()
            .filter_map(|id| self.assignments.remove(id))
            .collect();
        self.assignments.insert(assignment.id, assignment);
        displaced
    }

    pub fn apply_remove(&mut self, id: Ulid) -> Option<SlotAssignment> {
        self.assignments.remove(&id)
    }

    /// Replace one day's assignment set wholesale. Replace, never
    /// accumulate: the day's previous records are dropped first.
    pub fn apply_replace_day(&mut self, day: CycleDay, replacement: Vec<SlotAssignment>) {
        self.assignments.retain(|_, a| a.day != day);
        for a in replacement {
            debug_assert_eq!(a.day, day);
            self.assignments.insert(a.id, a);
        }
    }

    pub fn apply_clear_day(&mut self, day: CycleDay) {
        self.assignments.retain(|_, a| a.day != day);
    }
}

// ── Mutation gateway ─────────────────────────────────────

/// Single logical owner of one schedule's in-memory view. All writers go
/// through here so the optimistic-apply/rollback bookkeeping stays
/// consistent; direct writes to the shared state bypass the contract.
pub struct ScheduleBoard {
    pub state: SharedBoard,
    pub(crate) remote: Arc<dyn RemoteStore>,
    pub signals: Arc<SignalHub>,
    actor: String,
    undo: UndoQueue,
}

impl ScheduleBoard {
    pub fn new(
        schedule: ScheduleConfig,
        remote: Arc<dyn RemoteStore>,
        signals: Arc<SignalHub>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            state: Arc::new(RwLock::new(BoardState::new(schedule))),
            remote,
            signals,
            actor: actor.into(),
            undo: UndoQueue::new(),
        }
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub async fn schedule_id(&self) -> Ulid {
        self.state.read().await.schedule.id
    }

    /// Pull the full entity set from the remote store into the local view.
    /// Used once on open; the change feed keeps it current afterwards.
    pub async fn hydrate(&self) -> Result<(), EngineError> {
        let sid = self.schedule_id().await;
        let submissions = self
            .remote
            .fetch_submissions(sid)
            .await
            .map_err(|e| EngineError::CommitFailed(e.to_string()))?;
        if submissions.len() > crate::limits::MAX_SUBMISSIONS_PER_SCHEDULE {
            return Err(EngineError::LimitExceeded("too many submissions"));
        }
        let assignments = self
            .remote
            .fetch_assignments(sid)
            .await
            .map_err(|e| EngineError::CommitFailed(e.to_string()))?;
        let change_requests = self
            .remote
            .fetch_change_requests(sid)
            .await
            .map_err(|e| EngineError::CommitFailed(e.to_string()))?;

        let mut st = self.state.write().await;
        st.submissions = submissions.into_iter().map(|s| (s.id, s)).collect();
        st.assignments = assignments.into_iter().map(|a| (a.id, a)).collect();
        st.change_requests = change_requests.into_iter().map(|c| (c.id, c)).collect();
        Ok(())
    }

    /// Run the remote commit off the caller's path. On failure the
    /// rollback closure restores the pre-mutation snapshot and a
    /// CommitFailed signal is broadcast; no partial-commit state is ever
    /// exposed to the view.
    pub(super) fn spawn_commit<F, R>(
        &self,
        op: &'static str,
        schedule_id: Ulid,
        rollback: R,
        commit: F,
    ) -> CommitHandle
    where
        F: Future<Output = Result<(), RemoteError>> + Send + 'static,
        R: FnOnce(&mut BoardState) + Send + 'static,
    {
        let state = self.state.clone();
        let signals = self.signals.clone();
        tokio::spawn(async move {
            match commit.await {
                Ok(()) => {
                    metrics::counter!(crate::observability::COMMITS_TOTAL).increment(1);
                    Ok(())
                }
                Err(e) => {
                    tracing::warn!("{op} commit failed, rolling back: {e}");
                    metrics::counter!(crate::observability::COMMIT_FAILURES_TOTAL).increment(1);
                    let mut st = state.write().await;
                    rollback(&mut st);
                    drop(st);
                    signals.send(
                        schedule_id,
                        Signal::CommitFailed {
                            op,
                            detail: e.to_string(),
                        },
                    );
                    Err(EngineError::CommitFailed(e.to_string()))
                }
            }
        })
    }
}
