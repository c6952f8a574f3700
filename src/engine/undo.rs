use std::sync::Arc;

use dashmap::DashMap;
use ulid::Ulid;

use crate::limits::UNDO_GRACE;
use crate::model::SlotAssignment;
use crate::notify::Signal;

use super::{EngineError, ScheduleBoard};

/// Removals waiting out the undo grace period. Ownership of an entry is
/// the race: whoever `take`s it first decides the outcome — undo restores
/// the record locally, the expired grace task issues the remote delete.
#[derive(Clone)]
pub(super) struct UndoQueue {
    pending: Arc<DashMap<Ulid, SlotAssignment>>,
}

impl UndoQueue {
    pub(super) fn new() -> Self {
        Self {
            pending: Arc::new(DashMap::new()),
        }
    }

    pub(super) fn is_pending(&self, id: &Ulid) -> bool {
        self.pending.contains_key(id)
    }

    /// At most one pending entry per assignment id.
    pub(super) fn park(&self, removed: SlotAssignment) -> Result<(), EngineError> {
        let id = removed.id;
        if self.pending.insert(id, removed).is_some() {
            return Err(EngineError::PendingRemoval(id));
        }
        Ok(())
    }

    pub(super) fn take(&self, id: &Ulid) -> Option<SlotAssignment> {
        self.pending.remove(id).map(|(_, a)| a)
    }
}

impl ScheduleBoard {
    /// Remove an assignment optimistically. The local view updates at
    /// once; the remote delete only fires after `UNDO_GRACE` and is
    /// skipped entirely if `undo_remove` reclaims the record first.
    pub async fn remove_assignment(&self, id: Ulid) -> Result<(), EngineError> {
        let mut st = self.state.write().await;
        if !st.schedule.is_active() {
            return Err(EngineError::ScheduleNotActive);
        }
        if self.undo.is_pending(&id) {
            return Err(EngineError::PendingRemoval(id));
        }
        let Some(removed) = st.apply_remove(id) else {
            return Err(EngineError::NotFound(id));
        };
        let sid = st.schedule.id;
        drop(st);

        self.undo.park(removed)?;
        tracing::debug!("assignment {id} removed, delete parked for {UNDO_GRACE:?}");

        let undo = self.undo.clone();
        let state = self.state.clone();
        let remote = self.remote.clone();
        let signals = self.signals.clone();
        tokio::spawn(async move {
            tokio::time::sleep(UNDO_GRACE).await;
            // Lost the race to undo_remove: nothing to delete.
            let Some(removed) = undo.take(&id) else {
                return;
            };
            metrics::counter!(crate::observability::DELAYED_DELETES_TOTAL).increment(1);
            if let Err(e) = remote.delete_assignment(id).await {
                tracing::warn!("delayed delete of {id} failed, restoring: {e}");
                metrics::counter!(crate::observability::COMMIT_FAILURES_TOTAL).increment(1);
                let mut st = state.write().await;
                st.assignments.insert(removed.id, removed);
                drop(st);
                signals.send(
                    sid,
                    Signal::CommitFailed {
                        op: "remove_assignment",
                        detail: e.to_string(),
                    },
                );
            }
        });
        Ok(())
    }

    /// Cancel a pending removal within the grace period. Restores the
    /// exact removed record (same id, same `assigned_by`) with no remote
    /// round trip. Returns false when the window already elapsed.
    pub async fn undo_remove(&self, id: Ulid) -> bool {
        let Some(restored) = self.undo.take(&id) else {
            return false;
        };
        metrics::counter!(crate::observability::UNDO_CANCELLATIONS_TOTAL).increment(1);
        tracing::debug!("removal of {id} undone within the grace period");
        let mut st = self.state.write().await;
        st.assignments.insert(restored.id, restored);
        true
    }
}
