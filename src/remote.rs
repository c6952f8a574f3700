use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

/// Remote write rejected or unavailable. Always retryable from the
/// engine's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError(pub String);

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "remote store: {}", self.0)
    }
}

impl std::error::Error for RemoteError {}

/// The managed backend the gateway commits to. Implementations are the
/// product's data store; the engine only needs these operations.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn put_assignment(&self, assignment: &SlotAssignment) -> Result<(), RemoteError>;
    async fn delete_assignment(&self, id: Ulid) -> Result<(), RemoteError>;
    /// Clear the day's assignments and write the replacement set in one
    /// remote operation (last-write-wins across concurrent editors).
    async fn replace_day(
        &self,
        schedule_id: Ulid,
        day: CycleDay,
        assignments: &[SlotAssignment],
    ) -> Result<(), RemoteError>;
    async fn clear_day(&self, schedule_id: Ulid, day: CycleDay) -> Result<(), RemoteError>;
    async fn put_change_request(&self, request: &ChangeRequest) -> Result<(), RemoteError>;
    /// Drop the schedule and every dependent record.
    async fn purge_schedule(&self, schedule_id: Ulid) -> Result<(), RemoteError>;

    async fn fetch_assignments(&self, schedule_id: Ulid) -> Result<Vec<SlotAssignment>, RemoteError>;
    async fn fetch_submissions(&self, schedule_id: Ulid) -> Result<Vec<Submission>, RemoteError>;
    async fn fetch_change_requests(&self, schedule_id: Ulid)
    -> Result<Vec<ChangeRequest>, RemoteError>;
}

// ── In-memory double ─────────────────────────────────────

/// DashMap-backed RemoteStore used by the tests and as a reference
/// implementation. `fail_next(n)` makes the next n store operations fail,
/// and every delete is logged so tests can assert the undo path never
/// reached here.
#[derive(Default)]
pub struct InMemoryRemote {
    assignments: DashMap<Ulid, SlotAssignment>,
    submissions: DashMap<Ulid, Submission>,
    change_requests: DashMap<Ulid, ChangeRequest>,
    failures_remaining: AtomicUsize,
    delete_log: Mutex<Vec<Ulid>>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` store operations fail.
    pub fn fail_next(&self, n: usize) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    pub fn delete_calls(&self) -> Vec<Ulid> {
        self.delete_log.lock().unwrap().clone()
    }

    pub fn assignment(&self, id: &Ulid) -> Option<SlotAssignment> {
        self.assignments.get(id).map(|e| e.value().clone())
    }

    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }

    /// Seed a submission (the form collaborator's job in production).
    pub fn put_submission(&self, submission: Submission) {
        self.submissions.insert(submission.id, submission);
    }

    fn gate(&self, op: &str) -> Result<(), RemoteError> {
        let failed = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            Err(RemoteError(format!("injected failure: {op}")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemote {
    async fn put_assignment(&self, assignment: &SlotAssignment) -> Result<(), RemoteError> {
        self.gate("put_assignment")?;
        self.assignments
            .insert(assignment.id, assignment.clone());
        Ok(())
    }

    async fn delete_assignment(&self, id: Ulid) -> Result<(), RemoteError> {
        self.delete_log.lock().unwrap().push(id);
        self.gate("delete_assignment")?;
        self.assignments.remove(&id);
        Ok(())
    }

    async fn replace_day(
        &self,
        schedule_id: Ulid,
        day: CycleDay,
        assignments: &[SlotAssignment],
    ) -> Result<(), RemoteError> {
        self.gate("replace_day")?;
        self.assignments
            .retain(|_, a| !(a.schedule_id == schedule_id && a.day == day));
        for a in assignments {
            self.assignments.insert(a.id, a.clone());
        }
        Ok(())
    }

    async fn clear_day(&self, schedule_id: Ulid, day: CycleDay) -> Result<(), RemoteError> {
        self.gate("clear_day")?;
        self.assignments
            .retain(|_, a| !(a.schedule_id == schedule_id && a.day == day));
        Ok(())
    }

    async fn put_change_request(&self, request: &ChangeRequest) -> Result<(), RemoteError> {
        self.gate("put_change_request")?;
        self.change_requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn purge_schedule(&self, schedule_id: Ulid) -> Result<(), RemoteError> {
        self.gate("purge_schedule")?;
        self.assignments.retain(|_, a| a.schedule_id != schedule_id);
        self.change_requests
            .retain(|_, cr| cr.schedule_id != schedule_id);
        self.submissions
            .retain(|_, s| s.schedule_id != schedule_id);
        Ok(())
    }

    async fn fetch_assignments(
        &self,
        schedule_id: Ulid,
    ) -> Result<Vec<SlotAssignment>, RemoteError> {
        self.gate("fetch_assignments")?;
        Ok(self
            .assignments
            .iter()
            .filter(|e| e.value().schedule_id == schedule_id)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn fetch_submissions(&self, schedule_id: Ulid) -> Result<Vec<Submission>, RemoteError> {
        self.gate("fetch_submissions")?;
        Ok(self
            .submissions
            .iter()
            .filter(|e| e.value().schedule_id == schedule_id)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn fetch_change_requests(
        &self,
        schedule_id: Ulid,
    ) -> Result<Vec<ChangeRequest>, RemoteError> {
        self.gate("fetch_change_requests")?;
        Ok(self
            .change_requests
            .iter()
            .filter(|e| e.value().schedule_id == schedule_id)
            .map(|e| e.value().clone())
            .collect())
    }
}
