use ulid::Ulid;

use crate::limits::MAX_NOTE_LEN;
use crate::model::{
    ChangeReason, ChangeRequest, ChangeStatus, CycleDay, Lifecycle, SlotAssignment,
};
use crate::notify::Signal;

use super::matching;
use super::{AutoAssignReport, BoardState, CommitHandle, EngineError, ScheduleBoard};

fn ensure_active(st: &BoardState) -> Result<(), EngineError> {
    if st.schedule.is_active() {
        Ok(())
    } else {
        Err(EngineError::ScheduleNotActive)
    }
}

fn ensure_day_enabled(st: &BoardState, day: CycleDay) -> Result<(), EngineError> {
    if st.schedule.day_enabled(day) {
        Ok(())
    } else {
        Err(EngineError::DayDisabled(day))
    }
}

impl ScheduleBoard {
    /// Run the matcher over the current submission set and replace the
    /// day's assignments with the result. Validation, matching and the
    /// local apply all happen under one write lock, so a lock or close
    /// landing mid-run cannot be overwritten. The report reflects the
    /// local apply; the remote commit rides the returned handle.
    pub async fn run_auto_assign(
        &self,
        day: CycleDay,
    ) -> Result<(AutoAssignReport, CommitHandle), EngineError> {
        let mut st = self.state.write().await;
        ensure_active(&st)?;
        if st.schedule.locked {
            return Err(EngineError::ScheduleLocked);
        }
        let config = st.schedule.clone();
        let submissions: Vec<_> = st.submissions.values().cloned().collect();

        let outcome = matching::match_day(&submissions, &config, day)?;
        let replacement: Vec<SlotAssignment> = outcome
            .pairs
            .iter()
            .map(|pair| SlotAssignment {
                id: Ulid::new(),
                schedule_id: config.id,
                submission_id: pair.submission_id,
                day,
                slot: pair.slot.clone(),
                assigned_by: self.actor().to_string(),
            })
            .collect();

        let report = AutoAssignReport {
            day,
            matched: replacement.len(),
            eligible: outcome.eligible,
            cutoff_excluded: outcome.cutoff_excluded,
        };
        let snapshot = st.assignments.clone();
        st.apply_replace_day(day, replacement.clone());
        let sid = config.id;
        drop(st);

        tracing::info!(
            "auto-assign {day}: {} of {} eligible matched, {} beyond cutoff",
            report.matched,
            report.eligible,
            report.cutoff_excluded
        );
        metrics::counter!(crate::observability::AUTO_ASSIGN_RUNS_TOTAL).increment(1);

        let remote = self.remote.clone();
        let handle = self.spawn_commit(
            "replace_day",
            sid,
            move |st| st.assignments = snapshot,
            async move { remote.replace_day(sid, day, &replacement).await },
        );
        self.signals.send(
            sid,
            Signal::AutoAssignCompleted {
                day,
                matched: report.matched,
                cutoff_excluded: report.cutoff_excluded,
            },
        );
        Ok((report, handle))
    }

    /// Manual override. `Some(submission)` seats that submission in the
    /// slot, displacing the slot's occupant and the submission's existing
    /// assignment that day; `None` clears the slot.
    pub async fn assign_slot(
        &self,
        day: CycleDay,
        slot: &str,
        submission: Option<Ulid>,
    ) -> Result<CommitHandle, EngineError> {
        let mut st = self.state.write().await;
        ensure_active(&st)?;
        ensure_day_enabled(&st, day)?;
        if st.schedule.grid.slot_position(slot).is_none() {
            return Err(EngineError::UnknownSlot(slot.to_string()));
        }

        match submission {
            Some(submission_id) => {
                if !st.submissions.contains_key(&submission_id) {
                    return Err(EngineError::NotFound(submission_id));
                }
                let assignment = SlotAssignment {
                    id: Ulid::new(),
                    schedule_id: st.schedule.id,
                    submission_id,
                    day,
                    slot: slot.to_string(),
                    assigned_by: self.actor().to_string(),
                };
                let snapshot = st.assignments.clone();
                let displaced = st.apply_assign(assignment.clone());
                let sid = st.schedule.id;
                drop(st);

                let remote = self.remote.clone();
                Ok(self.spawn_commit(
                    "assign_slot",
                    sid,
                    move |st| st.assignments = snapshot,
                    async move {
                        for gone in &displaced {
                            remote.delete_assignment(gone.id).await?;
                        }
                        remote.put_assignment(&assignment).await
                    },
                ))
            }
            None => {
                let Some(existing) = st.assignment_for_slot(day, slot).cloned() else {
                    // Clearing an empty slot is a no-op, not an error.
                    return Ok(tokio::spawn(async { Ok(()) }));
                };
                let snapshot = st.assignments.clone();
                let _ = st.apply_remove(existing.id);
                let sid = st.schedule.id;
                drop(st);

                let remote = self.remote.clone();
                Ok(self.spawn_commit(
                    "assign_slot",
                    sid,
                    move |st| st.assignments = snapshot,
                    async move { remote.delete_assignment(existing.id).await },
                ))
            }
        }
    }

    /// Drop every assignment on a day.
    pub async fn clear_day(&self, day: CycleDay) -> Result<CommitHandle, EngineError> {
        let mut st = self.state.write().await;
        ensure_active(&st)?;
        ensure_day_enabled(&st, day)?;
        let snapshot = st.assignments.clone();
        st.apply_clear_day(day);
        let sid = st.schedule.id;
        drop(st);

        let remote = self.remote.clone();
        Ok(self.spawn_commit(
            "clear_day",
            sid,
            move |st| st.assignments = snapshot,
            async move { remote.clear_day(sid, day).await },
        ))
    }

    /// File an advisory change request against a submission. Allowed on a
    /// locked schedule: requests never move assignments by themselves.
    pub async fn create_change_request(
        &self,
        submission_id: Ulid,
        day: CycleDay,
        reason: ChangeReason,
        note: &str,
    ) -> Result<(Ulid, CommitHandle), EngineError> {
        if note.len() > MAX_NOTE_LEN {
            return Err(EngineError::LimitExceeded("change-request note too long"));
        }
        let mut st = self.state.write().await;
        ensure_active(&st)?;
        ensure_day_enabled(&st, day)?;
        if !st.submissions.contains_key(&submission_id) {
            return Err(EngineError::NotFound(submission_id));
        }
        let request = ChangeRequest {
            id: Ulid::new(),
            schedule_id: st.schedule.id,
            submission_id,
            day,
            reason,
            note: note.to_string(),
            status: ChangeStatus::Pending,
        };
        let id = request.id;
        st.change_requests.insert(id, request.clone());
        let sid = st.schedule.id;
        drop(st);

        let remote = self.remote.clone();
        let handle = self.spawn_commit(
            "create_change_request",
            sid,
            move |st| {
                st.change_requests.remove(&id);
            },
            async move { remote.put_change_request(&request).await },
        );
        Ok((id, handle))
    }

    pub async fn set_change_request_status(
        &self,
        id: Ulid,
        status: ChangeStatus,
    ) -> Result<CommitHandle, EngineError> {
        let mut st = self.state.write().await;
        ensure_active(&st)?;
        let Some(request) = st.change_requests.get_mut(&id) else {
            return Err(EngineError::NotFound(id));
        };
        let previous = request.status;
        request.status = status;
        let updated = request.clone();
        let sid = st.schedule.id;
        drop(st);

        let remote = self.remote.clone();
        Ok(self.spawn_commit(
            "set_change_request_status",
            sid,
            move |st| {
                if let Some(r) = st.change_requests.get_mut(&id) {
                    r.status = previous;
                }
            },
            async move { remote.put_change_request(&updated).await },
        ))
    }

    /// Drop all dependent state for an archived schedule, locally and
    /// remotely. Refused for any other lifecycle.
    pub async fn purge(&self) -> Result<CommitHandle, EngineError> {
        let mut st = self.state.write().await;
        if st.schedule.lifecycle != Lifecycle::Archived {
            return Err(EngineError::Validation(
                "only archived schedules can be purged",
            ));
        }
        let submissions = std::mem::take(&mut st.submissions);
        let assignments = std::mem::take(&mut st.assignments);
        let change_requests = std::mem::take(&mut st.change_requests);
        let sid = st.schedule.id;
        drop(st);

        tracing::info!("purging schedule {sid}");
        let remote = self.remote.clone();
        let signals = self.signals.clone();
        Ok(self.spawn_commit(
            "purge",
            sid,
            move |st| {
                st.submissions = submissions;
                st.assignments = assignments;
                st.change_requests = change_requests;
            },
            async move {
                remote.purge_schedule(sid).await?;
                signals.remove(&sid);
                Ok(())
            },
        ))
    }
}
