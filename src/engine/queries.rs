use ulid::Ulid;

use crate::model::{ChangeRequest, ChangeStatus, CycleDay, SlotAssignment, Submission};

use super::ScheduleBoard;

impl ScheduleBoard {
    /// A day's assignments in grid order.
    pub async fn day_assignments(&self, day: CycleDay) -> Vec<SlotAssignment> {
        let st = self.state.read().await;
        let grid = st.schedule.grid;
        let mut out: Vec<SlotAssignment> = st
            .assignments
            .values()
            .filter(|a| a.day == day)
            .cloned()
            .collect();
        out.sort_by_key(|a| grid.slot_position(&a.slot));
        out
    }

    pub async fn assignment(&self, id: Ulid) -> Option<SlotAssignment> {
        self.state.read().await.assignments.get(&id).cloned()
    }

    pub async fn assignment_for_submission(
        &self,
        day: CycleDay,
        submission_id: Ulid,
    ) -> Option<SlotAssignment> {
        self.state
            .read()
            .await
            .assignment_for_submission(day, submission_id)
            .cloned()
    }

    /// All submissions in submission order.
    pub async fn submissions(&self) -> Vec<Submission> {
        self.state.read().await.submissions.values().cloned().collect()
    }

    /// Submissions that opted out of a day, in submission order.
    pub async fn opted_out(&self, day: CycleDay) -> Vec<Submission> {
        self.state
            .read()
            .await
            .submissions
            .values()
            .filter(|s| s.day_plan(day).opted_out)
            .cloned()
            .collect()
    }

    pub async fn change_requests(&self, status: Option<ChangeStatus>) -> Vec<ChangeRequest> {
        let st = self.state.read().await;
        let mut out: Vec<ChangeRequest> = st
            .change_requests
            .values()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        out.sort_by_key(|r| r.id);
        out
    }

    /// Render a day's board as the stable flat-text export.
    pub async fn export_day(&self, day: CycleDay) -> String {
        crate::export::export_day(&*self.state.read().await, day)
    }
}
