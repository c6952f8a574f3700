//! Change-feed consumer. The transport that tails the remote store is
//! external; this loop only consumes its ordered `MutationEvent` records
//! and folds them back into the local view.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::engine::ScheduleBoard;
use crate::limits::CONFLICT_NOTICE_COOLDOWN;
use crate::model::{EntityKind, MutationEvent};
use crate::notify::Signal;

/// Consume the mutation stream until the sender side closes. Each event
/// triggers a refetch of the affected entity set; a fetch failure logs a
/// warning and leaves the view stale until the next event. Assignment
/// events from another editor raise `Signal::RemoteEdit`, throttled to
/// one notice per `CONFLICT_NOTICE_COOLDOWN`.
pub async fn run_change_feed(board: Arc<ScheduleBoard>, mut events: mpsc::Receiver<MutationEvent>) {
    let sid = board.schedule_id().await;
    let mut last_notice: Option<Instant> = None;

    while let Some(event) = events.recv().await {
        tracing::debug!(
            "feed event: {:?} {:?} {} by {}",
            event.op,
            event.entity,
            event.entity_id,
            event.actor
        );
        if let Err(e) = refetch(&board, event.entity).await {
            tracing::warn!("feed refetch for {:?} failed, view stale: {e}", event.entity);
            continue;
        }

        if event.entity == EntityKind::Assignment && event.actor != board.actor() {
            let now = Instant::now();
            let due = last_notice.is_none_or(|t| now - t >= CONFLICT_NOTICE_COOLDOWN);
            if due {
                last_notice = Some(now);
                metrics::counter!(crate::observability::CONFLICT_NOTICES_TOTAL).increment(1);
                board.signals.send(
                    sid,
                    Signal::RemoteEdit {
                        actor: event.actor.clone(),
                    },
                );
            }
        }
    }
    tracing::debug!("change feed for {sid} closed");
}

async fn refetch(board: &ScheduleBoard, entity: EntityKind) -> Result<(), crate::remote::RemoteError> {
    let sid = board.schedule_id().await;
    match entity {
        EntityKind::Assignment => {
            let fetched = board.remote.fetch_assignments(sid).await?;
            let mut st = board.state.write().await;
            st.assignments = fetched.into_iter().map(|a| (a.id, a)).collect();
        }
        EntityKind::Submission => {
            let fetched = board.remote.fetch_submissions(sid).await?;
            let mut st = board.state.write().await;
            st.submissions = fetched.into_iter().map(|s| (s.id, s)).collect();
        }
        EntityKind::ChangeRequest => {
            let fetched = board.remote.fetch_change_requests(sid).await?;
            let mut st = board.state.write().await;
            st.change_requests = fetched.into_iter().map(|c| (c.id, c)).collect();
        }
    }
    Ok(())
}
