use std::sync::Arc;

use tokio::time::{Duration, sleep};
use tokio_test::assert_ok;
use ulid::Ulid;

use crate::limits::{MAX_NOTE_LEN, UNDO_GRACE};
use crate::model::*;
use crate::notify::{Signal, SignalHub};
use crate::remote::InMemoryRemote;

use super::*;

// ── Fixtures ─────────────────────────────────────────────

fn full_day() -> DayPlan {
    DayPlan {
        windows: vec![TimeRange { start: 0, end: 0 }],
        opted_out: false,
    }
}

fn submission(schedule_id: Ulid, construction: u32) -> Submission {
    Submission {
        id: Ulid::new(),
        schedule_id,
        player_id: "42".into(),
        name: format!("player-{construction}"),
        alliance: "NAVI".into(),
        pools: ResourcePools {
            construction,
            ..Default::default()
        },
        general: GeneralAllocation::None,
        days: [full_day(), full_day(), full_day()],
    }
}

fn setup() -> (ScheduleBoard, Arc<InMemoryRemote>) {
    let remote = Arc::new(InMemoryRemote::new());
    let board = ScheduleBoard::new(
        ScheduleConfig::new(Ulid::new()),
        remote.clone(),
        Arc::new(SignalHub::new()),
        "editor-a",
    );
    (board, remote)
}

/// Seed submissions straight into the local view (the form collaborator's
/// job in production). Returns ids in insertion order.
async fn seed(board: &ScheduleBoard, scores: &[u32]) -> Vec<Ulid> {
    let sid = board.schedule_id().await;
    let mut st = board.state.write().await;
    scores
        .iter()
        .map(|&score| {
            let sub = submission(sid, score);
            let id = sub.id;
            st.submissions.insert(id, sub);
            id
        })
        .collect()
}

async fn committed(handle: CommitHandle) {
    handle.await.unwrap().unwrap();
}

async fn manual_assign(board: &ScheduleBoard, day: CycleDay, slot: &str, sub: Ulid) {
    let handle = board.assign_slot(day, slot, Some(sub)).await.unwrap();
    committed(handle).await;
}

// ── Auto-assign ──────────────────────────────────────────

#[tokio::test]
async fn auto_assign_seats_everyone_and_commits() {
    let (board, remote) = setup();
    let sid = board.schedule_id().await;
    let mut signals = board.signals.subscribe(sid);
    seed(&board, &[100, 200, 300]).await;

    let (report, handle) = board.run_auto_assign(CycleDay::First).await.unwrap();
    assert_eq!(report.matched, 3);
    assert_eq!(report.eligible, 3);
    assert_eq!(report.cutoff_excluded, 0);

    assert_eq!(board.day_assignments(CycleDay::First).await.len(), 3);
    committed(handle).await;
    assert_eq!(remote.assignment_count(), 3);

    assert_eq!(
        signals.recv().await.unwrap(),
        Signal::AutoAssignCompleted {
            day: CycleDay::First,
            matched: 3,
            cutoff_excluded: 0,
        }
    );
}

#[tokio::test]
async fn auto_assign_replaces_instead_of_accumulating() {
    let (board, remote) = setup();
    seed(&board, &[100, 200]).await;

    let (_, handle) = board.run_auto_assign(CycleDay::First).await.unwrap();
    committed(handle).await;
    let first_run: Vec<Ulid> = board
        .day_assignments(CycleDay::First)
        .await
        .iter()
        .map(|a| a.id)
        .collect();

    let (_, handle) = board.run_auto_assign(CycleDay::First).await.unwrap();
    committed(handle).await;

    let second_run = board.day_assignments(CycleDay::First).await;
    assert_eq!(second_run.len(), 2);
    assert!(second_run.iter().all(|a| !first_run.contains(&a.id)));
    assert_eq!(remote.assignment_count(), 2);
}

#[tokio::test]
async fn auto_assign_refused_on_locked_schedule() {
    let (board, _remote) = setup();
    seed(&board, &[100]).await;
    board.state.write().await.schedule.locked = true;

    let err = board.run_auto_assign(CycleDay::First).await.unwrap_err();
    assert_eq!(err, EngineError::ScheduleLocked);
    // Manual corrections stay possible while locked.
    let subs = board.submissions().await;
    manual_assign(&board, CycleDay::First, "00:00", subs[0].id).await;
}

#[tokio::test]
async fn lock_landing_mid_run_beats_auto_assign() {
    let (board, remote) = setup();
    seed(&board, &[100, 200]).await;
    let board = Arc::new(board);

    // Hold the state lock so the run queues behind us, then finalize the
    // schedule before letting it through. The run re-observes the config
    // under its own write lock and must refuse.
    let state = board.state.clone();
    let mut guard = state.write().await;
    let run = tokio::spawn({
        let board = board.clone();
        async move { board.run_auto_assign(CycleDay::First).await }
    });
    tokio::task::yield_now().await;
    guard.schedule.locked = true;
    drop(guard);

    let err = run.await.unwrap().unwrap_err();
    assert_eq!(err, EngineError::ScheduleLocked);
    assert!(board.day_assignments(CycleDay::First).await.is_empty());
    assert_eq!(remote.assignment_count(), 0);
}

#[tokio::test]
async fn auto_assign_refused_on_disabled_day() {
    let (board, _remote) = setup();
    seed(&board, &[100]).await;
    board
        .state
        .write()
        .await
        .schedule
        .set_day_enabled(CycleDay::Second, false)
        .unwrap();

    let err = board.run_auto_assign(CycleDay::Second).await.unwrap_err();
    assert_eq!(err, EngineError::DayDisabled(CycleDay::Second));
}

// ── Manual assignment ────────────────────────────────────

#[tokio::test]
async fn manual_assign_displaces_occupant_and_prior_seat() {
    let (board, remote) = setup();
    let ids = seed(&board, &[100, 200]).await;
    let (a, b) = (ids[0], ids[1]);

    manual_assign(&board, CycleDay::First, "00:00", a).await;
    // B takes A's slot.
    manual_assign(&board, CycleDay::First, "00:00", b).await;
    assert!(
        board
            .assignment_for_submission(CycleDay::First, a)
            .await
            .is_none()
    );

    // B moves: the old seat goes away, one seat per submission per day.
    manual_assign(&board, CycleDay::First, "01:30", b).await;
    let day = board.day_assignments(CycleDay::First).await;
    assert_eq!(day.len(), 1);
    assert_eq!(day[0].slot, "01:30");
    assert_eq!(day[0].submission_id, b);
    assert_eq!(remote.assignment_count(), 1);
}

#[tokio::test]
async fn manual_assign_rejects_unknown_slot_and_submission() {
    let (board, _remote) = setup();
    let ids = seed(&board, &[100]).await;

    let err = board
        .assign_slot(CycleDay::First, "00:07", Some(ids[0]))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::UnknownSlot("00:07".into()));

    let ghost = Ulid::new();
    let err = board
        .assign_slot(CycleDay::First, "00:00", Some(ghost))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::NotFound(ghost));
}

#[tokio::test]
async fn clearing_a_slot_deletes_remotely_and_is_noop_when_empty() {
    let (board, remote) = setup();
    let ids = seed(&board, &[100]).await;
    manual_assign(&board, CycleDay::First, "06:00", ids[0]).await;

    let handle = board
        .assign_slot(CycleDay::First, "06:00", None)
        .await
        .unwrap();
    committed(handle).await;
    assert!(board.day_assignments(CycleDay::First).await.is_empty());
    assert_eq!(remote.assignment_count(), 0);

    // Empty slot: success without a remote call.
    let before = remote.delete_calls().len();
    let handle = board
        .assign_slot(CycleDay::First, "06:00", None)
        .await
        .unwrap();
    committed(handle).await;
    assert_eq!(remote.delete_calls().len(), before);
}

#[tokio::test]
async fn failed_commit_rolls_back_and_signals() {
    let (board, remote) = setup();
    let sid = board.schedule_id().await;
    let mut signals = board.signals.subscribe(sid);
    let ids = seed(&board, &[100]).await;

    remote.fail_next(1);
    let handle = board
        .assign_slot(CycleDay::First, "00:00", Some(ids[0]))
        .await
        .unwrap();
    let err = handle.await.unwrap().unwrap_err();
    assert!(matches!(err, EngineError::CommitFailed(_)));
    assert!(err.is_retryable());

    assert!(board.day_assignments(CycleDay::First).await.is_empty());
    assert_eq!(remote.assignment_count(), 0);
    assert!(matches!(
        signals.recv().await.unwrap(),
        Signal::CommitFailed {
            op: "assign_slot",
            ..
        }
    ));
}

#[tokio::test]
async fn mutations_rejected_when_not_active() {
    let (board, _remote) = setup();
    let ids = seed(&board, &[100]).await;
    manual_assign(&board, CycleDay::First, "00:00", ids[0]).await;
    let seat = board.day_assignments(CycleDay::First).await[0].id;

    board.state.write().await.schedule.lifecycle = Lifecycle::Closed;

    assert_eq!(
        board
            .assign_slot(CycleDay::First, "00:30", Some(ids[0]))
            .await
            .unwrap_err(),
        EngineError::ScheduleNotActive
    );
    assert_eq!(
        board.clear_day(CycleDay::First).await.unwrap_err(),
        EngineError::ScheduleNotActive
    );
    assert_eq!(
        board.remove_assignment(seat).await.unwrap_err(),
        EngineError::ScheduleNotActive
    );
    assert_eq!(
        board.run_auto_assign(CycleDay::First).await.unwrap_err(),
        EngineError::ScheduleNotActive
    );
}

#[tokio::test]
async fn clear_day_leaves_other_days_alone() {
    let (board, remote) = setup();
    let ids = seed(&board, &[100]).await;
    manual_assign(&board, CycleDay::First, "00:00", ids[0]).await;
    manual_assign(&board, CycleDay::Second, "00:00", ids[0]).await;

    let handle = board.clear_day(CycleDay::First).await.unwrap();
    committed(handle).await;

    assert!(board.day_assignments(CycleDay::First).await.is_empty());
    assert_eq!(board.day_assignments(CycleDay::Second).await.len(), 1);
    assert_eq!(remote.assignment_count(), 1);
}

// ── Undo window ──────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn undo_within_grace_restores_exact_record_without_remote_delete() {
    let (board, remote) = setup();
    let ids = seed(&board, &[100]).await;
    manual_assign(&board, CycleDay::First, "09:30", ids[0]).await;
    let original = board.day_assignments(CycleDay::First).await[0].clone();

    board.remove_assignment(original.id).await.unwrap();
    assert!(board.day_assignments(CycleDay::First).await.is_empty());

    sleep(Duration::from_secs(2)).await;
    assert!(board.undo_remove(original.id).await);

    // Same id, same assigned_by: the record, not a lookalike.
    assert_eq!(board.assignment(original.id).await, Some(original.clone()));

    // Even after the grace task fires, no delete goes out.
    sleep(UNDO_GRACE * 2).await;
    assert!(remote.delete_calls().is_empty());
    assert_eq!(remote.assignment(&original.id), Some(original));
}

#[tokio::test(start_paused = true)]
async fn expired_grace_deletes_remotely_and_undo_reports_too_late() {
    let (board, remote) = setup();
    let ids = seed(&board, &[100]).await;
    manual_assign(&board, CycleDay::First, "09:30", ids[0]).await;
    let seat = board.day_assignments(CycleDay::First).await[0].id;

    board.remove_assignment(seat).await.unwrap();
    sleep(UNDO_GRACE + Duration::from_millis(10)).await;

    assert!(!board.undo_remove(seat).await);
    assert_eq!(remote.delete_calls(), vec![seat]);
    assert_eq!(remote.assignment(&seat), None);
}

#[tokio::test(start_paused = true)]
async fn second_removal_while_pending_is_rejected() {
    let (board, _remote) = setup();
    let ids = seed(&board, &[100]).await;
    manual_assign(&board, CycleDay::First, "09:30", ids[0]).await;
    let seat = board.day_assignments(CycleDay::First).await[0].id;

    board.remove_assignment(seat).await.unwrap();
    assert_eq!(
        board.remove_assignment(seat).await.unwrap_err(),
        EngineError::PendingRemoval(seat)
    );
}

#[tokio::test(start_paused = true)]
async fn failed_delayed_delete_restores_and_signals() {
    let (board, remote) = setup();
    let sid = board.schedule_id().await;
    let mut signals = board.signals.subscribe(sid);
    let ids = seed(&board, &[100]).await;
    manual_assign(&board, CycleDay::First, "09:30", ids[0]).await;
    let seat = board.day_assignments(CycleDay::First).await[0].clone();

    board.remove_assignment(seat.id).await.unwrap();
    remote.fail_next(1);
    sleep(UNDO_GRACE + Duration::from_millis(10)).await;

    assert_eq!(board.assignment(seat.id).await, Some(seat));
    assert!(matches!(
        signals.recv().await.unwrap(),
        Signal::CommitFailed {
            op: "remove_assignment",
            ..
        }
    ));
}

// ── Change requests ──────────────────────────────────────

#[tokio::test]
async fn change_request_roundtrip() {
    let (board, _remote) = setup();
    let ids = seed(&board, &[100]).await;

    let (req_id, handle) = board
        .create_change_request(ids[0], CycleDay::First, ChangeReason::CannotAttend, "travel")
        .await
        .unwrap();
    committed(handle).await;

    let pending = board.change_requests(Some(ChangeStatus::Pending)).await;
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, req_id);
    assert_eq!(pending[0].note, "travel");

    let handle = board
        .set_change_request_status(req_id, ChangeStatus::Resolved)
        .await
        .unwrap();
    committed(handle).await;
    assert!(
        board
            .change_requests(Some(ChangeStatus::Pending))
            .await
            .is_empty()
    );
    assert_eq!(
        board.change_requests(None).await[0].status,
        ChangeStatus::Resolved
    );
}

#[tokio::test]
async fn change_request_note_is_bounded() {
    let (board, _remote) = setup();
    let ids = seed(&board, &[100]).await;
    let long = "x".repeat(MAX_NOTE_LEN + 1);
    let err = board
        .create_change_request(ids[0], CycleDay::First, ChangeReason::Other, &long)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::LimitExceeded(_)));
}

// ── Lifecycle ────────────────────────────────────────────

#[tokio::test]
async fn purge_requires_archived_then_drops_everything() {
    let (board, remote) = setup();
    let ids = seed(&board, &[100]).await;
    manual_assign(&board, CycleDay::First, "00:00", ids[0]).await;

    assert!(matches!(
        board.purge().await.unwrap_err(),
        EngineError::Validation(_)
    ));

    board.state.write().await.schedule.lifecycle = Lifecycle::Archived;
    let handle = board.purge().await.unwrap();
    committed(handle).await;

    assert!(board.submissions().await.is_empty());
    assert!(board.day_assignments(CycleDay::First).await.is_empty());
    assert_eq!(remote.assignment_count(), 0);
}

#[tokio::test]
async fn hydrate_pulls_remote_state() {
    let (board, remote) = setup();
    let sid = board.schedule_id().await;
    let sub = submission(sid, 700);
    remote.put_submission(sub.clone());
    let seat = SlotAssignment {
        id: Ulid::new(),
        schedule_id: sid,
        submission_id: sub.id,
        day: CycleDay::Third,
        slot: "22:30".into(),
        assigned_by: "editor-b".into(),
    };
    remote.put_assignment(&seat).await.unwrap();

    assert_ok!(board.hydrate().await);
    assert_eq!(board.submissions().await, vec![sub]);
    assert_eq!(board.day_assignments(CycleDay::Third).await, vec![seat]);
}
