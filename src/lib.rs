//! prepslot — priority-weighted slot assignment for prep-day schedules.
//!
//! In-memory board engine behind an injected [`remote::RemoteStore`]:
//! optimistic mutations with rollback-on-commit-failure, a maximum
//! bipartite matcher ranked by speedup pools, a grace-period undo queue
//! for removals, and a change-feed consumer that folds remote edits back
//! into the local view.

pub mod engine;
pub mod export;
pub mod feed;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod remote;

pub use engine::{
    AutoAssignReport, BoardState, CommitHandle, EngineError, MatchOutcome, MatchedPair,
    ScheduleBoard, SharedBoard, match_day,
};
pub use notify::{Signal, SignalHub};
pub use remote::{InMemoryRemote, RemoteError, RemoteStore};
