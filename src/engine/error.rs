use ulid::Ulid;

use crate::model::CycleDay;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    NotFound(Ulid),
    UnknownSlot(String),
    DayDisabled(CycleDay),
    /// Schedule is finalized; engine runs are refused.
    ScheduleLocked,
    /// Lifecycle is not Active; all mutations are refused.
    ScheduleNotActive,
    /// A delayed delete is already pending for this assignment.
    PendingRemoval(Ulid),
    Validation(&'static str),
    LimitExceeded(&'static str),
    /// Remote write rejected or timed out. The local view has been rolled
    /// back to its pre-mutation snapshot; the operation may be retried.
    CommitFailed(String),
}

impl EngineError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::CommitFailed(_))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::UnknownSlot(label) => write!(f, "unknown slot label: {label}"),
            EngineError::DayDisabled(day) => write!(f, "{day} is disabled for this schedule"),
            EngineError::ScheduleLocked => write!(f, "schedule is locked"),
            EngineError::ScheduleNotActive => write!(f, "schedule is not active"),
            EngineError::PendingRemoval(id) => {
                write!(f, "removal already pending for assignment {id}")
            }
            EngineError::Validation(msg) => write!(f, "validation: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::CommitFailed(e) => write!(f, "remote commit failed: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
