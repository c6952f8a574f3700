use std::time::Duration;

use crate::model::Minute;

pub const MINUTES_PER_DAY: Minute = 1440;

/// Half-hour grid on the :00/:30 boundary.
pub const NORMAL_GRID_SLOTS: usize = 48;
/// Quarter-past/quarter-to grid with one spillover slot.
pub const STAGGERED_GRID_SLOTS: usize = 49;

pub const MAX_WINDOWS_PER_DAY: usize = 3;
pub const MAX_NAME_LEN: usize = 64;
pub const MAX_NOTE_LEN: usize = 512;
pub const MAX_SUBMISSIONS_PER_SCHEDULE: usize = 4096;

/// Delay between an optimistic local removal and its remote delete;
/// `undo_remove` within this window cancels the delete.
pub const UNDO_GRACE: Duration = Duration::from_secs(5);

/// Minimum spacing of "modified by another editor" notices, so bulk
/// re-matching by a peer doesn't become a notification storm.
pub const CONFLICT_NOTICE_COOLDOWN: Duration = Duration::from_secs(10);
