use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::limits::*;

/// Unix milliseconds — the only wall-clock type.
pub type Ms = i64;

/// Minute of day, UTC. Values >= 1440 label slots spilling into the
/// adjacent day (staggered grid only); availability is tested mod 1440.
pub type Minute = u16;

// ── Days and categories ──────────────────────────────────

/// One day of the fixed 3-day prep cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CycleDay {
    First,
    Second,
    Third,
}

impl CycleDay {
    pub const ALL: [CycleDay; 3] = [CycleDay::First, CycleDay::Second, CycleDay::Third];

    pub fn index(self) -> usize {
        match self {
            CycleDay::First => 0,
            CycleDay::Second => 1,
            CycleDay::Third => 2,
        }
    }
}

impl std::fmt::Display for CycleDay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleDay::First => write!(f, "day 1"),
            CycleDay::Second => write!(f, "day 2"),
            CycleDay::Third => write!(f, "day 3"),
        }
    }
}

/// Resource category a prep day counts toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Construction,
    Research,
    Training,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::Construction => write!(f, "construction"),
            Category::Research => write!(f, "research"),
            Category::Training => write!(f, "training"),
        }
    }
}

// ── Slot grids ───────────────────────────────────────────

/// Slot grid layout for a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridMode {
    /// 48 half-hour slots on the :00/:30 boundary.
    Normal,
    /// 49 slots on the quarter-past/quarter-to boundary; the last slot
    /// (24:15) spills into the adjacent day.
    Staggered,
}

impl GridMode {
    pub fn capacity(self) -> usize {
        match self {
            GridMode::Normal => NORMAL_GRID_SLOTS,
            GridMode::Staggered => STAGGERED_GRID_SLOTS,
        }
    }

    /// Slot minutes in grid order.
    pub fn slot_minutes(self) -> Vec<Minute> {
        match self {
            GridMode::Normal => (0..NORMAL_GRID_SLOTS as Minute).map(|i| i * 30).collect(),
            GridMode::Staggered => (0..STAGGERED_GRID_SLOTS as Minute)
                .map(|i| 15 + i * 30)
                .collect(),
        }
    }

    /// Slot labels ("HH:MM") in grid order. These are the stable string
    /// keys assignments are stored under.
    pub fn slot_labels(self) -> Vec<String> {
        self.slot_minutes().into_iter().map(slot_label).collect()
    }

    /// Position of a label within the grid, if it belongs to it.
    pub fn slot_position(self, label: &str) -> Option<usize> {
        self.slot_labels().iter().position(|l| l == label)
    }
}

pub fn slot_label(minute: Minute) -> String {
    format!("{:02}:{:02}", minute / 60, minute % 60)
}

// ── Availability windows ─────────────────────────────────

/// Half-open availability window in minutes-of-day, wraparound-aware:
/// `end <= start` means the window crosses midnight (equal = full day).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Minute,
    pub end: Minute,
}

impl TimeRange {
    pub fn new(start: Minute, end: Minute) -> Self {
        Self { start, end }
    }

    pub fn wraps(&self) -> bool {
        self.end <= self.start
    }

    /// Linear half-open segments covering the window (two when wrapping).
    fn segments(&self) -> [(Minute, Minute); 2] {
        if self.wraps() {
            [(self.start, MINUTES_PER_DAY), (0, self.end)]
        } else {
            [(self.start, self.end), (0, 0)]
        }
    }

    /// Does the window cover this minute of day?
    pub fn contains(&self, minute: Minute) -> bool {
        let m = minute % MINUTES_PER_DAY;
        self.segments().iter().any(|&(s, e)| s <= m && m < e)
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        for &(s1, e1) in self.segments().iter().filter(|&&(s, e)| s < e) {
            for &(s2, e2) in other.segments().iter().filter(|&&(s, e)| s < e) {
                if s1 < e2 && s2 < e1 {
                    return true;
                }
            }
        }
        false
    }
}

// ── Submissions ──────────────────────────────────────────

/// One participant's plan for a single prep day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayPlan {
    /// Up to MAX_WINDOWS_PER_DAY pairwise-disjoint availability windows.
    pub windows: Vec<TimeRange>,
    /// Opt-out wins over any populated windows at matching time.
    pub opted_out: bool,
}

impl DayPlan {
    pub fn covers(&self, minute: Minute) -> bool {
        self.windows.iter().any(|w| w.contains(minute))
    }
}

/// Resource amounts contributing to the priority score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourcePools {
    pub general: u32,
    pub construction: u32,
    pub research: u32,
    pub training: u32,
}

impl ResourcePools {
    pub fn category(&self, category: Category) -> u32 {
        match category {
            Category::Construction => self.construction,
            Category::Research => self.research,
            Category::Training => self.training,
        }
    }
}

/// How the general pool counts toward a day's category. Target and split
/// are mutually exclusive by construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeneralAllocation {
    #[default]
    None,
    /// Entire general pool counts on days of this category.
    Target(Category),
    /// Percentage split across the three categories; must sum to 100.
    Split {
        construction: u8,
        research: u8,
        training: u8,
    },
}

impl GeneralAllocation {
    pub fn percent(&self, category: Category) -> Option<u8> {
        match self {
            GeneralAllocation::Split {
                construction,
                research,
                training,
            } => Some(match category {
                Category::Construction => *construction,
                Category::Research => *research,
                Category::Training => *training,
            }),
            _ => None,
        }
    }
}

/// One participant's form submission. Produced by the external form
/// collaborator; the engine never mutates these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: Ulid,
    pub schedule_id: Ulid,
    pub player_id: String,
    pub name: String,
    pub alliance: String,
    pub pools: ResourcePools,
    pub general: GeneralAllocation,
    /// Indexed by CycleDay::index().
    pub days: [DayPlan; 3],
}

impl Submission {
    pub fn day_plan(&self, day: CycleDay) -> &DayPlan {
        &self.days[day.index()]
    }

    /// The sole matching rank: category pool plus the general contribution.
    pub fn priority_score(&self, category: Category) -> u32 {
        let base = self.pools.category(category);
        let general = match self.general {
            GeneralAllocation::Target(t) if t == category => self.pools.general,
            GeneralAllocation::Split { .. } => {
                let pct = self.general.percent(category).unwrap_or(0) as u64;
                ((self.pools.general as u64 * pct + 50) / 100) as u32
            }
            _ => 0,
        };
        base + general
    }
}

// ── Schedule configuration ───────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lifecycle {
    Active,
    Closed,
    Archived,
    Flagged,
}

/// Per-event-cycle schedule configuration, owned by the schedule owners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub id: Ulid,
    /// Indexed by CycleDay::index(); at least one day stays enabled.
    pub enabled: [bool; 3],
    /// Which resource category counts on each day.
    pub day_category: [Category; 3],
    pub grid: GridMode,
    pub lifecycle: Lifecycle,
    /// Finalized: no further engine runs expected. Manual corrections stay
    /// possible while the schedule is still active.
    pub locked: bool,
    pub deadline: Option<Ms>,
}

impl ScheduleConfig {
    pub fn new(id: Ulid) -> Self {
        Self {
            id,
            enabled: [true; 3],
            day_category: [
                Category::Construction,
                Category::Research,
                Category::Training,
            ],
            grid: GridMode::Normal,
            lifecycle: Lifecycle::Active,
            locked: false,
            deadline: None,
        }
    }

    pub fn day_enabled(&self, day: CycleDay) -> bool {
        self.enabled[day.index()]
    }

    pub fn category_for(&self, day: CycleDay) -> Category {
        self.day_category[day.index()]
    }

    pub fn enabled_days(&self) -> impl Iterator<Item = CycleDay> + '_ {
        CycleDay::ALL.into_iter().filter(|d| self.day_enabled(*d))
    }

    /// Disabling the last enabled day is refused.
    pub fn set_day_enabled(
        &mut self,
        day: CycleDay,
        enabled: bool,
    ) -> Result<(), crate::engine::EngineError> {
        if !enabled && self.day_enabled(day) && self.enabled_days().count() == 1 {
            return Err(crate::engine::EngineError::Validation(
                "at least one day must remain enabled",
            ));
        }
        self.enabled[day.index()] = enabled;
        Ok(())
    }

    pub fn deadline_passed(&self, now: Ms) -> bool {
        self.deadline.is_some_and(|d| d <= now)
    }

    pub fn is_active(&self) -> bool {
        self.lifecycle == Lifecycle::Active
    }
}

// ── Assignments ──────────────────────────────────────────

/// A committed (day, slot) → submission binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAssignment {
    pub id: Ulid,
    pub schedule_id: Ulid,
    pub submission_id: Ulid,
    pub day: CycleDay,
    /// Label key into the day's slot grid ("HH:MM").
    pub slot: String,
    pub assigned_by: String,
}

// ── Change requests ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeReason {
    CannotAttend,
    ChangeSlot,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeStatus {
    Pending,
    Acknowledged,
    Resolved,
}

/// Advisory participant request; never mutates assignments by itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub id: Ulid,
    pub schedule_id: Ulid,
    pub submission_id: Ulid,
    pub day: CycleDay,
    pub reason: ChangeReason,
    pub note: String,
    pub status: ChangeStatus,
}

// ── Change-feed records ──────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityKind {
    Assignment,
    Submission,
    ChangeRequest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationOp {
    Created,
    Updated,
    Deleted,
}

/// One record of the ordered remote mutation stream. The transport is
/// external; delivery is at-least-once, ordered per entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationEvent {
    pub entity: EntityKind,
    pub entity_id: Ulid,
    pub actor: String,
    pub op: MutationOp,
}

impl MutationEvent {
    /// Wire form used by whatever transport tails the remote store.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

// ── Validation ───────────────────────────────────────────

/// Reject malformed submissions before they reach the engine. Opt-out with
/// populated windows is not an error — the opt-out simply wins.
pub fn validate_submission(sub: &Submission) -> Result<(), crate::engine::EngineError> {
    use crate::engine::EngineError;

    if sub.name.trim().is_empty() {
        return Err(EngineError::Validation("participant name is required"));
    }
    if sub.name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("participant name too long"));
    }
    if sub.player_id.trim().is_empty() || !sub.player_id.trim().chars().all(|c| c.is_ascii_digit())
    {
        return Err(EngineError::Validation("player id must be numeric"));
    }
    if let GeneralAllocation::Split {
        construction,
        research,
        training,
    } = sub.general
    {
        let sum = construction as u32 + research as u32 + training as u32;
        if sum != 100 {
            return Err(EngineError::Validation("general split must sum to 100"));
        }
    }
    for plan in &sub.days {
        if plan.windows.len() > MAX_WINDOWS_PER_DAY {
            return Err(EngineError::LimitExceeded("too many availability windows"));
        }
        for w in &plan.windows {
            if w.start >= MINUTES_PER_DAY || w.end >= MINUTES_PER_DAY {
                return Err(EngineError::Validation("window minute out of range"));
            }
        }
        for (i, a) in plan.windows.iter().enumerate() {
            for b in &plan.windows[i + 1..] {
                if a.overlaps(b) {
                    return Err(EngineError::Validation("availability windows overlap"));
                }
            }
        }
    }
    Ok(())
}
