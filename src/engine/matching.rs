use ulid::Ulid;

use crate::model::*;

use super::EngineError;

// ── Priority-weighted maximum bipartite matching ─────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedPair {
    pub submission_id: Ulid,
    pub slot: String,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchOutcome {
    /// Matched pairs in descending priority order.
    pub pairs: Vec<MatchedPair>,
    /// Eligible submissions before the cutoff.
    pub eligible: usize,
    /// Eligible submissions ranked below the top-N cutoff. Policy: these
    /// are never matched, even when slots would go unfilled.
    pub cutoff_excluded: usize,
}

/// Compute one day's assignment set. Pure — safe to call concurrently;
/// only the subsequent replace-day commit touches shared state.
///
/// Candidates are ranked descending by priority score (stable, so ties
/// keep submission order), cut off at grid capacity, then matched with
/// augmenting paths in that order. A later (lower-priority) candidate can
/// only claim a slot by rerouting earlier holders to other free slots,
/// never by unmatching one — so whenever a feasible reassignment exists,
/// higher-priority submissions end up matched in preference.
pub fn match_day(
    submissions: &[Submission],
    config: &ScheduleConfig,
    day: CycleDay,
) -> Result<MatchOutcome, EngineError> {
    if !config.day_enabled(day) {
        return Err(EngineError::DayDisabled(day));
    }
    let category = config.category_for(day);

    let mut candidates: Vec<(&Submission, u32)> = submissions
        .iter()
        .filter(|s| {
            let plan = s.day_plan(day);
            !plan.opted_out && !plan.windows.is_empty()
        })
        .map(|s| (s, s.priority_score(category)))
        .collect();
    candidates.sort_by(|a, b| b.1.cmp(&a.1));

    let eligible = candidates.len();
    let capacity = config.grid.capacity();
    let cutoff_excluded = eligible.saturating_sub(capacity);
    candidates.truncate(capacity);

    let slot_minutes = config.grid.slot_minutes();
    let edges: Vec<Vec<usize>> = candidates
        .iter()
        .map(|(s, _)| {
            let plan = s.day_plan(day);
            slot_minutes
                .iter()
                .enumerate()
                .filter(|&(_, &m)| plan.covers(m))
                .map(|(i, _)| i)
                .collect()
        })
        .collect();

    let mut slot_owner: Vec<Option<usize>> = vec![None; slot_minutes.len()];
    for cand in 0..candidates.len() {
        let mut visited = vec![false; slot_minutes.len()];
        claim_slot(cand, &edges, &mut slot_owner, &mut visited);
    }

    let mut slot_of: Vec<Option<usize>> = vec![None; candidates.len()];
    for (slot, owner) in slot_owner.iter().enumerate() {
        if let Some(c) = owner {
            slot_of[*c] = Some(slot);
        }
    }

    let pairs = candidates
        .iter()
        .enumerate()
        .filter_map(|(i, (s, score))| {
            slot_of[i].map(|slot| MatchedPair {
                submission_id: s.id,
                slot: slot_label(slot_minutes[slot]),
                score: *score,
            })
        })
        .collect();

    Ok(MatchOutcome {
        pairs,
        eligible,
        cutoff_excluded,
    })
}

/// Kuhn's augmenting-path step. `visited` is per-attempt local state so
/// the recursion terminates and the function stays re-entrant.
fn claim_slot(
    cand: usize,
    edges: &[Vec<usize>],
    slot_owner: &mut [Option<usize>],
    visited: &mut [bool],
) -> bool {
    for &slot in &edges[cand] {
        if visited[slot] {
            continue;
        }
        visited[slot] = true;
        match slot_owner[slot] {
            None => {
                slot_owner[slot] = Some(cand);
                return true;
            }
            Some(holder) => {
                if claim_slot(holder, edges, slot_owner, visited) {
                    slot_owner[slot] = Some(cand);
                    return true;
                }
            }
        }
    }
    false
}
