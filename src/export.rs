//! Flat-text day export. The output is pasted into alliance chats and
//! spreadsheets, so the format is byte-stable: a tab-separated assignment
//! table in grid order, a blank line, then the day's opt-outs.

use std::fmt::Write;

use crate::engine::BoardState;
use crate::model::CycleDay;

pub fn export_day(state: &BoardState, day: CycleDay) -> String {
    let category = state.schedule.category_for(day);
    let grid = state.schedule.grid;

    let mut rows: Vec<_> = state
        .assignments
        .values()
        .filter(|a| a.day == day)
        .collect();
    rows.sort_by_key(|a| grid.slot_position(&a.slot));

    let mut out = String::new();
    let _ = writeln!(out, "slot\tname\talliance\tscore");
    for assignment in rows {
        match state.submissions.get(&assignment.submission_id) {
            Some(sub) => {
                let _ = writeln!(
                    out,
                    "{}\t{}\t{}\t{}",
                    assignment.slot,
                    sub.name,
                    sub.alliance,
                    sub.priority_score(category)
                );
            }
            // Stale assignment whose submission was withdrawn.
            None => {
                let _ = writeln!(out, "{}\t?\t?\t0", assignment.slot);
            }
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "opted out");
    for sub in state.submissions.values() {
        if sub.day_plan(day).opted_out {
            let _ = writeln!(out, "{}\t{}", sub.name, sub.alliance);
        }
    }
    out
}
