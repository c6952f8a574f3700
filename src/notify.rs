use dashmap::DashMap;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::CycleDay;

const CHANNEL_CAPACITY: usize = 256;

/// Out-of-band engine signals. None of these are errors the caller must
/// handle inline — commit failures are retryable, remote edits advisory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// A remote commit failed and the local view was rolled back.
    CommitFailed { op: &'static str, detail: String },
    /// Another editor mutated this schedule's assignments (rate-limited).
    RemoteEdit { actor: String },
    /// An auto-assign run finished; doubles as the push-notification hook.
    AutoAssignCompleted {
        day: CycleDay,
        matched: usize,
        cutoff_excluded: usize,
    },
}

/// Broadcast hub for engine signals, one channel per schedule.
pub struct SignalHub {
    channels: DashMap<Ulid, broadcast::Sender<Signal>>,
}

impl Default for SignalHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalHub {
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
        }
    }

    /// Subscribe to signals for a schedule. Creates the channel if needed.
    pub fn subscribe(&self, schedule_id: Ulid) -> broadcast::Receiver<Signal> {
        let sender = self
            .channels
            .entry(schedule_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Send a signal. No-op if nobody is listening.
    pub fn send(&self, schedule_id: Ulid, signal: Signal) {
        if let Some(sender) = self.channels.get(&schedule_id) {
            let _ = sender.send(signal);
        }
    }

    /// Remove a channel (e.g. when a schedule is purged).
    pub fn remove(&self, schedule_id: &Ulid) {
        self.channels.remove(schedule_id);
    }
}
