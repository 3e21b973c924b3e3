//! Presence tracker — per-participant liveness, viewport, and pointer state.
//!
//! DESIGN
//! ======
//! The runtime offers no push heartbeat, so liveness is derived by periodic
//! pull: every pointer or viewport report refreshes `last_active_time`, and a
//! sweep (re-armed by the session every `PRESENCE_SWEEP_INTERVAL_MS`) marks
//! participants idle for longer than `INACTIVITY_THRESHOLD_MS` as inactive.
//! A participant goes inactive only through the sweep, never on the report
//! path.
//!
//! Operations naming an unknown participant are silent no-ops. A sweep or a
//! late report that lands after `remove` is an expected race, not an error.

use std::collections::BTreeMap;

use tracing::debug;

use crate::clock::LogicalTime;
use crate::consts::INACTIVITY_THRESHOLD_MS;
use crate::types::{Activity, ParticipantId, PointerSample, Rect};

// =============================================================================
// TYPES
// =============================================================================

/// Everything the session knows about one joined participant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParticipantRecord {
    pub last_viewport: Option<Rect>,
    pub last_pointer: Option<PointerSample>,
    pub last_active_time: LogicalTime,
    pub activity: Activity,
    pub is_following: bool,
}

impl ParticipantRecord {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.activity.is_active()
    }
}

/// What a pointer or viewport report did to the reporter's liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Touch {
    /// Already active; only the timestamp moved.
    Refreshed,
    /// The participant just became active.
    Activated,
}

/// A liveness change produced by a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityChange {
    pub participant: ParticipantId,
    pub activity: Activity,
}

// =============================================================================
// TRACKER
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct PresenceTracker {
    records: BTreeMap<ParticipantId, ParticipantRecord>,
}

impl PresenceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty record. Returns `false` if the participant was already known.
    pub fn register(&mut self, id: ParticipantId) -> bool {
        if self.records.contains_key(&id) {
            return false;
        }
        self.records.insert(id, ParticipantRecord::default());
        true
    }

    pub fn remove(&mut self, id: ParticipantId) -> Option<ParticipantRecord> {
        self.records.remove(&id)
    }

    #[must_use]
    pub fn contains(&self, id: ParticipantId) -> bool {
        self.records.contains_key(&id)
    }

    #[must_use]
    pub fn get(&self, id: ParticipantId) -> Option<&ParticipantRecord> {
        self.records.get(&id)
    }

    /// Known participants in id order.
    pub fn participants(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.records.keys().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every participant's last pointer, for redrawing all cursors at once.
    pub fn pointers(&self) -> impl Iterator<Item = (ParticipantId, &PointerSample)> + '_ {
        self.records
            .iter()
            .filter_map(|(id, r)| r.last_pointer.as_ref().map(|p| (*id, p)))
    }

    /// Store a pointer report and refresh liveness. `None` if `id` is unknown.
    pub fn record_pointer(&mut self, id: ParticipantId, sample: PointerSample, now: LogicalTime) -> Option<Touch> {
        let record = self.records.get_mut(&id)?;
        record.last_pointer = Some(sample);
        Some(touch(record, now))
    }

    /// Store a viewport report and refresh liveness. `None` if `id` is unknown.
    pub fn record_viewport(&mut self, id: ParticipantId, rect: Rect, now: LogicalTime) -> Option<Touch> {
        let record = self.records.get_mut(&id)?;
        record.last_viewport = Some(rect);
        Some(touch(record, now))
    }

    /// Decay liveness. Idle active participants become inactive; participants
    /// with no verdict yet are presumed active from `now`.
    pub fn sweep(&mut self, now: LogicalTime) -> Vec<ActivityChange> {
        let mut changes = Vec::new();
        for (id, record) in &mut self.records {
            match record.activity {
                Activity::Unknown => {
                    record.activity = Activity::Active;
                    record.last_active_time = now;
                    changes.push(ActivityChange { participant: *id, activity: Activity::Active });
                }
                Activity::Active if now.since(record.last_active_time) > INACTIVITY_THRESHOLD_MS => {
                    record.activity = Activity::Inactive;
                    changes.push(ActivityChange { participant: *id, activity: Activity::Inactive });
                }
                Activity::Active | Activity::Inactive => {}
            }
        }
        if !changes.is_empty() {
            debug!(%now, changed = changes.len(), "presence sweep");
        }
        changes
    }

    // -------------------------------------------------------------------------
    // Follow-state plumbing, driven by the presenter coordinator.
    // -------------------------------------------------------------------------

    /// Set the follow flag. Returns `false` if `id` is unknown.
    pub(crate) fn set_following(&mut self, id: ParticipantId, flag: bool) -> bool {
        let Some(record) = self.records.get_mut(&id) else {
            return false;
        };
        record.is_following = flag;
        true
    }

    /// Overwrite a viewport without counting it as activity. Used to mirror
    /// the presenter's viewport into followers, including a presenter that
    /// has not reported one yet.
    pub(crate) fn mirror_viewport(&mut self, id: ParticipantId, rect: Option<Rect>) -> bool {
        let Some(record) = self.records.get_mut(&id) else {
            return false;
        };
        record.last_viewport = rect;
        true
    }

    pub(crate) fn followers(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.records
            .iter()
            .filter(|(_, r)| r.is_following)
            .map(|(id, _)| *id)
    }
}

fn touch(record: &mut ParticipantRecord, now: LogicalTime) -> Touch {
    record.last_active_time = now;
    if record.activity.is_active() {
        return Touch::Refreshed;
    }
    record.activity = Activity::Active;
    Touch::Activated
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
