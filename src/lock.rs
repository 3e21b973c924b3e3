//! Lock arbiter — per-object, per-property interaction locks.
//!
//! DESIGN
//! ======
//! One `LockArbiter` exists per lockable shared object. A participant starting
//! a gesture (drag, resize) asks for the properties it wants to change. The
//! first request of a gesture decides, once, which of those properties the
//! participant controls: everything requested that nobody else holds. Every
//! later request in the same gesture is filtered to that set, even if a
//! contested property frees up mid-gesture, so a lock can never change hands
//! while someone is still dragging. Denial is silent: an empty or partial
//! grant is the only failure signal.
//!
//! Locks end cooperatively via `end_interaction`, or by timeout: a periodic
//! `check_lock_expiry` releases locks not refreshed for `LOCK_TIMEOUT_MS`,
//! covering participants that crashed or disconnected mid-gesture. An expired
//! holder stays in its gesture with nothing held until it ends the gesture.
//!
//! ORDERING
//! ========
//! The arbiter is a plain sequential algorithm. It gives mutual exclusion
//! across replicas only because the replicated runtime delivers every request
//! to every replica in one total order, so each replica computes the same
//! grants without a voting round. Hosting it anywhere without that guarantee
//! (e.g. several independent servers) requires putting a sequencer or a
//! consensus layer in front of it.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::clock::LogicalTime;
use crate::consts::LOCK_TIMEOUT_MS;
use crate::types::{LockKey, ParticipantId};

// =============================================================================
// TYPES
// =============================================================================

/// Lock bookkeeping for one participant on one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHolderState<K> {
    pub held_locks: BTreeSet<K>,
    pub interacting: bool,
    pub lock_time: LogicalTime,
}

/// Result of one `request_interaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant<K> {
    /// Requested properties the requester controls. Empty means denied.
    pub granted: BTreeSet<K>,
    /// Whether this request changed lock ownership.
    pub acquired: bool,
}

impl<K> Grant<K> {
    #[must_use]
    pub fn is_denied(&self) -> bool {
        self.granted.is_empty()
    }
}

/// Locks taken away from one holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release<K> {
    pub holder: ParticipantId,
    pub released: BTreeSet<K>,
    /// No participant holds any property of the object after this release.
    pub object_free: bool,
}

/// Result of one `end_interaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ended<K> {
    pub release: Option<Release<K>>,
    /// No participant holds any property of the object after the call.
    pub object_free: bool,
}

// =============================================================================
// ARBITER
// =============================================================================

#[derive(Debug, Clone)]
pub struct LockArbiter<K> {
    status: BTreeMap<ParticipantId, LockHolderState<K>>,
}

impl<K: LockKey> Default for LockArbiter<K> {
    fn default() -> Self {
        Self { status: BTreeMap::new() }
    }
}

impl<K: LockKey> LockArbiter<K> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin or continue a gesture and return what `requester` may update.
    pub fn request_interaction(&mut self, requester: ParticipantId, requested: &BTreeSet<K>, now: LogicalTime) -> Grant<K> {
        let continuing = self.status.get(&requester).is_some_and(|s| s.interacting);

        let grant = if continuing {
            let held = self
                .status
                .get(&requester)
                .map(|s| &s.held_locks);
            let granted = requested
                .iter()
                .filter(|p| held.is_some_and(|h| h.contains(*p)))
                .cloned()
                .collect();
            Grant { granted, acquired: false }
        } else {
            let granted: BTreeSet<K> = requested
                .iter()
                .filter(|p| self.lock_holder(p).is_none_or(|h| h == requester))
                .cloned()
                .collect();
            let acquired = !granted.is_empty();
            self.status.insert(
                requester,
                LockHolderState { held_locks: granted.clone(), interacting: true, lock_time: now },
            );
            Grant { granted, acquired }
        };

        if grant.is_denied() {
            debug!(%requester, requested = requested.len(), "interaction denied");
        } else if let Some(state) = self.status.get_mut(&requester) {
            state.lock_time = now;
        }
        if grant.acquired {
            debug!(%requester, granted = ?grant.granted, "locks acquired");
        }
        grant
    }

    /// End `requester`'s gesture and release whatever it holds.
    ///
    /// Unknown requesters are fine; the result still reports whether the
    /// object is free.
    pub fn end_interaction(&mut self, requester: ParticipantId) -> Ended<K> {
        let release = self.remove_participant(requester);
        Ended { release, object_free: self.is_free() }
    }

    /// Force-release locks idle for at least `LOCK_TIMEOUT_MS`.
    pub fn check_lock_expiry(&mut self, now: LogicalTime) -> Vec<Release<K>> {
        let expired: Vec<ParticipantId> = self
            .status
            .iter()
            .filter(|(_, s)| !s.held_locks.is_empty() && now.since(s.lock_time) >= LOCK_TIMEOUT_MS)
            .map(|(id, _)| *id)
            .collect();

        let mut releases = Vec::with_capacity(expired.len());
        for holder in expired {
            let Some(state) = self.status.get_mut(&holder) else {
                continue;
            };
            let released = std::mem::take(&mut state.held_locks);
            info!(%holder, locks = ?released, "lock expired");
            releases.push(Release { holder, released, object_free: self.is_free() });
        }
        releases
    }

    /// Forget `id` entirely, e.g. when its replica leaves the session.
    /// Returns the released locks if it held any.
    pub fn remove_participant(&mut self, id: ParticipantId) -> Option<Release<K>> {
        let state = self.status.remove(&id)?;
        if state.held_locks.is_empty() {
            return None;
        }
        Some(Release { holder: id, released: state.held_locks, object_free: self.is_free() })
    }

    /// Participant currently holding `property`, if any.
    #[must_use]
    pub fn lock_holder(&self, property: &K) -> Option<ParticipantId> {
        self.status
            .iter()
            .find(|(_, s)| s.held_locks.contains(property))
            .map(|(id, _)| *id)
    }

    #[must_use]
    pub fn holder_state(&self, id: ParticipantId) -> Option<&LockHolderState<K>> {
        self.status.get(&id)
    }

    /// Non-empty lock sets by holder, in holder order. Drives ownership
    /// highlighting in views.
    pub fn holders(&self) -> impl Iterator<Item = (ParticipantId, &BTreeSet<K>)> + '_ {
        self.status
            .iter()
            .filter(|(_, s)| !s.held_locks.is_empty())
            .map(|(id, s)| (*id, &s.held_locks))
    }

    /// Whether `id` has any entry at all, held locks or not.
    #[must_use]
    pub fn references(&self, id: ParticipantId) -> bool {
        self.status.contains_key(&id)
    }

    #[must_use]
    pub fn is_free(&self) -> bool {
        self.status.values().all(|s| s.held_locks.is_empty())
    }
}

#[cfg(test)]
#[path = "lock_test.rs"]
mod tests;
