//! Presenter coordinator — single-presenter election and viewport follow.
//!
//! DESIGN
//! ======
//! A two-state machine, `Idle` and `Presenting(id)`. Starting a presentation
//! opts every other participant into following; any of them may opt out
//! later. While a presentation runs, every viewport change by the presenter is
//! pushed into each follower's record in the same turn, so followers' local
//! projectors can animate toward it.
//!
//! Follow flags live on the presence records; this module owns only the
//! presenter slot and the rules for changing flags.
//!
//! ERROR HANDLING
//! ==============
//! Rejected transitions come back as `PresenterError` and leave all state
//! untouched. The session logs them at `warn` and publishes nothing.

use tracing::info;

use crate::presence::PresenceTracker;
use crate::types::{ParticipantId, Rect};

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PresentationState {
    #[default]
    Idle,
    Presenting(ParticipantId),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PresenterError {
    #[error("{requester} can't present while {presenter} is presenting")]
    AlreadyPresenting { requester: ParticipantId, presenter: ParticipantId },
    #[error("rejecting {requester} request to stop presenting; presenter is {presenter}")]
    NotPresenter { requester: ParticipantId, presenter: ParticipantId },
    #[error("{requester} asked to stop presenting but no one is presenting")]
    NoPresentation { requester: ParticipantId },
    #[error("unknown participant: {0}")]
    UnknownParticipant(ParticipantId),
}

/// A presentation that just began.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Started {
    pub presenter: ParticipantId,
    pub followers: Vec<ParticipantId>,
}

/// A presentation that just ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stopped {
    pub presenter: ParticipantId,
    pub unfollowed: Vec<ParticipantId>,
}

/// How one participant appears from another participant's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewDetails {
    pub is_local: bool,
    pub is_presenter: bool,
    pub is_follower: bool,
    pub is_active: bool,
}

// =============================================================================
// COORDINATOR
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct PresenterCoordinator {
    state: PresentationState,
}

impl PresenterCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> PresentationState {
        self.state
    }

    #[must_use]
    pub fn presenter(&self) -> Option<ParticipantId> {
        match self.state {
            PresentationState::Idle => None,
            PresentationState::Presenting(id) => Some(id),
        }
    }

    /// Make `requester` the presenter and opt everyone else into following.
    ///
    /// # Errors
    ///
    /// `AlreadyPresenting` if a presentation is running, `UnknownParticipant`
    /// if the requester has no presence record.
    pub fn start(&mut self, presence: &mut PresenceTracker, requester: ParticipantId) -> Result<Started, PresenterError> {
        if let PresentationState::Presenting(presenter) = self.state {
            return Err(PresenterError::AlreadyPresenting { requester, presenter });
        }
        if !presence.contains(requester) {
            return Err(PresenterError::UnknownParticipant(requester));
        }

        info!(%requester, "starting presentation");
        self.state = PresentationState::Presenting(requester);
        presence.set_following(requester, false);

        let others: Vec<_> = presence.participants().filter(|id| *id != requester).collect();
        let followers = others
            .into_iter()
            .filter(|id| self.set_following(presence, *id, true) == Some(true))
            .collect();

        Ok(Started { presenter: requester, followers })
    }

    /// End the presentation. Only the presenter may stop it unless `force`.
    ///
    /// # Errors
    ///
    /// `NotPresenter` when a non-presenter asks without `force`,
    /// `NoPresentation` when nothing is running.
    pub fn stop(
        &mut self,
        presence: &mut PresenceTracker,
        requester: ParticipantId,
        force: bool,
    ) -> Result<Stopped, PresenterError> {
        let PresentationState::Presenting(presenter) = self.state else {
            return Err(PresenterError::NoPresentation { requester });
        };
        if !force && presenter != requester {
            return Err(PresenterError::NotPresenter { requester, presenter });
        }

        info!(%requester, %presenter, force, "stopping presentation");
        Ok(self.end(presence, presenter))
    }

    /// A departed presenter ends the presentation as if force-stopped.
    pub fn handle_departure(&mut self, presence: &mut PresenceTracker, departed: ParticipantId) -> Option<Stopped> {
        let presenter = self.presenter().filter(|p| *p == departed)?;
        info!(%presenter, "presenter left; stopping presentation");
        Some(self.end(presence, presenter))
    }

    fn end(&mut self, presence: &mut PresenceTracker, presenter: ParticipantId) -> Stopped {
        self.state = PresentationState::Idle;
        let followers: Vec<_> = presence.followers().collect();
        for id in &followers {
            presence.set_following(*id, false);
        }
        Stopped { presenter, unfollowed: followers }
    }

    /// Set `id`'s follow flag and return the flag actually stored.
    ///
    /// The flag is forced to `false` when no one presents (or when `id` is the
    /// presenter). Following copies the presenter's last viewport into `id`'s
    /// record for instant catch-up, even when the presenter has none yet.
    /// `None` if `id` is unknown.
    pub fn set_following(&self, presence: &mut PresenceTracker, id: ParticipantId, flag: bool) -> Option<bool> {
        if !presence.contains(id) {
            return None;
        }
        let presenter = match self.presenter() {
            Some(p) if flag && p != id => p,
            _ => {
                presence.set_following(id, false);
                return Some(false);
            }
        };

        presence.set_following(id, true);
        let rect = presence.get(presenter).and_then(|r| r.last_viewport);
        presence.mirror_viewport(id, rect);
        Some(true)
    }

    /// Push a presenter viewport change into every follower. Returns the
    /// followers updated; empty when `from` is not the presenter.
    pub fn propagate_viewport(
        &self,
        presence: &mut PresenceTracker,
        from: ParticipantId,
        rect: Rect,
    ) -> Vec<ParticipantId> {
        if self.presenter() != Some(from) {
            return Vec::new();
        }
        let followers: Vec<_> = presence.followers().filter(|id| *id != from).collect();
        for id in &followers {
            presence.mirror_viewport(*id, Some(rect));
        }
        followers
    }

    /// Describe `subject` as seen by `viewer`. `None` if `subject` is unknown.
    #[must_use]
    pub fn view_details(
        &self,
        presence: &PresenceTracker,
        viewer: ParticipantId,
        subject: ParticipantId,
    ) -> Option<ViewDetails> {
        let record = presence.get(subject)?;
        let is_presenter = self.presenter() == Some(subject);
        Some(ViewDetails {
            is_local: viewer == subject,
            is_presenter,
            is_follower: !is_presenter && record.is_following,
            is_active: record.is_active(),
        })
    }
}

#[cfg(test)]
#[path = "presenter_test.rs"]
mod tests;
