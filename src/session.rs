//! Session — one replica's model: dispatch, timers, and published events.
//!
//! DESIGN
//! ======
//! The session owns the presence tracker, the presenter coordinator, and one
//! `SharedObject` (lock arbiter plus display hint) per lockable object. It is
//! the single writer for all of them.
//!
//! Inbound frames are routed on syscall prefix (`view:`, `presentation:`,
//! `object:`, `interaction:`). Handlers decode a typed payload, call the owning
//! component, and append what the component reports to the outbox as
//! published frames. Nothing is sent anywhere; the host forwards the returned
//! frames to its views.
//!
//! Time only moves through `advance_to`, which runs due timers in
//! `(due, scheduled)` order and re-arms periodic work relative to the instant
//! it ran.
//!
//! DETERMINISM
//! ===========
//! Every replica processes the same frames at the same logical times, so
//! every replica must publish the same frames. Ids come from a per-session
//! counter, not a random generator, and all maps iterate in key order.
//!
//! ERROR HANDLING
//! ==============
//! Malformed frames earn an `error` reply built from `SessionError`. Domain
//! rejections are not errors on the wire: an invalid presenter transition is
//! logged at `warn` and publishes nothing, an unknown participant is a silent
//! no-op, and a denied lock request simply forwards nothing.

use std::collections::{BTreeMap, BTreeSet};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{LogicalTime, Scheduler};
use crate::consts::{LOCK_CHECK_INTERVAL_MS, PRESENCE_SWEEP_INTERVAL_MS};
use crate::frame::{Data, ErrorCode, Frame, Stamp};
use crate::lock::{LockArbiter, Release};
use crate::presence::{PresenceTracker, Touch};
use crate::presenter::{PresenterCoordinator, Stopped, ViewDetails};
use crate::types::{Edge, ObjectId, ParticipantId, PointerSample, QrState, Rect, UnknownProperty};

// =============================================================================
// PUBLISHED SYSCALLS
// =============================================================================

pub const USER_ADD: &str = "user:add";
pub const USER_DELETE: &str = "user:delete";
pub const USER_ACTIVITY: &str = "user:activity";
pub const USER_ALL_UPDATED: &str = "user:all_updated";
pub const POINTER_MOVED: &str = "pointer:moved";
pub const VIEWPORT_CHANGED: &str = "viewport:changed";
pub const PRESENTATION_STARTED: &str = "presentation:started";
pub const PRESENTATION_STOPPED: &str = "presentation:stopped";
pub const INTERACTION_STATE_CHANGED: &str = "interaction:state_changed";
pub const OBJECT_FREE: &str = "object:free";
pub const FRAME_STATE_CHANGED: &str = "frame:state_changed";

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("unknown syscall: {0}")]
    UnknownSyscall(String),
    #[error("invalid payload for {syscall}: {source}")]
    InvalidPayload {
        syscall: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    UnknownProperty(#[from] UnknownProperty),
    #[error("object not registered: {0}")]
    UnknownObject(ObjectId),
}

impl ErrorCode for SessionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownSyscall(_) => "E_UNKNOWN_SYSCALL",
            Self::InvalidPayload { .. } => "E_INVALID_PAYLOAD",
            Self::UnknownProperty(_) => "E_UNKNOWN_PROPERTY",
            Self::UnknownObject(_) => "E_UNKNOWN_OBJECT",
        }
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

#[derive(Debug, Deserialize)]
struct ViewRef {
    view_id: ParticipantId,
}

#[derive(Debug, Deserialize)]
struct ViewportReport {
    view_id: ParticipantId,
    scaler_rect: Rect,
}

#[derive(Debug, Deserialize)]
struct PointerReport {
    view_id: ParticipantId,
    #[serde(flatten)]
    pointer: PointerSample,
}

#[derive(Debug, Deserialize)]
struct FollowRequest {
    view_id: ParticipantId,
    is_following: bool,
}

#[derive(Debug, Deserialize)]
struct ObjectRef {
    object_id: ObjectId,
}

#[derive(Debug, Deserialize)]
struct QrRequest {
    object_id: ObjectId,
    state: QrState,
}

#[derive(Debug, Deserialize)]
struct GestureData {
    updates: Map<String, Value>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct InteractionRequest {
    object_id: ObjectId,
    requester: ParticipantId,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    event: Option<String>,
    data: GestureData,
}

#[derive(Debug, Deserialize)]
struct InteractionEnd {
    object_id: ObjectId,
    requester: ParticipantId,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    data: Map<String, Value>,
}

// =============================================================================
// STATE
// =============================================================================

/// Per-object replicated state.
#[derive(Debug, Clone, Default)]
pub struct SharedObject {
    pub locks: LockArbiter<Edge>,
    pub qr_state: QrState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Task {
    PresenceSweep,
    LockExpiry(ObjectId),
}

#[derive(Debug, Clone)]
pub struct Session {
    seed: u64,
    seq: u64,
    now: LogicalTime,
    presence: PresenceTracker,
    presenter: PresenterCoordinator,
    objects: BTreeMap<ObjectId, SharedObject>,
    scheduler: Scheduler<Task>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Session {
    /// Create a session at logical time zero. `seed` namespaces the ids of
    /// published frames; replicas of one session must share it.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        let mut session = Self {
            seed,
            seq: 0,
            now: LogicalTime::ZERO,
            presence: PresenceTracker::new(),
            presenter: PresenterCoordinator::new(),
            objects: BTreeMap::new(),
            scheduler: Scheduler::new(),
        };
        session.arm(PRESENCE_SWEEP_INTERVAL_MS, Task::PresenceSweep);
        session
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn now(&self) -> LogicalTime {
        self.now
    }

    #[must_use]
    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    #[must_use]
    pub fn presenter(&self) -> Option<ParticipantId> {
        self.presenter.presenter()
    }

    #[must_use]
    pub fn object(&self, id: ObjectId) -> Option<&SharedObject> {
        self.objects.get(&id)
    }

    #[must_use]
    pub fn view_details(&self, viewer: ParticipantId, subject: ParticipantId) -> Option<ViewDetails> {
        self.presenter.view_details(&self.presence, viewer, subject)
    }

    /// Due time of the next timer, if any.
    #[must_use]
    pub fn next_timer(&self) -> Option<LogicalTime> {
        self.scheduler.next_due()
    }

    // -------------------------------------------------------------------------
    // Clock
    // -------------------------------------------------------------------------

    /// Move the clock to `target`, running every timer due on the way.
    /// A target in the past is ignored; the clock never runs backwards.
    pub fn advance_to(&mut self, target: LogicalTime) -> Vec<Frame> {
        let mut out = Vec::new();
        if target < self.now {
            warn!(now = %self.now, %target, "ignoring clock regression");
            return out;
        }
        while let Some((due, task)) = self.scheduler.pop_due(target) {
            self.now = due;
            self.run_task(task, &mut out);
        }
        self.now = target;
        out
    }

    fn run_task(&mut self, task: Task, out: &mut Vec<Frame>) {
        match task {
            Task::PresenceSweep => {
                for change in self.presence.sweep(self.now) {
                    let data = data([
                        ("view_id", json!(change.participant)),
                        ("active", json!(change.activity.is_active())),
                    ]);
                    self.publish(out, USER_ACTIVITY, data);
                }
                self.arm(PRESENCE_SWEEP_INTERVAL_MS, Task::PresenceSweep);
            }
            Task::LockExpiry(object_id) => {
                let Some(object) = self.objects.get_mut(&object_id) else {
                    return;
                };
                let releases = object.locks.check_lock_expiry(self.now);
                self.publish_releases(out, object_id, &releases);
                self.arm(LOCK_CHECK_INTERVAL_MS, Task::LockExpiry(object_id));
            }
        }
    }

    /// Schedule `task` `interval` ms from now. Nothing is armed past the end
    /// of logical time, so `advance_to` always terminates.
    fn arm(&mut self, interval: u64, task: Task) {
        match self.now.after(interval) {
            Some(due) => self.scheduler.schedule_at(due, task),
            None => warn!(now = %self.now, ?task, "timer falls past end of logical time; not armed"),
        }
    }

    // -------------------------------------------------------------------------
    // Dispatch
    // -------------------------------------------------------------------------

    /// Process one inbound frame at the current logical time and return the
    /// frames published in response.
    pub fn dispatch(&mut self, req: &Frame) -> Vec<Frame> {
        let mut out = Vec::new();
        if let Err(e) = self.route(req, &mut out) {
            warn!(id = %req.id, syscall = %req.syscall, error = %e, "session: rejected frame");
            let stamp = self.stamp();
            out.push(req.error_from(stamp, &e));
        }
        out
    }

    fn route(&mut self, req: &Frame, out: &mut Vec<Frame>) -> Result<(), SessionError> {
        match (req.prefix(), req.op()) {
            ("view", "join" | "local_join") => {
                let p: ViewRef = decode(req)?;
                self.join(p.view_id, out);
            }
            ("view", "exit") => {
                let p: ViewRef = decode(req)?;
                self.exit(p.view_id, out);
            }
            ("view", "viewport") => {
                let p: ViewportReport = decode(req)?;
                self.viewport(p.view_id, p.scaler_rect, out);
            }
            ("view", "pointer") => {
                let p: PointerReport = decode(req)?;
                self.pointer(p.view_id, p.pointer, out);
            }
            ("presentation", "start") => {
                let p: ViewRef = decode(req)?;
                self.start_presentation(p.view_id, out);
            }
            ("presentation", op @ ("stop" | "force_stop")) => {
                let p: ViewRef = decode(req)?;
                self.stop_presentation(p.view_id, op == "force_stop", out);
            }
            ("presentation", "follow") => {
                let p: FollowRequest = decode(req)?;
                let stored = self.presenter.set_following(&mut self.presence, p.view_id, p.is_following);
                debug!(view_id = %p.view_id, requested = p.is_following, ?stored, "follow flag");
            }
            ("object", "register") => {
                let p: ObjectRef = decode(req)?;
                self.ensure_object(p.object_id);
            }
            ("object", "remove") => {
                let p: ObjectRef = decode(req)?;
                self.remove_object(p.object_id);
            }
            ("object", "qr_state") => {
                let p: QrRequest = decode(req)?;
                self.set_qr_state(p.object_id, p.state, out)?;
            }
            ("interaction", "request") => {
                let p: InteractionRequest = decode(req)?;
                self.request_interaction(p, out)?;
            }
            ("interaction", "end") => {
                let p: InteractionEnd = decode(req)?;
                self.end_interaction(p, out);
            }
            _ => return Err(SessionError::UnknownSyscall(req.syscall.clone())),
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Membership and presence
    // -------------------------------------------------------------------------

    fn join(&mut self, view_id: ParticipantId, out: &mut Vec<Frame>) {
        if !self.presence.register(view_id) {
            debug!(%view_id, "view already joined");
            return;
        }
        info!(%view_id, participants = self.presence.len(), "view joined");
        self.publish(out, USER_ADD, data([("view_id", json!(view_id))]));
    }

    fn exit(&mut self, view_id: ParticipantId, out: &mut Vec<Frame>) {
        if self.presence.remove(view_id).is_none() {
            debug!(%view_id, "exit for unknown view");
            return;
        }

        if let Some(stopped) = self.presenter.handle_departure(&mut self.presence, view_id) {
            self.publish_stopped(out, &stopped);
        }

        let object_ids: Vec<ObjectId> = self.objects.keys().copied().collect();
        for object_id in object_ids {
            let Some(object) = self.objects.get_mut(&object_id) else {
                continue;
            };
            if let Some(release) = object.locks.remove_participant(view_id) {
                self.publish_releases(out, object_id, std::slice::from_ref(&release));
            }
        }

        info!(%view_id, participants = self.presence.len(), "view exited");
        self.publish(out, USER_DELETE, data([("view_id", json!(view_id))]));
    }

    fn viewport(&mut self, view_id: ParticipantId, rect: Rect, out: &mut Vec<Frame>) {
        let Some(touch) = self.presence.record_viewport(view_id, rect, self.now) else {
            return;
        };
        self.publish_touch(out, view_id, touch);
        let mirrored = self.presenter.propagate_viewport(&mut self.presence, view_id, rect);
        if !mirrored.is_empty() {
            debug!(%view_id, followers = mirrored.len(), "mirrored presenter viewport");
        }
        let data = data([("view_id", json!(view_id)), ("scaler_rect", json!(rect))]);
        self.publish(out, VIEWPORT_CHANGED, data);
    }

    fn pointer(&mut self, view_id: ParticipantId, sample: PointerSample, out: &mut Vec<Frame>) {
        let mut payload = data([("view_id", json!(view_id)), ("x", json!(sample.x)), ("y", json!(sample.y))]);
        if let Some(target) = &sample.target {
            payload.insert("target".into(), json!(target));
        }
        let Some(touch) = self.presence.record_pointer(view_id, sample, self.now) else {
            return;
        };
        self.publish_touch(out, view_id, touch);
        self.publish(out, POINTER_MOVED, payload);
    }

    fn publish_touch(&mut self, out: &mut Vec<Frame>, view_id: ParticipantId, touch: Touch) {
        if touch == Touch::Activated {
            let data = data([("view_id", json!(view_id)), ("active", json!(true))]);
            self.publish(out, USER_ACTIVITY, data);
        }
    }

    // -------------------------------------------------------------------------
    // Presentation
    // -------------------------------------------------------------------------

    fn start_presentation(&mut self, requester: ParticipantId, out: &mut Vec<Frame>) {
        match self.presenter.start(&mut self.presence, requester) {
            Ok(started) => {
                let data = data([
                    ("view_id", json!(started.presenter)),
                    ("followers", json!(started.followers)),
                ]);
                self.publish(out, PRESENTATION_STARTED, data);
                self.publish_all_users(out);
            }
            Err(e) => warn!(error = %e, "presentation start rejected"),
        }
    }

    fn stop_presentation(&mut self, requester: ParticipantId, force: bool, out: &mut Vec<Frame>) {
        match self.presenter.stop(&mut self.presence, requester, force) {
            Ok(stopped) => self.publish_stopped(out, &stopped),
            Err(e) => warn!(error = %e, "presentation stop rejected"),
        }
    }

    fn publish_stopped(&mut self, out: &mut Vec<Frame>, stopped: &Stopped) {
        // Display hints only apply while presenting; reset without notifying.
        for object in self.objects.values_mut() {
            object.qr_state = QrState::Unspecified;
        }
        self.publish(out, PRESENTATION_STOPPED, data([("view_id", json!(stopped.presenter))]));
        self.publish_all_users(out);
    }

    fn publish_all_users(&mut self, out: &mut Vec<Frame>) {
        let pointers: Vec<Value> = self
            .presence
            .pointers()
            .map(|(id, p)| json!({"view_id": id, "x": p.x, "y": p.y, "target": p.target}))
            .collect();
        self.publish(out, USER_ALL_UPDATED, data([("pointers", Value::Array(pointers))]));
    }

    // -------------------------------------------------------------------------
    // Objects and interaction locks
    // -------------------------------------------------------------------------

    fn ensure_object(&mut self, object_id: ObjectId) -> &mut SharedObject {
        if !self.objects.contains_key(&object_id) {
            debug!(%object_id, "object registered");
            self.arm(LOCK_CHECK_INTERVAL_MS, Task::LockExpiry(object_id));
        }
        self.objects.entry(object_id).or_default()
    }

    fn remove_object(&mut self, object_id: ObjectId) {
        if self.objects.remove(&object_id).is_none() {
            return;
        }
        self.scheduler
            .cancel_where(|task| *task == Task::LockExpiry(object_id));
        debug!(%object_id, "object removed");
    }

    fn set_qr_state(&mut self, object_id: ObjectId, state: QrState, out: &mut Vec<Frame>) -> Result<(), SessionError> {
        let object = self
            .objects
            .get_mut(&object_id)
            .ok_or(SessionError::UnknownObject(object_id))?;
        object.qr_state = state;
        let data = data([("object_id", json!(object_id)), ("qr_state", json!(state))]);
        self.publish(out, FRAME_STATE_CHANGED, data);
        Ok(())
    }

    fn request_interaction(&mut self, req: InteractionRequest, out: &mut Vec<Frame>) -> Result<(), SessionError> {
        let requested = req
            .data
            .updates
            .keys()
            .map(|k| k.parse::<Edge>())
            .collect::<Result<BTreeSet<_>, _>>()?;

        // A request ordered after its sender's exit must not create a lock.
        if !self.presence.contains(req.requester) {
            debug!(requester = %req.requester, "interaction request from unknown view");
            return Ok(());
        }

        let now = self.now;
        let object = self.ensure_object(req.object_id);
        let grant = object.locks.request_interaction(req.requester, &requested, now);
        if grant.is_denied() {
            return Ok(());
        }
        if grant.acquired {
            self.publish_ownership(out, req.object_id);
        }

        // No event: the request only reserved the locks.
        let Some(event) = req.event else {
            return Ok(());
        };
        let mut forwarded = req.data.rest;
        let updates: Map<String, Value> = req
            .data
            .updates
            .into_iter()
            .filter(|(k, _)| k.parse::<Edge>().is_ok_and(|e| grant.granted.contains(&e)))
            .collect();
        forwarded.insert("updates".into(), Value::Object(updates));

        let stamp = self.stamp();
        let mut frame = Frame::notice(stamp, event, forwarded.into_iter().collect()).with_from(req.requester.to_string());
        frame.scope = req.scope;
        out.push(frame);
        Ok(())
    }

    fn end_interaction(&mut self, req: InteractionEnd, out: &mut Vec<Frame>) {
        let object_free = match self.objects.get_mut(&req.object_id) {
            Some(object) => {
                let ended = object.locks.end_interaction(req.requester);
                if let Some(release) = ended.release {
                    self.publish_releases(out, req.object_id, std::slice::from_ref(&release));
                }
                ended.object_free
            }
            None => true,
        };

        if !object_free {
            return;
        }
        if let Some(event) = req.event {
            let stamp = self.stamp();
            let mut frame = Frame::notice(stamp, event, req.data.into_iter().collect()).with_from(req.requester.to_string());
            frame.scope = req.scope;
            out.push(frame);
        }
    }

    fn publish_releases(&mut self, out: &mut Vec<Frame>, object_id: ObjectId, releases: &[Release<Edge>]) {
        let Some(last) = releases.last() else {
            return;
        };
        let free = last.object_free;
        self.publish_ownership(out, object_id);
        if free {
            self.publish(out, OBJECT_FREE, data([("object_id", json!(object_id))]));
        }
    }

    fn publish_ownership(&mut self, out: &mut Vec<Frame>, object_id: ObjectId) {
        let holders: Map<String, Value> = self
            .objects
            .get(&object_id)
            .map(|object| {
                object
                    .locks
                    .holders()
                    .map(|(id, locks)| (id.to_string(), json!(locks)))
                    .collect()
            })
            .unwrap_or_default();
        let data = data([("object_id", json!(object_id)), ("holders", Value::Object(holders))]);
        self.publish(out, INTERACTION_STATE_CHANGED, data);
    }

    // -------------------------------------------------------------------------
    // Outbox
    // -------------------------------------------------------------------------

    fn stamp(&mut self) -> Stamp {
        self.seq += 1;
        Stamp { id: Uuid::from_u64_pair(self.seed, self.seq), ts: self.now }
    }

    fn publish(&mut self, out: &mut Vec<Frame>, syscall: &str, data: Data) {
        let stamp = self.stamp();
        out.push(Frame::notice(stamp, syscall, data));
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn decode<T: DeserializeOwned>(req: &Frame) -> Result<T, SessionError> {
    req.payload()
        .map_err(|source| SessionError::InvalidPayload { syscall: req.syscall.clone(), source })
}

fn data<const N: usize>(pairs: [(&str, Value); N]) -> Data {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect()
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
