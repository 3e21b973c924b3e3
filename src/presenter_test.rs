use super::*;
use crate::clock::LogicalTime;
use uuid::Uuid;

fn pid(n: u128) -> ParticipantId {
    ParticipantId::from_uuid(Uuid::from_u128(n))
}

const A: u128 = 1;
const B: u128 = 2;
const C: u128 = 3;

fn tracker_with(ids: &[u128]) -> PresenceTracker {
    let mut t = PresenceTracker::new();
    for id in ids {
        t.register(pid(*id));
    }
    t
}

fn following(t: &PresenceTracker, n: u128) -> bool {
    t.get(pid(n)).is_some_and(|r| r.is_following)
}

#[test]
fn starts_idle() {
    let c = PresenterCoordinator::new();
    assert_eq!(c.state(), PresentationState::Idle);
    assert_eq!(c.presenter(), None);
}

#[test]
fn start_makes_everyone_else_follow() {
    let mut t = tracker_with(&[A, B, C]);
    let mut c = PresenterCoordinator::new();

    let started = c.start(&mut t, pid(A)).expect("start");
    assert_eq!(started.presenter, pid(A));
    assert_eq!(started.followers, vec![pid(B), pid(C)]);
    assert_eq!(c.presenter(), Some(pid(A)));
    assert!(!following(&t, A));
    assert!(following(&t, B));
    assert!(following(&t, C));
}

#[test]
fn second_start_is_rejected_and_presenter_is_unchanged() {
    let mut t = tracker_with(&[A, B]);
    let mut c = PresenterCoordinator::new();
    c.start(&mut t, pid(A)).expect("start");

    let err = c.start(&mut t, pid(B)).expect_err("second start");
    assert_eq!(err, PresenterError::AlreadyPresenting { requester: pid(B), presenter: pid(A) });
    assert_eq!(c.presenter(), Some(pid(A)));
    assert!(following(&t, B));
}

#[test]
fn unknown_participant_cannot_start() {
    let mut t = tracker_with(&[A]);
    let mut c = PresenterCoordinator::new();
    assert_eq!(c.start(&mut t, pid(9)), Err(PresenterError::UnknownParticipant(pid(9))));
    assert_eq!(c.state(), PresentationState::Idle);
}

#[test]
fn stop_by_non_presenter_is_rejected() {
    let mut t = tracker_with(&[A, B]);
    let mut c = PresenterCoordinator::new();
    c.start(&mut t, pid(A)).expect("start");

    let err = c.stop(&mut t, pid(B), false).expect_err("stop");
    assert_eq!(err, PresenterError::NotPresenter { requester: pid(B), presenter: pid(A) });
    assert_eq!(c.presenter(), Some(pid(A)));
    assert!(following(&t, B));
}

#[test]
fn force_stop_by_anyone_clears_presenter_and_follow_flags() {
    let mut t = tracker_with(&[A, B, C]);
    let mut c = PresenterCoordinator::new();
    c.start(&mut t, pid(A)).expect("start");

    let stopped = c.stop(&mut t, pid(B), true).expect("force stop");
    assert_eq!(stopped.presenter, pid(A));
    assert_eq!(stopped.unfollowed, vec![pid(B), pid(C)]);
    assert_eq!(c.state(), PresentationState::Idle);
    assert!(!following(&t, B));
    assert!(!following(&t, C));
}

#[test]
fn presenter_can_stop_own_presentation() {
    let mut t = tracker_with(&[A, B]);
    let mut c = PresenterCoordinator::new();
    c.start(&mut t, pid(A)).expect("start");

    assert!(c.stop(&mut t, pid(A), false).is_ok());
    assert_eq!(c.presenter(), None);
}

#[test]
fn stop_without_presentation_is_rejected() {
    let mut t = tracker_with(&[A]);
    let mut c = PresenterCoordinator::new();
    assert_eq!(c.stop(&mut t, pid(A), true), Err(PresenterError::NoPresentation { requester: pid(A) }));
}

#[test]
fn follow_is_forced_off_without_presenter() {
    let mut t = tracker_with(&[A, B]);
    let c = PresenterCoordinator::new();
    assert_eq!(c.set_following(&mut t, pid(B), true), Some(false));
    assert!(!following(&t, B));
}

#[test]
fn follow_copies_presenter_viewport() {
    let mut t = tracker_with(&[A, B, C]);
    let mut c = PresenterCoordinator::new();
    let rect = Rect::new(100.0, 50.0, 1280.0, 720.0);
    t.record_viewport(pid(A), rect, LogicalTime::from_millis(10));
    c.start(&mut t, pid(A)).expect("start");
    c.set_following(&mut t, pid(C), false);

    assert_eq!(c.set_following(&mut t, pid(C), true), Some(true));
    assert_eq!(t.get(pid(C)).and_then(|r| r.last_viewport), Some(rect));
}

#[test]
fn follow_mirrors_missing_presenter_viewport() {
    let mut t = tracker_with(&[A, C]);
    let mut c = PresenterCoordinator::new();
    t.record_viewport(pid(C), Rect::new(1.0, 2.0, 3.0, 4.0), LogicalTime::from_millis(10));

    // Starting already opts C in; its stale viewport must not survive.
    c.start(&mut t, pid(A)).expect("start");
    assert_eq!(t.get(pid(C)).and_then(|r| r.last_viewport), None);

    t.record_viewport(pid(C), Rect::new(9.0, 9.0, 9.0, 9.0), LogicalTime::from_millis(20));
    assert_eq!(c.set_following(&mut t, pid(C), true), Some(true));
    let presenter_view = t.get(pid(A)).and_then(|r| r.last_viewport);
    assert_eq!(t.get(pid(C)).and_then(|r| r.last_viewport), presenter_view);
}

#[test]
fn presenter_cannot_follow_itself() {
    let mut t = tracker_with(&[A]);
    let mut c = PresenterCoordinator::new();
    c.start(&mut t, pid(A)).expect("start");
    assert_eq!(c.set_following(&mut t, pid(A), true), Some(false));
}

#[test]
fn follow_for_unknown_participant_is_none() {
    let mut t = tracker_with(&[A]);
    let c = PresenterCoordinator::new();
    assert_eq!(c.set_following(&mut t, pid(9), true), None);
}

#[test]
fn presenter_viewport_is_pushed_to_followers_only() {
    let mut t = tracker_with(&[A, B, C]);
    let mut c = PresenterCoordinator::new();
    c.start(&mut t, pid(A)).expect("start");
    c.set_following(&mut t, pid(C), false);

    let rect = Rect::new(5.0, 5.0, 640.0, 480.0);
    let updated = c.propagate_viewport(&mut t, pid(A), rect);

    assert_eq!(updated, vec![pid(B)]);
    assert_eq!(t.get(pid(B)).and_then(|r| r.last_viewport), Some(rect));
    assert_eq!(t.get(pid(C)).and_then(|r| r.last_viewport), None);
}

#[test]
fn non_presenter_viewport_is_not_propagated() {
    let mut t = tracker_with(&[A, B]);
    let mut c = PresenterCoordinator::new();
    c.start(&mut t, pid(A)).expect("start");
    assert!(c.propagate_viewport(&mut t, pid(B), Rect::new(0.0, 0.0, 1.0, 1.0)).is_empty());
}

#[test]
fn presenter_departure_forces_stop() {
    let mut t = tracker_with(&[A, B]);
    let mut c = PresenterCoordinator::new();
    c.start(&mut t, pid(A)).expect("start");
    t.remove(pid(A));

    let stopped = c.handle_departure(&mut t, pid(A)).expect("stopped");
    assert_eq!(stopped.presenter, pid(A));
    assert_eq!(c.presenter(), None);
    assert!(!following(&t, B));
}

#[test]
fn non_presenter_departure_keeps_presentation() {
    let mut t = tracker_with(&[A, B]);
    let mut c = PresenterCoordinator::new();
    c.start(&mut t, pid(A)).expect("start");
    assert_eq!(c.handle_departure(&mut t, pid(B)), None);
    assert_eq!(c.presenter(), Some(pid(A)));
}

#[test]
fn view_details_reflect_roles() {
    let mut t = tracker_with(&[A, B]);
    let mut c = PresenterCoordinator::new();
    c.start(&mut t, pid(A)).expect("start");
    t.record_pointer(pid(B), crate::types::PointerSample { x: 0.0, y: 0.0, target: None }, LogicalTime::ZERO);

    let a = c.view_details(&t, pid(B), pid(A)).expect("details");
    assert!(a.is_presenter && !a.is_follower && !a.is_local);

    let b = c.view_details(&t, pid(B), pid(B)).expect("details");
    assert!(b.is_local && b.is_follower && b.is_active && !b.is_presenter);

    assert!(c.view_details(&t, pid(A), pid(9)).is_none());
}
