use super::*;
use uuid::Uuid;

fn pid(n: u128) -> ParticipantId {
    ParticipantId::from_uuid(Uuid::from_u128(n))
}

fn at(ms: u64) -> LogicalTime {
    LogicalTime::from_millis(ms)
}

fn pointer(x: f64, y: f64) -> PointerSample {
    PointerSample { x, y, target: None }
}

#[test]
fn register_creates_unknown_record() {
    let mut t = PresenceTracker::new();
    assert!(t.register(pid(1)));
    let rec = t.get(pid(1)).expect("record");
    assert_eq!(rec.activity, Activity::Unknown);
    assert!(!rec.is_following);
    assert!(rec.last_viewport.is_none());
}

#[test]
fn register_twice_keeps_existing_record() {
    let mut t = PresenceTracker::new();
    t.register(pid(1));
    t.record_pointer(pid(1), pointer(3.0, 4.0), at(10));

    assert!(!t.register(pid(1)));
    assert_eq!(t.get(pid(1)).and_then(|r| r.last_pointer.clone()), Some(pointer(3.0, 4.0)));
}

#[test]
fn pointer_report_activates_and_stamps_time() {
    let mut t = PresenceTracker::new();
    t.register(pid(1));

    assert_eq!(t.record_pointer(pid(1), pointer(1.0, 2.0), at(300)), Some(Touch::Activated));
    let rec = t.get(pid(1)).expect("record");
    assert!(rec.is_active());
    assert_eq!(rec.last_active_time, at(300));

    assert_eq!(t.record_pointer(pid(1), pointer(5.0, 5.0), at(400)), Some(Touch::Refreshed));
    assert_eq!(t.get(pid(1)).map(|r| r.last_active_time), Some(at(400)));
}

#[test]
fn viewport_report_stores_rect() {
    let mut t = PresenceTracker::new();
    t.register(pid(1));
    let rect = Rect::new(0.0, 0.0, 800.0, 600.0);

    assert_eq!(t.record_viewport(pid(1), rect, at(50)), Some(Touch::Activated));
    assert_eq!(t.get(pid(1)).and_then(|r| r.last_viewport), Some(rect));
}

#[test]
fn reports_for_unknown_participant_are_ignored() {
    let mut t = PresenceTracker::new();
    assert_eq!(t.record_pointer(pid(9), pointer(0.0, 0.0), at(1)), None);
    assert_eq!(t.record_viewport(pid(9), Rect::new(0.0, 0.0, 1.0, 1.0), at(1)), None);
    assert!(t.is_empty());
}

#[test]
fn first_sweep_presumes_new_participants_active() {
    let mut t = PresenceTracker::new();
    t.register(pid(1));

    let changes = t.sweep(at(500));
    assert_eq!(changes, vec![ActivityChange { participant: pid(1), activity: Activity::Active }]);
    assert_eq!(t.get(pid(1)).map(|r| r.last_active_time), Some(at(500)));
}

#[test]
fn sweep_deactivates_only_after_threshold() {
    let mut t = PresenceTracker::new();
    t.register(pid(1));
    t.record_pointer(pid(1), pointer(0.0, 0.0), at(1_000));

    assert!(t.sweep(at(6_000)).is_empty(), "exactly at threshold is still active");
    let changes = t.sweep(at(6_001));
    assert_eq!(changes, vec![ActivityChange { participant: pid(1), activity: Activity::Inactive }]);
    assert!(!t.get(pid(1)).expect("record").is_active());
}

#[test]
fn inactive_participant_stays_inactive_until_it_reports() {
    let mut t = PresenceTracker::new();
    t.register(pid(1));
    t.record_pointer(pid(1), pointer(0.0, 0.0), at(0));
    t.sweep(at(5_500));

    assert!(t.sweep(at(20_000)).is_empty());
    assert_eq!(t.record_pointer(pid(1), pointer(1.0, 1.0), at(20_100)), Some(Touch::Activated));
}

#[test]
fn idle_report_never_deactivates() {
    let mut t = PresenceTracker::new();
    t.register(pid(1));
    t.record_viewport(pid(1), Rect::new(0.0, 0.0, 1.0, 1.0), at(0));
    // A report long after the last one refreshes rather than flipping state.
    assert_eq!(t.record_viewport(pid(1), Rect::new(0.0, 0.0, 2.0, 2.0), at(60_000)), Some(Touch::Refreshed));
}

#[test]
fn sweep_after_removal_is_silent() {
    let mut t = PresenceTracker::new();
    t.register(pid(1));
    t.remove(pid(1));
    assert!(t.sweep(at(10_000)).is_empty());
}

#[test]
fn pointers_lists_only_reported_pointers_in_id_order() {
    let mut t = PresenceTracker::new();
    t.register(pid(2));
    t.register(pid(1));
    t.register(pid(3));
    t.record_pointer(pid(2), pointer(2.0, 2.0), at(1));
    t.record_pointer(pid(1), pointer(1.0, 1.0), at(1));

    let ids: Vec<_> = t.pointers().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![pid(1), pid(2)]);
}

#[test]
fn mirror_viewport_does_not_count_as_activity() {
    let mut t = PresenceTracker::new();
    t.register(pid(1));
    let rect = Rect::new(10.0, 10.0, 100.0, 100.0);

    assert!(t.mirror_viewport(pid(1), Some(rect)));
    let rec = t.get(pid(1)).expect("record");
    assert_eq!(rec.last_viewport, Some(rect));
    assert_eq!(rec.activity, Activity::Unknown);
}

#[test]
fn mirroring_no_viewport_clears_the_old_one() {
    let mut t = PresenceTracker::new();
    t.register(pid(1));
    t.record_viewport(pid(1), Rect::new(1.0, 2.0, 3.0, 4.0), at(5));

    assert!(t.mirror_viewport(pid(1), None));
    assert_eq!(t.get(pid(1)).and_then(|r| r.last_viewport), None);
    assert!(!t.mirror_viewport(pid(2), None));
}
