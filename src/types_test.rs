use super::*;

#[test]
fn participant_id_parses_and_displays_uuid() {
    let raw = "6f1c1b7a-3f43-4a55-9b8e-2f4c0d6a1e90";
    let id: ParticipantId = raw.parse().expect("parse");
    assert_eq!(id.to_string(), raw);
}

#[test]
fn participant_id_rejects_garbage() {
    assert!("not-a-view".parse::<ParticipantId>().is_err());
}

#[test]
fn participant_id_serializes_transparently() {
    let id = ParticipantId::from_uuid(Uuid::from_u128(1));
    let json = serde_json::to_value(id).expect("serialize");
    assert_eq!(json, serde_json::json!("00000000-0000-0000-0000-000000000001"));
}

#[test]
fn edge_parses_known_names() {
    for edge in Edge::ALL {
        assert_eq!(edge.as_str().parse::<Edge>(), Ok(edge));
    }
}

#[test]
fn edge_rejects_unknown_name() {
    let err = "middle".parse::<Edge>().expect_err("should fail");
    assert_eq!(err, UnknownProperty("middle".into()));
    assert_eq!(err.to_string(), "unknown property: middle");
}

#[test]
fn edge_orders_deterministically() {
    let mut edges = vec![Edge::Right, Edge::Top, Edge::Left, Edge::Bottom];
    edges.sort();
    assert_eq!(edges, Edge::ALL.to_vec());
}

#[test]
fn pointer_sample_target_is_optional() {
    let sample: PointerSample = serde_json::from_value(serde_json::json!({"x": 1.0, "y": 2.0})).expect("parse");
    assert_eq!(sample.target, None);
    let back = serde_json::to_value(&sample).expect("serialize");
    assert_eq!(back, serde_json::json!({"x": 1.0, "y": 2.0}));
}

#[test]
fn activity_defaults_to_unknown() {
    assert_eq!(Activity::default(), Activity::Unknown);
    assert!(!Activity::Unknown.is_active());
    assert!(!Activity::Inactive.is_active());
    assert!(Activity::Active.is_active());
}

#[test]
fn qr_state_serializes_lowercase() {
    assert_eq!(serde_json::to_value(QrState::Show).expect("serialize"), serde_json::json!("show"));
    let parsed: QrState = serde_json::from_value(serde_json::json!("unspecified")).expect("parse");
    assert_eq!(parsed, QrState::Unspecified);
}
