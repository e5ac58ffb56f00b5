// Verify the WS wire format matches what the notification client expects.

use teleclaude_protocol::frames::{EventFrame, InboundFrame, ResFrame};
use teleclaude_protocol::topics::{SubscribeParams, NOTIFICATIONS};

#[test]
fn req_frame_round_trip() {
    let json = r#"{"type":"req","id":"abc-123","method":"subscribe","params":{"topic":"notifications"}}"#;
    let frame: InboundFrame = serde_json::from_str(json).unwrap();
    assert_eq!(frame.frame_type, "req");

    let req = frame.as_req().unwrap();
    assert_eq!(req.method, "subscribe");
    assert_eq!(req.id, "abc-123");

    let params: SubscribeParams = serde_json::from_value(req.params.unwrap()).unwrap();
    assert_eq!(params.topic, NOTIFICATIONS);
}

#[test]
fn res_ok_serialization() {
    let res = ResFrame::ok("req-1", serde_json::json!({"subscribed": "notifications"}));
    let json = serde_json::to_string(&res).unwrap();

    assert!(json.contains(r#""type":"res""#));
    assert!(json.contains(r#""ok":true"#));
    assert!(json.contains(r#""subscribed":"notifications""#));
    // error field must be absent on success
    assert!(!json.contains(r#""error""#));
}

#[test]
fn res_err_serialization() {
    let res = ResFrame::err("req-2", "UNKNOWN_TOPIC", "no such topic");
    let json = serde_json::to_string(&res).unwrap();

    assert!(json.contains(r#""ok":false"#));
    assert!(json.contains(r#""UNKNOWN_TOPIC""#));
    // payload must be absent on error
    assert!(!json.contains(r#""payload""#));
}

#[test]
fn event_frame_with_seq_carries_notification_payload() {
    let ev = EventFrame::new(NOTIFICATIONS, serde_json::json!({"notification_id": "n1"})).with_seq(42);
    let json = serde_json::to_string(&ev).unwrap();

    assert!(json.contains(r#""type":"event""#));
    assert!(json.contains(r#""event":"notifications""#));
    assert!(json.contains(r#""seq":42"#));
}

#[test]
fn inbound_frame_rejects_non_req() {
    let json = r#"{"type":"event","event":"notifications","payload":{}}"#;
    let frame: InboundFrame = serde_json::from_str(json).unwrap();
    assert!(frame.as_req().is_none(), "event frame must not parse as req");
}
