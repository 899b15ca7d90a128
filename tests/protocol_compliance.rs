//! Pins the outbound wire shapes from §6.3: `data` is always a JSON-encoded
//! string, except `ping`/`pong` which omit the field entirely.

use serde_json::Value;
use wavecast::protocol::{InboundMessage, MessageData, PusherMessage};

fn to_json(message: &PusherMessage) -> Value {
    serde_json::to_value(message).unwrap()
}

#[test]
fn connection_established_data_is_a_string() {
    let message = PusherMessage::connection_established("123.456".to_string(), 30);
    let json = to_json(&message);
    assert!(json["data"].is_string());
    let inner: Value = serde_json::from_str(json["data"].as_str().unwrap()).unwrap();
    assert_eq!(inner["socket_id"], "123.456");
    assert_eq!(inner["activity_timeout"], 30);
}

#[test]
fn ping_and_pong_omit_data_entirely() {
    let ping = to_json(&PusherMessage::ping());
    assert!(ping.get("data").is_none());
    assert_eq!(ping["event"], "pusher:ping");

    let pong = to_json(&PusherMessage::pong());
    assert!(pong.get("data").is_none());
    assert_eq!(pong["event"], "pusher:pong");
}

#[test]
fn error_data_is_a_json_encoded_string() {
    let message = PusherMessage::error(4009, "Connection unauthorized".to_string(), None);
    let json = to_json(&message);
    assert!(json["data"].is_string());
    let inner: Value = serde_json::from_str(json["data"].as_str().unwrap()).unwrap();
    assert_eq!(inner["code"], 4009);
    assert_eq!(inner["message"], "Connection unauthorized");
}

#[test]
fn subscription_succeeded_carries_channel_and_string_data() {
    let message = PusherMessage::subscription_succeeded("chat".to_string(), &serde_json::json!({}));
    let json = to_json(&message);
    assert_eq!(json["channel"], "chat");
    assert_eq!(json["data"], "{}");
}

#[test]
fn member_added_and_removed_shapes() {
    let added = PusherMessage::member_added("presence-room".to_string(), "u1", &serde_json::json!({"name": "Alice"}));
    let added_json = to_json(&added);
    let inner: Value = serde_json::from_str(added_json["data"].as_str().unwrap()).unwrap();
    assert_eq!(inner["user_id"], "u1");
    assert_eq!(inner["user_info"]["name"], "Alice");

    let removed = PusherMessage::member_removed("presence-room".to_string(), "u1");
    let removed_json = to_json(&removed);
    let inner: Value = serde_json::from_str(removed_json["data"].as_str().unwrap()).unwrap();
    assert_eq!(inner["user_id"], "u1");
}

#[test]
fn cache_miss_has_no_data_field() {
    let message = PusherMessage::cache_miss("cache-weather".to_string());
    let json = to_json(&message);
    assert_eq!(json["channel"], "cache-weather");
    assert!(json.get("data").is_none());
}

#[test]
fn inbound_data_accepts_object_or_string_form() {
    let object_form: InboundMessage =
        serde_json::from_str(r#"{"event":"pusher:subscribe","data":{"channel":"chat"}}"#).unwrap();
    match object_form.data.unwrap() {
        MessageData::Json(v) => assert_eq!(v["channel"], "chat"),
        MessageData::String(_) => panic!("expected object form"),
    }

    let string_form: InboundMessage =
        serde_json::from_str(r#"{"event":"pusher:subscribe","data":"{\"channel\":\"chat\"}"}"#).unwrap();
    let value = string_form.data.unwrap().into_value().unwrap();
    assert_eq!(value["channel"], "chat");
}
