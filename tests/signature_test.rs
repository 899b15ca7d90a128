//! Signature auth end to end (§4.4, §8 invariant 6, scenario S5).

use wavecast::token::{secure_compare, Token};

#[test]
fn subscribe_signature_matches_socket_channel_and_data() {
    let token = Token::new("key1".to_string(), "secret1".to_string());
    let socket_id = "123.456";
    let channel = "presence-room";
    let channel_data = r#"{"user_id":"u1","user_info":{"name":"Alice"}}"#;
    let message = format!("{socket_id}:{channel}:{channel_data}");
    let signature = token.sign(&message);

    assert!(token.verify(&message, &signature));
    assert!(!token.verify(&message, "deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef"));
}

#[test]
fn private_channel_signature_has_no_channel_data_segment() {
    let token = Token::new("key1".to_string(), "secret1".to_string());
    let message = "123.456:private-x";
    let signature = token.sign(message);
    assert!(token.verify(message, &signature));
}

#[test]
fn secure_compare_runtime_does_not_short_circuit_on_content() {
    // Not a true timing assertion (infeasible in a unit test), but pins the
    // documented behavior: only a length mismatch takes the fast path.
    let a = "a".repeat(64);
    let mut one_byte_diff = a.clone();
    one_byte_diff.replace_range(0..1, "b");
    let mut many_byte_diff = "c".repeat(64);
    many_byte_diff.truncate(64);

    assert!(!secure_compare(&a, &one_byte_diff));
    assert!(!secure_compare(&a, &many_byte_diff));
    assert!(secure_compare(&a, &a));
}
