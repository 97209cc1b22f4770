//! Checks that `make_json`'s output round-trips through a real JSON library (SPEC_FULL.md §2.4),
//! not just that this crate's own `Value` enum shape matches expectations.
use jampack::{BytesKind, DecodeOptions, EncodeOptions, Value};
use serde_json::json;

fn to_serde_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(v) => json!(v),
        Value::UInt(v) => json!(v),
        Value::Float32(v) => json!(v),
        Value::Float64(v) => json!(v),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(to_serde_json).collect()),
        Value::Object(pairs) => serde_json::Value::Object(
            pairs.iter().map(|(k, v)| (k.clone(), to_serde_json(v))).collect(),
        ),
        other => panic!("value not JSON-safe after make_json: {other:?}"),
    }
}

fn round_trip_through_serde(value: Value) -> Value {
    let opts = EncodeOptions::new();
    let mut enc = jampack::Encoder::new(opts);
    let bytes = enc.encode(&value).unwrap();

    let mut dec = jampack::Decoder::new(DecodeOptions::new().make_json(true));
    let decoded = dec.decode(&bytes).unwrap();
    assert!(dec.valid_json);

    let as_json = to_serde_json(&decoded);
    let text = serde_json::to_string(&as_json).unwrap();
    let reparsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(as_json, reparsed);
    decoded
}

#[test]
fn undefined_round_trips_to_json_string() {
    let decoded = round_trip_through_serde(Value::Undefined);
    assert_eq!(decoded, Value::String("undefined".into()));
}

#[test]
fn date_round_trips_to_json_object_with_millis() {
    let decoded = round_trip_through_serde(Value::Date(jampack::Date::from_unix_millis(1_700_000_000_000)));
    assert_eq!(
        decoded,
        Value::Object(vec![("dateUnixMillis".into(), Value::Int(1_700_000_000_000))])
    );
}

#[test]
fn typed_array_round_trips_to_json_number_array() {
    let decoded = round_trip_through_serde(Value::Bytes(BytesKind::UInt16, vec![0x01, 0x00, 0x02, 0x00]));
    assert_eq!(decoded, Value::Array(vec![Value::UInt(1), Value::UInt(2)]));
}

#[test]
fn nested_object_with_set_and_map_round_trips() {
    let value = Value::Object(vec![(
        "payload".into(),
        Value::Array(vec![
            Value::Set(vec![Value::Int(1), Value::Int(2)]),
            Value::Map(vec![(Value::String("k".into()), Value::Int(3))]),
        ]),
    )]);
    let decoded = round_trip_through_serde(value);
    assert_eq!(
        decoded,
        Value::Object(vec![(
            "payload".into(),
            Value::Array(vec![
                Value::Array(vec![Value::UInt(1), Value::UInt(2)]),
                Value::Array(vec![Value::Array(vec![Value::String("k".into()), Value::UInt(3)])]),
            ])
        )])
    );
}

#[test]
fn ordinary_json_safe_values_report_valid_json_without_make_json() {
    let value = Value::Object(vec![("a".into(), Value::Array(vec![Value::Int(1), Value::Bool(true)]))]);
    let mut enc = jampack::Encoder::new(EncodeOptions::new());
    let bytes = enc.encode(&value).unwrap();

    let mut dec = jampack::Decoder::new(DecodeOptions::new());
    let decoded = dec.decode(&bytes).unwrap();
    assert!(dec.valid_json);
    let as_json = to_serde_json(&decoded);
    serde_json::to_string(&as_json).unwrap();
}
