//! JSON normalizer for value kinds outside the JSON data model (spec §4.4 `makeJSON`).
use crate::value::{BytesKind, Value};

/// The largest (and, negated, the smallest) integer a JSON number can hold without precision
/// loss in a standard double-precision decoder (`2^53 - 1`).
const MAX_SAFE_INTEGER: i128 = 9_007_199_254_740_991;

/// Recursively replace every value kind that has no direct JSON representation with a JSON-safe
/// equivalent: `undefined -> "undefined"`, `RegEx -> {regexSrc, regexFlags}`,
/// `Symbol -> {symbolGlobal, symbolKey}`, `Set -> array`, `Map -> array of [k, v] pairs`,
/// `BigInt -> number` (if it fits a safe integer) or a decimal string otherwise, `Date -> an
/// object carrying milliseconds since the epoch`, and typed arrays / unclaimed extensions to a
/// plain array of their element values.
pub fn make_json(value: Value) -> Value {
    match value {
        Value::Undefined => Value::String("undefined".to_string()),
        Value::RegEx(re) => Value::Object(vec![
            ("regexSrc".into(), Value::String(re.src)),
            ("regexFlags".into(), Value::String(re.flags)),
        ]),
        Value::Symbol(sym) => Value::Object(vec![
            ("symbolGlobal".into(), Value::Bool(sym.global)),
            ("symbolKey".into(), Value::String(sym.key)),
        ]),
        Value::Set(items) => Value::Array(items.into_iter().map(make_json).collect()),
        Value::Map(pairs) => Value::Array(
            pairs
                .into_iter()
                .map(|(k, v)| Value::Array(vec![make_json(k), make_json(v)]))
                .collect(),
        ),
        Value::BigInt(v) => {
            if (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(&v) {
                Value::Int(v as i64)
            } else {
                Value::String(v.to_string())
            }
        }
        Value::Date(date) => {
            Value::Object(vec![("dateUnixMillis".into(), Value::Int(date.unix_millis()))])
        }
        Value::Bytes(kind, bytes) => Value::Array(bytes_to_numbers(kind, &bytes)),
        Value::Ext(type_byte, payload) => Value::Object(vec![
            ("extType".into(), Value::UInt(type_byte as u64)),
            (
                "extData".into(),
                Value::Array(payload.iter().map(|b| Value::UInt(*b as u64)).collect()),
            ),
        ]),
        Value::Array(items) => Value::Array(items.into_iter().map(make_json).collect()),
        Value::Object(pairs) => {
            Value::Object(pairs.into_iter().map(|(k, v)| (k, make_json(v))).collect())
        }
        scalar => scalar,
    }
}

/// Decode a typed array's raw bytes into JSON-representable numbers. Typed array payloads carry
/// no endianness of their own (spec §4.1 treats them as opaque raw bytes), so elements wider than
/// a byte are read little-endian, matching how the host platforms in this corpus lay out typed
/// arrays in memory.
fn bytes_to_numbers(kind: BytesKind, bytes: &[u8]) -> Vec<Value> {
    match kind {
        BytesKind::Int8 => bytes.iter().map(|b| Value::Int(*b as i8 as i64)).collect(),
        BytesKind::UInt8 | BytesKind::UInt8Clamped | BytesKind::Buffer => {
            bytes.iter().map(|b| Value::UInt(*b as u64)).collect()
        }
        BytesKind::Int16 => bytes
            .chunks_exact(2)
            .map(|c| Value::Int(i16::from_le_bytes([c[0], c[1]]) as i64))
            .collect(),
        BytesKind::UInt16 => bytes
            .chunks_exact(2)
            .map(|c| Value::UInt(u16::from_le_bytes([c[0], c[1]]) as u64))
            .collect(),
        BytesKind::Int32 => bytes
            .chunks_exact(4)
            .map(|c| Value::Int(i32::from_le_bytes(c.try_into().unwrap()) as i64))
            .collect(),
        BytesKind::UInt32 => bytes
            .chunks_exact(4)
            .map(|c| Value::UInt(u32::from_le_bytes(c.try_into().unwrap()) as u64))
            .collect(),
        BytesKind::Float32 => bytes
            .chunks_exact(4)
            .map(|c| Value::Float32(f32::from_le_bytes(c.try_into().unwrap())))
            .collect(),
        BytesKind::Float64 => bytes
            .chunks_exact(8)
            .map(|c| Value::Float64(f64::from_le_bytes(c.try_into().unwrap())))
            .collect(),
        BytesKind::Int64 => bytes
            .chunks_exact(8)
            .map(|c| Value::Int(i64::from_le_bytes(c.try_into().unwrap())))
            .collect(),
        BytesKind::UInt64 => bytes
            .chunks_exact(8)
            .map(|c| Value::UInt(u64::from_le_bytes(c.try_into().unwrap())))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Date, RegEx, Symbol};

    #[test]
    fn undefined_becomes_string() {
        assert_eq!(make_json(Value::Undefined), Value::String("undefined".into()));
    }

    #[test]
    fn regex_becomes_object() {
        let re = Value::RegEx(RegEx::new("a+", "i"));
        assert_eq!(
            make_json(re),
            Value::Object(vec![
                ("regexSrc".into(), Value::String("a+".into())),
                ("regexFlags".into(), Value::String("i".into())),
            ])
        );
    }

    #[test]
    fn symbol_becomes_object() {
        let sym = Value::Symbol(Symbol { global: true, key: "k".into() });
        assert_eq!(
            make_json(sym),
            Value::Object(vec![
                ("symbolGlobal".into(), Value::Bool(true)),
                ("symbolKey".into(), Value::String("k".into())),
            ])
        );
    }

    #[test]
    fn set_becomes_array() {
        let set = Value::Set(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(make_json(set), Value::Array(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn map_becomes_array_of_pairs() {
        let map = Value::Map(vec![(Value::String("k".into()), Value::Int(1))]);
        assert_eq!(
            make_json(map),
            Value::Array(vec![Value::Array(vec![Value::String("k".into()), Value::Int(1)])])
        );
    }

    #[test]
    fn bigint_within_safe_range_becomes_number() {
        assert_eq!(make_json(Value::BigInt(42)), Value::Int(42));
    }

    #[test]
    fn bigint_outside_safe_range_becomes_decimal_string() {
        let huge = MAX_SAFE_INTEGER + 1;
        assert_eq!(make_json(Value::BigInt(huge)), Value::String(huge.to_string()));
    }

    #[test]
    fn typed_array_becomes_number_array() {
        let bytes = Value::Bytes(BytesKind::UInt16, vec![0x01, 0x00, 0x02, 0x00]);
        assert_eq!(make_json(bytes), Value::Array(vec![Value::UInt(1), Value::UInt(2)]));
    }

    #[test]
    fn nested_containers_recurse() {
        let value = Value::Array(vec![Value::Set(vec![Value::Undefined])]);
        assert_eq!(
            make_json(value),
            Value::Array(vec![Value::Array(vec![Value::String("undefined".into())])])
        );
    }

    #[test]
    fn date_becomes_object_with_millis() {
        let value = Value::Date(Date::from_unix_millis(1_700_000_000_000));
        assert_eq!(
            make_json(value),
            Value::Object(vec![("dateUnixMillis".into(), Value::Int(1_700_000_000_000))])
        );
    }
}
