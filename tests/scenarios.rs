//! End-to-end fixture tests for the scenarios spec.md §8 spells out byte-for-byte (S1-S7).
use jampack::{DecodeOptions, EncodeOptions, Error, Value};

fn encode(options: EncodeOptions, value: &Value) -> (Vec<u8>, jampack::Encoder) {
    let mut enc = jampack::Encoder::new(options);
    let bytes = enc.encode(value).unwrap();
    (bytes, enc)
}

#[test]
fn s1_empty_object() {
    let (bytes, _) = encode(EncodeOptions::new(), &Value::Object(vec![]));

    assert_eq!(&bytes[0..2], &[0x50, 0x4A]); // magic "JP", little-endian file
    assert_eq!(bytes[2], 1); // version major
    assert_eq!(bytes[4], 32); // header size, no CRC/key
    assert_eq!(bytes[5], 0); // flags: none set

    let value_size = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
    let str_size = u64::from_le_bytes(bytes[16..24].try_into().unwrap());
    let data_size = u64::from_le_bytes(bytes[24..32].try_into().unwrap());
    assert_eq!((value_size, str_size, data_size), (2, 3, 5));

    assert_eq!(&bytes[32..34], &[0x80, 0xC4]); // value section: fix-object(0), FINISHED
    assert_eq!(&bytes[34..36], &[0x90, 0xC4]); // string section: fix-array(0), FINISHED

    let mut dec = jampack::Decoder::new(DecodeOptions::new());
    assert_eq!(dec.decode(&bytes).unwrap(), Value::Object(vec![]));
}

#[test]
fn s2_tiny_string() {
    let (bytes, _) = encode(
        EncodeOptions::new(),
        &Value::Object(vec![("a".into(), Value::String("b".into()))]),
    );
    assert_eq!(&bytes[32..36], &[0x81, 0xB0, 0xB1, 0xC4]);
    assert_eq!(&bytes[36..], &[0x92, 0xB1, b'a', 0xB1, b'b', 0xC4]);

    let mut dec = jampack::Decoder::new(DecodeOptions::new());
    assert_eq!(
        dec.decode(&bytes).unwrap(),
        Value::Object(vec![("a".into(), Value::String("b".into()))])
    );
}

#[test]
fn s3_negative_int() {
    let (bytes, _) = encode(EncodeOptions::new(), &Value::Int(-5));
    assert_eq!(&bytes[32..], &[0xFB, 0xC4]);
}

#[test]
fn s4_mixed_array() {
    let value = Value::Array(vec![
        Value::Int(1),
        Value::Float64(1.5),
        Value::Bool(true),
        Value::Null,
        Value::UInt(256),
    ]);
    let (bytes, _) = encode(EncodeOptions::new(), &value);
    let expected = [0x95, 0x01, 0xCA, 0x00, 0x00, 0xC0, 0x3F, 0xC3, 0xC0, 0xCD, 0x00, 0x01, 0xC4];
    assert_eq!(&bytes[32..32 + expected.len()], &expected);
}

#[test]
fn s5_crc_and_compress() {
    let value = Value::Object(vec![(
        "x".into(),
        Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
    )]);
    let opts = EncodeOptions::new().crc32(true).compress(true);
    let (bytes, enc) = encode(opts, &value);

    assert!(enc.crc32.is_some());
    let flags = bytes[5];
    assert_ne!(flags & 0b0000_0010, 0); // COMPRESSED
    assert_ne!(flags & 0b0000_0100, 0); // CRC32

    let mut dec = jampack::Decoder::new(DecodeOptions::new());
    let decoded = dec.decode(&bytes).unwrap();
    assert_eq!(
        decoded,
        Value::Object(vec![(
            "x".into(),
            Value::Array(vec![Value::UInt(1), Value::UInt(2), Value::UInt(3)])
        )])
    );
    assert!(!dec.errored);
}

#[test]
fn s6_strip_keys() {
    let value = Value::Object(vec![("alpha".into(), Value::Int(1)), ("beta".into(), Value::Int(2))]);
    let opts = EncodeOptions::new().strip_keys(true);
    let (bytes, enc) = encode(opts, &value);

    assert_eq!(enc.keys_array, Some(vec!["alpha".to_string(), "beta".to_string()]));
    assert!(!contains(&bytes, b"alpha"));
    assert!(!contains(&bytes, b"beta"));

    let mut dec = jampack::Decoder::new(DecodeOptions::new());
    assert!(matches!(dec.decode(&bytes), Err(Error::MissingKeyDictionary)));

    let mut dec = jampack::Decoder::new(DecodeOptions::new().keys_array(vec!["alpha".into(), "beta".into()]));
    let decoded = dec.decode(&bytes).unwrap();
    assert_eq!(
        decoded,
        Value::Object(vec![("alpha".into(), Value::UInt(1)), ("beta".into(), Value::UInt(2))])
    );
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[test]
fn s7_streaming_parity() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("s7.jampack");

    let value = Value::Object(vec![(
        "x".into(),
        Value::Array((0..50).map(Value::Int).collect()),
    )]);
    // Force the streaming branch of `encode_to_path` by dropping the ceiling to zero, while
    // comparing against the ordinary in-memory `encode()` (also told to mark LargeFile) so both
    // code paths run with identical inputs.
    let opts = EncodeOptions::new()
        .crc32(true)
        .compress(true)
        .encrypt(true, Some(0x0102_0304))
        .large_file_ceiling(0);

    let in_memory = {
        let mut enc = jampack::Encoder::new(opts.clone());
        enc.encode(&value).unwrap()
    };

    let mut enc = jampack::Encoder::new(opts);
    enc.encode_to_path(&value, &path).unwrap();
    let on_disk = std::fs::read(&path).unwrap();

    assert_eq!(on_disk, in_memory);

    let mut dec = jampack::Decoder::new(DecodeOptions::new().encryption_key(0x0102_0304));
    assert_eq!(dec.decode_path(&path).unwrap(), dec.decode(&in_memory).unwrap());
}
