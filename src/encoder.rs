//! Value-tree walker that emits the value section and interns strings (spec §4.3, component C8).
use std::path::Path;

use crate::depth_tracking::DepthTracker;
use crate::error::{Error, Result};
use crate::extension::ExtensionRegistry;
use crate::header;
use crate::marker::{self, ExtType, Tag};
use crate::options::EncodeOptions;
use crate::pool::StringPool;
use crate::streaming;
use crate::value::Value;

/// Walks a [`Value`] tree and produces a complete JamPack file.
///
/// An `Encoder` owns no in-progress state across calls: [`Encoder::encode`] resets its pools and
/// buffers on entry, so a shared `Encoder` can be reused call after call. [`Encoder::clone_for_call`]
/// supports the reentrancy model of spec §5 — a concurrent call clones the options and the
/// extension registry rather than sharing in-flight buffers.
pub struct Encoder {
    options: EncodeOptions,
    extensions: ExtensionRegistry,

    /// The 32-bit key actually used for encryption, if any (spec §6 `encryptionKey`).
    pub encryption_key: Option<u32>,
    /// The CRC32 actually stamped into the header, if CRC was enabled.
    pub crc32: Option<u32>,
    /// The captured key dictionary, populated when `strip_keys` was set (spec §6 `keysArray`).
    pub keys_array: Option<Vec<String>>,
    /// Whether any `Value::Ext` or registered-extension value was encoded.
    pub has_extensions: bool,
}

impl Encoder {
    pub fn new(options: EncodeOptions) -> Self {
        Self {
            options,
            extensions: ExtensionRegistry::new(),
            encryption_key: None,
            crc32: None,
            keys_array: None,
            has_extensions: false,
        }
    }

    /// Register a user extension type. Must happen before any in-flight `encode` call
    /// (spec §5 "the extension registry ... must not be mutated during an in-flight encode").
    pub fn register_extension<E, D>(&mut self, type_byte: u8, encode: E, decode: D) -> Result<()>
    where
        E: Fn(&Value) -> Option<Vec<u8>> + 'static,
        D: Fn(&[u8]) -> Option<Value> + 'static,
    {
        self.extensions.register(type_byte, encode, decode)
    }

    /// Produce an independent clone carrying the same options but no in-progress state, for
    /// reentrant concurrent calls (spec §5). The registry's closures aren't `Clone`, so a cloned
    /// encoder starts with an empty registry; callers relying on extensions under concurrent
    /// encode should register on each clone before use.
    pub fn clone_for_call(&self) -> Self {
        Self::new(self.options.clone())
    }

    pub fn encode(&mut self, root: &Value) -> Result<Vec<u8>> {
        let (value_buf, str_section) = self.build_sections(root)?;

        let out = header::run_encode_pipeline(
            self.options.endian,
            value_buf,
            str_section,
            self.options.crc32,
            self.options.compress,
            if self.options.encrypt { self.options.encryption_key } else { None },
            self.options.encrypt && self.options.strip_encrypt_key,
            self.options.strip_keys,
            self.options.large_file_ceiling,
        )?;

        self.record_header_diagnostics(&out.header);

        let mut bytes = out.header.write();
        bytes.extend_from_slice(&out.data);
        Ok(bytes)
    }

    /// Encode directly to a file at `path` (spec §6). When the projected output would cross
    /// `large_file_ceiling`, or the caller already passed a file whose walk output alone does,
    /// the value and string sections are staged through scratch files instead of held alongside
    /// the compressed/encrypted copies (spec §4.5 streaming mode, §9 design notes). The two code
    /// paths share the exact same pipeline functions, so small inputs produce byte-identical
    /// files whichever path is taken.
    pub fn encode_to_path(&mut self, root: &Value, path: &Path) -> Result<()> {
        let (value_buf, str_section) = self.build_sections(root)?;

        if (value_buf.len() + str_section.len()) as u64 <= self.options.large_file_ceiling {
            let out = header::run_encode_pipeline(
                self.options.endian,
                value_buf,
                str_section,
                self.options.crc32,
                self.options.compress,
                if self.options.encrypt { self.options.encryption_key } else { None },
                self.options.encrypt && self.options.strip_encrypt_key,
                self.options.strip_keys,
                self.options.large_file_ceiling,
            )?;
            self.record_header_diagnostics(&out.header);
            std::fs::write(path, {
                let mut bytes = out.header.write();
                bytes.extend_from_slice(&out.data);
                bytes
            })
            .map_err(Error::from)
        } else {
            let header = streaming::run_encode_pipeline_streaming(
                path,
                self.options.endian,
                value_buf,
                str_section,
                self.options.crc32,
                self.options.compress,
                if self.options.encrypt { self.options.encryption_key } else { None },
                self.options.encrypt && self.options.strip_encrypt_key,
                self.options.strip_keys,
                self.options.large_file_ceiling,
            )?;
            self.record_header_diagnostics(&header);
            Ok(())
        }
    }

    /// Encode on an independent clone of this encoder (spec §5 reentrancy model), for calling
    /// concurrently with other in-flight encodes without sharing buffers.
    pub fn encode_concurrent(&self, root: &Value) -> Result<Vec<u8>> {
        self.clone_for_call().encode(root)
    }

    fn record_header_diagnostics(&mut self, header: &crate::header::Header) {
        self.encryption_key = header.encryption_key.or(if self.options.encrypt && self.options.strip_encrypt_key {
            // key was used but intentionally not stored; callers can still inspect it if they
            // passed one explicitly, otherwise it's unrecoverable by design (spec §9).
            self.options.encryption_key
        } else {
            None
        });
        self.crc32 = header.crc32;
    }

    fn build_sections(&mut self, root: &Value) -> Result<(Vec<u8>, Vec<u8>)> {
        self.encryption_key = None;
        self.crc32 = None;
        self.keys_array = None;
        self.has_extensions = false;

        let mut pool = StringPool::new();
        let mut key_pool = StringPool::new();
        let mut value_buf = Vec::new();
        let mut depth = DepthTracker::new(self.options.max_depth);

        self.walk(root, &mut value_buf, &mut pool, &mut key_pool, &mut depth)?;
        value_buf.push(Tag::Finished.into());

        let str_section = serialize_pool(&pool, self.options.endian);

        if self.options.strip_keys {
            self.keys_array = Some(key_pool.into_values());
        }

        Ok((value_buf, str_section))
    }

    fn walk(
        &mut self,
        root: &Value,
        buf: &mut Vec<u8>,
        pool: &mut StringPool,
        key_pool: &mut StringPool,
        depth: &mut DepthTracker,
    ) -> Result<()> {
        enum Item<'a> {
            Val(&'a Value),
            ObjKey(&'a str),
            Exit,
        }

        let endian = self.options.endian;
        let mut stack: Vec<Item> = vec![Item::Val(root)];

        while let Some(item) = stack.pop() {
            match item {
                Item::Exit => depth.exit(),
                Item::ObjKey(key) => {
                    if self.options.strip_keys {
                        let idx = key_pool.intern(key);
                        Tag::write_key_ref(buf, idx, endian);
                    } else {
                        let idx = pool.intern(key);
                        Tag::write_str_ref(buf, idx, endian);
                    }
                }
                Item::Val(value) => {
                    if let Some((type_byte, payload)) = self.extensions.try_encode(value) {
                        self.has_extensions = true;
                        Tag::write_ext_len(buf, u32::try_from(payload.len()).map_err(|_| {
                            Error::SizeTooLarge { max: u32::MAX as usize, actual: payload.len() }
                        })?, endian);
                        buf.push(type_byte);
                        buf.extend_from_slice(&payload);
                        continue;
                    }
                    match value {
                    Value::Null => buf.push(Tag::Null.into()),
                    Value::Undefined => buf.push(Tag::Undefined.into()),
                    Value::Bool(false) => buf.push(Tag::False.into()),
                    Value::Bool(true) => buf.push(Tag::True.into()),
                    Value::Int(v) => marker::write_integer(buf, *v as i128, endian)
                        .map_err(|_| Error::SizeTooLarge { max: i64::MAX as usize, actual: 0 })?,
                    Value::UInt(v) => marker::write_integer(buf, *v as i128, endian)
                        .map_err(|_| Error::SizeTooLarge { max: u64::MAX as usize, actual: 0 })?,
                    Value::BigInt(v) => marker::write_bigint(buf, *v, endian)
                        .map_err(|_| Error::SizeTooLarge { max: u64::MAX as usize, actual: 0 })?,
                    Value::Float32(v) => {
                        buf.push(Tag::F32.into());
                        extend_endian(buf, &v.to_le_bytes(), &v.to_be_bytes(), endian);
                    }
                    Value::Float64(v) => encode_float64(buf, *v, endian),
                    Value::String(s) => {
                        let idx = pool.intern(s);
                        Tag::write_str_ref(buf, idx, endian);
                    }
                    Value::Array(items) => {
                        depth.enter()?;
                        Tag::write_array_count(buf, u32::try_from(items.len()).map_err(|_| {
                            Error::SizeTooLarge { max: u32::MAX as usize, actual: items.len() }
                        })?, endian);
                        stack.push(Item::Exit);
                        for item in items.iter().rev() {
                            stack.push(Item::Val(item));
                        }
                    }
                    Value::Object(pairs) => {
                        depth.enter()?;
                        Tag::write_object_count(buf, u32::try_from(pairs.len()).map_err(|_| {
                            Error::SizeTooLarge { max: u32::MAX as usize, actual: pairs.len() }
                        })?, endian);
                        stack.push(Item::Exit);
                        for (key, val) in pairs.iter().rev() {
                            stack.push(Item::Val(val));
                            stack.push(Item::ObjKey(key));
                        }
                    }
                    Value::Set(items) => {
                        depth.enter()?;
                        marker::Tag::write_ext_len(buf, u32::try_from(items.len()).map_err(|_| {
                            Error::SizeTooLarge { max: u32::MAX as usize, actual: items.len() }
                        })?, endian);
                        buf.push(ExtType::Set.into());
                        stack.push(Item::Exit);
                        for item in items.iter().rev() {
                            stack.push(Item::Val(item));
                        }
                    }
                    Value::Map(pairs) => {
                        depth.enter()?;
                        marker::Tag::write_ext_len(buf, u32::try_from(pairs.len()).map_err(|_| {
                            Error::SizeTooLarge { max: u32::MAX as usize, actual: pairs.len() }
                        })?, endian);
                        buf.push(ExtType::Map.into());
                        stack.push(Item::Exit);
                        for (key, val) in pairs.iter().rev() {
                            stack.push(Item::Val(val));
                            stack.push(Item::Val(key));
                        }
                    }
                    Value::Bytes(kind, bytes) => {
                        let type_byte = marker::bytes_kind_to_ext_byte(*kind)
                            .unwrap_or(ExtType::Uint8ClampedArray.into());
                        Tag::write_ext_len(buf, u32::try_from(bytes.len()).map_err(|_| {
                            Error::SizeTooLarge { max: u32::MAX as usize, actual: bytes.len() }
                        })?, endian);
                        buf.push(type_byte);
                        buf.extend_from_slice(bytes);
                    }
                    Value::Date(date) => {
                        Tag::write_ext_len(buf, 8, endian);
                        buf.push(ExtType::Date.into());
                        let nanos = date.unix_nanos();
                        extend_endian(buf, &nanos.to_le_bytes(), &nanos.to_be_bytes(), endian);
                    }
                    Value::RegEx(re) => {
                        self.has_extensions = true;
                        let payload = encode_regex_payload(re, endian);
                        Tag::write_ext_len(buf, u32::try_from(payload.len()).unwrap(), endian);
                        buf.push(ExtType::RegEx.into());
                        buf.extend_from_slice(&payload);
                    }
                    Value::Symbol(sym) => {
                        self.has_extensions = true;
                        let payload = encode_symbol_payload(sym);
                        Tag::write_ext_len(buf, u32::try_from(payload.len()).unwrap(), endian);
                        buf.push(ExtType::Symbol.into());
                        buf.extend_from_slice(&payload);
                    }
                    Value::Ext(type_byte, payload) => {
                        self.has_extensions = true;
                        Tag::write_ext_len(buf, u32::try_from(payload.len()).map_err(|_| {
                            Error::SizeTooLarge { max: u32::MAX as usize, actual: payload.len() }
                        })?, endian);
                        buf.push(*type_byte);
                        buf.extend_from_slice(payload);
                    }
                    }
                }
            }
        }

        Ok(())
    }
}

fn extend_endian(buf: &mut Vec<u8>, le: &[u8], be: &[u8], endian: crate::header::Endian) {
    match endian {
        crate::header::Endian::Little => buf.extend_from_slice(le),
        crate::header::Endian::Big => buf.extend_from_slice(be),
    }
}

fn encode_float64(buf: &mut Vec<u8>, v: f64, endian: crate::header::Endian) {
    let narrowed = v as f32;
    if narrowed as f64 == v {
        buf.push(Tag::F32.into());
        extend_endian(buf, &narrowed.to_le_bytes(), &narrowed.to_be_bytes(), endian);
    } else {
        buf.push(Tag::F64.into());
        extend_endian(buf, &v.to_le_bytes(), &v.to_be_bytes(), endian);
    }
}

fn encode_regex_payload(re: &crate::value::RegEx, endian: crate::header::Endian) -> Vec<u8> {
    let mut out = Vec::new();
    let src_len = re.src.len() as u32;
    let flags_len = re.flags.len() as u32;
    extend_endian(&mut out, &src_len.to_le_bytes(), &src_len.to_be_bytes(), endian);
    out.extend_from_slice(re.src.as_bytes());
    extend_endian(&mut out, &flags_len.to_le_bytes(), &flags_len.to_be_bytes(), endian);
    out.extend_from_slice(re.flags.as_bytes());
    out
}

fn encode_symbol_payload(sym: &crate::value::Symbol) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(sym.global as u8);
    out.extend_from_slice(sym.key.as_bytes());
    out
}

/// Serialize a string pool as `[ARRAY_* count]([STR_* byteLen][utf8 bytes])* [FINISHED]`
/// (spec §4.2).
fn serialize_pool(pool: &StringPool, endian: crate::header::Endian) -> Vec<u8> {
    let mut out = Vec::new();
    Tag::write_array_count(&mut out, pool.len() as u32, endian);
    for s in pool.values() {
        Tag::write_str_ref(&mut out, s.len() as u32, endian);
        out.extend_from_slice(s.as_bytes());
    }
    out.push(Tag::Finished.into());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::EncodeOptions;

    fn encode(value: &Value) -> Vec<u8> {
        let mut enc = Encoder::new(EncodeOptions::new());
        enc.encode(value).unwrap()
    }

    #[test]
    fn empty_object_matches_s1() {
        let bytes = encode(&Value::Object(vec![]));
        // header(32) + value section `80 C4` + string section `90 C4`.
        assert_eq!(bytes.len(), 32 + 2 + 2);
        assert_eq!(&bytes[32..], &[0x80, 0xc4, 0x90, 0xc4]);
    }

    #[test]
    fn tiny_string_object_matches_s2() {
        let bytes = encode(&Value::Object(vec![("a".into(), Value::String("b".into()))]));
        assert_eq!(&bytes[32..36], &[0x81, 0xb0, 0xb1, 0xc4]);
        assert_eq!(&bytes[36..], &[0x92, 0xb1, b'a', 0xb1, b'b', 0xc4]);
    }

    #[test]
    fn negative_int_matches_s3() {
        let bytes = encode(&Value::Int(-5));
        assert_eq!(&bytes[32..], &[0xfb, 0xc4]);
    }

    #[test]
    fn small_bigint_uses_wide_64_bit_tag_not_fixint() {
        // spec §4.1: "Bigints always use the 64-bit UINT_64 or INT_64 tag", unlike Int/UInt's
        // narrowest-fit rule, so a small BigInt(5) must stay distinguishable on the wire from a
        // plain small Int/UInt.
        let bytes = encode(&Value::BigInt(5));
        assert_eq!(&bytes[32..], &[Tag::UInt64.into_u8(), 5, 0, 0, 0, 0, 0, 0, 0, 0xc4]);
    }

    #[test]
    fn negative_bigint_uses_wide_64_bit_tag() {
        let bytes = encode(&Value::BigInt(-5));
        assert_eq!(bytes[32], Tag::Int64.into_u8());
    }

    #[test]
    fn mixed_array_matches_s4() {
        let bytes = encode(&Value::Array(vec![
            Value::Int(1),
            Value::Float64(1.5),
            Value::Bool(true),
            Value::Null,
            Value::UInt(256),
        ]));
        let expected = [0x95, 0x01, 0xca, 0x00, 0x00, 0xc0, 0x3f, 0xc3, 0xc0, 0xcd, 0x00, 0x01, 0xc4];
        assert_eq!(&bytes[32..32 + expected.len()], &expected);
    }

    #[test]
    fn object_key_uses_str_family_when_not_stripped() {
        let bytes = encode(&Value::Object(vec![("k".into(), Value::Null)]));
        // key "k" should appear as a STR tag (0xb1), not a KEY tag (0xa1).
        assert_eq!(bytes[32], 0x81);
        assert_eq!(bytes[33], 0xb1);
    }

    #[test]
    fn strip_keys_uses_key_family_and_empties_dictionary() {
        let opts = EncodeOptions::new().strip_keys(true);
        let mut enc = Encoder::new(opts);
        let bytes = enc
            .encode(&Value::Object(vec![
                ("alpha".into(), Value::Int(1)),
                ("beta".into(), Value::Int(2)),
            ]))
            .unwrap();
        assert_eq!(enc.keys_array, Some(vec!["alpha".to_string(), "beta".to_string()]));
        let value_section = &bytes[32..];
        assert!(!contains_bytes(value_section, b"alpha"));
        assert!(!contains_bytes(value_section, b"beta"));
        assert_eq!(value_section[1], 0xa0); // fix-key index 0
    }

    fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn deep_nesting_does_not_overflow_the_host_stack() {
        let mut value = Value::Array(vec![]);
        for _ in 0..10_000 {
            value = Value::Array(vec![value]);
        }
        let opts = EncodeOptions::new().max_depth(20_000);
        let mut enc = Encoder::new(opts);
        assert!(enc.encode(&value).is_ok());
    }

    #[test]
    fn encode_to_path_matches_in_memory_encode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.jampack");

        let value = Value::Object(vec![("a".into(), Value::String("b".into()))]);
        let in_memory = encode(&value);

        let mut enc = Encoder::new(EncodeOptions::new());
        enc.encode_to_path(&value, &path).unwrap();
        let on_disk = std::fs::read(&path).unwrap();

        assert_eq!(on_disk, in_memory);
    }

    #[test]
    fn encode_concurrent_produces_an_independent_result() {
        let enc = Encoder::new(EncodeOptions::new());
        let a = enc.encode_concurrent(&Value::Int(1)).unwrap();
        let b = enc.encode_concurrent(&Value::Int(2)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn depth_exceeded_is_reported() {
        let mut value = Value::Array(vec![]);
        for _ in 0..100 {
            value = Value::Array(vec![value]);
        }
        let opts = EncodeOptions::new().max_depth(10);
        let mut enc = Encoder::new(opts);
        assert!(matches!(enc.encode(&value), Err(Error::DepthExceeded)));
    }
}
