//! Stack-driven reader that rebuilds a [`Value`] tree from a JamPack file (spec §4.4, component C9).
use std::path::Path;

use crate::depth_tracking::DepthTracker;
use crate::error::{Error, Result, Warning};
use crate::extension::ExtensionRegistry;
use crate::header::{self, Endian, Header};
use crate::marker::{self, ExtType, Tag};
use crate::options::DecodeOptions;
use crate::pool::StringPool;
use crate::streaming;
use crate::value::{BytesKind, Date, RegEx, Symbol, Value};

/// Walks a decoded value tree and rebuilds it frame by frame.
///
/// Mirrors [`crate::encoder::Encoder`]: [`Decoder::decode`] resets its diagnostic state on entry,
/// so a shared `Decoder` can be reused call after call, and [`Decoder::clone_for_call`] supports
/// the reentrancy model of spec §5.
pub struct Decoder {
    options: DecodeOptions,
    extensions: ExtensionRegistry,

    /// Non-fatal conditions observed during the most recent call (spec §4.9/§7).
    pub warnings: Vec<Warning>,
    /// Whether any warning was recorded during the most recent call.
    pub errored: bool,
    /// A human-readable summary of `warnings`, if any were recorded.
    pub error_message: Option<String>,
    /// Whether any EXT tag (registered extension, RegEx, Symbol, or unclaimed) was decoded.
    pub has_extensions: bool,
    /// Whether the decoded value is directly representable as JSON without `make_json`.
    pub valid_json: bool,
}

impl Decoder {
    pub fn new(options: DecodeOptions) -> Self {
        Self {
            options,
            extensions: ExtensionRegistry::new(),
            warnings: Vec::new(),
            errored: false,
            error_message: None,
            has_extensions: false,
            valid_json: true,
        }
    }

    /// Register a user extension type. Must happen before any in-flight `decode` call.
    pub fn register_extension<E, D>(&mut self, type_byte: u8, encode: E, decode: D) -> Result<()>
    where
        E: Fn(&Value) -> Option<Vec<u8>> + 'static,
        D: Fn(&[u8]) -> Option<Value> + 'static,
    {
        self.extensions.register(type_byte, encode, decode)
    }

    /// Produce an independent clone carrying the same options but no in-progress state, for
    /// reentrant concurrent calls (spec §5). As with `Encoder::clone_for_call`, the registry's
    /// closures aren't `Clone`, so the clone starts with an empty registry.
    pub fn clone_for_call(&self) -> Self {
        Self::new(self.options.clone())
    }

    pub fn decode(&mut self, bytes: &[u8]) -> Result<Value> {
        let (hdr, parse_warnings) = Header::parse(bytes)?;

        if hdr.key_stripped && self.options.keys_array.is_none() {
            return Err(Error::MissingKeyDictionary);
        }

        let body = bytes
            .get(hdr.header_size as usize..)
            .ok_or_else(|| Error::BadHeader("input shorter than declared header size".into()))?;

        let (recovered, pipeline_warnings) =
            header::run_decode_pipeline(&hdr, body.to_vec(), self.options.encryption_key)?;

        self.finish_decode(&hdr, recovered, parse_warnings, pipeline_warnings)
    }

    /// Decode directly from a file at `path` (spec §6). Only the fixed header prefix is read up
    /// front; files whose `LARGE_FILE` flag is set are walked through the disk-backed pipeline
    /// (spec §4.5 streaming mode) instead of being read fully into memory first.
    pub fn decode_path(&mut self, path: &Path) -> Result<Value> {
        let prefix = {
            use std::io::Read;
            let mut f = std::fs::File::open(path)?;
            let mut buf = vec![0u8; 64.min(f.metadata().map(|m| m.len()).unwrap_or(64) as usize)];
            f.read_exact(&mut buf)?;
            buf
        };
        let (hdr, parse_warnings) = Header::parse(&prefix)?;

        if hdr.key_stripped && self.options.keys_array.is_none() {
            return Err(Error::MissingKeyDictionary);
        }

        if !hdr.large_file {
            let bytes = std::fs::read(path)?;
            return self.decode(&bytes);
        }

        let (recovered, pipeline_warnings) =
            streaming::run_decode_pipeline_streaming(path, &hdr, self.options.encryption_key)?;
        self.finish_decode(&hdr, recovered, parse_warnings, pipeline_warnings)
    }

    /// Decode on an independent clone of this decoder (spec §5 reentrancy model), for calling
    /// concurrently with other in-flight decodes without sharing diagnostic state.
    pub fn decode_concurrent(&self, bytes: &[u8]) -> Result<Value> {
        self.clone_for_call().decode(bytes)
    }

    fn finish_decode(
        &mut self,
        hdr: &Header,
        recovered: Vec<u8>,
        parse_warnings: Vec<Warning>,
        pipeline_warnings: Vec<Warning>,
    ) -> Result<Value> {
        self.warnings.clear();
        self.errored = false;
        self.error_message = None;
        self.has_extensions = false;
        self.valid_json = true;
        self.warnings.extend(parse_warnings);
        self.warnings.extend(pipeline_warnings);

        let value_size = hdr.value_size as usize;
        let str_size = hdr.str_size as usize;
        let section_end = value_size.checked_add(str_size).ok_or_else(|| {
            Error::BadHeader("VALUE_SIZE + STR_SIZE overflowed".into())
        })?;
        if recovered.len() < section_end {
            return Err(Error::BadHeader(
                "decoded data shorter than declared VALUE_SIZE + STR_SIZE".into(),
            ));
        }
        let value_section = &recovered[..value_size];
        let str_section = &recovered[value_size..section_end];

        let pool = parse_pool(str_section, hdr.endian)?;
        let key_pool = if hdr.key_stripped {
            StringPool::from_values(self.options.keys_array.clone().unwrap())
        } else {
            StringPool::new()
        };

        let mut value = self.walk(value_section, hdr.endian, &pool, &key_pool)?;

        if self.options.make_json {
            value = crate::json::make_json(value);
            self.valid_json = true;
        } else {
            self.valid_json = is_json_safe(&value);
        }

        if !self.warnings.is_empty() {
            self.errored = true;
            self.error_message = Some(
                self.warnings
                    .iter()
                    .map(Warning::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            );
            for w in &self.warnings {
                log::warn!("{}", w);
            }
        }

        Ok(value)
    }

    fn walk(
        &mut self,
        value_section: &[u8],
        endian: Endian,
        pool: &StringPool,
        key_pool: &StringPool,
    ) -> Result<Value> {
        let mut stack: Vec<Frame> = Vec::new();
        let mut root: Option<Value> = None;
        let mut depth = DepthTracker::new(self.options.max_depth);
        let mut pos = 0usize;

        loop {
            let byte = *value_section
                .get(pos)
                .ok_or_else(|| Error::BadHeader("value section ended before FINISHED".into()))?;
            pos += 1;
            let tag = Tag::from_u8(byte);

            match tag {
                Tag::Finished | Tag::Reserved => {
                    if stack.is_empty() {
                        break;
                    }
                    self.close_frame(&mut stack, &mut root, &mut depth)?;
                }
                Tag::ListEnd => {
                    self.close_frame(&mut stack, &mut root, &mut depth)?;
                }
                Tag::Null => self.deliver(Value::Null, &mut stack, &mut root, &mut depth)?,
                Tag::Undefined => self.deliver(Value::Undefined, &mut stack, &mut root, &mut depth)?,
                Tag::False => self.deliver(Value::Bool(false), &mut stack, &mut root, &mut depth)?,
                Tag::True => self.deliver(Value::Bool(true), &mut stack, &mut root, &mut depth)?,
                Tag::PosFixInt(v) => {
                    let value = self.integer_value(v as i128, false, false);
                    self.deliver(value, &mut stack, &mut root, &mut depth)?;
                }
                Tag::NegFixInt(v) => {
                    let value = self.integer_value(v as i128, true, false);
                    self.deliver(value, &mut stack, &mut root, &mut depth)?;
                }
                Tag::UInt8 | Tag::UInt16 | Tag::UInt32 | Tag::UInt64
                | Tag::Int8 | Tag::Int16 | Tag::Int32 | Tag::Int64 => {
                    let signed = matches!(tag, Tag::Int8 | Tag::Int16 | Tag::Int32 | Tag::Int64);
                    let wide64 = matches!(tag, Tag::UInt64 | Tag::Int64);
                    let (v, consumed) = marker::read_integer_payload(value_section, pos, tag, endian)?;
                    pos += consumed;
                    let value = self.integer_value(v, signed, wide64);
                    self.deliver(value, &mut stack, &mut root, &mut depth)?;
                }
                Tag::F32 => {
                    let bits = marker::read_u32(value_section, pos, endian)
                        .ok_or_else(|| Error::BadHeader("truncated float32".into()))?;
                    pos += 4;
                    self.deliver(Value::Float32(f32::from_bits(bits)), &mut stack, &mut root, &mut depth)?;
                }
                Tag::F64 => {
                    let bits = marker::read_u64(value_section, pos, endian)
                        .ok_or_else(|| Error::BadHeader("truncated float64".into()))?;
                    pos += 8;
                    self.deliver(Value::Float64(f64::from_bits(bits)), &mut stack, &mut root, &mut depth)?;
                }
                Tag::FixStr(n) => {
                    let value = self.resolve_str(n as u32, pool);
                    self.deliver(value, &mut stack, &mut root, &mut depth)?;
                }
                Tag::Str8 | Tag::Str16 | Tag::Str32 => {
                    let (idx, consumed) = marker::read_wide_count(value_section, pos, tag, endian)?;
                    pos += consumed;
                    let value = self.resolve_str(idx, pool);
                    self.deliver(value, &mut stack, &mut root, &mut depth)?;
                }
                Tag::FixKey(n) => {
                    let value = self.resolve_key(n as u32, key_pool);
                    self.deliver(value, &mut stack, &mut root, &mut depth)?;
                }
                Tag::Key8 | Tag::Key16 | Tag::Key32 => {
                    let (idx, consumed) = marker::read_wide_count(value_section, pos, tag, endian)?;
                    pos += consumed;
                    let value = self.resolve_key(idx, key_pool);
                    self.deliver(value, &mut stack, &mut root, &mut depth)?;
                }
                Tag::FixArray(n) => self.open_array(n as u32, &mut stack, &mut root, &mut depth)?,
                Tag::Array8 | Tag::Array16 | Tag::Array32 => {
                    let (n, consumed) = marker::read_wide_count(value_section, pos, tag, endian)?;
                    pos += consumed;
                    self.open_array(n, &mut stack, &mut root, &mut depth)?;
                }
                Tag::FixObject(n) => self.open_object(n as u32, &mut stack, &mut root, &mut depth)?,
                Tag::Object8 | Tag::Object16 | Tag::Object32 => {
                    let (n, consumed) = marker::read_wide_count(value_section, pos, tag, endian)?;
                    pos += consumed;
                    self.open_object(n, &mut stack, &mut root, &mut depth)?;
                }
                Tag::Ext8 | Tag::Ext16 | Tag::Ext32 => {
                    let (len, consumed) = marker::read_wide_count(value_section, pos, tag, endian)?;
                    pos += consumed;
                    let type_byte = *value_section
                        .get(pos)
                        .ok_or_else(|| Error::BadHeader("truncated extension type byte".into()))?;
                    pos += 1;
                    self.handle_ext(
                        type_byte,
                        len,
                        value_section,
                        &mut pos,
                        endian,
                        &mut stack,
                        &mut root,
                        &mut depth,
                    )?;
                }
            }
        }

        root.ok_or_else(|| Error::BadHeader("value section produced no value before FINISHED".into()))
    }

    fn deliver(
        &mut self,
        mut value: Value,
        stack: &mut Vec<Frame>,
        root: &mut Option<Value>,
        depth: &mut DepthTracker,
    ) -> Result<()> {
        loop {
            match stack.last_mut() {
                None => {
                    *root = Some(value);
                    return Ok(());
                }
                Some(frame) => match frame.accept(value)? {
                    Accept::Continue => return Ok(()),
                    Accept::Complete(container) => {
                        stack.pop();
                        depth.exit();
                        value = container;
                    }
                },
            }
        }
    }

    fn close_frame(
        &mut self,
        stack: &mut Vec<Frame>,
        root: &mut Option<Value>,
        depth: &mut DepthTracker,
    ) -> Result<()> {
        let frame = stack
            .pop()
            .ok_or_else(|| Error::BadHeader("LIST_END with no open container".into()))?;
        depth.exit();
        let container = frame.into_partial_value();
        self.deliver(container, stack, root, depth)
    }

    fn open_array(
        &mut self,
        n: u32,
        stack: &mut Vec<Frame>,
        root: &mut Option<Value>,
        depth: &mut DepthTracker,
    ) -> Result<()> {
        depth.enter()?;
        if n == 0 {
            depth.exit();
            return self.deliver(Value::Array(vec![]), stack, root, depth);
        }
        stack.push(Frame::Array { size: n, items: Vec::new() });
        Ok(())
    }

    fn open_object(
        &mut self,
        n: u32,
        stack: &mut Vec<Frame>,
        root: &mut Option<Value>,
        depth: &mut DepthTracker,
    ) -> Result<()> {
        depth.enter()?;
        if n == 0 {
            depth.exit();
            return self.deliver(Value::Object(vec![]), stack, root, depth);
        }
        stack.push(Frame::Object { size: n, pairs: Vec::new(), pending_key: None });
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn handle_ext(
        &mut self,
        type_byte: u8,
        len: u32,
        value_section: &[u8],
        pos: &mut usize,
        endian: Endian,
        stack: &mut Vec<Frame>,
        root: &mut Option<Value>,
        depth: &mut DepthTracker,
    ) -> Result<()> {
        if type_byte == ExtType::Map.into_u8() {
            depth.enter()?;
            if len == 0 {
                depth.exit();
                return self.deliver(Value::Map(vec![]), stack, root, depth);
            }
            stack.push(Frame::Map { size: len, pairs: Vec::new(), pending_key: None });
            return Ok(());
        }
        if type_byte == ExtType::Set.into_u8() {
            depth.enter()?;
            if len == 0 {
                depth.exit();
                return self.deliver(Value::Set(vec![]), stack, root, depth);
            }
            stack.push(Frame::Set { size: len, items: Vec::new() });
            return Ok(());
        }

        let len = len as usize;
        let payload = value_section
            .get(*pos..*pos + len)
            .ok_or_else(|| Error::BadHeader("truncated extension payload".into()))?;
        *pos += len;

        let value = match ExtType::from_u8(type_byte) {
            Some(ExtType::Symbol) => {
                self.has_extensions = true;
                decode_symbol_payload(payload)?
            }
            Some(ExtType::RegEx) => {
                self.has_extensions = true;
                decode_regex_payload(payload, endian)?
            }
            Some(ExtType::Date) => decode_date_payload(payload, endian)?,
            Some(ExtType::Bytes(kind)) => Value::Bytes(kind, payload.to_vec()),
            Some(ExtType::Uint8ClampedArray) => Value::Bytes(BytesKind::UInt8Clamped, payload.to_vec()),
            Some(ExtType::Buffer) => Value::Bytes(BytesKind::Buffer, payload.to_vec()),
            Some(ExtType::Map) | Some(ExtType::Set) => unreachable!("handled above"),
            None => {
                self.has_extensions = true;
                self.extensions
                    .try_decode(type_byte, payload)
                    .unwrap_or_else(|| Value::Ext(type_byte, payload.to_vec()))
            }
        };
        self.deliver(value, stack, root, depth)
    }

    /// `wide64` is true only for the `UInt64`/`Int64` tag family; `enforceBigInt` (spec §4.4) is
    /// scoped to "every 64-bit integer tag", not fixints or the 8/16/32-bit families, so those
    /// never promote to `BigInt` regardless of the option.
    fn integer_value(&self, v: i128, signed: bool, wide64: bool) -> Value {
        if wide64 && self.options.enforce_bigint {
            Value::BigInt(v)
        } else if signed {
            Value::Int(v as i64)
        } else {
            Value::UInt(v as u64)
        }
    }

    fn resolve_str(&mut self, idx: u32, pool: &StringPool) -> Value {
        match pool.get(idx) {
            Some(s) => Value::String(s.to_string()),
            None => {
                self.warnings.push(Warning::PoolIndexOutOfRange { index: idx, len: pool.len() });
                Value::String(String::new())
            }
        }
    }

    fn resolve_key(&mut self, idx: u32, key_pool: &StringPool) -> Value {
        match key_pool.get(idx) {
            Some(s) => Value::String(s.to_string()),
            None => {
                self.warnings.push(Warning::PoolIndexOutOfRange { index: idx, len: key_pool.len() });
                Value::String(String::new())
            }
        }
    }
}

enum Accept {
    Continue,
    Complete(Value),
}

/// A single open container on the decoder's explicit work stack (spec §4.4 frame table).
enum Frame {
    Array { size: u32, items: Vec<Value> },
    Set { size: u32, items: Vec<Value> },
    Object { size: u32, pairs: Vec<(String, Value)>, pending_key: Option<String> },
    Map { size: u32, pairs: Vec<(Value, Value)>, pending_key: Option<Value> },
}

impl Frame {
    fn accept(&mut self, value: Value) -> Result<Accept> {
        match self {
            Frame::Array { size, items } => {
                items.push(value);
                if items.len() as u32 == *size {
                    Ok(Accept::Complete(Value::Array(std::mem::take(items))))
                } else {
                    Ok(Accept::Continue)
                }
            }
            Frame::Set { size, items } => {
                items.push(value);
                if items.len() as u32 == *size {
                    Ok(Accept::Complete(Value::Set(std::mem::take(items))))
                } else {
                    Ok(Accept::Continue)
                }
            }
            Frame::Object { size, pairs, pending_key } => match pending_key.take() {
                None => {
                    *pending_key = Some(as_object_key(value)?);
                    Ok(Accept::Continue)
                }
                Some(key) => {
                    pairs.push((key, value));
                    if pairs.len() as u32 == *size {
                        Ok(Accept::Complete(Value::Object(std::mem::take(pairs))))
                    } else {
                        Ok(Accept::Continue)
                    }
                }
            },
            Frame::Map { size, pairs, pending_key } => match pending_key.take() {
                None => {
                    *pending_key = Some(as_map_key(value)?);
                    Ok(Accept::Continue)
                }
                Some(key) => {
                    pairs.push((key, value));
                    if pairs.len() as u32 == *size {
                        Ok(Accept::Complete(Value::Map(std::mem::take(pairs))))
                    } else {
                        Ok(Accept::Continue)
                    }
                }
            },
        }
    }

    /// Build whatever this frame accumulated so far, for an early `LIST_END` close.
    fn into_partial_value(self) -> Value {
        match self {
            Frame::Array { items, .. } => Value::Array(items),
            Frame::Set { items, .. } => Value::Set(items),
            Frame::Object { pairs, .. } => Value::Object(pairs),
            Frame::Map { pairs, .. } => Value::Map(pairs),
        }
    }
}

/// Accepted object-key types are strings only (spec §4.3 `UnsupportedKey`); `"__proto__"` is
/// rejected outright as a hardening measure against prototype-pollution-style attacks.
fn as_object_key(value: Value) -> Result<String> {
    match value {
        Value::String(s) if s == "__proto__" => Err(Error::ForbiddenKey),
        Value::String(s) => Ok(s),
        _ => Err(Error::UnsupportedKey),
    }
}

/// Accepted map-key types are string, integer, and symbol (spec §4.4).
fn as_map_key(value: Value) -> Result<Value> {
    match &value {
        Value::String(s) if s == "__proto__" => return Err(Error::ForbiddenKey),
        Value::String(_) | Value::Int(_) | Value::UInt(_) | Value::BigInt(_) | Value::Symbol(_) => {}
        _ => return Err(Error::InvalidKey),
    }
    Ok(value)
}

/// Parse the string section: `[ARRAY_* count]([STR_* byteLen][utf8 bytes])* [FINISHED]` (spec §4.2).
fn parse_pool(str_section: &[u8], endian: Endian) -> Result<StringPool> {
    let mut pos = 0usize;
    let tag_byte = *str_section
        .get(pos)
        .ok_or_else(|| Error::BadHeader("empty string section".into()))?;
    pos += 1;
    let tag = Tag::from_u8(tag_byte);
    let count = match tag {
        Tag::FixArray(n) => n as u32,
        Tag::Array8 | Tag::Array16 | Tag::Array32 => {
            let (n, consumed) = marker::read_wide_count(str_section, pos, tag, endian)?;
            pos += consumed;
            n
        }
        _ => return Err(Error::BadHeader("string section did not start with an array count".into())),
    };

    let mut values = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let tag_byte = *str_section
            .get(pos)
            .ok_or_else(|| Error::BadHeader("truncated string section".into()))?;
        pos += 1;
        let tag = Tag::from_u8(tag_byte);
        let len = match tag {
            Tag::FixStr(n) => n as u32,
            Tag::Str8 | Tag::Str16 | Tag::Str32 => {
                let (n, consumed) = marker::read_wide_count(str_section, pos, tag, endian)?;
                pos += consumed;
                n
            }
            _ => return Err(Error::BadHeader("string section entry was not a STR tag".into())),
        } as usize;
        let bytes = str_section
            .get(pos..pos + len)
            .ok_or_else(|| Error::BadHeader("truncated string bytes".into()))?;
        values.push(std::str::from_utf8(bytes)?.to_string());
        pos += len;
    }

    Ok(StringPool::from_values(values))
}

fn decode_symbol_payload(payload: &[u8]) -> Result<Value> {
    let global = *payload
        .first()
        .ok_or_else(|| Error::BadHeader("empty symbol payload".into()))?
        != 0;
    let key = std::str::from_utf8(&payload[1..])?.to_string();
    Ok(Value::Symbol(Symbol { global, key }))
}

fn decode_regex_payload(payload: &[u8], endian: Endian) -> Result<Value> {
    let bad = || Error::BadHeader("truncated regex payload".into());
    let src_len = marker::read_u32(payload, 0, endian).ok_or_else(bad)? as usize;
    let src_start = 4;
    let src_end = src_start + src_len;
    let src = std::str::from_utf8(payload.get(src_start..src_end).ok_or_else(bad)?)?.to_string();

    let flags_len = marker::read_u32(payload, src_end, endian).ok_or_else(bad)? as usize;
    let flags_start = src_end + 4;
    let flags_end = flags_start + flags_len;
    let flags = std::str::from_utf8(payload.get(flags_start..flags_end).ok_or_else(bad)?)?.to_string();

    Ok(Value::RegEx(RegEx { src, flags }))
}

/// 8-byte payload is this codec's own format: `i64` nanoseconds since the Unix epoch. A 12-byte
/// payload (4-byte nanosecond remainder + 8-byte seconds) is accepted for interoperability; unlike
/// the reference decoder, which falls through to an "unrecognized size" error after computing this
/// value (spec §9 open question), this implementation returns the resulting `Date` directly.
fn decode_date_payload(payload: &[u8], endian: Endian) -> Result<Value> {
    let bad = || Error::BadHeader("unsupported Date payload length".into());
    match payload.len() {
        8 => {
            let nanos = marker::read_u64(payload, 0, endian).ok_or_else(bad)? as i64;
            Ok(Value::Date(Date::from_unix_nanos(nanos)))
        }
        12 => {
            let nanos_frac = marker::read_u32(payload, 0, endian).ok_or_else(bad)? as i64;
            let secs = marker::read_u64(payload, 4, endian).ok_or_else(bad)? as i64;
            let nanos = secs.saturating_mul(1_000_000_000).saturating_add(nanos_frac);
            Ok(Value::Date(Date::from_unix_nanos(nanos)))
        }
        _ => Err(bad()),
    }
}

/// Whether a decoded value is directly JSON-representable (no `Undefined`, `BigInt`, `Date`,
/// `RegEx`, `Symbol`, `Map`, `Set`, or `Bytes`/`Ext` anywhere in the tree).
fn is_json_safe(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(_) | Value::Int(_) | Value::UInt(_) | Value::Float32(_)
        | Value::Float64(_) | Value::String(_) => true,
        Value::Array(items) => items.iter().all(is_json_safe),
        Value::Object(pairs) => pairs.iter().all(|(_, v)| is_json_safe(v)),
        Value::Undefined
        | Value::BigInt(_)
        | Value::Bytes(..)
        | Value::Date(_)
        | Value::RegEx(_)
        | Value::Symbol(_)
        | Value::Map(_)
        | Value::Set(_)
        | Value::Ext(..) => false,
    }
}
