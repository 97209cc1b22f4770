//! JamPack tag vocabulary (spec §4.1). For internal use only.

/// A single value-section tag byte, decoded into its semantic meaning.
///
/// `from_u8`/`into_u8` are total, inverse functions over the whole byte range: every `u8` maps to
/// exactly one `Tag`, and every `Tag` produced by `from_u8` round-trips back through `into_u8`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tag {
    /// 0x00-0x7F: positive fixint, value is the byte itself.
    PosFixInt(u8),
    /// 0x80-0x8F: fix-object, inline count 0..15.
    FixObject(u8),
    /// 0x90-0x9F: fix-array, inline count 0..15.
    FixArray(u8),
    /// 0xA0-0xAF: fix-key, inline dictionary index 0..15 (schema mode).
    FixKey(u8),
    /// 0xB0-0xBF: fix-str, inline index (value section) or byte length (string section) 0..15.
    FixStr(u8),
    /// 0xC0: null.
    Null,
    /// 0xC1: undefined.
    Undefined,
    /// 0xC2: false.
    False,
    /// 0xC3: true.
    True,
    /// 0xC4: FINISHED, terminates the root value or the pool.
    Finished,
    /// 0xC5: LIST_END, explicit container close.
    ListEnd,
    /// 0xC6: reserved. Never written; treated as FINISHED on read.
    Reserved,
    /// 0xC7-0xC9: object opener with u8/u16/u32 count.
    Object8,
    Object16,
    Object32,
    /// 0xCA: float32.
    F32,
    /// 0xCB: float64.
    F64,
    /// 0xCC-0xCF: unsigned integer, 8/16/32/64 bits.
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    /// 0xD0-0xD3: signed integer, 8/16/32/64 bits.
    Int8,
    Int16,
    Int32,
    Int64,
    /// 0xD4-0xD6: key index as u8/u16/u32.
    Key8,
    Key16,
    Key32,
    /// 0xD7-0xD9: str index (value section) or byte length (string section) as u8/u16/u32.
    Str8,
    Str16,
    Str32,
    /// 0xDA-0xDC: array opener with u8/u16/u32 count.
    Array8,
    Array16,
    Array32,
    /// 0xDD-0xDF: extension opener with u8/u16/u32 payload length.
    Ext8,
    Ext16,
    Ext32,
    /// 0xE0-0xFF: negative fixint, value is byte - 0x100 (range -32..-1).
    NegFixInt(i8),
}

impl Tag {
    /// Construct a tag from a single byte. Total over the whole `u8` range.
    pub fn from_u8(n: u8) -> Tag {
        match n {
            0x00..=0x7f => Tag::PosFixInt(n),
            0x80..=0x8f => Tag::FixObject(n & 0x0F),
            0x90..=0x9f => Tag::FixArray(n & 0x0F),
            0xa0..=0xaf => Tag::FixKey(n & 0x0F),
            0xb0..=0xbf => Tag::FixStr(n & 0x0F),
            0xc0 => Tag::Null,
            0xc1 => Tag::Undefined,
            0xc2 => Tag::False,
            0xc3 => Tag::True,
            0xc4 => Tag::Finished,
            0xc5 => Tag::ListEnd,
            0xc6 => Tag::Reserved,
            0xc7 => Tag::Object8,
            0xc8 => Tag::Object16,
            0xc9 => Tag::Object32,
            0xca => Tag::F32,
            0xcb => Tag::F64,
            0xcc => Tag::UInt8,
            0xcd => Tag::UInt16,
            0xce => Tag::UInt32,
            0xcf => Tag::UInt64,
            0xd0 => Tag::Int8,
            0xd1 => Tag::Int16,
            0xd2 => Tag::Int32,
            0xd3 => Tag::Int64,
            0xd4 => Tag::Key8,
            0xd5 => Tag::Key16,
            0xd6 => Tag::Key32,
            0xd7 => Tag::Str8,
            0xd8 => Tag::Str16,
            0xd9 => Tag::Str32,
            0xda => Tag::Array8,
            0xdb => Tag::Array16,
            0xdc => Tag::Array32,
            0xdd => Tag::Ext8,
            0xde => Tag::Ext16,
            0xdf => Tag::Ext32,
            0xe0..=0xff => Tag::NegFixInt(n as i8),
        }
    }

    /// Convert a tag back into its single-byte representation. Assumes any inline count/index is
    /// already masked appropriately (0..15 for fix variants).
    pub fn into_u8(self) -> u8 {
        match self {
            Tag::PosFixInt(val) => val,
            Tag::FixObject(len) => 0x80 | len,
            Tag::FixArray(len) => 0x90 | len,
            Tag::FixKey(idx) => 0xa0 | idx,
            Tag::FixStr(len) => 0xb0 | len,
            Tag::Null => 0xc0,
            Tag::Undefined => 0xc1,
            Tag::False => 0xc2,
            Tag::True => 0xc3,
            Tag::Finished => 0xc4,
            Tag::ListEnd => 0xc5,
            Tag::Reserved => 0xc6,
            Tag::Object8 => 0xc7,
            Tag::Object16 => 0xc8,
            Tag::Object32 => 0xc9,
            Tag::F32 => 0xca,
            Tag::F64 => 0xcb,
            Tag::UInt8 => 0xcc,
            Tag::UInt16 => 0xcd,
            Tag::UInt32 => 0xce,
            Tag::UInt64 => 0xcf,
            Tag::Int8 => 0xd0,
            Tag::Int16 => 0xd1,
            Tag::Int32 => 0xd2,
            Tag::Int64 => 0xd3,
            Tag::Key8 => 0xd4,
            Tag::Key16 => 0xd5,
            Tag::Key32 => 0xd6,
            Tag::Str8 => 0xd7,
            Tag::Str16 => 0xd8,
            Tag::Str32 => 0xd9,
            Tag::Array8 => 0xda,
            Tag::Array16 => 0xdb,
            Tag::Array32 => 0xdc,
            Tag::Ext8 => 0xdd,
            Tag::Ext16 => 0xde,
            Tag::Ext32 => 0xdf,
            Tag::NegFixInt(val) => val as u8,
        }
    }

    /// Write the smallest ext-length tag (8/16/32 bit) that fits `len`, per the size-class rule
    /// of spec §4.1. `len` must fit in a u32; larger payloads are a caller-side `SizeTooLarge`.
    pub fn write_ext_len(buf: &mut Vec<u8>, len: u32, endian: Endian) {
        if len <= u8::MAX as u32 {
            buf.push(Tag::Ext8.into());
            buf.push(len as u8);
        } else if len <= u16::MAX as u32 {
            buf.push(Tag::Ext16.into());
            write_u16(buf, len as u16, endian);
        } else {
            buf.push(Tag::Ext32.into());
            write_u32(buf, len, endian);
        }
    }

    /// Write the smallest array-count tag (fix/8/16/32) that fits `n`.
    pub fn write_array_count(buf: &mut Vec<u8>, n: u32, endian: Endian) {
        write_fix_family(buf, n, 0x0f, Tag::FixArray, Tag::Array8, Tag::Array16, Tag::Array32, endian);
    }

    /// Write the smallest object-count tag (fix/8/16/32) that fits `n`.
    pub fn write_object_count(buf: &mut Vec<u8>, n: u32, endian: Endian) {
        write_fix_family(buf, n, 0x0f, Tag::FixObject, Tag::Object8, Tag::Object16, Tag::Object32, endian);
    }

    /// Write the smallest str-reference tag (fix/8/16/32). `n` is either a pool index (value
    /// section) or a UTF-8 byte length (string section) — the two uses are byte-identical on the
    /// wire and are disambiguated only by which section is being parsed (spec §9).
    pub fn write_str_ref(buf: &mut Vec<u8>, n: u32, endian: Endian) {
        write_fix_family(buf, n, 0x0f, Tag::FixStr, Tag::Str8, Tag::Str16, Tag::Str32, endian);
    }

    /// Write the smallest key-dictionary-index tag (fix/8/16/32), schema mode only.
    pub fn write_key_ref(buf: &mut Vec<u8>, n: u32, endian: Endian) {
        write_fix_family(buf, n, 0x0f, Tag::FixKey, Tag::Key8, Tag::Key16, Tag::Key32, endian);
    }
}

/// File endianness (spec §6): every multi-byte field after the tag byte itself follows this,
/// except framed-DEFLATE chunk lengths, which are always little-endian (spec §4.7/§9).
pub use crate::header::Endian;

fn write_fix_family(
    buf: &mut Vec<u8>,
    n: u32,
    fix_max: u32,
    fix: fn(u8) -> Tag,
    t8: Tag,
    t16: Tag,
    t32: Tag,
    endian: Endian,
) {
    if n <= fix_max {
        buf.push(fix(n as u8).into());
    } else if n <= u8::MAX as u32 {
        buf.push(t8.into());
        buf.push(n as u8);
    } else if n <= u16::MAX as u32 {
        buf.push(t16.into());
        write_u16(buf, n as u16, endian);
    } else {
        buf.push(t32.into());
        write_u32(buf, n, endian);
    }
}

pub(crate) fn write_u16(buf: &mut Vec<u8>, v: u16, endian: Endian) {
    match endian {
        Endian::Little => buf.extend_from_slice(&v.to_le_bytes()),
        Endian::Big => buf.extend_from_slice(&v.to_be_bytes()),
    }
}

pub(crate) fn write_u32(buf: &mut Vec<u8>, v: u32, endian: Endian) {
    match endian {
        Endian::Little => buf.extend_from_slice(&v.to_le_bytes()),
        Endian::Big => buf.extend_from_slice(&v.to_be_bytes()),
    }
}

pub(crate) fn write_u64(buf: &mut Vec<u8>, v: u64, endian: Endian) {
    match endian {
        Endian::Little => buf.extend_from_slice(&v.to_le_bytes()),
        Endian::Big => buf.extend_from_slice(&v.to_be_bytes()),
    }
}

pub(crate) fn read_u16(data: &[u8], at: usize, endian: Endian) -> Option<u16> {
    let bytes: [u8; 2] = data.get(at..at + 2)?.try_into().ok()?;
    Some(match endian {
        Endian::Little => u16::from_le_bytes(bytes),
        Endian::Big => u16::from_be_bytes(bytes),
    })
}

pub(crate) fn read_u32(data: &[u8], at: usize, endian: Endian) -> Option<u32> {
    let bytes: [u8; 4] = data.get(at..at + 4)?.try_into().ok()?;
    Some(match endian {
        Endian::Little => u32::from_le_bytes(bytes),
        Endian::Big => u32::from_be_bytes(bytes),
    })
}

pub(crate) fn read_u64(data: &[u8], at: usize, endian: Endian) -> Option<u64> {
    let bytes: [u8; 8] = data.get(at..at + 8)?.try_into().ok()?;
    Some(match endian {
        Endian::Little => u64::from_le_bytes(bytes),
        Endian::Big => u64::from_be_bytes(bytes),
    })
}

fn read_i16(data: &[u8], at: usize, endian: Endian) -> Option<i16> {
    read_u16(data, at, endian).map(|v| v as i16)
}

fn read_i32(data: &[u8], at: usize, endian: Endian) -> Option<i32> {
    read_u32(data, at, endian).map(|v| v as i32)
}

fn read_i64(data: &[u8], at: usize, endian: Endian) -> Option<i64> {
    read_u64(data, at, endian).map(|v| v as i64)
}

/// Write the smallest integer tag that fits `v`, per the size-class rule of spec §4.1: negative
/// values use the signed family (fixint/i8/i16/i32/i64), non-negative values use the unsigned
/// family (fixint/u8/u16/u32/u64) regardless of whether the source value was logically signed.
pub fn write_integer(buf: &mut Vec<u8>, v: i128, endian: Endian) -> Result<(), &'static str> {
    if v >= 0 {
        let v = v as u128;
        if v <= 0x7f {
            buf.push(Tag::PosFixInt(v as u8).into());
        } else if v <= u8::MAX as u128 {
            buf.push(Tag::UInt8.into());
            buf.push(v as u8);
        } else if v <= u16::MAX as u128 {
            buf.push(Tag::UInt16.into());
            write_u16(buf, v as u16, endian);
        } else if v <= u32::MAX as u128 {
            buf.push(Tag::UInt32.into());
            write_u32(buf, v as u32, endian);
        } else if v <= u64::MAX as u128 {
            buf.push(Tag::UInt64.into());
            write_u64(buf, v as u64, endian);
        } else {
            return Err("magnitude exceeds 64-bit unsigned range");
        }
    } else {
        if v < -(1i128 << 63) {
            return Err("magnitude exceeds 64-bit signed range");
        }
        if v >= -32 {
            buf.push(Tag::NegFixInt(v as i8).into());
        } else if v >= i8::MIN as i128 {
            buf.push(Tag::Int8.into());
            buf.push(v as i8 as u8);
        } else if v >= i16::MIN as i128 {
            buf.push(Tag::Int16.into());
            write_u16(buf, v as i16 as u16, endian);
        } else if v >= i32::MIN as i128 {
            buf.push(Tag::Int32.into());
            write_u32(buf, v as i32 as u32, endian);
        } else {
            buf.push(Tag::Int64.into());
            write_u64(buf, v as i64 as u64, endian);
        }
    }
    Ok(())
}

/// Write a bigint unconditionally as the 64-bit tag for its sign, bypassing the narrowest-fit
/// size-class rule `write_integer` applies to `Int`/`UInt` (spec §4.1: "Bigints always use the
/// 64-bit UINT_64 or INT_64 tag based on sign"). This keeps a small `BigInt` distinguishable on
/// the wire from a plain small `Int`/`UInt`, which round-trips back to the same numeric kind.
pub fn write_bigint(buf: &mut Vec<u8>, v: i128, endian: Endian) -> Result<(), &'static str> {
    if v >= 0 {
        let v = v as u128;
        if v > u64::MAX as u128 {
            return Err("magnitude exceeds 64-bit unsigned range");
        }
        buf.push(Tag::UInt64.into());
        write_u64(buf, v as u64, endian);
    } else {
        if v < -(1i128 << 63) {
            return Err("magnitude exceeds 64-bit signed range");
        }
        buf.push(Tag::Int64.into());
        write_u64(buf, v as i64 as u64, endian);
    }
    Ok(())
}

/// Read a variable-width unsigned count/index/length given the `Tag` that introduced it.
/// `tag` must be one of the three wide variants of a fix/8/16/32 family (the fix case is decoded
/// by the caller directly from the tag byte, since it carries no auxiliary bytes).
///
/// Returns the value and the number of auxiliary bytes consumed (0, 1, 2, or 4).
pub fn read_wide_count(data: &[u8], at: usize, tag: Tag, endian: Endian) -> Result<(u32, usize), Error> {
    let bad = || Error::BadHeader("truncated count/index/length field".into());
    match tag {
        Tag::Object8 | Tag::Array8 | Tag::Key8 | Tag::Str8 | Tag::Ext8 => {
            let b = *data.get(at).ok_or_else(bad)?;
            Ok((b as u32, 1))
        }
        Tag::Object16 | Tag::Array16 | Tag::Key16 | Tag::Str16 | Tag::Ext16 => {
            Ok((read_u16(data, at, endian).ok_or_else(bad)? as u32, 2))
        }
        Tag::Object32 | Tag::Array32 | Tag::Key32 | Tag::Str32 | Tag::Ext32 => {
            Ok((read_u32(data, at, endian).ok_or_else(bad)?, 4))
        }
        _ => Err(Error::BadHeader("not a wide count-bearing tag".into())),
    }
}

/// Read the integer value following a signed/unsigned integer tag. Returns the value and the
/// number of auxiliary bytes consumed.
pub fn read_integer_payload(data: &[u8], at: usize, tag: Tag, endian: Endian) -> Result<(i128, usize), Error> {
    let bad = || Error::BadHeader("truncated integer payload".into());
    match tag {
        Tag::PosFixInt(v) => Ok((v as i128, 0)),
        Tag::NegFixInt(v) => Ok((v as i128, 0)),
        Tag::UInt8 => Ok((*data.get(at).ok_or_else(bad)? as i128, 1)),
        Tag::UInt16 => Ok((read_u16(data, at, endian).ok_or_else(bad)? as i128, 2)),
        Tag::UInt32 => Ok((read_u32(data, at, endian).ok_or_else(bad)? as i128, 4)),
        Tag::UInt64 => Ok((read_u64(data, at, endian).ok_or_else(bad)? as i128, 8)),
        Tag::Int8 => Ok((*data.get(at).ok_or_else(bad)? as i8 as i128, 1)),
        Tag::Int16 => Ok((read_i16(data, at, endian).ok_or_else(bad)? as i128, 2)),
        Tag::Int32 => Ok((read_i32(data, at, endian).ok_or_else(bad)? as i128, 4)),
        Tag::Int64 => Ok((read_i64(data, at, endian).ok_or_else(bad)? as i128, 8)),
        _ => Err(Error::BadHeader("not an integer tag".into())),
    }
}

use crate::error::Error;

impl From<u8> for Tag {
    fn from(val: u8) -> Tag {
        Tag::from_u8(val)
    }
}

impl From<Tag> for u8 {
    fn from(val: Tag) -> u8 {
        val.into_u8()
    }
}

/// Reserved extension-type bytes (spec §4.1). The user-assignable range is 0x00-0xCF; these
/// occupy the reserved 0xD0-0xFF range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtType {
    Map,
    Set,
    Symbol,
    RegEx,
    /// One of the ten non-clamped typed-array kinds, packed into 0xF2-0xFC (0xFB reserved).
    Bytes(crate::value::BytesKind),
    Uint8ClampedArray,
    Buffer,
    Date,
}

impl ExtType {
    pub fn into_u8(self) -> u8 {
        match self {
            ExtType::Map => 0xee,
            ExtType::Set => 0xef,
            ExtType::Symbol => 0xf0,
            ExtType::RegEx => 0xf1,
            ExtType::Bytes(kind) => bytes_kind_to_ext_byte(kind)
                .expect("ExtType::Bytes must not wrap BytesKind::UInt8Clamped"),
            ExtType::Uint8ClampedArray => 0xfd,
            ExtType::Buffer => 0xfe,
            ExtType::Date => 0xff,
        }
    }

    pub fn from_u8(v: u8) -> Option<ExtType> {
        Some(match v {
            0xee => ExtType::Map,
            0xef => ExtType::Set,
            0xf0 => ExtType::Symbol,
            0xf1 => ExtType::RegEx,
            0xf2..=0xfa | 0xfc => ExtType::Bytes(ext_byte_to_bytes_kind(v)?),
            0xfb => return None, // reserved, unassigned
            0xfd => ExtType::Uint8ClampedArray,
            0xfe => ExtType::Buffer,
            0xff => ExtType::Date,
            _ => return None,
        })
    }

    /// Is this extension-type byte in the user-assignable range (spec §4.8)?
    pub fn is_user_range(v: u8) -> bool {
        v <= 0xcf
    }
}

impl From<ExtType> for u8 {
    fn from(val: ExtType) -> u8 {
        val.into_u8()
    }
}

/// Maps a non-clamped [`crate::value::BytesKind`] to its reserved extension-type byte.
/// Returns `None` for `UInt8Clamped`, which uses [`ExtType::Uint8ClampedArray`] (0xFD) instead.
pub fn bytes_kind_to_ext_byte(kind: crate::value::BytesKind) -> Option<u8> {
    use crate::value::BytesKind::*;
    Some(match kind {
        UInt64 => 0xf2,
        Int64 => 0xf3,
        Float64 => 0xf4,
        Float32 => 0xf5,
        UInt32 => 0xf6,
        Int32 => 0xf7,
        UInt16 => 0xf8,
        Int16 => 0xf9,
        Int8 => 0xfa,
        UInt8 => 0xfc,
        Buffer => 0xfe,
        UInt8Clamped => return None,
    })
}

/// Inverse of [`bytes_kind_to_ext_byte`].
pub fn ext_byte_to_bytes_kind(v: u8) -> Option<crate::value::BytesKind> {
    use crate::value::BytesKind::*;
    Some(match v {
        0xf2 => UInt64,
        0xf3 => Int64,
        0xf4 => Float64,
        0xf5 => Float32,
        0xf6 => UInt32,
        0xf7 => Int32,
        0xf8 => UInt16,
        0xf9 => Int16,
        0xfa => Int8,
        0xfc => UInt8,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_byte_round_trips_whole_range() {
        for b in 0..=255u8 {
            if b == 0xfb {
                continue; // covered separately; not a Tag byte ambiguity, just an ExtType gap
            }
            assert_eq!(Tag::from_u8(b).into_u8(), b, "byte 0x{:02X} did not round-trip", b);
        }
    }

    #[test]
    fn neg_fixint_matches_s3_scenario() {
        // spec §8 S3: encoding -5 produces tag byte 0xFB.
        let mut buf = Vec::new();
        write_integer(&mut buf, -5, Endian::Little).unwrap();
        assert_eq!(buf, vec![0xfb]);
    }

    #[test]
    fn positive_values_prefer_unsigned_family_even_from_a_signed_source() {
        let mut buf = Vec::new();
        write_integer(&mut buf, 256, Endian::Little).unwrap();
        assert_eq!(buf, vec![Tag::UInt16.into_u8(), 0x00, 0x01]);
    }

    #[test]
    fn small_values_use_fixint() {
        let mut buf = Vec::new();
        write_integer(&mut buf, 1, Endian::Little).unwrap();
        assert_eq!(buf, vec![0x01]);
    }

    #[test]
    fn magnitude_beyond_64_bits_is_rejected() {
        assert!(write_integer(&mut Vec::new(), (u64::MAX as i128) + 1, Endian::Little).is_err());
        assert!(write_integer(&mut Vec::new(), -(1i128 << 63) - 1, Endian::Little).is_err());
    }

    #[test]
    fn big_endian_flips_wide_byte_order() {
        let mut buf = Vec::new();
        write_integer(&mut buf, 256, Endian::Big).unwrap();
        assert_eq!(buf, vec![Tag::UInt16.into_u8(), 0x01, 0x00]);
    }

    #[test]
    fn array_count_fix_vs_wide() {
        let mut buf = Vec::new();
        Tag::write_array_count(&mut buf, 3, Endian::Little);
        assert_eq!(buf, vec![Tag::FixArray(3).into_u8()]);

        let mut buf = Vec::new();
        Tag::write_array_count(&mut buf, 300, Endian::Little);
        assert_eq!(buf[0], Tag::Array16.into_u8());
    }

    #[test]
    fn wide_count_round_trips_through_read_wide_count() {
        let mut buf = Vec::new();
        Tag::write_array_count(&mut buf, 70_000, Endian::Big);
        let tag = Tag::from_u8(buf[0]);
        let (n, consumed) = read_wide_count(&buf, 1, tag, Endian::Big).unwrap();
        assert_eq!(n, 70_000);
        assert_eq!(consumed, 4);
    }

    #[test]
    fn ext_type_reserved_byte_0xfb_is_unassigned() {
        assert_eq!(ExtType::from_u8(0xfb), None);
    }

    #[test]
    fn bytes_kind_ext_byte_roundtrips() {
        use crate::value::BytesKind::*;
        for kind in [
            Int8, UInt8, Int16, UInt16, Int32, UInt32, Float32, Float64, Int64, UInt64,
        ] {
            let byte = bytes_kind_to_ext_byte(kind).unwrap();
            assert_eq!(ext_byte_to_bytes_kind(byte), Some(kind));
        }
    }

    #[test]
    fn buffer_kind_maps_to_ext_type_buffer_byte() {
        // `Buffer` is carried by the dedicated `ExtType::Buffer` variant rather than
        // `ExtType::Bytes`, so it round-trips through `ExtType::from_u8`, not
        // `ext_byte_to_bytes_kind` (which only inverts the `Bytes(..)` range).
        let byte = bytes_kind_to_ext_byte(crate::value::BytesKind::Buffer).unwrap();
        assert_eq!(byte, ExtType::Buffer.into_u8());
        assert_eq!(ExtType::from_u8(byte), Some(ExtType::Buffer));
    }
}
