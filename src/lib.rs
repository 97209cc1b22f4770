//! JamPack: a self-describing binary serialization codec with string/key interning, optional
//! framed-DEFLATE compression, optional AES/ARIA/Camellia-256-CBC encryption, and an
//! extension-codec escape hatch for user-defined types.
#![allow(dead_code)]
#![recursion_limit = "256"]

#[cfg(test)]
extern crate hex;

mod cipher;
mod compress;
mod crc;
mod depth_tracking;
mod extension;
mod header;
mod json;
mod marker;
mod pool;
mod prng;
mod streaming;

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod options;
pub mod value;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::{Error, Result, Warning};
pub use header::Endian;
pub use options::{DecodeOptions, EncodeOptions};
pub use value::{BytesKind, Date, RegEx, Symbol, Value};

/// Encode `value` with default options (spec §6 convenience surface).
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    Encoder::new(EncodeOptions::new()).encode(value)
}

/// Decode a complete JamPack file with default options (spec §6 convenience surface).
pub fn decode(bytes: &[u8]) -> Result<Value> {
    Decoder::new(DecodeOptions::new()).decode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_level_encode_decode_round_trips() {
        let value = Value::Object(vec![("a".into(), Value::String("b".into()))]);
        let bytes = encode(&value).unwrap();
        assert_eq!(decode(&bytes).unwrap(), value);
    }
}
