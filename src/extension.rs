//! User extension registry (spec §4.8, component C11).
use crate::error::{Error, Result};
use crate::marker::ExtType;
use crate::value::Value;

type EncodeFn = Box<dyn Fn(&Value) -> Option<Vec<u8>>>;
type DecodeFn = Box<dyn Fn(&[u8]) -> Option<Value>>;

struct Registration {
    type_byte: u8,
    encode: EncodeFn,
    decode: DecodeFn,
}

/// Maps the user-assignable extension-type range (0x00-0xCF) to caller-supplied encode/decode
/// functions. Registration order is also encode-dispatch order: the first registered encoder
/// whose function returns `Some` wins (spec §4.8), so register more specific types first.
#[derive(Default)]
pub struct ExtensionRegistry {
    entries: Vec<Registration>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an encode/decode pair for `type_byte`. Fails if `type_byte` falls in the
    /// reserved 0xD0-0xFF range (spec §4.8).
    pub fn register<E, D>(&mut self, type_byte: u8, encode: E, decode: D) -> Result<()>
    where
        E: Fn(&Value) -> Option<Vec<u8>> + 'static,
        D: Fn(&[u8]) -> Option<Value> + 'static,
    {
        if !ExtType::is_user_range(type_byte) {
            return Err(Error::UnsupportedType("extension type_byte outside 0x00-0xCF"));
        }
        self.entries.push(Registration {
            type_byte,
            encode: Box::new(encode),
            decode: Box::new(decode),
        });
        Ok(())
    }

    /// Offer `value` to each registered encoder in registration order. Returns the first
    /// `(type_byte, payload)` produced, or `None` if nothing claims it.
    pub fn try_encode(&self, value: &Value) -> Option<(u8, Vec<u8>)> {
        for reg in &self.entries {
            if let Some(payload) = (reg.encode)(value) {
                return Some((reg.type_byte, payload));
            }
        }
        None
    }

    /// Dispatch a decoded EXT payload to its registered decoder, if any.
    pub fn try_decode(&self, type_byte: u8, payload: &[u8]) -> Option<Value> {
        self.entries
            .iter()
            .find(|reg| reg.type_byte == type_byte)
            .and_then(|reg| (reg.decode)(payload))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("types", &self.entries.iter().map(|r| r.type_byte).collect::<Vec<_>>())
            .finish()
    }
}
