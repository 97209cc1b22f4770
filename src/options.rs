//! Encode/decode option builders (SPEC_FULL.md §2.3).
use crate::header::Endian;

/// Default maximum nesting depth for the encoder's and decoder's explicit work stacks.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Default single-buffer ceiling before streaming mode kicks in (spec §6 `LargeFile`, §9).
pub const DEFAULT_LARGE_FILE_CEILING: u64 = 2 * 1024 * 1024 * 1024;

/// Options controlling a single `Encoder::encode` call.
#[derive(Clone, Debug)]
pub struct EncodeOptions {
    pub(crate) endian: Endian,
    pub(crate) crc32: bool,
    pub(crate) compress: bool,
    pub(crate) encrypt: bool,
    pub(crate) encryption_key: Option<u32>,
    pub(crate) strip_encrypt_key: bool,
    pub(crate) strip_keys: bool,
    pub(crate) max_depth: usize,
    pub(crate) large_file_ceiling: u64,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            endian: Endian::Little,
            crc32: false,
            compress: false,
            encrypt: false,
            encryption_key: None,
            strip_encrypt_key: false,
            strip_keys: false,
            max_depth: DEFAULT_MAX_DEPTH,
            large_file_ceiling: DEFAULT_LARGE_FILE_CEILING,
        }
    }
}

impl EncodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn big_endian(mut self) -> Self {
        self.endian = Endian::Big;
        self
    }

    pub fn crc32(mut self, enabled: bool) -> Self {
        self.crc32 = enabled;
        self
    }

    pub fn compress(mut self, enabled: bool) -> Self {
        self.compress = enabled;
        self
    }

    /// Enable encryption. If `key` is `None` a random key seed is drawn at encode time.
    pub fn encrypt(mut self, enabled: bool, key: Option<u32>) -> Self {
        self.encrypt = enabled;
        self.encryption_key = key;
        self
    }

    /// When set, the 32-bit key is not embedded in the header (`EncryptionExcluded`); the caller
    /// must supply it again at decode time.
    pub fn strip_encrypt_key(mut self, enabled: bool) -> Self {
        self.strip_encrypt_key = enabled;
        self
    }

    /// Schema mode: object keys are emitted as dictionary indices and the dictionary is left out
    /// of the file. The caller reads it back from `Encoder::keys_array` after the call.
    pub fn strip_keys(mut self, enabled: bool) -> Self {
        self.strip_keys = enabled;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn large_file_ceiling(mut self, bytes: u64) -> Self {
        self.large_file_ceiling = bytes;
        self
    }
}

/// Options controlling a single `Decoder::decode` call.
#[derive(Clone, Debug, Default)]
pub struct DecodeOptions {
    pub(crate) encryption_key: Option<u32>,
    pub(crate) keys_array: Option<Vec<String>>,
    pub(crate) max_depth: usize,
    pub(crate) make_json: bool,
    pub(crate) enforce_bigint: bool,
}

impl DecodeOptions {
    pub fn new() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            ..Default::default()
        }
    }

    /// Supply the 32-bit key for a file encrypted with `strip_encrypt_key`.
    pub fn encryption_key(mut self, key: u32) -> Self {
        self.encryption_key = Some(key);
        self
    }

    /// Supply the out-of-band key dictionary for a `KeyStripped` file.
    pub fn keys_array(mut self, keys: Vec<String>) -> Self {
        self.keys_array = Some(keys);
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Run the `makeJSON` normalizer (spec §4.4) over the decoded tree.
    pub fn make_json(mut self, enabled: bool) -> Self {
        self.make_json = enabled;
        self
    }

    /// Widen every integer tag to `Value::BigInt` regardless of whether it fits an `i64`/`u64`.
    pub fn enforce_bigint(mut self, enabled: bool) -> Self {
        self.enforce_bigint = enabled;
        self
    }
}
