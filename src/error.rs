//! Library error types.
//!
use std::fmt;

/// A jampack Result, normally returning a jampack [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A jampack error. Encompasses any issues that can happen during encoding or decoding.
#[derive(Debug)]
pub enum Error {
    /// The magic number at the start of a file didn't match either endianness marker.
    BadMagic(u16),
    /// An unrecognized tag byte was encountered at the given byte position.
    BadTag { byte: u8, position: usize },
    /// The fixed header failed to parse (too short, bad header-size field, etc).
    BadHeader(String),
    /// The file is `EncryptionExcluded` but no decryption key was supplied.
    MissingKey,
    /// The file is `KeyStripped` but no key dictionary was supplied.
    MissingKeyDictionary,
    /// An object or map key was literally `"__proto__"`.
    ForbiddenKey,
    /// A map key was of a type that cannot be used as a key.
    InvalidKey,
    /// A non-string key was presented where an object requires a string key.
    UnsupportedKey,
    /// The work stack exceeded its configured depth bound.
    DepthExceeded,
    /// A declared count or length exceeded what the format or options allow.
    SizeTooLarge {
        /// The maximum allowed size
        max: usize,
        /// The value that exceeded it
        actual: usize,
    },
    /// A block-cipher operation failed (bad padding, short buffer, etc).
    CryptoFailure(String),
    /// The compression or decompression stage failed internally.
    CompressFailure(String),
    /// A value had no encoder and no registered extension could accept it.
    UnsupportedType(&'static str),
    /// Wraps a std::io error from the underlying reader/writer.
    Io(String),
    /// A string section entry was not valid UTF-8.
    Utf8(std::str::Utf8Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::BadMagic(found) => write!(f, "bad magic number: 0x{:04X}", found),
            Error::BadTag { byte, position } => {
                write!(f, "unrecognized tag byte 0x{:02X} at position {}", byte, position)
            }
            Error::BadHeader(err) => write!(f, "data has bad header format: {}", err),
            Error::MissingKey => {
                write!(f, "file is encrypted with an excluded key, but no key was supplied")
            }
            Error::MissingKeyDictionary => {
                write!(f, "file has stripped keys, but no key dictionary was supplied")
            }
            Error::ForbiddenKey => write!(f, "\"__proto__\" is not a permitted object or map key"),
            Error::InvalidKey => write!(f, "key is not one of the permitted key types"),
            Error::UnsupportedKey => write!(f, "object keys must be strings"),
            Error::DepthExceeded => write!(f, "value nesting exceeded the configured depth limit"),
            Error::SizeTooLarge { max, actual } => {
                write!(f, "size {} exceeds maximum of {}", actual, max)
            }
            Error::CryptoFailure(msg) => write!(f, "cipher failure: {}", msg),
            Error::CompressFailure(msg) => write!(f, "compression failure: {}", msg),
            Error::UnsupportedType(kind) => {
                write!(f, "no encoder or extension accepted a {} value", kind)
            }
            Error::Io(msg) => write!(f, "I/O error: {}", msg),
            Error::Utf8(e) => write!(f, "invalid UTF-8 in string section: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Utf8(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(e: std::str::Utf8Error) -> Self {
        Error::Utf8(e)
    }
}

/// A non-fatal condition recorded during encode/decode (spec §4.9/§7). These never abort a
/// call; they accumulate on the codec instance and are also emitted through `log::warn!`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// Header declared a version newer than this reader understands.
    VersionTooNew {
        /// Major version found in the header
        major: u8,
        /// Minor version found in the header
        minor: u8,
    },
    /// `VALUE_SIZE + STR_SIZE` didn't match the actual pre-transform data length.
    SizeMismatch {
        /// What the header declared
        declared: u64,
        /// What was actually found
        actual: u64,
    },
    /// The stored CRC32 didn't match the recomputed one.
    CrcMismatch {
        /// CRC32 recorded in the header
        stored: u32,
        /// CRC32 computed from the decoded data
        computed: u32,
    },
    /// A STR or KEY tag referenced an index past the end of its pool.
    PoolIndexOutOfRange {
        /// The index that was referenced
        index: u32,
        /// The length of the pool it was referenced against
        len: usize,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Warning::VersionTooNew { major, minor } => {
                write!(f, "file version {}.{} is newer than this reader", major, minor)
            }
            Warning::SizeMismatch { declared, actual } => write!(
                f,
                "header declared {} bytes of value+string data but found {}",
                declared, actual
            ),
            Warning::CrcMismatch { stored, computed } => write!(
                f,
                "CRC32 mismatch: header says 0x{:08X}, computed 0x{:08X}",
                stored, computed
            ),
            Warning::PoolIndexOutOfRange { index, len } => write!(
                f,
                "pool index {} is out of range for a pool of length {}",
                index, len
            ),
        }
    }
}
