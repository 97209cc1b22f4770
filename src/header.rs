//! Fixed header and encode/decode pipeline ordering (spec §4.5/§6, component C10).
use crate::crc::Crc32;
use crate::error::{Error, Result, Warning};
use crate::{cipher, compress};

/// `0x504A` ("JP") read little-endian.
pub const MAGIC_LE: u16 = 0x504A;
/// `0x4A50` ("PJ") read big-endian; the same two bytes, the other endianness.
pub const MAGIC_BE: u16 = 0x4A50;

/// Byte length of the fixed part of the header, before the optional CRC32/key tail.
pub const BASE_HEADER_SIZE: u8 = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

bitflags::bitflags! {
    /// Flag bits at header offset 5 (spec §6).
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    struct Flags: u8 {
        const LARGE_FILE = 0b0000_0001;
        const COMPRESSED = 0b0000_0010;
        const CRC32 = 0b0000_0100;
        const ENCRYPTED = 0b0000_1000;
        const ENCRYPTION_EXCLUDED = 0b0001_0000;
        const KEY_STRIPPED = 0b0010_0000;
    }
}

/// The parsed fixed header of a JamPack file.
#[derive(Clone, Debug)]
pub struct Header {
    pub endian: Endian,
    pub version_major: u8,
    pub version_minor: u8,
    pub header_size: u8,
    pub large_file: bool,
    pub compressed: bool,
    pub crc_present: bool,
    pub encrypted: bool,
    pub encryption_excluded: bool,
    pub key_stripped: bool,
    pub value_size: u64,
    pub str_size: u64,
    pub data_size: u64,
    pub crc32: Option<u32>,
    pub encryption_key: Option<u32>,
}

/// Current format version this implementation writes.
pub const CURRENT_VERSION_MAJOR: u8 = 1;
pub const CURRENT_VERSION_MINOR: u8 = 0;

impl Header {
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        endian: Endian,
        large_file: bool,
        compressed: bool,
        crc32: Option<u32>,
        encryption_key: Option<u32>,
        encryption_excluded: bool,
        key_stripped: bool,
        value_size: u64,
        str_size: u64,
        data_size: u64,
    ) -> Self {
        let mut header_size = BASE_HEADER_SIZE;
        if crc32.is_some() {
            header_size += 4;
        }
        if encryption_key.is_some() {
            header_size += 4;
        }
        Header {
            endian,
            version_major: CURRENT_VERSION_MAJOR,
            version_minor: CURRENT_VERSION_MINOR,
            header_size,
            large_file,
            compressed,
            crc_present: crc32.is_some(),
            encrypted: encryption_key.is_some() || encryption_excluded,
            encryption_excluded,
            key_stripped,
            value_size,
            str_size,
            data_size,
            crc32,
            encryption_key,
        }
    }

    /// Serialize the header to bytes. The encoding of every multi-byte field after the magic
    /// follows `self.endian`; the magic itself is the two-byte marker for that endianness.
    pub fn write(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.header_size as usize);
        let magic = match self.endian {
            Endian::Little => MAGIC_LE,
            Endian::Big => MAGIC_BE,
        };
        // The magic's own two bytes are the literal marker, not an endian-encoded u16.
        out.extend_from_slice(&magic.to_be_bytes());
        out.push(self.version_major);
        out.push(self.version_minor);
        out.push(self.header_size);

        let mut flags = Flags::empty();
        if self.large_file {
            flags |= Flags::LARGE_FILE;
        }
        if self.compressed {
            flags |= Flags::COMPRESSED;
        }
        if self.crc_present {
            flags |= Flags::CRC32;
        }
        if self.encrypted {
            flags |= Flags::ENCRYPTED;
        }
        if self.encryption_excluded {
            flags |= Flags::ENCRYPTION_EXCLUDED;
        }
        if self.key_stripped {
            flags |= Flags::KEY_STRIPPED;
        }
        out.push(flags.bits());
        out.push(0); // reserved
        out.push(0); // reserved

        write_u64(&mut out, self.value_size, self.endian);
        write_u64(&mut out, self.str_size, self.endian);
        write_u64(&mut out, self.data_size, self.endian);

        if let Some(crc) = self.crc32 {
            write_u32(&mut out, crc, self.endian);
        }
        if let Some(key) = self.encryption_key {
            write_u32(&mut out, key, self.endian);
        }
        out
    }

    /// Parse a header from the start of `data`. Returns the header and any non-fatal warnings
    /// observed while parsing (e.g. a newer minor version).
    pub fn parse(data: &[u8]) -> Result<(Header, Vec<Warning>)> {
        if data.len() < 8 {
            return Err(Error::BadHeader("input shorter than the fixed header prefix".into()));
        }
        let magic = u16::from_be_bytes([data[0], data[1]]);
        let endian = match magic {
            MAGIC_LE => Endian::Little,
            MAGIC_BE => Endian::Big,
            other => return Err(Error::BadMagic(other)),
        };

        let version_major = data[2];
        let version_minor = data[3];
        let header_size = data[4];
        let flags = Flags::from_bits_truncate(data[5]);

        if (data.len() as u64) < header_size as u64 {
            return Err(Error::BadHeader("declared header size exceeds input length".into()));
        }

        let large_file = flags.contains(Flags::LARGE_FILE);
        let compressed = flags.contains(Flags::COMPRESSED);
        let crc_present = flags.contains(Flags::CRC32);
        let encrypted = flags.contains(Flags::ENCRYPTED);
        let encryption_excluded = flags.contains(Flags::ENCRYPTION_EXCLUDED);
        let key_stripped = flags.contains(Flags::KEY_STRIPPED);

        let value_size = read_u64(data, 8, endian)?;
        let str_size = read_u64(data, 16, endian)?;
        let data_size = read_u64(data, 24, endian)?;

        let mut offset = 32usize;
        let crc32 = if crc_present {
            let v = read_u32(data, offset, endian)?;
            offset += 4;
            Some(v)
        } else {
            None
        };
        let encryption_key = if encrypted && !encryption_excluded {
            Some(read_u32(data, offset, endian)?)
        } else {
            None
        };

        let mut warnings = Vec::new();
        if version_major > CURRENT_VERSION_MAJOR {
            warnings.push(Warning::VersionTooNew {
                major: version_major,
                minor: version_minor,
            });
        }

        Ok((
            Header {
                endian,
                version_major,
                version_minor,
                header_size,
                large_file,
                compressed,
                crc_present,
                encrypted,
                encryption_excluded,
                key_stripped,
                value_size,
                str_size,
                data_size,
                crc32,
                encryption_key,
            },
            warnings,
        ))
    }
}

fn write_u64(out: &mut Vec<u8>, v: u64, endian: Endian) {
    match endian {
        Endian::Little => out.extend_from_slice(&v.to_le_bytes()),
        Endian::Big => out.extend_from_slice(&v.to_be_bytes()),
    }
}

fn write_u32(out: &mut Vec<u8>, v: u32, endian: Endian) {
    match endian {
        Endian::Little => out.extend_from_slice(&v.to_le_bytes()),
        Endian::Big => out.extend_from_slice(&v.to_be_bytes()),
    }
}

fn read_u64(data: &[u8], at: usize, endian: Endian) -> Result<u64> {
    let bytes: [u8; 8] = data
        .get(at..at + 8)
        .ok_or_else(|| Error::BadHeader("truncated size field".into()))?
        .try_into()
        .unwrap();
    Ok(match endian {
        Endian::Little => u64::from_le_bytes(bytes),
        Endian::Big => u64::from_be_bytes(bytes),
    })
}

fn read_u32(data: &[u8], at: usize, endian: Endian) -> Result<u32> {
    let bytes: [u8; 4] = data
        .get(at..at + 4)
        .ok_or_else(|| Error::BadHeader("truncated CRC/key field".into()))?
        .try_into()
        .unwrap();
    Ok(match endian {
        Endian::Little => u32::from_le_bytes(bytes),
        Endian::Big => u32::from_be_bytes(bytes),
    })
}

/// Result of running the write-side pipeline (spec §4.5 steps 2-6).
pub struct PipelineOutput {
    pub header: Header,
    pub data: Vec<u8>,
}

/// Run the encode pipeline: CRC -> compress -> encrypt, then build the header.
///
/// `value_section` and `str_section` are concatenated as `D := V || S` first; `crc` gets computed
/// over that pre-transform `D`, matching the decode side's requirement that CRC is checked
/// against the original `V || S`, not the stored (possibly compressed/encrypted) bytes.
#[allow(clippy::too_many_arguments)]
pub fn run_encode_pipeline(
    endian: Endian,
    value_section: Vec<u8>,
    str_section: Vec<u8>,
    use_crc: bool,
    use_compress: bool,
    encryption_key: Option<u32>,
    encryption_excluded: bool,
    key_stripped: bool,
    large_file_ceiling: u64,
) -> Result<PipelineOutput> {
    let value_size = value_section.len() as u64;
    let str_size = str_section.len() as u64;

    let mut data = value_section;
    data.extend_from_slice(&str_section);

    let crc32 = if use_crc { Some(Crc32::of(&data)) } else { None };

    if use_compress {
        data = compress::compress(&data)?;
    }

    let effective_key = if encryption_key.is_some() || encryption_excluded {
        Some(encryption_key.unwrap_or_else(|| rand::random::<u32>().max(1)))
    } else {
        None
    };

    if let Some(seed) = effective_key {
        data = cipher::encrypt(seed, &data);
    }

    let data_size = data.len() as u64;
    let stored_key = if encryption_excluded { None } else { effective_key };

    let base_len = BASE_HEADER_SIZE as u64
        + if use_crc { 4 } else { 0 }
        + if stored_key.is_some() { 4 } else { 0 }
        + data_size;
    let large_file = base_len > large_file_ceiling;

    let header = Header::build(
        endian,
        large_file,
        use_compress,
        crc32,
        stored_key,
        encryption_excluded,
        key_stripped,
        value_size,
        str_size,
        data_size,
    );

    Ok(PipelineOutput { header, data })
}

/// Run the decode pipeline in reverse: decrypt -> decompress -> CRC check.
///
/// Returns the original `V || S` bytes plus any warnings raised along the way (CRC mismatch,
/// size mismatch). Fatal conditions (`MissingKey`) are returned as `Err`.
pub fn run_decode_pipeline(
    header: &Header,
    data: Vec<u8>,
    supplied_key: Option<u32>,
) -> Result<(Vec<u8>, Vec<Warning>)> {
    let mut warnings = Vec::new();
    let mut data = data;

    if header.encrypted {
        let seed = if header.encryption_excluded {
            supplied_key.ok_or(Error::MissingKey)?
        } else {
            header.encryption_key.ok_or(Error::MissingKey)?
        };
        data = cipher::decrypt(seed, &data)?;
    }

    if header.compressed {
        data = compress::decompress(&data)?;
    }

    let declared = header.value_size + header.str_size;
    if declared != data.len() as u64 {
        warnings.push(Warning::SizeMismatch {
            declared,
            actual: data.len() as u64,
        });
    }

    if let Some(stored) = header.crc32 {
        let computed = Crc32::of(&data);
        if computed != stored {
            warnings.push(Warning::CrcMismatch { stored, computed });
        }
    }

    Ok((data, warnings))
}
