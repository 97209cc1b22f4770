//! Block-cipher wrapper (spec §4.6, component C3).
//!
//! The actual block ciphers (AES/ARIA/Camellia, all 256-bit keys, CBC mode, PKCS#7 padding) are
//! external collaborators per spec §1 — this module only picks which one a given 32-bit key
//! seed selects and derives its key/IV material, then drives the RustCrypto `cipher`/`cbc`
//! traits the way `ngdp-crypto` (this corpus's sibling crypto crate) wraps `salsa20`/`rc4`
//! behind a small seed-driven API.
use crate::error::{Error, Result};
use crate::prng::Xorshift32;

use aes::Aes256;
use aria::Aria256;
use camellia::Camellia256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cbc::{Decryptor, Encryptor};

/// The three supported 256-bit block ciphers, selected by the low two bits of the key seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CipherChoice {
    Aria,
    Aes,
    Camellia,
}

impl CipherChoice {
    /// `K & 0x3` indexes into `{ARIA, AES, Camellia}`, saturating into the last entry since the
    /// list has three members but the two selector bits span four values (spec §4.6).
    pub fn from_key(key: u32) -> Self {
        match (key & 0x3).min(2) {
            0 => CipherChoice::Aria,
            1 => CipherChoice::Aes,
            _ => CipherChoice::Camellia,
        }
    }
}

/// Key + IV material derived from a 32-bit seed (spec §4.6): spin the PRNG past `spin` draws for
/// diffusion, then take 32 bytes of key followed by 16 bytes of IV.
pub struct CipherMaterial {
    pub choice: CipherChoice,
    pub key: [u8; 32],
    pub iv: [u8; 16],
}

impl CipherMaterial {
    pub fn derive(seed: u32) -> Self {
        let choice = CipherChoice::from_key(seed);
        let spin = (seed >> 2) & 0x3F;
        let material_seed = seed >> 8;

        let mut rng = Xorshift32::new(material_seed);
        rng.spin(spin);
        let key_bytes = rng.next_bytes(8); // 8 u32 words = 32 bytes
        let iv_bytes = rng.next_bytes(4); // 4 u32 words = 16 bytes

        let mut key = [0u8; 32];
        key.copy_from_slice(&key_bytes);
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&iv_bytes);

        Self { choice, key, iv }
    }
}

macro_rules! cbc_round_trip {
    ($cipher:ty, $key:expr, $iv:expr, $data:expr, encrypt) => {
        Encryptor::<$cipher>::new($key.into(), $iv.into()).encrypt_padded_vec_mut::<Pkcs7>($data)
    };
    ($cipher:ty, $key:expr, $iv:expr, $data:expr, decrypt) => {
        Decryptor::<$cipher>::new($key.into(), $iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>($data)
            .map_err(|e| Error::CryptoFailure(format!("bad padding: {:?}", e)))?
    };
}

/// Encrypt `data` under the key seed's derived material (spec §4.5 pipeline step 5).
pub fn encrypt(seed: u32, data: &[u8]) -> Vec<u8> {
    let material = CipherMaterial::derive(seed);
    match material.choice {
        CipherChoice::Aes => cbc_round_trip!(Aes256, material.key, material.iv, data, encrypt),
        CipherChoice::Aria => cbc_round_trip!(Aria256, material.key, material.iv, data, encrypt),
        CipherChoice::Camellia => {
            cbc_round_trip!(Camellia256, material.key, material.iv, data, encrypt)
        }
    }
}

/// Decrypt `data` under the key seed's derived material (spec §4.5 pipeline, reversed step 5).
pub fn decrypt(seed: u32, data: &[u8]) -> Result<Vec<u8>> {
    let material = CipherMaterial::derive(seed);
    Ok(match material.choice {
        CipherChoice::Aes => cbc_round_trip!(Aes256, material.key, material.iv, data, decrypt),
        CipherChoice::Aria => cbc_round_trip!(Aria256, material.key, material.iv, data, decrypt),
        CipherChoice::Camellia => {
            cbc_round_trip!(Camellia256, material.key, material.iv, data, decrypt)
        }
    })
}
