//! Symmetric value cipher with integrity framing.
//!
//! Every plaintext value is framed into an envelope before encryption:
//!
//! ```text
//! [4 hex digits: payload length][32 hex chars: MD5 of payload][payload]
//! ```
//!
//! The envelope is NUL-padded to the cipher block size, encrypted with AES
//! in ECB mode, and base64-encoded for storage in text columns. This framing
//! is a preserved legacy format and must stay bit-exact to remain compatible
//! with already-persisted ciphertext; the fixed cipher mode is a known
//! weakness of that format, kept deliberately.
//!
//! An empty key disables encryption entirely: values pass through unchanged
//! in both directions (the escape hatch for unconfigured installs).

use aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes192, Aes256};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use md5::{Digest, Md5};

use crate::crypto::key::SystemKey;
use crate::error::{CofferError, Result};

/// Key sizes the cipher accepts, in bytes.
pub const ACCEPTED_KEY_SIZES: [usize; 3] = [16, 24, 32];

const BLOCK_SIZE: usize = 16;
const LENGTH_FIELD: usize = 4;
const CHECKSUM_FIELD: usize = 32;
const HEADER: usize = LENGTH_FIELD + CHECKSUM_FIELD;

/// Largest payload the 4-hex-digit length field can express.
const MAX_PAYLOAD: usize = 0xFFFF;

/// Pad or truncate an arbitrary-length key to the nearest accepted size.
///
/// Grows with NUL bytes, truncates above the largest size. Total and
/// idempotent: an already-padded key maps to itself, and the empty key maps
/// to the empty key (which means "no encryption").
pub fn pad_key(raw: &[u8]) -> Vec<u8> {
    let mut key = raw.to_vec();
    if key.is_empty() {
        return key;
    }
    let target = ACCEPTED_KEY_SIZES
        .iter()
        .copied()
        .find(|&size| key.len() <= size)
        .unwrap_or(ACCEPTED_KEY_SIZES[ACCEPTED_KEY_SIZES.len() - 1]);
    key.resize(target, 0);
    key
}

enum LegacyCipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl LegacyCipher {
    fn new(key: &SystemKey) -> Result<Self> {
        let padded = key.padded_bytes();
        match padded.len() {
            16 => Ok(LegacyCipher::Aes128(
                Aes128::new_from_slice(&padded).map_err(cipher_key_error)?,
            )),
            24 => Ok(LegacyCipher::Aes192(
                Aes192::new_from_slice(&padded).map_err(cipher_key_error)?,
            )),
            32 => Ok(LegacyCipher::Aes256(
                Aes256::new_from_slice(&padded).map_err(cipher_key_error)?,
            )),
            other => Err(CofferError::Crypto(format!(
                "padded key has unsupported size: {} bytes",
                other
            ))),
        }
    }

    fn encrypt_blocks(&self, buf: &mut [u8]) {
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            let block = GenericArray::from_mut_slice(block);
            match self {
                LegacyCipher::Aes128(c) => c.encrypt_block(block),
                LegacyCipher::Aes192(c) => c.encrypt_block(block),
                LegacyCipher::Aes256(c) => c.encrypt_block(block),
            }
        }
    }

    fn decrypt_blocks(&self, buf: &mut [u8]) {
        for block in buf.chunks_exact_mut(BLOCK_SIZE) {
            let block = GenericArray::from_mut_slice(block);
            match self {
                LegacyCipher::Aes128(c) => c.decrypt_block(block),
                LegacyCipher::Aes192(c) => c.decrypt_block(block),
                LegacyCipher::Aes256(c) => c.decrypt_block(block),
            }
        }
    }
}

fn cipher_key_error(e: aes::cipher::InvalidLength) -> CofferError {
    CofferError::Crypto(format!("cipher rejected key: {}", e))
}

fn integrity(reason: impl Into<String>) -> CofferError {
    CofferError::Integrity(reason.into())
}

/// Encrypt a plaintext value under the system key.
///
/// An empty key returns the plaintext unmodified. Payloads longer than
/// 65535 bytes cannot be expressed by the envelope's length field and are
/// rejected as invalid input.
pub fn encrypt(plaintext: &str, key: &SystemKey) -> Result<String> {
    if key.is_empty() {
        return Ok(plaintext.to_string());
    }

    let payload = plaintext.as_bytes();
    if payload.len() > MAX_PAYLOAD {
        return Err(CofferError::InvalidInput(format!(
            "value of {} bytes exceeds the envelope limit of {} bytes",
            payload.len(),
            MAX_PAYLOAD
        )));
    }

    let mut envelope = Vec::with_capacity(HEADER + payload.len() + BLOCK_SIZE);
    envelope.extend_from_slice(format!("{:04x}", payload.len()).as_bytes());
    envelope.extend_from_slice(hex::encode(Md5::digest(payload)).as_bytes());
    envelope.extend_from_slice(payload);
    // NUL padding up to the block boundary, exactly as the legacy format
    // stored it; the declared length recovers the payload on decrypt.
    let padded_len = envelope.len().div_ceil(BLOCK_SIZE) * BLOCK_SIZE;
    envelope.resize(padded_len, 0);

    let cipher = LegacyCipher::new(key)?;
    cipher.encrypt_blocks(&mut envelope);
    Ok(STANDARD.encode(&envelope))
}

/// Decrypt a base64 ciphertext produced by [`encrypt`].
///
/// An empty key returns the input unmodified. Any mismatch between the
/// declared length, the embedded checksum, and the decrypted payload is a
/// recoverable `Integrity` error, so callers reading legacy or unencrypted
/// rows can degrade instead of failing hard.
pub fn decrypt(ciphertext: &str, key: &SystemKey) -> Result<String> {
    if key.is_empty() {
        return Ok(ciphertext.to_string());
    }

    let mut data = STANDARD
        .decode(ciphertext.trim())
        .map_err(|_| integrity("value is not valid base64"))?;
    if data.len() < HEADER.div_ceil(BLOCK_SIZE) * BLOCK_SIZE || data.len() % BLOCK_SIZE != 0 {
        return Err(integrity("value is shorter than an encrypted envelope"));
    }

    let cipher = LegacyCipher::new(key)?;
    cipher.decrypt_blocks(&mut data);

    let declared = std::str::from_utf8(&data[..LENGTH_FIELD])
        .ok()
        .and_then(|s| usize::from_str_radix(s, 16).ok())
        .ok_or_else(|| integrity("malformed length field"))?;
    let checksum = std::str::from_utf8(&data[LENGTH_FIELD..HEADER])
        .map_err(|_| integrity("malformed checksum field"))?;

    if HEADER + declared > data.len() {
        return Err(integrity(format!(
            "declared length {} exceeds envelope of {} bytes",
            declared,
            data.len() - HEADER
        )));
    }
    let payload = &data[HEADER..HEADER + declared];
    let computed = hex::encode(Md5::digest(payload));
    if !checksum.eq_ignore_ascii_case(&computed) {
        return Err(integrity("checksum mismatch"));
    }

    String::from_utf8(payload.to_vec()).map_err(|_| integrity("payload is not valid UTF-8"))
}
