//! SHA-256 hashing primitives for the content-addressed store

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Hash length in bytes.
pub const HASH_SIZE: usize = 32;

/// Files are hashed in fixed-size chunks so memory stays bounded no matter
/// how large the file is.
pub const HASH_CHUNK_SIZE: usize = 32 * 1024 * 1024;

/// A SHA-256 hash (32 bytes).
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Sha256Hash([u8; HASH_SIZE]);

impl Sha256Hash {
    pub const fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    pub const fn zero() -> Self {
        Self([0u8; HASH_SIZE])
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    /// Convert to lowercase hex (64 characters).
    pub fn to_hex(&self) -> String {
        const HEX_CHARS: &[u8] = b"0123456789abcdef";
        let mut hex = String::with_capacity(HASH_SIZE * 2);
        for &byte in &self.0 {
            hex.push(HEX_CHARS[(byte >> 4) as usize] as char);
            hex.push(HEX_CHARS[(byte & 0xF) as usize] as char);
        }
        hex
    }

    /// Parse from hex (64 characters, either case).
    pub fn from_hex(hex: &str) -> Result<Self> {
        if hex.len() != HASH_SIZE * 2 {
            anyhow::bail!(
                "invalid hash length: expected {} hex characters, got {}",
                HASH_SIZE * 2,
                hex.len()
            );
        }
        let mut bytes = [0u8; HASH_SIZE];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let high = hex_nibble(hex.as_bytes()[i * 2])?;
            let low = hex_nibble(hex.as_bytes()[i * 2 + 1])?;
            *byte = (high << 4) | low;
        }
        Ok(Self(bytes))
    }
}

fn hex_nibble(c: u8) -> Result<u8> {
    match c {
        b'0'..=b'9' => Ok(c - b'0'),
        b'a'..=b'f' => Ok(c - b'a' + 10),
        b'A'..=b'F' => Ok(c - b'A' + 10),
        _ => anyhow::bail!("invalid hex character: {}", c as char),
    }
}

impl std::fmt::Debug for Sha256Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sha256Hash({})", self.to_hex())
    }
}

impl std::fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Hash a byte slice.
pub fn hash_bytes(data: &[u8]) -> Sha256Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    finalize(hasher)
}

/// Hash a file's full content, streaming in [`HASH_CHUNK_SIZE`] chunks.
pub fn hash_file(path: &Path) -> Result<Sha256Hash> {
    let mut file =
        File::open(path).with_context(|| format!("open for hashing: {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let read = file
            .read(&mut buffer)
            .with_context(|| format!("read for hashing: {}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(finalize(hasher))
}

fn finalize(hasher: Sha256) -> Sha256Hash {
    let digest = hasher.finalize();
    let mut bytes = [0u8; HASH_SIZE];
    bytes.copy_from_slice(&digest);
    Sha256Hash::from_bytes(bytes)
}
