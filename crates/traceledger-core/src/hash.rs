use sha2::{Digest, Sha256};

use crate::constants::HASH_SIZE;
use crate::encode::Canonical;
use crate::Block;

pub type Hash = [u8; HASH_SIZE];

pub fn hash_bytes(bytes: &[u8]) -> Hash {
    let digest = Sha256::digest(bytes);
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&digest[..]);
    out
}

/// Lowercase hex SHA-256, always 64 characters.
pub fn hash_hex(bytes: &[u8]) -> String {
    hex::encode(hash_bytes(bytes))
}

pub fn hash_block(block: &Block) -> String {
    hash_hex(&block.canonical_bytes())
}
