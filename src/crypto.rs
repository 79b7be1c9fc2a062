//! Key generation and hashing primitives.

use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Domain-separation prefix for stored secret hashes.
const HASH_SALT: &str = "keygate-v1";

/// Generates a shareable license key: four dash-separated groups of
/// four uppercase hex characters (`XXXX-XXXX-XXXX-XXXX`, 64 bits of
/// entropy).
pub fn generate_license_key() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    let hex = hex::encode_upper(bytes);
    format!(
        "{}-{}-{}-{}",
        &hex[0..4],
        &hex[4..8],
        &hex[8..12],
        &hex[12..16]
    )
}

/// Generates an admin API key. Shown once at creation; only its hash
/// is stored.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; 24];
    OsRng.fill_bytes(&mut bytes);
    format!("kg_{}", hex::encode(bytes))
}

/// Hash a secret (API key) for storage and lookup.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(HASH_SALT.as_bytes());
    hasher.update(b":");
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}
