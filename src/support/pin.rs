//! Confirmation PINs.
//!
//! A PIN is five ASCII digits. Only its SHA-256 digest is stored. The space is
//! small enough to brute force, so this only gates the attendance step of a
//! draw and must never protect an account.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

static VALIDATE_PIN: Lazy<Regex> = Lazy::new(|| Regex::new("^[0-9]{5}$").unwrap());

pub fn is_valid_pin(pin: &str) -> bool {
    VALIDATE_PIN.is_match(pin)
}

pub fn hash_pin(pin: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(pin.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify_pin(pin: &str, hash: &str) -> bool {
    hash_pin(pin) == hash
}
