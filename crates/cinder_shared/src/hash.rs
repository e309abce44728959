//! 64-bit name hashing.
//!
//! Instance identifiers, property ids, message ids and resource types are all
//! compared by hash. The keys are fixed so a name hashes to the same value in
//! every process.

use std::hash::Hasher;

use siphasher::sip::SipHasher13;

/// A hashed name.
pub type NameHash = u64;

const KEY0: u64 = 0x6369_6e64_6572_5f30;
const KEY1: u64 = 0x6e61_6d65_5f68_6173;

/// Hashes a name.
#[must_use]
pub fn hash_str(name: &str) -> NameHash {
    hash_bytes(name.as_bytes())
}

/// Hashes raw bytes.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> NameHash {
    let mut hasher = SipHasher13::new_with_keys(KEY0, KEY1);
    hasher.write(bytes);
    hasher.finish()
}

/// Hashes `prefix` followed by `name` without allocating.
#[must_use]
pub fn hash_concat(prefix: &str, name: &str) -> NameHash {
    let mut hasher = SipHasher13::new_with_keys(KEY0, KEY1);
    hasher.write(prefix.as_bytes());
    hasher.write(name.as_bytes());
    hasher.finish()
}
