//! Key hash functions.
//!
//! Byte keys (strings and symbol segments) use Bob Jenkins' one-at-a-time
//! hash; integer keys go through a small multiply-xor-shift mixer so that
//! sequential integers spread over the bucket array.

/// Multiplier of the integer mixer.
pub const MIX_CONSTANT: u64 = 0x45d9_f3b;

/// Jenkins one-at-a-time hash. Bytes are taken as unsigned.
///
/// ```
/// use tl_mem::one_at_a_time;
///
/// assert_eq!(one_at_a_time(b""), 0);
/// assert_eq!(one_at_a_time(b"abc"), one_at_a_time(b"abc"));
/// assert_ne!(one_at_a_time(b"abc"), one_at_a_time(b"acb"));
/// ```
#[must_use]
pub fn one_at_a_time(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0;
    for &b in bytes {
        hash = hash.wrapping_add(u64::from(b));
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash.wrapping_add(hash << 15)
}

/// Avalanche mixer for integer keys.
#[must_use]
pub fn mix_int(x: u64) -> u64 {
    let mut hash = ((x >> 16) ^ x).wrapping_mul(MIX_CONSTANT);
    hash = ((hash >> 16) ^ hash).wrapping_mul(MIX_CONSTANT);
    (hash >> 16) ^ hash
}
