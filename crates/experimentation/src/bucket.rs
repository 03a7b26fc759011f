//! Stable bucketing of identity strings.

/// Number of buckets traffic is split across.
pub const BUCKET_COUNT: u32 = 100;

/// Map an identity to a bucket in `[0, 100)`.
///
/// Rolling `hash * 31 + unit` over the UTF-16 code units, wrapped to a
/// signed 32-bit integer. Deterministic across runs and processes.
pub fn bucket(identity: &str) -> u32 {
    let hash = identity
        .encode_utf16()
        .fold(0i32, |acc, unit| acc.wrapping_mul(31).wrapping_add(unit as i32));
    hash.unsigned_abs() % BUCKET_COUNT
}
