//! Identifier hashing.
//!
//! The sdbm string hash: cheap, order dependent and not collision resistant.
//! It only picks the bucket; dictionaries still compare full keys.

/// Hashes `s` with the sdbm recurrence seeded from all-ones.
///
/// The empty string maps to `0`.
pub fn sdbm_hash(s: &str) -> u64 {
    if s.is_empty() {
        return 0;
    }

    s.bytes().fold(u64::MAX, |hash, c| {
        u64::from(c)
            .wrapping_add(hash << 6)
            .wrapping_add(hash << 16)
            .wrapping_sub(hash)
    })
}
