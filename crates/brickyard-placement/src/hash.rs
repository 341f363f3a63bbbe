// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 The Brickyard Authors

//! Hash functions for ring ordering.
//!
//! Device ordering must be deterministic across processes and restarts: the
//! same seed against the same topology yields the same candidate sequence.
//! The hash is therefore seeded with a fixed key rather than the std
//! randomized hasher.

use std::hash::Hasher;

use siphasher::sip::SipHasher13;

/// Fixed ring hash key, shared by every Brickyard process.
const RING_HASH_KEY: (u64, u64) = (0x6272_6963_6b79_6172, 0x6421_7269_6e67_2e30);

/// Compute a ring hash of the given bytes.
///
/// Uses SipHash-1-3 for speed while maintaining good distribution.
#[inline]
#[must_use]
pub fn ring_hash(input: &[u8]) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(RING_HASH_KEY.0, RING_HASH_KEY.1);
    hasher.write(input);
    hasher.finish()
}

/// Compute a ring hash combining two inputs.
///
/// Used to score a device against an allocation seed.
#[inline]
#[must_use]
pub fn ring_hash2(a: &[u8], b: &[u8]) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(RING_HASH_KEY.0, RING_HASH_KEY.1);
    // Length-prefix the first input so ("ab", "c") and ("a", "bc") differ.
    hasher.write_usize(a.len());
    hasher.write(a);
    hasher.write(b);
    hasher.finish()
}
