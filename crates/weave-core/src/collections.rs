//! Collection and hasher selection.
//!
//! The `std-hash` feature swaps the hashbrown maps and the ahash hasher for
//! their `std` counterparts, e.g. when deterministic iteration across builds
//! matters more than speed.

use core::hash::{Hash, Hasher};

#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::{HashMap, HashSet};
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub use hashbrown::{HashMap, HashSet};
}

#[cfg(feature = "std-hash")]
fn key_hasher() -> std::collections::hash_map::DefaultHasher {
    std::collections::hash_map::DefaultHasher::new()
}

#[cfg(not(feature = "std-hash"))]
fn key_hasher() -> ahash::AHasher {
    ahash::AHasher::default()
}

/// Hashes a vnode key source into the 64-bit identity used for list diffing.
#[inline]
pub fn key_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = key_hasher();
    value.hash(&mut hasher);
    hasher.finish()
}
