//! Content hashing utilities.
//!
//! Two layers:
//! - `ContentHash`: 256-bit blake3 digest for content-addressed outputs
//!   and emission deduplication
//! - `rustc_hash::FxHasher` helpers for fast non-cryptographic
//!   fingerprints (filename tokens, cache keys)
//!
//! # Usage
//!
//! ```ignore
//! use crate::utils::hash;
//!
//! let h = hash::hash_bytes("body { margin: 0 }"); // -> ContentHash
//! let fp = hash::fingerprint("src/index.html");   // -> "a1b2c3d4"
//! ```

use rustc_hash::FxHasher;
use std::fs::File;
use std::hash::Hasher;
use std::io::{self, BufReader, Read};
use std::path::Path;

// ============================================================================
// ContentHash (blake3)
// ============================================================================

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Create a new ContentHash from raw bytes.
    #[inline]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create a hash representing "no content" (all zeros).
    #[inline]
    pub const fn empty() -> Self {
        Self([0; 32])
    }

    /// Check if this is the empty/zero hash.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == [0; 32]
    }

    /// Convert to hex string (for debugging/display).
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// Hex prefix of the given length, for `[contenthash:n]` filename tokens.
    pub fn to_hex_prefix(self, len: usize) -> String {
        let mut hex = self.to_hex();
        hex.truncate(len.min(64));
        hex
    }

    /// Create from hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        if bytes.len() != 32 {
            return None;
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Some(Self(arr))
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Display first 16 chars of hex for brevity
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// Compute blake3 hash of in-memory content.
#[inline]
pub fn hash_bytes<T: AsRef<[u8]> + ?Sized>(data: &T) -> ContentHash {
    ContentHash::new(*blake3::hash(data.as_ref()).as_bytes())
}

/// Compute blake3 hash of file contents.
///
/// Returns the empty hash for missing or unreadable files; callers treat
/// that as "no content" rather than an error.
pub fn hash_file(path: &Path) -> ContentHash {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return ContentHash::empty(),
    };

    let mut reader = BufReader::with_capacity(64 * 1024, file);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                hasher.update(&buffer[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => return ContentHash::empty(),
        }
    }

    ContentHash::new(*hasher.finalize().as_bytes())
}

/// Combine part hashes in order, mixed with a salt.
///
/// Order-sensitive: reordering parts produces a different hash. The salt
/// distinguishes aggregates whose parts happen to be byte-identical.
pub fn combine_with_salt(parts: &[ContentHash], salt: u64) -> ContentHash {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    hasher.update(&salt.to_le_bytes());
    ContentHash::new(*hasher.finalize().as_bytes())
}

// ============================================================================
// FxHash fingerprints
// ============================================================================

/// Compute 64-bit hash from byte data.
#[inline]
pub fn compute<T: AsRef<[u8]> + ?Sized>(data: &T) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(data.as_ref());
    hasher.finish()
}

/// Compute hash and return as 8-char hex fingerprint.
///
/// Useful for cache-busting filenames (e.g. `style.a1b2c3d4.css`).
#[inline]
pub fn fingerprint<T: AsRef<[u8]> + ?Sized>(value: &T) -> String {
    format!("{:016x}", compute(value))[..8].to_string()
}
