//! Output registry: one owner per output path, one emission per content.
//!
//! Every non-inline asset claims its output path here before emission.
//! A path claimed again with identical content is a dedup hit and must
//! not be written a second time. A path claimed with different content
//! is a collision: fatal by default, or renamed with a numeric suffix
//! when the session opts into that policy.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::BuildError;
use crate::utils::hash::ContentHash;

/// What to do when two different sources want the same output path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CollisionPolicy {
    /// Fail the build with `DuplicateOutput`.
    #[default]
    FailFast,
    /// Rename the later claim to `name.1.ext`, `name.2.ext`, ...
    Suffix,
}

/// Result of a claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Claimed {
    /// Path is newly owned by this source; the content must be emitted.
    Fresh(String),
    /// Identical bytes already live at this path; skip emission.
    Existing(String),
}

impl Claimed {
    pub fn path(&self) -> &str {
        match self {
            Self::Fresh(path) | Self::Existing(path) => path,
        }
    }

    pub fn needs_emission(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }
}

#[derive(Debug, Clone)]
struct Claim {
    source: PathBuf,
    hash: ContentHash,
}

/// Session-scoped table of claimed output paths.
///
/// # Invariants
///
/// - Each claimed path has exactly one owning source and content hash.
/// - A source keeps its first claimed path for the whole session.
#[derive(Debug, Default)]
pub struct OutputRegistry {
    claims: Mutex<FxHashMap<String, Claim>>,
    /// First claimed path per source, so later phases can look up where
    /// a resource landed without recomputing its filename.
    by_source: Mutex<FxHashMap<PathBuf, String>>,
    policy: CollisionPolicy,
}

impl OutputRegistry {
    pub fn new(policy: CollisionPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Claim `desired` for `source` with the given content hash.
    ///
    /// Same path and same hash means the bytes are already scheduled, no
    /// matter which source asked first. Same path with a different hash
    /// is resolved by the collision policy.
    pub fn claim(
        &self,
        desired: &str,
        source: &Path,
        hash: ContentHash,
    ) -> Result<Claimed, BuildError> {
        let mut claims = self.claims.lock();
        let mut candidate = desired.to_string();
        let mut attempt = 0usize;

        loop {
            match claims.get(&candidate) {
                None => {
                    claims.insert(
                        candidate.clone(),
                        Claim {
                            source: source.to_path_buf(),
                            hash,
                        },
                    );
                    self.by_source
                        .lock()
                        .entry(source.to_path_buf())
                        .or_insert_with(|| candidate.clone());
                    return Ok(Claimed::Fresh(candidate));
                }
                Some(existing) if existing.hash == hash => {
                    return Ok(Claimed::Existing(candidate));
                }
                Some(existing) => match self.policy {
                    CollisionPolicy::FailFast => {
                        return Err(BuildError::DuplicateOutput {
                            output: candidate,
                            first: existing.source.clone(),
                            second: source.to_path_buf(),
                        });
                    }
                    CollisionPolicy::Suffix => {
                        attempt += 1;
                        candidate = suffixed(desired, attempt);
                    }
                },
            }
        }
    }

    /// Where a source's content landed, if it claimed a path already.
    pub fn output_for(&self, source: &Path) -> Option<String> {
        self.by_source.lock().get(source).cloned()
    }

    pub fn is_claimed(&self, output_path: &str) -> bool {
        self.claims.lock().contains_key(output_path)
    }

    pub fn len(&self) -> usize {
        self.claims.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.lock().is_empty()
    }

    pub fn clear(&self) {
        self.claims.lock().clear();
        self.by_source.lock().clear();
    }
}

/// Insert a numeric suffix before the extension: `css/main.css` with
/// attempt 1 becomes `css/main.1.css`.
fn suffixed(path: &str, attempt: usize) -> String {
    match path.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !stem.ends_with('/') => {
            format!("{stem}.{attempt}.{ext}")
        }
        _ => format!("{path}.{attempt}"),
    }
}
