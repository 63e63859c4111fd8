//! Per-entry asset records.

use crate::entry::EntryId;
use crate::resolve::AssetKind;
use crate::utils::hash::ContentHash;
use std::path::PathBuf;

/// One resolved reference inside one entry's document graph.
///
/// Records live in document discovery order and that order is
/// authoritative; nothing downstream reorders them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    /// The request as written, query flags retained
    pub raw_request: String,
    /// Absolute resolved file, query stripped
    pub resolved_path: PathBuf,
    pub kind: AssetKind,
    pub inline: bool,
    /// Entry whose document graph this record belongs to
    pub entry: EntryId,
    /// File the reference was written in
    pub issuer: PathBuf,
    /// Hash of the resolved file's content at record time
    pub content_hash: ContentHash,
    /// Final output path, filled in once the filename template runs
    output: Option<String>,
}

impl AssetRecord {
    pub fn new(
        raw_request: impl Into<String>,
        resolved_path: impl Into<PathBuf>,
        kind: AssetKind,
        inline: bool,
        entry: EntryId,
        issuer: impl Into<PathBuf>,
        content_hash: ContentHash,
    ) -> Self {
        Self {
            raw_request: raw_request.into(),
            resolved_path: resolved_path.into(),
            kind,
            inline,
            entry,
            issuer: issuer.into(),
            content_hash,
            output: None,
        }
    }

    /// Output path, if already assigned.
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub(crate) fn set_output(&mut self, output: String) {
        self.output = Some(output);
    }
}
