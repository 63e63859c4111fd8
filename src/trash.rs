//! Trash registry: staged deletion of incidental side artifacts.
//!
//! Extraction tooling leaves droppings next to real outputs, most
//! commonly `<file>.LICENSE.txt` attribution files split out of minified
//! bundles. Those are staged here during render and deleted in one pass
//! after every entry's post-processing has finished, so post-processors
//! can still read them. Flushing an empty registry is a no-op.

use parking_lot::Mutex;
use regex::Regex;
use rustc_hash::FxHashSet;
use std::borrow::Cow;
use std::sync::LazyLock;

use crate::error::BuildError;
use crate::host::AssetEmitter;

// ============================================================================
// TrashRegistry
// ============================================================================

/// Session-scoped set of output paths to delete after post-processing.
#[derive(Debug, Default)]
pub struct TrashRegistry {
    staged: Mutex<FxHashSet<String>>,
}

impl TrashRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an output path for deletion. Staging twice is harmless.
    pub fn stage(&self, output_path: impl Into<String>) {
        self.staged.lock().insert(output_path.into());
    }

    pub fn is_staged(&self, output_path: &str) -> bool {
        self.staged.lock().contains(output_path)
    }

    /// Delete every staged file once and empty the registry.
    ///
    /// Runs after all entries finish post-processing, never mid-render.
    pub fn flush(&self, emitter: &dyn AssetEmitter) -> Result<(), BuildError> {
        let staged = {
            let mut set = self.staged.lock();
            let mut files: Vec<String> = set.drain().collect();
            files.sort();
            files
        };
        for file in staged {
            crate::debug!("trash"; "delete {}", file);
            emitter.delete(&file)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.staged.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.lock().is_empty()
    }

    pub fn clear(&self) {
        self.staged.lock().clear();
    }
}

// ============================================================================
// Attribution banners
// ============================================================================

/// Path of the attribution file extraction tools emit next to an output.
pub fn license_file_path(output_path: &str) -> String {
    format!("{output_path}.LICENSE.txt")
}

/// Split `/*! ... */` attribution banners out of realized text.
///
/// Returns the text without banners plus each banner body in source
/// order. Regular comments are left alone.
pub fn strip_attribution_comments(content: &str) -> (Cow<'_, str>, Vec<String>) {
    static RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)/\*!.*?\*/\n?").unwrap());

    let mut banners = Vec::new();
    let stripped = RE.replace_all(content, |caps: &regex::Captures| {
        banners.push(caps[0].trim_end_matches('\n').to_string());
        ""
    });
    (stripped, banners)
}
