//! Content realization: built modules in, final text out.
//!
//! The build phase stores every compiled template and extracted style
//! here as an [`ir::IrModule`]. Render walks each entry's module,
//! substitutes references with output paths, data URLs, or embedded
//! content, squashes script-imported style chains into bundles, and
//! collects everything into a [`manifest::RenderManifest`] that the
//! session commits only after post-processing succeeds.

pub mod ir;
pub mod manifest;
pub mod realizer;
pub mod squash;

pub use ir::{IrDialect, IrModule, IrSegment};
pub use manifest::{RenderManifest, RenderTask, TaskContent};
pub use realizer::{RealizeEnv, Realizer, entry_path_context};
pub use squash::{StyleBundle, rewrite_css_urls, squash_imports};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

/// Built modules keyed by source file, filled during the build phase.
#[derive(Debug, Default)]
pub struct ModuleStore {
    modules: RwLock<FxHashMap<PathBuf, IrModule>>,
}

impl ModuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a built module, replacing any earlier build of the same
    /// source (watch rebuilds).
    pub fn add(&self, module: IrModule) {
        self.modules
            .write()
            .insert(module.source.clone(), module);
    }

    pub fn get(&self, source: &Path) -> Option<IrModule> {
        self.modules.read().get(source).cloned()
    }

    pub fn contains(&self, source: &Path) -> bool {
        self.modules.read().contains_key(source)
    }

    pub fn len(&self) -> usize {
        self.modules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.read().is_empty()
    }

    pub fn clear(&self) {
        self.modules.write().clear();
    }
}
