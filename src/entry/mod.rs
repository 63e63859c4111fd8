//! Entry registry: named template entries and their output filenames.
//!
//! An entry binds a name to exactly one template source per session.
//! Registering the same (name, source) pair again is a no-op, so hosts
//! can feed the same entry table on every watch pass; binding a name to
//! a different source is a configuration error. Entries promoted from
//! resolved template references at build time are marked dynamic and
//! vanish with the session, so the next pass re-promotes them cleanly.

pub mod filename;

pub use filename::{FilenameTemplate, PathContext};

use crate::config::{ExtractHook, PostprocessHook, PostprocessInfo};
use crate::error::BuildError;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

/// A JSON object map for per-entry template data.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Entry
// ============================================================================

/// Session-stable handle for a registered entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u32);

impl EntryId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A named template entry.
pub struct Entry {
    pub id: EntryId,
    /// Unique name, also the default `[name]` token value
    pub name: String,
    /// Template source file
    pub source: PathBuf,
    /// Output filename template for the rendered page
    pub template: FilenameTemplate,
    /// Data bound into the template at render time
    pub data: JsonMap,
    /// Entry-level postprocess hook; wins over the session-wide one
    pub postprocess: Option<PostprocessHook>,
    /// Entry-level extract hook; wins over the session-wide one
    pub extract: Option<ExtractHook>,
    /// Promoted from a resolved reference rather than registered up front
    pub dynamic: bool,
    pub verbose: bool,
    filename: OnceLock<String>,
}

impl Entry {
    /// Output filename for this entry, rendered on first call.
    ///
    /// Later calls return the first result unchanged, so the name stays
    /// stable for the rest of the session even if the context would now
    /// render differently.
    pub fn resolved_filename(&self, cx: &PathContext) -> &str {
        self.filename.get_or_init(|| self.template.render(cx))
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("source", &self.source)
            .field("template", &self.template)
            .field("data", &self.data)
            .field("postprocess", &self.postprocess.as_ref().map(|_| ".."))
            .field("extract", &self.extract.as_ref().map(|_| ".."))
            .field("dynamic", &self.dynamic)
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

/// Per-entry settings supplied at registration.
#[derive(Clone, Default)]
pub struct EntryOptions {
    pub template: Option<FilenameTemplate>,
    pub data: JsonMap,
    pub postprocess: Option<PostprocessHook>,
    pub extract: Option<ExtractHook>,
    pub verbose: bool,
}

impl EntryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(mut self, template: impl Into<FilenameTemplate>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn with_data(mut self, data: JsonMap) -> Self {
        self.data = data;
        self
    }

    pub fn with_postprocess(
        mut self,
        hook: impl Fn(String, &PostprocessInfo) -> Result<String, String> + Send + Sync + 'static,
    ) -> Self {
        self.postprocess = Some(Arc::new(hook));
        self
    }

    pub fn with_extract(
        mut self,
        hook: impl Fn(&str, &Path) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.extract = Some(Arc::new(hook));
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl fmt::Debug for EntryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryOptions")
            .field("template", &self.template)
            .field("data", &self.data)
            .field("postprocess", &self.postprocess.as_ref().map(|_| ".."))
            .field("extract", &self.extract.as_ref().map(|_| ".."))
            .field("verbose", &self.verbose)
            .finish()
    }
}

// ============================================================================
// EntryRegistry
// ============================================================================

/// Session-scoped entry table.
///
/// # Invariants
///
/// - A name maps to exactly one source for the whole session.
/// - Ids are dense and assigned in registration order.
#[derive(Debug, Default)]
pub struct EntryRegistry {
    by_name: RwLock<FxHashMap<String, Arc<Entry>>>,
    /// Registration order, indexable by `EntryId`.
    order: RwLock<Vec<Arc<Entry>>>,
    next_id: AtomicU32,
}

impl EntryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named entry.
    ///
    /// Re-registering the same (name, source) pair returns the existing
    /// entry without touching its options. The same name with a different
    /// source is rejected.
    pub fn register(
        &self,
        name: &str,
        source: &Path,
        options: EntryOptions,
    ) -> Result<Arc<Entry>, BuildError> {
        self.insert(name, source, options, false)
    }

    /// Promote a resolved template reference to an entry.
    ///
    /// Returns `Ok(true)` if a new entry was created, `Ok(false)` without
    /// effect if the same (name, source) pair already exists.
    pub fn add_dynamic_entry(
        &self,
        name: &str,
        source: &Path,
        options: EntryOptions,
    ) -> Result<bool, BuildError> {
        let before = self.order.read().len();
        self.insert(name, source, options, true)?;
        Ok(self.order.read().len() > before)
    }

    fn insert(
        &self,
        name: &str,
        source: &Path,
        options: EntryOptions,
        dynamic: bool,
    ) -> Result<Arc<Entry>, BuildError> {
        let mut by_name = self.by_name.write();
        if let Some(existing) = by_name.get(name) {
            if existing.source == source {
                return Ok(existing.clone());
            }
            return Err(BuildError::Config(format!(
                "entry `{}` is already bound to `{}`; can't rebind it to `{}`",
                name,
                existing.source.display(),
                source.display()
            )));
        }

        let id = EntryId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = Arc::new(Entry {
            id,
            name: name.to_string(),
            source: source.to_path_buf(),
            template: options
                .template
                .unwrap_or_else(|| FilenameTemplate::pattern("[name].html")),
            data: options.data,
            postprocess: options.postprocess,
            extract: options.extract,
            dynamic,
            verbose: options.verbose,
            filename: OnceLock::new(),
        });
        by_name.insert(name.to_string(), entry.clone());
        self.order.write().push(entry.clone());
        Ok(entry)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Entry>> {
        self.by_name.read().get(name).cloned()
    }

    pub fn by_id(&self, id: EntryId) -> Option<Arc<Entry>> {
        self.order.read().get(id.index()).cloned()
    }

    /// Whether any registered entry renders from this template source.
    ///
    /// Several entries may share one source with different data, so this
    /// is a membership test, not a reverse lookup.
    pub fn is_entry_source(&self, source: &Path) -> bool {
        self.order.read().iter().any(|e| e.source == source)
    }

    /// All entries in registration order.
    pub fn entries(&self) -> Vec<Arc<Entry>> {
        self.order.read().clone()
    }

    pub fn len(&self) -> usize {
        self.order.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.read().is_empty()
    }

    pub fn clear(&self) {
        self.by_name.write().clear();
        self.order.write().clear();
        self.next_id.store(0, Ordering::Relaxed);
    }
}
