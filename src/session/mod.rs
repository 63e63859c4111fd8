//! Build session orchestration.
//!
//! A session owns every registry for exactly one build pass and drives
//! them through the fixed phase order:
//!
//! ```text
//! Resolve -> Build -> Render -> PostProcess -> Done
//! ```
//!
//! The host calls the phase operations in that order; calling one out
//! of turn is a [`BuildError::Config`]. Nothing is written until
//! [`BuildSession::finish`]: render and post-process only fill the
//! manifest, so [`BuildSession::abort`] can drop a half-done pass
//! without leaving files behind. Watch hosts run passes back to back by
//! creating a fresh session once the previous one reached `Done`.

#[cfg(test)]
mod tests;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::{BundlerOptions, PostprocessInfo};
use crate::entry::{Entry, EntryOptions, EntryRegistry};
use crate::error::{BuildError, DiagnosticSink, DuplicateWarning, error_overlay_page};
use crate::graph::{AssetCollection, AssetRecord};
use crate::host::{AssetEmitter, FsModuleResolver, ModuleResolver};
use crate::inline::InlineRegistry;
use crate::logger;
use crate::output::OutputRegistry;
use crate::render::{
    IrModule, ModuleStore, RealizeEnv, Realizer, RenderManifest, RenderTask, entry_path_context,
    squash_imports,
};
use crate::resolve::{AssetKind, RawRequest, ResolveContext, ResolvedReference, Resolver};
use crate::scan::SourceHit;
use crate::trash::TrashRegistry;
use crate::utils::hash::{self, hash_bytes, hash_file};
use crate::utils::html::{self, inject_before_end_head};
use crate::utils::path::{output_relative, to_posix};

// ============================================================================
// Phase
// ============================================================================

/// Where a session stands in its fixed lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Resolve,
    Build,
    Render,
    PostProcess,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resolve => "resolve",
            Self::Build => "build",
            Self::Render => "render",
            Self::PostProcess => "post-process",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// A rendered page waiting for its post-process hook.
struct PendingPage {
    entry: Arc<Entry>,
    output: String,
    html: String,
    /// Error overlay standing in for a failed entry; bypasses the
    /// post-process hook.
    overlay: bool,
}

// ============================================================================
// BuildSession
// ============================================================================

/// One build pass over the registered entries.
pub struct BuildSession {
    root: PathBuf,
    options: BundlerOptions,
    watch: bool,
    phase: Phase,

    entries: EntryRegistry,
    resolver: Resolver,
    collection: AssetCollection,
    inline: InlineRegistry,
    outputs: OutputRegistry,
    trash: TrashRegistry,
    modules: ModuleStore,
    sink: DiagnosticSink,

    manifest: RenderManifest,
    pending: Vec<PendingPage>,
    import_counter: AtomicU64,
    emitter: Arc<dyn AssetEmitter>,
}

impl BuildSession {
    /// Open a session over `root` with filesystem module resolution.
    pub fn new(
        root: impl Into<PathBuf>,
        options: BundlerOptions,
        emitter: Arc<dyn AssetEmitter>,
    ) -> Result<Self, BuildError> {
        let root = root.into();
        let basedir = options.basedir.clone().unwrap_or_else(|| root.clone());
        let modules = Arc::new(FsModuleResolver::new(basedir));
        Self::with_resolver(root, options, modules, emitter)
    }

    /// Open a session with a host-supplied module resolver.
    pub fn with_resolver(
        root: impl Into<PathBuf>,
        options: BundlerOptions,
        modules: Arc<dyn ModuleResolver>,
        emitter: Arc<dyn AssetEmitter>,
    ) -> Result<Self, BuildError> {
        options.validate()?;
        Ok(Self {
            root: root.into(),
            resolver: Resolver::new(modules, options.inline),
            outputs: OutputRegistry::new(options.collision_policy),
            options,
            watch: false,
            phase: Phase::Resolve,
            entries: EntryRegistry::new(),
            collection: AssetCollection::new(),
            inline: InlineRegistry::new(),
            trash: TrashRegistry::new(),
            modules: ModuleStore::new(),
            sink: DiagnosticSink::new(),
            manifest: RenderManifest::new(),
            pending: Vec::new(),
            import_counter: AtomicU64::new(0),
            emitter,
        })
    }

    /// Mark this session as part of a watch run.
    ///
    /// Watch sessions replace the page of a failed entry with an error
    /// overlay, so the browser shows the failure instead of a stale
    /// page. Reruns are separate sessions either way.
    pub fn set_watch(&mut self, watch: bool) {
        self.watch = watch;
    }

    pub fn is_watch(&self) -> bool {
        self.watch
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &BundlerOptions {
        &self.options
    }

    pub fn entries(&self) -> &EntryRegistry {
        &self.entries
    }

    pub fn collection(&self) -> &AssetCollection {
        &self.collection
    }

    pub fn inline(&self) -> &InlineRegistry {
        &self.inline
    }

    pub fn outputs(&self) -> &OutputRegistry {
        &self.outputs
    }

    pub fn trash(&self) -> &TrashRegistry {
        &self.trash
    }

    pub fn modules(&self) -> &ModuleStore {
        &self.modules
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn sink(&self) -> &DiagnosticSink {
        &self.sink
    }

    pub fn manifest(&self) -> &RenderManifest {
        &self.manifest
    }

    fn expect_phase(&self, want: Phase) -> Result<(), BuildError> {
        if self.phase == want {
            return Ok(());
        }
        Err(BuildError::Config(format!(
            "session is in the {} phase; this operation belongs to {}",
            self.phase, want
        )))
    }

    fn advance(&mut self, from: Phase, to: Phase) -> Result<(), BuildError> {
        self.expect_phase(from)?;
        crate::debug!("session"; "{from} -> {to}");
        self.phase = to;
        Ok(())
    }

    // ========================================================================
    // Resolve phase
    // ========================================================================

    /// Register a page entry.
    ///
    /// The output filename template falls back to the session-wide one
    /// when the entry does not carry its own.
    pub fn add_entry(
        &self,
        name: &str,
        source: impl Into<PathBuf>,
        options: EntryOptions,
    ) -> Result<Arc<Entry>, BuildError> {
        self.expect_phase(Phase::Resolve)?;
        let source = source.into();
        let options = match options.template {
            Some(_) => options,
            None => options.with_template(self.options.template_filename.clone()),
        };
        let entry = self.entries.register(name, &source, options)?;
        self.collection.add_entry(entry.id, &entry.source);
        crate::debug!("session"; "entry `{}` <- {}", entry.name, entry.source.display());
        Ok(entry)
    }

    /// Resolve one scanner hit for an entry.
    ///
    /// Hits outside the configured source table return `Ok(None)` and
    /// are left as written, exactly like external and `data:` values.
    pub fn resolve_hit(
        &self,
        entry_name: &str,
        hit: &SourceHit,
    ) -> Result<Option<ResolvedReference>, BuildError> {
        if !self.options.sources.accepts(hit) {
            return Ok(None);
        }
        let entry = self.lookup_entry(entry_name)?;
        let expected = expected_kind(&hit.tag, &hit.attribute);
        self.resolve_for(&entry, &hit.value, &entry.source, expected)
    }

    /// Resolve a raw request from an issuing file within an entry's graph.
    ///
    /// This is the resolve-phase workhorse: it memoizes through the
    /// resolver, appends the asset record in discovery order, flags the
    /// repeat as a duplicate warning, registers inline marks and
    /// promotes referenced scripts to dynamic build targets. `data:`
    /// and external requests short-circuit to `Ok(None)`.
    pub fn resolve_reference(
        &self,
        entry_name: &str,
        raw_request: &str,
        issuer: &Path,
        expected: Option<AssetKind>,
    ) -> Result<Option<ResolvedReference>, BuildError> {
        let entry = self.lookup_entry(entry_name)?;
        self.resolve_for(&entry, raw_request, issuer, expected)
    }

    fn lookup_entry(&self, name: &str) -> Result<Arc<Entry>, BuildError> {
        self.entries
            .get(name)
            .ok_or_else(|| BuildError::Config(format!("unknown entry `{name}`")))
    }

    fn resolve_for(
        &self,
        entry: &Entry,
        raw_request: &str,
        issuer: &Path,
        expected: Option<AssetKind>,
    ) -> Result<Option<ResolvedReference>, BuildError> {
        self.expect_phase(Phase::Resolve)?;
        let request = RawRequest::parse(raw_request);
        if request.is_data_url() || request.is_external() {
            return Ok(None);
        }

        let issuer_kind = if issuer == entry.source {
            AssetKind::Template
        } else {
            self.collection
                .kind_of(issuer)
                .unwrap_or_else(|| AssetKind::from_path(issuer))
        };
        let mut cx = ResolveContext::new(issuer, &entry.name).issuer_kind(issuer_kind);
        if let Some(kind) = expected {
            cx = cx.expected(kind);
        }

        let reference = self.resolver.resolve(raw_request, &cx)?;
        let path = reference.path();

        let recorded = self.collection.record_asset(AssetRecord::new(
            raw_request,
            path,
            reference.kind(),
            reference.is_inline(),
            entry.id,
            issuer,
            hash_file(path),
        ));
        if !recorded {
            self.sink.warn_duplicate(DuplicateWarning {
                entry: entry.name.clone(),
                request: raw_request.to_string(),
                resolved: path.to_path_buf(),
            });
        }

        if reference.is_inline() {
            self.inline
                .mark_inline(path, issuer, issuer == entry.source);
        } else if reference.kind() == AssetKind::Script && issuer_kind == AssetKind::Template {
            self.promote_script(path)?;
        }
        Ok(Some(reference))
    }

    /// Make a referenced script a first-class build target.
    ///
    /// The host's build phase walks dynamic entries to know what to
    /// compile; they never render a page of their own.
    fn promote_script(&self, path: &Path) -> Result<(), BuildError> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("script");
        let name = match self.entries.get(stem) {
            // The stem is taken by a different file; pick a unique name
            Some(existing) if existing.source != path => {
                format!("{stem}-{}", hash::fingerprint(&to_posix(path)))
            }
            _ => stem.to_string(),
        };
        if self.entries.add_dynamic_entry(&name, path, EntryOptions::new())? {
            crate::debug!("session"; "dynamic entry `{name}` <- {}", path.display());
        }
        Ok(())
    }

    pub fn start_build(&mut self) -> Result<(), BuildError> {
        self.advance(Phase::Resolve, Phase::Build)
    }

    // ========================================================================
    // Build phase
    // ========================================================================

    /// Accept a built module from the host.
    pub fn add_module(&self, module: IrModule) -> Result<(), BuildError> {
        self.expect_phase(Phase::Build)?;
        crate::debug!("session"; "module {}", module.source.display());
        self.modules.add(module);
        Ok(())
    }

    // ========================================================================
    // Render phase
    // ========================================================================

    /// Realize every page entry into the pending buffer.
    ///
    /// A failure aborts only the entry it belongs to; the error lands in
    /// the sink and the remaining entries still render.
    pub fn render(&mut self) -> Result<(), BuildError> {
        self.advance(Phase::Build, Phase::Render)?;

        for entry in self.entries.entries() {
            // Dynamic script targets are built by the host, not rendered
            if AssetKind::from_path(&entry.source) != AssetKind::Template {
                continue;
            }
            let env = RealizeEnv {
                entries: &self.entries,
                resolver: &self.resolver,
                collection: &self.collection,
                inline: &self.inline,
                outputs: &self.outputs,
                modules: &self.modules,
                trash: &self.trash,
                options: &self.options,
                sink: &self.sink,
            };
            if let Err(error) = render_entry(env, &entry, &mut self.manifest, &mut self.pending, &self.import_counter)
            {
                let message = error.to_string();
                self.sink.report(error);
                if self.watch {
                    self.pending.push(PendingPage {
                        output: entry
                            .resolved_filename(&entry_path_context(&entry))
                            .to_string(),
                        entry,
                        html: error_overlay_page(&message),
                        overlay: true,
                    });
                }
            }
        }
        crate::debug!(
            "session";
            "rendered {} page(s), {} manifest task(s)",
            self.pending.len(),
            self.manifest.len()
        );
        Ok(())
    }

    // ========================================================================
    // Post-process phase
    // ========================================================================

    /// Run the post-process hook over every rendered page and schedule
    /// the survivors for emission. An entry's own hook wins over the
    /// session-wide one.
    pub fn post_process(&mut self) -> Result<(), BuildError> {
        self.advance(Phase::Render, Phase::PostProcess)?;

        for page in std::mem::take(&mut self.pending) {
            let hook = page
                .entry
                .postprocess
                .as_ref()
                .or(self.options.postprocess.as_ref());
            let html = match hook {
                Some(_) if page.overlay => page.html,
                Some(hook) => {
                    let info = PostprocessInfo {
                        entry: page.entry.name.clone(),
                        source: page.entry.source.clone(),
                        output: page.output.clone(),
                        verbose: page.entry.verbose || self.options.verbose,
                    };
                    match hook(page.html, &info) {
                        Ok(html) => html,
                        Err(message) => {
                            self.sink.report(BuildError::Postprocess {
                                entry: page.entry.name.clone(),
                                message,
                            });
                            continue;
                        }
                    }
                }
                None => page.html,
            };

            let hash = hash_bytes(&html);
            match self.outputs.claim(&page.output, &page.entry.source, hash) {
                Ok(claimed) if claimed.needs_emission() => {
                    self.manifest.push(RenderTask::text(
                        claimed.path().to_string(),
                        claimed.path().to_string(),
                        hash,
                        html,
                    ));
                }
                Ok(_) => {}
                Err(error) => self.sink.report(error),
            }
        }
        Ok(())
    }

    // ========================================================================
    // Session end
    // ========================================================================

    /// Emit everything scheduled, flush the trash, drain diagnostics and
    /// tear the session down.
    ///
    /// Entries that failed along the way were never scheduled, so their
    /// files are not written; everything else is. The drained errors
    /// come back as one [`BuildError::Diagnostics`].
    pub fn finish(&mut self) -> Result<(), BuildError> {
        self.advance(Phase::PostProcess, Phase::Done)?;

        crate::debug_do! {
            for task in self.manifest.tasks() {
                crate::log!("emit"; "{} ({})", task.filename, task.identifier);
            }
        }
        if let Err(error) = self.manifest.emit_all(&*self.emitter) {
            self.sink.report(error);
        }
        if let Err(error) = self.trash.flush(&*self.emitter) {
            self.sink.report(error);
        }

        let emitted = self.manifest.len();
        let warnings = self.sink.warning_count();
        crate::debug!("session"; "emitted {emitted} file(s), {warnings} warning(s)");

        let result = self.sink.flush();
        if self.watch {
            match &result {
                Err(error) => logger::status_error("rebuild failed", &error.to_string()),
                Ok(()) if warnings > 0 => logger::status_warning(&format!(
                    "rebuilt {emitted} file(s), {warnings} warning(s)"
                )),
                Ok(()) if emitted == 0 => logger::status_unchanged("no output changes"),
                Ok(()) => logger::status_success(&format!("rebuilt {emitted} file(s)")),
            }
        }
        self.teardown();
        result
    }

    /// Drop the pass without writing anything.
    pub fn abort(&mut self) {
        crate::debug!("session"; "aborted in the {} phase", self.phase);
        self.phase = Phase::Done;
        self.sink.clear();
        self.teardown();
    }

    fn teardown(&mut self) {
        self.entries.clear();
        self.resolver.clear();
        self.collection.clear();
        self.inline.clear();
        self.outputs.clear();
        self.trash.clear();
        self.modules.clear();
        self.manifest.clear();
        self.pending.clear();
        self.import_counter.store(0, Ordering::Relaxed);
    }
}

// ============================================================================
// Entry rendering
// ============================================================================

/// Realize one entry: template text, squashed style bundles, head links.
fn render_entry(
    env: RealizeEnv<'_>,
    entry: &Arc<Entry>,
    manifest: &mut RenderManifest,
    pending: &mut Vec<PendingPage>,
    import_counter: &AtomicU64,
) -> Result<(), BuildError> {
    let module = env.modules.get(&entry.source).ok_or_else(|| {
        env.sink.wrap_compilation(
            &entry.source,
            BuildError::Config(format!("entry `{}` has no built template module", entry.name)),
        )
    })?;

    let realizer = Realizer::new(env, entry);
    let mut html = realizer.realize_template(&module, manifest)?;

    let bundles = squash_imports(&realizer, manifest, import_counter)?;
    for bundle in &bundles {
        let snippet = match &bundle.output {
            Some(output) => format!(
                "<link rel=\"stylesheet\" href=\"{}\">",
                html::escape(&output_relative(realizer.entry_output(), output))
            ),
            None => format!("<style>{}</style>", bundle.content),
        };
        html = inject_before_end_head(&html, &snippet);
    }

    pending.push(PendingPage {
        entry: entry.clone(),
        output: realizer.entry_output().to_string(),
        html,
        overlay: false,
    });
    Ok(())
}

/// Kind a scanner hit's tag promises, when the tag is unambiguous.
///
/// `link href` stays unhinted: the extension separates a stylesheet
/// from a favicon better than the tag does.
fn expected_kind(tag: &str, attribute: &str) -> Option<AssetKind> {
    if tag.eq_ignore_ascii_case("script") && attribute.eq_ignore_ascii_case("src") {
        return Some(AssetKind::Script);
    }
    None
}
