//! Host-facing engine options.
//!
//! Everything a host configures before opening a session: filename
//! templates per output class, the scanner's tag/attribute allow-list,
//! inline defaults, collision policy, and the two user hook slots.
//! Option loading and defaults merging stay on the host side; this
//! module only validates shape.

use crate::entry::FilenameTemplate;
use crate::error::BuildError;
use crate::output::CollisionPolicy;
use crate::resolve::{AssetKind, InlineDefaults};
use crate::scan::SourceTable;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Facts about a rendered entry handed to the postprocess hook.
#[derive(Debug, Clone)]
pub struct PostprocessInfo {
    /// Entry name
    pub entry: String,
    /// Template source file
    pub source: PathBuf,
    /// Output path the text will be emitted to
    pub output: String,
    pub verbose: bool,
}

/// Rewrites rendered entry text before emission.
///
/// Returning `Err` aborts the entry with a postprocess error.
pub type PostprocessHook =
    Arc<dyn Fn(String, &PostprocessInfo) -> Result<String, String> + Send + Sync>;

/// Rewrites an extracted style bundle before emission.
///
/// Returns `Some(replacement)` or `None` to keep the content as built.
pub type ExtractHook = Arc<dyn Fn(&str, &Path) -> Option<String> + Send + Sync>;

/// Engine configuration, fixed for the lifetime of a session.
#[derive(Clone)]
pub struct BundlerOptions {
    /// Filename template for rendered entry pages.
    pub template_filename: FilenameTemplate,

    /// Filename template for emitted style bundles.
    pub style_filename: FilenameTemplate,

    /// Filename template for emitted scripts.
    pub script_filename: FilenameTemplate,

    /// Filename template for copied resources.
    pub resource_filename: FilenameTemplate,

    /// Embed-instead-of-emit defaults per kind; explicit `?inline` flags
    /// on a request always win.
    pub inline: InlineDefaults,

    /// What happens when two different sources claim one output path.
    pub collision_policy: CollisionPolicy,

    /// Tag/attribute allow-list the template scanner feeds through.
    pub sources: SourceTable,

    /// Base directory for root-relative requests. Falls back to the
    /// session root when unset.
    pub basedir: Option<PathBuf>,

    /// Keep `.LICENSE.txt` attribution files next to outputs instead of
    /// staging them for deletion.
    pub keep_attribution_files: bool,

    /// Rewrite hook for rendered entry text.
    pub postprocess: Option<PostprocessHook>,

    /// Rewrite hook for extracted style bundles.
    pub extract: Option<ExtractHook>,

    /// Log per-entry details.
    pub verbose: bool,
}

impl Default for BundlerOptions {
    fn default() -> Self {
        Self {
            template_filename: FilenameTemplate::pattern("[name].html"),
            style_filename: FilenameTemplate::pattern("css/[name].[contenthash:8].css"),
            script_filename: FilenameTemplate::pattern("js/[name].[contenthash:8].js"),
            resource_filename: FilenameTemplate::pattern("assets/[name].[contenthash:8].[ext]"),
            inline: InlineDefaults::default(),
            collision_policy: CollisionPolicy::default(),
            sources: SourceTable::defaults(),
            basedir: None,
            keep_attribution_files: false,
            postprocess: None,
            extract: None,
            verbose: false,
        }
    }
}

impl BundlerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template_filename(mut self, template: impl Into<FilenameTemplate>) -> Self {
        self.template_filename = template.into();
        self
    }

    pub fn with_style_filename(mut self, template: impl Into<FilenameTemplate>) -> Self {
        self.style_filename = template.into();
        self
    }

    pub fn with_script_filename(mut self, template: impl Into<FilenameTemplate>) -> Self {
        self.script_filename = template.into();
        self
    }

    pub fn with_resource_filename(mut self, template: impl Into<FilenameTemplate>) -> Self {
        self.resource_filename = template.into();
        self
    }

    pub fn with_inline(mut self, inline: InlineDefaults) -> Self {
        self.inline = inline;
        self
    }

    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }

    pub fn with_sources(mut self, sources: SourceTable) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_basedir(mut self, basedir: impl Into<PathBuf>) -> Self {
        self.basedir = Some(basedir.into());
        self
    }

    pub fn with_keep_attribution_files(mut self, keep: bool) -> Self {
        self.keep_attribution_files = keep;
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

    /// Filename template for a resolved kind.
    pub fn filename_for(&self, kind: AssetKind) -> &FilenameTemplate {
        match kind {
            AssetKind::Template => &self.template_filename,
            AssetKind::Style => &self.style_filename,
            AssetKind::Script => &self.script_filename,
            AssetKind::Resource | AssetKind::UrlResource => &self.resource_filename,
        }
    }

    /// Reject option shapes a session can't work with.
    pub fn validate(&self) -> Result<(), BuildError> {
        for (label, template) in [
            ("template", &self.template_filename),
            ("style", &self.style_filename),
            ("script", &self.script_filename),
            ("resource", &self.resource_filename),
        ] {
            if let FilenameTemplate::Pattern(pattern) = template
                && pattern.trim().is_empty()
            {
                return Err(BuildError::Config(format!(
                    "{label} filename template is empty"
                )));
            }
        }
        if let Some(basedir) = &self.basedir
            && !basedir.is_absolute()
        {
            return Err(BuildError::Config(format!(
                "basedir `{}` must be absolute",
                basedir.display()
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for BundlerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundlerOptions")
            .field("template_filename", &self.template_filename)
            .field("style_filename", &self.style_filename)
            .field("script_filename", &self.script_filename)
            .field("resource_filename", &self.resource_filename)
            .field("inline", &self.inline)
            .field("collision_policy", &self.collision_policy)
            .field("basedir", &self.basedir)
            .field("keep_attribution_files", &self.keep_attribution_files)
            .field("postprocess", &self.postprocess.as_ref().map(|_| ".."))
            .field("extract", &self.extract.as_ref().map(|_| ".."))
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}
