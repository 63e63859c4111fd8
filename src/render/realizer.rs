//! The realizer: pure substitution from IR segments to final text.
//!
//! One realizer serves one entry. References resolve through the
//! session resolver with the entry as context, so a failure names the
//! entry and file it came from. Substitution output depends on the
//! dialect: template references become paths relative to the entry's
//! own output, style fragment references stay root-relative so the
//! squash pass can relativize them against the bundle's final location.
//! Everything the realizer decides to emit lands in the manifest, never
//! directly in the output.

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::BundlerOptions;
use crate::entry::{Entry, EntryRegistry, PathContext};
use crate::error::{BuildError, DiagnosticSink};
use crate::graph::{AssetCollection, AssetRecord};
use crate::inline::{self, InlineRegistry};
use crate::output::OutputRegistry;
use crate::render::ModuleStore;
use crate::render::ir::{IrDialect, IrModule, IrSegment};
use crate::render::manifest::{RenderManifest, RenderTask};
use crate::render::squash::rewrite_css_urls;
use crate::resolve::{AssetKind, RawRequest, ResolveContext, ResolvedReference, Resolver};
use crate::trash::{self, TrashRegistry};
use crate::utils::hash::{self, hash_bytes, hash_file};
use crate::utils::path::{output_relative, to_posix};

/// Delimits inline embed markers until the tag swap pass replaces them.
const INLINE_MARK: char = '\u{1}';

/// Borrowed view of the session services realization touches.
#[derive(Clone, Copy)]
pub struct RealizeEnv<'a> {
    pub entries: &'a EntryRegistry,
    pub resolver: &'a Resolver,
    pub collection: &'a AssetCollection,
    pub inline: &'a InlineRegistry,
    pub outputs: &'a OutputRegistry,
    pub modules: &'a ModuleStore,
    pub trash: &'a TrashRegistry,
    pub options: &'a BundlerOptions,
    pub sink: &'a DiagnosticSink,
}

/// A realized style fragment: clean text plus any attribution banners
/// that were split out of it.
#[derive(Debug, Clone)]
pub struct StyleContent {
    pub css: String,
    pub banners: Vec<String>,
}

enum Substitution {
    /// Text to place at the reference site.
    Verbatim(String),
    /// Marker now, whole-tag replacement after the segment walk.
    Embed { marker: String, element: String },
}

/// Path context an entry's filename template is evaluated against.
///
/// Runs before rendering, so the content hash is the template source's,
/// not the rendered page's. The result is memoized on the entry either
/// way, which keeps the name stable for everything that links to it.
pub fn entry_path_context(entry: &Entry) -> PathContext {
    PathContext::new(
        &entry.source,
        entry.name.clone(),
        "html",
        hash_file(&entry.source),
    )
}

/// Per-entry realization state.
pub struct Realizer<'a> {
    env: RealizeEnv<'a>,
    entry: &'a Entry,
    entry_output: String,
    /// Styles currently being realized, to refuse circular url() chains.
    in_flight: Mutex<FxHashSet<PathBuf>>,
    /// Fragments realized once per entry.
    realized_styles: Mutex<FxHashMap<PathBuf, StyleContent>>,
}

impl<'a> Realizer<'a> {
    pub fn new(env: RealizeEnv<'a>, entry: &'a Entry) -> Self {
        let entry_output = entry
            .resolved_filename(&entry_path_context(entry))
            .to_string();
        Self {
            env,
            entry,
            entry_output,
            in_flight: Mutex::new(FxHashSet::default()),
            realized_styles: Mutex::new(FxHashMap::default()),
        }
    }

    pub fn env(&self) -> RealizeEnv<'a> {
        self.env
    }

    pub fn entry(&self) -> &Entry {
        self.entry
    }

    /// The entry's output path, fixed before rendering starts.
    pub fn entry_output(&self) -> &str {
        &self.entry_output
    }

    // ========================================================================
    // Template realization
    // ========================================================================

    /// Realize the entry's template module into page text.
    ///
    /// Referenced assets are materialized on the way: claimed in the
    /// output registry and pushed onto the manifest when they carry
    /// fresh content.
    pub fn realize_template(
        &self,
        module: &IrModule,
        manifest: &mut RenderManifest,
    ) -> Result<String, BuildError> {
        self.realize_segments(module, manifest)
            .map_err(|cause| self.env.sink.wrap_compilation(&module.source, cause))
    }

    fn realize_segments(
        &self,
        module: &IrModule,
        manifest: &mut RenderManifest,
    ) -> Result<String, BuildError> {
        let mut text = String::new();
        let mut embeds: Vec<(String, String)> = Vec::new();

        for segment in &module.segments {
            match segment {
                IrSegment::Text(run) => text.push_str(run),
                IrSegment::Data { key } => text.push_str(&self.data_value(key)),
                IrSegment::Reference { request, kind } => {
                    match self.substitute(request, *kind, &module.source, module.dialect, manifest)? {
                        Substitution::Verbatim(value) => text.push_str(&value),
                        Substitution::Embed { marker, element } => {
                            text.push(INLINE_MARK);
                            text.push_str(&marker);
                            text.push(INLINE_MARK);
                            embeds.push((marker, element));
                        }
                    }
                }
            }
        }

        for (marker, element) in embeds {
            text = swap_enclosing_tag(&text, &marker, &element);
        }
        Ok(text)
    }

    fn data_value(&self, key: &str) -> String {
        match self.entry.data.get(key) {
            Some(serde_json::Value::String(value)) => value.clone(),
            Some(value) => value.to_string(),
            None => {
                crate::debug!("render"; "entry `{}` has no data value `{}`", self.entry.name, key);
                String::new()
            }
        }
    }

    // ========================================================================
    // Reference substitution
    // ========================================================================

    fn substitute(
        &self,
        raw: &str,
        kind_hint: Option<AssetKind>,
        issuer: &Path,
        dialect: IrDialect,
        manifest: &mut RenderManifest,
    ) -> Result<Substitution, BuildError> {
        let request = RawRequest::parse(raw);
        if request.is_data_url() || request.is_external() {
            return Ok(Substitution::Verbatim(raw.to_string()));
        }

        let mut cx = ResolveContext::new(issuer, &self.entry.name).issuer_kind(self.issuer_kind(issuer));
        if let Some(kind) = kind_hint {
            cx = cx.expected(kind);
        }
        let reference = self.env.resolver.resolve(raw, &cx)?;
        let path = reference.path().to_path_buf();
        self.ensure_recorded(raw, &reference, issuer);

        let inlined = reference.is_inline() || self.env.inline.is_inline(&path);
        if inlined && !matches!(reference.kind(), AssetKind::Template | AssetKind::UrlResource) {
            self.env
                .inline
                .mark_inline(&path, issuer, issuer == self.entry.source);
            return self.substitute_inline(&reference, dialect, manifest);
        }

        let output = match reference.kind() {
            AssetKind::Template => {
                return Ok(Substitution::Verbatim(self.entry_link(&path, raw)));
            }
            AssetKind::Style => self.materialize_style(&path, manifest)?,
            AssetKind::Script => self.materialize_script(&path, manifest)?,
            AssetKind::Resource | AssetKind::UrlResource => {
                self.materialize_resource(&path, manifest)?
            }
        };
        Ok(Substitution::Verbatim(self.target_path(dialect, &output)))
    }

    /// How a substituted output path is written at the reference site.
    fn target_path(&self, dialect: IrDialect, output: &str) -> String {
        match dialect {
            // Relative to the page that will contain it
            IrDialect::Template => output_relative(&self.entry_output, output),
            // Root-relative until the owning bundle knows its location
            IrDialect::StyleModule => format!("/{output}"),
        }
    }

    fn issuer_kind(&self, issuer: &Path) -> AssetKind {
        if issuer == self.entry.source {
            return AssetKind::Template;
        }
        self.env
            .collection
            .kind_of(issuer)
            .unwrap_or_else(|| AssetKind::from_path(issuer))
    }

    fn ensure_recorded(&self, raw: &str, reference: &ResolvedReference, issuer: &Path) {
        let path = reference.path();
        if self.env.collection.find_record(self.entry.id, path).is_some() {
            return;
        }
        self.env.collection.record_asset(AssetRecord::new(
            raw,
            path,
            reference.kind(),
            reference.is_inline(),
            self.entry.id,
            issuer,
            hash_file(path),
        ));
    }

    fn substitute_inline(
        &self,
        reference: &ResolvedReference,
        dialect: IrDialect,
        manifest: &mut RenderManifest,
    ) -> Result<Substitution, BuildError> {
        let path = reference.path();
        match reference.kind() {
            AssetKind::Resource | AssetKind::UrlResource => {
                let bytes =
                    fs::read(path).map_err(|e| BuildError::Io(path.to_path_buf(), e))?;
                Ok(Substitution::Verbatim(inline::data_url(path, &bytes)))
            }
            AssetKind::Style if dialect == IrDialect::Template => {
                let content = self.realize_style_content(path, manifest)?;
                let css = rewrite_css_urls(&content.css, &self.entry_output, self.env.outputs);
                Ok(Substitution::Embed {
                    marker: hash::fingerprint(&to_posix(path)),
                    element: format!("<style>{css}</style>"),
                })
            }
            AssetKind::Script if dialect == IrDialect::Template => {
                let js = self.built_text(path)?;
                Ok(Substitution::Embed {
                    marker: hash::fingerprint(&to_posix(path)),
                    element: format!("<script>{js}</script>"),
                })
            }
            kind => {
                // Style fragments can't host an embedded element
                crate::debug!(
                    "render";
                    "can't embed {:?} `{}` here, keeping the reference",
                    kind,
                    path.display()
                );
                Ok(Substitution::Verbatim(
                    RawRequest::parse(&to_posix(path)).path().to_string(),
                ))
            }
        }
    }

    /// Relative link to another entry's page.
    fn entry_link(&self, path: &Path, raw: &str) -> String {
        for other in self.env.entries.entries() {
            if other.source == path {
                let target = other.resolved_filename(&entry_path_context(&other)).to_string();
                return output_relative(&self.entry_output, &target);
            }
        }
        crate::debug!(
            "render";
            "template `{}` referenced from `{}` is not an entry",
            path.display(),
            self.entry.name
        );
        RawRequest::parse(raw).path().to_string()
    }

    // ========================================================================
    // Materialization
    // ========================================================================

    /// Output path for a style file, realizing and scheduling its
    /// content on first use.
    fn materialize_style(
        &self,
        path: &Path,
        manifest: &mut RenderManifest,
    ) -> Result<String, BuildError> {
        if let Some(output) = self.env.outputs.output_for(path) {
            self.env.collection.assign_output(self.entry.id, path, &output);
            return Ok(output);
        }

        let content = self.realize_style_content(path, manifest)?;
        let hash = hash_bytes(&content.css);
        let cx = PathContext::for_asset(path, AssetKind::Style.output_extension(path), hash);
        let desired = self.env.options.filename_for(AssetKind::Style).render(&cx);

        let claimed = self.env.outputs.claim(&desired, path, hash)?;
        let output = claimed.path().to_string();
        if claimed.needs_emission() {
            let css = rewrite_css_urls(&content.css, &output, self.env.outputs);
            let css = self.apply_extract_hook(css, path);
            manifest.push(RenderTask::text(output.clone(), output.clone(), hash, css));
            self.schedule_license(&output, &content.banners, manifest);
        }
        self.env.collection.assign_output(self.entry.id, path, &output);
        Ok(output)
    }

    /// Output path for a script, scheduling its built text on first use.
    fn materialize_script(
        &self,
        path: &Path,
        manifest: &mut RenderManifest,
    ) -> Result<String, BuildError> {
        if let Some(output) = self.env.outputs.output_for(path) {
            self.env.collection.assign_output(self.entry.id, path, &output);
            return Ok(output);
        }

        let js = self.built_text(path)?;
        let hash = hash_bytes(&js);
        let cx = PathContext::for_asset(path, AssetKind::Script.output_extension(path), hash);
        let desired = self.env.options.filename_for(AssetKind::Script).render(&cx);

        let claimed = self.env.outputs.claim(&desired, path, hash)?;
        let output = claimed.path().to_string();
        if claimed.needs_emission() {
            manifest.push(RenderTask::text(output.clone(), output.clone(), hash, js));
        }
        self.env.collection.assign_output(self.entry.id, path, &output);
        Ok(output)
    }

    /// Output path for a copied resource.
    fn materialize_resource(
        &self,
        path: &Path,
        manifest: &mut RenderManifest,
    ) -> Result<String, BuildError> {
        if let Some(output) = self.env.outputs.output_for(path) {
            self.env.collection.assign_output(self.entry.id, path, &output);
            return Ok(output);
        }

        let hash = hash_file(path);
        let ext = AssetKind::Resource.output_extension(path);
        let cx = PathContext::for_asset(path, ext, hash);
        let desired = self
            .env
            .options
            .filename_for(AssetKind::Resource)
            .render(&cx);

        let claimed = self.env.outputs.claim(&desired, path, hash)?;
        let output = claimed.path().to_string();
        if claimed.needs_emission() {
            manifest.push(RenderTask::copy(output.clone(), output.clone(), hash, path));
        }
        self.env.collection.assign_output(self.entry.id, path, &output);
        Ok(output)
    }

    // ========================================================================
    // Style fragments
    // ========================================================================

    /// Realized content of one style file, memoized per entry.
    ///
    /// Attribution banners are split off so bundles stay clean; whether
    /// they come back as a `.LICENSE.txt` is decided at emission.
    pub fn realize_style_content(
        &self,
        path: &Path,
        manifest: &mut RenderManifest,
    ) -> Result<StyleContent, BuildError> {
        if let Some(content) = self.realized_styles.lock().get(path) {
            return Ok(content.clone());
        }
        if !self.in_flight.lock().insert(path.to_path_buf()) {
            return Err(BuildError::Resolution {
                request: format!("{} (circular style import)", path.display()),
                issuer: path.to_path_buf(),
                entry: self.entry.name.clone(),
            });
        }

        let result = self.realize_style_inner(path, manifest);

        self.in_flight.lock().remove(path);
        if let Ok(content) = &result {
            self.realized_styles
                .lock()
                .insert(path.to_path_buf(), content.clone());
        }
        result
    }

    fn realize_style_inner(
        &self,
        path: &Path,
        manifest: &mut RenderManifest,
    ) -> Result<StyleContent, BuildError> {
        let module = match self.env.modules.get(path) {
            Some(module) => module,
            // Style never went through the build phase: take it verbatim
            None => IrModule::plain_text(
                path,
                IrDialect::StyleModule,
                fs::read_to_string(path).map_err(|e| BuildError::Io(path.to_path_buf(), e))?,
            ),
        };
        let realized = self.realize_segments(&module, manifest)?;
        let (css, banners) = trash::strip_attribution_comments(&realized);
        Ok(StyleContent {
            css: css.into_owned(),
            banners,
        })
    }

    /// Pass an emitted style through the extract hook, if configured.
    /// The entry's own hook wins over the session-wide one.
    pub fn apply_extract_hook(&self, css: String, source: &Path) -> String {
        let hook = self
            .entry
            .extract
            .as_ref()
            .or(self.env.options.extract.as_ref());
        match hook {
            Some(hook) => hook(&css, source).unwrap_or(css),
            None => css,
        }
    }

    /// Emit or trash the attribution file that belongs to an output.
    pub fn schedule_license(
        &self,
        output: &str,
        banners: &[String],
        manifest: &mut RenderManifest,
    ) {
        if banners.is_empty() {
            return;
        }
        let license = trash::license_file_path(output);
        if self.env.options.keep_attribution_files {
            let text = format!("{}\n", banners.join("\n\n"));
            let hash = hash_bytes(&text);
            manifest.push(RenderTask::text(license.clone(), license, hash, text));
        } else {
            // A previous pass may have emitted one; make sure it goes
            self.env.trash.stage(license);
        }
    }

    /// Text of a script or other host-built file.
    fn built_text(&self, path: &Path) -> Result<String, BuildError> {
        if let Some(module) = self.env.modules.get(path) {
            let mut text = String::new();
            for segment in &module.segments {
                if let IrSegment::Text(run) = segment {
                    text.push_str(run);
                }
            }
            return Ok(text);
        }
        fs::read_to_string(path).map_err(|e| BuildError::Io(path.to_path_buf(), e))
    }
}

/// Replace the tag containing an inline marker with a whole element.
///
/// The marker sits where an attribute value was, so the enclosing
/// `<link ...>` or `<script ...></script>` span is swapped out. If the
/// marker is not inside an open tag the marker alone is replaced.
fn swap_enclosing_tag(text: &str, marker: &str, element: &str) -> String {
    let token = format!("{INLINE_MARK}{marker}{INLINE_MARK}");
    let Some(at) = text.find(&token) else {
        return text.to_string();
    };

    let open = text[..at].rfind('<');
    let close = text[at + token.len()..]
        .find('>')
        .map(|i| at + token.len() + i);
    if let (Some(start), Some(end)) = (open, close)
        && !text[start..at].contains('>')
    {
        let mut rest = &text[end + 1..];
        // An empty <script src=...></script> loses its close tag too
        if text[start + 1..].starts_with("script")
            && let Some(stripped) = rest.trim_start().strip_prefix("</script>")
        {
            rest = stripped;
        }
        return format!("{}{}{}", &text[..start], element, rest);
    }
    text.replacen(&token, element, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_enclosing_tag() {
        let text = format!(
            "<head><link rel=\"stylesheet\" href=\"{INLINE_MARK}abcd1234{INLINE_MARK}\"></head>"
        );
        let swapped = swap_enclosing_tag(&text, "abcd1234", "<style>body{}</style>");
        assert_eq!(swapped, "<head><style>body{}</style></head>");
    }

    #[test]
    fn test_swap_outside_tag_falls_back() {
        let text = format!("<p>before</p>{INLINE_MARK}abcd1234{INLINE_MARK}<p>after</p>");
        let swapped = swap_enclosing_tag(&text, "abcd1234", "<script>x()</script>");
        assert_eq!(swapped, "<p>before</p><script>x()</script><p>after</p>");
    }

    #[test]
    fn test_swap_script_consumes_close_tag() {
        let text = format!("<body><script src=\"{INLINE_MARK}aa{INLINE_MARK}\"></script></body>");
        let swapped = swap_enclosing_tag(&text, "aa", "<script>x()</script>");
        assert_eq!(swapped, "<body><script>x()</script></body>");
    }

    #[test]
    fn test_swap_repeated_marker() {
        let text = format!(
            "<link href=\"{INLINE_MARK}aa{INLINE_MARK}\"><link href=\"{INLINE_MARK}aa{INLINE_MARK}\">"
        );
        let once = swap_enclosing_tag(&text, "aa", "<style>a{}</style>");
        let twice = swap_enclosing_tag(&once, "aa", "<style>a{}</style>");
        assert_eq!(twice, "<style>a{}</style><style>a{}</style>");
    }
}
