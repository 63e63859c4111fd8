//! Inline registry: which resolved resources are embedded, not emitted.
//!
//! A resource marked inline produces no output file of its own. Styles
//! land in a `<style>` element, scripts in a `<script>` element, and
//! everything else becomes a data URL at the reference site. Data-URL
//! requests found in source are already inline by construction and
//! short-circuit without filesystem resolution.

use parking_lot::RwLock;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

use crate::utils::mime::{self, types};

/// Characters that break an SVG data URL out of an HTML attribute.
const SVG_DATA: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'{')
    .add(b'}')
    .add(b'`');

// ============================================================================
// InlineRegistry
// ============================================================================

/// How a resource came to be inlined, for diagnostics and render decisions.
#[derive(Debug, Clone, Default)]
pub struct InlineMark {
    /// Files that requested the embedding, in discovery order.
    pub issuers: Vec<PathBuf>,
    /// Set when the mark came from an entry template rather than a
    /// transitive import. Sticky once true.
    pub entry_level: bool,
}

/// Session-scoped set of resources to embed instead of emit.
#[derive(Debug, Default)]
pub struct InlineRegistry {
    marks: RwLock<FxHashMap<PathBuf, InlineMark>>,
}

impl InlineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag a resolved resource for embedding.
    ///
    /// Repeated marks accumulate issuers; `entry_level` never downgrades.
    pub fn mark_inline(&self, resolved: &Path, issuer: &Path, entry_level: bool) {
        let mut marks = self.marks.write();
        let mark = marks.entry(resolved.to_path_buf()).or_default();
        if !mark.issuers.iter().any(|i| i == issuer) {
            mark.issuers.push(issuer.to_path_buf());
        }
        mark.entry_level |= entry_level;
    }

    pub fn is_inline(&self, resolved: &Path) -> bool {
        self.marks.read().contains_key(resolved)
    }

    pub fn mark_of(&self, resolved: &Path) -> Option<InlineMark> {
        self.marks.read().get(resolved).cloned()
    }

    /// Recognize a data-URL-form request. Such references are embedded
    /// already and never reach the resolver.
    pub fn is_data_url(raw_request: &str) -> bool {
        raw_request.starts_with("data:")
    }

    pub fn len(&self) -> usize {
        self.marks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.read().is_empty()
    }

    pub fn clear(&self) {
        self.marks.write().clear();
    }
}

// ============================================================================
// Data URLs
// ============================================================================

/// Build a data URL for a resource's content.
///
/// SVG text is kept readable as percent-encoded UTF-8, which is smaller
/// than base64 for markup and lets diffs stay meaningful. Everything
/// else, and SVG that is not valid UTF-8, is base64-encoded.
pub fn data_url(path: &Path, content: &[u8]) -> String {
    let mime = mime::from_path(path);
    if mime == types::SVG
        && let Ok(text) = std::str::from_utf8(content)
    {
        return format!("data:{mime};utf8,{}", utf8_percent_encode(text, SVG_DATA));
    }

    use base64::{Engine as _, engine::general_purpose::STANDARD};
    format!("data:{mime};base64,{}", STANDARD.encode(content))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    #[test]
    fn test_mark_and_query() {
        let registry = InlineRegistry::new();
        assert!(!registry.is_inline(&path("/src/icon.svg")));

        registry.mark_inline(&path("/src/icon.svg"), &path("/src/index.html"), true);
        assert!(registry.is_inline(&path("/src/icon.svg")));
        assert!(!registry.is_inline(&path("/src/other.svg")));

        let mark = registry.mark_of(&path("/src/icon.svg")).unwrap();
        assert_eq!(mark.issuers, vec![path("/src/index.html")]);
        assert!(mark.entry_level);
    }

    #[test]
    fn test_marks_accumulate_issuers() {
        let registry = InlineRegistry::new();
        registry.mark_inline(&path("/src/a.css"), &path("/src/index.html"), false);
        registry.mark_inline(&path("/src/a.css"), &path("/src/about.html"), false);
        registry.mark_inline(&path("/src/a.css"), &path("/src/index.html"), false);

        let mark = registry.mark_of(&path("/src/a.css")).unwrap();
        assert_eq!(mark.issuers.len(), 2);
        assert!(!mark.entry_level);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_entry_level_is_sticky() {
        let registry = InlineRegistry::new();
        registry.mark_inline(&path("/src/a.css"), &path("/src/index.html"), true);
        registry.mark_inline(&path("/src/a.css"), &path("/src/deep.js"), false);
        assert!(registry.mark_of(&path("/src/a.css")).unwrap().entry_level);
    }

    #[test]
    fn test_is_data_url() {
        assert!(InlineRegistry::is_data_url("data:image/png;base64,iVBOR"));
        assert!(InlineRegistry::is_data_url("data:,plain"));
        assert!(!InlineRegistry::is_data_url("./logo.png"));
        assert!(!InlineRegistry::is_data_url("https://cdn.test/logo.png"));
    }

    #[test]
    fn test_clear() {
        let registry = InlineRegistry::new();
        registry.mark_inline(&path("/src/a.css"), &path("/src/index.html"), false);
        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_svg_data_url_stays_utf8() {
        let url = data_url(&path("icon.svg"), b"<svg viewBox=\"0 0 4 4\"></svg>");
        assert!(url.starts_with("data:image/svg+xml;utf8,"));
        assert!(url.contains("%3Csvg"));
        assert!(url.contains("%220%200%204%204%22"));
        assert!(!url.contains('<'));
        assert!(!url.contains('"'));
    }

    #[test]
    fn test_binary_data_url_is_base64() {
        let url = data_url(&path("pixel.png"), &[0x89, 0x50, 0x4e, 0x47]);
        assert_eq!(url, "data:image/png;base64,iVBORw==");
    }

    #[test]
    fn test_invalid_utf8_svg_falls_back_to_base64() {
        let url = data_url(&path("broken.svg"), &[0xff, 0xfe, 0x00]);
        assert!(url.starts_with("data:image/svg+xml;base64,"));
    }
}
