//! Resolved reference types.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// AssetKind
// ============================================================================

/// What role a resolved file plays in the build.
///
/// Serialized names match the `?as=` override vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    /// Page template, the root of an entry
    Template,
    /// Stylesheet (or a style source compiled to one)
    Style,
    /// Script module
    Script,
    /// Anything else referenced from a document
    Resource,
    /// Resource referenced from inside a stylesheet (`url(...)`)
    #[serde(rename = "url")]
    UrlResource,
}

impl AssetKind {
    /// Infer the kind from a file extension.
    pub fn from_extension(ext: Option<&str>) -> Self {
        match ext {
            Some("html" | "htm") => Self::Template,
            Some("css" | "scss" | "sass" | "less" | "styl") => Self::Style,
            Some("js" | "mjs" | "cjs" | "ts" | "mts" | "cts" | "jsx" | "tsx") => Self::Script,
            _ => Self::Resource,
        }
    }

    /// Infer the kind from a path's extension.
    pub fn from_path(path: &Path) -> Self {
        Self::from_extension(path.extension().and_then(|e| e.to_str()))
    }

    /// Parse an `?as=` override value.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "template" => Some(Self::Template),
            "style" => Some(Self::Style),
            "script" => Some(Self::Script),
            "resource" => Some(Self::Resource),
            "url" => Some(Self::UrlResource),
            _ => None,
        }
    }

    /// The output extension this kind emits with, when it rewrites one.
    ///
    /// Style and script sources compile to `.css` and `.js` whatever
    /// they were authored in; resources keep their source extension.
    pub fn output_extension(self, source: &Path) -> String {
        match self {
            Self::Style => "css".to_string(),
            Self::Script => "js".to_string(),
            Self::Template => "html".to_string(),
            Self::Resource | Self::UrlResource => source
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default()
                .to_string(),
        }
    }
}

// ============================================================================
// ResolvedReference
// ============================================================================

/// A reference resolved to a file on disk, tagged by role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedReference {
    Template {
        path: PathBuf,
    },
    Style {
        path: PathBuf,
        inline: bool,
    },
    Script {
        path: PathBuf,
        inline: bool,
    },
    Resource {
        path: PathBuf,
        inline: bool,
    },
    /// Sub-resource of a stylesheet; always emitted, never inlined
    UrlResource {
        path: PathBuf,
    },
}

impl ResolvedReference {
    /// Build the variant for a kind decision.
    pub fn new(kind: AssetKind, path: PathBuf, inline: bool) -> Self {
        match kind {
            AssetKind::Template => Self::Template { path },
            AssetKind::Style => Self::Style { path, inline },
            AssetKind::Script => Self::Script { path, inline },
            AssetKind::Resource => Self::Resource { path, inline },
            AssetKind::UrlResource => Self::UrlResource { path },
        }
    }

    /// Absolute path of the resolved file, query stripped.
    pub fn path(&self) -> &Path {
        match self {
            Self::Template { path }
            | Self::Style { path, .. }
            | Self::Script { path, .. }
            | Self::Resource { path, .. }
            | Self::UrlResource { path } => path,
        }
    }

    pub const fn kind(&self) -> AssetKind {
        match self {
            Self::Template { .. } => AssetKind::Template,
            Self::Style { .. } => AssetKind::Style,
            Self::Script { .. } => AssetKind::Script,
            Self::Resource { .. } => AssetKind::Resource,
            Self::UrlResource { .. } => AssetKind::UrlResource,
        }
    }

    pub const fn is_inline(&self) -> bool {
        match self {
            Self::Style { inline, .. }
            | Self::Script { inline, .. }
            | Self::Resource { inline, .. } => *inline,
            Self::Template { .. } | Self::UrlResource { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(AssetKind::from_extension(Some("html")), AssetKind::Template);
        assert_eq!(AssetKind::from_extension(Some("css")), AssetKind::Style);
        assert_eq!(AssetKind::from_extension(Some("scss")), AssetKind::Style);
        assert_eq!(AssetKind::from_extension(Some("js")), AssetKind::Script);
        assert_eq!(AssetKind::from_extension(Some("ts")), AssetKind::Script);
        assert_eq!(AssetKind::from_extension(Some("png")), AssetKind::Resource);
        assert_eq!(AssetKind::from_extension(Some("woff2")), AssetKind::Resource);
        assert_eq!(AssetKind::from_extension(None), AssetKind::Resource);
    }

    #[test]
    fn test_kind_from_name() {
        assert_eq!(AssetKind::from_name("style"), Some(AssetKind::Style));
        assert_eq!(AssetKind::from_name("script"), Some(AssetKind::Script));
        assert_eq!(AssetKind::from_name("nope"), None);
    }

    #[test]
    fn test_output_extension() {
        assert_eq!(
            AssetKind::Style.output_extension(Path::new("main.scss")),
            "css"
        );
        assert_eq!(
            AssetKind::Template.output_extension(Path::new("page.htm")),
            "html"
        );
        assert_eq!(
            AssetKind::Resource.output_extension(Path::new("logo.png")),
            "png"
        );
        assert_eq!(
            AssetKind::Script.output_extension(Path::new("app.ts")),
            "js"
        );
    }

    #[test]
    fn test_reference_accessors() {
        let style = ResolvedReference::new(
            AssetKind::Style,
            PathBuf::from("/src/main.css"),
            true,
        );
        assert_eq!(style.kind(), AssetKind::Style);
        assert_eq!(style.path(), Path::new("/src/main.css"));
        assert!(style.is_inline());

        let url = ResolvedReference::new(
            AssetKind::UrlResource,
            PathBuf::from("/src/bg.png"),
            true, // ignored for url resources
        );
        assert!(!url.is_inline());
    }
}
