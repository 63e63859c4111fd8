//! Output filename templates.
//!
//! A template is either a token pattern (`css/[name].[contenthash:8].css`)
//! or a caller-supplied function over the same inputs. Both are pure:
//! rendering has no side effects, and callers memoize the result so each
//! output's name is computed exactly once per session.

use crate::utils::hash::{self, ContentHash};
use crate::utils::path::to_posix;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ============================================================================
// PathContext
// ============================================================================

/// Inputs available to a filename template.
#[derive(Debug, Clone)]
pub struct PathContext {
    /// Source file the output derives from
    pub source: PathBuf,
    /// `[name]`: entry name, or the source file stem for assets
    pub name: String,
    /// `[ext]`: output extension, without the dot
    pub ext: String,
    /// `[hash]`: stable fingerprint of the source path
    pub hash: String,
    /// `[contenthash]`: hash of the final content
    pub content_hash: ContentHash,
}

impl PathContext {
    pub fn new(
        source: &Path,
        name: impl Into<String>,
        ext: impl Into<String>,
        content_hash: ContentHash,
    ) -> Self {
        Self {
            source: source.to_path_buf(),
            name: name.into(),
            ext: ext.into(),
            hash: hash::fingerprint(&to_posix(source)),
            content_hash,
        }
    }

    /// Context for an asset file: `[name]` is the source stem.
    pub fn for_asset(source: &Path, ext: impl Into<String>, content_hash: ContentHash) -> Self {
        let name = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("asset")
            .to_string();
        Self::new(source, name, ext, content_hash)
    }
}

// ============================================================================
// FilenameTemplate
// ============================================================================

/// How an output file gets its name.
#[derive(Clone)]
pub enum FilenameTemplate {
    /// Token pattern: `[name]`, `[ext]`, `[hash]`, `[contenthash]`,
    /// `[contenthash:n]`
    Pattern(String),
    /// Caller-supplied naming function
    Function(Arc<dyn Fn(&PathContext) -> String + Send + Sync>),
}

impl FilenameTemplate {
    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self::Pattern(pattern.into())
    }

    pub fn function(f: impl Fn(&PathContext) -> String + Send + Sync + 'static) -> Self {
        Self::Function(Arc::new(f))
    }

    /// Render the template against a context. Pure; called once per output.
    pub fn render(&self, cx: &PathContext) -> String {
        match self {
            Self::Pattern(pattern) => substitute(pattern, cx),
            Self::Function(f) => f(cx),
        }
    }
}

impl fmt::Debug for FilenameTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern(pattern) => f.debug_tuple("Pattern").field(pattern).finish(),
            Self::Function(_) => f.debug_tuple("Function").field(&"..").finish(),
        }
    }
}

impl From<&str> for FilenameTemplate {
    fn from(pattern: &str) -> Self {
        Self::pattern(pattern)
    }
}

/// Replace `[token]` occurrences; unknown tokens stay as written.
fn substitute(pattern: &str, cx: &PathContext) -> String {
    let mut out = String::with_capacity(pattern.len() + 16);
    let mut rest = pattern;

    while let Some(start) = rest.find('[') {
        out.push_str(&rest[..start]);
        let Some(len) = rest[start..].find(']') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let token = &rest[start + 1..start + len];
        match token {
            "name" => out.push_str(&cx.name),
            "ext" => out.push_str(&cx.ext),
            "hash" => out.push_str(&cx.hash),
            "contenthash" => out.push_str(&cx.content_hash.to_hex_prefix(8)),
            _ => match token
                .strip_prefix("contenthash:")
                .and_then(|n| n.parse::<usize>().ok())
            {
                Some(n) => out.push_str(&cx.content_hash.to_hex_prefix(n)),
                None => {
                    out.push('[');
                    out.push_str(token);
                    out.push(']');
                }
            },
        }
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::hash::hash_bytes;

    fn make_context() -> PathContext {
        PathContext::new(
            Path::new("/src/css/main.scss"),
            "main",
            "css",
            hash_bytes("body{}"),
        )
    }

    #[test]
    fn test_pattern_tokens() {
        let cx = make_context();
        let template = FilenameTemplate::pattern("css/[name].[ext]");
        assert_eq!(template.render(&cx), "css/main.css");
    }

    #[test]
    fn test_contenthash_tokens() {
        let cx = make_context();
        let expected = cx.content_hash.to_hex_prefix(8);
        assert_eq!(
            FilenameTemplate::pattern("[name].[contenthash].[ext]").render(&cx),
            format!("main.{expected}.css")
        );

        let expected = cx.content_hash.to_hex_prefix(16);
        assert_eq!(
            FilenameTemplate::pattern("[name].[contenthash:16].[ext]").render(&cx),
            format!("main.{expected}.css")
        );
    }

    #[test]
    fn test_hash_token_is_path_stable() {
        let cx = make_context();
        let again = make_context();
        assert_eq!(
            FilenameTemplate::pattern("[name].[hash].[ext]").render(&cx),
            FilenameTemplate::pattern("[name].[hash].[ext]").render(&again)
        );

        // Same stem under a different path gets a different fingerprint
        let moved = PathContext::new(
            Path::new("/src/other/main.scss"),
            "main",
            "css",
            cx.content_hash,
        );
        assert_ne!(cx.hash, moved.hash);
    }

    #[test]
    fn test_unknown_tokens_kept() {
        let cx = make_context();
        assert_eq!(
            FilenameTemplate::pattern("[name].[locale].css").render(&cx),
            "main.[locale].css"
        );
        assert_eq!(
            FilenameTemplate::pattern("broken[name").render(&cx),
            "broken[name"
        );
    }

    #[test]
    fn test_function_template() {
        let cx = make_context();
        let template =
            FilenameTemplate::function(|cx| format!("static/{}-v2.{}", cx.name, cx.ext));
        assert_eq!(template.render(&cx), "static/main-v2.css");
    }

    #[test]
    fn test_for_asset_uses_stem() {
        let cx = PathContext::for_asset(
            Path::new("/src/img/logo.svg"),
            "svg",
            ContentHash::empty(),
        );
        assert_eq!(cx.name, "logo");
        assert_eq!(cx.ext, "svg");
    }
}
