//! Path and request utilities.
//!
//! Pure functions for request and output-path manipulation. No side effects.
//!
//! Output paths are posix-style strings relative to the output root; the
//! helpers here keep that form consistent across platforms.

use std::path::{Component, Path, PathBuf};

/// Split a raw request into path and query parts.
///
/// # Examples
/// ```
/// use bindery::utils::path::split_query;
/// assert_eq!(split_query("./style.css?inline"), ("./style.css", "inline"));
/// assert_eq!(split_query("./style.css"), ("./style.css", ""));
/// ```
#[inline]
pub fn split_query(request: &str) -> (&str, &str) {
    request.split_once('?').unwrap_or((request, ""))
}

/// Check if a request is external (has a URL scheme like http:, data:, etc.)
///
/// Protocol-relative requests (`//cdn.example.com/x`) count as external;
/// everything else must parse as an absolute URL.
///
/// # Examples
/// ```
/// use bindery::utils::path::is_external_request;
/// assert!(is_external_request("https://example.com/app.js"));
/// assert!(is_external_request("data:image/png;base64,iVBOR"));
/// assert!(!is_external_request("/assets/app.js"));
/// assert!(!is_external_request("./app.js"));
/// ```
#[inline]
pub fn is_external_request(request: &str) -> bool {
    request.starts_with("//") || url::Url::parse(request).is_ok()
}

/// Convert a path to a posix-style string (forward slashes only).
#[inline]
pub fn to_posix(path: &Path) -> String {
    let s = path.to_string_lossy();
    if s.contains('\\') {
        s.replace('\\', "/")
    } else {
        s.into_owned()
    }
}

/// Normalize `.` and `..` components lexically, without touching the
/// filesystem.
///
/// `..` at the root is dropped. Symlinks are not resolved; resolution works
/// on the path text alone so results are deterministic.
pub fn lexical_normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    // Relative path escaping its base keeps the `..`
                    if !path.has_root() {
                        out.push("..");
                    }
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Compute the relative web path from one output file to another.
///
/// Both arguments are posix-style paths relative to the output root. The
/// result is what a reference inside `from` must say to reach `to`.
///
/// # Examples
/// ```
/// use bindery::utils::path::output_relative;
/// assert_eq!(
///     output_relative("pages/about.html", "assets/logo.png"),
///     "../assets/logo.png"
/// );
/// assert_eq!(output_relative("index.html", "css/main.css"), "css/main.css");
/// ```
pub fn output_relative(from: &str, to: &str) -> String {
    let from_dir: Vec<&str> = {
        let mut parts: Vec<&str> = from.split('/').filter(|p| !p.is_empty()).collect();
        parts.pop(); // drop the filename
        parts
    };
    let to_parts: Vec<&str> = to.split('/').filter(|p| !p.is_empty()).collect();

    // Skip the shared directory prefix
    let common = from_dir
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = String::new();
    for _ in common..from_dir.len() {
        out.push_str("../");
    }
    out.push_str(&to_parts[common..].join("/"));
    out
}
