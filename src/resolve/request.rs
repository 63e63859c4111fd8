//! Raw request parsing.
//!
//! A reference as written in a document may carry engine-directed query
//! flags (`?inline`, `?as=style`). The flags are stripped before the path
//! touches the filesystem, but the full raw string stays the identity of
//! the request: memoization and record bookkeeping key on it unchanged.

use crate::resolve::reference::AssetKind;
use crate::utils::path::{is_external_request, split_query};

/// A parsed reference request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRequest {
    raw: String,
    path_end: usize,
    /// `?inline` / `?inline=false` override, if present
    pub inline: Option<bool>,
    /// `?as=<kind>` override, if present
    pub kind_override: Option<AssetKind>,
}

impl RawRequest {
    pub fn parse(raw: &str) -> Self {
        let (path, query) = split_query(raw);
        let path_end = path.len();

        let mut inline = None;
        let mut kind_override = None;
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            match key {
                "inline" => inline = Some(value != "false"),
                "as" => kind_override = AssetKind::from_name(value),
                _ => {} // unknown flags pass through untouched
            }
        }

        Self {
            raw: raw.to_string(),
            path_end,
            inline,
            kind_override,
        }
    }

    /// The full request as written, query included.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The path part, query stripped.
    pub fn path(&self) -> &str {
        &self.raw[..self.path_end]
    }

    /// `data:` requests carry their content in place and never resolve.
    pub fn is_data_url(&self) -> bool {
        self.raw.starts_with("data:")
    }

    /// Scheme'd requests (http:, mailto:, data:, ...) are left untouched.
    pub fn is_external(&self) -> bool {
        is_external_request(&self.raw)
    }

    /// Root-relative requests (`/assets/...`) resolve against the basedir.
    pub fn is_root_relative(&self) -> bool {
        self.raw.starts_with('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let request = RawRequest::parse("./img/logo.png");
        assert_eq!(request.path(), "./img/logo.png");
        assert_eq!(request.raw(), "./img/logo.png");
        assert_eq!(request.inline, None);
        assert_eq!(request.kind_override, None);
    }

    #[test]
    fn test_parse_inline_flag() {
        let request = RawRequest::parse("./style.css?inline");
        assert_eq!(request.path(), "./style.css");
        assert_eq!(request.inline, Some(true));

        let request = RawRequest::parse("./style.css?inline=false");
        assert_eq!(request.inline, Some(false));
    }

    #[test]
    fn test_parse_kind_override() {
        let request = RawRequest::parse("./data.svg?as=resource");
        assert_eq!(request.kind_override, Some(AssetKind::Resource));

        let request = RawRequest::parse("./main.pcss?as=style&inline");
        assert_eq!(request.kind_override, Some(AssetKind::Style));
        assert_eq!(request.inline, Some(true));
    }

    #[test]
    fn test_unknown_flags_ignored() {
        let request = RawRequest::parse("./app.js?v=3&inline");
        assert_eq!(request.path(), "./app.js");
        assert_eq!(request.inline, Some(true));
    }

    #[test]
    fn test_raw_identity_keeps_query() {
        let request = RawRequest::parse("./a.css?inline");
        assert_eq!(request.raw(), "./a.css?inline");
        assert_ne!(
            RawRequest::parse("./a.css").raw(),
            RawRequest::parse("./a.css?inline").raw()
        );
    }

    #[test]
    fn test_data_url_detection() {
        assert!(RawRequest::parse("data:image/png;base64,iVBOR").is_data_url());
        assert!(!RawRequest::parse("./data.png").is_data_url());
    }

    #[test]
    fn test_external_detection() {
        assert!(RawRequest::parse("https://cdn.example.com/app.js").is_external());
        assert!(RawRequest::parse("data:text/css,a{}").is_external());
        assert!(!RawRequest::parse("./app.js").is_external());
        assert!(!RawRequest::parse("/assets/app.js").is_external());
    }

    #[test]
    fn test_root_relative() {
        assert!(RawRequest::parse("/assets/logo.png").is_root_relative());
        assert!(!RawRequest::parse("./logo.png").is_root_relative());
    }
}
