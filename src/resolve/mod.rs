//! Reference resolution with session-scoped memoization.
//!
//! Every reference found in a document goes through [`Resolver::resolve`].
//! Path lookup is delegated to the host's [`ModuleResolver`]; everything the
//! engine decides itself (query flags, kind inference, inline defaults) lives
//! here. Results are memoized per `(raw request, issuer file)` for the
//! lifetime of the session, so repeated references never touch the
//! filesystem twice.

pub mod reference;
pub mod request;

pub use reference::{AssetKind, ResolvedReference};
pub use request::RawRequest;

use crate::error::BuildError;
use crate::host::ModuleResolver;
use crate::utils::path::lexical_normalize;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ============================================================================
// Resolve Context
// ============================================================================

/// Context for resolving one reference
#[derive(Debug, Clone)]
pub struct ResolveContext<'a> {
    /// File the reference was written in
    pub issuer: &'a Path,
    /// Entry the document belongs to (for diagnostics)
    pub entry: &'a str,
    /// Kind of the issuing file, when known
    pub issuer_kind: Option<AssetKind>,
    /// Kind expected from the reference site (e.g. `<link rel="stylesheet">`)
    pub expected: Option<AssetKind>,
}

impl<'a> ResolveContext<'a> {
    pub fn new(issuer: &'a Path, entry: &'a str) -> Self {
        Self {
            issuer,
            entry,
            issuer_kind: None,
            expected: None,
        }
    }

    pub fn issuer_kind(mut self, kind: AssetKind) -> Self {
        self.issuer_kind = Some(kind);
        self
    }

    pub fn expected(mut self, kind: AssetKind) -> Self {
        self.expected = Some(kind);
        self
    }
}

/// Default inline decisions per kind, applied when a request carries no
/// explicit `?inline` flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InlineDefaults {
    pub style: bool,
    pub script: bool,
}

// ============================================================================
// Resolver
// ============================================================================

/// Session-scoped, memoizing reference resolver.
pub struct Resolver {
    modules: Arc<dyn ModuleResolver>,
    inline: InlineDefaults,
    cache: DashMap<(String, PathBuf), ResolvedReference>,
}

impl Resolver {
    pub fn new(modules: Arc<dyn ModuleResolver>, inline: InlineDefaults) -> Self {
        Self {
            modules,
            inline,
            cache: DashMap::new(),
        }
    }

    /// Resolve a raw request from its issuing file.
    ///
    /// External and `data:` requests never reach this point; callers filter
    /// them with [`RawRequest::is_external`] first.
    pub fn resolve(
        &self,
        raw_request: &str,
        cx: &ResolveContext<'_>,
    ) -> Result<ResolvedReference, BuildError> {
        let key = (raw_request.to_string(), cx.issuer.to_path_buf());
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached.clone());
        }

        let request = RawRequest::parse(raw_request);
        let issuer_dir = cx.issuer.parent().unwrap_or_else(|| Path::new("/"));
        let found = self
            .modules
            .resolve(request.path(), issuer_dir)
            .ok_or_else(|| BuildError::Resolution {
                request: raw_request.to_string(),
                issuer: cx.issuer.to_path_buf(),
                entry: cx.entry.to_string(),
            })?;
        let path = lexical_normalize(&found);

        // Query override beats the reference site, which beats the extension
        let mut kind = request
            .kind_override
            .or(cx.expected)
            .unwrap_or_else(|| AssetKind::from_path(&path));

        // A plain resource reached from inside a stylesheet is a url() sub-resource
        if kind == AssetKind::Resource && cx.issuer_kind == Some(AssetKind::Style) {
            kind = AssetKind::UrlResource;
        }

        let inline = request.inline.unwrap_or(match kind {
            AssetKind::Style => self.inline.style,
            AssetKind::Script => self.inline.script,
            _ => false,
        });

        let reference = ResolvedReference::new(kind, path, inline);
        self.cache.insert(key, reference.clone());
        Ok(reference)
    }

    /// Number of memoized resolutions.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// Forget all memoized resolutions (session teardown).
    pub fn clear(&self) {
        self.cache.clear();
    }
}
