//! Host integration seams.
//!
//! The engine never walks or watches the filesystem itself. Two small traits
//! mark the boundary: [`ModuleResolver`] turns request strings into files,
//! [`AssetEmitter`] receives finished outputs. Filesystem-backed
//! implementations are provided for embedding, an in-memory emitter for
//! tests and dry runs.

use crate::error::BuildError;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::path::lexical_normalize;

// ============================================================================
// ModuleResolver
// ============================================================================

/// Resolve request strings against the filesystem (aliases, extension
/// candidates). Only the lookup lives here; kind inference and memoization
/// stay in the engine.
pub trait ModuleResolver: Send + Sync {
    /// Resolve a request against the directory of the issuing file.
    ///
    /// Returns the file the request denotes, or `None` when nothing matches.
    fn resolve(&self, request: &str, issuer_dir: &Path) -> Option<PathBuf>;
}

/// Filesystem-backed resolver.
///
/// Lookup order: alias prefix, then basedir for root-relative requests,
/// then issuer-relative. A request without a matching file retries with
/// the configured extension candidates appended.
pub struct FsModuleResolver {
    basedir: PathBuf,
    aliases: FxHashMap<String, PathBuf>,
    extensions: Vec<String>,
}

impl FsModuleResolver {
    pub fn new(basedir: impl Into<PathBuf>) -> Self {
        Self {
            basedir: basedir.into(),
            aliases: FxHashMap::default(),
            extensions: Vec::new(),
        }
    }

    /// Map a request prefix (e.g. `@images`) onto a directory.
    pub fn with_alias(mut self, prefix: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        self.aliases.insert(prefix.into(), target.into());
        self
    }

    /// Extensions to try when the request names no existing file.
    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| (*e).to_string()).collect();
        self
    }

    fn candidate(&self, request: &str, issuer_dir: &Path) -> PathBuf {
        // Alias prefix beats everything
        for (prefix, target) in &self.aliases {
            if let Some(rest) = request.strip_prefix(prefix.as_str()) {
                return target.join(rest.trim_start_matches('/'));
            }
        }
        if let Some(rest) = request.strip_prefix('/') {
            return self.basedir.join(rest);
        }
        issuer_dir.join(request)
    }
}

impl ModuleResolver for FsModuleResolver {
    fn resolve(&self, request: &str, issuer_dir: &Path) -> Option<PathBuf> {
        let candidate = lexical_normalize(&self.candidate(request, issuer_dir));
        if candidate.is_file() {
            return Some(candidate);
        }
        for ext in &self.extensions {
            let mut with_ext = candidate.clone().into_os_string();
            with_ext.push(".");
            with_ext.push(ext);
            let with_ext = PathBuf::from(with_ext);
            if with_ext.is_file() {
                return Some(with_ext);
            }
        }
        None
    }
}

// ============================================================================
// AssetEmitter
// ============================================================================

/// Receive finished outputs.
///
/// Paths are posix-style, relative to the host's output root. `delete` on a
/// path that was never emitted is a no-op.
pub trait AssetEmitter: Send + Sync {
    fn emit(&self, output_path: &str, content: &[u8]) -> Result<(), BuildError>;

    /// Emit by copying an existing file (resources that need no rendering).
    fn copy_from(&self, output_path: &str, source: &Path) -> Result<(), BuildError>;

    fn delete(&self, output_path: &str) -> Result<(), BuildError>;
}

/// In-memory emitter for tests and dry runs.
#[derive(Default)]
pub struct MemoryEmitter {
    files: Mutex<FxHashMap<String, Vec<u8>>>,
}

impl MemoryEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content_of(&self, output_path: &str) -> Option<Vec<u8>> {
        self.files.lock().get(output_path).cloned()
    }

    pub fn text_of(&self, output_path: &str) -> Option<String> {
        self.content_of(output_path)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn contains(&self, output_path: &str) -> bool {
        self.files.lock().contains_key(output_path)
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }

    /// Emitted paths in sorted order.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.files.lock().keys().cloned().collect();
        paths.sort();
        paths
    }
}

impl AssetEmitter for MemoryEmitter {
    fn emit(&self, output_path: &str, content: &[u8]) -> Result<(), BuildError> {
        self.files
            .lock()
            .insert(output_path.to_string(), content.to_vec());
        Ok(())
    }

    fn copy_from(&self, output_path: &str, source: &Path) -> Result<(), BuildError> {
        let content =
            fs::read(source).map_err(|e| BuildError::Io(source.to_path_buf(), e))?;
        self.files.lock().insert(output_path.to_string(), content);
        Ok(())
    }

    fn delete(&self, output_path: &str) -> Result<(), BuildError> {
        self.files.lock().remove(output_path);
        Ok(())
    }
}

/// Emitter writing into an output directory.
pub struct FsEmitter {
    output_dir: PathBuf,
}

impl FsEmitter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    fn target(&self, output_path: &str) -> PathBuf {
        self.output_dir.join(output_path)
    }

    fn ensure_parent(&self, target: &Path) -> Result<(), BuildError> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::Io(parent.to_path_buf(), e))?;
        }
        Ok(())
    }
}

impl AssetEmitter for FsEmitter {
    fn emit(&self, output_path: &str, content: &[u8]) -> Result<(), BuildError> {
        let target = self.target(output_path);
        self.ensure_parent(&target)?;
        fs::write(&target, content).map_err(|e| BuildError::Io(target.clone(), e))
    }

    fn copy_from(&self, output_path: &str, source: &Path) -> Result<(), BuildError> {
        let target = self.target(output_path);
        self.ensure_parent(&target)?;
        fs::copy(source, &target)
            .map(|_| ())
            .map_err(|e| BuildError::Io(source.to_path_buf(), e))
    }

    fn delete(&self, output_path: &str) -> Result<(), BuildError> {
        let target = self.target(output_path);
        match fs::remove_file(&target) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BuildError::Io(target, e)),
        }
    }
}
