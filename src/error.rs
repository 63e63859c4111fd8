//! Build error types and diagnostic collection.
//!
//! Errors abort the entry they belong to, never the whole session. They are
//! buffered in a [`DiagnosticSink`] during the session and flushed together
//! when the session finishes, so one broken entry cannot hide another's
//! diagnostics.

use crate::utils::html;
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// BuildError
// ============================================================================

/// Build-related errors
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("can't resolve `{request}` in `{issuer}` (entry `{entry}`)")]
    Resolution {
        request: String,
        issuer: PathBuf,
        entry: String,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(
        "output `{output}` claimed twice with different content: first by `{first}`, then by `{second}`"
    )]
    DuplicateOutput {
        output: String,
        first: PathBuf,
        second: PathBuf,
    },

    // The cause is part of the message; a `source()` chain here would print
    // the same root twice when diagnostics are flushed together
    #[error("failed to render `{file}`: {cause}")]
    Compilation { file: PathBuf, cause: Box<BuildError> },

    #[error("postprocess hook failed for entry `{entry}`: {message}")]
    Postprocess { entry: String, message: String },

    // NOTE: No #[from] here - we don't want source() which causes duplicate output
    #[error("{0}")]
    Diagnostics(BuildDiagnostics),
}

// ============================================================================
// DuplicateWarning
// ============================================================================

/// A repeated reference to the same resource within one entry.
///
/// Non-fatal: reported once per repetition, never raised as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateWarning {
    /// Entry in which the repetition was seen
    pub entry: String,
    /// The raw request as written in the document
    pub request: String,
    /// The resolved file both references point at
    pub resolved: PathBuf,
}

impl fmt::Display for DuplicateWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}{}{}",
            "[".dimmed(),
            self.entry.cyan(),
            "]".dimmed()
        )?;
        write!(
            f,
            "{} duplicate reference `{}` -> `{}`",
            "→".yellow(),
            self.request,
            self.resolved.display()
        )
    }
}

// ============================================================================
// BuildDiagnostics
// ============================================================================

/// All errors collected over one session, flushed together at session end.
#[derive(Debug, Default)]
pub struct BuildDiagnostics {
    errors: Vec<BuildError>,
}

impl BuildDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: BuildError) {
        self.errors.push(error);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[BuildError] {
        &self.errors
    }

    /// Convert to Result (returns Err if there are errors).
    pub fn into_result(self) -> Result<(), Self> {
        if self.errors.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for BuildDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}\n", "build failed:".red().bold())?;
        for (i, err) in self.errors.iter().enumerate() {
            write!(f, "{} {err}", "→".red())?;
            if i + 1 < self.errors.len() {
                writeln!(f)?;
            }
        }
        if self.errors.len() > 1 {
            write!(
                f,
                "\n\n{} {} {}",
                "found".dimmed(),
                self.errors.len().to_string().red().bold(),
                "errors".dimmed()
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for BuildDiagnostics {}

// ============================================================================
// DiagnosticSink
// ============================================================================

/// Session-scoped error buffer with duplicate suppression.
///
/// `report` logs each new message once and remembers the last one; wrapping
/// helpers consult that memory so an error already surfaced to the user is
/// re-raised unchanged instead of being nested into a second report.
#[derive(Debug, Default)]
pub struct DiagnosticSink {
    errors: Mutex<BuildDiagnostics>,
    warnings: Mutex<Vec<DuplicateWarning>>,
    last_message: Mutex<Option<String>>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer an error and log it, unless it repeats the last reported one.
    pub fn report(&self, error: BuildError) {
        let message = error.to_string();
        let mut last = self.last_message.lock();
        if last.as_deref() == Some(message.as_str()) {
            return;
        }
        crate::log!("error"; "{message}");
        *last = Some(message);
        self.errors.lock().push(error);
    }

    /// Buffer and log a non-fatal duplicate-reference warning.
    pub fn warn_duplicate(&self, warning: DuplicateWarning) {
        crate::log!("warn"; "{warning}");
        self.warnings.lock().push(warning);
    }

    /// Wrap a realization failure in context, unless the cause was already
    /// reported as-is. The canonical error passes through unchanged so the
    /// user never sees the same root cause twice.
    pub fn wrap_compilation(&self, file: &std::path::Path, cause: BuildError) -> BuildError {
        if self.is_last(&cause) {
            return cause;
        }
        BuildError::Compilation {
            file: file.to_path_buf(),
            cause: Box::new(cause),
        }
    }

    fn is_last(&self, error: &BuildError) -> bool {
        self.last_message.lock().as_deref() == Some(error.to_string().as_str())
    }

    pub fn has_errors(&self) -> bool {
        self.errors.lock().has_errors()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings.lock().len()
    }

    /// Drain buffered errors into a final result. Warnings never fail the
    /// session.
    pub fn flush(&self) -> Result<(), BuildError> {
        *self.last_message.lock() = None;
        self.warnings.lock().clear();
        let diagnostics = std::mem::take(&mut *self.errors.lock());
        diagnostics
            .into_result()
            .map_err(BuildError::Diagnostics)
    }

    /// Discard everything without raising (session abort).
    pub fn clear(&self) {
        *self.last_message.lock() = None;
        self.warnings.lock().clear();
        *self.errors.lock() = BuildDiagnostics::new();
    }
}

// ============================================================================
// Error overlay
// ============================================================================

/// Render an error message as a standalone HTML page.
///
/// The terminal message (ANSI colors included) and the overlay are derived
/// from the same string, so both surfaces always agree.
pub fn error_overlay_page(message: &str) -> String {
    let body = html::ansi_to_html(message);
    format!(
        "<!DOCTYPE html><html lang=\"en\">\
         <head><meta charset=\"utf-8\"><title>build error</title></head>\
         <body style=\"margin:0;background:#282a36;color:#f8f8f2\">\
         <div style=\"padding:16px;font-family:monospace;white-space:pre-wrap\">\
         <p style=\"color:#ff5555;font-weight:bold\">build error</p>\
         <pre>{body}</pre>\
         </div></body></html>"
    )
}
