//! Render manifest: the outputs a session will commit.
//!
//! Render produces tasks instead of writing files directly. Nothing is
//! committed until every entry clears post-processing, so an aborted
//! session leaves the output exactly as it was.

use crate::error::BuildError;
use crate::host::AssetEmitter;
use crate::utils::hash::ContentHash;
use std::path::PathBuf;

/// What a task writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskContent {
    /// Realized text, emitted as-is.
    Text(String),
    /// Copy the source file's bytes unchanged.
    CopyFrom(PathBuf),
}

/// One pending output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTask {
    /// Stable identity for logs and incremental comparison, such as
    /// `index` or `index.import-style`.
    pub identifier: String,
    /// Output path relative to the output root.
    pub filename: String,
    pub hash: ContentHash,
    pub content: TaskContent,
}

impl RenderTask {
    pub fn text(
        identifier: impl Into<String>,
        filename: impl Into<String>,
        hash: ContentHash,
        content: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            filename: filename.into(),
            hash,
            content: TaskContent::Text(content.into()),
        }
    }

    pub fn copy(
        identifier: impl Into<String>,
        filename: impl Into<String>,
        hash: ContentHash,
        source: impl Into<PathBuf>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            filename: filename.into(),
            hash,
            content: TaskContent::CopyFrom(source.into()),
        }
    }

    pub fn emit(&self, emitter: &dyn AssetEmitter) -> Result<(), BuildError> {
        match &self.content {
            TaskContent::Text(text) => emitter.emit(&self.filename, text.as_bytes()),
            TaskContent::CopyFrom(source) => emitter.copy_from(&self.filename, source),
        }
    }
}

/// Ordered set of pending outputs for one session.
#[derive(Debug, Default)]
pub struct RenderManifest {
    tasks: Vec<RenderTask>,
}

impl RenderManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: RenderTask) {
        self.tasks.push(task);
    }

    pub fn tasks(&self) -> &[RenderTask] {
        &self.tasks
    }

    pub fn find(&self, identifier: &str) -> Option<&RenderTask> {
        self.tasks.iter().find(|t| t.identifier == identifier)
    }

    /// Write every task. Called once post-processing has succeeded.
    pub fn emit_all(&self, emitter: &dyn AssetEmitter) -> Result<(), BuildError> {
        for task in &self.tasks {
            task.emit(emitter)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}
