//! Intermediate representation of built modules.
//!
//! The build phase hands every template and extracted style over as a
//! flat segment list: literal text interleaved with reference
//! placeholders and data slots. Realization is pure substitution over
//! these segments, there is no code execution.

use crate::resolve::AssetKind;
use std::path::PathBuf;

/// Which calling convention produced the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrDialect {
    /// String-producing dialect: realizes directly into page text.
    Template,
    /// Module-shaped dialect from style extraction: realizes into a
    /// style fragment that may join a squashed bundle.
    StyleModule,
}

/// One piece of a built module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IrSegment {
    /// Literal output text.
    Text(String),
    /// A resource reference to substitute with its final form: an
    /// output path, a data URL, or embedded content.
    Reference {
        /// Raw request as written in source, control flags included.
        request: String,
        /// Kind hint from the reference site (`<script src>` vs
        /// `<link href>`), when the site implies one.
        kind: Option<AssetKind>,
    },
    /// A data-binding slot filled from the entry's data map.
    Data { key: String },
}

impl IrSegment {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn reference(request: impl Into<String>) -> Self {
        Self::Reference {
            request: request.into(),
            kind: None,
        }
    }

    pub fn reference_as(request: impl Into<String>, kind: AssetKind) -> Self {
        Self::Reference {
            request: request.into(),
            kind: Some(kind),
        }
    }

    pub fn data(key: impl Into<String>) -> Self {
        Self::Data { key: key.into() }
    }
}

/// A built module awaiting realization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IrModule {
    /// Source file the module was built from.
    pub source: PathBuf,
    pub dialect: IrDialect,
    pub segments: Vec<IrSegment>,
}

impl IrModule {
    pub fn template(source: impl Into<PathBuf>, segments: Vec<IrSegment>) -> Self {
        Self {
            source: source.into(),
            dialect: IrDialect::Template,
            segments,
        }
        .normalized()
    }

    pub fn style_module(source: impl Into<PathBuf>, segments: Vec<IrSegment>) -> Self {
        Self {
            source: source.into(),
            dialect: IrDialect::StyleModule,
            segments,
        }
        .normalized()
    }

    /// A module that is nothing but literal text.
    pub fn plain_text(source: impl Into<PathBuf>, dialect: IrDialect, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            dialect,
            segments: vec![IrSegment::Text(text.into())],
        }
    }

    /// Merge adjacent text runs and drop empty ones. Substitution output
    /// is identical either way; this keeps stored modules small.
    fn normalized(mut self) -> Self {
        let segments = std::mem::take(&mut self.segments);
        for segment in segments {
            match segment {
                IrSegment::Text(text) => {
                    if text.is_empty() {
                        continue;
                    }
                    if let Some(IrSegment::Text(last)) = self.segments.last_mut() {
                        last.push_str(&text);
                    } else {
                        self.segments.push(IrSegment::Text(text));
                    }
                }
                other => self.segments.push(other),
            }
        }
        self
    }

    /// Raw requests referenced by this module, in segment order.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            IrSegment::Reference { request, .. } => Some(request.as_str()),
            _ => None,
        })
    }
}
