//! Scanner input types.
//!
//! The engine never parses markup. An external scanner walks the document and
//! reports each candidate reference as a [`SourceHit`]; the [`SourceTable`]
//! decides which tag/attribute pairs are eligible for resolution.

use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// SourceHit
// ============================================================================

/// One candidate reference found by the external scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceHit {
    /// Tag name, lowercase (`img`, `link`, ...)
    pub tag: String,
    /// Attribute the value was found in (`src`, `href`, ...)
    pub attribute: String,
    /// Raw attribute value as written in the document
    pub value: String,
    /// Byte offset of the value in the document
    pub start: usize,
    /// Byte offset one past the value
    pub end: usize,
}

impl SourceHit {
    pub fn new(
        tag: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
        start: usize,
        end: usize,
    ) -> Self {
        Self {
            tag: tag.into(),
            attribute: attribute.into(),
            value: value.into(),
            start,
            end,
        }
    }
}

// ============================================================================
// SourceSpec
// ============================================================================

/// Per-hit veto: return false to leave the reference untouched.
pub type SourceFilter = Arc<dyn Fn(&SourceHit) -> bool + Send + Sync>;

/// Which attributes of one tag may carry resolvable references.
#[derive(Clone)]
pub struct SourceSpec {
    pub tag: String,
    pub attributes: SmallVec<[String; 4]>,
    pub filter: Option<SourceFilter>,
}

impl SourceSpec {
    pub fn new(tag: impl Into<String>, attributes: &[&str]) -> Self {
        Self {
            tag: tag.into(),
            attributes: attributes.iter().map(|a| (*a).to_string()).collect(),
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: SourceFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

impl fmt::Debug for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceSpec")
            .field("tag", &self.tag)
            .field("attributes", &self.attributes)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// SourceTable
// ============================================================================

/// The merged allow-list of resolvable tag/attribute pairs.
#[derive(Debug, Clone)]
pub struct SourceTable {
    specs: Vec<SourceSpec>,
}

impl SourceTable {
    /// Built-in table covering the reference-carrying HTML attributes.
    pub fn defaults() -> Self {
        Self {
            specs: vec![
                SourceSpec::new("link", &["href", "imagesrcset"]),
                SourceSpec::new("script", &["src"]),
                SourceSpec::new("img", &["src", "srcset"]),
                SourceSpec::new("image", &["href", "xlink:href"]),
                SourceSpec::new("use", &["href", "xlink:href"]),
                SourceSpec::new("input", &["src"]),
                SourceSpec::new("source", &["src", "srcset"]),
                SourceSpec::new("audio", &["src"]),
                SourceSpec::new("track", &["src"]),
                SourceSpec::new("video", &["src", "poster"]),
                SourceSpec::new("object", &["data"]),
            ],
        }
    }

    /// Merge user specs into the defaults.
    ///
    /// Specs for a known tag extend its attribute list (unique) and replace
    /// its filter; specs for a new tag are appended as-is.
    pub fn with_user_specs(user: Vec<SourceSpec>) -> Self {
        let mut table = Self::defaults();
        for spec in user {
            let tag = spec.tag.to_ascii_lowercase();
            match table
                .specs
                .iter_mut()
                .find(|existing| existing.tag == tag)
            {
                Some(existing) => {
                    for attribute in spec.attributes {
                        if !existing.attributes.contains(&attribute) {
                            existing.attributes.push(attribute);
                        }
                    }
                    if spec.filter.is_some() {
                        existing.filter = spec.filter;
                    }
                }
                None => table.specs.push(SourceSpec {
                    tag,
                    attributes: spec.attributes,
                    filter: spec.filter,
                }),
            }
        }
        table
    }

    /// Check whether a hit lies on an allowed tag/attribute pair and passes
    /// the tag's filter.
    pub fn accepts(&self, hit: &SourceHit) -> bool {
        let tag = hit.tag.to_ascii_lowercase();
        let attribute = hit.attribute.to_ascii_lowercase();
        self.specs.iter().any(|spec| {
            spec.tag == tag
                && spec.attributes.iter().any(|a| *a == attribute)
                && spec.filter.as_ref().is_none_or(|filter| filter(hit))
        })
    }

    pub fn specs(&self) -> &[SourceSpec] {
        &self.specs
    }
}

impl Default for SourceTable {
    fn default() -> Self {
        Self::defaults()
    }
}
