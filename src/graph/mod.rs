//! Per-entry asset graph.
//!
//! The collection keeps, for every entry, its resolved references in
//! document discovery order, plus issuer edges between files in both
//! directions. Forward edges preserve the order references were recorded
//! in; traversals derive their determinism from that order alone.
//!
//! # Invariants
//! - Forward and reverse edge maps are always consistent
//! - Record order per entry is append-only, never rewritten
//! - A repeated `(resolved path, inline)` reference in one entry records
//!   nothing and is reported to the caller as a repeat

pub mod record;

pub use record::AssetRecord;

use crate::entry::EntryId;
use crate::resolve::AssetKind;
use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::path::{Path, PathBuf};

type OrderedEdges = FxHashMap<PathBuf, Vec<PathBuf>>;

/// Session-scoped asset graph across all entries.
#[derive(Debug, Default)]
pub struct AssetCollection {
    /// Per-entry records, document discovery order
    records: RwLock<FxHashMap<EntryId, Vec<AssetRecord>>>,
    /// Issuer file → referenced files, in discovery order
    forward: RwLock<OrderedEdges>,
    /// Referenced file → issuer files, in discovery order
    reverse: RwLock<OrderedEdges>,
    /// Role each seen file plays, for issuer-chain walks
    kinds: RwLock<FxHashMap<PathBuf, AssetKind>>,
}

impl AssetCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the record list for an entry and mark its source as a template.
    pub fn add_entry(&self, entry: EntryId, source: &Path) {
        self.records.write().entry(entry).or_default();
        self.kinds
            .write()
            .insert(source.to_path_buf(), AssetKind::Template);
    }

    /// Append a record in discovery order.
    ///
    /// Returns `false` without recording when the entry already holds the
    /// same `(resolved path, inline)` use; callers surface that as a
    /// non-fatal repeat-reference warning.
    pub fn record_asset(&self, record: AssetRecord) -> bool {
        let mut records = self.records.write();
        let list = records.entry(record.entry).or_default();
        if list
            .iter()
            .any(|r| r.resolved_path == record.resolved_path && r.inline == record.inline)
        {
            return false;
        }

        self.link(&record.issuer, &record.resolved_path);
        self.kinds
            .write()
            .entry(record.resolved_path.clone())
            .or_insert(record.kind);
        list.push(record);
        true
    }

    /// Whether the entry already references the resolved file at all.
    pub fn is_duplicate(&self, entry: EntryId, resolved_path: &Path) -> bool {
        self.records
            .read()
            .get(&entry)
            .is_some_and(|list| list.iter().any(|r| r.resolved_path == resolved_path))
    }

    /// Snapshot of an entry's records in discovery order.
    pub fn records_for(&self, entry: EntryId) -> Vec<AssetRecord> {
        self.records
            .read()
            .get(&entry)
            .cloned()
            .unwrap_or_default()
    }

    /// Look up one record by entry and resolved path.
    pub fn find_record(&self, entry: EntryId, resolved_path: &Path) -> Option<AssetRecord> {
        self.records
            .read()
            .get(&entry)?
            .iter()
            .find(|r| r.resolved_path == resolved_path)
            .cloned()
    }

    /// Assign the final output path for every record of this resolved file
    /// in the entry.
    pub fn assign_output(&self, entry: EntryId, resolved_path: &Path, output: &str) {
        if let Some(list) = self.records.write().get_mut(&entry) {
            for record in list.iter_mut().filter(|r| r.resolved_path == resolved_path) {
                record.set_output(output.to_string());
            }
        }
    }

    /// Role of a seen file, if any reference established one.
    pub fn kind_of(&self, file: &Path) -> Option<AssetKind> {
        self.kinds.read().get(file).copied()
    }

    /// Walk the issuer chain upward to the file whose own issuer is the
    /// entry template (or which has no issuer at all).
    ///
    /// For a style imported through scripts this lands on the top-level
    /// script; for a style linked straight from the document it is the
    /// style itself. The first-recorded issuer wins at every step, keeping
    /// the walk deterministic.
    pub fn find_root_issuer(&self, file: &Path) -> PathBuf {
        let reverse = self.reverse.read();
        let kinds = self.kinds.read();

        let mut current = file.to_path_buf();
        let mut seen = FxHashSet::default();
        loop {
            if !seen.insert(current.clone()) {
                return current; // cycle guard
            }
            let Some(issuers) = reverse.get(&current).filter(|i| !i.is_empty()) else {
                return current;
            };
            let parent = &issuers[0];
            if kinds.get(parent) == Some(&AssetKind::Template) {
                return current;
            }
            current = parent.clone();
        }
    }

    /// All style files reachable from a root issuer, depth-first in
    /// first-discovery order.
    ///
    /// Scripts are traversed through; each style is reported once, at its
    /// first discovery, then traversed for nested imports.
    pub fn find_imported_style_modules(&self, root_issuer: &Path) -> Vec<PathBuf> {
        let forward = self.forward.read();
        let kinds = self.kinds.read();

        let mut out = Vec::new();
        let mut seen = FxHashSet::default();
        let mut stack = vec![root_issuer.to_path_buf()];

        // Explicit stack, children pushed in reverse to keep recorded order
        while let Some(file) = stack.pop() {
            if !seen.insert(file.clone()) {
                continue;
            }
            if file != root_issuer && kinds.get(&file) == Some(&AssetKind::Style) {
                out.push(file.clone());
            }
            if let Some(children) = forward.get(&file) {
                for child in children.iter().rev() {
                    let descend = matches!(
                        kinds.get(child),
                        Some(AssetKind::Script | AssetKind::Style)
                    );
                    if descend {
                        stack.push(child.clone());
                    }
                }
            }
        }
        out
    }

    /// Root issuers of styles reached through scripts, per entry, in
    /// discovery order of the first style that led there.
    pub fn import_style_root_issuers(&self, entry: EntryId) -> Vec<PathBuf> {
        let style_records: Vec<(PathBuf, PathBuf)> = {
            let records = self.records.read();
            let Some(list) = records.get(&entry) else {
                return Vec::new();
            };
            list.iter()
                .filter(|r| r.kind == AssetKind::Style)
                .map(|r| (r.resolved_path.clone(), r.issuer.clone()))
                .collect()
        };

        let mut roots = Vec::new();
        for (resolved, issuer) in style_records {
            // Styles linked straight from the document stay with the document
            if self.kind_of(&issuer) == Some(AssetKind::Template) {
                continue;
            }
            let root = self.find_root_issuer(&resolved);
            if root != resolved && !roots.contains(&root) {
                roots.push(root);
            }
        }
        roots
    }

    /// Forget everything (session teardown).
    pub fn clear(&self) {
        self.records.write().clear();
        self.forward.write().clear();
        self.reverse.write().clear();
        self.kinds.write().clear();
    }

    /// Total records across entries (for debug logging).
    pub fn record_count(&self) -> usize {
        self.records.read().values().map(Vec::len).sum()
    }

    // -------------------------------------------------------------------------
    // Private
    // -------------------------------------------------------------------------

    /// Record a forward and reverse edge, both ordered and deduplicated.
    fn link(&self, issuer: &Path, referenced: &Path) {
        let mut forward = self.forward.write();
        let children = forward.entry(issuer.to_path_buf()).or_default();
        if !children.iter().any(|c| c == referenced) {
            children.push(referenced.to_path_buf());
        }

        let mut reverse = self.reverse.write();
        let parents = reverse.entry(referenced.to_path_buf()).or_default();
        if !parents.iter().any(|p| p == issuer) {
            parents.push(issuer.to_path_buf());
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::hash::ContentHash;

    fn path(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    fn make_record(
        entry: EntryId,
        raw: &str,
        resolved: &str,
        kind: AssetKind,
        issuer: &str,
    ) -> AssetRecord {
        AssetRecord::new(
            raw,
            resolved,
            kind,
            false,
            entry,
            issuer,
            ContentHash::empty(),
        )
    }

    fn entry_with_template(collection: &AssetCollection, id: u32, template: &str) -> EntryId {
        let entry = EntryId::new(id);
        collection.add_entry(entry, &path(template));
        entry
    }

    #[test]
    fn test_records_keep_discovery_order() {
        let collection = AssetCollection::new();
        let entry = entry_with_template(&collection, 0, "/src/index.html");

        for name in ["/src/a.css", "/src/b.js", "/src/c.png"] {
            let kind = AssetKind::from_path(&path(name));
            assert!(collection.record_asset(make_record(
                entry,
                name,
                name,
                kind,
                "/src/index.html"
            )));
        }

        let records = collection.records_for(entry);
        let order: Vec<_> = records.iter().map(|r| r.resolved_path.clone()).collect();
        assert_eq!(
            order,
            vec![path("/src/a.css"), path("/src/b.js"), path("/src/c.png")]
        );
    }

    #[test]
    fn test_repeat_reference_not_recorded() {
        let collection = AssetCollection::new();
        let entry = entry_with_template(&collection, 0, "/src/index.html");

        let record = make_record(
            entry,
            "./a.css",
            "/src/a.css",
            AssetKind::Style,
            "/src/index.html",
        );
        assert!(collection.record_asset(record.clone()));
        assert!(!collection.record_asset(record));
        assert_eq!(collection.records_for(entry).len(), 1);
        assert!(collection.is_duplicate(entry, &path("/src/a.css")));
    }

    #[test]
    fn test_same_path_different_inline_coexists() {
        let collection = AssetCollection::new();
        let entry = entry_with_template(&collection, 0, "/src/index.html");

        let emitted = make_record(
            entry,
            "./a.css",
            "/src/a.css",
            AssetKind::Style,
            "/src/index.html",
        );
        let mut inlined = emitted.clone();
        inlined.raw_request = "./a.css?inline".into();
        inlined.inline = true;

        assert!(collection.record_asset(emitted));
        assert!(collection.record_asset(inlined));
        assert_eq!(collection.records_for(entry).len(), 2);
    }

    #[test]
    fn test_entries_do_not_share_duplicate_state() {
        let collection = AssetCollection::new();
        let first = entry_with_template(&collection, 0, "/src/index.html");
        let second = entry_with_template(&collection, 1, "/src/about.html");

        assert!(collection.record_asset(make_record(
            first,
            "./logo.png",
            "/src/logo.png",
            AssetKind::Resource,
            "/src/index.html"
        )));
        assert!(collection.record_asset(make_record(
            second,
            "./logo.png",
            "/src/logo.png",
            AssetKind::Resource,
            "/src/about.html"
        )));
        assert_eq!(collection.records_for(first).len(), 1);
        assert_eq!(collection.records_for(second).len(), 1);
    }

    #[test]
    fn test_assign_output() {
        let collection = AssetCollection::new();
        let entry = entry_with_template(&collection, 0, "/src/index.html");
        collection.record_asset(make_record(
            entry,
            "./a.css",
            "/src/a.css",
            AssetKind::Style,
            "/src/index.html",
        ));

        collection.assign_output(entry, &path("/src/a.css"), "css/a.1a2b3c4d.css");
        let record = collection.find_record(entry, &path("/src/a.css")).unwrap();
        assert_eq!(record.output(), Some("css/a.1a2b3c4d.css"));
    }

    #[test]
    fn test_find_root_issuer_through_scripts() {
        let collection = AssetCollection::new();
        let entry = entry_with_template(&collection, 0, "/src/index.html");

        // index.html -> main.js -> widget.js -> widget.css
        collection.record_asset(make_record(
            entry,
            "./main.js",
            "/src/main.js",
            AssetKind::Script,
            "/src/index.html",
        ));
        collection.record_asset(make_record(
            entry,
            "./widget.js",
            "/src/widget.js",
            AssetKind::Script,
            "/src/main.js",
        ));
        collection.record_asset(make_record(
            entry,
            "./widget.css",
            "/src/widget.css",
            AssetKind::Style,
            "/src/widget.js",
        ));

        assert_eq!(
            collection.find_root_issuer(&path("/src/widget.css")),
            path("/src/main.js")
        );
    }

    #[test]
    fn test_find_root_issuer_direct_style() {
        let collection = AssetCollection::new();
        let entry = entry_with_template(&collection, 0, "/src/index.html");
        collection.record_asset(make_record(
            entry,
            "./main.css",
            "/src/main.css",
            AssetKind::Style,
            "/src/index.html",
        ));

        // Linked straight from the document: the style is its own root
        assert_eq!(
            collection.find_root_issuer(&path("/src/main.css")),
            path("/src/main.css")
        );
    }

    #[test]
    fn test_imported_styles_depth_first_order() {
        let collection = AssetCollection::new();
        let entry = entry_with_template(&collection, 0, "/src/index.html");

        // main.js -> a.css, widget.js ; widget.js -> b.css
        collection.record_asset(make_record(
            entry,
            "./main.js",
            "/src/main.js",
            AssetKind::Script,
            "/src/index.html",
        ));
        collection.record_asset(make_record(
            entry,
            "./a.css",
            "/src/a.css",
            AssetKind::Style,
            "/src/main.js",
        ));
        collection.record_asset(make_record(
            entry,
            "./widget.js",
            "/src/widget.js",
            AssetKind::Script,
            "/src/main.js",
        ));
        collection.record_asset(make_record(
            entry,
            "./b.css",
            "/src/b.css",
            AssetKind::Style,
            "/src/widget.js",
        ));

        let styles = collection.find_imported_style_modules(&path("/src/main.js"));
        assert_eq!(styles, vec![path("/src/a.css"), path("/src/b.css")]);
    }

    #[test]
    fn test_imported_styles_nested_import() {
        let collection = AssetCollection::new();
        let entry = entry_with_template(&collection, 0, "/src/index.html");

        // main.js -> base.css -> vars.css
        collection.record_asset(make_record(
            entry,
            "./main.js",
            "/src/main.js",
            AssetKind::Script,
            "/src/index.html",
        ));
        collection.record_asset(make_record(
            entry,
            "./base.css",
            "/src/base.css",
            AssetKind::Style,
            "/src/main.js",
        ));
        collection.record_asset(make_record(
            entry,
            "./vars.css",
            "/src/vars.css",
            AssetKind::Style,
            "/src/base.css",
        ));

        let styles = collection.find_imported_style_modules(&path("/src/main.js"));
        assert_eq!(styles, vec![path("/src/base.css"), path("/src/vars.css")]);
    }

    #[test]
    fn test_import_style_root_issuers() {
        let collection = AssetCollection::new();
        let entry = entry_with_template(&collection, 0, "/src/index.html");

        // Direct style: not an import root
        collection.record_asset(make_record(
            entry,
            "./plain.css",
            "/src/plain.css",
            AssetKind::Style,
            "/src/index.html",
        ));
        // Script-carried style: main.js becomes a root
        collection.record_asset(make_record(
            entry,
            "./main.js",
            "/src/main.js",
            AssetKind::Script,
            "/src/index.html",
        ));
        collection.record_asset(make_record(
            entry,
            "./app.css",
            "/src/app.css",
            AssetKind::Style,
            "/src/main.js",
        ));

        let roots = collection.import_style_root_issuers(entry);
        assert_eq!(roots, vec![path("/src/main.js")]);
    }

    #[test]
    fn test_clear_removes_all() {
        let collection = AssetCollection::new();
        let entry = entry_with_template(&collection, 0, "/src/index.html");
        collection.record_asset(make_record(
            entry,
            "./a.css",
            "/src/a.css",
            AssetKind::Style,
            "/src/index.html",
        ));

        collection.clear();
        assert_eq!(collection.record_count(), 0);
        assert!(collection.records_for(entry).is_empty());
    }
}
