//! Squashing of script-imported style chains into per-root bundles.
//!
//! When a script imports styles, the host erases those imports from the
//! built script and the style content has to come out somewhere else:
//! one css file per root issuer, concatenated in discovery order, named
//! by an aggregate hash that changes on every re-import so watch runs
//! can tell bundles apart even when the bytes did not change.

use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::BuildError;
use crate::output::OutputRegistry;
use crate::render::manifest::{RenderManifest, RenderTask};
use crate::render::realizer::Realizer;
use crate::resolve::AssetKind;
use crate::utils::hash::{ContentHash, combine_with_salt, hash_bytes};
use crate::utils::path::output_relative;

/// One squashed style chain, ready for head injection.
#[derive(Debug, Clone)]
pub struct StyleBundle {
    /// Top-level script the chain was reached through.
    pub root_issuer: PathBuf,
    /// Style files concatenated, in discovery order.
    pub fragments: Vec<PathBuf>,
    /// Hash of the concatenation, salted by the session import counter.
    pub aggregate_hash: ContentHash,
    /// Claimed output path; `None` when the bundle is embedded instead.
    pub output: Option<String>,
    /// Final css, rewritten relative to where it will live.
    pub content: String,
    pub inline: bool,
}

/// Build the style bundles an entry's scripts pulled in.
///
/// Every root issuer recorded for the entry yields at most one bundle.
/// A bundle whose output is already claimed with the same bytes is not
/// scheduled again, but is still returned so the entry links to it.
pub fn squash_imports(
    realizer: &Realizer<'_>,
    manifest: &mut RenderManifest,
    counter: &AtomicU64,
) -> Result<Vec<StyleBundle>, BuildError> {
    let env = realizer.env();
    let entry = realizer.entry();
    let mut bundles = Vec::new();

    for root in env.collection.import_style_root_issuers(entry.id) {
        let fragments = env.collection.find_imported_style_modules(&root);
        if fragments.is_empty() {
            continue;
        }

        let mut concat = String::new();
        let mut hashes = Vec::with_capacity(fragments.len());
        let mut banners = Vec::new();
        for fragment in &fragments {
            let content = realizer.realize_style_content(fragment, manifest)?;
            hashes.push(hash_bytes(&content.css));
            concat.push_str(&content.css);
            banners.extend(content.banners);
        }

        let salt = counter.fetch_add(1, Ordering::Relaxed);
        let aggregate = combine_with_salt(&hashes, salt);
        crate::debug!(
            "squash";
            "bundle for `{}`: {} fragment(s), salt {}",
            root.display(),
            fragments.len(),
            salt
        );

        if env.options.inline.style {
            // Embedded per consuming entry, no file of its own
            let content = rewrite_css_urls(&concat, realizer.entry_output(), env.outputs);
            bundles.push(StyleBundle {
                root_issuer: root,
                fragments,
                aggregate_hash: aggregate,
                output: None,
                content,
                inline: true,
            });
            continue;
        }

        let stem = root
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("style");
        let cx = crate::entry::PathContext::new(&root, stem, "css", aggregate);
        let desired = env.options.filename_for(AssetKind::Style).render(&cx);

        let claimed = env.outputs.claim(&desired, &root, aggregate)?;
        let output = claimed.path().to_string();
        let content = rewrite_css_urls(&concat, &output, env.outputs);
        if claimed.needs_emission() {
            let css = realizer.apply_extract_hook(content.clone(), &root);
            let identifier = format!("{}.{}.import-style", entry.name, stem);
            manifest.push(RenderTask::text(identifier, output.clone(), aggregate, css));
            realizer.schedule_license(&output, &banners, manifest);
        }
        bundles.push(StyleBundle {
            root_issuer: root,
            fragments,
            aggregate_hash: aggregate,
            output: Some(output),
            content,
            inline: false,
        });
    }
    Ok(bundles)
}

/// Rewrite engine-claimed root-relative `url()` targets so they are
/// relative to `from_output`. Anything the registry has no claim for,
/// external urls and data urls included, is left as written.
pub fn rewrite_css_urls(css: &str, from_output: &str, outputs: &OutputRegistry) -> String {
    static URL: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r#"url\(\s*['"]?([^'")\s]+)['"]?\s*\)"#).unwrap());

    URL.replace_all(css, |caps: &regex::Captures<'_>| {
        let target = &caps[1];
        if let Some(claimed) = target.strip_prefix('/')
            && outputs.is_claimed(claimed)
        {
            return format!("url({})", output_relative(from_output, claimed));
        }
        caps[0].to_string()
    })
    .into_owned()
}
