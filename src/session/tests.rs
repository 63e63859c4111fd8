use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tempfile::TempDir;

use super::{BuildSession, Phase};
use crate::config::BundlerOptions;
use crate::entry::{EntryOptions, JsonMap};
use crate::error::BuildError;
use crate::host::{FsModuleResolver, MemoryEmitter, ModuleResolver};
use crate::render::{IrModule, IrSegment};
use crate::resolve::AssetKind;
use crate::scan::SourceHit;

fn write_file(path: &Path, content: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn make_project() -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let root = temp.path().to_path_buf();
    write_file(&root.join("src/index.html"), b"<html></html>");
    write_file(&root.join("src/css/main.css"), b"body { color: teal }\n");
    write_file(&root.join("src/js/main.js"), b"console.log(1);\n");
    write_file(
        &root.join("src/img/logo.png"),
        &[0x89, b'P', b'N', b'G', 0x0d, 0x0a],
    );
    (temp, root)
}

fn make_options() -> BundlerOptions {
    // Hashless templates keep output paths predictable in assertions
    BundlerOptions::new()
        .with_style_filename("css/[name].css")
        .with_script_filename("js/[name].js")
        .with_resource_filename("assets/[name].[ext]")
}

fn make_session(root: &Path, options: BundlerOptions) -> (BuildSession, Arc<MemoryEmitter>) {
    let emitter = Arc::new(MemoryEmitter::new());
    let session = BuildSession::new(root, options, emitter.clone()).unwrap();
    (session, emitter)
}

fn drive_to_done(session: &mut BuildSession) {
    session.render().unwrap();
    session.post_process().unwrap();
    session.finish().unwrap();
}

#[test]
fn test_full_pipeline_renders_entry_page() {
    let (_temp, root) = make_project();
    let (mut session, emitter) = make_session(&root, make_options());
    let index = root.join("src/index.html");

    session
        .add_entry("index", &index, EntryOptions::new())
        .unwrap();

    let link = SourceHit::new("link", "href", "./css/main.css", 24, 38);
    let reference = session.resolve_hit("index", &link).unwrap().unwrap();
    assert_eq!(reference.kind(), AssetKind::Style);

    // Hits outside the source table stay untouched
    let ignored = SourceHit::new("div", "data-x", "./css/main.css", 0, 0);
    assert!(session.resolve_hit("index", &ignored).unwrap().is_none());

    session
        .resolve_reference("index", "./img/logo.png", &index, None)
        .unwrap();

    session.start_build().unwrap();
    session
        .add_module(IrModule::template(
            &index,
            vec![
                IrSegment::text("<html><head><link rel=\"stylesheet\" href=\""),
                IrSegment::reference("./css/main.css"),
                IrSegment::text("\"></head><body><img src=\""),
                IrSegment::reference("./img/logo.png"),
                IrSegment::text("\"></body></html>"),
            ],
        ))
        .unwrap();
    drive_to_done(&mut session);

    assert!(emitter.contains("index.html"));
    assert!(emitter.contains("css/main.css"));
    assert!(emitter.contains("assets/logo.png"));

    let page = emitter.text_of("index.html").unwrap();
    assert!(page.contains("href=\"css/main.css\""));
    assert!(page.contains("src=\"assets/logo.png\""));
    assert_eq!(
        emitter.text_of("css/main.css").unwrap(),
        "body { color: teal }\n"
    );
    assert_eq!(
        emitter.content_of("assets/logo.png").unwrap(),
        vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a]
    );
}

#[test]
fn test_shared_template_distinct_data() {
    let (_temp, root) = make_project();
    let page = root.join("src/page.html");
    write_file(&page, b"<html></html>");
    let (mut session, emitter) = make_session(&root, make_options());

    let mut home = JsonMap::new();
    home.insert("title".to_string(), "Home".into());
    let mut landing = JsonMap::new();
    landing.insert("title".to_string(), "Landing".into());

    session
        .add_entry("home", &page, EntryOptions::new().with_data(home))
        .unwrap();
    session
        .add_entry("landing", &page, EntryOptions::new().with_data(landing))
        .unwrap();

    session.start_build().unwrap();
    session
        .add_module(IrModule::template(
            &page,
            vec![
                IrSegment::text("<html><head><title>"),
                IrSegment::data("title"),
                IrSegment::text("</title></head><body></body></html>"),
            ],
        ))
        .unwrap();
    drive_to_done(&mut session);

    let home_page = emitter.text_of("home.html").unwrap();
    let landing_page = emitter.text_of("landing.html").unwrap();
    assert!(home_page.contains("<title>Home</title>"));
    assert!(landing_page.contains("<title>Landing</title>"));
    assert!(!home_page.contains("Landing"));
}

struct CountingResolver {
    inner: FsModuleResolver,
    lookups: AtomicUsize,
}

impl ModuleResolver for CountingResolver {
    fn resolve(&self, request: &str, issuer_dir: &Path) -> Option<PathBuf> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve(request, issuer_dir)
    }
}

#[test]
fn test_repeat_resolution_skips_filesystem() {
    let (_temp, root) = make_project();
    let index = root.join("src/index.html");
    let counting = Arc::new(CountingResolver {
        inner: FsModuleResolver::new(&root),
        lookups: AtomicUsize::new(0),
    });
    let emitter = Arc::new(MemoryEmitter::new());
    let session =
        BuildSession::with_resolver(&root, make_options(), counting.clone(), emitter).unwrap();
    session
        .add_entry("index", &index, EntryOptions::new())
        .unwrap();

    let first = session
        .resolve_reference("index", "./css/main.css", &index, None)
        .unwrap()
        .unwrap();
    let second = session
        .resolve_reference("index", "./css/main.css", &index, None)
        .unwrap()
        .unwrap();

    assert_eq!(first.path(), second.path());
    assert_eq!(counting.lookups.load(Ordering::SeqCst), 1);
    assert_eq!(session.resolver().cached_len(), 1);
    // The repeat is a warning, not an error
    assert_eq!(session.sink().warning_count(), 1);
    assert!(!session.sink().has_errors());
}

#[test]
fn test_colliding_output_with_different_content_fails() {
    let (_temp, root) = make_project();
    let index = root.join("src/index.html");
    write_file(&root.join("src/a/app.css"), b"a { color: red }\n");
    write_file(&root.join("src/b/app.css"), b"b { color: blue }\n");
    let (mut session, emitter) = make_session(&root, make_options());

    session
        .add_entry("index", &index, EntryOptions::new())
        .unwrap();
    session.start_build().unwrap();
    session
        .add_module(IrModule::template(
            &index,
            vec![
                IrSegment::text("<html><head><link href=\""),
                IrSegment::reference("./a/app.css"),
                IrSegment::text("\"><link href=\""),
                IrSegment::reference("./b/app.css"),
                IrSegment::text("\"></head></html>"),
            ],
        ))
        .unwrap();
    session.render().unwrap();
    session.post_process().unwrap();

    let error = session.finish().unwrap_err();
    assert!(matches!(error, BuildError::Diagnostics(_)));
    assert!(error.to_string().contains("claimed twice"));
    // The failed entry's page was never committed
    assert!(!emitter.contains("index.html"));
}

#[test]
fn test_identical_content_emitted_once() {
    let (_temp, root) = make_project();
    let index = root.join("src/index.html");
    write_file(&root.join("src/a/app.css"), b"a { color: red }\n");
    write_file(&root.join("src/b/app.css"), b"a { color: red }\n");
    let (mut session, emitter) = make_session(&root, make_options());

    session
        .add_entry("index", &index, EntryOptions::new())
        .unwrap();
    session.start_build().unwrap();
    session
        .add_module(IrModule::template(
            &index,
            vec![
                IrSegment::text("<html><head><link href=\""),
                IrSegment::reference("./a/app.css"),
                IrSegment::text("\"><link href=\""),
                IrSegment::reference("./b/app.css"),
                IrSegment::text("\"></head></html>"),
            ],
        ))
        .unwrap();
    drive_to_done(&mut session);

    // One page, one stylesheet
    assert_eq!(emitter.len(), 2);
    let page = emitter.text_of("index.html").unwrap();
    assert_eq!(page.matches("href=\"css/app.css\"").count(), 2);
}

fn run_bundle_session(root: &Path, a_first: bool) -> (String, String) {
    let index = root.join("src/index.html");
    let app = root.join("src/js/app.js");
    let options = make_options().with_style_filename("css/[name].[contenthash:8].css");
    let (mut session, emitter) = make_session(root, options);

    session
        .add_entry("index", &index, EntryOptions::new())
        .unwrap();
    session
        .resolve_reference("index", "./js/app.js", &index, Some(AssetKind::Script))
        .unwrap();
    let imports = if a_first {
        ["./a.css", "./b.css"]
    } else {
        ["./b.css", "./a.css"]
    };
    for import in imports {
        session
            .resolve_reference("index", import, &app, None)
            .unwrap();
    }

    session.start_build().unwrap();
    session
        .add_module(IrModule::template(
            &index,
            vec![
                IrSegment::text("<html><head></head><body><script src=\""),
                IrSegment::reference("./js/app.js"),
                IrSegment::text("\"></script></body></html>"),
            ],
        ))
        .unwrap();
    drive_to_done(&mut session);

    let bundle_path = emitter
        .paths()
        .into_iter()
        .find(|p| p.starts_with("css/"))
        .unwrap();
    let page = emitter.text_of("index.html").unwrap();
    assert!(page.contains(&format!("<link rel=\"stylesheet\" href=\"{bundle_path}\">")));
    let content = emitter.text_of(&bundle_path).unwrap();
    (bundle_path, content)
}

#[test]
fn test_script_imports_squash_in_discovery_order() {
    let (_temp, root) = make_project();
    write_file(&root.join("src/js/app.js"), b"console.log(1);\n");
    write_file(&root.join("src/js/a.css"), b"a { color: red }\n");
    write_file(&root.join("src/js/b.css"), b"b { color: blue }\n");

    let (path_ab, content_ab) = run_bundle_session(&root, true);
    let (path_ba, content_ba) = run_bundle_session(&root, false);

    assert_eq!(content_ab, "a { color: red }\nb { color: blue }\n");
    assert_eq!(content_ba, "b { color: blue }\na { color: red }\n");
    // Reversing the import order changes the bundle's identity
    assert_ne!(path_ab, path_ba);
}

#[test]
fn test_inline_assets_leave_no_files_behind() {
    let (_temp, root) = make_project();
    let index = root.join("src/index.html");
    let (mut session, emitter) = make_session(&root, make_options());

    session
        .add_entry("index", &index, EntryOptions::new())
        .unwrap();
    session
        .resolve_reference("index", "./css/main.css?inline", &index, None)
        .unwrap();
    session
        .resolve_reference("index", "./img/logo.png?inline", &index, None)
        .unwrap();

    session.start_build().unwrap();
    session
        .add_module(IrModule::template(
            &index,
            vec![
                IrSegment::text("<html><head><link rel=\"stylesheet\" href=\""),
                IrSegment::reference("./css/main.css?inline"),
                IrSegment::text("\"></head><body><img src=\""),
                IrSegment::reference("./img/logo.png?inline"),
                IrSegment::text("\"></body></html>"),
            ],
        ))
        .unwrap();
    drive_to_done(&mut session);

    // Only the page itself reaches the output
    assert_eq!(emitter.paths(), vec!["index.html".to_string()]);
    let page = emitter.text_of("index.html").unwrap();
    assert!(page.contains("<style>body { color: teal }"));
    assert!(!page.contains("<link"));
    assert!(page.contains("src=\"data:image/png;base64,"));
}

#[test]
fn test_postprocess_error_keeps_entry_uncommitted() {
    let (_temp, root) = make_project();
    let good = root.join("src/good.html");
    let bad = root.join("src/bad.html");
    write_file(&good, b"<html></html>");
    write_file(&bad, b"<html></html>");

    let options = make_options().with_postprocess(|html, info| {
        if info.entry == "bad" {
            Err("boom".to_string())
        } else {
            Ok(html)
        }
    });
    let (mut session, emitter) = make_session(&root, options);

    session.add_entry("good", &good, EntryOptions::new()).unwrap();
    session.add_entry("bad", &bad, EntryOptions::new()).unwrap();
    session.start_build().unwrap();
    for source in [&good, &bad] {
        session
            .add_module(IrModule::template(
                source,
                vec![IrSegment::text("<html><head></head><body></body></html>")],
            ))
            .unwrap();
    }
    session.render().unwrap();
    session.post_process().unwrap();

    let error = session.finish().unwrap_err();
    assert!(error.to_string().contains("boom"));
    assert!(emitter.contains("good.html"));
    assert!(!emitter.contains("bad.html"));
}

#[test]
fn test_entry_postprocess_wins_over_global() {
    let (_temp, root) = make_project();
    let index = root.join("src/index.html");
    let about = root.join("src/about.html");
    write_file(&about, b"<html></html>");

    let options = make_options()
        .with_postprocess(|html, _| Ok(html.replace("</body>", "<!-- global --></body>")));
    let (mut session, emitter) = make_session(&root, options);

    session
        .add_entry(
            "index",
            &index,
            EntryOptions::new().with_postprocess(|html, info| {
                Ok(html.replace("</body>", &format!("<!-- {} --></body>", info.entry)))
            }),
        )
        .unwrap();
    session
        .add_entry("about", &about, EntryOptions::new())
        .unwrap();

    session.start_build().unwrap();
    for source in [&index, &about] {
        session
            .add_module(IrModule::template(
                source,
                vec![IrSegment::text("<html><head></head><body></body></html>")],
            ))
            .unwrap();
    }
    drive_to_done(&mut session);

    assert!(
        emitter
            .text_of("index.html")
            .unwrap()
            .contains("<!-- index -->")
    );
    assert!(
        emitter
            .text_of("about.html")
            .unwrap()
            .contains("<!-- global -->")
    );
}

#[test]
fn test_watch_failure_renders_error_overlay() {
    let (_temp, root) = make_project();
    let index = root.join("src/index.html");
    let (mut session, emitter) = make_session(&root, make_options());
    session.set_watch(true);

    session
        .add_entry("index", &index, EntryOptions::new())
        .unwrap();
    // No module arrives for the entry, so the render phase fails it
    session.start_build().unwrap();
    session.render().unwrap();
    session.post_process().unwrap();
    let error = session.finish().unwrap_err();
    assert!(error.to_string().contains("no built template module"));

    // The page slot shows the failure instead of going stale
    let page = emitter.text_of("index.html").unwrap();
    assert!(page.contains("build error"));
    assert!(page.contains("no built template module"));
}

#[test]
fn test_abort_discards_everything() {
    let (_temp, root) = make_project();
    let index = root.join("src/index.html");
    let (mut session, emitter) = make_session(&root, make_options());

    session
        .add_entry("index", &index, EntryOptions::new())
        .unwrap();
    session
        .resolve_reference("index", "./css/main.css", &index, None)
        .unwrap();
    session.start_build().unwrap();
    session
        .add_module(IrModule::template(
            &index,
            vec![
                IrSegment::text("<html><head><link href=\""),
                IrSegment::reference("./css/main.css"),
                IrSegment::text("\"></head></html>"),
            ],
        ))
        .unwrap();
    session.render().unwrap();

    session.abort();

    assert!(emitter.is_empty());
    assert_eq!(session.phase(), Phase::Done);
    assert!(session.entries().is_empty());
    assert_eq!(session.collection().record_count(), 0);
    assert_eq!(session.outputs().len(), 0);
}

#[test]
fn test_phase_order_is_enforced() {
    let (_temp, root) = make_project();
    let index = root.join("src/index.html");
    let (mut session, _emitter) = make_session(&root, make_options());
    session
        .add_entry("index", &index, EntryOptions::new())
        .unwrap();

    let module = IrModule::template(&index, vec![IrSegment::text("<html></html>")]);
    assert!(matches!(
        session.add_module(module.clone()),
        Err(BuildError::Config(_))
    ));
    assert!(matches!(session.render(), Err(BuildError::Config(_))));

    session.start_build().unwrap();
    assert!(matches!(
        session.add_entry("late", &index, EntryOptions::new()),
        Err(BuildError::Config(_))
    ));
    assert!(matches!(session.post_process(), Err(BuildError::Config(_))));

    session.add_module(module).unwrap();
    session.render().unwrap();
    session.post_process().unwrap();
    session.finish().unwrap();
}

#[test]
fn test_referenced_script_becomes_dynamic_target() {
    let (_temp, root) = make_project();
    let index = root.join("src/index.html");
    let (mut session, emitter) = make_session(&root, make_options());

    session
        .add_entry("index", &index, EntryOptions::new())
        .unwrap();
    session
        .resolve_reference("index", "./js/main.js", &index, Some(AssetKind::Script))
        .unwrap();

    let script = session.entries().get("main").unwrap();
    assert!(script.dynamic);
    assert_eq!(script.source, root.join("src/js/main.js"));
    assert_eq!(session.entries().len(), 2);

    session.start_build().unwrap();
    session
        .add_module(IrModule::template(
            &index,
            vec![
                IrSegment::text("<html><head></head><body><script src=\""),
                IrSegment::reference("./js/main.js"),
                IrSegment::text("\"></script></body></html>"),
            ],
        ))
        .unwrap();
    drive_to_done(&mut session);

    // Built as a script, never rendered as a page
    assert!(emitter.contains("js/main.js"));
    assert!(!emitter.contains("main.html"));
    let page = emitter.text_of("index.html").unwrap();
    assert!(page.contains("src=\"js/main.js\""));
}

#[test]
fn test_attribution_banner_split_into_license_file() {
    let (_temp, root) = make_project();
    let index = root.join("src/index.html");
    write_file(
        &root.join("src/css/vendor.css"),
        b"/*! MIT License */\nbody { margin: 0 }\n",
    );
    let options = make_options().with_keep_attribution_files(true);
    let (mut session, emitter) = make_session(&root, options);

    session
        .add_entry("index", &index, EntryOptions::new())
        .unwrap();
    session.start_build().unwrap();
    session
        .add_module(IrModule::template(
            &index,
            vec![
                IrSegment::text("<html><head><link href=\""),
                IrSegment::reference("./css/vendor.css"),
                IrSegment::text("\"></head></html>"),
            ],
        ))
        .unwrap();
    drive_to_done(&mut session);

    assert_eq!(
        emitter.text_of("css/vendor.css").unwrap(),
        "body { margin: 0 }\n"
    );
    assert_eq!(
        emitter.text_of("css/vendor.css.LICENSE.txt").unwrap(),
        "/*! MIT License */\n"
    );
}

#[test]
fn test_attribution_file_staged_for_deletion_when_dropped() {
    let (_temp, root) = make_project();
    let index = root.join("src/index.html");
    write_file(
        &root.join("src/css/vendor.css"),
        b"/*! MIT License */\nbody { margin: 0 }\n",
    );
    let (mut session, emitter) = make_session(&root, make_options());

    session
        .add_entry("index", &index, EntryOptions::new())
        .unwrap();
    session.start_build().unwrap();
    session
        .add_module(IrModule::template(
            &index,
            vec![
                IrSegment::text("<html><head><link href=\""),
                IrSegment::reference("./css/vendor.css"),
                IrSegment::text("\"></head></html>"),
            ],
        ))
        .unwrap();
    session.render().unwrap();

    // Staged while rendering, deleted only at finish
    assert!(session.trash().is_staged("css/vendor.css.LICENSE.txt"));

    session.post_process().unwrap();
    session.finish().unwrap();

    assert!(emitter.contains("css/vendor.css"));
    assert!(!emitter.contains("css/vendor.css.LICENSE.txt"));
    assert!(session.trash().is_empty());
}
