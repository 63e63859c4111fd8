//! Bindery - an asset graph engine for multi-page document bundling.
//!
//! Bindery sits between a template scanner and a host build system. The
//! host registers page entries, reports the references its scanner
//! found, and hands over built modules as intermediate output; bindery
//! resolves every reference once, keeps the per-entry asset graph in
//! discovery order, squashes script-imported style chains into bundles
//! and realizes the final text of every output.
//!
//! # Pipeline
//!
//! ```text
//! resolve -> build -> render -> post-process -> done
//! ```
//!
//! One [`session::BuildSession`] drives one pass over those phases.
//! Nothing is written before the session finishes, so a failed or
//! aborted pass leaves the output untouched.
//!
//! # Example
//!
//! ```ignore
//! use bindery::config::BundlerOptions;
//! use bindery::entry::EntryOptions;
//! use bindery::host::FsEmitter;
//! use bindery::render::{IrModule, IrSegment};
//! use bindery::session::BuildSession;
//! use std::sync::Arc;
//!
//! let emitter = Arc::new(FsEmitter::new("dist"));
//! let mut session = BuildSession::new("/project", BundlerOptions::new(), emitter)?;
//! session.add_entry("index", "/project/src/index.html", EntryOptions::new())?;
//! session.resolve_reference("index", "./css/main.css", "/project/src/index.html".as_ref(), None)?;
//! session.start_build()?;
//! session.add_module(IrModule::template(
//!     "/project/src/index.html",
//!     vec![
//!         IrSegment::text("<link href=\""),
//!         IrSegment::reference("./css/main.css"),
//!         IrSegment::text("\">"),
//!     ],
//! ))?;
//! session.render()?;
//! session.post_process()?;
//! session.finish()?;
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod graph;
pub mod host;
pub mod inline;
pub mod logger;
pub mod output;
pub mod render;
pub mod resolve;
pub mod scan;
pub mod session;
pub mod trash;
pub mod utils;

pub use config::BundlerOptions;
pub use error::BuildError;
pub use session::{BuildSession, Phase};
