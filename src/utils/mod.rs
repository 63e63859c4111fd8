//! Utility modules shared across the engine.

pub mod hash;
pub mod html;
pub mod mime;
pub mod path;
