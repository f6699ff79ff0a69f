//! WGSL shader sources.
//!
//! Sources are plain consts compiled into pipelines on first use. The
//! volume shader is a template expanded per render style.

pub mod line;
pub mod marker;
pub mod mesh;
pub mod pick;
pub mod text;
pub mod texture;
pub mod volume;
