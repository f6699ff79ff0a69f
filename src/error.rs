//! Error taxonomy for the visualization core.
//!
//! Validation errors are raised synchronously to the caller and never
//! swallowed. Resource errors (shader compile, allocation, font load) are
//! logged and the offending object degrades its draw instead of aborting
//! the frame. Draw and pick passes never propagate errors; explicit API
//! calls do.

use thiserror::Error;

/// All errors surfaced by the public API.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad shape, out-of-range index, unknown style string, non-finite
    /// colormap stop and friends.
    #[error("validation: {0}")]
    Validation(String),

    /// GPU allocation failure, shader compile/link failure, font load
    /// failure. The offending object falls back to a degraded draw.
    #[error("resource: {0}")]
    Resource(String),

    /// Any operation on an object after `destroy`.
    #[error("object has been destroyed")]
    ObjectDestroyed,

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed SSDF/STL/OBJ input.
    #[error("format: {0}")]
    Format(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand used throughout the crate for validation failures.
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Error::Validation(msg.into())
    }

    pub fn resource<S: Into<String>>(msg: S) -> Self {
        Error::Resource(msg.into())
    }

    pub fn format<S: Into<String>>(msg: S) -> Self {
        Error::Format(msg.into())
    }
}
