//! Error types for the normalizer pipeline.
//!
//! Per-candidate decode misses are not errors at all; they surface as a
//! `None` from the prober. The variants here cover the conditions that end
//! an invocation: unreadable input, a broken embedded font, or a sink that
//! refuses the final JPEG.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Failed to decode HEIC: {0}")]
    HeicDecode(String),

    #[error("Failed to parse embedded font: {0}")]
    FontParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, NormalizeError>;
