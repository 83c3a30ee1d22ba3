//! Image attachment normalizer.
//!
//! Given an input file of unknown or untrusted format, try to decode it as
//! JPEG, PNG or HEIC and re-encode the result as JPEG. When no decoder
//! recognizes the input, a diagnostic fallback image is written instead, so
//! downstream consumers always receive a valid JPEG file.

pub mod convert;
pub mod encode;
pub mod errors;
pub mod fallback;
pub mod heic;
pub mod logging;
pub mod probe;

pub use convert::{normalize, Outcome};
pub use encode::{write_jpeg, write_jpeg_with_exif, JPEG_QUALITY};
pub use errors::{NormalizeError, Result};
pub use fallback::{render_failure_image, write_failure_image};
pub use probe::{probe, CandidateFormat, Decoded};

/// Version banner, printed by `-v` and rendered into the fallback image.
pub const PROGRAM_BANNER: &str = concat!(
    "imgnorm v",
    env!("CARGO_PKG_VERSION"),
    " - image attachment normalizer"
);
