//! End-to-end normalization: probe the input, re-encode on a match, fall
//! back to the diagnostic image otherwise. Exactly one of the two happens
//! per invocation.

use std::io::{Read, Seek, Write};

use tracing::info;

use crate::encode;
use crate::errors::Result;
use crate::fallback;
use crate::probe::{self, CandidateFormat};

/// What a single invocation produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The input decoded as the reported format and was re-encoded.
    Converted(CandidateFormat),
    /// No candidate matched; the diagnostic image was written instead.
    Fallback,
}

/// Normalize one input stream into `output`.
///
/// `display_name` is the input's base filename, rendered into the fallback
/// image when nothing matches. Errors here are fatal for the invocation:
/// either the byte source broke mid-probe or the sink refused the JPEG.
pub fn normalize<R, W>(reader: &mut R, display_name: &str, output: &mut W) -> Result<Outcome>
where
    R: Read + Seek,
    W: Write,
{
    match probe::probe(reader)? {
        Some(decoded) => {
            encode::write_jpeg_with_exif(output, &decoded.image, decoded.exif.as_deref())?;
            info!(
                file = display_name,
                format = decoded.format.as_str(),
                "input recognized, re-encoded as JPEG"
            );
            Ok(Outcome::Converted(decoded.format))
        }
        None => {
            info!(file = display_name, "no decoder matched, making fail image");
            fallback::write_failure_image(output, display_name)?;
            Ok(Outcome::Fallback)
        }
    }
}
