//! Trial-decode format probing.
//!
//! Candidates are tried in a fixed priority order; the first decoder that
//! accepts the input wins. The read position is rewound to the start before
//! every attempt, since a failed decoder can leave the cursor anywhere.
//! All candidates failing is a normal outcome ("unrecognized input"), not an
//! error: empty, truncated and garbage files all land there.

use std::io::{BufReader, Read, Seek, SeekFrom};

use image::{DynamicImage, ImageFormat};
use tracing::debug;

use crate::errors::Result;
use crate::heic;

/// Candidate formats, in probe priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateFormat {
    Jpeg,
    Png,
    Heic,
}

/// The fixed order attempts are made in.
pub const PROBE_ORDER: [CandidateFormat; 3] = [
    CandidateFormat::Jpeg,
    CandidateFormat::Png,
    CandidateFormat::Heic,
];

impl CandidateFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateFormat::Jpeg => "JPEG",
            CandidateFormat::Png => "PNG",
            CandidateFormat::Heic => "HEIC",
        }
    }

    /// One decode attempt. The reader is already positioned at offset 0.
    fn try_decode<R: Read + Seek>(&self, reader: &mut R) -> Result<Decoded> {
        match self {
            CandidateFormat::Jpeg => decode_with(reader, ImageFormat::Jpeg, *self),
            CandidateFormat::Png => decode_with(reader, ImageFormat::Png, *self),
            CandidateFormat::Heic => {
                let mut data = Vec::new();
                reader.read_to_end(&mut data)?;
                let decoded = heic::decode_from_bytes(&data)?;
                Ok(Decoded {
                    image: decoded.image,
                    format: *self,
                    exif: decoded.exif,
                })
            }
        }
    }
}

impl std::fmt::Display for CandidateFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successful probe: the decoded bitmap, which candidate matched, and for
/// HEIC the extracted Exif payload.
pub struct Decoded {
    pub image: DynamicImage,
    pub format: CandidateFormat,
    pub exif: Option<Vec<u8>>,
}

fn decode_with<R: Read + Seek>(
    reader: &mut R,
    format: ImageFormat,
    tag: CandidateFormat,
) -> Result<Decoded> {
    let image = image::load(BufReader::new(&mut *reader), format)?;
    Ok(Decoded {
        image,
        format: tag,
        exif: None,
    })
}

/// Try every candidate in order; `Ok(None)` means no decoder matched.
pub fn probe<R: Read + Seek>(reader: &mut R) -> Result<Option<Decoded>> {
    for format in PROBE_ORDER {
        reader.seek(SeekFrom::Start(0))?;
        match format.try_decode(reader) {
            Ok(decoded) => {
                debug!(format = format.as_str(), "decode attempt succeeded");
                return Ok(Some(decoded));
            }
            Err(err) => {
                debug!(format = format.as_str(), error = %err, "decode attempt failed");
            }
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, RgbImage};
    use std::io::Cursor;

    fn sample_image() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(16, 8, |x, y| {
            image::Rgb([(x * 16) as u8, (y * 32) as u8, 128])
        }))
    }

    fn encoded(format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        sample_image().write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_probe_recognizes_jpeg() {
        let mut cursor = Cursor::new(encoded(ImageFormat::Jpeg));
        let decoded = probe(&mut cursor).unwrap().expect("JPEG should match");
        assert_eq!(decoded.format, CandidateFormat::Jpeg);
        assert_eq!(decoded.image.dimensions(), (16, 8));
        assert!(decoded.exif.is_none());
    }

    #[test]
    fn test_probe_recognizes_png_after_jpeg_miss() {
        // PNG sits second in the order, so a match proves the failed JPEG
        // attempt left the cursor in a usable state.
        let mut cursor = Cursor::new(encoded(ImageFormat::Png));
        let decoded = probe(&mut cursor).unwrap().expect("PNG should match");
        assert_eq!(decoded.format, CandidateFormat::Png);
        assert_eq!(decoded.image.dimensions(), (16, 8));
    }

    #[test]
    fn test_probe_rejects_empty_input() {
        let mut cursor = Cursor::new(Vec::new());
        assert!(probe(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn test_probe_rejects_garbage() {
        let mut cursor = Cursor::new(vec![0xAB; 512]);
        assert!(probe(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn test_probe_rejects_truncated_jpeg() {
        let bytes = encoded(ImageFormat::Jpeg);
        let mut cursor = Cursor::new(bytes[..24].to_vec());
        assert!(probe(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn test_probe_order_is_fixed() {
        assert_eq!(
            PROBE_ORDER,
            [
                CandidateFormat::Jpeg,
                CandidateFormat::Png,
                CandidateFormat::Heic
            ]
        );
    }
}
