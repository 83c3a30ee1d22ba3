//! HEIC/HEIF decoding via system libheif.
//!
//! Decodes the primary image to interleaved 8-bit RGB and extracts the Exif
//! block, already normalized for splicing into a JPEG APP1 segment. libheif
//! strips metadata from the decoded bitmap, so the block has to be carried
//! separately and re-attached at encode time.

use image::DynamicImage;
use libheif_rs::{ColorSpace, HeifContext, ImageHandle, LibHeif, RgbChroma};
use tracing::debug;

use crate::errors::{NormalizeError, Result};

/// The `Exif\0\0` identifier a JPEG APP1 segment starts with.
const EXIF_IDENTIFIER: &[u8] = b"Exif\0\0";

/// A decoded HEIC image plus its APP1-ready Exif payload, if any.
pub struct HeicImage {
    pub image: DynamicImage,
    pub exif: Option<Vec<u8>>,
}

/// Decode the primary image of a HEIC/HEIF byte stream.
///
/// Anything that is not a well-formed HEIC container fails here; the caller
/// treats that as an ordinary probe miss.
pub fn decode_from_bytes(data: &[u8]) -> Result<HeicImage> {
    let lib_heif = LibHeif::new();

    let ctx = HeifContext::read_from_bytes(data)
        .map_err(|e| NormalizeError::HeicDecode(format!("Failed to read container: {}", e)))?;

    let handle = ctx
        .primary_image_handle()
        .map_err(|e| NormalizeError::HeicDecode(format!("Failed to get primary image: {}", e)))?;

    let width = handle.width();
    let height = handle.height();
    let exif = extract_exif(&handle);

    let decoded = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(|e| NormalizeError::HeicDecode(format!("Failed to decode: {}", e)))?;

    let planes = decoded.planes();
    let plane = planes
        .interleaved
        .ok_or_else(|| NormalizeError::HeicDecode("No interleaved RGB plane".to_string()))?;

    // Rows may carry stride padding; copy only the pixel bytes.
    let row_bytes = width as usize * 3;
    let mut raw = Vec::with_capacity(row_bytes * height as usize);
    for row in plane.data.chunks(plane.stride).take(height as usize) {
        let row = row
            .get(..row_bytes)
            .ok_or_else(|| NormalizeError::HeicDecode("Plane shorter than stride".to_string()))?;
        raw.extend_from_slice(row);
    }

    let image = image::RgbImage::from_raw(width, height, raw)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| NormalizeError::HeicDecode("Failed to create RGB image".to_string()))?;

    Ok(HeicImage { image, exif })
}

/// Pull the first Exif metadata block off the handle. Absent or garbled
/// metadata is not an error; the image is simply written without APP1.
fn extract_exif(handle: &ImageHandle) -> Option<Vec<u8>> {
    let block = handle
        .all_metadata()
        .into_iter()
        .find(|m| m.item_type.0 == *b"Exif")?;

    let payload = normalize_exif_payload(&block.raw_data);
    if payload.is_none() {
        debug!(len = block.raw_data.len(), "Ignoring malformed Exif block");
    }
    payload
}

/// HEIF stores an Exif item as a 4-byte big-endian offset to the TIFF header
/// followed by the payload; a JPEG APP1 segment wants `Exif\0\0` + TIFF.
fn normalize_exif_payload(raw: &[u8]) -> Option<Vec<u8>> {
    if raw.len() < 4 {
        return None;
    }
    let offset = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
    let body = &raw[4..];

    // Common case: the skipped region is exactly the Exif identifier.
    if offset == EXIF_IDENTIFIER.len() && body.starts_with(EXIF_IDENTIFIER) {
        return Some(body.to_vec());
    }

    let tiff = body.get(offset..)?;
    if tiff.is_empty() {
        return None;
    }
    let mut payload = Vec::with_capacity(EXIF_IDENTIFIER.len() + tiff.len());
    payload.extend_from_slice(EXIF_IDENTIFIER);
    payload.extend_from_slice(tiff);
    Some(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIFF_HEADER: &[u8] = &[0x4D, 0x4D, 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08];

    #[test]
    fn test_exif_payload_with_identifier_prefix() {
        let mut raw = vec![0x00, 0x00, 0x00, 0x06];
        raw.extend_from_slice(EXIF_IDENTIFIER);
        raw.extend_from_slice(TIFF_HEADER);

        let payload = normalize_exif_payload(&raw).unwrap();
        assert!(payload.starts_with(EXIF_IDENTIFIER));
        assert_eq!(&payload[EXIF_IDENTIFIER.len()..], TIFF_HEADER);
    }

    #[test]
    fn test_exif_payload_bare_tiff_gets_identifier() {
        let mut raw = vec![0x00, 0x00, 0x00, 0x00];
        raw.extend_from_slice(TIFF_HEADER);

        let payload = normalize_exif_payload(&raw).unwrap();
        assert!(payload.starts_with(EXIF_IDENTIFIER));
        assert_eq!(&payload[EXIF_IDENTIFIER.len()..], TIFF_HEADER);
    }

    #[test]
    fn test_exif_payload_rejects_short_or_overflowing_blocks() {
        assert!(normalize_exif_payload(&[]).is_none());
        assert!(normalize_exif_payload(&[0x00, 0x00]).is_none());
        // Offset points past the end of the block.
        assert!(normalize_exif_payload(&[0x00, 0x00, 0x10, 0x00, 0x01]).is_none());
        // Offset lands exactly on the end: nothing left to carry.
        assert!(normalize_exif_payload(&[0x00, 0x00, 0x00, 0x01, 0x01]).is_none());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_from_bytes(&[]).is_err());
        assert!(decode_from_bytes(&[0u8; 64]).is_err());
        assert!(decode_from_bytes(b"not a heic container at all").is_err());
    }
}
