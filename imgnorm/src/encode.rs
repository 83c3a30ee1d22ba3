//! JPEG re-encoding at fixed quality, with optional Exif splicing.
//!
//! The underlying encoder writes a bare JPEG and knows nothing about
//! metadata. To reconstruct an Exif-bearing file from a HEIC source, the
//! stream is routed through [`ExifSplicer`], which rewrites the head of the
//! stream as SOI + APP1 + payload before the compressed data.

use std::io::{self, Write};

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::warn;

use crate::errors::Result;

/// Fixed output quality for every re-encode path.
pub const JPEG_QUALITY: u8 = 100;

/// Largest payload an APP1 segment can carry: 16-bit length field, minus the
/// two bytes of the field itself.
const APP1_MAX_PAYLOAD: usize = 0xFFFF - 2;

const SOI: [u8; 2] = [0xFF, 0xD8];
const APP1: [u8; 2] = [0xFF, 0xE1];

/// Encode `image` as a plain JPEG at [`JPEG_QUALITY`].
pub fn write_jpeg<W: Write>(writer: &mut W, image: &DynamicImage) -> Result<()> {
    encode_rgb(writer, image)
}

/// Encode `image` as JPEG, splicing `exif` in as an APP1 segment when given.
///
/// A payload too large for one segment is dropped with a warning rather than
/// failing the conversion; the output is still a valid JPEG.
pub fn write_jpeg_with_exif<W: Write>(
    writer: &mut W,
    image: &DynamicImage,
    exif: Option<&[u8]>,
) -> Result<()> {
    match exif {
        Some(payload) if payload.len() <= APP1_MAX_PAYLOAD => {
            let mut splicer = ExifSplicer::new(&mut *writer, payload);
            encode_rgb(&mut splicer, image)
        }
        Some(payload) => {
            warn!(
                len = payload.len(),
                "Exif payload exceeds APP1 capacity, writing without metadata"
            );
            encode_rgb(writer, image)
        }
        None => encode_rgb(writer, image),
    }
}

fn encode_rgb<W: Write>(writer: &mut W, image: &DynamicImage) -> Result<()> {
    let encoder = JpegEncoder::new_with_quality(writer, JPEG_QUALITY);
    // Baseline JPEG carries no alpha; normalize everything else to 8-bit RGB.
    match image {
        DynamicImage::ImageRgb8(img) => img.write_with_encoder(encoder)?,
        other => other.to_rgb8().write_with_encoder(encoder)?,
    }
    Ok(())
}

/// `Write` adapter that injects an APP1 metadata segment between the
/// start-of-image marker and the compressed stream.
///
/// The wrapped encoder emits its own SOI as the first two bytes of the
/// stream. The splicer consumes that prefix and writes SOI, the APP1 marker,
/// a big-endian length of `2 + payload.len()`, and the payload in its place;
/// everything after the prefix is forwarded untouched.
pub struct ExifSplicer<'a, W: Write> {
    inner: W,
    payload: &'a [u8],
    /// SOI bytes consumed from the head of the incoming stream so far.
    skipped: usize,
}

impl<'a, W: Write> ExifSplicer<'a, W> {
    pub fn new(inner: W, payload: &'a [u8]) -> Self {
        Self {
            inner,
            payload,
            skipped: 0,
        }
    }

    fn write_prologue(&mut self) -> io::Result<()> {
        let segment_len = (self.payload.len() + 2) as u16;
        self.inner.write_all(&SOI)?;
        self.inner.write_all(&APP1)?;
        self.inner.write_all(&segment_len.to_be_bytes())?;
        self.inner.write_all(self.payload)
    }
}

impl<W: Write> Write for ExifSplicer<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.skipped < SOI.len() {
            if self.skipped == 0 {
                self.write_prologue()?;
            }
            let skip = (SOI.len() - self.skipped).min(buf.len());
            self.skipped += skip;
            if skip == buf.len() {
                return Ok(buf.len());
            }
            return self.inner.write(&buf[skip..]).map(|n| n + skip);
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
