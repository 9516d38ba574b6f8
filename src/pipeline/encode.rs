//! Image encoding: `DynamicImage` → JPEG/PNG bytes carrying DPI metadata,
//! kept under a byte ceiling.
//!
//! DPI is metadata, not geometry: JPEG stores it in the JFIF APP0 density
//! fields, PNG in a `pHYs` chunk (pixels per metre). The `image` crate's PNG
//! encoder cannot write `pHYs`, so PNG goes through the `png` crate directly.
//!
//! ## Meeting the ceiling
//!
//! JPEG walks the [`QualityPolicy`] ladder from the initial quality down to
//! the floor and keeps the first encoding that fits. PNG is lossless: it is
//! encoded once at best compression and rejected if still too large.

use crate::catalog::ImageEncoding;
use crate::config::QualityPolicy;
use crate::error::FileError;
use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use image::{DynamicImage, ExtendedColorType, GenericImageView, Rgb, RgbImage};
use std::io::Cursor;
use tracing::debug;

const METRES_PER_INCH: f64 = 0.0254;

/// An encoding that fits the ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    /// JPEG quality used; `None` for lossless output.
    pub quality: Option<u8>,
}

/// Encode `img` in `encoding`, tagged with `dpi`, within `max_bytes`.
pub fn encode_within(
    img: &DynamicImage,
    encoding: ImageEncoding,
    dpi: u32,
    max_bytes: u64,
    policy: &QualityPolicy,
) -> Result<Encoded, FileError> {
    if encoding.is_lossy() {
        let mut last_len = 0u64;
        for quality in policy.ladder() {
            let bytes = encode_jpeg(img, quality, dpi)?;
            last_len = bytes.len() as u64;
            debug!("JPEG q={quality} → {last_len} bytes (limit {max_bytes})");
            if last_len <= max_bytes {
                return Ok(Encoded {
                    bytes,
                    quality: Some(quality),
                });
            }
        }
        return Err(FileError::TooLarge {
            size: last_len,
            limit: max_bytes,
        });
    }

    let bytes = encode_png(img, dpi)?;
    let len = bytes.len() as u64;
    debug!("PNG → {len} bytes (limit {max_bytes})");
    if len > max_bytes {
        return Err(FileError::TooLarge {
            size: len,
            limit: max_bytes,
        });
    }
    Ok(Encoded {
        bytes,
        quality: None,
    })
}

/// Encode as baseline JPEG with JFIF density in dots per inch.
pub fn encode_jpeg(img: &DynamicImage, quality: u8, dpi: u32) -> Result<Vec<u8>, FileError> {
    let (w, h) = img.dimensions();
    let mut buf = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
        encoder.set_pixel_density(PixelDensity::dpi(dpi_u16(dpi)));
        let result = if is_gray(img) {
            let luma = img.to_luma8();
            encoder.encode(luma.as_raw(), w, h, ExtendedColorType::L8)
        } else {
            let rgb = flatten_on_white(img);
            encoder.encode(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)
        };
        result.map_err(encode_failed)?;
    }
    Ok(buf)
}

/// Encode as PNG at best compression with a `pHYs` chunk.
pub fn encode_png(img: &DynamicImage, dpi: u32) -> Result<Vec<u8>, FileError> {
    let (w, h) = img.dimensions();
    let ppm = (f64::from(dpi) / METRES_PER_INCH).round() as u32;

    let (color, raw) = match img {
        DynamicImage::ImageLuma8(g) => (png::ColorType::Grayscale, g.as_raw().clone()),
        DynamicImage::ImageRgb8(rgb) => (png::ColorType::Rgb, rgb.as_raw().clone()),
        other if other.color().has_alpha() => (png::ColorType::Rgba, other.to_rgba8().into_raw()),
        other if is_gray(other) => (png::ColorType::Grayscale, other.to_luma8().into_raw()),
        other => (png::ColorType::Rgb, other.to_rgb8().into_raw()),
    };

    let mut buf = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buf, w, h);
        encoder.set_color(color);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Best);
        encoder.set_pixel_dims(Some(png::PixelDimensions {
            xppu: ppm,
            yppu: ppm,
            unit: png::Unit::Meter,
        }));
        let mut writer = encoder.write_header().map_err(encode_failed)?;
        writer.write_image_data(&raw).map_err(encode_failed)?;
        writer.finish().map_err(encode_failed)?;
    }
    Ok(buf)
}

/// Read the DPI tagged in JPEG (JFIF) or PNG (`pHYs`) bytes.
pub fn read_dpi(bytes: &[u8]) -> Option<u32> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF, 0xE0]) {
        read_jfif_dpi(bytes)
    } else if bytes.starts_with(b"\x89PNG\r\n\x1a\n") {
        read_phys_dpi(bytes)
    } else {
        None
    }
}

/// Pixel size from the image header, without decoding pixel data.
pub fn read_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn encode_failed(e: impl std::fmt::Display) -> FileError {
    FileError::Unsupported {
        detail: format!("encoding failed: {e}"),
    }
}

fn dpi_u16(dpi: u32) -> u16 {
    u16::try_from(dpi).unwrap_or(u16::MAX)
}

fn is_gray(img: &DynamicImage) -> bool {
    matches!(
        img,
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageLuma16(_)
    )
}

/// Composite any alpha onto white: JPEG has no transparency.
fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, p) in rgba.enumerate_pixels() {
        let a = u32::from(p[3]);
        let blend = |c: u8| ((u32::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
        out.put_pixel(x, y, Rgb([blend(p[0]), blend(p[1]), blend(p[2])]));
    }
    out
}

fn read_jfif_dpi(bytes: &[u8]) -> Option<u32> {
    // SOI, APP0 marker, length(2), "JFIF\0", version(2), units, Xdensity(2)
    let app0 = bytes.get(6..16)?;
    if &app0[..5] != b"JFIF\0" {
        return None;
    }
    let units = app0[7];
    let x_density = u32::from(u16::from_be_bytes([app0[8], app0[9]]));
    match units {
        1 => Some(x_density),
        2 => Some((f64::from(x_density) * 2.54).round() as u32),
        _ => None,
    }
}

fn read_phys_dpi(bytes: &[u8]) -> Option<u32> {
    let reader = png::Decoder::new(Cursor::new(bytes)).read_info().ok()?;
    let dims = reader.info().pixel_dims?;
    match dims.unit {
        png::Unit::Meter => Some((f64::from(dims.xppu) * METRES_PER_INCH).round() as u32),
        png::Unit::Unspecified => None,
    }
}
