//! Deterministic resampling to an exact target size.
//!
//! Downscaling uses exact area averaging: every output pixel is the
//! coverage-weighted mean of the source pixels under it, computed in
//! premultiplied alpha so transparent borders don't bleed dark fringes.
//! Enlarging (in either axis) uses Catmull-Rom bicubic. Both paths are pure
//! functions of the input pixels, so the same input always yields the same
//! output.

use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use tracing::debug;

/// Resample `img` to exactly `width` × `height`.
pub fn resample(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let (src_w, src_h) = (img.width(), img.height());
    if (src_w, src_h) == (width, height) {
        return img.clone();
    }

    if width <= src_w && height <= src_h {
        debug!("Area-average {src_w}x{src_h} → {width}x{height}");
        DynamicImage::ImageRgba8(area_average(&img.to_rgba8(), width, height))
    } else {
        debug!("Bicubic {src_w}x{src_h} → {width}x{height}");
        img.resize_exact(width, height, FilterType::CatmullRom)
    }
}

/// For each destination index along one axis, the source indices it covers
/// and their normalised weights.
fn axis_taps(src: u32, dst: u32) -> Vec<Vec<(u32, f32)>> {
    let scale = f64::from(src) / f64::from(dst);
    (0..dst)
        .map(|i| {
            let start = f64::from(i) * scale;
            let end = f64::from(i + 1) * scale;
            let first = start.floor() as u32;
            let last = (end.ceil() as u32).min(src);
            (first..last)
                .filter_map(|s| {
                    let covered = end.min(f64::from(s) + 1.0) - start.max(f64::from(s));
                    (covered > 0.0).then(|| (s, (covered / scale) as f32))
                })
                .collect()
        })
        .collect()
}

fn area_average(src: &RgbaImage, dst_w: u32, dst_h: u32) -> RgbaImage {
    let (src_w, src_h) = src.dimensions();
    let x_taps = axis_taps(src_w, dst_w);
    let y_taps = axis_taps(src_h, dst_h);

    // Horizontal pass, premultiplied: dst_w × src_h.
    let mut rows = vec![[0f32; 4]; dst_w as usize * src_h as usize];
    for y in 0..src_h {
        for (ox, taps) in x_taps.iter().enumerate() {
            let mut acc = [0f32; 4];
            for &(sx, w) in taps {
                let p = src.get_pixel(sx, y).0;
                let a = f32::from(p[3]) / 255.0;
                acc[0] += f32::from(p[0]) * a * w;
                acc[1] += f32::from(p[1]) * a * w;
                acc[2] += f32::from(p[2]) * a * w;
                acc[3] += f32::from(p[3]) * w;
            }
            rows[y as usize * dst_w as usize + ox] = acc;
        }
    }

    // Vertical pass, then un-premultiply.
    let mut out = RgbaImage::new(dst_w, dst_h);
    for (oy, taps) in y_taps.iter().enumerate() {
        for ox in 0..dst_w as usize {
            let mut acc = [0f32; 4];
            for &(sy, w) in taps {
                let p = rows[sy as usize * dst_w as usize + ox];
                for c in 0..4 {
                    acc[c] += p[c] * w;
                }
            }
            let alpha = acc[3];
            let px = if alpha > 0.0 {
                let unmul = 255.0 / alpha;
                [
                    to_u8(acc[0] * unmul),
                    to_u8(acc[1] * unmul),
                    to_u8(acc[2] * unmul),
                    to_u8(alpha),
                ]
            } else {
                [0, 0, 0, 0]
            };
            out.put_pixel(ox as u32, oy as u32, Rgba(px));
        }
    }
    out
}

fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
