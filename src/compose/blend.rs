use image::RgbaImage;
use rayon::prelude::*;

/// Part of the canvas a blend actually touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Blend `logo` onto `base` with its top-left corner at (`x`, `y`).
///
/// Each covered pixel becomes `a * logo + (1 - a) * base` per colour channel,
/// where `a` is the logo alpha as a fraction. Alpha composites source-over,
/// `a * 255 + (1 - a) * base_alpha`, so opaque canvases stay opaque and
/// transparent logo pixels leave the canvas untouched.
/// Pixels of the logo that fall outside `base` are skipped. Returns the
/// clipped region, or `None` when the logo misses the canvas entirely.
pub fn overlay(base: &mut RgbaImage, logo: &RgbaImage, x: i64, y: i64) -> Option<Region> {
    let (base_w, base_h) = (base.width() as i64, base.height() as i64);

    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + logo.width() as i64).min(base_w);
    let y1 = (y + logo.height() as i64).min(base_h);

    if x0 >= x1 || y0 >= y1 {
        return None;
    }

    let stride = base_w as usize * 4;
    let raw: &mut [u8] = &mut **base;
    let rows = &mut raw[y0 as usize * stride..y1 as usize * stride];

    rows.par_chunks_mut(stride).enumerate().for_each(|(row, pixels)| {
        let logo_y = (y0 + row as i64 - y) as u32;

        for canvas_x in x0..x1 {
            let src = logo.get_pixel((canvas_x - x) as u32, logo_y);
            let offset = canvas_x as usize * 4;
            blend_pixel(&mut pixels[offset..offset + 4], src.0);
        }
    });

    Some(Region {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0) as u32,
        height: (y1 - y0) as u32,
    })
}

#[inline]
fn blend_pixel(dst: &mut [u8], src: [u8; 4]) {
    let alpha = src[3] as f32 / 255.0;
    for c in 0..3 {
        let mixed = alpha * src[c] as f32 + (1.0 - alpha) * dst[c] as f32;
        dst[c] = mixed.round().clamp(0.0, 255.0) as u8;
    }
    let coverage = alpha * 255.0 + (1.0 - alpha) * dst[3] as f32;
    dst[3] = coverage.round().clamp(0.0, 255.0) as u8;
}
