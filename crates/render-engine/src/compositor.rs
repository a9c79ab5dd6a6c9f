//! Alpha compositing of layer drawings onto a frame.
//!
//! All arithmetic is integer so that the same inputs produce byte-identical
//! output on every run and every platform.

use image::RgbaImage;

use crate::drawing::Drawing;

/// Convert a `[0, 1]` opacity to the `0..=255` integer scale.
pub fn opacity_to_u8(opacity: f32) -> u8 {
    (opacity.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[inline]
fn div255(v: u32) -> u32 {
    (v + 127) / 255
}

/// Blend `drawing` over `dst` with `opacity`, clipped to the frame.
///
/// Straight-alpha "over": with `a = src_a * opacity` and the destination
/// weight `w = dst_a * (255 - a) / 255`, the output alpha is `a + w` and each
/// colour channel is `(src * a + dst * w) / (a + w)`, rounded. On an opaque
/// destination `w = 255 - a` and this is `(src * a + dst * (255 - a) + 127) / 255`.
pub fn blend_drawing(dst: &mut RgbaImage, drawing: &Drawing, opacity: f32) {
    let op = opacity_to_u8(opacity) as u32;
    if op == 0 {
        return;
    }

    let (fw, fh) = (dst.width() as i64, dst.height() as i64);
    let (x0, y0) = (drawing.x as i64, drawing.y as i64);
    let (cw, ch) = (drawing.canvas.width() as i64, drawing.canvas.height() as i64);

    // Intersection of the drawing with the frame, in canvas coordinates.
    let sx0 = (-x0).max(0);
    let sy0 = (-y0).max(0);
    let sx1 = cw.min(fw - x0);
    let sy1 = ch.min(fh - y0);
    if sx0 >= sx1 || sy0 >= sy1 {
        return;
    }

    for sy in sy0..sy1 {
        for sx in sx0..sx1 {
            let src = drawing.canvas.get_pixel(sx as u32, sy as u32).0;
            let a = div255(src[3] as u32 * op);
            if a == 0 {
                continue;
            }
            let px = dst.get_pixel_mut((x0 + sx) as u32, (y0 + sy) as u32);
            let d = px.0;
            let w = div255(d[3] as u32 * (255 - a));
            let out_a = a + w;
            let mix = |sc: u8, dc: u8| ((sc as u32 * a + dc as u32 * w + out_a / 2) / out_a) as u8;
            px.0 = [
                mix(src[0], d[0]),
                mix(src[1], d[1]),
                mix(src[2], d[2]),
                out_a as u8,
            ];
        }
    }
}
