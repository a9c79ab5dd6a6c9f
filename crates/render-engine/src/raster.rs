//! Drawing primitives on top of `imageproc`.
//!
//! Layers draw onto their own transparent canvas, so primitives write pixels
//! directly; blending against the video happens once, in the compositor.

use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_circle_mut, draw_line_segment_mut,
};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

use crate::geometry::polar;

/// RGBA color, serialized as `[r, g, b, a]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const WHITE: Color = Color([255, 255, 255, 255]);
    pub const RED: Color = Color([230, 40, 40, 255]);
    pub const GREEN: Color = Color([40, 200, 80, 255]);
    pub const YELLOW: Color = Color([250, 210, 40, 255]);
    pub const GREY: Color = Color([150, 150, 150, 255]);
    pub const PANEL: Color = Color([0, 0, 0, 150]);

    pub fn rgba(self) -> Rgba<u8> {
        Rgba(self.0)
    }
}

/// Filled rectangle clipped to the canvas.
pub fn fill_rect(canvas: &mut RgbaImage, x: i32, y: i32, w: u32, h: u32, color: Color) {
    if w == 0 || h == 0 {
        return;
    }
    draw_filled_rect_mut(canvas, Rect::at(x, y).of_size(w, h), color.rgba());
}

/// Filled rectangle with rounded corners.
pub fn fill_rounded_rect(canvas: &mut RgbaImage, x: i32, y: i32, w: u32, h: u32, radius: u32, color: Color) {
    let r = radius.min(w / 2).min(h / 2);
    if r == 0 {
        fill_rect(canvas, x, y, w, h, color);
        return;
    }
    let ri = r as i32;
    fill_rect(canvas, x + ri, y, w - 2 * r, h, color);
    fill_rect(canvas, x, y + ri, w, h - 2 * r, color);
    let (right, bottom) = (x + w as i32 - 1 - ri, y + h as i32 - 1 - ri);
    for (cx, cy) in [(x + ri, y + ri), (right, y + ri), (x + ri, bottom), (right, bottom)] {
        draw_filled_circle_mut(canvas, (cx, cy), ri, color.rgba());
    }
}

pub fn disc(canvas: &mut RgbaImage, center: (f32, f32), radius: f32, color: Color) {
    draw_filled_circle_mut(
        canvas,
        (center.0.round() as i32, center.1.round() as i32),
        radius.round().max(0.0) as i32,
        color.rgba(),
    );
}

/// Circle outline `thickness` pixels wide, growing inward from `radius`.
pub fn ring(canvas: &mut RgbaImage, center: (f32, f32), radius: f32, thickness: u32, color: Color) {
    let c = (center.0.round() as i32, center.1.round() as i32);
    let r = radius.round() as i32;
    for i in 0..thickness.max(1) as i32 {
        if r - i > 0 {
            draw_hollow_circle_mut(canvas, c, r - i, color.rgba());
        }
    }
}

/// Line segment `width` pixels wide.
pub fn thick_line(canvas: &mut RgbaImage, from: (f32, f32), to: (f32, f32), width: f32, color: Color) {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let len = (dx * dx + dy * dy).sqrt();
    if len == 0.0 {
        disc(canvas, from, width / 2.0, color);
        return;
    }
    // Unit normal, stepped in half-pixel strokes to avoid holes.
    let (nx, ny) = (-dy / len, dx / len);
    let half = (width.max(1.0) - 1.0) / 2.0;
    let steps = (half * 4.0).ceil() as i32;
    for i in 0..=steps {
        let off = -half + i as f32 * 0.5;
        if off > half {
            break;
        }
        draw_line_segment_mut(
            canvas,
            (from.0 + nx * off, from.1 + ny * off),
            (to.0 + nx * off, to.1 + ny * off),
            color.rgba(),
        );
    }
}

/// Connected line through `points`.
pub fn polyline(canvas: &mut RgbaImage, points: &[(f32, f32)], width: f32, color: Color) {
    for pair in points.windows(2) {
        thick_line(canvas, pair[0], pair[1], width, color);
    }
}

/// Arc from `start_deg` to `end_deg` (clockwise from 12 o'clock).
pub fn arc(
    canvas: &mut RgbaImage,
    center: (f32, f32),
    radius: f32,
    start_deg: f32,
    end_deg: f32,
    width: f32,
    color: Color,
) {
    let sweep = end_deg - start_deg;
    let segments = ((sweep.abs() / 4.0).ceil() as usize).max(1);
    let points: Vec<(f32, f32)> = (0..=segments)
        .map(|i| polar(center, radius, start_deg + sweep * i as f32 / segments as f32))
        .collect();
    polyline(canvas, &points, width, color);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 0]))
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut canvas = blank(10, 10);
        fill_rect(&mut canvas, -5, -5, 8, 8, Color::WHITE);
        assert_eq!(canvas.get_pixel(2, 2).0, [255, 255, 255, 255]);
        assert_eq!(canvas.get_pixel(3, 3).0, [0, 0, 0, 0]);
    }

    #[test]
    fn test_rounded_rect_leaves_corners() {
        let mut canvas = blank(20, 20);
        fill_rounded_rect(&mut canvas, 0, 0, 20, 20, 6, Color::PANEL);
        assert_eq!(canvas.get_pixel(0, 0).0[3], 0);
        assert_eq!(canvas.get_pixel(10, 10).0, Color::PANEL.0);
    }

    #[test]
    fn test_thick_line_has_width() {
        let mut canvas = blank(20, 20);
        thick_line(&mut canvas, (2.0, 10.0), (18.0, 10.0), 3.0, Color::RED);
        assert_eq!(canvas.get_pixel(10, 9).0, Color::RED.0);
        assert_eq!(canvas.get_pixel(10, 11).0, Color::RED.0);
        assert_eq!(canvas.get_pixel(10, 14).0[3], 0);
    }
}
