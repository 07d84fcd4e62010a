/// Draw colour-coded bounding boxes for detected elements onto a frame.
///
/// Used for debugging detections: the output is a PNG that can be written to
/// disk or embedded as base64 in a perception frame.
use image::{RgbImage, RgbaImage};

use crate::errors::{UxMirrorError, UxMirrorResult};
use crate::perception::types::{ElementType, UIElement};

/// RGBA colour palette indexed by element kind.
fn element_colour(kind: ElementType) -> [u8; 4] {
    match kind {
        ElementType::Button    => [255, 68, 68, 220],   // red
        ElementType::Input     => [68, 255, 68, 220],   // green
        ElementType::Link      => [68, 68, 255, 220],   // blue
        ElementType::Icon      => [255, 170, 0, 220],   // orange
        ElementType::Menu      => [0, 220, 255, 220],   // cyan
        ElementType::Text      => [170, 170, 170, 200], // grey
        ElementType::Image     => [255, 200, 100, 220], // light orange
        ElementType::Container => [120, 120, 80, 180],  // dark olive
        ElementType::Unknown   => [255, 255, 255, 200], // white
    }
}

/// Overlay element boxes on `frame`. Boxes thicken on wide frames.
pub fn annotate_frame(frame: &RgbImage, elements: &[UIElement]) -> RgbaImage {
    let mut canvas = image::DynamicImage::ImageRgb8(frame.clone()).to_rgba8();
    let thickness: i32 = if frame.width() > 1600 { 3 } else { 2 };

    for elem in elements {
        let b = elem.bbox;
        if b.is_empty() {
            continue;
        }
        let x1 = b.x as i32;
        let y1 = b.y as i32;
        let x2 = b.right() as i32 - 1;
        let y2 = b.bottom() as i32 - 1;
        draw_rect(&mut canvas, x1, y1, x2, y2, element_colour(elem.kind), thickness);
    }
    canvas
}

/// Annotate and encode as PNG.
pub fn annotate_png(frame: &RgbImage, elements: &[UIElement]) -> UxMirrorResult<Vec<u8>> {
    let canvas = annotate_frame(frame, elements);
    let mut out = Vec::new();
    image::DynamicImage::ImageRgba8(canvas)
        .write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
        .map_err(|e| UxMirrorError::Perception(format!("PNG encode: {e}")))?;
    Ok(out)
}

// ── Drawing primitives ──────────────────────────────────────────────────────

fn draw_rect(canvas: &mut RgbaImage, x1: i32, y1: i32, x2: i32, y2: i32, col: [u8; 4], thickness: i32) {
    let (iw, ih) = (canvas.width() as i32, canvas.height() as i32);
    let mut plot = |x: i32, y: i32| {
        if (0..iw).contains(&x) && (0..ih).contains(&y) {
            set_pixel(canvas, x as u32, y as u32, col);
        }
    };

    for t in 0..thickness {
        for x in x1..=x2 {
            plot(x, y1 + t);
            if y2 - t != y1 + t {
                plot(x, y2 - t);
            }
        }
        for y in (y1 + thickness)..=(y2 - thickness) {
            plot(x1 + t, y);
            if x2 - t != x1 + t {
                plot(x2 - t, y);
            }
        }
    }
}

fn set_pixel(canvas: &mut RgbaImage, x: u32, y: u32, col: [u8; 4]) {
    let p = canvas.get_pixel_mut(x, y);
    let a = col[3] as f32 / 255.0;
    p[0] = (p[0] as f32 * (1.0 - a) + col[0] as f32 * a).round() as u8;
    p[1] = (p[1] as f32 * (1.0 - a) + col[1] as f32 * a).round() as u8;
    p[2] = (p[2] as f32 * (1.0 - a) + col[2] as f32 * a).round() as u8;
    p[3] = 255;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::types::{BoundingBox, ColorStats};
    use image::Rgb;

    fn element(kind: ElementType, bbox: BoundingBox) -> UIElement {
        UIElement {
            kind,
            bbox,
            confidence: 0.9,
            text: None,
            text_confidence: None,
            color_stats: ColorStats::NEUTRAL,
            accessibility_score: 0.5,
            is_interactive: kind.is_interactive(),
        }
    }

    #[test]
    fn box_outline_is_drawn_and_interior_untouched() {
        let frame = RgbImage::from_pixel(50, 50, Rgb([0, 0, 0]));
        let canvas = annotate_frame(&frame, &[element(ElementType::Button, BoundingBox::new(10, 10, 20, 20))]);
        assert_ne!(canvas.get_pixel(10, 10).0[..3], [0, 0, 0]);
        assert_ne!(canvas.get_pixel(29, 29).0[..3], [0, 0, 0]);
        assert_eq!(canvas.get_pixel(20, 20).0, [0, 0, 0, 255]);
        assert_eq!(canvas.get_pixel(5, 5).0, [0, 0, 0, 255]);
    }

    #[test]
    fn boxes_touching_the_border_do_not_panic() {
        let frame = RgbImage::from_pixel(8, 8, Rgb([255, 255, 255]));
        let els = [
            element(ElementType::Icon, BoundingBox::new(0, 0, 8, 8)),
            element(ElementType::Text, BoundingBox::new(6, 6, 1, 1)),
            element(ElementType::Container, BoundingBox::new(3, 3, 0, 0)),
        ];
        let png = annotate_png(&frame, &els).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 8));
    }
}
