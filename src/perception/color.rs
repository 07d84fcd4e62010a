/// Colour and accessibility metrics for rectangular regions of an RGB frame.
///
/// Every function clips the region to the frame first; a region with no
/// pixels left yields neutral (zero) metrics instead of an error.
use image::{GenericImageView, RgbImage};

use crate::perception::edges::luma;
use crate::perception::types::{BoundingBox, ColorStats, ElementType};

/// Minimum comfortable touch target edge, in pixels.
pub const MIN_TOUCH_TARGET: u32 = 44;
/// Height under which an input field is considered cramped.
const MIN_INPUT_HEIGHT: f32 = 30.0;
/// Accessibility assigned to containers, which carry no content of their own.
const CONTAINER_ACCESSIBILITY: f32 = 0.5;

struct RegionMoments {
    mean_rgb: [f64; 3],
    gray_mean: f64,
    gray_std: f64,
}

fn moments(image: &RgbImage, region: BoundingBox) -> Option<RegionMoments> {
    let r = region.clip_to(image.width(), image.height());
    if r.is_empty() {
        return None;
    }
    let view = image.view(r.x, r.y, r.width, r.height);
    let mut rgb = [0.0f64; 3];
    let (mut sum, mut sq) = (0.0f64, 0.0f64);
    for (_, _, p) in view.pixels() {
        rgb[0] += p[0] as f64;
        rgb[1] += p[1] as f64;
        rgb[2] += p[2] as f64;
        let g = luma(p.0) as f64;
        sum += g;
        sq += g * g;
    }
    let n = r.area() as f64;
    let gray_mean = sum / n;
    Some(RegionMoments {
        mean_rgb: [rgb[0] / n, rgb[1] / n, rgb[2] / n],
        gray_mean,
        gray_std: (sq / n - gray_mean * gray_mean).max(0.0).sqrt(),
    })
}

pub fn analyze_colors(image: &RgbImage, region: BoundingBox) -> ColorStats {
    let Some(m) = moments(image, region) else {
        return ColorStats::NEUTRAL;
    };
    ColorStats {
        dominant_color: [
            m.mean_rgb[0] as u8,
            m.mean_rgb[1] as u8,
            m.mean_rgb[2] as u8,
        ],
        contrast_ratio: (m.gray_std / 255.0).clamp(0.0, 1.0) as f32,
        brightness: (m.gray_mean / 255.0).clamp(0.0, 1.0) as f32,
    }
}

/// Average of a touch-target size score and a contrast score.
pub fn assess_accessibility(image: &RgbImage, region: BoundingBox) -> f32 {
    let r = region.clip_to(image.width(), image.height());
    if r.is_empty() {
        return 0.0;
    }
    let contrast = analyze_colors(image, r).contrast_ratio;
    let min_area = (MIN_TOUCH_TARGET * MIN_TOUCH_TARGET) as f32;
    let size_score = (r.area() as f32 / min_area).min(1.0);
    let contrast_score = (contrast * 3.0).min(1.0);
    (size_score + contrast_score) / 2.0
}

/// Text legibility is driven by contrast alone.
pub fn assess_text_accessibility(image: &RgbImage, region: BoundingBox) -> f32 {
    match moments(image, region) {
        Some(m) => (m.gray_std / 50.0).min(1.0) as f32,
        None => 0.0,
    }
}

/// Input fields need enough height to click into and a visible border.
pub fn assess_input_accessibility(image: &RgbImage, region: BoundingBox) -> f32 {
    let r = region.clip_to(image.width(), image.height());
    if r.is_empty() {
        return 0.0;
    }
    let contrast = analyze_colors(image, r).contrast_ratio;
    let size_score = (r.height as f32 / MIN_INPUT_HEIGHT).min(1.0);
    let contrast_score = (contrast * 2.0).min(1.0);
    (size_score + contrast_score) / 2.0
}

/// Accessibility score appropriate to an element kind.
pub fn accessibility_for(kind: ElementType, image: &RgbImage, region: BoundingBox) -> f32 {
    let score = match kind {
        ElementType::Text => assess_text_accessibility(image, region),
        ElementType::Input => assess_input_accessibility(image, region),
        ElementType::Container => CONTAINER_ACCESSIBILITY,
        _ => assess_accessibility(image, region),
    };
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn half_black_half_white(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, _| {
            if x < w / 2 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        })
    }

    #[test]
    fn uniform_region_has_no_contrast() {
        let img = RgbImage::from_pixel(20, 20, Rgb([200, 100, 50]));
        let stats = analyze_colors(&img, BoundingBox::new(0, 0, 20, 20));
        assert_eq!(stats.dominant_color, [200, 100, 50]);
        assert_eq!(stats.contrast_ratio, 0.0);
        assert!((stats.brightness - luma([200, 100, 50]) as f32 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn split_region_has_half_contrast() {
        let img = half_black_half_white(10, 10);
        let stats = analyze_colors(&img, BoundingBox::new(0, 0, 10, 10));
        assert!((stats.contrast_ratio - 0.5).abs() < 1e-6);
        assert!((stats.brightness - 0.5).abs() < 1e-6);
    }

    #[test]
    fn zero_area_region_is_neutral() {
        let img = half_black_half_white(10, 10);
        assert_eq!(analyze_colors(&img, BoundingBox::new(3, 3, 0, 5)), ColorStats::NEUTRAL);
        assert_eq!(analyze_colors(&img, BoundingBox::new(50, 50, 5, 5)), ColorStats::NEUTRAL);
        assert_eq!(assess_accessibility(&img, BoundingBox::new(0, 0, 0, 0)), 0.0);
        assert_eq!(assess_text_accessibility(&img, BoundingBox::new(0, 0, 0, 0)), 0.0);
        assert_eq!(assess_input_accessibility(&img, BoundingBox::new(0, 0, 0, 0)), 0.0);
    }

    #[test]
    fn large_high_contrast_region_scores_full_accessibility() {
        let img = half_black_half_white(60, 60);
        assert!((assess_accessibility(&img, BoundingBox::new(0, 0, 60, 60)) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn small_flat_region_scores_low() {
        let img = RgbImage::from_pixel(60, 60, Rgb([128, 128, 128]));
        let score = assess_accessibility(&img, BoundingBox::new(0, 0, 22, 22));
        // size 484/1936 = 0.25, contrast 0
        assert!((score - 0.125).abs() < 1e-6);
    }

    #[test]
    fn kind_specific_scores_stay_in_range() {
        let img = half_black_half_white(80, 40);
        let region = BoundingBox::new(0, 0, 80, 40);
        for kind in [
            ElementType::Button,
            ElementType::Input,
            ElementType::Text,
            ElementType::Container,
            ElementType::Icon,
        ] {
            let s = accessibility_for(kind, &img, region);
            assert!((0.0..=1.0).contains(&s), "{kind:?} -> {s}");
        }
        assert_eq!(accessibility_for(ElementType::Container, &img, region), 0.5);
    }
}
