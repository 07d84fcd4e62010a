/// Heuristic UI element detection.
///
/// Five independent passes (buttons, text, inputs, containers, icons) propose
/// candidate regions. Candidates are then thresholded and deduplicated with
/// greedy IoU suppression, and finalised with colour and accessibility metrics.
use std::sync::Arc;

use image::{GrayImage, RgbImage};

use crate::config::DetectorConfig;
use crate::perception::color::{accessibility_for, analyze_colors};
use crate::perception::contours::{approximate_polygon, find_external_contours, Contour};
use crate::perception::corners::corner_clusters;
use crate::perception::edges::{canny, dilate, edge_density, mean_stddev, to_gray};
use crate::perception::regions::{stable_regions, StableRegionParams};
use crate::perception::traits::{DetectionBackend, TextRecognizer};
use crate::perception::types::{BoundingBox, ElementType, UIElement};

const TEXT_CONFIDENCE: f32 = 0.7;
const INPUT_CONFIDENCE: f32 = 0.6;
const ICON_CONFIDENCE: f32 = 0.4;
const CONTAINER_CONFIDENCE_CAP: f32 = 0.8;
const MIN_OCR_CONFIDENCE: f32 = 0.5;
/// Pixels trimmed from each side before judging colour flatness: the traced
/// contour sits on the element's boundary, not inside it.
const FLATNESS_INSET: u32 = 2;

/// Candidate region before colour and accessibility metrics are attached.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    kind: ElementType,
    bbox: BoundingBox,
    confidence: f32,
}

/// Outer contours of a Canny edge map, with one pixel of dilation so outlines
/// broken at corners by non-maximum suppression close up.
fn edge_contours(gray: &GrayImage, low: f32, high: f32) -> Vec<Contour> {
    find_external_contours(&dilate(&canny(gray, low, high)))
}

fn crop_gray(gray: &GrayImage, r: BoundingBox) -> GrayImage {
    image::imageops::crop_imm(gray, r.x, r.y, r.width, r.height).to_image()
}

/// Contour, stable-region and corner heuristics over plain `image` buffers.
pub struct HeuristicDetector {
    config: DetectorConfig,
    regions: StableRegionParams,
    recognizer: Option<Arc<dyn TextRecognizer>>,
}

impl HeuristicDetector {
    pub fn new(config: DetectorConfig) -> Self {
        tracing::info!(
            threshold = config.confidence_threshold,
            iou = config.dedup_iou_threshold,
            "heuristic detector initialised"
        );
        Self {
            config,
            regions: StableRegionParams::default(),
            recognizer: None,
        }
    }

    pub fn with_default() -> Self {
        Self::new(DetectorConfig::default())
    }

    /// Attach an OCR capability. It is consulted only when `enable_ocr` is set.
    pub fn with_recognizer(mut self, recognizer: Arc<dyn TextRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    // ── Public API ──────────────────────────────────────────────────────────

    /// Detect elements in an RGB frame, strongest first.
    pub fn detect_elements(&self, image: &RgbImage) -> Vec<UIElement> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            tracing::debug!("empty frame, nothing to detect");
            return Vec::new();
        }
        let gray = to_gray(image);

        let mut candidates = Vec::new();
        candidates.extend(self.detect_buttons(&gray));
        candidates.extend(self.detect_text_regions(&gray));
        candidates.extend(self.detect_input_fields(&gray));
        candidates.extend(self.detect_containers(&gray));
        candidates.extend(self.detect_icons(&gray));
        let proposed = candidates.len();

        let kept = self.filter_and_deduplicate(candidates);
        let elements: Vec<UIElement> = kept
            .into_iter()
            .map(|c| self.finalize(image, c))
            .collect();

        tracing::debug!(proposed, kept = elements.len(), width = w, height = h, "detection finished");
        elements
    }

    // ── Detection passes ────────────────────────────────────────────────────

    fn detect_buttons(&self, gray: &GrayImage) -> Vec<Candidate> {
        let mut out = Vec::new();
        for contour in edge_contours(gray, 50.0, 150.0) {
            let bbox = contour.bounding_box();
            let area = contour.area();
            if !(30..=300).contains(&bbox.width) || !(20..=80).contains(&bbox.height) || area <= 600.0 {
                continue;
            }
            let aspect = bbox.aspect_ratio();
            if !(1.2..=8.0).contains(&aspect) {
                continue;
            }
            if !self.is_flat(gray, bbox) {
                continue;
            }
            out.push(Candidate {
                kind: ElementType::Button,
                bbox,
                confidence: (area / bbox.area() as f64).min(1.0) as f32,
            });
        }
        tracing::trace!(count = out.len(), "button pass");
        out
    }

    fn detect_text_regions(&self, gray: &GrayImage) -> Vec<Candidate> {
        let out: Vec<Candidate> = stable_regions(gray, &self.regions)
            .into_iter()
            .filter(|r| r.width > 10 && r.height > 8 && r.width < 500 && r.height < 100)
            .filter(|r| is_text_like(&crop_gray(gray, *r)))
            .map(|bbox| Candidate {
                kind: ElementType::Text,
                bbox,
                confidence: TEXT_CONFIDENCE,
            })
            .collect();
        tracing::trace!(count = out.len(), "text pass");
        out
    }

    fn detect_input_fields(&self, gray: &GrayImage) -> Vec<Candidate> {
        let mut out = Vec::new();
        for contour in edge_contours(gray, 30.0, 100.0) {
            let bbox = contour.bounding_box();
            if bbox.width <= 50 || bbox.height <= 15 || bbox.width >= 400 || bbox.height >= 60 {
                continue;
            }
            if bbox.aspect_ratio() <= 2.0 {
                continue;
            }
            if !is_input_field_like(&crop_gray(gray, bbox)) {
                continue;
            }
            out.push(Candidate {
                kind: ElementType::Input,
                bbox,
                confidence: INPUT_CONFIDENCE,
            });
        }
        tracing::trace!(count = out.len(), "input pass");
        out
    }

    fn detect_containers(&self, gray: &GrayImage) -> Vec<Candidate> {
        let image_area = gray.width() as f64 * gray.height() as f64;
        let mut out = Vec::new();
        for contour in edge_contours(gray, 20.0, 60.0) {
            let bbox = contour.bounding_box();
            let area = contour.area();
            if bbox.width <= 100 || bbox.height <= 100 || area <= 10_000.0 {
                continue;
            }
            out.push(Candidate {
                kind: ElementType::Container,
                bbox,
                confidence: (area / image_area).min(CONTAINER_CONFIDENCE_CAP as f64) as f32,
            });
        }
        tracing::trace!(count = out.len(), "container pass");
        out
    }

    fn detect_icons(&self, gray: &GrayImage) -> Vec<Candidate> {
        let (w, h) = gray.dimensions();
        let half = self.config.icon_region_size / 2;
        let min_side = self.config.icon_region_size / 2;
        let out: Vec<Candidate> = corner_clusters(gray)
            .into_iter()
            .take(self.config.max_icon_candidates)
            .filter_map(|c| {
                let x1 = c.center_x.saturating_sub(half);
                let y1 = c.center_y.saturating_sub(half);
                let x2 = (c.center_x + half).min(w);
                let y2 = (c.center_y + half).min(h);
                if x2 - x1 <= min_side || y2 - y1 <= min_side {
                    return None;
                }
                Some(Candidate {
                    kind: ElementType::Icon,
                    bbox: BoundingBox::new(x1, y1, x2 - x1, y2 - y1),
                    confidence: ICON_CONFIDENCE,
                })
            })
            .collect();
        tracing::trace!(count = out.len(), "icon pass");
        out
    }

    // ── Post-processing ─────────────────────────────────────────────────────

    /// Drop weak candidates, then greedy IoU suppression across all kinds.
    fn filter_and_deduplicate(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let mut filtered: Vec<Candidate> = candidates
            .into_iter()
            .filter(|c| c.confidence >= self.config.confidence_threshold && !c.bbox.is_empty())
            .collect();
        filtered.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut kept: Vec<Candidate> = Vec::new();
        for cand in filtered {
            let duplicate = kept
                .iter()
                .any(|k| k.bbox.iou(&cand.bbox) > self.config.dedup_iou_threshold);
            if !duplicate {
                kept.push(cand);
            }
        }
        kept
    }

    fn finalize(&self, image: &RgbImage, c: Candidate) -> UIElement {
        let bbox = c.bbox.clip_to(image.width(), image.height());
        let (text, text_confidence) = self.extract_text(image, c.kind, bbox);
        UIElement {
            kind: c.kind,
            bbox,
            confidence: c.confidence.clamp(0.0, 1.0),
            text,
            text_confidence,
            color_stats: analyze_colors(image, bbox),
            accessibility_score: accessibility_for(c.kind, image, bbox),
            is_interactive: c.kind.is_interactive(),
        }
    }

    fn extract_text(
        &self,
        image: &RgbImage,
        kind: ElementType,
        bbox: BoundingBox,
    ) -> (Option<String>, Option<f32>) {
        if !self.config.enable_ocr || !kind.carries_text() || bbox.width <= 10 || bbox.height <= 8 {
            return (None, None);
        }
        let Some(recognizer) = &self.recognizer else {
            return (None, None);
        };
        match recognizer.recognize(image, bbox) {
            Ok(found) => {
                let text = found.text.trim();
                if !text.is_empty() && found.confidence >= MIN_OCR_CONFIDENCE {
                    tracing::debug!(kind = kind.as_str(), text = %text, "text extracted");
                    (Some(text.to_string()), Some(found.confidence.clamp(0.0, 1.0)))
                } else {
                    (None, None)
                }
            }
            Err(e) => {
                tracing::warn!(kind = kind.as_str(), error = %e, "OCR failed for element");
                (None, None)
            }
        }
    }

    // ── Region heuristics ───────────────────────────────────────────────────

    /// Buttons are visually uniform inside their outline.
    fn is_flat(&self, gray: &GrayImage, bbox: BoundingBox) -> bool {
        let inner = if bbox.width > 2 * FLATNESS_INSET + 2 && bbox.height > 2 * FLATNESS_INSET + 2 {
            BoundingBox::new(
                bbox.x + FLATNESS_INSET,
                bbox.y + FLATNESS_INSET,
                bbox.width - 2 * FLATNESS_INSET,
                bbox.height - 2 * FLATNESS_INSET,
            )
        } else {
            bbox
        };
        let (_, stddev) = mean_stddev(&crop_gray(gray, inner));
        stddev < self.config.button_max_stddev
    }
}

impl DetectionBackend for HeuristicDetector {
    fn detect(&self, image: &RgbImage) -> Vec<UIElement> {
        self.detect_elements(image)
    }

    fn name(&self) -> &'static str {
        "heuristic"
    }
}

/// Glyph strokes give moderate edge density: more than flat fills, less than noise.
fn is_text_like(region: &GrayImage) -> bool {
    let density = edge_density(region);
    density > 0.05 && density < 0.3
}

/// Input fields have a closed rectangular border.
fn is_input_field_like(region: &GrayImage) -> bool {
    if region.width() == 0 || region.height() == 0 {
        return false;
    }
    edge_contours(region, 50.0, 150.0).iter().any(|c| {
        let approx = approximate_polygon(&c.points, 0.02 * c.perimeter());
        approx.len() == 4
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::UxMirrorResult;
    use crate::perception::traits::RecognizedText;
    use image::Rgb;

    fn white(w: u32, h: u32) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb([255, 255, 255]))
    }

    fn fill(img: &mut RgbImage, r: BoundingBox, color: [u8; 3]) {
        for y in r.y..r.bottom() {
            for x in r.x..r.right() {
                img.put_pixel(x, y, Rgb(color));
            }
        }
    }

    fn outline(img: &mut RgbImage, r: BoundingBox, color: [u8; 3]) {
        for x in r.x..r.right() {
            img.put_pixel(x, r.y, Rgb(color));
            img.put_pixel(x, r.bottom() - 1, Rgb(color));
        }
        for y in r.y..r.bottom() {
            img.put_pixel(r.x, y, Rgb(color));
            img.put_pixel(r.right() - 1, y, Rgb(color));
        }
    }

    /// A busy frame: panel, filled buttons, outlined fields and a checkerboard.
    fn busy_frame() -> RgbImage {
        let mut img = white(640, 480);
        fill(&mut img, BoundingBox::new(20, 20, 400, 300), [225, 228, 235]);
        fill(&mut img, BoundingBox::new(40, 40, 120, 36), [30, 90, 200]);
        fill(&mut img, BoundingBox::new(180, 40, 90, 30), [200, 40, 40]);
        outline(&mut img, BoundingBox::new(40, 120, 220, 32), [90, 90, 90]);
        for y in 350..420 {
            for x in 460..600 {
                if ((x / 7) + (y / 7)) % 2 == 0 {
                    img.put_pixel(x, y, Rgb([0, 0, 0]));
                }
            }
        }
        img
    }

    #[test]
    fn empty_image_yields_no_elements() {
        let det = HeuristicDetector::with_default();
        assert!(det.detect_elements(&RgbImage::new(0, 0)).is_empty());
        assert!(det.detect_elements(&RgbImage::new(0, 50)).is_empty());
        assert!(det.detect_elements(&RgbImage::new(50, 0)).is_empty());
    }

    #[test]
    fn blank_image_yields_no_elements() {
        let det = HeuristicDetector::with_default();
        assert!(det.detect_elements(&white(300, 200)).is_empty());
    }

    #[test]
    fn solid_dark_rectangle_is_one_button_or_container() {
        let mut img = white(600, 400);
        let drawn = BoundingBox::new(50, 50, 150, 60);
        fill(&mut img, drawn, [30, 30, 30]);

        let elements = HeuristicDetector::with_default().detect_elements(&img);
        let boxes: Vec<&UIElement> = elements
            .iter()
            .filter(|e| matches!(e.kind, ElementType::Button | ElementType::Container))
            .collect();
        assert_eq!(boxes.len(), 1, "{elements:#?}");
        assert!(boxes[0].bbox.iou(&drawn) > 0.7, "{:?}", boxes[0].bbox);
        assert!(boxes[0].is_interactive || boxes[0].kind == ElementType::Container);
    }

    #[test]
    fn detected_elements_respect_invariants() {
        let img = busy_frame();
        let det = HeuristicDetector::with_default();
        let elements = det.detect_elements(&img);
        assert!(!elements.is_empty());

        for e in &elements {
            assert!(e.bbox.fits_within(img.width(), img.height()), "{e:?}");
            assert!((0.0..=1.0).contains(&e.confidence));
            assert!((0.0..=1.0).contains(&e.accessibility_score));
            assert!((0.0..=1.0).contains(&e.color_stats.contrast_ratio));
            assert!((0.0..=1.0).contains(&e.color_stats.brightness));
            assert!(e.confidence >= det.config().confidence_threshold);
            assert_eq!(e.is_interactive, e.kind.is_interactive());
        }
        for (i, a) in elements.iter().enumerate() {
            for b in &elements[i + 1..] {
                assert!(a.bbox.iou(&b.bbox) <= 0.5, "{a:?} overlaps {b:?}");
            }
        }
        for pair in elements.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn rectangular_border_is_input_like() {
        let mut img = white(120, 40);
        outline(&mut img, BoundingBox::new(4, 4, 110, 30), [80, 80, 80]);
        assert!(is_input_field_like(&to_gray(&img)));
        assert!(!is_input_field_like(&to_gray(&white(120, 40))));
    }

    #[test]
    fn higher_confidence_wins_deduplication() {
        let det = HeuristicDetector::with_default();
        let kept = det.filter_and_deduplicate(vec![
            Candidate {
                kind: ElementType::Icon,
                bbox: BoundingBox::new(10, 10, 40, 40),
                confidence: 0.4,
            },
            Candidate {
                kind: ElementType::Button,
                bbox: BoundingBox::new(12, 12, 40, 40),
                confidence: 0.9,
            },
            Candidate {
                kind: ElementType::Text,
                bbox: BoundingBox::new(200, 10, 40, 20),
                confidence: 0.7,
            },
            Candidate {
                kind: ElementType::Container,
                bbox: BoundingBox::new(300, 10, 40, 20),
                confidence: 0.1,
            },
        ]);
        let kinds: Vec<ElementType> = kept.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![ElementType::Button, ElementType::Text]);
    }

    struct FixedText(&'static str, f32);

    impl TextRecognizer for FixedText {
        fn recognize(&self, _: &RgbImage, _: BoundingBox) -> UxMirrorResult<RecognizedText> {
            Ok(RecognizedText {
                text: self.0.to_string(),
                confidence: self.1,
            })
        }
    }

    #[test]
    fn ocr_text_is_attached_only_when_confident() {
        let mut img = white(600, 400);
        fill(&mut img, BoundingBox::new(50, 50, 150, 60), [30, 30, 30]);

        let confident = HeuristicDetector::with_default().with_recognizer(Arc::new(FixedText("Submit", 0.9)));
        let button = confident
            .detect_elements(&img)
            .into_iter()
            .find(|e| e.kind == ElementType::Button)
            .unwrap();
        assert_eq!(button.text.as_deref(), Some("Submit"));
        assert_eq!(button.text_confidence, Some(0.9));

        let unsure = HeuristicDetector::with_default().with_recognizer(Arc::new(FixedText("Subm1t", 0.3)));
        for e in unsure.detect_elements(&img) {
            assert!(e.text.is_none() && e.text_confidence.is_none());
        }

        let mut cfg = DetectorConfig::default();
        cfg.enable_ocr = false;
        let disabled = HeuristicDetector::new(cfg).with_recognizer(Arc::new(FixedText("Submit", 0.9)));
        for e in disabled.detect_elements(&img) {
            assert!(e.text.is_none());
        }
    }

    #[test]
    fn icons_never_carry_text() {
        let mut img = white(600, 400);
        fill(&mut img, BoundingBox::new(50, 50, 150, 60), [30, 30, 30]);
        let det = HeuristicDetector::with_default().with_recognizer(Arc::new(FixedText("x", 1.0)));
        for e in det.detect_elements(&img).iter().filter(|e| e.kind == ElementType::Icon) {
            assert!(e.text.is_none());
        }
    }
}
