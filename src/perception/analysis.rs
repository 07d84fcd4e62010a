/// Screen-level analysis: turns a frame and its detected elements into an
/// iteration record for the confidence engine.
use std::collections::BTreeMap;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::confidence_engine::iteration::IterationInput;
use crate::perception::color::MIN_TOUCH_TARGET;
use crate::perception::edges::{laplacian_variance, mean_stddev, to_gray};
use crate::perception::types::{ElementType, UIElement};

/// Whole-frame gray stddev under which contrast is reported as low.
const LOW_CONTRAST_STDDEV: f32 = 30.0;
const LOW_ACCESSIBILITY: f32 = 0.5;
const QUALITY_RECOMMENDATION_BELOW: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// Contrast plus Laplacian sharpness, normalised to [0, 1].
pub fn assess_quality(image: &RgbImage) -> f64 {
    let gray = to_gray(image);
    if gray.width() == 0 || gray.height() == 0 {
        return 0.0;
    }
    let (_, contrast) = mean_stddev(&gray);
    let sharpness = laplacian_variance(&gray);
    ((contrast as f64 / 100.0 + sharpness / 1000.0) / 2.0).clamp(0.0, 1.0)
}

pub fn check_accessibility(image: &RgbImage, elements: &[UIElement]) -> Vec<String> {
    let mut issues = Vec::new();

    let gray = to_gray(image);
    if gray.width() > 0 && gray.height() > 0 && mean_stddev(&gray).1 < LOW_CONTRAST_STDDEV {
        issues.push("Low color contrast detected".to_string());
    }

    let small = elements
        .iter()
        .filter(|e| e.is_interactive)
        .filter(|e| e.bbox.width < MIN_TOUCH_TARGET || e.bbox.height < MIN_TOUCH_TARGET)
        .count();
    if small > 0 {
        issues.push(format!("{small} touch targets below minimum size"));
    }

    let unlabeled = elements
        .iter()
        .filter(|e| e.kind == ElementType::Image && e.text.as_deref().map_or(true, str::is_empty))
        .count();
    if unlabeled > 0 {
        issues.push(format!("{unlabeled} images may lack alt text"));
    }

    let weak = elements
        .iter()
        .filter(|e| e.accessibility_score < LOW_ACCESSIBILITY)
        .count();
    if weak > 0 {
        issues.push(format!("{weak} elements with low accessibility score"));
    }

    issues
}

pub fn generate_recommendations(quality_score: f64, issues: &[String]) -> Vec<String> {
    let mut recs = Vec::new();
    if quality_score < QUALITY_RECOMMENDATION_BELOW {
        recs.push("Improve image quality and contrast".to_string());
    }
    for issue in issues {
        let rec = if issue.to_lowercase().contains("contrast") {
            "Increase color contrast for better readability"
        } else if issue.contains("touch targets") {
            "Increase size of interactive elements to 44x44px minimum"
        } else if issue.contains("alt text") {
            "Add descriptive alt text to images"
        } else if issue.contains("low accessibility score") {
            "Review low-scoring elements for size and contrast"
        } else {
            continue;
        };
        recs.push(rec.to_string());
    }
    recs
}

pub fn determine_severity(quality_score: f64, issues: &[String]) -> Severity {
    if issues.len() > 3 || quality_score < 0.5 {
        Severity::High
    } else if !issues.is_empty() {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Element counts keyed by kind name.
pub fn categorize(elements: &[UIElement]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for e in elements {
        *counts.entry(e.kind.as_str().to_string()).or_insert(0) += 1;
    }
    counts
}

pub fn describe(element_count: usize, quality_score: f64, issue_count: usize) -> String {
    let mut text = format!("Detected {element_count} UI elements, quality score: {quality_score:.2}");
    if issue_count > 0 {
        text.push_str(&format!(", {issue_count} accessibility issues found"));
    }
    text
}

/// Build the engine's ingestion record for one analysed frame.
///
/// `response_time` is in seconds; `change_score` comes from the change tracker.
pub fn summarize(
    image: &RgbImage,
    elements: &[UIElement],
    backend: &str,
    response_time: Option<f64>,
    change_score: f64,
) -> IterationInput {
    let quality = assess_quality(image);
    let issues = check_accessibility(image, elements);
    let recommendations = generate_recommendations(quality, &issues);

    let mut metadata = serde_json::Map::new();
    metadata.insert("backend".into(), serde_json::json!(backend));
    metadata.insert("resolution".into(), serde_json::json!([image.width(), image.height()]));
    metadata.insert("element_types".into(), serde_json::json!(categorize(elements)));
    metadata.insert("severity".into(), serde_json::json!(determine_severity(quality, &issues)));
    metadata.insert(
        "description".into(),
        serde_json::json!(describe(elements.len(), quality, issues.len())),
    );

    IterationInput {
        quality_score: Some(quality),
        ui_elements_detected: Some(elements.len() as i64),
        accessibility_issues: issues,
        recommendations,
        response_time,
        change_score: Some(change_score),
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::types::{BoundingBox, ColorStats};
    use image::Rgb;

    fn element(kind: ElementType, w: u32, h: u32, accessibility: f32) -> UIElement {
        UIElement {
            kind,
            bbox: BoundingBox::new(0, 0, w, h),
            confidence: 0.8,
            text: None,
            text_confidence: None,
            color_stats: ColorStats::NEUTRAL,
            accessibility_score: accessibility,
            is_interactive: kind.is_interactive(),
        }
    }

    fn checkerboard(size: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        })
    }

    #[test]
    fn flat_frame_has_zero_quality() {
        let flat = RgbImage::from_pixel(32, 32, Rgb([120, 120, 120]));
        assert_eq!(assess_quality(&flat), 0.0);
        assert_eq!(assess_quality(&RgbImage::new(0, 0)), 0.0);
    }

    #[test]
    fn detailed_frame_has_full_quality() {
        assert!((assess_quality(&checkerboard(64)) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn accessibility_issues_are_counted_per_category() {
        let flat = RgbImage::from_pixel(100, 100, Rgb([200, 200, 200]));
        let elements = vec![
            element(ElementType::Button, 30, 30, 0.9),
            element(ElementType::Icon, 40, 40, 0.2),
            element(ElementType::Image, 80, 80, 0.8),
            element(ElementType::Container, 90, 90, 0.5),
            element(ElementType::Text, 20, 10, 0.9),
        ];
        let issues = check_accessibility(&flat, &elements);
        assert_eq!(
            issues,
            vec![
                "Low color contrast detected".to_string(),
                "2 touch targets below minimum size".to_string(),
                "1 images may lack alt text".to_string(),
                "1 elements with low accessibility score".to_string(),
            ]
        );
    }

    #[test]
    fn contrasty_frame_without_elements_has_no_issues() {
        assert!(check_accessibility(&checkerboard(32), &[]).is_empty());
    }

    #[test]
    fn recommendations_follow_issue_categories() {
        let issues = vec![
            "Low color contrast detected".to_string(),
            "3 touch targets below minimum size".to_string(),
            "something unrelated".to_string(),
        ];
        assert_eq!(
            generate_recommendations(0.5, &issues),
            vec![
                "Improve image quality and contrast".to_string(),
                "Increase color contrast for better readability".to_string(),
                "Increase size of interactive elements to 44x44px minimum".to_string(),
            ]
        );
        assert!(generate_recommendations(0.9, &[]).is_empty());
    }

    #[test]
    fn severity_levels() {
        let many: Vec<String> = (0..4).map(|i| i.to_string()).collect();
        assert_eq!(determine_severity(0.9, &many), Severity::High);
        assert_eq!(determine_severity(0.4, &[]), Severity::High);
        assert_eq!(determine_severity(0.9, &many[..1]), Severity::Medium);
        assert_eq!(determine_severity(0.9, &[]), Severity::Low);
    }

    #[test]
    fn summary_record_carries_metrics_and_metadata() {
        let frame = checkerboard(48);
        let elements = vec![element(ElementType::Button, 60, 50, 0.9), element(ElementType::Button, 60, 50, 0.9)];
        let input = summarize(&frame, &elements, "heuristic", Some(0.25), 0.4);

        assert_eq!(input.ui_elements_detected, Some(2));
        assert_eq!(input.response_time, Some(0.25));
        assert_eq!(input.change_score, Some(0.4));
        assert!(input.accessibility_issues.is_empty());
        assert_eq!(input.metadata["backend"], "heuristic");
        assert_eq!(input.metadata["element_types"]["button"], 2);
        assert_eq!(input.metadata["severity"], "low");
        assert_eq!(input.metadata["resolution"], serde_json::json!([48, 48]));
        assert_eq!(
            input.metadata["description"],
            "Detected 2 UI elements, quality score: 1.00"
        );
    }
}
