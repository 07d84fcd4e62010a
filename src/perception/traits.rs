use async_trait::async_trait;
use image::RgbImage;

use crate::errors::UxMirrorResult;
use crate::perception::types::{BoundingBox, UIElement};

/// Strategy trait for UI element detection.
/// `HeuristicDetector` is the built-in implementation; learned models can be swapped in
/// without touching the confidence engine.
pub trait DetectionBackend: Send + Sync {
    /// Detect elements in an RGB frame. Never fails: unusable input yields an empty list.
    fn detect(&self, image: &RgbImage) -> Vec<UIElement>;

    fn name(&self) -> &'static str;
}

/// Text extracted from one region.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedText {
    pub text: String,
    pub confidence: f32,
}

/// Optional OCR capability consulted by the detector for text-bearing elements.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &RgbImage, region: BoundingBox) -> UxMirrorResult<RecognizedText>;
}

/// Where frames come from. Capture itself (OS APIs, browsers, VMs) lives outside this crate.
#[async_trait]
pub trait ScreenshotSource: Send + Sync {
    async fn capture(&self) -> UxMirrorResult<RgbImage>;
}
