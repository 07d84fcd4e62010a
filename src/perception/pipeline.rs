/// Perception pipeline: capture a frame, detect elements on a blocking worker,
/// score change against the previous frame and build the iteration record.
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use base64::Engine as _;
use image::RgbImage;
use serde::{Serialize, Serializer};

use crate::confidence_engine::iteration::IterationInput;
use crate::errors::{UxMirrorError, UxMirrorResult};
use crate::perception::analysis;
use crate::perception::annotator::annotate_png;
use crate::perception::stability::VisualChangeTracker;
use crate::perception::traits::{DetectionBackend, ScreenshotSource};
use crate::perception::types::UIElement;

/// Everything learned from one captured frame.
#[derive(Debug, Clone, Serialize)]
pub struct PerceptionFrame {
    pub width: u32,
    pub height: u32,
    pub elements: Vec<UIElement>,
    /// Ready to hand to `ConfidenceEngine::add_iteration`.
    pub iteration: IterationInput,
    /// PNG with element boxes drawn, when annotation is enabled.
    /// Serialized as base64.
    #[serde(rename = "annotated_png_base64", serialize_with = "png_as_base64")]
    pub annotated_png: Option<Vec<u8>>,
}

impl PerceptionFrame {
    pub fn annotated_png_base64(&self) -> Option<String> {
        self.annotated_png
            .as_ref()
            .map(|png| base64::engine::general_purpose::STANDARD.encode(png))
    }
}

fn png_as_base64<S: Serializer>(png: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
    match png {
        Some(bytes) => serializer.serialize_some(&base64::engine::general_purpose::STANDARD.encode(bytes)),
        None => serializer.serialize_none(),
    }
}

pub struct PerceptionPipeline {
    source: Arc<dyn ScreenshotSource>,
    detector: Arc<dyn DetectionBackend>,
    tracker: Arc<Mutex<VisualChangeTracker>>,
    annotate: bool,
}

impl PerceptionPipeline {
    pub fn new(source: Arc<dyn ScreenshotSource>, detector: Arc<dyn DetectionBackend>) -> Self {
        Self {
            source,
            detector,
            tracker: Arc::new(Mutex::new(VisualChangeTracker::with_default())),
            annotate: false,
        }
    }

    pub fn with_annotation(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }

    /// True once the last few frames were practically identical.
    pub fn is_settled(&self) -> UxMirrorResult<bool> {
        let tracker = self
            .tracker
            .lock()
            .map_err(|_| UxMirrorError::LockPoisoned("change tracker".into()))?;
        Ok(tracker.is_settled())
    }

    pub async fn step(&self) -> UxMirrorResult<PerceptionFrame> {
        let frame = self.source.capture().await?;
        let detector = Arc::clone(&self.detector);
        let tracker = Arc::clone(&self.tracker);
        let annotate = self.annotate;

        // Detection and image statistics are CPU-bound.
        let result = tokio::task::spawn_blocking(move || {
            analyse_frame(&frame, detector.as_ref(), &tracker, annotate)
        })
        .await
        .map_err(|e| UxMirrorError::Perception(format!("join: {e}")))??;

        tracing::debug!(
            backend = self.detector.name(),
            elements = result.elements.len(),
            width = result.width,
            height = result.height,
            "frame perceived"
        );
        Ok(result)
    }
}

fn analyse_frame(
    frame: &RgbImage,
    detector: &dyn DetectionBackend,
    tracker: &Mutex<VisualChangeTracker>,
    annotate: bool,
) -> UxMirrorResult<PerceptionFrame> {
    let started = Instant::now();
    let elements = detector.detect(frame);
    let response_time = started.elapsed().as_secs_f64();

    let change = tracker
        .lock()
        .map_err(|_| UxMirrorError::LockPoisoned("change tracker".into()))?
        .observe(frame);

    let iteration = analysis::summarize(frame, &elements, detector.name(), Some(response_time), change);

    let annotated_png = if annotate {
        Some(annotate_png(frame, &elements)?)
    } else {
        None
    };

    Ok(PerceptionFrame {
        width: frame.width(),
        height: frame.height(),
        elements,
        iteration,
        annotated_png,
    })
}

/// Replays screenshots from disk in order, one per capture.
pub struct FileSource {
    paths: tokio::sync::Mutex<VecDeque<PathBuf>>,
}

impl FileSource {
    pub fn new(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            paths: tokio::sync::Mutex::new(paths.into_iter().collect()),
        }
    }

    pub async fn remaining(&self) -> usize {
        self.paths.lock().await.len()
    }
}

#[async_trait]
impl ScreenshotSource for FileSource {
    async fn capture(&self) -> UxMirrorResult<RgbImage> {
        let path = self
            .paths
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| UxMirrorError::Perception("no frames left to replay".into()))?;

        tracing::debug!(path = %path.display(), "loading frame");
        tokio::task::spawn_blocking(move || -> UxMirrorResult<RgbImage> {
            Ok(image::open(&path)?.to_rgb8())
        })
        .await
        .map_err(|e| UxMirrorError::Perception(format!("join: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::detector::HeuristicDetector;
    use crate::perception::types::ElementType;
    use image::Rgb;

    struct StaticSource(RgbImage);

    #[async_trait]
    impl ScreenshotSource for StaticSource {
        async fn capture(&self) -> UxMirrorResult<RgbImage> {
            Ok(self.0.clone())
        }
    }

    fn dark_rect_frame() -> RgbImage {
        RgbImage::from_fn(600, 400, |x, y| {
            if (50..200).contains(&x) && (50..110).contains(&y) {
                Rgb([20, 20, 20])
            } else {
                Rgb([255, 255, 255])
            }
        })
    }

    #[tokio::test]
    async fn step_produces_iteration_and_annotation() {
        let pipeline = PerceptionPipeline::new(
            Arc::new(StaticSource(dark_rect_frame())),
            Arc::new(HeuristicDetector::with_default()),
        )
        .with_annotation(true);

        let first = pipeline.step().await.unwrap();
        assert_eq!((first.width, first.height), (600, 400));
        assert!(first
            .elements
            .iter()
            .any(|e| matches!(e.kind, ElementType::Button | ElementType::Container)));
        assert_eq!(first.iteration.ui_elements_detected, Some(first.elements.len() as i64));
        assert_eq!(first.iteration.change_score, Some(0.0));
        assert!(first.iteration.response_time.is_some_and(|rt| rt >= 0.0));
        assert_eq!(first.iteration.metadata["backend"], "heuristic");

        let png = first.annotated_png.as_deref().unwrap();
        let decoded = image::load_from_memory(png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (600, 400));

        let json = serde_json::to_value(&first).unwrap();
        let encoded = json["annotated_png_base64"].as_str().unwrap();
        assert_eq!(base64::engine::general_purpose::STANDARD.decode(encoded).unwrap(), png);
        assert_eq!(first.annotated_png_base64().as_deref(), Some(encoded));

        let second = pipeline.step().await.unwrap();
        assert_eq!(second.iteration.change_score, Some(0.0));
        assert!(!pipeline.is_settled().unwrap());
    }

    #[tokio::test]
    async fn file_source_replays_in_order_then_runs_dry() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.png");
        RgbImage::from_pixel(4, 3, Rgb([1, 2, 3])).save(&a).unwrap();
        RgbImage::from_pixel(5, 6, Rgb([9, 9, 9])).save(&b).unwrap();

        let source = FileSource::new(vec![a, b]);
        assert_eq!(source.remaining().await, 2);
        assert_eq!(source.capture().await.unwrap().dimensions(), (4, 3));
        let second = source.capture().await.unwrap();
        assert_eq!(second.get_pixel(0, 0).0, [9, 9, 9]);
        assert!(matches!(source.capture().await, Err(UxMirrorError::Perception(_))));
    }

    #[tokio::test]
    async fn missing_file_is_an_image_error() {
        let source = FileSource::new(vec![PathBuf::from("/definitely/not/here.png")]);
        assert!(matches!(source.capture().await, Err(UxMirrorError::Image(_))));
    }

    #[tokio::test]
    async fn changing_frames_report_change() {
        let dir = tempfile::tempdir().unwrap();
        let dark = dir.path().join("dark.png");
        let light = dir.path().join("light.png");
        RgbImage::from_pixel(64, 64, Rgb([0, 0, 0])).save(&dark).unwrap();
        RgbImage::from_pixel(64, 64, Rgb([255, 255, 255])).save(&light).unwrap();

        let pipeline = PerceptionPipeline::new(
            Arc::new(FileSource::new(vec![dark, light])),
            Arc::new(HeuristicDetector::with_default()),
        );
        let first = pipeline.step().await.unwrap();
        assert!(first.annotated_png.is_none());
        assert!(first.annotated_png_base64().is_none());
        let second = pipeline.step().await.unwrap();
        assert!(second.iteration.change_score.unwrap() > 0.99);
        assert_eq!(second.iteration.ui_elements_detected, Some(0));
    }
}
