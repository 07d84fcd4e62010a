use image::imageops::FilterType;
use image::{GrayImage, RgbImage};

use crate::perception::edges::to_gray;

#[derive(Debug, Clone)]
pub struct StabilityConfig {
    /// Change score below which consecutive frames count as identical.
    pub stability_threshold: f64,
    pub min_stable_frames: usize,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            stability_threshold: 0.02,
            min_stable_frames: 3,
        }
    }
}

/// Mean absolute grayscale difference between two frames, scaled to [0, 1].
///
/// When sizes differ, `previous` is resized to `current` first. Empty frames
/// count as a complete change.
pub fn change_score(previous: &GrayImage, current: &GrayImage) -> f64 {
    let (w, h) = current.dimensions();
    if w == 0 || h == 0 || previous.width() == 0 || previous.height() == 0 {
        return 1.0;
    }
    let resized;
    let previous = if previous.dimensions() != (w, h) {
        resized = image::imageops::resize(previous, w, h, FilterType::Triangle);
        &resized
    } else {
        previous
    };

    let total: u64 = previous
        .as_raw()
        .iter()
        .zip(current.as_raw())
        .map(|(a, b)| (*a as i32 - *b as i32).unsigned_abs() as u64)
        .sum();
    (total as f64 / (w as f64 * h as f64) / 255.0).clamp(0.0, 1.0)
}

/// Remembers the previous frame so each new frame can be scored for change.
pub struct VisualChangeTracker {
    config: StabilityConfig,
    last_frame: Option<GrayImage>,
    stable_frame_count: usize,
}

impl VisualChangeTracker {
    pub fn new(config: StabilityConfig) -> Self {
        Self {
            config,
            last_frame: None,
            stable_frame_count: 0,
        }
    }

    pub fn with_default() -> Self {
        Self::new(StabilityConfig::default())
    }

    /// Score `frame` against the previous one. The first frame scores 0.
    pub fn observe(&mut self, frame: &RgbImage) -> f64 {
        let gray = to_gray(frame);
        let score = match &self.last_frame {
            Some(prev) => change_score(prev, &gray),
            None => 0.0,
        };

        if self.last_frame.is_some() && score < self.config.stability_threshold {
            self.stable_frame_count += 1;
        } else {
            self.stable_frame_count = 0;
        }
        self.last_frame = Some(gray);

        tracing::trace!(score, stable_frames = self.stable_frame_count, "frame observed");
        score
    }

    /// True once enough consecutive near-identical frames have been seen.
    pub fn is_settled(&self) -> bool {
        self.stable_frame_count >= self.config.min_stable_frames
    }
}
