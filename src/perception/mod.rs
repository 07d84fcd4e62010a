pub mod analysis;
pub mod annotator;
pub mod color;
pub mod contours;
pub mod corners;
pub mod detector;
pub mod edges;
pub mod pipeline;
pub mod regions;
pub mod stability;
pub mod traits;
pub mod types;

pub use detector::HeuristicDetector;
pub use pipeline::{FileSource, PerceptionFrame, PerceptionPipeline};
pub use traits::{DetectionBackend, RecognizedText, ScreenshotSource, TextRecognizer};
pub use types::{BoundingBox, ColorStats, ElementType, UIElement};
