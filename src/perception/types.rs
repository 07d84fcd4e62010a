use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementType {
    Button,
    Input,
    Text,
    Image,
    Menu,
    Container,
    Link,
    Icon,
    Unknown,
}

impl ElementType {
    /// Buttons, inputs, links and icons accept pointer interaction.
    pub fn is_interactive(self) -> bool {
        matches!(
            self,
            ElementType::Button | ElementType::Input | ElementType::Link | ElementType::Icon
        )
    }

    /// Kinds worth handing to a text recognizer.
    pub fn carries_text(self) -> bool {
        matches!(
            self,
            ElementType::Text | ElementType::Button | ElementType::Input | ElementType::Link
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ElementType::Button => "button",
            ElementType::Input => "input",
            ElementType::Text => "text",
            ElementType::Image => "image",
            ElementType::Menu => "menu",
            ElementType::Container => "container",
            ElementType::Link => "link",
            ElementType::Icon => "icon",
            ElementType::Unknown => "unknown",
        }
    }
}

/// Axis-aligned box in pixel coordinates: top-left corner plus extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Box spanning the inclusive pixel range `[x1, x2] × [y1, y2]`.
    pub fn from_corners(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self {
            x: x1,
            y: y1,
            width: x2.saturating_sub(x1) + 1,
            height: y2.saturating_sub(y1) + 1,
        }
    }

    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height; 0 for a degenerate box.
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            0.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        !self.is_empty() && self.right() <= width && self.bottom() <= height
    }

    /// Intersection with the `width × height` image rectangle.
    pub fn clip_to(&self, width: u32, height: u32) -> BoundingBox {
        let x = self.x.min(width);
        let y = self.y.min(height);
        BoundingBox {
            x,
            y,
            width: self.right().min(width) - x,
            height: self.bottom().min(height) - y,
        }
    }

    pub fn intersection_area(&self, other: &BoundingBox) -> u64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());
        if ix2 <= ix1 || iy2 <= iy1 {
            return 0;
        }
        (ix2 - ix1) as u64 * (iy2 - iy1) as u64
    }

    /// Intersection over union; 0 when the union is empty.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter = self.intersection_area(other);
        let union = self.area() + other.area() - inter;
        if union == 0 {
            0.0
        } else {
            inter as f32 / union as f32
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStats {
    /// Channel-wise mean in RGB order.
    pub dominant_color: [u8; 3],
    /// Grayscale standard deviation scaled to [0, 1].
    pub contrast_ratio: f32,
    /// Grayscale mean scaled to [0, 1].
    pub brightness: f32,
}

impl ColorStats {
    pub const NEUTRAL: ColorStats = ColorStats {
        dominant_color: [0, 0, 0],
        contrast_ratio: 0.0,
        brightness: 0.0,
    };
}

/// A classified screen region produced by a detection backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UIElement {
    pub kind: ElementType,
    pub bbox: BoundingBox,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_confidence: Option<f32>,
    pub color_stats: ColorStats,
    pub accessibility_score: f32,
    pub is_interactive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let b = BoundingBox::new(10, 10, 50, 20);
        assert!((b.iou(&b) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(10, 0, 10, 10);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_of_half_overlap() {
        let a = BoundingBox::new(0, 0, 10, 10);
        let b = BoundingBox::new(5, 0, 10, 10);
        // 50 / (100 + 100 - 50)
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn clip_keeps_box_inside_image() {
        let b = BoundingBox::new(590, 390, 40, 40).clip_to(600, 400);
        assert_eq!(b, BoundingBox::new(590, 390, 10, 10));
        assert!(b.fits_within(600, 400));
        assert!(BoundingBox::new(700, 0, 5, 5).clip_to(600, 400).is_empty());
    }

    #[test]
    fn interactive_kinds() {
        assert!(ElementType::Icon.is_interactive());
        assert!(ElementType::Link.is_interactive());
        assert!(!ElementType::Container.is_interactive());
        assert!(!ElementType::Text.is_interactive());
    }
}
