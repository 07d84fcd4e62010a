/// Maximally-stable region extraction (MSER-style) on a grayscale frame.
///
/// The frame is thresholded at evenly spaced gray levels. A connected component
/// is kept when it barely grows by the next level, i.e. its area changes by at
/// most `max_variation`. Both polarities are scanned: dark-on-light and
/// light-on-dark.
use std::collections::{HashSet, VecDeque};

use image::GrayImage;

use crate::perception::types::BoundingBox;

#[derive(Debug, Clone)]
pub struct StableRegionParams {
    pub level_step: u8,
    pub min_area: usize,
    pub max_area: usize,
    pub max_variation: f32,
}

impl Default for StableRegionParams {
    fn default() -> Self {
        Self {
            level_step: 8,
            min_area: 60,
            max_area: 14_400,
            max_variation: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Component {
    area: usize,
    seed: usize,
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
}

/// Bounding boxes of stable regions, deduplicated, in discovery order.
pub fn stable_regions(gray: &GrayImage, params: &StableRegionParams) -> Vec<BoundingBox> {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let step = params.level_step.max(1) as usize;
    let levels: Vec<u8> = (0..=255usize).step_by(step).map(|l| l as u8).collect();

    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for invert in [false, true] {
        let value = |v: u8| if invert { 255 - v } else { v };
        let mut prev: Option<(Vec<u32>, Vec<Component>)> = None;
        for &level in &levels {
            let current = label_below(gray, level, &value);
            if let Some((_, comps)) = &prev {
                let (next_labels, next_comps) = &current;
                for c in comps {
                    if c.area < params.min_area || c.area > params.max_area {
                        continue;
                    }
                    let grown = next_comps[(next_labels[c.seed] - 1) as usize].area;
                    let variation = (grown - c.area) as f32 / c.area as f32;
                    if variation <= params.max_variation {
                        let bbox = BoundingBox::from_corners(c.x1, c.y1, c.x2, c.y2);
                        if seen.insert(bbox) {
                            out.push(bbox);
                        }
                    }
                }
            }
            prev = Some(current);
        }
    }

    out
}

/// 4-connected labelling of pixels whose (possibly inverted) value is `<= level`.
/// Labels start at 1; 0 marks pixels outside the mask.
fn label_below<F>(gray: &GrayImage, level: u8, value: &F) -> (Vec<u32>, Vec<Component>)
where
    F: Fn(u8) -> u8,
{
    let (w, h) = gray.dimensions();
    let width = w as usize;
    let raw = gray.as_raw();
    let in_mask = |i: usize| value(raw[i]) <= level;

    let mut labels = vec![0u32; raw.len()];
    let mut comps = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..raw.len() {
        if labels[start] != 0 || !in_mask(start) {
            continue;
        }
        let label = comps.len() as u32 + 1;
        labels[start] = label;
        queue.push_back(start);
        let mut comp = Component {
            area: 0,
            seed: start,
            x1: u32::MAX,
            y1: u32::MAX,
            x2: 0,
            y2: 0,
        };

        while let Some(i) = queue.pop_front() {
            let (x, y) = ((i % width) as u32, (i / width) as u32);
            comp.area += 1;
            comp.x1 = comp.x1.min(x);
            comp.y1 = comp.y1.min(y);
            comp.x2 = comp.x2.max(x);
            comp.y2 = comp.y2.max(y);

            let mut visit = |j: usize| {
                if labels[j] == 0 && in_mask(j) {
                    labels[j] = label;
                    queue.push_back(j);
                }
            };
            if x > 0 {
                visit(i - 1);
            }
            if x + 1 < w {
                visit(i + 1);
            }
            if y > 0 {
                visit(i - width);
            }
            if y + 1 < h {
                visit(i + width);
            }
        }
        comps.push(comp);
    }

    (labels, comps)
}
