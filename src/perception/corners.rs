/// Harris corner response and clustering of corner pixels into candidate points.
use std::collections::VecDeque;

use image::GrayImage;

use crate::perception::edges::sobel;

const HARRIS_K: f32 = 0.04;
/// Fraction of the strongest response a pixel must exceed to count as a corner.
const RESPONSE_FRACTION: f32 = 0.01;

/// A group of adjacent corner pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerCluster {
    pub center_x: u32,
    pub center_y: u32,
    /// Strongest Harris response inside the cluster.
    pub strength: f32,
}

/// Harris response `det(M) - k * trace(M)^2` with `M` summed over a 3×3 window.
pub fn harris_response(gray: &GrayImage) -> Vec<f32> {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let grad = sobel(gray);
    let scale = 1.0 / (4.0 * 255.0);
    let n = w * h;
    let mut xx = vec![0.0f32; n];
    let mut yy = vec![0.0f32; n];
    let mut xy = vec![0.0f32; n];
    for i in 0..n {
        let gx = grad.gx[i] * scale;
        let gy = grad.gy[i] * scale;
        xx[i] = gx * gx;
        yy[i] = gy * gy;
        xy[i] = gx * gy;
    }

    let mut response = vec![0.0f32; n];
    for y in 0..h {
        for x in 0..w {
            let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let j = ny * w + nx;
                    sxx += xx[j];
                    syy += yy[j];
                    sxy += xy[j];
                }
            }
            let det = sxx * syy - sxy * sxy;
            let trace = sxx + syy;
            response[y * w + x] = det - HARRIS_K * trace * trace;
        }
    }
    response
}

/// Dilate the Harris response, threshold it against the global maximum and
/// merge 8-connected corner pixels. Strongest clusters come first.
pub fn corner_clusters(gray: &GrayImage) -> Vec<CornerCluster> {
    let (w, h) = (gray.width() as usize, gray.height() as usize);
    let response = harris_response(gray);
    let max = response.iter().copied().fold(f32::MIN, f32::max);
    if response.is_empty() || max <= 0.0 {
        return Vec::new();
    }

    let mut dilated = vec![0.0f32; response.len()];
    for y in 0..h {
        for x in 0..w {
            let mut best = f32::MIN;
            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    best = best.max(response[ny * w + nx]);
                }
            }
            dilated[y * w + x] = best;
        }
    }

    let threshold = RESPONSE_FRACTION * max;
    let mut visited = vec![false; dilated.len()];
    let mut clusters = Vec::new();
    let mut queue = VecDeque::new();

    for start in 0..dilated.len() {
        if visited[start] || dilated[start] <= threshold {
            continue;
        }
        visited[start] = true;
        queue.push_back(start);
        let (mut sum_x, mut sum_y, mut count) = (0usize, 0usize, 0usize);
        let mut strength = f32::MIN;

        while let Some(i) = queue.pop_front() {
            let (x, y) = (i % w, i / w);
            sum_x += x;
            sum_y += y;
            count += 1;
            strength = strength.max(response[i]);
            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    let j = ny * w + nx;
                    if !visited[j] && dilated[j] > threshold {
                        visited[j] = true;
                        queue.push_back(j);
                    }
                }
            }
        }

        clusters.push(CornerCluster {
            center_x: (sum_x / count) as u32,
            center_y: (sum_y / count) as u32,
            strength,
        });
    }

    clusters.sort_by(|a, b| {
        b.strength
            .partial_cmp(&a.strength)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    clusters
}
