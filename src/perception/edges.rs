/// Grayscale conversion and gradient-based edge detection over `image` buffers.
///
/// All frames are treated as RGB. Luma uses the Rec.601 weights so that every
/// grayscale statistic in the crate agrees with [`luma`].
use image::{GrayImage, Luma, RgbImage};

pub const EDGE: u8 = 255;

const TAN_22_5: f32 = 0.414_213_56;
const TAN_67_5: f32 = 2.414_213_6;

pub fn luma(rgb: [u8; 3]) -> u8 {
    let v = 0.299 * rgb[0] as f32 + 0.587 * rgb[1] as f32 + 0.114 * rgb[2] as f32;
    v.round().clamp(0.0, 255.0) as u8
}

pub fn to_gray(image: &RgbImage) -> GrayImage {
    let (w, h) = image.dimensions();
    GrayImage::from_fn(w, h, |x, y| Luma([luma(image.get_pixel(x, y).0)]))
}

/// Horizontal and vertical 3×3 Sobel derivatives, row-major, replicated borders.
pub struct Gradients {
    pub width: u32,
    pub height: u32,
    pub gx: Vec<f32>,
    pub gy: Vec<f32>,
}

pub fn sobel(gray: &GrayImage) -> Gradients {
    let (w, h) = gray.dimensions();
    let n = w as usize * h as usize;
    let mut gx = vec![0.0f32; n];
    let mut gy = vec![0.0f32; n];
    if n == 0 {
        return Gradients { width: w, height: h, gx, gy };
    }

    let px = |x: i64, y: i64| -> f32 {
        let cx = x.clamp(0, w as i64 - 1) as u32;
        let cy = y.clamp(0, h as i64 - 1) as u32;
        gray.get_pixel(cx, cy)[0] as f32
    };

    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let tl = px(x - 1, y - 1);
            let t = px(x, y - 1);
            let tr = px(x + 1, y - 1);
            let l = px(x - 1, y);
            let r = px(x + 1, y);
            let bl = px(x - 1, y + 1);
            let b = px(x, y + 1);
            let br = px(x + 1, y + 1);
            let i = y as usize * w as usize + x as usize;
            gx[i] = (tr + 2.0 * r + br) - (tl + 2.0 * l + bl);
            gy[i] = (bl + 2.0 * b + br) - (tl + 2.0 * t + tr);
        }
    }

    Gradients { width: w, height: h, gx, gy }
}

/// Canny edge detector with L1 gradient magnitude, non-maximum suppression
/// and 8-connected hysteresis. Edge pixels are set to [`EDGE`].
pub fn canny(gray: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (w, h) = gray.dimensions();
    let mut out = GrayImage::new(w, h);
    if w == 0 || h == 0 {
        return out;
    }

    let grad = sobel(gray);
    let mag: Vec<f32> = grad
        .gx
        .iter()
        .zip(&grad.gy)
        .map(|(x, y)| x.abs() + y.abs())
        .collect();

    let (wi, hi) = (w as i64, h as i64);
    let at = |x: i64, y: i64| -> f32 {
        if x < 0 || y < 0 || x >= wi || y >= hi {
            0.0
        } else {
            mag[(y * wi + x) as usize]
        }
    };

    // 0 = suppressed, 1 = weak, 2 = strong
    let mut state = vec![0u8; mag.len()];
    let mut stack: Vec<usize> = Vec::new();

    for y in 0..hi {
        for x in 0..wi {
            let i = (y * wi + x) as usize;
            let m = mag[i];
            if m <= low {
                continue;
            }
            let (gx, gy) = (grad.gx[i], grad.gy[i]);
            let (ax, ay) = (gx.abs(), gy.abs());
            let (n1, n2) = if ay <= ax * TAN_22_5 {
                (at(x - 1, y), at(x + 1, y))
            } else if ay >= ax * TAN_67_5 {
                (at(x, y - 1), at(x, y + 1))
            } else if (gx > 0.0) == (gy > 0.0) {
                (at(x - 1, y - 1), at(x + 1, y + 1))
            } else {
                (at(x + 1, y - 1), at(x - 1, y + 1))
            };
            // Asymmetric comparison keeps exactly one pixel on flat-topped ridges.
            if m > n1 && m >= n2 {
                if m > high {
                    state[i] = 2;
                    stack.push(i);
                } else {
                    state[i] = 1;
                }
            }
        }
    }

    while let Some(i) = stack.pop() {
        let (x, y) = ((i as i64) % wi, (i as i64) / wi);
        out.put_pixel(x as u32, y as u32, Luma([EDGE]));
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= wi || ny >= hi {
                    continue;
                }
                let j = (ny * wi + nx) as usize;
                if state[j] == 1 {
                    state[j] = 2;
                    stack.push(j);
                }
            }
        }
    }

    out
}

/// 3×3 binary dilation: a pixel is set when any neighbour is set.
pub fn dilate(mask: &GrayImage) -> GrayImage {
    let (w, h) = mask.dimensions();
    let mut out = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            if mask.get_pixel(x, y)[0] == 0 {
                continue;
            }
            for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                    out.put_pixel(nx, ny, Luma([EDGE]));
                }
            }
        }
    }
    out
}

/// Fraction of pixels that Canny (50/150) marks as edges; 0 for an empty image.
pub fn edge_density(gray: &GrayImage) -> f32 {
    let total = gray.width() as usize * gray.height() as usize;
    if total == 0 {
        return 0.0;
    }
    let edges = canny(gray, 50.0, 150.0);
    let count = edges.pixels().filter(|p| p[0] == EDGE).count();
    count as f32 / total as f32
}

/// Population mean and standard deviation of gray levels.
pub fn mean_stddev(gray: &GrayImage) -> (f32, f32) {
    let n = gray.width() as usize * gray.height() as usize;
    if n == 0 {
        return (0.0, 0.0);
    }
    let (mut sum, mut sq) = (0.0f64, 0.0f64);
    for p in gray.pixels() {
        let v = p[0] as f64;
        sum += v;
        sq += v * v;
    }
    let mean = sum / n as f64;
    let var = (sq / n as f64 - mean * mean).max(0.0);
    (mean as f32, var.sqrt() as f32)
}

/// Variance of the 4-neighbour Laplacian, a sharpness measure. Borders are replicated.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    let n = w as usize * h as usize;
    if n == 0 {
        return 0.0;
    }
    let px = |x: i64, y: i64| -> f64 {
        let cx = x.clamp(0, w as i64 - 1) as u32;
        let cy = y.clamp(0, h as i64 - 1) as u32;
        gray.get_pixel(cx, cy)[0] as f64
    };

    let (mut sum, mut sq) = (0.0f64, 0.0f64);
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let v = px(x - 1, y) + px(x + 1, y) + px(x, y - 1) + px(x, y + 1) - 4.0 * px(x, y);
            sum += v;
            sq += v * v;
        }
    }
    let mean = sum / n as f64;
    (sq / n as f64 - mean * mean).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_on_white(size: u32, x0: u32, y0: u32, side: u32, value: u8) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            if x >= x0 && x < x0 + side && y >= y0 && y < y0 + side {
                Luma([value])
            } else {
                Luma([255])
            }
        })
    }

    #[test]
    fn luma_of_primaries() {
        assert_eq!(luma([255, 255, 255]), 255);
        assert_eq!(luma([0, 0, 0]), 0);
        assert_eq!(luma([255, 0, 0]), 76);
    }

    #[test]
    fn flat_image_has_no_edges() {
        let gray = GrayImage::from_pixel(32, 32, Luma([128]));
        assert_eq!(edge_density(&gray), 0.0);
    }

    #[test]
    fn step_edge_is_one_pixel_wide() {
        let gray = GrayImage::from_fn(20, 10, |x, _| if x < 10 { Luma([255]) } else { Luma([0]) });
        let edges = canny(&gray, 50.0, 150.0);
        for y in 0..10 {
            let row: Vec<u32> = (0..20).filter(|&x| edges.get_pixel(x, y)[0] == EDGE).collect();
            assert_eq!(row, vec![9], "row {y}");
        }
    }

    #[test]
    fn square_outline_is_detected() {
        let gray = square_on_white(40, 10, 10, 20, 0);
        let edges = canny(&gray, 50.0, 150.0);
        let count = edges.pixels().filter(|p| p[0] == EDGE).count();
        // Roughly the perimeter of the square.
        assert!(count > 60 && count < 100, "edge count {count}");
    }

    #[test]
    fn dilate_grows_single_pixel() {
        let mut mask = GrayImage::new(5, 5);
        mask.put_pixel(2, 2, Luma([EDGE]));
        let grown = dilate(&mask);
        assert_eq!(grown.pixels().filter(|p| p[0] == EDGE).count(), 9);
    }

    #[test]
    fn stddev_of_two_levels() {
        let gray = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 0 } else { 100 }]));
        let (mean, sd) = mean_stddev(&gray);
        assert!((mean - 50.0).abs() < 1e-4);
        assert!((sd - 50.0).abs() < 1e-4);
    }

    #[test]
    fn empty_inputs_are_harmless() {
        let gray = GrayImage::new(0, 0);
        assert_eq!(canny(&gray, 50.0, 150.0).dimensions(), (0, 0));
        assert_eq!(mean_stddev(&gray), (0.0, 0.0));
        assert_eq!(edge_density(&gray), 0.0);
    }

    #[test]
    fn laplacian_variance_separates_flat_from_detailed() {
        assert_eq!(laplacian_variance(&GrayImage::from_pixel(16, 16, Luma([77]))), 0.0);
        assert_eq!(laplacian_variance(&GrayImage::new(0, 0)), 0.0);
        let checker = GrayImage::from_fn(16, 16, |x, y| if (x + y) % 2 == 0 { Luma([0]) } else { Luma([255]) });
        assert!(laplacian_variance(&checker) > 1000.0);
    }
}
