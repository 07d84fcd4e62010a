/// Outer-contour extraction over binary masks.
///
/// Foreground components are 8-connected. Only components reachable from the
/// image border through background are reported (outermost contours); anything
/// sitting inside another component's hole is skipped.
use std::collections::VecDeque;

use image::GrayImage;

use crate::perception::types::BoundingBox;

pub type Point = (i32, i32);

/// Clockwise neighbour offsets in image coordinates, starting East.
const DIRS: [Point; 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    /// Boundary pixels in tracing order; the polygon is implicitly closed.
    pub points: Vec<Point>,
}

impl Contour {
    pub fn bounding_box(&self) -> BoundingBox {
        let (mut x1, mut y1) = (i32::MAX, i32::MAX);
        let (mut x2, mut y2) = (i32::MIN, i32::MIN);
        for &(x, y) in &self.points {
            x1 = x1.min(x);
            y1 = y1.min(y);
            x2 = x2.max(x);
            y2 = y2.max(y);
        }
        if self.points.is_empty() {
            return BoundingBox::new(0, 0, 0, 0);
        }
        BoundingBox::from_corners(x1.max(0) as u32, y1.max(0) as u32, x2.max(0) as u32, y2.max(0) as u32)
    }

    /// Enclosed area through pixel centres (shoelace formula).
    pub fn area(&self) -> f64 {
        polygon_area(&self.points)
    }

    /// Length of the closed boundary.
    pub fn perimeter(&self) -> f64 {
        let n = self.points.len();
        if n < 2 {
            return 0.0;
        }
        (0..n)
            .map(|i| distance(self.points[i], self.points[(i + 1) % n]))
            .sum()
    }
}

pub fn polygon_area(points: &[Point]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let twice: i64 = (0..n)
        .map(|i| {
            let (x1, y1) = points[i];
            let (x2, y2) = points[(i + 1) % n];
            x1 as i64 * y2 as i64 - x2 as i64 * y1 as i64
        })
        .sum();
    twice.abs() as f64 / 2.0
}

fn distance(a: Point, b: Point) -> f64 {
    let dx = (a.0 - b.0) as f64;
    let dy = (a.1 - b.1) as f64;
    (dx * dx + dy * dy).sqrt()
}

/// Outer contours of every non-zero component of `mask` that touches the outside.
pub fn find_external_contours(mask: &GrayImage) -> Vec<Contour> {
    let (w, h) = mask.dimensions();
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let (wi, hi) = (w as i32, h as i32);
    let idx = |x: i32, y: i32| (y * wi + x) as usize;
    let fg = |x: i32, y: i32| x >= 0 && y >= 0 && x < wi && y < hi && mask.get_pixel(x as u32, y as u32)[0] != 0;

    let outside = outside_background(mask);

    let mut labels = vec![0u32; (w * h) as usize];
    let mut contours = Vec::new();
    let mut next_label = 0u32;
    let mut queue = VecDeque::new();

    for y in 0..hi {
        for x in 0..wi {
            if !fg(x, y) || labels[idx(x, y)] != 0 {
                continue;
            }
            next_label += 1;
            let label = next_label;
            labels[idx(x, y)] = label;
            queue.push_back((x, y));
            let mut external = false;
            let mut size = 0usize;

            while let Some((cx, cy)) = queue.pop_front() {
                size += 1;
                for &(dx, dy) in &[(1, 0), (-1, 0), (0, 1), (0, -1)] {
                    let (nx, ny) = (cx + dx, cy + dy);
                    if nx < 0 || ny < 0 || nx >= wi || ny >= hi || outside[idx(nx, ny)] {
                        external = true;
                    }
                }
                for &(dx, dy) in &DIRS {
                    let (nx, ny) = (cx + dx, cy + dy);
                    if fg(nx, ny) && labels[idx(nx, ny)] == 0 {
                        labels[idx(nx, ny)] = label;
                        queue.push_back((nx, ny));
                    }
                }
            }

            if external {
                // (x, y) is the first pixel of the component in raster order.
                let points = trace_boundary((x, y), size, |px, py| {
                    px >= 0 && py >= 0 && px < wi && py < hi && labels[idx(px, py)] == label
                });
                contours.push(Contour { points });
            }
        }
    }

    contours
}

/// Background pixels 4-connected to the image border.
fn outside_background(mask: &GrayImage) -> Vec<bool> {
    let (w, h) = mask.dimensions();
    let (wi, hi) = (w as i32, h as i32);
    let mut seen = vec![false; (w * h) as usize];
    let mut queue = VecDeque::new();
    let seed = |x: i32, y: i32, seen: &mut Vec<bool>, queue: &mut VecDeque<Point>| {
        let i = (y * wi + x) as usize;
        if !seen[i] && mask.get_pixel(x as u32, y as u32)[0] == 0 {
            seen[i] = true;
            queue.push_back((x, y));
        }
    };
    for x in 0..wi {
        seed(x, 0, &mut seen, &mut queue);
        seed(x, hi - 1, &mut seen, &mut queue);
    }
    for y in 0..hi {
        seed(0, y, &mut seen, &mut queue);
        seed(wi - 1, y, &mut seen, &mut queue);
    }
    while let Some((x, y)) = queue.pop_front() {
        for &(dx, dy) in &[(1, 0), (-1, 0), (0, 1), (0, -1)] {
            let (nx, ny) = (x + dx, y + dy);
            if nx < 0 || ny < 0 || nx >= wi || ny >= hi {
                continue;
            }
            seed(nx, ny, &mut seen, &mut queue);
        }
    }
    seen
}

/// Moore-neighbour boundary trace, clockwise, starting from the component's
/// first raster pixel (whose west neighbour is necessarily background).
fn trace_boundary<F>(start: Point, component_size: usize, inside: F) -> Vec<Point>
where
    F: Fn(i32, i32) -> bool,
{
    let mut points = vec![start];
    let mut cur = start;
    let mut backtrack = 4usize;
    let limit = 4 * component_size + 8;

    for _ in 0..limit {
        let mut next = None;
        for i in 1..=8 {
            let d = (backtrack + i) % 8;
            let (dx, dy) = DIRS[d];
            if inside(cur.0 + dx, cur.1 + dy) {
                next = Some(((cur.0 + dx, cur.1 + dy), d));
                break;
            }
        }
        let Some((n, d)) = next else {
            break; // isolated pixel
        };
        if cur == start && points.len() > 1 && n == points[1] {
            break;
        }
        // Direction from `n` back to the last background pixel examined.
        backtrack = if d % 2 == 0 { (d + 6) % 8 } else { (d + 5) % 8 };
        points.push(n);
        cur = n;
    }

    if points.len() > 1 && points.last() == Some(&start) {
        points.pop();
    }
    points
}

/// Douglas-Peucker simplification of a closed polygon.
pub fn approximate_polygon(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let far = (1..points.len())
        .max_by(|&a, &b| {
            distance(points[0], points[a])
                .partial_cmp(&distance(points[0], points[b]))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(0);
    if far == 0 {
        return vec![points[0]];
    }

    let mut first = simplify_open(&points[..=far], epsilon);
    let mut closing: Vec<Point> = points[far..].to_vec();
    closing.push(points[0]);
    let mut second = simplify_open(&closing, epsilon);

    first.pop();
    second.pop();
    first.extend(second);
    first
}

fn simplify_open(points: &[Point], epsilon: f64) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let (a, b) = (points[0], points[points.len() - 1]);
    let mut max_dist = 0.0;
    let mut split = 0;
    for (i, &p) in points.iter().enumerate().take(points.len() - 1).skip(1) {
        let d = perpendicular_distance(p, a, b);
        if d > max_dist {
            max_dist = d;
            split = i;
        }
    }
    if max_dist > epsilon {
        let mut left = simplify_open(&points[..=split], epsilon);
        let right = simplify_open(&points[split..], epsilon);
        left.pop();
        left.extend(right);
        left
    } else {
        vec![a, b]
    }
}

fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let len = distance(a, b);
    if len == 0.0 {
        return distance(p, a);
    }
    let cross = (b.0 - a.0) as f64 * (a.1 - p.1) as f64 - (a.0 - p.0) as f64 * (b.1 - a.1) as f64;
    cross.abs() / len
}
