use std::any::Any;

use ndarray::{Array2, Array3, Axis};

use super::{ops, Filter};
use crate::{error::Result, frame::Frame};

const APPROX_COLOR: [u8; 3] = [0, 255, 0];
const RAW_COLOR: [u8; 3] = [0, 0, 255];

/// 8-neighborhood, clockwise starting east.
const RING: [(i64, i64); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];
const WEST: usize = 4;

/// `(x, y)` pixel position.
type Point = (i64, i64);

/// Outlines the outer borders of bright regions.
///
/// Luma is binarized at 128. Every outer border enclosing at least `min_area`
/// is drawn over an RGB copy of the input, either simplified to a polygon
/// (green) or as traced (blue). Borders of holes and regions inside holes are
/// not drawn.
#[derive(Debug)]
pub struct Contours {
    enabled: bool,
    epsilon: f64,
    min_area: f64,
    draw_approx: bool,
}

impl Default for Contours {
    fn default() -> Self {
        Self {
            enabled: false,
            epsilon: 0.02,
            min_area: 100.0,
            draw_approx: true,
        }
    }
}

impl Contours {
    pub fn new(min_area: f64) -> Self {
        let mut contours = Self {
            enabled: true,
            ..Self::default()
        };
        contours.set_min_area(min_area);
        contours
    }

    /// Simplification tolerance as a fraction of the contour perimeter.
    pub fn set_epsilon(&mut self, v: f64) {
        self.epsilon = if v.is_nan() { 0.02 } else { v.clamp(0.001, 0.2) };
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn set_min_area(&mut self, v: f64) {
        // f64::max drops NaN
        self.min_area = v.max(0.0);
    }

    pub fn min_area(&self) -> f64 {
        self.min_area
    }

    pub fn set_draw_approx(&mut self, on: bool) {
        self.draw_approx = on;
    }

    pub fn draw_approx(&self) -> bool {
        self.draw_approx
    }
}

impl Filter for Contours {
    fn id(&self) -> &'static str {
        "contours"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
    }

    fn render(&self, src: &Frame) -> Result<Frame> {
        let fg = foreground(src);
        let mut out = src.to_rgb();

        for contour in external_contours(&fg) {
            if area(&contour) < self.min_area {
                continue;
            }
            if self.draw_approx {
                let eps = self.epsilon * perimeter(&contour);
                draw_polygon(out.pixels_mut(), &simplify(&contour, eps), APPROX_COLOR);
            } else {
                draw_polygon(out.pixels_mut(), &contour, RAW_COLOR);
            }
        }
        Ok(out)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn foreground(src: &Frame) -> Array2<bool> {
    let bin = ops::binarize(&src.to_gray(), 128);
    bin.pixels().index_axis(Axis(2), 0).mapv(|v| v != 0)
}

fn at(mask: &Array2<bool>, (x, y): Point) -> bool {
    let (h, w) = mask.dim();
    x >= 0 && y >= 0 && (x as usize) < w && (y as usize) < h && mask[[y as usize, x as usize]]
}

/// Background reachable from outside the frame through 4-connected steps.
fn outer_background(fg: &Array2<bool>) -> Array2<bool> {
    let (h, w) = fg.dim();
    let mut outside = Array2::from_elem((h, w), false);
    let mut stack: Vec<(usize, usize)> = (0..h)
        .flat_map(|y| [(0, y), (w.saturating_sub(1), y)])
        .chain((0..w).flat_map(|x| [(x, 0), (x, h.saturating_sub(1))]))
        .filter(|&(x, y)| x < w && y < h)
        .collect();

    while let Some((x, y)) = stack.pop() {
        if fg[[y, x]] || outside[[y, x]] {
            continue;
        }
        outside[[y, x]] = true;
        if x > 0 {
            stack.push((x - 1, y));
        }
        if x + 1 < w {
            stack.push((x + 1, y));
        }
        if y > 0 {
            stack.push((x, y - 1));
        }
        if y + 1 < h {
            stack.push((x, y + 1));
        }
    }
    outside
}

/// Marks the 8-connected region holding `start`; true when it borders the
/// outer background or the frame edge.
fn mark_region(
    fg: &Array2<bool>,
    outside: &Array2<bool>,
    seen: &mut Array2<bool>,
    start: Point,
) -> bool {
    let (h, w) = fg.dim();
    let mut external = false;
    let mut stack = vec![start];

    while let Some((x, y)) = stack.pop() {
        if !at(fg, (x, y)) || seen[[y as usize, x as usize]] {
            continue;
        }
        seen[[y as usize, x as usize]] = true;

        for &(dx, dy) in RING.iter() {
            let (nx, ny) = (x + dx, y + dy);
            let inside = nx >= 0 && ny >= 0 && (nx as usize) < w && (ny as usize) < h;
            if !inside {
                external = true;
            } else if dx == 0 || dy == 0 {
                external |= outside[[ny as usize, nx as usize]];
            }
            stack.push((nx, ny));
        }
    }
    external
}

/// Outer borders of all regions not enclosed by another region.
fn external_contours(fg: &Array2<bool>) -> Vec<Vec<Point>> {
    let (h, w) = fg.dim();
    let outside = outer_background(fg);
    let mut seen = Array2::from_elem((h, w), false);
    let mut found = Vec::new();

    for y in 0..h {
        for x in 0..w {
            if !fg[[y, x]] || seen[[y, x]] {
                continue;
            }
            let start = (x as i64, y as i64);
            // raster order makes `start` the top-left pixel of its region
            if mark_region(fg, &outside, &mut seen, start) {
                found.push(trace(fg, start));
            }
        }
    }
    found
}

/// One Moore-neighbor step: the first foreground neighbor of `p` clockwise
/// after the backtrack direction, and the new backtrack direction.
fn step(fg: &Array2<bool>, p: Point, back: usize) -> Option<(Point, usize)> {
    (1..=8).find_map(|i| {
        let d = (back + i) % 8;
        let next = (p.0 + RING[d].0, p.1 + RING[d].1);
        if !at(fg, next) {
            return None;
        }
        let prev = RING[(back + i - 1) % 8];
        let offset = (p.0 + prev.0 - next.0, p.1 + prev.1 - next.1);
        let back = RING.iter().position(|&r| r == offset)?;
        Some((next, back))
    })
}

/// Traces the border clockwise from the top-left pixel of a region.
fn trace(fg: &Array2<bool>, start: Point) -> Vec<Point> {
    let limit = 4 * fg.len() + 8;
    let mut contour = Vec::new();
    let (mut cur, mut back) = (start, WEST);
    let mut first = None;

    loop {
        let Some((next, next_back)) = step(fg, cur, back) else {
            contour.push(cur);
            break;
        };
        if cur == start {
            match first {
                None => first = Some(next),
                Some(f) if f == next => break,
                Some(_) => (),
            }
        }
        contour.push(cur);
        if contour.len() >= limit {
            break;
        }
        (cur, back) = (next, next_back);
    }
    contour
}

/// Shoelace area over pixel centers.
fn area(contour: &[Point]) -> f64 {
    let n = contour.len();
    let twice: i64 = (0..n)
        .map(|i| {
            let (a, b) = (contour[i], contour[(i + 1) % n]);
            a.0 * b.1 - b.0 * a.1
        })
        .sum();
    twice.abs() as f64 / 2.0
}

fn dist(a: Point, b: Point) -> f64 {
    (((a.0 - b.0).pow(2) + (a.1 - b.1).pow(2)) as f64).sqrt()
}

fn perimeter(contour: &[Point]) -> f64 {
    let n = contour.len();
    (0..n).map(|i| dist(contour[i], contour[(i + 1) % n])).sum()
}

fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let len = dist(a, b);
    if len == 0.0 {
        return dist(p, a);
    }
    let cross = (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0);
    cross.abs() as f64 / len
}

/// Douglas-Peucker on an open chain. Pushes the kept points except the last.
fn douglas_peucker(chain: &[Point], eps: f64, out: &mut Vec<Point>) {
    let (a, b) = (chain[0], chain[chain.len() - 1]);
    let farthest = (1..chain.len().saturating_sub(1))
        .map(|i| (i, segment_distance(chain[i], a, b)))
        .max_by(|x, y| x.1.total_cmp(&y.1));

    match farthest {
        Some((i, d)) if d > eps => {
            douglas_peucker(&chain[..=i], eps, out);
            douglas_peucker(&chain[i..], eps, out);
        }
        _ => out.push(a),
    }
}

/// Simplifies a closed contour, splitting it at the point farthest from the start.
fn simplify(contour: &[Point], eps: f64) -> Vec<Point> {
    if contour.len() < 3 {
        return contour.to_vec();
    }
    let far = (1..contour.len())
        .max_by(|&i, &j| dist(contour[0], contour[i]).total_cmp(&dist(contour[0], contour[j])))
        .unwrap_or(1);

    let mut out = Vec::new();
    douglas_peucker(&contour[..=far], eps, &mut out);
    let mut tail = contour[far..].to_vec();
    tail.push(contour[0]);
    douglas_peucker(&tail, eps, &mut out);
    out
}

/// Two pixel wide dot.
fn stamp(pixels: &mut Array3<u8>, (x, y): Point, color: [u8; 3]) {
    let (h, w, _) = pixels.dim();
    for (px, py) in [(x, y), (x + 1, y), (x, y + 1), (x + 1, y + 1)] {
        if px < 0 || py < 0 || px as usize >= w || py as usize >= h {
            continue;
        }
        for (c, v) in color.iter().enumerate() {
            pixels[[py as usize, px as usize, c]] = *v;
        }
    }
}

fn draw_line(pixels: &mut Array3<u8>, a: Point, b: Point, color: [u8; 3]) {
    let (dx, dy) = ((b.0 - a.0).abs(), -(b.1 - a.1).abs());
    let (sx, sy) = (if a.0 < b.0 { 1 } else { -1 }, if a.1 < b.1 { 1 } else { -1 });
    let mut err = dx + dy;
    let mut p = a;

    loop {
        stamp(pixels, p, color);
        if p == b {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            p.0 += sx;
        }
        if e2 <= dx {
            err += dx;
            p.1 += sy;
        }
    }
}

fn draw_polygon(pixels: &mut Array3<u8>, points: &[Point], color: [u8; 3]) {
    let n = points.len();
    for i in 0..n {
        draw_line(pixels, points[i], points[(i + 1) % n], color);
    }
}
