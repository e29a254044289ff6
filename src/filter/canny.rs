use std::any::Any;

use ndarray::{Array2, Array3};

use super::{ops, Filter};
use crate::{error::Result, frame::Frame};

/// Canny edge detector.
///
/// Gray input yields a gray edge map. Color input takes, per pixel, the
/// gradient of whichever channel changes most and yields an RGB edge map.
#[derive(Debug)]
pub struct Canny {
    enabled: bool,
    low: f64,
    high: f64,
}

impl Default for Canny {
    fn default() -> Self {
        Self {
            enabled: false,
            low: 50.0,
            high: 150.0,
        }
    }
}

impl Canny {
    pub fn new(low: f64, high: f64) -> Self {
        let mut canny = Self {
            enabled: true,
            ..Self::default()
        };
        canny.set_thresholds(low, high);
        canny
    }

    /// Negative values become 0; the pair is swapped if given out of order.
    pub fn set_thresholds(&mut self, low: f64, high: f64) {
        let low = low.max(0.0);
        let high = high.max(0.0);
        (self.low, self.high) = if high < low { (high, low) } else { (low, high) };
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }
}

struct Gradient {
    dx: Array2<i32>,
    dy: Array2<i32>,
    mag: Array2<i32>,
}

fn sobel(src: &Frame) -> Gradient {
    let pixels = src.pixels();
    let (h, w, channels) = pixels.dim();
    let planes = if channels >= 3 { 3 } else { 1 };

    let mut grad = Gradient {
        dx: Array2::zeros((h, w)),
        dy: Array2::zeros((h, w)),
        mag: Array2::zeros((h, w)),
    };

    for y in 0..h {
        for x in 0..w {
            let xm = ops::reflect101(x as i64 - 1, w);
            let xp = ops::reflect101(x as i64 + 1, w);
            let ym = ops::reflect101(y as i64 - 1, h);
            let yp = ops::reflect101(y as i64 + 1, h);

            for c in 0..planes {
                let p = |yy: usize, xx: usize| pixels[[yy, xx, c]] as i32;
                let dx = (p(ym, xp) + 2 * p(y, xp) + p(yp, xp))
                    - (p(ym, xm) + 2 * p(y, xm) + p(yp, xm));
                let dy = (p(yp, xm) + 2 * p(yp, x) + p(yp, xp))
                    - (p(ym, xm) + 2 * p(ym, x) + p(ym, xp));
                let mag = dx.abs() + dy.abs();
                if c == 0 || mag > grad.mag[[y, x]] {
                    grad.dx[[y, x]] = dx;
                    grad.dy[[y, x]] = dy;
                    grad.mag[[y, x]] = mag;
                }
            }
        }
    }
    grad
}

fn edges(grad: &Gradient, low: f64, high: f64) -> Array2<u8> {
    let (h, w) = grad.mag.dim();
    let mag_at = |y: i64, x: i64| -> i32 {
        if y < 0 || x < 0 || y >= h as i64 || x >= w as i64 {
            0
        } else {
            grad.mag[[y as usize, x as usize]]
        }
    };

    // 0: not an edge, 1: weak candidate, 2: strong
    let mut class = Array2::<u8>::zeros((h, w));
    let mut stack = Vec::new();

    for y in 0..h {
        for x in 0..w {
            let m = grad.mag[[y, x]];
            if (m as f64) <= low {
                continue;
            }
            let (dx, dy) = (grad.dx[[y, x]], grad.dy[[y, x]]);
            let (ax, ay) = (dx.abs() as i64, dy.abs() as i64);
            let (yi, xi) = (y as i64, x as i64);

            // tan(22.5deg) ~ 0.4142, tan(67.5deg) ~ 2.4142
            let (a, b) = if ay * 10000 < ax * 4142 {
                (mag_at(yi, xi - 1), mag_at(yi, xi + 1))
            } else if ay * 10000 > ax * 24142 {
                (mag_at(yi - 1, xi), mag_at(yi + 1, xi))
            } else if (dx > 0) == (dy > 0) {
                (mag_at(yi - 1, xi - 1), mag_at(yi + 1, xi + 1))
            } else {
                (mag_at(yi - 1, xi + 1), mag_at(yi + 1, xi - 1))
            };

            if m > a && m >= b {
                if m as f64 > high {
                    class[[y, x]] = 2;
                    stack.push((y, x));
                } else {
                    class[[y, x]] = 1;
                }
            }
        }
    }

    while let Some((y, x)) = stack.pop() {
        for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                if class[[ny, nx]] == 1 {
                    class[[ny, nx]] = 2;
                    stack.push((ny, nx));
                }
            }
        }
    }

    class.mapv(|c| if c == 2 { 255 } else { 0 })
}

impl Filter for Canny {
    fn id(&self) -> &'static str {
        "canny"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
    }

    fn render(&self, src: &Frame) -> Result<Frame> {
        if src.is_empty() {
            return Ok(src.clone());
        }
        let map = edges(&sobel(src), self.low, self.high);
        let (h, w) = map.dim();
        let gray = Frame::from_pixels(Array3::from_shape_fn((h, w, 1), |(y, x, _)| map[[y, x]]));

        Ok(if src.channels() == 1 { gray } else { gray.to_rgb() })
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
