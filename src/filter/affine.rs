use std::any::Any;

use ndarray::Array3;

use super::Filter;
use crate::{error::Result, frame::Frame};

/// Rotation and scale about the frame center, followed by a translation.
/// Uncovered pixels are black.
#[derive(Debug)]
pub struct Affine {
    enabled: bool,
    angle: f64,
    scale: f64,
    tx: i32,
    ty: i32,
}

impl Default for Affine {
    fn default() -> Self {
        Self {
            enabled: false,
            angle: 0.0,
            scale: 1.0,
            tx: 0,
            ty: 0,
        }
    }
}

impl Affine {
    pub fn rotation(angle: f64) -> Self {
        let mut affine = Self {
            enabled: true,
            ..Self::default()
        };
        affine.set_angle(angle);
        affine
    }

    /// Degrees, counter-clockwise. NaN resets to 0.
    pub fn set_angle(&mut self, v: f64) {
        self.angle = if v.is_nan() { 0.0 } else { v.clamp(-180.0, 180.0) };
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// NaN resets to 1.
    pub fn set_scale(&mut self, v: f64) {
        self.scale = if v.is_nan() { 1.0 } else { v.clamp(0.1, 3.0) };
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn set_tx(&mut self, v: i32) {
        self.tx = v;
    }

    pub fn tx(&self) -> i32 {
        self.tx
    }

    pub fn set_ty(&mut self, v: i32) {
        self.ty = v;
    }

    pub fn ty(&self) -> i32 {
        self.ty
    }

    /// Forward 2x3 matrix mapping source to destination coordinates.
    fn matrix(&self, width: u32, height: u32) -> [[f64; 3]; 2] {
        let (cx, cy) = (width as f64 / 2.0, height as f64 / 2.0);
        let rad = self.angle.to_radians();
        let alpha = self.scale * rad.cos();
        let beta = self.scale * rad.sin();
        [
            [alpha, beta, (1.0 - alpha) * cx - beta * cy + self.tx as f64],
            [-beta, alpha, beta * cx + (1.0 - alpha) * cy + self.ty as f64],
        ]
    }
}

impl Filter for Affine {
    fn id(&self) -> &'static str {
        "affine"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
    }

    fn render(&self, src: &Frame) -> Result<Frame> {
        let pixels = src.pixels();
        let (h, w, c) = pixels.dim();
        let [[a, b, tx], [d, e, ty]] = self.matrix(src.width(), src.height());

        // invert the forward matrix so every output pixel pulls from the source
        let det = a * e - b * d;
        let (ia, ib, id, ie) = (e / det, -b / det, -d / det, a / det);

        let sample = |sx: i64, sy: i64, ch: usize| -> f64 {
            if sx < 0 || sy < 0 || sx >= w as i64 || sy >= h as i64 {
                0.0
            } else {
                pixels[[sy as usize, sx as usize, ch]] as f64
            }
        };

        let out = Array3::from_shape_fn((h, w, c), |(y, x, ch)| {
            let (dx, dy) = (x as f64 - tx, y as f64 - ty);
            let sx = ia * dx + ib * dy;
            let sy = id * dx + ie * dy;

            let (x0, y0) = (sx.floor(), sy.floor());
            let (fx, fy) = (sx - x0, sy - y0);
            let (x0, y0) = (x0 as i64, y0 as i64);

            let top = sample(x0, y0, ch) * (1.0 - fx) + sample(x0 + 1, y0, ch) * fx;
            let bottom = sample(x0, y0 + 1, ch) * (1.0 - fx) + sample(x0 + 1, y0 + 1, ch) * fx;
            (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8
        });
        Ok(Frame::from_pixels(out))
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
