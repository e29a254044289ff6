use std::any::Any;

use ndarray::{s, Axis};

use super::{ops, Filter, Jpeg};
use crate::{error::Result, frame::Frame};

/// Noise coefficients `(x, y)` per channel.
const NOISE: [(usize, usize); 3] = [(7, 13), (11, 5), (3, 17)];

/// Multi-phase glitch: JPEG crush, channel shift, band tearing, saturation
/// boost and patterned noise, all scaled by `strength`.
///
/// Every phase is a pure function of pixel data and strength, so identical
/// input gives identical output.
#[derive(Debug)]
pub struct Glitch {
    enabled: bool,
    strength: i32,
    jpeg: Jpeg,
}

impl Default for Glitch {
    fn default() -> Self {
        Self {
            enabled: false,
            strength: 30,
            jpeg: Jpeg::new(1),
        }
    }
}

impl Glitch {
    pub fn new(strength: i32) -> Self {
        let mut glitch = Self {
            enabled: true,
            ..Self::default()
        };
        glitch.set_strength(strength);
        glitch
    }

    pub fn set_strength(&mut self, s: i32) {
        self.strength = s.clamp(1, 30);
    }

    pub fn strength(&self) -> i32 {
        self.strength
    }

    /// Height of the horizontal bands torn by the block shift.
    pub fn band_height(&self) -> usize {
        32 + 2 * self.strength as usize
    }

    /// Exclusive upper bound of the per-channel noise offsets.
    pub fn noise_modulus(&self) -> usize {
        2 * self.strength as usize
    }
}

impl Filter for Glitch {
    fn id(&self) -> &'static str {
        "glitch"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
    }

    fn render(&self, src: &Frame) -> Result<Frame> {
        let s = self.strength;

        let mut cur = self.jpeg.recompress(src)?;
        shift_channels(&mut cur, s);
        shift_blocks(&mut cur, s, self.band_height());
        boost_saturation(&mut cur, s);
        add_noise(&mut cur, self.noise_modulus());

        Ok(cur)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Moves one plane so that `dst(x, y) = src(x - tx, y - ty)`, reflecting at the edges.
fn translate_plane(frame: &mut Frame, channel: usize, tx: i64, ty: i64) {
    let (h, w, _) = frame.pixels().dim();
    let plane = frame.pixels().index_axis(Axis(2), channel).to_owned();
    let mut dst = frame.pixels_mut().index_axis_mut(Axis(2), channel);

    for ((y, x), v) in dst.indexed_iter_mut() {
        let sx = ops::reflect(x as i64 - tx, w);
        let sy = ops::reflect(y as i64 - ty, h);
        *v = plane[[sy, sx]];
    }
}

/// Chromatic aberration: plane 0 moves down, plane 2 moves right and up.
fn shift_channels(frame: &mut Frame, s: i32) {
    if frame.channels() < 3 {
        return;
    }
    let s = s as i64;
    translate_plane(frame, 0, 0, s);
    translate_plane(frame, 2, s, -s);
}

/// Tears the frame into bands whose horizontal offset cycles through
/// `-2s ..= 2s` in steps of 2.
fn shift_blocks(frame: &mut Frame, s: i32, band: usize) {
    let (h, w, _) = frame.pixels().dim();

    for y0 in (0..h).step_by(band) {
        let k = (y0 / band) as i32;
        let shift = k % (2 * s + 1) - s;
        if shift == 0 {
            continue;
        }

        let y1 = (y0 + band).min(h);
        let rows = frame.pixels().slice(s![y0..y1, .., ..]).to_owned();
        let mut dst = frame.pixels_mut().slice_mut(s![y0..y1, .., ..]);
        for ((y, x, c), v) in dst.indexed_iter_mut() {
            let sx = ops::reflect(x as i64 - 2 * shift as i64, w);
            *v = rows[[y, sx, c]];
        }
    }
}

/// Adds `3s` to the HSV saturation of every pixel, capped at full saturation.
fn boost_saturation(frame: &mut Frame, s: i32) {
    if frame.channels() < 3 {
        return;
    }
    let boost = 3 * s as u32;

    for mut px in frame.pixels_mut().lanes_mut(Axis(2)) {
        let (hue, sat, val) = rgb_to_hsv(px[0], px[1], px[2]);
        let sat = (sat as u32 + boost).min(255) as u8;
        let [r, g, b] = hsv_to_rgb(hue, sat, val);
        px[0] = r;
        px[1] = g;
        px[2] = b;
    }
}

/// Hue in degrees, saturation and value in `0..=255`.
fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, u8, u8) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = (max - min) as f32;

    let sat = if max == 0 {
        0
    } else {
        ops::saturate(255.0 * delta / max as f32)
    };

    let (r, g, b) = (r as f32, g as f32, b as f32);
    let hue = if delta == 0.0 {
        0.0
    } else if max as f32 == r {
        60.0 * ((g - b) / delta)
    } else if max as f32 == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    (hue.rem_euclid(360.0), sat, max)
}

fn hsv_to_rgb(hue: f32, sat: u8, val: u8) -> [u8; 3] {
    let v = val as f32;
    let c = v * sat as f32 / 255.0;
    let h = hue / 60.0;
    let x = c * (1.0 - (h.rem_euclid(2.0) - 1.0).abs());
    let m = v - c;

    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    [
        ops::saturate(r + m),
        ops::saturate(g + m),
        ops::saturate(b + m),
    ]
}

/// Deterministic coordinate pattern added per channel with saturation.
fn add_noise(frame: &mut Frame, modulus: usize) {
    let channels = frame.channels().min(NOISE.len());

    for ((y, x, c), v) in frame.pixels_mut().indexed_iter_mut() {
        if c >= channels {
            continue;
        }
        let (cx, cy) = NOISE[c];
        let offset = (cx * x + cy * y) % modulus;
        *v = (*v as usize + offset).min(u8::MAX as usize) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> Frame {
        let data = (0..height)
            .flat_map(|y| {
                (0..width).flat_map(move |x| {
                    [(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) * 3 % 256) as u8]
                })
            })
            .collect();
        Frame::from_raw(width, height, 3, data).unwrap()
    }

    #[test]
    fn strength_clamps() {
        let mut glitch = Glitch::default();
        assert_eq!(glitch.strength(), 30);
        glitch.set_strength(0);
        assert_eq!(glitch.strength(), 1);
        glitch.set_strength(-7);
        assert_eq!(glitch.strength(), 1);
        glitch.set_strength(31);
        assert_eq!(glitch.strength(), 30);
        glitch.set_strength(12);
        assert_eq!(glitch.strength(), 12);
    }

    #[test]
    fn band_height_and_modulus_grow_with_strength() {
        let mut glitch = Glitch::default();
        let mut last = (0, 0);
        for s in 1..=30 {
            glitch.set_strength(s);
            let now = (glitch.band_height(), glitch.noise_modulus());
            assert!(now.0 >= last.0 && now.1 >= last.1);
            last = now;
        }
        glitch.set_strength(4);
        assert_eq!((glitch.band_height(), glitch.noise_modulus()), (40, 8));
    }

    #[test]
    fn output_is_deterministic() {
        let frame = gradient(48, 80);
        let a = Glitch::new(7).apply(&frame).into_owned();
        let b = Glitch::new(7).apply(&frame).into_owned();
        assert_eq!(a, b);
        assert_eq!((a.width(), a.height(), a.channels()), (48, 80, 3));
    }

    #[test]
    fn gray_input_becomes_rgb() {
        let frame = gradient(16, 16).to_gray();
        let out = Glitch::new(3).apply(&frame).into_owned();
        assert_eq!(out.channels(), 3);
    }

    #[test]
    fn channel_shift_moves_outer_planes() {
        let src = gradient(4, 4);
        let mut frame = src.clone();
        shift_channels(&mut frame, 1);

        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(frame.get(x, y, 1), src.get(x, y, 1));
                let sy = ops::reflect(y as i64 - 1, 4);
                assert_eq!(frame.get(x, y, 0), src.get(x, sy, 0));
                let (sx, sy) = (ops::reflect(x as i64 - 1, 4), ops::reflect(y as i64 + 1, 4));
                assert_eq!(frame.get(x, y, 2), src.get(sx, sy, 2));
            }
        }
    }

    #[test]
    fn block_shift_cycles_per_band() {
        let data = (0..70u32)
            .flat_map(|_| (0..8u32).flat_map(|x| [(x * 10) as u8, 0, 0]))
            .collect();
        let mut frame = Frame::from_raw(8, 70, 3, data).unwrap();
        shift_blocks(&mut frame, 1, 34);

        // band 0 shifts by -2
        assert_eq!(frame.get(0, 0, 0), 20);
        assert_eq!(frame.get(7, 33, 0), 60);
        // band 1 stays
        assert_eq!(frame.get(0, 40, 0), 0);
        assert_eq!(frame.get(5, 67, 0), 50);
        // band 2 shifts by +2
        assert_eq!(frame.get(0, 69, 0), 10);
        assert_eq!(frame.get(2, 69, 0), 0);
    }

    #[test]
    fn saturation_boost_tints_gray_and_keeps_pure_colors() {
        let mut frame = Frame::from_raw(2, 1, 3, vec![100, 100, 100, 255, 0, 0]).unwrap();
        boost_saturation(&mut frame, 10);

        assert_eq!(frame.get(0, 0, 0), 100);
        assert!(frame.get(0, 0, 1) < 100);
        assert_eq!(
            [frame.get(1, 0, 0), frame.get(1, 0, 1), frame.get(1, 0, 2)],
            [255, 0, 0]
        );
    }

    #[test]
    fn hsv_round_trip() {
        for rgb in [[12u8, 200, 90], [255, 255, 0], [0, 0, 0], [40, 40, 40], [3, 7, 250]] {
            let (h, s, v) = rgb_to_hsv(rgb[0], rgb[1], rgb[2]);
            let back = hsv_to_rgb(h, s, v);
            for c in 0..3 {
                assert!(back[c].abs_diff(rgb[c]) <= 1, "{rgb:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn noise_follows_coordinate_pattern() {
        let mut frame = Frame::new(2, 2, 3);
        add_noise(&mut frame, 10);

        assert_eq!([frame.get(0, 0, 0), frame.get(0, 0, 1), frame.get(0, 0, 2)], [0, 0, 0]);
        assert_eq!([frame.get(1, 0, 0), frame.get(1, 0, 1), frame.get(1, 0, 2)], [7, 1, 3]);
        assert_eq!([frame.get(0, 1, 0), frame.get(0, 1, 1), frame.get(0, 1, 2)], [3, 5, 7]);
        assert_eq!([frame.get(1, 1, 0), frame.get(1, 1, 1), frame.get(1, 1, 2)], [0, 6, 0]);
    }

    #[test]
    fn noise_saturates() {
        let mut frame = Frame::from_raw(2, 1, 3, vec![250; 6]).unwrap();
        add_noise(&mut frame, 60);
        assert_eq!(frame.get(1, 0, 0), 255);
        assert_eq!(frame.get(0, 0, 0), 250);
    }
}
