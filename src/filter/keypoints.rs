use std::any::Any;

use ndarray::Array2;

use super::Filter;
use crate::{error::Result, frame::Frame};

/// Bresenham circle of radius 3 used by FAST, clockwise from 12 o'clock.
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

const ARC: usize = 9;
const MARKER: [u8; 3] = [0, 255, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Detector {
    /// Every FAST corner that survives non-max suppression.
    #[default]
    Fast,
    /// Only the `max_features` highest-scoring FAST corners.
    Strongest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keypoint {
    pub x: usize,
    pub y: usize,
    pub score: u32,
}

/// Detects corners and draws them as green rings over the frame.
#[derive(Debug)]
pub struct Keypoints {
    enabled: bool,
    detector: Detector,
    threshold: i32,
    max_features: i32,
}

impl Default for Keypoints {
    fn default() -> Self {
        Self {
            enabled: false,
            detector: Detector::Fast,
            threshold: 20,
            max_features: 500,
        }
    }
}

impl Keypoints {
    pub fn new(threshold: i32) -> Self {
        let mut keypoints = Self {
            enabled: true,
            ..Self::default()
        };
        keypoints.set_threshold(threshold);
        keypoints
    }

    pub fn set_detector(&mut self, detector: Detector) {
        self.detector = detector;
    }

    pub fn detector(&self) -> Detector {
        self.detector
    }

    pub fn set_threshold(&mut self, v: i32) {
        self.threshold = v.clamp(1, 100);
    }

    pub fn threshold(&self) -> i32 {
        self.threshold
    }

    pub fn set_max_features(&mut self, v: i32) {
        self.max_features = v.clamp(50, 5000);
    }

    pub fn max_features(&self) -> i32 {
        self.max_features
    }

    pub fn detect(&self, src: &Frame) -> Vec<Keypoint> {
        let gray = src.to_gray();
        let scores = fast_scores(&gray, self.threshold);
        let mut found = suppress(&scores);

        if self.detector == Detector::Strongest {
            found.sort_by(|a, b| b.score.cmp(&a.score).then((a.y, a.x).cmp(&(b.y, b.x))));
            found.truncate(self.max_features as usize);
        }
        found
    }
}

fn fast_scores(gray: &Frame, threshold: i32) -> Array2<u32> {
    let (h, w) = (gray.height() as usize, gray.width() as usize);
    let mut scores = Array2::zeros((h, w));
    if h < 7 || w < 7 {
        return scores;
    }

    for y in 3..h - 3 {
        for x in 3..w - 3 {
            let p = gray.get(x, y, 0) as i32;
            let ring: Vec<i32> = CIRCLE
                .iter()
                .map(|&(dx, dy)| {
                    gray.get((x as i32 + dx) as usize, (y as i32 + dy) as usize, 0) as i32 - p
                })
                .collect();

            let brighter = longest_run(&ring, |d| d > threshold);
            let darker = longest_run(&ring, |d| d < -threshold);
            if brighter >= ARC || darker >= ARC {
                scores[[y, x]] = ring
                    .iter()
                    .filter(|d| d.abs() > threshold)
                    .map(|d| (d.abs() - threshold) as u32)
                    .sum();
            }
        }
    }
    scores
}

/// Longest run of consecutive ring entries matching `pred`, wrapping around.
fn longest_run(ring: &[i32], pred: impl Fn(i32) -> bool) -> usize {
    let mut best = 0;
    let mut run = 0;
    for i in 0..ring.len() * 2 {
        if pred(ring[i % ring.len()]) {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best.min(ring.len())
}

fn suppress(scores: &Array2<u32>) -> Vec<Keypoint> {
    let (h, w) = scores.dim();
    let mut found = Vec::new();
    for y in 0..h {
        for x in 0..w {
            let score = scores[[y, x]];
            if score == 0 {
                continue;
            }
            let beaten = (y.saturating_sub(1)..=(y + 1).min(h - 1)).any(|ny| {
                (x.saturating_sub(1)..=(x + 1).min(w - 1)).any(|nx| {
                    (ny, nx) != (y, x)
                        && (scores[[ny, nx]] > score
                            || (scores[[ny, nx]] == score && (ny, nx) < (y, x)))
                })
            });
            if !beaten {
                found.push(Keypoint { x, y, score });
            }
        }
    }
    found
}

impl Filter for Keypoints {
    fn id(&self) -> &'static str {
        "keypoints"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
    }

    fn render(&self, src: &Frame) -> Result<Frame> {
        let keypoints = self.detect(src);
        let mut out = src.to_rgb();
        let (w, h) = (out.width() as i32, out.height() as i32);
        let pixels = out.pixels_mut();

        for kp in keypoints {
            for &(dx, dy) in CIRCLE.iter() {
                let (x, y) = (kp.x as i32 + dx, kp.y as i32 + dy);
                if x < 0 || y < 0 || x >= w || y >= h {
                    continue;
                }
                for (c, v) in MARKER.iter().enumerate() {
                    pixels[[y as usize, x as usize, c]] = *v;
                }
            }
        }
        Ok(out)
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Bright square on a dark background; its four corners are FAST corners.
    fn square() -> Frame {
        let (w, h) = (24usize, 24usize);
        let data = (0..h)
            .flat_map(|y| {
                (0..w).map(move |x| {
                    if (8..16).contains(&x) && (8..16).contains(&y) {
                        220
                    } else {
                        20
                    }
                })
            })
            .collect();
        Frame::from_raw(w as u32, h as u32, 1, data).unwrap()
    }

    #[test]
    fn setters_clamp() {
        let mut kp = Keypoints::default();
        kp.set_threshold(0);
        assert_eq!(kp.threshold(), 1);
        kp.set_threshold(500);
        assert_eq!(kp.threshold(), 100);
        kp.set_max_features(1);
        assert_eq!(kp.max_features(), 50);
        kp.set_max_features(100_000);
        assert_eq!(kp.max_features(), 5000);
    }

    #[test]
    fn finds_square_corners() {
        let found = Keypoints::new(20).detect(&square());
        assert!(!found.is_empty());
        assert!(found.iter().any(|kp| kp.x.abs_diff(8) <= 1 && kp.y.abs_diff(8) <= 1));
        assert!(found.iter().all(|kp| kp.score > 0));
    }

    /// 8x8 grid of isolated bright dots, each a little brighter than the last.
    fn dots() -> Frame {
        let size = 64usize;
        let mut data = vec![20u8; size * size];
        for k in 0..64 {
            let (x, y) = (4 + 8 * (k % 8), 4 + 8 * (k / 8));
            data[y * size + x] = 100 + 2 * k as u8;
        }
        Frame::from_raw(size as u32, size as u32, 1, data).unwrap()
    }

    #[test]
    fn strongest_keeps_the_best_scores_in_order() {
        let mut kp = Keypoints::new(20);
        let all = kp.detect(&dots());
        assert_eq!(all.len(), 64);

        kp.set_detector(Detector::Strongest);
        kp.set_max_features(50);
        let best = kp.detect(&dots());
        assert_eq!(best.len(), 50);
        assert!(best.windows(2).all(|w| w[0].score > w[1].score));

        // brightest dot sits at the last grid cell
        assert_eq!((best[0].x, best[0].y), (60, 60));
        let weakest_kept = best[49].score;
        let dropped: Vec<_> = all.iter().filter(|p| !best.contains(p)).collect();
        assert_eq!(dropped.len(), 14);
        assert!(dropped.iter().all(|p| p.score < weakest_kept));
    }

    #[test]
    fn flat_frame_has_no_corners() {
        let frame = Frame::from_raw(16, 16, 1, vec![90; 256]).unwrap();
        assert!(Keypoints::new(5).detect(&frame).is_empty());
    }

    #[test]
    fn draws_green_markers() {
        let out = Keypoints::new(20).apply(&square()).into_owned();
        assert_eq!(out.channels(), 3);
        let green = out
            .to_raw()
            .chunks_exact(3)
            .filter(|px| *px == MARKER)
            .count();
        assert!(green > 0);
    }

    #[test]
    fn longest_run_wraps() {
        let ring = [1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1];
        assert_eq!(longest_run(&ring, |d| d == 1), 7);
        assert_eq!(longest_run(&[1; 16], |d| d == 1), 16);
    }
}
