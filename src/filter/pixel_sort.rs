use std::any::Any;

use super::Filter;
use crate::{error::Result, frame::Frame};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Axis {
    Horizontal,
    #[default]
    Vertical,
}

/// Sorts runs of `chunk` pixels by luma along rows or columns.
#[derive(Debug)]
pub struct PixelSort {
    enabled: bool,
    axis: Axis,
    chunk: usize,
    stride: usize,
    reverse: bool,
}

impl Default for PixelSort {
    fn default() -> Self {
        Self {
            enabled: false,
            axis: Axis::Vertical,
            chunk: 32,
            stride: 1,
            reverse: false,
        }
    }
}

impl PixelSort {
    pub fn new(chunk: i32) -> Self {
        let mut sort = Self {
            enabled: true,
            ..Self::default()
        };
        sort.set_chunk(chunk);
        sort
    }

    pub fn set_axis(&mut self, axis: Axis) {
        self.axis = axis;
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn set_chunk(&mut self, v: i32) {
        self.chunk = v.max(1) as usize;
    }

    pub fn chunk(&self) -> usize {
        self.chunk
    }

    /// Every `stride`-th row (or column) is sorted.
    pub fn set_stride(&mut self, v: i32) {
        self.stride = v.max(1) as usize;
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn set_reverse(&mut self, on: bool) {
        self.reverse = on;
    }

    pub fn reverse(&self) -> bool {
        self.reverse
    }

    fn sort_run(&self, run: &mut [[u8; 3]]) {
        if self.reverse {
            run.sort_by_key(|px| std::cmp::Reverse(luma_key(px)));
        } else {
            run.sort_by_key(luma_key);
        }
    }
}

fn luma_key(px: &[u8; 3]) -> u32 {
    77 * px[0] as u32 + 150 * px[1] as u32 + 29 * px[2] as u32
}

impl Filter for PixelSort {
    fn id(&self) -> &'static str {
        "pixel_sort"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn set_enabled(&mut self, on: bool) {
        self.enabled = on;
    }

    fn render(&self, src: &Frame) -> Result<Frame> {
        let mut out = src.to_rgb();
        let (h, w, _) = out.pixels().dim();
        let pixels = out.pixels_mut();

        let (lines, len) = match self.axis {
            Axis::Horizontal => (h, w),
            Axis::Vertical => (w, h),
        };
        let at = |line: usize, i: usize| match self.axis {
            Axis::Horizontal => (line, i),
            Axis::Vertical => (i, line),
        };

        let mut run = Vec::with_capacity(self.chunk);
        for line in (0..lines).step_by(self.stride) {
            for start in (0..len).step_by(self.chunk) {
                let end = (start + self.chunk).min(len);

                run.clear();
                run.extend((start..end).map(|i| {
                    let (y, x) = at(line, i);
                    [pixels[[y, x, 0]], pixels[[y, x, 1]], pixels[[y, x, 2]]]
                }));
                self.sort_run(&mut run);

                for (i, px) in (start..end).zip(&run) {
                    let (y, x) = at(line, i);
                    for (c, v) in px.iter().enumerate() {
                        pixels[[y, x, c]] = *v;
                    }
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

    fn row() -> Frame {
        Frame::from_raw(4, 1, 1, vec![200, 10, 150, 60]).unwrap()
    }

    #[test]
    fn setters_clamp() {
        let mut sort = PixelSort::default();
        sort.set_chunk(0);
        assert_eq!(sort.chunk(), 1);
        sort.set_stride(-4);
        assert_eq!(sort.stride(), 1);
    }

    #[test]
    fn sorts_rows_in_chunks() {
        let mut sort = PixelSort::new(2);
        sort.set_axis(Axis::Horizontal);
        let out = sort.apply(&row()).into_owned().to_gray();
        assert_eq!(out.to_raw(), vec![10, 200, 60, 150]);

        sort.set_reverse(true);
        sort.set_chunk(4);
        let out = sort.apply(&row()).into_owned().to_gray();
        assert_eq!(out.to_raw(), vec![200, 150, 60, 10]);
    }

    #[test]
    fn vertical_sort_leaves_single_row_alone() {
        let out = PixelSort::new(8).apply(&row()).into_owned();
        assert_eq!(out.channels(), 3);
        assert_eq!(out.to_gray().to_raw(), vec![200, 10, 150, 60]);
    }
}
