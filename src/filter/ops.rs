use ndarray::Array3;

use crate::frame::Frame;

/// `fedcba|abcdefgh|hgfedcb`
pub(crate) fn reflect(i: i64, n: usize) -> usize {
    let n = n as i64;
    if n <= 1 {
        return 0;
    }
    let m = i.rem_euclid(2 * n);
    (if m >= n { 2 * n - 1 - m } else { m }) as usize
}

/// `gfedcb|abcdefgh|gfedcba`
pub(crate) fn reflect101(i: i64, n: usize) -> usize {
    let n = n as i64;
    if n <= 1 {
        return 0;
    }
    let period = 2 * n - 2;
    let m = i.rem_euclid(period);
    (if m >= n { period - m } else { m }) as usize
}

/// Sigma used when only a kernel size is given.
pub(crate) fn sigma_for(ksize: usize) -> f32 {
    0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

pub(crate) fn gaussian_kernel(ksize: usize, sigma: f32) -> Vec<f32> {
    let r = (ksize / 2) as i64;
    let denom = 2.0 * sigma * sigma;
    let weights: Vec<f32> = (-r..=r)
        .map(|i| {
            let d = i as f32;
            (-(d * d) / denom).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Separable convolution over every channel with reflect-101 borders.
pub(crate) fn convolve_separable(src: &Frame, kernel: &[f32]) -> Frame {
    let pixels = src.pixels();
    let (h, w, channels) = pixels.dim();
    let radius = (kernel.len() / 2) as i64;

    let mut tmp = vec![0f32; h * w * channels];
    for y in 0..h {
        for x in 0..w {
            for c in 0..channels {
                let mut acc = 0.0;
                for (k, weight) in kernel.iter().enumerate() {
                    let sx = reflect101(x as i64 + k as i64 - radius, w);
                    acc += weight * pixels[[y, sx, c]] as f32;
                }
                tmp[(y * w + x) * channels + c] = acc;
            }
        }
    }

    let out = Array3::from_shape_fn((h, w, channels), |(y, x, c)| {
        let mut acc = 0.0;
        for (k, weight) in kernel.iter().enumerate() {
            let sy = reflect101(y as i64 + k as i64 - radius, h);
            acc += weight * tmp[(sy * w + x) * channels + c];
        }
        saturate(acc)
    });
    Frame::from_pixels(out)
}

/// Kernel length used on `src` for a requested odd `ksize`. Past
/// `2 * max(w, h) + 1` taps the reflected border only repeats itself.
pub(crate) fn kernel_len(ksize: usize, src: &Frame) -> usize {
    let extent = src.width().max(src.height()) as usize;
    ksize.min(2 * extent + 1)
}

pub(crate) fn gaussian_blur(src: &Frame, ksize: usize) -> Frame {
    let len = kernel_len(ksize, src);
    convolve_separable(src, &gaussian_kernel(len, sigma_for(ksize)))
}

pub(crate) fn saturate(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Gray frame to 0/255 with `v >= thresh` on.
pub(crate) fn binarize(gray: &Frame, thresh: u8) -> Frame {
    let out = gray.pixels().mapv(|v| if v >= thresh { 255 } else { 0 });
    Frame::from_pixels(out)
}

/// Rounds up to the next odd number.
pub(crate) fn odd(v: i32) -> i32 {
    if v % 2 == 0 {
        v + 1
    } else {
        v
    }
}
