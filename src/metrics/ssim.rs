// Copyright (c) 2019-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use super::*;

const WINDOW: usize = 8;
const STRIDE: usize = 4;

const SSIM_K1: f64 = 0.01 * 0.01;
const SSIM_K2: f64 = 0.03 * 0.03;

#[derive(Debug, Clone, Copy, Default)]
struct SsimMoments {
  mux: i64,
  muy: i64,
  x2: i64,
  xy: i64,
  y2: i64,
  w: i64,
}

fn window_moments(
  a: &impl SampleSource, b: &impl SampleSource, plane: usize, x0: usize,
  y0: usize, w: usize, h: usize,
) -> SsimMoments {
  let mut m = SsimMoments::default();
  for y in y0..y0 + h {
    for x in x0..x0 + w {
      let pix1 = a.sample_at(plane, x, y) as i64;
      let pix2 = b.sample_at(plane, x, y) as i64;
      m.mux += pix1;
      m.muy += pix2;
      m.x2 += pix1 * pix1;
      m.xy += pix1 * pix2;
      m.y2 += pix2 * pix2;
      m.w += 1;
    }
  }
  m
}

fn window_ssim(m: &SsimMoments, sample_max: f64) -> f64 {
  let c1 = sample_max * sample_max * SSIM_K1;
  let c2 = sample_max * sample_max * SSIM_K2;
  let w = m.w as f64;
  let mx = m.mux as f64 / w;
  let my = m.muy as f64 / w;
  let vx = m.x2 as f64 / w - mx * mx;
  let vy = m.y2 as f64 / w - my * my;
  let cxy = m.xy as f64 / w - mx * my;
  ((2.0 * mx * my + c1) * (2.0 * cxy + c2))
    / ((mx * mx + my * my + c1) * (vx + vy + c2))
}

/// Mean SSIM of the 8x8 windows of `plane` taken every 4 samples.
pub fn plane_ssim(
  a: &impl SampleSource, b: &impl SampleSource, plane: usize, width: usize,
  height: usize, bit_depth: usize,
) -> f64 {
  let (pw, ph) = plane_dimensions(plane, width, height);
  let (ww, wh) = (WINDOW.min(pw), WINDOW.min(ph));
  if ww == 0 || wh == 0 {
    return 1.0;
  }
  let sample_max = ((1 << bit_depth) - 1) as f64;
  let mut sum = 0.0;
  let mut count = 0usize;
  for y in (0..=ph - wh).step_by(STRIDE) {
    for x in (0..=pw - ww).step_by(STRIDE) {
      let m = window_moments(a, b, plane, x, y, ww, wh);
      sum += window_ssim(&m, sample_max);
      count += 1;
    }
  }
  sum / count as f64
}

pub fn frame_ssim(
  a: &impl SampleSource, b: &impl SampleSource, width: usize, height: usize,
  bit_depth: usize,
) -> [f64; 3] {
  [0, 1, 2].map(|p| plane_ssim(a, b, p, width, height, bit_depth))
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::metrics::test::noisy_frame;

  #[test]
  fn identical_planes_score_one() {
    let f = noisy_frame(3, 8);
    assert_eq!(frame_ssim(&f, &f, 64, 48, 8), [1.0; 3]);
  }

  #[test]
  fn noise_lowers_the_score() {
    let a = noisy_frame(4, 8);
    let mut b = a.clone();
    for (i, v) in b.planes[0].data.iter_mut().enumerate() {
      if i % 3 == 0 {
        *v = (*v + 40).min(255);
      }
    }
    let s = plane_ssim(&a, &b, 0, 64, 48, 8);
    assert!(s < 1.0 && s > 0.0);
    let unrelated = noisy_frame(5, 8);
    assert!(plane_ssim(&a, &unrelated, 0, 64, 48, 8) < s);
  }
}
