// Copyright (c) 2018-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use super::*;

/// Sum of squared errors of the visible area of `plane`.
pub fn plane_sse(
  a: &impl SampleSource, b: &impl SampleSource, plane: usize, width: usize,
  height: usize,
) -> u64 {
  let (w, h) = plane_dimensions(plane, width, height);
  let mut sse = 0u64;
  for y in 0..h {
    for x in 0..w {
      let d = a.sample_at(plane, x, y) as i64 - b.sample_at(plane, x, y) as i64;
      sse += (d * d) as u64;
    }
  }
  sse
}

pub fn frame_sse(
  a: &impl SampleSource, b: &impl SampleSource, width: usize, height: usize,
) -> [u64; 3] {
  [0, 1, 2].map(|p| plane_sse(a, b, p, width, height))
}

/// Calculates the PSNR of a plane from its sum of squared errors.
///
/// PSNR is capped at 100 in order to avoid skewed statistics from e.g. all
/// black frames, which would otherwise show a PSNR of infinity.
pub fn psnr(sse: u64, samples: usize, bit_depth: usize) -> f64 {
  let mse = sse as f64 / samples.max(1) as f64;
  if mse <= std::f64::EPSILON {
    return 100.0;
  }
  let max = ((1 << bit_depth) - 1) as f64;
  20.0 * max.log10() - 10.0 * mse.log10()
}

pub fn frame_psnr(
  sse: &[u64; 3], width: usize, height: usize, bit_depth: usize,
) -> [f64; 3] {
  [0, 1, 2].map(|p| {
    let (w, h) = plane_dimensions(p, width, height);
    psnr(sse[p], w * h, bit_depth)
  })
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::frame::PlaneExt;

  #[test]
  fn psnr_of_unit_error() {
    // One level of error everywhere: 20 * log10(255).
    let p = psnr(100, 100, 8);
    assert!((p - 48.1308).abs() < 1e-3);
    assert_eq!(psnr(0, 100, 10), 100.0);
  }

  #[test]
  fn sse_counts_the_visible_area_only() {
    let a = Frame::<u16>::new(20, 20, 8);
    let mut b = a.clone();
    // Outside the 18x18 visible area.
    b.planes[0].set(19, 19, 10);
    assert_eq!(frame_sse(&a, &b, 18, 18), [0; 3]);
    b.planes[1].set(4, 4, 3);
    assert_eq!(frame_sse(&a, &b, 18, 18), [0, 9, 0]);
  }
}
