// Copyright (c) 2020-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::frame::Plane;
use crate::util::round_shift;

/// Gradient magnitude above which a sample counts as an edge, at 8 bits.
const EDGE_THRESHOLD: i32 = 50;
const MIN_SAMPLES: usize = 16;

/// Estimates the standard deviation of the noise of a plane from the
/// Laplacian of its non-edge samples. Returns `None` when too few flat
/// samples exist.
pub fn estimate_noise(
  plane: &Plane<u16>, width: usize, height: usize, bit_depth: usize,
) -> Option<f64> {
  let shift = bit_depth.saturating_sub(8);
  let mut accum = 0u64;
  let mut count = 0usize;
  for y in 1..height.saturating_sub(1) {
    let above = plane.row(y as isize - 1);
    let cur = plane.row(y as isize);
    let below = plane.row(y as isize + 1);
    for x in 1..width.saturating_sub(1) {
      let p = |row: &[u16], dx: isize| row[(x as isize + dx) as usize] as i32;
      let gx = (p(above, -1) - p(above, 1))
        + (p(below, -1) - p(below, 1))
        + 2 * (p(cur, -1) - p(cur, 1));
      let gy = (p(above, -1) - p(below, -1))
        + (p(above, 1) - p(below, 1))
        + 2 * (p(above, 0) - p(below, 0));
      let ga = round_shift(gx.abs() + gy.abs(), shift);
      if ga < EDGE_THRESHOLD {
        let v = 4 * p(cur, 0)
          - 2 * (p(cur, -1) + p(cur, 1) + p(above, 0) + p(below, 0))
          + (p(above, -1) + p(above, 1) + p(below, -1) + p(below, 1));
        accum += round_shift(v.abs(), shift) as u64;
        count += 1;
      }
    }
  }
  if count < MIN_SAMPLES {
    return None;
  }
  Some(
    accum as f64 / (6 * count) as f64 * (std::f64::consts::PI / 2.0).sqrt(),
  )
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::frame::PlaneExt;
  use rand::{Rng, SeedableRng};
  use rand_chacha::ChaChaRng;

  fn plane_with(f: impl FnMut(usize, usize) -> u16) -> Plane<u16> {
    let mut f = f;
    let mut p = Plane::new(64, 64, 0, 0, 8, 8);
    for y in 0..64 {
      for x in 0..64 {
        p.set(x, y, f(x, y));
      }
    }
    p
  }

  #[test]
  fn flat_plane_is_noiseless() {
    let p = plane_with(|_, _| 90);
    assert_eq!(estimate_noise(&p, 64, 64, 8), Some(0.0));
  }

  #[test]
  fn noisier_planes_estimate_higher() {
    let mut ra = ChaChaRng::from_seed([3; 32]);
    let low = plane_with(|_, _| 128 + ra.gen_range(0..3));
    let high = plane_with(|_, _| 128 + ra.gen_range(0..9));
    let (Some(l), Some(h)) =
      (estimate_noise(&low, 64, 64, 8), estimate_noise(&high, 64, 64, 8))
    else {
      panic!("flat enough planes must give an estimate");
    };
    assert!(h > l);
  }

  #[test]
  fn edges_only_gives_no_estimate() {
    let p = plane_with(|x, _| if x % 2 == 0 { 0 } else { 255 });
    assert_eq!(estimate_noise(&p, 64, 64, 8), None);
  }
}
