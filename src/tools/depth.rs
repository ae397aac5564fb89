// Copyright (c) 2020-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Depth removal and the statistic-driven threshold modulation shared with
//! depth refinement.

use super::tables::*;
use crate::analysis::SbStats;
use crate::util::deviation_pct;

/// Square sizes a superblock will not be split below.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct DepthRemoval {
  pub disallow_below_64x64: bool,
  pub disallow_below_32x32: bool,
  pub disallow_below_16x16: bool,
}

impl DepthRemoval {
  /// Smallest square side still allowed.
  pub fn min_sq_size(&self) -> usize {
    if self.disallow_below_64x64 {
      64
    } else if self.disallow_below_32x32 {
      32
    } else if self.disallow_below_16x16 {
      16
    } else {
      4
    }
  }
}

/// Threshold multiplier in 1/16 for the spread of the 8x8 ME distortions.
/// Uniform motion fields get more aggressive removal.
fn cost_variance_scale(me_8x8_cost_variance: u32) -> u64 {
  match me_8x8_cost_variance {
    0..=999 => 32,
    1000..=4999 => 24,
    5000..=19999 => 16,
    20000..=99999 => 10,
    _ => 4,
  }
}

/// Threshold multiplier in 1/16 for the source variance.
fn variance_scale(variance: u32) -> u64 {
  match variance {
    0..=99 => 24,
    100..=999 => 16,
    _ => 8,
  }
}

/// Mean distortion per sample in 1/16 units, at 8-bit scale.
fn per_sample(dist: u64, samples: u64, bit_depth: usize) -> u64 {
  ((dist << 4) / samples.max(1)) >> (bit_depth - 8)
}

/// Applies the depth removal thresholds of `ctrls` to the statistics of one
/// superblock covering `samples` luma samples.
pub fn depth_removal(
  ctrls: &DepthRemovalCtrls, stats: &SbStats, samples: usize,
  bit_depth: usize,
) -> DepthRemoval {
  if !ctrls.enabled {
    return DepthRemoval::default();
  }
  let scale = cost_variance_scale(stats.me_8x8_cost_variance)
    * variance_scale(stats.variance);
  let th = |t: u64| (t * scale) >> 8;
  let samples = samples as u64;

  let cost_64 = per_sample(stats.me_64x64_dist, samples, bit_depth);
  let cost_32 = per_sample(stats.me_32x32_dist, samples, bit_depth);
  let cost_16 = per_sample(stats.me_16x16_dist, samples, bit_depth);

  let dev_32_16 = deviation_pct(stats.me_32x32_dist, stats.me_16x16_dist);
  let dev_32_8 = deviation_pct(stats.me_32x32_dist, stats.me_8x8_dist);
  let dev_16_8 = deviation_pct(stats.me_16x16_dist, stats.me_8x8_dist);

  DepthRemoval {
    disallow_below_64x64: cost_64 < th(ctrls.disallow_below_64x64_th),
    disallow_below_32x32: cost_32 < th(ctrls.disallow_below_32x32_th)
      || (dev_32_16 < ctrls.dev_32_16_th && dev_32_8 < ctrls.dev_32_8_th),
    disallow_below_16x16: cost_16 < th(ctrls.disallow_below_16x16_th)
      || dev_16_8 < ctrls.dev_16_8_th,
  }
}

/// Offset added to the refinement thresholds. Busy superblocks whose small
/// blocks pay off get wider windows, flat ones narrower.
pub fn refinement_th_offset(stats: &SbStats) -> i64 {
  let dev_64_8 = deviation_pct(stats.me_64x64_dist, stats.me_8x8_dist);
  if stats.variance < 100 && dev_64_8 < 10 {
    -5
  } else if dev_64_8 > 100 {
    10
  } else {
    0
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use pretty_assertions::assert_eq;

  fn stats(d64: u64, d32: u64, d16: u64, d8: u64) -> SbStats {
    SbStats {
      variance: 500,
      me_64x64_dist: d64,
      me_32x32_dist: d32,
      me_16x16_dist: d16,
      me_8x8_dist: d8,
      me_8x8_cost_variance: 30000,
    }
  }

  #[test]
  fn disabled_keeps_every_depth() {
    let s = stats(0, 0, 0, 0);
    let r = depth_removal(&DEPTH_REMOVAL_CTRLS[0], &s, 4096, 8);
    assert_eq!(r, DepthRemoval::default());
    assert_eq!(r.min_sq_size(), 4);
  }

  #[test]
  fn flat_distortion_removes_small_blocks() {
    let s = stats(100, 100, 100, 100);
    let r = depth_removal(&DEPTH_REMOVAL_CTRLS[2], &s, 4096, 8);
    assert!(r.disallow_below_64x64);
    assert_eq!(r.min_sq_size(), 64);
  }

  #[test]
  fn gains_from_splitting_keep_depths() {
    // Distortion drops sharply with every split.
    let s = stats(400_000, 200_000, 100_000, 20_000);
    let r = depth_removal(&DEPTH_REMOVAL_CTRLS[1], &s, 4096, 8);
    assert_eq!(r, DepthRemoval::default());
  }

  #[test]
  fn deviation_rule_removes_below_32() {
    // High absolute cost, but 16x16 and 8x8 barely improve on 32x32.
    let s = stats(1_000_000, 900_000, 880_000, 870_000);
    let r = depth_removal(&DEPTH_REMOVAL_CTRLS[3], &s, 4096, 8);
    assert!(!r.disallow_below_64x64);
    assert!(r.disallow_below_32x32);
    assert_eq!(r.min_sq_size(), 32);
  }

  #[test]
  fn ten_bit_costs_are_normalized() {
    let s8 = stats(40_000, 30_000, 20_000, 10_000);
    let s10 = stats(160_000, 120_000, 80_000, 40_000);
    for c in DEPTH_REMOVAL_CTRLS.iter() {
      assert_eq!(
        depth_removal(c, &s8, 4096, 8),
        depth_removal(c, &s10, 4096, 10)
      );
    }
  }

  #[test]
  fn refinement_offset_bands() {
    #[rustfmt::skip]
    let cases = [
      // variance, d64, d8, offset
      (50, 1_050, 1_000, -5),
      (50, 1_100, 1_000, 0),
      (99, 1_000, 1_000, -5),
      (100, 1_000, 1_000, 0),
      (500, 2_000, 1_000, 0),
      (500, 2_010, 1_000, 10),
      (50, 3_000, 1_000, 10),
    ];
    for (variance, d64, d8, offset) in cases {
      let s = SbStats { variance, ..stats(d64, 0, 0, d8) };
      assert_eq!(refinement_th_offset(&s), offset, "{variance} {d64} {d8}");
    }
  }
}
