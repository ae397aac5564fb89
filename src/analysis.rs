// Copyright (c) 2019-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Source analysis run ahead of Enc-Dec: per-superblock statistics and the
//! fullpel motion field the mode decision seeds its inter candidates from.

use crate::context::{SbGrid, SuperBlockOffset};
use crate::frame::Plane;
use crate::mc::MotionVector;
use crate::me::*;
use crate::util::variance_from_sums;

/// Square sizes the motion field is kept at.
pub const ME_SIZES: [usize; 4] = [64, 32, 16, 8];

#[inline]
const fn me_level(size: usize) -> usize {
  match size {
    64.. => 0,
    32..=63 => 1,
    16..=31 => 2,
    _ => 3,
  }
}

/// Live statistics of one superblock.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SbStats {
  /// Mean of the 8x8 source variances.
  pub variance: u32,
  /// Summed best distortion with 64x64, 32x32, 16x16 and 8x8 blocks.
  pub me_64x64_dist: u64,
  pub me_32x32_dist: u64,
  pub me_16x16_dist: u64,
  pub me_8x8_dist: u64,
  /// Variance of the 8x8 distortions.
  pub me_8x8_cost_variance: u32,
}

/// Best fullpel vectors of the picture, replicated per 8x8 unit for each of
/// the [`ME_SIZES`].
#[derive(Clone, Debug, Default)]
pub struct MvGrid {
  cols: usize,
  rows: usize,
  mvs: [Vec<MotionVector>; 4],
}

impl MvGrid {
  pub fn new(width: usize, height: usize) -> Self {
    let cols = (width + 7) >> 3;
    let rows = (height + 7) >> 3;
    let v = vec![MotionVector::default(); cols * rows];
    MvGrid { cols, rows, mvs: [v.clone(), v.clone(), v.clone(), v] }
  }

  fn fill(&mut self, level: usize, blk: &BlockRect, mv: MotionVector) {
    for r in (blk.y >> 3)..((blk.y + blk.h + 7) >> 3).min(self.rows) {
      for c in (blk.x >> 3)..((blk.x + blk.w + 7) >> 3).min(self.cols) {
        self.mvs[level][r * self.cols + c] = mv;
      }
    }
  }

  /// Vector found for a block of side `size` covering luma `(x, y)`.
  pub fn get(&self, x: usize, y: usize, size: usize) -> MotionVector {
    let c = (x >> 3).min(self.cols - 1);
    let r = (y >> 3).min(self.rows - 1);
    self.mvs[me_level(size)][r * self.cols + c]
  }
}

/// Output of [`analyze_picture`].
#[derive(Clone, Debug, Default)]
pub struct PictureAnalysis {
  pub sb_stats: Vec<SbStats>,
  pub mv_grid: MvGrid,
}

fn block_dc_dist(p: &Plane<u16>, blk: &BlockRect) -> u32 {
  let mut sum = 0u32;
  for r in 0..blk.h {
    sum += p.row((blk.y + r) as isize)[blk.x..blk.x + blk.w]
      .iter()
      .map(|&v| v as u32)
      .sum::<u32>();
  }
  let n = (blk.w * blk.h) as u32;
  let mean = (sum + n / 2) / n;
  let mut sad = 0u32;
  for r in 0..blk.h {
    sad += p.row((blk.y + r) as isize)[blk.x..blk.x + blk.w]
      .iter()
      .map(|&v| (v as i32 - mean as i32).unsigned_abs())
      .sum::<u32>();
  }
  sad
}

fn block_variance(p: &Plane<u16>, blk: &BlockRect) -> u32 {
  let mut sum = 0i64;
  let mut sse = 0u64;
  for r in 0..blk.h {
    for &v in &p.row((blk.y + r) as isize)[blk.x..blk.x + blk.w] {
      sum += v as i64;
      sse += (v as u64) * (v as u64);
    }
  }
  let n = blk.w * blk.h;
  variance_from_sums(sum, sse, n) / n as u32
}

/// Best distortion of `blk`, searched around `center` when a reference is
/// present and measured against its own mean otherwise.
fn search(
  org: &MePlanes, rf: Option<&MePlanes>, blk: &BlockRect,
  center: MotionVector, range: isize,
) -> SearchResult {
  match rf {
    Some(rf) => full_search(
      &org.full,
      &rf.full,
      blk,
      center,
      range,
      range,
      MotionVector::default(),
      0,
    ),
    None => {
      let sad = block_dc_dist(&org.full, blk);
      SearchResult { mv: MotionVector::default(), sad, cost: sad as u64 }
    }
  }
}

fn sub_blocks(blk: &BlockRect, size: usize) -> Vec<BlockRect> {
  let mut out = Vec::with_capacity(4);
  for y in (blk.y..blk.y + blk.h).step_by(size) {
    for x in (blk.x..blk.x + blk.w).step_by(size) {
      out.push(BlockRect::new(
        x,
        y,
        size.min(blk.x + blk.w - x),
        size.min(blk.y + blk.h - y),
      ));
    }
  }
  out
}

/// Computes [`SbStats`] for every superblock and the picture motion field.
/// `width` and `height` are the luma dimensions aligned to 8.
pub fn analyze_picture(
  org: &MePlanes, rf: Option<&MePlanes>, grid: &SbGrid, width: usize,
  height: usize,
) -> PictureAnalysis {
  let mut mv_grid = MvGrid::new(width, height);
  let mut sb_stats = Vec::with_capacity(grid.count());
  let sb = grid.sb_size.size();

  for index in 0..grid.count() {
    let o = SuperBlockOffset::from_index(index, grid.cols).plane_offset(grid.sb_size);
    let (sx, sy) = (o.x as usize, o.y as usize);
    let sb_rect = BlockRect::new(
      sx,
      sy,
      sb.min(width - sx),
      sb.min(height - sy),
    );

    let mut stats = SbStats::default();
    let mut var_sum = 0u64;
    let mut var_count = 0u64;
    let mut d8_sum = 0i64;
    let mut d8_sse = 0u64;
    let mut d8_count = 0usize;

    for b64 in sub_blocks(&sb_rect, 64) {
      let r64 = match rf {
        Some(rf) => hme_search(org, rf, &b64, 8, 2, 2),
        None => search(org, None, &b64, MotionVector::default(), 0),
      };
      mv_grid.fill(0, &b64, r64.mv);
      stats.me_64x64_dist += r64.sad as u64;
      for b32 in sub_blocks(&b64, 32) {
        let r32 = search(org, rf, &b32, r64.mv, 4);
        mv_grid.fill(1, &b32, r32.mv);
        stats.me_32x32_dist += r32.sad as u64;
        for b16 in sub_blocks(&b32, 16) {
          let r16 = search(org, rf, &b16, r32.mv, 2);
          mv_grid.fill(2, &b16, r16.mv);
          stats.me_16x16_dist += r16.sad as u64;
          for b8 in sub_blocks(&b16, 8) {
            let r8 = search(org, rf, &b8, r16.mv, 1);
            mv_grid.fill(3, &b8, r8.mv);
            stats.me_8x8_dist += r8.sad as u64;
            d8_sum += r8.sad as i64;
            d8_sse += (r8.sad as u64) * (r8.sad as u64);
            d8_count += 1;
            var_sum += block_variance(&org.full, &b8) as u64;
            var_count += 1;
          }
        }
      }
    }
    stats.variance = (var_sum / var_count.max(1)) as u32;
    let n = d8_count.max(1) as i64;
    let spread = (d8_sse as i64 - d8_sum * d8_sum / n).max(0) / n;
    stats.me_8x8_cost_variance = spread.min(u32::MAX as i64) as u32;
    sb_stats.push(stats);
  }

  PictureAnalysis { sb_stats, mv_grid }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::frame::PlaneExt;
  use crate::partition::SbSize;

  fn plane_with(f: impl Fn(usize, usize) -> u16) -> Plane<u16> {
    let mut p = Plane::new(128, 64, 0, 0, 32, 32);
    for y in 0..64 {
      for x in 0..128 {
        p.set(x, y, f(x, y));
      }
    }
    p.pad(128, 64);
    p
  }

  #[test]
  fn flat_source_has_no_activity() {
    let org = MePlanes::new(&plane_with(|_, _| 100));
    let grid = SbGrid::new(128, 64, SbSize::Sb64);
    let a = analyze_picture(&org, None, &grid, 128, 64);
    assert_eq!(a.sb_stats.len(), 2);
    assert!(a.sb_stats.iter().all(|s| *s == SbStats::default()));
  }

  #[test]
  fn textured_source_has_activity() {
    let org = MePlanes::new(&plane_with(|x, y| ((x * x + y * 3) % 251) as u16));
    let grid = SbGrid::new(128, 64, SbSize::Sb64);
    let a = analyze_picture(&org, None, &grid, 128, 64);
    for s in &a.sb_stats {
      assert!(s.me_64x64_dist > 0);
      assert!(s.me_8x8_dist > 0);
      assert!(s.variance > 0);
    }
  }

  #[test]
  fn static_reference_gives_zero_motion() {
    let p = plane_with(|x, y| ((x * 5 + y * 11) % 97) as u16);
    let org = MePlanes::new(&p);
    let rf = MePlanes::new(&p);
    let grid = SbGrid::new(128, 64, SbSize::Sb64);
    let a = analyze_picture(&org, Some(&rf), &grid, 128, 64);
    assert_eq!(a.sb_stats[0].me_8x8_dist, 0);
    assert_eq!(a.mv_grid.get(40, 40, 16), MotionVector::default());
  }
}
