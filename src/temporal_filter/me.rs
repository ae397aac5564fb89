// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Motion search of one 64x64 filter block against one neighbor.

use arrayvec::ArrayVec;

use crate::mc::{InterpFilters, MotionVector};
use crate::me::*;
use crate::tools::{TfCtrls, TH_OFF};
use crate::util::deviation_pct;

/// Motion of one 32x32 sub-block, and of its 16x16 quarters when refined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubBlockMotion {
  pub rect: BlockRect,
  pub mv: MotionVector,
  /// Best predictor-vs-source variance of the 32x32.
  pub error: u64,
  pub sub_mvs: [MotionVector; 4],
  pub sub_errors: [u64; 4],
  /// Predict the four 16x16 quarters separately.
  pub split: bool,
}

impl SubBlockMotion {
  /// Rectangle and vector of every prediction block, in luma samples.
  pub fn prediction_blocks(
    &self,
  ) -> ArrayVec<(BlockRect, MotionVector), 4> {
    let mut out = ArrayVec::new();
    if self.split {
      for (rect, &mv) in quadrants(self.rect, 16).into_iter().zip(&self.sub_mvs)
      {
        out.push((rect, mv));
      }
    } else {
      out.push((self.rect, self.mv));
    }
    out
  }
}

/// The sub-blocks of `blk` of side `size` that start inside it, in raster
/// order, clipped to it.
pub fn quadrants(blk: BlockRect, size: usize) -> ArrayVec<BlockRect, 4> {
  let mut out = ArrayVec::new();
  for i in 0..4 {
    let x = blk.x + (i & 1) * size;
    let y = blk.y + (i >> 1) * size;
    if x < blk.x + blk.w && y < blk.y + blk.h {
      let w = size.min(blk.x + blk.w - x);
      let h = size.min(blk.y + blk.h - y);
      out.push(BlockRect::new(x, y, w, h));
    }
  }
  out
}

/// Whether a 32x32 keeps one vector or is predicted as four 16x16 blocks.
pub fn split_decision(block_error: u64, sub_errors: &[u64; 4]) -> bool {
  let sum: u64 = sub_errors.iter().sum();
  let max = sub_errors.iter().copied().max().unwrap_or(0);
  let min = sub_errors.iter().copied().min().unwrap_or(0);
  let spread = max - min;
  !(15 * block_error < 16 * sum && spread < 12000)
    && !(14 * block_error < 16 * sum && spread < 6000)
}

/// A distant neighbor is dropped for a block when 8x8 vectors explain it
/// much better than 16x16 vectors.
fn skip_reference(
  org: &MePlanes, rf: &MePlanes, me16: &[(BlockRect, SearchResult)], th: i64,
) -> bool {
  let mut dist_16x16 = 0u64;
  let mut dist_8x8 = 0u64;
  for (rect, r) in me16 {
    dist_16x16 += r.sad as u64;
    for q in quadrants(*rect, 8) {
      let fine = full_search(
        &org.full,
        &rf.full,
        &q,
        r.mv,
        1,
        1,
        MotionVector::default(),
        0,
      );
      dist_8x8 += fine.sad as u64;
    }
  }
  deviation_pct(dist_16x16, dist_8x8) > th
}

/// Searches `blk`, a 64x64 luma block, in `rf`. Returns `None` when the
/// neighbor is skipped for this block.
pub fn search_block(
  org: &MePlanes, rf: &MePlanes, blk: BlockRect, ctrls: &TfCtrls,
  distant: bool, bit_depth: usize,
) -> Option<ArrayVec<SubBlockMotion, 4>> {
  let [r0, r1, r2] = ctrls.hme_range;
  let me16: ArrayVec<(BlockRect, SearchResult), 16> = quadrants(blk, 32)
    .into_iter()
    .flat_map(|b32| quadrants(b32, 16))
    .map(|b16| (b16, hme_search(org, rf, &b16, r0, r1, r2)))
    .collect();

  if distant
    && ctrls.me_16x16_to_8x8_dev_th != TH_OFF
    && skip_reference(org, rf, &me16, ctrls.me_16x16_to_8x8_dev_th)
  {
    return None;
  }

  let params = SubpelParams {
    half_pel_mode: ctrls.half_pel_mode,
    quarter_pel: ctrls.quarter_pel_mode,
    eighth_pel: ctrls.eight_pel_mode,
  };
  let refine = |rect: &BlockRect, start: MotionVector| {
    subpel_search(
      &org.full,
      &rf.full,
      rect,
      start,
      params,
      InterpFilters::REGULAR,
      bit_depth,
      DistMetric::Variance,
    )
  };

  let mut out = ArrayVec::new();
  for b32 in quadrants(blk, 32) {
    let start = hme_search(org, rf, &b32, r0, r1, r2).mv;
    let (mv, error) = refine(&b32, start);
    let mut sb = SubBlockMotion {
      rect: b32,
      mv,
      error,
      sub_mvs: [mv; 4],
      sub_errors: [0; 4],
      split: false,
    };

    let full = b32.w == 32 && b32.h == 32;
    if full && error >= ctrls.pred_error_32x32_th {
      for (i, b16) in quadrants(b32, 16).into_iter().enumerate() {
        let start = me16
          .iter()
          .find(|(r, _)| *r == b16)
          .map_or(mv, |(_, res)| res.mv);
        let (sub_mv, sub_error) = refine(&b16, start);
        sb.sub_mvs[i] = sub_mv;
        sb.sub_errors[i] = sub_error;
      }
      sb.split = split_decision(error, &sb.sub_errors);
    }
    out.push(sb);
  }
  Some(out)
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::temporal_filter::test::{field_plane, shifted_plane};
  use crate::tools::TF_CTRLS;

  #[test]
  fn quadrants_clip_to_the_block() {
    let q = quadrants(BlockRect::new(64, 0, 40, 64), 32);
    assert_eq!(
      q.as_slice(),
      &[
        BlockRect::new(64, 0, 32, 32),
        BlockRect::new(96, 0, 8, 32),
        BlockRect::new(64, 32, 32, 32),
        BlockRect::new(96, 32, 8, 32),
      ]
    );
    assert_eq!(quadrants(BlockRect::new(0, 0, 16, 16), 32).len(), 1);
  }

  #[test]
  fn uniform_sub_errors_keep_the_32x32() {
    assert!(!split_decision(4000, &[1000, 1000, 1000, 1000]));
    // The quarters explain the block far better.
    assert!(split_decision(40000, &[1000, 1000, 1000, 1000]));
    // A wide spread between quarters also splits.
    assert!(split_decision(20000, &[0, 0, 0, 20000]));
  }

  #[test]
  fn finds_a_global_translation() {
    let src = field_plane(7, 192, 192);
    let rf = shifted_plane(&src, 3, -2);
    let org = MePlanes::new(&src);
    let rf = MePlanes::new(&rf);
    let blk = BlockRect::new(64, 64, 64, 64);
    let ctrls = TfCtrls {
      hme_range: [4, 2, 2],
      pred_error_32x32_th: 1,
      ..TF_CTRLS[1]
    };
    let Some(m) = search_block(&org, &rf, blk, &ctrls, false, 8) else {
      panic!("close neighbors are never skipped");
    };
    assert_eq!(m.len(), 4);
    for sb in m.iter() {
      assert_eq!(sb.mv, MotionVector::from_fullpel(-2, 3));
      assert_eq!(sb.error, 0);
      assert!(!sb.split);
    }
  }
}
