// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Non-local means accumulation of motion compensated neighbors.

use arrayvec::ArrayVec;

use super::me::SubBlockMotion;
use crate::frame::{Frame, Plane};
use crate::mc::{predict_inter, InterpFilters, MotionVector};
use crate::me::BlockRect;

pub const WINDOW_LENGTH: usize = 5;
pub const TF_WINDOW_BLOCK_BALANCE_WEIGHT: f64 = 5.0;
pub const TF_SEARCH_DISTANCE_THRESHOLD: f64 = 0.1;
pub const TF_WEIGHT_SCALE: f64 = 1000.0;
/// Weight of every sample of the central frame.
pub const TF_PLANEWISE_FILTER_WEIGHT_SCALE: u32 = 1000;
const MAX_SCALED_DIFF: f64 = 7.0;

/// Strength of the filter for one plane.
pub fn decay(decay_control: u8, noise_level: f64) -> f64 {
  let n = decay_control as f64 * (0.7 + (1.0 + noise_level.max(0.0)).ln());
  n.max(f64::EPSILON)
}

/// Scale of vector lengths beyond which a prediction loses weight.
pub fn distance_factor(mv: MotionVector, min_frame_size: usize) -> f64 {
  let threshold =
    (min_frame_size as f64 * TF_SEARCH_DISTANCE_THRESHOLD).max(1.0);
  (mv.fullpel_len() / threshold).max(1.0)
}

/// Weight of one predicted sample.
#[inline]
pub fn sample_weight(
  window_error: f64, block_error: f64, d_factor: f64, n_decay: f64,
) -> u32 {
  let combined = (TF_WINDOW_BLOCK_BALANCE_WEIGHT * window_error + block_error)
    / (TF_WINDOW_BLOCK_BALANCE_WEIGHT + 1.0);
  let scaled =
    (combined * d_factor / (2.0 * n_decay * n_decay)).min(MAX_SCALED_DIFF);
  ((-scaled).exp() * TF_WEIGHT_SCALE).round() as u32
}

#[derive(Clone, Copy, Debug)]
pub struct NlmParams {
  pub n_decay: [f64; 3],
  pub min_frame_size: usize,
  pub bit_depth: usize,
}

/// Block of `plane` covering the luma rectangle `luma`.
#[inline]
fn plane_rect(luma: BlockRect, plane: usize) -> BlockRect {
  if plane == 0 {
    luma
  } else {
    BlockRect::new(luma.x >> 1, luma.y >> 1, luma.w >> 1, luma.h >> 1)
  }
}

/// Filter accumulators of one 64x64 block.
#[derive(Debug)]
pub struct BlockAccumulator {
  rects: [BlockRect; 3],
  accum: [Vec<u32>; 3],
  count: [Vec<u32>; 3],
}

impl BlockAccumulator {
  pub fn new(luma: BlockRect) -> Self {
    let rects = [0, 1, 2].map(|p| plane_rect(luma, p));
    BlockAccumulator {
      accum: rects.map(|r| vec![0; r.w * r.h]),
      count: rects.map(|r| vec![0; r.w * r.h]),
      rects,
    }
  }

  /// Adds the central frame at the fixed planewise weight.
  pub fn add_center(&mut self, center: &Frame<u16>) {
    for p in 0..3 {
      let r = self.rects[p];
      let plane = &center.planes[p];
      for y in 0..r.h {
        let row = &plane.row((r.y + y) as isize)[r.x..r.x + r.w];
        for (x, &v) in row.iter().enumerate() {
          self.accum[p][y * r.w + x] +=
            TF_PLANEWISE_FILTER_WEIGHT_SCALE * v as u32;
          self.count[p][y * r.w + x] += TF_PLANEWISE_FILTER_WEIGHT_SCALE;
        }
      }
    }
  }

  /// Motion compensates `reference` with `motion` and accumulates it.
  pub fn add_reference(
    &mut self, center: &Frame<u16>, reference: &Frame<u16>,
    motion: &[SubBlockMotion], params: &NlmParams,
  ) {
    let blocks: ArrayVec<(BlockRect, MotionVector), 16> =
      motion.iter().flat_map(|m| m.prediction_blocks()).collect();
    let err_shift = 2 * params.bit_depth.saturating_sub(8);

    let mut preds: [Vec<u16>; 3] = self.rects.map(|r| vec![0; r.w * r.h]);
    for (p, pred) in preds.iter_mut().enumerate() {
      let r = self.rects[p];
      for &(luma, mv) in blocks.iter() {
        let b = plane_rect(luma, p);
        if b.w == 0 || b.h == 0 {
          continue;
        }
        let off = (b.y - r.y) * r.w + (b.x - r.x);
        predict_inter(
          &mut pred[off..],
          r.w,
          &reference.planes[p],
          b.x,
          b.y,
          b.w,
          b.h,
          mv,
          InterpFilters::SHARP,
          params.bit_depth,
        );
      }
    }

    // Luma mean squared error and distance factor of each prediction block.
    let luma = self.rects[0];
    let mut owner = vec![0u8; luma.w * luma.h];
    let mut block_info: ArrayVec<(f64, f64), 16> = ArrayVec::new();
    for (i, &(b, mv)) in blocks.iter().enumerate() {
      let mut sse = 0u64;
      for y in b.y..b.y + b.h {
        let src = &center.planes[0].row(y as isize)[b.x..b.x + b.w];
        let row = (y - luma.y) * luma.w + (b.x - luma.x);
        for (x, &s) in src.iter().enumerate() {
          let d = s as i64 - preds[0][row + x] as i64;
          sse += (d * d) as u64;
          owner[row + x] = i as u8;
        }
      }
      let mse = (sse >> err_shift) as f64 / (b.w * b.h) as f64;
      block_info.push((mse, distance_factor(mv, params.min_frame_size)));
    }

    for p in 0..3 {
      self.accumulate_plane(
        &center.planes[p],
        &preds[p],
        p,
        &owner,
        &block_info,
        params.n_decay[p],
        err_shift,
      );
    }
  }

  fn accumulate_plane(
    &mut self, src: &Plane<u16>, pred: &[u16], p: usize, owner: &[u8],
    block_info: &[(f64, f64)], n_decay: f64, err_shift: usize,
  ) {
    let r = self.rects[p];
    let luma_w = self.rects[0].w;
    let dec = usize::from(p > 0);

    let mut sq = vec![0u64; r.w * r.h];
    for y in 0..r.h {
      let s = &src.row((r.y + y) as isize)[r.x..r.x + r.w];
      for (x, &v) in s.iter().enumerate() {
        let d = v as i64 - pred[y * r.w + x] as i64;
        sq[y * r.w + x] = (d * d) as u64;
      }
    }

    let half = WINDOW_LENGTH / 2;
    for y in 0..r.h {
      let (y0, y1) = (y.saturating_sub(half), (y + half + 1).min(r.h));
      for x in 0..r.w {
        let (x0, x1) = (x.saturating_sub(half), (x + half + 1).min(r.w));
        let mut sum = 0u64;
        for wy in y0..y1 {
          sum += sq[wy * r.w + x0..wy * r.w + x1].iter().sum::<u64>();
        }
        let num = (y1 - y0) * (x1 - x0);
        let window_error = (sum >> err_shift) as f64 / num as f64;
        let (block_error, d_factor) =
          block_info[owner[(y << dec) * luma_w + (x << dec)] as usize];
        let weight =
          sample_weight(window_error, block_error, d_factor, n_decay);
        let k = y * r.w + x;
        self.accum[p][k] += weight * pred[k] as u32;
        self.count[p][k] += weight;
      }
    }
  }

  /// Writes `(accum + count / 2) / count` into `out`.
  pub fn normalize_into(&self, out: &mut Frame<u16>) {
    for p in 0..3 {
      let r = self.rects[p];
      let plane = &mut out.planes[p];
      for y in 0..r.h {
        let range = plane.row_range(r.x as isize, (r.y + y) as isize);
        let row = &mut plane.data[range][..r.w];
        for (x, v) in row.iter_mut().enumerate() {
          let k = y * r.w + x;
          let count = self.count[p][k];
          debug_assert!(count > 0);
          *v = ((self.accum[p][k] + count / 2) / count.max(1)) as u16;
        }
      }
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn flat_frame(v: u16) -> Frame<u16> {
    let mut f = Frame::new(64, 64, 32);
    for plane in f.planes.iter_mut() {
      plane.data.iter_mut().for_each(|s| *s = v);
    }
    f
  }

  fn still(rect: BlockRect) -> SubBlockMotion {
    SubBlockMotion {
      rect,
      mv: MotionVector::default(),
      error: 0,
      sub_mvs: [MotionVector::default(); 4],
      sub_errors: [0; 4],
      split: false,
    }
  }

  #[test]
  fn exact_predictions_get_full_weight() {
    assert_eq!(sample_weight(0.0, 0.0, 1.0, decay(4, 1.2)), 1000);
    assert_eq!(sample_weight(1e9, 1e9, 1.0, decay(4, 1.2)), 1);
    let near = sample_weight(10.0, 10.0, 1.0, decay(4, 1.2));
    let far = sample_weight(10.0, 10.0, 3.0, decay(4, 1.2));
    assert!(near > far);
  }

  #[test]
  fn short_vectors_are_not_penalized() {
    assert_eq!(distance_factor(MotionVector::from_fullpel(3, 4), 100), 1.0);
    assert_eq!(distance_factor(MotionVector::from_fullpel(0, 20), 100), 2.0);
  }

  #[test]
  fn uniform_frames_stay_uniform() {
    let center = flat_frame(128);
    let reference = flat_frame(128);
    let luma = BlockRect::new(0, 0, 64, 64);
    let motion = [0, 1, 2, 3].map(|i| {
      still(BlockRect::new((i & 1) * 32, (i >> 1) * 32, 32, 32))
    });
    let params =
      NlmParams { n_decay: [decay(4, 1.2); 3], min_frame_size: 64, bit_depth: 8 };
    let mut acc = BlockAccumulator::new(luma);
    acc.add_center(&center);
    for _ in 0..6 {
      acc.add_reference(&center, &reference, &motion, &params);
    }
    // Center weight plus six exact predictions.
    assert!(acc.count.iter().all(|c| c.iter().all(|&w| w == 7000)));

    let mut out = flat_frame(0);
    acc.normalize_into(&mut out);
    for (p, plane) in out.planes.iter().enumerate() {
      let n = 64 >> usize::from(p > 0);
      assert!((0..n).all(|y| plane.row(y as isize)[..n].iter().all(|&v| v == 128)));
    }
  }

  #[test]
  fn distant_content_barely_moves_the_center() {
    let center = flat_frame(100);
    let reference = flat_frame(200);
    let luma = BlockRect::new(0, 0, 64, 64);
    let motion = [0, 1, 2, 3].map(|i| {
      still(BlockRect::new((i & 1) * 32, (i >> 1) * 32, 32, 32))
    });
    let params =
      NlmParams { n_decay: [decay(2, 0.0); 3], min_frame_size: 64, bit_depth: 8 };
    let mut acc = BlockAccumulator::new(luma);
    acc.add_center(&center);
    acc.add_reference(&center, &reference, &motion, &params);
    let mut out = flat_frame(0);
    acc.normalize_into(&mut out);
    assert_eq!(out.planes[0].p(10, 10), 100);
  }
}
