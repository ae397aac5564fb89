// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Motion search shared by picture analysis, mode decision and the
//! temporal filter.

use crate::frame::*;
use crate::mc::*;
use crate::rdo::mv_rate;
use crate::util::variance_from_sums;

/// Rectangle of the block being searched, in samples of the searched plane.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockRect {
  pub x: usize,
  pub y: usize,
  pub w: usize,
  pub h: usize,
}

impl BlockRect {
  pub const fn new(x: usize, y: usize, w: usize, h: usize) -> Self {
    BlockRect { x, y, w, h }
  }

  /// The same block on a plane decimated by `1 << shift`.
  pub const fn scaled_down(self, shift: usize) -> Self {
    BlockRect {
      x: self.x >> shift,
      y: self.y >> shift,
      w: if self.w >> shift == 0 { 1 } else { self.w >> shift },
      h: if self.h >> shift == 0 { 1 } else { self.h >> shift },
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SearchResult {
  pub mv: MotionVector,
  pub sad: u32,
  pub cost: u64,
}

impl Default for SearchResult {
  fn default() -> Self {
    SearchResult { mv: MotionVector::default(), sad: u32::MAX, cost: u64::MAX }
  }
}

/// Luma plane at full, quarter and sixteenth area.
#[derive(Clone, Debug)]
pub struct MePlanes {
  pub full: Plane<u16>,
  pub quarter: Plane<u16>,
  pub sixteenth: Plane<u16>,
}

impl MePlanes {
  pub fn new(luma: &Plane<u16>) -> Self {
    let (w, h) = (luma.cfg.width, luma.cfg.height);
    let quarter = luma.downsampled(w, h);
    let sixteenth = quarter.downsampled(w, h);
    MePlanes { full: luma.clone(), quarter, sixteenth }
  }
}

/// Fullpel positions at which a `w` x `h` block stays inside the allocation
/// of `p`, keeping room for the interpolation taps.
fn position_bounds(
  p: &Plane<u16>, w: usize, h: usize,
) -> (isize, isize, isize, isize) {
  let c = &p.cfg;
  let margin = (SUBPEL_FILTER_SIZE / 2) as isize;
  let x_lo = -(c.xorigin as isize) + margin;
  let y_lo = -(c.yorigin as isize) + margin;
  let x_hi = (c.stride - c.xorigin) as isize - w as isize - margin;
  let y_hi = (c.alloc_height - c.yorigin) as isize - h as isize - margin;
  (x_lo, x_hi.max(x_lo), y_lo, y_hi.max(y_lo))
}

#[inline]
pub fn get_sad(
  org: &Plane<u16>, blk: &BlockRect, rf: &Plane<u16>, rx: isize, ry: isize,
) -> u32 {
  let mut sum = 0u32;
  for r in 0..blk.h {
    let o = &org.row((blk.y + r) as isize)[blk.x..blk.x + blk.w];
    let range = rf.row_range(rx, ry + r as isize);
    let f = &rf.data[range][..blk.w];
    sum += o
      .iter()
      .zip(f)
      .map(|(&a, &b)| (a as i32 - b as i32).unsigned_abs())
      .sum::<u32>();
  }
  sum
}

#[inline]
fn mv_cost(sad: u32, mv: MotionVector, pmv: MotionVector, lambda: u32) -> u64 {
  256 * sad as u64 + (mv_rate(mv - pmv) >> 9) as u64 * lambda as u64
}

fn evaluate(
  org: &Plane<u16>, rf: &Plane<u16>, blk: &BlockRect, mv: MotionVector,
  pmv: MotionVector, lambda: u32, bounds: (isize, isize, isize, isize),
) -> Option<SearchResult> {
  let rx = blk.x as isize + (mv.col >> 3) as isize;
  let ry = blk.y as isize + (mv.row >> 3) as isize;
  if rx < bounds.0 || rx > bounds.1 || ry < bounds.2 || ry > bounds.3 {
    return None;
  }
  let sad = get_sad(org, blk, rf, rx, ry);
  Some(SearchResult { mv, sad, cost: mv_cost(sad, mv, pmv, lambda) })
}

/// Exhaustive fullpel search of `range_x` x `range_y` positions around
/// `center`. Ties keep the first position in raster order.
pub fn full_search(
  org: &Plane<u16>, rf: &Plane<u16>, blk: &BlockRect, center: MotionVector,
  range_x: isize, range_y: isize, pmv: MotionVector, lambda: u32,
) -> SearchResult {
  let bounds = position_bounds(rf, blk.w, blk.h);
  let center = center.quantize_to_fullpel();
  let mut best = SearchResult::default();
  for dy in -range_y..=range_y {
    for dx in -range_x..=range_x {
      let mv = center + MotionVector::from_fullpel(dy, dx);
      if let Some(r) = evaluate(org, rf, blk, mv, pmv, lambda, bounds) {
        if r.cost < best.cost {
          best = r;
        }
      }
    }
  }
  if best.cost == u64::MAX {
    // Everything fell outside the allocation; stay in place.
    let bounds = position_bounds(rf, blk.w, blk.h);
    let rx = (blk.x as isize).clamp(bounds.0, bounds.1);
    let ry = (blk.y as isize).clamp(bounds.2, bounds.3);
    let mv = MotionVector::from_fullpel(ry - blk.y as isize, rx - blk.x as isize);
    let sad = get_sad(org, blk, rf, rx, ry);
    best = SearchResult { mv, sad, cost: mv_cost(sad, mv, pmv, lambda) };
  }
  best
}

/// Diamond search starting at the best of `predictors`.
pub fn diamond_search(
  org: &Plane<u16>, rf: &Plane<u16>, blk: &BlockRect,
  predictors: &[MotionVector], pmv: MotionVector, lambda: u32,
) -> SearchResult {
  let bounds = position_bounds(rf, blk.w, blk.h);
  let diamond_pattern = [(1i16, 0i16), (0, 1), (-1, 0), (0, -1)];
  let mut diamond_radius: i16 = 16;

  let mut center = SearchResult::default();
  for &p in predictors {
    if let Some(r) =
      evaluate(org, rf, blk, p.quantize_to_fullpel(), pmv, lambda, bounds)
    {
      if r.cost < center.cost {
        center = r;
      }
    }
  }
  if center.cost == u64::MAX {
    return full_search(org, rf, blk, MotionVector::default(), 0, 0, pmv, lambda);
  }

  loop {
    let mut best_diamond = SearchResult::default();
    for p in diamond_pattern.iter() {
      let cand_mv = MotionVector::new(
        center.mv.row + diamond_radius * p.0,
        center.mv.col + diamond_radius * p.1,
      );
      if let Some(r) = evaluate(org, rf, blk, cand_mv, pmv, lambda, bounds) {
        if r.cost < best_diamond.cost {
          best_diamond = r;
        }
      }
    }

    if center.cost <= best_diamond.cost {
      if diamond_radius == 8 {
        break;
      }
      diamond_radius /= 2;
    } else {
      center = best_diamond;
    }
  }
  center
}

/// Hierarchical search: sixteenth area, then quarter area, then a fullpel
/// refinement at full resolution. Returns a fullpel vector for `blk`, given
/// in full resolution samples.
pub fn hme_search(
  org: &MePlanes, rf: &MePlanes, blk: &BlockRect, range_l0: isize,
  range_l1: isize, range_l2: isize,
) -> SearchResult {
  let zero = MotionVector::default();
  let b16 = blk.scaled_down(2);
  let l0 = full_search(
    &org.sixteenth,
    &rf.sixteenth,
    &b16,
    zero,
    range_l0,
    range_l0,
    zero,
    0,
  );
  let b4 = blk.scaled_down(1);
  let l1 = full_search(
    &org.quarter,
    &rf.quarter,
    &b4,
    l0.mv << 1,
    range_l1,
    range_l1,
    zero,
    0,
  );
  full_search(&org.full, &rf.full, blk, l1.mv << 1, range_l2, range_l2, zero, 0)
}

/// Distortion measure used to rank sub-pel positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DistMetric {
  Sad,
  Sse,
  /// Sum of squared differences minus the squared mean difference.
  Variance,
}

pub fn block_error(
  org: &Plane<u16>, blk: &BlockRect, pred: &[u16], pred_stride: usize,
  metric: DistMetric,
) -> u64 {
  let mut sad = 0u64;
  let mut sse = 0u64;
  let mut sum = 0i64;
  for r in 0..blk.h {
    let o = &org.row((blk.y + r) as isize)[blk.x..blk.x + blk.w];
    let p = &pred[r * pred_stride..][..blk.w];
    for (&a, &b) in o.iter().zip(p) {
      let d = a as i64 - b as i64;
      sad += d.unsigned_abs();
      sse += (d * d) as u64;
      sum += d;
    }
  }
  match metric {
    DistMetric::Sad => sad,
    DistMetric::Sse => sse,
    DistMetric::Variance => {
      variance_from_sums(sum, sse, blk.w * blk.h) as u64
    }
  }
}

/// Half-pel neighbor pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum HalfPelMode {
  Off = 0,
  /// All eight neighbors.
  Full = 1,
  /// Horizontal and vertical neighbors only.
  AxisOnly = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubpelParams {
  pub half_pel_mode: HalfPelMode,
  pub quarter_pel: bool,
  pub eighth_pel: bool,
}

const AXIS: [(i16, i16); 4] = [(0, -1), (0, 1), (-1, 0), (1, 0)];
const ALL8: [(i16, i16); 8] =
  [(0, -1), (0, 1), (-1, 0), (1, 0), (-1, -1), (-1, 1), (1, -1), (1, 1)];

/// Refines a vector around `start` in half, quarter and eighth steps.
/// Returns the best vector and its error under `metric`.
pub fn subpel_search(
  org: &Plane<u16>, rf: &Plane<u16>, blk: &BlockRect, start: MotionVector,
  params: SubpelParams, filters: InterpFilters, bit_depth: usize,
  metric: DistMetric,
) -> (MotionVector, u64) {
  let mut pred = vec![0u16; blk.w * blk.h];
  let mut error_at = |mv: MotionVector| -> u64 {
    predict_inter(
      &mut pred, blk.w, rf, blk.x, blk.y, blk.w, blk.h, mv, filters,
      bit_depth,
    );
    block_error(org, blk, &pred, blk.w, metric)
  };

  let mut best_mv = start;
  let mut best_err = error_at(start);
  let mut stages: arrayvec::ArrayVec<(i16, &[(i16, i16)]), 3> =
    arrayvec::ArrayVec::new();
  match params.half_pel_mode {
    HalfPelMode::Off => {}
    HalfPelMode::Full => stages.push((4, &ALL8[..])),
    HalfPelMode::AxisOnly => stages.push((4, &AXIS[..])),
  }
  if params.quarter_pel {
    stages.push((2, &ALL8[..]));
  }
  if params.eighth_pel {
    stages.push((1, &ALL8[..]));
  }

  for (step, pattern) in stages {
    let center = best_mv;
    for &(dr, dc) in pattern {
      let mv = MotionVector::new(center.row + dr * step, center.col + dc * step);
      let err = error_at(mv);
      if err < best_err {
        best_err = err;
        best_mv = mv;
      }
    }
  }
  (best_mv, best_err)
}
