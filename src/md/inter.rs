// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Predictions of candidates, shared by mode decision (open loop, edges
//! from the source) and the encode pass (edges from the neighbor arrays).

use std::sync::Arc;

use super::Candidate;
use crate::analysis::MvGrid;
use crate::context::SampleNeighbors;
use crate::frame::{Frame, Plane};
use crate::mc::*;
use crate::palette::palette_predict;
use crate::predict::*;

/// Where intra edges are read from.
#[derive(Clone, Copy)]
pub enum EdgeSource<'a> {
  /// Samples of a full plane; available away from the picture border.
  Plane(&'a Plane<u16>),
  /// Reconstructed neighbors of a tile starting at luma row `tile_y`
  /// (already scaled for chroma).
  Neighbors { arrays: &'a SampleNeighbors, tile_y: usize },
}

impl EdgeSource<'_> {
  pub fn edges(
    &self, x: usize, y: usize, w: usize, h: usize, bit_depth: usize,
  ) -> IntraEdges {
    match *self {
      EdgeSource::Plane(p) => IntraEdges::from_plane(p, x, y, w, h, bit_depth),
      EdgeSource::Neighbors { arrays, tile_y } => {
        let ty = y - tile_y;
        let above = (ty > 0).then(|| arrays.above(x, w));
        let left = (x > 0).then(|| arrays.left(ty, h));
        let top_left = (x > 0 && ty > 0).then(|| arrays.top_left(x, ty));
        IntraEdges::new(
          above.as_deref(),
          left.as_deref(),
          top_left,
          w,
          h,
          bit_depth,
        )
      }
    }
  }
}

/// Inputs shared by every prediction of a picture.
#[derive(Clone, Copy)]
pub struct PredictionInputs<'a> {
  pub source: &'a Frame<u16>,
  pub refs: &'a [Arc<Frame<u16>>],
  pub mv_grid: &'a MvGrid,
  pub bit_depth: usize,
}

static OBMC_MASK_2: [u8; 2] = [45, 64];
static OBMC_MASK_4: [u8; 4] = [39, 50, 59, 64];
static OBMC_MASK_8: [u8; 8] = [36, 42, 48, 53, 57, 61, 64, 64];
static OBMC_MASK_16: [u8; 16] =
  [34, 37, 40, 43, 46, 49, 52, 54, 56, 58, 60, 61, 64, 64, 64, 64];
static OBMC_MASK_32: [u8; 32] = [
  33, 35, 36, 38, 40, 41, 43, 44, 45, 47, 48, 50, 51, 52, 53, 55, 56, 57, 58,
  59, 60, 60, 61, 62, 64, 64, 64, 64, 64, 64, 64, 64,
];

fn obmc_mask(len: usize) -> &'static [u8] {
  match len {
    0..=2 => &OBMC_MASK_2,
    3..=4 => &OBMC_MASK_4,
    5..=8 => &OBMC_MASK_8,
    9..=16 => &OBMC_MASK_16,
    _ => &OBMC_MASK_32,
  }
}

/// Whether a block at luma `(x, y)` has an inter neighbor to blend with.
#[inline]
pub fn obmc_possible(x: usize, y: usize) -> bool {
  x > 0 || y > 0
}

/// Blends predictions made with the above and left neighbors' vectors over
/// the top rows and left columns of `pred`.
fn apply_obmc(
  pred: &mut [u16], rf: &Plane<u16>, x: usize, y: usize, w: usize, h: usize,
  mv_grid: &MvGrid, luma_x: usize, luma_y: usize, size: usize,
  filters: InterpFilters, bit_depth: usize,
) {
  let mut nb = vec![0u16; w * h];
  if luma_y > 0 {
    let mv = mv_grid.get(luma_x, luma_y - 1, size);
    let rows = (h.min(64) >> 1).max(1);
    let mask = obmc_mask(rows);
    predict_inter(&mut nb, w, rf, x, y, w, rows, mv, filters, bit_depth);
    for r in 0..rows {
      let m = mask[r] as u32;
      for c in 0..w {
        let i = r * w + c;
        pred[i] =
          ((m * pred[i] as u32 + (64 - m) * nb[i] as u32 + 32) >> 6) as u16;
      }
    }
  }
  if luma_x > 0 {
    let mv = mv_grid.get(luma_x - 1, luma_y, size);
    let cols = (w.min(64) >> 1).max(1);
    let mask = obmc_mask(cols);
    predict_inter(&mut nb, w, rf, x, y, cols, h, mv, filters, bit_depth);
    for r in 0..h {
      for c in 0..cols {
        let m = mask[c] as u32;
        let i = r * w + c;
        pred[i] =
          ((m * pred[i] as u32 + (64 - m) * nb[i] as u32 + 32) >> 6) as u16;
      }
    }
  }
}

/// Prediction of `cand` for the `w` x `h` block at `(x, y)` of plane
/// `plane`, written with stride `w`. Chroma blocks reuse the luma mode and
/// vector; palettes and blends apply to luma only.
pub fn predict_candidate(
  inputs: &PredictionInputs, edges: &EdgeSource, cand: &Candidate,
  plane: usize, x: usize, y: usize, w: usize, h: usize, out: &mut [u16],
) {
  let bd = inputs.bit_depth;
  if cand.mode.is_intra() {
    match (&cand.palette, plane) {
      (Some(palette), 0) => {
        let src = &inputs.source.planes[0];
        let start = src.row_range(x as isize, y as isize).start;
        palette_predict(
          &src.data[start..],
          src.cfg.stride,
          out,
          w,
          w,
          h,
          palette,
        );
      }
      (Some(_), _) => {
        let e = edges.edges(x, y, w, h, bd);
        predict_intra(PredictionMode::DC_PRED, out, w, w, h, &e, bd);
      }
      (None, _) => {
        let e = edges.edges(x, y, w, h, bd);
        predict_intra(cand.mode, out, w, w, h, &e, bd);
      }
    }
    return;
  }

  let rf = &inputs.refs[cand.ref_idx].planes[plane];
  predict_inter(out, w, rf, x, y, w, h, cand.mv, cand.filters, bd);
  if plane != 0 {
    return;
  }
  if cand.obmc {
    apply_obmc(
      out,
      rf,
      x,
      y,
      w,
      h,
      inputs.mv_grid,
      x,
      y,
      w.max(h),
      cand.filters,
      bd,
    );
  }
  if let Some(mode) = cand.inter_intra {
    let e = edges.edges(x, y, w, h, bd);
    let mut intra = vec![0u16; w * h];
    predict_intra(mode, &mut intra, w, w, h, &e, bd);
    blend_inter_intra(out, &intra, w, w, h);
  }
}
