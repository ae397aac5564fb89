// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]

use crate::frame::Plane;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum PredictionMode {
  DC_PRED,
  V_PRED,
  H_PRED,
  SMOOTH_PRED,
  SMOOTH_V_PRED,
  SMOOTH_H_PRED,
  PAETH_PRED,
  NEARESTMV,
  GLOBALMV,
  NEWMV,
}

impl PredictionMode {
  pub const INTRA_MODES: usize = 7;
  pub const ALL: usize = 10;

  #[inline]
  pub const fn is_intra(self) -> bool {
    (self as usize) < Self::INTRA_MODES
  }

  #[inline]
  pub const fn index(self) -> usize {
    self as usize
  }
}

/// Intra modes by search level, cheapest first.
pub static INTRA_MODES_BY_LEVEL: [&[PredictionMode]; 4] = [
  &[PredictionMode::DC_PRED],
  &[PredictionMode::DC_PRED, PredictionMode::V_PRED, PredictionMode::H_PRED],
  &[
    PredictionMode::DC_PRED,
    PredictionMode::V_PRED,
    PredictionMode::H_PRED,
    PredictionMode::PAETH_PRED,
    PredictionMode::SMOOTH_PRED,
  ],
  &[
    PredictionMode::DC_PRED,
    PredictionMode::V_PRED,
    PredictionMode::H_PRED,
    PredictionMode::PAETH_PRED,
    PredictionMode::SMOOTH_PRED,
    PredictionMode::SMOOTH_V_PRED,
    PredictionMode::SMOOTH_H_PRED,
  ],
];

/// Largest side an intra prediction unit may have.
pub const MAX_INTRA_SIZE: usize = 64;

// Weights are quadratic from '1' to '1 / block_size', scaled by 2^sm_weight_log2_scale.
const sm_weight_log2_scale: u32 = 8;

// Smooth predictor weights
#[rustfmt::skip]
static sm_weight_arrays: [u8; 2 * MAX_INTRA_SIZE] = [
  // Unused, because we always offset by bs, which is at least 2.
  0, 0,
  // bs = 2
  255, 128,
  // bs = 4
  255, 149, 85, 64,
  // bs = 8
  255, 197, 146, 105, 73, 50, 37, 32,
  // bs = 16
  255, 225, 196, 170, 145, 123, 102, 84, 68, 54, 43, 33, 26, 20, 17, 16,
  // bs = 32
  255, 240, 225, 210, 196, 182, 169, 157, 145, 133, 122, 111, 101, 92, 83, 74,
  66, 59, 52, 45, 39, 34, 29, 25, 21, 17, 14, 12, 10, 9, 8, 8,
  // bs = 64
  255, 248, 240, 233, 225, 218, 210, 203, 196, 189, 182, 176, 169, 163, 156,
  150, 144, 138, 133, 127, 121, 116, 111, 106, 101, 96, 91, 86, 82, 77, 73, 69,
  65, 61, 57, 54, 50, 47, 44, 41, 38, 35, 32, 29, 27, 25, 22, 20, 18, 16, 15,
  13, 12, 10, 9, 8, 7, 6, 6, 5, 5, 4, 4, 4,
];

/// Reconstructed (or source) samples bordering a block.
#[derive(Clone, Debug, Default)]
pub struct IntraEdges {
  pub above: Vec<u16>,
  pub left: Vec<u16>,
  pub top_left: u16,
  pub have_above: bool,
  pub have_left: bool,
}

impl IntraEdges {
  /// Builds edges for a `w` x `h` block, substituting unavailable sides the
  /// way AV1 does.
  pub fn new(
    above: Option<&[u16]>, left: Option<&[u16]>, top_left: Option<u16>,
    w: usize, h: usize, bit_depth: usize,
  ) -> Self {
    let base = 1u16 << (bit_depth - 1);
    let above_v: Vec<u16> = match (above, left) {
      (Some(a), _) => a[..w].to_vec(),
      (None, Some(l)) => vec![l[0]; w],
      (None, None) => vec![base - 1; w],
    };
    let left_v: Vec<u16> = match (left, above) {
      (Some(l), _) => l[..h].to_vec(),
      (None, Some(a)) => vec![a[0]; h],
      (None, None) => vec![base + 1; h],
    };
    let tl = match (above, left) {
      (Some(_), Some(_)) => top_left.unwrap_or(base),
      (Some(a), None) => a[0],
      (None, Some(l)) => l[0],
      (None, None) => base,
    };
    IntraEdges {
      above: above_v,
      left: left_v,
      top_left: tl,
      have_above: above.is_some(),
      have_left: left.is_some(),
    }
  }

  /// Edges read straight from a plane, available wherever the block is not
  /// on the picture border.
  pub fn from_plane(
    plane: &Plane<u16>, x: usize, y: usize, w: usize, h: usize,
    bit_depth: usize,
  ) -> Self {
    let above: Option<Vec<u16>> = (y > 0)
      .then(|| plane.row(y as isize - 1)[x..x + w].to_vec());
    let left: Option<Vec<u16>> =
      (x > 0).then(|| (0..h).map(|r| plane.p(x - 1, y + r)).collect());
    let tl = (x > 0 && y > 0).then(|| plane.p(x - 1, y - 1));
    IntraEdges::new(above.as_deref(), left.as_deref(), tl, w, h, bit_depth)
  }
}

fn pred_dc(
  output: &mut [u16], stride: usize, w: usize, h: usize, edges: &IntraEdges,
  bit_depth: usize,
) {
  let (sum, len) = match (edges.have_above, edges.have_left) {
    (true, true) => (
      edges.above.iter().chain(edges.left.iter()).map(|&v| v as u32).sum(),
      (w + h) as u32,
    ),
    (true, false) => (edges.above.iter().map(|&v| v as u32).sum(), w as u32),
    (false, true) => (edges.left.iter().map(|&v| v as u32).sum(), h as u32),
    (false, false) => ((1u32 << (bit_depth - 1)), 1),
  };
  let avg = ((sum + (len >> 1)) / len) as u16;
  for line in output.chunks_mut(stride).take(h) {
    for v in &mut line[..w] {
      *v = avg;
    }
  }
}

fn pred_h(output: &mut [u16], stride: usize, w: usize, left: &[u16]) {
  for (line, l) in output.chunks_mut(stride).zip(left.iter()) {
    for v in &mut line[..w] {
      *v = *l;
    }
  }
}

fn pred_v(output: &mut [u16], stride: usize, h: usize, above: &[u16]) {
  for line in output.chunks_mut(stride).take(h) {
    line[..above.len()].copy_from_slice(above)
  }
}

fn pred_paeth(
  output: &mut [u16], stride: usize, w: usize, h: usize, edges: &IntraEdges,
) {
  let raw_top_left = edges.top_left as i32;
  for r in 0..h {
    for c in 0..w {
      let raw_left = edges.left[r] as i32;
      let raw_top = edges.above[c] as i32;

      let p_base = raw_top + raw_left - raw_top_left;
      let p_left = (p_base - raw_left).abs();
      let p_top = (p_base - raw_top).abs();
      let p_top_left = (p_base - raw_top_left).abs();

      // Return nearest to base of left, top and top_left
      output[r * stride + c] = if p_left <= p_top && p_left <= p_top_left {
        raw_left as u16
      } else if p_top <= p_top_left {
        raw_top as u16
      } else {
        raw_top_left as u16
      };
    }
  }
}

fn pred_smooth(
  output: &mut [u16], stride: usize, w: usize, h: usize, edges: &IntraEdges,
  horz: bool, vert: bool,
) {
  let below_pred = edges.left[h - 1] as u32; // estimated by bottom-left pixel
  let right_pred = edges.above[w - 1] as u32; // estimated by top-right pixel
  let sm_weights_w = &sm_weight_arrays[w..];
  let sm_weights_h = &sm_weight_arrays[h..];
  let scale = 1u32 << sm_weight_log2_scale;
  let log2_scale = sm_weight_log2_scale + (horz && vert) as u32;

  for r in 0..h {
    for c in 0..w {
      let mut this_pred = 0u32;
      if vert {
        let wh = sm_weights_h[r] as u32;
        this_pred += wh * edges.above[c] as u32 + (scale - wh) * below_pred;
      }
      if horz {
        let ww = sm_weights_w[c] as u32;
        this_pred += ww * edges.left[r] as u32 + (scale - ww) * right_pred;
      }
      this_pred = (this_pred + (1 << (log2_scale - 1))) >> log2_scale;
      output[r * stride + c] = this_pred as u16;
    }
  }
}

/// Writes the intra prediction of a `w` x `h` block into `output`.
pub fn predict_intra(
  mode: PredictionMode, output: &mut [u16], stride: usize, w: usize,
  h: usize, edges: &IntraEdges, bit_depth: usize,
) {
  debug_assert!(w <= MAX_INTRA_SIZE && h <= MAX_INTRA_SIZE);
  match mode {
    PredictionMode::V_PRED => pred_v(output, stride, h, &edges.above[..w]),
    PredictionMode::H_PRED => pred_h(output, stride, w, &edges.left[..h]),
    PredictionMode::PAETH_PRED => pred_paeth(output, stride, w, h, edges),
    PredictionMode::SMOOTH_PRED => {
      pred_smooth(output, stride, w, h, edges, true, true)
    }
    PredictionMode::SMOOTH_H_PRED => {
      pred_smooth(output, stride, w, h, edges, true, false)
    }
    PredictionMode::SMOOTH_V_PRED => {
      pred_smooth(output, stride, w, h, edges, false, true)
    }
    _ => pred_dc(output, stride, w, h, edges, bit_depth),
  }
}

/// Blends an inter prediction with an intra one in place, weighting the
/// intra samples more near the top-left edges.
pub fn blend_inter_intra(
  inter: &mut [u16], intra: &[u16], stride: usize, w: usize, h: usize,
) {
  let sm_weights_w = &sm_weight_arrays[w.min(MAX_INTRA_SIZE)..];
  let sm_weights_h = &sm_weight_arrays[h.min(MAX_INTRA_SIZE)..];
  for r in 0..h {
    for c in 0..w {
      let wi = (sm_weights_h[r.min(MAX_INTRA_SIZE - 1)] as u32
        + sm_weights_w[c.min(MAX_INTRA_SIZE - 1)] as u32)
        >> 2;
      let i = r * stride + c;
      inter[i] = ((intra[i] as u32 * wi
        + inter[i] as u32 * (256 - wi)
        + 128)
        >> 8) as u16;
    }
  }
}
