// Copyright (c) 2001-2016, Alliance for Open Media. All rights reserved
// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Rate and distortion estimation.
//!
//! Rates are in 1/512 bit units. Symbol costs come from adaptive counts in a
//! [`FrameContext`], which stands in for the entropy coder's CDFs.

use crate::mc::MotionVector;
use crate::partition::PartitionType;
use crate::predict::PredictionMode;
use crate::quantize::{dc_q, scan_order};
use crate::util::ILog;

pub const COST_PRECISION_BITS: u32 = 9;
pub const COST_ONE_BIT: u32 = 1 << COST_PRECISION_BITS;

/// Rate-distortion cost. `u64::MAX` marks an unusable candidate.
pub type RdCost = u64;
pub const MAX_COST: RdCost = u64::MAX;

/// Lagrangian multiplier for the frame quantizer, in the sample domain of
/// the given bit depth.
pub fn lambda(qindex: u8, bit_depth: usize) -> f64 {
  let q = dc_q(qindex, 0, bit_depth) as f64;

  // Convert q into Q0 precision, given that the quantizers are Q3
  let q0 = q / 8.0_f64;

  // Lambda formula from doc/theoretical_results.lyx in the daala repo
  q0 * q0 * std::f64::consts::LN_2 / 6.0
}

#[inline]
pub fn rd_cost(distortion: u64, rate: u32, lambda: f64) -> RdCost {
  let d = distortion.saturating_mul(COST_ONE_BIT as u64);
  d.saturating_add((lambda * rate as f64).round() as u64)
}

/// Sum of squared error between two `w` x `h` blocks.
pub fn sse(
  a: &[u16], a_stride: usize, b: &[u16], b_stride: usize, w: usize, h: usize,
) -> u64 {
  let mut sse = 0u64;
  for r in 0..h {
    let ra = &a[r * a_stride..][..w];
    let rb = &b[r * b_stride..][..w];
    for (&x, &y) in ra.iter().zip(rb) {
      let d = x as i64 - y as i64;
      sse += (d * d) as u64;
    }
  }
  sse
}

/// Sum of absolute differences between two `w` x `h` blocks.
pub fn sad(
  a: &[u16], a_stride: usize, b: &[u16], b_stride: usize, w: usize, h: usize,
) -> u64 {
  let mut sad = 0u64;
  for r in 0..h {
    let ra = &a[r * a_stride..][..w];
    let rb = &b[r * b_stride..][..w];
    for (&x, &y) in ra.iter().zip(rb) {
      sad += (x as i32 - y as i32).unsigned_abs() as u64;
    }
  }
  sad
}

/// Adaptive frequency model of an `N`-ary symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SymbolModel<const N: usize> {
  counts: [u16; N],
  total: u32,
}

impl<const N: usize> Default for SymbolModel<N> {
  fn default() -> Self {
    SymbolModel { counts: [1; N], total: N as u32 }
  }
}

const ADAPT_LIMIT: u32 = 1024;

impl<const N: usize> SymbolModel<N> {
  /// Cost in 1/512 bits of coding `sym`.
  pub fn cost(&self, sym: usize) -> u32 {
    let p = self.counts[sym.min(N - 1)] as f64 / self.total as f64;
    (-p.log2() * COST_ONE_BIT as f64).round() as u32
  }

  pub fn update(&mut self, sym: usize) {
    let s = sym.min(N - 1);
    self.counts[s] += 16;
    self.total += 16;
    if self.total > ADAPT_LIMIT {
      self.total = 0;
      for c in self.counts.iter_mut() {
        *c = (*c + 1) >> 1;
        self.total += *c as u32;
      }
    }
  }
}

/// Number of square-size classes partitions are modeled for (8..128).
pub const PARTITION_CONTEXTS: usize = 5;

#[inline]
fn partition_ctx(sq_size: usize) -> usize {
  (sq_size.trailing_zeros() as usize).saturating_sub(3).min(4)
}

/// Adaptive symbol statistics for one picture or one super-block snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameContext {
  pub partition: [SymbolModel<10>; PARTITION_CONTEXTS],
  pub is_inter: SymbolModel<2>,
  pub intra_mode: SymbolModel<{ PredictionMode::INTRA_MODES }>,
  pub inter_mode: SymbolModel<3>,
  pub ref_frame: SymbolModel<4>,
  /// Indexed by the number of skipped neighbors.
  pub skip: [SymbolModel<2>; 3],
  pub tx_type: SymbolModel<2>,
  pub interp_filter: SymbolModel<3>,
  pub palette: SymbolModel<2>,
  pub inter_intra: SymbolModel<2>,
  pub obmc: SymbolModel<2>,
  pub coeff_base: SymbolModel<4>,
  pub eob_class: SymbolModel<11>,
}

impl FrameContext {
  pub fn partition_cost(&self, sq_size: usize, p: PartitionType) -> u32 {
    if sq_size <= 4 {
      return 0;
    }
    self.partition[partition_ctx(sq_size)].cost(p as usize)
  }

  pub fn update_partition(&mut self, sq_size: usize, p: PartitionType) {
    if sq_size > 4 {
      self.partition[partition_ctx(sq_size)].update(p as usize);
    }
  }

  pub fn mode_cost(&self, mode: PredictionMode, is_inter_slice: bool) -> u32 {
    let inter_flag = if is_inter_slice {
      self.is_inter.cost(!mode.is_intra() as usize)
    } else {
      0
    };
    inter_flag
      + if mode.is_intra() {
        self.intra_mode.cost(mode.index())
      } else {
        self.inter_mode.cost(mode.index() - PredictionMode::INTRA_MODES)
      }
  }

  pub fn update_mode(&mut self, mode: PredictionMode, is_inter_slice: bool) {
    if is_inter_slice {
      self.is_inter.update(!mode.is_intra() as usize);
    }
    if mode.is_intra() {
      self.intra_mode.update(mode.index());
    } else {
      self.inter_mode.update(mode.index() - PredictionMode::INTRA_MODES);
    }
  }

  pub fn skip_cost(&self, ctx: usize, skip: bool) -> u32 {
    self.skip[ctx.min(2)].cost(skip as usize)
  }

  pub fn update_skip(&mut self, ctx: usize, skip: bool) {
    self.skip[ctx.min(2)].update(skip as usize);
  }

  /// Cost of the coefficient levels of one transform block, excluding the
  /// skip flag.
  pub fn coeff_rate(&self, qcoeffs: &[i32], n: usize, eob: usize) -> u32 {
    if eob == 0 {
      return 0;
    }
    let scan = scan_order(n);
    let mut rate = self.eob_class.cost(eob.ilog_bits().min(10));
    // Position bits within the eob class.
    rate += (eob.ilog_bits().saturating_sub(1) as u32) * COST_ONE_BIT;
    for &pos in &scan[..eob] {
      let l = qcoeffs[pos as usize].unsigned_abs();
      rate += self.coeff_base.cost(l.min(3) as usize);
      if l > 0 {
        // sign
        rate += COST_ONE_BIT;
      }
      if l >= 3 {
        // Exp-Golomb remainder.
        let r = l - 2;
        rate += (2 * r.ilog_bits() as u32 - 1) * COST_ONE_BIT;
      }
    }
    rate
  }

  pub fn update_coeffs(&mut self, qcoeffs: &[i32], n: usize, eob: usize) {
    if eob == 0 {
      return;
    }
    self.eob_class.update(eob.ilog_bits().min(10));
    let scan = scan_order(n);
    for &pos in &scan[..eob] {
      let l = qcoeffs[pos as usize].unsigned_abs();
      self.coeff_base.update(l.min(3) as usize);
    }
  }
}

/// Approximate cost of a motion vector difference in 1/512 bits.
pub fn mv_rate(diff: MotionVector) -> u32 {
  let comp = |v: i16| -> u32 {
    let a = v.unsigned_abs() as u32;
    if a == 0 {
      COST_ONE_BIT / 2
    } else {
      (2 * a.ilog_bits() as u32 + 1) * COST_ONE_BIT
    }
  };
  comp(diff.row) + comp(diff.col)
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn symbol_model_adapts() {
    let mut m = SymbolModel::<4>::default();
    assert_eq!(m.cost(0), 2 * COST_ONE_BIT);
    for _ in 0..200 {
      m.update(2);
    }
    assert!(m.cost(2) < COST_ONE_BIT / 4);
    assert!(m.cost(0) > 4 * COST_ONE_BIT);
    assert!(m.total <= ADAPT_LIMIT);
  }

  #[test]
  fn coeff_rate_grows_with_levels() {
    let fc = FrameContext::default();
    let mut small = vec![0i32; 16];
    small[0] = 1;
    let mut big = small.clone();
    big[0] = 40;
    big[1] = -7;
    assert_eq!(fc.coeff_rate(&small, 4, 0), 0);
    assert!(fc.coeff_rate(&big, 4, 2) > fc.coeff_rate(&small, 4, 1));
  }

  #[test]
  fn cost_saturates() {
    assert_eq!(rd_cost(u64::MAX, 10, 1.0), u64::MAX);
    assert_eq!(rd_cost(2, 512, 1.0), 2 * 512 + 512);
  }

  #[test]
  fn distortion_helpers() {
    let a = [10u16, 20, 30, 40];
    let b = [12u16, 20, 27, 40];
    assert_eq!(sse(&a, 2, &b, 2, 2, 2), 4 + 9);
    assert_eq!(sad(&a, 2, &b, 2, 2, 2), 5);
  }
}
