// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Residual coding of one prediction block: transform, quantization, rate
//! and distortion, optionally followed by reconstruction.

use crate::frame::Plane;
use crate::quantize::*;
use crate::rdo::{FrameContext, COST_ONE_BIT};
use crate::tools::RdoqCtrls;
use crate::transform::*;

/// Everything the coding of a residual depends on.
#[derive(Clone, Copy, Debug)]
pub struct TxParams<'a> {
  pub qindex: u8,
  pub is_intra: bool,
  pub bit_depth: usize,
  pub lambda: f64,
  pub tx_type: TxType,
  /// Largest transform side; blocks are tiled with squares of
  /// `min(tx_side, w, h)`.
  pub tx_side: usize,
  pub rdoq: RdoqCtrls,
  /// Measure distortion on reconstructed samples instead of coefficients.
  pub spatial_sse: bool,
  pub fc: &'a FrameContext,
}

/// Quantized levels of one transform block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodedTx {
  pub n: usize,
  pub eob: usize,
  pub qcoeffs: Vec<i32>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResidualResult {
  /// Squared error after coding.
  pub distortion: u64,
  /// Squared error of the prediction alone, the distortion of a skipped
  /// block.
  pub skip_distortion: u64,
  /// Coefficient rate in 1/512 bits.
  pub rate: u32,
  /// Sum of the end of block positions of all transform blocks.
  pub nonzero: u32,
}

/// Transform side used for a `w` x `h` block.
#[inline]
pub fn tx_side_for(w: usize, h: usize, max_side: usize) -> usize {
  w.min(h).min(max_side).clamp(4, 32)
}

fn diff(
  residual: &mut [i16], src: &Plane<u16>, x: usize, y: usize, pred: &[u16],
  pred_stride: usize, n: usize,
) {
  for r in 0..n {
    let s = &src.row((y + r) as isize)[x..x + n];
    let p = &pred[r * pred_stride..][..n];
    for ((d, &a), &b) in residual[r * n..][..n].iter_mut().zip(s).zip(p) {
      *d = (a as i32 - b as i32) as i16;
    }
  }
}

/// Codes the residual between the source block at `(x, y)` of `src` and the
/// `w` x `h` prediction `pred` (stride `w`).
///
/// When `recon` is given it receives the reconstruction with stride `w`,
/// and when `coded` is given it receives the levels of every transform
/// block in raster order.
pub fn code_residual(
  src: &Plane<u16>, x: usize, y: usize, pred: &[u16], w: usize, h: usize,
  params: &TxParams, mut recon: Option<&mut [u16]>,
  mut coded: Option<&mut Vec<CodedTx>>,
) -> ResidualResult {
  let n = tx_side_for(w, h, params.tx_side);
  let qc = QuantizationContext::new(
    params.qindex,
    n,
    params.is_intra,
    params.bit_depth,
  );
  let bits_of_one = params.fc.coeff_base.cost(1) + COST_ONE_BIT;
  let max_sample = (1i32 << params.bit_depth) - 1;

  let mut residual = vec![0i16; n * n];
  let mut coeffs = vec![0i32; n * n];
  let mut qcoeffs = vec![0i32; n * n];
  let mut rcoeffs = vec![0i32; n * n];
  let mut rec_block = vec![0u16; n * n];

  let mut result = ResidualResult::default();
  for ty in (0..h).step_by(n) {
    for tx in (0..w).step_by(n) {
      let tile_pred = &pred[ty * w + tx..];
      diff(&mut residual, src, x + tx, y + ty, tile_pred, w, n);
      result.skip_distortion += residual
        .iter()
        .map(|&d| (d as i64 * d as i64) as u64)
        .sum::<u64>();

      forward_transform(&residual, n, &mut coeffs, n, params.tx_type);
      let mut eob = qc.quantize(&coeffs, &mut qcoeffs);
      if params.rdoq.enabled && eob > 0 {
        eob = rdoq(
          &qc,
          &coeffs,
          &mut qcoeffs,
          eob,
          params.lambda,
          bits_of_one,
          params.rdoq.eob_fast_th,
        );
      }
      result.rate += params.fc.coeff_rate(&qcoeffs, n, eob);
      result.nonzero += eob as u32;
      qc.dequantize(&qcoeffs, &mut rcoeffs);

      if params.spatial_sse || recon.is_some() {
        inverse_transform(&rcoeffs, &mut residual, n, n, params.tx_type);
        for r in 0..n {
          let s = &src.row((y + ty + r) as isize)[x + tx..x + tx + n];
          for c in 0..n {
            let v = (tile_pred[r * w + c] as i32 + residual[r * n + c] as i32)
              .clamp(0, max_sample);
            rec_block[r * n + c] = v as u16;
            let d = s[c] as i64 - v as i64;
            result.distortion += (d * d) as u64;
          }
        }
        if let Some(out) = recon.as_deref_mut() {
          for r in 0..n {
            out[(ty + r) * w + tx..][..n]
              .copy_from_slice(&rec_block[r * n..][..n]);
          }
        }
      } else {
        result.distortion += coeff_distortion(&coeffs, &rcoeffs, n);
      }

      if let Some(list) = coded.as_deref_mut() {
        list.push(CodedTx { n, eob, qcoeffs: qcoeffs.clone() });
      }
    }
  }
  result
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::frame::PlaneExt;
  use crate::tools::RDOQ_CTRLS;
  use rand::{Rng, SeedableRng};
  use rand_chacha::ChaChaRng;

  fn plane(f: impl Fn(usize, usize) -> u16) -> Plane<u16> {
    let mut p = Plane::new(32, 32, 0, 0, 8, 8);
    for y in 0..32 {
      for x in 0..32 {
        p.set(x, y, f(x, y));
      }
    }
    p.pad(32, 32);
    p
  }

  fn params(fc: &FrameContext, qindex: u8, tx_type: TxType) -> TxParams<'_> {
    TxParams {
      qindex,
      is_intra: true,
      bit_depth: 8,
      lambda: crate::rdo::lambda(qindex, 8),
      tx_type,
      tx_side: 32,
      rdoq: RDOQ_CTRLS[0],
      spatial_sse: true,
      fc,
    }
  }

  #[test]
  fn exact_prediction_codes_nothing() {
    let src = plane(|x, y| (x * 3 + y * 5) as u16);
    let pred: Vec<u16> = (0..16 * 16).map(|i| src.p(i % 16, i / 16)).collect();
    let fc = FrameContext::default();
    let mut rec = vec![0u16; 16 * 16];
    let r = code_residual(
      &src,
      0,
      0,
      &pred,
      16,
      16,
      &params(&fc, 100, TxType::WHT_WHT),
      Some(&mut rec),
      None,
    );
    assert_eq!(r, ResidualResult::default());
    assert_eq!(rec, pred);
  }

  #[test]
  fn low_q_reconstructs_closely() {
    let mut ra = ChaChaRng::from_seed([7; 32]);
    let noise: Vec<u16> = (0..32 * 32).map(|_| ra.gen_range(0..255)).collect();
    let src = plane(|x, y| noise[y * 32 + x]);
    let pred = vec![128u16; 32 * 32];
    let fc = FrameContext::default();
    for tx_type in TxType::ALL {
      let mut rec = vec![0u16; 32 * 32];
      let mut coded = Vec::new();
      let r = code_residual(
        &src,
        0,
        0,
        &pred,
        32,
        32,
        &params(&fc, 0, tx_type),
        Some(&mut rec),
        Some(&mut coded),
      );
      assert_eq!(coded.len(), 1);
      assert!(r.nonzero > 0);
      assert!(r.distortion * 8 < r.skip_distortion);
      let sse = crate::rdo::sse(src.data_origin(), src.cfg.stride, &rec, 32, 32, 32);
      assert_eq!(sse, r.distortion);
    }
  }

  #[test]
  fn frequency_distortion_tracks_spatial() {
    let src = plane(|x, y| ((x * 7) ^ (y * 13)) as u16 & 255);
    let pred = vec![100u16; 16 * 16];
    let fc = FrameContext::default();
    let mut p = params(&fc, 60, TxType::WHT_WHT);
    let spatial = code_residual(&src, 8, 8, &pred, 16, 16, &p, None, None);
    p.spatial_sse = false;
    let freq = code_residual(&src, 8, 8, &pred, 16, 16, &p, None, None);
    assert_eq!(spatial.nonzero, freq.nonzero);
    assert_eq!(spatial.rate, freq.rate);
    let (a, b) = (spatial.distortion as f64, freq.distortion as f64);
    assert!((a - b).abs() <= 0.05 * a.max(b) + 256.);
  }

  #[test]
  fn blocks_are_tiled() {
    let src = plane(|x, _| (x * 8) as u16);
    let pred = vec![0u16; 32 * 16];
    let fc = FrameContext::default();
    let mut coded = Vec::new();
    code_residual(
      &src,
      0,
      0,
      &pred,
      32,
      16,
      &params(&fc, 40, TxType::WHT_WHT),
      None,
      Some(&mut coded),
    );
    assert_eq!(coded.len(), 2);
    assert!(coded.iter().all(|c| c.n == 16));
  }
}
