// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use once_cell::sync::Lazy;

pub const MINQ: usize = 0;
pub const MAXQ: usize = 255;
pub const QINDEX_RANGE: usize = MAXQ - MINQ + 1;

/// Quantizer steps in Q3 for 8-bit content, growing geometrically with the
/// index over the same range as the AV1 lookup.
fn build_qlookup(first: f64, last: f64) -> [u16; QINDEX_RANGE] {
  let mut t = [0u16; QINDEX_RANGE];
  let ratio = last / first;
  for (i, v) in t.iter_mut().enumerate() {
    let x = i as f64 / MAXQ as f64;
    // Near-linear start, exponential tail.
    let lin = first + x * 64.;
    let exp = first * ratio.powf(x);
    *v = lin.max(exp).round() as u16;
  }
  t
}

static DC_QLOOKUP: Lazy<[u16; QINDEX_RANGE]> =
  Lazy::new(|| build_qlookup(4., 1336.));
static AC_QLOOKUP: Lazy<[u16; QINDEX_RANGE]> =
  Lazy::new(|| build_qlookup(4., 1828.));

#[inline]
fn bd_scale(bit_depth: usize) -> u32 {
  1 << (bit_depth - 8)
}

pub fn dc_q(qindex: u8, delta_q: i8, bit_depth: usize) -> u32 {
  let qi = (qindex as isize + delta_q as isize).clamp(0, MAXQ as isize);
  DC_QLOOKUP[qi as usize] as u32 * bd_scale(bit_depth)
}

pub fn ac_q(qindex: u8, delta_q: i8, bit_depth: usize) -> u32 {
  let qi = (qindex as isize + delta_q as isize).clamp(0, MAXQ as isize);
  AC_QLOOKUP[qi as usize] as u32 * bd_scale(bit_depth)
}

/// Zig-zag scan of an `n` x `n` block, by anti-diagonal.
fn build_scan(n: usize) -> Vec<u16> {
  let mut scan = Vec::with_capacity(n * n);
  for d in 0..2 * n - 1 {
    for i in 0..=d {
      let (r, c) = if d % 2 == 0 { (d - i, i) } else { (i, d - i) };
      if r < n && c < n {
        scan.push((r * n + c) as u16);
      }
    }
  }
  scan
}

static SCANS: Lazy<[Vec<u16>; 4]> =
  Lazy::new(|| [build_scan(4), build_scan(8), build_scan(16), build_scan(32)]);

pub fn scan_order(n: usize) -> &'static [u16] {
  &SCANS[(n.trailing_zeros() as usize).saturating_sub(2).min(3)]
}

#[derive(Debug, Clone, Copy, Default)]
pub struct QuantizationContext {
  n: usize,
  dc_quant: u32,
  dc_offset: u32,

  ac_quant: u32,
  ac_offset_eob: u32,
  ac_offset0: u32,
  ac_offset1: u32,
}

impl QuantizationContext {
  pub fn new(qindex: u8, n: usize, is_intra: bool, bit_depth: usize) -> Self {
    let mut qc = QuantizationContext::default();
    qc.update(qindex, n, is_intra, bit_depth);
    qc
  }

  /// Steps are expressed at the transform's `n`-times-orthonormal scale.
  pub fn update(
    &mut self, qindex: u8, n: usize, is_intra: bool, bit_depth: usize,
  ) {
    self.n = n;
    self.dc_quant = ((dc_q(qindex, 0, bit_depth) * n as u32) >> 3).max(1);
    self.ac_quant = ((ac_q(qindex, 0, bit_depth) * n as u32) >> 3).max(1);

    // Deadzone rounding biases, smaller in the tail of zeroes and ones.
    self.dc_offset = self.dc_quant * (if is_intra { 109 } else { 108 }) / 256;
    self.ac_offset0 = self.ac_quant * (if is_intra { 98 } else { 97 }) / 256;
    self.ac_offset1 = self.ac_quant * (if is_intra { 109 } else { 108 }) / 256;
    self.ac_offset_eob = self.ac_quant * (if is_intra { 88 } else { 44 }) / 256;
  }

  #[inline]
  pub fn dc_quant(&self) -> u32 {
    self.dc_quant
  }

  #[inline]
  pub fn ac_quant(&self) -> u32 {
    self.ac_quant
  }

  /// Quantizes `coeffs` into `qcoeffs` and returns the end of block in scan
  /// order.
  pub fn quantize(&self, coeffs: &[i32], qcoeffs: &mut [i32]) -> usize {
    let n = self.n;
    let scan = scan_order(n);
    for q in qcoeffs[..n * n].iter_mut() {
      *q = 0;
    }

    qcoeffs[0] = {
      let abs = coeffs[0].unsigned_abs();
      let l = ((abs + self.dc_offset) / self.dc_quant) as i32;
      if coeffs[0] < 0 {
        -l
      } else {
        l
      }
    };

    // Find the last coefficient surviving the eob bias.
    let deadzone = self.ac_quant - self.ac_offset_eob;
    let eob = scan
      .iter()
      .enumerate()
      .skip(1)
      .filter(|&(_, &pos)| coeffs[pos as usize].unsigned_abs() >= deadzone)
      .map(|(i, _)| i + 1)
      .last()
      .unwrap_or((qcoeffs[0] != 0) as usize);

    let mut level_mode = 1;
    for &pos in scan.iter().take(eob).skip(1) {
      let coeff = coeffs[pos as usize];
      let abs_coeff = coeff.unsigned_abs();

      let level0 = abs_coeff / self.ac_quant;
      let offset = if level0 > 1 - level_mode {
        self.ac_offset1
      } else {
        self.ac_offset0
      };

      let abs_qcoeff: u32 =
        level0 + (abs_coeff + offset >= (level0 + 1) * self.ac_quant) as u32;
      if level_mode != 0 && abs_qcoeff == 0 {
        level_mode = 0;
      } else if abs_qcoeff > 1 {
        level_mode = 1;
      }

      qcoeffs[pos as usize] =
        if coeff < 0 { -(abs_qcoeff as i32) } else { abs_qcoeff as i32 };
    }

    last_nonzero(qcoeffs, n)
  }

  pub fn dequantize(&self, qcoeffs: &[i32], rcoeffs: &mut [i32]) {
    let n = self.n;
    for (i, (r, &q)) in rcoeffs[..n * n].iter_mut().zip(qcoeffs).enumerate() {
      let quant = if i == 0 { self.dc_quant } else { self.ac_quant };
      *r = q * quant as i32;
    }
  }
}

/// End of block in scan order.
pub fn last_nonzero(qcoeffs: &[i32], n: usize) -> usize {
  scan_order(n)
    .iter()
    .rposition(|&p| qcoeffs[p as usize] != 0)
    .map(|i| i + 1)
    .unwrap_or(0)
}

/// Rate-distortion optimized rounding: walks the scan backwards and drops
/// magnitude-one levels whose squared-error penalty is cheaper than the
/// `lambda`-weighted bits saved. `bits_of_one` is the cost of a unit level
/// in 1/512 bit units. Returns the new end of block.
pub fn rdoq(
  qc: &QuantizationContext, coeffs: &[i32], qcoeffs: &mut [i32],
  mut eob: usize, lambda: f64, bits_of_one: u32, eob_fast_th: usize,
) -> usize {
  let n = qc.n;
  let scan = scan_order(n);
  let norm = (n * n) as f64;
  let mut i = eob;
  while i > 1 {
    i -= 1;
    let pos = scan[i] as usize;
    let q = qcoeffs[pos];
    if q.abs() != 1 {
      if eob.saturating_sub(i) > eob_fast_th {
        break;
      }
      continue;
    }
    let c = coeffs[pos] as f64;
    let rec = (q * qc.ac_quant as i32) as f64;
    let d_keep = (c - rec) * (c - rec) / norm;
    let d_zero = c * c / norm;
    let rate_saved = bits_of_one as f64 / 512.;
    if d_zero - d_keep < lambda * rate_saved {
      qcoeffs[pos] = 0;
      if i + 1 == eob {
        eob = last_nonzero(qcoeffs, n);
      }
    }
  }
  eob
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::transform::*;

  #[test]
  fn lookup_is_monotonic() {
    for i in 1..QINDEX_RANGE {
      assert!(AC_QLOOKUP[i] >= AC_QLOOKUP[i - 1]);
      assert!(DC_QLOOKUP[i] >= DC_QLOOKUP[i - 1]);
    }
    assert_eq!(ac_q(0, 0, 8), 4);
    assert_eq!(ac_q(255, 0, 8), 1828);
    assert_eq!(ac_q(255, 0, 10), 4 * 1828);
  }

  #[test]
  fn scan_is_permutation() {
    for &n in &TX_SIDES {
      let mut s: Vec<u16> = scan_order(n).to_vec();
      s.sort_unstable();
      assert_eq!(s, (0..(n * n) as u16).collect::<Vec<_>>());
      assert_eq!(scan_order(n)[0], 0);
    }
  }

  #[test]
  fn low_q_reconstructs_closely() {
    let n = 8;
    let res: Vec<i16> = (0..64).map(|i| ((i * 37) % 61) as i16 - 30).collect();
    let mut coeffs = vec![0; 64];
    forward_transform(&res, n, &mut coeffs, n, TxType::WHT_WHT);
    let qc = QuantizationContext::new(0, n, true, 8);
    let mut q = vec![0; 64];
    let eob = qc.quantize(&coeffs, &mut q);
    assert!(eob > 0);
    let mut rc = vec![0; 64];
    qc.dequantize(&q, &mut rc);
    let d = coeff_distortion(&coeffs, &rc, n);
    assert!(d < 64, "distortion {}", d);
  }

  #[test]
  fn rdoq_never_grows_eob() {
    let n = 4;
    let coeffs: Vec<i32> = (0..16).map(|i| if i % 3 == 0 { 9 } else { 2 }).collect();
    let qc = QuantizationContext::new(0, n, false, 8);
    let mut q = vec![0; 16];
    let eob = qc.quantize(&coeffs, &mut q);
    let eob2 = rdoq(&qc, &coeffs, &mut q, eob, 1e6, 512 * 4, 16);
    assert!(eob2 <= eob);
    assert_eq!(eob2, last_nonzero(&q, n));
  }
}
