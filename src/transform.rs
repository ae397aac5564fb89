// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Residual transforms.
//!
//! Two square kernels are provided: a Walsh-Hadamard transform and the
//! identity. Both produce coefficients at `n` times orthonormal scale for an
//! `n` x `n` block, so the inverse of an unquantized block is exact and
//! `sum((c - c')^2) / n^2` is the spatial squared error.

#![allow(non_camel_case_types)]

use crate::util::*;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum TxType {
  WHT_WHT,
  IDTX,
}

impl TxType {
  pub const ALL: [TxType; 2] = [TxType::WHT_WHT, TxType::IDTX];

  #[inline]
  pub const fn index(self) -> usize {
    self as usize
  }
}

/// Sides of the supported square transforms.
pub const TX_SIDES: [usize; 4] = [4, 8, 16, 32];

#[inline]
fn wht_1d(data: &mut [i32], stride: usize, n: usize) {
  let mut h = 1;
  while h < n {
    for i in (0..n).step_by(h * 2) {
      for j in i..i + h {
        let a = data[j * stride];
        let b = data[(j + h) * stride];
        data[j * stride] = a + b;
        data[(j + h) * stride] = a - b;
      }
    }
    h <<= 1;
  }
}

/// Forward transform of an `n` x `n` residual block.
pub fn forward_transform(
  residual: &[i16], stride: usize, coeffs: &mut [i32], n: usize,
  tx_type: TxType,
) {
  debug_assert!(TX_SIDES.contains(&n));
  for r in 0..n {
    for c in 0..n {
      coeffs[r * n + c] = residual[r * stride + c] as i32;
    }
  }
  match tx_type {
    TxType::WHT_WHT => {
      for r in 0..n {
        wht_1d(&mut coeffs[r * n..], 1, n);
      }
      for c in 0..n {
        wht_1d(&mut coeffs[c..], n, n);
      }
    }
    TxType::IDTX => {
      let shift = n.trailing_zeros();
      for v in coeffs[..n * n].iter_mut() {
        *v <<= shift;
      }
    }
  }
}

/// Inverse transform. Writes the reconstructed residual into `residual`.
pub fn inverse_transform(
  coeffs: &[i32], residual: &mut [i16], stride: usize, n: usize,
  tx_type: TxType,
) {
  let mut tmp = coeffs[..n * n].to_vec();
  let shift = match tx_type {
    TxType::WHT_WHT => {
      for r in 0..n {
        wht_1d(&mut tmp[r * n..], 1, n);
      }
      for c in 0..n {
        wht_1d(&mut tmp[c..], n, n);
      }
      2 * n.trailing_zeros() as usize
    }
    TxType::IDTX => n.trailing_zeros() as usize,
  };
  for r in 0..n {
    for c in 0..n {
      residual[r * stride + c] = round_shift(tmp[r * n + c], shift) as i16;
    }
  }
}

/// Squared spatial error between two coefficient blocks of side `n`.
pub fn coeff_distortion(a: &[i32], b: &[i32], n: usize) -> u64 {
  let sse: u64 = a[..n * n]
    .iter()
    .zip(&b[..n * n])
    .map(|(&x, &y)| {
      let d = (x - y) as i64;
      (d * d) as u64
    })
    .sum();
  let shift = 2 * n.trailing_zeros();
  (sse + (1 << shift >> 1)) >> shift
}

/// Sum of absolute transformed differences over 4x4 Hadamard tiles.
pub fn satd(residual: &[i16], stride: usize, w: usize, h: usize) -> u64 {
  let mut sum = 0u64;
  let mut tile = [0i32; 16];
  for y in (0..h).step_by(4) {
    for x in (0..w).step_by(4) {
      for r in 0..4 {
        for c in 0..4 {
          tile[r * 4 + c] = residual[(y + r) * stride + x + c] as i32;
        }
      }
      for r in 0..4 {
        wht_1d(&mut tile[r * 4..], 1, 4);
      }
      for c in 0..4 {
        wht_1d(&mut tile[c..], 4, 4);
      }
      sum += tile.iter().map(|&v| v.unsigned_abs() as u64).sum::<u64>();
    }
  }
  // 4x4 Hadamard gain is 4.
  (sum + 2) >> 2
}

#[cfg(test)]
mod test {
  use super::*;
  use interpolate_name::interpolate_test;
  use rand::{Rng, SeedableRng};
  use rand_chacha::ChaChaRng;

  fn roundtrip(tx_type: TxType) {
    let mut ra = ChaChaRng::from_seed([11; 32]);
    for &n in &TX_SIDES {
      let res: Vec<i16> =
        (0..n * n).map(|_| ra.gen_range(-1023..=1023)).collect();
      let mut coeffs = vec![0i32; n * n];
      let mut back = vec![0i16; n * n];
      forward_transform(&res, n, &mut coeffs, n, tx_type);
      inverse_transform(&coeffs, &mut back, n, n, tx_type);
      assert_eq!(res, back);
    }
  }

  #[interpolate_test(wht, TxType::WHT_WHT)]
  #[interpolate_test(idtx, TxType::IDTX)]
  fn exact_inverse(tx_type: TxType) {
    roundtrip(tx_type);
  }

  #[test]
  fn wht_dc_energy() {
    let res = vec![3i16; 64];
    let mut coeffs = vec![0i32; 64];
    forward_transform(&res, 8, &mut coeffs, 8, TxType::WHT_WHT);
    assert_eq!(coeffs[0], 3 * 64);
    assert!(coeffs[1..].iter().all(|&c| c == 0));
  }

  #[test]
  fn parseval() {
    let mut ra = ChaChaRng::from_seed([5; 32]);
    let a: Vec<i16> = (0..256).map(|_| ra.gen_range(-50..50)).collect();
    let mut ca = vec![0i32; 256];
    let zero = vec![0i32; 256];
    forward_transform(&a, 16, &mut ca, 16, TxType::WHT_WHT);
    let spatial: u64 = a.iter().map(|&v| (v as i64 * v as i64) as u64).sum();
    assert_eq!(coeff_distortion(&ca, &zero, 16), spatial);
  }
}
