// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use num_traits::PrimInt;
use std::mem::size_of;

pub use v_frame::math::{round_shift, Fixed};
pub use v_frame::pixel::*;

/// Bit length of an integer: `floor(log2(v)) + 1`, or 0 for 0.
pub trait ILog: PrimInt {
  fn ilog_bits(self) -> usize {
    size_of::<Self>() * 8 - self.leading_zeros() as usize
  }
}

impl<T> ILog for T where T: PrimInt {}

/// Relative deviation of `a` from `b` in percent, `((a - b) * 100) / max(b, 1)`.
///
/// Used by every cost-ratio heuristic of the partition and filter stages.
#[inline]
pub fn deviation_pct(a: u64, b: u64) -> i64 {
  let b = b.max(1) as i64;
  ((a as i64 - b) * 100) / b
}

/// Variance of `n` samples given their sum and sum of squares.
#[inline]
pub fn variance_from_sums(sum: i64, sse: u64, n: usize) -> u32 {
  let n = n.max(1) as i64;
  (sse as i64 - (sum * sum) / n).max(0) as u32
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn deviation() {
    assert_eq!(deviation_pct(150, 100), 50);
    assert_eq!(deviation_pct(50, 100), -50);
    assert_eq!(deviation_pct(7, 0), 600);
  }

  #[test]
  fn ilog() {
    assert_eq!(0u32.ilog_bits(), 0);
    assert_eq!(1u32.ilog_bits(), 1);
    assert_eq!(1023u16.ilog_bits(), 10);
  }
}
