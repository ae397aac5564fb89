// Copyright (c) 2020-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::levels::SliceType;

use std::fmt;

/// Range of projected picture sizes, in bits, that needs no recode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameBounds {
  pub low: u64,
  pub high: u64,
}

impl FrameBounds {
  /// No bound at all: every picture is accepted on its first encode.
  pub const UNBOUNDED: FrameBounds = FrameBounds { low: 0, high: u64::MAX };

  #[inline]
  pub const fn contains(&self, bits: u64) -> bool {
    bits >= self.low && bits <= self.high
  }
}

/// Quantizer indices still open to the recode loop of a picture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QRange {
  pub low: u8,
  pub high: u8,
}

/// Frame size policy consulted by the recode loop.
pub trait RateControl: fmt::Debug + Send + Sync {
  /// Accepted projected size of a picture.
  fn frame_bounds(
    &self, picture_number: u64, slice_type: SliceType,
  ) -> FrameBounds;

  /// Next quantizer index for a picture whose projected size fell outside
  /// `bounds` when coded at `q`. Narrows `range` to the indices still worth
  /// trying.
  fn regulate_q(
    &self, projected_bits: u64, bounds: FrameBounds, q: u8, range: &mut QRange,
  ) -> u8 {
    if projected_bits > bounds.high {
      range.low = q.saturating_add(1).min(range.high);
    } else if projected_bits < bounds.low {
      range.high = q.saturating_sub(1).max(range.low);
    }
    ((range.low as u16 + range.high as u16 + 1) / 2) as u8
  }
}

/// Accepts every picture as coded.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConstantQuantizer;

impl RateControl for ConstantQuantizer {
  fn frame_bounds(&self, _: u64, _: SliceType) -> FrameBounds {
    FrameBounds::UNBOUNDED
  }
}

/// A fixed bit budget per picture with a symmetric tolerance.
#[derive(Clone, Copy, Debug)]
pub struct FixedRateControl {
  pub target_bits: u64,
  /// Allowed deviation from the target, in percent.
  pub tolerance_pct: u64,
}

impl FixedRateControl {
  pub const fn new(target_bits: u64, tolerance_pct: u64) -> Self {
    FixedRateControl { target_bits, tolerance_pct }
  }
}

impl RateControl for FixedRateControl {
  fn frame_bounds(&self, _: u64, _: SliceType) -> FrameBounds {
    let t = self.target_bits;
    let pct = self.tolerance_pct.min(100);
    // t * pct / 100 without the intermediate product.
    let slack = t / 100 * pct + t % 100 * pct / 100;
    FrameBounds { low: t - slack, high: t.saturating_add(slack) }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn oversized_pictures_raise_the_quantizer() {
    let rc = FixedRateControl::new(1000, 10);
    let bounds = rc.frame_bounds(0, SliceType::I);
    assert_eq!(bounds, FrameBounds { low: 900, high: 1100 });
    let mut range = QRange { low: 0, high: 255 };
    let q = rc.regulate_q(1200, bounds, 100, &mut range);
    assert_eq!(range, QRange { low: 101, high: 255 });
    assert!(q > 100);
  }

  #[test]
  fn undersized_pictures_lower_the_quantizer() {
    let rc = FixedRateControl::new(1000, 10);
    let bounds = rc.frame_bounds(0, SliceType::P);
    let mut range = QRange { low: 0, high: 255 };
    let q = rc.regulate_q(500, bounds, 100, &mut range);
    assert_eq!(range, QRange { low: 0, high: 99 });
    assert!(q < 100);
  }

  #[test]
  fn huge_targets_saturate() {
    let rc = FixedRateControl::new(u64::MAX, 10);
    let bounds = rc.frame_bounds(0, SliceType::I);
    assert_eq!(bounds.high, u64::MAX);
    assert_eq!(bounds.low, u64::MAX - (u64::MAX / 100 * 10 + 15 * 10 / 100));
    assert!(bounds.low > u64::MAX / 100 * 89);

    let bounds = FixedRateControl::new(12_345, 7).frame_bounds(0, SliceType::P);
    assert_eq!(bounds, FrameBounds { low: 12_345 - 864, high: 12_345 + 864 });
  }

  #[test]
  fn collapsed_range_is_stable() {
    let rc = FixedRateControl::new(1000, 0);
    let bounds = rc.frame_bounds(0, SliceType::P);
    let mut range = QRange { low: 255, high: 255 };
    assert_eq!(rc.regulate_q(5000, bounds, 255, &mut range), 255);
    assert_eq!(range, QRange { low: 255, high: 255 });
  }
}
