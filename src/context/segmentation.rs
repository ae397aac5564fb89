// Copyright (c) 2018-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use super::*;

pub const MAX_SEGMENTS: usize = 3;

/// Quantizer offsets of the variance segments, from flat to busy.
pub const SEGMENT_QINDEX_DELTA: [i8; MAX_SEGMENTS] = [-8, 0, 8];

/// Segment id of every 8x8 unit of a picture.
#[derive(Debug)]
pub struct SegmentationMap {
  ids: Vec<AtomicU8>,
  cols: usize,
}

impl SegmentationMap {
  pub fn new(width: usize, height: usize) -> Self {
    let cols = width.align_power_of_two_and_shift(3);
    let rows = height.align_power_of_two_and_shift(3);
    SegmentationMap { ids: atomic_u8_vec(cols * rows, 0), cols }
  }

  pub fn reset(&self) {
    for a in self.ids.iter() {
      a.store(0, Ordering::Relaxed);
    }
  }

  /// Marks the luma rectangle `(x, y, w, h)` as belonging to `segment`.
  pub fn set_block(&self, x: usize, y: usize, w: usize, h: usize, segment: u8) {
    let rows = self.ids.len() / self.cols;
    for r in (y >> 3)..((y + h + 7) >> 3).min(rows) {
      for c in (x >> 3)..((x + w + 7) >> 3).min(self.cols) {
        self.ids[r * self.cols + c].store(segment, Ordering::Relaxed);
      }
    }
  }

  pub fn get(&self, x: usize, y: usize) -> u8 {
    self.ids[(y >> 3) * self.cols + (x >> 3)].load(Ordering::Relaxed)
  }

  /// Histogram of segment ids.
  pub fn counts(&self) -> [usize; MAX_SEGMENTS] {
    let mut counts = [0; MAX_SEGMENTS];
    for a in self.ids.iter() {
      counts[(a.load(Ordering::Relaxed) as usize).min(MAX_SEGMENTS - 1)] += 1;
    }
    counts
  }
}

/// Segment of a superblock from its source variance.
pub fn segment_from_variance(variance: u32, bit_depth: usize) -> u8 {
  let v = variance >> (2 * (bit_depth - 8));
  match v {
    0..=63 => 0,
    64..=1023 => 1,
    _ => 2,
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn set_and_count() {
    let map = SegmentationMap::new(64, 32);
    map.set_block(8, 8, 16, 8, 2);
    assert_eq!(map.get(8, 8), 2);
    assert_eq!(map.get(23, 15), 2);
    assert_eq!(map.get(24, 8), 0);
    assert_eq!(map.counts(), [30, 0, 2]);
    map.reset();
    assert_eq!(map.counts(), [32, 0, 0]);
  }

  #[test]
  fn variance_bands() {
    assert_eq!(segment_from_variance(10, 8), 0);
    assert_eq!(segment_from_variance(100 << 4, 10), 1);
    assert_eq!(segment_from_variance(5000, 8), 2);
  }
}
