// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use super::*;

pub const MI_SIZE_LOG2: usize = 2;
pub const MI_SIZE: usize = 1 << MI_SIZE_LOG2;

/// Absolute offset in superblocks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SuperBlockOffset {
  pub x: usize,
  pub y: usize,
}

impl SuperBlockOffset {
  /// Offset of the top-left luma sample of this superblock.
  #[inline]
  pub const fn plane_offset(self, sb: SbSize) -> PlaneOffset {
    PlaneOffset {
      x: (self.x << sb.log2()) as isize,
      y: (self.y << sb.log2()) as isize,
    }
  }

  /// Raster index in a picture `cols` superblocks wide.
  #[inline]
  pub const fn index(self, cols: usize) -> usize {
    self.y * cols + self.x
  }

  #[inline]
  pub const fn from_index(index: usize, cols: usize) -> Self {
    SuperBlockOffset { x: index % cols, y: index / cols }
  }
}

impl Add for SuperBlockOffset {
  type Output = Self;
  #[inline]
  fn add(self, rhs: Self) -> Self::Output {
    Self { x: self.x + rhs.x, y: self.y + rhs.y }
  }
}

/// Superblock grid of a picture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SbGrid {
  pub sb_size: SbSize,
  pub cols: usize,
  pub rows: usize,
}

impl SbGrid {
  pub fn new(width: usize, height: usize, sb_size: SbSize) -> Self {
    let log2 = sb_size.log2();
    SbGrid {
      sb_size,
      cols: width.align_power_of_two_and_shift(log2),
      rows: height.align_power_of_two_and_shift(log2),
    }
  }

  #[inline]
  pub const fn count(&self) -> usize {
    self.cols * self.rows
  }
}
