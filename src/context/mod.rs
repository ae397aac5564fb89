// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Per-tile prediction context.
//!
//! The neighbor arrays hold the last reconstructed row and column of every
//! coded block of a tile, plus the mode information entropy contexts are
//! derived from. They are shared by the workers of a tile; the segment
//! scheduler orders every write before the reads that depend on it, so plain
//! relaxed atomics are enough.

use std::ops::Add;
use std::sync::atomic::{AtomicU16, AtomicU8, Ordering};

use crate::frame::PlaneOffset;
use crate::partition::SbSize;
use crate::util::Fixed;

mod segmentation;
pub use segmentation::*;

mod superblock_unit;
pub use superblock_unit::*;

fn atomic_u16_vec(len: usize, v: u16) -> Vec<AtomicU16> {
  (0..len).map(|_| AtomicU16::new(v)).collect()
}

fn atomic_u8_vec(len: usize, v: u8) -> Vec<AtomicU8> {
  (0..len).map(|_| AtomicU8::new(v)).collect()
}

/// Reconstructed sample neighbors of one plane of a tile.
///
/// `top` is indexed by column, `left` by row relative to the tile, and
/// `top_left` by the diagonal `x - y + height`.
#[derive(Debug)]
pub struct SampleNeighbors {
  top: Vec<AtomicU16>,
  left: Vec<AtomicU16>,
  top_left: Vec<AtomicU16>,
  width: usize,
  height: usize,
}

impl SampleNeighbors {
  pub fn new(width: usize, height: usize) -> Self {
    SampleNeighbors {
      top: atomic_u16_vec(width, 0),
      left: atomic_u16_vec(height, 0),
      top_left: atomic_u16_vec(width + height, 0),
      width,
      height,
    }
  }

  pub fn reset(&self, value: u16) {
    for a in self.top.iter().chain(&self.left).chain(&self.top_left) {
      a.store(value, Ordering::Relaxed);
    }
  }

  /// Records the bottom row and right column of a reconstructed block.
  pub fn store_block(
    &self, x: usize, y: usize, w: usize, h: usize, recon: &[u16],
    stride: usize,
  ) {
    let w = w.min(self.width - x);
    let h = h.min(self.height - y);
    if w == 0 || h == 0 {
      return;
    }
    let bottom = &recon[(h - 1) * stride..][..w];
    for (i, &v) in bottom.iter().enumerate() {
      self.top[x + i].store(v, Ordering::Relaxed);
      self.top_left[x + i + self.height - (y + h - 1)].store(v, Ordering::Relaxed);
    }
    for j in 0..h {
      let v = recon[j * stride + w - 1];
      self.left[y + j].store(v, Ordering::Relaxed);
      self.top_left[x + w - 1 + self.height - (y + j)].store(v, Ordering::Relaxed);
    }
  }

  /// The `w` samples above `(x, y)`, clipped to the tile width by repeating
  /// the last one.
  pub fn above(&self, x: usize, w: usize) -> Vec<u16> {
    let last = self.width - 1;
    (x..x + w).map(|i| self.top[i.min(last)].load(Ordering::Relaxed)).collect()
  }

  pub fn left(&self, y: usize, h: usize) -> Vec<u16> {
    let last = self.height - 1;
    (y..y + h).map(|j| self.left[j.min(last)].load(Ordering::Relaxed)).collect()
  }

  /// The sample at `(x - 1, y - 1)`.
  pub fn top_left(&self, x: usize, y: usize) -> u16 {
    debug_assert!(x > 0 && y > 0);
    self.top_left[x + self.height - y].load(Ordering::Relaxed)
  }
}

/// Mode information per 4x4 unit along the top and left edges.
#[derive(Debug)]
pub struct ModeNeighbors {
  top_skip: Vec<AtomicU8>,
  left_skip: Vec<AtomicU8>,
  top_width_log2: Vec<AtomicU8>,
  left_height_log2: Vec<AtomicU8>,
}

impl ModeNeighbors {
  pub fn new(width: usize, height: usize) -> Self {
    let (wu, hu) = (
      width.align_power_of_two_and_shift(MI_SIZE_LOG2),
      height.align_power_of_two_and_shift(MI_SIZE_LOG2),
    );
    ModeNeighbors {
      top_skip: atomic_u8_vec(wu, 0),
      left_skip: atomic_u8_vec(hu, 0),
      top_width_log2: atomic_u8_vec(wu, u8::MAX),
      left_height_log2: atomic_u8_vec(hu, u8::MAX),
    }
  }

  pub fn reset(&self) {
    for a in self.top_skip.iter().chain(&self.left_skip) {
      a.store(0, Ordering::Relaxed);
    }
    for a in self.top_width_log2.iter().chain(&self.left_height_log2) {
      a.store(u8::MAX, Ordering::Relaxed);
    }
  }

  pub fn store_block(&self, x: usize, y: usize, w: usize, h: usize, skip: bool) {
    let (wl, hl) = (w.trailing_zeros() as u8, h.trailing_zeros() as u8);
    let xu = x >> MI_SIZE_LOG2;
    let yu = y >> MI_SIZE_LOG2;
    for i in xu..(xu + (w >> MI_SIZE_LOG2)).min(self.top_skip.len()) {
      self.top_skip[i].store(skip as u8, Ordering::Relaxed);
      self.top_width_log2[i].store(wl, Ordering::Relaxed);
    }
    for j in yu..(yu + (h >> MI_SIZE_LOG2)).min(self.left_skip.len()) {
      self.left_skip[j].store(skip as u8, Ordering::Relaxed);
      self.left_height_log2[j].store(hl, Ordering::Relaxed);
    }
  }

  /// Number of skipped blocks among the above and left neighbors.
  pub fn skip_ctx(&self, x: usize, y: usize) -> usize {
    let above = if y > 0 {
      self.top_skip[x >> MI_SIZE_LOG2].load(Ordering::Relaxed) as usize
    } else {
      0
    };
    let left = if x > 0 {
      self.left_skip[y >> MI_SIZE_LOG2].load(Ordering::Relaxed) as usize
    } else {
      0
    };
    above + left
  }

  /// Whether the above and left neighbors are narrower than `sq`.
  pub fn partition_ctx(&self, x: usize, y: usize, sq: usize) -> usize {
    let sql = sq.trailing_zeros() as u8;
    let above = y > 0
      && self.top_width_log2[x >> MI_SIZE_LOG2].load(Ordering::Relaxed) < sql;
    let left = x > 0
      && self.left_height_log2[y >> MI_SIZE_LOG2].load(Ordering::Relaxed)
        < sql;
    above as usize + 2 * left as usize
  }
}

/// All neighbor arrays of a tile.
#[derive(Debug)]
pub struct NeighborArrays {
  pub planes: [SampleNeighbors; 3],
  pub modes: ModeNeighbors,
}

impl NeighborArrays {
  /// Arrays for a tile of `width` x `height` luma samples with 4:2:0 chroma.
  pub fn new(width: usize, height: usize) -> Self {
    let (cw, ch) = ((width + 1) >> 1, (height + 1) >> 1);
    NeighborArrays {
      planes: [
        SampleNeighbors::new(width, height),
        SampleNeighbors::new(cw, ch),
        SampleNeighbors::new(cw, ch),
      ],
      modes: ModeNeighbors::new(width, height),
    }
  }

  /// Resets every array at the start of a tile.
  pub fn reset(&self, bit_depth: usize) {
    let mid = 1u16 << (bit_depth - 1);
    for p in self.planes.iter() {
      p.reset(mid);
    }
    self.modes.reset();
  }
}
