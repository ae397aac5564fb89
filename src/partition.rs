// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Block sizes, partition shapes and the per-SB block geometry table.
//!
//! Every partitionable sub-block of a super-block, square or not, has an
//! "MDS" index. A square block's entries come first (its own shape list, in
//! [`PartitionType`] order), followed by the entries of its four quadrants
//! in z-order. Jumping over `d1_depth_offset` entries from a square lands on
//! its first quadrant; jumping over `ns_depth_offset` lands on its next
//! sibling square.

#![allow(non_camel_case_types)]

use self::BlockSize::*;
use self::PartitionType::*;
use once_cell::sync::Lazy;
use std::fmt;
use thiserror::Error;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum PartitionType {
  PARTITION_NONE,
  PARTITION_HORZ,
  PARTITION_VERT,
  PARTITION_HORZ_A, // HORZ split and the top partition is split again
  PARTITION_HORZ_B, // HORZ split and the bottom partition is split again
  PARTITION_VERT_A, // VERT split and the left partition is split again
  PARTITION_VERT_B, // VERT split and the right partition is split again
  PARTITION_HORZ_4, // 4:1 horizontal partition
  PARTITION_VERT_4, // 4:1 vertical partition
  PARTITION_SPLIT,
}

/// Shapes in the order their blocks appear in the geometry table.
pub const D1_SHAPES: [PartitionType; 9] = [
  PARTITION_NONE,
  PARTITION_HORZ,
  PARTITION_VERT,
  PARTITION_HORZ_A,
  PARTITION_HORZ_B,
  PARTITION_VERT_A,
  PARTITION_VERT_B,
  PARTITION_HORZ_4,
  PARTITION_VERT_4,
];

impl PartitionType {
  /// Number of blocks the shape produces.
  pub const fn block_count(self) -> usize {
    match self {
      PARTITION_NONE => 1,
      PARTITION_HORZ | PARTITION_VERT => 2,
      PARTITION_HORZ_A | PARTITION_HORZ_B | PARTITION_VERT_A
      | PARTITION_VERT_B => 3,
      PARTITION_HORZ_4 | PARTITION_VERT_4 | PARTITION_SPLIT => 4,
    }
  }

  pub const fn is_nsq(self) -> bool {
    !matches!(self, PARTITION_NONE | PARTITION_SPLIT)
  }

  /// Sub-block rectangles `(x, y, w, h)` relative to a square of side `sq`.
  pub fn blocks(self, sq: usize) -> Vec<(usize, usize, usize, usize)> {
    let h = sq >> 1;
    let q = sq >> 2;
    match self {
      PARTITION_NONE => vec![(0, 0, sq, sq)],
      PARTITION_HORZ => vec![(0, 0, sq, h), (0, h, sq, h)],
      PARTITION_VERT => vec![(0, 0, h, sq), (h, 0, h, sq)],
      PARTITION_HORZ_A => vec![(0, 0, h, h), (h, 0, h, h), (0, h, sq, h)],
      PARTITION_HORZ_B => vec![(0, 0, sq, h), (0, h, h, h), (h, h, h, h)],
      PARTITION_VERT_A => vec![(0, 0, h, h), (0, h, h, h), (h, 0, h, sq)],
      PARTITION_VERT_B => vec![(0, 0, h, sq), (h, 0, h, h), (h, h, h, h)],
      PARTITION_HORZ_4 => (0..4).map(|i| (0, i * q, sq, q)).collect(),
      PARTITION_VERT_4 => (0..4).map(|i| (i * q, 0, q, sq)).collect(),
      PARTITION_SPLIT => vec![(0, 0, h, h), (h, 0, h, h), (0, h, h, h), (h, h, h, h)],
    }
  }
}

/// Shapes allowed for a square of side `sq`.
pub fn shapes_for(sq: usize) -> &'static [PartitionType] {
  match sq {
    128 => &D1_SHAPES[..7],
    8 => &D1_SHAPES[..3],
    4 => &D1_SHAPES[..1],
    _ => &D1_SHAPES[..],
  }
}

/// Number of geometry entries a square of side `sq` owns at its own depth.
pub const fn d1_block_count(sq: usize) -> usize {
  match sq {
    128 => 17,
    8 => 5,
    4 => 1,
    _ => 25,
  }
}

/// Number of geometry entries in the subtree rooted at a square of side `sq`.
pub const fn ns_depth_offset(sq: usize) -> usize {
  if sq <= 4 {
    1
  } else {
    d1_block_count(sq) + 4 * ns_depth_offset(sq >> 1)
  }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum BlockSize {
  BLOCK_4X4,
  BLOCK_4X8,
  BLOCK_8X4,
  BLOCK_8X8,
  BLOCK_8X16,
  BLOCK_16X8,
  BLOCK_16X16,
  BLOCK_16X32,
  BLOCK_32X16,
  BLOCK_32X32,
  BLOCK_32X64,
  BLOCK_64X32,
  BLOCK_64X64,
  BLOCK_64X128,
  BLOCK_128X64,
  BLOCK_128X128,
  BLOCK_4X16,
  BLOCK_16X4,
  BLOCK_8X32,
  BLOCK_32X8,
  BLOCK_16X64,
  BLOCK_64X16,
}

#[derive(Debug, Error, Copy, Clone, Eq, PartialEq)]
#[error("invalid block size")]
pub struct InvalidBlockSize;

impl BlockSize {
  pub const ALL: [BlockSize; 22] = [
    BLOCK_4X4, BLOCK_4X8, BLOCK_8X4, BLOCK_8X8, BLOCK_8X16, BLOCK_16X8,
    BLOCK_16X16, BLOCK_16X32, BLOCK_32X16, BLOCK_32X32, BLOCK_32X64,
    BLOCK_64X32, BLOCK_64X64, BLOCK_64X128, BLOCK_128X64, BLOCK_128X128,
    BLOCK_4X16, BLOCK_16X4, BLOCK_8X32, BLOCK_32X8, BLOCK_16X64, BLOCK_64X16,
  ];

  /// Looks up the block of the given dimensions.
  pub fn from_dims(w: usize, h: usize) -> Result<BlockSize, InvalidBlockSize> {
    BlockSize::ALL
      .iter()
      .copied()
      .find(|b| b.width() == w && b.height() == h)
      .ok_or(InvalidBlockSize)
  }

  #[inline]
  pub const fn width_log2(self) -> usize {
    match self {
      BLOCK_4X4 | BLOCK_4X8 | BLOCK_4X16 => 2,
      BLOCK_8X4 | BLOCK_8X8 | BLOCK_8X16 | BLOCK_8X32 => 3,
      BLOCK_16X4 | BLOCK_16X8 | BLOCK_16X16 | BLOCK_16X32 | BLOCK_16X64 => 4,
      BLOCK_32X8 | BLOCK_32X16 | BLOCK_32X32 | BLOCK_32X64 => 5,
      BLOCK_64X16 | BLOCK_64X32 | BLOCK_64X64 | BLOCK_64X128 => 6,
      BLOCK_128X64 | BLOCK_128X128 => 7,
    }
  }

  #[inline]
  pub const fn height_log2(self) -> usize {
    match self {
      BLOCK_4X4 | BLOCK_8X4 | BLOCK_16X4 => 2,
      BLOCK_4X8 | BLOCK_8X8 | BLOCK_16X8 | BLOCK_32X8 => 3,
      BLOCK_4X16 | BLOCK_8X16 | BLOCK_16X16 | BLOCK_32X16 | BLOCK_64X16 => 4,
      BLOCK_8X32 | BLOCK_16X32 | BLOCK_32X32 | BLOCK_64X32 => 5,
      BLOCK_16X64 | BLOCK_32X64 | BLOCK_64X64 | BLOCK_128X64 => 6,
      BLOCK_64X128 | BLOCK_128X128 => 7,
    }
  }

  #[inline]
  pub const fn width(self) -> usize {
    1 << self.width_log2()
  }

  #[inline]
  pub const fn height(self) -> usize {
    1 << self.height_log2()
  }

  /// width * height
  #[inline]
  pub const fn area(self) -> usize {
    self.width() * self.height()
  }

  pub const fn is_sqr(self) -> bool {
    self.width_log2() == self.height_log2()
  }

  /// Side of the square transform blocks tiling this block.
  pub const fn tx_side(self) -> usize {
    let w = self.width();
    let h = self.height();
    let s = if w < h { w } else { h };
    if s > 32 {
      32
    } else {
      s
    }
  }
}

impl fmt::Display for BlockSize {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}x{}", self.width(), self.height())
  }
}

/// Super-block size.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum SbSize {
  Sb64,
  Sb128,
}

impl SbSize {
  #[inline]
  pub const fn size(self) -> usize {
    match self {
      SbSize::Sb64 => 64,
      SbSize::Sb128 => 128,
    }
  }

  #[inline]
  pub const fn log2(self) -> usize {
    match self {
      SbSize::Sb64 => 6,
      SbSize::Sb128 => 7,
    }
  }

  /// Depth of the 4x4 squares.
  #[inline]
  pub const fn max_depth(self) -> usize {
    self.log2() - 2
  }

  #[inline]
  pub const fn block_count(self) -> usize {
    ns_depth_offset(self.size())
  }

  pub const fn sq_size_at_depth(self, depth: usize) -> usize {
    self.size() >> depth
  }
}

/// Geometry of one entry of the MDS table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockGeom {
  /// Origin relative to the super-block.
  pub origin_x: usize,
  pub origin_y: usize,
  pub bwidth: usize,
  pub bheight: usize,
  pub bsize: BlockSize,
  /// Side of the square this block belongs to.
  pub sq_size: usize,
  pub depth: usize,
  pub shape: PartitionType,
  /// Index of the block inside its shape.
  pub nsi: usize,
  /// Number of blocks of the shape.
  pub totns: usize,
  /// Index of the block among the entries of its square.
  pub d1i: usize,
  pub d1_depth_offset: usize,
  pub ns_depth_offset: usize,
  /// MDS index of the square block this entry belongs to.
  pub sqi_mds: usize,
  /// MDS index of the square one depth up, if any.
  pub parent_depth_idx_mds: Option<usize>,
  /// Quadrant of the square inside its parent.
  pub quadi: usize,
  pub has_uv: bool,
}

impl BlockGeom {
  /// Chroma rectangle in chroma samples relative to the SB, for blocks that
  /// carry chroma.
  pub fn chroma_rect(&self) -> (usize, usize, usize, usize) {
    let x = if self.bwidth == 4 { self.origin_x - 4 } else { self.origin_x };
    let y = if self.bheight == 4 { self.origin_y - 4 } else { self.origin_y };
    (x >> 1, y >> 1, self.bwidth.max(8) >> 1, self.bheight.max(8) >> 1)
  }
}

fn build_square(
  table: &mut Vec<BlockGeom>, sq: usize, x: usize, y: usize, depth: usize,
  quadi: usize, parent: Option<usize>,
) {
  let sqi = table.len();
  let mut d1i = 0;
  for &shape in shapes_for(sq) {
    let blocks = shape.blocks(sq);
    let totns = blocks.len();
    for (nsi, &(bx, by, bw, bh)) in blocks.iter().enumerate() {
      let (ox, oy) = (x + bx, y + by);
      table.push(BlockGeom {
        origin_x: ox,
        origin_y: oy,
        bwidth: bw,
        bheight: bh,
        bsize: match BlockSize::from_dims(bw, bh) {
          Ok(b) => b,
          Err(_) => unreachable!("shape tables only produce AV1 sizes"),
        },
        sq_size: sq,
        depth,
        shape,
        nsi,
        totns,
        d1i,
        d1_depth_offset: d1_block_count(sq),
        ns_depth_offset: ns_depth_offset(sq),
        sqi_mds: sqi,
        parent_depth_idx_mds: parent,
        quadi,
        has_uv: (bw > 4 || (ox >> 2) & 1 == 1)
          && (bh > 4 || (oy >> 2) & 1 == 1),
      });
      d1i += 1;
    }
  }
  if sq > 4 {
    let h = sq >> 1;
    for q in 0..4 {
      build_square(
        table,
        h,
        x + (q & 1) * h,
        y + (q >> 1) * h,
        depth + 1,
        q,
        Some(sqi),
      );
    }
  }
}

fn build_table(sb: SbSize) -> Vec<BlockGeom> {
  let mut table = Vec::with_capacity(sb.block_count());
  build_square(&mut table, sb.size(), 0, 0, 0, 0, None);
  debug_assert_eq!(table.len(), sb.block_count());
  table
}

static BLOCK_GEOM_64: Lazy<Vec<BlockGeom>> =
  Lazy::new(|| build_table(SbSize::Sb64));
static BLOCK_GEOM_128: Lazy<Vec<BlockGeom>> =
  Lazy::new(|| build_table(SbSize::Sb128));

/// The MDS table for the given super-block size.
pub fn block_geom(sb: SbSize) -> &'static [BlockGeom] {
  match sb {
    SbSize::Sb64 => BLOCK_GEOM_64.as_slice(),
    SbSize::Sb128 => BLOCK_GEOM_128.as_slice(),
  }
}

/// MDS index of the square of side `sq` covering `(x, y)` inside the SB.
pub fn sq_mds_at(sb: SbSize, x: usize, y: usize, sq: usize) -> usize {
  let mut idx = 0;
  let mut size = sb.size();
  while size > sq {
    let h = size >> 1;
    let q = ((y & h) != 0) as usize * 2 + ((x & h) != 0) as usize;
    idx += d1_block_count(size) + q * ns_depth_offset(h);
    size = h;
  }
  idx
}

/// MDS indices of the four quadrants of the square at `sqi`.
pub fn quadrants(geom: &[BlockGeom], sqi: usize) -> [usize; 4] {
  let g = &geom[sqi];
  let first = sqi + g.d1_depth_offset;
  let step = ns_depth_offset(g.sq_size >> 1);
  [first, first + step, first + 2 * step, first + 3 * step]
}

/// Picture-level legality of a block, in luma samples.
#[derive(Clone, Copy, Debug)]
pub struct PictureBounds {
  /// Picture dimensions aligned to 8.
  pub width: usize,
  pub height: usize,
}

impl PictureBounds {
  /// The square owning the block has its origin inside the picture.
  #[inline]
  pub fn is_inside_md_scan(
    &self, geom: &[BlockGeom], mds: usize, sb_x: usize, sb_y: usize,
  ) -> bool {
    let sq = &geom[geom[mds].sqi_mds];
    sb_x + sq.origin_x < self.width && sb_y + sq.origin_y < self.height
  }

  /// The block lies entirely inside the picture.
  #[inline]
  pub fn is_allowed(
    &self, g: &BlockGeom, sb_x: usize, sb_y: usize,
  ) -> bool {
    sb_x + g.origin_x + g.bwidth <= self.width
      && sb_y + g.origin_y + g.bheight <= self.height
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn block_size_lookup() {
    for b in BlockSize::ALL {
      assert_eq!(BlockSize::from_dims(b.width(), b.height()), Ok(b));
    }
    assert_eq!(BlockSize::from_dims(4, 32), Err(InvalidBlockSize));
  }

  #[test]
  fn table_sizes() {
    assert_eq!(ns_depth_offset(4), 1);
    assert_eq!(ns_depth_offset(8), 9);
    assert_eq!(ns_depth_offset(16), 61);
    assert_eq!(ns_depth_offset(32), 269);
    assert_eq!(block_geom(SbSize::Sb64).len(), 1101);
    assert_eq!(block_geom(SbSize::Sb128).len(), 4421);
  }

  #[test]
  fn jumps_land_on_squares() {
    for sb in [SbSize::Sb64, SbSize::Sb128] {
      let geom = block_geom(sb);
      for (i, g) in geom.iter().enumerate() {
        if g.shape != PARTITION_NONE {
          continue;
        }
        assert_eq!(g.sqi_mds, i);
        if g.sq_size > 4 {
          for (q, &c) in quadrants(geom, i).iter().enumerate() {
            assert_eq!(geom[c].shape, PARTITION_NONE);
            assert_eq!(geom[c].sq_size, g.sq_size >> 1);
            assert_eq!(geom[c].parent_depth_idx_mds, Some(i));
            assert_eq!(geom[c].quadi, q);
          }
        }
        assert_eq!(sq_mds_at(sb, g.origin_x, g.origin_y, g.sq_size), i);
      }
    }
  }

  #[test]
  fn shapes_cover_square() {
    for &shape in &D1_SHAPES {
      let area: usize =
        shape.blocks(32).iter().map(|&(_, _, w, h)| w * h).sum();
      assert_eq!(area, 32 * 32);
    }
  }

  #[test]
  fn chroma_ownership() {
    let geom = block_geom(SbSize::Sb64);
    let sq8 = sq_mds_at(SbSize::Sb64, 0, 0, 8);
    let split4 = quadrants(geom, sq8);
    let with_uv: Vec<bool> = split4.iter().map(|&i| geom[i].has_uv).collect();
    assert_eq!(with_uv, vec![false, false, false, true]);
    assert_eq!(geom[split4[3]].chroma_rect(), (0, 0, 4, 4));
  }
}
