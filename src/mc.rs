// Copyright (c) 2019-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::frame::*;
use crate::util::*;

use std::ops;

/// Motion vector in 1/8 luma sample units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct MotionVector {
  pub row: i16,
  pub col: i16,
}

impl MotionVector {
  #[inline]
  pub const fn new(row: i16, col: i16) -> Self {
    Self { row, col }
  }

  #[inline]
  pub const fn from_fullpel(row: isize, col: isize) -> Self {
    Self { row: (row * 8) as i16, col: (col * 8) as i16 }
  }

  #[inline]
  pub const fn quantize_to_fullpel(self) -> Self {
    Self { row: (self.row / 8) * 8, col: (self.col / 8) * 8 }
  }

  #[inline]
  pub const fn is_zero(self) -> bool {
    self.row == 0 && self.col == 0
  }

  #[inline]
  pub const fn is_fullpel(self) -> bool {
    self.row & 7 == 0 && self.col & 7 == 0
  }

  /// Euclidean length in full-pel units.
  #[inline]
  pub fn fullpel_len(self) -> f64 {
    let r = self.row as f64 / 8.;
    let c = self.col as f64 / 8.;
    (r * r + c * c).sqrt()
  }
}

macro_rules! mv_op {
  ($tr:ident, $f:ident, $rhs:ty, |$a:ident, $b:ident| $e:expr) => {
    impl ops::$tr<$rhs> for MotionVector {
      type Output = MotionVector;

      #[inline]
      fn $f(self, rhs: $rhs) -> MotionVector {
        let op = |$a: i16, $b| $e;
        MotionVector::new(op(self.row, rhs.row), op(self.col, rhs.col))
      }
    }
  };
}

mv_op!(Add, add, MotionVector, |a, b| a + b);
mv_op!(Sub, sub, MotionVector, |a, b| a - b);

impl ops::Shl<u8> for MotionVector {
  type Output = MotionVector;

  #[inline]
  fn shl(self, rhs: u8) -> MotionVector {
    MotionVector::new(self.row << rhs, self.col << rhs)
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum FilterMode {
  REGULAR = 0,
  SMOOTH = 1,
  SHARP = 2,
  BILINEAR = 3,
}

/// Horizontal and vertical interpolation filters of an inter block.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct InterpFilters {
  pub x: FilterMode,
  pub y: FilterMode,
}

impl InterpFilters {
  pub const REGULAR: InterpFilters =
    InterpFilters { x: FilterMode::REGULAR, y: FilterMode::REGULAR };
  pub const SMOOTH: InterpFilters =
    InterpFilters { x: FilterMode::SMOOTH, y: FilterMode::SMOOTH };
  pub const SHARP: InterpFilters =
    InterpFilters { x: FilterMode::SHARP, y: FilterMode::SHARP };

  /// All dual-filter combinations, regular first.
  pub const DUAL: [InterpFilters; 9] = [
    InterpFilters::REGULAR,
    InterpFilters { x: FilterMode::SMOOTH, y: FilterMode::REGULAR },
    InterpFilters { x: FilterMode::SHARP, y: FilterMode::REGULAR },
    InterpFilters { x: FilterMode::REGULAR, y: FilterMode::SMOOTH },
    InterpFilters::SMOOTH,
    InterpFilters { x: FilterMode::SHARP, y: FilterMode::SMOOTH },
    InterpFilters { x: FilterMode::REGULAR, y: FilterMode::SHARP },
    InterpFilters { x: FilterMode::SMOOTH, y: FilterMode::SHARP },
    InterpFilters::SHARP,
  ];
}

impl Default for InterpFilters {
  fn default() -> Self {
    InterpFilters::REGULAR
  }
}

pub const SUBPEL_FILTER_SIZE: usize = 8;

const SUBPEL_FILTERS: [[[i32; SUBPEL_FILTER_SIZE]; 16]; 6] = [
  [
    [0, 0, 0, 128, 0, 0, 0, 0],
    [0, 2, -6, 126, 8, -2, 0, 0],
    [0, 2, -10, 122, 18, -4, 0, 0],
    [0, 2, -12, 116, 28, -8, 2, 0],
    [0, 2, -14, 110, 38, -10, 2, 0],
    [0, 2, -14, 102, 48, -12, 2, 0],
    [0, 2, -16, 94, 58, -12, 2, 0],
    [0, 2, -14, 84, 66, -12, 2, 0],
    [0, 2, -14, 76, 76, -14, 2, 0],
    [0, 2, -12, 66, 84, -14, 2, 0],
    [0, 2, -12, 58, 94, -16, 2, 0],
    [0, 2, -12, 48, 102, -14, 2, 0],
    [0, 2, -10, 38, 110, -14, 2, 0],
    [0, 2, -8, 28, 116, -12, 2, 0],
    [0, 0, -4, 18, 122, -10, 2, 0],
    [0, 0, -2, 8, 126, -6, 2, 0],
  ],
  [
    [0, 0, 0, 128, 0, 0, 0, 0],
    [0, 2, 28, 62, 34, 2, 0, 0],
    [0, 0, 26, 62, 36, 4, 0, 0],
    [0, 0, 22, 62, 40, 4, 0, 0],
    [0, 0, 20, 60, 42, 6, 0, 0],
    [0, 0, 18, 58, 44, 8, 0, 0],
    [0, 0, 16, 56, 46, 10, 0, 0],
    [0, -2, 16, 54, 48, 12, 0, 0],
    [0, -2, 14, 52, 52, 14, -2, 0],
    [0, 0, 12, 48, 54, 16, -2, 0],
    [0, 0, 10, 46, 56, 16, 0, 0],
    [0, 0, 8, 44, 58, 18, 0, 0],
    [0, 0, 6, 42, 60, 20, 0, 0],
    [0, 0, 4, 40, 62, 22, 0, 0],
    [0, 0, 4, 36, 62, 26, 0, 0],
    [0, 0, 2, 34, 62, 28, 2, 0],
  ],
  [
    [0, 0, 0, 128, 0, 0, 0, 0],
    [-2, 2, -6, 126, 8, -2, 2, 0],
    [-2, 6, -12, 124, 16, -6, 4, -2],
    [-2, 8, -18, 120, 26, -10, 6, -2],
    [-4, 10, -22, 116, 38, -14, 6, -2],
    [-4, 10, -22, 108, 48, -18, 8, -2],
    [-4, 10, -24, 100, 60, -20, 8, -2],
    [-4, 10, -24, 90, 70, -22, 10, -2],
    [-4, 12, -24, 80, 80, -24, 12, -4],
    [-2, 10, -22, 70, 90, -24, 10, -4],
    [-2, 8, -20, 60, 100, -24, 10, -4],
    [-2, 8, -18, 48, 108, -22, 10, -4],
    [-2, 6, -14, 38, 116, -22, 10, -4],
    [-2, 6, -10, 26, 120, -18, 8, -2],
    [-2, 4, -6, 16, 124, -12, 6, -2],
    [0, 2, -2, 8, 126, -6, 2, -2],
  ],
  [
    [0, 0, 0, 128, 0, 0, 0, 0],
    [0, 0, 0, 120, 8, 0, 0, 0],
    [0, 0, 0, 112, 16, 0, 0, 0],
    [0, 0, 0, 104, 24, 0, 0, 0],
    [0, 0, 0, 96, 32, 0, 0, 0],
    [0, 0, 0, 88, 40, 0, 0, 0],
    [0, 0, 0, 80, 48, 0, 0, 0],
    [0, 0, 0, 72, 56, 0, 0, 0],
    [0, 0, 0, 64, 64, 0, 0, 0],
    [0, 0, 0, 56, 72, 0, 0, 0],
    [0, 0, 0, 48, 80, 0, 0, 0],
    [0, 0, 0, 40, 88, 0, 0, 0],
    [0, 0, 0, 32, 96, 0, 0, 0],
    [0, 0, 0, 24, 104, 0, 0, 0],
    [0, 0, 0, 16, 112, 0, 0, 0],
    [0, 0, 0, 8, 120, 0, 0, 0],
  ],
  [
    [0, 0, 0, 128, 0, 0, 0, 0],
    [0, 0, -4, 126, 8, -2, 0, 0],
    [0, 0, -8, 122, 18, -4, 0, 0],
    [0, 0, -10, 116, 28, -6, 0, 0],
    [0, 0, -12, 110, 38, -8, 0, 0],
    [0, 0, -12, 102, 48, -10, 0, 0],
    [0, 0, -14, 94, 58, -10, 0, 0],
    [0, 0, -12, 84, 66, -10, 0, 0],
    [0, 0, -12, 76, 76, -12, 0, 0],
    [0, 0, -10, 66, 84, -12, 0, 0],
    [0, 0, -10, 58, 94, -14, 0, 0],
    [0, 0, -10, 48, 102, -12, 0, 0],
    [0, 0, -8, 38, 110, -12, 0, 0],
    [0, 0, -6, 28, 116, -10, 0, 0],
    [0, 0, -4, 18, 122, -8, 0, 0],
    [0, 0, -2, 8, 126, -4, 0, 0],
  ],
  [
    [0, 0, 0, 128, 0, 0, 0, 0],
    [0, 0, 30, 62, 34, 2, 0, 0],
    [0, 0, 26, 62, 36, 4, 0, 0],
    [0, 0, 22, 62, 40, 4, 0, 0],
    [0, 0, 20, 60, 42, 6, 0, 0],
    [0, 0, 18, 58, 44, 8, 0, 0],
    [0, 0, 16, 56, 46, 10, 0, 0],
    [0, 0, 14, 54, 48, 12, 0, 0],
    [0, 0, 12, 52, 52, 12, 0, 0],
    [0, 0, 12, 48, 54, 14, 0, 0],
    [0, 0, 10, 46, 56, 16, 0, 0],
    [0, 0, 8, 44, 58, 18, 0, 0],
    [0, 0, 6, 42, 60, 20, 0, 0],
    [0, 0, 4, 40, 62, 22, 0, 0],
    [0, 0, 4, 36, 62, 26, 0, 0],
    [0, 0, 2, 34, 62, 30, 0, 0],
  ],
];

fn get_filter(
  mode: FilterMode, frac: i32, length: usize,
) -> [i32; SUBPEL_FILTER_SIZE] {
  let filter_idx = match mode {
    FilterMode::BILINEAR => 3,
    _ if length > 4 => mode as usize,
    FilterMode::SMOOTH => 5,
    _ => 4,
  };
  SUBPEL_FILTERS[filter_idx][frac as usize]
}

/// Copies a `w` x `h` window starting at `(x0, y0)`, replicating samples
/// beyond the allocated area.
fn gather(
  src: &Plane<u16>, x0: isize, y0: isize, w: usize, h: usize,
) -> Vec<i32> {
  let cfg = &src.cfg;
  let inside = x0 >= -(cfg.xorigin as isize)
    && y0 >= -(cfg.yorigin as isize)
    && x0 + w as isize <= (cfg.stride - cfg.xorigin) as isize
    && y0 + h as isize <= (cfg.alloc_height - cfg.yorigin) as isize;
  let mut out = Vec::with_capacity(w * h);
  for r in 0..h as isize {
    if inside {
      let row = &src.data[src.row_range(x0, y0 + r)][..w];
      out.extend(row.iter().map(|&v| v as i32));
    } else {
      out.extend(
        (0..w as isize).map(|c| src.p_clamped(x0 + c, y0 + r) as i32),
      );
    }
  }
  out
}

/// Sub-pixel interpolation of a `width` x `height` block whose integer
/// position in `src` is `(x, y)`. `col_frac` and `row_frac` are in 1/16
/// sample units.
pub fn put_8tap(
  dst: &mut [u16], dst_stride: usize, src: &Plane<u16>, x: isize, y: isize,
  width: usize, height: usize, col_frac: i32, row_frac: i32,
  mode_x: FilterMode, mode_y: FilterMode, bit_depth: usize,
) {
  let max_sample_val = (1 << bit_depth) - 1;
  if col_frac == 0 && row_frac == 0 {
    let win = gather(src, x, y, width, height);
    for r in 0..height {
      for c in 0..width {
        dst[r * dst_stride + c] = win[r * width + c] as u16;
      }
    }
    return;
  }
  let intermediate_bits = 4;
  let y_filter = get_filter(mode_y, row_frac, height);
  let x_filter = get_filter(mode_x, col_frac, width);
  let ww = width + SUBPEL_FILTER_SIZE - 1;
  let wh = height + SUBPEL_FILTER_SIZE - 1;
  let win = gather(src, x - 3, y - 3, ww, wh);

  let mut intermediate = vec![0i32; width * wh];
  for r in 0..wh {
    let row = &win[r * ww..][..ww];
    for c in 0..width {
      let sum: i32 =
        x_filter.iter().zip(&row[c..c + 8]).map(|(f, p)| f * p).sum();
      intermediate[r * width + c] = round_shift(sum, 7 - intermediate_bits);
    }
  }
  for r in 0..height {
    for c in 0..width {
      let sum: i32 = y_filter
        .iter()
        .enumerate()
        .map(|(i, f)| f * intermediate[(r + i) * width + c])
        .sum();
      dst[r * dst_stride + c] = round_shift(sum, 7 + intermediate_bits)
        .clamp(0, max_sample_val) as u16;
    }
  }
}

/// Motion compensated prediction of the block at `(px, py)` in a plane of
/// `reference`, with `mv` in 1/8 luma units.
pub fn predict_inter(
  dst: &mut [u16], dst_stride: usize, reference: &Plane<u16>, px: usize,
  py: usize, width: usize, height: usize, mv: MotionVector,
  filters: InterpFilters, bit_depth: usize,
) {
  let xdec = reference.cfg.xdec;
  let ydec = reference.cfg.ydec;
  let qx = ((px as isize) << 4) + (((mv.col as isize) * 2) >> xdec);
  let qy = ((py as isize) << 4) + (((mv.row as isize) * 2) >> ydec);
  put_8tap(
    dst,
    dst_stride,
    reference,
    qx >> 4,
    qy >> 4,
    width,
    height,
    (qx & 15) as i32,
    (qy & 15) as i32,
    filters.x,
    filters.y,
    bit_depth,
  );
}

#[cfg(test)]
mod test {
  use super::*;
  use interpolate_name::interpolate_test;

  fn ramp_plane() -> Plane<u16> {
    let mut p = Plane::<u16>::new(32, 32, 0, 0, 16, 16);
    for y in 0..32 {
      for x in 0..32 {
        p.set(x, y, (x * 8 + y) as u16);
      }
    }
    p.pad(32, 32);
    p
  }

  #[test]
  fn fullpel_is_copy() {
    let p = ramp_plane();
    let mut dst = vec![0u16; 8 * 8];
    let mv = MotionVector::from_fullpel(2, -1);
    predict_inter(&mut dst, 8, &p, 8, 8, 8, 8, mv, InterpFilters::SHARP, 10);
    assert_eq!(dst[0], p.p(7, 10));
    assert_eq!(dst[9], p.p(8, 11));
  }

  #[interpolate_test(regular, InterpFilters::REGULAR)]
  #[interpolate_test(smooth, InterpFilters::SMOOTH)]
  #[interpolate_test(sharp, InterpFilters::SHARP)]
  fn flat_stays_flat(filters: InterpFilters) {
    let mut p = Plane::<u16>::new(16, 16, 0, 0, 16, 16);
    for v in p.data.iter_mut() {
      *v = 300;
    }
    let mut dst = vec![0u16; 4 * 4];
    let mv = MotionVector::new(3, -5);
    predict_inter(&mut dst, 4, &p, 4, 4, 4, 4, mv, filters, 10);
    assert!(dst.iter().all(|&v| v == 300));
  }

  #[test]
  fn half_pel_is_average_on_linear_ramp() {
    let p = ramp_plane();
    let mut dst = vec![0u16; 8 * 8];
    let mv = MotionVector::new(0, 4);
    predict_inter(&mut dst, 8, &p, 8, 8, 8, 8, mv, InterpFilters::REGULAR, 10);
    let expected = (p.p(8, 8) + p.p(9, 8) + 1) / 2;
    assert_eq!(dst[0], expected);
  }
}
