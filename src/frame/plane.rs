// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::util::*;

pub use v_frame::plane::*;

/// Sample access the encoder needs beyond what [`Plane`] offers.
pub trait PlaneExt<T: Pixel> {
  /// Allocates a zeroed plane with the same geometry as `other`.
  fn new_like<U: Pixel>(other: &Plane<U>) -> Self;
  fn row_mut(&mut self, y: isize) -> &mut [T];
  fn set(&mut self, x: usize, y: usize, v: T);
  /// Sample at `(x, y)` with both coordinates clamped to the allocation.
  fn p_clamped(&self, x: isize, y: isize) -> T;
  /// Copies the visible area of `src`, which must have the same size.
  fn copy_from(&mut self, src: &Plane<T>);
}

impl<T: Pixel> PlaneExt<T> for Plane<T> {
  fn new_like<U: Pixel>(other: &Plane<U>) -> Self {
    let c = &other.cfg;
    Plane::new(c.width, c.height, c.xdec, c.ydec, c.xpad, c.ypad)
  }

  #[inline]
  fn row_mut(&mut self, y: isize) -> &mut [T] {
    let range = self.row_range(0, y);
    &mut self.data[range]
  }

  #[inline]
  fn set(&mut self, x: usize, y: usize, v: T) {
    self.row_mut(y as isize)[x] = v;
  }

  #[inline]
  fn p_clamped(&self, x: isize, y: isize) -> T {
    let PlaneConfig { stride, alloc_height, xorigin, yorigin, .. } = self.cfg;
    let col = (x + xorigin as isize).clamp(0, stride as isize - 1);
    let row = (y + yorigin as isize).clamp(0, alloc_height as isize - 1);
    self.data[row as usize * stride + col as usize]
  }

  fn copy_from(&mut self, src: &Plane<T>) {
    debug_assert_eq!(
      (self.cfg.width, self.cfg.height),
      (src.cfg.width, src.cfg.height)
    );
    let w = self.cfg.width;
    for y in 0..self.cfg.height as isize {
      self.row_mut(y)[..w].copy_from_slice(&src.row(y)[..w]);
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use pretty_assertions::assert_eq;

  fn checkerboard() -> Plane<u8> {
    let mut plane = Plane::new(4, 4, 0, 0, 2, 2);
    #[rustfmt::skip]
    let visible = [
      1, 2, 3, 4,
      8, 7, 6, 5,
      9, 8, 7, 6,
      2, 3, 4, 5,
    ];
    for (i, &v) in visible.iter().enumerate() {
      plane.set(i % 4, i / 4, v);
    }
    plane
  }

  #[test]
  fn clamped_reads_see_the_padding() {
    let mut plane = checkerboard();
    plane.pad(4, 4);
    assert_eq!(plane.p_clamped(-2, -2), 1);
    assert_eq!(plane.p_clamped(-1, 1), 8);
    assert_eq!(plane.p_clamped(5, 2), 6);
    assert_eq!(plane.p_clamped(2, 5), 4);
    assert_eq!(plane.p_clamped(1000, 1000), 5);
    assert_eq!(plane.p_clamped(-1000, 1000), 2);
  }

  #[test]
  fn copy_keeps_the_padding() {
    let mut src = Plane::<u16>::new(8, 8, 0, 0, 4, 4);
    for y in 0..8 {
      for x in 0..8 {
        src.set(x, y, (y * 8 + x) as u16);
      }
    }
    let mut dst = Plane::new_like(&src);
    dst.data.iter_mut().for_each(|v| *v = 999);
    dst.copy_from(&src);
    assert_eq!(dst.p(7, 7), 63);
    assert_eq!(dst.p_clamped(-1, 0), 999);
  }

  #[test]
  fn new_like_changes_the_sample_type() {
    let src = Plane::<u8>::new(20, 10, 1, 1, 8, 8);
    let dst: Plane<u16> = Plane::new_like(&src);
    assert_eq!((dst.cfg.width, dst.cfg.height), (20, 10));
    assert_eq!((dst.cfg.xdec, dst.cfg.ydec), (1, 1));
    assert_eq!((dst.cfg.xpad, dst.cfg.ypad), (8, 8));
  }
}
