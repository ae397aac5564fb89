// Copyright (c) 2019-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Conversions between the split 10-bit representation (an 8-bit MSB plane
//! plus a "bit-inc" plane carrying the two LSBs in bits 7..6 of each byte)
//! and the packed 16-bit representation.

use super::plane::{Plane, PlaneExt};

/// Joins `high8` and `low2` into 16-bit samples:
/// `packed = (high8 << 2) | ((low2 >> 6) & 3)`.
pub fn pack2d(
  high8: &[u8], high_stride: usize, low2: &[u8], low_stride: usize,
  packed16: &mut [u16], packed_stride: usize, width: usize, height: usize,
) {
  for y in 0..height {
    let hi = &high8[y * high_stride..][..width];
    let lo = &low2[y * low_stride..][..width];
    let dst = &mut packed16[y * packed_stride..][..width];
    for ((d, &h), &l) in dst.iter_mut().zip(hi).zip(lo) {
      *d = ((h as u16) << 2) | ((l as u16 >> 6) & 3);
    }
  }
}

/// Inverse of [`pack2d`]: splits 10-bit samples into the MSB and bit-inc
/// planes.
pub fn unpack2d(
  packed16: &[u16], packed_stride: usize, high8: &mut [u8],
  high_stride: usize, low2: &mut [u8], low_stride: usize, width: usize,
  height: usize,
) {
  for y in 0..height {
    let src = &packed16[y * packed_stride..][..width];
    let hi = &mut high8[y * high_stride..][..width];
    for (h, &s) in hi.iter_mut().zip(src) {
      *h = (s >> 2) as u8;
    }
    let lo = &mut low2[y * low_stride..][..width];
    for (l, &s) in lo.iter_mut().zip(src) {
      *l = ((s & 3) << 6) as u8;
    }
  }
}

/// Spreads a bit-inc plane that holds the 2-bit LSBs of four consecutive
/// samples per byte, first sample in the most significant position (shifts
/// 6, 4, 2, 0), to one sample per byte in bits 7..6.
///
/// `width` must be a multiple of 4.
pub fn decompress_2bit(
  src: &[u8], src_stride: usize, low2: &mut [u8], low_stride: usize,
  width: usize, height: usize,
) {
  debug_assert_eq!(width & 3, 0);
  for y in 0..height {
    let s = &src[y * src_stride..][..width / 4];
    let out = &mut low2[y * low_stride..][..width];
    for (&b, quad) in s.iter().zip(out.chunks_exact_mut(4)) {
      quad[0] = b & 0xc0;
      quad[1] = (b << 2) & 0xc0;
      quad[2] = (b << 4) & 0xc0;
      quad[3] = (b << 6) & 0xc0;
    }
  }
}

/// Packs the visible area of a split plane pair into `dst`.
pub fn pack_plane(high: &Plane<u8>, low: &Plane<u8>, dst: &mut Plane<u16>) {
  let (w, h) = (high.cfg.width, high.cfg.height);
  let dst_stride = dst.cfg.stride;
  pack2d(
    high.data_origin(),
    high.cfg.stride,
    low.data_origin(),
    low.cfg.stride,
    dst.data_origin_mut(),
    dst_stride,
    w,
    h,
  );
}

/// Unpacks the visible area of `src` into a split plane pair.
pub fn unpack_plane(src: &Plane<u16>, high: &mut Plane<u8>, low: &mut Plane<u8>) {
  let (w, h) = (src.cfg.width, src.cfg.height);
  let high_stride = high.cfg.stride;
  let low_stride = low.cfg.stride;
  unpack2d(
    src.data_origin(),
    src.cfg.stride,
    high.data_origin_mut(),
    high_stride,
    low.data_origin_mut(),
    low_stride,
    w,
    h,
  );
}

/// Widens an 8-bit plane into a 16-bit one.
pub fn widen_plane(src: &Plane<u8>, dst: &mut Plane<u16>) {
  let w = src.cfg.width;
  for y in 0..src.cfg.height as isize {
    let s = &src.row(y)[..w];
    for (d, &v) in dst.row_mut(y)[..w].iter_mut().zip(s) {
      *d = v as u16;
    }
  }
}

/// Narrows a 16-bit plane holding 8-bit samples.
pub fn narrow_plane(src: &Plane<u16>, dst: &mut Plane<u8>) {
  let w = src.cfg.width;
  for y in 0..src.cfg.height as isize {
    let s = &src.row(y)[..w];
    for (d, &v) in dst.row_mut(y)[..w].iter_mut().zip(s) {
      *d = v.min(255) as u8;
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use quickcheck::quickcheck;
  use rand::{Rng, SeedableRng};
  use rand_chacha::ChaChaRng;

  quickcheck! {
    fn pack_unpack_roundtrip(samples: Vec<u16>) -> bool {
      let samples: Vec<u16> = samples.iter().map(|s| s & 0x3ff).collect();
      let n = samples.len();
      let mut hi = vec![0u8; n];
      let mut lo = vec![0u8; n];
      let mut out = vec![0u16; n];
      unpack2d(&samples, n.max(1), &mut hi, n.max(1), &mut lo, n.max(1), n, 1);
      pack2d(&hi, n.max(1), &lo, n.max(1), &mut out, n.max(1), n, 1);
      out == samples
    }
  }

  #[test]
  fn decompress_layout() {
    let packed = [0b01_10_11_00u8, 0b11_00_00_01];
    let mut low = [0u8; 8];
    decompress_2bit(&packed, 1, &mut low, 4, 4, 2);
    assert_eq!(low, [0x40, 0x80, 0xc0, 0x00, 0xc0, 0x00, 0x00, 0x40]);
  }

  #[test]
  fn decompress_then_pack() {
    let mut ra = ChaChaRng::from_seed([7; 32]);
    let samples: Vec<u16> = (0..64).map(|_| ra.gen_range(0..1024)).collect();
    let high: Vec<u8> = samples.iter().map(|&s| (s >> 2) as u8).collect();
    let packed: Vec<u8> = samples
      .chunks_exact(4)
      .map(|q| q.iter().fold(0u8, |acc, &s| (acc << 2) | (s & 3) as u8))
      .collect();
    let mut low = vec![0u8; 64];
    decompress_2bit(&packed, 4, &mut low, 16, 16, 4);
    let mut out = vec![0u16; 64];
    pack2d(&high, 16, &low, 16, &mut out, 16, 16, 4);
    assert_eq!(out, samples);
  }
}
