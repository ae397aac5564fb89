// Copyright (c) 2018-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::mc::SUBPEL_FILTER_SIZE;
use crate::util::*;

mod pack;
mod plane;

pub use pack::*;
pub use plane::*;

pub const FRAME_MARGIN: usize = 16 + SUBPEL_FILTER_SIZE;

/// One video frame in 4:2:0.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Frame<T: Pixel> {
  /// Planes constituting the frame.
  pub planes: [Plane<T>; 3],
}

impl<T: Pixel> Frame<T> {
  /// Creates a new frame with the given parameters.
  ///
  /// Allocates data for the planes. The luma dimensions are aligned to the
  /// next multiple of 8 and every plane is padded by `luma_padding`
  /// (decimated for chroma).
  pub fn new(width: usize, height: usize, luma_padding: usize) -> Self {
    let luma_width = width.align_power_of_two(3);
    let luma_height = height.align_power_of_two(3);

    let chroma_sampling = ChromaSampling::Cs420;
    let (chroma_decimation_x, chroma_decimation_y) =
      chroma_sampling.get_decimation().unwrap_or((0, 0));
    let (chroma_width, chroma_height) =
      chroma_sampling.get_chroma_dimensions(luma_width, luma_height);
    let chroma_padding_x = luma_padding >> chroma_decimation_x;
    let chroma_padding_y = luma_padding >> chroma_decimation_y;
    let chroma = || {
      Plane::new(
        chroma_width,
        chroma_height,
        chroma_decimation_x,
        chroma_decimation_y,
        chroma_padding_x,
        chroma_padding_y,
      )
    };

    Frame {
      planes: [
        Plane::new(luma_width, luma_height, 0, 0, luma_padding, luma_padding),
        chroma(),
        chroma(),
      ],
    }
  }

  /// Allocates a frame with the same geometry as `other`.
  pub fn new_like<U: Pixel>(other: &Frame<U>) -> Self {
    Frame {
      planes: [
        Plane::new_like(&other.planes[0]),
        Plane::new_like(&other.planes[1]),
        Plane::new_like(&other.planes[2]),
      ],
    }
  }

  /// Pads every plane from its visible area.
  pub fn pad(&mut self, w: usize, h: usize) {
    for p in self.planes.iter_mut() {
      p.pad(w, h);
    }
  }

  #[inline]
  pub fn width(&self) -> usize {
    self.planes[0].cfg.width
  }

  #[inline]
  pub fn height(&self) -> usize {
    self.planes[0].cfg.height
  }
}

/// Source or reconstructed picture as the rest of the encoder exchanges it.
///
/// 8-bit content lives in `planes`. 10-bit content is split: `planes` holds
/// the 8 most significant bits and `bit_inc` holds the two least
/// significant bits in bits 7..6 of each byte, with identical geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
  pub planes: [Plane<u8>; 3],
  pub bit_inc: Option<[Plane<u8>; 3]>,
  pub bit_depth: usize,
  /// Visible luma width before alignment.
  pub width: usize,
  /// Visible luma height before alignment.
  pub height: usize,
}

/// A pre-filter copy of a picture's samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPicture {
  planes: [Plane<u8>; 3],
  bit_inc: Option<[Plane<u8>; 3]>,
}

impl Picture {
  pub fn new(
    width: usize, height: usize, bit_depth: usize, luma_padding: usize,
  ) -> Self {
    let f = Frame::<u8>::new(width, height, luma_padding);
    let bit_inc = if bit_depth > 8 { Some(f.planes.clone()) } else { None };
    Picture { planes: f.planes, bit_inc, bit_depth, width, height }
  }

  /// Builds a picture from 16-bit samples. 10-bit input is split.
  pub fn from_highbd(frame: &Frame<u16>, bit_depth: usize) -> Self {
    let mut pic = Picture {
      planes: Frame::<u8>::new_like(frame).planes,
      bit_inc: None,
      bit_depth,
      width: frame.width(),
      height: frame.height(),
    };
    if bit_depth > 8 {
      pic.bit_inc = Some(Frame::<u8>::new_like(frame).planes);
    }
    pic.store_highbd(frame);
    pic
  }

  /// Copies one component from caller memory and repads it.
  ///
  /// `msb` holds one byte per sample: the whole sample for 8-bit pictures,
  /// the 8 most significant bits for split ones. Split pictures also take
  /// `bit_inc`, where each byte carries the two least significant bits of
  /// four consecutive samples at shifts 6, 4, 2 and 0. Both buffers cover
  /// the aligned plane size.
  pub fn copy_from_raw(
    &mut self, plane: usize, msb: &[u8], msb_stride: usize,
    bit_inc: Option<(&[u8], usize)>,
  ) {
    self.planes[plane].copy_from_raw_u8(msb, msb_stride, 1);
    if let (Some(inc), Some((src, src_stride))) = (&mut self.bit_inc, bit_inc)
    {
      let p = &mut inc[plane];
      let PlaneConfig { stride, width, height, .. } = p.cfg;
      decompress_2bit(
        src,
        src_stride,
        p.data_origin_mut(),
        stride,
        width,
        height,
      );
    }
    self.pad();
  }

  #[inline]
  pub fn is_split(&self) -> bool {
    self.bit_inc.is_some()
  }

  /// Aligned luma width.
  #[inline]
  pub fn aligned_width(&self) -> usize {
    self.planes[0].cfg.width
  }

  /// Aligned luma height.
  #[inline]
  pub fn aligned_height(&self) -> usize {
    self.planes[0].cfg.height
  }

  /// Returns the 16-bit contiguous ("packed") copy, padded.
  pub fn to_highbd(&self) -> Frame<u16> {
    let mut out = Frame::<u16>::new_like(&Frame { planes: self.planes.clone() });
    self.copy_to_highbd(&mut out);
    out
  }

  /// Packs (or widens) into an existing 16-bit frame of the same geometry.
  pub fn copy_to_highbd(&self, out: &mut Frame<u16>) {
    for p in 0..3 {
      match &self.bit_inc {
        Some(inc) => pack_plane(&self.planes[p], &inc[p], &mut out.planes[p]),
        None => widen_plane(&self.planes[p], &mut out.planes[p]),
      }
    }
    let (w, h) = (self.aligned_width(), self.aligned_height());
    out.pad(w, h);
  }

  /// Unpacks (or narrows) 16-bit samples back into this picture and
  /// repads it.
  pub fn store_highbd(&mut self, frame: &Frame<u16>) {
    for p in 0..3 {
      match &mut self.bit_inc {
        Some(inc) => {
          unpack_plane(&frame.planes[p], &mut self.planes[p], &mut inc[p])
        }
        None => narrow_plane(&frame.planes[p], &mut self.planes[p]),
      }
    }
    self.pad();
  }

  /// Replicates edges into the padding of every buffer.
  pub fn pad(&mut self) {
    let (w, h) = (self.aligned_width(), self.aligned_height());
    for p in self.planes.iter_mut() {
      p.pad(w, h);
    }
    if let Some(inc) = &mut self.bit_inc {
      for p in inc.iter_mut() {
        p.pad(w, h);
      }
    }
  }

  /// Sample value in the picture's native bit depth.
  #[inline]
  pub fn sample(&self, plane: usize, x: usize, y: usize) -> u16 {
    let msb = self.planes[plane].p(x, y) as u16;
    match &self.bit_inc {
      Some(inc) => (msb << 2) | ((inc[plane].p(x, y) as u16 >> 6) & 3),
      None => msb,
    }
  }

  /// Snapshot of the samples, used to keep the unfiltered source around
  /// for quality measurement.
  pub fn save(&self) -> SavedPicture {
    SavedPicture { planes: self.planes.clone(), bit_inc: self.bit_inc.clone() }
  }

  /// Restores samples previously captured with [`Picture::save`].
  pub fn restore(&mut self, saved: &SavedPicture) {
    for (dst, src) in self.planes.iter_mut().zip(saved.planes.iter()) {
      dst.data.copy_from_slice(&src.data);
    }
    if let (Some(dst), Some(src)) = (&mut self.bit_inc, &saved.bit_inc) {
      for (d, s) in dst.iter_mut().zip(src.iter()) {
        d.data.copy_from_slice(&s.data);
      }
    }
  }
}

impl SavedPicture {
  /// View of the snapshot as a picture of the given bit depth.
  pub fn as_picture(&self, width: usize, height: usize, bit_depth: usize) -> Picture {
    Picture {
      planes: self.planes.clone(),
      bit_inc: self.bit_inc.clone(),
      bit_depth,
      width,
      height,
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use rand::{Rng, SeedableRng};
  use rand_chacha::ChaChaRng;

  fn random_highbd(w: usize, h: usize, seed: u8) -> Frame<u16> {
    let mut ra = ChaChaRng::from_seed([seed; 32]);
    let mut f = Frame::<u16>::new(w, h, 32);
    for p in f.planes.iter_mut() {
      for y in 0..p.cfg.height {
        for x in 0..p.cfg.width {
          p.set(x, y, ra.gen_range(0..1024));
        }
      }
    }
    f.pad(w, h);
    f
  }

  #[test]
  fn split_roundtrip_preserves_samples_and_padding() {
    let src = random_highbd(160, 160, 3);
    let pic = Picture::from_highbd(&src, 10);
    let back = pic.to_highbd();
    for p in 0..3 {
      let (sp, bp) = (&src.planes[p], &back.planes[p]);
      for y in 0..sp.cfg.height {
        assert_eq!(&sp.row(y as isize)[..sp.cfg.width], &bp.row(y as isize)[..sp.cfg.width]);
      }
      let w = bp.cfg.width as isize;
      let h = bp.cfg.height as isize;
      assert_eq!(bp.p_clamped(-1, -1), bp.p(0, 0));
      assert_eq!(bp.p_clamped(w + 3, 5), bp.p(w as usize - 1, 5));
      assert_eq!(bp.p_clamped(7, h + 2), bp.p(7, h as usize - 1));
    }
  }

  #[test]
  fn save_restore_is_bit_exact() {
    let src = random_highbd(64, 64, 9);
    let mut pic = Picture::from_highbd(&src, 10);
    let saved = pic.save();
    let other = random_highbd(64, 64, 10);
    pic.store_highbd(&other);
    assert_ne!(pic.save(), saved);
    pic.restore(&saved);
    assert_eq!(pic.to_highbd(), src);
  }

  #[test]
  fn eight_bit_widen() {
    let mut pic = Picture::new(16, 16, 8, 16);
    pic.planes[0].set(3, 4, 200);
    let f = pic.to_highbd();
    assert_eq!(f.planes[0].p(3, 4), 200);
    assert_eq!(pic.sample(0, 3, 4), 200);
  }
}
