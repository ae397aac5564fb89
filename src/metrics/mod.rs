// Copyright (c) 2018-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Quality of a reconstruction against its source.
//!
//! Split 10-bit sources are read as `(msb << 2) | ((bit_inc >> 6) & 3)`,
//! the same synthesis the 16-bit packing uses. The two least significant
//! bits therefore come from the stored bit-inc plane as is; a source whose
//! bit-inc plane was never filled reads as its 8-bit value shifted left.

use crate::frame::{Frame, Picture};

mod psnr;
mod ssim;

pub use psnr::*;
pub use ssim::*;

/// Read access to the visible samples of a picture.
pub trait SampleSource {
  fn sample_at(&self, plane: usize, x: usize, y: usize) -> u16;
}

impl SampleSource for Picture {
  #[inline]
  fn sample_at(&self, plane: usize, x: usize, y: usize) -> u16 {
    self.sample(plane, x, y)
  }
}

impl SampleSource for Frame<u16> {
  #[inline]
  fn sample_at(&self, plane: usize, x: usize, y: usize) -> u16 {
    self.planes[plane].p(x, y)
  }
}

/// Visible size of `plane` for a `width` x `height` 4:2:0 picture.
#[inline]
pub const fn plane_dimensions(
  plane: usize, width: usize, height: usize,
) -> (usize, usize) {
  if plane == 0 {
    (width, height)
  } else {
    ((width + 1) >> 1, (height + 1) >> 1)
  }
}

/// Metrics of the three planes.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QualityMetrics {
  pub sse: [u64; 3],
  pub psnr: Option<[f64; 3]>,
  pub ssim: Option<[f64; 3]>,
}

pub fn calculate_frame_metrics(
  original: &impl SampleSource, recon: &impl SampleSource, width: usize,
  height: usize, bit_depth: usize, psnr: bool, ssim: bool,
) -> QualityMetrics {
  let sse = frame_sse(original, recon, width, height);
  QualityMetrics {
    sse,
    psnr: psnr.then(|| frame_psnr(&sse, width, height, bit_depth)),
    ssim: ssim.then(|| frame_ssim(original, recon, width, height, bit_depth)),
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::frame::PlaneExt;
  use rand::{Rng, SeedableRng};
  use rand_chacha::ChaChaRng;

  pub(super) fn noisy_frame(seed: u8, bit_depth: usize) -> Frame<u16> {
    let mut ra = ChaChaRng::from_seed([seed; 32]);
    let mut f = Frame::new(64, 48, 16);
    let max = (1 << bit_depth) - 1;
    for plane in f.planes.iter_mut() {
      let (w, h) = (plane.cfg.width, plane.cfg.height);
      for y in 0..h {
        for x in 0..w {
          plane.set(x, y, ra.gen_range(0..=max));
        }
      }
    }
    f
  }

  #[test]
  fn split_source_reads_as_packed() {
    let f = noisy_frame(9, 10);
    let pic = Picture::from_highbd(&f, 10);
    let m = calculate_frame_metrics(&pic, &f, 64, 48, 10, true, true);
    assert_eq!(m.sse, [0; 3]);
    assert_eq!(m.psnr, Some([100.0; 3]));
    assert_eq!(m.ssim, Some([1.0; 3]));
  }

  #[test]
  fn disabled_metrics_are_skipped() {
    let a = noisy_frame(1, 8);
    let b = noisy_frame(2, 8);
    let m = calculate_frame_metrics(&a, &b, 64, 48, 8, false, false);
    assert!(m.sse[0] > 0);
    assert_eq!((m.psnr, m.ssim), (None, None));
  }
}
