// Copyright (c) 2018-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Last-superblock work of a published pass: quality measurement and recon
//! export.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::{debug, warn};

use super::picture::{FinishedPass, PictureControlSet};
use crate::api::{
  EncodeErrorKind, EncodedPicture, EncoderStatus, PictureStats, ReconBuffer,
};
use crate::frame::Frame;
use crate::metrics::{
  calculate_frame_metrics, frame_sse, plane_dimensions, QualityMetrics,
};

/// Writes Y, then U, then V of the visible area into `data`, as far as it
/// fits. Returns the bytes written.
pub(crate) fn write_recon(
  frame: &Frame<u16>, width: usize, height: usize, bit_depth: usize,
  data: &mut [u8],
) -> usize {
  let bytes = if bit_depth > 8 { 2 } else { 1 };
  let mut filled = 0;
  for (p, plane) in frame.planes.iter().enumerate() {
    let (w, h) = plane_dimensions(p, width, height);
    for y in 0..h {
      for &v in &plane.row(y as isize)[..w] {
        if filled + bytes > data.len() {
          return filled;
        }
        if bytes == 2 {
          data[filled..filled + 2].copy_from_slice(&v.to_le_bytes());
        } else {
          data[filled] = v as u8;
        }
        filled += bytes;
      }
    }
  }
  filled
}

/// Measures, exports and hands the picture back to the encoder.
pub(crate) fn publish(
  pcs: &PictureControlSet, pass: FinishedPass,
) -> Result<(), EncoderStatus> {
  let seq = &*pcs.seq;
  let cfg = &seq.config;
  let (w, h, bd) = (cfg.width, cfg.height, cfg.bit_depth);
  let recon = Arc::new(pass.recon);

  let metrics = match &pcs.original {
    Some(saved) => calculate_frame_metrics(
      &saved.as_picture(w, h, bd),
      &*recon,
      w,
      h,
      bd,
      cfg.compute_psnr,
      cfg.compute_ssim,
    ),
    None => QualityMetrics {
      sse: frame_sse(&pcs.source, &*recon, w, h),
      ..Default::default()
    },
  };

  let tools = seq.picture_tools(pcs.slice_type, pcs.temporal_layer);
  let grained = match &seq.grain {
    Some(grain) if tools.film_grain.enabled => {
      let mut out = (*recon).clone();
      grain.apply(pcs.picture_number, &mut out, bd, tools.film_grain.apply_chroma);
      Some(out)
    }
    _ => None,
  };
  let export = grained.as_ref().unwrap_or(&*recon);

  let recon_buffer = if cfg.enable_recon {
    let required = cfg.recon_size();
    let available = cfg.recon_buffer_size.unwrap_or(required);
    let mut data = Vec::new();
    data
      .try_reserve_exact(available)
      .map_err(|_| EncoderStatus::AllocationFailure)?;
    data.resize(available, 0);
    let filled = write_recon(export, w, h, bd, &mut data);
    if required > available {
      warn!(
        "Recon buffer overflow on picture {}: {} bytes needed, {} available",
        pcs.picture_number, required, available
      );
      if let Some(cb) = &seq.callback {
        cb.error(EncodeErrorKind::ReconOverflow {
          picture_number: pcs.picture_number,
          required,
          available,
        });
      }
    }
    Some(ReconBuffer { data, filled, end_of_stream: pcs.end_of_stream })
  } else {
    None
  };

  let total_recon_frames =
    seq.total_recon_frames.fetch_add(1, Ordering::AcqRel) + 1;
  let picture = EncodedPicture {
    picture_number: pcs.picture_number,
    slice_type: pcs.slice_type,
    base_q_idx: pass.base_q_idx,
    loop_count: pass.loop_count,
    total_recon_frames,
    recon: recon_buffer,
    stats: PictureStats {
      bits: pass.bits,
      sse: metrics.sse,
      psnr: metrics.psnr,
      ssim: metrics.ssim,
      coding: pass.stats,
      tf_noise_level: pcs.tf_noise_level,
    },
    end_of_stream: pcs.end_of_stream,
  };
  debug!("{}", picture);
  pcs.done.send(Ok((picture, recon))).map_err(|_| EncoderStatus::Failure)
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::frame::PlaneExt;

  fn ramp(bit_depth: usize) -> Frame<u16> {
    let mut f = Frame::new(8, 8, 8);
    for (p, plane) in f.planes.iter_mut().enumerate() {
      let (w, h) = (plane.cfg.width, plane.cfg.height);
      for y in 0..h {
        for x in 0..w {
          let v = (p * 100 + y * w + x) << (bit_depth - 8);
          plane.set(x, y, v as u16);
        }
      }
    }
    f
  }

  #[test]
  fn planes_are_written_in_order() {
    let f = ramp(8);
    let mut data = vec![0u8; 96];
    assert_eq!(write_recon(&f, 8, 8, 8, &mut data), 96);
    assert_eq!(&data[..3], &[0, 1, 2]);
    assert_eq!(data[64], 100);
    assert_eq!(data[80], 200);
  }

  #[test]
  fn ten_bit_samples_take_two_bytes() {
    let f = ramp(10);
    let mut data = vec![0u8; 192];
    assert_eq!(write_recon(&f, 8, 8, 10, &mut data), 192);
    assert_eq!(&data[2..4], &4u16.to_le_bytes());
    assert_eq!(&data[128..130], &400u16.to_le_bytes());
  }

  #[test]
  fn overflow_keeps_what_fits() {
    let f = ramp(8);
    let mut data = vec![0u8; 70];
    assert_eq!(write_recon(&f, 8, 8, 8, &mut data), 70);
    assert_eq!(data[69], 105);
  }
}
