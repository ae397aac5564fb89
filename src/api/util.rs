// Copyright (c) 2018-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.
#![deny(missing_docs)]

use crate::encode::SbCodingStats;
use crate::frame::Picture;
use crate::levels::SliceType;

use std::fmt;
use std::sync::Arc;

use thiserror::*;

/// Status that can be returned by [`Encoder`] functions.
///
/// [`Encoder`]: struct.Encoder.html
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum EncoderStatus {
  /// Generic fatal error.
  #[error("failure")]
  Failure,
  /// The picture does not match the configured format, or predicts from
  /// pictures not coded yet.
  #[error("not ready")]
  NotReady,
  /// A working buffer could not be allocated.
  #[error("allocation failure")]
  AllocationFailure,
  /// The recon output buffer is smaller than one picture.
  #[error("recon buffer overflow ({required} bytes needed, {available} available)")]
  ResourceOverflow {
    /// Bytes needed by one picture.
    required: usize,
    /// Capacity of the buffer.
    available: usize,
  },
  /// The encoder has been flushed.
  #[error("limit reached")]
  LimitReached,
}

/// Errors reported to the [`AppCallback`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EncodeErrorKind {
  /// A worker stopped after a fatal error.
  Worker(EncoderStatus),
  /// The recon output buffer overflowed; the picture was still emitted.
  ReconOverflow {
    /// Number of the picture.
    picture_number: u64,
    /// Bytes needed by the picture.
    required: usize,
    /// Capacity of the buffer.
    available: usize,
  },
}

/// Receiver of the errors the encoder can't return to a caller.
pub trait AppCallback: Send + Sync {
  /// Called once per error, from the thread that hit it.
  fn error(&self, kind: EncodeErrorKind);
}

/// Neighbors of an alt-ref picture, in display order.
#[derive(Clone, Debug, Default)]
pub struct AltRefWindow {
  /// Pictures before the alt-ref, oldest first.
  pub past: Vec<Arc<Picture>>,
  /// Pictures after the alt-ref, nearest first.
  pub future: Vec<Arc<Picture>>,
}

/// One picture handed to the encoder.
#[derive(Clone, Debug)]
pub struct PictureInput {
  /// Source samples.
  pub picture: Picture,
  /// Slice type chosen by the caller.
  pub slice_type: SliceType,
  /// Temporal layer of the picture.
  pub temporal_layer: u8,
  /// The picture shows an alt-ref already coded.
  pub is_overlay: bool,
  /// Neighbors to filter with, when the picture is an alt-ref.
  pub altref: Option<AltRefWindow>,
  /// Last picture of the stream.
  pub end_of_stream: bool,
}

impl PictureInput {
  /// An intra picture.
  pub fn intra(picture: Picture) -> Self {
    PictureInput {
      picture,
      slice_type: SliceType::I,
      temporal_layer: 0,
      is_overlay: false,
      altref: None,
      end_of_stream: false,
    }
  }

  /// An inter picture predicted from the previous reconstructions.
  pub fn inter(picture: Picture) -> Self {
    PictureInput { slice_type: SliceType::P, ..PictureInput::intra(picture) }
  }

  /// Marks the picture as an alt-ref filtered with `window`.
  pub fn with_altref(mut self, window: AltRefWindow) -> Self {
    self.altref = Some(window);
    self
  }

  /// Marks the picture as the last one.
  pub fn with_end_of_stream(mut self) -> Self {
    self.end_of_stream = true;
    self
  }
}

/// Reconstructed samples of a picture: Y, then U, then V, one byte per
/// 8-bit sample and two little-endian bytes per 10-bit sample.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconBuffer {
  /// Buffer of the configured capacity.
  pub data: Vec<u8>,
  /// Bytes written.
  pub filled: usize,
  /// The picture is the last of the stream.
  pub end_of_stream: bool,
}

/// Quality and coding statistics of a picture.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PictureStats {
  /// Estimated coded size in bits.
  pub bits: u64,
  /// Sum of squared errors per plane. Measured against the unfiltered
  /// source when PSNR or SSIM is enabled, else against the coded source.
  pub sse: [u64; 3],
  /// PSNR per plane, when enabled.
  pub psnr: Option<[f64; 3]>,
  /// SSIM per plane, when enabled.
  pub ssim: Option<[f64; 3]>,
  /// Block statistics of the final pass.
  pub coding: SbCodingStats,
  /// Mean noise level of the temporal filter, when it ran.
  pub tf_noise_level: Option<f64>,
}

/// The outcome of encoding one picture.
#[derive(Clone, Debug)]
pub struct EncodedPicture {
  /// Number of the picture in input order.
  pub picture_number: u64,
  /// Slice type of the picture.
  pub slice_type: SliceType,
  /// Base quantizer index of the published pass.
  pub base_q_idx: u8,
  /// Encode passes over the picture.
  pub loop_count: usize,
  /// Reconstructed pictures emitted so far, this one included.
  pub total_recon_frames: u64,
  /// Exported reconstruction, when enabled.
  pub recon: Option<ReconBuffer>,
  /// Statistics of the picture.
  pub stats: PictureStats,
  /// Last picture of the stream.
  pub end_of_stream: bool,
}

impl fmt::Display for EncodedPicture {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "Picture {} - {:?} - q {} - {} bits - {} loops",
      self.picture_number,
      self.slice_type,
      self.base_q_idx,
      self.stats.bits,
      self.loop_count
    )
  }
}
