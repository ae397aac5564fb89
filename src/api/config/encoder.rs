// Copyright (c) 2020-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use itertools::*;

use crate::levels::Preset;
use crate::partition::SbSize;
use crate::tools::ToolOverrides;

use std::fmt;

/// Largest number of frames the temporal filter reads on either side of
/// the filtered picture.
pub const MAX_TF_FRAMES: usize = 3;

/// Encoder settings, frozen into the sequence state when the encoder is
/// created.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct EncoderConfig {
  // picture format
  /// Width of the pictures in luma samples.
  pub width: usize,
  /// Height of the pictures in luma samples.
  pub height: usize,
  /// Bit depth, 8 or 10.
  pub bit_depth: usize,
  /// Superblock side, 64 or 128.
  pub sb_size: usize,

  // encoder configuration
  /// Speed preset.
  pub preset: Preset,
  /// Base quantizer index of every picture.
  pub base_q_idx: u8,
  /// Lowest quantizer index the recode loop may pick.
  pub min_q_idx: u8,
  /// Highest quantizer index the recode loop may pick.
  pub max_q_idx: u8,
  /// Largest number of encode passes over one picture.
  pub max_recode_loops: usize,
  /// Number of worker threads. `0` uses the rayon default.
  pub threads: usize,
  /// Number of tile groups the superblock rows are split into.
  pub tile_groups: usize,
  /// Segment bands per segment row.
  pub segment_cols: usize,
  /// Segment rows per tile group.
  pub segment_rows: usize,
  /// Content is screen content.
  pub screen_content: bool,
  /// Forced tool levels.
  pub tool_overrides: ToolOverrides,

  // temporal filter
  /// Filter alt-ref pictures.
  pub enable_tf: bool,
  /// Past pictures read by the temporal filter, capped by the preset.
  pub tf_past_frames: usize,
  /// Future pictures read by the temporal filter, capped by the preset.
  pub tf_future_frames: usize,
  /// Strength of the temporal filter.
  pub tf_decay_control: u8,

  // output
  /// Compute PSNR of every picture.
  pub compute_psnr: bool,
  /// Compute SSIM of every picture.
  pub compute_ssim: bool,
  /// Export the reconstructed pictures.
  pub enable_recon: bool,
  /// Capacity in bytes of the recon output buffer. `None` sizes it to the
  /// picture.
  pub recon_buffer_size: Option<usize>,
  /// Re-apply film grain on the exported reconstruction.
  pub film_grain: bool,
}

impl Default for EncoderConfig {
  fn default() -> Self {
    Self::with_preset(Preset::default())
  }
}

impl EncoderConfig {
  /// Default settings of a speed preset.
  pub fn with_preset(preset: Preset) -> Self {
    EncoderConfig {
      width: 640,
      height: 480,
      bit_depth: 8,
      sb_size: 64,

      preset,
      base_q_idx: 100,
      min_q_idx: 0,
      max_q_idx: 255,
      max_recode_loops: 4,
      threads: 0,
      tile_groups: 1,
      segment_cols: 4,
      segment_rows: 4,
      screen_content: false,
      tool_overrides: ToolOverrides::default(),

      enable_tf: false,
      tf_past_frames: MAX_TF_FRAMES,
      tf_future_frames: MAX_TF_FRAMES,
      tf_decay_control: 4,

      compute_psnr: false,
      compute_ssim: false,
      enable_recon: true,
      recon_buffer_size: None,
      film_grain: false,
    }
  }

  pub const fn with_size(mut self, width: usize, height: usize) -> Self {
    self.width = width;
    self.height = height;
    self
  }

  pub const fn with_bit_depth(mut self, bit_depth: usize) -> Self {
    self.bit_depth = bit_depth;
    self
  }

  pub const fn with_sb_size(mut self, sb_size: usize) -> Self {
    self.sb_size = sb_size;
    self
  }

  pub const fn with_quantizer(mut self, base_q_idx: u8) -> Self {
    self.base_q_idx = base_q_idx;
    self
  }

  /// Range of quantizer indices the recode loop may pick.
  pub const fn with_q_range(mut self, min: u8, max: u8) -> Self {
    self.min_q_idx = min;
    self.max_q_idx = max;
    self
  }

  pub const fn with_threads(mut self, threads: usize) -> Self {
    self.threads = threads;
    self
  }

  /// Splits every tile group into `rows` x `cols` wavefront segments.
  pub const fn with_segments(mut self, cols: usize, rows: usize) -> Self {
    self.segment_cols = cols;
    self.segment_rows = rows;
    self
  }

  pub const fn with_tile_groups(mut self, tile_groups: usize) -> Self {
    self.tile_groups = tile_groups;
    self
  }

  pub const fn with_max_recode_loops(mut self, loops: usize) -> Self {
    self.max_recode_loops = loops;
    self
  }

  /// Enables the temporal filter with the given window.
  pub const fn with_temporal_filter(
    mut self, past: usize, future: usize, decay_control: u8,
  ) -> Self {
    self.enable_tf = true;
    self.tf_past_frames = past;
    self.tf_future_frames = future;
    self.tf_decay_control = decay_control;
    self
  }

  pub const fn with_metrics(mut self, psnr: bool, ssim: bool) -> Self {
    self.compute_psnr = psnr;
    self.compute_ssim = ssim;
    self
  }

  pub const fn with_recon_buffer_size(mut self, size: Option<usize>) -> Self {
    self.recon_buffer_size = size;
    self
  }

  pub const fn with_film_grain(mut self, film_grain: bool) -> Self {
    self.film_grain = film_grain;
    self
  }

  pub const fn with_tool_overrides(mut self, ovr: ToolOverrides) -> Self {
    self.tool_overrides = ovr;
    self
  }

  /// Superblock size, falling back to 64 for unsupported values.
  pub const fn sb(&self) -> SbSize {
    if self.sb_size == 128 {
      SbSize::Sb128
    } else {
      SbSize::Sb64
    }
  }

  /// Bytes one reconstructed picture takes in the output buffer.
  pub const fn recon_size(&self) -> usize {
    let luma = self.width * self.height;
    let chroma = ((self.width + 1) >> 1) * ((self.height + 1) >> 1);
    let bytes = if self.bit_depth > 8 { 2 } else { 1 };
    (luma + 2 * chroma) * bytes
  }
}

impl fmt::Display for EncoderConfig {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    let pairs = [
      ("size", format!("{}x{}", self.width, self.height)),
      ("bit_depth", self.bit_depth.to_string()),
      ("sb_size", self.sb_size.to_string()),
      ("preset", format!("{:?}", self.preset)),
      ("q", self.base_q_idx.to_string()),
      ("q_range", format!("{}-{}", self.min_q_idx, self.max_q_idx)),
      ("recode_loops", self.max_recode_loops.to_string()),
      ("tile_groups", self.tile_groups.to_string()),
      ("segments", format!("{}x{}", self.segment_cols, self.segment_rows)),
      ("tf", self.enable_tf.to_string()),
      ("film_grain", self.film_grain.to_string()),
    ];
    write!(
      f,
      "{}",
      pairs.iter().map(|pair| format!("{}={}", pair.0, pair.1)).join(" ")
    )
  }
}
