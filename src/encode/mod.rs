// Copyright (c) 2018-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! The Enc-Dec stage: superblock coding, the recode loop and publication
//! of the reconstructed pictures.

mod picture;
mod recode;
mod recon;
mod reference;
mod sb;
mod worker;

pub use reference::{RefHandle, RefPool};
pub use sb::SbCodingStats;

pub(crate) use picture::{PictureControlSet, PictureDone, PictureParams};
pub(crate) use worker::{WorkerMessage, Workers};

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use crate::api::{
  AppCallback, Config, ConstantQuantizer, EncoderConfig, FilmGrainSynth,
  RateControl,
};
use crate::context::SbGrid;
use crate::levels::{PdPass, ResolutionClass, SliceType};
use crate::partition::PictureBounds;
use crate::tools::{derive_picture_tools, PictureToolConfig, ToolInput};
use crate::util::Fixed;

/// Luma padding of reconstructed and source frames: one 128x128 superblock
/// worth of motion plus the interpolation margin.
pub const LUMA_PADDING: usize = 64 + 24;

/// State shared by every picture of the sequence.
pub(crate) struct Sequence {
  pub config: EncoderConfig,
  pub grid: SbGrid,
  /// Dimensions aligned to 8.
  pub bounds: PictureBounds,
  pub resolution: ResolutionClass,
  pub rate_control: Arc<dyn RateControl>,
  pub grain: Option<Arc<dyn FilmGrainSynth>>,
  pub callback: Option<Arc<dyn AppCallback>>,
  /// Pictures published so far.
  pub total_recon_frames: AtomicU64,
}

impl Sequence {
  pub fn new(config: &Config) -> Self {
    let enc = config.enc;
    let bounds = PictureBounds {
      width: enc.width.align_power_of_two(3),
      height: enc.height.align_power_of_two(3),
    };
    Sequence {
      grid: SbGrid::new(bounds.width, bounds.height, enc.sb()),
      bounds,
      resolution: ResolutionClass::from_dimensions(enc.width, enc.height),
      rate_control: config
        .rate_control
        .clone()
        .unwrap_or_else(|| Arc::new(ConstantQuantizer)),
      grain: config.grain.clone(),
      callback: config.callback.clone(),
      total_recon_frames: AtomicU64::new(0),
      config: enc,
    }
  }

  /// Picture-level inputs of the tool configurator.
  pub fn picture_input(
    &self, slice_type: SliceType, temporal_layer: u8,
  ) -> ToolInput {
    let cfg = &self.config;
    let sb = self.grid.sb_size.size();
    ToolInput {
      preset: cfg.preset,
      pd_pass: PdPass::Pd2,
      slice_type,
      temporal_layer,
      resolution: self.resolution,
      screen_content: cfg.screen_content,
      sb_size: self.grid.sb_size,
      bit_depth: cfg.bit_depth,
      sb_width: sb,
      sb_height: sb,
    }
  }

  pub fn picture_tools(
    &self, slice_type: SliceType, temporal_layer: u8,
  ) -> PictureToolConfig {
    derive_picture_tools(
      &self.picture_input(slice_type, temporal_layer),
      &self.config.tool_overrides,
      self.config.enable_tf,
      self.config.film_grain,
    )
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::levels::Preset;

  #[test]
  fn sequence_aligns_the_grid() {
    let enc = EncoderConfig::with_preset(Preset::M5).with_size(100, 70);
    let seq = Sequence::new(&Config::new().with_encoder_config(enc));
    assert_eq!((seq.bounds.width, seq.bounds.height), (104, 72));
    assert_eq!((seq.grid.cols, seq.grid.rows), (2, 2));
    assert_eq!(seq.resolution, ResolutionClass::Res240p);
  }

  #[test]
  fn temporal_filter_follows_the_config() {
    let enc = EncoderConfig::with_preset(Preset::M5).with_size(64, 64);
    let seq = Sequence::new(&Config::new().with_encoder_config(enc));
    assert!(!seq.picture_tools(SliceType::B, 0).tf.enabled);
  }
}
