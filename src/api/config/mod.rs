// Copyright (c) 2020-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use thiserror::Error;

use rayon::{ThreadPool, ThreadPoolBuilder};
use std::fmt;
use std::sync::Arc;

use crate::api::{AppCallback, Encoder};

mod encoder;
pub use encoder::*;

mod grain_synth;
pub use grain_synth::*;

mod rate;
pub use rate::*;

/// Enumeration of possible invalid configuration errors.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum InvalidConfig {
  /// The width is invalid.
  #[error("invalid width {0} (expected >= 16, <= 65535)")]
  InvalidWidth(usize),
  /// The height is invalid.
  #[error("invalid height {0} (expected >= 16, <= 65535)")]
  InvalidHeight(usize),
  /// The bit depth is unsupported.
  #[error("invalid bit depth {0} (expected 8 or 10)")]
  InvalidBitDepth(usize),
  /// The superblock size is unsupported.
  #[error("invalid superblock size {0} (expected 64 or 128)")]
  InvalidSuperblockSize(usize),
  /// Segment rows or columns is zero.
  #[error("invalid segment grid {cols}x{rows} (expected > 0)")]
  InvalidSegments {
    /// Segment bands per row.
    cols: usize,
    /// Segment rows per tile group.
    rows: usize,
  },
  /// Tile group count is zero.
  #[error("invalid tile group count {0} (expected > 0)")]
  InvalidTileGroups(usize),
  /// Temporal filter window is too wide.
  #[error("invalid temporal filter frames {actual} (expected <= {max})")]
  InvalidTfFrames {
    /// The actual value.
    actual: usize,
    /// The maximal supported value.
    max: usize,
  },
  /// The quantizer range is empty or excludes the base quantizer.
  #[error("invalid quantizer {base} for range {min}-{max}")]
  InvalidQuantizerRange {
    /// The base quantizer index.
    base: u8,
    /// The smallest quantizer index.
    min: u8,
    /// The largest quantizer index.
    max: u8,
  },
  /// Recode loop count is zero.
  #[error("invalid recode loop count {0} (expected > 0)")]
  InvalidRecodeLoops(usize),
  /// The worker pool could not be started.
  #[error("unable to start {0} worker threads")]
  ThreadPoolUnavailable(usize),
}

/// Contains the encoder configuration.
#[derive(Clone, Default)]
pub struct Config {
  /// Settings of the coded pictures.
  pub(crate) enc: EncoderConfig,
  /// Frame size policy of the recode loop.
  pub(crate) rate_control: Option<Arc<dyn RateControl>>,
  /// Film grain re-applied on recon export.
  pub(crate) grain: Option<Arc<dyn FilmGrainSynth>>,
  /// Receiver of errors raised by the workers.
  pub(crate) callback: Option<Arc<dyn AppCallback>>,
}

impl fmt::Debug for Config {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Config")
      .field("enc", &self.enc)
      .field("rate_control", &self.rate_control)
      .field("grain", &self.grain)
      .field("callback", &self.callback.is_some())
      .finish()
  }
}

impl Config {
  /// Create a default configuration
  ///
  /// same as `Default::default()`
  pub fn new() -> Self {
    Config::default()
  }

  /// Set the encoder configuration
  pub fn with_encoder_config(mut self, enc: EncoderConfig) -> Self {
    self.enc = enc;
    self
  }

  /// Set the rate control policy
  ///
  /// The default accepts every picture on its first encode.
  pub fn with_rate_control(mut self, rc: Arc<dyn RateControl>) -> Self {
    self.rate_control = Some(rc);
    self
  }

  /// Set the film grain synthesis applied on recon export
  pub fn with_film_grain(mut self, grain: Arc<dyn FilmGrainSynth>) -> Self {
    self.grain = Some(grain);
    self
  }

  /// Set the receiver of worker errors
  pub fn with_callback(mut self, callback: Arc<dyn AppCallback>) -> Self {
    self.callback = Some(callback);
    self
  }

  /// Encoder settings.
  pub const fn enc(&self) -> &EncoderConfig {
    &self.enc
  }

  pub(crate) fn new_thread_pool(&self) -> Result<ThreadPool, InvalidConfig> {
    let mut builder = ThreadPoolBuilder::new()
      .thread_name(|i| format!("encdec-{}", i));
    if self.enc.threads != 0 {
      builder = builder.num_threads(self.enc.threads);
    }
    builder
      .build()
      .map_err(|_| InvalidConfig::ThreadPoolUnavailable(self.enc.threads))
  }

  /// Creates an [`Encoder`] with this configuration.
  ///
  /// # Errors
  ///
  /// Returns `InvalidConfig` if the config is invalid.
  pub fn new_encoder(&self) -> Result<Encoder, InvalidConfig> {
    self.validate()?;
    let pool = self.new_thread_pool()?;
    Ok(Encoder::new(self, pool))
  }

  /// Validates the configuration.
  ///
  /// # Errors
  ///
  /// - Returns `InvalidConfig` if the tiling config is invalid.
  pub fn validate(&self) -> Result<(), InvalidConfig> {
    use InvalidConfig::*;

    let config = &self.enc;

    if config.width < 16 || config.width > u16::MAX as usize {
      return Err(InvalidWidth(config.width));
    }
    if config.height < 16 || config.height > u16::MAX as usize {
      return Err(InvalidHeight(config.height));
    }
    if config.bit_depth != 8 && config.bit_depth != 10 {
      return Err(InvalidBitDepth(config.bit_depth));
    }
    if config.sb_size != 64 && config.sb_size != 128 {
      return Err(InvalidSuperblockSize(config.sb_size));
    }
    if config.segment_cols == 0 || config.segment_rows == 0 {
      return Err(InvalidSegments {
        cols: config.segment_cols,
        rows: config.segment_rows,
      });
    }
    if config.tile_groups == 0 {
      return Err(InvalidTileGroups(config.tile_groups));
    }
    let tf_frames = config.tf_past_frames.max(config.tf_future_frames);
    if config.enable_tf && tf_frames > MAX_TF_FRAMES {
      return Err(InvalidTfFrames { actual: tf_frames, max: MAX_TF_FRAMES });
    }
    if config.min_q_idx > config.max_q_idx
      || config.base_q_idx < config.min_q_idx
      || config.base_q_idx > config.max_q_idx
    {
      return Err(InvalidQuantizerRange {
        base: config.base_q_idx,
        min: config.min_q_idx,
        max: config.max_q_idx,
      });
    }
    if config.max_recode_loops == 0 {
      return Err(InvalidRecodeLoops(config.max_recode_loops));
    }
    if let Some((tool, level)) = config.tool_overrides.first_invalid() {
      log::warn!(
        "{:?} level {} is out of range, using {}",
        tool,
        level,
        tool.max_level()
      );
    }

    Ok(())
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use interpolate_name::interpolate_test;

  fn config(enc: EncoderConfig) -> Config {
    Config::new().with_encoder_config(enc)
  }

  #[test]
  fn default_is_valid() {
    assert_eq!(Config::default().validate(), Ok(()));
  }

  #[interpolate_test(tiny, 8, 64, InvalidConfig::InvalidWidth(8))]
  #[interpolate_test(huge, 70000, 64, InvalidConfig::InvalidWidth(70000))]
  #[interpolate_test(short, 64, 4, InvalidConfig::InvalidHeight(4))]
  fn size(width: usize, height: usize, err: InvalidConfig) {
    let enc = EncoderConfig::default().with_size(width, height);
    assert_eq!(config(enc).validate(), Err(err));
  }

  #[test]
  fn rejects_unsupported_formats() {
    let enc = EncoderConfig::default().with_bit_depth(12);
    assert_eq!(config(enc).validate(), Err(InvalidConfig::InvalidBitDepth(12)));
    let enc = EncoderConfig::default().with_sb_size(32);
    assert_eq!(
      config(enc).validate(),
      Err(InvalidConfig::InvalidSuperblockSize(32))
    );
  }

  #[test]
  fn rejects_empty_segment_grids() {
    let enc = EncoderConfig::default().with_segments(0, 2);
    assert_eq!(
      config(enc).validate(),
      Err(InvalidConfig::InvalidSegments { cols: 0, rows: 2 })
    );
    let enc = EncoderConfig::default().with_tile_groups(0);
    assert_eq!(config(enc).validate(), Err(InvalidConfig::InvalidTileGroups(0)));
  }

  #[test]
  fn rejects_wide_tf_windows() {
    let enc = EncoderConfig::default().with_temporal_filter(4, 1, 4);
    assert_eq!(
      config(enc).validate(),
      Err(InvalidConfig::InvalidTfFrames { actual: 4, max: MAX_TF_FRAMES })
    );
  }

  #[test]
  fn rejects_base_q_outside_range() {
    let enc = EncoderConfig::default().with_quantizer(20).with_q_range(40, 200);
    assert_eq!(
      config(enc).validate(),
      Err(InvalidConfig::InvalidQuantizerRange { base: 20, min: 40, max: 200 })
    );
  }
}
