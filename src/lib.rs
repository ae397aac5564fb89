// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! The Enc-Dec and temporal filter core of an AV1 encoder.
//!
//! Pictures are coded superblock by superblock by a pool of workers that
//! share a segment wavefront. Each superblock goes through three partition
//! decision passes of increasing precision, then mode decision and the
//! final encode. A picture whose projected size misses the rate control
//! bounds is recoded at a new quantizer. Alt-ref pictures are denoised with
//! a motion compensated temporal filter before coding.
//!
//! # Basic usage
//!
//! ```no_run
//! use av1_encdec::prelude::*;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let enc = EncoderConfig::with_preset(Preset::M8).with_size(64, 64);
//! let mut encoder = Config::new().with_encoder_config(enc).new_encoder()?;
//! let picture = Picture::new(64, 64, 8, 16);
//! let out = encoder.encode(PictureInput::intra(picture).with_end_of_stream())?;
//! println!("{}", out);
//! # Ok(())
//! # }
//! ```

#![deny(bare_trait_objects)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_ptr_alignment)]
#![allow(clippy::cognitive_complexity)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::verbose_bit_mask)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::wrong_self_convention)]
#![warn(clippy::expl_impl_clone_on_copy)]
#![warn(clippy::linkedlist)]
#![warn(clippy::map_flatten)]
#![warn(clippy::mem_forget)]
#![warn(clippy::mut_mut)]
#![warn(clippy::mutex_integer)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_continue)]
#![warn(clippy::path_buf_push_overwrite)]
#![warn(clippy::range_plus_one)]

pub mod analysis;
pub mod context;
pub mod frame;
pub mod levels;
pub mod mc;
pub mod md;
pub mod me;
pub mod metrics;
pub mod palette;
pub mod partition;
pub mod pd;
pub mod predict;
pub mod quantize;
pub mod rdo;
pub mod residual;
pub mod segments;
pub mod temporal_filter;
pub mod tools;
pub mod transform;
pub mod util;

mod api;
mod encode;

pub use crate::api::*;
pub use crate::encode::{RefHandle, RefPool, SbCodingStats};
pub use crate::frame::{Frame, Picture, Plane};
pub use crate::levels::{Preset, SliceType};

/// Commonly used types and traits.
pub mod prelude {
  pub use crate::api::*;
  pub use crate::frame::{Frame, Picture, Plane};
  pub use crate::levels::{Preset, SliceType};
  pub use crate::tools::{Tool, ToolOverrides};
  pub use crate::util::Pixel;
}
