// Copyright (c) 2018-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Enumerations the tool configurator is keyed on.

use arg_enum_proc_macro::ArgEnum;
use num_derive::FromPrimitive;

/// Encoder speed preset, from slowest (`MRS`) to fastest (`M10`).
#[derive(
  ArgEnum, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
  FromPrimitive,
)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Preset {
  MRS,
  MR,
  M0,
  M1,
  M2,
  M3,
  M4,
  M5,
  M6,
  M7,
  M8,
  M9,
  M10,
}

impl Default for Preset {
  fn default() -> Self {
    Preset::M5
  }
}

impl Preset {
  pub const COUNT: usize = 13;

  #[inline]
  pub const fn index(self) -> usize {
    self as usize
  }
}

#[derive(
  ArgEnum, Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash,
  FromPrimitive,
)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum SliceType {
  I,
  P,
  B,
}

impl SliceType {
  #[inline]
  pub const fn is_intra(self) -> bool {
    matches!(self, SliceType::I)
  }

  #[inline]
  pub const fn index(self) -> usize {
    self as usize
  }
}

/// Partition-decision pass.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive)]
pub enum PdPass {
  Pd0,
  Pd1,
  Pd2,
}

impl PdPass {
  pub const ALL: [PdPass; 3] = [PdPass::Pd0, PdPass::Pd1, PdPass::Pd2];

  #[inline]
  pub const fn index(self) -> usize {
    self as usize
  }

  #[inline]
  pub const fn is_final(self) -> bool {
    matches!(self, PdPass::Pd2)
  }
}

/// Coarse picture-size bucket.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, FromPrimitive)]
pub enum ResolutionClass {
  Res240p,
  Res480p,
  Res720p,
  Res1080p,
  Res4k,
}

impl ResolutionClass {
  pub fn from_dimensions(width: usize, height: usize) -> Self {
    match width * height {
      a if a <= 426 * 240 => ResolutionClass::Res240p,
      a if a <= 854 * 480 => ResolutionClass::Res480p,
      a if a <= 1280 * 720 => ResolutionClass::Res720p,
      a if a <= 1920 * 1080 => ResolutionClass::Res1080p,
      _ => ResolutionClass::Res4k,
    }
  }

  #[inline]
  pub const fn index(self) -> usize {
    self as usize
  }
}

/// Chroma search mode.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, FromPrimitive)]
pub enum ChromaMode {
  /// Full chroma search per candidate.
  Mode0 = 0,
  /// Chroma search for the best candidates only.
  Mode1 = 1,
  /// Chroma derived from luma; skip decision on luma only.
  Mode2 = 2,
  /// No chroma search.
  Mode3 = 3,
}
