// Copyright (c) 2022-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::frame::Frame;

use std::fmt;

/// Film grain applied to the exported reconstruction.
pub trait FilmGrainSynth: fmt::Debug + Send + Sync {
  /// Adds grain to `recon` in place. Chroma is left untouched unless
  /// `apply_chroma` is set.
  fn apply(
    &self, picture_number: u64, recon: &mut Frame<u16>, bit_depth: usize,
    apply_chroma: bool,
  );
}

/// Leaves the reconstruction as coded.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoGrain;

impl FilmGrainSynth for NoGrain {
  fn apply(&self, _: u64, _: &mut Frame<u16>, _: usize, _: bool) {}
}
