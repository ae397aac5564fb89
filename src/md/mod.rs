// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Mode decision of one block.
//!
//! Candidates go through up to four stages, each keeping a per-class number
//! of candidates (NIC) and pruning classes that fall too far behind the
//! best. The stage configuration comes from the partition pass's
//! [`SbToolConfig`].

mod candidates;
mod inter;
mod stages;

pub use inter::*;
pub(crate) use candidates::candidate_rate;
pub(crate) use stages::tx_params;

use std::sync::Arc;

use crate::analysis::MvGrid;
use crate::context::ModeNeighbors;
use crate::frame::Frame;
use crate::levels::{ChromaMode, SliceType};
use crate::mc::{InterpFilters, MotionVector};
use crate::me::BlockRect;
use crate::palette::Palette;
use crate::partition::{BlockGeom, PictureBounds};
use crate::predict::*;
use crate::rdo::{FrameContext, RdCost};
use crate::tools::SbToolConfig;
use crate::transform::TxType;

/// Candidate classes, indexing the NIC tables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CandClass {
  Intra = 0,
  NewMv = 1,
  PredMv = 2,
  Palette = 3,
}

/// One prediction to evaluate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Candidate {
  pub class: CandClass,
  pub mode: PredictionMode,
  pub ref_idx: usize,
  pub mv: MotionVector,
  /// Predictor the vector is coded against.
  pub pmv: MotionVector,
  pub filters: InterpFilters,
  pub palette: Option<Palette>,
  /// Intra mode blended into the inter prediction.
  pub inter_intra: Option<PredictionMode>,
  pub obmc: bool,
}

impl Candidate {
  pub fn intra(mode: PredictionMode) -> Self {
    Candidate {
      class: CandClass::Intra,
      mode,
      ref_idx: 0,
      mv: MotionVector::default(),
      pmv: MotionVector::default(),
      filters: InterpFilters::REGULAR,
      palette: None,
      inter_intra: None,
      obmc: false,
    }
  }

  pub fn inter(
    class: CandClass, mode: PredictionMode, ref_idx: usize, mv: MotionVector,
  ) -> Self {
    Candidate { class, mode, ref_idx, mv, pmv: mv, ..Candidate::intra(mode) }
  }
}

/// The outcome of mode decision for one block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockDecision {
  pub cand: Candidate,
  pub tx_type: TxType,
  /// No residual was coded.
  pub skip: bool,
  /// Chroma skip follows the luma decision in the encode pass.
  pub chroma_skip_from_luma: bool,
  /// End of block positions summed over luma and chroma.
  pub nonzero: u32,
  pub cost: RdCost,
}

/// Picture and superblock state mode decision reads.
pub struct MdContext<'a> {
  /// Luma origin of the superblock.
  pub sb_x: usize,
  pub sb_y: usize,
  pub geom: &'static [BlockGeom],
  pub bounds: PictureBounds,
  pub source: &'a Frame<u16>,
  pub refs: &'a [Arc<Frame<u16>>],
  pub mv_grid: &'a MvGrid,
  pub qindex: u8,
  pub bit_depth: usize,
  pub lambda: f64,
  pub slice_type: SliceType,
  /// Entropy context snapshot of the superblock.
  pub fc: &'a FrameContext,
  pub modes: &'a ModeNeighbors,
  /// First luma row of the tile the superblock belongs to.
  pub tile_y: usize,
}

impl MdContext<'_> {
  pub fn inputs(&self) -> PredictionInputs<'_> {
    PredictionInputs {
      source: self.source,
      refs: self.refs,
      mv_grid: self.mv_grid,
      bit_depth: self.bit_depth,
    }
  }

  /// Skip context: from the coded neighbors on the superblock's top and
  /// left edges, and assumed mixed inside it.
  pub fn skip_ctx(&self, blk: &BlockRect) -> usize {
    if blk.x == self.sb_x || blk.y == self.sb_y {
      self.modes.skip_ctx(blk.x, blk.y - self.tile_y)
    } else {
      1
    }
  }
}

/// Runs mode decision on the block `mds` of the superblock. Returns `None`
/// when no prediction is possible for the block.
pub fn mode_decision(
  ctx: &MdContext, tools: &SbToolConfig, mds: usize,
) -> Option<BlockDecision> {
  let g = &ctx.geom[mds];
  let blk = BlockRect::new(
    ctx.sb_x + g.origin_x,
    ctx.sb_y + g.origin_y,
    g.bwidth,
    g.bheight,
  );
  let cands = candidates::generate(ctx, tools, g, &blk);
  if cands.is_empty() {
    return None;
  }

  let mut scored = stages::fast_stage(ctx, tools, &blk, cands);
  scored = stages::select(scored, 0, tools);
  if !tools.mds.bypass_mds1 {
    stages::sse_stage(ctx, &blk, &mut scored);
    scored = stages::select(scored, 1, tools);
  }
  stages::expand_variants(ctx, tools, &blk, &mut scored);

  let ran_mds2 = !tools.mds.bypass_mds2;
  if ran_mds2 {
    for s in scored.iter_mut() {
      stages::full_loop(ctx, tools, g, &blk, s, false);
    }
    scored = stages::select(scored, 2, tools);
  }

  // MDS3
  let best_class = scored.iter().min_by_key(|s| s.cost)?.cand.class;
  for s in scored.iter_mut() {
    let reduce = ran_mds2
      && tools.mds.reduce_last_md_stage_candidate
      && s.cand.class != best_class;
    if !reduce {
      stages::full_loop(ctx, tools, g, &blk, s, true);
    }
  }
  let mut best = scored.into_iter().min_by_key(|s| s.cost)?;
  let mut full = best.full?;

  let chroma_for_best =
    matches!(tools.chroma.chroma_level, ChromaMode::Mode1 | ChromaMode::Mode2);
  if chroma_for_best && g.has_uv && full.chroma.is_none() {
    full.chroma = Some(stages::chroma_loop(ctx, tools, g, &best.cand));
  }
  let (cost, skip) = stages::full_cost(ctx, tools, &blk, best.rate, &full);
  best.cost = cost;

  Some(BlockDecision {
    cand: best.cand,
    tx_type: full.tx_type,
    skip,
    chroma_skip_from_luma: tools.chroma.blk_skip_decision,
    nonzero: full.luma.nonzero + full.chroma.map_or(0, |c| c.nonzero),
    cost: best.cost,
  })
}
