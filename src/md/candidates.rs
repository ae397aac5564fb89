// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use arrayvec::ArrayVec;

use super::*;
use crate::levels::PdPass;
use crate::me::*;
use crate::palette::*;
use crate::partition::{BlockGeom, PartitionType};
use crate::rdo::mv_rate;

/// References searched per pass.
const MAX_REFS: usize = 2;

/// Lambda of the fullpel searches, weighting bits against `256 * sad`.
fn me_lambda(lambda: f64) -> u32 {
  (lambda.sqrt() * 256.).round() as u32
}

/// Spatial vector predictor: the left neighbor's, else the above one's.
fn nearest_mv(ctx: &MdContext, blk: &BlockRect, size: usize) -> MotionVector {
  if blk.x > 0 {
    ctx.mv_grid.get(blk.x - 1, blk.y, size)
  } else if blk.y > 0 {
    ctx.mv_grid.get(blk.x, blk.y - 1, size)
  } else {
    MotionVector::default()
  }
}

fn subpel_params(tools: &SbToolConfig) -> SubpelParams {
  SubpelParams {
    half_pel_mode: tools.subpel.half_pel_mode,
    quarter_pel: tools.subpel.quarter_pel,
    eighth_pel: tools.subpel.eighth_pel,
  }
}

fn push_unique(out: &mut Vec<Candidate>, cand: Candidate) {
  let dup = out.iter().any(|c| {
    !c.mode.is_intra() && c.ref_idx == cand.ref_idx && c.mv == cand.mv
  });
  if !dup {
    out.push(cand);
  }
}

fn inter_candidates(
  ctx: &MdContext, tools: &SbToolConfig, g: &BlockGeom, blk: &BlockRect,
  out: &mut Vec<Candidate>,
) {
  if ctx.slice_type.is_intra() || ctx.refs.is_empty() {
    return;
  }
  let org = &ctx.source.planes[0];
  let max_refs = if tools.pd_pass == PdPass::Pd0 { 1 } else { MAX_REFS };
  let nearest = nearest_mv(ctx, blk, g.sq_size);
  let me_mv = ctx.mv_grid.get(blk.x, blk.y, g.sq_size);
  let lambda = me_lambda(ctx.lambda);
  let search = if g.shape == PartitionType::PARTITION_NONE {
    tools.sq_motion_search
  } else {
    tools.nsq_motion_search
  };

  for (ref_idx, reference) in ctx.refs.iter().enumerate().take(max_refs) {
    let rf = &reference.planes[0];

    let mut pred_mvs: ArrayVec<(PredictionMode, MotionVector), 2> =
      ArrayVec::new();
    pred_mvs.push((PredictionMode::GLOBALMV, MotionVector::default()));
    if !nearest.is_zero() {
      pred_mvs.push((PredictionMode::NEARESTMV, nearest));
    }
    for &(mode, mv) in &pred_mvs {
      push_unique(
        out,
        Candidate::inter(CandClass::PredMv, mode, ref_idx, mv),
      );
    }

    let mut new_mv = me_mv;
    if search.enabled {
      let r = if search.diamond {
        diamond_search(org, rf, blk, &[me_mv, nearest], nearest, lambda)
      } else {
        full_search(
          org,
          rf,
          blk,
          me_mv,
          search.search_width,
          search.search_height,
          nearest,
          lambda,
        )
      };
      new_mv = r.mv;
    }
    if tools.subpel.enabled {
      new_mv = subpel_search(
        org,
        rf,
        blk,
        new_mv,
        subpel_params(tools),
        InterpFilters::REGULAR,
        ctx.bit_depth,
        DistMetric::Sad,
      )
      .0;
    }
    push_unique(
      out,
      Candidate {
        pmv: nearest,
        ..Candidate::inter(CandClass::NewMv, PredictionMode::NEWMV, ref_idx, new_mv)
      },
    );

    if tools.pme.enabled {
      for &(_, p) in &pred_mvs {
        if tools.pme.early_check && p.quantize_to_fullpel() == me_mv {
          continue;
        }
        let r = full_search(
          org,
          rf,
          blk,
          p,
          tools.pme.full_pel_search_width,
          tools.pme.full_pel_search_height,
          nearest,
          lambda,
        );
        let mut mv = r.mv;
        if tools.subpel.enabled {
          mv = subpel_search(
            org,
            rf,
            blk,
            mv,
            subpel_params(tools),
            InterpFilters::REGULAR,
            ctx.bit_depth,
            DistMetric::Sad,
          )
          .0;
        }
        push_unique(
          out,
          Candidate {
            pmv: nearest,
            ..Candidate::inter(CandClass::NewMv, PredictionMode::NEWMV, ref_idx, mv)
          },
        );
      }
    }
  }
}

/// Every candidate the tools allow for the block `g` at `blk`.
pub(crate) fn generate(
  ctx: &MdContext, tools: &SbToolConfig, g: &BlockGeom, blk: &BlockRect,
) -> Vec<Candidate> {
  let mut out = Vec::new();

  if blk.w <= MAX_INTRA_SIZE && blk.h <= MAX_INTRA_SIZE {
    let level = if tools.intra.enabled { tools.intra.mode_level } else { 0 };
    for &mode in INTRA_MODES_BY_LEVEL[level.min(3)] {
      out.push(Candidate::intra(mode));
    }

    let p = &tools.palette;
    if p.enabled
      && blk.w.max(blk.h) <= p.max_blk_size
      && blk.w.min(blk.h) >= 8
    {
      let src = &ctx.source.planes[0];
      let start = src.row_range(blk.x as isize, blk.y as isize).start;
      let colors = palette_colors(
        &src.data[start..],
        src.cfg.stride,
        blk.w,
        blk.h,
        p.max_colors,
      );
      if colors.len() >= 2 {
        out.push(Candidate {
          class: CandClass::Palette,
          palette: Some(colors),
          ..Candidate::intra(PredictionMode::DC_PRED)
        });
      }
    }
  }

  inter_candidates(ctx, tools, g, blk, &mut out);
  out
}

/// Signaling rate of a candidate's prediction in 1/512 bits, excluding the
/// residual, transform type and skip flag.
pub(crate) fn candidate_rate(
  ctx: &MdContext, tools: &SbToolConfig, blk: &BlockRect, cand: &Candidate,
) -> u32 {
  let fc = ctx.fc;
  let mut rate = fc.mode_cost(cand.mode, !ctx.slice_type.is_intra());
  if cand.mode.is_intra() {
    if let Some(palette) = &cand.palette {
      rate += fc.palette.cost(1)
        + palette_rate(palette, blk.w * blk.h, ctx.bit_depth);
    }
    return rate;
  }
  if ctx.refs.len() > 1 {
    rate += fc.ref_frame.cost(cand.ref_idx);
  }
  if cand.mode == PredictionMode::NEWMV {
    rate += mv_rate(cand.mv - cand.pmv);
  }
  if tools.ifs.enabled && !cand.mv.is_fullpel() {
    rate += fc.interp_filter.cost(cand.filters.x as usize);
    if tools.ifs.dual_filter {
      rate += fc.interp_filter.cost(cand.filters.y as usize);
    }
  }
  if tools.obmc.enabled
    && blk.w.max(blk.h) <= tools.obmc.max_blk_size
    && obmc_possible(blk.x, blk.y)
  {
    rate += fc.obmc.cost(cand.obmc as usize);
  }
  if let Some(mode) = cand.inter_intra {
    rate += fc.inter_intra.cost(1) + fc.intra_mode.cost(mode.index());
  }
  rate
}
