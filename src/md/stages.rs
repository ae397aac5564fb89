// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! The mode decision stages. MDS0 ranks candidates by SATD, MDS1 by SSE,
//! MDS2 runs a luma full loop and MDS3 the full loop with transform type
//! search, RDOQ and chroma.

use arrayvec::ArrayVec;

use super::candidates::candidate_rate;
use super::*;
use crate::levels::ChromaMode;
use crate::me::{block_error, BlockRect, DistMetric};
use crate::partition::BlockGeom;
use crate::rdo::{rd_cost, RdCost};
use crate::residual::*;
use crate::tools::{CAND_CLASS_TOTAL, RDOQ_CTRLS};
use crate::transform::{satd, TxType};
use crate::util::deviation_pct;

#[derive(Clone, Copy, Debug)]
pub(crate) struct FullLoop {
  pub tx_type: TxType,
  /// Rate of signaling the transform type.
  pub tx_rate: u32,
  pub luma: ResidualResult,
  pub chroma: Option<ResidualResult>,
}

static SINGLE_FILTERS: [InterpFilters; 3] =
  [InterpFilters::REGULAR, InterpFilters::SMOOTH, InterpFilters::SHARP];

/// A candidate with its luma prediction and latest stage cost.
#[derive(Clone, Debug)]
pub(crate) struct Scored {
  pub cand: Candidate,
  pub pred: Vec<u16>,
  pub rate: u32,
  pub sad: u64,
  pub cost: RdCost,
  pub full: Option<FullLoop>,
}

fn luma_prediction(ctx: &MdContext, blk: &BlockRect, cand: &Candidate) -> Vec<u16> {
  let mut pred = vec![0u16; blk.w * blk.h];
  predict_candidate(
    &ctx.inputs(),
    &EdgeSource::Plane(&ctx.source.planes[0]),
    cand,
    0,
    blk.x,
    blk.y,
    blk.w,
    blk.h,
    &mut pred,
  );
  pred
}

fn sse_cost(ctx: &MdContext, blk: &BlockRect, pred: &[u16], rate: u32) -> RdCost {
  let d = block_error(&ctx.source.planes[0], blk, pred, blk.w, DistMetric::Sse);
  rd_cost(d, rate, ctx.lambda)
}

/// MDS0: SATD of the prediction error plus the signaling rate weighted by
/// the square root of lambda. Also drops candidates the elimination
/// controls rule out.
pub(crate) fn fast_stage(
  ctx: &MdContext, tools: &SbToolConfig, blk: &BlockRect,
  cands: Vec<Candidate>,
) -> Vec<Scored> {
  let src = &ctx.source.planes[0];
  let fast_lambda = ctx.lambda.sqrt();
  let mut residual = vec![0i16; blk.w * blk.h];
  let mut scored: Vec<Scored> = cands
    .into_iter()
    .map(|cand| {
      let pred = luma_prediction(ctx, blk, &cand);
      for r in 0..blk.h {
        let s = &src.row((blk.y + r) as isize)[blk.x..blk.x + blk.w];
        for c in 0..blk.w {
          residual[r * blk.w + c] = (s[c] as i32 - pred[r * blk.w + c] as i32) as i16;
        }
      }
      let sad = residual.iter().map(|&d| d.unsigned_abs() as u64).sum();
      let rate = candidate_rate(ctx, tools, blk, &cand);
      let cost = rd_cost(satd(&residual, blk.w, blk.w, blk.h), rate, fast_lambda);
      Scored { cand, pred, rate, sad, cost, full: None }
    })
    .collect();

  let ce = &tools.cand_elimination;
  if ce.enabled {
    let best_pred_mv = scored
      .iter()
      .filter(|s| s.cand.class == CandClass::PredMv)
      .map(|s| s.sad)
      .min();
    if let Some(b) = best_pred_mv {
      scored.retain(|s| {
        s.cand.class != CandClass::NewMv || deviation_pct(s.sad, b) <= ce.th
      });
    }
    if ce.dc_only {
      let best_inter =
        scored.iter().filter(|s| !s.cand.mode.is_intra()).map(|s| s.sad).min();
      let dc = scored
        .iter()
        .find(|s| s.cand.mode == PredictionMode::DC_PRED && s.cand.palette.is_none())
        .map(|s| s.sad);
      if let (Some(inter), Some(dc)) = (best_inter, dc) {
        if deviation_pct(dc, inter) > ce.th {
          scored.retain(|s| {
            s.cand.class != CandClass::Intra
              || s.cand.mode == PredictionMode::DC_PRED
          });
        }
      }
    }
  }
  scored
}

/// Keeps the best candidates of every class after stage `stage` and prunes
/// classes and candidates too far from the best for the next one.
pub(crate) fn select(
  mut scored: Vec<Scored>, stage: usize, tools: &SbToolConfig,
) -> Vec<Scored> {
  scored.sort_by_key(|s| s.cost);
  let mut kept = [0usize; CAND_CLASS_TOTAL];
  scored.retain(|s| {
    let c = s.cand.class as usize;
    kept[c] += 1;
    kept[c] <= tools.nic_scaling.nic(stage, c)
  });

  let p = &tools.nic_pruning;
  let (class_th, cand_th) = match stage {
    0 => (p.mds1_class_th, p.mds1_cand_base_th),
    1 => (p.mds2_class_th, p.mds2_cand_base_th),
    _ => (p.mds3_class_th, p.mds3_cand_base_th),
  };
  let best = match scored.first() {
    Some(s) => s.cost,
    None => return scored,
  };
  let mut class_best = [None; CAND_CLASS_TOTAL];
  for s in &scored {
    class_best[s.cand.class as usize].get_or_insert(s.cost);
  }
  scored.retain(|s| {
    let cb = class_best[s.cand.class as usize].unwrap_or(best);
    deviation_pct(cb, best) <= class_th && deviation_pct(s.cost, cb) <= cand_th
  });
  scored
}

/// MDS1: prediction SSE.
pub(crate) fn sse_stage(ctx: &MdContext, blk: &BlockRect, scored: &mut [Scored]) {
  for s in scored.iter_mut() {
    s.cost = sse_cost(ctx, blk, &s.pred, s.rate);
  }
}

/// Interpolation filter search, OBMC and inter-intra variants of the
/// surviving inter candidates, judged on prediction SSE.
pub(crate) fn expand_variants(
  ctx: &MdContext, tools: &SbToolConfig, blk: &BlockRect,
  scored: &mut Vec<Scored>,
) {
  let mut extra = Vec::new();
  for s in scored.iter_mut() {
    if s.cand.mode.is_intra() {
      continue;
    }
    let mut base_cost = sse_cost(ctx, blk, &s.pred, s.rate);

    let ifs = &tools.ifs;
    if ifs.enabled && !(ifs.skip_fullpel && s.cand.mv.is_fullpel()) {
      let options: &[InterpFilters] = if ifs.dual_filter {
        &InterpFilters::DUAL
      } else {
        &SINGLE_FILTERS
      };
      for &filters in options {
        if filters == s.cand.filters {
          continue;
        }
        let cand = Candidate { filters, ..s.cand.clone() };
        let pred = luma_prediction(ctx, blk, &cand);
        let rate = candidate_rate(ctx, tools, blk, &cand);
        let cost = sse_cost(ctx, blk, &pred, rate);
        if cost < base_cost {
          base_cost = cost;
          s.cand = cand;
          s.pred = pred;
          s.rate = rate;
        }
      }
    }
    s.cost = s.cost.min(base_cost);

    let obmc = &tools.obmc;
    if obmc.enabled
      && blk.w.max(blk.h) <= obmc.max_blk_size
      && obmc_possible(blk.x, blk.y)
    {
      let cand = Candidate { obmc: true, ..s.cand.clone() };
      let pred = luma_prediction(ctx, blk, &cand);
      let rate = candidate_rate(ctx, tools, blk, &cand);
      let cost = sse_cost(ctx, blk, &pred, rate);
      if cost < base_cost {
        extra.push(Scored { cand, pred, rate, sad: s.sad, cost, full: None });
      }
    }

    let ii = &tools.inter_intra;
    if ii.enabled && blk.w.max(blk.h) <= ii.max_blk_size {
      let mut best: Option<Scored> = None;
      for &mode in INTRA_MODES_BY_LEVEL[ii.intra_mode_level.min(3)] {
        let cand = Candidate { inter_intra: Some(mode), ..s.cand.clone() };
        let pred = luma_prediction(ctx, blk, &cand);
        let rate = candidate_rate(ctx, tools, blk, &cand);
        let cost = sse_cost(ctx, blk, &pred, rate);
        if cost < base_cost && best.as_ref().map_or(true, |b| cost < b.cost) {
          best = Some(Scored { cand, pred, rate, sad: s.sad, cost, full: None });
        }
      }
      extra.extend(best);
    }
  }
  scored.extend(extra);
}

pub(crate) fn tx_params<'a>(
  ctx: &'a MdContext, tools: &SbToolConfig, tx_type: TxType, rdoq: bool,
  is_intra: bool,
) -> TxParams<'a> {
  TxParams {
    qindex: ctx.qindex,
    is_intra,
    bit_depth: ctx.bit_depth,
    lambda: ctx.lambda,
    tx_type,
    tx_side: 32,
    rdoq: if rdoq { tools.rdoq } else { RDOQ_CTRLS[0] },
    spatial_sse: tools.spatial_sse.spatial_sse_full_loop,
    fc: ctx.fc,
  }
}

/// Chroma full loop of a candidate over the block's chroma rectangle.
pub(crate) fn chroma_loop(
  ctx: &MdContext, tools: &SbToolConfig, g: &BlockGeom, cand: &Candidate,
) -> ResidualResult {
  let (cx, cy, cw, ch) = g.chroma_rect();
  let (x, y) = ((ctx.sb_x >> 1) + cx, (ctx.sb_y >> 1) + cy);
  let is_intra = cand.mode.is_intra();
  let params = tx_params(
    ctx,
    tools,
    TxType::WHT_WHT,
    tools.rdoq.enabled && !tools.rdoq.skip_uv,
    is_intra,
  );
  let mut pred = vec![0u16; cw * ch];
  let mut total = ResidualResult::default();
  for p in 1..3 {
    let plane = &ctx.source.planes[p];
    predict_candidate(
      &ctx.inputs(),
      &EdgeSource::Plane(plane),
      cand,
      p,
      x,
      y,
      cw,
      ch,
      &mut pred,
    );
    let r = code_residual(plane, x, y, &pred, cw, ch, &params, None, None);
    total.distortion += r.distortion;
    total.skip_distortion += r.skip_distortion;
    total.rate += r.rate;
    total.nonzero += r.nonzero;
  }
  total
}

/// Cost of a candidate after a full loop, with the skip flag decided from
/// the coded coefficients.
pub(crate) fn full_cost(
  ctx: &MdContext, tools: &SbToolConfig, blk: &BlockRect, rate: u32,
  full: &FullLoop,
) -> (RdCost, bool) {
  let chroma = full.chroma.unwrap_or_default();
  let skip = full.luma.nonzero == 0
    && (chroma.nonzero == 0 || tools.chroma.blk_skip_decision);
  let skip_ctx = ctx.skip_ctx(blk);
  let (dist, rate) = if skip {
    (
      full.luma.skip_distortion + chroma.skip_distortion,
      rate + ctx.fc.skip_cost(skip_ctx, true),
    )
  } else {
    (
      full.luma.distortion + chroma.distortion,
      rate
        + ctx.fc.skip_cost(skip_ctx, false)
        + full.tx_rate
        + full.luma.rate
        + chroma.rate,
    )
  };
  (rd_cost(dist, rate, ctx.lambda), skip)
}

/// Luma full loop of a candidate. The last stage searches the transform
/// types, applies RDOQ and, in chroma mode 0, adds chroma.
pub(crate) fn full_loop(
  ctx: &MdContext, tools: &SbToolConfig, g: &BlockGeom, blk: &BlockRect,
  s: &mut Scored, last: bool,
) {
  let is_intra = s.cand.mode.is_intra();
  let txt = &tools.txt;
  let tx_side = tx_side_for(blk.w, blk.h, 32);
  let mut types: ArrayVec<TxType, 2> = ArrayVec::new();
  types.push(TxType::WHT_WHT);
  let search = last
    && txt.enabled
    && (is_intra || txt.inter_enabled)
    && tx_side <= txt.max_tx_side;
  if search {
    types.push(TxType::IDTX);
  }

  let src = &ctx.source.planes[0];
  let mut best: Option<(FullLoop, RdCost)> = None;
  for (i, &tx_type) in types.iter().enumerate() {
    let params = tx_params(ctx, tools, tx_type, last && tools.rdoq.enabled, is_intra);
    let luma =
      code_residual(src, blk.x, blk.y, &s.pred, blk.w, blk.h, &params, None, None);
    let tx_rate = if search { ctx.fc.tx_type.cost(tx_type.index()) } else { 0 };
    let cost = rd_cost(luma.distortion, luma.rate + tx_rate, ctx.lambda);
    if best.as_ref().map_or(true, |b| cost < b.1) {
      best = Some((FullLoop { tx_type, tx_rate, luma, chroma: None }, cost));
    }
    if i == 0 && luma.nonzero < txt.txt_exit_based_on_non_coeff_th as u32 {
      break;
    }
  }

  if let Some((mut full, _)) = best {
    if last && g.has_uv && tools.chroma.chroma_level == ChromaMode::Mode0 {
      full.chroma = Some(chroma_loop(ctx, tools, g, &s.cand));
    }
    s.cost = full_cost(ctx, tools, blk, s.rate, &full).0;
    s.full = Some(full);
  }
}
