// Copyright (c) 2019-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Depth refinement: the squares a pass considers, derived from the tree the
//! previous pass chose.

use super::*;
use crate::util::deviation_pct;

/// Smallest square a pass may code, after depth removal and the 4x4 ban.
pub fn min_sq_size(tools: &SbToolConfig) -> usize {
  let floor = if tools.disallow_4x4 { 8 } else { 4 };
  tools.depth_removal.min_sq_size().max(floor)
}

/// Depth window `(s, e)` explored around a predicted square: `s` steps up
/// and `e` steps down. Always within `[-depth, max_depth - depth]`.
pub fn refinement_window(
  g: &BlockGeom, sb: SbSize, tools: &SbToolConfig,
) -> (i8, i8) {
  let r = &tools.depth_refinement;
  let (s, e) = if r.enabled { (r.s_depth, r.e_depth) } else { (0, 0) };
  let depth = g.depth as i8;
  let max_depth = sb.max_depth() as i8;
  let below = (g.sq_size.trailing_zeros() as i8
    - min_sq_size(tools).trailing_zeros() as i8)
    .max(0);
  (s.clamp(-depth, 0), e.min(max_depth - depth).min(below).max(0))
}

/// Squares that can't be coded whole and must be split.
fn must_split(ctx: &MdContext, s: usize) -> bool {
  let g = &ctx.geom[s];
  let intra_only = ctx.slice_type.is_intra() || ctx.refs.is_empty();
  !ctx.bounds.is_allowed(g, ctx.sb_x, ctx.sb_y)
    || (intra_only && g.sq_size > MAX_INTRA_SIZE)
}

fn inside(ctx: &MdContext, mds: usize) -> bool {
  ctx.bounds.is_inside_md_scan(ctx.geom, mds, ctx.sb_x, ctx.sb_y)
}

/// Considers the quadrants of every considered square that must be split.
fn force_splits(ctx: &MdContext, mdc: &mut MdcSbData) {
  // Pre-order, so forced children are visited after their parent.
  for s in 0..ctx.geom.len() {
    let g = &ctx.geom[s];
    if g.sqi_mds != s || !mdc.consider_block[s] || g.sq_size == 4 {
      continue;
    }
    if must_split(ctx, s) {
      mdc.refined_split_flag[s] = true;
      for q in quadrants(ctx.geom, s) {
        if inside(ctx, q) {
          mdc.consider_block[q] = true;
        }
      }
    }
  }
}

/// Squares considered by the first pass: every depth down to the smallest
/// allowed square.
pub(crate) fn initial_mdc(ctx: &MdContext, tools: &SbToolConfig) -> MdcSbData {
  let min_sq = min_sq_size(tools);
  let mut mdc = MdcSbData::new(ctx.geom.len());
  for s in 0..ctx.geom.len() {
    let g = &ctx.geom[s];
    if g.sqi_mds == s && g.sq_size >= min_sq && inside(ctx, s) {
      mdc.consider_block[s] = true;
      mdc.refined_split_flag[s] = g.sq_size > min_sq;
    }
  }
  force_splits(ctx, &mut mdc);
  build_candidates(ctx, tools, &mut mdc);
  mdc
}

/// `dev(parent d1 cost, sum of the parent's quadrants)`; `None` when a cost
/// is unknown.
fn parent_deviation(
  ctx: &MdContext, costs: &SquareCosts, parent: usize,
) -> Option<i64> {
  let parent_cost = known(costs.d1[parent])?;
  let mut sum: RdCost = 0;
  for q in quadrants(ctx.geom, parent) {
    if inside(ctx, q) {
      sum = sum.checked_add(known(costs.node[q])?)?;
    }
  }
  Some(deviation_pct(parent_cost, sum))
}

/// `dev(sum of the children, current d1 cost)`; `None` when a cost is
/// unknown.
fn child_deviation(
  ctx: &MdContext, costs: &SquareCosts, s: usize,
) -> Option<i64> {
  let current = known(costs.d1[s])?;
  let mut sum: RdCost = 0;
  for q in quadrants(ctx.geom, s) {
    if inside(ctx, q) {
      sum = sum.checked_add(known(costs.node[q])?)?;
    }
  }
  Some(deviation_pct(sum, current))
}

#[inline]
fn known(c: Option<RdCost>) -> Option<RdCost> {
  c.filter(|&c| c < MAX_COST)
}

/// Considers the squares `steps` depths below `s`.
fn mark_below(ctx: &MdContext, mdc: &mut MdcSbData, s: usize, steps: i8) {
  if steps <= 0 || ctx.geom[s].sq_size == 4 {
    return;
  }
  mdc.refined_split_flag[s] = true;
  for q in quadrants(ctx.geom, s) {
    if inside(ctx, q) {
      mdc.consider_block[q] = true;
      mark_below(ctx, mdc, q, steps - 1);
    }
  }
}

fn visit_tree(
  ctx: &MdContext, outcome: &PassOutcome, s: usize,
  f: &mut impl FnMut(usize, bool),
) {
  let split = outcome.split[s];
  f(s, split);
  if split {
    for q in quadrants(ctx.geom, s) {
      if inside(ctx, q) {
        visit_tree(ctx, outcome, q, f);
      }
    }
  }
}

/// Squares the next pass considers, from the tree of the previous pass.
pub(crate) fn refine(
  ctx: &MdContext, tools: &SbToolConfig, outcome: &PassOutcome,
  costs: &SquareCosts,
) -> MdcSbData {
  let r = &tools.depth_refinement;
  let offset = tools.refinement_th_offset;
  let parent_th = r.parent_to_current_th.saturating_add(offset);
  let sub_th = r.sub_to_current_th.saturating_add(offset);
  let sb = if ctx.geom[0].sq_size == 128 { SbSize::Sb128 } else { SbSize::Sb64 };

  let mut leaves = Vec::new();
  let mut mdc = MdcSbData::new(ctx.geom.len());
  visit_tree(ctx, outcome, 0, &mut |s, split| {
    if split {
      mdc.split_flag[s] = true;
      mdc.refined_split_flag[s] = true;
    } else {
      leaves.push(s);
    }
  });

  for s in leaves {
    mdc.consider_block[s] = true;
    let (s_depth, e_depth) = refinement_window(&ctx.geom[s], sb, tools);

    let parent = ctx.geom[s].parent_depth_idx_mds;
    let up_dev = match parent {
      Some(p) if s_depth < 0 => {
        Some(parent_deviation(ctx, costs, p).unwrap_or(i64::MIN))
      }
      _ => None,
    };
    let down_dev = if e_depth > 0 {
      Some(child_deviation(ctx, costs, s).unwrap_or(i64::MIN))
    } else {
      None
    };
    let mut up = up_dev.map_or(false, |d| d <= parent_th);
    let mut down = down_dev.map_or(false, |d| d <= sub_th);
    if up && down && r.up_to_2_depth {
      if up_dev <= down_dev {
        down = false;
      } else {
        up = false;
      }
    }

    if up {
      let mut p = s;
      for _ in 0..-s_depth {
        match ctx.geom[p].parent_depth_idx_mds {
          Some(pp) => {
            p = pp;
            mdc.consider_block[p] = true;
            mdc.refined_split_flag[p] = true;
          }
          None => break,
        }
      }
    }
    if down {
      mark_below(ctx, &mut mdc, s, e_depth);
    }
  }

  force_splits(ctx, &mut mdc);
  build_candidates(ctx, tools, &mut mdc);
  mdc
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::levels::*;
  use crate::md::test::tools_for;
  use crate::partition::{block_geom, sq_mds_at};
  use crate::pd::test::Fixture;
  use crate::tools::{DepthRemoval, DEPTH_REFINEMENT_CTRLS};
  use quickcheck::quickcheck;

  fn refining_tools(level: usize) -> SbToolConfig {
    let mut tools = tools_for(Preset::M5, SliceType::P, PdPass::Pd1);
    tools.depth_refinement = DEPTH_REFINEMENT_CTRLS[level];
    tools.disallow_4x4 = false;
    tools
  }

  /// Tools at the strictest refinement level: both thresholds at -5 and
  /// only one extra depth per leaf.
  fn strict_tools() -> SbToolConfig {
    let mut tools = refining_tools(6);
    tools.depth_removal = DepthRemoval::default();
    tools.refinement_th_offset = 0;
    tools
  }

  /// A 64x64 superblock the previous pass split once, into four 32x32
  /// leaves of cost 1000 each. Their 16x16 quadrants sum to `children`.
  fn split_once(
    ctx: &MdContext, children: RdCost,
  ) -> (PassOutcome, SquareCosts) {
    let len = ctx.geom.len();
    let mut outcome = PassOutcome {
      decisions: vec![None; len],
      d1_shape: vec![PARTITION_NONE; len],
      split: vec![false; len],
      node: vec![None; len],
    };
    outcome.split[0] = true;
    let mut costs = SquareCosts::new(len);
    for s in quadrants(ctx.geom, 0) {
      costs.d1[s] = Some(1000);
      costs.node[s] = Some(1000);
      for q in quadrants(ctx.geom, s) {
        costs.node[q] = Some(children / 4);
      }
    }
    (outcome, costs)
  }

  fn children_considered(ctx: &MdContext, mdc: &MdcSbData) -> usize {
    quadrants(ctx.geom, 0)
      .iter()
      .flat_map(|&s| quadrants(ctx.geom, s))
      .filter(|&q| mdc.consider_block[q])
      .count()
  }

  #[test]
  fn parent_threshold_is_inclusive() {
    let fx = Fixture::new();
    let ctx = fx.ctx(64, 64);
    let tools = strict_tools();
    let (outcome, mut costs) = split_once(&ctx, 1200);

    // dev(3800, 4000) = -5
    costs.d1[0] = Some(3800);
    let mdc = refine(&ctx, &tools, &outcome, &costs);
    assert!(mdc.consider_block[0]);
    assert!(mdc.split_flag[0] && mdc.refined_split_flag[0]);
    assert_eq!(children_considered(&ctx, &mdc), 0);

    // dev(3840, 4000) = -4
    costs.d1[0] = Some(3840);
    let mdc = refine(&ctx, &tools, &outcome, &costs);
    assert!(!mdc.consider_block[0]);
    assert!(mdc.split_flag[0] && mdc.refined_split_flag[0]);
    for s in quadrants(ctx.geom, 0) {
      assert!(mdc.consider_block[s]);
      assert!(!mdc.split_flag[s] && !mdc.refined_split_flag[s]);
    }

    // A parent never measured is always worth a look.
    costs.d1[0] = None;
    let mdc = refine(&ctx, &tools, &outcome, &costs);
    assert!(mdc.consider_block[0]);
  }

  #[test]
  fn sub_threshold_is_inclusive() {
    let fx = Fixture::new();
    let ctx = fx.ctx(64, 64);
    let tools = strict_tools();

    // dev(950, 1000) = -5 for every leaf; the parent is far off.
    let (outcome, mut costs) = split_once(&ctx, 950);
    costs.d1[0] = Some(4400);
    let mdc = refine(&ctx, &tools, &outcome, &costs);
    assert!(!mdc.consider_block[0]);
    assert_eq!(children_considered(&ctx, &mdc), 16);
    for s in quadrants(ctx.geom, 0) {
      assert!(mdc.refined_split_flag[s]);
      assert!(!mdc.split_flag[s]);
    }

    // dev(960, 1000) = -4
    let (outcome, mut costs) = split_once(&ctx, 960);
    costs.d1[0] = Some(4400);
    let mdc = refine(&ctx, &tools, &outcome, &costs);
    assert_eq!(children_considered(&ctx, &mdc), 0);
    for s in quadrants(ctx.geom, 0) {
      assert!(!mdc.refined_split_flag[s]);
    }
  }

  #[test]
  fn two_directions_keep_the_smaller_deviation() {
    let fx = Fixture::new();
    let ctx = fx.ctx(64, 64);
    let mut tools = strict_tools();

    // Parent -10, children -20: going down wins.
    let (outcome, mut costs) = split_once(&ctx, 800);
    costs.d1[0] = Some(3600);
    let mdc = refine(&ctx, &tools, &outcome, &costs);
    assert!(!mdc.consider_block[0]);
    assert_eq!(children_considered(&ctx, &mdc), 16);

    // Parent -25, children -20: going up wins.
    costs.d1[0] = Some(3000);
    let mdc = refine(&ctx, &tools, &outcome, &costs);
    assert!(mdc.consider_block[0]);
    assert_eq!(children_considered(&ctx, &mdc), 0);

    tools.depth_refinement.up_to_2_depth = false;
    let mdc = refine(&ctx, &tools, &outcome, &costs);
    assert!(mdc.consider_block[0]);
    assert_eq!(children_considered(&ctx, &mdc), 16);
  }

  #[test]
  fn offset_moves_both_thresholds() {
    let fx = Fixture::new();
    let ctx = fx.ctx(64, 64);
    let mut tools = strict_tools();
    let (outcome, mut costs) = split_once(&ctx, 1040);

    // dev(4200, 4000) = 5 and dev(1040, 1000) = 4: both pass at +10.
    costs.d1[0] = Some(4200);
    tools.refinement_th_offset = 10;
    tools.depth_refinement.up_to_2_depth = false;
    let mdc = refine(&ctx, &tools, &outcome, &costs);
    assert!(mdc.consider_block[0]);
    assert_eq!(children_considered(&ctx, &mdc), 16);

    tools.refinement_th_offset = 0;
    let mdc = refine(&ctx, &tools, &outcome, &costs);
    assert!(!mdc.consider_block[0]);
    assert_eq!(children_considered(&ctx, &mdc), 0);

    // dev(3600, 4000) = -10 passes at -5 but not below it.
    costs.d1[0] = Some(3600);
    tools.refinement_th_offset = -5;
    let mdc = refine(&ctx, &tools, &outcome, &costs);
    assert!(mdc.consider_block[0]);
    tools.refinement_th_offset = -6;
    let mdc = refine(&ctx, &tools, &outcome, &costs);
    assert!(!mdc.consider_block[0]);
  }

  #[test]
  fn depth_removal_clips_the_window() {
    let mut tools = refining_tools(1);
    tools.depth_removal =
      DepthRemoval { disallow_below_32x32: true, ..Default::default() };
    let geom = block_geom(SbSize::Sb128);
    let at = |sq| &geom[sq_mds_at(SbSize::Sb128, 0, 0, sq)];
    assert_eq!(refinement_window(at(128), SbSize::Sb128, &tools), (0, 2));
    assert_eq!(refinement_window(at(64), SbSize::Sb128, &tools), (-1, 1));
    assert_eq!(refinement_window(at(32), SbSize::Sb128, &tools), (-2, 0));
  }

  #[test]
  fn disabled_refinement_keeps_the_predicted_depth() {
    let tools = refining_tools(0);
    let geom = block_geom(SbSize::Sb64);
    for s in 0..geom.len() {
      if geom[s].sqi_mds == s {
        assert_eq!(refinement_window(&geom[s], SbSize::Sb64, &tools), (0, 0));
      }
    }
  }

  quickcheck! {
    fn window_stays_in_the_tree(idx: usize, level: usize, big: bool) -> bool {
      let sb = if big { SbSize::Sb128 } else { SbSize::Sb64 };
      let tools = refining_tools(level % DEPTH_REFINEMENT_CTRLS.len());
      let geom = block_geom(sb);
      let g = &geom[geom[idx % geom.len()].sqi_mds];
      let (s, e) = refinement_window(g, sb, &tools);
      let depth = g.depth as i8;
      s >= -depth && s <= 0 && e >= 0 && e <= sb.max_depth() as i8 - depth
    }
  }
}
