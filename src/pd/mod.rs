// Copyright (c) 2019-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Partition decision of one superblock.
//!
//! Three passes run mode decision over a shrinking set of squares. The
//! first considers every depth the depth removal allows with coarse tools;
//! each later pass only considers a window of depths around the tree the
//! previous pass chose, with richer tools. Inside a pass every considered
//! square gets its best shape (its "d1" decision), then the split
//! decisions are made bottom-up (the "d2" decision).

mod candidates;
mod refine;

pub use candidates::tot_d1_blocks;
pub use refine::{min_sq_size, refinement_window};

use self::candidates::build_candidates;
use self::refine::{initial_mdc, refine};

use crate::md::{mode_decision, BlockDecision, MdContext};
use crate::partition::PartitionType::*;
use crate::partition::{quadrants, BlockGeom, PartitionType, SbSize};
use crate::predict::MAX_INTRA_SIZE;
use crate::rdo::{rd_cost, RdCost, MAX_COST};
use crate::tools::SbToolConfig;

/// One square mode decision visits, with the number of its leading
/// geometry entries to evaluate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeafData {
  pub mds_idx: usize,
  pub tot_d1_blocks: usize,
}

/// Squares scheduled for one pass, indexed by MDS.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MdcSbData {
  /// Considered squares in coding order.
  pub leaf_data: Vec<LeafData>,
  /// Split chosen by the previous pass.
  pub split_flag: Vec<bool>,
  /// The split of the square is evaluated in this pass.
  pub refined_split_flag: Vec<bool>,
  pub consider_block: Vec<bool>,
}

impl MdcSbData {
  pub fn new(len: usize) -> Self {
    MdcSbData {
      leaf_data: Vec::new(),
      split_flag: vec![false; len],
      refined_split_flag: vec![false; len],
      consider_block: vec![false; len],
    }
  }
}

/// Latest costs per square, carried from pass to pass.
#[derive(Clone, Debug)]
pub(crate) struct SquareCosts {
  /// Best unsplit shape.
  pub d1: Vec<Option<RdCost>>,
  /// Best of the unsplit shape and the split.
  pub node: Vec<Option<RdCost>>,
}

impl SquareCosts {
  pub(crate) fn new(len: usize) -> Self {
    SquareCosts { d1: vec![None; len], node: vec![None; len] }
  }
}

/// Per-pass scratch, reset at the start of every pass.
struct PassScratch {
  tested_blk_flag: Vec<bool>,
  do_not_process_blk: Vec<bool>,
  avail_blk_flag: Vec<bool>,
}

impl PassScratch {
  fn new(len: usize) -> Self {
    PassScratch {
      tested_blk_flag: vec![false; len],
      do_not_process_blk: vec![false; len],
      avail_blk_flag: vec![false; len],
    }
  }
}

/// Decisions of one pass.
pub(crate) struct PassOutcome {
  pub decisions: Vec<Option<BlockDecision>>,
  pub d1_shape: Vec<PartitionType>,
  pub split: Vec<bool>,
  pub node: Vec<Option<RdCost>>,
}

/// A coded block and the decision made for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChosenBlock {
  pub mds: usize,
  pub decision: BlockDecision,
}

/// Final partition of a superblock.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SbPartition {
  /// Blocks in coding order.
  pub blocks: Vec<ChosenBlock>,
  /// Partition of every coded square, in coding order.
  pub partitions: Vec<(usize, PartitionType)>,
  pub cost: RdCost,
  /// Coded blocks per square depth.
  pub depth_counts: [u32; 6],
}

fn partition_rd(ctx: &MdContext, sq_size: usize, p: PartitionType) -> RdCost {
  rd_cost(0, ctx.fc.partition_cost(sq_size, p), ctx.lambda)
}

/// Partial cost past which a non-square shape stops being evaluated.
/// The band tightens the bound below the N cost: a shape has to beat N by
/// `band_pct` percent to stay in the race.
#[inline]
fn nsq_abort_threshold(n_cost: u64, band_pct: u64) -> u64 {
  (n_cost as u128 * (100 - band_pct.min(100)) as u128 / 100) as u64
}

/// Best unsplit shape of the square `leaf.mds_idx` among its first
/// `leaf.tot_d1_blocks` entries.
fn evaluate_d1(
  ctx: &MdContext, tools: &SbToolConfig, leaf: &LeafData,
  out: &mut PassOutcome, scratch: &mut PassScratch,
) -> Option<RdCost> {
  let geom = ctx.geom;
  let sq = leaf.mds_idx;
  let sq_size = geom[sq].sq_size;
  let ids = &tools.in_depth_skip;

  let mut best: Option<(RdCost, PartitionType)> = None;
  let mut n_cost = None;
  let mut n_skip = false;
  let mut i = sq;
  while i < sq + leaf.tot_d1_blocks {
    let shape = geom[i].shape;
    let blocks = i..i + geom[i].totns;
    i = blocks.end;

    let skip_shape = (shape.is_nsq()
      && ids.enabled
      && ids.skip_nsq_when_n_skips
      && n_skip)
      || blocks
        .clone()
        .any(|b| !ctx.bounds.is_allowed(&geom[b], ctx.sb_x, ctx.sb_y));
    if skip_shape {
      for b in blocks {
        scratch.do_not_process_blk[b] = true;
      }
      continue;
    }

    let abort_th = match n_cost {
      Some(c) if shape.is_nsq() && ids.enabled => {
        Some(nsq_abort_threshold(c, ids.cost_band_pct))
      }
      _ => None,
    };
    let mut partial = partition_rd(ctx, sq_size, shape);
    let mut complete = true;
    for b in blocks {
      if scratch.do_not_process_blk[b] {
        complete = false;
        break;
      }
      debug_assert!(!scratch.tested_blk_flag[b]);
      scratch.tested_blk_flag[b] = true;
      match mode_decision(ctx, tools, b) {
        Some(d) => {
          partial = partial.saturating_add(d.cost);
          out.decisions[b] = Some(d);
          scratch.avail_blk_flag[b] = true;
        }
        None => {
          complete = false;
          break;
        }
      }
      if abort_th.map_or(false, |th| partial > th) {
        complete = false;
        break;
      }
    }
    if !complete {
      continue;
    }

    if shape == PARTITION_NONE {
      n_cost = Some(partial);
      n_skip = out.decisions[sq].as_ref().map_or(false, |d| d.skip);
    }
    if best.map_or(true, |(c, _)| partial < c) {
      best = Some((partial, shape));
    }
  }

  let (cost, shape) = best?;
  out.d1_shape[sq] = shape;
  Some(cost)
}

fn run_pass(
  ctx: &MdContext, tools: &SbToolConfig, mdc: &MdcSbData,
  costs: &mut SquareCosts,
) -> PassOutcome {
  let geom = ctx.geom;
  let len = geom.len();
  let mut scratch = PassScratch::new(len);
  let mut out = PassOutcome {
    decisions: vec![None; len],
    d1_shape: vec![PARTITION_NONE; len],
    split: vec![false; len],
    node: vec![None; len],
  };

  let mut d1 = vec![None; len];
  for leaf in &mdc.leaf_data {
    d1[leaf.mds_idx] = evaluate_d1(ctx, tools, leaf, &mut out, &mut scratch);
    costs.d1[leaf.mds_idx] = d1[leaf.mds_idx];
  }

  // Children come after their parent in the table.
  for s in (0..len).rev() {
    let g = &geom[s];
    if g.sqi_mds != s
      || !(mdc.consider_block[s] || mdc.refined_split_flag[s])
    {
      continue;
    }
    let split_cost = if mdc.refined_split_flag[s] && g.sq_size > 4 {
      split_cost(ctx, &out, s)
    } else {
      None
    };
    let node = match (d1[s], split_cost) {
      (Some(a), Some(b)) if b < a => {
        out.split[s] = true;
        Some(b)
      }
      (None, Some(b)) => {
        out.split[s] = true;
        Some(b)
      }
      (a, _) => a,
    };
    out.node[s] = node;
    costs.node[s] = node;
  }

  log::trace!(
    "{:?} at ({}, {}): {} squares, {} blocks tested, {} coded, {} skipped",
    tools.pd_pass,
    ctx.sb_x,
    ctx.sb_y,
    mdc.leaf_data.len(),
    scratch.tested_blk_flag.iter().filter(|&&t| t).count(),
    scratch.avail_blk_flag.iter().filter(|&&t| t).count(),
    scratch.do_not_process_blk.iter().filter(|&&t| t).count(),
  );
  out
}

fn inside(ctx: &MdContext, mds: usize) -> bool {
  ctx.bounds.is_inside_md_scan(ctx.geom, mds, ctx.sb_x, ctx.sb_y)
}

/// Cost of splitting `s`; quadrants outside the picture cost nothing.
fn split_cost(ctx: &MdContext, out: &PassOutcome, s: usize) -> Option<RdCost> {
  let mut total = partition_rd(ctx, ctx.geom[s].sq_size, PARTITION_SPLIT);
  for q in quadrants(ctx.geom, s) {
    if inside(ctx, q) {
      total = total.saturating_add(out.node[q]?);
    }
  }
  (total < MAX_COST).then_some(total)
}

/// First geometry entry of `shape` inside the square `s`.
fn shape_start(geom: &[BlockGeom], s: usize, shape: PartitionType) -> usize {
  let mut i = s;
  while geom[i].shape != shape {
    i += geom[i].totns;
  }
  i
}

fn emit(
  ctx: &MdContext, out: &mut PassOutcome, s: usize, part: &mut SbPartition,
) -> Option<()> {
  if out.split[s] {
    part.partitions.push((s, PARTITION_SPLIT));
    for q in quadrants(ctx.geom, s) {
      if inside(ctx, q) {
        emit(ctx, out, q, part)?;
      }
    }
    return Some(());
  }
  let shape = out.d1_shape[s];
  part.partitions.push((s, shape));
  let start = shape_start(ctx.geom, s, shape);
  for b in start..start + ctx.geom[start].totns {
    let decision = out.decisions[b].take()?;
    part.depth_counts[ctx.geom[b].depth] += 1;
    part.blocks.push(ChosenBlock { mds: b, decision });
  }
  Some(())
}

/// Runs the three partition passes over the superblock of `ctx`, pass `i`
/// with `tools[i]`. Returns `None` when no complete partition was found.
pub fn partition_sb(
  ctx: &MdContext, tools: &[SbToolConfig; 3],
) -> Option<SbPartition> {
  let mut costs = SquareCosts::new(ctx.geom.len());
  let mut mdc = initial_mdc(ctx, &tools[0]);
  let mut pass = 0;
  let mut outcome = loop {
    let outcome = run_pass(ctx, &tools[pass], &mdc, &mut costs);
    if pass == tools.len() - 1 {
      break outcome;
    }
    mdc = refine(ctx, &tools[pass + 1], &outcome, &costs);
    pass += 1;
  };

  let cost = outcome.node[0]?;
  let mut part = SbPartition {
    blocks: Vec::new(),
    partitions: Vec::new(),
    cost,
    depth_counts: [0; 6],
  };
  emit(ctx, &mut outcome, 0, &mut part)?;
  Some(part)
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::analysis::MvGrid;
  use crate::context::ModeNeighbors;
  use crate::frame::Frame;
  use crate::levels::*;
  use crate::md::test::{textured_frame, tools_for};
  use crate::partition::{block_geom, PictureBounds};
  use crate::rdo::FrameContext;
  use crate::tools::DepthRemoval;

  pub(super) struct Fixture {
    source: Frame<u16>,
    grid: MvGrid,
    fc: FrameContext,
    modes: ModeNeighbors,
  }

  impl Fixture {
    pub(super) fn new() -> Self {
      Fixture {
        source: textured_frame(3, 64, 64),
        grid: MvGrid::new(64, 64),
        fc: FrameContext::default(),
        modes: ModeNeighbors::new(64, 64),
      }
    }

    pub(super) fn ctx(&self, width: usize, height: usize) -> MdContext<'_> {
      MdContext {
        sb_x: 0,
        sb_y: 0,
        geom: block_geom(SbSize::Sb64),
        bounds: PictureBounds { width, height },
        source: &self.source,
        refs: &[],
        mv_grid: &self.grid,
        qindex: 100,
        bit_depth: 8,
        lambda: crate::rdo::lambda(100, 8),
        slice_type: SliceType::I,
        fc: &self.fc,
        modes: &self.modes,
        tile_y: 0,
      }
    }
  }

  fn intra_tools(preset: Preset) -> [SbToolConfig; 3] {
    PdPass::ALL.map(|pass| tools_for(preset, SliceType::I, pass))
  }

  /// Every 4x4 unit inside `w` x `h` is covered by exactly one block.
  fn assert_tiles(ctx: &MdContext, part: &SbPartition, w: usize, h: usize) {
    let mut covered = vec![0u8; (w / 4) * (h / 4)];
    for b in &part.blocks {
      let g = &ctx.geom[b.mds];
      assert!(ctx.bounds.is_allowed(g, 0, 0));
      for y in (g.origin_y..g.origin_y + g.bheight).step_by(4) {
        for x in (g.origin_x..g.origin_x + g.bwidth).step_by(4) {
          covered[(y / 4) * (w / 4) + x / 4] += 1;
        }
      }
    }
    assert!(covered.iter().all(|&c| c == 1));
  }

  #[test]
  fn partition_tiles_the_superblock() {
    let fx = Fixture::new();
    let ctx = fx.ctx(64, 64);
    let part = partition_sb(&ctx, &intra_tools(Preset::M5)).unwrap();
    assert_tiles(&ctx, &part, 64, 64);
    assert_eq!(
      part.depth_counts.iter().sum::<u32>() as usize,
      part.blocks.len()
    );
    assert!(part.blocks.iter().all(|b| b.decision.cand.mode.is_intra()));
    assert_eq!(part.partitions[0].0, 0);
  }

  #[test]
  fn depth_removal_bounds_every_pass() {
    let fx = Fixture::new();
    let ctx = fx.ctx(64, 64);
    let mut tools = intra_tools(Preset::M3);
    for t in tools.iter_mut() {
      t.depth_removal =
        DepthRemoval { disallow_below_32x32: true, ..Default::default() };
    }
    let mdc = initial_mdc(&ctx, &tools[0]);
    assert!(!mdc.leaf_data.is_empty());
    assert!(mdc.leaf_data.iter().all(|l| ctx.geom[l.mds_idx].sq_size >= 32));

    let part = partition_sb(&ctx, &tools).unwrap();
    assert!(part.blocks.iter().all(|b| ctx.geom[b.mds].sq_size >= 32));
    assert_tiles(&ctx, &part, 64, 64);
  }

  #[test]
  fn picture_edge_forces_splits() {
    let fx = Fixture::new();
    let ctx = fx.ctx(40, 40);
    let mut tools = intra_tools(Preset::M5);
    for t in tools.iter_mut() {
      t.depth_removal =
        DepthRemoval { disallow_below_32x32: true, ..Default::default() };
    }
    let mdc = initial_mdc(&ctx, &tools[0]);
    for l in &mdc.leaf_data {
      assert!(ctx.bounds.is_inside_md_scan(ctx.geom, l.mds_idx, 0, 0));
    }
    assert!(mdc.leaf_data.iter().any(|l| ctx.geom[l.mds_idx].sq_size == 8));

    let part = partition_sb(&ctx, &tools).unwrap();
    assert_tiles(&ctx, &part, 40, 40);
  }

  #[test]
  fn refinement_follows_the_previous_tree() {
    let fx = Fixture::new();
    let ctx = fx.ctx(64, 64);
    let tools = intra_tools(Preset::M5);
    let mut costs = SquareCosts::new(ctx.geom.len());
    let mdc = initial_mdc(&ctx, &tools[0]);
    let outcome = run_pass(&ctx, &tools[0], &mdc, &mut costs);
    let next = refine(&ctx, &tools[1], &outcome, &costs);
    for (s, &split) in outcome.split.iter().enumerate() {
      if split {
        assert!(next.split_flag[s]);
        assert!(next.refined_split_flag[s]);
      }
    }
    let mut prev = None;
    for l in &next.leaf_data {
      assert!(next.consider_block[l.mds_idx]);
      assert!(prev < Some(l.mds_idx));
      prev = Some(l.mds_idx);
    }
  }

  #[test]
  fn nsq_abort_threshold_shrinks_with_the_band() {
    assert_eq!(nsq_abort_threshold(1000, 0), 1000);
    assert_eq!(nsq_abort_threshold(1000, 10), 900);
    assert_eq!(nsq_abort_threshold(1000, 25), 750);
    assert_eq!(nsq_abort_threshold(1000, 150), 0);
    assert_eq!(nsq_abort_threshold(MAX_COST, 0), MAX_COST);
    for w in crate::tools::IN_DEPTH_SKIP_CTRLS.windows(2) {
      assert!(
        nsq_abort_threshold(5000, w[1].cost_band_pct)
          <= nsq_abort_threshold(5000, w[0].cost_band_pct)
      );
    }
  }
}
