// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Closed-loop coding of a superblock from its chosen partition.

use crate::context::NeighborArrays;
use crate::md::*;
use crate::me::BlockRect;
use crate::pd::SbPartition;
use crate::rdo::{sse, FrameContext};
use crate::residual::*;
use crate::tools::SbToolConfig;
use crate::transform::TxType;

/// Coding statistics of a superblock or a picture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize))]
pub struct SbCodingStats {
  pub blocks: u32,
  pub skip_blocks: u32,
  /// Luma samples predicted with an intra mode.
  pub intra_area: u64,
  /// Coded blocks per square depth.
  pub depth_counts: [u32; 6],
  /// Coded luma blocks per transform type.
  pub tx_type_counts: [u32; 2],
}

impl SbCodingStats {
  pub fn accumulate(&mut self, other: &SbCodingStats) {
    self.blocks += other.blocks;
    self.skip_blocks += other.skip_blocks;
    self.intra_area += other.intra_area;
    for (a, b) in self.depth_counts.iter_mut().zip(&other.depth_counts) {
      *a += b;
    }
    for (a, b) in self.tx_type_counts.iter_mut().zip(&other.tx_type_counts) {
      *a += b;
    }
  }
}

/// Reconstruction of one coded superblock.
#[derive(Clone, Debug)]
pub struct SbEncodeOutput {
  /// Luma origin and visible size.
  pub x: usize,
  pub y: usize,
  pub w: usize,
  pub h: usize,
  /// Luma `w` x `h`, chroma `w/2` x `h/2`.
  pub recon: [Vec<u16>; 3],
  /// Estimated rate in 1/512 bits.
  pub rate: u64,
  /// Sum of squared errors over the three planes.
  pub distortion: u64,
  pub stats: SbCodingStats,
}

fn copy_block(
  dst: &mut [u16], dst_stride: usize, x: usize, y: usize, src: &[u16],
  w: usize, h: usize,
) {
  for r in 0..h {
    dst[(y + r) * dst_stride + x..][..w].copy_from_slice(&src[r * w..][..w]);
  }
}

/// Codes the blocks of `part` in order, predicting from the reconstructed
/// neighbors and publishing each reconstruction to `neighbors`. `fc` is the
/// superblock's entropy context and is adapted in place.
pub fn encode_sb(
  ctx: &MdContext, tools: &SbToolConfig, part: &SbPartition,
  neighbors: &NeighborArrays, fc: &mut FrameContext,
) -> SbEncodeOutput {
  let sb_size = ctx.geom[0].sq_size;
  let w = sb_size.min(ctx.bounds.width - ctx.sb_x);
  let h = sb_size.min(ctx.bounds.height - ctx.sb_y);
  let (cw, ch) = (w >> 1, h >> 1);
  let mut recon = [vec![0u16; w * h], vec![0u16; cw * ch], vec![0u16; cw * ch]];
  let mut rate = 0u64;
  let mut stats = SbCodingStats::default();
  let inputs = ctx.inputs();
  let is_inter_slice = !ctx.slice_type.is_intra();

  for &(s, p) in &part.partitions {
    let sq = ctx.geom[s].sq_size;
    rate += fc.partition_cost(sq, p) as u64;
    fc.update_partition(sq, p);
  }

  for b in &part.blocks {
    let g = &ctx.geom[b.mds];
    let d = &b.decision;
    let blk = BlockRect::new(
      ctx.sb_x + g.origin_x,
      ctx.sb_y + g.origin_y,
      g.bwidth,
      g.bheight,
    );
    let is_intra = d.cand.mode.is_intra();
    let skip_ctx = neighbors.modes.skip_ctx(blk.x, blk.y - ctx.tile_y);
    rate += candidate_rate(ctx, tools, &blk, &d.cand) as u64;
    rate += fc.skip_cost(skip_ctx, d.skip) as u64;

    let mut pred = vec![0u16; blk.w * blk.h];
    predict_candidate(
      &inputs,
      &EdgeSource::Neighbors { arrays: &neighbors.planes[0], tile_y: ctx.tile_y },
      &d.cand,
      0,
      blk.x,
      blk.y,
      blk.w,
      blk.h,
      &mut pred,
    );
    let rec = if d.skip {
      pred
    } else {
      let mut rec = vec![0u16; blk.w * blk.h];
      let mut coded = Vec::new();
      let r = {
        let params = TxParams {
          fc: &*fc,
          ..tx_params(ctx, tools, d.tx_type, tools.rdoq.enabled, is_intra)
        };
        code_residual(
          &ctx.source.planes[0],
          blk.x,
          blk.y,
          &pred,
          blk.w,
          blk.h,
          &params,
          Some(&mut rec),
          Some(&mut coded),
        )
      };
      rate += r.rate as u64 + fc.tx_type.cost(d.tx_type.index()) as u64;
      for c in &coded {
        fc.update_coeffs(&c.qcoeffs, c.n, c.eob);
      }
      stats.tx_type_counts[d.tx_type.index()] += 1;
      rec
    };
    neighbors.planes[0].store_block(
      blk.x,
      blk.y - ctx.tile_y,
      blk.w,
      blk.h,
      &rec,
      blk.w,
    );
    copy_block(&mut recon[0], w, g.origin_x, g.origin_y, &rec, blk.w, blk.h);

    if g.has_uv {
      let (cx, cy, bw, bh) = g.chroma_rect();
      let (x, y) = ((ctx.sb_x >> 1) + cx, (ctx.sb_y >> 1) + cy);
      let chroma_rdoq = tools.rdoq.enabled && !tools.rdoq.skip_uv;
      for p in 1..3 {
        let edges = EdgeSource::Neighbors {
          arrays: &neighbors.planes[p],
          tile_y: ctx.tile_y >> 1,
        };
        let mut pred = vec![0u16; bw * bh];
        predict_candidate(&inputs, &edges, &d.cand, p, x, y, bw, bh, &mut pred);
        let rec = if d.skip {
          pred
        } else {
          let mut rec = vec![0u16; bw * bh];
          let mut coded = Vec::new();
          let r = {
            let params = TxParams {
              fc: &*fc,
              ..tx_params(ctx, tools, TxType::WHT_WHT, chroma_rdoq, is_intra)
            };
            code_residual(
              &ctx.source.planes[p],
              x,
              y,
              &pred,
              bw,
              bh,
              &params,
              Some(&mut rec),
              Some(&mut coded),
            )
          };
          rate += r.rate as u64;
          for c in &coded {
            fc.update_coeffs(&c.qcoeffs, c.n, c.eob);
          }
          rec
        };
        neighbors.planes[p].store_block(
          x,
          y - (ctx.tile_y >> 1),
          bw,
          bh,
          &rec,
          bw,
        );
        copy_block(&mut recon[p], cw, cx, cy, &rec, bw, bh);
      }
    }

    neighbors.modes.store_block(blk.x, blk.y - ctx.tile_y, blk.w, blk.h, d.skip);
    fc.update_skip(skip_ctx, d.skip);
    fc.update_mode(d.cand.mode, is_inter_slice);

    stats.blocks += 1;
    stats.skip_blocks += d.skip as u32;
    stats.depth_counts[g.depth.min(5)] += 1;
    if is_intra {
      stats.intra_area += (blk.w * blk.h) as u64;
    }
  }

  let mut distortion = 0;
  for (p, rec) in recon.iter().enumerate() {
    let plane = &ctx.source.planes[p];
    let (x, y, pw, ph) = if p == 0 {
      (ctx.sb_x, ctx.sb_y, w, h)
    } else {
      (ctx.sb_x >> 1, ctx.sb_y >> 1, cw, ch)
    };
    let start = plane.row_range(x as isize, y as isize).start;
    distortion +=
      sse(&plane.data[start..], plane.cfg.stride, rec, pw, pw, ph);
  }

  SbEncodeOutput {
    x: ctx.sb_x,
    y: ctx.sb_y,
    w,
    h,
    recon,
    rate,
    distortion,
    stats,
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::analysis::MvGrid;
  use crate::frame::Frame;
  use crate::levels::*;
  use crate::md::test::{textured_frame, tools_for};
  use crate::partition::{block_geom, PictureBounds, SbSize};
  use crate::pd::partition_sb;

  struct Fixture {
    source: Frame<u16>,
    grid: MvGrid,
    fc: FrameContext,
    neighbors: NeighborArrays,
  }

  impl Fixture {
    fn new() -> Self {
      let neighbors = NeighborArrays::new(64, 64);
      neighbors.reset(8);
      Fixture {
        source: textured_frame(7, 64, 64),
        grid: MvGrid::new(64, 64),
        fc: FrameContext::default(),
        neighbors,
      }
    }

    fn ctx(&self, qindex: u8) -> MdContext<'_> {
      MdContext {
        sb_x: 0,
        sb_y: 0,
        geom: block_geom(SbSize::Sb64),
        bounds: PictureBounds { width: 64, height: 64 },
        source: &self.source,
        refs: &[],
        mv_grid: &self.grid,
        qindex,
        bit_depth: 8,
        lambda: crate::rdo::lambda(qindex, 8),
        slice_type: SliceType::I,
        fc: &self.fc,
        modes: &self.neighbors.modes,
        tile_y: 0,
      }
    }
  }

  fn encode(fx: &Fixture, qindex: u8) -> (SbPartition, SbEncodeOutput) {
    let ctx = fx.ctx(qindex);
    let tools = PdPass::ALL.map(|p| tools_for(Preset::M8, SliceType::I, p));
    let part = partition_sb(&ctx, &tools).unwrap();
    let mut fc = fx.fc.clone();
    let out = encode_sb(&ctx, &tools[2], &part, &fx.neighbors, &mut fc);
    (part, out)
  }

  #[test]
  fn every_block_is_coded() {
    let fx = Fixture::new();
    let (part, out) = encode(&fx, 60);
    assert_eq!(out.stats.blocks as usize, part.blocks.len());
    assert_eq!(out.stats.intra_area, 64 * 64);
    assert_eq!(out.stats.depth_counts, part.depth_counts);
    assert!(out.rate > 0);
  }

  #[test]
  fn neighbors_hold_the_last_reconstructed_row() {
    let fx = Fixture::new();
    let (_, out) = encode(&fx, 60);
    let bottom = &out.recon[0][63 * 64..];
    assert_eq!(fx.neighbors.planes[0].above(0, 64), bottom);
    let right: Vec<u16> = (0..32).map(|y| out.recon[1][y * 32 + 31]).collect();
    assert_eq!(fx.neighbors.planes[1].left(0, 32), right);
  }

  #[test]
  fn finer_quantizers_reconstruct_closer() {
    let coarse = encode(&Fixture::new(), 200).1;
    let fine = encode(&Fixture::new(), 20).1;
    assert!(fine.distortion < coarse.distortion);
    assert!(fine.rate > coarse.rate);
  }
}
