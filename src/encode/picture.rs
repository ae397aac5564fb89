// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Per-picture state shared by the Enc-Dec workers.

use std::ops::Range;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crossbeam::channel::Sender;

use super::recode::*;
use super::sb::*;
use super::Sequence;
use crate::analysis::PictureAnalysis;
use crate::api::{EncoderStatus, QRange};
use crate::context::*;
use crate::frame::{Frame, SavedPicture};
use crate::levels::{PdPass, SliceType};
use crate::md::MdContext;
use crate::partition::block_geom;
use crate::pd::partition_sb;
use crate::rdo::{self, FrameContext, COST_ONE_BIT};
use crate::segments::{EncDecSegments, SegmentTask};
use crate::tools::{derive_sb_tools, ToolInput};

/// Rows of superblocks coded with their own neighbor arrays.
#[derive(Debug)]
pub(crate) struct TileGroup {
  pub index: usize,
  pub sb_rows: Range<usize>,
  /// First luma row.
  pub tile_y: usize,
  pub segments: EncDecSegments,
  pub neighbors: NeighborArrays,
}

/// Splits the superblock rows of `grid` into at most `count` tile groups.
pub(crate) fn tile_groups(
  grid: &SbGrid, width: usize, height: usize, count: usize, seg_rows: usize,
  seg_cols: usize,
) -> Vec<TileGroup> {
  let count = count.clamp(1, grid.rows.max(1));
  let sb = grid.sb_size.size();
  (0..count)
    .map(|i| {
      let sb_rows = (i * grid.rows / count)..((i + 1) * grid.rows / count);
      let tile_y = sb_rows.start * sb;
      let tile_h = (sb_rows.end * sb).min(height) - tile_y;
      TileGroup {
        index: i,
        segments: EncDecSegments::new(grid, sb_rows.clone(), seg_rows, seg_cols),
        neighbors: NeighborArrays::new(width, tile_h),
        sb_rows,
        tile_y,
      }
    })
    .collect()
}

/// Sums of a coding pass, guarded by the picture's intra mutex.
#[derive(Debug)]
pub(crate) struct PassState {
  pub coded_sbs: usize,
  pub rate: u64,
  pub distortion: u64,
  pub stats: SbCodingStats,
  pub q_range: QRange,
}

/// Partial sums of one segment.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct SegmentSums {
  pub sbs: usize,
  pub rate: u64,
  pub distortion: u64,
  pub stats: SbCodingStats,
}

/// What the worker closing a segment does next.
#[derive(Debug)]
pub(crate) enum Completion {
  /// Other segments are still running.
  Pending,
  /// The picture is coded again at a new quantizer.
  Recode,
  /// The picture is final.
  Publish(Box<FinishedPass>),
}

#[derive(Debug)]
pub(crate) struct FinishedPass {
  pub recon: Frame<u16>,
  pub bits: u64,
  pub distortion: u64,
  pub stats: SbCodingStats,
  pub base_q_idx: u8,
  pub loop_count: usize,
}

/// Message the last superblock of a picture sends back to the encoder.
pub(crate) type PictureDone =
  Result<(crate::api::EncodedPicture, Arc<Frame<u16>>), EncoderStatus>;

pub(crate) struct PictureParams {
  pub picture_number: u64,
  pub slice_type: SliceType,
  pub temporal_layer: u8,
  pub is_overlay: bool,
  pub end_of_stream: bool,
  pub source: Frame<u16>,
  /// Unfiltered source kept for quality measurement.
  pub original: Option<SavedPicture>,
  pub refs: Vec<Arc<Frame<u16>>>,
  pub analysis: PictureAnalysis,
  pub tf_noise_level: Option<f64>,
}

pub(crate) struct PictureControlSet {
  pub seq: Arc<Sequence>,
  pub picture_number: u64,
  pub slice_type: SliceType,
  pub temporal_layer: u8,
  pub is_overlay: bool,
  pub end_of_stream: bool,
  pub source: Frame<u16>,
  pub original: Option<SavedPicture>,
  pub refs: Vec<Arc<Frame<u16>>>,
  pub analysis: PictureAnalysis,
  pub tf_noise_level: Option<f64>,
  pub tile_groups: Vec<TileGroup>,
  pub segmentation: SegmentationMap,
  pub md_frame_context: FrameContext,
  /// Entropy context of every superblock once coded.
  sb_contexts: Vec<Mutex<Option<FrameContext>>>,
  sb_results: Vec<Mutex<Option<SbEncodeOutput>>>,
  pub base_q_idx: AtomicU8,
  /// Encode passes started.
  pub loop_count: AtomicUsize,
  pub enc_dec_coded_sb_count: AtomicUsize,
  pub intra_mutex: Mutex<PassState>,
  pub done: Sender<PictureDone>,
}

impl PictureControlSet {
  pub fn new(
    seq: Arc<Sequence>, params: PictureParams, done: Sender<PictureDone>,
  ) -> Self {
    let cfg = &seq.config;
    let grid = seq.grid;
    let tile_groups = tile_groups(
      &grid,
      seq.bounds.width,
      seq.bounds.height,
      cfg.tile_groups,
      cfg.segment_rows,
      cfg.segment_cols,
    );
    let n = grid.count();
    PictureControlSet {
      picture_number: params.picture_number,
      slice_type: params.slice_type,
      temporal_layer: params.temporal_layer,
      is_overlay: params.is_overlay,
      end_of_stream: params.end_of_stream,
      source: params.source,
      original: params.original,
      refs: params.refs,
      analysis: params.analysis,
      tf_noise_level: params.tf_noise_level,
      tile_groups,
      segmentation: SegmentationMap::new(seq.bounds.width, seq.bounds.height),
      md_frame_context: FrameContext::default(),
      sb_contexts: (0..n).map(|_| Mutex::new(None)).collect(),
      sb_results: (0..n).map(|_| Mutex::new(None)).collect(),
      base_q_idx: AtomicU8::new(cfg.base_q_idx),
      loop_count: AtomicUsize::new(1),
      enc_dec_coded_sb_count: AtomicUsize::new(0),
      intra_mutex: Mutex::new(PassState {
        coded_sbs: 0,
        rate: 0,
        distortion: 0,
        stats: SbCodingStats::default(),
        q_range: QRange { low: cfg.min_q_idx, high: cfg.max_q_idx },
      }),
      done,
      seq,
    }
  }

  #[inline]
  pub fn sb_total(&self) -> usize {
    self.seq.grid.count()
  }

  /// Resets the tile group's neighbor arrays and hands out its first
  /// segment.
  pub fn start_tile_group(&self, tg: usize) -> Option<usize> {
    let tile = &self.tile_groups[tg];
    tile.neighbors.reset(self.seq.config.bit_depth);
    tile.segments.assign(SegmentTask::MdcInput).segment
  }

  /// Entropy context a superblock starts from: the top-right superblock's
  /// when it's complete, else the left one's, else the picture's.
  fn entropy_context(
    &self, tile: &TileGroup, sbo: SuperBlockOffset,
  ) -> Result<FrameContext, EncoderStatus> {
    let cols = self.seq.grid.cols;
    let source = if tile.segments.top_right_available(sbo) {
      Some(SuperBlockOffset { x: sbo.x + 1, y: sbo.y - 1 })
    } else if sbo.x > 0 {
      Some(SuperBlockOffset { x: sbo.x - 1, y: sbo.y })
    } else {
      None
    };
    let Some(o) = source else {
      return Ok(self.md_frame_context.clone());
    };
    let ctx = self.sb_contexts[o.index(cols)]
      .lock()
      .map_err(|_| EncoderStatus::Failure)?;
    Ok(ctx.clone().unwrap_or_else(|| self.md_frame_context.clone()))
  }

  /// Partition decision, mode decision and encode of one superblock.
  fn encode_superblock(
    &self, tile: &TileGroup, sbo: SuperBlockOffset,
  ) -> Result<SbEncodeOutput, EncoderStatus> {
    let seq = &*self.seq;
    let cfg = &seq.config;
    let sb_size = seq.grid.sb_size;
    let sb = sb_size.size();
    let (sb_x, sb_y) = (sbo.x * sb, sbo.y * sb);
    let index = sbo.index(seq.grid.cols);
    let stats = &self.analysis.sb_stats[index];

    let segment = segment_from_variance(stats.variance, cfg.bit_depth);
    let w = sb.min(seq.bounds.width - sb_x);
    let h = sb.min(seq.bounds.height - sb_y);
    self.segmentation.set_block(sb_x, sb_y, w, h, segment);
    let base_q = self.base_q_idx.load(Ordering::Acquire) as i16;
    let qindex = (base_q + SEGMENT_QINDEX_DELTA[segment as usize] as i16)
      .clamp(0, 255) as u8;

    let input = ToolInput {
      preset: cfg.preset,
      pd_pass: PdPass::Pd0,
      slice_type: self.slice_type,
      temporal_layer: self.temporal_layer,
      resolution: seq.resolution,
      screen_content: cfg.screen_content,
      sb_size,
      bit_depth: cfg.bit_depth,
      sb_width: sb.min(cfg.width - sb_x.min(cfg.width)),
      sb_height: sb.min(cfg.height - sb_y.min(cfg.height)),
    };
    let tools = PdPass::ALL.map(|pd_pass| {
      derive_sb_tools(&ToolInput { pd_pass, ..input }, &cfg.tool_overrides, stats)
    });

    let fc = self.entropy_context(tile, sbo)?;
    let ctx = MdContext {
      sb_x,
      sb_y,
      geom: block_geom(sb_size),
      bounds: seq.bounds,
      source: &self.source,
      refs: &self.refs,
      mv_grid: &self.analysis.mv_grid,
      qindex,
      bit_depth: cfg.bit_depth,
      lambda: rdo::lambda(qindex, cfg.bit_depth),
      slice_type: self.slice_type,
      fc: &fc,
      modes: &tile.neighbors.modes,
      tile_y: tile.tile_y,
    };
    let part = partition_sb(&ctx, &tools).ok_or(EncoderStatus::Failure)?;
    let mut sb_fc = fc.clone();
    let out = encode_sb(&ctx, &tools[2], &part, &tile.neighbors, &mut sb_fc);

    *self.sb_contexts[index].lock().map_err(|_| EncoderStatus::Failure)? =
      Some(sb_fc);
    Ok(out)
  }

  /// Codes every superblock of `segment` in raster order.
  pub fn process_segment(
    &self, tg: usize, segment: usize,
  ) -> Result<SegmentSums, EncoderStatus> {
    let tile = &self.tile_groups[tg];
    let mut sums = SegmentSums::default();
    for sbo in tile.segments.segment_sbs(segment) {
      let out = self.encode_superblock(tile, sbo)?;
      sums.sbs += 1;
      sums.rate += out.rate;
      sums.distortion += out.distortion;
      sums.stats.accumulate(&out.stats);
      let index = sbo.index(self.seq.grid.cols);
      *self.sb_results[index].lock().map_err(|_| EncoderStatus::Failure)? =
        Some(out);
    }
    Ok(sums)
  }

  /// Adds a finished segment to the pass. The worker closing the last
  /// superblock decides between a recode and publishing.
  pub fn segment_done(
    &self, sums: SegmentSums,
  ) -> Result<Completion, EncoderStatus> {
    let mut pass = self.intra_mutex.lock().map_err(|_| EncoderStatus::Failure)?;
    pass.coded_sbs += sums.sbs;
    pass.rate += sums.rate;
    pass.distortion += sums.distortion;
    pass.stats.accumulate(&sums.stats);
    let coded = self.enc_dec_coded_sb_count.fetch_add(sums.sbs, Ordering::AcqRel)
      + sums.sbs;
    debug_assert!(coded <= self.sb_total());
    if coded < self.sb_total() {
      return Ok(Completion::Pending);
    }

    let seq = &*self.seq;
    let loop_count = self.loop_count.load(Ordering::Acquire);
    let base_q_idx = self.base_q_idx.load(Ordering::Acquire);
    let bits = pass.rate / COST_ONE_BIT as u64;
    let summary = PassSummary {
      projected_bits: bits,
      bounds: seq.rate_control.frame_bounds(self.picture_number, self.slice_type),
      base_q_idx,
      loop_count,
      max_loops: seq.config.max_recode_loops,
      is_overlay: self.is_overlay,
    };
    let mut q_range = pass.q_range;
    let decision =
      recode_decision(seq.rate_control.as_ref(), &summary, &mut q_range);
    pass.q_range = q_range;

    match decision {
      RecodeDecision::Recode { base_q_idx } => {
        pass.coded_sbs = 0;
        pass.rate = 0;
        pass.distortion = 0;
        pass.stats = SbCodingStats::default();
        self.enc_dec_coded_sb_count.store(0, Ordering::Release);
        self.base_q_idx.store(base_q_idx, Ordering::Release);
        self.loop_count.fetch_add(1, Ordering::AcqRel);
        Ok(Completion::Recode)
      }
      RecodeDecision::Publish => {
        let recon = self.assemble_recon()?;
        Ok(Completion::Publish(Box::new(FinishedPass {
          recon,
          bits,
          distortion: pass.distortion,
          stats: pass.stats,
          base_q_idx,
          loop_count,
        })))
      }
    }
  }

  /// Gathers the superblock reconstructions into a padded frame.
  fn assemble_recon(&self) -> Result<Frame<u16>, EncoderStatus> {
    let seq = &*self.seq;
    let mut recon = Frame::new(seq.bounds.width, seq.bounds.height, super::LUMA_PADDING);
    for slot in self.sb_results.iter() {
      let guard = slot.lock().map_err(|_| EncoderStatus::Failure)?;
      let out = guard.as_ref().ok_or(EncoderStatus::Failure)?;
      for (p, plane) in recon.planes.iter_mut().enumerate() {
        let (x, y, w, h) = if p == 0 {
          (out.x, out.y, out.w, out.h)
        } else {
          (out.x >> 1, out.y >> 1, out.w >> 1, out.h >> 1)
        };
        for r in 0..h {
          let range = plane.row_range(x as isize, (y + r) as isize);
          plane.data[range][..w].copy_from_slice(&out.recon[p][r * w..][..w]);
        }
      }
    }
    recon.pad(seq.bounds.width, seq.bounds.height);
    Ok(recon)
  }
}
