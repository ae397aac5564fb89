// Copyright (c) 2018-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.
#![deny(missing_docs)]

use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use log::{debug, info};
use rayon::ThreadPool;

use crate::analysis::analyze_picture;
use crate::api::config::{Config, EncoderConfig};
use crate::api::util::*;
use crate::encode::{
  PictureControlSet, PictureParams, RefHandle, RefPool, Sequence,
  WorkerMessage, Workers, LUMA_PADDING,
};
use crate::frame::{Frame, Picture, PlaneExt, FRAME_MARGIN};
use crate::me::MePlanes;
use crate::segments::SegmentTask;
use crate::temporal_filter::{TemporalFilterJob, TfInput, TfOutput};
use crate::tools::TfCtrls;

/// Reconstructions kept for prediction, newest first.
pub const MAX_REFS: usize = 2;

/// The encoder session.
///
/// Pictures are coded one at a time, in the order they are given. Every
/// picture is split into tile groups and segments that the workers of the
/// session's thread pool code concurrently.
pub struct Encoder {
  seq: Arc<Sequence>,
  workers: Workers,
  refs: RefPool,
  /// Newest first.
  ref_list: VecDeque<RefHandle>,
  picture_number: u64,
  flushed: bool,
  // Dropped last: the workers run on it.
  _pool: ThreadPool,
}

impl Encoder {
  pub(crate) fn new(config: &Config, pool: ThreadPool) -> Self {
    let seq = Arc::new(Sequence::new(config));
    let workers = Workers::spawn(&seq, &pool);
    info!(
      "{}x{} {}-bit, preset {:?}, {} workers",
      seq.config.width,
      seq.config.height,
      seq.config.bit_depth,
      seq.config.preset,
      workers.count
    );
    Encoder {
      seq,
      workers,
      refs: RefPool::new(),
      ref_list: VecDeque::with_capacity(MAX_REFS + 1),
      picture_number: 0,
      flushed: false,
      _pool: pool,
    }
  }

  /// Settings the encoder was created with.
  pub fn config(&self) -> &EncoderConfig {
    &self.seq.config
  }

  /// Allocates a picture in the configured format, ready to be filled
  /// with [`Picture::copy_from_raw`].
  pub fn new_picture(&self) -> Picture {
    let cfg = &self.seq.config;
    Picture::new(cfg.width, cfg.height, cfg.bit_depth, FRAME_MARGIN)
  }

  /// Pictures published so far.
  pub fn total_recon_frames(&self) -> u64 {
    self.seq.total_recon_frames.load(Ordering::Acquire)
  }

  /// Reconstructions currently held for prediction.
  pub fn live_references(&self) -> usize {
    self.refs.live()
  }

  fn check_format(&self, picture: &Picture) -> Result<(), EncoderStatus> {
    let cfg = &self.seq.config;
    if picture.width != cfg.width
      || picture.height != cfg.height
      || picture.bit_depth != cfg.bit_depth
      || picture.is_split() != (cfg.bit_depth > 8)
    {
      return Err(EncoderStatus::NotReady);
    }
    Ok(())
  }

  /// Codes one picture and returns its reconstruction and statistics.
  ///
  /// Alt-ref pictures are temporally filtered first when the preset
  /// enables it. A picture marked as the end of the stream flushes the
  /// encoder once it is published.
  ///
  /// # Errors
  ///
  /// - `NotReady` if the picture, or one of its alt-ref neighbors, does
  ///   not match the configured format, or if an inter picture has no
  ///   reconstruction to predict from.
  /// - `LimitReached` once the encoder has been flushed.
  /// - `AllocationFailure` and `Failure` if a worker stopped.
  pub fn encode(
    &mut self, input: PictureInput,
  ) -> Result<EncodedPicture, EncoderStatus> {
    if self.flushed {
      return Err(EncoderStatus::LimitReached);
    }
    let PictureInput {
      mut picture,
      slice_type,
      temporal_layer,
      is_overlay,
      altref,
      end_of_stream,
    } = input;
    self.check_format(&picture)?;
    if let Some(window) = &altref {
      for p in window.past.iter().chain(window.future.iter()) {
        self.check_format(p)?;
      }
    }
    if !slice_type.is_intra() && self.ref_list.is_empty() {
      return Err(EncoderStatus::NotReady);
    }

    let picture_number = self.picture_number;
    self.picture_number += 1;
    let cfg = self.seq.config;
    let original = if cfg.compute_psnr || cfg.compute_ssim {
      Some(picture.save())
    } else {
      None
    };

    let tools = self.seq.picture_tools(slice_type, temporal_layer);
    let mut tf_noise_level = None;
    if let Some(window) = altref.as_ref().filter(|_| tools.tf.enabled) {
      let out =
        self.temporal_filter(picture_number, picture, window, tools.tf)?;
      picture = out.picture;
      tf_noise_level = Some(out.noise_level);
    }

    let source = self.padded_source(&picture);
    let mut acquired = Vec::with_capacity(self.ref_list.len());
    let mut refs = Vec::with_capacity(self.ref_list.len());
    if !slice_type.is_intra() {
      for &handle in self.ref_list.iter() {
        refs.push(self.refs.acquire(handle)?);
        acquired.push(handle);
      }
    }

    let org = MePlanes::new(&source.planes[0]);
    let rf = refs.first().map(|f| MePlanes::new(&f.planes[0]));
    let analysis = analyze_picture(
      &org,
      rf.as_ref(),
      &self.seq.grid,
      self.seq.bounds.width,
      self.seq.bounds.height,
    );

    let params = PictureParams {
      picture_number,
      slice_type,
      temporal_layer,
      is_overlay,
      end_of_stream,
      source,
      original,
      refs,
      analysis,
      tf_noise_level,
    };
    let result = self.code_picture(params);
    for handle in acquired {
      self.refs.release(handle)?;
    }
    let (encoded, recon) = result?;

    let handle = self.refs.insert(picture_number, recon)?;
    self.ref_list.push_front(handle);
    if self.ref_list.len() > MAX_REFS {
      if let Some(old) = self.ref_list.pop_back() {
        self.refs.release(old)?;
      }
    }

    if end_of_stream {
      self.flush();
    }
    Ok(encoded)
  }

  /// Stops the workers. Later calls to [`Encoder::encode`] return
  /// `LimitReached`.
  pub fn flush(&mut self) {
    if self.flushed {
      return;
    }
    debug!("flushing after {} pictures", self.picture_number);
    self.workers.shutdown();
    self.flushed = true;
  }

  /// Copies the picture into a frame padded for motion search.
  fn padded_source(&self, picture: &Picture) -> Frame<u16> {
    let packed = picture.to_highbd();
    let (w, h) = (self.seq.bounds.width, self.seq.bounds.height);
    let mut source = Frame::new(w, h, LUMA_PADDING);
    for (dst, src) in source.planes.iter_mut().zip(packed.planes.iter()) {
      dst.copy_from(src);
    }
    source.pad(w, h);
    source
  }

  fn temporal_filter(
    &self, picture_number: u64, center: Picture, window: &AltRefWindow,
    ctrls: TfCtrls,
  ) -> Result<TfOutput, EncoderStatus> {
    let cfg = &self.seq.config;
    let input = TfInput::new(
      center,
      window,
      ctrls,
      cfg.tf_past_frames,
      cfg.tf_future_frames,
      cfg.tf_decay_control,
    );
    let (done, rx) = crossbeam::channel::unbounded();
    let job = Arc::new(TemporalFilterJob::new(
      picture_number,
      input,
      cfg.segment_rows * cfg.segment_cols,
      done,
    ));
    for segment in 0..job.segment_count() {
      self
        .workers
        .post(WorkerMessage::TemporalFilter { job: job.clone(), segment })?;
    }
    drop(job);
    rx.recv().map_err(|_| EncoderStatus::Failure)?
  }

  fn code_picture(
    &self, params: PictureParams,
  ) -> Result<(EncodedPicture, Arc<Frame<u16>>), EncoderStatus> {
    let (done, rx) = crossbeam::channel::unbounded();
    let pcs = Arc::new(PictureControlSet::new(self.seq.clone(), params, done));
    for tile_group in 0..pcs.tile_groups.len() {
      self.workers.post(WorkerMessage::EncDec {
        pcs: pcs.clone(),
        tile_group,
        task: SegmentTask::MdcInput,
      })?;
    }
    drop(pcs);
    rx.recv().map_err(|_| EncoderStatus::Failure)?
  }
}

impl Drop for Encoder {
  fn drop(&mut self) {
    self.flush();
  }
}
