// Copyright (c) 2018-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! The Enc-Dec workers.
//!
//! Every worker pulls from one shared FIFO. A `None` is the shutdown
//! sentinel; each worker consumes exactly one and acknowledges its exit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::channel::{Receiver, Sender};
use log::{debug, error, trace};
use rayon::ThreadPool;

use super::picture::{Completion, PictureControlSet};
use super::recon::publish;
use super::Sequence;
use crate::api::{EncodeErrorKind, EncoderStatus};
use crate::segments::SegmentTask;
use crate::temporal_filter::TemporalFilterJob;

pub(crate) enum WorkerMessage {
  EncDec { pcs: Arc<PictureControlSet>, tile_group: usize, task: SegmentTask },
  TemporalFilter { job: Arc<TemporalFilterJob>, segment: usize },
}

pub(crate) type WorkQueue = Sender<Option<WorkerMessage>>;

/// Codes segments of one tile group until the scheduler has nothing ready
/// for this worker.
fn enc_dec(
  pcs: Arc<PictureControlSet>, tg: usize, task: SegmentTask,
  queue: &WorkQueue,
) -> Result<(), EncoderStatus> {
  let segments = &pcs.tile_groups[tg].segments;
  let post = |row: usize| {
    let msg = WorkerMessage::EncDec {
      pcs: pcs.clone(),
      tile_group: tg,
      task: SegmentTask::EncDecInput { row },
    };
    queue.send(Some(msg)).map_err(|_| EncoderStatus::Failure)
  };

  let mut next = match task {
    SegmentTask::MdcInput => pcs.start_tile_group(tg),
    task => {
      let a = segments.assign(task);
      if let Some(row) = a.post_row {
        post(row)?;
      }
      a.segment
    }
  };

  while let Some(segment) = next {
    trace!(
      "picture {} tile group {} segment {}",
      pcs.picture_number,
      tg,
      segment
    );
    let sums = pcs.process_segment(tg, segment)?;
    let a = segments.assign(SegmentTask::Continue { segment });
    if let Some(row) = a.post_row {
      post(row)?;
    }
    match pcs.segment_done(sums)? {
      Completion::Pending => next = a.segment,
      Completion::Recode => {
        for tile_group in 0..pcs.tile_groups.len() {
          let msg = WorkerMessage::EncDec {
            pcs: pcs.clone(),
            tile_group,
            task: SegmentTask::MdcInput,
          };
          queue.send(Some(msg)).map_err(|_| EncoderStatus::Failure)?;
        }
        return Ok(());
      }
      Completion::Publish(pass) => return publish(&pcs, *pass),
    }
  }
  Ok(())
}

fn worker_loop(
  id: usize, seq: Arc<Sequence>, rx: Receiver<Option<WorkerMessage>>,
  queue: WorkQueue, ack: Sender<()>, live: Arc<AtomicUsize>,
) {
  debug!("worker {} started", id);
  for msg in rx.iter() {
    let Some(msg) = msg else {
      debug!("worker {} shutting down", id);
      break;
    };
    let failed = match msg {
      WorkerMessage::EncDec { pcs, tile_group, task } => {
        let done = pcs.done.clone();
        enc_dec(pcs, tile_group, task, &queue).err().map(|e| {
          let _ = done.send(Err(e));
          e
        })
      }
      WorkerMessage::TemporalFilter { job, segment } => {
        job.process_segment(segment).err().map(|e| {
          job.fail(e);
          e
        })
      }
    };
    if let Some(e) = failed {
      error!("worker {} stopped: {}", id, e);
      if let Some(cb) = &seq.callback {
        cb.error(EncodeErrorKind::Worker(e));
      }
      break;
    }
  }
  live.fetch_sub(1, Ordering::AcqRel);
  let _ = ack.send(());
}

/// Handles on the running workers.
pub(crate) struct Workers {
  pub queue: WorkQueue,
  pub count: usize,
  pub live: Arc<AtomicUsize>,
  acks: Receiver<()>,
}

impl Workers {
  /// Starts one worker per thread of `pool`.
  pub fn spawn(seq: &Arc<Sequence>, pool: &ThreadPool) -> Self {
    let count = pool.current_num_threads().max(1);
    let (queue, rx) = crossbeam::channel::unbounded();
    let (ack, acks) = crossbeam::channel::unbounded();
    let live = Arc::new(AtomicUsize::new(count));
    for id in 0..count {
      let seq = seq.clone();
      let rx = rx.clone();
      let queue = queue.clone();
      let ack = ack.clone();
      let live = live.clone();
      pool.spawn_fifo(move || worker_loop(id, seq, rx, queue, ack, live));
    }
    Workers { queue, count, live, acks }
  }

  #[inline]
  pub fn alive(&self) -> bool {
    self.live.load(Ordering::Acquire) > 0
  }

  pub fn post(&self, msg: WorkerMessage) -> Result<(), EncoderStatus> {
    if !self.alive() {
      return Err(EncoderStatus::Failure);
    }
    self.queue.send(Some(msg)).map_err(|_| EncoderStatus::Failure)
  }

  /// Posts one sentinel per worker and waits for every worker to exit.
  pub fn shutdown(&mut self) {
    for _ in 0..self.count {
      let _ = self.queue.send(None);
    }
    for _ in 0..self.count {
      if self.acks.recv().is_err() {
        break;
      }
    }
    self.count = 0;
  }
}
