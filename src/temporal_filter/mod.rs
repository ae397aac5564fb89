// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Motion compensated temporal filtering of alt-ref pictures.
//!
//! Every 64x64 block of the central picture is matched in each neighbor of
//! the window, predicted with the sharp filter and blended per sample with
//! non-local means weights. The central picture always contributes at
//! [`TF_PLANEWISE_FILTER_WEIGHT_SCALE`]. Block rows are split into segments
//! that workers filter independently; the worker closing the last segment
//! writes the result back into the picture.

mod kernel;
mod me;
mod noise;

pub use kernel::{
  decay, distance_factor, sample_weight, TF_PLANEWISE_FILTER_WEIGHT_SCALE,
  TF_SEARCH_DISTANCE_THRESHOLD, TF_WEIGHT_SCALE,
  TF_WINDOW_BLOCK_BALANCE_WEIGHT, WINDOW_LENGTH,
};
pub use me::split_decision;
pub use noise::estimate_noise;

use std::sync::{Arc, Mutex};

use crossbeam::channel::Sender;
use log::{debug, trace};
use once_cell::sync::OnceCell;

use crate::api::{AltRefWindow, EncoderStatus};
use crate::frame::{Frame, Picture};
use crate::me::{BlockRect, MePlanes};
use crate::tools::TfCtrls;
use kernel::{BlockAccumulator, NlmParams};

pub const TF_BLOCK_SIZE: usize = 64;

/// The picture to filter and its neighbors.
#[derive(Debug)]
pub struct TfInput {
  pub center: Picture,
  /// Oldest first.
  pub past: Vec<Arc<Picture>>,
  /// Nearest first.
  pub future: Vec<Arc<Picture>>,
  pub ctrls: TfCtrls,
  pub decay_control: u8,
}

impl TfInput {
  /// Keeps the neighbors of `window` nearest to the center, at most
  /// `max_past` before and `max_future` after it, within the limits of
  /// `ctrls`.
  pub fn new(
    center: Picture, window: &AltRefWindow, ctrls: TfCtrls, max_past: usize,
    max_future: usize, decay_control: u8,
  ) -> Self {
    let n_past = window.past.len().min(max_past).min(ctrls.num_past_pics);
    let n_future =
      window.future.len().min(max_future).min(ctrls.num_future_pics);
    TfInput {
      center,
      past: window.past[window.past.len() - n_past..].to_vec(),
      future: window.future[..n_future].to_vec(),
      ctrls,
      decay_control,
    }
  }
}

/// Filtered picture handed back by the last segment.
#[derive(Debug)]
pub struct TfOutput {
  pub picture: Picture,
  /// Estimated noise level of the luma plane before filtering.
  pub noise_level: f64,
}

pub type TfDone = Result<TfOutput, EncoderStatus>;

/// 16-bit copies of the window, allocated by the first segment to run.
struct TfPrep {
  /// Display order.
  frames: Vec<Frame<u16>>,
  me: Vec<MePlanes>,
  center: usize,
  params: NlmParams,
  noise_level: f64,
}

struct TfState {
  center: Option<Picture>,
  filtered: Option<Frame<u16>>,
  /// Segments finished.
  seg_acc: usize,
}

/// One alt-ref picture being filtered.
pub struct TemporalFilterJob {
  pub picture_number: u64,
  neighbors: Vec<Arc<Picture>>,
  n_past: usize,
  ctrls: TfCtrls,
  decay_control: u8,
  bit_depth: usize,
  min_frame_size: usize,
  block_cols: usize,
  block_rows: usize,
  segment_count: usize,
  prep: OnceCell<TfPrep>,
  state: Mutex<TfState>,
  done: Sender<TfDone>,
}

impl TemporalFilterJob {
  pub fn new(
    picture_number: u64, input: TfInput, segments: usize,
    done: Sender<TfDone>,
  ) -> Self {
    let TfInput { center, past, future, ctrls, decay_control } = input;
    let w = center.aligned_width();
    let h = center.aligned_height();
    let block_cols = (w + TF_BLOCK_SIZE - 1) / TF_BLOCK_SIZE;
    let block_rows = (h + TF_BLOCK_SIZE - 1) / TF_BLOCK_SIZE;
    let n_past = past.len();
    TemporalFilterJob {
      picture_number,
      neighbors: past.into_iter().chain(future).collect(),
      n_past,
      ctrls,
      decay_control,
      bit_depth: center.bit_depth,
      min_frame_size: center.width.min(center.height),
      block_cols,
      block_rows,
      segment_count: segments.clamp(1, block_rows.max(1)),
      prep: OnceCell::new(),
      state: Mutex::new(TfState {
        center: Some(center),
        filtered: None,
        seg_acc: 0,
      }),
      done,
    }
  }

  #[inline]
  pub fn segment_count(&self) -> usize {
    self.segment_count
  }

  /// Reports a failure to the picture waiting on the filter.
  pub fn fail(&self, e: EncoderStatus) {
    let _ = self.done.send(Err(e));
  }

  fn prepare(&self) -> Result<&TfPrep, EncoderStatus> {
    self.prep.get_or_try_init(|| {
      let n = self.neighbors.len() + 1;
      let mut frames = Vec::new();
      frames.try_reserve_exact(n).map_err(|_| EncoderStatus::AllocationFailure)?;
      let mut me = Vec::new();
      me.try_reserve_exact(n).map_err(|_| EncoderStatus::AllocationFailure)?;

      let center = {
        let mut state = self.state.lock().map_err(|_| EncoderStatus::Failure)?;
        let pic = state.center.as_ref().ok_or(EncoderStatus::Failure)?;
        let center = pic.to_highbd();
        state.filtered = Some(center.clone());
        center
      };
      let (w, h) = (center.width(), center.height());

      let mut noise = [0f64; 3];
      for (p, n) in noise.iter_mut().enumerate() {
        let plane = &center.planes[p];
        *n = estimate_noise(plane, plane.cfg.width, plane.cfg.height, self.bit_depth)
          .unwrap_or(0.0);
      }
      let n_decay = noise.map(|n| decay(self.decay_control, n));
      debug!(
        "[TF] picture {}: noise {:.3}, decay {:.3}, {} neighbors",
        self.picture_number,
        noise[0],
        n_decay[0],
        self.neighbors.len()
      );

      for (i, pic) in self.neighbors.iter().enumerate() {
        if i == self.n_past {
          frames.push(center.clone());
        }
        let f = pic.to_highbd();
        if f.width() != w || f.height() != h {
          return Err(EncoderStatus::NotReady);
        }
        frames.push(f);
      }
      if frames.len() == self.n_past {
        frames.push(center);
      }
      me.extend(frames.iter().map(|f| MePlanes::new(&f.planes[0])));

      Ok(TfPrep {
        frames,
        me,
        center: self.n_past,
        params: NlmParams {
          n_decay,
          min_frame_size: self.min_frame_size,
          bit_depth: self.bit_depth,
        },
        noise_level: noise[0],
      })
    })
  }

  fn filter_block(&self, prep: &TfPrep, bx: usize, by: usize) -> BlockAccumulator {
    let center = &prep.frames[prep.center];
    let (w, h) = (center.width(), center.height());
    let (x0, y0) = (bx * TF_BLOCK_SIZE, by * TF_BLOCK_SIZE);
    let luma = BlockRect::new(
      x0,
      y0,
      TF_BLOCK_SIZE.min(w - x0),
      TF_BLOCK_SIZE.min(h - y0),
    );

    let mut acc = BlockAccumulator::new(luma);
    acc.add_center(center);
    for (i, frame) in prep.frames.iter().enumerate() {
      if i == prep.center {
        continue;
      }
      let distant = if i < prep.center {
        prep.center - i > self.ctrls.max_64x64_past_pics
      } else {
        i - prep.center > self.ctrls.max_64x64_future_pics
      };
      let motion = me::search_block(
        &prep.me[prep.center],
        &prep.me[i],
        luma,
        &self.ctrls,
        distant,
        self.bit_depth,
      );
      match motion {
        Some(m) => acc.add_reference(center, frame, &m, &prep.params),
        None => trace!("[TF] block {},{} skips neighbor {}", bx, by, i),
      }
    }
    acc
  }

  /// Filters the block rows of `segment`. The call closing the last
  /// segment unpacks the result into the picture and sends it.
  pub fn process_segment(&self, segment: usize) -> Result<(), EncoderStatus> {
    let prep = self.prepare()?;
    let rows = (segment * self.block_rows / self.segment_count)
      ..((segment + 1) * self.block_rows / self.segment_count);
    for by in rows {
      for bx in 0..self.block_cols {
        let acc = self.filter_block(prep, bx, by);
        let mut state = self.state.lock().map_err(|_| EncoderStatus::Failure)?;
        let filtered = state.filtered.as_mut().ok_or(EncoderStatus::Failure)?;
        acc.normalize_into(filtered);
      }
    }

    let mut state = self.state.lock().map_err(|_| EncoderStatus::Failure)?;
    state.seg_acc += 1;
    if state.seg_acc < self.segment_count {
      return Ok(());
    }
    let mut filtered =
      state.filtered.take().ok_or(EncoderStatus::Failure)?;
    let mut picture = state.center.take().ok_or(EncoderStatus::Failure)?;
    drop(state);
    filtered.pad(filtered.width(), filtered.height());
    picture.store_highbd(&filtered);
    let _ = self
      .done
      .send(Ok(TfOutput { picture, noise_level: prep.noise_level }));
    Ok(())
  }
}

#[cfg(test)]
pub(crate) mod test {
  use super::*;
  use crate::frame::{Plane, PlaneExt};
  use crate::tools::TF_CTRLS;
  use crossbeam::channel::unbounded;
  use rand::{Rng, SeedableRng};
  use rand_chacha::ChaChaRng;

  /// Smooth random field: a coarse random grid interpolated bilinearly.
  pub(crate) fn field_plane(seed: u8, w: usize, h: usize) -> Plane<u16> {
    const CELL: usize = 16;
    let mut ra = ChaChaRng::from_seed([seed; 32]);
    let gw = w / CELL + 2;
    let grid: Vec<i32> =
      (0..gw * (h / CELL + 2)).map(|_| ra.gen_range(16..240)).collect();
    let mut p = Plane::new(w, h, 0, 0, 32, 32);
    for y in 0..h {
      for x in 0..w {
        let (gx, gy) = (x / CELL, y / CELL);
        let (fx, fy) = ((x % CELL) as i32, (y % CELL) as i32);
        let g = |i: usize, j: usize| grid[j * gw + i];
        let top = g(gx, gy) * (16 - fx) + g(gx + 1, gy) * fx;
        let bot = g(gx, gy + 1) * (16 - fx) + g(gx + 1, gy + 1) * fx;
        let v = (top * (16 - fy) + bot * fy + 128) >> 8;
        p.set(x, y, (v + ra.gen_range(0..4)) as u16);
      }
    }
    p.pad(w, h);
    p
  }

  /// `src` moved by `(dx, dy)`.
  pub(crate) fn shifted_plane(
    src: &Plane<u16>, dx: isize, dy: isize,
  ) -> Plane<u16> {
    let (w, h) = (src.cfg.width, src.cfg.height);
    let mut p = Plane::new_like(src);
    for y in 0..h {
      for x in 0..w {
        p.set(x, y, src.p_clamped(x as isize - dx, y as isize - dy));
      }
    }
    p.pad(w, h);
    p
  }

  fn run(job: &TemporalFilterJob) {
    for s in 0..job.segment_count() {
      job.process_segment(s).unwrap();
    }
  }

  fn flat_picture(v: u16, bit_depth: usize) -> Picture {
    let mut f = Frame::<u16>::new(128, 128, 32);
    for plane in f.planes.iter_mut() {
      plane.data.iter_mut().for_each(|s| *s = v);
    }
    Picture::from_highbd(&f, bit_depth)
  }

  fn noisy_picture(clean: &Frame<u16>, seed: u8, amp: u16) -> Picture {
    let mut ra = ChaChaRng::from_seed([seed; 32]);
    let mut f = clean.clone();
    for plane in f.planes.iter_mut() {
      let (w, h) = (plane.cfg.width, plane.cfg.height);
      for y in 0..h {
        for x in 0..w {
          let v = plane.p(x, y) + ra.gen_range(0..amp);
          plane.set(x, y, v.min(255));
        }
      }
    }
    f.pad(128, 128);
    Picture::from_highbd(&f, 8)
  }

  fn clean_frame() -> Frame<u16> {
    let mut f = Frame::<u16>::new(128, 128, 32);
    f.planes[0] = field_plane(11, 128, 128);
    for p in 1..3 {
      let c = field_plane(12 + p as u8, 64, 64);
      f.planes[p].copy_from(&c);
      f.planes[p].pad(128, 128);
    }
    f
  }

  #[test]
  fn no_neighbors_is_identity() {
    let clean = clean_frame();
    let center = noisy_picture(&clean, 1, 8);
    let input = TfInput::new(
      center.clone(),
      &AltRefWindow::default(),
      TF_CTRLS[1],
      3,
      3,
      4,
    );
    let (tx, rx) = unbounded();
    let job = TemporalFilterJob::new(0, input, 2, tx);
    run(&job);
    let out = rx.recv().unwrap().unwrap();
    assert_eq!(out.picture, center);
  }

  #[test]
  fn uniform_window_is_unchanged() {
    let center = flat_picture(128, 8);
    let window = AltRefWindow {
      past: (0..3).map(|_| Arc::new(flat_picture(128, 8))).collect(),
      future: (0..3).map(|_| Arc::new(flat_picture(128, 8))).collect(),
    };
    let input = TfInput::new(center.clone(), &window, TF_CTRLS[1], 3, 3, 4);
    assert_eq!((input.past.len(), input.future.len()), (3, 3));
    let (tx, rx) = unbounded();
    let job = TemporalFilterJob::new(0, input, 1, tx);
    run(&job);
    let out = rx.recv().unwrap().unwrap();
    assert_eq!(out.picture, center);
    assert_eq!(out.noise_level, 0.0);
  }

  #[test]
  fn window_keeps_the_nearest_neighbors() {
    let pics: Vec<_> = (0..4).map(|i| Arc::new(flat_picture(i, 8))).collect();
    let window = AltRefWindow { past: pics.clone(), future: pics.clone() };
    let input =
      TfInput::new(flat_picture(9, 8), &window, TF_CTRLS[2], 3, 1, 4);
    assert_eq!(input.past.len(), 2);
    assert_eq!(input.past[1], pics[3]);
    assert_eq!(input.future.len(), 1);
    assert_eq!(input.future[0], pics[0]);
  }

  #[test]
  fn filtering_reduces_noise() {
    let clean = clean_frame();
    let center = noisy_picture(&clean, 1, 12);
    let window = AltRefWindow {
      past: vec![Arc::new(noisy_picture(&clean, 2, 12))],
      future: vec![Arc::new(noisy_picture(&clean, 3, 12))],
    };
    let input = TfInput::new(center.clone(), &window, TF_CTRLS[1], 3, 3, 4);
    let (tx, rx) = unbounded();
    let job = TemporalFilterJob::new(0, input, 2, tx);
    run(&job);
    let out = rx.recv().unwrap().unwrap();
    assert!(out.noise_level > 0.0);

    // The noise has a positive mean, so compare against the shifted clean
    // frame.
    let mse = |pic: &Picture| {
      let mut sse = 0i64;
      for y in 0..128 {
        for x in 0..128 {
          let d = pic.sample(0, x, y) as i64 - clean.planes[0].p(x, y) as i64 - 6;
          sse += d * d;
        }
      }
      sse
    };
    assert!(mse(&out.picture) < mse(&center));
  }

  #[test]
  fn ten_bit_uniform_survives_the_split() {
    let center = flat_picture(515, 10);
    let window = AltRefWindow {
      past: vec![Arc::new(flat_picture(515, 10))],
      future: vec![Arc::new(flat_picture(515, 10))],
    };
    let input = TfInput::new(center.clone(), &window, TF_CTRLS[3], 3, 3, 2);
    let (tx, rx) = unbounded();
    let job = TemporalFilterJob::new(0, input, 1, tx);
    run(&job);
    let out = rx.recv().unwrap().unwrap();
    assert_eq!(out.picture.sample(0, 70, 70), 515);
    assert_eq!(out.picture, center);
  }
}
