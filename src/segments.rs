// Copyright (c) 2019-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Wavefront scheduling of superblock segments.
//!
//! A tile group is cut into `row_count` x `band_count` segments. Segment
//! `(r, c)` waits for its left neighbor `(r, c - 1)` and for the segment
//! above and to the right, `(r - 1, c + 1)` (or `(r - 1, c)` in the last
//! band). Each row keeps its pending-dependency counts and its next
//! unstarted segment behind one mutex, held only for the decrement and the
//! bump.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::context::{SbGrid, SuperBlockOffset};

/// Work item of the Enc-Dec stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentTask {
  /// A whole picture (or a re-encode of it): start at segment 0.
  MdcInput,
  /// Resume a row whose next segment just became ready.
  EncDecInput { row: usize },
  /// The sender finished `segment` and wants the next one.
  Continue { segment: usize },
}

#[derive(Debug)]
struct SegmentRow {
  /// Next segment of the row nobody has started.
  current: usize,
  /// Pending dependencies of every segment of the row.
  deps: Vec<u8>,
}

/// Result of [`EncDecSegments::assign`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Assignment {
  /// Segment the caller processes next, if any.
  pub segment: Option<usize>,
  /// Row whose next segment the caller must hand to another worker.
  pub post_row: Option<usize>,
}

/// Segment layout and dependency state of one tile group.
#[derive(Debug)]
pub struct EncDecSegments {
  pub row_count: usize,
  pub band_count: usize,
  /// Superblock rows `[sb_row_start, sb_row_end)` of the tile group.
  sb_row_start: usize,
  sb_row_end: usize,
  sb_cols: usize,
  rows: Vec<Mutex<SegmentRow>>,
}

/// Locks a row even if a worker panicked while holding it. The counters
/// are only ever written in whole steps, so the state stays consistent.
fn lock(row: &Mutex<SegmentRow>) -> MutexGuard<'_, SegmentRow> {
  row.lock().unwrap_or_else(PoisonError::into_inner)
}

#[inline]
fn initial_deps(row: usize, band: usize) -> u8 {
  (band > 0) as u8 + (row > 0) as u8
}

impl EncDecSegments {
  /// Lays out at most `row_count` x `band_count` segments over the
  /// superblock rows `sb_rows` of `grid`.
  pub fn new(
    grid: &SbGrid, sb_rows: std::ops::Range<usize>, row_count: usize,
    band_count: usize,
  ) -> Self {
    let row_count = row_count.clamp(1, sb_rows.len().max(1));
    let band_count = band_count.clamp(1, grid.cols.max(1));
    let rows = (0..row_count)
      .map(|r| {
        Mutex::new(SegmentRow {
          current: 0,
          deps: (0..band_count).map(|c| initial_deps(r, c)).collect(),
        })
      })
      .collect();
    EncDecSegments {
      row_count,
      band_count,
      sb_row_start: sb_rows.start,
      sb_row_end: sb_rows.end,
      sb_cols: grid.cols,
      rows,
    }
  }

  #[inline]
  pub fn total(&self) -> usize {
    self.row_count * self.band_count
  }

  #[inline]
  pub fn index(&self, row: usize, band: usize) -> usize {
    row * self.band_count + band
  }

  fn band_cols(&self, band: usize) -> std::ops::Range<usize> {
    (band * self.sb_cols / self.band_count)
      ..((band + 1) * self.sb_cols / self.band_count)
  }

  fn row_sbs(&self, row: usize) -> std::ops::Range<usize> {
    let n = self.sb_row_end - self.sb_row_start;
    (self.sb_row_start + row * n / self.row_count)
      ..(self.sb_row_start + (row + 1) * n / self.row_count)
  }

  /// Superblocks of `segment`, in raster order.
  pub fn segment_sbs(
    &self, segment: usize,
  ) -> impl Iterator<Item = SuperBlockOffset> {
    let (row, band) = (segment / self.band_count, segment % self.band_count);
    let cols = self.band_cols(band);
    self.row_sbs(row).flat_map(move |y| {
      cols.clone().map(move |x| SuperBlockOffset { x, y })
    })
  }

  fn position(&self, sbo: SuperBlockOffset) -> (usize, usize) {
    let row = (0..self.row_count)
      .rev()
      .find(|&r| self.row_sbs(r).start <= sbo.y)
      .unwrap_or(0);
    let band = (0..self.band_count)
      .rev()
      .find(|&c| self.band_cols(c).start <= sbo.x)
      .unwrap_or(0);
    (row, band)
  }

  /// Whether the superblock above and to the right of `sbo` is always
  /// complete once `sbo` starts: it lies in an earlier segment row, or it
  /// comes earlier in the same segment.
  pub fn top_right_available(&self, sbo: SuperBlockOffset) -> bool {
    if sbo.y == self.sb_row_start || sbo.x + 1 >= self.sb_cols {
      return false;
    }
    let tr = SuperBlockOffset { x: sbo.x + 1, y: sbo.y - 1 };
    let (row, band) = self.position(sbo);
    let (tr_row, tr_band) = self.position(tr);
    tr_row < row || tr_band == band
  }

  /// Restores every dependency count for a new pass over the picture.
  pub fn reset(&self) {
    for (r, row) in self.rows.iter().enumerate() {
      let mut row = lock(row);
      row.current = 0;
      for (c, d) in row.deps.iter_mut().enumerate() {
        *d = initial_deps(r, c);
      }
    }
  }

  /// Decrements the dependencies of `(row, band)`. Returns whether the
  /// segment became ready. A ready segment is claimed when `claim` is set.
  fn release(&self, row: usize, band: usize, claim: bool) -> bool {
    let mut state = lock(&self.rows[row]);
    debug_assert!(state.deps[band] > 0, "segment ({row}, {band}) released twice");
    state.deps[band] = state.deps[band].saturating_sub(1);
    if state.deps[band] != 0 {
      return false;
    }
    debug_assert_eq!(state.current, band);
    if claim {
      state.current += 1;
    }
    true
  }

  /// Picks the next segment for a worker handling `task`.
  pub fn assign(&self, task: SegmentTask) -> Assignment {
    match task {
      SegmentTask::MdcInput => {
        self.reset();
        lock(&self.rows[0]).current = 1;
        log::trace!("assigned segment 0");
        Assignment { segment: Some(0), post_row: None }
      }
      SegmentTask::EncDecInput { row } => {
        let Some(state) = self.rows.get(row) else {
          return Assignment::default();
        };
        let mut state = lock(state);
        if state.current < self.band_count && state.deps[state.current] == 0 {
          let band = state.current;
          state.current += 1;
          log::trace!("row {} resumes at band {}", row, band);
          Assignment { segment: Some(self.index(row, band)), post_row: None }
        } else {
          Assignment::default()
        }
      }
      SegmentTask::Continue { segment } => {
        if segment >= self.total() {
          return Assignment::default();
        }
        let (row, band) = (segment / self.band_count, segment % self.band_count);
        let mut out = Assignment::default();

        if band + 1 < self.band_count && self.release(row, band + 1, true) {
          out.segment = Some(self.index(row, band + 1));
        }

        if row + 1 < self.row_count {
          let last = self.band_count - 1;
          let targets = [
            (band > 0).then(|| band - 1),
            (band == last).then_some(band),
          ];
          for t in targets.into_iter().flatten() {
            let claim = out.segment.is_none();
            if self.release(row + 1, t, claim) {
              if claim {
                out.segment = Some(self.index(row + 1, t));
              } else {
                log::trace!("posting row {}", row + 1);
                out.post_row = Some(row + 1);
              }
            }
          }
        }
        out
      }
    }
  }
}
