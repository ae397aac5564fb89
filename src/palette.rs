// Copyright (c) 2022-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Palette color selection for screen content.

use arrayvec::ArrayVec;

use crate::rdo::COST_ONE_BIT;

pub const PALETTE_MAX_SIZE: usize = 8;

pub type Palette = ArrayVec<u16, PALETTE_MAX_SIZE>;

/// Find `k` means of a sorted slice of samples.
///
/// Starts from evenly spaced samples and alternates between splitting the
/// data at the midpoints of adjacent means and recomputing the means, for
/// at most `2 * log2(len)` rounds.
pub fn kmeans(data: &[u16], k: usize) -> Palette {
  debug_assert!(data.windows(2).all(|w| w[0] <= w[1]));
  let k = k.min(PALETTE_MAX_SIZE).min(data.len());
  let mut means: Palette = ArrayVec::new();
  if k == 0 {
    return means;
  }
  if k == 1 {
    let sum: u64 = data.iter().map(|&v| v as u64).sum();
    let n = data.len() as u64;
    means.push(((sum + n / 2) / n) as u16);
    return means;
  }
  for i in 0..k {
    means.push(data[i * (data.len() - 1) / (k - 1)]);
  }

  let mut prefix = Vec::with_capacity(data.len() + 1);
  prefix.push(0u64);
  for &v in data {
    let last = prefix[prefix.len() - 1];
    prefix.push(last + v as u64);
  }

  let limit = 2 * (usize::BITS - data.len().leading_zeros());
  for _ in 0..limit {
    let mut bounds: ArrayVec<usize, { PALETTE_MAX_SIZE + 1 }> = ArrayVec::new();
    bounds.push(0);
    for w in means.windows(2) {
      let t = (w[0] as u32 + w[1] as u32 + 1) >> 1;
      bounds.push(data.partition_point(|&v| (v as u32) < t));
    }
    bounds.push(data.len());

    let mut changed = false;
    for (m, b) in means.iter_mut().zip(bounds.windows(2)) {
      let count = (b[1] - b[0]) as u64;
      if count == 0 {
        continue;
      }
      let sum = prefix[b[1]] - prefix[b[0]];
      let new_mean = ((sum + count / 2) / count) as u16;
      changed |= *m != new_mean;
      *m = new_mean;
    }
    if !changed {
      break;
    }
  }
  means.sort_unstable();
  let mut v: Vec<u16> = means.to_vec();
  v.dedup();
  v.into_iter().collect()
}

/// Palette of a `w` x `h` block: its distinct values when there are few
/// enough, else the `max_colors` means.
pub fn palette_colors(
  src: &[u16], stride: usize, w: usize, h: usize, max_colors: usize,
) -> Palette {
  let mut samples: Vec<u16> = Vec::with_capacity(w * h);
  for row in src.chunks(stride).take(h) {
    samples.extend_from_slice(&row[..w]);
  }
  samples.sort_unstable();
  let mut distinct = samples.clone();
  distinct.dedup();
  if distinct.len() <= max_colors.min(PALETTE_MAX_SIZE) {
    return distinct.into_iter().collect();
  }
  kmeans(&samples, max_colors)
}

/// Replaces every sample of the block with the nearest palette color.
pub fn palette_predict(
  src: &[u16], src_stride: usize, dst: &mut [u16], dst_stride: usize,
  w: usize, h: usize, palette: &Palette,
) {
  for (s, d) in src.chunks(src_stride).zip(dst.chunks_mut(dst_stride)).take(h)
  {
    for (sv, dv) in s[..w].iter().zip(d[..w].iter_mut()) {
      *dv = palette
        .iter()
        .copied()
        .min_by_key(|&c| (c as i32 - *sv as i32).unsigned_abs())
        .unwrap_or(*sv);
    }
  }
}

/// Rate of signaling the palette and its color index map, in
/// 1/[`COST_ONE_BIT`] bits.
pub fn palette_rate(palette: &Palette, samples: usize, bit_depth: usize) -> u32 {
  let colors = palette.len();
  if colors <= 1 {
    return (bit_depth as u32) * COST_ONE_BIT;
  }
  let index_bits = usize::BITS - (colors - 1).leading_zeros();
  let color_bits = (colors * bit_depth) as u32;
  color_bits * COST_ONE_BIT + (samples as u32 * index_bits * COST_ONE_BIT) / 2
}
