// Copyright (c) 2019-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use super::*;
use crate::partition::d1_block_count;
use crate::tools::NsqCtrls;

/// Number of leading geometry entries of a square of side `sq` mode
/// decision visits: the N block, then the shape groups the controls allow.
pub fn tot_d1_blocks(sq: usize, nsq: &NsqCtrls) -> usize {
  let in_range =
    sq >= nsq.min_nsq_block_size && sq <= nsq.max_nsq_block_size;
  let count = if !nsq.enabled || !in_range {
    1
  } else if nsq.allow_4 {
    25
  } else if nsq.allow_ab {
    17
  } else if nsq.allow_hv {
    5
  } else {
    1
  };
  count.min(d1_block_count(sq))
}

/// Fills the leaf list of `mdc` with its considered squares in coding
/// order.
pub(crate) fn build_candidates(
  ctx: &MdContext, tools: &SbToolConfig, mdc: &mut MdcSbData,
) {
  mdc.leaf_data.clear();
  for s in 0..ctx.geom.len() {
    let g = &ctx.geom[s];
    if g.sqi_mds != s || !mdc.consider_block[s] {
      continue;
    }
    debug_assert!(ctx.bounds.is_inside_md_scan(ctx.geom, s, ctx.sb_x, ctx.sb_y));
    mdc.leaf_data.push(LeafData {
      mds_idx: s,
      tot_d1_blocks: tot_d1_blocks(g.sq_size, &tools.nsq),
    });
  }
}
