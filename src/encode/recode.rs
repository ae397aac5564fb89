// Copyright (c) 2019-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::api::{FrameBounds, QRange, RateControl};

/// State of one finished encode pass over a picture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PassSummary {
  pub projected_bits: u64,
  pub bounds: FrameBounds,
  pub base_q_idx: u8,
  /// Encode passes done, this one included.
  pub loop_count: usize,
  pub max_loops: usize,
  pub is_overlay: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecodeDecision {
  Publish,
  Recode { base_q_idx: u8 },
}

/// Decides whether the picture is coded again. `range` holds the quantizer
/// indices still open and is narrowed by the rate control.
pub fn recode_decision(
  rc: &dyn RateControl, pass: &PassSummary, range: &mut QRange,
) -> RecodeDecision {
  let bits = pass.projected_bits;
  if pass.bounds.contains(bits) {
    return RecodeDecision::Publish;
  }
  if pass.loop_count >= pass.max_loops {
    log::debug!(
      "{} bits outside {}..={} after {} loops, publishing",
      bits,
      pass.bounds.low,
      pass.bounds.high,
      pass.loop_count
    );
    return RecodeDecision::Publish;
  }
  if pass.is_overlay && bits <= pass.bounds.high {
    return RecodeDecision::Publish;
  }
  let q = pass.base_q_idx;
  let new_q = rc.regulate_q(bits, pass.bounds, q, range);
  log::debug!(
    "{} bits outside {}..={}: q {} -> {} (range {}..={})",
    bits,
    pass.bounds.low,
    pass.bounds.high,
    q,
    new_q,
    range.low,
    range.high
  );
  if new_q == q {
    RecodeDecision::Publish
  } else {
    RecodeDecision::Recode { base_q_idx: new_q }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::api::FixedRateControl;

  fn pass(projected_bits: u64, loop_count: usize) -> PassSummary {
    PassSummary {
      projected_bits,
      bounds: FrameBounds { low: 900, high: 1100 },
      base_q_idx: 100,
      loop_count,
      max_loops: 4,
      is_overlay: false,
    }
  }

  #[test]
  fn oversized_pass_is_recoded_with_a_higher_q() {
    let rc = FixedRateControl::new(1000, 10);
    let mut range = QRange { low: 0, high: 255 };
    match recode_decision(&rc, &pass(1200, 1), &mut range) {
      RecodeDecision::Recode { base_q_idx } => assert!(base_q_idx > 100),
      d => panic!("unexpected {:?}", d),
    }
    assert_eq!(range.low, 101);
  }

  #[test]
  fn in_range_pass_is_published() {
    let rc = FixedRateControl::new(1000, 10);
    let mut range = QRange { low: 0, high: 255 };
    assert_eq!(
      recode_decision(&rc, &pass(1000, 1), &mut range),
      RecodeDecision::Publish
    );
    assert_eq!(range, QRange { low: 0, high: 255 });
  }

  #[test]
  fn loop_limit_publishes_regardless() {
    let rc = FixedRateControl::new(1000, 10);
    let mut range = QRange { low: 0, high: 255 };
    assert_eq!(
      recode_decision(&rc, &pass(5000, 4), &mut range),
      RecodeDecision::Publish
    );
  }

  #[test]
  fn small_overlays_are_never_retried() {
    let rc = FixedRateControl::new(1000, 10);
    let mut range = QRange { low: 0, high: 255 };
    let overlay = PassSummary { is_overlay: true, ..pass(100, 1) };
    assert_eq!(
      recode_decision(&rc, &overlay, &mut range),
      RecodeDecision::Publish
    );
    let big = PassSummary { is_overlay: true, ..pass(2000, 1) };
    assert!(matches!(
      recode_decision(&rc, &big, &mut range),
      RecodeDecision::Recode { .. }
    ));
  }

  #[test]
  fn exhausted_range_publishes() {
    let rc = FixedRateControl::new(1000, 10);
    let mut range = QRange { low: 255, high: 255 };
    let p = PassSummary { base_q_idx: 255, ..pass(5000, 1) };
    assert_eq!(recode_decision(&rc, &p, &mut range), RecodeDecision::Publish);
  }
}
