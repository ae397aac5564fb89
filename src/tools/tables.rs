// Copyright (c) 2020-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Control structs of the coding tools and the knob tuple every level of
//! each one selects. Index 0 of every table disables the tool.

use crate::levels::ChromaMode;
use crate::me::HalfPelMode;

/// Deviation threshold that never triggers.
pub const TH_OFF: i64 = i64::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxtCtrls {
  pub enabled: bool,
  /// Search inter blocks too, not only intra ones.
  pub inter_enabled: bool,
  /// Largest transform side the type search runs at.
  pub max_tx_side: usize,
  /// Skip the remaining types when the best one left fewer non-zero
  /// coefficients than this.
  pub txt_exit_based_on_non_coeff_th: u16,
}

pub const TXT_CTRLS: [TxtCtrls; 5] = [
  TxtCtrls {
    enabled: false,
    inter_enabled: false,
    max_tx_side: 0,
    txt_exit_based_on_non_coeff_th: 0,
  },
  TxtCtrls {
    enabled: true,
    inter_enabled: true,
    max_tx_side: 32,
    txt_exit_based_on_non_coeff_th: 0,
  },
  TxtCtrls {
    enabled: true,
    inter_enabled: true,
    max_tx_side: 32,
    txt_exit_based_on_non_coeff_th: 4,
  },
  TxtCtrls {
    enabled: true,
    inter_enabled: true,
    max_tx_side: 16,
    txt_exit_based_on_non_coeff_th: 8,
  },
  TxtCtrls {
    enabled: true,
    inter_enabled: false,
    max_tx_side: 16,
    txt_exit_based_on_non_coeff_th: 16,
  },
];

/// Candidate classes, in the order the NIC tables are indexed.
pub const CAND_CLASS_TOTAL: usize = 4;

/// Number of candidates kept per class after MDS0, MDS1 and MDS2, before
/// scaling.
pub const MD_STAGE_NICS: [[u8; CAND_CLASS_TOTAL]; 3] =
  [[8, 8, 4, 2], [4, 4, 2, 1], [2, 2, 1, 1]];

/// Numerators over 16 applied to [`MD_STAGE_NICS`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NicScalingCtrls {
  pub stage1_scaling_num: u8,
  pub stage2_scaling_num: u8,
  pub stage3_scaling_num: u8,
}

pub const NIC_SCALING_CTRLS: [NicScalingCtrls; 9] = [
  NicScalingCtrls {
    stage1_scaling_num: 16,
    stage2_scaling_num: 16,
    stage3_scaling_num: 16,
  },
  NicScalingCtrls {
    stage1_scaling_num: 20,
    stage2_scaling_num: 20,
    stage3_scaling_num: 20,
  },
  NicScalingCtrls {
    stage1_scaling_num: 14,
    stage2_scaling_num: 12,
    stage3_scaling_num: 12,
  },
  NicScalingCtrls {
    stage1_scaling_num: 12,
    stage2_scaling_num: 10,
    stage3_scaling_num: 10,
  },
  NicScalingCtrls {
    stage1_scaling_num: 10,
    stage2_scaling_num: 8,
    stage3_scaling_num: 8,
  },
  NicScalingCtrls {
    stage1_scaling_num: 8,
    stage2_scaling_num: 6,
    stage3_scaling_num: 6,
  },
  NicScalingCtrls {
    stage1_scaling_num: 6,
    stage2_scaling_num: 4,
    stage3_scaling_num: 4,
  },
  NicScalingCtrls {
    stage1_scaling_num: 4,
    stage2_scaling_num: 3,
    stage3_scaling_num: 2,
  },
  NicScalingCtrls {
    stage1_scaling_num: 2,
    stage2_scaling_num: 1,
    stage3_scaling_num: 1,
  },
];

impl NicScalingCtrls {
  /// Candidates of `class` kept after stage `stage` (0 for MDS0).
  pub fn nic(&self, stage: usize, class: usize) -> usize {
    let num = match stage {
      0 => self.stage1_scaling_num,
      1 => self.stage2_scaling_num,
      _ => self.stage3_scaling_num,
    };
    let base = MD_STAGE_NICS[stage.min(2)][class] as usize;
    ((base * num as usize + 8) >> 4).max(1)
  }
}

/// Candidate pruning between MD stages. Thresholds are percent deviations
/// from the best cost; [`TH_OFF`] keeps everything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NicPruningCtrls {
  pub mds1_class_th: i64,
  pub mds1_cand_base_th: i64,
  pub mds2_class_th: i64,
  pub mds2_cand_base_th: i64,
  pub mds3_class_th: i64,
  pub mds3_cand_base_th: i64,
}

pub const NIC_PRUNING_CTRLS: [NicPruningCtrls; 5] = [
  NicPruningCtrls {
    mds1_class_th: TH_OFF,
    mds1_cand_base_th: TH_OFF,
    mds2_class_th: TH_OFF,
    mds2_cand_base_th: TH_OFF,
    mds3_class_th: TH_OFF,
    mds3_cand_base_th: TH_OFF,
  },
  NicPruningCtrls {
    mds1_class_th: 300,
    mds1_cand_base_th: 300,
    mds2_class_th: 100,
    mds2_cand_base_th: 100,
    mds3_class_th: 50,
    mds3_cand_base_th: 50,
  },
  NicPruningCtrls {
    mds1_class_th: 200,
    mds1_cand_base_th: 200,
    mds2_class_th: 50,
    mds2_cand_base_th: 50,
    mds3_class_th: 25,
    mds3_cand_base_th: 25,
  },
  NicPruningCtrls {
    mds1_class_th: 100,
    mds1_cand_base_th: 100,
    mds2_class_th: 25,
    mds2_cand_base_th: 25,
    mds3_class_th: 15,
    mds3_cand_base_th: 10,
  },
  NicPruningCtrls {
    mds1_class_th: 50,
    mds1_cand_base_th: 50,
    mds2_class_th: 15,
    mds2_cand_base_th: 10,
    mds3_class_th: 5,
    mds3_cand_base_th: 5,
  },
];

/// Predictive motion search around spatial predictors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PmeCtrls {
  pub enabled: bool,
  pub full_pel_search_width: isize,
  pub full_pel_search_height: isize,
  /// Skip when the predictor matches the ME vector.
  pub early_check: bool,
}

pub const PME_CTRLS: [PmeCtrls; 4] = [
  PmeCtrls {
    enabled: false,
    full_pel_search_width: 0,
    full_pel_search_height: 0,
    early_check: false,
  },
  PmeCtrls {
    enabled: true,
    full_pel_search_width: 7,
    full_pel_search_height: 5,
    early_check: false,
  },
  PmeCtrls {
    enabled: true,
    full_pel_search_width: 3,
    full_pel_search_height: 3,
    early_check: true,
  },
  PmeCtrls {
    enabled: true,
    full_pel_search_width: 1,
    full_pel_search_height: 1,
    early_check: true,
  },
];

/// Block-level fullpel motion search of square (SQ) or non-square (NSQ)
/// blocks, around the analysis vector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MotionSearchCtrls {
  pub enabled: bool,
  pub search_width: isize,
  pub search_height: isize,
  pub diamond: bool,
}

pub const SQ_MOTION_SEARCH_CTRLS: [MotionSearchCtrls; 4] = [
  MotionSearchCtrls {
    enabled: false,
    search_width: 0,
    search_height: 0,
    diamond: false,
  },
  MotionSearchCtrls {
    enabled: true,
    search_width: 8,
    search_height: 8,
    diamond: false,
  },
  MotionSearchCtrls {
    enabled: true,
    search_width: 4,
    search_height: 4,
    diamond: false,
  },
  MotionSearchCtrls {
    enabled: true,
    search_width: 0,
    search_height: 0,
    diamond: true,
  },
];

pub const NSQ_MOTION_SEARCH_CTRLS: [MotionSearchCtrls; 3] = [
  MotionSearchCtrls {
    enabled: false,
    search_width: 0,
    search_height: 0,
    diamond: false,
  },
  MotionSearchCtrls {
    enabled: true,
    search_width: 4,
    search_height: 4,
    diamond: false,
  },
  MotionSearchCtrls {
    enabled: true,
    search_width: 2,
    search_height: 2,
    diamond: false,
  },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubpelCtrls {
  pub enabled: bool,
  pub half_pel_mode: HalfPelMode,
  pub quarter_pel: bool,
  pub eighth_pel: bool,
}

pub const SUBPEL_CTRLS: [SubpelCtrls; 5] = [
  SubpelCtrls {
    enabled: false,
    half_pel_mode: HalfPelMode::Off,
    quarter_pel: false,
    eighth_pel: false,
  },
  SubpelCtrls {
    enabled: true,
    half_pel_mode: HalfPelMode::Full,
    quarter_pel: true,
    eighth_pel: true,
  },
  SubpelCtrls {
    enabled: true,
    half_pel_mode: HalfPelMode::Full,
    quarter_pel: true,
    eighth_pel: false,
  },
  SubpelCtrls {
    enabled: true,
    half_pel_mode: HalfPelMode::AxisOnly,
    quarter_pel: true,
    eighth_pel: false,
  },
  SubpelCtrls {
    enabled: true,
    half_pel_mode: HalfPelMode::AxisOnly,
    quarter_pel: false,
    eighth_pel: false,
  },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RdoqCtrls {
  pub enabled: bool,
  /// Stop walking once this many positions past a level above one were
  /// seen.
  pub eob_fast_th: usize,
  pub skip_uv: bool,
}

pub const RDOQ_CTRLS: [RdoqCtrls; 4] = [
  RdoqCtrls { enabled: false, eob_fast_th: 0, skip_uv: true },
  RdoqCtrls { enabled: true, eob_fast_th: usize::MAX, skip_uv: false },
  RdoqCtrls { enabled: true, eob_fast_th: 30, skip_uv: false },
  RdoqCtrls { enabled: true, eob_fast_th: 8, skip_uv: true },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObmcCtrls {
  pub enabled: bool,
  pub max_blk_size: usize,
}

pub const OBMC_CTRLS: [ObmcCtrls; 3] = [
  ObmcCtrls { enabled: false, max_blk_size: 0 },
  ObmcCtrls { enabled: true, max_blk_size: 64 },
  ObmcCtrls { enabled: true, max_blk_size: 16 },
];

/// Depth removal thresholds. Costs are the mean ME distortion per sample in
/// 1/16 units at 8-bit scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthRemovalCtrls {
  pub enabled: bool,
  pub disallow_below_64x64_th: u64,
  pub disallow_below_32x32_th: u64,
  pub disallow_below_16x16_th: u64,
  pub dev_32_16_th: i64,
  pub dev_32_8_th: i64,
  pub dev_16_8_th: i64,
}

pub const DEPTH_REMOVAL_CTRLS: [DepthRemovalCtrls; 4] = [
  DepthRemovalCtrls {
    enabled: false,
    disallow_below_64x64_th: 0,
    disallow_below_32x32_th: 0,
    disallow_below_16x16_th: 0,
    dev_32_16_th: -1,
    dev_32_8_th: -1,
    dev_16_8_th: -1,
  },
  DepthRemovalCtrls {
    enabled: true,
    disallow_below_64x64_th: 4,
    disallow_below_32x32_th: 8,
    disallow_below_16x16_th: 12,
    dev_32_16_th: 5,
    dev_32_8_th: 10,
    dev_16_8_th: 5,
  },
  DepthRemovalCtrls {
    enabled: true,
    disallow_below_64x64_th: 8,
    disallow_below_32x32_th: 16,
    disallow_below_16x16_th: 24,
    dev_32_16_th: 10,
    dev_32_8_th: 20,
    dev_16_8_th: 10,
  },
  DepthRemovalCtrls {
    enabled: true,
    disallow_below_64x64_th: 16,
    disallow_below_32x32_th: 32,
    disallow_below_16x16_th: 40,
    dev_32_16_th: 15,
    dev_32_8_th: 30,
    dev_16_8_th: 15,
  },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepthRefinementCtrls {
  pub enabled: bool,
  /// Depth steps above (negative) and below the predicted depth.
  pub s_depth: i8,
  pub e_depth: i8,
  pub parent_to_current_th: i64,
  pub sub_to_current_th: i64,
  /// When both the parent and the child depth pass, keep only the one
  /// with the smaller deviation.
  pub up_to_2_depth: bool,
}

pub const DEPTH_REFINEMENT_CTRLS: [DepthRefinementCtrls; 7] = [
  DepthRefinementCtrls {
    enabled: false,
    s_depth: 0,
    e_depth: 0,
    parent_to_current_th: 0,
    sub_to_current_th: 0,
    up_to_2_depth: false,
  },
  DepthRefinementCtrls {
    enabled: true,
    s_depth: -2,
    e_depth: 2,
    parent_to_current_th: TH_OFF,
    sub_to_current_th: TH_OFF,
    up_to_2_depth: false,
  },
  DepthRefinementCtrls {
    enabled: true,
    s_depth: -1,
    e_depth: 1,
    parent_to_current_th: TH_OFF,
    sub_to_current_th: TH_OFF,
    up_to_2_depth: false,
  },
  DepthRefinementCtrls {
    enabled: true,
    s_depth: -1,
    e_depth: 1,
    parent_to_current_th: 25,
    sub_to_current_th: 25,
    up_to_2_depth: false,
  },
  DepthRefinementCtrls {
    enabled: true,
    s_depth: -1,
    e_depth: 1,
    parent_to_current_th: 15,
    sub_to_current_th: 15,
    up_to_2_depth: true,
  },
  DepthRefinementCtrls {
    enabled: true,
    s_depth: -1,
    e_depth: 1,
    parent_to_current_th: 5,
    sub_to_current_th: 5,
    up_to_2_depth: true,
  },
  DepthRefinementCtrls {
    enabled: true,
    s_depth: -1,
    e_depth: 1,
    parent_to_current_th: -5,
    sub_to_current_th: -5,
    up_to_2_depth: true,
  },
];

/// Early exit from the non-square shapes of a square once a shape's
/// partial cost passes the square's N cost scaled by
/// `(100 - cost_band_pct) / 100`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InDepthSkipCtrls {
  pub enabled: bool,
  pub cost_band_pct: u64,
  /// Skip every non-square shape when the N block coded no coefficients.
  pub skip_nsq_when_n_skips: bool,
}

pub const IN_DEPTH_SKIP_CTRLS: [InDepthSkipCtrls; 4] = [
  InDepthSkipCtrls {
    enabled: false,
    cost_band_pct: 0,
    skip_nsq_when_n_skips: false,
  },
  InDepthSkipCtrls {
    enabled: true,
    cost_band_pct: 0,
    skip_nsq_when_n_skips: false,
  },
  InDepthSkipCtrls {
    enabled: true,
    cost_band_pct: 10,
    skip_nsq_when_n_skips: false,
  },
  InDepthSkipCtrls {
    enabled: true,
    cost_band_pct: 25,
    skip_nsq_when_n_skips: true,
  },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChromaCtrls {
  pub chroma_level: ChromaMode,
  /// Decide chroma skip from luma and prediction energy only.
  pub blk_skip_decision: bool,
}

pub const CHROMA_CTRLS: [ChromaCtrls; 4] = [
  ChromaCtrls { chroma_level: ChromaMode::Mode3, blk_skip_decision: false },
  ChromaCtrls { chroma_level: ChromaMode::Mode0, blk_skip_decision: false },
  ChromaCtrls { chroma_level: ChromaMode::Mode1, blk_skip_decision: false },
  ChromaCtrls { chroma_level: ChromaMode::Mode2, blk_skip_decision: true },
];

/// Interpolation filter search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IfsCtrls {
  pub enabled: bool,
  /// Search every horizontal and vertical combination.
  pub dual_filter: bool,
  /// Skip fullpel vectors, where the filter has no effect.
  pub skip_fullpel: bool,
}

pub const IFS_CTRLS: [IfsCtrls; 3] = [
  IfsCtrls { enabled: false, dual_filter: false, skip_fullpel: true },
  IfsCtrls { enabled: true, dual_filter: true, skip_fullpel: true },
  IfsCtrls { enabled: true, dual_filter: false, skip_fullpel: true },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterIntraCtrls {
  pub enabled: bool,
  pub max_blk_size: usize,
  /// Row of the intra mode table blended with the inter prediction.
  pub intra_mode_level: usize,
}

pub const INTER_INTRA_CTRLS: [InterIntraCtrls; 3] = [
  InterIntraCtrls { enabled: false, max_blk_size: 0, intra_mode_level: 0 },
  InterIntraCtrls { enabled: true, max_blk_size: 32, intra_mode_level: 2 },
  InterIntraCtrls { enabled: true, max_blk_size: 16, intra_mode_level: 0 },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaletteCtrls {
  pub enabled: bool,
  pub max_colors: usize,
  pub max_blk_size: usize,
}

pub const PALETTE_CTRLS: [PaletteCtrls; 3] = [
  PaletteCtrls { enabled: false, max_colors: 0, max_blk_size: 0 },
  PaletteCtrls { enabled: true, max_colors: 8, max_blk_size: 64 },
  PaletteCtrls { enabled: true, max_colors: 4, max_blk_size: 32 },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilmGrainCtrls {
  pub enabled: bool,
  pub apply_chroma: bool,
}

pub const FILM_GRAIN_CTRLS: [FilmGrainCtrls; 3] = [
  FilmGrainCtrls { enabled: false, apply_chroma: false },
  FilmGrainCtrls { enabled: true, apply_chroma: true },
  FilmGrainCtrls { enabled: true, apply_chroma: false },
];

/// Drops new-vector candidates whose ME distortion already loses to the
/// best predicted-vector candidate by more than `th` percent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CandEliminationCtrls {
  pub enabled: bool,
  pub th: i64,
  /// Restrict intra candidates to DC when inter wins by the same margin.
  pub dc_only: bool,
}

pub const CAND_ELIMINATION_CTRLS: [CandEliminationCtrls; 3] = [
  CandEliminationCtrls { enabled: false, th: TH_OFF, dc_only: false },
  CandEliminationCtrls { enabled: true, th: 50, dc_only: false },
  CandEliminationCtrls { enabled: true, th: 20, dc_only: true },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TfCtrls {
  pub enabled: bool,
  pub num_past_pics: usize,
  pub num_future_pics: usize,
  /// Search ranges at sixteenth, quarter and full resolution.
  pub hme_range: [isize; 3],
  pub half_pel_mode: HalfPelMode,
  pub quarter_pel_mode: bool,
  pub eight_pel_mode: bool,
  /// 16x16 refinement runs for 32x32 blocks at or above this error.
  pub pred_error_32x32_th: u64,
  pub me_16x16_to_8x8_dev_th: i64,
  pub max_64x64_past_pics: usize,
  pub max_64x64_future_pics: usize,
}

pub const TF_CTRLS: [TfCtrls; 4] = [
  TfCtrls {
    enabled: false,
    num_past_pics: 0,
    num_future_pics: 0,
    hme_range: [0, 0, 0],
    half_pel_mode: HalfPelMode::Off,
    quarter_pel_mode: false,
    eight_pel_mode: false,
    pred_error_32x32_th: 0,
    me_16x16_to_8x8_dev_th: TH_OFF,
    max_64x64_past_pics: 0,
    max_64x64_future_pics: 0,
  },
  TfCtrls {
    enabled: true,
    num_past_pics: 3,
    num_future_pics: 3,
    hme_range: [16, 4, 2],
    half_pel_mode: HalfPelMode::Full,
    quarter_pel_mode: true,
    eight_pel_mode: true,
    pred_error_32x32_th: 0,
    me_16x16_to_8x8_dev_th: TH_OFF,
    max_64x64_past_pics: 3,
    max_64x64_future_pics: 3,
  },
  TfCtrls {
    enabled: true,
    num_past_pics: 2,
    num_future_pics: 2,
    hme_range: [12, 3, 2],
    half_pel_mode: HalfPelMode::Full,
    quarter_pel_mode: true,
    eight_pel_mode: false,
    pred_error_32x32_th: 8 * 32 * 32,
    me_16x16_to_8x8_dev_th: 20,
    max_64x64_past_pics: 1,
    max_64x64_future_pics: 1,
  },
  TfCtrls {
    enabled: true,
    num_past_pics: 1,
    num_future_pics: 1,
    hme_range: [8, 2, 1],
    half_pel_mode: HalfPelMode::AxisOnly,
    quarter_pel_mode: false,
    eight_pel_mode: false,
    pred_error_32x32_th: 20 * 32 * 32,
    me_16x16_to_8x8_dev_th: 10,
    max_64x64_past_pics: 1,
    max_64x64_future_pics: 1,
  },
];

/// Non-square shapes searched in the final partition pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NsqCtrls {
  pub enabled: bool,
  pub allow_hv: bool,
  /// HORZ_A, HORZ_B, VERT_A and VERT_B.
  pub allow_ab: bool,
  /// HORZ_4 and VERT_4.
  pub allow_4: bool,
  pub min_nsq_block_size: usize,
  pub max_nsq_block_size: usize,
}

pub const NSQ_CTRLS: [NsqCtrls; 5] = [
  NsqCtrls {
    enabled: false,
    allow_hv: false,
    allow_ab: false,
    allow_4: false,
    min_nsq_block_size: 0,
    max_nsq_block_size: 0,
  },
  NsqCtrls {
    enabled: true,
    allow_hv: true,
    allow_ab: true,
    allow_4: true,
    min_nsq_block_size: 8,
    max_nsq_block_size: 128,
  },
  NsqCtrls {
    enabled: true,
    allow_hv: true,
    allow_ab: true,
    allow_4: false,
    min_nsq_block_size: 8,
    max_nsq_block_size: 64,
  },
  NsqCtrls {
    enabled: true,
    allow_hv: true,
    allow_ab: false,
    allow_4: false,
    min_nsq_block_size: 8,
    max_nsq_block_size: 64,
  },
  NsqCtrls {
    enabled: true,
    allow_hv: true,
    allow_ab: false,
    allow_4: false,
    min_nsq_block_size: 16,
    max_nsq_block_size: 32,
  },
];

/// Intra search breadth: level `n > 0` searches row `n - 1` of the intra
/// mode table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IntraCtrls {
  pub enabled: bool,
  pub mode_level: usize,
}

pub const INTRA_CTRLS: [IntraCtrls; 5] = [
  IntraCtrls { enabled: false, mode_level: 0 },
  IntraCtrls { enabled: true, mode_level: 3 },
  IntraCtrls { enabled: true, mode_level: 2 },
  IntraCtrls { enabled: true, mode_level: 1 },
  IntraCtrls { enabled: true, mode_level: 0 },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpatialSseCtrls {
  /// Measure full-loop distortion on reconstructed samples rather than on
  /// coefficients.
  pub spatial_sse_full_loop: bool,
}

pub const SPATIAL_SSE_CTRLS: [SpatialSseCtrls; 2] = [
  SpatialSseCtrls { spatial_sse_full_loop: false },
  SpatialSseCtrls { spatial_sse_full_loop: true },
];

/// Mode decision staging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MdsCtrls {
  pub bypass_mds1: bool,
  pub bypass_mds2: bool,
  /// Candidates outside the best class keep their MDS2 cost instead of
  /// running MDS3.
  pub reduce_last_md_stage_candidate: bool,
}

pub const MDS_CTRLS: [MdsCtrls; 4] = [
  MdsCtrls {
    bypass_mds1: true,
    bypass_mds2: true,
    reduce_last_md_stage_candidate: false,
  },
  MdsCtrls {
    bypass_mds1: false,
    bypass_mds2: false,
    reduce_last_md_stage_candidate: false,
  },
  MdsCtrls {
    bypass_mds1: false,
    bypass_mds2: false,
    reduce_last_md_stage_candidate: true,
  },
  MdsCtrls {
    bypass_mds1: true,
    bypass_mds2: false,
    reduce_last_md_stage_candidate: true,
  },
];
