// Copyright (c) 2020-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Level-driven coding tool configuration.
//!
//! Every tool has a table of control structs indexed by level, level 0
//! disabling it. A level is picked per preset and slice type, adjusted for
//! the pass, temporal layer, resolution and content type, and may be forced
//! through [`ToolOverrides`]. Live superblock statistics then only move
//! thresholds within the chosen level.

mod depth;
mod level;
mod tables;

pub use depth::*;
pub use level::disallow_4x4;
pub use tables::*;

use arg_enum_proc_macro::ArgEnum;
use num_derive::FromPrimitive;

use crate::analysis::SbStats;
use crate::levels::*;
use crate::partition::SbSize;

#[derive(
  ArgEnum, Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive,
)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Tool {
  Txt,
  NicScaling,
  NicPruning,
  Pme,
  SqMotionSearch,
  NsqMotionSearch,
  Subpel,
  Rdoq,
  Obmc,
  DepthRemoval,
  DepthRefinement,
  InDepthSkip,
  Chroma,
  Ifs,
  InterIntra,
  Palette,
  FilmGrain,
  CandElimination,
  Tf,
  Nsq,
  Intra,
  SpatialSse,
  Mds,
}

impl Tool {
  pub const COUNT: usize = 23;

  pub const ALL: [Tool; Tool::COUNT] = [
    Tool::Txt,
    Tool::NicScaling,
    Tool::NicPruning,
    Tool::Pme,
    Tool::SqMotionSearch,
    Tool::NsqMotionSearch,
    Tool::Subpel,
    Tool::Rdoq,
    Tool::Obmc,
    Tool::DepthRemoval,
    Tool::DepthRefinement,
    Tool::InDepthSkip,
    Tool::Chroma,
    Tool::Ifs,
    Tool::InterIntra,
    Tool::Palette,
    Tool::FilmGrain,
    Tool::CandElimination,
    Tool::Tf,
    Tool::Nsq,
    Tool::Intra,
    Tool::SpatialSse,
    Tool::Mds,
  ];

  /// Highest level of the tool's control table.
  pub const fn max_level(self) -> u8 {
    let len = match self {
      Tool::Txt => TXT_CTRLS.len(),
      Tool::NicScaling => NIC_SCALING_CTRLS.len(),
      Tool::NicPruning => NIC_PRUNING_CTRLS.len(),
      Tool::Pme => PME_CTRLS.len(),
      Tool::SqMotionSearch => SQ_MOTION_SEARCH_CTRLS.len(),
      Tool::NsqMotionSearch => NSQ_MOTION_SEARCH_CTRLS.len(),
      Tool::Subpel => SUBPEL_CTRLS.len(),
      Tool::Rdoq => RDOQ_CTRLS.len(),
      Tool::Obmc => OBMC_CTRLS.len(),
      Tool::DepthRemoval => DEPTH_REMOVAL_CTRLS.len(),
      Tool::DepthRefinement => DEPTH_REFINEMENT_CTRLS.len(),
      Tool::InDepthSkip => IN_DEPTH_SKIP_CTRLS.len(),
      Tool::Chroma => CHROMA_CTRLS.len(),
      Tool::Ifs => IFS_CTRLS.len(),
      Tool::InterIntra => INTER_INTRA_CTRLS.len(),
      Tool::Palette => PALETTE_CTRLS.len(),
      Tool::FilmGrain => FILM_GRAIN_CTRLS.len(),
      Tool::CandElimination => CAND_ELIMINATION_CTRLS.len(),
      Tool::Tf => TF_CTRLS.len(),
      Tool::Nsq => NSQ_CTRLS.len(),
      Tool::Intra => INTRA_CTRLS.len(),
      Tool::SpatialSse => SPATIAL_SSE_CTRLS.len(),
      Tool::Mds => MDS_CTRLS.len(),
    };
    (len - 1) as u8
  }
}

/// Levels forced by the user, applied to the final partition pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ToolOverrides {
  levels: [Option<u8>; Tool::COUNT],
}

impl ToolOverrides {
  pub fn set(&mut self, tool: Tool, level: u8) {
    self.levels[tool as usize] = Some(level);
  }

  pub fn clear(&mut self, tool: Tool) {
    self.levels[tool as usize] = None;
  }

  #[inline]
  pub fn get(&self, tool: Tool) -> Option<u8> {
    self.levels[tool as usize]
  }

  /// The first override above its tool's table.
  pub fn first_invalid(&self) -> Option<(Tool, u8)> {
    Tool::ALL
      .iter()
      .filter_map(|&t| self.get(t).map(|l| (t, l)))
      .find(|&(t, l)| l > t.max_level())
  }
}

/// Everything the configuration of one superblock pass depends on, other
/// than the live statistics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ToolInput {
  pub preset: Preset,
  pub pd_pass: PdPass,
  pub slice_type: SliceType,
  pub temporal_layer: u8,
  pub resolution: ResolutionClass,
  pub screen_content: bool,
  pub sb_size: SbSize,
  pub bit_depth: usize,
  /// Visible size of the superblock, smaller at the right and bottom edges.
  pub sb_width: usize,
  pub sb_height: usize,
}

/// Returns the entry of `table` for `level`. Levels beyond the table are a
/// configuration bug; release builds fall back to the last entry.
fn lookup<T: Copy>(table: &[T], tool: Tool, level: u8) -> T {
  debug_assert!(
    (level as usize) < table.len(),
    "{:?} level {} out of range",
    tool,
    level
  );
  if (level as usize) >= table.len() {
    log::warn!("{:?} level {} out of range, clamping", tool, level);
  }
  table[(level as usize).min(table.len() - 1)]
}

/// Complete tool configuration of one superblock for one partition pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SbToolConfig {
  pub pd_pass: PdPass,
  pub levels: [u8; Tool::COUNT],
  pub txt: TxtCtrls,
  pub nic_scaling: NicScalingCtrls,
  pub nic_pruning: NicPruningCtrls,
  pub pme: PmeCtrls,
  pub sq_motion_search: MotionSearchCtrls,
  pub nsq_motion_search: MotionSearchCtrls,
  pub subpel: SubpelCtrls,
  pub rdoq: RdoqCtrls,
  pub obmc: ObmcCtrls,
  pub depth_removal: DepthRemoval,
  pub depth_refinement: DepthRefinementCtrls,
  /// Added to both refinement thresholds.
  pub refinement_th_offset: i64,
  pub in_depth_skip: InDepthSkipCtrls,
  pub chroma: ChromaCtrls,
  pub ifs: IfsCtrls,
  pub inter_intra: InterIntraCtrls,
  pub palette: PaletteCtrls,
  pub cand_elimination: CandEliminationCtrls,
  pub nsq: NsqCtrls,
  pub intra: IntraCtrls,
  pub spatial_sse: SpatialSseCtrls,
  pub mds: MdsCtrls,
  pub disallow_4x4: bool,
}

impl SbToolConfig {
  #[inline]
  pub fn level(&self, tool: Tool) -> u8 {
    self.levels[tool as usize]
  }
}

fn resolved_level(tool: Tool, input: &ToolInput, ovr: &ToolOverrides) -> u8 {
  match ovr.get(tool) {
    Some(l) if input.pd_pass.is_final() => l,
    _ => level::tool_level(tool, input),
  }
}

/// Derives the tool configuration of a superblock. The result depends only
/// on the arguments.
pub fn derive_sb_tools(
  input: &ToolInput, ovr: &ToolOverrides, stats: &SbStats,
) -> SbToolConfig {
  let mut levels = [0u8; Tool::COUNT];
  for tool in Tool::ALL {
    levels[tool as usize] = resolved_level(tool, input, ovr);
  }
  let l = |tool: Tool| levels[tool as usize];

  let removal_ctrls =
    lookup(&DEPTH_REMOVAL_CTRLS, Tool::DepthRemoval, l(Tool::DepthRemoval));
  let depth_removal = depth_removal(
    &removal_ctrls,
    stats,
    input.sb_width * input.sb_height,
    input.bit_depth,
  );

  let mut chroma = lookup(&CHROMA_CTRLS, Tool::Chroma, l(Tool::Chroma));
  chroma.blk_skip_decision |= chroma.chroma_level == ChromaMode::Mode2;

  let depth_refinement = lookup(
    &DEPTH_REFINEMENT_CTRLS,
    Tool::DepthRefinement,
    l(Tool::DepthRefinement),
  );

  let mut disallow_4x4 =
    disallow_4x4(input.preset, input.slice_type.is_intra());
  if input.sb_width % 8 != 0 || input.sb_height % 8 != 0 {
    disallow_4x4 = false;
  }

  SbToolConfig {
    pd_pass: input.pd_pass,
    levels,
    txt: lookup(&TXT_CTRLS, Tool::Txt, l(Tool::Txt)),
    nic_scaling: lookup(&NIC_SCALING_CTRLS, Tool::NicScaling, l(Tool::NicScaling)),
    nic_pruning: lookup(&NIC_PRUNING_CTRLS, Tool::NicPruning, l(Tool::NicPruning)),
    pme: lookup(&PME_CTRLS, Tool::Pme, l(Tool::Pme)),
    sq_motion_search: lookup(
      &SQ_MOTION_SEARCH_CTRLS,
      Tool::SqMotionSearch,
      l(Tool::SqMotionSearch),
    ),
    nsq_motion_search: lookup(
      &NSQ_MOTION_SEARCH_CTRLS,
      Tool::NsqMotionSearch,
      l(Tool::NsqMotionSearch),
    ),
    subpel: lookup(&SUBPEL_CTRLS, Tool::Subpel, l(Tool::Subpel)),
    rdoq: lookup(&RDOQ_CTRLS, Tool::Rdoq, l(Tool::Rdoq)),
    obmc: lookup(&OBMC_CTRLS, Tool::Obmc, l(Tool::Obmc)),
    depth_removal,
    depth_refinement,
    refinement_th_offset: if depth_refinement.enabled {
      refinement_th_offset(stats)
    } else {
      0
    },
    in_depth_skip: lookup(
      &IN_DEPTH_SKIP_CTRLS,
      Tool::InDepthSkip,
      l(Tool::InDepthSkip),
    ),
    chroma,
    ifs: lookup(&IFS_CTRLS, Tool::Ifs, l(Tool::Ifs)),
    inter_intra: lookup(&INTER_INTRA_CTRLS, Tool::InterIntra, l(Tool::InterIntra)),
    palette: lookup(&PALETTE_CTRLS, Tool::Palette, l(Tool::Palette)),
    cand_elimination: lookup(
      &CAND_ELIMINATION_CTRLS,
      Tool::CandElimination,
      l(Tool::CandElimination),
    ),
    nsq: lookup(&NSQ_CTRLS, Tool::Nsq, l(Tool::Nsq)),
    intra: lookup(&INTRA_CTRLS, Tool::Intra, l(Tool::Intra)),
    spatial_sse: lookup(&SPATIAL_SSE_CTRLS, Tool::SpatialSse, l(Tool::SpatialSse)),
    mds: lookup(&MDS_CTRLS, Tool::Mds, l(Tool::Mds)),
    disallow_4x4,
  }
}

/// Picture-level controls: temporal filtering and film grain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PictureToolConfig {
  pub tf: TfCtrls,
  pub film_grain: FilmGrainCtrls,
}

pub fn derive_picture_tools(
  input: &ToolInput, ovr: &ToolOverrides, enable_tf: bool,
  enable_film_grain: bool,
) -> PictureToolConfig {
  let final_input = ToolInput { pd_pass: PdPass::Pd2, ..*input };
  let tf_level = if enable_tf {
    resolved_level(Tool::Tf, &final_input, ovr)
  } else {
    0
  };
  let fg_level = if enable_film_grain {
    resolved_level(Tool::FilmGrain, &final_input, ovr)
  } else {
    0
  };
  PictureToolConfig {
    tf: lookup(&TF_CTRLS, Tool::Tf, tf_level),
    film_grain: lookup(&FILM_GRAIN_CTRLS, Tool::FilmGrain, fg_level),
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::me::HalfPelMode;
  use interpolate_name::interpolate_test;
  use num_traits::FromPrimitive;
  use pretty_assertions::assert_eq;

  fn input(preset: Preset, slice_type: SliceType, pd_pass: PdPass) -> ToolInput {
    ToolInput {
      preset,
      pd_pass,
      slice_type,
      temporal_layer: 0,
      resolution: ResolutionClass::Res720p,
      screen_content: false,
      sb_size: SbSize::Sb64,
      bit_depth: 8,
      sb_width: 64,
      sb_height: 64,
    }
  }

  fn busy_stats() -> SbStats {
    SbStats {
      variance: 2000,
      me_64x64_dist: 400_000,
      me_32x32_dist: 300_000,
      me_16x16_dist: 200_000,
      me_8x8_dist: 100_000,
      me_8x8_cost_variance: 50_000,
    }
  }

  #[test]
  fn tool_names_parse() {
    assert_eq!("Txt".parse::<Tool>(), Ok(Tool::Txt));
    assert_eq!(Tool::from_usize(Tool::COUNT - 1), Some(Tool::Mds));
    assert_eq!(Tool::ALL.len(), Tool::COUNT);
  }

  #[test]
  fn derivation_is_pure() {
    let i = input(Preset::M5, SliceType::B, PdPass::Pd2);
    let ovr = ToolOverrides::default();
    let a = derive_sb_tools(&i, &ovr, &busy_stats());
    let b = derive_sb_tools(&i, &ovr, &busy_stats());
    assert_eq!(a, b);
  }

  #[interpolate_test(mrs, Preset::MRS)]
  #[interpolate_test(m0, Preset::M0)]
  #[interpolate_test(m5, Preset::M5)]
  #[interpolate_test(m8, Preset::M8)]
  #[interpolate_test(m10, Preset::M10)]
  fn chroma_mode_2_decides_skip_on_luma(preset: Preset) {
    for slice in [SliceType::I, SliceType::P, SliceType::B] {
      for pass in PdPass::ALL {
        let c = derive_sb_tools(
          &input(preset, slice, pass),
          &ToolOverrides::default(),
          &busy_stats(),
        );
        if c.chroma.chroma_level == ChromaMode::Mode2 {
          assert!(c.chroma.blk_skip_decision);
        }
      }
    }
  }

  #[test]
  fn level_zero_disables() {
    let mut ovr = ToolOverrides::default();
    for t in [Tool::Txt, Tool::Pme, Tool::Obmc, Tool::Nsq, Tool::Palette] {
      ovr.set(t, 0);
    }
    let c = derive_sb_tools(
      &input(Preset::MRS, SliceType::B, PdPass::Pd2),
      &ovr,
      &busy_stats(),
    );
    assert!(!c.txt.enabled);
    assert!(!c.pme.enabled);
    assert!(!c.obmc.enabled);
    assert!(!c.nsq.enabled);
    assert!(!c.palette.enabled);
  }

  #[test]
  fn overrides_only_touch_the_final_pass() {
    let mut ovr = ToolOverrides::default();
    ovr.set(Tool::Txt, 1);
    let pd0 = derive_sb_tools(
      &input(Preset::M10, SliceType::B, PdPass::Pd0),
      &ovr,
      &busy_stats(),
    );
    let pd2 = derive_sb_tools(
      &input(Preset::M10, SliceType::B, PdPass::Pd2),
      &ovr,
      &busy_stats(),
    );
    assert_eq!(pd0.level(Tool::Txt), 0);
    assert_eq!(pd2.level(Tool::Txt), 1);
    assert_eq!(pd2.txt, TXT_CTRLS[1]);
  }

  #[test]
  fn invalid_override_is_reported() {
    let mut ovr = ToolOverrides::default();
    assert_eq!(ovr.first_invalid(), None);
    ovr.set(Tool::Obmc, 9);
    assert_eq!(ovr.first_invalid(), Some((Tool::Obmc, 9)));
    ovr.clear(Tool::Obmc);
    assert_eq!(ovr.first_invalid(), None);
  }

  #[test]
  fn edge_superblocks_keep_4x4() {
    let mut i = input(Preset::M10, SliceType::B, PdPass::Pd2);
    let c = derive_sb_tools(&i, &ToolOverrides::default(), &busy_stats());
    assert!(c.disallow_4x4);
    i.sb_width = 36;
    let c = derive_sb_tools(&i, &ToolOverrides::default(), &busy_stats());
    assert!(!c.disallow_4x4);
    i.sb_width = 40;
    i.sb_height = 20;
    let c = derive_sb_tools(&i, &ToolOverrides::default(), &busy_stats());
    assert!(!c.disallow_4x4);
  }

  #[test]
  fn tf_axis_only_half_pel() {
    let i = input(Preset::M10, SliceType::B, PdPass::Pd2);
    let p = derive_picture_tools(&i, &ToolOverrides::default(), true, false);
    assert!(p.tf.enabled);
    assert_eq!(p.tf.half_pel_mode, HalfPelMode::AxisOnly);
    assert!(!p.film_grain.enabled);
    let p = derive_picture_tools(&i, &ToolOverrides::default(), false, true);
    assert!(!p.tf.enabled);
    assert!(p.film_grain.enabled);
  }

  #[test]
  fn nic_counts_shrink_with_level() {
    for stage in 0..3 {
      for class in 0..CAND_CLASS_TOTAL {
        let wide = NIC_SCALING_CTRLS[1].nic(stage, class);
        let narrow = NIC_SCALING_CTRLS[8].nic(stage, class);
        assert!(narrow >= 1);
        assert!(narrow <= wide);
      }
    }
  }
}
