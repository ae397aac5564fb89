// Copyright (c) 2020-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Level of every tool for a given preset, slice type and pass.

use super::{Tool, ToolInput};
use crate::levels::{PdPass, Preset, ResolutionClass};

/// Levels per preset, `MRS` first.
struct PresetLevels {
  intra: [u8; Preset::COUNT],
  inter: [u8; Preset::COUNT],
}

impl PresetLevels {
  const fn same(levels: [u8; Preset::COUNT]) -> Self {
    PresetLevels { intra: levels, inter: levels }
  }
}

//                                       R  R  0  1  2  3  4  5  6  7  8  9 10
const TXT: PresetLevels = PresetLevels {
  intra: [1, 1, 1, 1, 1, 1, 2, 2, 2, 3, 3, 3, 4],
  inter: [1, 1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4],
};
const NIC_SCALING: PresetLevels = PresetLevels {
  intra: [1, 1, 0, 0, 2, 2, 3, 3, 4, 5, 6, 7, 8],
  inter: [1, 1, 0, 0, 2, 3, 3, 4, 5, 6, 7, 8, 8],
};
const NIC_PRUNING: PresetLevels = PresetLevels {
  intra: [0, 0, 1, 1, 1, 2, 2, 2, 3, 3, 4, 4, 4],
  inter: [0, 0, 1, 1, 2, 2, 3, 3, 3, 4, 4, 4, 4],
};
const PME: PresetLevels = PresetLevels {
  intra: [0; Preset::COUNT],
  inter: [1, 1, 1, 1, 1, 2, 2, 2, 3, 3, 3, 3, 0],
};
const SQ_MOTION_SEARCH: PresetLevels = PresetLevels {
  intra: [0; Preset::COUNT],
  inter: [1, 1, 1, 1, 2, 2, 2, 3, 3, 3, 3, 3, 3],
};
const NSQ_MOTION_SEARCH: PresetLevels = PresetLevels {
  intra: [0; Preset::COUNT],
  inter: [1, 1, 1, 1, 1, 2, 2, 2, 2, 0, 0, 0, 0],
};
const SUBPEL: PresetLevels = PresetLevels {
  intra: [0; Preset::COUNT],
  inter: [1, 1, 1, 1, 2, 2, 2, 3, 3, 3, 4, 4, 4],
};
const RDOQ: PresetLevels =
  PresetLevels::same([1, 1, 1, 1, 1, 1, 2, 2, 2, 3, 3, 3, 3]);
const OBMC: PresetLevels = PresetLevels {
  intra: [0; Preset::COUNT],
  inter: [1, 1, 1, 1, 1, 2, 2, 2, 0, 0, 0, 0, 0],
};
const DEPTH_REMOVAL: PresetLevels = PresetLevels {
  intra: [0, 0, 0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 3],
  inter: [0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 3, 3, 3],
};
const DEPTH_REFINEMENT: PresetLevels = PresetLevels {
  intra: [1, 2, 2, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6],
  inter: [1, 2, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 6],
};
const IN_DEPTH_SKIP: PresetLevels =
  PresetLevels::same([0, 0, 0, 0, 1, 1, 1, 2, 2, 2, 3, 3, 3]);
const CHROMA: PresetLevels = PresetLevels {
  intra: [1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 3, 3, 3],
  inter: [1, 1, 1, 1, 1, 2, 2, 2, 3, 3, 3, 3, 3],
};
const IFS: PresetLevels = PresetLevels {
  intra: [0; Preset::COUNT],
  inter: [1, 1, 1, 1, 2, 2, 2, 2, 0, 0, 0, 0, 0],
};
const INTER_INTRA: PresetLevels = PresetLevels {
  intra: [0; Preset::COUNT],
  inter: [1, 1, 1, 1, 2, 2, 0, 0, 0, 0, 0, 0, 0],
};
const PALETTE: PresetLevels =
  PresetLevels::same([1, 1, 1, 1, 1, 2, 2, 2, 2, 0, 0, 0, 0]);
const FILM_GRAIN: PresetLevels =
  PresetLevels::same([1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 2, 2]);
const CAND_ELIMINATION: PresetLevels = PresetLevels {
  intra: [0; Preset::COUNT],
  inter: [0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 2],
};
const TF: PresetLevels =
  PresetLevels::same([1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 3]);
const NSQ: PresetLevels = PresetLevels {
  intra: [1, 1, 1, 2, 2, 2, 3, 3, 4, 4, 0, 0, 0],
  inter: [1, 1, 1, 2, 2, 3, 3, 4, 4, 0, 0, 0, 0],
};
const INTRA: PresetLevels = PresetLevels {
  intra: [1, 1, 1, 1, 1, 1, 2, 2, 2, 3, 3, 4, 4],
  inter: [1, 1, 1, 2, 2, 2, 3, 3, 4, 4, 4, 4, 4],
};
const SPATIAL_SSE: PresetLevels =
  PresetLevels::same([1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0]);
const MDS: PresetLevels =
  PresetLevels::same([1, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3]);

fn preset_levels(tool: Tool) -> &'static PresetLevels {
  match tool {
    Tool::Txt => &TXT,
    Tool::NicScaling => &NIC_SCALING,
    Tool::NicPruning => &NIC_PRUNING,
    Tool::Pme => &PME,
    Tool::SqMotionSearch => &SQ_MOTION_SEARCH,
    Tool::NsqMotionSearch => &NSQ_MOTION_SEARCH,
    Tool::Subpel => &SUBPEL,
    Tool::Rdoq => &RDOQ,
    Tool::Obmc => &OBMC,
    Tool::DepthRemoval => &DEPTH_REMOVAL,
    Tool::DepthRefinement => &DEPTH_REFINEMENT,
    Tool::InDepthSkip => &IN_DEPTH_SKIP,
    Tool::Chroma => &CHROMA,
    Tool::Ifs => &IFS,
    Tool::InterIntra => &INTER_INTRA,
    Tool::Palette => &PALETTE,
    Tool::FilmGrain => &FILM_GRAIN,
    Tool::CandElimination => &CAND_ELIMINATION,
    Tool::Tf => &TF,
    Tool::Nsq => &NSQ,
    Tool::Intra => &INTRA,
    Tool::SpatialSse => &SPATIAL_SSE,
    Tool::Mds => &MDS,
  }
}

/// Level of `tool` in the final partition pass.
fn final_pass_level(tool: Tool, input: &ToolInput) -> u8 {
  let table = preset_levels(tool);
  let p = input.preset.index();
  let mut level = if input.slice_type.is_intra() {
    table.intra[p]
  } else {
    table.inter[p]
  };
  let max = tool.max_level();
  let non_base_inter = !input.slice_type.is_intra() && input.temporal_layer > 0;

  match tool {
    Tool::Palette if !input.screen_content => level = 0,
    Tool::DepthRemoval => {
      if input.screen_content {
        level = 0;
      } else if level > 0 {
        if input.resolution >= ResolutionClass::Res4k || non_base_inter {
          level = (level + 1).min(max);
        } else if input.resolution <= ResolutionClass::Res240p {
          level -= 1;
        }
      }
    }
    Tool::NicPruning | Tool::Txt if non_base_inter && level > 0 => {
      level = (level + 1).min(max);
    }
    Tool::Intra if input.screen_content && level > 0 => level = 1,
    Tool::Nsq if input.screen_content && level > 1 => level -= 1,
    _ => {}
  }
  level
}

/// Level of `tool` for the pass described by `input`, before overrides.
pub fn tool_level(tool: Tool, input: &ToolInput) -> u8 {
  match input.pd_pass {
    PdPass::Pd2 => final_pass_level(tool, input),
    // Luma only, reduced candidates, no refinement tools.
    PdPass::Pd0 => match tool {
      Tool::NicScaling => 8,
      Tool::NicPruning => 4,
      Tool::Rdoq => 0,
      // DC only.
      Tool::Intra => 4,
      Tool::Mds => 0,
      Tool::DepthRemoval
      | Tool::DepthRefinement
      | Tool::FilmGrain
      | Tool::Tf => final_pass_level(tool, input),
      _ => 0,
    },
    PdPass::Pd1 => match tool {
      Tool::NicScaling => 6,
      Tool::NicPruning => 3,
      Tool::Pme | Tool::SqMotionSearch => {
        match final_pass_level(tool, input) {
          0 => 0,
          _ => tool.max_level(),
        }
      }
      Tool::Subpel if !input.slice_type.is_intra() => 4,
      Tool::Intra => final_pass_level(tool, input).max(3),
      Tool::Mds => 3,
      Tool::DepthRemoval
      | Tool::DepthRefinement
      | Tool::FilmGrain
      | Tool::Tf => final_pass_level(tool, input),
      _ => 0,
    },
  }
}

/// Whether 4x4 blocks are excluded by the preset.
pub fn disallow_4x4(preset: Preset, is_intra: bool) -> bool {
  if is_intra {
    preset >= Preset::M8
  } else {
    preset >= Preset::M4
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::levels::SliceType;
  use crate::partition::SbSize;
  use num_traits::FromPrimitive;

  fn input(preset: Preset, slice_type: SliceType) -> ToolInput {
    ToolInput {
      preset,
      pd_pass: PdPass::Pd2,
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

  #[test]
  fn levels_fit_their_tables() {
    for tool in Tool::ALL {
      let t = preset_levels(tool);
      for l in t.intra.iter().chain(t.inter.iter()) {
        assert!(*l <= tool.max_level(), "{:?} level {}", tool, l);
      }
    }
  }

  #[test]
  fn slower_presets_never_use_faster_depth_tools() {
    for tool in [Tool::DepthRemoval, Tool::InDepthSkip, Tool::NicPruning] {
      let t = preset_levels(tool);
      for w in t.inter.windows(2) {
        assert!(w[0] <= w[1], "{:?}", tool);
      }
    }
  }

  #[test]
  fn screen_content_enables_palette() {
    let mut i = input(Preset::M2, SliceType::I);
    assert_eq!(tool_level(Tool::Palette, &i), 0);
    i.screen_content = true;
    assert_eq!(tool_level(Tool::Palette, &i), 1);
  }

  #[test]
  fn first_pass_is_light() {
    for p in 0..Preset::COUNT {
      let mut i = input(Preset::from_usize(p).unwrap(), SliceType::B);
      i.pd_pass = PdPass::Pd0;
      assert_eq!(tool_level(Tool::Txt, &i), 0);
      assert_eq!(tool_level(Tool::Nsq, &i), 0);
      assert_eq!(tool_level(Tool::Chroma, &i), 0);
      assert_eq!(tool_level(Tool::Mds, &i), 0);
      assert_eq!(tool_level(Tool::Intra, &i), 4);
    }
  }

  #[test]
  fn intra_slices_have_no_inter_tools() {
    let i = input(Preset::MRS, SliceType::I);
    for tool in [Tool::Pme, Tool::Subpel, Tool::Obmc, Tool::Ifs] {
      assert_eq!(tool_level(tool, &i), 0);
    }
  }
}
