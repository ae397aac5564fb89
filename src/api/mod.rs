// Copyright (c) 2018-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

/// Encoder Configuration
pub mod config;
/// Encoder Session
pub mod context;
/// Picture input and output types
pub mod util;

#[cfg(test)]
mod test;

pub use config::*;
pub use context::*;
pub use util::*;
