// Copyright (c) 2018-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::api::*;
use crate::frame::{Frame, Picture, PlaneExt};
use crate::levels::{Preset, SliceType};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use interpolate_name::interpolate_test;
use pretty_assertions::assert_eq;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;

fn setup_config(
  w: usize, h: usize, preset: Preset, bit_depth: usize, quantizer: u8,
) -> EncoderConfig {
  EncoderConfig::with_preset(preset)
    .with_size(w, h)
    .with_bit_depth(bit_depth)
    .with_quantizer(quantizer)
    .with_threads(2)
}

fn setup_encoder(enc: EncoderConfig) -> Encoder {
  let _ = pretty_env_logger::try_init();
  Config::new().with_encoder_config(enc).new_encoder().unwrap()
}

/// Diagonal ramps with a little noise on top.
fn source_frame(seed: u8, w: usize, h: usize, bit_depth: usize) -> Frame<u16> {
  let mut ra = ChaChaRng::from_seed([seed; 32]);
  let mut f = Frame::new(w, h, 16);
  for (p, plane) in f.planes.iter_mut().enumerate() {
    let (pw, ph) = (plane.cfg.width, plane.cfg.height);
    for y in 0..ph {
      for x in 0..pw {
        let v = 40 + (x * 3 + y * 2 + p * 17) % 160 + ra.gen_range(0..6);
        plane.set(x, y, (v << (bit_depth - 8)) as u16);
      }
    }
    plane.pad(w, h);
  }
  f
}

fn source_picture(seed: u8, w: usize, h: usize, bit_depth: usize) -> Picture {
  Picture::from_highbd(&source_frame(seed, w, h, bit_depth), bit_depth)
}

fn flat_picture(w: usize, h: usize, value: u16) -> Picture {
  let mut f = Frame::new(w, h, 16);
  for plane in f.planes.iter_mut() {
    plane.data.iter_mut().for_each(|v| *v = value);
  }
  Picture::from_highbd(&f, 8)
}

#[derive(Default)]
struct ErrorLog {
  errors: Mutex<Vec<EncodeErrorKind>>,
}

impl AppCallback for ErrorLog {
  fn error(&self, kind: EncodeErrorKind) {
    self.errors.lock().unwrap().push(kind);
  }
}

/// Rejects the first pass of every picture and accepts the second.
#[derive(Debug, Default)]
struct RejectFirstPass {
  calls: AtomicUsize,
}

impl RateControl for RejectFirstPass {
  fn frame_bounds(&self, _: u64, _: SliceType) -> FrameBounds {
    if self.calls.fetch_add(1, Ordering::SeqCst) % 2 == 0 {
      FrameBounds { low: 0, high: 1 }
    } else {
      FrameBounds::UNBOUNDED
    }
  }
}

#[test]
fn single_intra_picture() {
  let (w, h) = (256, 256);
  let mut enc = setup_encoder(setup_config(w, h, Preset::M5, 8, 0));
  let input =
    PictureInput::intra(source_picture(1, w, h, 8)).with_end_of_stream();
  let out = enc.encode(input).unwrap();

  assert_eq!(out.picture_number, 0);
  assert_eq!(out.total_recon_frames, 1);
  assert_eq!(out.loop_count, 1);
  assert!(out.end_of_stream);
  assert!(out.stats.sse[0] <= 2 * (w * h) as u64, "{:?}", out.stats.sse);
  assert!(out.stats.bits > 0);
  assert_eq!(out.stats.tf_noise_level, None);

  let recon = out.recon.unwrap();
  assert!(recon.end_of_stream);
  assert_eq!(recon.filled, w * h * 3 / 2);
  assert_eq!(recon.data.len(), recon.filled);

  // The end of the stream flushes the encoder.
  let next = PictureInput::intra(source_picture(2, w, h, 8));
  assert_eq!(enc.encode(next).unwrap_err(), EncoderStatus::LimitReached);
}

#[interpolate_test(one_tile_group, 1)]
#[interpolate_test(three_tile_groups, 3)]
fn tile_groups(tile_groups: usize) {
  let (w, h) = (128, 320);
  let cfg = setup_config(w, h, Preset::M8, 8, 0)
    .with_tile_groups(tile_groups)
    .with_segments(2, 2);
  let mut enc = setup_encoder(cfg);
  let out = enc.encode(PictureInput::intra(source_picture(3, w, h, 8))).unwrap();
  assert_eq!(out.loop_count, 1);
  assert!(out.stats.sse[0] <= 2 * (w * h) as u64, "{:?}", out.stats.sse);
}

#[test]
fn rejected_pass_is_recoded() {
  let (w, h) = (128, 128);
  let rc = Arc::new(RejectFirstPass::default());
  let enc = setup_config(w, h, Preset::M8, 8, 100);
  let mut enc = Config::new()
    .with_encoder_config(enc)
    .with_rate_control(rc.clone())
    .new_encoder()
    .unwrap();

  let out = enc.encode(PictureInput::intra(source_picture(4, w, h, 8))).unwrap();
  assert_eq!(out.loop_count, 2);
  assert_eq!(rc.calls.load(Ordering::SeqCst), 2);
  // The projected size was above the bound: the quantizer went up.
  assert!(out.base_q_idx > 100);
  assert_eq!(enc.total_recon_frames(), 1);
}

#[test]
fn recode_stops_at_the_loop_limit() {
  #[derive(Debug)]
  struct NeverFits;
  impl RateControl for NeverFits {
    fn frame_bounds(&self, _: u64, _: SliceType) -> FrameBounds {
      FrameBounds { low: 0, high: 1 }
    }
  }

  let (w, h) = (64, 64);
  let enc = setup_config(w, h, Preset::M8, 8, 100).with_max_recode_loops(3);
  let mut enc = Config::new()
    .with_encoder_config(enc)
    .with_rate_control(Arc::new(NeverFits))
    .new_encoder()
    .unwrap();
  let out = enc.encode(PictureInput::intra(source_picture(5, w, h, 8))).unwrap();
  assert_eq!(out.loop_count, 3);
}

#[test]
fn inter_pictures_predict_from_the_previous_ones() {
  let (w, h) = (128, 128);
  let mut enc = setup_encoder(setup_config(w, h, Preset::M8, 8, 20));

  let first = PictureInput::inter(source_picture(6, w, h, 8));
  assert_eq!(enc.encode(first).unwrap_err(), EncoderStatus::NotReady);

  enc.encode(PictureInput::intra(source_picture(6, w, h, 8))).unwrap();
  for i in 0..3 {
    let out = enc.encode(PictureInput::inter(source_picture(6, w, h, 8))).unwrap();
    assert_eq!(out.slice_type, SliceType::P);
    assert_eq!(out.picture_number, i + 1);
  }
  assert_eq!(enc.live_references(), crate::api::MAX_REFS);
  assert_eq!(enc.total_recon_frames(), 4);
}

#[test]
fn temporal_filter_keeps_a_flat_alt_ref() {
  let (w, h) = (128, 128);
  let cfg =
    setup_config(w, h, Preset::M5, 8, 0).with_temporal_filter(3, 3, 4);
  let mut enc = setup_encoder(cfg);

  let neighbors = || (0..3).map(|_| Arc::new(flat_picture(w, h, 128))).collect();
  let window = AltRefWindow { past: neighbors(), future: neighbors() };
  let input = PictureInput::intra(flat_picture(w, h, 128)).with_altref(window);
  let out = enc.encode(input).unwrap();

  assert_eq!(out.stats.tf_noise_level, Some(0.0));
  assert!(out.stats.sse[0] <= (w * h) as u64, "{:?}", out.stats.sse);
}

#[test]
fn temporal_filter_is_off_by_default() {
  let (w, h) = (64, 64);
  let mut enc = setup_encoder(setup_config(w, h, Preset::M8, 8, 0));
  let window = AltRefWindow {
    past: vec![Arc::new(flat_picture(w, h, 100))],
    future: vec![Arc::new(flat_picture(w, h, 100))],
  };
  let input = PictureInput::intra(flat_picture(w, h, 128)).with_altref(window);
  let out = enc.encode(input).unwrap();
  assert_eq!(out.stats.tf_noise_level, None);
}

#[test]
fn mismatched_neighbors_are_rejected() {
  let (w, h) = (64, 64);
  let cfg = setup_config(w, h, Preset::M8, 8, 0).with_temporal_filter(1, 1, 4);
  let mut enc = setup_encoder(cfg);
  let window = AltRefWindow {
    past: vec![Arc::new(flat_picture(32, 32, 128))],
    future: Vec::new(),
  };
  let input = PictureInput::intra(flat_picture(w, h, 128)).with_altref(window);
  assert_eq!(enc.encode(input).unwrap_err(), EncoderStatus::NotReady);

  // The encoder is still usable.
  enc.encode(PictureInput::intra(flat_picture(w, h, 128))).unwrap();
}

#[test]
fn ten_bit_picture() {
  let (w, h) = (128, 128);
  let cfg = setup_config(w, h, Preset::M8, 10, 0).with_metrics(true, false);
  let mut enc = setup_encoder(cfg);
  let out = enc.encode(PictureInput::intra(source_picture(7, w, h, 10))).unwrap();

  assert!(out.stats.sse[0] <= 32 * (w * h) as u64, "{:?}", out.stats.sse);
  let psnr = out.stats.psnr.unwrap();
  assert!(psnr[0] > 40.0, "{:?}", psnr);
  assert_eq!(out.recon.unwrap().filled, 2 * w * h * 3 / 2);
}

#[test]
fn ten_bit_raw_input() {
  let (w, h) = (64, 64);
  let cfg = setup_config(w, h, Preset::M8, 10, 0).with_metrics(true, false);
  let mut enc = setup_encoder(cfg);
  let src = source_frame(12, w, h, 10);

  let mut picture = enc.new_picture();
  for (p, plane) in src.planes.iter().enumerate() {
    let (pw, ph) = (plane.cfg.width, plane.cfg.height);
    let mut msb = vec![0u8; pw * ph];
    let mut inc = vec![0u8; pw / 4 * ph];
    for y in 0..ph {
      for x in 0..pw {
        let v = plane.p(x, y);
        msb[y * pw + x] = (v >> 2) as u8;
        inc[(y * pw + x) / 4] |= ((v & 3) << (6 - 2 * (x % 4))) as u8;
      }
    }
    picture.copy_from_raw(p, &msb, pw, Some((&inc, pw / 4)));
  }

  for (p, plane) in src.planes.iter().enumerate() {
    for y in 0..plane.cfg.height {
      for x in 0..plane.cfg.width {
        assert_eq!(picture.sample(p, x, y), plane.p(x, y), "{} {} {}", p, x, y);
      }
    }
  }
  let out = enc.encode(PictureInput::intra(picture)).unwrap();
  assert!(out.stats.psnr.unwrap()[0] > 40.0);
}

#[test]
fn quality_metrics() {
  let (w, h) = (128, 128);
  let cfg = setup_config(w, h, Preset::M8, 8, 0).with_metrics(true, true);
  let mut enc = setup_encoder(cfg);
  let out = enc.encode(PictureInput::intra(source_picture(8, w, h, 8))).unwrap();
  let psnr = out.stats.psnr.unwrap();
  let ssim = out.stats.ssim.unwrap();
  assert!(psnr.iter().all(|&p| p > 40.0), "{:?}", psnr);
  assert!(ssim.iter().all(|&s| s > 0.9 && s <= 1.0), "{:?}", ssim);
}

#[test]
fn wrong_format_is_not_ready() {
  let mut enc = setup_encoder(setup_config(64, 64, Preset::M8, 8, 0));
  let input = PictureInput::intra(source_picture(9, 128, 64, 8));
  assert_eq!(enc.encode(input).unwrap_err(), EncoderStatus::NotReady);
  let input = PictureInput::intra(source_picture(9, 64, 64, 10));
  assert_eq!(enc.encode(input).unwrap_err(), EncoderStatus::NotReady);
}

#[test]
fn recon_overflow_is_reported() {
  let (w, h) = (64, 64);
  let log = Arc::new(ErrorLog::default());
  let cfg =
    setup_config(w, h, Preset::M8, 8, 0).with_recon_buffer_size(Some(1000));
  let mut enc = Config::new()
    .with_encoder_config(cfg)
    .with_callback(log.clone())
    .new_encoder()
    .unwrap();

  let out = enc.encode(PictureInput::intra(source_picture(10, w, h, 8))).unwrap();
  let recon = out.recon.unwrap();
  assert_eq!(recon.filled, 1000);
  assert_eq!(
    log.errors.lock().unwrap().as_slice(),
    &[EncodeErrorKind::ReconOverflow {
      picture_number: 0,
      required: w * h * 3 / 2,
      available: 1000,
    }]
  );
}

#[test]
fn flush_stops_the_encoder() {
  let (w, h) = (64, 64);
  let mut enc = setup_encoder(setup_config(w, h, Preset::M8, 8, 0));
  enc.encode(PictureInput::intra(source_picture(11, w, h, 8))).unwrap();
  enc.flush();
  enc.flush();
  let input = PictureInput::intra(source_picture(11, w, h, 8));
  assert_eq!(enc.encode(input).unwrap_err(), EncoderStatus::LimitReached);
}
