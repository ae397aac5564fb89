// Copyright (c) 2017-2024, The rav1e contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use av1_encdec::mc::{predict_inter, InterpFilters, MotionVector};
use av1_encdec::me::{self, BlockRect, MePlanes};
use av1_encdec::Plane;
use criterion::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;

fn fill_plane(ra: &mut ChaChaRng, plane: &mut Plane<u16>) {
  let stride = plane.cfg.stride;
  for row in plane.data.chunks_mut(stride) {
    for pixel in row {
      let v: u8 = ra.gen();
      *pixel = v as u16;
    }
  }
}

fn new_plane(ra: &mut ChaChaRng, width: usize, height: usize) -> Plane<u16> {
  let mut p = Plane::new(width, height, 0, 0, 128 + 8, 128 + 8);

  fill_plane(ra, &mut p);

  p
}

fn bench_get_sad(b: &mut Bencher, size: &usize) {
  let mut ra = ChaChaRng::from_seed([0; 32]);
  let org = new_plane(&mut ra, 640, 480);
  let rf = new_plane(&mut ra, 640, 480);
  let blk = BlockRect::new(64, 64, *size, *size);

  b.iter(|| black_box(me::get_sad(&org, &blk, &rf, 70, 60)))
}

pub fn get_sad(c: &mut Criterion) {
  let mut group = c.benchmark_group("get_sad");
  for size in [8, 16, 32, 64, 128] {
    group.bench_with_input(
      BenchmarkId::from_parameter(format!("{0}x{0}", size)),
      &size,
      bench_get_sad,
    );
  }
  group.finish();
}

pub fn hme_search(c: &mut Criterion) {
  let mut ra = ChaChaRng::from_seed([1; 32]);
  let org = MePlanes::new(&new_plane(&mut ra, 640, 480));
  let rf = MePlanes::new(&new_plane(&mut ra, 640, 480));
  let blk = BlockRect::new(256, 192, 64, 64);
  c.bench_function("hme_search_64x64", |b| {
    b.iter(|| black_box(me::hme_search(&org, &rf, &blk, 16, 4, 2)))
  });
}

pub fn subpel_prediction(c: &mut Criterion) {
  let mut ra = ChaChaRng::from_seed([2; 32]);
  let rf = new_plane(&mut ra, 640, 480);
  let mut dst = vec![0u16; 64 * 64];
  let mv = MotionVector::new(-13, 27);
  c.bench_function("predict_inter_64x64_sharp", |b| {
    b.iter(|| {
      predict_inter(
        &mut dst,
        64,
        &rf,
        128,
        128,
        64,
        64,
        mv,
        InterpFilters::SHARP,
        8,
      );
      black_box(dst[0])
    })
  });
}

criterion_group!(motion, get_sad, hme_search, subpel_prediction);
